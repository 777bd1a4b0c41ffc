use crate::config::{Database, PostgresConnectInfo};
use crate::descriptor::{ServiceDescriptor, UNREGISTERED};
use crate::registry::err::RegErr;
use crate::registry::ServiceRegistry;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Postgres, Row};
use tracing::{error, info};

struct ServiceRow(ServiceDescriptor);

impl sqlx::FromRow<'_, PgRow> for ServiceRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let matcher: String = row.try_get("matcher")?;
        let matcher = serde_json::from_str(&matcher).map_err(|err| sqlx::Error::ColumnDecode {
            index: "matcher".to_string(),
            source: Box::new(err),
        })?;

        let attribute_release = decode_policy(row, "attribute_release")?;
        let username_attribute = decode_policy(row, "username_attribute")?;

        Ok(Self(ServiceDescriptor {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            pattern: row.try_get("pattern")?,
            evaluation_order: row.try_get("evaluation_order")?,
            matcher,
            attribute_release,
            username_attribute,
        }))
    }
}

fn decode_policy(row: &PgRow, column: &str) -> Result<Option<serde_json::Value>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|err| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(err),
        })
}

/// Postgres-backed store.  Descriptors live in a single `services` table;
/// the matcher variant and the opaque policy payloads are stored as JSON
/// text.  Sentinel ids draw from a dedicated sequence, and explicit-id saves
/// advance that sequence so the two can never collide.
pub struct PostgresServiceRegistry {
    pool: PgPool,
}

impl PostgresServiceRegistry {
    pub async fn new(database: Database<PostgresConnectInfo>) -> Result<Self, RegErr> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database.to_uri().as_str())
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, RegErr> {
        let registry = Self { pool };

        match registry.setup().await {
            Ok(_) => {}
            Err(err) => {
                let message = err.to_string();
                error!("registry database setup failed {}", message);
                return Err(err);
            }
        }

        Ok(registry)
    }

    async fn setup(&self) -> Result<(), RegErr> {
        let services = r#"CREATE TABLE IF NOT EXISTS services (
         id BIGINT PRIMARY KEY,
         name TEXT NOT NULL,
         description TEXT,
         pattern TEXT NOT NULL,
         evaluation_order INTEGER NOT NULL DEFAULT 0,
         matcher TEXT NOT NULL,
         attribute_release TEXT,
         username_attribute TEXT
        )"#;

        let sequence = "CREATE SEQUENCE IF NOT EXISTS services_seq";

        let order_index =
            "CREATE INDEX IF NOT EXISTS services_order_index ON services(evaluation_order,id)";

        let mut trans = self.pool.begin().await?;
        trans.execute(services).await?;
        trans.execute(sequence).await?;
        trans.execute(order_index).await?;
        trans.commit().await?;

        info!("registry database ready");
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for PostgresServiceRegistry {
    async fn load_all<'a>(&'a self) -> Result<Vec<ServiceDescriptor>, RegErr> {
        let rows = sqlx::query_as::<Postgres, ServiceRow>(
            "SELECT id,name,description,pattern,evaluation_order,matcher,attribute_release,username_attribute FROM services",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn save<'a>(
        &'a self,
        mut descriptor: ServiceDescriptor,
    ) -> Result<ServiceDescriptor, RegErr> {
        struct NextId(i64);

        impl sqlx::FromRow<'_, PgRow> for NextId {
            fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
                let v: i64 = row.try_get(0)?;
                Ok(Self(v))
            }
        }

        let matcher = serde_json::to_string(&descriptor.matcher)?;
        let attribute_release = descriptor
            .attribute_release
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let username_attribute = descriptor
            .username_attribute
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut trans = self.pool.begin().await?;

        if descriptor.id == UNREGISTERED {
            let next = sqlx::query_as::<Postgres, NextId>("SELECT nextval('services_seq')")
                .fetch_one(&mut *trans)
                .await?;
            descriptor.id = next.0;
        } else {
            // keep the sequence ahead of explicitly chosen ids
            trans
                .execute(
                    sqlx::query(
                        "SELECT setval('services_seq',GREATEST($1,(SELECT last_value FROM services_seq)),true)",
                    )
                    .bind(descriptor.id),
                )
                .await?;
        }

        trans
            .execute(
                sqlx::query(
                    r#"INSERT INTO services (id,name,description,pattern,evaluation_order,matcher,attribute_release,username_attribute)
                       VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
                       ON CONFLICT (id) DO UPDATE SET
                         name=EXCLUDED.name,
                         description=EXCLUDED.description,
                         pattern=EXCLUDED.pattern,
                         evaluation_order=EXCLUDED.evaluation_order,
                         matcher=EXCLUDED.matcher,
                         attribute_release=EXCLUDED.attribute_release,
                         username_attribute=EXCLUDED.username_attribute"#,
                )
                .bind(descriptor.id)
                .bind(descriptor.name.as_str())
                .bind(descriptor.description.as_deref())
                .bind(descriptor.pattern.as_str())
                .bind(descriptor.evaluation_order)
                .bind(matcher.as_str())
                .bind(attribute_release.as_deref())
                .bind(username_attribute.as_deref()),
            )
            .await?;

        trans.commit().await?;
        Ok(descriptor)
    }

    async fn delete<'a>(&'a self, id: i64) -> Result<bool, RegErr> {
        let result = sqlx::query("DELETE FROM services WHERE id=$1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id<'a>(&'a self, id: i64) -> Result<Option<ServiceDescriptor>, RegErr> {
        let row = sqlx::query_as::<Postgres, ServiceRow>(
            "SELECT id,name,description,pattern,evaluation_order,matcher,attribute_release,username_attribute FROM services WHERE id=$1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.0))
    }
}
