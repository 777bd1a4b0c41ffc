use crate::matcher::PatternErr;
#[cfg(feature = "postgres")]
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegErr {
    #[error(transparent)]
    Pattern(#[from] PatternErr),

    #[error("required field '{0}' is empty")]
    RequiredField(&'static str),

    #[error("{0}")]
    Msg(String),

    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    SqlxErr(#[from] Arc<sqlx::Error>),

    #[cfg(feature = "postgres")]
    #[error("service record codec error: {0}")]
    Codec(Arc<serde_json::Error>),
}

impl From<&str> for RegErr {
    fn from(err: &str) -> Self {
        Self::Msg(err.to_string())
    }
}

impl From<&String> for RegErr {
    fn from(err: &String) -> Self {
        Self::Msg(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for RegErr {
    fn from(value: sqlx::Error) -> Self {
        Self::SqlxErr(Arc::new(value))
    }
}

#[cfg(feature = "postgres")]
impl From<serde_json::Error> for RegErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(Arc::new(value))
    }
}

impl RegErr {
    pub fn msg<M>(msg: M) -> RegErr
    where
        M: ToString,
    {
        Self::Msg(msg.to_string())
    }

    pub fn required(field: &'static str) -> Self {
        Self::RequiredField(field)
    }
}
