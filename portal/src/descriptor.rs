use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::hash::{Hash, Hasher};

/// Identity value of a descriptor that has never been persisted.  A save
/// against this sentinel assigns a fresh id.
pub const UNREGISTERED: i64 = -1;

/// A registered client service: who may participate, matched by
/// `pattern` under the discipline of `matcher`, ranked by
/// `evaluation_order` (lower wins).
///
/// Equality and hashing go by `id` alone.  Two descriptors with the same id
/// are the *same service* regardless of content, which is what lets an edit
/// swap the matcher variant while keeping the service's external identity.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct ServiceDescriptor {
    #[builder(default = "UNREGISTERED")]
    pub id: i64,
    pub name: String,
    #[builder(setter(into, strip_option), default)]
    pub description: Option<String>,
    /// Service identifier pattern; interpretation depends on `matcher`.
    pub pattern: String,
    #[builder(default)]
    pub evaluation_order: i32,
    #[builder(default)]
    pub matcher: Matcher,
    /// Opaque attribute release policy.  Preserved verbatim on edit; never
    /// consulted by matching.
    #[builder(setter(strip_option), default)]
    pub attribute_release: Option<Value>,
    /// Opaque username attribute configuration, same rules as
    /// `attribute_release`.
    #[builder(setter(strip_option), default)]
    pub username_attribute: Option<Value>,
}

impl ServiceDescriptor {
    pub fn builder() -> ServiceDescriptorBuilder {
        ServiceDescriptorBuilder::default()
    }

    pub fn is_registered(&self) -> bool {
        self.id != UNREGISTERED
    }
}

impl PartialEq for ServiceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceDescriptor {}

impl Hash for ServiceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The pattern-interpretation discipline attached to a descriptor.  A closed
/// set: resolve dispatches on the variant tag, so every kind is exhaustively
/// testable.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Matcher {
    /// Exact case-sensitive string equality.
    Literal,
    /// Ant/path-style glob: `*` within a path segment, `**` across segments,
    /// `?` a single character.  Full-string semantics.
    Glob,
    /// Regular expression, anchored to the full candidate string.
    Regex,
    /// Fixed outcome regardless of candidate.  A verification-harness
    /// variant, but first class to the storage and identity layers.
    Fixture { matched: bool },
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::Literal
    }
}

impl Matcher {
    pub fn kind(&self) -> MatcherKind {
        match self {
            Matcher::Literal => MatcherKind::Literal,
            Matcher::Glob => MatcherKind::Glob,
            Matcher::Regex => MatcherKind::Regex,
            Matcher::Fixture { .. } => MatcherKind::Fixture,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum MatcherKind {
    Literal,
    Glob,
    Regex,
    Fixture,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: i64, name: &str, pattern: &str) -> ServiceDescriptor {
        ServiceDescriptor::builder()
            .id(id)
            .name(name)
            .pattern(pattern)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_defaults() {
        let descriptor = ServiceDescriptor::builder()
            .name("app")
            .pattern("https://app.example.org/login")
            .build()
            .unwrap();
        assert_eq!(descriptor.id, UNREGISTERED);
        assert!(!descriptor.is_registered());
        assert_eq!(descriptor.evaluation_order, 0);
        assert_eq!(descriptor.matcher, Matcher::Literal);
        assert!(descriptor.description.is_none());
    }

    #[test]
    fn builder_requires_name_and_pattern() {
        assert!(ServiceDescriptor::builder().pattern("x").build().is_err());
        assert!(ServiceDescriptor::builder().name("x").build().is_err());
    }

    #[test]
    fn identity_is_by_id_not_content() {
        let a = descriptor(7, "one", "https://one.example.org");
        let mut b = descriptor(7, "two", "https://two.example.org");
        b.matcher = Matcher::Regex;
        assert_eq!(a, b);

        let c = descriptor(8, "one", "https://one.example.org");
        assert_ne!(a, c);
    }

    #[test]
    fn kind_tags() {
        assert_eq!(Matcher::Literal.kind(), MatcherKind::Literal);
        assert_eq!(Matcher::Glob.kind(), MatcherKind::Glob);
        assert_eq!(Matcher::Regex.kind(), MatcherKind::Regex);
        assert_eq!(Matcher::Fixture { matched: true }.kind(), MatcherKind::Fixture);
        assert_eq!(MatcherKind::Regex.to_string(), "Regex");
    }
}
