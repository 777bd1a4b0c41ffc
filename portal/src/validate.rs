use crate::descriptor::ServiceDescriptor;
use crate::matcher::CompiledMatcher;
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

/// A required field is missing or blank.
pub const REQUIRED: &str = "REQUIRED";
/// The pattern does not compile under its declared variant.
pub const INVALID_PATTERN_SYNTAX: &str = "INVALID_PATTERN_SYNTAX";
/// Another service with a different id already carries this pattern under
/// the same variant.
pub const DUPLICATE_PATTERN: &str = "DUPLICATE_PATTERN";

fn field_error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Check a descriptor against the field rules and against the services
/// already registered.  Returns every violation at once; an empty outcome
/// means the descriptor is admissible.
///
/// Duplicate detection keys on (pattern, variant): the same pattern text
/// under a different variant is a different admission rule, not a
/// duplicate.  A descriptor never collides with its own id, so editing a
/// service in place stays admissible.
pub fn validate(descriptor: &ServiceDescriptor, existing: &[ServiceDescriptor]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if descriptor.name.trim().is_empty() {
        errors.add("name", field_error(REQUIRED, "a service name is required"));
    }

    if descriptor.pattern.trim().is_empty() {
        errors.add("pattern", field_error(REQUIRED, "a service pattern is required"));
        // nothing below applies to a blank pattern
        return errors;
    }

    if let Err(err) = CompiledMatcher::for_descriptor(descriptor) {
        errors.add(
            "pattern",
            field_error(INVALID_PATTERN_SYNTAX, err.to_string()),
        );
    }

    let duplicate = existing.iter().any(|other| {
        other.id != descriptor.id
            && other.pattern == descriptor.pattern
            && other.matcher.kind() == descriptor.matcher.kind()
    });
    if duplicate {
        errors.add(
            "pattern",
            field_error(DUPLICATE_PATTERN, "another service already uses this pattern"),
        );
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Matcher;

    fn descriptor(id: i64, name: &str, pattern: &str, matcher: Matcher) -> ServiceDescriptor {
        ServiceDescriptor::builder()
            .id(id)
            .name(name)
            .pattern(pattern)
            .matcher(matcher)
            .build()
            .unwrap()
    }

    fn codes(errors: &ValidationErrors, field: &'static str) -> Vec<String> {
        errors
            .field_errors()
            .get(field)
            .map(|errs| errs.iter().map(|err| err.code.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn an_admissible_descriptor_has_no_violations() {
        let d = descriptor(1, "svc", "https://example.org/cb", Matcher::Literal);
        assert!(validate(&d, &[]).is_empty());
    }

    #[test]
    fn blank_name_and_pattern_are_both_flagged() {
        let d = descriptor(1, "  ", "", Matcher::Literal);
        let errors = validate(&d, &[]);
        assert_eq!(codes(&errors, "name"), vec![REQUIRED]);
        assert_eq!(codes(&errors, "pattern"), vec![REQUIRED]);
    }

    #[test]
    fn a_blank_pattern_reports_nothing_else() {
        let d = descriptor(1, "svc", "   ", Matcher::Regex);
        let errors = validate(&d, &[]);
        assert_eq!(codes(&errors, "pattern"), vec![REQUIRED]);
    }

    #[test]
    fn a_malformed_regex_reports_the_compiler_message() {
        let d = descriptor(1, "svc", "(unclosed", Matcher::Regex);
        let errors = validate(&d, &[]);
        assert_eq!(codes(&errors, "pattern"), vec![INVALID_PATTERN_SYNTAX]);
        let field_errors = errors.field_errors();
        let err = &field_errors["pattern"][0];
        assert!(err.message.as_ref().unwrap().contains("regex"));
    }

    #[test]
    fn a_malformed_glob_is_flagged() {
        let d = descriptor(1, "svc", "https://host/[a", Matcher::Glob);
        let errors = validate(&d, &[]);
        assert_eq!(codes(&errors, "pattern"), vec![INVALID_PATTERN_SYNTAX]);
    }

    #[test]
    fn an_unbalanced_paren_regex_is_flagged() {
        // "a)(b" would parse if the anchor wrapped it unchecked
        let d = descriptor(1, "svc", "a)(b", Matcher::Regex);
        let errors = validate(&d, &[]);
        assert_eq!(codes(&errors, "pattern"), vec![INVALID_PATTERN_SYNTAX]);
    }

    #[test]
    fn a_fixture_pattern_never_fails_syntax() {
        let d = descriptor(1, "svc", "(((", Matcher::Fixture { matched: true });
        assert!(validate(&d, &[]).is_empty());
    }

    #[test]
    fn the_same_pattern_and_variant_on_another_id_is_a_duplicate() {
        let existing = descriptor(1, "old", "https://example.org/cb", Matcher::Literal);
        let incoming = descriptor(2, "new", "https://example.org/cb", Matcher::Literal);
        let errors = validate(&incoming, &[existing]);
        assert_eq!(codes(&errors, "pattern"), vec![DUPLICATE_PATTERN]);
    }

    #[test]
    fn the_same_pattern_under_a_different_variant_is_not_a_duplicate() {
        let existing = descriptor(1, "old", "serviceId", Matcher::Literal);
        let incoming = descriptor(2, "new", "serviceId", Matcher::Glob);
        assert!(validate(&incoming, &[existing]).is_empty());
    }

    #[test]
    fn a_descriptor_never_collides_with_itself() {
        let existing = descriptor(7, "svc", "https://example.org/cb", Matcher::Literal);
        let incoming = descriptor(7, "renamed", "https://example.org/cb", Matcher::Literal);
        assert!(validate(&incoming, &[existing]).is_empty());
    }

    #[test]
    fn syntax_and_duplicate_violations_stack_on_the_pattern_field() {
        let existing = descriptor(1, "old", "(unclosed", Matcher::Regex);
        let incoming = descriptor(2, "new", "(unclosed", Matcher::Regex);
        let errors = validate(&incoming, &[existing]);
        assert_eq!(
            codes(&errors, "pattern"),
            vec![INVALID_PATTERN_SYNTAX, DUPLICATE_PATTERN]
        );
    }
}
