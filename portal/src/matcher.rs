use crate::descriptor::{Matcher, ServiceDescriptor};
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PatternErr {
    #[error("regex syntax: {0}")]
    Regex(#[from] regex::Error),
    #[error("glob syntax: {0}")]
    Glob(#[from] globset::Error),
}

/// A descriptor's matcher variant compiled against its pattern.  Compilation
/// happens once, at validation or index-admission time; matching is a pure
/// function of the candidate and can never fail.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    Literal(String),
    Glob(GlobMatcher),
    Regex(Regex),
    Fixture(bool),
}

impl CompiledMatcher {
    pub fn compile(matcher: &Matcher, pattern: &str) -> Result<Self, PatternErr> {
        match matcher {
            Matcher::Literal => Ok(CompiledMatcher::Literal(pattern.to_string())),
            Matcher::Glob => {
                let glob = GlobBuilder::new(pattern).literal_separator(true).build()?;
                Ok(CompiledMatcher::Glob(glob.compile_matcher()))
            }
            Matcher::Regex => {
                // the raw pattern must parse on its own: the anchor's
                // parens would otherwise balance broken input like "a)(b"
                Regex::new(pattern)?;
                // anchored: the full candidate must satisfy the expression
                let regex = Regex::new(&format!("^(?:{})$", pattern))?;
                Ok(CompiledMatcher::Regex(regex))
            }
            Matcher::Fixture { matched } => Ok(CompiledMatcher::Fixture(*matched)),
        }
    }

    pub fn for_descriptor(descriptor: &ServiceDescriptor) -> Result<Self, PatternErr> {
        Self::compile(&descriptor.matcher, &descriptor.pattern)
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        match self {
            CompiledMatcher::Literal(pattern) => pattern == candidate,
            CompiledMatcher::Glob(glob) => glob.is_match(candidate),
            CompiledMatcher::Regex(regex) => regex.is_match(candidate),
            CompiledMatcher::Fixture(matched) => *matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(matcher: Matcher, pattern: &str) -> CompiledMatcher {
        CompiledMatcher::compile(&matcher, pattern).unwrap()
    }

    #[test]
    fn literal_is_exact_and_case_sensitive() {
        let matcher = compiled(Matcher::Literal, "https://app.example.org/login");
        assert!(matcher.is_match("https://app.example.org/login"));
        assert!(!matcher.is_match("https://app.example.org/login/extra"));
        assert!(!matcher.is_match("https://APP.example.org/login"));
    }

    #[test]
    fn glob_star_stays_within_a_segment() {
        let matcher = compiled(Matcher::Glob, "https://app.example.org/*");
        assert!(matcher.is_match("https://app.example.org/login"));
        assert!(!matcher.is_match("https://app.example.org/login/deep"));
    }

    #[test]
    fn glob_double_star_crosses_segments() {
        let matcher = compiled(Matcher::Glob, "https://app.example.org/**");
        assert!(matcher.is_match("https://app.example.org/login"));
        assert!(matcher.is_match("https://app.example.org/login/deep/path"));
    }

    #[test]
    fn glob_question_mark_is_one_character() {
        let matcher = compiled(Matcher::Glob, "https://host/p?ge");
        assert!(matcher.is_match("https://host/page"));
        assert!(!matcher.is_match("https://host/pge"));
        assert!(!matcher.is_match("https://host/paage"));
    }

    #[test]
    fn glob_is_full_string_not_prefix() {
        let matcher = compiled(Matcher::Glob, "https://host/a");
        assert!(matcher.is_match("https://host/a"));
        assert!(!matcher.is_match("https://host/ab"));
    }

    #[test]
    fn regex_is_anchored() {
        let matcher = compiled(Matcher::Regex, "^serviceId");
        assert!(matcher.is_match("serviceId"));
        assert!(!matcher.is_match("serviceId/tail"));
        assert!(!matcher.is_match("xserviceId"));

        let matcher = compiled(Matcher::Regex, "https://.+\\.example\\.org/.*");
        assert!(matcher.is_match("https://app.example.org/login"));
        assert!(!matcher.is_match("http://app.example.org/login"));
    }

    #[test]
    fn malformed_regex_fails_at_compile_time() {
        let err = CompiledMatcher::compile(&Matcher::Regex, "(unclosed");
        assert!(matches!(err, Err(PatternErr::Regex(_))));
    }

    #[test]
    fn anchoring_does_not_repair_a_malformed_regex() {
        // "a)(b" only parses once the anchor's parens surround it
        assert!(Regex::new("a)(b").is_err());
        let err = CompiledMatcher::compile(&Matcher::Regex, "a)(b");
        assert!(matches!(err, Err(PatternErr::Regex(_))));
    }

    #[test]
    fn malformed_glob_fails_at_compile_time() {
        let err = CompiledMatcher::compile(&Matcher::Glob, "https://host/[a");
        assert!(matches!(err, Err(PatternErr::Glob(_))));
    }

    #[test]
    fn fixture_ignores_the_candidate() {
        let yes = compiled(Matcher::Fixture { matched: true }, "whatever");
        let no = compiled(Matcher::Fixture { matched: false }, "whatever");
        assert!(yes.is_match("anything"));
        assert!(!no.is_match("anything"));
    }
}
