//! PII guard - blocks storage of sensitive personal data.
//!
//! Pure classifier with no side effects: `check_pii(text)` returns the
//! list of violations; an empty list means the text is safe to store.
//! Callers reject the write on any violation - the text is never
//! persisted, not even in partial or redacted form.
//!
//! Rule set: stable personal info, long-term preferences, projects and
//! constraints SHOULD be stored; passwords, secrets, tokens, SSNs and
//! card numbers must never be.

use once_cell::sync::Lazy;
use regex::Regex;

/// Case-insensitive substrings that always block a write.
const BLOCKED_KEYWORDS: &[&str] = &[
    "password:",
    "passwd:",
    "api_key:",
    "apikey:",
    "api key:",
    "secret_key:",
    "secretkey:",
    "secret key:",
    "access_token:",
    "auth_token:",
    "bearer ",
    "ssn:",
    "social security number:",
];

static PII_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid SSN pattern"),
            "SSN (xxx-xx-xxxx)",
        ),
        (
            Regex::new(r"\b\d{9}\b").expect("valid bare-SSN pattern"),
            "potential SSN (9 consecutive digits)",
        ),
        (
            Regex::new(r"\b(?:\d[ -]*?){13,19}\b").expect("valid card pattern"),
            "credit/debit card number",
        ),
    ]
});

/// A single PII finding in a candidate text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiViolation {
    /// Human-readable description of what matched
    pub detail: String,
}

impl std::fmt::Display for PiiViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail)
    }
}

/// Check a text for PII. Empty result means safe.
#[must_use]
pub fn check_pii(text: &str) -> Vec<PiiViolation> {
    let mut violations = Vec::new();
    let lower = text.to_lowercase();

    for keyword in BLOCKED_KEYWORDS {
        if lower.contains(keyword) {
            violations.push(PiiViolation {
                detail: format!(
                    "Blocked keyword detected: '{}'",
                    keyword.trim_end().trim_end_matches(':')
                ),
            });
        }
    }

    for (pattern, label) in PII_PATTERNS.iter() {
        if pattern.is_match(text) {
            violations.push(PiiViolation {
                detail: format!("Pattern match: {label}"),
            });
        }
    }

    violations
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_passes() {
        assert!(check_pii("likes pizza").is_empty());
        assert!(check_pii("Favorite editor is VS Code").is_empty());
    }

    #[test]
    fn test_ssn_pattern_flagged() {
        let v = check_pii("my ssn is 123-45-6789");
        assert!(!v.is_empty());
        assert!(v.iter().any(|x| x.detail.contains("SSN")));
    }

    #[test]
    fn test_bare_nine_digits_flagged() {
        assert!(!check_pii("id number 123456789 on file").is_empty());
    }

    #[test]
    fn test_card_number_flagged() {
        assert!(!check_pii("card 4111 1111 1111 1111 expires soon").is_empty());
        assert!(!check_pii("4111-1111-1111-1111").is_empty());
    }

    #[test]
    fn test_blocked_keywords_flagged() {
        assert!(!check_pii("password: hunter2").is_empty());
        assert!(!check_pii("api_key: sk-abc123").is_empty());
        assert!(!check_pii("Authorization: Bearer xyz").is_empty());
        assert!(!check_pii("SECRET KEY: deadbeef").is_empty());
    }

    #[test]
    fn test_keyword_without_colon_passes() {
        // Talking *about* passwords is fine; a literal credential is not.
        assert!(check_pii("never store a password in the vault").is_empty());
    }

    #[test]
    fn test_multiple_violations_all_reported() {
        let v = check_pii("password: x and ssn: 123-45-6789");
        assert!(v.len() >= 3); // keyword x2 + pattern
    }
}
