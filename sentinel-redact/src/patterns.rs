// sentinel-redact/src/patterns.rs
// ============================================================================
// Module: Compiled Patterns
// Description: Lazily-compiled regexes shared by the secret-detection and
// PII-detection layers (§4.5 layers 100-200).
// Dependencies: regex
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;

/// One named regex with the finding category it produces.
pub struct NamedPattern {
    /// Category recorded on a [`crate::RedactionFinding`] produced by this
    /// pattern.
    pub category: &'static str,
    /// The compiled pattern.
    pub regex: LazyLock<Regex>,
}

macro_rules! named_pattern {
    ($name:ident, $category:literal, $pattern:literal) => {
        pub static $name: NamedPattern = NamedPattern {
            category: $category,
            regex: LazyLock::new(|| {
                #[allow(clippy::expect_used, reason = "pattern is a fixed literal checked by the unit tests below")]
                Regex::new($pattern).expect("static pattern is valid")
            }),
        };
    };
}

named_pattern!(AWS_ACCESS_KEY, "aws_access_key", r"\b(AKIA|ASIA)[0-9A-Z]{16}\b");
named_pattern!(GCP_API_KEY, "gcp_api_key", r"\bAIza[0-9A-Za-z_-]{35}\b");
named_pattern!(BEARER_TOKEN, "bearer_token", r"(?i)\bBearer\s+[A-Za-z0-9._-]{20,}\b");
named_pattern!(JWT, "jwt", r"\beyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\b");
named_pattern!(
    PEM_BLOCK,
    "pem_block",
    r"(?s)-----BEGIN [A-Z ]+-----.+?-----END [A-Z ]+-----"
);
named_pattern!(GITHUB_TOKEN, "github_token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b");
named_pattern!(SLACK_TOKEN, "slack_token", r"\bxox[baprs]-[A-Za-z0-9-]{10,}\b");

named_pattern!(EMAIL, "email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b");
named_pattern!(SSN, "ssn", r"\b\d{3}-\d{2}-\d{4}\b");
named_pattern!(PHONE, "phone", r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b");
named_pattern!(CREDIT_CARD, "credit_card", r"\b(?:\d[ -]?){13,19}\b");
named_pattern!(
    IPV4,
    "ipv4",
    r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b"
);
named_pattern!(IPV6, "ipv6", r"\b(?:[0-9A-Fa-f]{1,4}:){7}[0-9A-Fa-f]{1,4}\b");

named_pattern!(
    UUID,
    "uuid",
    r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b"
);

named_pattern!(URL, "url", r"https?://[^\s]+");

/// All secret-shape patterns checked by layer 100, in priority order.
pub static SECRET_PATTERNS: &[&NamedPattern] =
    &[&AWS_ACCESS_KEY, &GCP_API_KEY, &BEARER_TOKEN, &JWT, &PEM_BLOCK, &GITHUB_TOKEN, &SLACK_TOKEN];

/// All PII-shape patterns checked by layer 200, in priority order. Credit
/// card matches are Luhn-validated separately before being accepted.
pub static PII_PATTERNS: &[&NamedPattern] = &[&EMAIL, &SSN, &PHONE, &IPV6, &IPV4];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_pattern_compiles() {
        for pattern in SECRET_PATTERNS.iter().chain(PII_PATTERNS) {
            let _ = &*pattern.regex;
        }
        let _ = &*UUID.regex;
        let _ = &*URL.regex;
        let _ = &*CREDIT_CARD.regex;
    }
}
