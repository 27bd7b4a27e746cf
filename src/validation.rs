//! Input validation and sanitization for user questions.
//!
//! A question passes through [`sanitize`] (markup stripping, whitespace
//! normalization) and is then checked against length bounds and a set of
//! suspicious patterns. Rejections carry a [`ValidationError`] whose
//! `Display` text is the Dutch user-facing message and whose [`code`]
//! is the stable machine-readable reason.
//!
//! Validation is a pure function of its input: no network or disk access,
//! no side effects. Sanitization is idempotent, so re-sanitizing an already
//! sanitized string returns it unchanged.
//!
//! [`code`]: ValidationError::code

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Minimum question length after sanitization.
pub const MIN_QUESTION_LEN: usize = 10;
/// Maximum question length after sanitization.
pub const MAX_QUESTION_LEN: usize = 500;

// Closed <script> blocks are removed with their contents before generic tag
// stripping, so script payloads never survive as loose text.
static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SUSPICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<script",
        r"(?i)javascript:",
        r"(?i)on\w+\s*=", // inline event handlers like onclick=
        r"(?i)eval\(",
        r"(?i)expression\(",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Reasons a question can be rejected.
///
/// The `Display` implementation yields the Dutch message shown to the end
/// user; [`ValidationError::code`] yields the stable identifier that clients
/// and tests key on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Vraag is verplicht")]
    MissingQuestion,

    #[error("Vraag kan niet leeg zijn")]
    EmptyQuestion,

    #[error("Vraag moet minimaal {MIN_QUESTION_LEN} karakters bevatten")]
    TooShort,

    #[error("Vraag mag maximaal {MAX_QUESTION_LEN} karakters bevatten")]
    TooLong,

    #[error("Vraag bevat ongeldige karakters")]
    SuspiciousContent,
}

impl ValidationError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingQuestion => "missing_question",
            ValidationError::EmptyQuestion => "empty_question",
            ValidationError::TooShort => "too_short",
            ValidationError::TooLong => "too_long",
            ValidationError::SuspiciousContent => "suspicious_content",
        }
    }
}

/// Strip markup and normalize whitespace.
///
/// Removes closed `<script>` blocks including their contents, removes any
/// remaining HTML tag markup, collapses whitespace runs to single spaces and
/// trims the ends.
pub fn sanitize(input: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(input, "");
    let without_tags = HTML_TAG.replace_all(&without_scripts, "");
    WHITESPACE_RUN
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

/// Sanitize and validate a raw question.
///
/// `None` means the question field was absent from the request. On success
/// the returned string is the sanitized question, safe to embed in a prompt.
pub fn validate_question(raw: Option<&str>) -> Result<String, ValidationError> {
    let raw = raw.ok_or(ValidationError::MissingQuestion)?;

    let sanitized = sanitize(raw);

    if sanitized.is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    if sanitized.chars().count() < MIN_QUESTION_LEN {
        return Err(ValidationError::TooShort);
    }
    if sanitized.chars().count() > MAX_QUESTION_LEN {
        return Err(ValidationError::TooLong);
    }

    if SUSPICIOUS_PATTERNS.iter().any(|p| p.is_match(&sanitized)) {
        return Err(ValidationError::SuspiciousContent);
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_question_is_rejected() {
        assert_eq!(
            validate_question(None),
            Err(ValidationError::MissingQuestion)
        );
    }

    #[test]
    fn empty_after_sanitization_is_rejected() {
        assert_eq!(
            validate_question(Some("   <b></b>  ")),
            Err(ValidationError::EmptyQuestion)
        );
    }

    #[test]
    fn short_questions_are_rejected() {
        assert_eq!(validate_question(Some("hi")), Err(ValidationError::TooShort));
        // 9 characters, one below the minimum
        assert_eq!(
            validate_question(Some("123456789")),
            Err(ValidationError::TooShort)
        );
    }

    #[test]
    fn minimum_length_boundary_is_accepted() {
        let ten_chars = "1234567890";
        assert_eq!(validate_question(Some(ten_chars)), Ok(ten_chars.to_string()));
    }

    #[test]
    fn long_questions_are_rejected() {
        let long = "a".repeat(MAX_QUESTION_LEN + 1);
        assert_eq!(validate_question(Some(&long)), Err(ValidationError::TooLong));

        let max = "a".repeat(MAX_QUESTION_LEN);
        assert!(validate_question(Some(&max)).is_ok());
    }

    #[test]
    fn script_blocks_are_stripped_with_contents() {
        let sanitized = sanitize("Wat brengt <script>alert(1)</script>de toekomst mij dit jaar?");
        assert!(!sanitized.contains("<script"));
        assert!(!sanitized.contains("alert(1)"));
        assert_eq!(sanitized, "Wat brengt de toekomst mij dit jaar?");
    }

    #[test]
    fn html_tags_are_stripped() {
        assert_eq!(
            sanitize("Zal <b>ik</b> slagen   voor mijn examen?"),
            "Zal ik slagen voor mijn examen?"
        );
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "Zal ik dit jaar een nieuwe baan vinden?",
            "  Wat   brengt <i>de</i> toekomst?  ",
            "<script>alert(1)</script>Komt alles goed met mij?",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn suspicious_patterns_are_rejected() {
        let cases = [
            "Wat gebeurt er als ik javascript:void(0) gebruik?",
            "Mijn vraag bevat onclick= en is daarom verdacht",
            "Waarom werkt eval(iets) niet zoals verwacht?",
            "Is expression(dit) een geldige vraag om te stellen?",
        ];
        for case in cases {
            assert_eq!(
                validate_question(Some(case)),
                Err(ValidationError::SuspiciousContent),
                "expected rejection for {case:?}"
            );
        }
    }

    #[test]
    fn normal_dutch_question_passes() {
        let q = "Zal ik dit jaar een nieuwe baan vinden?";
        assert_eq!(validate_question(Some(q)), Ok(q.to_string()));
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(ValidationError::TooShort.code(), "too_short");
        assert_eq!(ValidationError::TooLong.code(), "too_long");
        assert_eq!(
            ValidationError::SuspiciousContent.code(),
            "suspicious_content"
        );
    }
}
