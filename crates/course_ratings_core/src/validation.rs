//! crates/course_ratings_core/src/validation.rs
//!
//! Input normalization applied before anything reaches the backend. None of
//! these functions fail; callers turn an empty or `false` result into a
//! validation error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Longest string `sanitize_string` will return, in characters.
pub const MAX_SANITIZED_LEN: usize = 255;

const STRIPPED_CHARS: [char; 5] = ['<', '>', '\'', '"', '&'];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static INSTITUTIONAL_EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@graduacao\.uerj\.br$").expect("valid institutional email regex")
});

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid uuid regex")
});

/// Trims, strips `< > ' " &` and truncates to 255 characters.
pub fn sanitize_string(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .take(MAX_SANITIZED_LEN)
        .collect()
}

/// Same as [`sanitize_string`] for loosely typed input; anything that is not a
/// JSON string becomes empty.
pub fn sanitize_value(input: &Value) -> String {
    match input {
        Value::String(s) => sanitize_string(s),
        _ => String::new(),
    }
}

/// Trims and lowercases; returns an empty string unless the result looks like
/// `local@domain.tld`.
pub fn sanitize_email(input: &str) -> String {
    let cleaned = input.trim().to_lowercase();
    if EMAIL_RE.is_match(&cleaned) {
        cleaned
    } else {
        String::new()
    }
}

/// True for addresses on the student domain (`@graduacao.uerj.br`).
pub fn is_institutional_email(email: &str) -> bool {
    INSTITUTIONAL_EMAIL_RE.is_match(email)
}

/// Strict canonical 8-4-4-4-12 hexadecimal form, any case.
pub fn validate_uuid(id: &str) -> bool {
    UUID_RE.is_match(id)
}

/// True iff `stars` is within 1..=5.
pub fn validate_stars(stars: i64) -> bool {
    (1..=5).contains(&stars)
}

/// Extracts an integral star count from a JSON value. Strings, booleans and
/// non-integral numbers yield `None`; `3.0` counts as integral.
pub fn stars_from_json(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(n) = number.as_i64() {
        return Some(n);
    }
    let float = number.as_f64()?;
    if float.fract() == 0.0 && float.is_finite() && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_string_strips_markup_characters() {
        let cleaned = sanitize_string("  <script>alert('x') & \"y\"</script>  ");
        assert_eq!(cleaned, "scriptalert(x)  y/script");
        assert!(!cleaned.contains(STRIPPED_CHARS));
    }

    #[test]
    fn sanitize_string_truncates_to_limit() {
        let long = "a".repeat(300) + "<>";
        let cleaned = sanitize_string(&long);
        assert_eq!(cleaned.chars().count(), MAX_SANITIZED_LEN);

        let accented = "é".repeat(400);
        assert_eq!(sanitize_string(&accented).chars().count(), MAX_SANITIZED_LEN);
    }

    #[test]
    fn sanitize_string_truncates_after_stripping() {
        let input = "<".repeat(10) + &"b".repeat(260);
        assert_eq!(sanitize_string(&input), "b".repeat(MAX_SANITIZED_LEN));
    }

    #[test]
    fn sanitize_value_rejects_non_strings() {
        assert_eq!(sanitize_value(&json!(42)), "");
        assert_eq!(sanitize_value(&json!(null)), "");
        assert_eq!(sanitize_value(&json!(["a"])), "");
        assert_eq!(sanitize_value(&json!(" ok ")), "ok");
    }

    #[test]
    fn sanitize_email_normalizes_valid_addresses() {
        assert_eq!(sanitize_email("  Aluno@Graduacao.UERJ.br "), "aluno@graduacao.uerj.br");
    }

    #[test]
    fn sanitize_email_rejects_malformed_addresses() {
        for bad in ["", "aluno", "aluno@", "@uerj.br", "aluno@uerj", "a b@uerj.br", "a@@b.c"] {
            assert_eq!(sanitize_email(bad), "", "{bad} should be rejected");
        }
    }

    #[test]
    fn institutional_domain_is_exact() {
        assert!(is_institutional_email("aluno@graduacao.uerj.br"));
        assert!(!is_institutional_email("aluno@gmail.com"));
        assert!(!is_institutional_email("aluno@graduacao.uerj.br.evil.com"));
        assert!(!is_institutional_email("aluno@uerj.br"));
        assert!(!is_institutional_email("a luno@graduacao.uerj.br"));
    }

    #[test]
    fn validate_uuid_accepts_canonical_form_only() {
        assert!(validate_uuid("123e4567-e89b-12d3-a456-426614174000"));
        assert!(validate_uuid("123E4567-E89B-12D3-A456-426614174000"));

        assert!(!validate_uuid("123e4567e89b12d3a456426614174000"));
        assert!(!validate_uuid("123e4567-e89b-12d3-a456-42661417400"));
        assert!(!validate_uuid("123e4567-e89b-12d3-a456-4266141740000"));
        assert!(!validate_uuid("123e4567-e89b-12d3-a456-42661417400g"));
        assert!(!validate_uuid("{123e4567-e89b-12d3-a456-426614174000}"));
        assert!(!validate_uuid(""));
    }

    #[test]
    fn validate_stars_bounds() {
        assert!(!validate_stars(0));
        for n in 1..=5 {
            assert!(validate_stars(n));
        }
        assert!(!validate_stars(6));
        assert!(!validate_stars(-1));
    }

    #[test]
    fn stars_from_json_rejects_non_integers() {
        assert_eq!(stars_from_json(&json!(3)), Some(3));
        assert_eq!(stars_from_json(&json!(3.0)), Some(3));
        assert_eq!(stars_from_json(&json!(3.5)), None);
        assert_eq!(stars_from_json(&json!("3")), None);
        assert_eq!(stars_from_json(&json!(true)), None);
        assert_eq!(stars_from_json(&json!(null)), None);
    }
}
