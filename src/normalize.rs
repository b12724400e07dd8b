//! Type and default-expression normalization
//!
//! Engines report the same logical schema with different spellings:
//! `int4` vs `integer`, `_text` vs `text[]`, `now()` vs
//! `CURRENT_TIMESTAMP`, defaults wrapped in explicit casts. This module
//! canonicalizes both sides before the differ compares attributes, so a
//! pull against an untouched database produces an empty change set.

use once_cell::sync::Lazy;
use regex::Regex;

/// Map a dialect type spelling to its canonical name.
///
/// Covers the synonym families PostgreSQL and its derivatives use
/// interchangeably. Input is expected to be a bare type name (no
/// parameters, no array suffix); callers go through [`base_type`] first.
pub fn canonical_type(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "int" | "int4" => "integer".to_string(),
        "int2" => "smallint".to_string(),
        "int8" => "bigint".to_string(),
        "bool" => "boolean".to_string(),
        "float4" | "real" => "real".to_string(),
        "float8" | "double precision" | "float" => "double precision".to_string(),
        "decimal" => "numeric".to_string(),
        "character varying" => "varchar".to_string(),
        "character" | "bpchar" => "char".to_string(),
        "timestamptz" | "timestamp with time zone" => "timestamp with time zone".to_string(),
        "timestamp" | "timestamp without time zone" => "timestamp".to_string(),
        "timetz" | "time with time zone" => "time with time zone".to_string(),
        "time" | "time without time zone" => "time".to_string(),
        "bit varying" => "varbit".to_string(),
        "serial4" => "serial".to_string(),
        "serial8" => "bigserial".to_string(),
        "serial2" => "smallserial".to_string(),
        other => other.to_string(),
    }
}

/// Reduce a type spelling to its lowercase base name: parameters and
/// array markers stripped, leading `_` (catalog array form) removed.
pub fn base_type(name: &str) -> String {
    let mut s = name.trim().to_lowercase();
    if let Some(open) = s.find('(') {
        let close = s.rfind(')').unwrap_or(s.len() - 1);
        let tail = s[close + 1..].to_string();
        s.truncate(open);
        s.push_str(&tail);
    }
    while s.ends_with("[]") {
        s.truncate(s.len() - 2);
    }
    let s = s.trim().to_string();
    s.strip_prefix('_').map(|r| r.to_string()).unwrap_or(s)
}

/// True if the spelling denotes an array: trailing `[]` or catalog `_t` form.
pub fn is_array_spelling(name: &str) -> bool {
    let t = name.trim();
    t.ends_with("[]") || (t.starts_with('_') && t.len() > 1)
}

/// Compare two type spellings modulo synonyms and array notation.
pub fn types_equivalent(a: &str, b: &str) -> bool {
    if is_array_spelling(a) != is_array_spelling(b) {
        return false;
    }
    canonical_type(&base_type(a)) == canonical_type(&base_type(b))
}

static CAST_RE: Lazy<Regex> = Lazy::new(|| {
    // `::text`, `::character varying(100)`, `::text[]` — a cast suffix up to
    // the next operator or delimiter.
    Regex::new(r"::\s*[a-zA-Z_][a-zA-Z0-9_]*(?:\s+[a-zA-Z_][a-zA-Z0-9_]*)*(?:\s*\(\s*[0-9]+(?:\s*,\s*[0-9]+)?\s*\))?(?:\s*\[\s*\])*").unwrap()
});

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a default expression to a canonical comparable form.
///
/// Steps: trim, strip wrapping parentheses, remove explicit casts,
/// collapse whitespace, unify boolean and empty-array literals, and
/// fold the volatile-timestamp/uuid function family to single spellings.
/// Idempotent: `normalize_default(normalize_default(x)) == normalize_default(x)`.
pub fn normalize_default(expr: &str) -> String {
    let mut s = expr.trim().to_string();

    s = strip_outer_parens(&s);
    s = CAST_RE.replace_all(&s, "").to_string();
    s = strip_outer_parens(&s);
    s = WS_RE.replace_all(s.trim(), " ").to_string();

    let lower = s.to_lowercase();

    // boolean forms
    if matches!(lower.as_str(), "true" | "'t'" | "'true'") {
        return "true".to_string();
    }
    if matches!(lower.as_str(), "false" | "'f'" | "'false'") {
        return "false".to_string();
    }

    // empty-array forms
    if lower == "'{}'" || lower == "array[]" {
        return "'{}'".to_string();
    }

    // volatile function families with one canonical spelling each
    if matches!(
        lower.as_str(),
        "now()"
            | "current_timestamp"
            | "current_timestamp()"
            | "'now'"
            | "statement_timestamp()"
            | "transaction_timestamp()"
    ) {
        return "now()".to_string();
    }
    if matches!(lower.as_str(), "gen_random_uuid()" | "uuid_generate_v4()") {
        return "gen_random_uuid()".to_string();
    }

    // keep keywords lowercased, leave quoted literals untouched
    if !s.contains('\'') {
        return lower;
    }
    s
}

/// Compare two optional default expressions after normalization.
pub fn defaults_equivalent(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => normalize_default(a) == normalize_default(b),
        // Absent-vs-present stays a difference.
        _ => false,
    }
}

/// Strip parentheses that wrap the entire expression, repeatedly.
fn strip_outer_parens(expr: &str) -> String {
    let mut s = expr.trim();
    while s.len() >= 2 && s.starts_with('(') && s.ends_with(')') && wraps_whole(s) {
        s = s[1..s.len() - 1].trim();
    }
    s.to_string()
}

/// True if the opening paren at position 0 matches the closing paren at
/// the end (rather than an interior pair, as in `(a),(b)`).
fn wraps_whole(s: &str) -> bool {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != s.len() - 1 {
                    return false;
                }
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_type_synonyms() {
        assert_eq!(canonical_type("int4"), "integer");
        assert_eq!(canonical_type("INT"), "integer");
        assert_eq!(canonical_type("bool"), "boolean");
        assert_eq!(canonical_type("timestamptz"), "timestamp with time zone");
        assert_eq!(canonical_type("float8"), "double precision");
        assert_eq!(canonical_type("character varying"), "varchar");
        assert_eq!(canonical_type("text"), "text");
    }

    #[test]
    fn test_base_type_strips_params_and_arrays() {
        assert_eq!(base_type("varchar(100)"), "varchar");
        assert_eq!(base_type("numeric(10,2)"), "numeric");
        assert_eq!(base_type("text[]"), "text");
        assert_eq!(base_type("text[][]"), "text");
        assert_eq!(base_type("_text"), "text");
        assert_eq!(base_type("TIMESTAMP WITH TIME ZONE"), "timestamp with time zone");
    }

    #[test]
    fn test_types_equivalent() {
        assert!(types_equivalent("int4", "integer"));
        assert!(types_equivalent("bool", "boolean"));
        assert!(types_equivalent("timestamptz", "timestamp with time zone"));
        assert!(types_equivalent("_text", "text[]"));
        assert!(types_equivalent("varchar(100)", "character varying(255)"));
        assert!(!types_equivalent("text", "text[]"));
        assert!(!types_equivalent("integer", "bigint"));
    }

    #[test]
    fn test_normalize_default_casts() {
        assert_eq!(normalize_default("'active'::text"), "'active'");
        assert_eq!(normalize_default("('active'::character varying(20))"), "'active'");
        assert_eq!(normalize_default("'{}'::text[]"), "'{}'");
        assert_eq!(normalize_default("0"), "0");
    }

    #[test]
    fn test_normalize_default_booleans() {
        assert_eq!(normalize_default("TRUE"), "true");
        assert_eq!(normalize_default("true"), "true");
        assert_eq!(normalize_default("'t'::boolean"), "true");
        assert_eq!(normalize_default("false"), "false");
        assert_eq!(normalize_default("('f'::boolean)"), "false");
    }

    #[test]
    fn test_normalize_default_volatile_functions() {
        assert_eq!(normalize_default("now()"), "now()");
        assert_eq!(normalize_default("CURRENT_TIMESTAMP"), "now()");
        assert_eq!(normalize_default("'now'::timestamp with time zone"), "now()");
        assert_eq!(normalize_default("uuid_generate_v4()"), "gen_random_uuid()");
        assert_eq!(normalize_default("gen_random_uuid()"), "gen_random_uuid()");
    }

    #[test]
    fn test_normalize_default_whitespace() {
        assert_eq!(
            normalize_default("  nextval( 'users_id_seq' )  "),
            normalize_default("nextval('users_id_seq')")
        );
    }

    #[test]
    fn test_defaults_equivalent() {
        assert!(defaults_equivalent(Some("'a'::text"), Some("'a'")));
        assert!(defaults_equivalent(None, None));
        assert!(!defaults_equivalent(Some("'a'"), None));
        assert!(!defaults_equivalent(Some("'a'"), Some("'b'")));
        assert!(defaults_equivalent(Some("CURRENT_TIMESTAMP"), Some("now()")));
    }

    #[test]
    fn test_strip_outer_parens_interior_pairs() {
        assert_eq!(strip_outer_parens("(a),(b)"), "(a),(b)");
        assert_eq!(strip_outer_parens("((a))"), "a");
        assert_eq!(strip_outer_parens("(a)"), "a");
    }

    proptest! {
        #[test]
        fn prop_normalize_default_idempotent(expr in "[ -~]{0,40}") {
            let once = normalize_default(&expr);
            let twice = normalize_default(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_base_type_idempotent(name in "[a-z_][a-z0-9_]{0,12}(\\(\\d{1,3}\\))?(\\[\\])?") {
            let once = base_type(&name);
            let twice = base_type(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
