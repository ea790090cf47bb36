//! Token substitution. Two delimiter styles share one algorithm: `%NAME%`
//! for document-time substitution and `{NAME}` for instantiation-time
//! (contextual) substitution. Both support inline defaults (`%NAME|value%`)
//! and escapes (`\%NAME\%` reduces to the literal `%NAME%`).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::error::ScriptError;

/// A delimiter pair identifying one substitution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStyle {
    /// `%NAME%`, applied to raw document text before parsing.
    Document,
    /// `{NAME}`, applied to descriptions, conditions and options at
    /// actor construction.
    Context,
}

impl TokenStyle {
    fn delimiters(&self) -> (&'static str, &'static str) {
        match self {
            TokenStyle::Document => ("%", "%"),
            TokenStyle::Context => ("{", "}"),
        }
    }

    fn regex(&self) -> &'static Regex {
        static DOCUMENT: OnceLock<Regex> = OnceLock::new();
        static CONTEXT: OnceLock<Regex> = OnceLock::new();
        let cell = match self {
            TokenStyle::Document => &DOCUMENT,
            TokenStyle::Context => &CONTEXT,
        };
        cell.get_or_init(|| {
            let (left, right) = self.delimiters();
            let l = regex::escape(left);
            let r = regex::escape(right);
            // Escaped forms first so `\%X\%` never parses as a token.
            let pattern = format!(r"\\{l}(\w+)\\{r}|{l}(\w+)(?:\|([^{r}]+))?{r}");
            Regex::new(&pattern).expect("token pattern must compile")
        })
    }
}

/// Substitute every token reference in `input` from `tokens`.
///
/// In strict mode an unresolved reference falls back to its inline default,
/// and references with neither binding nor default are accumulated into one
/// [`ScriptError::MissingTokens`] naming them all. Escapes are reduced to
/// their literal form and consume no binding.
///
/// In lenient mode unresolved references (including their defaults and
/// escape markers) are left verbatim so a later strict pass can finish the
/// job. Groups use this to leave gaps their children will close.
///
/// Substitution is non-recursive: replacement text is never re-scanned.
pub fn substitute(
    input: &str,
    tokens: &HashMap<String, String>,
    style: TokenStyle,
    strict: bool,
) -> Result<String, ScriptError> {
    let (left, right) = style.delimiters();
    let mut missing: Vec<String> = Vec::new();

    let out = style.regex().replace_all(input, |caps: &Captures| {
        if let Some(escaped) = caps.get(1) {
            if strict {
                return format!("{}{}{}", left, escaped.as_str(), right);
            }
            return caps[0].to_string();
        }
        let name = &caps[2];
        if let Some(value) = tokens.get(name) {
            return value.clone();
        }
        if !strict {
            return caps[0].to_string();
        }
        if let Some(default) = caps.get(3) {
            return default.as_str().to_string();
        }
        missing.push(name.to_string());
        caps[0].to_string()
    });

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(ScriptError::MissingTokens(missing));
    }
    Ok(out.into_owned())
}

/// Deep substitution through structured data: walks the tree and substitutes
/// every string leaf (and object key) in place, covering arbitrarily nested
/// mappings and arrays.
pub fn substitute_value(
    value: &Value,
    tokens: &HashMap<String, String>,
    style: TokenStyle,
    strict: bool,
) -> Result<Value, ScriptError> {
    match value {
        Value::String(s) => Ok(Value::String(substitute(s, tokens, style, strict)?)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(substitute_value(item, tokens, style, strict)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                let key = substitute(key, tokens, style, strict)?;
                out.insert(key, substitute_value(val, tokens, style, strict)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tokens(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_plain_string_is_identity() {
        let out = substitute("no tokens here", &tokens(&[]), TokenStyle::Document, true).unwrap();
        assert_eq!(out, "no tokens here");
    }

    #[test]
    fn test_document_substitution() {
        let out = substitute(
            "release %RELEASE% to %ENV%",
            &tokens(&[("RELEASE", "v2"), ("ENV", "prod")]),
            TokenStyle::Document,
            true,
        )
        .unwrap();
        assert_eq!(out, "release v2 to prod");
    }

    #[test]
    fn test_context_substitution() {
        let out = substitute(
            "hello {NAME}",
            &tokens(&[("NAME", "world")]),
            TokenStyle::Context,
            true,
        )
        .unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_missing_tokens_accumulate() {
        let err = substitute("%A% %B% %A%", &tokens(&[]), TokenStyle::Document, true)
            .err()
            .unwrap();
        match err {
            ScriptError::MissingTokens(names) => {
                assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("expected MissingTokens, got {:?}", other),
        }
    }

    #[test]
    fn test_default_used_when_unset() {
        let out = substitute("%N|fallback%", &tokens(&[]), TokenStyle::Document, true).unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn test_binding_wins_over_default() {
        let out = substitute(
            "%N|fallback%",
            &tokens(&[("N", "bound")]),
            TokenStyle::Document,
            true,
        )
        .unwrap();
        assert_eq!(out, "bound");
    }

    #[test]
    fn test_escape_reduces_to_literal() {
        let out = substitute(r"\%KEEP\%", &tokens(&[("KEEP", "nope")]), TokenStyle::Document, true)
            .unwrap();
        assert_eq!(out, "%KEEP%");
    }

    #[test]
    fn test_escaped_token_consumes_no_binding() {
        // The escaped token must not count as missing either.
        let out = substitute(r"\%GONE\%", &tokens(&[]), TokenStyle::Document, true).unwrap();
        assert_eq!(out, "%GONE%");
    }

    #[test]
    fn test_lenient_leaves_unresolved_verbatim() {
        let out = substitute(
            "{KNOWN} {UNKNOWN} {WITH|default}",
            &tokens(&[("KNOWN", "yes")]),
            TokenStyle::Context,
            false,
        )
        .unwrap();
        assert_eq!(out, "yes {UNKNOWN} {WITH|default}");
    }

    #[test]
    fn test_lenient_preserves_escapes_for_later_pass() {
        let once = substitute(r"\{X\}", &tokens(&[]), TokenStyle::Context, false).unwrap();
        assert_eq!(once, r"\{X\}");
        let twice = substitute(&once, &tokens(&[]), TokenStyle::Context, true).unwrap();
        assert_eq!(twice, "{X}");
    }

    #[test]
    fn test_substitution_is_not_recursive() {
        // A value containing another token reference is not re-scanned.
        let out = substitute(
            "%A%",
            &tokens(&[("A", "%B%"), ("B", "deep")]),
            TokenStyle::Document,
            true,
        )
        .unwrap();
        assert_eq!(out, "%B%");
    }

    #[test]
    fn test_deep_substitution_through_nested_structures() {
        let value = json!({
            "outer": {"msg": "hi {NAME}"},
            "list": [{"n": "{NAME}"}, "{NAME|d}"],
            "count": 3
        });
        let out = substitute_value(
            &value,
            &tokens(&[("NAME", "x")]),
            TokenStyle::Context,
            true,
        )
        .unwrap();
        assert_eq!(
            out,
            json!({
                "outer": {"msg": "hi x"},
                "list": [{"n": "x"}, "x"],
                "count": 3
            })
        );
    }

    #[test]
    fn test_json_braces_are_not_tokens() {
        // Braces followed by quotes or nested objects never parse as tokens.
        let out = substitute(
            r#"{"message": "plain"}"#,
            &tokens(&[]),
            TokenStyle::Context,
            true,
        )
        .unwrap();
        assert_eq!(out, r#"{"message": "plain"}"#);
    }
}
