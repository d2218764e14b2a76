//! Secret scrubbing for text that may reach logs or callers

use std::sync::OnceLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

const MASK: &str = "[redacted]";

struct Patterns {
    api_key: Regex,
    bearer: Regex,
    header: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        api_key: Regex::new(r"\bsk-[A-Za-z0-9_\-]{8,}").expect("must be valid regex"),
        bearer: Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/\-]+=*").expect("must be valid regex"),
        header: Regex::new(r#"(?i)(x-api-key["']?\s*[:=]\s*["']?)[^\s"',}]+"#).expect("must be valid regex"),
    })
}

/// Remove credentials from `text`
///
/// Masks the literal key when one is supplied, then anything shaped like a
/// provider key, a bearer token, or an `x-api-key` value.
pub fn redact(text: &str, key: Option<&SecretString>) -> String {
    let mut output = text.to_owned();

    if let Some(key) = key {
        let literal = key.expose_secret();
        if !literal.is_empty() {
            output = output.replace(literal, MASK);
        }
    }

    let patterns = patterns();
    let output = patterns.api_key.replace_all(&output, MASK);
    let output = patterns.bearer.replace_all(&output, format!("Bearer {MASK}").as_str());
    let output = patterns.header.replace_all(&output, format!("${{1}}{MASK}").as_str());

    output.into_owned()
}
