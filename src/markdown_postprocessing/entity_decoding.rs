//! HTML entity decoding for the final Markdown.
//!
//! Entities survive conversion in link targets (`?a=1&amp;b=2`) and wherever a
//! pass re-serialized Markdown through an HTML tree. Named entities are decoded
//! first, then decimal and hexadecimal character references.

use regex::{Captures, Regex};
use std::sync::LazyLock;

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
];

static DECIMAL_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(\d+);").expect("DECIMAL_REF_RE: hardcoded regex is valid")
});

static HEX_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#[xX]([0-9a-fA-F]+);").expect("HEX_REF_RE: hardcoded regex is valid")
});

/// Decode the common named entities and numeric character references
///
/// References that do not name a valid Unicode scalar value are left as-is.
pub fn decode_html_entities(markdown: &str) -> String {
    if !markdown.contains('&') {
        return markdown.to_string();
    }

    let named = NAMED_ENTITIES
        .iter()
        .fold(markdown.to_string(), |text, (entity, plain)| text.replace(entity, plain));

    let decimal = DECIMAL_REF_RE.replace_all(&named, |caps: &Captures| {
        decode_reference(&caps[0], &caps[1], 10)
    });
    HEX_REF_RE
        .replace_all(&decimal, |caps: &Captures| decode_reference(&caps[0], &caps[1], 16))
        .into_owned()
}

fn decode_reference(reference: &str, digits: &str, radix: u32) -> String {
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .map_or_else(|| reference.to_string(), String::from)
}
