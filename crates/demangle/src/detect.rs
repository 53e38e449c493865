//! Fast classification of mangled symbols

/// Grammar family selected by a symbol's prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// Postfix grammar (`$s`, `$S`, `$e`, `_T0`).
    Postfix,
    /// Runtime class names (`_Tt`), prefix order.
    RuntimeClass,
    /// Older `_T<letter>` entities, only handled by the fallback.
    Legacy,
}

const POSTFIX_PREFIXES: &[&str] = &["_$s", "$s", "_$S", "$S", "_$e", "$e", "_T0"];

/// Returns the grammar and the length of the prefix, without validating the body.
pub fn classify(name: &str) -> Option<(Grammar, usize)> {
    if let Some(prefix) = POSTFIX_PREFIXES.iter().find(|p| name.starts_with(**p)) {
        return Some((Grammar::Postfix, prefix.len()));
    }
    if name.starts_with("_Tt") {
        return Some((Grammar::RuntimeClass, 3));
    }
    let bytes = name.as_bytes();
    if bytes.len() > 2 && bytes.starts_with(b"_T") && bytes[2].is_ascii_uppercase() {
        return Some((Grammar::Legacy, 2));
    }
    None
}

/// Prefix and structural check run before any parse
pub fn is_mangled_name(name: &str) -> bool {
    let Some((_, prefix_len)) = classify(name) else {
        return false;
    };
    name.len() >= prefix_len + 2 && name.bytes().all(|b| b.is_ascii_graphic())
}
