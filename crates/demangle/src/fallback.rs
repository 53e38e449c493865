//! Heuristic extraction when the strict grammar gives up
//!
//! Only the leading context path is recovered: the module identifier and the
//! nominal types that structurally follow it. Anything after the first
//! operator that is not part of that path (generic arguments, labels,
//! function signatures) is never turned into a name segment.

use crate::detect::Grammar;
use lens_core::{Demangled, DemangledName, Error, NameKind, Result};

/// Nominal kind operators: struct, class, enum, protocol.
const NOMINAL_KINDS: &[u8] = b"VCOP";

/// A plain length-prefixed identifier starting at `pos`, and the position after it.
///
/// Word-substituted (`0`-prefixed) identifiers are not plain and yield `None`.
fn identifier_at(bytes: &[u8], pos: usize) -> Option<(&str, usize)> {
    let first = *bytes.get(pos)?;
    if !first.is_ascii_digit() || first == b'0' {
        return None;
    }

    let mut end = pos;
    let mut len: usize = 0;
    while let Some(digit) = bytes.get(end).filter(|b| b.is_ascii_digit()) {
        len = len.checked_mul(10)?.checked_add((digit - b'0') as usize)?;
        end += 1;
    }

    let text = bytes.get(end..end.checked_add(len)?)?;
    let valid = text.first().is_some_and(|c| !c.is_ascii_digit())
        && text.iter().all(|c| c.is_ascii_alphanumeric() || *c == b'_');
    if !valid {
        return None;
    }
    let ident = std::str::from_utf8(text).ok()?;
    Some((ident, end + len))
}

/// Module and nominal path of a postfix body: `<module>(<ident><kind>)*`.
fn postfix_path(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let Some((module, mut pos)) = identifier_at(bytes, 0) else {
        return Vec::new();
    };

    let mut path = vec![module];
    while let Some((ident, next)) = identifier_at(bytes, pos) {
        match bytes.get(next) {
            Some(kind) if NOMINAL_KINDS.contains(kind) => {
                path.push(ident);
                pos = next + 1;
            }
            _ => break,
        }
    }
    path
}

/// Module and nominal path of a prefix-order body: `<kinds><module><ident>{nominal count}`.
fn prefix_path(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let markers = bytes.iter().take_while(|b| b.is_ascii_uppercase()).count();
    let nominal = bytes[..markers]
        .iter()
        .filter(|b| NOMINAL_KINDS.contains(*b))
        .count();

    let mut path = Vec::new();
    let mut pos = markers;
    // The module, then one identifier per nominal marker.
    while path.len() <= nominal {
        match identifier_at(bytes, pos) {
            Some((ident, next)) => {
                path.push(ident);
                pos = next;
            }
            None => break,
        }
    }
    path
}

/// Best-effort partial name built only from the structurally decoded prefix.
///
/// A result with an empty type name carries just the module.
pub fn fallback_demangle(grammar: Grammar, body: &str, base: usize) -> Result<Demangled> {
    let path = match grammar {
        Grammar::Postfix => postfix_path(body),
        Grammar::RuntimeClass | Grammar::Legacy => prefix_path(body),
    };

    let name = match path.as_slice() {
        [] => {
            return Err(Error::unsupported_grammar(
                base,
                "no context path could be recovered",
            ))
        }
        [module] => DemangledName::nominal(Some(module.to_string()), Vec::new(), "", NameKind::Unknown),
        [module, context @ .., type_name] => DemangledName::nominal(
            Some(module.to_string()),
            context.iter().map(|s| s.to_string()).collect(),
            *type_name,
            NameKind::Unknown,
        ),
    };
    Ok(Demangled::Partial(name))
}
