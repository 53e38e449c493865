//! Single-letter standard library substitutions (`S<c>`)

use lens_core::NameKind;

/// Looks up the stdlib type abbreviated by `S<c>`.
pub fn standard_type(c: u8) -> Option<(&'static str, NameKind)> {
    use NameKind::{Enum, Protocol, Struct};

    let entry = match c {
        b'A' => ("AutoreleasingUnsafeMutablePointer", Struct),
        b'a' => ("Array", Struct),
        b'B' => ("BinaryFloatingPoint", Protocol),
        b'b' => ("Bool", Struct),
        b'c' => ("UnicodeScalar", Struct),
        b'D' => ("Dictionary", Struct),
        b'd' => ("Double", Struct),
        b'E' => ("Encodable", Protocol),
        b'e' => ("Decodable", Protocol),
        b'F' => ("FloatingPoint", Protocol),
        b'f' => ("Float", Struct),
        b'G' => ("RandomNumberGenerator", Protocol),
        b'H' => ("Hashable", Protocol),
        b'h' => ("Set", Struct),
        b'I' => ("DefaultIndices", Struct),
        b'i' => ("Int", Struct),
        b'J' => ("Character", Struct),
        b'j' => ("Numeric", Protocol),
        b'K' => ("BidirectionalCollection", Protocol),
        b'k' => ("RandomAccessCollection", Protocol),
        b'L' => ("Comparable", Protocol),
        b'l' => ("Collection", Protocol),
        b'M' => ("MutableCollection", Protocol),
        b'm' => ("RangeReplaceableCollection", Protocol),
        b'N' => ("ClosedRange", Struct),
        b'n' => ("Range", Struct),
        b'O' => ("ObjectIdentifier", Struct),
        b'P' => ("UnsafePointer", Struct),
        b'p' => ("UnsafeMutablePointer", Struct),
        b'Q' => ("Equatable", Protocol),
        b'q' => ("Optional", Enum),
        b'R' => ("UnsafeBufferPointer", Struct),
        b'r' => ("UnsafeMutableBufferPointer", Struct),
        b'S' => ("String", Struct),
        b's' => ("Substring", Struct),
        b'T' => ("Sequence", Protocol),
        b't' => ("IteratorProtocol", Protocol),
        b'U' => ("UnsignedInteger", Protocol),
        b'u' => ("UInt", Struct),
        b'V' => ("UnsafeRawPointer", Struct),
        b'v' => ("UnsafeMutableRawPointer", Struct),
        b'W' => ("UnsafeRawBufferPointer", Struct),
        b'w' => ("UnsafeMutableRawBufferPointer", Struct),
        b'X' => ("RangeExpression", Protocol),
        b'x' => ("Strideable", Protocol),
        b'Y' => ("RawRepresentable", Protocol),
        b'y' => ("StringProtocol", Protocol),
        b'Z' => ("SignedInteger", Protocol),
        b'z' => ("BinaryInteger", Protocol),
        _ => return None,
    };
    Some(entry)
}

/// Legacy runtime-class subset (`Si`, `SS`, `Sq`, ...).
pub fn legacy_standard_type(c: u8) -> Option<(&'static str, NameKind)> {
    match c {
        b'i' | b'S' | b'b' | b'd' | b'f' | b'u' | b'a' | b'q' => standard_type(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_entries() {
        assert_eq!(standard_type(b'i'), Some(("Int", NameKind::Struct)));
        assert_eq!(standard_type(b'q'), Some(("Optional", NameKind::Enum)));
        assert_eq!(standard_type(b'H'), Some(("Hashable", NameKind::Protocol)));
        assert_eq!(standard_type(b'g'), None);
        assert_eq!(standard_type(b'o'), None);
    }

    #[test]
    fn test_legacy_subset() {
        assert!(legacy_standard_type(b'S').is_some());
        assert!(legacy_standard_type(b'H').is_none());
    }
}
