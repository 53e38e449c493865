//! Local type-encoding grammar
//!
//! Foreign types map onto the Objective-C type-encoding alphabet so generic
//! reflection UI can treat them like native members. Types with no fixed
//! local shape fail with `Unrepresentable`.

use lens_core::{
    BuiltinType, DemangledName, Error, FieldRecord, FieldTypeRef, NameKind, ReferenceStorage,
    Result, TypeDescriptor, TypeKind,
};
use lens_memory::MemoryReader;
use lens_runtime::MetadataWalker;

/// Encoding given to members whose type has no local representation.
pub const UNKNOWN_ENCODING: &str = "?";

const NATIVE_STRING: &str = "@\"NSString\"";
const NATIVE_STRING_SIZE: u64 = 16;
const POINTER_SIZE: u64 = 8;
const MAX_NESTING: usize = 32;

pub fn encode_builtin(builtin: BuiltinType) -> &'static str {
    match builtin {
        BuiltinType::Int | BuiltinType::Int64 => "q",
        BuiltinType::Int32 => "i",
        BuiltinType::Int16 => "s",
        BuiltinType::Int8 => "c",
        BuiltinType::UInt | BuiltinType::UInt64 => "Q",
        BuiltinType::UInt32 => "I",
        BuiltinType::UInt16 => "S",
        BuiltinType::UInt8 => "C",
        BuiltinType::Bool => "B",
        BuiltinType::Float => "f",
        BuiltinType::Double | BuiltinType::CGFloat => "d",
        BuiltinType::String => NATIVE_STRING,
        BuiltinType::RawPointer | BuiltinType::MutableRawPointer => "^v",
        BuiltinType::CGPoint => "{CGPoint=dd}",
        BuiltinType::CGSize => "{CGSize=dd}",
        BuiltinType::CGRect => "{CGRect={CGPoint=dd}{CGSize=dd}}",
        BuiltinType::CGVector => "{CGVector=dd}",
        BuiltinType::UIEdgeInsets => "{UIEdgeInsets=dddd}",
        BuiltinType::NSRange => "{_NSRange=QQ}",
    }
}

fn builtin_of(name: &DemangledName) -> Option<BuiltinType> {
    if !name.context.is_empty() || !name.generic_arguments.is_empty() {
        return None;
    }
    BuiltinType::from_qualified(name.module.as_deref()?, &name.type_name)
}

/// Encode a demangled type name
pub fn encode_name(name: &DemangledName) -> Result<String> {
    if let Some(builtin) = builtin_of(name) {
        return Ok(encode_builtin(builtin).to_string());
    }
    match name.kind {
        NameKind::Class => Ok(format!("@\"{}\"", name.qualified_name())),
        NameKind::Protocol if name.module.is_none() && name.type_name == "AnyObject" => {
            Ok("@".to_string())
        }
        _ if name.is_optional() => {
            let wrapped = &name.generic_arguments[0];
            let encoded = encode_name(wrapped)?;
            // Only pointer-shaped payloads keep their layout when wrapped.
            if (encoded.starts_with('@') && encoded != NATIVE_STRING) || encoded.starts_with('^') {
                Ok(encoded)
            } else {
                Err(Error::unrepresentable(format!("{} has no local encoding", name)))
            }
        }
        _ => Err(Error::unrepresentable(format!("{} has no local encoding", name))),
    }
}

/// Encode a walked type
pub fn encode(ty: &TypeDescriptor) -> Result<String> {
    match ty.kind {
        TypeKind::Class => Ok(format!("@\"{}\"", ty.name.qualified_name())),
        TypeKind::Opaque => Err(Error::unrepresentable(format!(
            "{} {} has no local encoding",
            ty.kind, ty.name
        ))),
        TypeKind::Struct | TypeKind::Enum | TypeKind::Protocol => encode_name(&ty.name),
    }
}

/// Encode a field, resolving deferred types through `walker`.
pub fn encode_field<M: MemoryReader>(walker: &MetadataWalker<M>, field: &FieldRecord) -> Result<String> {
    match &field.type_ref {
        FieldTypeRef::Builtin(builtin) => Ok(encode_builtin(*builtin).to_string()),
        FieldTypeRef::Deferred(_) => {
            let ty = walker
                .resolve_field_type(field)
                .map_err(|e| Error::unrepresentable(format!("{}: {}", field.name, e)))?;
            let encoded = encode(&ty)?;
            if field.storage != ReferenceStorage::Strong && !encoded.starts_with('@') {
                return Err(Error::unrepresentable(format!(
                    "{} reference to {}",
                    field.name, ty.name
                )));
            }
            Ok(encoded)
        }
    }
}

/// `(size, alignment)` of a single-type encoding, when its layout is known.
pub fn size_info(encoding: &str) -> Option<(u64, u64)> {
    let mut parser = EncodingParser::new(encoding);
    let layout = parser.parse_type(0).ok()?;
    if !parser.at_end() {
        return None;
    }
    layout
}

/// `true` for a non-empty sequence of well-formed type encodings.
pub fn is_valid_type_encoding(encoding: &str) -> bool {
    let mut parser = EncodingParser::new(encoding);
    if parser.at_end() {
        return false;
    }
    while !parser.at_end() {
        if parser.parse_type(0).is_err() {
            return false;
        }
    }
    true
}

struct InvalidEncoding;

struct EncodingParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> EncodingParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn next(&mut self) -> std::result::Result<u8, InvalidEncoding> {
        let byte = self.peek().ok_or(InvalidEncoding)?;
        self.pos += 1;
        Ok(byte)
    }

    /// `Ok(None)` is a well-formed type of unknown size.
    fn parse_type(&mut self, depth: usize) -> std::result::Result<Option<(u64, u64)>, InvalidEncoding> {
        if depth > MAX_NESTING {
            return Err(InvalidEncoding);
        }
        let layout = match self.next()? {
            b'c' | b'C' | b'B' => Some((1, 1)),
            b's' | b'S' => Some((2, 2)),
            b'i' | b'I' | b'f' => Some((4, 4)),
            b'q' | b'Q' | b'd' => Some((8, 8)),
            b'*' | b'#' | b':' => Some((POINTER_SIZE, POINTER_SIZE)),
            b'@' => {
                if self.peek() == Some(b'"') {
                    self.pos += 1;
                    let start = self.pos;
                    while self.next()? != b'"' {}
                    let class = &self.input[start..self.pos - 1];
                    if class.is_empty() {
                        return Err(InvalidEncoding);
                    }
                    if class == b"NSString" {
                        return Ok(Some((NATIVE_STRING_SIZE, POINTER_SIZE)));
                    }
                }
                Some((POINTER_SIZE, POINTER_SIZE))
            }
            b'^' => {
                self.parse_type(depth + 1)?;
                Some((POINTER_SIZE, POINTER_SIZE))
            }
            b'?' | b'v' => None,
            b'{' => self.parse_struct(depth)?,
            _ => return Err(InvalidEncoding),
        };
        Ok(layout)
    }

    fn parse_struct(&mut self, depth: usize) -> std::result::Result<Option<(u64, u64)>, InvalidEncoding> {
        let start = self.pos;
        loop {
            match self.next()? {
                b'=' => break,
                // Opaque struct reference, `{Name}`.
                b'}' if self.pos - 1 > start => return Ok(None),
                b if b.is_ascii_alphanumeric() || b == b'_' || b == b'?' => {}
                _ => return Err(InvalidEncoding),
            }
        }
        if self.pos - 1 == start {
            return Err(InvalidEncoding);
        }

        let (mut size, mut alignment, mut known) = (0u64, 1u64, true);
        while self.peek() != Some(b'}') {
            match self.parse_type(depth + 1)? {
                Some((member_size, member_alignment)) => {
                    size = size.div_ceil(member_alignment) * member_alignment + member_size;
                    alignment = alignment.max(member_alignment);
                }
                None => known = false,
            }
        }
        self.pos += 1;
        Ok(known.then(|| (size.div_ceil(alignment) * alignment, alignment)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(module: &str, name: &str) -> DemangledName {
        DemangledName::nominal(Some(module.to_string()), Vec::new(), name, NameKind::Class)
    }

    fn optional(wrapped: DemangledName) -> DemangledName {
        DemangledName::swift("Optional", NameKind::Enum).with_generic_arguments(vec![wrapped])
    }

    #[test]
    fn test_builtin_encodings_are_valid() {
        let all = [
            BuiltinType::Int,
            BuiltinType::Int8,
            BuiltinType::UInt16,
            BuiltinType::Bool,
            BuiltinType::Float,
            BuiltinType::Double,
            BuiltinType::CGFloat,
            BuiltinType::String,
            BuiltinType::RawPointer,
            BuiltinType::CGPoint,
            BuiltinType::CGRect,
            BuiltinType::UIEdgeInsets,
            BuiltinType::NSRange,
        ];
        for builtin in all {
            let encoded = encode_builtin(builtin);
            assert!(is_valid_type_encoding(encoded), "{}", encoded);
            let (size, alignment) = size_info(encoded).unwrap();
            assert_eq!(size, builtin.size(), "{}", encoded);
            assert_eq!(alignment, builtin.alignment(), "{}", encoded);
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(encode_name(&class("main", "Node")).unwrap(), "@\"main.Node\"");
        assert_eq!(encode_name(&optional(class("main", "Node"))).unwrap(), "@\"main.Node\"");
        assert_eq!(
            encode_name(&DemangledName::swift("String", NameKind::Struct)).unwrap(),
            "@\"NSString\""
        );
        assert_eq!(
            encode_name(&optional(DemangledName::swift("UnsafeRawPointer", NameKind::Struct))).unwrap(),
            "^v"
        );

        let unrepresentable = [
            optional(DemangledName::swift("Int", NameKind::Struct)),
            optional(DemangledName::swift("String", NameKind::Struct)),
            DemangledName::swift("Array", NameKind::Struct)
                .with_generic_arguments(vec![DemangledName::swift("Int", NameKind::Struct)]),
            DemangledName::nominal(Some("main".into()), Vec::new(), "Drawable", NameKind::Protocol),
            DemangledName::tuple(Vec::new(), Vec::new()),
        ];
        for name in unrepresentable {
            assert!(
                matches!(encode_name(&name), Err(Error::Unrepresentable(_))),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_grammar() {
        for valid in ["v@:", "v@:q", "@\"main.Node\"", "^{CGPoint=dd}", "{Empty}", "?", "^?"] {
            assert!(is_valid_type_encoding(valid), "{}", valid);
        }
        for invalid in ["", "x", "@\"", "@\"\"", "{=d}", "{CGPoint=dd", "^"] {
            assert!(!is_valid_type_encoding(invalid), "{}", invalid);
        }
        assert_eq!(size_info("{Mixed=cq}"), Some((16, 8)));
        assert_eq!(size_info("{Pair=si}"), Some((8, 4)));
        assert_eq!(size_info("?"), None);
        assert_eq!(size_info("qq"), None);
    }
}
