//! Runtime class names (`_Tt…`), read in prefix order

use crate::standard::legacy_standard_type;
use lens_core::{DemangledName, Error, NameKind, Result};

const MAX_NESTING: usize = 64;

#[derive(Debug, Clone)]
enum Entry {
    Module(String),
    Type(DemangledName),
}

struct LegacyParser<'a> {
    text: &'a [u8],
    base: usize,
    pos: usize,
    depth: usize,
    substitutions: Vec<Entry>,
}

/// Parse the body of a `_Tt` name. `base` is the prefix length, for error positions.
pub fn parse_runtime_class(body: &str, base: usize) -> Result<DemangledName> {
    let mut parser = LegacyParser {
        text: body.as_bytes(),
        base,
        pos: 0,
        depth: 0,
        substitutions: Vec::new(),
    };
    let name = parser.parse_type()?;
    if parser.pos != parser.text.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(name)
}

impl<'a> LegacyParser<'a> {
    fn error(&self, reason: impl Into<String>) -> Error {
        Error::unsupported_grammar(self.base + self.pos, reason)
    }

    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<u8> {
        let c = self
            .peek()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(c)
    }

    fn next_if(&mut self, c: u8) -> bool {
        let matched = self.peek() == Some(c);
        if matched {
            self.pos += 1;
        }
        matched
    }

    fn natural(&mut self) -> Option<usize> {
        let start = self.pos;
        let mut value: usize = 0;
        while let Some(c) = self.peek().filter(u8::is_ascii_digit) {
            value = value.checked_mul(10)?.checked_add((c - b'0') as usize)?;
            self.pos += 1;
        }
        (self.pos > start).then_some(value)
    }

    fn identifier(&mut self) -> Result<String> {
        let len = self
            .natural()
            .filter(|&n| n > 0)
            .ok_or_else(|| self.error("expected identifier"))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.text.len())
            .ok_or_else(|| self.error("identifier runs past the end"))?;
        let text = std::str::from_utf8(&self.text[self.pos..end])
            .map_err(|_| self.error("identifier is not UTF-8"))?
            .to_string();
        self.pos = end;
        Ok(text)
    }

    /// `S_` is entry 0, `S<n>_` is entry n + 1.
    fn substitution(&mut self) -> Result<Entry> {
        let index = if self.next_if(b'_') {
            0
        } else {
            let n = self
                .natural()
                .ok_or_else(|| self.error("malformed substitution"))?;
            if !self.next_if(b'_') {
                return Err(self.error("unterminated substitution"));
            }
            n.saturating_add(1)
        };
        self.substitutions
            .get(index)
            .cloned()
            .ok_or_else(|| self.error(format!("substitution {} out of range", index)))
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("type nesting too deep"));
        }
        Ok(())
    }

    fn parse_type(&mut self) -> Result<DemangledName> {
        self.enter()?;
        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Result<DemangledName> {
        match self.next()? {
            b'C' => self.nominal(NameKind::Class),
            b'V' => self.nominal(NameKind::Struct),
            b'O' => self.nominal(NameKind::Enum),
            b'G' => {
                let base = self.parse_type()?;
                let mut arguments = Vec::new();
                while !self.next_if(b'_') {
                    arguments.push(self.parse_type()?);
                }
                if arguments.is_empty() {
                    return Err(self.error("generic type without arguments"));
                }
                Ok(base.with_generic_arguments(arguments))
            }
            b'P' => {
                let mut protocols = Vec::new();
                while !self.next_if(b'_') {
                    let (module, context) = self.context()?;
                    let name = self.identifier()?;
                    let protocol = DemangledName::nominal(module, context, name, NameKind::Protocol);
                    self.substitutions.push(Entry::Type(protocol.clone()));
                    protocols.push(protocol);
                }
                match protocols.len() {
                    0 => Ok(DemangledName::nominal(None, Vec::new(), "Any", NameKind::Protocol)),
                    1 => Ok(protocols.remove(0)),
                    _ => {
                        let names: Vec<String> =
                            protocols.iter().map(DemangledName::qualified_name).collect();
                        Ok(DemangledName::nominal(
                            None,
                            Vec::new(),
                            names.join(" & "),
                            NameKind::Protocol,
                        ))
                    }
                }
            }
            b'S' => {
                let c = self.peek().ok_or_else(|| self.error("unexpected end of input"))?;
                if let Some((name, kind)) = legacy_standard_type(c) {
                    self.pos += 1;
                    return Ok(DemangledName::swift(name, kind));
                }
                match self.substitution()? {
                    Entry::Type(name) => Ok(name),
                    Entry::Module(_) => Err(self.error("module used as a type")),
                }
            }
            other => Err(self.error(format!("unsupported type '{}'", other as char))),
        }
    }

    fn nominal(&mut self, kind: NameKind) -> Result<DemangledName> {
        let (module, context) = self.context()?;
        let name = self.identifier()?;
        let nominal = DemangledName::nominal(module, context, name, kind);
        self.substitutions.push(Entry::Type(nominal.clone()));
        Ok(nominal)
    }

    /// Module or enclosing nominal type.
    fn context(&mut self) -> Result<(Option<String>, Vec<String>)> {
        let entry = match self.peek() {
            Some(b'C' | b'V' | b'O') => {
                self.enter()?;
                let kind = match self.next()? {
                    b'C' => NameKind::Class,
                    b'V' => NameKind::Struct,
                    _ => NameKind::Enum,
                };
                let parent = self.nominal(kind);
                self.depth -= 1;
                Entry::Type(parent?)
            }
            Some(b's') => {
                self.pos += 1;
                Entry::Module("Swift".to_string())
            }
            Some(b'S') => {
                self.pos += 1;
                if self.next_if(b'o') {
                    Entry::Module("__C".to_string())
                } else if self.next_if(b'C') {
                    Entry::Module("__C_Synthesized".to_string())
                } else {
                    self.substitution()?
                }
            }
            Some(c) if c.is_ascii_digit() => {
                let module = Entry::Module(self.identifier()?);
                self.substitutions.push(module.clone());
                module
            }
            _ => return Err(self.error("expected a module or type context")),
        };

        Ok(match entry {
            Entry::Module(module) => (Some(module), Vec::new()),
            Entry::Type(parent) => {
                let mut context = parent.context;
                context.push(parent.type_name);
                (parent.module, context)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str) -> Result<DemangledName> {
        let body = name.strip_prefix("_Tt").unwrap();
        parse_runtime_class(body, 3)
    }

    #[test]
    fn test_simple_class() {
        let name = parse("_TtC7SwiftUI14_UIHostingView").unwrap();
        assert_eq!(name.module.as_deref(), Some("SwiftUI"));
        assert_eq!(name.type_name, "_UIHostingView");
        assert_eq!(name.kind, NameKind::Class);
    }

    #[test]
    fn test_nested_class() {
        let name = parse("_TtCC7SwiftUI17HostingScrollView22PlatformGroupContainer").unwrap();
        assert_eq!(name.module.as_deref(), Some("SwiftUI"));
        assert_eq!(name.context, vec!["HostingScrollView".to_string()]);
        assert_eq!(name.type_name, "PlatformGroupContainer");
        assert_eq!(
            name.to_string(),
            "SwiftUI.HostingScrollView.PlatformGroupContainer"
        );
    }

    #[test]
    fn test_generic_class() {
        let name = parse("_TtGC7SwiftUI14_UIHostingViewV4main11ContentView_").unwrap();
        assert_eq!(name.to_string(), "SwiftUI._UIHostingView<main.ContentView>");
    }

    #[test]
    fn test_standard_and_substitution() {
        let name = parse("_TtGC4main3BoxSiGSqSS__").unwrap();
        assert_eq!(
            name.to_string(),
            "main.Box<Swift.Int, Swift.Optional<Swift.String>>"
        );

        // S_ refers back to the `main` module.
        let name = parse("_TtGC4main3BoxVS_4Item_").unwrap();
        assert_eq!(name.to_string(), "main.Box<main.Item>");
    }

    #[test]
    fn test_protocol() {
        let name = parse("_TtP4main8Drawable_").unwrap();
        assert_eq!(name.kind, NameKind::Protocol);
        assert_eq!(name.qualified_name(), "main.Drawable");
    }

    #[test]
    fn test_malformed() {
        assert!(parse("_TtC7SwiftUI").is_err());
        assert!(parse("_TtC7SwiftUI99Short").is_err());
        assert!(parse("_TtGC4main3Box_").is_err());
        assert!(parse("_TtC4main3Fooxyz").is_err());
        assert!(parse("_TtCS9_3Foo").is_err());
    }
}
