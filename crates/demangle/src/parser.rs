//! Strict postfix grammar (`$s` and friends)
//!
//! Operators push and pop nodes on a stack; after the last operator exactly
//! one type or entity must remain.

use crate::standard::standard_type;
use lens_core::{
    DemangledName, Error, FunctionSignature, NameKind, Parameter, Result, SymbolRole,
};

const MAX_WORDS: usize = 26;
const MAX_NESTING: usize = 64;
const MAX_REPEAT: usize = 256;
const MAX_NODES: usize = 4096;

/// Resolves symbolic references embedded in type names read from metadata.
pub trait SymbolicResolver {
    /// `kind` is the control byte, `position` its index in the input and
    /// `payload` the 4 or 8 bytes that follow it.
    fn resolve(&self, kind: u8, position: usize, payload: &[u8]) -> Option<DemangledName>;
}

#[derive(Debug, Clone)]
enum Node {
    Module(String),
    Identifier(String),
    Type { name: DemangledName, depth: usize },
    Entity { name: DemangledName, depth: usize },
    EmptyList,
    FirstElement,
    Throws,
    Async,
    Sendable,
}

impl Node {
    fn ty(name: DemangledName, depth: usize) -> Self {
        Node::Type { name, depth }
    }
}

pub(crate) struct Parser<'a> {
    text: &'a [u8],
    /// Offset of `text` in the caller's input, for error positions.
    base: usize,
    pos: usize,
    stack: Vec<Node>,
    substitutions: Vec<Node>,
    words: Vec<String>,
    resolver: Option<&'a dyn SymbolicResolver>,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a [u8], base: usize) -> Self {
        Self {
            text,
            base,
            pos: 0,
            stack: Vec::new(),
            substitutions: Vec::new(),
            words: Vec::new(),
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn SymbolicResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Parse a whole symbol body (prefix already stripped).
    pub fn parse(mut self) -> Result<DemangledName> {
        while self.pos < self.text.len() {
            let node = self.operator()?;
            self.push(node)?;
        }
        self.finish()
    }

    fn finish(mut self) -> Result<DemangledName> {
        if self.stack.len() != 1 {
            return Err(self.error(format!("{} nodes left on the stack", self.stack.len())));
        }
        match self.stack.pop() {
            Some(Node::Type { name, .. }) | Some(Node::Entity { name, .. }) => Ok(name),
            _ => Err(self.error("symbol does not denote a type or entity")),
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::unsupported_grammar(self.base + self.pos, reason)
    }

    fn push(&mut self, node: Node) -> Result<()> {
        if self.stack.len() >= MAX_NODES {
            return Err(self.error("too many nodes"));
        }
        self.stack.push(node);
        Ok(())
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
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
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

    /// `_` is 0, `<n>_` is n + 1.
    fn index(&mut self) -> Result<usize> {
        if self.next_if(b'_') {
            return Ok(0);
        }
        let n = self.natural().ok_or_else(|| self.error("expected index"))?;
        if !self.next_if(b'_') {
            return Err(self.error("unterminated index"));
        }
        n.checked_add(1).ok_or_else(|| self.error("index overflow"))
    }

    fn operator(&mut self) -> Result<Node> {
        let c = self.next()?;
        match c {
            0x01..=0x1F => self.symbolic_reference(c),
            b'0'..=b'9' => {
                self.pos -= 1;
                self.identifier()
            }
            b'A' => self.multi_substitution(),
            b'B' => self.builtin(),
            b'C' => self.nominal(NameKind::Class),
            b'V' => self.nominal(NameKind::Struct),
            b'O' => self.nominal(NameKind::Enum),
            b'P' => self.nominal(NameKind::Protocol),
            b'D' => self.with_role(SymbolRole::TypeMangling),
            b'N' => self.with_role(SymbolRole::TypeMetadata),
            b'M' => self.metadata_marker(),
            b'F' => self.function_entity(),
            b'G' => self.bound_generic(),
            b'K' => Ok(Node::Throws),
            b'S' => self.standard(),
            b'X' => self.special_type(),
            b'Y' => match self.next()? {
                b'a' => Ok(Node::Async),
                b'b' => Ok(Node::Sendable),
                other => Err(self.error(format!("unsupported annotation Y{}", other as char))),
            },
            b'_' => Ok(Node::FirstElement),
            b'c' => {
                let (signature, depth) = self.pop_function_signature()?;
                Ok(Node::ty(DemangledName::function_type(signature), depth))
            }
            b'p' => self.existential(),
            b'q' => self.generic_parameter(),
            b'x' => Ok(Node::ty(DemangledName::generic_parameter(0, 0), 1)),
            b's' => Ok(Node::Module("Swift".to_string())),
            b't' => self.tuple(),
            b'v' => self.variable(),
            b'y' => Ok(Node::EmptyList),
            other => Err(self.error(format!("unsupported operator '{}'", other as char))),
        }
    }

    fn symbolic_reference(&mut self, kind: u8) -> Result<Node> {
        let position = self.base + self.pos - 1;
        let len = if kind <= 0x17 { 4 } else { 8 };
        let payload = self
            .text
            .get(self.pos..self.pos + len)
            .ok_or_else(|| self.error("truncated symbolic reference"))?;
        self.pos += len;

        let resolver = self
            .resolver
            .ok_or_else(|| self.error("symbolic reference without a resolver"))?;
        let name = resolver
            .resolve(kind, position, payload)
            .ok_or_else(|| self.error("unresolvable symbolic reference"))?;

        let node = Node::ty(name, 1);
        self.substitutions.push(node.clone());
        Ok(node)
    }

    fn identifier(&mut self) -> Result<Node> {
        let mut with_words = false;
        if self.next_if(b'0') {
            if self.peek() == Some(b'0') {
                return Err(self.error("punycode identifiers are not supported"));
            }
            with_words = true;
        }

        let mut identifier = String::new();
        loop {
            while with_words && self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                let c = self.next()?;
                let index = if c.is_ascii_lowercase() {
                    (c - b'a') as usize
                } else {
                    with_words = false;
                    (c - b'A') as usize
                };
                let word = self
                    .words
                    .get(index)
                    .ok_or_else(|| self.error("word substitution out of range"))?;
                identifier.push_str(word);
            }
            if self.next_if(b'0') {
                break;
            }

            let len = self
                .natural()
                .filter(|&n| n > 0)
                .ok_or_else(|| self.error("expected identifier length"))?;
            let end = self
                .pos
                .checked_add(len)
                .filter(|&end| end <= self.text.len())
                .ok_or_else(|| self.error("identifier runs past the end"))?;
            let slice = std::str::from_utf8(&self.text[self.pos..end])
                .ok()
                .filter(|s| s.is_ascii())
                .ok_or_else(|| self.error("identifier is not ASCII"))?;
            identifier.push_str(slice);
            self.collect_words(slice);
            self.pos = end;

            if !with_words {
                break;
            }
        }

        let node = Node::Identifier(identifier);
        self.substitutions.push(node.clone());
        Ok(node)
    }

    fn collect_words(&mut self, slice: &str) {
        let bytes = slice.as_bytes();
        let mut word_start: Option<usize> = None;
        for idx in 0..=bytes.len() {
            let c = bytes.get(idx).copied().unwrap_or(0);
            if let Some(start) = word_start {
                if is_word_end(c, bytes[idx - 1]) {
                    if idx - start >= 2 && self.words.len() < MAX_WORDS {
                        self.words.push(slice[start..idx].to_string());
                    }
                    word_start = None;
                }
            }
            if word_start.is_none() && is_word_start(c) {
                word_start = Some(idx);
            }
        }
    }

    fn substitution(&self, index: usize) -> Result<Node> {
        self.substitutions
            .get(index)
            .cloned()
            .ok_or_else(|| self.error(format!("substitution {} out of range", index)))
    }

    fn multi_substitution(&mut self) -> Result<Node> {
        let mut repeat: Option<usize> = None;
        loop {
            let c = self.next()?;
            if c.is_ascii_lowercase() {
                let node = self.substitution((c - b'a') as usize)?;
                self.push_repeated(node, repeat.unwrap_or(1))?;
                repeat = None;
                continue;
            }
            if c.is_ascii_uppercase() {
                let node = self.substitution((c - b'A') as usize)?;
                let count = repeat.unwrap_or(1);
                self.push_repeated(node.clone(), count.saturating_sub(1))?;
                return Ok(node);
            }
            if c == b'_' {
                let index = repeat.map_or(26, |n| n + 27);
                return self.substitution(index);
            }
            self.pos -= 1;
            let n = self
                .natural()
                .ok_or_else(|| self.error("malformed substitution"))?;
            if n > MAX_REPEAT {
                return Err(self.error("substitution repeat count too large"));
            }
            repeat = Some(n);
        }
    }

    fn push_repeated(&mut self, node: Node, count: usize) -> Result<()> {
        for _ in 0..count {
            self.push(node.clone())?;
        }
        Ok(())
    }

    fn builtin(&mut self) -> Result<Node> {
        let name = match self.next()? {
            b'o' => "NativeObject".to_string(),
            b'O' => "UnknownObject".to_string(),
            b'b' => "BridgeObject".to_string(),
            b'p' => "RawPointer".to_string(),
            b'w' => "Word".to_string(),
            c @ (b'i' | b'f') => {
                let bits = self
                    .natural()
                    .ok_or_else(|| self.error("expected builtin width"))?;
                if !self.next_if(b'_') {
                    return Err(self.error("unterminated builtin width"));
                }
                let base = if c == b'i' { "Int" } else { "FPIEEE" };
                format!("{}{}", base, bits)
            }
            other => return Err(self.error(format!("unsupported builtin B{}", other as char))),
        };
        Ok(Node::ty(
            DemangledName::nominal(Some("Builtin".to_string()), Vec::new(), name, NameKind::Struct),
            1,
        ))
    }

    fn pop(&mut self) -> Option<Node> {
        self.stack.pop()
    }

    fn pop_if(&mut self, pred: impl Fn(&Node) -> bool) -> Option<Node> {
        if self.stack.last().is_some_and(pred) {
            self.stack.pop()
        } else {
            None
        }
    }

    fn pop_type(&mut self) -> Result<(DemangledName, usize)> {
        match self.pop_if(|n| matches!(n, Node::Type { .. })) {
            Some(Node::Type { name, depth }) => Ok((name, depth)),
            _ => Err(self.error("expected a type")),
        }
    }

    fn pop_identifier(&mut self) -> Result<String> {
        match self.pop_if(|n| matches!(n, Node::Identifier(_))) {
            Some(Node::Identifier(text)) => Ok(text),
            _ => Err(self.error("expected an identifier")),
        }
    }

    /// Module, or the nominal type enclosing the next declaration.
    fn pop_context(&mut self) -> Result<(Option<String>, Vec<String>, usize)> {
        match self.pop() {
            Some(Node::Module(module)) | Some(Node::Identifier(module)) => {
                Ok((Some(module), Vec::new(), 0))
            }
            Some(Node::Type { name, depth })
                if matches!(
                    name.kind,
                    NameKind::Struct | NameKind::Class | NameKind::Enum | NameKind::Protocol
                ) =>
            {
                let mut context = name.context;
                context.push(name.type_name);
                Ok((name.module, context, depth))
            }
            Some(Node::Entity { .. }) => Err(self.error("local declarations are not supported")),
            _ => Err(self.error("expected a context")),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<usize> {
        if depth > MAX_NESTING {
            return Err(self.error("type nesting too deep"));
        }
        Ok(depth)
    }

    fn nominal(&mut self, kind: NameKind) -> Result<Node> {
        let name = self.pop_identifier()?;
        let (module, context, depth) = self.pop_context()?;
        let depth = self.check_depth(depth + 1)?;
        let node = Node::ty(DemangledName::nominal(module, context, name, kind), depth);
        self.substitutions.push(node.clone());
        Ok(node)
    }

    fn standard(&mut self) -> Result<Node> {
        match self.next()? {
            b'o' => Ok(Node::Module("__C".to_string())),
            b'C' => Ok(Node::Module("__C_Synthesized".to_string())),
            b'g' => {
                let (wrapped, depth) = self.pop_type()?;
                let depth = self.check_depth(depth + 1)?;
                let optional = DemangledName::swift("Optional", NameKind::Enum)
                    .with_generic_arguments(vec![wrapped]);
                let node = Node::ty(optional, depth);
                self.substitutions.push(node.clone());
                Ok(node)
            }
            b'c' => Err(self.error("concurrency substitutions are not supported")),
            c if c.is_ascii_digit() => {
                self.pos -= 1;
                let count = self
                    .natural()
                    .filter(|&n| n <= MAX_REPEAT)
                    .ok_or_else(|| self.error("malformed standard substitution"))?;
                let node = self.standard_entry()?;
                self.push_repeated(node.clone(), count.saturating_sub(1))?;
                Ok(node)
            }
            _ => {
                self.pos -= 1;
                self.standard_entry()
            }
        }
    }

    fn standard_entry(&mut self) -> Result<Node> {
        let c = self.next()?;
        let (name, kind) =
            standard_type(c).ok_or_else(|| self.error(format!("unknown standard type S{}", c as char)))?;
        Ok(Node::ty(DemangledName::swift(name, kind), 1))
    }

    fn special_type(&mut self) -> Result<Node> {
        match self.next()? {
            // Reference storage only changes how the slot is read, not the type.
            b'w' | b'o' | b'u' => {
                let (name, depth) = self.pop_type()?;
                Ok(Node::ty(name, depth))
            }
            // `yXl`: class-constrained composition with no protocols.
            b'l' => {
                self.pop_if(|n| matches!(n, Node::EmptyList));
                Ok(Node::ty(
                    DemangledName::nominal(None, Vec::new(), "AnyObject", NameKind::Protocol),
                    1,
                ))
            }
            other => Err(self.error(format!("unsupported type X{}", other as char))),
        }
    }

    fn with_role(&mut self, role: SymbolRole) -> Result<Node> {
        let (name, depth) = self.pop_type()?;
        Ok(Node::ty(name.with_role(role), depth))
    }

    fn metadata_marker(&mut self) -> Result<Node> {
        let role = match self.next()? {
            b'n' => SymbolRole::NominalTypeDescriptor,
            b'a' => SymbolRole::MetadataAccessor,
            b'f' => SymbolRole::FullMetadata,
            b'm' => SymbolRole::Metaclass,
            b'V' => {
                return match self.pop_if(|n| matches!(n, Node::Entity { .. })) {
                    Some(Node::Entity { name, depth }) if name.kind == NameKind::Variable => Ok(
                        Node::Entity {
                            name: name.with_role(SymbolRole::PropertyDescriptor),
                            depth,
                        },
                    ),
                    _ => Err(self.error("property descriptor without a variable")),
                }
            }
            other => return Err(self.error(format!("unsupported marker M{}", other as char))),
        };
        self.with_role(role)
    }

    fn bound_generic(&mut self) -> Result<Node> {
        // Innermost argument list first.
        let mut lists: Vec<Vec<DemangledName>> = Vec::new();
        let mut depth = 0;
        loop {
            let mut list = Vec::new();
            while let Some(Node::Type { name, depth: d }) =
                self.pop_if(|n| matches!(n, Node::Type { .. }))
            {
                depth = depth.max(d);
                list.push(name);
            }
            list.reverse();
            lists.push(list);

            if self.pop_if(|n| matches!(n, Node::EmptyList)).is_some() {
                break;
            }
            if self.pop_if(|n| matches!(n, Node::FirstElement)).is_none() {
                return Err(self.error("malformed generic argument list"));
            }
        }

        let (nominal, nominal_depth) = self.pop_type()?;
        if !matches!(
            nominal.kind,
            NameKind::Struct | NameKind::Class | NameKind::Enum | NameKind::Unknown
        ) || !nominal.generic_arguments.is_empty()
        {
            return Err(self.error("generic arguments applied to a non-nominal type"));
        }

        let arguments: Vec<DemangledName> = lists.into_iter().rev().flatten().collect();
        let depth = self.check_depth(depth.max(nominal_depth) + 1)?;
        let node = Node::ty(nominal.with_generic_arguments(arguments), depth);
        self.substitutions.push(node.clone());
        Ok(node)
    }

    fn tuple(&mut self) -> Result<Node> {
        let mut elements = Vec::new();
        let mut labels = Vec::new();
        let mut depth = 0;

        if self.pop_if(|n| matches!(n, Node::EmptyList)).is_none() {
            loop {
                let first = self.pop_if(|n| matches!(n, Node::FirstElement)).is_some();
                let label = match self.pop_if(|n| matches!(n, Node::Identifier(_))) {
                    Some(Node::Identifier(label)) => Some(label),
                    _ => None,
                };
                let (ty, d) = self.pop_type()?;
                depth = depth.max(d);
                elements.push(ty);
                labels.push(label);
                if first {
                    break;
                }
            }
            elements.reverse();
            labels.reverse();
        }

        let depth = self.check_depth(depth + 1)?;
        Ok(Node::ty(DemangledName::tuple(elements, labels), depth))
    }

    fn existential(&mut self) -> Result<Node> {
        let mut protocols = Vec::new();
        loop {
            if self.pop_if(|n| matches!(n, Node::EmptyList)).is_some() {
                break;
            }
            let first = self.pop_if(|n| matches!(n, Node::FirstElement)).is_some();
            let (protocol, _) = self.pop_type()?;
            protocols.push(protocol);
            if first {
                break;
            }
        }
        protocols.reverse();

        let name = match protocols.len() {
            0 => DemangledName::nominal(None, Vec::new(), "Any", NameKind::Protocol),
            1 => protocols.remove(0),
            _ => {
                let names: Vec<String> = protocols.iter().map(|p| p.qualified_name()).collect();
                DemangledName::nominal(None, Vec::new(), names.join(" & "), NameKind::Protocol)
            }
        };
        Ok(Node::ty(name, 1))
    }

    fn generic_parameter(&mut self) -> Result<Node> {
        let (depth, index) = if self.next_if(b'd') {
            let depth = self.index()?.saturating_add(1);
            (depth, self.index()?)
        } else if self.next_if(b'z') {
            (0, 0)
        } else {
            (0, self.index()?.saturating_add(1))
        };
        let depth = u32::try_from(depth).map_err(|_| self.error("generic depth overflow"))?;
        let index = u32::try_from(index).map_err(|_| self.error("generic index overflow"))?;
        Ok(Node::ty(DemangledName::generic_parameter(depth, index), 1))
    }

    fn pop_params(&mut self) -> Result<(DemangledName, usize)> {
        if self.pop_if(|n| matches!(n, Node::EmptyList)).is_some() {
            return Ok((DemangledName::tuple(Vec::new(), Vec::new()), 1));
        }
        self.pop_type()
    }

    fn pop_function_signature(&mut self) -> Result<(FunctionSignature, usize)> {
        let mut throws = false;
        let mut is_async = false;
        while let Some(node) =
            self.pop_if(|n| matches!(n, Node::Throws | Node::Async | Node::Sendable))
        {
            match node {
                Node::Throws => throws = true,
                Node::Async => is_async = true,
                _ => {}
            }
        }

        let (params, params_depth) = self.pop_params()?;
        let (result, result_depth) = self.pop_params()?;

        let parameters = if params.kind == NameKind::Tuple {
            params
                .generic_arguments
                .into_iter()
                .zip(params.element_labels.into_iter().chain(std::iter::repeat(None)))
                .map(|(ty, label)| Parameter { label, ty })
                .collect()
        } else {
            vec![Parameter {
                label: None,
                ty: params,
            }]
        };

        let depth = self.check_depth(params_depth.max(result_depth) + 1)?;
        Ok((
            FunctionSignature {
                parameters,
                result: Box::new(result),
                is_async,
                throws,
            },
            depth,
        ))
    }

    fn function_entity(&mut self) -> Result<Node> {
        let (mut signature, depth) = self.pop_function_signature()?;

        if self.pop_if(|n| matches!(n, Node::EmptyList)).is_none() {
            let mut labels = Vec::with_capacity(signature.parameters.len());
            for _ in 0..signature.parameters.len() {
                match self.pop_if(|n| matches!(n, Node::Identifier(_) | Node::FirstElement)) {
                    Some(Node::Identifier(label)) => labels.push(Some(label)),
                    Some(_) => labels.push(None),
                    None => return Err(self.error("missing argument label")),
                }
            }
            labels.reverse();
            for (param, label) in signature.parameters.iter_mut().zip(labels) {
                param.label = label;
            }
        } else {
            for param in signature.parameters.iter_mut() {
                param.label = None;
            }
        }

        let name = self.pop_identifier()?;
        let (module, context, ctx_depth) = self.pop_context()?;
        let mut function = DemangledName::nominal(module, context, name, NameKind::Function);
        function.function_signature = Some(signature);
        Ok(Node::Entity {
            name: function,
            depth: depth.max(ctx_depth) + 1,
        })
    }

    fn variable(&mut self) -> Result<Node> {
        let (ty, depth) = self.pop_type()?;
        let name = self.pop_identifier()?;
        let (module, context, ctx_depth) = self.pop_context()?;
        let variable = DemangledName::variable(module, context, name, ty);

        let variable = match self.next()? {
            b'p' => variable,
            b'g' => variable.with_role(SymbolRole::Getter),
            b's' => variable.with_role(SymbolRole::Setter),
            other => return Err(self.error(format!("unsupported accessor v{}", other as char))),
        };
        Ok(Node::Entity {
            name: variable,
            depth: depth.max(ctx_depth) + 1,
        })
    }
}

fn is_word_start(c: u8) -> bool {
    !c.is_ascii_digit() && c != b'_' && c != 0
}

fn is_word_end(c: u8, prev: u8) -> bool {
    c == b'_' || c == 0 || (!prev.is_ascii_uppercase() && c.is_ascii_uppercase())
}

/// Parse a postfix symbol body.
pub fn parse_symbol(body: &str, base: usize) -> Result<DemangledName> {
    Parser::new(body.as_bytes(), base).parse()
}

/// Parse a prefix-less type mangling, resolving symbolic references through `resolver`.
pub fn parse_type(raw: &[u8], resolver: Option<&dyn SymbolicResolver>) -> Result<DemangledName> {
    let mut parser = Parser::new(raw, 0);
    if let Some(resolver) = resolver {
        parser = parser.with_resolver(resolver);
    }
    let name = parser.parse()?;
    let is_entity =
        matches!(name.kind, NameKind::Function | NameKind::Variable) && !name.type_name.is_empty();
    if name.role.is_some() || is_entity {
        return Err(Error::unsupported_grammar(raw.len(), "not a type mangling"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<DemangledName> {
        parse_symbol(body, 2)
    }

    #[test]
    fn test_standard_types() {
        let int = parse("SiD").unwrap();
        assert_eq!(int.to_string(), "Swift.Int");
        assert_eq!(int.role, Some(SymbolRole::TypeMangling));

        let array = parse("SaySiGD").unwrap();
        assert_eq!(array.to_string(), "Swift.Array<Swift.Int>");
        assert_eq!(array.kind, NameKind::Struct);
    }

    #[test]
    fn test_nested_nominal() {
        let name = parse("4main5OuterV5InnerCD").unwrap();
        assert_eq!(name.module.as_deref(), Some("main"));
        assert_eq!(name.context, vec!["Outer".to_string()]);
        assert_eq!(name.type_name, "Inner");
        assert_eq!(name.kind, NameKind::Class);
    }

    #[test]
    fn test_generic_argument_order() {
        let name = parse("SDySSSiGD").unwrap();
        assert_eq!(name.to_string(), "Swift.Dictionary<Swift.String, Swift.Int>");

        let name = parse("4main4PairVySiSSGD").unwrap();
        let args: Vec<String> = name.generic_arguments.iter().map(|a| a.to_string()).collect();
        assert_eq!(args, vec!["Swift.Int", "Swift.String"]);
    }

    #[test]
    fn test_nested_generic_lists_flatten_outer_first() {
        // Outer<Int>.Inner<String>
        let name = parse("4main5OuterV5InnerVySi_SSGD").unwrap();
        let args: Vec<String> = name.generic_arguments.iter().map(|a| a.to_string()).collect();
        assert_eq!(args, vec!["Swift.Int", "Swift.String"]);
        assert_eq!(name.qualified_name(), "main.Outer.Inner");
    }

    #[test]
    fn test_substitutions() {
        // SwiftUI.ModifiedContent<SwiftUI.Text, SwiftUI._PaddingLayout>
        let name = parse("7SwiftUI15ModifiedContentVyAA4TextVAA14_PaddingLayoutVGD").unwrap();
        assert_eq!(
            name.to_string(),
            "SwiftUI.ModifiedContent<SwiftUI.Text, SwiftUI._PaddingLayout>"
        );
    }

    #[test]
    fn test_word_substitution() {
        // Words so far: main, Hosting, View.
        let name = parse("4main11HostingViewC0B10ControllerCD").unwrap();
        assert_eq!(name.type_name, "HostingController");
        assert_eq!(name.context, vec!["HostingView".to_string()]);

        // Lowercase words continue, `0` terminates.
        let name = parse("4main11HostingViewC0bC0VD").unwrap();
        assert_eq!(name.type_name, "HostingView");
        assert_eq!(name.context, vec!["HostingView".to_string()]);

        assert!(parse("4main11HostingViewC0zVD").is_err());
    }

    #[test]
    fn test_optional_sugar_and_tuple() {
        let name = parse("SiSgD").unwrap();
        assert!(name.is_optional());
        assert_eq!(name.readable_name(), "Int?");

        let tuple = parse("Si1x_SS1ytD").unwrap();
        assert_eq!(tuple.to_string(), "(x: Swift.Int, y: Swift.String)");

        let empty = parse("ytD").unwrap();
        assert_eq!(empty.to_string(), "()");
    }

    #[test]
    fn test_function_type() {
        let name = parse("SSSiYaKcD").unwrap();
        assert_eq!(name.to_string(), "(Swift.Int) async throws -> Swift.String");
    }

    #[test]
    fn test_function_entity_labels() {
        let name = parse("4main3add1xS2iF").unwrap();
        assert_eq!(name.to_string(), "main.add(x: Swift.Int) -> Swift.Int");

        let name = parse("4main1f_1bySi_SitF").unwrap();
        assert_eq!(name.to_string(), "main.f(Swift.Int, b: Swift.Int) -> ()");

        let name = parse("4main3fooyyF").unwrap();
        assert_eq!(name.to_string(), "main.foo() -> ()");
    }

    #[test]
    fn test_variable_accessors() {
        let getter = parse("4main7CounterV5countSivg").unwrap();
        assert_eq!(getter.to_string(), "main.Counter.count.getter : Swift.Int");

        let descriptor = parse("4main7CounterV5countSivpMV").unwrap();
        assert_eq!(descriptor.role, Some(SymbolRole::PropertyDescriptor));
    }

    #[test]
    fn test_metadata_roles() {
        assert_eq!(
            parse("4main3FooCN").unwrap().role,
            Some(SymbolRole::TypeMetadata)
        );
        assert_eq!(
            parse("4main3FooVMn").unwrap().role,
            Some(SymbolRole::NominalTypeDescriptor)
        );
        assert!(parse("4main3FooVMq").is_err());
    }

    #[test]
    fn test_imported_module() {
        let name = parse("So7CGPointVD").unwrap();
        assert_eq!(name.qualified_name(), "__C.CGPoint");

        let any = parse("yXlSgD").unwrap();
        assert_eq!(any.readable_name(), "AnyObject?");
    }

    #[test]
    fn test_rejects_leftovers_and_garbage() {
        assert!(matches!(
            parse("4main3FooVSi"),
            Err(Error::UnsupportedGrammar { .. })
        ));
        assert!(parse("4main").is_err());
        assert!(parse("99main").is_err());
        assert!(parse("004main").is_err());
        assert!(parse("ScTD").is_err());
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let body = format!("Si{}D", "Sg".repeat(200));
        assert!(parse(&body).is_err());
    }

    struct FixedResolver;

    impl SymbolicResolver for FixedResolver {
        fn resolve(&self, kind: u8, position: usize, payload: &[u8]) -> Option<DemangledName> {
            (kind == 0x01 && position == 0 && payload.len() == 4).then(|| {
                DemangledName::nominal(Some("main".into()), Vec::new(), "Node", NameKind::Class)
            })
        }
    }

    #[test]
    fn test_symbolic_reference() {
        let raw = [0x01, 0x10, 0x00, 0x00, 0x00, b'S', b'g'];
        let name = parse_type(&raw, Some(&FixedResolver)).unwrap();
        assert_eq!(name.to_string(), "Swift.Optional<main.Node>");

        assert!(parse_type(&raw, None).is_err());
    }

    #[test]
    fn test_generic_parameters() {
        assert_eq!(
            parse_type(b"x", None).unwrap().as_generic_parameter(),
            Some((0, 0))
        );
        assert_eq!(
            parse_type(b"q_", None).unwrap().as_generic_parameter(),
            Some((0, 1))
        );
        let array = parse_type(b"SayxG", None).unwrap();
        assert_eq!(array.generic_arguments[0].as_generic_parameter(), Some((0, 0)));
    }
}
