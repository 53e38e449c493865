//! Output renderers for descriptions

use crate::inspector::Description;
use lens_core::{MemberKind, Result, SyntheticMember, TypeKind};
use serde::Serialize;
use std::fmt::Write;

/// JSON form of a [`Description`]
#[derive(Debug, Serialize)]
pub struct DescriptionJson {
    pub address: String,
    pub readable_type_name: String,
    pub type_name: String,
    pub kind: TypeKind,
    pub enhanced_description: String,
    pub members: Vec<MemberJson>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inheritance: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<Vec<DescriptionJson>>,
}

#[derive(Debug, Serialize)]
pub struct MemberJson {
    pub name: String,
    pub kind: MemberKind,
    pub encoded_type: String,
    pub type_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
    pub representable: bool,
    pub field: String,
    pub offset: u64,
}

impl From<&SyntheticMember> for MemberJson {
    fn from(member: &SyntheticMember) -> Self {
        Self {
            name: member.name.clone(),
            kind: member.kind,
            encoded_type: member.encoded_type.clone(),
            type_label: member.type_label.clone(),
            attributes: member.attributes.clone(),
            representable: member.representable,
            field: member.source_field.name.clone(),
            offset: member.source_field.byte_offset,
        }
    }
}

impl DescriptionJson {
    pub fn from_description(description: &Description) -> Self {
        Self {
            address: description.address.to_string(),
            readable_type_name: description.readable_type_name.clone(),
            type_name: description.type_name.clone(),
            kind: description.kind,
            enhanced_description: description.enhanced_description.clone(),
            members: description.synthetic_members.iter().map(MemberJson::from).collect(),
            inheritance: description.inheritance.clone(),
            hierarchy: description
                .hierarchy
                .as_ref()
                .map(|children| children.iter().map(Self::from_description).collect()),
        }
    }
}

/// Pretty JSON for `description` and its children
pub fn render_json(description: &Description) -> Result<String> {
    Ok(serde_json::to_string_pretty(&DescriptionJson::from_description(description))?)
}

/// Indented text tree, one line per object followed by its properties
pub fn render_tree(description: &Description) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", headline(description));
    write_body(&mut out, description, "");
    out
}

fn headline(description: &Description) -> String {
    format!(
        "{} ({}) @ {}",
        description.readable_type_name, description.kind, description.address
    )
}

fn write_body(out: &mut String, description: &Description, prefix: &str) {
    let properties: Vec<&SyntheticMember> = description
        .synthetic_members
        .iter()
        .filter(|m| m.kind == MemberKind::Property)
        .collect();
    let children = description.hierarchy.as_deref().unwrap_or_default();
    let total = properties.len() + children.len();

    for (i, property) in properties.iter().enumerate() {
        let branch = if i + 1 == total { "└─" } else { "├─" };
        let encoding = if property.representable {
            property.encoded_type.as_str()
        } else {
            "?"
        };
        let _ = writeln!(
            out,
            "{}{} {}: {} [{}]",
            prefix, branch, property.name, property.type_label, encoding
        );
    }

    for (i, child) in children.iter().enumerate() {
        let last = properties.len() + i + 1 == total;
        let (branch, indent) = if last { ("└─", "   ") } else { ("├─", "│  ") };
        let _ = writeln!(out, "{}{} {}", prefix, branch, headline(child));
        write_body(out, child, &format!("{}{}", prefix, indent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::{Address, BuiltinType, FieldRecord, FieldTypeRef, ReferenceStorage, TypeIdentity};

    fn property(name: &str) -> SyntheticMember {
        SyntheticMember {
            name: name.to_string(),
            encoded_type: "q".to_string(),
            kind: MemberKind::Property,
            source_field: FieldRecord {
                name: name.to_string(),
                index: 0,
                type_ref: FieldTypeRef::Builtin(BuiltinType::Int),
                mangled_type_name: "Si".to_string(),
                byte_offset: 16,
                storage: ReferenceStorage::Strong,
                is_weak: false,
                is_reference: false,
                is_var: true,
                is_indirect: false,
                owner: TypeIdentity::Metadata(Address(0x100)),
            },
            type_label: "Int".to_string(),
            attributes: Some(format!("Tq,N,V{}", name)),
            representable: true,
        }
    }

    fn description(name: &str, members: Vec<SyntheticMember>, hierarchy: Option<Vec<Description>>) -> Description {
        Description {
            address: Address(0x1000),
            readable_type_name: name.to_string(),
            type_name: format!("main.{}", name),
            kind: TypeKind::Class,
            enhanced_description: format!("{}()", name),
            synthetic_members: members,
            inheritance: Vec::new(),
            hierarchy,
        }
    }

    #[test]
    fn test_render_tree() {
        let child = description("Leaf", vec![property("id")], None);
        let root = description("Root", vec![property("count")], Some(vec![child]));
        let tree = render_tree(&root);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Root (class) @ 0x1000",
                "├─ count: Int [q]",
                "└─ Leaf (class) @ 0x1000",
                "   └─ id: Int [q]",
            ]
        );
    }

    #[test]
    fn test_render_json() {
        let root = description("Root", vec![property("count")], None);
        let json = render_json(&root).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type_name"], "main.Root");
        assert_eq!(value["kind"], "Class");
        assert_eq!(value["members"][0]["attributes"], "Tq,N,Vcount");
        assert_eq!(value["members"][0]["offset"], 16);
        assert!(value.get("hierarchy").is_none());
        assert!(value.get("inheritance").is_none());
    }
}
