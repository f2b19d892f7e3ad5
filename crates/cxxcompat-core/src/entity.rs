use crate::{
    Access, CanonicalType, EntityKind, FunctionSignature, SourceLocation, UnknownFacet,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Index of an entity inside the [`Surface`](crate::Surface) that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub usize);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateParamKind {
    Type,
    NonType,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateParam {
    pub kind: TemplateParamKind,
    /// Canonical type of a non-type parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<CanonicalType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub is_pack: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub params: Vec<TemplateParam>,
}

impl TemplateInfo {
    /// Arity and parameter kinds; defaults do not take part.
    pub fn shape(&self) -> Vec<(TemplateParamKind, bool)> {
        self.params.iter().map(|p| (p.kind, p.is_pack)).collect()
    }

    /// Shape as it appears in identity keys: `<typename,auto...>`.
    pub fn shape_key(&self) -> String {
        let parts: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let kind = match p.kind {
                    TemplateParamKind::Type => "typename",
                    TemplateParamKind::NonType => "auto",
                    TemplateParamKind::Template => "template",
                };
                if p.is_pack {
                    format!("{}...", kind)
                } else {
                    kind.to_string()
                }
            })
            .collect();
        format!("<{}>", parts.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseSpec {
    /// Qualified name when it resolves inside the surface, spelling otherwise.
    pub name: String,
    pub access: Access,
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RecordInfo {
    pub bases: Vec<BaseSpec>,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldInfo {
    pub ty: CanonicalType,
    pub is_static: bool,
    pub is_mutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<String>,
    /// Position among the non-static fields of the enclosing record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableInfo {
    pub ty: CanonicalType,
    pub is_constexpr: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Enumerator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EnumInfo {
    pub is_scoped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying: Option<CanonicalType>,
    pub enumerators: Vec<Enumerator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AliasInfo {
    pub target: CanonicalType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "detail")]
pub enum EntityDetail {
    Namespace { is_inline: bool },
    Record(RecordInfo),
    Callable(FunctionSignature),
    Field(FieldInfo),
    Variable(VariableInfo),
    Enum(EnumInfo),
    Alias(AliasInfo),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Identity key, unique within a surface. Qualified name for everything
    /// but callables, which add template shape, parameters and qualifiers.
    pub key: String,
    pub qualified_name: String,
    pub name: String,
    pub kind: EntityKind,
    pub access: Access,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub detail: EntityDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateInfo>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub attributes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_facets: Vec<UnknownFacet>,
    /// Whether a compiled client links against a symbol for this entity.
    pub external_linkage: bool,
}

impl Entity {
    pub fn signature(&self) -> Option<&FunctionSignature> {
        match &self.detail {
            EntityDetail::Callable(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn record(&self) -> Option<&RecordInfo> {
        match &self.detail {
            EntityDetail::Record(info) => Some(info),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&FieldInfo> {
        match &self.detail {
            EntityDetail::Field(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_virtual_method(&self) -> bool {
        self.signature()
            .map(|s| s.virtuality.is_virtual())
            .unwrap_or(false)
    }

    /// Both destructors, or methods with the same name, parameter list and
    /// constness: an override of one replaces the other's vtable entry.
    pub fn shares_slot_with(&self, other: &Entity) -> bool {
        let (Some(a), Some(b)) = (self.signature(), other.signature()) else {
            return false;
        };
        match self.kind {
            EntityKind::Destructor => other.kind == EntityKind::Destructor,
            EntityKind::Method => {
                other.kind == EntityKind::Method
                    && self.name == other.name
                    && a.param_list() == b.param_list()
                    && a.qualifiers.is_const == b.qualifiers.is_const
            }
            _ => false,
        }
    }

    pub fn is_instance_field(&self) -> bool {
        self.field().map(|f| !f.is_static).unwrap_or(false)
    }

    pub fn has_unknown_facets(&self) -> bool {
        !self.unknown_facets.is_empty()
    }

    /// Human readable label used in reports, e.g. `NS1::S::f(int,float)`.
    pub fn display_name(&self) -> &str {
        &self.key
    }
}
