use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Private,
    Protected,
    Public,
}

impl Access {
    pub fn is_visible(self) -> bool {
        !matches!(self, Access::Private)
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "public" => Some(Access::Public),
            "protected" => Some(Access::Protected),
            "private" => Some(Access::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Namespace,
    Class,
    Struct,
    Union,
    Function,
    Method,
    Constructor,
    Destructor,
    Field,
    Variable,
    Enum,
    TypeAlias,
}

/// Entities of different families never correspond across snapshots, even
/// when they share a qualified name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFamily {
    Scope,
    Record,
    Callable,
    Data,
    Enum,
    Alias,
}

impl EntityKind {
    pub fn family(self) -> KindFamily {
        match self {
            EntityKind::Namespace => KindFamily::Scope,
            EntityKind::Class | EntityKind::Struct | EntityKind::Union => KindFamily::Record,
            EntityKind::Function
            | EntityKind::Method
            | EntityKind::Constructor
            | EntityKind::Destructor => KindFamily::Callable,
            EntityKind::Field | EntityKind::Variable => KindFamily::Data,
            EntityKind::Enum => KindFamily::Enum,
            EntityKind::TypeAlias => KindFamily::Alias,
        }
    }

    pub fn is_record(self) -> bool {
        self.family() == KindFamily::Record
    }

    pub fn is_callable(self) -> bool {
        self.family() == KindFamily::Callable
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Namespace => "namespace",
            EntityKind::Class => "class",
            EntityKind::Struct => "struct",
            EntityKind::Union => "union",
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Constructor => "constructor",
            EntityKind::Destructor => "destructor",
            EntityKind::Field => "field",
            EntityKind::Variable => "variable",
            EntityKind::Enum => "enum",
            EntityKind::TypeAlias => "type alias",
        };
        write!(f, "{}", s)
    }
}

/// A fact about an entity that the extractor either modeled or could not.
///
/// `Unknown` keeps the raw text so a report can show what was seen. Two
/// `Unknown` values comparing equal says nothing about the declarations;
/// classification treats them as unverifiable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum Facet<T> {
    Known(T),
    Unknown(String),
}

impl<T> Facet<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Facet::Known(value) => Some(value),
            Facet::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Facet::Unknown(_))
    }
}

impl<T: Default> Default for Facet<T> {
    fn default() -> Self {
        Facet::Known(T::default())
    }
}

/// Named facet the extractor could not represent, attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnknownFacet {
    pub facet: String,
    pub raw: String,
}

impl UnknownFacet {
    pub fn new(facet: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            facet: facet.into(),
            raw: raw.into(),
        }
    }
}

/// Non-fatal findings raised while extracting or matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Diagnostic {
    UnrepresentableFacet {
        name: String,
        facet: String,
        raw: String,
        location: Option<SourceLocation>,
    },
    AmbiguousMatch {
        name: String,
        candidates: Vec<String>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnrepresentableFacet {
                name,
                facet,
                raw,
                location,
            } => {
                write!(f, "{}: cannot represent {} `{}`", name, facet, raw)?;
                if let Some(loc) = location {
                    write!(f, " at {}", loc)?;
                }
                Ok(())
            }
            Diagnostic::AmbiguousMatch { name, candidates } => write!(
                f,
                "{}: ambiguous overload correspondence between {}",
                name,
                candidates.join(" | ")
            ),
        }
    }
}
