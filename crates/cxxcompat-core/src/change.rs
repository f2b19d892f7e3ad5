use crate::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compatibility tier, ordered from harmless to unverifiable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Neutral,
    SourceBreak,
    BinaryBreak,
    Unknown,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::Neutral,
        Tier::SourceBreak,
        Tier::BinaryBreak,
        Tier::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Neutral => "neutral",
            Tier::SourceBreak => "source_break",
            Tier::BinaryBreak => "binary_break",
            Tier::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "neutral" => Ok(Tier::Neutral),
            "source_break" | "source" => Ok(Tier::SourceBreak),
            "binary_break" | "binary" => Ok(Tier::BinaryBreak),
            "unknown" => Ok(Tier::Unknown),
            other => Err(format!(
                "Invalid tier: {}. Must be one of: neutral, source_break, binary_break, unknown",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Removed,
    SymbolRemoved,
    Added,
    DeletedOverloadAdded,
    PureVirtualAdded,
    VtableLayoutChanged,
    LayoutChanged,
    VirtualityChanged,
    BecamePureVirtual,
    NoLongerPureVirtual,
    OverrideSpecifierChanged,
    FinalSpecifierChanged,
    DefaultArgumentAdded,
    DefaultArgumentAmbiguity,
    DefaultArgumentRemoved,
    DefaultArgumentChanged,
    NoexceptTightened,
    NoexceptLoosened,
    NoexceptConditionChanged,
    ExplicitAdded,
    ExplicitRemoved,
    BecameDeleted,
    NoLongerDeleted,
    DefaultedChanged,
    ReturnTypeChanged,
    ObjectQualifierChanged,
    StaticChanged,
    LinkageChanged,
    TemplateDefaultRemoved,
    TemplateDefaultAdded,
    TemplateDefaultChanged,
    TemplateParameterChanged,
    FieldTypeChanged,
    BitfieldChanged,
    FieldOrderChanged,
    BasesChanged,
    BaseAccessNarrowed,
    ClassBecameFinal,
    ClassNoLongerFinal,
    ClassKeyChanged,
    AccessNarrowed,
    AccessWidened,
    VariableTypeChanged,
    ConstantValueChanged,
    EnumeratorRemoved,
    EnumeratorValueChanged,
    EnumeratorAdded,
    EnumUnderlyingTypeChanged,
    EnumScopeChanged,
    AliasTargetChanged,
    AttributesChanged,
    UnverifiableFacet,
    AmbiguousMatch,
    UnparsedRegion,
}

impl ChangeKind {
    /// Kinds whose verdict is "cannot verify"; policy may never lower them.
    pub fn is_unverifiable(self) -> bool {
        matches!(
            self,
            ChangeKind::UnverifiableFacet | ChangeKind::AmbiguousMatch | ChangeKind::UnparsedRegion
        )
    }

    pub fn as_str(self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", self))
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// One classified difference between two surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub qualified_name: String,
    /// Identity key of the entity (old side when it exists).
    pub key: String,
    pub kind: ChangeKind,
    pub tier: Tier,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_facets: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ambiguous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}
