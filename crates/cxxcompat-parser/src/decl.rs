//! Declaration tree exchanged between a front-end and the surface extractor.
//!
//! A front-end reports syntax, not meaning: names as spelled, types as
//! written, specifiers as raw tokens. Interpreting them is the extractor's
//! job, so any front-end able to produce this tree (the bundled tree-sitter
//! one, or a clang plugin emitting JSON) feeds the same core.

use cxxcompat_core::{Access, SourceLocation};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    TranslationUnit,
    Namespace,
    Class,
    Struct,
    Union,
    /// Free function, method, constructor or destructor; the extractor
    /// decides which from context.
    Function,
    Field,
    Variable,
    Enum,
    TypeAlias,
    /// Region the front-end could not parse.
    Unparsed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParamDecl {
    /// Parameter type as written, without the parameter name.
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemplateParamDeclKind {
    Type,
    NonType,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateParamDecl {
    pub kind: TemplateParamDeclKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Type of a non-type parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub is_pack: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BaseDecl {
    pub name: String,
    /// Explicit access; defaults follow the class key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(default)]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnumeratorDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeclNode {
    pub kind: DeclKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Access in effect at the declaration, as tracked by the front-end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    /// Leading declaration specifiers (`virtual`, `static`, `explicit`,
    /// `inline`, `constexpr`, `mutable`, `friend`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specifiers: Vec<String>,
    /// Tokens after a function's parameter list (`const`, `&&`,
    /// `noexcept(expr)`, `override`, `final`, `= 0`, `= delete`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trailing: Vec<String>,
    /// Field/variable type, function return type, alias target or enum base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_params: Option<Vec<TemplateParamDecl>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<BaseDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enumerators: Vec<EnumeratorDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<String>,
    /// Attributes as written: `[[nodiscard]]`, `__attribute__((pure))`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub has_body: bool,
    /// Fragments inside this declaration the front-end failed to parse.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unparsed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DeclNode>,
}

impl DeclNode {
    pub fn new(kind: DeclKind) -> Self {
        Self {
            kind,
            name: None,
            location: None,
            access: None,
            specifiers: Vec::new(),
            trailing: Vec::new(),
            ty: None,
            params: Vec::new(),
            variadic: false,
            template_params: None,
            bases: Vec::new(),
            enumerators: Vec::new(),
            initializer: None,
            bit_width: None,
            attributes: Vec::new(),
            has_body: false,
            unparsed: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn translation_unit(children: Vec<DeclNode>) -> Self {
        Self::new(DeclKind::TranslationUnit).with_children(children)
    }

    pub fn named(kind: DeclKind, name: impl Into<String>) -> Self {
        let mut node = Self::new(kind);
        node.name = Some(name.into());
        node
    }

    pub fn namespace(name: impl Into<String>, children: Vec<DeclNode>) -> Self {
        Self::named(DeclKind::Namespace, name).with_children(children)
    }

    pub fn record(kind: DeclKind, name: impl Into<String>, children: Vec<DeclNode>) -> Self {
        Self::named(kind, name).with_children(children)
    }

    pub fn function(name: impl Into<String>, return_type: Option<&str>) -> Self {
        let mut node = Self::named(DeclKind::Function, name);
        node.ty = return_type.map(str::to_string);
        node
    }

    pub fn field(name: impl Into<String>, ty: impl Into<String>) -> Self {
        let mut node = Self::named(DeclKind::Field, name);
        node.ty = Some(ty.into());
        node
    }

    pub fn with_children(mut self, children: Vec<DeclNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    pub fn with_param(mut self, ty: impl Into<String>, default: Option<&str>) -> Self {
        self.params.push(ParamDecl {
            ty: ty.into(),
            name: None,
            default: default.map(str::to_string),
        });
        self
    }

    pub fn with_specifier(mut self, specifier: impl Into<String>) -> Self {
        self.specifiers.push(specifier.into());
        self
    }

    pub fn with_trailing(mut self, token: impl Into<String>) -> Self {
        self.trailing.push(token.into());
        self
    }

    pub fn with_template(mut self, params: Vec<TemplateParamDecl>) -> Self {
        self.template_params = Some(params);
        self
    }

    pub fn with_base(mut self, name: impl Into<String>, access: Option<Access>) -> Self {
        self.bases.push(BaseDecl {
            name: name.into(),
            access,
            is_virtual: false,
        });
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn with_body(mut self) -> Self {
        self.has_body = true;
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

impl TemplateParamDecl {
    pub fn type_param(name: impl Into<String>) -> Self {
        Self {
            kind: TemplateParamDeclKind::Type,
            name: Some(name.into()),
            ty: None,
            default: None,
            is_pack: false,
        }
    }

    pub fn non_type(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            kind: TemplateParamDeclKind::NonType,
            name: Some(name.into()),
            ty: Some(ty.into()),
            default: None,
            is_pack: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}
