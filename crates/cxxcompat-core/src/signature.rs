use crate::{CanonicalType, Facet};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub ty: CanonicalType,
    /// Canonical text of the default argument. Only presence matters for
    /// compatibility; the text is kept so value changes can be reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    pub fn new(ty: CanonicalType) -> Self {
        Self { ty, default: None }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefQualifier {
    #[default]
    None,
    LValue,
    RValue,
}

impl fmt::Display for RefQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefQualifier::None => Ok(()),
            RefQualifier::LValue => f.write_str("&"),
            RefQualifier::RValue => f.write_str("&&"),
        }
    }
}

/// Qualifiers on the implicit object parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectQualifiers {
    pub is_const: bool,
    /// The front-end cannot report `volatile` reliably, so whenever it shows
    /// up the facet is recorded as unknown.
    pub is_volatile: Facet<bool>,
    pub ref_qualifier: RefQualifier,
}

impl ObjectQualifiers {
    /// Suffix used in identity keys: ` const`, ` volatile`, ` &&`, ...
    pub fn key_suffix(&self) -> String {
        let mut out = String::new();
        if self.is_const {
            out.push_str(" const");
        }
        if !matches!(self.is_volatile, Facet::Known(false)) {
            out.push_str(" volatile");
        }
        if self.ref_qualifier != RefQualifier::None {
            out.push(' ');
            out.push_str(&self.ref_qualifier.to_string());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "condition")]
pub enum NoexceptSpec {
    #[default]
    Absent,
    /// `noexcept`, `noexcept(true)` or `throw()`.
    True,
    /// `noexcept(false)`.
    False,
    Conditional(String),
}

/// What a `noexcept` specification means, independent of spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionCategory {
    NonThrowing,
    PotentiallyThrowing,
    Dependent,
}

impl NoexceptSpec {
    pub fn category(&self) -> ExceptionCategory {
        match self {
            NoexceptSpec::True => ExceptionCategory::NonThrowing,
            NoexceptSpec::Absent | NoexceptSpec::False => ExceptionCategory::PotentiallyThrowing,
            NoexceptSpec::Conditional(_) => ExceptionCategory::Dependent,
        }
    }
}

impl fmt::Display for NoexceptSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoexceptSpec::Absent => f.write_str("no exception specification"),
            NoexceptSpec::True => f.write_str("noexcept"),
            NoexceptSpec::False => f.write_str("noexcept(false)"),
            NoexceptSpec::Conditional(expr) => write!(f, "noexcept({})", expr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    #[default]
    NonVirtual,
    Virtual,
    PureVirtual,
}

impl Dispatch {
    pub fn is_virtual(self) -> bool {
        !matches!(self, Dispatch::NonVirtual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Virtuality {
    pub dispatch: Dispatch,
    pub is_override: bool,
    pub is_final: bool,
}

impl Virtuality {
    pub fn is_virtual(&self) -> bool {
        self.dispatch.is_virtual()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionState {
    #[default]
    Normal,
    Deleted,
    Defaulted,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub variadic: bool,
    /// `None` for constructors and destructors.
    pub return_type: Option<CanonicalType>,
    pub qualifiers: ObjectQualifiers,
    pub noexcept: Facet<NoexceptSpec>,
    pub virtuality: Virtuality,
    pub definition: DefinitionState,
    pub is_explicit: Facet<bool>,
    pub is_static: bool,
    pub is_inline: bool,
    pub is_constexpr: bool,
    /// Specifier tokens exactly as the front-end reported them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_specifiers: Vec<String>,
}

impl FunctionSignature {
    /// Parameter list as it appears in identity keys: `(int,const S&)`.
    pub fn param_list(&self) -> String {
        let mut parts: Vec<&str> = self.params.iter().map(|p| p.ty.as_str()).collect();
        if self.variadic {
            parts.push("...");
        }
        format!("({})", parts.join(","))
    }

    /// Number of leading arguments a call must supply.
    pub fn min_arity(&self) -> usize {
        self.params
            .iter()
            .position(|p| p.default.is_some())
            .unwrap_or(self.params.len())
    }

    pub fn param_types(&self) -> Vec<&CanonicalType> {
        self.params.iter().map(|p| &p.ty).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: &[(&str, Option<&str>)]) -> FunctionSignature {
        FunctionSignature {
            params: params
                .iter()
                .map(|(ty, default)| Parameter {
                    ty: CanonicalType::parameter(ty),
                    default: default.map(str::to_string),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn noexcept_spellings_share_categories() {
        assert_eq!(NoexceptSpec::Absent.category(), NoexceptSpec::False.category());
        assert_eq!(NoexceptSpec::True.category(), ExceptionCategory::NonThrowing);
        assert_eq!(
            NoexceptSpec::Conditional("Toto".into()).category(),
            ExceptionCategory::Dependent
        );
    }

    #[test]
    fn min_arity_stops_at_first_default() {
        assert_eq!(sig(&[("int", None), ("float", None)]).min_arity(), 2);
        assert_eq!(sig(&[("double", Some("12.5"))]).min_arity(), 0);
        assert_eq!(sig(&[("int", None), ("int", Some("1"))]).min_arity(), 1);
    }

    #[test]
    fn key_suffix_reports_qualifiers() {
        let mut q = ObjectQualifiers::default();
        assert_eq!(q.key_suffix(), "");
        q.is_const = true;
        q.ref_qualifier = RefQualifier::RValue;
        assert_eq!(q.key_suffix(), " const &&");
        q.is_volatile = Facet::Unknown("volatile".into());
        assert_eq!(q.key_suffix(), " const volatile &&");
    }

    #[test]
    fn param_list_includes_variadic_marker() {
        let mut s = sig(&[("const char*", None)]);
        s.variadic = true;
        assert_eq!(s.param_list(), "(const char*,...)");
    }
}
