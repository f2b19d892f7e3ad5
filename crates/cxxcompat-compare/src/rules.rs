//! Compatibility rule table.
//!
//! Every rule inspects one matched pair, one removal or one addition and
//! returns zero or more [`Finding`]s carrying the rule's default tier. The
//! classifier resolves the final tier through the policy.

use cxxcompat_core::{
    BaseSpec, ChangeKind, DefinitionState, Dispatch, Entity, EntityDetail, EntityKind, EnumInfo,
    ExceptionCategory, Facet, FunctionSignature, Surface, TemplateInfo, TemplateParamKind, Tier,
};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: ChangeKind,
    pub tier: Tier,
    pub rationale: String,
}

fn finding(kind: ChangeKind, tier: Tier, rationale: impl Into<String>) -> Finding {
    Finding {
        kind,
        tier,
        rationale: rationale.into(),
    }
}

/// A matched pair under inspection: `a` from the old surface, `b` from the
/// new one.
pub struct PairContext<'s> {
    pub old: &'s Surface,
    pub new: &'s Surface,
    pub a: &'s Entity,
    pub b: &'s Entity,
}

/// An entity present on one side only.
pub struct SideContext<'s> {
    pub surface: &'s Surface,
    pub entity: &'s Entity,
    /// The enclosing record exists on both sides.
    pub parent_survives: bool,
    /// The enclosing entity is itself removed (or added).
    pub parent_unmatched: bool,
}

pub struct PairRule {
    pub name: &'static str,
    pub check: fn(&PairContext) -> Vec<Finding>,
}

pub struct SideRule {
    pub name: &'static str,
    pub check: fn(&SideContext) -> Vec<Finding>,
}

pub static PAIR_RULES: &[PairRule] = &[
    PairRule { name: "unknown_facets", check: unknown_facets },
    PairRule { name: "access", check: access },
    PairRule { name: "attributes", check: attributes },
    PairRule { name: "linkage", check: linkage },
    PairRule { name: "template_parameters", check: template_parameters },
    PairRule { name: "virtuality", check: virtuality },
    PairRule { name: "override_final", check: override_final },
    PairRule { name: "default_arguments", check: default_arguments },
    PairRule { name: "noexcept", check: noexcept },
    PairRule { name: "explicit", check: explicit },
    PairRule { name: "definition", check: definition },
    PairRule { name: "return_type", check: return_type },
    PairRule { name: "object_qualifiers", check: object_qualifiers },
    PairRule { name: "static_member", check: static_member },
    PairRule { name: "class_key", check: class_key },
    PairRule { name: "bases", check: bases },
    PairRule { name: "class_final", check: class_final },
    PairRule { name: "field_order", check: field_order },
    PairRule { name: "field", check: field },
    PairRule { name: "variable", check: variable },
    PairRule { name: "enumeration", check: enumeration },
    PairRule { name: "alias", check: alias },
];

pub static REMOVAL_RULES: &[SideRule] = &[
    SideRule { name: "removed", check: removed },
    SideRule { name: "symbol_removed", check: symbol_removed },
    SideRule { name: "vtable_slot", check: vtable_slot },
    SideRule { name: "field_layout", check: field_layout },
];

pub static ADDITION_RULES: &[SideRule] = &[
    SideRule { name: "added", check: added },
    SideRule { name: "deleted_overload", check: deleted_overload },
    SideRule { name: "pure_virtual_added", check: pure_virtual_added },
    SideRule { name: "vtable_slot", check: vtable_slot },
    SideRule { name: "field_layout", check: field_layout },
];

fn signatures<'s>(ctx: &PairContext<'s>) -> Option<(&'s FunctionSignature, &'s FunctionSignature)> {
    Some((ctx.a.signature()?, ctx.b.signature()?))
}

fn unknown_facets(ctx: &PairContext) -> Vec<Finding> {
    if !ctx.a.has_unknown_facets() && !ctx.b.has_unknown_facets() {
        return Vec::new();
    }
    let facets: BTreeSet<&str> = ctx
        .a
        .unknown_facets
        .iter()
        .chain(&ctx.b.unknown_facets)
        .map(|f| f.facet.as_str())
        .collect();
    vec![finding(
        ChangeKind::UnverifiableFacet,
        Tier::Unknown,
        format!(
            "cannot verify {}",
            facets.into_iter().collect::<Vec<_>>().join(", ")
        ),
    )]
}

fn access(ctx: &PairContext) -> Vec<Finding> {
    let (from, to) = (ctx.a.access, ctx.b.access);
    if to < from {
        vec![finding(
            ChangeKind::AccessNarrowed,
            Tier::SourceBreak,
            format!("access narrowed from {} to {}", from, to),
        )]
    } else if to > from {
        vec![finding(
            ChangeKind::AccessWidened,
            Tier::Neutral,
            format!("access widened from {} to {}", from, to),
        )]
    } else {
        Vec::new()
    }
}

fn attributes(ctx: &PairContext) -> Vec<Finding> {
    let (a, b) = (&ctx.a.attributes, &ctx.b.attributes);
    if a == b {
        return Vec::new();
    }
    let mut out = Vec::new();
    let gained: Vec<&str> = b.difference(a).map(String::as_str).collect();
    let lost: Vec<&str> = a.difference(b).map(String::as_str).collect();
    if ctx.a.kind == EntityKind::Field
        && (gained.contains(&"no_unique_address") || lost.contains(&"no_unique_address"))
    {
        out.push(finding(
            ChangeKind::LayoutChanged,
            Tier::BinaryBreak,
            "[[no_unique_address]] changed on a data member",
        ));
    }
    let mut parts = Vec::new();
    if !gained.is_empty() {
        parts.push(format!("added [[{}]]", gained.join(", ")));
    }
    if !lost.is_empty() {
        parts.push(format!("removed [[{}]]", lost.join(", ")));
    }
    out.push(finding(
        ChangeKind::AttributesChanged,
        Tier::Neutral,
        parts.join("; "),
    ));
    out
}

fn linkage(ctx: &PairContext) -> Vec<Finding> {
    if ctx.a.external_linkage && !ctx.b.external_linkage {
        vec![finding(
            ChangeKind::LinkageChanged,
            Tier::BinaryBreak,
            "exported symbol no longer emitted by the library",
        )]
    } else {
        Vec::new()
    }
}

fn template_parameters(ctx: &PairContext) -> Vec<Finding> {
    let (Some(a), Some(b)) = (&ctx.a.template, &ctx.b.template) else {
        return Vec::new();
    };
    compare_template(a, b, ctx.a.kind.is_record())
}

fn compare_template(a: &TemplateInfo, b: &TemplateInfo, is_class: bool) -> Vec<Finding> {
    let mut out = Vec::new();
    for (index, (pa, pb)) in a.params.iter().zip(&b.params).enumerate() {
        let position = index + 1;
        match (&pa.default, &pb.default) {
            (Some(old), None) => out.push(finding(
                ChangeKind::TemplateDefaultRemoved,
                Tier::SourceBreak,
                format!("default `{}` of template parameter {} removed", old, position),
            )),
            (None, Some(new)) => out.push(finding(
                ChangeKind::TemplateDefaultAdded,
                Tier::Neutral,
                format!("template parameter {} gained default `{}`", position, new),
            )),
            (Some(old), Some(new)) if old != new => out.push(finding(
                ChangeKind::TemplateDefaultChanged,
                if is_class {
                    Tier::BinaryBreak
                } else {
                    Tier::Neutral
                },
                format!(
                    "default of template parameter {} changed from `{}` to `{}`",
                    position, old, new
                ),
            )),
            _ => {}
        }
        if pa.kind == TemplateParamKind::NonType && pa.ty != pb.ty {
            out.push(finding(
                ChangeKind::TemplateParameterChanged,
                Tier::BinaryBreak,
                format!(
                    "type of template parameter {} changed from `{}` to `{}`",
                    position,
                    pa.ty.as_ref().map(|t| t.as_str()).unwrap_or("?"),
                    pb.ty.as_ref().map(|t| t.as_str()).unwrap_or("?")
                ),
            ));
        }
    }
    out
}

fn virtuality(ctx: &PairContext) -> Vec<Finding> {
    let Some((a, b)) = signatures(ctx) else {
        return Vec::new();
    };
    let (from, to) = (a.virtuality.dispatch, b.virtuality.dispatch);
    let mut out = Vec::new();
    if from.is_virtual() != to.is_virtual() {
        out.push(finding(
            ChangeKind::VirtualityChanged,
            Tier::BinaryBreak,
            if to.is_virtual() {
                "method became virtual"
            } else {
                "method is no longer virtual"
            },
        ));
    }
    match (from, to) {
        (Dispatch::PureVirtual, Dispatch::PureVirtual) => {}
        (_, Dispatch::PureVirtual) => out.push(finding(
            ChangeKind::BecamePureVirtual,
            Tier::SourceBreak,
            "method became pure virtual; derived classes must override it",
        )),
        (Dispatch::PureVirtual, _) => out.push(finding(
            ChangeKind::NoLongerPureVirtual,
            Tier::SourceBreak,
            "method is no longer pure virtual",
        )),
        _ => {}
    }
    out
}

fn override_final(ctx: &PairContext) -> Vec<Finding> {
    let Some((a, b)) = signatures(ctx) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if a.virtuality.is_override != b.virtuality.is_override {
        out.push(finding(
            ChangeKind::OverrideSpecifierChanged,
            Tier::Neutral,
            if b.virtuality.is_override {
                "`override` added"
            } else {
                "`override` removed"
            },
        ));
    }
    if a.virtuality.is_final != b.virtuality.is_final {
        out.push(finding(
            ChangeKind::FinalSpecifierChanged,
            Tier::Neutral,
            if b.virtuality.is_final {
                "`final` added"
            } else {
                "`final` removed"
            },
        ));
    }
    out
}

fn default_arguments(ctx: &PairContext) -> Vec<Finding> {
    let Some((a, b)) = signatures(ctx) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (index, (pa, pb)) in a.params.iter().zip(&b.params).enumerate() {
        let position = index + 1;
        match (&pa.default, &pb.default) {
            (None, Some(value)) => out.push(finding(
                ChangeKind::DefaultArgumentAdded,
                Tier::Neutral,
                format!("parameter {} gained default `{}`", position, value),
            )),
            (Some(value), None) => out.push(finding(
                ChangeKind::DefaultArgumentRemoved,
                Tier::SourceBreak,
                format!("default `{}` of parameter {} removed", value, position),
            )),
            (Some(old), Some(new)) if old != new => out.push(finding(
                ChangeKind::DefaultArgumentChanged,
                Tier::Neutral,
                format!(
                    "default of parameter {} changed from `{}` to `{}`",
                    position, old, new
                ),
            )),
            _ => {}
        }
    }

    // Calls that newly omit arguments must not collide with a sibling overload.
    let (old_min, new_min) = (a.min_arity(), b.min_arity());
    if new_min < old_min {
        let types = b.param_types();
        for sibling in ctx.new.overload_siblings(ctx.b) {
            let Some(other) = sibling.signature() else {
                continue;
            };
            let other_types = other.param_types();
            let collides = (new_min..old_min).any(|count| {
                other.min_arity() <= count
                    && other_types.len() >= count
                    && other_types[..count] == types[..count]
            });
            if collides {
                out.push(finding(
                    ChangeKind::DefaultArgumentAmbiguity,
                    Tier::SourceBreak,
                    format!("new default arguments make calls ambiguous with {}", sibling.key),
                ));
            }
        }
    }
    out
}

fn noexcept(ctx: &PairContext) -> Vec<Finding> {
    let Some((a, b)) = signatures(ctx) else {
        return Vec::new();
    };
    let (Facet::Known(from), Facet::Known(to)) = (&a.noexcept, &b.noexcept) else {
        return Vec::new();
    };
    match (from.category(), to.category()) {
        (
            ExceptionCategory::PotentiallyThrowing | ExceptionCategory::Dependent,
            ExceptionCategory::NonThrowing,
        ) => {
            vec![finding(
                ChangeKind::NoexceptTightened,
                Tier::BinaryBreak,
                format!("exception specification tightened from {} to {}", from, to),
            )]
        }
        (
            ExceptionCategory::NonThrowing,
            ExceptionCategory::PotentiallyThrowing | ExceptionCategory::Dependent,
        ) => {
            vec![finding(
                ChangeKind::NoexceptLoosened,
                Tier::SourceBreak,
                format!("exception specification loosened from {} to {}", from, to),
            )]
        }
        (x, y) if (x == ExceptionCategory::Dependent || y == ExceptionCategory::Dependent)
            && from != to =>
        {
            vec![finding(
                ChangeKind::NoexceptConditionChanged,
                Tier::Unknown,
                format!("exception specification changed from {} to {}", from, to),
            )]
        }
        _ => Vec::new(),
    }
}

fn explicit(ctx: &PairContext) -> Vec<Finding> {
    let Some((a, b)) = signatures(ctx) else {
        return Vec::new();
    };
    match (&a.is_explicit, &b.is_explicit) {
        (Facet::Known(false), Facet::Known(true)) => vec![finding(
            ChangeKind::ExplicitAdded,
            Tier::SourceBreak,
            "constructor became explicit; implicit conversions stop compiling",
        )],
        (Facet::Known(true), Facet::Known(false)) => vec![finding(
            ChangeKind::ExplicitRemoved,
            Tier::Neutral,
            "`explicit` removed",
        )],
        _ => Vec::new(),
    }
}

/// Destructors and copy/move constructors, whose triviality depends on
/// being defaulted.
fn is_special_member(entity: &Entity) -> bool {
    match entity.kind {
        EntityKind::Destructor => true,
        EntityKind::Constructor => entity
            .signature()
            .filter(|s| s.params.len() == 1)
            .map(|s| {
                let ty = s.params[0].ty.as_str();
                let record = entity.name.as_str();
                ty == format!("const {}&", record)
                    || ty == format!("{}&", record)
                    || ty == format!("{}&&", record)
            })
            .unwrap_or(false),
        _ => false,
    }
}

fn definition(ctx: &PairContext) -> Vec<Finding> {
    let Some((a, b)) = signatures(ctx) else {
        return Vec::new();
    };
    use DefinitionState::*;
    match (a.definition, b.definition) {
        (Deleted, Deleted) | (Normal, Normal) | (Defaulted, Defaulted) => Vec::new(),
        (_, Deleted) => vec![finding(
            ChangeKind::BecameDeleted,
            Tier::SourceBreak,
            "function became deleted",
        )],
        (Deleted, _) => vec![finding(
            ChangeKind::NoLongerDeleted,
            Tier::Neutral,
            "function is no longer deleted",
        )],
        (from, _) => vec![finding(
            ChangeKind::DefaultedChanged,
            if is_special_member(ctx.a) {
                Tier::BinaryBreak
            } else {
                Tier::Neutral
            },
            if from == Defaulted {
                "defaulted member became user-provided"
            } else {
                "user-provided member became defaulted"
            },
        )],
    }
}

fn return_type(ctx: &PairContext) -> Vec<Finding> {
    let Some((a, b)) = signatures(ctx) else {
        return Vec::new();
    };
    match (&a.return_type, &b.return_type) {
        (Some(from), Some(to)) if from != to => vec![finding(
            ChangeKind::ReturnTypeChanged,
            Tier::BinaryBreak,
            format!("return type changed from `{}` to `{}`", from, to),
        )],
        _ => Vec::new(),
    }
}

fn object_qualifiers(ctx: &PairContext) -> Vec<Finding> {
    let Some((a, b)) = signatures(ctx) else {
        return Vec::new();
    };
    let (qa, qb) = (&a.qualifiers, &b.qualifiers);
    let volatile_changed = match (&qa.is_volatile, &qb.is_volatile) {
        (Facet::Known(x), Facet::Known(y)) => x != y,
        _ => false,
    };
    if qa.is_const != qb.is_const || qa.ref_qualifier != qb.ref_qualifier || volatile_changed {
        vec![finding(
            ChangeKind::ObjectQualifierChanged,
            Tier::BinaryBreak,
            format!(
                "object qualifiers changed from `{}` to `{}`",
                qa.key_suffix().trim(),
                qb.key_suffix().trim()
            ),
        )]
    } else {
        Vec::new()
    }
}

fn static_member(ctx: &PairContext) -> Vec<Finding> {
    let statics = match (&ctx.a.detail, &ctx.b.detail) {
        (EntityDetail::Callable(a), EntityDetail::Callable(b)) => (a.is_static, b.is_static),
        (EntityDetail::Field(a), EntityDetail::Field(b)) => (a.is_static, b.is_static),
        _ => return Vec::new(),
    };
    if statics.0 == statics.1 {
        return Vec::new();
    }
    vec![finding(
        ChangeKind::StaticChanged,
        Tier::BinaryBreak,
        if statics.1 {
            "member became static"
        } else {
            "member is no longer static"
        },
    )]
}

fn class_key(ctx: &PairContext) -> Vec<Finding> {
    let (from, to) = (ctx.a.kind, ctx.b.kind);
    if !from.is_record() || from == to {
        return Vec::new();
    }
    if from == EntityKind::Union || to == EntityKind::Union {
        vec![finding(
            ChangeKind::LayoutChanged,
            Tier::BinaryBreak,
            format!("{} became a {}", from, to),
        )]
    } else {
        vec![finding(
            ChangeKind::ClassKeyChanged,
            Tier::Neutral,
            format!("declared with `{}` instead of `{}`", to, from),
        )]
    }
}

fn bases(ctx: &PairContext) -> Vec<Finding> {
    let (Some(a), Some(b)) = (ctx.a.record(), ctx.b.record()) else {
        return Vec::new();
    };
    fn shape(bases: &[BaseSpec]) -> Vec<(&str, bool)> {
        bases.iter().map(|b| (b.name.as_str(), b.is_virtual)).collect()
    }
    fn names(bases: &[BaseSpec]) -> String {
        bases
            .iter()
            .map(|b| b.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
    if shape(&a.bases) != shape(&b.bases) {
        return vec![finding(
            ChangeKind::BasesChanged,
            Tier::BinaryBreak,
            format!("bases changed from [{}] to [{}]", names(&a.bases), names(&b.bases)),
        )];
    }
    a.bases
        .iter()
        .zip(&b.bases)
        .filter(|(x, y)| y.access < x.access)
        .map(|(x, y)| {
            finding(
                ChangeKind::BaseAccessNarrowed,
                Tier::SourceBreak,
                format!("base {} narrowed from {} to {}", x.name, x.access, y.access),
            )
        })
        .collect()
}

fn class_final(ctx: &PairContext) -> Vec<Finding> {
    let (Some(a), Some(b)) = (ctx.a.record(), ctx.b.record()) else {
        return Vec::new();
    };
    match (a.is_final, b.is_final) {
        (false, true) => vec![finding(
            ChangeKind::ClassBecameFinal,
            Tier::SourceBreak,
            "class became final; derivation stops compiling",
        )],
        (true, false) => vec![finding(
            ChangeKind::ClassNoLongerFinal,
            Tier::Neutral,
            "class is no longer final",
        )],
        _ => Vec::new(),
    }
}

fn field_order(ctx: &PairContext) -> Vec<Finding> {
    if !ctx.a.kind.is_record() || !ctx.b.kind.is_record() {
        return Vec::new();
    }
    let names = |surface: &Surface, record: &Entity| -> Vec<String> {
        surface
            .fields_in_layout_order(record.id)
            .into_iter()
            .map(|f| f.name.clone())
            .collect()
    };
    let before = names(ctx.old, ctx.a);
    let after = names(ctx.new, ctx.b);
    let common_before: Vec<&String> = before.iter().filter(|n| after.contains(n)).collect();
    let common_after: Vec<&String> = after.iter().filter(|n| before.contains(n)).collect();
    if common_before != common_after {
        vec![finding(
            ChangeKind::FieldOrderChanged,
            Tier::BinaryBreak,
            "non-static data members were reordered",
        )]
    } else {
        Vec::new()
    }
}

fn field(ctx: &PairContext) -> Vec<Finding> {
    let (Some(a), Some(b)) = (ctx.a.field(), ctx.b.field()) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if a.ty != b.ty {
        out.push(finding(
            ChangeKind::FieldTypeChanged,
            Tier::BinaryBreak,
            format!("type changed from `{}` to `{}`", a.ty, b.ty),
        ));
    }
    if a.bit_width != b.bit_width {
        out.push(finding(
            ChangeKind::BitfieldChanged,
            Tier::BinaryBreak,
            format!(
                "bit-field width changed from {} to {}",
                a.bit_width.as_deref().unwrap_or("none"),
                b.bit_width.as_deref().unwrap_or("none")
            ),
        ));
    }
    out
}

fn variable(ctx: &PairContext) -> Vec<Finding> {
    let (EntityDetail::Variable(a), EntityDetail::Variable(b)) = (&ctx.a.detail, &ctx.b.detail)
    else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if a.ty != b.ty {
        out.push(finding(
            ChangeKind::VariableTypeChanged,
            Tier::BinaryBreak,
            format!("type changed from `{}` to `{}`", a.ty, b.ty),
        ));
    }
    if a.initializer != b.initializer && a.initializer.is_some() && b.initializer.is_some() {
        out.push(finding(
            ChangeKind::ConstantValueChanged,
            Tier::Neutral,
            format!(
                "value changed from `{}` to `{}`",
                a.initializer.as_deref().unwrap_or_default(),
                b.initializer.as_deref().unwrap_or_default()
            ),
        ));
    }
    out
}

/// Enumerator values with implicit ones spelled relative to the last
/// explicit value.
fn effective_values(info: &EnumInfo) -> Vec<(String, String)> {
    let mut base: Option<String> = None;
    let mut offset: i64 = 0;
    let mut out = Vec::with_capacity(info.enumerators.len());
    for e in &info.enumerators {
        let value = match &e.value {
            Some(v) => {
                base = Some(v.clone());
                offset = 0;
                v.clone()
            }
            None => {
                offset += if out.is_empty() && base.is_none() { 0 } else { 1 };
                match &base {
                    None => offset.to_string(),
                    Some(b) => match b.parse::<i64>() {
                        Ok(n) => (n + offset).to_string(),
                        Err(_) => format!("{}+{}", b, offset),
                    },
                }
            }
        };
        out.push((e.name.clone(), value));
    }
    out
}

fn enumeration(ctx: &PairContext) -> Vec<Finding> {
    let (EntityDetail::Enum(a), EntityDetail::Enum(b)) = (&ctx.a.detail, &ctx.b.detail) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if a.underlying != b.underlying {
        out.push(finding(
            ChangeKind::EnumUnderlyingTypeChanged,
            Tier::BinaryBreak,
            format!(
                "underlying type changed from {} to {}",
                a.underlying.as_ref().map(|t| t.as_str()).unwrap_or("default"),
                b.underlying.as_ref().map(|t| t.as_str()).unwrap_or("default")
            ),
        ));
    }
    if a.is_scoped != b.is_scoped {
        out.push(finding(
            ChangeKind::EnumScopeChanged,
            Tier::SourceBreak,
            if b.is_scoped {
                "enum became scoped"
            } else {
                "enum is no longer scoped"
            },
        ));
    }

    let before = effective_values(a);
    let after = effective_values(b);
    for (name, value) in &before {
        match after.iter().find(|(n, _)| n == name) {
            None => out.push(finding(
                ChangeKind::EnumeratorRemoved,
                Tier::SourceBreak,
                format!("enumerator {} removed", name),
            )),
            Some((_, new_value)) if new_value != value => out.push(finding(
                ChangeKind::EnumeratorValueChanged,
                Tier::BinaryBreak,
                format!("enumerator {} changed from {} to {}", name, value, new_value),
            )),
            _ => {}
        }
    }
    for (name, _) in &after {
        if !before.iter().any(|(n, _)| n == name) {
            out.push(finding(
                ChangeKind::EnumeratorAdded,
                Tier::Neutral,
                format!("enumerator {} added", name),
            ));
        }
    }
    out
}

fn alias(ctx: &PairContext) -> Vec<Finding> {
    let (EntityDetail::Alias(a), EntityDetail::Alias(b)) = (&ctx.a.detail, &ctx.b.detail) else {
        return Vec::new();
    };
    if a.target == b.target {
        return Vec::new();
    }
    vec![finding(
        ChangeKind::AliasTargetChanged,
        Tier::BinaryBreak,
        format!("now names `{}` instead of `{}`", b.target, a.target),
    )]
}

fn removed(ctx: &SideContext) -> Vec<Finding> {
    if ctx.parent_unmatched {
        return Vec::new();
    }
    let (tier, why) = if ctx.entity.access.is_visible() {
        (Tier::SourceBreak, "visible entity removed")
    } else {
        (Tier::Neutral, "private entity removed")
    };
    vec![finding(ChangeKind::Removed, tier, why)]
}

fn symbol_removed(ctx: &SideContext) -> Vec<Finding> {
    if !ctx.entity.external_linkage {
        return Vec::new();
    }
    vec![finding(
        ChangeKind::SymbolRemoved,
        Tier::BinaryBreak,
        "exported symbol removed",
    )]
}

fn vtable_slot(ctx: &SideContext) -> Vec<Finding> {
    let Some(sig) = ctx.entity.signature() else {
        return Vec::new();
    };
    if !ctx.parent_survives
        || !sig.virtuality.is_virtual()
        || sig.virtuality.is_override
        || ctx.surface.base_declares_slot(ctx.entity)
    {
        return Vec::new();
    }
    vec![finding(
        ChangeKind::VtableLayoutChanged,
        Tier::BinaryBreak,
        "virtual function table of the class changed",
    )]
}

fn field_layout(ctx: &SideContext) -> Vec<Finding> {
    if !ctx.parent_survives || !ctx.entity.is_instance_field() {
        return Vec::new();
    }
    vec![finding(
        ChangeKind::LayoutChanged,
        Tier::BinaryBreak,
        "non-static data member set changed; object size or offsets move",
    )]
}

fn added(ctx: &SideContext) -> Vec<Finding> {
    if ctx.parent_unmatched {
        return Vec::new();
    }
    vec![finding(ChangeKind::Added, Tier::Neutral, "entity added")]
}

fn deleted_overload(ctx: &SideContext) -> Vec<Finding> {
    let Some(sig) = ctx.entity.signature() else {
        return Vec::new();
    };
    if ctx.parent_unmatched
        || sig.definition != DefinitionState::Deleted
        || ctx.surface.overload_siblings(ctx.entity).next().is_none()
    {
        return Vec::new();
    }
    vec![finding(
        ChangeKind::DeletedOverloadAdded,
        Tier::SourceBreak,
        "deleted overload added; calls it attracts stop compiling",
    )]
}

fn pure_virtual_added(ctx: &SideContext) -> Vec<Finding> {
    let Some(sig) = ctx.entity.signature() else {
        return Vec::new();
    };
    if !ctx.parent_survives || sig.virtuality.dispatch != Dispatch::PureVirtual {
        return Vec::new();
    }
    vec![finding(
        ChangeKind::PureVirtualAdded,
        Tier::SourceBreak,
        "pure virtual method added; derived classes must override it",
    )]
}
