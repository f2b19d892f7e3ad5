//! Surface extractor: declaration trees in, [`Surface`] out.

use crate::{DeclKind, DeclNode, TemplateParamDeclKind};
use cxxcompat_core::{
    canonical_expression, strip_template_args, Access, AliasInfo, BaseSpec, CanonicalType,
    CompatError, DefinitionState, Diagnostic, Dispatch, Entity, EntityDetail, EntityId, EntityKind,
    EnumInfo, Enumerator, ExtractConfig, Facet, FieldInfo, FunctionSignature, NoexceptSpec,
    Parameter, RecordInfo, RefQualifier, Result, Surface, SurfaceBuilder, TemplateInfo,
    TemplateParam, TemplateParamKind, UnknownFacet, VariableInfo,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Standard attributes the model understands. Anything else is recorded as
/// an unknown facet.
const KNOWN_ATTRIBUTES: &[&str] = &[
    "deprecated",
    "nodiscard",
    "maybe_unused",
    "noreturn",
    "carries_dependency",
    "no_unique_address",
];

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub roots: Vec<String>,
    pub exclude_namespaces: Vec<String>,
}

impl From<&ExtractConfig> for ExtractOptions {
    fn from(config: &ExtractConfig) -> Self {
        Self {
            roots: config.roots.clone(),
            exclude_namespaces: config.exclude_namespaces.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Extraction {
    pub surface: Surface,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct SurfaceExtractor {
    options: ExtractOptions,
}

impl SurfaceExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn extract(&self, label: &str, tree: &DeclNode) -> Result<Extraction> {
        self.extract_all(label, std::slice::from_ref(tree))
    }

    /// Extracts several translation units (e.g. the headers of one release)
    /// into a single surface.
    pub fn extract_all(&self, label: &str, trees: &[DeclNode]) -> Result<Extraction> {
        let mut walker = Walker {
            options: &self.options,
            builder: Surface::builder(label),
            diagnostics: Vec::new(),
            layout_counters: HashMap::new(),
        };

        for tree in trees {
            if tree.kind != DeclKind::TranslationUnit {
                return Err(CompatError::malformed(
                    tree.display_name(),
                    tree.location.clone(),
                    format!("expected a translation unit at the root, found {:?}", tree.kind),
                ));
            }
            let scope = Scope::global();
            for child in &tree.children {
                walker.walk(child, &scope)?;
            }
        }

        walker.resolve_bases();
        walker.propagate_virtuality();

        let Walker {
            builder,
            diagnostics,
            ..
        } = walker;
        let surface = builder.build();
        info!(
            "Extracted surface '{}': {} entities, {} diagnostics",
            label,
            surface.len(),
            diagnostics.len()
        );
        Ok(Extraction {
            surface,
            diagnostics,
        })
    }
}

#[derive(Debug, Clone)]
struct RecordScope {
    name: String,
    default_access: Access,
}

#[derive(Debug, Clone)]
struct Scope {
    id: Option<EntityId>,
    prefix: String,
    record: Option<RecordScope>,
    in_template: bool,
}

impl Scope {
    fn global() -> Self {
        Self {
            id: None,
            prefix: String::new(),
            record: None,
            in_template: false,
        }
    }

    fn qualify(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", self.prefix, name)
        }
    }

    fn default_access(&self) -> Access {
        self.record
            .as_ref()
            .map(|r| r.default_access)
            .unwrap_or(Access::Public)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Inclusion {
    Include,
    Ancestor,
    Exclude,
}

struct Walker<'o> {
    options: &'o ExtractOptions,
    builder: SurfaceBuilder,
    diagnostics: Vec<Diagnostic>,
    layout_counters: HashMap<EntityId, usize>,
}

/// Facts gathered from a declaration before it becomes an entity.
struct Draft {
    attributes: BTreeSet<String>,
    unknown: Vec<UnknownFacet>,
}

impl Draft {
    fn new() -> Self {
        Self {
            attributes: BTreeSet::new(),
            unknown: Vec::new(),
        }
    }

    fn unknown(&mut self, facet: &str, raw: &str) {
        let facet = UnknownFacet::new(facet, raw.trim());
        if !self.unknown.contains(&facet) {
            self.unknown.push(facet);
        }
    }
}

impl<'o> Walker<'o> {
    fn inclusion(&self, qualified: &str) -> Inclusion {
        let roots = &self.options.roots;
        if roots.is_empty() {
            return Inclusion::Include;
        }
        if roots
            .iter()
            .any(|root| qualified == root || qualified.starts_with(&format!("{}::", root)))
        {
            return Inclusion::Include;
        }
        if roots
            .iter()
            .any(|root| root.starts_with(&format!("{}::", qualified)))
        {
            return Inclusion::Ancestor;
        }
        Inclusion::Exclude
    }

    fn walk(&mut self, node: &DeclNode, scope: &Scope) -> Result<()> {
        match node.kind {
            DeclKind::TranslationUnit => Err(CompatError::malformed(
                scope.prefix.clone(),
                node.location.clone(),
                "translation unit nested inside another declaration",
            )),
            DeclKind::Namespace => self.walk_namespace(node, scope),
            DeclKind::Class | DeclKind::Struct | DeclKind::Union => self.walk_record(node, scope),
            DeclKind::Function => self.walk_callable(node, scope),
            DeclKind::Field | DeclKind::Variable => self.walk_data(node, scope),
            DeclKind::Enum => self.walk_enum(node, scope),
            DeclKind::TypeAlias => self.walk_alias(node, scope),
            DeclKind::Unparsed => {
                self.record_unparsed(node, scope);
                Ok(())
            }
        }
    }

    fn walk_namespace(&mut self, node: &DeclNode, scope: &Scope) -> Result<()> {
        if scope.record.is_some() {
            return Err(CompatError::malformed(
                scope.prefix.clone(),
                node.location.clone(),
                "namespace nested in a record",
            ));
        }
        let name = match node.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!("Skipping anonymous namespace in '{}'", scope.prefix);
                return Ok(());
            }
        };

        let is_inline = node.specifiers.iter().any(|s| s == "inline");
        let mut current = scope.clone();
        // `namespace a::b { }` opens every component.
        for component in name.split("::").map(str::trim).filter(|c| !c.is_empty()) {
            if self
                .options
                .exclude_namespaces
                .iter()
                .any(|excluded| excluded == component)
            {
                debug!("Skipping excluded namespace {}", current.qualify(component));
                return Ok(());
            }
            let qualified = current.qualify(component);
            if self.inclusion(&qualified) == Inclusion::Exclude {
                return Ok(());
            }
            let entity = new_entity(
                node,
                qualified.clone(),
                qualified.clone(),
                component.to_string(),
                EntityKind::Namespace,
                Access::Public,
                EntityDetail::Namespace { is_inline },
                Draft::new(),
            );
            let id = self.builder.insert(current.id, entity)?;
            current = Scope {
                id: Some(id),
                prefix: qualified,
                record: None,
                in_template: false,
            };
        }

        for child in &node.children {
            self.walk(child, &current)?;
        }
        Ok(())
    }

    fn walk_record(&mut self, node: &DeclNode, scope: &Scope) -> Result<()> {
        let (kind, default_access) = match node.kind {
            DeclKind::Class => (EntityKind::Class, Access::Private),
            DeclKind::Union => (EntityKind::Union, Access::Public),
            _ => (EntityKind::Struct, Access::Public),
        };

        let name = match node.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => strip_template_args(name).to_string(),
            _ => {
                // Members of an anonymous struct/union belong to the
                // enclosing scope.
                debug!("Flattening anonymous {:?} into '{}'", node.kind, scope.prefix);
                let mut inner = scope.clone();
                if let Some(record) = inner.record.as_mut() {
                    record.default_access = default_access;
                }
                for child in &node.children {
                    self.walk(child, &inner)?;
                }
                return Ok(());
            }
        };

        let qualified = scope.qualify(&name);
        if self.inclusion(&qualified) != Inclusion::Include {
            return Ok(());
        }

        let mut draft = self.draft(node);
        let bases = node
            .bases
            .iter()
            .map(|base| BaseSpec {
                name: base.name.trim().to_string(),
                access: base.access.unwrap_or(default_access),
                is_virtual: base.is_virtual,
            })
            .collect();
        let mut is_final = false;
        for token in node.specifiers.iter().chain(&node.trailing) {
            match canonical_expression(token).as_str() {
                "final" => is_final = true,
                "alignas" => draft.unknown("alignment", token),
                other if other.starts_with("alignas(") => draft.unknown("alignment", token),
                _ => draft.unknown("specifier", token),
            }
        }
        let template = node.template_params.as_ref().map(|p| template_info(p));
        let access = member_access(node, scope);

        let mut entity = new_entity(
            node,
            qualified.clone(),
            qualified.clone(),
            name.clone(),
            kind,
            access,
            EntityDetail::Record(RecordInfo { bases, is_final }),
            draft,
        );
        entity.template = template;
        self.note_unknowns(&entity);
        let id = self.builder.insert(scope.id, entity)?;

        let inner = Scope {
            id: Some(id),
            prefix: qualified,
            record: Some(RecordScope {
                name,
                default_access,
            }),
            in_template: scope.in_template || node.template_params.is_some(),
        };
        for child in &node.children {
            self.walk(child, &inner)?;
        }
        Ok(())
    }

    fn walk_callable(&mut self, node: &DeclNode, scope: &Scope) -> Result<()> {
        let name = match node.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(CompatError::malformed(
                    scope.qualify("<unnamed>"),
                    node.location.clone(),
                    "callable without a name",
                ))
            }
        };
        if node.specifiers.iter().any(|s| s == "friend") {
            debug!("Skipping friend declaration {}", name);
            return Ok(());
        }
        if name.contains("::") && !name.starts_with("operator") {
            debug!("Skipping out-of-line definition {}", name);
            return Ok(());
        }
        if scope.record.is_none() && node.specifiers.iter().any(|s| s == "static") {
            debug!("Skipping internal-linkage function {}", scope.qualify(&name));
            return Ok(());
        }

        let qualified = scope.qualify(&name);
        if self.inclusion(&qualified) != Inclusion::Include {
            return Ok(());
        }

        let kind = match &scope.record {
            Some(_) if name.starts_with('~') => EntityKind::Destructor,
            Some(record) if strip_template_args(&name) == record.name => EntityKind::Constructor,
            Some(_) => EntityKind::Method,
            None => EntityKind::Function,
        };

        let mut draft = self.draft(node);
        let mut sig = FunctionSignature {
            raw_specifiers: node
                .specifiers
                .iter()
                .chain(&node.trailing)
                .cloned()
                .collect(),
            ..Default::default()
        };
        let mut trailing_return: Option<String> = None;

        for spec in &node.specifiers {
            let token = canonical_expression(spec);
            match token.as_str() {
                "virtual" => sig.virtuality.dispatch = Dispatch::Virtual,
                "static" => sig.is_static = true,
                "inline" => sig.is_inline = true,
                "constexpr" | "consteval" => sig.is_constexpr = true,
                "explicit" | "explicit(true)" => sig.is_explicit = Facet::Known(true),
                "explicit(false)" => sig.is_explicit = Facet::Known(false),
                "extern" | "extern\"C\"" | "extern\"C++\"" => {}
                t if t.starts_with("explicit(") => {
                    sig.is_explicit = Facet::Unknown(spec.clone());
                    draft.unknown("explicit", spec);
                }
                t if is_attribute_token(t) => self.attribute(&mut draft, spec),
                _ => draft.unknown("specifier", spec),
            }
        }

        for raw in &node.trailing {
            let token = canonical_expression(raw);
            match token.as_str() {
                "const" => sig.qualifiers.is_const = true,
                "volatile" => {
                    sig.qualifiers.is_volatile = Facet::Unknown(raw.clone());
                    draft.unknown("volatile", raw);
                }
                "&" => sig.qualifiers.ref_qualifier = RefQualifier::LValue,
                "&&" => sig.qualifiers.ref_qualifier = RefQualifier::RValue,
                "noexcept" | "noexcept(true)" | "throw()" => {
                    sig.noexcept = Facet::Known(NoexceptSpec::True)
                }
                "noexcept(false)" => sig.noexcept = Facet::Known(NoexceptSpec::False),
                "override" => sig.virtuality.is_override = true,
                "final" => sig.virtuality.is_final = true,
                "=0" => sig.virtuality.dispatch = Dispatch::PureVirtual,
                "=delete" => sig.definition = DefinitionState::Deleted,
                "=default" => sig.definition = DefinitionState::Defaulted,
                t if t.starts_with("noexcept(") => match t
                    .strip_prefix("noexcept(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .filter(|inner| !inner.trim().is_empty())
                {
                    Some(inner) => {
                        sig.noexcept = Facet::Known(NoexceptSpec::Conditional(inner.to_string()))
                    }
                    None => {
                        sig.noexcept = Facet::Unknown(raw.clone());
                        draft.unknown("exception specification", raw);
                    }
                },
                t if t.starts_with("throw(") => {
                    sig.noexcept = Facet::Unknown(raw.clone());
                    draft.unknown("exception specification", raw);
                }
                t if t.starts_with("->") => {
                    trailing_return = Some(raw.trim().trim_start_matches("->").to_string());
                }
                t if t.starts_with("requires") => draft.unknown("constraint", raw),
                t if is_attribute_token(t) => self.attribute(&mut draft, raw),
                _ => draft.unknown("specifier", raw),
            }
        }

        if scope.record.is_some()
            && (sig.virtuality.is_override || sig.virtuality.is_final)
            && sig.virtuality.dispatch == Dispatch::NonVirtual
        {
            sig.virtuality.dispatch = Dispatch::Virtual;
        }

        sig.return_type = match kind {
            EntityKind::Constructor | EntityKind::Destructor => None,
            _ => {
                let leading = node.ty.as_deref().map(str::trim).unwrap_or("void");
                let written = match (&trailing_return, leading) {
                    (Some(trailing), "auto") => trailing.as_str(),
                    _ => leading,
                };
                Some(CanonicalType::parse(written))
            }
        };

        // Destructors are implicitly non-throwing.
        if kind == EntityKind::Destructor && sig.noexcept == Facet::Known(NoexceptSpec::Absent) {
            sig.noexcept = Facet::Known(NoexceptSpec::True);
        }

        sig.variadic = node.variadic;
        for param in &node.params {
            let ty = param.ty.trim();
            if ty == "..." {
                sig.variadic = true;
                continue;
            }
            let mut p = Parameter::new(CanonicalType::parameter(ty));
            if let Some(default) = &param.default {
                p.default = Some(canonical_expression(default));
            }
            sig.params.push(p);
        }
        if sig.params.len() == 1 && sig.params[0].ty.as_str() == "void" && !sig.variadic {
            sig.params.clear();
        }

        let template = node.template_params.as_ref().map(|p| template_info(p));
        let external_linkage = !(sig.is_inline
            || sig.is_constexpr
            || node.has_body
            || template.is_some()
            || scope.in_template
            || sig.definition != DefinitionState::Normal
            || sig.virtuality.dispatch == Dispatch::PureVirtual);

        let key = format!(
            "{}{}{}{}",
            qualified,
            template.as_ref().map(|t| t.shape_key()).unwrap_or_default(),
            sig.param_list(),
            sig.qualifiers.key_suffix()
        );
        let access = member_access(node, scope);

        let mut entity = new_entity(
            node,
            key,
            qualified,
            name,
            kind,
            access,
            EntityDetail::Callable(sig),
            draft,
        );
        entity.template = template;
        entity.external_linkage = external_linkage;
        self.note_unknowns(&entity);
        self.builder.insert(scope.id, entity)?;
        Ok(())
    }

    fn walk_data(&mut self, node: &DeclNode, scope: &Scope) -> Result<()> {
        let name = match node.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                debug!("Skipping unnamed data member in '{}'", scope.prefix);
                return Ok(());
            }
        };
        if name.contains("::") {
            debug!("Skipping out-of-line definition {}", name);
            return Ok(());
        }
        if scope.record.is_none() && node.specifiers.iter().any(|s| s == "static") {
            debug!("Skipping internal-linkage variable {}", scope.qualify(&name));
            return Ok(());
        }
        let qualified = scope.qualify(&name);
        if self.inclusion(&qualified) != Inclusion::Include {
            return Ok(());
        }

        let mut draft = self.draft(node);
        let mut is_static = false;
        let mut is_mutable = false;
        let mut is_constexpr = false;
        let mut is_inline = false;
        let mut is_extern = false;
        for spec in &node.specifiers {
            let token = canonical_expression(spec);
            match token.as_str() {
                "static" => is_static = true,
                "mutable" => is_mutable = true,
                "constexpr" | "constinit" => is_constexpr = true,
                "inline" => is_inline = true,
                "extern" => is_extern = true,
                "thread_local" => draft.unknown("storage", spec),
                t if is_attribute_token(t) => self.attribute(&mut draft, spec),
                _ => draft.unknown("specifier", spec),
            }
        }
        let ty = CanonicalType::parse(node.ty.as_deref().unwrap_or_default());

        let (kind, detail, external_linkage) = match &scope.record {
            Some(_) => {
                let layout_index = if is_static {
                    None
                } else {
                    scope.id.map(|record| {
                        let counter = self.layout_counters.entry(record).or_insert(0);
                        let index = *counter;
                        *counter += 1;
                        index
                    })
                };
                let exported = is_static && !is_inline && !is_constexpr && !scope.in_template;
                (
                    EntityKind::Field,
                    EntityDetail::Field(FieldInfo {
                        ty,
                        is_static,
                        is_mutable,
                        bit_width: node.bit_width.as_deref().map(canonical_expression),
                        layout_index,
                    }),
                    exported,
                )
            }
            None => {
                let const_object = ty.as_str().starts_with("const ");
                let exported = is_extern || !(is_constexpr || is_inline || const_object);
                let initializer = node
                    .initializer
                    .as_deref()
                    .filter(|_| is_constexpr || const_object)
                    .map(canonical_expression);
                (
                    EntityKind::Variable,
                    EntityDetail::Variable(VariableInfo {
                        ty,
                        is_constexpr,
                        initializer,
                    }),
                    exported,
                )
            }
        };

        let access = member_access(node, scope);
        let mut entity = new_entity(
            node,
            qualified.clone(),
            qualified,
            name,
            kind,
            access,
            detail,
            draft,
        );
        entity.external_linkage = external_linkage;
        self.note_unknowns(&entity);
        self.builder.insert(scope.id, entity)?;
        Ok(())
    }

    fn walk_enum(&mut self, node: &DeclNode, scope: &Scope) -> Result<()> {
        let name = match node.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => match node.enumerators.first() {
                Some(first) => format!("(anonymous enum {})", first.name),
                None => return Ok(()),
            },
        };
        let qualified = scope.qualify(&name);
        if self.inclusion(&qualified) != Inclusion::Include {
            return Ok(());
        }

        let mut draft = self.draft(node);
        let mut is_scoped = false;
        for spec in &node.specifiers {
            match canonical_expression(spec).as_str() {
                "class" | "struct" => is_scoped = true,
                t if is_attribute_token(t) => self.attribute(&mut draft, spec),
                _ => draft.unknown("specifier", spec),
            }
        }
        let info = EnumInfo {
            is_scoped,
            underlying: node.ty.as_deref().map(CanonicalType::parse),
            enumerators: node
                .enumerators
                .iter()
                .map(|e| Enumerator {
                    name: e.name.trim().to_string(),
                    value: e.value.as_deref().map(canonical_expression),
                })
                .collect(),
        };
        let access = member_access(node, scope);
        let entity = new_entity(
            node,
            qualified.clone(),
            qualified,
            name,
            EntityKind::Enum,
            access,
            EntityDetail::Enum(info),
            draft,
        );
        self.note_unknowns(&entity);
        self.builder.insert(scope.id, entity)?;
        Ok(())
    }

    fn walk_alias(&mut self, node: &DeclNode, scope: &Scope) -> Result<()> {
        let name = match node.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Ok(()),
        };
        let qualified = scope.qualify(&name);
        if self.inclusion(&qualified) != Inclusion::Include {
            return Ok(());
        }
        let target = CanonicalType::parse(node.ty.as_deref().unwrap_or_default());
        let access = member_access(node, scope);
        let mut entity = new_entity(
            node,
            qualified.clone(),
            qualified,
            name,
            EntityKind::TypeAlias,
            access,
            EntityDetail::Alias(AliasInfo { target }),
            self.draft(node),
        );
        entity.template = node.template_params.as_ref().map(|p| template_info(p));
        self.note_unknowns(&entity);
        self.builder.insert(scope.id, entity)?;
        Ok(())
    }

    fn record_unparsed(&mut self, node: &DeclNode, scope: &Scope) {
        let raw = node
            .unparsed
            .first()
            .cloned()
            .or_else(|| node.name.clone())
            .unwrap_or_default();
        let facet = UnknownFacet::new("members", raw.clone());
        warn!(
            "Unparsed region in '{}': {}",
            if scope.prefix.is_empty() {
                "<translation unit>"
            } else {
                scope.prefix.as_str()
            },
            raw
        );
        self.diagnostics.push(Diagnostic::UnrepresentableFacet {
            name: scope.prefix.clone(),
            facet: facet.facet.clone(),
            raw,
            location: node.location.clone(),
        });
        match scope.id {
            Some(id) => {
                let entity = self.builder.entity_mut(id);
                if !entity.unknown_facets.contains(&facet) {
                    entity.unknown_facets.push(facet);
                }
            }
            None => self.builder.add_unparsed(facet),
        }
    }

    fn draft(&self, node: &DeclNode) -> Draft {
        let mut draft = Draft::new();
        for attribute in &node.attributes {
            self.attribute(&mut draft, attribute);
        }
        for fragment in &node.unparsed {
            draft.unknown("declaration", fragment);
        }
        draft
    }

    fn attribute(&self, draft: &mut Draft, raw: &str) {
        let text = raw.trim();
        let inner = match text
            .strip_prefix("[[")
            .and_then(|rest| rest.strip_suffix("]]"))
        {
            Some(inner) => inner,
            None => {
                draft.unknown("attribute", text);
                return;
            }
        };
        for item in split_attribute_list(inner) {
            let name = item.split('(').next().unwrap_or_default().trim();
            if KNOWN_ATTRIBUTES.contains(&name) {
                draft.attributes.insert(name.to_string());
            } else if !name.is_empty() {
                draft.unknown("attribute", &item);
            }
        }
    }

    fn note_unknowns(&mut self, entity: &Entity) {
        for facet in &entity.unknown_facets {
            warn!(
                "{}: cannot represent {} `{}`",
                entity.key, facet.facet, facet.raw
            );
            self.diagnostics.push(Diagnostic::UnrepresentableFacet {
                name: entity.key.clone(),
                facet: facet.facet.clone(),
                raw: facet.raw.clone(),
                location: entity.location.clone(),
            });
        }
    }

    /// Rewrites base-class spellings to qualified names when the base is
    /// declared in the surface, searching outward from the derived class.
    fn resolve_bases(&mut self) {
        let ids: Vec<EntityId> = self.builder.ids().collect();
        for id in ids {
            let (scope_name, bases) = {
                let entity = self.builder.entity(id);
                let bases = match &entity.detail {
                    EntityDetail::Record(info) if !info.bases.is_empty() => info.bases.clone(),
                    _ => continue,
                };
                let scope_name = entity
                    .parent
                    .map(|p| self.builder.entity(p).qualified_name.clone())
                    .unwrap_or_default();
                (scope_name, bases)
            };

            let resolved: Vec<BaseSpec> = bases
                .into_iter()
                .map(|mut base| {
                    if let Some(qualified) = self.resolve_record_name(&scope_name, &base.name) {
                        base.name = qualified;
                    }
                    base
                })
                .collect();

            if let EntityDetail::Record(info) = &mut self.builder.entity_mut(id).detail {
                info.bases = resolved;
            }
        }
    }

    fn resolve_record_name(&self, scope: &str, spelled: &str) -> Option<String> {
        let spelled = spelled.trim().trim_start_matches("::");
        let bare = strip_template_args(spelled);
        let args = &spelled[bare.len()..];
        let mut prefix = scope.to_string();
        loop {
            let candidate = if prefix.is_empty() {
                bare.to_string()
            } else {
                format!("{}::{}", prefix, bare)
            };
            if let Some(id) = self.builder.find(&candidate) {
                if self.builder.entity(id).kind.is_record() {
                    return Some(format!("{}{}", candidate, args));
                }
            }
            if prefix.is_empty() {
                return None;
            }
            prefix = match prefix.rfind("::") {
                Some(pos) => prefix[..pos].to_string(),
                None => String::new(),
            };
        }
    }

    /// A method overriding a virtual base method is virtual even when it
    /// does not say so.
    fn propagate_virtuality(&mut self) {
        let ids: Vec<EntityId> = self.builder.ids().collect();
        for id in ids {
            let entity = self.builder.entity(id);
            let Some(sig) = entity.signature() else {
                continue;
            };
            if sig.virtuality.is_virtual()
                || sig.is_static
                || !matches!(entity.kind, EntityKind::Method | EntityKind::Destructor)
            {
                continue;
            }
            let Some(parent) = entity.parent else {
                continue;
            };
            let mut visited = HashSet::new();
            if self.base_declares_virtual(parent, entity, &mut visited) {
                debug!("{} overrides a virtual base method", entity.key);
                if let EntityDetail::Callable(sig) = &mut self.builder.entity_mut(id).detail {
                    sig.virtuality.dispatch = Dispatch::Virtual;
                }
            }
        }
    }

    fn base_declares_virtual(
        &self,
        record: EntityId,
        method: &Entity,
        visited: &mut HashSet<EntityId>,
    ) -> bool {
        if !visited.insert(record) {
            return false;
        }
        let Some(info) = self.builder.entity(record).record() else {
            return false;
        };
        if method.signature().is_none() {
            return false;
        }
        for base in &info.bases {
            let Some(base_id) = self.builder.find(strip_template_args(&base.name)) else {
                continue;
            };
            let base_entity = self.builder.entity(base_id);
            let overridden = base_entity.children.iter().any(|child| {
                let candidate = self.builder.entity(*child);
                candidate.is_virtual_method() && method.shares_slot_with(candidate)
            });
            if overridden || self.base_declares_virtual(base_id, method, visited) {
                return true;
            }
        }
        false
    }
}

#[allow(clippy::too_many_arguments)]
fn new_entity(
    node: &DeclNode,
    key: String,
    qualified_name: String,
    name: String,
    kind: EntityKind,
    access: Access,
    detail: EntityDetail,
    draft: Draft,
) -> Entity {
    Entity {
        id: EntityId(0),
        key,
        qualified_name,
        name,
        kind,
        access,
        parent: None,
        children: Vec::new(),
        location: node.location.clone(),
        detail,
        template: None,
        attributes: draft.attributes,
        unknown_facets: draft.unknown,
        external_linkage: false,
    }
}

fn member_access(node: &DeclNode, scope: &Scope) -> Access {
    match scope.record {
        Some(_) => node.access.unwrap_or_else(|| scope.default_access()),
        None => Access::Public,
    }
}

fn template_info(params: &[crate::TemplateParamDecl]) -> TemplateInfo {
    TemplateInfo {
        params: params
            .iter()
            .map(|p| {
                let kind = match p.kind {
                    TemplateParamDeclKind::Type => TemplateParamKind::Type,
                    TemplateParamDeclKind::NonType => TemplateParamKind::NonType,
                    TemplateParamDeclKind::Template => TemplateParamKind::Template,
                };
                TemplateParam {
                    kind,
                    ty: match kind {
                        TemplateParamKind::NonType => p.ty.as_deref().map(CanonicalType::parse),
                        _ => None,
                    },
                    default: p.default.as_deref().map(|d| match kind {
                        TemplateParamKind::NonType => canonical_expression(d),
                        _ => CanonicalType::parse(d).to_string(),
                    }),
                    is_pack: p.is_pack,
                }
            })
            .collect(),
    }
}

fn is_attribute_token(token: &str) -> bool {
    token.starts_with("[[") || token.starts_with("__attribute__") || token.starts_with("__declspec")
}

fn split_attribute_list(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                items.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items
}
