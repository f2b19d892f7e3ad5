// ABOUTME: C++ front-end turning a tree-sitter-cpp syntax tree into a declaration tree.
// ABOUTME: Reports names, written types and raw specifier tokens; meaning is decided downstream.

use crate::{
    BaseDecl, DeclKind, DeclNode, EnumeratorDecl, InputFormat, LanguageRegistry, ParamDecl,
    TemplateParamDecl, TemplateParamDeclKind,
};
use cxxcompat_core::{Access, CompatError, Result, SourceLocation};
use tracing::{debug, trace};
use tree_sitter::{Node, Tree};

const SNIPPET_LEN: usize = 80;

/// Declaration front-end for C++ headers.
///
/// Walks namespaces, records, enums, aliases, templates and member or free
/// declarations. Function bodies are never entered. Regions tree-sitter
/// could not parse become [`DeclKind::Unparsed`] nodes, or an `unparsed`
/// note on the declaration they damaged.
pub struct CppDeclExtractor;

impl CppDeclExtractor {
    pub fn extract(tree: &Tree, content: &str, file_path: &str) -> DeclNode {
        let collector = CppCollector { content, file_path };
        let root = tree.root_node();
        let mut unit = DeclNode::translation_unit(collector.scope_items(root, None));
        unit.location = Some(collector.location(&root));
        unit
    }
}

/// Parses one C++ source buffer into a declaration tree.
pub fn parse_cpp(content: &str, file_path: &str) -> Result<DeclNode> {
    let registry = LanguageRegistry::new();
    let mut parser = registry
        .create_parser(InputFormat::Cpp)
        .ok_or_else(|| CompatError::Parse("C++ grammar unavailable".to_string()))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| CompatError::Parse(format!("Failed to parse {}", file_path)))?;
    Ok(CppDeclExtractor::extract(&tree, content, file_path))
}

/// Pieces of a function declarator.
struct FnParts<'t> {
    name: String,
    /// The declarator node that owns `params` and the specifiers after it.
    function: Node<'t>,
    params: Node<'t>,
    /// Pointer/reference operators wrapping the function declarator; they
    /// belong to the return type.
    ops: String,
    /// Type of a conversion operator.
    cast_type: Option<String>,
}

#[derive(Default)]
struct Leading {
    specifiers: Vec<String>,
    cv: String,
    attributes: Vec<String>,
}

struct CppCollector<'a> {
    content: &'a str,
    file_path: &'a str,
}

impl<'a> CppCollector<'a> {
    fn node_text(&self, node: &Node) -> String {
        node.utf8_text(self.content.as_bytes())
            .unwrap_or("")
            .to_string()
    }

    fn location(&self, node: &Node) -> SourceLocation {
        SourceLocation::new(
            self.file_path,
            (node.start_position().row + 1) as u32,
            (node.start_position().column + 1) as u32,
        )
    }

    fn snippet(&self, node: &Node) -> String {
        let text = self.node_text(node);
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(SNIPPET_LEN).collect()
    }

    fn unparsed(&self, node: &Node) -> DeclNode {
        let mut decl = DeclNode::new(DeclKind::Unparsed);
        decl.location = Some(self.location(node));
        decl.unparsed.push(self.snippet(node));
        decl
    }

    /// Items of a translation unit, namespace body or class body. `access`
    /// is the default member access when walking a class body.
    fn scope_items(&self, scope: Node, access: Option<Access>) -> Vec<DeclNode> {
        let mut items = Vec::new();
        let mut current = access;
        let mut cursor = scope.walk();
        for child in scope.named_children(&mut cursor) {
            match child.kind() {
                "access_specifier" => {
                    current = Access::parse(&self.node_text(&child)).or(current);
                }
                "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" => {
                    items.extend(self.scope_items(child, current));
                }
                "ERROR" => items.push(self.unparsed(&child)),
                "comment" | "preproc_include" | "preproc_def" | "preproc_function_def"
                | "preproc_call" | "using_declaration" | "static_assert_declaration"
                | "friend_declaration" | "namespace_alias_definition" | "concept_definition"
                | "identifier" | "preproc_defined" => {
                    trace!("skipping {}", child.kind());
                }
                _ => {
                    for mut decl in self.declaration(child) {
                        if current.is_some() && decl.access.is_none() {
                            decl.access = current;
                        }
                        items.push(decl);
                    }
                }
            }
        }
        items
    }

    fn declaration(&self, node: Node) -> Vec<DeclNode> {
        match node.kind() {
            "namespace_definition" => vec![self.namespace(node)],
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.record(node).into_iter().collect()
            }
            "enum_specifier" => self.enumeration(node).into_iter().collect(),
            "template_declaration" => self.template(node),
            "alias_declaration" => self.alias(node).into_iter().collect(),
            "type_definition" => self.typedef(node),
            "field_declaration" | "declaration" | "function_definition" => self.member(node),
            "linkage_specification" => match node.child_by_field_name("body") {
                Some(body) if body.kind() == "declaration_list" => self.scope_items(body, None),
                Some(body) => self.declaration(body),
                None => Vec::new(),
            },
            "ERROR" => vec![self.unparsed(&node)],
            other => {
                debug!("Ignoring {} at {}", other, self.location(&node));
                Vec::new()
            }
        }
    }

    fn namespace(&self, node: Node) -> DeclNode {
        let mut decl = DeclNode::new(DeclKind::Namespace);
        decl.name = node
            .child_by_field_name("name")
            .map(|n| self.node_text(&n).split_whitespace().collect());
        decl.location = Some(self.location(&node));
        let mut cursor = node.walk();
        if node.children(&mut cursor).any(|c| c.kind() == "inline") {
            decl.specifiers.push("inline".to_string());
        }
        if let Some(body) = node.child_by_field_name("body") {
            decl.children = self.scope_items(body, None);
        }
        decl
    }

    fn record(&self, node: Node) -> Option<DeclNode> {
        // Forward declarations and elaborated type uses carry no surface.
        let body = node.child_by_field_name("body")?;
        let (kind, default_access) = match node.kind() {
            "class_specifier" => (DeclKind::Class, Access::Private),
            "union_specifier" => (DeclKind::Union, Access::Public),
            _ => (DeclKind::Struct, Access::Public),
        };

        let mut decl = DeclNode::new(kind);
        decl.name = node
            .child_by_field_name("name")
            .map(|n| self.node_text(&n));
        decl.location = Some(self.location(&node));

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "base_class_clause" => decl.bases = self.bases(child),
                "virtual_specifier" => decl.specifiers.push(self.node_text(&child)),
                "attribute_declaration" | "attribute_specifier" | "ms_declspec_modifier"
                | "alignas_qualifier" => decl.attributes.push(self.node_text(&child)),
                _ => {}
            }
        }

        decl.children = self.scope_items(body, Some(default_access));
        Some(decl)
    }

    fn bases(&self, clause: Node) -> Vec<BaseDecl> {
        let mut bases = Vec::new();
        let mut access = None;
        let mut is_virtual = false;
        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "access_specifier" => access = Access::parse(&self.node_text(&child)),
                "virtual" | "virtual_function_specifier" => is_virtual = true,
                "type_identifier" | "qualified_type_identifier" | "template_type" => {
                    bases.push(BaseDecl {
                        name: self.node_text(&child),
                        access: access.take(),
                        is_virtual,
                    });
                    is_virtual = false;
                }
                "," => {
                    access = None;
                    is_virtual = false;
                }
                _ => {}
            }
        }
        bases
    }

    fn enumeration(&self, node: Node) -> Option<DeclNode> {
        let body = node.child_by_field_name("body")?;
        let mut decl = DeclNode::new(DeclKind::Enum);
        decl.name = node
            .child_by_field_name("name")
            .map(|n| self.node_text(&n));
        decl.location = Some(self.location(&node));
        decl.ty = node.child_by_field_name("base").map(|b| self.node_text(&b));

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "class" | "struct" => decl.specifiers.push(child.kind().to_string()),
                "attribute_declaration" | "attribute_specifier" => {
                    decl.attributes.push(self.node_text(&child))
                }
                _ => {}
            }
        }

        let mut cursor = body.walk();
        for enumerator in body.named_children(&mut cursor) {
            if enumerator.kind() != "enumerator" {
                continue;
            }
            if let Some(name) = enumerator.child_by_field_name("name") {
                decl.enumerators.push(EnumeratorDecl {
                    name: self.node_text(&name),
                    value: enumerator
                        .child_by_field_name("value")
                        .map(|v| self.node_text(&v)),
                });
            }
        }
        Some(decl)
    }

    fn alias(&self, node: Node) -> Option<DeclNode> {
        let name = node.child_by_field_name("name")?;
        let mut decl = DeclNode::named(DeclKind::TypeAlias, self.node_text(&name));
        decl.location = Some(self.location(&node));
        decl.ty = node.child_by_field_name("type").map(|t| self.node_text(&t));
        if node.has_error() {
            decl.unparsed.push(self.snippet(&node));
        }
        Some(decl)
    }

    fn typedef(&self, node: Node) -> Vec<DeclNode> {
        let leading = self.leading(node);
        let type_node = node.child_by_field_name("type");
        let mut out = Vec::new();
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();

        // `typedef struct { ... } name;` names the otherwise anonymous record.
        if let Some(ty) = type_node.filter(|t| is_tag_specifier(t.kind())) {
            if let Some(mut record) = self.tag_declaration(ty) {
                if record.name.is_none() {
                    if let Some(first) = declarators.first().and_then(|d| self.declarator_name(*d)) {
                        record.name = Some(first);
                        out.push(record);
                        return out;
                    }
                }
                out.push(record);
            }
        }

        for declarator in declarators {
            let Some(name) = self.declarator_name(declarator) else {
                continue;
            };
            let mut decl = DeclNode::named(DeclKind::TypeAlias, name);
            decl.location = Some(self.location(&node));
            decl.ty = Some(self.declared_type(type_node, &leading.cv, Some(declarator)));
            out.push(decl);
        }
        out
    }

    fn template(&self, node: Node) -> Vec<DeclNode> {
        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.template_params(p))
            .unwrap_or_default();
        let mut constraint = None;
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "template_parameter_list" => {}
                "requires_clause" => constraint = Some(self.node_text(&child)),
                _ => out.extend(self.declaration(child)),
            }
        }
        for decl in &mut out {
            if decl.template_params.is_none() {
                decl.template_params = Some(params.clone());
            }
            if let Some(constraint) = &constraint {
                decl.trailing.push(constraint.clone());
            }
        }
        out
    }

    fn template_params(&self, list: Node) -> Vec<TemplateParamDecl> {
        let mut params = Vec::new();
        let mut cursor = list.walk();
        for param in list.named_children(&mut cursor) {
            let (kind, is_pack) = match param.kind() {
                "type_parameter_declaration" | "optional_type_parameter_declaration" => {
                    (TemplateParamDeclKind::Type, false)
                }
                "variadic_type_parameter_declaration" => (TemplateParamDeclKind::Type, true),
                "parameter_declaration" | "optional_parameter_declaration" => {
                    (TemplateParamDeclKind::NonType, false)
                }
                "variadic_parameter_declaration" => (TemplateParamDeclKind::NonType, true),
                "template_template_parameter_declaration" => {
                    (TemplateParamDeclKind::Template, false)
                }
                _ => continue,
            };

            let mut decl = TemplateParamDecl {
                kind,
                name: None,
                ty: None,
                default: None,
                is_pack,
            };
            match kind {
                TemplateParamDeclKind::NonType => {
                    let declarator = param.child_by_field_name("declarator");
                    let leading = self.leading(param);
                    decl.name = declarator.and_then(|d| self.declarator_name(d));
                    let ty =
                        self.declared_type(param.child_by_field_name("type"), &leading.cv, declarator);
                    decl.ty = Some(ty.trim_end_matches("...").trim().to_string());
                    decl.default = param
                        .child_by_field_name("default_value")
                        .map(|v| self.node_text(&v));
                }
                _ => {
                    decl.name = param
                        .child_by_field_name("name")
                        .or_else(|| last_named_of_kind(param, "type_identifier"))
                        .map(|n| self.node_text(&n));
                    decl.default = param
                        .child_by_field_name("default_type")
                        .map(|v| self.node_text(&v));
                }
            }
            params.push(decl);
        }
        params
    }

    fn tag_declaration(&self, ty: Node) -> Option<DeclNode> {
        match ty.kind() {
            "enum_specifier" => self.enumeration(ty),
            _ => self.record(ty),
        }
    }

    /// `field_declaration`, `declaration` or `function_definition`.
    fn member(&self, node: Node) -> Vec<DeclNode> {
        let leading = self.leading(node);
        let type_node = node.child_by_field_name("type");
        let mut out = Vec::new();

        if let Some(ty) = type_node.filter(|t| is_tag_specifier(t.kind())) {
            if let Some(mut tag) = self.tag_declaration(ty) {
                tag.attributes.extend(leading.attributes.iter().cloned());
                out.push(tag);
            }
        }

        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        let single = declarators.len() == 1;

        for declarator in declarators {
            let mut decl = match self.function_parts(declarator) {
                Some(parts) => self.function(node, type_node, &leading, parts, declarator, single),
                None => self.data(node, type_node, &leading, declarator),
            };
            if declarator.has_error() || type_node.map(|t| t.has_error()).unwrap_or(false) {
                decl.unparsed.push(self.snippet(&node));
            }
            out.push(decl);
        }
        out
    }

    fn function(
        &self,
        node: Node,
        type_node: Option<Node>,
        leading: &Leading,
        parts: FnParts,
        declarator: Node,
        single: bool,
    ) -> DeclNode {
        let mut decl = DeclNode::named(DeclKind::Function, parts.name.clone());
        decl.location = Some(self.location(&node));
        decl.specifiers = leading.specifiers.clone();
        decl.attributes = leading.attributes.clone();
        decl.ty = match (&parts.cast_type, type_node) {
            (Some(cast), _) => Some(cast.clone()),
            (None, Some(ty)) => Some(format!("{}{}{}", leading.cv, self.node_text(&ty), parts.ops)),
            (None, None) => None,
        };

        let mut cursor = parts.params.walk();
        for param in parts.params.children(&mut cursor) {
            match param.kind() {
                "parameter_declaration"
                | "optional_parameter_declaration"
                | "variadic_parameter_declaration" => {
                    let param_leading = self.leading(param);
                    let param_declarator = param.child_by_field_name("declarator");
                    decl.params.push(ParamDecl {
                        ty: self.declared_type(
                            param.child_by_field_name("type"),
                            &param_leading.cv,
                            param_declarator,
                        ),
                        name: param_declarator.and_then(|d| self.declarator_name(d)),
                        default: param
                            .child_by_field_name("default_value")
                            .map(|v| self.node_text(&v)),
                    });
                }
                "..." => decl.variadic = true,
                _ => {}
            }
        }

        let body = node.child_by_field_name("body");
        decl.has_body = body.map(|b| b.kind() == "compound_statement").unwrap_or(false);

        decl.trailing = self.trailing_tokens(node, &parts, declarator, body, single);
        decl
    }

    /// Specifier tokens after the parameter list, in source order: those the
    /// grammar attaches to the function declarator (`const`, `&&`,
    /// `noexcept(...)`, `override`, `-> T`, `requires ...`), then the
    /// `= 0` / `= default` / `= delete` clause of the owning declaration.
    fn trailing_tokens(
        &self,
        node: Node,
        parts: &FnParts,
        declarator: Node,
        body: Option<Node>,
        single: bool,
    ) -> Vec<String> {
        let mut tokens = Vec::new();
        let after = parts.params.end_byte();

        let mut current = Some(parts.function);
        while let Some(level) = current {
            let mut cursor = level.walk();
            for child in level.children(&mut cursor) {
                if child.start_byte() >= after {
                    self.push_trailing(&mut tokens, child);
                }
            }
            if level.id() == declarator.id() || level.id() == node.id() {
                break;
            }
            current = level.parent();
        }

        if !single {
            return tokens;
        }
        let mut stop = node.end_byte();
        if let Some(body) = body.filter(|b| matches!(b.kind(), "compound_statement" | "try_statement")) {
            stop = stop.min(body.start_byte());
        }
        let mut pending_assign = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.start_byte() < declarator.end_byte() || child.start_byte() >= stop {
                continue;
            }
            match child.kind() {
                "field_initializer_list" => break,
                ";" => {}
                "=" => pending_assign = true,
                "default_method_clause" | "delete_method_clause" | "pure_virtual_clause" => {
                    tokens.push(self.node_text(&child).trim_end_matches(';').trim().to_string())
                }
                _ if pending_assign => {
                    pending_assign = false;
                    tokens.push(format!("= {}", self.node_text(&child).trim()));
                }
                _ => self.push_trailing(&mut tokens, child),
            }
        }
        tokens
    }

    fn push_trailing(&self, tokens: &mut Vec<String>, child: Node) {
        if child.is_missing() || matches!(child.kind(), "comment" | ";") {
            return;
        }
        let text = self.node_text(&child);
        let text = text.trim();
        if !text.is_empty() {
            tokens.push(text.to_string());
        }
    }

    fn data(&self, node: Node, type_node: Option<Node>, leading: &Leading, declarator: Node) -> DeclNode {
        let kind = if node.kind() == "field_declaration" {
            DeclKind::Field
        } else {
            DeclKind::Variable
        };
        let (inner, initializer) = if declarator.kind() == "init_declarator" {
            (
                declarator.child_by_field_name("declarator").unwrap_or(declarator),
                declarator
                    .child_by_field_name("value")
                    .map(|v| self.node_text(&v)),
            )
        } else {
            (
                declarator,
                node.child_by_field_name("default_value")
                    .map(|v| self.node_text(&v)),
            )
        };

        let mut decl = DeclNode::new(kind);
        decl.name = self.declarator_name(inner);
        decl.location = Some(self.location(&node));
        decl.specifiers = leading.specifiers.clone();
        decl.attributes = leading.attributes.clone();
        decl.ty = Some(self.declared_type(type_node, &leading.cv, Some(inner)));
        decl.initializer = initializer;

        let mut cursor = node.walk();
        decl.bit_width = node
            .children(&mut cursor)
            .find(|c| c.kind() == "bitfield_clause")
            .map(|c| self.node_text(&c).trim_start_matches(':').trim().to_string());
        decl
    }

    fn leading(&self, node: Node) -> Leading {
        let mut leading = Leading::default();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "storage_class_specifier" | "virtual" | "virtual_function_specifier"
                | "explicit_function_specifier" => {
                    leading.specifiers.push(self.node_text(&child))
                }
                "type_qualifier" => {
                    let text = self.node_text(&child);
                    if text == "const" || text == "volatile" {
                        leading.cv.push_str(&text);
                        leading.cv.push(' ');
                    } else {
                        leading.specifiers.push(text);
                    }
                }
                "attribute_declaration" | "attribute_specifier" | "ms_declspec_modifier"
                | "alignas_qualifier" => leading.attributes.push(self.node_text(&child)),
                _ => {}
            }
        }
        leading
    }

    fn function_parts<'t>(&self, declarator: Node<'t>) -> Option<FnParts<'t>> {
        match declarator.kind() {
            "function_declarator" => {
                let target = declarator.child_by_field_name("declarator")?;
                if target.kind() == "parenthesized_declarator" {
                    // Pointer to function: a variable, not a function.
                    return None;
                }
                Some(FnParts {
                    name: self.node_text(&target).split_whitespace().collect::<Vec<_>>().join(" "),
                    function: declarator,
                    params: declarator.child_by_field_name("parameters")?,
                    ops: String::new(),
                    cast_type: None,
                })
            }
            "operator_cast" => {
                let cast = self.node_text(&declarator.child_by_field_name("type")?);
                let inner = declarator.child_by_field_name("declarator")?;
                Some(FnParts {
                    name: format!("operator {}", cast),
                    function: inner,
                    params: inner.child_by_field_name("parameters")?,
                    ops: String::new(),
                    cast_type: Some(cast),
                })
            }
            "pointer_declarator" | "reference_declarator" => {
                let inner = match declarator.child_by_field_name("declarator") {
                    Some(inner) => inner,
                    None => last_named(declarator)?,
                };
                let mut parts = self.function_parts(inner)?;
                let op = self.content[declarator.start_byte()..inner.start_byte()].trim();
                parts.ops = format!("{}{}", op, parts.ops);
                Some(parts)
            }
            "attributed_declarator" => {
                let mut cursor = declarator.walk();
                let inner = declarator.named_children(&mut cursor).next()?;
                self.function_parts(inner)
            }
            _ => None,
        }
    }

    fn declarator_name(&self, declarator: Node) -> Option<String> {
        name_node(declarator).map(|n| self.node_text(&n))
    }

    /// Type as written: leading cv, the type specifier, then the declarator
    /// with its name cut out (`T array[N]` gives `T [N]`).
    fn declared_type(&self, type_node: Option<Node>, cv: &str, declarator: Option<Node>) -> String {
        let mut out = String::from(cv);
        if let Some(ty) = type_node {
            out.push_str(&self.node_text(&ty));
        }
        if let Some(declarator) = declarator {
            let text = self.node_text(&declarator);
            let rest = match name_node(declarator) {
                Some(name) => {
                    let from = name.start_byte() - declarator.start_byte();
                    let to = name.end_byte() - declarator.start_byte();
                    format!("{}{}", &text[..from], &text[to..])
                }
                None => text,
            };
            out.push(' ');
            out.push_str(rest.trim());
        }
        out.trim().to_string()
    }
}

fn is_tag_specifier(kind: &str) -> bool {
    matches!(
        kind,
        "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
    )
}

fn last_named<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let last = node.named_children(&mut cursor).last();
    last
}

fn last_named_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).filter(|c| c.kind() == kind).last();
    found
}

/// The identifier a declarator introduces, if any. Abstract declarators
/// have none.
fn name_node(declarator: Node) -> Option<Node> {
    match declarator.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier"
        | "destructor_name" | "operator_name" | "template_function" => Some(declarator),
        "init_declarator" | "pointer_declarator" | "array_declarator" | "function_declarator" => {
            name_node(declarator.child_by_field_name("declarator")?)
        }
        "reference_declarator" => name_node(last_named(declarator)?),
        "parenthesized_declarator" | "attributed_declarator" => {
            let mut cursor = declarator.walk();
            let first = declarator.named_children(&mut cursor).next()?;
            name_node(first)
        }
        _ => None,
    }
}
