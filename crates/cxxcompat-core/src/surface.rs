use crate::{CompatError, Entity, EntityDetail, EntityId, KindFamily, Result, UnknownFacet};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One snapshot of a declaration surface.
///
/// Entities live in an arena owned by the surface: a child is referenced by
/// its parent's `children` and holds a non-owning `parent` id back. Once
/// built the surface is read-only.
#[derive(Debug, Clone, Serialize)]
pub struct Surface {
    label: String,
    entities: Vec<Entity>,
    roots: Vec<EntityId>,
    /// Translation-unit level regions the front-end could not parse.
    unparsed: Vec<UnknownFacet>,
    #[serde(skip)]
    by_key: HashMap<String, EntityId>,
    #[serde(skip)]
    by_name: HashMap<String, Vec<EntityId>>,
}

impl Surface {
    pub fn builder(label: impl Into<String>) -> SurfaceBuilder {
        SurfaceBuilder {
            label: label.into(),
            entities: Vec::new(),
            roots: Vec::new(),
            unparsed: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    /// Lookup by identity key.
    pub fn find(&self, key: &str) -> Option<&Entity> {
        self.by_key.get(key).map(|id| self.get(*id))
    }

    /// All entities sharing a qualified name (overloads, in declaration order).
    pub fn lookup(&self, qualified_name: &str) -> impl Iterator<Item = &Entity> + '_ {
        self.by_name
            .get(qualified_name)
            .into_iter()
            .flatten()
            .map(move |id| self.get(*id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.roots.iter().map(move |id| self.get(*id))
    }

    pub fn children(&self, id: EntityId) -> impl Iterator<Item = &Entity> + '_ {
        self.get(id).children.iter().map(move |c| self.get(*c))
    }

    /// Classes, structs and unions in declaration order.
    pub fn records(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter().filter(|e| e.kind.is_record())
    }

    pub fn parent(&self, id: EntityId) -> Option<&Entity> {
        self.get(id).parent.map(|p| self.get(p))
    }

    pub fn unparsed_regions(&self) -> &[UnknownFacet] {
        &self.unparsed
    }

    /// Non-static fields of a record in declaration order.
    pub fn fields_in_layout_order(&self, record: EntityId) -> Vec<&Entity> {
        let mut fields: Vec<&Entity> = self
            .children(record)
            .filter(|e| e.is_instance_field())
            .collect();
        fields.sort_by_key(|e| e.field().and_then(|f| f.layout_index));
        fields
    }

    /// Sibling overloads: callables with the same qualified name, excluding
    /// `entity` itself.
    pub fn overload_siblings<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a Entity> {
        self.lookup(&entity.qualified_name)
            .filter(move |e| e.id != entity.id && e.kind.is_callable())
    }

    /// Whether a direct or indirect base of the record enclosing `method`
    /// declares a virtual function in the same slot.
    pub fn base_declares_slot(&self, method: &Entity) -> bool {
        let Some(parent) = method.parent else {
            return false;
        };
        let mut pending = vec![parent];
        let mut visited = HashSet::new();
        while let Some(record) = pending.pop() {
            if !visited.insert(record) {
                continue;
            }
            let Some(info) = self.get(record).record() else {
                continue;
            };
            for base in &info.bases {
                let Some(base) = self.find(strip_template_args(&base.name)) else {
                    continue;
                };
                if self
                    .children(base.id)
                    .any(|c| c.is_virtual_method() && c.shares_slot_with(method))
                {
                    return true;
                }
                pending.push(base.id);
            }
        }
        false
    }
}

/// `S3<T, N>` → `S3`
pub fn strip_template_args(name: &str) -> &str {
    match name.find('<') {
        Some(pos) if !name.starts_with("operator") => name[..pos].trim_end(),
        _ => name,
    }
}

/// Mutable phase of a [`Surface`]. Only the extractor builds surfaces.
pub struct SurfaceBuilder {
    label: String,
    entities: Vec<Entity>,
    roots: Vec<EntityId>,
    unparsed: Vec<UnknownFacet>,
    by_key: HashMap<String, EntityId>,
}

impl SurfaceBuilder {
    /// Inserts an entity under `parent`. Redeclarations of the same key are
    /// merged into the first declaration; a key reused by a different kind
    /// family means the input cannot be modelled and is rejected.
    pub fn insert(&mut self, parent: Option<EntityId>, mut entity: Entity) -> Result<EntityId> {
        if let Some(existing) = self.by_key.get(&entity.key).copied() {
            let current = &mut self.entities[existing.0];
            if current.kind.family() != entity.kind.family() {
                return Err(CompatError::malformed(
                    entity.key.clone(),
                    entity.location.clone(),
                    format!(
                        "`{}` declared both as {} and {}",
                        entity.qualified_name, current.kind, entity.kind
                    ),
                ));
            }
            if current.detail != entity.detail && current.kind.family() != KindFamily::Scope {
                warn!(
                    "Redeclaration of {} differs from the first declaration; keeping the first",
                    entity.key
                );
            }
            debug!("Merged redeclaration of {}", entity.key);
            merge_redeclaration(current, entity);
            return Ok(existing);
        }

        let id = EntityId(self.entities.len());
        entity.id = id;
        entity.parent = parent;
        entity.children.clear();
        self.by_key.insert(entity.key.clone(), id);
        self.entities.push(entity);
        match parent {
            Some(p) => self.entities[p.0].children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }

    pub fn find(&self, key: &str) -> Option<EntityId> {
        self.by_key.get(key).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> {
        (0..self.entities.len()).map(EntityId)
    }

    pub fn add_unparsed(&mut self, facet: UnknownFacet) {
        self.unparsed.push(facet);
    }

    pub fn build(self) -> Surface {
        let mut by_name: HashMap<String, Vec<EntityId>> = HashMap::new();
        for entity in &self.entities {
            by_name
                .entry(entity.qualified_name.clone())
                .or_default()
                .push(entity.id);
        }
        Surface {
            label: self.label,
            entities: self.entities,
            roots: self.roots,
            unparsed: self.unparsed,
            by_key: self.by_key,
            by_name,
        }
    }
}

fn merge_redeclaration(current: &mut Entity, later: Entity) {
    current.attributes.extend(later.attributes);
    for facet in later.unknown_facets {
        if !current.unknown_facets.contains(&facet) {
            current.unknown_facets.push(facet);
        }
    }
    // Default arguments may be supplied by a later redeclaration.
    if let (EntityDetail::Callable(first), EntityDetail::Callable(second)) =
        (&mut current.detail, &later.detail)
    {
        for (param, other) in first.params.iter_mut().zip(&second.params) {
            if param.default.is_none() {
                param.default = other.default.clone();
            }
        }
    }
    if current.template.is_none() {
        current.template = later.template;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Access, EntityKind, RecordInfo};

    fn record(key: &str) -> Entity {
        Entity {
            id: EntityId(0),
            key: key.to_string(),
            qualified_name: key.to_string(),
            name: key.rsplit("::").next().unwrap_or(key).to_string(),
            kind: EntityKind::Struct,
            access: Access::Public,
            parent: None,
            children: Vec::new(),
            location: None,
            detail: EntityDetail::Record(RecordInfo::default()),
            template: None,
            attributes: Default::default(),
            unknown_facets: Vec::new(),
            external_linkage: false,
        }
    }

    #[test]
    fn builder_links_parents_and_children() {
        let mut builder = Surface::builder("v1");
        let outer = builder.insert(None, record("S2")).unwrap();
        let inner = builder.insert(Some(outer), record("S2::C")).unwrap();
        let surface = builder.build();

        assert_eq!(surface.len(), 2);
        assert_eq!(surface.roots().count(), 1);
        assert_eq!(surface.parent(inner).map(|e| e.key.as_str()), Some("S2"));
        assert_eq!(
            surface.children(outer).map(|e| e.key.clone()).collect::<Vec<_>>(),
            vec!["S2::C".to_string()]
        );
        assert!(surface.find("S2::C").is_some());
        assert_eq!(surface.lookup("S2").count(), 1);
        assert_eq!(surface.records().count(), 2);
    }

    #[test]
    fn redeclaration_is_merged() {
        let mut builder = Surface::builder("v1");
        let first = builder.insert(None, record("S")).unwrap();
        let mut again = record("S");
        again.attributes.insert("deprecated".into());
        let second = builder.insert(None, again).unwrap();
        assert_eq!(first, second);
        let surface = builder.build();
        assert_eq!(surface.len(), 1);
        assert!(surface.get(first).attributes.contains("deprecated"));
    }

    #[test]
    fn conflicting_families_are_malformed() {
        let mut builder = Surface::builder("v1");
        builder.insert(None, record("X")).unwrap();
        let mut ns = record("X");
        ns.kind = EntityKind::Namespace;
        ns.detail = EntityDetail::Namespace { is_inline: false };
        let err = builder.insert(None, ns).unwrap_err();
        assert!(matches!(err, CompatError::MalformedSurface { .. }));
    }
}
