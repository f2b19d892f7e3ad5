//! Correspondence between the entities of two surfaces.
//!
//! Entities are grouped by a [`MatchKey`]: qualified name, kind family,
//! template shape and, for callables, the canonical parameter list. Object
//! qualifiers and default arguments are left out so that a method gaining
//! `const` or losing a default still pairs with its old self. A group with a
//! single candidate per side is a direct match; larger groups are settled by
//! a greedy minimum-cost assignment.

use cxxcompat_core::{Diagnostic, Entity, EntityId, KindFamily, Surface};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum MatchRecord {
    Removed { old: EntityId },
    Added { new: EntityId },
    Matched { old: EntityId, new: EntityId, ambiguous: bool },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchResult {
    pub records: Vec<MatchRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MatchResult {
    pub fn matched(&self) -> impl Iterator<Item = (EntityId, EntityId, bool)> + '_ {
        self.records.iter().filter_map(|r| match r {
            MatchRecord::Matched { old, new, ambiguous } => Some((*old, *new, *ambiguous)),
            _ => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records.iter().filter_map(|r| match r {
            MatchRecord::Removed { old } => Some(*old),
            _ => None,
        })
    }

    pub fn added(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records.iter().filter_map(|r| match r {
            MatchRecord::Added { new } => Some(*new),
            _ => None,
        })
    }

    pub fn is_old_matched(&self, id: EntityId) -> bool {
        self.matched().any(|(old, _, _)| old == id)
    }

    pub fn is_new_matched(&self, id: EntityId) -> bool {
        self.matched().any(|(_, new, _)| new == id)
    }
}

/// Cost of pairing two entities: the number of findings the pairing would
/// produce.
pub trait EditCost {
    fn edit_cost(&self, old: &Surface, a: &Entity, new: &Surface, b: &Entity) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct MatchKey {
    qualified_name: String,
    family: KindFamily,
    template_shape: String,
    params: String,
}

impl MatchKey {
    fn of(entity: &Entity) -> Self {
        Self {
            qualified_name: entity.qualified_name.clone(),
            family: entity.kind.family(),
            template_shape: entity
                .template
                .as_ref()
                .map(|t| t.shape_key())
                .unwrap_or_default(),
            params: entity
                .signature()
                .map(|s| s.param_list())
                .unwrap_or_default(),
        }
    }
}

pub struct Matcher<'c, C: EditCost> {
    cost: &'c C,
}

impl<'c, C: EditCost> Matcher<'c, C> {
    pub fn new(cost: &'c C) -> Self {
        Self { cost }
    }

    pub fn match_surfaces(&self, old: &Surface, new: &Surface) -> MatchResult {
        let mut groups: BTreeMap<MatchKey, (Vec<EntityId>, Vec<EntityId>)> = BTreeMap::new();
        for entity in old.iter() {
            groups.entry(MatchKey::of(entity)).or_default().0.push(entity.id);
        }
        for entity in new.iter() {
            groups.entry(MatchKey::of(entity)).or_default().1.push(entity.id);
        }

        let mut pairs_by_old: HashMap<EntityId, Vec<MatchRecord>> = HashMap::new();
        let mut matched_new: HashSet<EntityId> = HashSet::new();
        let mut diagnostics = Vec::new();

        for (key, (olds, news)) in &groups {
            if olds.is_empty() || news.is_empty() {
                continue;
            }
            let pairs = if olds.len() == 1 && news.len() == 1 {
                vec![(olds[0], news[0], false)]
            } else {
                debug!(
                    "Resolving {} old / {} new candidates for {}{}",
                    olds.len(),
                    news.len(),
                    key.qualified_name,
                    key.params
                );
                self.assign(old, olds, new, news, &mut diagnostics)
            };
            for (o, n, ambiguous) in pairs {
                matched_new.insert(n);
                pairs_by_old.entry(o).or_default().push(MatchRecord::Matched {
                    old: o,
                    new: n,
                    ambiguous,
                });
            }
        }

        let mut records = Vec::with_capacity(old.len() + new.len());
        for entity in old.iter() {
            match pairs_by_old.remove(&entity.id) {
                Some(pairs) => records.extend(pairs),
                None => records.push(MatchRecord::Removed { old: entity.id }),
            }
        }
        for entity in new.iter() {
            if !matched_new.contains(&entity.id) {
                records.push(MatchRecord::Added { new: entity.id });
            }
        }

        let result = MatchResult {
            records,
            diagnostics,
        };
        info!(
            "Matched {} pair(s), {} removed, {} added",
            result.matched().count(),
            result.removed().count(),
            result.added().count()
        );
        result
    }

    /// Greedy minimum-cost assignment within one candidate group. Pairs
    /// tied at the current minimum that compete for the same entity are all
    /// reported as ambiguous.
    fn assign(
        &self,
        old: &Surface,
        olds: &[EntityId],
        new: &Surface,
        news: &[EntityId],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<(EntityId, EntityId, bool)> {
        let costs: Vec<Vec<usize>> = olds
            .iter()
            .map(|o| {
                news.iter()
                    .map(|n| self.cost.edit_cost(old, old.get(*o), new, new.get(*n)))
                    .collect()
            })
            .collect();

        let mut old_done = vec![false; olds.len()];
        let mut new_done = vec![false; news.len()];
        let mut pairs = Vec::new();

        loop {
            let open: Vec<(usize, usize)> = (0..olds.len())
                .filter(|i| !old_done[*i])
                .flat_map(|i| {
                    (0..news.len())
                        .filter(|j| !new_done[*j])
                        .map(move |j| (i, j))
                        .collect::<Vec<_>>()
                })
                .collect();
            let Some(min) = open.iter().map(|(i, j)| costs[*i][*j]).min() else {
                break;
            };
            let tied: Vec<(usize, usize)> = open
                .into_iter()
                .filter(|(i, j)| costs[*i][*j] == min)
                .collect();

            for &(i, j) in &tied {
                if old_done[i] || new_done[j] {
                    continue;
                }
                let conflicting: Vec<(usize, usize)> = tied
                    .iter()
                    .copied()
                    .filter(|(oi, nj)| *oi == i || *nj == j)
                    .collect();
                if conflicting.len() == 1 {
                    old_done[i] = true;
                    new_done[j] = true;
                    pairs.push((olds[i], news[j], false));
                    continue;
                }

                // Close the whole tie component reachable from this pair.
                let mut component: Vec<(usize, usize)> = Vec::new();
                let mut frontier = vec![(i, j)];
                while let Some((ci, cj)) = frontier.pop() {
                    if component.contains(&(ci, cj)) {
                        continue;
                    }
                    component.push((ci, cj));
                    frontier.extend(
                        tied.iter()
                            .copied()
                            .filter(|(oi, nj)| *oi == ci || *nj == cj),
                    );
                }
                component.sort();

                let candidates: Vec<String> = component
                    .iter()
                    .map(|(ci, cj)| {
                        format!(
                            "{} -> {}",
                            old.get(olds[*ci]).key,
                            new.get(news[*cj]).key
                        )
                    })
                    .collect();
                let name = old.get(olds[i]).qualified_name.clone();
                warn!("Ambiguous correspondence for {}: {}", name, candidates.join(", "));
                diagnostics.push(Diagnostic::AmbiguousMatch { name, candidates });

                for (ci, cj) in component {
                    old_done[ci] = true;
                    new_done[cj] = true;
                    pairs.push((olds[ci], news[cj], true));
                }
            }
        }
        pairs
    }
}
