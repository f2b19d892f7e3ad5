use crate::matcher::{EditCost, MatchRecord, MatchResult};
use crate::rules::{Finding, PairContext, SideContext, ADDITION_RULES, PAIR_RULES, REMOVAL_RULES};
use cxxcompat_core::{Change, ChangeKind, Entity, PolicyConfig, Surface, Tier};
use tracing::{debug, info};

/// Turns match records into [`Change`]s using the rule tables and a policy.
pub struct Classifier<'p> {
    policy: &'p PolicyConfig,
}

impl<'p> Classifier<'p> {
    pub fn new(policy: &'p PolicyConfig) -> Self {
        Self { policy }
    }

    /// Raw findings for a pairing, before the policy is applied.
    pub fn pair_findings(old: &Surface, a: &Entity, new: &Surface, b: &Entity) -> Vec<Finding> {
        let ctx = PairContext { old, new, a, b };
        PAIR_RULES.iter().flat_map(|rule| (rule.check)(&ctx)).collect()
    }

    pub fn classify(&self, old: &Surface, new: &Surface, matches: &MatchResult) -> Vec<Change> {
        let mut changes = Vec::new();

        for record in &matches.records {
            match *record {
                MatchRecord::Matched {
                    old: a,
                    new: b,
                    ambiguous,
                } => {
                    let (a, b) = (old.get(a), new.get(b));
                    let findings = Self::pair_findings(old, a, new, b);
                    if !findings.is_empty() {
                        debug!("{}: {} finding(s)", a.key, findings.len());
                    }
                    let facets = describe_facets(&[a, b]);
                    for finding in findings {
                        changes.push(self.change(a, Some(b), finding, &facets, ambiguous));
                    }
                    if ambiguous {
                        let finding = Finding {
                            kind: ChangeKind::AmbiguousMatch,
                            tier: Tier::Unknown,
                            rationale: format!("paired with {} among several equal candidates", b.key),
                        };
                        changes.push(self.change(a, Some(b), finding, &facets, true));
                    }
                }
                MatchRecord::Removed { old: id } => {
                    let entity = old.get(id);
                    let ctx = side_context(old, entity, |p| matches.is_old_matched(p));
                    let facets = describe_facets(&[entity]);
                    for rule in REMOVAL_RULES {
                        for finding in (rule.check)(&ctx) {
                            changes.push(self.change(entity, None, finding, &facets, false));
                        }
                    }
                }
                MatchRecord::Added { new: id } => {
                    let entity = new.get(id);
                    let ctx = side_context(new, entity, |p| matches.is_new_matched(p));
                    let facets = describe_facets(&[entity]);
                    for rule in ADDITION_RULES {
                        for finding in (rule.check)(&ctx) {
                            changes.push(self.change(entity, None, finding, &facets, false));
                        }
                    }
                }
            }
        }

        for (surface, side) in [(old, "old"), (new, "new")] {
            for region in surface.unparsed_regions() {
                changes.push(Change {
                    qualified_name: String::new(),
                    key: String::new(),
                    kind: ChangeKind::UnparsedRegion,
                    tier: Tier::Unknown,
                    rationale: format!("{} surface {}: {} not parsed", side, surface.label(), region.facet),
                    unknown_facets: vec![format!("{} `{}`", region.facet, region.raw)],
                    ambiguous: false,
                    location: None,
                });
            }
        }

        info!("Classified {} change(s)", changes.len());
        changes
    }

    fn change(
        &self,
        primary: &Entity,
        other: Option<&Entity>,
        finding: Finding,
        facets: &[String],
        ambiguous: bool,
    ) -> Change {
        let location = other
            .and_then(|e| e.location.clone())
            .or_else(|| primary.location.clone());
        Change {
            qualified_name: primary.qualified_name.clone(),
            key: primary.key.clone(),
            kind: finding.kind,
            tier: self.policy.resolve(finding.kind, finding.tier),
            rationale: finding.rationale,
            unknown_facets: facets.to_vec(),
            ambiguous,
            location,
        }
    }
}

fn side_context<'s>(
    surface: &'s Surface,
    entity: &'s Entity,
    is_matched: impl Fn(cxxcompat_core::EntityId) -> bool,
) -> SideContext<'s> {
    let parent = entity.parent;
    SideContext {
        surface,
        entity,
        parent_survives: parent.map(&is_matched).unwrap_or(false),
        parent_unmatched: parent.map(|p| !is_matched(p)).unwrap_or(false),
    }
}

fn describe_facets(entities: &[&Entity]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entity in entities {
        for facet in &entity.unknown_facets {
            let text = format!("{} `{}`", facet.facet, facet.raw);
            if !out.contains(&text) {
                out.push(text);
            }
        }
    }
    out
}

impl EditCost for Classifier<'_> {
    fn edit_cost(&self, old: &Surface, a: &Entity, new: &Surface, b: &Entity) -> usize {
        Self::pair_findings(old, a, new, b).len()
    }
}
