use cxxcompat_core::{Change, Diagnostic, Result, Tier};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub counts: BTreeMap<Tier, usize>,
    pub max_tier: Option<Tier>,
    pub affected_entities: usize,
    pub total: usize,
}

impl ReportSummary {
    fn of(changes: &[Change]) -> Self {
        let mut counts: BTreeMap<Tier, usize> = Tier::ALL.iter().map(|t| (*t, 0)).collect();
        let mut affected = BTreeSet::new();
        for change in changes {
            *counts.entry(change.tier).or_default() += 1;
            affected.insert((&change.qualified_name, &change.key));
        }
        Self {
            counts,
            max_tier: changes.iter().map(|c| c.tier).max(),
            affected_entities: affected.len(),
            total: changes.len(),
        }
    }
}

/// Outcome of one comparison, ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatReport {
    pub old_label: String,
    pub new_label: String,
    pub changes: Vec<Change>,
    pub summary: ReportSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl CompatReport {
    pub fn new(
        old_label: impl Into<String>,
        new_label: impl Into<String>,
        changes: Vec<Change>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let summary = ReportSummary::of(&changes);
        Self {
            old_label: old_label.into(),
            new_label: new_label.into(),
            changes,
            summary,
            diagnostics,
        }
    }

    pub fn max_tier(&self) -> Option<Tier> {
        self.summary.max_tier
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Aggregate tier per entity key, in first-seen order.
    pub fn entity_tiers(&self) -> Vec<(&str, Tier)> {
        let mut out: Vec<(&str, Tier)> = Vec::new();
        for change in &self.changes {
            let key = if change.key.is_empty() {
                change.qualified_name.as_str()
            } else {
                change.key.as_str()
            };
            match out.iter_mut().find(|(k, _)| *k == key) {
                Some((_, tier)) => *tier = (*tier).max(change.tier),
                None => out.push((key, change.tier)),
            }
        }
        out
    }

    /// Keeps only changes at or above `min`.
    pub fn filter_min_tier(self, min: Tier) -> Self {
        let changes = self.changes.into_iter().filter(|c| c.tier >= min).collect();
        Self::new(self.old_label, self.new_label, changes, self.diagnostics)
    }

    /// Drops changes below `min` from the listing only. The summary, and so
    /// [`exit_code`](Self::exit_code), still describe the whole comparison.
    pub fn hide_below(mut self, min: Tier) -> Self {
        self.changes.retain(|c| c.tier >= min);
        self
    }

    pub fn without_neutral(self) -> Self {
        self.filter_min_tier(Tier::SourceBreak)
    }

    /// 0 when nothing reaches `fail_on`, otherwise 2, 3 or 4 for the
    /// highest tier found. Neutral never fails.
    pub fn exit_code(&self, fail_on: Tier) -> i32 {
        match self.max_tier() {
            Some(tier) if tier >= fail_on && tier > Tier::Neutral => match tier {
                Tier::SourceBreak => 2,
                Tier::BinaryBreak => 3,
                Tier::Unknown => 4,
                Tier::Neutral => 0,
            },
            _ => 0,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
