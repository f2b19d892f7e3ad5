//! Extract → match → classify → report, for surfaces, declaration trees or
//! files on disk.

use crate::{Classifier, CompatReport, Matcher};
use cxxcompat_core::{CompatConfig, CompatError, Diagnostic, Result, Surface};
use cxxcompat_parser::{DeclNode, ExtractOptions, Extraction, SourceLoader, SurfaceExtractor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct CompareEngine {
    config: CompatConfig,
    extractor: SurfaceExtractor,
}

impl CompareEngine {
    pub fn new(config: CompatConfig) -> Self {
        let extractor = SurfaceExtractor::new(ExtractOptions::from(&config.extract));
        Self { config, extractor }
    }

    pub fn config(&self) -> &CompatConfig {
        &self.config
    }

    pub fn extract(&self, label: &str, trees: &[DeclNode]) -> Result<Extraction> {
        self.extractor.extract_all(label, trees)
    }

    /// Compares two already extracted surfaces.
    pub fn compare_surfaces(&self, old: &Surface, new: &Surface) -> CompatReport {
        self.report(old, new, Vec::new())
    }

    /// Extracts both snapshots in parallel, then compares them.
    pub fn compare_trees(&self, old: &[DeclNode], new: &[DeclNode]) -> Result<CompatReport> {
        let (old_extraction, new_extraction) = rayon::join(
            || self.extract("old", old),
            || self.extract("new", new),
        );
        let (old_extraction, new_extraction) = (old_extraction?, new_extraction?);

        let mut diagnostics = old_extraction.diagnostics;
        diagnostics.extend(new_extraction.diagnostics);
        Ok(self.report(&old_extraction.surface, &new_extraction.surface, diagnostics))
    }

    /// Loads both snapshots from disk concurrently and compares them on the
    /// blocking pool.
    pub async fn compare_files(
        self: Arc<Self>,
        old: Vec<PathBuf>,
        new: Vec<PathBuf>,
    ) -> Result<CompatReport> {
        let loader = SourceLoader::new();
        let (old_trees, new_trees) = tokio::try_join!(loader.load_all(&old), loader.load_all(&new))?;
        info!(
            "Loaded {} old and {} new declaration tree(s)",
            old_trees.len(),
            new_trees.len()
        );

        tokio::task::spawn_blocking(move || self.compare_trees(&old_trees, &new_trees))
            .await
            .map_err(|e| CompatError::InvalidOperation(e.to_string()))?
    }

    fn report(&self, old: &Surface, new: &Surface, mut diagnostics: Vec<Diagnostic>) -> CompatReport {
        let classifier = Classifier::new(&self.config.policy);
        let matches = Matcher::new(&classifier).match_surfaces(old, new);
        let changes = classifier.classify(old, new, &matches);
        diagnostics.extend(matches.diagnostics);

        let report = CompatReport::new(old.label(), new.label(), changes, diagnostics);
        let report = if self.config.policy.report_neutral {
            report
        } else {
            report.without_neutral()
        };
        info!(
            "{} change(s), highest tier {}",
            report.summary.total,
            report
                .max_tier()
                .map(|t| t.as_str())
                .unwrap_or("none")
        );
        report
    }
}
