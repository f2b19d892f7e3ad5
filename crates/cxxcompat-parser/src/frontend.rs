use crate::{parse_cpp, DeclKind, DeclNode, InputFormat, LanguageRegistry};
use async_trait::async_trait;
use cxxcompat_core::{CompatError, Result};
use ignore::{overrides::OverrideBuilder, WalkBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Something that turns an input file into a declaration tree.
#[async_trait]
pub trait DeclarationSource: Send + Sync {
    async fn parse_file(&self, path: &Path) -> Result<DeclNode>;

    fn format(&self) -> InputFormat;
}

/// Bundled C++ front-end backed by tree-sitter.
#[derive(Default)]
pub struct TreeSitterFrontend;

impl TreeSitterFrontend {
    pub fn new() -> Self {
        Self
    }

    async fn parse_content(&self, content: String, file_path: String) -> Result<DeclNode> {
        tokio::task::spawn_blocking(move || parse_cpp(&content, &file_path))
            .await
            .map_err(|e| CompatError::Parse(e.to_string()))?
    }
}

#[async_trait]
impl DeclarationSource for TreeSitterFrontend {
    async fn parse_file(&self, path: &Path) -> Result<DeclNode> {
        let content = fs::read_to_string(path).await?;
        self.parse_content(content, path.display().to_string()).await
    }

    fn format(&self) -> InputFormat {
        InputFormat::Cpp
    }
}

/// Declaration trees serialized by an external front-end.
#[derive(Default)]
pub struct JsonDeclSource;

#[async_trait]
impl DeclarationSource for JsonDeclSource {
    async fn parse_file(&self, path: &Path) -> Result<DeclNode> {
        let content = fs::read_to_string(path).await?;
        let tree: DeclNode = serde_json::from_str(&content)?;
        if tree.kind != DeclKind::TranslationUnit {
            return Err(CompatError::UnsupportedInput(format!(
                "{}: top-level node must be a translation_unit",
                path.display()
            )));
        }
        Ok(tree)
    }

    fn format(&self) -> InputFormat {
        InputFormat::DeclJson
    }
}

/// Picks a [`DeclarationSource`] per file and loads whole snapshots.
pub struct SourceLoader {
    registry: Arc<LanguageRegistry>,
    cpp: TreeSitterFrontend,
    json: JsonDeclSource,
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceLoader {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(LanguageRegistry::new()),
            cpp: TreeSitterFrontend::new(),
            json: JsonDeclSource,
        }
    }

    pub fn source_for(&self, path: &Path) -> Result<&dyn DeclarationSource> {
        let format = self
            .registry
            .detect_format(&path.to_string_lossy())
            .ok_or_else(|| {
                CompatError::UnsupportedInput(format!("Unknown file type: {}", path.display()))
            })?;
        Ok(match format {
            InputFormat::Cpp => &self.cpp,
            InputFormat::DeclJson => &self.json,
        })
    }

    pub async fn load(&self, path: &Path) -> Result<DeclNode> {
        let source = self.source_for(path)?;
        debug!("Parsing {} as {}", path.display(), source.format());
        source.parse_file(path).await
    }

    /// Loads every input of one snapshot. Directories are searched
    /// recursively for recognised files; the result is in path order.
    pub async fn load_all(&self, inputs: &[PathBuf]) -> Result<Vec<DeclNode>> {
        let mut files = Vec::new();
        for input in inputs {
            if fs::metadata(input).await?.is_dir() {
                self.collect_directory(input, &mut files).await?;
            } else {
                files.push(input.clone());
            }
        }

        let mut trees = Vec::with_capacity(files.len());
        for file in &files {
            trees.push(self.load(file).await?);
        }
        info!("Loaded {} input file(s)", trees.len());
        Ok(trees)
    }

    async fn collect_directory(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let dir = dir.to_path_buf();
        let found = tokio::task::spawn_blocking(move || collect_declaration_files(&dir, &registry))
            .await
            .map_err(|e| CompatError::InvalidOperation(e.to_string()))??;
        files.extend(found);
        Ok(())
    }
}

/// Recursively collects every file under `dir` that some front-end can read,
/// honouring `.gitignore`/`.ignore` files. Output is sorted by path.
pub fn collect_declaration_files(dir: &Path, registry: &LanguageRegistry) -> Result<Vec<PathBuf>> {
    let mut ovr = OverrideBuilder::new(dir);
    for exclude in ["!**/.git/**", "!**/target/**"] {
        ovr.add(exclude)
            .map_err(|e| CompatError::InvalidOperation(e.to_string()))?;
    }
    let overrides = ovr
        .build()
        .map_err(|e| CompatError::InvalidOperation(e.to_string()))?;

    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .ignore(true)
        .overrides(overrides)
        .build();

    let mut paths = Vec::new();
    for dent in walker {
        let dent = match dent {
            Ok(d) => d,
            Err(e) => {
                warn!("Walker error: {}", e);
                continue;
            }
        };
        if !dent.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = dent.into_path();
        if registry.detect_format(&path.to_string_lossy()).is_some() {
            paths.push(path);
        }
    }
    paths.sort();
    debug!("Collected {} file(s) from {}", paths.len(), dir.display());
    Ok(paths)
}
