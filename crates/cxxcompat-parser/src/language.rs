// ABOUTME: Maps input file extensions to the declaration front-end that reads them.
// ABOUTME: Builds tree-sitter parsers for C++ headers; JSON declaration trees need none.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tree_sitter::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// C++ source or header, parsed with tree-sitter-cpp.
    Cpp,
    /// A serialized declaration tree produced by an external front-end.
    DeclJson,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Cpp => f.write_str("C++"),
            InputFormat::DeclJson => f.write_str("declaration JSON"),
        }
    }
}

pub struct LanguageConfig {
    pub language: Option<tree_sitter::Language>,
    pub file_extensions: Vec<&'static str>,
}

pub struct LanguageRegistry {
    configs: HashMap<InputFormat, LanguageConfig>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut configs = HashMap::new();

        configs.insert(
            InputFormat::Cpp,
            LanguageConfig {
                language: Some(tree_sitter_cpp::LANGUAGE.into()),
                file_extensions: vec!["h", "hh", "hpp", "hxx", "h++", "inl", "ipp", "cpp", "cxx", "cc"],
            },
        );

        configs.insert(
            InputFormat::DeclJson,
            LanguageConfig {
                language: None,
                file_extensions: vec!["json"],
            },
        );

        Self { configs }
    }

    pub fn detect_format(&self, file_path: &str) -> Option<InputFormat> {
        let extension = Path::new(file_path).extension()?.to_str()?.to_ascii_lowercase();

        self.configs
            .iter()
            .find(|(_, config)| config.file_extensions.contains(&extension.as_str()))
            .map(|(format, _)| *format)
    }

    pub fn get_config(&self, format: InputFormat) -> Option<&LanguageConfig> {
        self.configs.get(&format)
    }

    pub fn create_parser(&self, format: InputFormat) -> Option<Parser> {
        let language = self.get_config(format)?.language.as_ref()?;
        let mut parser = Parser::new();
        parser.set_language(language).ok()?;
        Some(parser)
    }
}
