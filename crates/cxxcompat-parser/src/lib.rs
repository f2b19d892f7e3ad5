pub mod cpp;
pub mod decl;
pub mod extractor;
pub mod frontend;
pub mod language;

#[cfg(test)]
mod tests;

pub use cpp::*;
pub use decl::*;
pub use extractor::*;
pub use frontend::*;
pub use language::*;
