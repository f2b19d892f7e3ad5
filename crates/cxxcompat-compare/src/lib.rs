pub mod classifier;
pub mod matcher;
pub mod pipeline;
pub mod report;
pub mod rules;

pub use classifier::*;
pub use matcher::*;
pub use pipeline::*;
pub use report::*;
pub use rules::{Finding, ADDITION_RULES, PAIR_RULES, REMOVAL_RULES};
