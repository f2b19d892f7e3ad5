pub mod canonical;
pub mod change;
pub mod config;
pub mod entity;
pub mod error;
pub mod signature;
pub mod surface;
pub mod types;

pub use canonical::*;
pub use change::*;
pub use config::*;
pub use entity::*;
pub use error::*;
pub use signature::*;
pub use surface::*;
pub use types::*;
