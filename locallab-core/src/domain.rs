pub mod ids;
pub mod config;
pub mod context;
pub mod experiment;
pub mod inference;
pub mod prompt;
pub mod run;

pub use ids::*;
pub use config::*;
pub use context::*;
pub use experiment::*;
pub use inference::*;
pub use prompt::*;
pub use run::*;
