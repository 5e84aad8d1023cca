pub mod experiment;
pub mod run;
pub mod prompt;

pub use experiment::*;
pub use run::*;
pub use prompt::*;
