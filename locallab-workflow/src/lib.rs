pub mod context;
pub mod events;
pub mod executor;
pub mod expander;
pub mod publisher;
pub mod tracker;

pub use context::*;
pub use events::*;
pub use executor::*;
pub use expander::*;
pub use publisher::*;
pub use tracker::*;
