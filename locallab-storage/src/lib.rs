pub mod memory;
pub mod postgres;
pub mod repositories;

pub use memory::*;
pub use repositories::*;
