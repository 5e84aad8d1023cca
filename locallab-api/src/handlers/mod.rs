pub mod events;
pub mod executions;
