pub mod builder;
pub mod connections;
pub mod event_scheduler;
pub mod execution;
pub mod model;
pub mod types;
pub mod values;

#[cfg(test)]
mod tests;
