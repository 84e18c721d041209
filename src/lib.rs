pub mod core;
pub mod error;
pub mod experiment;
pub mod report;
pub mod shop;

// Re-export commonly used types
pub use crate::core::builder::Simulation;
pub use crate::core::execution::{ConcurrencyMode, SimulationConfig, SimulationEngine};
pub use crate::core::model::AtomicModel;
pub use crate::error::{RoutingContractError, SimulationError};
pub use crate::experiment::{ExperimentPlan, RunResult, Scenario};
pub use crate::shop::{DispatchPolicy, FlexibleJobShop, RunReport, ShopConfig};
