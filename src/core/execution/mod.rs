pub mod config;
pub mod simulation_engine;

pub use config::{ConcurrencyMode, SimulationConfig};
pub use simulation_engine::{SimulationEngine, SimulationObserver};
