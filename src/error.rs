use thiserror::Error;

use crate::shop::product::{MachineId, ProductId, ProductType};

/// Broken routing contract detected by a machine.
///
/// These never describe a transient condition: the router handed a machine a
/// product it must not accept, so the run is aborted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingContractError {
    #[error("machine {machine} is batching type {batch_type} but received {product} of type {product_type}")]
    TypeMixing {
        machine: MachineId,
        batch_type: ProductType,
        product_type: ProductType,
        product: ProductId,
    },

    #[error("machine {machine} received {product} while processing")]
    BusyDelivery { machine: MachineId, product: ProductId },

    #[error("machine {machine} received {product} of size {size} with {used}/{capacity} in use")]
    CapacityExceeded {
        machine: MachineId,
        product: ProductId,
        size: u32,
        used: u32,
        capacity: u32,
    },
}

/// Errors raised while building or running a simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("model '{0}' not found")]
    ModelNotFound(String),

    #[error("{direction} port '{port}' not found on model '{model}'. Valid {direction} ports: {valid:?}")]
    PortNotFound {
        model: String,
        port: String,
        direction: &'static str,
        valid: Vec<String>,
    },

    #[error("coupling {source_port} -> {target_port} already exists")]
    DuplicateCoupling {
        source_port: String,
        target_port: String,
    },

    #[error("model '{model}' got an unexpected value on port '{port}', expected {expected}")]
    UnexpectedValue {
        model: String,
        port: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Contract(#[from] RoutingContractError),

    #[error("run '{run}' finished {got} products, {expected} required")]
    InsufficientOutput {
        run: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("thread pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
