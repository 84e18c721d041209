use log::debug;

use crate::core::connections::{ConnectionManager, PortValidator};
use crate::core::execution::SimulationEngine;
use crate::core::model::AtomicModel;
use crate::core::types::{InputPort, ModelId, OutputPort};
use crate::error::SimulationError;

/// Imperative API for assembling a coupled model
///
/// Models are added in declaration order; that order is also the tie-break
/// rank when several models are due at the same instant.
pub struct Simulation {
    models: Vec<Box<dyn AtomicModel>>,
    ids: Vec<ModelId>,
    connections: ConnectionManager,
    time_limit: Option<f64>,
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            ids: Vec::new(),
            connections: ConnectionManager::new(),
            time_limit: None,
        }
    }

    /// Add an atomic model and get its handle
    pub fn add_model<M: AtomicModel + 'static>(&mut self, model: M) -> ModelId {
        let id = ModelId::new(self.models.len(), model.name().to_string());
        self.models.push(Box::new(model));
        self.ids.push(id.clone());
        id
    }

    /// Stop the run once the next event would lie beyond `limit`
    pub fn with_time_limit(mut self, limit: f64) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Connect an output port to an input port
    pub fn connect(&mut self, source: OutputPort, target: InputPort) -> Result<(), SimulationError> {
        let source_model = self.lookup(source.model_id())?;
        PortValidator::validate_source_port(source_model, source.port_name())?;

        let target_model = self.lookup(target.model_id())?;
        PortValidator::validate_target_port(target_model, target.port_name())?;

        self.connections.add_connection(
            (source.model_id().index(), source.port_name()),
            (target.model_id().index(), target.port_name()),
            || {
                (
                    format!("{}.{}", source.model_id(), source.port_name()),
                    format!("{}.{}", target.model_id(), target.port_name()),
                )
            },
        )
    }

    /// Build the simulation into an engine, scheduling every model at t = 0
    pub fn build(self) -> SimulationEngine {
        let stats = self.connections.stats();
        debug!(
            "Building simulation: {} models, {} source ports, {} couplings",
            self.models.len(),
            stats.source_ports,
            stats.total_targets
        );
        SimulationEngine::new(self.models, self.ids, self.connections, self.time_limit)
    }

    pub fn model_ids(&self) -> &[ModelId] {
        &self.ids
    }

    fn lookup(&self, id: &ModelId) -> Result<&dyn AtomicModel, SimulationError> {
        match (self.models.get(id.index()), self.ids.get(id.index())) {
            (Some(model), Some(known)) if known == id => Ok(model.as_ref()),
            _ => Err(SimulationError::ModelNotFound(id.name().to_string())),
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
