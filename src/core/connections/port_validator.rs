use crate::core::model::{AtomicModel, PortType};
use crate::error::SimulationError;

/// Port validation utilities for models
pub struct PortValidator;

impl PortValidator {
    /// Validate that a model has the specified output port
    pub fn validate_source_port(model: &dyn AtomicModel, port: &str) -> Result<(), SimulationError> {
        Self::validate_port(model, port, PortType::Output)
    }

    /// Validate that a model has the specified input port
    pub fn validate_target_port(model: &dyn AtomicModel, port: &str) -> Result<(), SimulationError> {
        Self::validate_port(model, port, PortType::Input)
    }

    fn validate_port(model: &dyn AtomicModel, port: &str, direction: PortType) -> Result<(), SimulationError> {
        let ports = model.ports();
        let found = ports
            .iter()
            .any(|(name, port_type)| name == port && *port_type == direction);

        if !found {
            let valid: Vec<String> = ports
                .iter()
                .filter(|(_, port_type)| *port_type == direction)
                .map(|(name, _)| name.clone())
                .collect();

            return Err(SimulationError::PortNotFound {
                model: model.name().to_string(),
                port: port.to_string(),
                direction: direction.description(),
                valid,
            });
        }
        Ok(())
    }
}
