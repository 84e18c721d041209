use std::collections::HashMap;

use crate::error::SimulationError;

/// Coupling table: (source model, output port) -> [(target model, input port)]
///
/// Models are referred to by declaration index. An output may fan out and an
/// input may be driven by several outputs, but the same coupling can only be
/// added once.
#[derive(Debug, Default, Clone)]
pub struct ConnectionManager {
    connections: HashMap<(usize, String), Vec<(usize, String)>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port coupling
    pub fn add_connection(
        &mut self,
        source: (usize, &str),
        target: (usize, &str),
        describe: impl Fn() -> (String, String),
    ) -> Result<(), SimulationError> {
        let targets = self
            .connections
            .entry((source.0, source.1.to_string()))
            .or_default();

        if targets.iter().any(|(id, port)| *id == target.0 && port == target.1) {
            let (source_port, target_port) = describe();
            return Err(SimulationError::DuplicateCoupling { source_port, target_port });
        }

        targets.push((target.0, target.1.to_string()));
        Ok(())
    }

    /// Get targets for a source port
    pub fn get_targets(&self, source: usize, port: &str) -> &[(usize, String)] {
        self.connections
            .get(&(source, port.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check if a port takes part in any coupling
    pub fn is_connected(&self, model: usize, port: &str) -> bool {
        let as_source = self.connections.contains_key(&(model, port.to_string()));
        let as_target = self
            .connections
            .values()
            .any(|targets| targets.iter().any(|(id, name)| *id == model && name == port));

        as_source || as_target
    }

    /// Get connection statistics
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            source_ports: self.connections.len(),
            total_targets: self.connections.values().map(Vec::len).sum(),
        }
    }
}

/// Connection statistics for debugging
#[derive(Debug, PartialEq, Eq)]
pub struct ConnectionStats {
    pub source_ports: usize,
    pub total_targets: usize,
}
