/// Simulated time in seconds. `f64::INFINITY` means "never".
pub type SimTime = f64;

/// Time advance of a passive model.
pub const PASSIVE: SimTime = f64::INFINITY;

/// Model identifier with the model's type information
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId {
    pub(crate) index: usize,
    pub(crate) name: String,
}

impl ModelId {
    pub(crate) fn new(index: usize, name: String) -> Self {
        Self { index, name }
    }

    /// Declaration index inside the simulation; also the tie-break rank
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create an output port handle
    pub fn output(&self, port: &str) -> OutputPort {
        OutputPort {
            model_id: self.clone(),
            port_name: port.to_string(),
        }
    }

    /// Create an input port handle
    pub fn input(&self, port: &str) -> InputPort {
        InputPort {
            model_id: self.clone(),
            port_name: port.to_string(),
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Handle for an output port
#[derive(Debug, Clone)]
pub struct OutputPort {
    pub(crate) model_id: ModelId,
    pub(crate) port_name: String,
}

impl OutputPort {
    pub fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Handle for an input port
#[derive(Debug, Clone)]
pub struct InputPort {
    pub(crate) model_id: ModelId,
    pub(crate) port_name: String,
}

impl InputPort {
    pub fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}
