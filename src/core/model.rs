use std::any::Any;

use crate::core::types::SimTime;
use crate::core::values::PortBag;
use crate::error::SimulationError;

/// Port direction for model interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    /// Input port - receives values from other models
    Input,
    /// Output port - sends values to other models
    Output,
}

impl PortType {
    pub fn description(&self) -> &'static str {
        match self {
            PortType::Input => "input",
            PortType::Output => "output",
        }
    }
}

/// Atomic discrete-event model driven by the [`SimulationEngine`].
///
/// The engine owns the clock. A model only states how long it wants to stay
/// in its current state (`time_advance`), what it emits when that time runs
/// out (`output`), and how its state changes on its own timer, on input, or
/// on both at the same instant.
///
/// `output` is called right before `int_transition` or `conf_transition` and
/// must not change state; everything it emits is delivered in the same round.
///
/// [`SimulationEngine`]: crate::core::execution::SimulationEngine
pub trait AtomicModel: Send {
    /// Unique, human readable name
    fn name(&self) -> &str;

    /// Every port of this model with its direction
    fn ports(&self) -> Vec<(String, PortType)>;

    /// Time until the next internal transition, `PASSIVE` for never
    fn time_advance(&self) -> SimTime;

    /// Values emitted when the internal timer fires
    fn output(&self) -> PortBag;

    /// The internal timer fired with no input this round
    fn int_transition(&mut self, now: SimTime) -> Result<(), SimulationError>;

    /// Input arrived `elapsed` after the last transition
    fn ext_transition(&mut self, now: SimTime, elapsed: SimTime, inputs: PortBag) -> Result<(), SimulationError>;

    /// Timer fired and input arrived in the same round.
    ///
    /// Default commits the internal transition first, then sees the input
    /// with zero elapsed time.
    fn conf_transition(&mut self, now: SimTime, inputs: PortBag) -> Result<(), SimulationError> {
        self.int_transition(now)?;
        self.ext_transition(now, 0.0, inputs)
    }

    fn as_any(&self) -> &dyn Any;
}

/// Helper for models that declare ports from static lists
pub fn declare_ports(inputs: &[&str], outputs: &[&str]) -> Vec<(String, PortType)> {
    inputs
        .iter()
        .map(|name| (name.to_string(), PortType::Input))
        .chain(outputs.iter().map(|name| (name.to_string(), PortType::Output)))
        .collect()
}
