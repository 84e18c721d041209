//! Small models for exercising the kernel without the shop.

use std::any::Any;

use crate::core::model::{declare_ports, AtomicModel, PortType};
use crate::core::types::{SimTime, PASSIVE};
use crate::core::values::{PortBag, PortValue};
use crate::error::SimulationError;

/// Emits `value` on "out" every `period`, at most `limit` times
pub struct Ticker {
    name: String,
    period: SimTime,
    value: u32,
    remaining: SimTime,
    limit: Option<usize>,
    pub emitted: usize,
}

impl Ticker {
    pub fn new(name: &str, period: SimTime, value: u32) -> Self {
        Self {
            name: name.to_string(),
            period,
            value,
            remaining: period,
            limit: None,
            emitted: 0,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl AtomicModel for Ticker {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<(String, PortType)> {
        declare_ports(&[], &["out"])
    }

    fn time_advance(&self) -> SimTime {
        self.remaining
    }

    fn output(&self) -> PortBag {
        PortBag::single("out", PortValue::Capacity(self.value))
    }

    fn int_transition(&mut self, _now: SimTime) -> Result<(), SimulationError> {
        self.emitted += 1;
        self.remaining = match self.limit {
            Some(limit) if self.emitted >= limit => PASSIVE,
            _ => self.period,
        };
        Ok(())
    }

    fn ext_transition(&mut self, _now: SimTime, elapsed: SimTime, _inputs: PortBag) -> Result<(), SimulationError> {
        self.remaining -= elapsed;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Internal(SimTime),
    External { at: SimTime, elapsed: SimTime, values: Vec<u32> },
}

/// Logs every transition; optionally fires once on its own after `timer`.
/// A zero value is treated as malformed input.
pub struct Recorder {
    remaining: SimTime,
    pub log: Vec<Seen>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            remaining: PASSIVE,
            log: Vec::new(),
        }
    }

    pub fn with_timer(timer: SimTime) -> Self {
        Self {
            remaining: timer,
            log: Vec::new(),
        }
    }

    pub fn received(&self) -> Vec<u32> {
        self.log
            .iter()
            .flat_map(|seen| match seen {
                Seen::External { values, .. } => values.clone(),
                Seen::Internal(_) => Vec::new(),
            })
            .collect()
    }
}

impl AtomicModel for Recorder {
    fn name(&self) -> &str {
        "Recorder"
    }

    fn ports(&self) -> Vec<(String, PortType)> {
        declare_ports(&["in"], &["out"])
    }

    fn time_advance(&self) -> SimTime {
        self.remaining
    }

    fn output(&self) -> PortBag {
        PortBag::new()
    }

    fn int_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        self.log.push(Seen::Internal(now));
        self.remaining = PASSIVE;
        Ok(())
    }

    fn ext_transition(&mut self, now: SimTime, elapsed: SimTime, inputs: PortBag) -> Result<(), SimulationError> {
        let mut values = Vec::new();
        for (port, value) in inputs.iter() {
            let value = PortBag::expect_capacity("Recorder", port, value)?;
            if value == 0 {
                return Err(SimulationError::UnexpectedValue {
                    model: "Recorder".to_string(),
                    port: port.to_string(),
                    expected: "non-zero capacity",
                });
            }
            values.push(value);
        }
        self.remaining -= elapsed;
        self.log.push(Seen::External { at: now, elapsed, values });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
