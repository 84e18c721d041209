use std::any::Any;

use log::debug;
use serde::Serialize;

use crate::core::model::{declare_ports, AtomicModel, PortType};
use crate::core::types::{SimTime, PASSIVE};
use crate::core::values::{PortBag, PortValue};
use crate::error::{RoutingContractError, SimulationError};
use crate::shop::product::{MachineId, Product, ProductType};

pub const IN_PRODUCT: &str = "in_product";
/// Finished batch, back to the router
pub const OUT_BATCH: &str = "out_batch";
/// Spare capacity announcements
pub const OUT_CAPACITY: &str = "out_capacity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineMode {
    Idle,
    /// Batch open, waiting for more products or the wait timeout
    Waiting,
    Processing,
}

/// Self-scheduled event the machine is heading for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingEvent {
    None,
    Start,
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MachineStatistics {
    /// Share of the simulated time spent processing
    pub utilization: f64,
    /// Mean capacity in use while processing
    pub avg_occupancy: f64,
    pub num_batches: u64,
}

/// Batch machine: gathers products of one type, then processes them together
pub struct Machine {
    id: MachineId,
    kind: MachineId,
    name: String,
    capacity: u32,
    max_wait_duration: f64,
    mode: MachineMode,
    products: Vec<Product>,
    batch_type: Option<ProductType>,
    first_entry_time: Option<SimTime>,
    remaining: SimTime,
    total_processing_time: f64,
    total_occupancy_product: f64,
    num_batches: u64,
}

impl Machine {
    pub fn new(id: MachineId, capacity: u32, max_wait_duration: f64) -> Self {
        Self {
            name: format!("Machine_{}", id),
            kind: id.clone(),
            id,
            capacity,
            max_wait_duration,
            mode: MachineMode::Idle,
            products: Vec::new(),
            batch_type: None,
            first_entry_time: None,
            remaining: PASSIVE,
            total_processing_time: 0.0,
            total_occupancy_product: 0.0,
            num_batches: 0,
        }
    }

    /// Serve recipe steps naming `kind` instead of this machine's id
    pub fn with_kind(mut self, kind: MachineId) -> Self {
        self.kind = kind;
        self
    }

    pub fn id(&self) -> &MachineId {
        &self.id
    }

    pub fn kind(&self) -> &MachineId {
        &self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn mode(&self) -> MachineMode {
        self.mode
    }

    pub fn pending_event(&self) -> PendingEvent {
        match self.mode {
            MachineMode::Idle => PendingEvent::None,
            MachineMode::Waiting => PendingEvent::Start,
            MachineMode::Processing => PendingEvent::Finish,
        }
    }

    pub fn batch(&self) -> &[Product] {
        &self.products
    }

    pub fn batch_type(&self) -> Option<ProductType> {
        self.batch_type
    }

    pub fn first_entry_time(&self) -> Option<SimTime> {
        self.first_entry_time
    }

    pub fn used_capacity(&self) -> u32 {
        self.products.iter().map(Product::size).sum()
    }

    /// Utilization over `simulation_time`, mean occupancy while busy, batch count
    pub fn statistics(&self, simulation_time: SimTime) -> MachineStatistics {
        let utilization = if simulation_time > 0.0 {
            self.total_processing_time / simulation_time
        } else {
            0.0
        };
        let avg_occupancy = if self.total_processing_time > 0.0 {
            self.total_occupancy_product / self.total_processing_time
        } else {
            0.0
        };

        MachineStatistics {
            utilization,
            avg_occupancy,
            num_batches: self.num_batches,
        }
    }

    fn accept(&mut self, product: Product, now: SimTime) -> Result<(), RoutingContractError> {
        match (self.mode, self.batch_type) {
            (MachineMode::Processing, _) => {
                return Err(RoutingContractError::BusyDelivery {
                    machine: self.id.clone(),
                    product: product.id(),
                })
            }
            (MachineMode::Waiting, Some(batch_type)) if batch_type != product.product_type() => {
                return Err(RoutingContractError::TypeMixing {
                    machine: self.id.clone(),
                    batch_type,
                    product_type: product.product_type(),
                    product: product.id(),
                })
            }
            _ => {}
        }

        let used = self.used_capacity();
        if used + product.size() > self.capacity {
            return Err(RoutingContractError::CapacityExceeded {
                machine: self.id.clone(),
                product: product.id(),
                size: product.size(),
                used,
                capacity: self.capacity,
            });
        }

        if self.mode == MachineMode::Idle {
            self.mode = MachineMode::Waiting;
            self.batch_type = Some(product.product_type());
            self.first_entry_time = Some(now);
        }
        debug!("{}: accepted {} at t={:.3}", self.name, product, now);
        self.products.push(product);
        Ok(())
    }

    /// Start at once when full, otherwise when the oldest member has waited long enough
    fn recompute_wait(&mut self, now: SimTime) {
        self.remaining = if self.used_capacity() >= self.capacity {
            0.0
        } else {
            let waited = now - self.first_entry_time.unwrap_or(now);
            (self.max_wait_duration - waited).max(0.0)
        };
    }

    fn start(&mut self, now: SimTime) -> Result<(), SimulationError> {
        let duration = self
            .products
            .first()
            .and_then(|product| product.processing_time(&self.kind))
            .ok_or_else(|| {
                SimulationError::InvalidConfig(format!("no processing time for machine {} in batch", self.id))
            })?;
        let used = self.used_capacity();

        self.mode = MachineMode::Processing;
        self.remaining = duration;
        self.total_processing_time += duration;
        self.total_occupancy_product += used as f64 * duration;
        self.num_batches += 1;

        debug!(
            "{}: batch of {} ({}/{} used) starts at t={:.3} for {:.1}s",
            self.name,
            self.products.len(),
            used,
            self.capacity,
            now,
            duration
        );
        Ok(())
    }

    fn finish(&mut self, now: SimTime) {
        debug!("{}: released {} products at t={:.3}", self.name, self.products.len(), now);
        self.products.clear();
        self.batch_type = None;
        self.first_entry_time = None;
        self.mode = MachineMode::Idle;
        self.remaining = PASSIVE;
    }
}

impl AtomicModel for Machine {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<(String, PortType)> {
        declare_ports(&[IN_PRODUCT], &[OUT_BATCH, OUT_CAPACITY])
    }

    fn time_advance(&self) -> SimTime {
        match self.mode {
            MachineMode::Idle => PASSIVE,
            _ => self.remaining,
        }
    }

    fn output(&self) -> PortBag {
        let mut out = PortBag::new();
        match self.mode {
            MachineMode::Idle => {}
            MachineMode::Waiting => out.push(OUT_CAPACITY, PortValue::Capacity(0)),
            MachineMode::Processing => {
                let batch = self
                    .products
                    .iter()
                    .cloned()
                    .map(|mut product| {
                        product.advance_step();
                        product
                    })
                    .collect();
                out.push(OUT_BATCH, PortValue::Batch(batch));
                out.push(OUT_CAPACITY, PortValue::Capacity(self.capacity));
            }
        }
        out
    }

    fn int_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        match self.mode {
            MachineMode::Idle => Ok(()),
            MachineMode::Waiting => self.start(now),
            MachineMode::Processing => {
                self.finish(now);
                Ok(())
            }
        }
    }

    fn ext_transition(&mut self, now: SimTime, elapsed: SimTime, inputs: PortBag) -> Result<(), SimulationError> {
        if self.mode != MachineMode::Idle {
            self.remaining = (self.remaining - elapsed).max(0.0);
        }

        for (port, value) in inputs {
            if port != IN_PRODUCT {
                return Err(SimulationError::PortNotFound {
                    model: self.name.clone(),
                    port,
                    direction: PortType::Input.description(),
                    valid: vec![IN_PRODUCT.to_string()],
                });
            }
            for product in PortBag::expect_products(&self.name, &port, value)? {
                self.accept(product, now)?;
            }
        }

        if self.mode == MachineMode::Waiting {
            self.recompute_wait(now);
        }
        Ok(())
    }

    /// A product landing at the start instant joins the batch before it
    /// closes; at the finish instant the batch leaves first.
    fn conf_transition(&mut self, now: SimTime, inputs: PortBag) -> Result<(), SimulationError> {
        match self.mode {
            MachineMode::Waiting => {
                let elapsed = self.remaining;
                self.ext_transition(now, elapsed, inputs)?;
                self.start(now)
            }
            _ => {
                self.int_transition(now)?;
                self.ext_transition(now, 0.0, inputs)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
