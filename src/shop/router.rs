use std::any::Any;
use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::model::{AtomicModel, PortType};
use crate::core::types::{SimTime, PASSIVE};
use crate::core::values::{PortBag, PortValue};
use crate::error::SimulationError;
use crate::shop::dispatch::{DispatchPolicy, MachineSlot};
use crate::shop::product::{Destination, MachineId, Product};

/// Input port fed by the generator
pub const IN_PRODUCT: &str = "in_product";
/// Output port towards the sink
pub const OUT_SINK: &str = "to_sink";

/// Output port towards machine `id`
pub fn to_machine_port(id: &MachineId) -> String {
    format!("to_{}", id)
}

/// Input port receiving finished batches from machine `id`
pub fn from_machine_port(id: &MachineId) -> String {
    format!("from_{}", id)
}

/// Input port receiving capacity notifications from machine `id`
pub fn capacity_port(id: &MachineId) -> String {
    format!("capacity_{}", id)
}

/// Maximum time a product may idle in the router after leaving a machine.
///
/// Keyed by the machine just left; machines without an entry never spoil
/// their products.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpoilagePolicy {
    pub thresholds: BTreeMap<MachineId, f64>,
}

impl SpoilagePolicy {
    pub fn new(thresholds: BTreeMap<MachineId, f64>) -> Self {
        Self { thresholds }
    }

    fn threshold_after(&self, machine: &MachineId) -> Option<f64> {
        self.thresholds.get(machine).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct QueuedProduct {
    /// Insertion rank; an aborted reservation goes back to its old place
    seq: u64,
    product: Product,
}

/// The router's single in-flight dispatch.
///
/// Created when a product is chosen, validated again whenever capacity
/// changes, and either committed when the routing delay runs out or rolled
/// back into the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    seq: u64,
    product: Product,
    destination: Destination,
    remaining: SimTime,
}

impl Reservation {
    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Routing time left before delivery
    pub fn remaining(&self) -> SimTime {
        self.remaining
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterCounters {
    pub received: u64,
    pub delivered: u64,
    pub aborted: u64,
    pub spoiled: u64,
}

/// Dispatching stage between the generator, the machines and the sink
pub struct Router {
    name: String,
    routing_time_per_size: f64,
    policy: DispatchPolicy,
    spoilage: Option<SpoilagePolicy>,
    /// Declaration order is the scan order
    machines: Vec<MachineSlot>,
    to_ports: Vec<String>,
    from_ports: Vec<String>,
    capacity_ports: Vec<String>,
    queue: Vec<QueuedProduct>,
    reservation: Option<Reservation>,
    next_seq: u64,
    total_queue_area: f64,
    last_time: SimTime,
    counters: RouterCounters,
}

impl Router {
    pub fn new(
        machines: &[(MachineId, u32)],
        routing_time_per_size: f64,
        policy: DispatchPolicy,
    ) -> Self {
        let slots = machines
            .iter()
            .map(|(id, capacity)| MachineSlot::new(id.clone(), *capacity))
            .collect();
        Self::from_slots(slots, routing_time_per_size, policy)
    }

    /// Router over prepared machine slots, scanned in the given order
    pub fn from_slots(machines: Vec<MachineSlot>, routing_time_per_size: f64, policy: DispatchPolicy) -> Self {
        let name = match policy {
            DispatchPolicy::Fifo => "FIFORouter",
            DispatchPolicy::Priority => "PriorityRouter",
        };

        Self {
            name: name.to_string(),
            routing_time_per_size,
            policy,
            spoilage: None,
            to_ports: machines.iter().map(|slot| to_machine_port(&slot.id)).collect(),
            from_ports: machines.iter().map(|slot| from_machine_port(&slot.id)).collect(),
            capacity_ports: machines.iter().map(|slot| capacity_port(&slot.id)).collect(),
            machines,
            queue: Vec::new(),
            reservation: None,
            next_seq: 0,
            total_queue_area: 0.0,
            last_time: 0.0,
            counters: RouterCounters::default(),
        }
    }

    pub fn with_spoilage(mut self, spoilage: SpoilagePolicy) -> Self {
        self.spoilage = Some(spoilage);
        self
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Products waiting in the queue, in queue order
    pub fn queued(&self) -> impl Iterator<Item = &Product> {
        self.queue.iter().map(|entry| &entry.product)
    }

    pub fn reservation(&self) -> Option<&Reservation> {
        self.reservation.as_ref()
    }

    /// Every product inside the router, queued or under reservation
    pub fn held(&self) -> usize {
        self.queue.len() + usize::from(self.reservation.is_some())
    }

    pub fn machine_slot(&self, id: &MachineId) -> Option<&MachineSlot> {
        self.machines.iter().find(|slot| &slot.id == id)
    }

    pub fn counters(&self) -> RouterCounters {
        self.counters
    }

    pub fn total_queue_area(&self) -> f64 {
        self.total_queue_area
    }

    /// Time of the last change to the queue accumulator
    pub fn last_time(&self) -> SimTime {
        self.last_time
    }

    /// Time-weighted average number of products in the router over `[0, now]`
    pub fn average_queue_length(&self, now: SimTime) -> f64 {
        if now <= 0.0 {
            return 0.0;
        }
        let pending = self.held() as f64 * (now - self.last_time).max(0.0);
        (self.total_queue_area + pending) / now
    }

    fn accumulate(&mut self, now: SimTime) {
        self.total_queue_area += self.held() as f64 * (now - self.last_time);
        self.last_time = now;
    }

    fn routing_time(&self, product: &Product) -> SimTime {
        product.size() as f64 * self.routing_time_per_size
    }

    fn enqueue(&mut self, mut product: Product, now: SimTime) {
        product.stamp_router_entry(now);
        debug!("{}: queued {} at t={:.3}", self.name, product, now);
        self.queue.push(QueuedProduct {
            seq: self.next_seq,
            product,
        });
        self.next_seq += 1;
        self.counters.received += 1;
    }

    fn reserve(&mut self, position: usize, destination: Destination) {
        let QueuedProduct { seq, product } = self.queue.remove(position);
        let remaining = self.routing_time(&product);
        debug!("{}: reserved {} for {} ({:.3}s)", self.name, product, destination, remaining);
        self.reservation = Some(Reservation {
            seq,
            product,
            destination,
            remaining,
        });
    }

    /// Roll the reservation back into the queue at its original place
    fn abort(&mut self) {
        if let Some(Reservation { seq, product, destination, .. }) = self.reservation.take() {
            debug!("{}: aborted {} for {}", self.name, product, destination);
            let position = self.queue.partition_point(|entry| entry.seq < seq);
            self.queue.insert(position, QueuedProduct { seq, product });
            self.counters.aborted += 1;
        }
    }

    /// The held product was emitted this round; account for it at its destination
    fn commit(&mut self) {
        if let Some(Reservation { product, destination, .. }) = self.reservation.take() {
            if let Destination::Machine(id) = &destination {
                if let Some(slot) = self.machines.iter_mut().find(|slot| &slot.id == id) {
                    slot.reserve(&product);
                }
            }
            debug!("{}: delivered {} to {}", self.name, product, destination);
            self.counters.delivered += 1;
        }
    }

    /// Race guard: drop a reservation the refreshed machine state no longer allows
    fn revalidate(&mut self) {
        let stale = match &self.reservation {
            Some(Reservation {
                product,
                destination: Destination::Machine(id),
                ..
            }) => self
                .machines
                .iter()
                .find(|slot| &slot.id == id)
                .map_or(true, |slot| !slot.accepts(product)),
            _ => false,
        };
        if stale {
            self.abort();
        }
    }

    /// Flag products that idled too long since their last machine
    fn expire_stale(&mut self, now: SimTime) {
        let Some(spoilage) = &self.spoilage else {
            return;
        };

        for entry in &mut self.queue {
            let product = &mut entry.product;
            if product.is_spoiled() {
                continue;
            }
            let limit = product
                .previous_machine()
                .and_then(|machine| spoilage.threshold_after(machine));
            if let Some(limit) = limit {
                let waited = now - product.router_entry_time();
                if waited > limit {
                    product.mark_spoiled();
                    self.counters.spoiled += 1;
                    info!("{}: {} spoiled after waiting {:.1}s (limit {:.1}s)", self.name, product, waited, limit);
                }
            }
        }
    }

    /// Pick the next product to move if the routing slot is free
    fn try_dispatch(&mut self, now: SimTime) {
        if self.reservation.is_some() {
            return;
        }

        self.expire_stale(now);
        if let Some(position) = self.queue.iter().position(|entry| entry.product.is_spoiled()) {
            self.reserve(position, Destination::Sink);
            return;
        }

        for index in 0..self.machines.len() {
            let slot = &self.machines[index];
            let choice = self.policy.select(
                self.queue
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| slot.accepts(&entry.product))
                    .map(|(position, entry)| (position, &entry.product)),
            );
            if let Some(position) = choice {
                let destination = Destination::Machine(slot.id.clone());
                self.reserve(position, destination);
                return;
            }
        }

        let choice = self.policy.select(
            self.queue
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.product.next_machine().is_none())
                .map(|(position, entry)| (position, &entry.product)),
        );
        if let Some(position) = choice {
            self.reserve(position, Destination::Sink);
        }
    }

    /// Apply one bag of inputs without selecting
    fn absorb(&mut self, now: SimTime, inputs: PortBag) -> Result<(), SimulationError> {
        // Capacity first, so the eligibility re-check sees this instant's state
        for (port, value) in inputs.iter() {
            if let Some(index) = self.capacity_ports.iter().position(|name| name == port) {
                let remaining = PortBag::expect_capacity(&self.name, port, value)?;
                self.machines[index].refresh(remaining);
            }
        }
        self.revalidate();

        for (port, value) in inputs {
            if self.capacity_ports.contains(&port) {
                continue;
            }
            if port != IN_PRODUCT && !self.from_ports.contains(&port) {
                return Err(SimulationError::PortNotFound {
                    model: self.name.clone(),
                    port,
                    direction: PortType::Input.description(),
                    valid: self.ports().into_iter().map(|(name, _)| name).collect(),
                });
            }
            for product in PortBag::expect_products(&self.name, &port, value)? {
                self.enqueue(product, now);
            }
        }
        Ok(())
    }

    fn port_for(&self, destination: &Destination) -> String {
        match destination {
            Destination::Sink => OUT_SINK.to_string(),
            Destination::Machine(id) => to_machine_port(id),
        }
    }
}

impl AtomicModel for Router {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<(String, PortType)> {
        let mut ports = vec![(IN_PRODUCT.to_string(), PortType::Input)];
        ports.extend(self.from_ports.iter().map(|port| (port.clone(), PortType::Input)));
        ports.extend(self.capacity_ports.iter().map(|port| (port.clone(), PortType::Input)));
        ports.extend(self.to_ports.iter().map(|port| (port.clone(), PortType::Output)));
        ports.push((OUT_SINK.to_string(), PortType::Output));
        ports
    }

    fn time_advance(&self) -> SimTime {
        self.reservation
            .as_ref()
            .map_or(PASSIVE, |reservation| reservation.remaining)
    }

    fn output(&self) -> PortBag {
        match &self.reservation {
            Some(reservation) => PortBag::single(
                &self.port_for(&reservation.destination),
                PortValue::Product(reservation.product.clone()),
            ),
            None => PortBag::new(),
        }
    }

    fn int_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        self.accumulate(now);
        self.commit();
        self.try_dispatch(now);
        Ok(())
    }

    fn ext_transition(&mut self, now: SimTime, elapsed: SimTime, inputs: PortBag) -> Result<(), SimulationError> {
        self.accumulate(now);
        if let Some(reservation) = &mut self.reservation {
            reservation.remaining = (reservation.remaining - elapsed).max(0.0);
        }
        self.absorb(now, inputs)?;
        self.try_dispatch(now);
        Ok(())
    }

    /// Delivery and input in the same instant: commit the delivery, take in
    /// this instant's capacities and products, then select once.
    fn conf_transition(&mut self, now: SimTime, inputs: PortBag) -> Result<(), SimulationError> {
        self.accumulate(now);
        self.commit();
        self.absorb(now, inputs)?;
        self.try_dispatch(now);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
