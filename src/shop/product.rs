use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::types::SimTime;

/// Product category; only products of one type may share a batch
pub type ProductType = u32;

/// Sequential product number, unique within one generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub u64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MachineId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a product goes when the router next moves it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Machine(MachineId),
    Sink,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Machine(id) => write!(f, "machine {}", id),
            Destination::Sink => f.write_str("sink"),
        }
    }
}

/// Immutable part of a product, shared by every product made from one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub product_type: ProductType,
    pub size: u32,
    pub recipe: Vec<MachineId>,
    /// Processing duration per machine of the recipe, in seconds
    pub processing_times: BTreeMap<MachineId, f64>,
}

impl ProductSpec {
    pub fn new(
        product_type: ProductType,
        size: u32,
        recipe: Vec<MachineId>,
        processing_times: BTreeMap<MachineId, f64>,
    ) -> Self {
        Self {
            product_type,
            size,
            recipe,
            processing_times,
        }
    }
}

/// One job travelling through the shop
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: ProductId,
    spec: Arc<ProductSpec>,
    current_step: usize,
    arrival_time: Option<SimTime>,
    router_entry_time: SimTime,
    is_spoiled: bool,
    flow_time: Option<SimTime>,
}

impl Product {
    pub fn new(id: ProductId, spec: Arc<ProductSpec>) -> Self {
        Self {
            id,
            spec,
            current_step: 0,
            arrival_time: None,
            router_entry_time: 0.0,
            is_spoiled: false,
            flow_time: None,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn product_type(&self) -> ProductType {
        self.spec.product_type
    }

    pub fn size(&self) -> u32 {
        self.spec.size
    }

    pub fn processing_time(&self, machine: &MachineId) -> Option<f64> {
        self.spec.processing_times.get(machine).copied()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Time the product entered the system; zero until stamped
    pub fn arrival_time(&self) -> SimTime {
        self.arrival_time.unwrap_or(0.0)
    }

    pub fn router_entry_time(&self) -> SimTime {
        self.router_entry_time
    }

    pub fn is_spoiled(&self) -> bool {
        self.is_spoiled
    }

    pub fn flow_time(&self) -> Option<SimTime> {
        self.flow_time
    }

    pub fn is_complete(&self) -> bool {
        self.current_step >= self.spec.recipe.len()
    }

    /// Machine of the next recipe step, `None` once complete or spoiled
    pub fn next_machine(&self) -> Option<&MachineId> {
        if self.is_spoiled {
            return None;
        }
        self.spec.recipe.get(self.current_step)
    }

    pub fn next_destination(&self) -> Destination {
        match self.next_machine() {
            Some(machine) => Destination::Machine(machine.clone()),
            None => Destination::Sink,
        }
    }

    /// Machine the product visited last, `None` before the first step
    pub fn previous_machine(&self) -> Option<&MachineId> {
        self.current_step
            .checked_sub(1)
            .and_then(|step| self.spec.recipe.get(step))
    }

    /// Stamp the arrival time unless it is already set
    pub fn stamp_arrival(&mut self, now: SimTime) {
        self.arrival_time.get_or_insert(now);
    }

    pub fn stamp_router_entry(&mut self, now: SimTime) {
        self.stamp_arrival(now);
        self.router_entry_time = now;
    }

    pub fn advance_step(&mut self) {
        if self.current_step < self.spec.recipe.len() {
            self.current_step += 1;
        }
    }

    pub fn mark_spoiled(&mut self) {
        self.is_spoiled = true;
    }

    /// Record the flow time on leaving the system; only the first call counts
    pub fn stamp_exit(&mut self, now: SimTime) -> SimTime {
        let arrival = self.arrival_time();
        *self.flow_time.get_or_insert(now - arrival)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(type={}, size={}, step={}/{}{})",
            self.id,
            self.spec.product_type,
            self.spec.size,
            self.current_step,
            self.spec.recipe.len(),
            if self.is_spoiled { ", spoiled" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step() -> Product {
        let spec = ProductSpec::new(
            0,
            1,
            vec!["A".into(), "B".into()],
            BTreeMap::from([("A".into(), 900.0), ("B".into(), 600.0)]),
        );
        Product::new(ProductId(7), Arc::new(spec))
    }

    #[test]
    fn test_destination_follows_recipe_then_sink() {
        let mut product = two_step();
        assert_eq!(product.next_destination(), Destination::Machine("A".into()));
        assert_eq!(product.previous_machine(), None);

        product.advance_step();
        assert_eq!(product.next_destination(), Destination::Machine("B".into()));
        assert_eq!(product.previous_machine(), Some(&MachineId::from("A")));

        product.advance_step();
        product.advance_step();
        assert_eq!(product.current_step(), 2);
        assert!(product.is_complete());
        assert_eq!(product.next_destination(), Destination::Sink);
    }

    #[test]
    fn test_spoiled_product_goes_to_sink() {
        let mut product = two_step();
        product.advance_step();
        product.mark_spoiled();
        assert_eq!(product.next_destination(), Destination::Sink);
        assert!(!product.is_complete());
    }

    #[test]
    fn test_arrival_is_stamped_once() {
        let mut product = two_step();
        product.stamp_router_entry(4.0);
        product.stamp_router_entry(10.0);
        assert_eq!(product.arrival_time(), 4.0);
        assert_eq!(product.router_entry_time(), 10.0);

        assert_eq!(product.stamp_exit(30.0), 26.0);
        assert_eq!(product.stamp_exit(50.0), 26.0);
    }
}
