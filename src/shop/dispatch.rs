//! Eligibility and selection rules used by the router.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shop::product::{MachineId, Product, ProductType};

/// Rule for picking one product among those eligible for the same destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    /// Earliest system arrival first
    #[default]
    Fifo,
    /// Furthest along the recipe first, then larger, then earlier
    Priority,
}

impl DispatchPolicy {
    pub const ALL: [DispatchPolicy; 2] = [DispatchPolicy::Fifo, DispatchPolicy::Priority];

    pub fn name(&self) -> &'static str {
        match self {
            DispatchPolicy::Fifo => "fifo",
            DispatchPolicy::Priority => "priority",
        }
    }

    /// `Less` when `a` should be dispatched before `b`
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let by_arrival = a.arrival_time().total_cmp(&b.arrival_time());
        match self {
            DispatchPolicy::Fifo => by_arrival,
            DispatchPolicy::Priority => b
                .current_step()
                .cmp(&a.current_step())
                .then_with(|| b.size().cmp(&a.size()))
                .then(by_arrival),
        }
    }

    /// Pick among `(queue position, product)` pairs given in queue order.
    ///
    /// Products the policy ranks equal keep queue order, so the earliest
    /// queued one wins.
    pub fn select<'a, I>(&self, candidates: I) -> Option<usize>
    where
        I: IntoIterator<Item = (usize, &'a Product)>,
    {
        let mut best: Option<(usize, &Product)> = None;
        for (position, product) in candidates {
            match best {
                Some((_, current)) if self.compare(product, current) != Ordering::Less => {}
                _ => best = Some((position, product)),
            }
        }
        best.map(|(position, _)| position)
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DispatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(DispatchPolicy::Fifo),
            "priority" => Ok(DispatchPolicy::Priority),
            other => Err(format!("unknown dispatch policy '{}', expected fifo or priority", other)),
        }
    }
}

/// Router-side mirror of one machine's availability
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSlot {
    pub id: MachineId,
    /// Recipe step the machine serves
    pub kind: MachineId,
    pub capacity: u32,
    /// Spare capacity as last reported, minus deliveries since
    pub remaining: u32,
    /// Type being batched there, `None` while the machine is empty
    pub batch_type: Option<ProductType>,
}

impl MachineSlot {
    pub fn new(id: MachineId, capacity: u32) -> Self {
        Self {
            kind: id.clone(),
            id,
            capacity,
            remaining: capacity,
            batch_type: None,
        }
    }

    pub fn with_kind(mut self, kind: MachineId) -> Self {
        self.kind = kind;
        self
    }

    /// Recipe, capacity and batch-type test for moving `product` here next
    pub fn accepts(&self, product: &Product) -> bool {
        product.next_machine() == Some(&self.kind)
            && product.size() <= self.remaining
            && self.batch_type.map_or(true, |kind| kind == product.product_type())
    }

    /// Apply a capacity notification from the machine
    pub fn refresh(&mut self, remaining: u32) {
        self.remaining = remaining;
        if remaining == self.capacity {
            self.batch_type = None;
        }
    }

    /// Account for a product delivered by the router
    pub fn reserve(&mut self, product: &Product) {
        self.batch_type.get_or_insert(product.product_type());
        self.remaining = self.remaining.saturating_sub(product.size());
    }
}
