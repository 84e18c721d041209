use std::any::Any;

use log::debug;

use crate::core::model::{declare_ports, AtomicModel, PortType};
use crate::core::types::{SimTime, PASSIVE};
use crate::core::values::PortBag;
use crate::error::SimulationError;
use crate::shop::product::Product;

pub const IN_PRODUCT: &str = "in_product";

/// End of the line: records every product leaving the shop
pub struct Sink {
    target_num: usize,
    products: Vec<Product>,
    finished: usize,
}

impl Sink {
    pub fn new(target_num: usize) -> Self {
        Self {
            target_num,
            products: Vec::new(),
            finished: 0,
        }
    }

    /// Every product received, spoiled ones included, in arrival order
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Products that completed their recipe
    pub fn finished(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|product| !product.is_spoiled())
    }

    pub fn finished_count(&self) -> usize {
        self.finished
    }

    pub fn spoiled_count(&self) -> usize {
        self.products.len() - self.finished
    }

    /// Flow times of finished products, in sink arrival order
    pub fn flow_times(&self) -> Vec<SimTime> {
        self.finished().filter_map(Product::flow_time).collect()
    }

    pub fn target_reached(&self) -> bool {
        self.finished >= self.target_num
    }
}

impl AtomicModel for Sink {
    fn name(&self) -> &str {
        "Sink"
    }

    fn ports(&self) -> Vec<(String, PortType)> {
        declare_ports(&[IN_PRODUCT], &[])
    }

    fn time_advance(&self) -> SimTime {
        PASSIVE
    }

    fn output(&self) -> PortBag {
        PortBag::new()
    }

    fn int_transition(&mut self, _now: SimTime) -> Result<(), SimulationError> {
        Ok(())
    }

    fn ext_transition(&mut self, now: SimTime, _elapsed: SimTime, inputs: PortBag) -> Result<(), SimulationError> {
        for (port, value) in inputs {
            for mut product in PortBag::expect_products(self.name(), &port, value)? {
                let flow_time = product.stamp_exit(now);
                if !product.is_spoiled() {
                    self.finished += 1;
                }
                debug!("Sink: {} left after {:.1}s ({} finished)", product, flow_time, self.finished);
                self.products.push(product);
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
