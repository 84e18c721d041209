use std::any::Any;
use std::sync::Arc;

use log::trace;
use rand::distributions::{Distribution, Uniform, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Exp;

use crate::core::model::{declare_ports, AtomicModel, PortType};
use crate::core::types::{SimTime, PASSIVE};
use crate::core::values::{PortBag, PortValue};
use crate::error::SimulationError;
use crate::shop::config::{ArrivalProcess, ProductTemplate};
use crate::shop::product::{Product, ProductId, ProductSpec};

pub const OUT_PRODUCT: &str = "out_product";

enum InterArrival {
    Uniform(Uniform<f64>),
    Exponential(Exp<f64>),
}

impl InterArrival {
    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            InterArrival::Uniform(dist) => dist.sample(rng),
            InterArrival::Exponential(dist) => dist.sample(rng),
        }
    }
}

/// Source of new products.
///
/// Emits the first product at t = 0, then one after every sampled
/// inter-arrival delay. The RNG is owned by the generator so a run is fully
/// determined by its seed.
pub struct Generator {
    rng: StdRng,
    templates: Vec<Arc<ProductSpec>>,
    mix: WeightedIndex<f64>,
    inter_arrival: InterArrival,
    next_product: Option<Product>,
    remaining: SimTime,
    next_id: u64,
    limit: Option<u64>,
}

impl Generator {
    pub fn new(
        seed: u64,
        rate: f64,
        templates: &[ProductTemplate],
        arrival_process: ArrivalProcess,
    ) -> Result<Self, SimulationError> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(SimulationError::InvalidConfig(format!("generation rate must be positive, got {}", rate)));
        }
        let mix = WeightedIndex::new(templates.iter().map(|template| template.probability))
            .map_err(|e| SimulationError::InvalidConfig(format!("product mix: {}", e)))?;
        let inter_arrival = match arrival_process {
            ArrivalProcess::Uniform => InterArrival::Uniform(Uniform::new(0.0, 2.0 / rate)),
            ArrivalProcess::Exponential => InterArrival::Exponential(
                Exp::new(rate).map_err(|e| SimulationError::InvalidConfig(format!("arrival rate: {}", e)))?,
            ),
        };

        let mut generator = Self {
            rng: StdRng::seed_from_u64(seed),
            templates: templates.iter().map(|template| Arc::new(template.spec())).collect(),
            mix,
            inter_arrival,
            next_product: None,
            remaining: 0.0,
            next_id: 0,
            limit: None,
        };
        generator.next_product = Some(generator.make_product(0.0));
        Ok(generator)
    }

    /// Stop after `limit` products
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        if limit == 0 {
            self.next_product = None;
            self.remaining = PASSIVE;
        }
        self
    }

    pub fn generated(&self) -> u64 {
        self.next_id - u64::from(self.next_product.is_some())
    }

    fn make_product(&mut self, arrival: SimTime) -> Product {
        let spec = Arc::clone(&self.templates[self.mix.sample(&mut self.rng)]);
        let mut product = Product::new(ProductId(self.next_id), spec);
        product.stamp_arrival(arrival);
        self.next_id += 1;
        product
    }
}

impl AtomicModel for Generator {
    fn name(&self) -> &str {
        "Generator"
    }

    fn ports(&self) -> Vec<(String, PortType)> {
        declare_ports(&[], &[OUT_PRODUCT])
    }

    fn time_advance(&self) -> SimTime {
        self.remaining
    }

    fn output(&self) -> PortBag {
        match &self.next_product {
            Some(product) => PortBag::single(OUT_PRODUCT, PortValue::Product(product.clone())),
            None => PortBag::new(),
        }
    }

    fn int_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        if let Some(product) = self.next_product.take() {
            trace!("Generator: emitted {} at t={:.3}", product, now);
        }

        if self.limit.is_some_and(|limit| self.next_id >= limit) {
            self.remaining = PASSIVE;
            return Ok(());
        }

        let delay = self.inter_arrival.sample(&mut self.rng);
        self.next_product = Some(self.make_product(now + delay));
        self.remaining = delay;
        Ok(())
    }

    fn ext_transition(&mut self, _now: SimTime, elapsed: SimTime, _inputs: PortBag) -> Result<(), SimulationError> {
        self.remaining = (self.remaining - elapsed).max(0.0);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
