//! Shop configuration, loadable from JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::shop::dispatch::{DispatchPolicy, MachineSlot};
use crate::shop::product::{MachineId, ProductSpec, ProductType};
use crate::shop::router::SpoilagePolicy;

/// One kind of product the generator can create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTemplate {
    pub product_type: ProductType,
    pub size: u32,
    pub recipe: Vec<MachineId>,
    pub processing_times: BTreeMap<MachineId, f64>,
    /// Relative weight in the product mix
    pub probability: f64,
}

impl ProductTemplate {
    pub fn new(
        product_type: ProductType,
        size: u32,
        recipe: &[&str],
        processing_times: &[(&str, f64)],
        probability: f64,
    ) -> Self {
        Self {
            product_type,
            size,
            recipe: recipe.iter().map(|m| MachineId::from(*m)).collect(),
            processing_times: processing_times
                .iter()
                .map(|(m, t)| (MachineId::from(*m), *t))
                .collect(),
            probability,
        }
    }

    pub fn spec(&self) -> ProductSpec {
        ProductSpec::new(
            self.product_type,
            self.size,
            self.recipe.clone(),
            self.processing_times.clone(),
        )
    }
}

/// Inter-arrival time distribution, both with mean `1 / rate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalProcess {
    /// Uniform on `(0, 2 / rate)`
    #[default]
    Uniform,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub id: MachineId,
    pub capacity: u32,
    /// Recipe step served, when it differs from `id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MachineId>,
}

impl MachineConfig {
    pub fn new(id: &str, capacity: u32) -> Self {
        Self {
            id: MachineId::from(id),
            capacity,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(MachineId::from(kind));
        self
    }

    pub fn kind(&self) -> &MachineId {
        self.kind.as_ref().unwrap_or(&self.id)
    }
}

/// Everything needed to build and run one shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub seed: u64,
    /// Finished (non-spoiled) products required to stop
    pub target_num: usize,
    /// Products per second
    pub gen_rate: f64,
    #[serde(default)]
    pub arrival_process: ArrivalProcess,
    pub gen_types: Vec<ProductTemplate>,
    /// Declaration order is the router's scan order
    pub machines: Vec<MachineConfig>,
    #[serde(default)]
    pub dispatching_strategy: DispatchPolicy,
    pub max_wait_duration: f64,
    pub routing_time_per_size: f64,
    #[serde(default)]
    pub spoilage: Option<SpoilagePolicy>,
    #[serde(default)]
    pub time_limit: Option<f64>,
}

impl Default for ShopConfig {
    /// Two machines, two product types, one arrival every four minutes
    fn default() -> Self {
        Self {
            seed: 0,
            target_num: 500,
            gen_rate: 1.0 / 60.0 / 4.0,
            arrival_process: ArrivalProcess::Uniform,
            gen_types: vec![
                ProductTemplate::new(0, 1, &["A", "B"], &[("A", 15.0 * 60.0), ("B", 10.0 * 60.0)], 2.0 / 3.0),
                ProductTemplate::new(1, 2, &["B", "A"], &[("A", 20.0 * 60.0), ("B", 13.0 * 60.0)], 1.0 / 3.0),
            ],
            machines: vec![MachineConfig::new("A", 3), MachineConfig::new("B", 2)],
            dispatching_strategy: DispatchPolicy::Fifo,
            max_wait_duration: 3.0 * 60.0,
            routing_time_per_size: 30.0,
            spoilage: None,
            time_limit: None,
        }
    }
}

impl ShopConfig {
    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        let config: ShopConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Router view of the machines, in scan order
    pub fn machine_slots(&self) -> Vec<MachineSlot> {
        self.machines
            .iter()
            .map(|machine| MachineSlot::new(machine.id.clone(), machine.capacity).with_kind(machine.kind().clone()))
            .collect()
    }

    /// Reject configurations that would break the routing contract at run time
    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |msg: String| Err(SimulationError::InvalidConfig(msg));

        if self.machines.is_empty() {
            return invalid("at least one machine is required".to_string());
        }
        if self.gen_types.is_empty() {
            return invalid("at least one product type is required".to_string());
        }
        if !(self.gen_rate > 0.0 && self.gen_rate.is_finite()) {
            return invalid(format!("generation rate must be positive, got {}", self.gen_rate));
        }
        if self.max_wait_duration < 0.0 || self.routing_time_per_size < 0.0 {
            return invalid("durations must not be negative".to_string());
        }

        for (index, machine) in self.machines.iter().enumerate() {
            if machine.capacity == 0 {
                return invalid(format!("machine {} has no capacity", machine.id));
            }
            if self.machines[..index].iter().any(|other| other.id == machine.id) {
                return invalid(format!("machine {} is declared twice", machine.id));
            }
        }

        for template in &self.gen_types {
            if template.size == 0 {
                return invalid(format!("product type {} has size 0", template.product_type));
            }
            for step in &template.recipe {
                let largest = self
                    .machines
                    .iter()
                    .filter(|m| m.kind() == step)
                    .map(|m| m.capacity)
                    .max();
                let Some(largest) = largest else {
                    return invalid(format!(
                        "product type {} visits unknown machine {}",
                        template.product_type, step
                    ));
                };
                if template.size > largest {
                    return invalid(format!(
                        "product type {} (size {}) never fits machine {} (capacity {})",
                        template.product_type, template.size, step, largest
                    ));
                }
                if !template.processing_times.contains_key(step) {
                    return invalid(format!(
                        "product type {} has no processing time for machine {}",
                        template.product_type, step
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ShopConfig::default().validate().unwrap();
    }

    #[test]
    fn test_json_round_trip_keeps_machine_order() {
        let json = r#"{
            "seed": 3,
            "target_num": 10,
            "gen_rate": 0.01,
            "gen_types": [
                {"product_type": 0, "size": 1, "recipe": ["B", "A"],
                 "processing_times": {"A": 60.0, "B": 30.0}, "probability": 1.0}
            ],
            "machines": [{"id": "B", "capacity": 2}, {"id": "A", "capacity": 1}],
            "dispatching_strategy": "priority",
            "max_wait_duration": 0.0,
            "routing_time_per_size": 5.0,
            "spoilage": {"A": 600.0}
        }"#;

        let config = ShopConfig::from_json(json).unwrap();
        assert_eq!(config.machines[0].id, MachineId::from("B"));
        assert_eq!(config.dispatching_strategy, DispatchPolicy::Priority);
        assert_eq!(config.arrival_process, ArrivalProcess::Uniform);
        assert_eq!(
            config.spoilage.unwrap().thresholds.get(&MachineId::from("A")),
            Some(&600.0)
        );
    }

    #[test]
    fn test_oversized_product_is_rejected() {
        let mut config = ShopConfig::default();
        config.machines[1].capacity = 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("never fits machine B"));
    }

    #[test]
    fn test_machine_kind_serves_recipe_step() {
        let mut config = ShopConfig::default();
        config.machines.push(MachineConfig::new("B_new", 2).with_kind("B"));
        config.validate().unwrap();

        let slots = config.machine_slots();
        assert_eq!(slots[2].id, MachineId::from("B_new"));
        assert_eq!(slots[2].kind, MachineId::from("B"));
    }

    #[test]
    fn test_unknown_recipe_machine_is_rejected() {
        let mut config = ShopConfig::default();
        config.gen_types[0].recipe.push("C".into());
        assert!(matches!(config.validate(), Err(SimulationError::InvalidConfig(_))));
    }
}
