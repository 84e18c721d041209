//! Parameter sweeps: scenarios × dispatch policies × max-wait durations.

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::execution::{ConcurrencyMode, SimulationConfig};
use crate::error::SimulationError;
use crate::shop::config::{MachineConfig, ProductTemplate, ShopConfig};
use crate::shop::dispatch::DispatchPolicy;
use crate::shop::system::{FlexibleJobShop, RunReport};

/// A named shop layout and product mix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub machines: Vec<MachineConfig>,
    pub gen_types: Vec<ProductTemplate>,
}

impl Scenario {
    pub fn baseline() -> Self {
        let defaults = ShopConfig::default();
        Self {
            name: "baseline".to_string(),
            machines: defaults.machines,
            gen_types: defaults.gen_types,
        }
    }

    /// A second machine of each kind, same capacities
    pub fn add_new_machines() -> Self {
        let mut scenario = Self::baseline();
        scenario.name = "add-new-machines".to_string();
        scenario.machines.push(MachineConfig::new("A_new", 3).with_kind("A"));
        scenario.machines.push(MachineConfig::new("B_new", 2).with_kind("B"));
        scenario
    }

    pub fn double_capacity() -> Self {
        let mut scenario = Self::baseline();
        scenario.name = "double-capacity".to_string();
        for machine in &mut scenario.machines {
            machine.capacity *= 2;
        }
        scenario
    }

    pub fn double_speed() -> Self {
        let mut scenario = Self::baseline();
        scenario.name = "double-speed".to_string();
        for template in &mut scenario.gen_types {
            for time in template.processing_times.values_mut() {
                *time /= 2.0;
            }
        }
        scenario
    }

    pub fn presets() -> Vec<Scenario> {
        vec![
            Self::baseline(),
            Self::add_new_machines(),
            Self::double_capacity(),
            Self::double_speed(),
        ]
    }

    pub fn preset(name: &str) -> Option<Scenario> {
        Self::presets().into_iter().find(|scenario| scenario.name == name)
    }
}

/// One point of the sweep
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub scenario: String,
    pub config: ShopConfig,
}

/// Result of one point of the sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub scenario: String,
    #[serde(flatten)]
    pub report: RunReport,
}

/// Every combination of scenario, policy and max-wait duration over one
/// shared base configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentPlan {
    /// Seed, target, arrival rate and routing settings shared by all runs
    pub base: ShopConfig,
    pub scenarios: Vec<Scenario>,
    pub policies: Vec<DispatchPolicy>,
    /// Seconds
    pub max_wait_durations: Vec<f64>,
    #[serde(default)]
    pub execution: SimulationConfig,
}

impl Default for ExperimentPlan {
    /// All four presets under both policies with 0, 3 and 6 minute waits
    fn default() -> Self {
        Self {
            base: ShopConfig::default(),
            scenarios: Scenario::presets(),
            policies: DispatchPolicy::ALL.to_vec(),
            max_wait_durations: vec![0.0, 3.0 * 60.0, 6.0 * 60.0],
            execution: SimulationConfig::default(),
        }
    }
}

impl ExperimentPlan {
    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        let plan: ExperimentPlan = serde_json::from_str(json)?;
        if plan.scenarios.is_empty() || plan.policies.is_empty() || plan.max_wait_durations.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "plan needs at least one scenario, policy and max-wait duration".to_string(),
            ));
        }
        Ok(plan)
    }

    pub fn with_execution(mut self, execution: SimulationConfig) -> Self {
        self.execution = execution;
        self
    }

    /// Runs in report order: scenario, then policy, then max-wait
    pub fn runs(&self) -> Vec<RunSpec> {
        let mut runs = Vec::new();
        for scenario in &self.scenarios {
            for &policy in &self.policies {
                for &max_wait_duration in &self.max_wait_durations {
                    let config = ShopConfig {
                        machines: scenario.machines.clone(),
                        gen_types: scenario.gen_types.clone(),
                        dispatching_strategy: policy,
                        max_wait_duration,
                        time_limit: self.execution.time_limit.or(self.base.time_limit),
                        ..self.base.clone()
                    };
                    runs.push(RunSpec {
                        scenario: scenario.name.clone(),
                        config,
                    });
                }
            }
        }
        runs
    }

    /// Execute every run; results come back in `runs()` order whatever the
    /// concurrency mode
    pub fn execute(&self) -> Result<Vec<RunResult>, SimulationError> {
        let runs = self.runs();
        info!(
            "Running {} simulations ({:?} mode)",
            runs.len(),
            self.execution.concurrency_mode
        );

        match self.execution.concurrency_mode {
            ConcurrencyMode::Sequential => runs.iter().map(run_one).collect(),
            ConcurrencyMode::Rayon => {
                let pool = self.execution.build_thread_pool()?;
                pool.install(|| runs.par_iter().map(run_one).collect())
            }
        }
    }
}

fn run_one(spec: &RunSpec) -> Result<RunResult, SimulationError> {
    info!(
        "Run simulation: config={}, strategy={}, max_wait={:.1}min",
        spec.scenario,
        spec.config.dispatching_strategy,
        spec.config.max_wait_duration / 60.0
    );
    let report = FlexibleJobShop::new(spec.config.clone())?.run()?;
    Ok(RunResult {
        scenario: spec.scenario.clone(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shop::product::MachineId;

    fn tiny_plan() -> ExperimentPlan {
        ExperimentPlan {
            base: ShopConfig {
                target_num: 15,
                ..ShopConfig::default()
            },
            scenarios: vec![Scenario::baseline(), Scenario::double_speed()],
            policies: DispatchPolicy::ALL.to_vec(),
            max_wait_durations: vec![0.0, 180.0],
            execution: SimulationConfig::default(),
        }
    }

    #[test]
    fn test_presets_are_valid() {
        for scenario in Scenario::presets() {
            let config = ShopConfig {
                machines: scenario.machines,
                gen_types: scenario.gen_types,
                ..ShopConfig::default()
            };
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_preset_variations() {
        let baseline = Scenario::baseline();
        let capacity = Scenario::double_capacity();
        assert_eq!(capacity.machines[0].capacity, 2 * baseline.machines[0].capacity);

        let speed = Scenario::double_speed();
        let a = MachineId::from("A");
        assert_eq!(speed.gen_types[0].processing_times[&a], 7.5 * 60.0);

        assert_eq!(Scenario::add_new_machines().machines.len(), 4);
        assert!(Scenario::preset("double-speed").is_some());
        assert!(Scenario::preset("triple-speed").is_none());
    }

    #[test]
    fn test_runs_enumerate_in_report_order() {
        let runs = tiny_plan().runs();
        assert_eq!(runs.len(), 8);
        assert_eq!(runs[0].scenario, "baseline");
        assert_eq!(runs[0].config.dispatching_strategy, DispatchPolicy::Fifo);
        assert_eq!(runs[1].config.max_wait_duration, 180.0);
        assert_eq!(runs[2].config.dispatching_strategy, DispatchPolicy::Priority);
        assert_eq!(runs[4].scenario, "double-speed");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = tiny_plan().execute().unwrap();
        let parallel = tiny_plan()
            .with_execution(
                SimulationConfig::new()
                    .with_concurrency(ConcurrencyMode::Rayon)
                    .with_thread_pool_size(2),
            )
            .execute()
            .unwrap();
        assert_eq!(sequential, parallel);
        assert!(sequential.iter().all(|result| result.report.finished() >= 15));
    }
}
