use log::info;
use serde::Serialize;

use crate::core::builder::Simulation;
use crate::core::execution::SimulationEngine;
use crate::core::types::{ModelId, SimTime};
use crate::error::SimulationError;
use crate::shop::config::ShopConfig;
use crate::shop::dispatch::DispatchPolicy;
use crate::shop::generator::{self, Generator};
use crate::shop::machine::{self, Machine, MachineStatistics};
use crate::shop::product::MachineId;
use crate::shop::router::{self, Router, RouterCounters};
use crate::shop::sink::{self, Sink};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineReport {
    pub id: MachineId,
    pub capacity: u32,
    #[serde(flatten)]
    pub statistics: MachineStatistics,
}

/// Outcome of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub policy: DispatchPolicy,
    pub max_wait_duration: f64,
    /// Flow times of finished products in sink order, in seconds
    pub flow_times: Vec<SimTime>,
    pub spoiled: usize,
    pub machines: Vec<MachineReport>,
    pub avg_queue_length: f64,
    pub simulated_time: SimTime,
    pub rounds: u64,
    pub router: RouterCounters,
}

impl RunReport {
    pub fn finished(&self) -> usize {
        self.flow_times.len()
    }

    pub fn mean_flow_time(&self) -> Option<f64> {
        if self.flow_times.is_empty() {
            return None;
        }
        Some(self.flow_times.iter().sum::<f64>() / self.flow_times.len() as f64)
    }
}

/// Generator, router, machines and sink, coupled and ready to run
pub struct FlexibleJobShop {
    config: ShopConfig,
    engine: SimulationEngine,
    generator: ModelId,
    router: ModelId,
    machines: Vec<ModelId>,
    sink: ModelId,
}

impl FlexibleJobShop {
    pub fn new(config: ShopConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut sim = Simulation::new();
        let source = sim.add_model(Generator::new(
            config.seed,
            config.gen_rate,
            &config.gen_types,
            config.arrival_process,
        )?);

        let mut router_model = Router::from_slots(
            config.machine_slots(),
            config.routing_time_per_size,
            config.dispatching_strategy,
        );
        if let Some(spoilage) = &config.spoilage {
            router_model = router_model.with_spoilage(spoilage.clone());
        }
        let dispatcher = sim.add_model(router_model);

        let mut machines = Vec::with_capacity(config.machines.len());
        for spec in &config.machines {
            machines.push(sim.add_model(
                Machine::new(spec.id.clone(), spec.capacity, config.max_wait_duration).with_kind(spec.kind().clone()),
            ));
        }
        let exit = sim.add_model(Sink::new(config.target_num));

        sim.connect(source.output(generator::OUT_PRODUCT), dispatcher.input(router::IN_PRODUCT))?;
        for (spec, model) in config.machines.iter().zip(&machines) {
            sim.connect(dispatcher.output(&router::to_machine_port(&spec.id)), model.input(machine::IN_PRODUCT))?;
            sim.connect(model.output(machine::OUT_BATCH), dispatcher.input(&router::from_machine_port(&spec.id)))?;
            sim.connect(model.output(machine::OUT_CAPACITY), dispatcher.input(&router::capacity_port(&spec.id)))?;
        }
        sim.connect(dispatcher.output(router::OUT_SINK), exit.input(sink::IN_PRODUCT))?;

        if let Some(limit) = config.time_limit {
            sim = sim.with_time_limit(limit);
        }

        Ok(Self {
            engine: sim.build(),
            config,
            generator: source,
            router: dispatcher,
            machines,
            sink: exit,
        })
    }

    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Advance one round; false once nothing is left to do
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        self.engine.step()
    }

    pub fn generator(&self) -> Result<&Generator, SimulationError> {
        self.lookup(&self.generator)
    }

    pub fn router(&self) -> Result<&Router, SimulationError> {
        self.lookup(&self.router)
    }

    /// Machines in declaration order
    pub fn machines(&self) -> Result<Vec<&Machine>, SimulationError> {
        self.machines.iter().map(|id| self.lookup(id)).collect()
    }

    pub fn sink(&self) -> Result<&Sink, SimulationError> {
        self.lookup(&self.sink)
    }

    /// Run until the sink holds the target number of finished products,
    /// the time limit is hit, or nothing is left to happen
    pub fn run(&mut self) -> Result<RunReport, SimulationError> {
        let sink = self.sink.clone();
        let end = self.engine.run_until(|engine| {
            engine
                .model::<Sink>(&sink)
                .map_or(true, Sink::target_reached)
        })?;

        let report = self.report(end)?;
        info!(
            "{} / max_wait {:.0}s: {} finished, {} spoiled in {:.0}s simulated ({} rounds)",
            report.policy,
            report.max_wait_duration,
            report.finished(),
            report.spoiled,
            report.simulated_time,
            report.rounds
        );
        for machine in &report.machines {
            info!(
                "  Machine {}: utilization {:.1}%, avg occupancy {:.2}, {} batches",
                machine.id,
                machine.statistics.utilization * 100.0,
                machine.statistics.avg_occupancy,
                machine.statistics.num_batches
            );
        }
        info!("  Router: avg queue length {:.2}", report.avg_queue_length);
        Ok(report)
    }

    /// Summarize the run so far; statistics are taken over the router's clock
    pub fn report(&self, end: SimTime) -> Result<RunReport, SimulationError> {
        let router = self.router()?;
        let sink = self.sink()?;
        let simulated_time = if router.last_time() > 0.0 {
            router.last_time()
        } else {
            end
        };

        let machines = self
            .machines()?
            .into_iter()
            .map(|machine| MachineReport {
                id: machine.id().clone(),
                capacity: machine.capacity(),
                statistics: machine.statistics(simulated_time),
            })
            .collect();

        Ok(RunReport {
            policy: router.policy(),
            max_wait_duration: self.config.max_wait_duration,
            flow_times: sink.flow_times(),
            spoiled: sink.spoiled_count(),
            machines,
            avg_queue_length: router.average_queue_length(simulated_time),
            simulated_time,
            rounds: self.engine.rounds(),
            router: router.counters(),
        })
    }

    fn lookup<T: 'static>(&self, id: &ModelId) -> Result<&T, SimulationError> {
        self.engine
            .model::<T>(id)
            .ok_or_else(|| SimulationError::ModelNotFound(id.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(policy: DispatchPolicy) -> ShopConfig {
        ShopConfig {
            target_num: 40,
            dispatching_strategy: policy,
            ..ShopConfig::default()
        }
    }

    #[test]
    fn test_run_reaches_target() {
        let mut shop = FlexibleJobShop::new(small(DispatchPolicy::Fifo)).unwrap();
        let report = shop.run().unwrap();

        assert!(report.finished() >= 40);
        assert_eq!(report.spoiled, 0);
        assert_eq!(report.machines.len(), 2);
        assert!(report.flow_times.iter().all(|t| *t > 0.0));
        assert!(report.machines.iter().all(|m| m.statistics.num_batches > 0));
        assert!(report.avg_queue_length >= 0.0);
    }

    #[test]
    fn test_runs_are_reproducible() {
        let first = FlexibleJobShop::new(small(DispatchPolicy::Priority)).unwrap().run().unwrap();
        let second = FlexibleJobShop::new(small(DispatchPolicy::Priority)).unwrap().run().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_time_limit_stops_early() {
        let config = ShopConfig {
            time_limit: Some(3600.0),
            ..small(DispatchPolicy::Fifo)
        };
        let mut shop = FlexibleJobShop::new(config).unwrap();
        let report = shop.run().unwrap();
        assert!(report.finished() < 40);
        assert!(shop.engine().current_time() <= 3600.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ShopConfig {
            machines: Vec::new(),
            ..ShopConfig::default()
        };
        assert!(FlexibleJobShop::new(config).is_err());
    }
}
