use std::collections::BTreeMap;

use log::{debug, trace};

use crate::core::connections::ConnectionManager;
use crate::core::event_scheduler::EventScheduler;
use crate::core::model::AtomicModel;
use crate::core::types::{ModelId, SimTime};
use crate::core::values::PortBag;
use crate::error::SimulationError;

/// Observer trait for simulation progress
pub trait SimulationObserver {
    /// Called when the simulation clock advances
    fn on_time_advance(&mut self, old_time: SimTime, new_time: SimTime);

    /// Called when a round completes
    fn on_round_complete(&mut self, time: SimTime, transitions: usize);
}

/// Which transition a model receives in a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Internal,
    External,
    Confluent,
}

/// Next-event coordinator for a flat set of coupled atomic models.
///
/// Each round advances the clock to the earliest scheduled event, collects the
/// output of every imminent model, routes it along the couplings, and then
/// gives every imminent or receiving model exactly one transition, in
/// declaration order.
pub struct SimulationEngine {
    models: Vec<Box<dyn AtomicModel>>,
    ids: Vec<ModelId>,
    connections: ConnectionManager,
    scheduler: EventScheduler,
    last_transition: Vec<SimTime>,
    current_time: SimTime,
    time_limit: Option<SimTime>,
    rounds: u64,
    observers: Vec<Box<dyn SimulationObserver>>,
}

impl SimulationEngine {
    pub(crate) fn new(
        models: Vec<Box<dyn AtomicModel>>,
        ids: Vec<ModelId>,
        connections: ConnectionManager,
        time_limit: Option<SimTime>,
    ) -> Self {
        let mut scheduler = EventScheduler::new(models.len());
        for (index, model) in models.iter().enumerate() {
            scheduler.schedule(index, model.time_advance());
        }

        Self {
            last_transition: vec![0.0; models.len()],
            models,
            ids,
            connections,
            scheduler,
            current_time: 0.0,
            time_limit,
            rounds: 0,
            observers: Vec::new(),
        }
    }

    /// Add an observer to the simulation
    pub fn add_observer(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Run until no events remain or the time limit is hit
    pub fn run(&mut self) -> Result<SimTime, SimulationError> {
        self.run_until(|_| false)
    }

    /// Run until `done` holds (checked before every round), no events remain,
    /// or the time limit is hit. Returns the final simulation time.
    pub fn run_until<F>(&mut self, mut done: F) -> Result<SimTime, SimulationError>
    where
        F: FnMut(&SimulationEngine) -> bool,
    {
        while !done(self) {
            if !self.step()? {
                break;
            }
        }
        Ok(self.current_time)
    }

    /// Process one round, returns true if events remain
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        let Some(next_time) = self.scheduler.peek_next_time() else {
            return Ok(false);
        };
        if self.time_limit.is_some_and(|limit| next_time > limit) {
            return Ok(false);
        }

        let old_time = self.current_time;
        self.current_time = next_time;
        if old_time != next_time {
            for observer in &mut self.observers {
                observer.on_time_advance(old_time, next_time);
            }
        }

        let imminent = self.scheduler.pop_imminent();
        let mut inputs = self.collect_outputs(&imminent);

        let mut affected: Vec<usize> = imminent.clone();
        affected.extend(inputs.keys().copied());
        affected.sort_unstable();
        affected.dedup();

        debug!(
            "=== t={:.3} round {}: {} imminent, {} receiving ===",
            self.current_time,
            self.rounds,
            imminent.len(),
            inputs.len()
        );

        for &index in &affected {
            let bag = inputs.remove(&index);
            let transition = match (imminent.binary_search(&index).is_ok(), bag.is_some()) {
                (true, false) => Transition::Internal,
                (true, true) => Transition::Confluent,
                _ => Transition::External,
            };
            self.apply(index, transition, bag.unwrap_or_default())?;
        }

        self.rounds += 1;
        for observer in &mut self.observers {
            observer.on_round_complete(self.current_time, affected.len());
        }

        Ok(self.scheduler.has_events())
    }

    /// Route the output of every imminent model to its coupled inputs
    fn collect_outputs(&self, imminent: &[usize]) -> BTreeMap<usize, PortBag> {
        let mut inputs: BTreeMap<usize, PortBag> = BTreeMap::new();

        for &source in imminent {
            for (port, value) in self.models[source].output() {
                let targets = self.connections.get_targets(source, &port);
                if targets.is_empty() {
                    trace!("{}.{} has no coupling, dropping {}", self.ids[source], port, value.kind());
                }
                for (target, target_port) in targets {
                    trace!(
                        "{}.{} -> {}.{}: {}",
                        self.ids[source],
                        port,
                        self.ids[*target],
                        target_port,
                        value.kind()
                    );
                    inputs
                        .entry(*target)
                        .or_default()
                        .push(target_port, value.clone());
                }
            }
        }

        inputs
    }

    fn apply(&mut self, index: usize, transition: Transition, bag: PortBag) -> Result<(), SimulationError> {
        let now = self.current_time;
        let elapsed = now - self.last_transition[index];
        let model = &mut self.models[index];

        trace!("{} {:?} transition at t={:.3}", self.ids[index], transition, now);
        match transition {
            Transition::Internal => model.int_transition(now)?,
            Transition::External => model.ext_transition(now, elapsed, bag)?,
            Transition::Confluent => model.conf_transition(now, bag)?,
        }

        self.last_transition[index] = now;
        self.scheduler.schedule(index, now + model.time_advance());
        Ok(())
    }

    /// Typed read access to a model
    pub fn model<T: 'static>(&self, id: &ModelId) -> Option<&T> {
        self.models
            .get(id.index())
            .and_then(|model| model.as_any().downcast_ref::<T>())
    }

    /// Get current simulation time
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Number of rounds processed so far
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn model_ids(&self) -> &[ModelId] {
        &self.ids
    }

    /// Check if there are pending events in the scheduler
    pub fn has_pending_events(&mut self) -> bool {
        self.scheduler.has_events()
    }
}
