use super::types::SimTime;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
pub struct ScheduledEvent {
    pub time: SimTime,
    /// Model declaration index; breaks ties between simultaneous events
    pub model: usize,
    generation: u64,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.model.cmp(&self.model))
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

/// Next-event calendar holding one live entry per model.
///
/// Rescheduling a model bumps its generation; older heap entries for that
/// model become stale and are discarded when they surface.
pub struct EventScheduler {
    event_queue: BinaryHeap<ScheduledEvent>,
    generations: Vec<u64>,
}

impl EventScheduler {
    /// Create a scheduler for `models` models, all passive
    pub fn new(models: usize) -> Self {
        Self {
            event_queue: BinaryHeap::new(),
            generations: vec![0; models],
        }
    }

    /// Replace the pending event of `model`; infinite time means passive
    pub fn schedule(&mut self, model: usize, time: SimTime) {
        self.generations[model] += 1;
        if time.is_finite() {
            self.event_queue.push(ScheduledEvent {
                time,
                model,
                generation: self.generations[model],
            });
        }
    }

    /// Time of the earliest live event
    pub fn peek_next_time(&mut self) -> Option<SimTime> {
        self.discard_stale();
        self.event_queue.peek().map(|event| event.time)
    }

    /// Remove and return every model due at the earliest time, in tie-break order
    pub fn pop_imminent(&mut self) -> Vec<usize> {
        let mut models = Vec::new();

        if let Some(next_time) = self.peek_next_time() {
            while let Some(event) = self.event_queue.peek().copied() {
                if !self.is_live(&event) {
                    self.event_queue.pop();
                    continue;
                }
                if event.time != next_time {
                    break;
                }
                self.event_queue.pop();
                self.generations[event.model] += 1;
                models.push(event.model);
            }
        }

        models
    }

    /// Check if there are any live events remaining
    pub fn has_events(&mut self) -> bool {
        self.peek_next_time().is_some()
    }

    fn is_live(&self, event: &ScheduledEvent) -> bool {
        self.generations[event.model] == event.generation
    }

    fn discard_stale(&mut self) {
        while let Some(event) = self.event_queue.peek() {
            if self.is_live(event) {
                break;
            }
            self.event_queue.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imminent_models_in_declaration_order() {
        let mut scheduler = EventScheduler::new(3);
        scheduler.schedule(2, 5.0);
        scheduler.schedule(0, 5.0);
        scheduler.schedule(1, 7.0);

        assert_eq!(scheduler.peek_next_time(), Some(5.0));
        assert_eq!(scheduler.pop_imminent(), vec![0, 2]);
        assert_eq!(scheduler.pop_imminent(), vec![1]);
        assert!(!scheduler.has_events());
    }

    #[test]
    fn test_reschedule_discards_old_entry() {
        let mut scheduler = EventScheduler::new(2);
        scheduler.schedule(0, 1.0);
        scheduler.schedule(1, 3.0);
        scheduler.schedule(0, 4.0);

        assert_eq!(scheduler.pop_imminent(), vec![1]);
        assert_eq!(scheduler.peek_next_time(), Some(4.0));
    }

    #[test]
    fn test_passive_model_is_unscheduled() {
        let mut scheduler = EventScheduler::new(1);
        scheduler.schedule(0, 2.0);
        scheduler.schedule(0, f64::INFINITY);

        assert!(!scheduler.has_events());
        assert!(scheduler.pop_imminent().is_empty());
    }
}
