//! Execution settings shared by every run of an experiment sweep.
//!
//! A single simulation is always sequential; concurrency only applies across
//! independent runs.

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// How independent runs are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One run after another on the calling thread
    #[default]
    Sequential,
    /// Runs spread over a Rayon thread pool
    Rayon,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub concurrency_mode: ConcurrencyMode,
    /// Only relevant in Rayon mode; `None` uses Rayon's default size
    #[serde(default)]
    pub thread_pool_size: Option<usize>,
    /// Hard stop for a single run, in simulated seconds
    #[serde(default)]
    pub time_limit: Option<f64>,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    pub fn with_time_limit(mut self, limit: f64) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Dedicated pool for Rayon mode
    pub fn build_thread_pool(&self) -> Result<rayon::ThreadPool, SimulationError> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(size) = self.thread_pool_size {
            builder = builder.num_threads(size);
        }
        builder
            .build()
            .map_err(|e| SimulationError::ThreadPool(e.to_string()))
    }
}
