// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Execution metrics
//!
//! Every executed descriptor bumps the global `metrics` counters and leaves a
//! record in the scheduler's in-memory log.

use metrics::counter;
use std::time::Duration;

/// Metrics for a single descriptor execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorMetrics {
    /// Name of the descriptor
    pub descriptor: String,
    /// Wall time of the fill step
    pub duration: Duration,
    /// Whether the outputs were published
    pub succeeded: bool,
    /// Size of each published output, in declaration order
    pub output_sizes: Vec<(String, usize)>,
}

/// Metrics recorded by a scheduler
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    /// Per-descriptor records, in execution order
    pub descriptor_metrics: Vec<DescriptorMetrics>,
    /// Total number of descriptors executed
    pub total_executed: usize,
    /// Executions that failed
    pub total_failed: usize,
}

impl ExecutionMetrics {
    pub fn record(&mut self, metrics: DescriptorMetrics) {
        counter!("factdb_descriptors_executed", 1);
        if !metrics.succeeded {
            counter!("factdb_descriptors_failed", 1);
            self.total_failed += 1;
        }
        self.total_executed += 1;
        self.descriptor_metrics.push(metrics);
    }

    /// How many times a descriptor has run
    pub fn executions_of(&self, descriptor: &str) -> usize {
        self.descriptor_metrics.iter().filter(|m| m.descriptor == descriptor).count()
    }

    pub fn total_duration(&self) -> Duration {
        self.descriptor_metrics.iter().map(|m| m.duration).sum()
    }
}
