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

//! Scheduler: materializes targets by running descriptors in dependency order

use crate::cancellation::CancellationToken;
use crate::config::{EngineConfig, ExecutionStrategy};
use crate::context::{FillContext, Outputs};
use crate::descriptor::{AnalysisDescriptor, TargetKind};
use crate::domain::{Domain, ErasedDomain, Fact};
use crate::error::{AccessViolation, FactError, FactResult};
use crate::handle::{DomainHandle, RelationHandle};
use crate::metrics::{DescriptorMetrics, ExecutionMetrics};
use crate::registry::Registry;
use crate::relation::Relation;
use crate::resolver::Resolver;
use crate::state::{Artifact, RunState, TargetStatus};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Owns the registry and the run state.
///
/// Every descriptor runs at most once per run. Calls to
/// [`materialize`](Self::materialize) are serialized; the artifacts they
/// return are immutable snapshots that stay valid after later calls.
pub struct Scheduler {
    registry: Registry,
    config: EngineConfig,
    state: RwLock<RunState>,
    run_lock: Mutex<()>,
    metrics: Mutex<ExecutionMetrics>,
    cancellation: CancellationToken,
}

impl Scheduler {
    pub fn new(registry: Registry, config: EngineConfig) -> Self {
        info!(descriptors = registry.len(), strategy = %config.strategy, "Creating scheduler");
        Self {
            registry,
            config,
            state: RwLock::new(RunState::default()),
            run_lock: Mutex::new(()),
            metrics: Mutex::new(ExecutionMetrics::default()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ensure `target` is fully populated and return it.
    ///
    /// Runs every not-yet-done producer the target transitively depends on,
    /// dependencies first. A target that is already done is returned from
    /// the cache without running anything.
    #[instrument(skip(self), fields(strategy = %self.config.strategy))]
    pub fn materialize(&self, target: &str) -> FactResult<Artifact> {
        let _run = self.run_lock.lock();
        self.registry.lookup(target)?;

        {
            let state = self.state.read();
            match state.status(target) {
                TargetStatus::Done => {
                    if let Some(artifact) = state.artifact(target) {
                        debug!(target, "Target already materialized");
                        return Ok(artifact.clone());
                    }
                }
                TargetStatus::Failed => return Err(FactError::PreviouslyFailed { target: target.to_string() }),
                TargetStatus::NotStarted | TargetStatus::InProgress => {}
            }
        }

        let resolver = Resolver::new(&self.registry);
        let order = {
            let state = self.state.read();
            resolver.order_for(target, |name| state.is_done(name))?
        };
        self.check_failed_dependencies(&order)?;
        debug!(target, order = ?order.iter().map(|d| d.name()).collect::<Vec<_>>(), "Resolved execution order");

        match self.config.strategy {
            ExecutionStrategy::Sequential => {
                for descriptor in &order {
                    self.check_cancelled(descriptor)?;
                    self.execute(descriptor)?;
                }
            }
            ExecutionStrategy::Parallel => {
                // Set by the first error; batch members not yet started are skipped
                let aborted = AtomicBool::new(false);
                for batch in resolver.batches(&order)? {
                    let results: Vec<Option<FactResult<()>>> = batch
                        .par_iter()
                        .map(|descriptor| {
                            if aborted.load(Ordering::Acquire) {
                                return None;
                            }
                            let result = self.check_cancelled(descriptor).and_then(|()| self.execute(descriptor));
                            if result.is_err() {
                                aborted.store(true, Ordering::Release);
                            }
                            Some(result)
                        })
                        .collect();
                    results.into_iter().flatten().collect::<FactResult<Vec<()>>>()?;
                }
            }
        }

        self.state.read().artifact(target).cloned().ok_or_else(|| FactError::UnknownTarget {
            name: target.to_string(),
            requested_by: None,
        })
    }

    /// Materialize a domain and return it with its fact type
    pub fn domain<F: Fact>(&self, handle: &DomainHandle<F>) -> FactResult<Arc<Domain<F>>> {
        self.materialize(handle.name())?.into_domain()
    }

    /// Materialize a relation
    pub fn relation(&self, handle: &RelationHandle) -> FactResult<Arc<Relation>> {
        self.materialize(handle.name())?.into_relation()
    }

    pub fn status(&self, name: &str) -> TargetStatus {
        self.state.read().status(name)
    }

    /// Forget every status and artifact and clear any cancellation
    pub fn reset(&self) {
        let _run = self.run_lock.lock();
        self.state.write().clear();
        self.cancellation.reset();
        info!("Run state reset");
    }

    /// Return `name` and everything downstream of it to `NotStarted`.
    ///
    /// The next request re-runs the invalidated producers and nothing else.
    /// Returns the names that were reset.
    pub fn invalidate(&self, name: &str) -> FactResult<Vec<String>> {
        let _run = self.run_lock.lock();
        let producer = self.registry.lookup(name)?;

        let graph = self.registry.dependency_graph();
        let mut descriptors = vec![producer.name().to_string()];
        descriptors.extend(graph.transitive_dependents(producer.name()));

        let names: Vec<String> = descriptors
            .iter()
            .filter_map(|descriptor| self.registry.descriptor_named(descriptor))
            .flat_map(|descriptor| descriptor.outputs().map(str::to_string).collect::<Vec<_>>())
            .collect();
        self.state.write().forget(&names);
        info!(target = name, invalidated = ?names, "Invalidated targets");
        Ok(names)
    }

    /// Token that cancels this scheduler's runs; clones share the signal
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn metrics(&self) -> ExecutionMetrics {
        self.metrics.lock().clone()
    }

    fn check_failed_dependencies(&self, order: &[Arc<AnalysisDescriptor>]) -> FactResult<()> {
        let state = self.state.read();
        for descriptor in order {
            if let Some(failed) = descriptor.outputs().find(|output| state.status(output) == TargetStatus::Failed) {
                return Err(FactError::PreviouslyFailed { target: failed.to_string() });
            }
        }
        Ok(())
    }

    fn check_cancelled(&self, descriptor: &AnalysisDescriptor) -> FactResult<()> {
        if self.cancellation.is_cancelled() {
            let reason = self.cancellation.reason();
            warn!(descriptor = descriptor.name(), ?reason, "Run cancelled");
            return Err(FactError::Cancelled {
                descriptor: descriptor.name().to_string(),
                reason,
            });
        }
        Ok(())
    }

    /// Run one descriptor and publish or fail its outputs
    fn execute(&self, descriptor: &Arc<AnalysisDescriptor>) -> FactResult<()> {
        let names: Vec<String> = descriptor.outputs().map(str::to_string).collect();
        let inputs = {
            let mut state = self.state.write();
            state.mark_in_progress(&names);
            state.snapshot(descriptor.consumes())
        };

        debug!(descriptor = descriptor.name(), inputs = inputs.len(), "Executing analysis");
        let started = Instant::now();
        let result = self.fill(descriptor, inputs);
        let duration = started.elapsed();

        match result {
            Ok(artifacts) => {
                let output_sizes = artifacts.iter().map(|a| (a.name().to_string(), a.len())).collect();
                self.state.write().publish(artifacts);
                info!(descriptor = descriptor.name(), ?duration, "Analysis completed");
                self.metrics.lock().record(DescriptorMetrics {
                    descriptor: descriptor.name().to_string(),
                    duration,
                    succeeded: true,
                    output_sizes,
                });
                Ok(())
            }
            Err(err) => {
                self.state.write().fail(&names);
                warn!(descriptor = descriptor.name(), error = %err, "Analysis failed");
                self.metrics.lock().record(DescriptorMetrics {
                    descriptor: descriptor.name().to_string(),
                    duration,
                    succeeded: false,
                    output_sizes: Vec::new(),
                });
                Err(err)
            }
        }
    }

    fn fill(&self, descriptor: &AnalysisDescriptor, inputs: HashMap<String, Artifact>) -> FactResult<Vec<Artifact>> {
        let outputs = prepare_outputs(descriptor, &inputs)?;
        let mut ctx = FillContext::new(descriptor, &self.config, inputs, outputs);
        descriptor.run(&mut ctx).map_err(|err| classify(descriptor.name(), err))?;
        Ok(ctx.into_outputs())
    }
}

/// Create the descriptor's outputs empty: domains first, then relations bound
/// to the domains of their signatures
fn prepare_outputs(descriptor: &AnalysisDescriptor, inputs: &HashMap<String, Artifact>) -> FactResult<Outputs> {
    let mut outputs = Outputs::default();
    for target in descriptor.produces() {
        if let TargetKind::Domain { make, .. } = target.kind() {
            outputs.insert_domain(make(target.name()));
        }
    }

    for target in descriptor.produces() {
        let TargetKind::Relation { signature } = target.kind() else {
            continue;
        };
        let mut domains: Vec<Arc<dyn ErasedDomain>> = Vec::with_capacity(signature.arity());
        for column in signature.columns() {
            let domain = match outputs.domain(column.domain()) {
                Some(own) => Arc::clone(own),
                None => signature_domain(descriptor, column.domain(), inputs)?,
            };
            domains.push(domain);
        }
        outputs.insert_relation(Relation::new(target.name(), signature.clone(), domains)?);
    }
    Ok(outputs)
}

/// Consumed domain backing a relation column; binding a relation to it counts as a read
fn signature_domain(descriptor: &AnalysisDescriptor, name: &str, inputs: &HashMap<String, Artifact>) -> FactResult<Arc<dyn ErasedDomain>> {
    match inputs.get(name) {
        Some(Artifact::Domain(domain)) => {
            domain.freeze();
            Ok(Arc::clone(domain))
        }
        Some(Artifact::Relation(_)) => Err(FactError::type_mismatch(name, "domain")),
        None => Err(FactError::UndeclaredDependency {
            descriptor: descriptor.name().to_string(),
            target: name.to_string(),
            violation: AccessViolation::NotDone,
        }),
    }
}

/// Engine errors raised inside a fill step surface unchanged
fn classify(descriptor: &str, err: anyhow::Error) -> FactError {
    match err.downcast::<FactError>() {
        Ok(fact) => fact,
        Err(source) => FactError::ExecutionFailure {
            descriptor: descriptor.to_string(),
            source,
        },
    }
}
