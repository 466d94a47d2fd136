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

use factdb_core::{AccessViolation, EngineConfig, ExecutionStrategy, FactError, Registry, Relation, Scheduler, Signature, TargetStatus};
use std::sync::{Arc, OnceLock};

fn types(registry: &mut Registry) {
    registry
        .register_domain::<String, _, _, &str>("T", [], |_, domain| {
            domain.extend(["java.lang.String", "java.util.List", "Foo"].map(String::from))?;
            Ok(())
        })
        .unwrap();
}

fn name_filter(registry: &mut Registry, name: &str, list: &'static str) {
    registry
        .register_relation(name, Signature::unary("T"), ["T"], move |_, relation| {
            relation.load_name_filter(list, ',')?;
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_cycle_leaves_state_unchanged() {
    let mut registry = Registry::new();
    registry.register_domain::<String, _, _, _>("A", ["B"], |_, _| Ok(())).unwrap();
    registry.register_domain::<String, _, _, _>("B", ["A"], |_, _| Ok(())).unwrap();
    let scheduler = Scheduler::new(registry, EngineConfig::default());

    match scheduler.materialize("A") {
        Err(err @ FactError::CyclicDependency { .. }) => assert_eq!(err.to_string(), "Cyclic dependency: A -> B -> A"),
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
    assert_eq!(scheduler.status("A"), TargetStatus::NotStarted);
    assert_eq!(scheduler.status("B"), TargetStatus::NotStarted);
    assert_eq!(scheduler.metrics().total_executed, 0);
}

#[test]
fn test_failed_branch_is_isolated() {
    let mut registry = Registry::new();
    types(&mut registry);
    registry.register_domain::<String, _, _, _>("bad", ["T"], |_, _| Err(anyhow::anyhow!("boom"))).unwrap();
    registry.register_domain::<String, _, _, _>("dependent", ["bad"], |_, _| Ok(())).unwrap();
    name_filter(&mut registry, "other", "Foo");
    let scheduler = Scheduler::new(registry, EngineConfig::default());

    match scheduler.materialize("dependent") {
        Err(FactError::ExecutionFailure { descriptor, source }) => {
            assert_eq!(descriptor, "bad");
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("expected ExecutionFailure, got {other:?}"),
    }
    assert_eq!(scheduler.status("T"), TargetStatus::Done);
    assert_eq!(scheduler.status("bad"), TargetStatus::Failed);
    assert_eq!(scheduler.status("dependent"), TargetStatus::NotStarted);

    let other = scheduler.materialize("other").unwrap();
    assert_eq!(other.len(), 1);

    assert!(matches!(scheduler.materialize("dependent"), Err(FactError::PreviouslyFailed { target }) if target == "bad"));
    assert!(matches!(scheduler.materialize("bad"), Err(FactError::PreviouslyFailed { .. })));
    assert_eq!(scheduler.metrics().executions_of("bad"), 1);
}

#[test]
fn test_undeclared_read_fails_before_writing() {
    let mut registry = Registry::new();
    types(&mut registry);
    registry.register_domain::<String, _, _, &str>("M", [], |_, domain| {
        domain.intern("main".to_string())?;
        Ok(())
    })
    .unwrap();
    registry
        .register_relation("leaky", Signature::unary("T"), ["T"], |ctx, relation| {
            ctx.erased_domain("M")?;
            relation.add_unary(0)?;
            Ok(())
        })
        .unwrap();
    let scheduler = Scheduler::new(registry, EngineConfig::default());

    match scheduler.materialize("leaky") {
        Err(FactError::UndeclaredDependency { descriptor, target, violation }) => {
            assert_eq!(descriptor, "leaky");
            assert_eq!(target, "M");
            assert_eq!(violation, AccessViolation::Undeclared);
        }
        other => panic!("expected UndeclaredDependency, got {other:?}"),
    }
    assert_eq!(scheduler.status("leaky"), TargetStatus::Failed);
    assert_eq!(scheduler.status("M"), TargetStatus::NotStarted);
}

#[test]
fn test_cancellation_between_descriptors() {
    let slot: Arc<OnceLock<factdb_core::CancellationToken>> = Arc::new(OnceLock::new());
    let mut registry = Registry::new();
    let token_slot = Arc::clone(&slot);
    registry
        .register_domain::<String, _, _, &str>("T", [], move |_, domain| {
            domain.intern("Foo".to_string())?;
            if let Some(token) = token_slot.get() {
                token.cancel(Some("shutdown"));
            }
            Ok(())
        })
        .unwrap();
    name_filter(&mut registry, "excludeType", "Foo");
    let scheduler = Scheduler::new(registry, EngineConfig::default());
    slot.set(scheduler.cancellation_token()).unwrap();

    match scheduler.materialize("excludeType") {
        Err(FactError::Cancelled { descriptor, reason }) => {
            assert_eq!(descriptor, "excludeType");
            assert_eq!(reason.as_deref(), Some("shutdown"));
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
    // The running fill step completed and was published
    assert_eq!(scheduler.status("T"), TargetStatus::Done);
    assert_eq!(scheduler.status("excludeType"), TargetStatus::NotStarted);

    scheduler.reset();
    assert_eq!(scheduler.status("T"), TargetStatus::NotStarted);
}

#[test]
fn test_cancelled_before_start() {
    let mut registry = Registry::new();
    types(&mut registry);
    let scheduler = Scheduler::new(registry, EngineConfig::default());
    scheduler.cancellation_token().cancel(None);

    assert!(matches!(scheduler.materialize("T"), Err(FactError::Cancelled { reason: None, .. })));
    assert_eq!(scheduler.status("T"), TargetStatus::NotStarted);

    scheduler.reset();
    assert!(scheduler.materialize("T").is_ok());
}

#[test]
fn test_invalidate_reruns_dependents_only() {
    let mut registry = Registry::new();
    types(&mut registry);
    name_filter(&mut registry, "excludeType", "Foo, java.lang.String");
    registry.register_domain::<u32, _, _, &str>("Z", [], |_, domain| {
        domain.extend(0..4)?;
        Ok(())
    })
    .unwrap();
    let scheduler = Scheduler::new(registry, EngineConfig::default());

    let before = scheduler.materialize("excludeType").unwrap().into_relation().unwrap();
    scheduler.materialize("Z").unwrap();

    let mut invalidated = scheduler.invalidate("T").unwrap();
    invalidated.sort();
    assert_eq!(invalidated, vec!["T".to_string(), "excludeType".to_string()]);
    assert_eq!(scheduler.status("excludeType"), TargetStatus::NotStarted);
    assert_eq!(scheduler.status("Z"), TargetStatus::Done);

    let after = scheduler.materialize("excludeType").unwrap().into_relation().unwrap();
    assert_eq!(before, after);

    let metrics = scheduler.metrics();
    assert_eq!(metrics.executions_of("T"), 2);
    assert_eq!(metrics.executions_of("excludeType"), 2);
    assert_eq!(metrics.executions_of("Z"), 1);
}

#[test]
fn test_read_domain_rejects_growth() {
    let mut registry = Registry::new();
    types(&mut registry);
    name_filter(&mut registry, "excludeType", "Foo");
    let scheduler = Scheduler::new(registry, EngineConfig::default());

    scheduler.materialize("excludeType").unwrap();
    let handle = scheduler.registry().domain_handle::<String>("T").unwrap();
    let domain = scheduler.domain(&handle).unwrap();
    assert!(domain.is_frozen());
    assert_eq!(domain.intern("Foo".to_string()).unwrap(), 2);
    assert!(matches!(domain.intern("Bar".to_string()), Err(FactError::DomainFrozen { .. })));
}

fn diamond(strategy: ExecutionStrategy) -> Arc<Relation> {
    let mut registry = Registry::new();
    types(&mut registry);
    name_filter(&mut registry, "left", "Foo, Bar");
    name_filter(&mut registry, "right", "java.util.List");
    registry
        .register_relation("union", Signature::unary("T"), ["left", "right"], |ctx, relation| {
            for name in ["left", "right"] {
                let input = ctx.relation_by_name(name)?;
                relation.extend(input.iter())?;
            }
            Ok(())
        })
        .unwrap();
    registry.validate().unwrap();

    let scheduler = Scheduler::new(registry, EngineConfig::default().with_strategy(strategy));
    let handle = scheduler.registry().relation_handle("union").unwrap();
    scheduler.relation(&handle).unwrap()
}

#[test]
fn test_parallel_matches_sequential() {
    let sequential = diamond(ExecutionStrategy::Sequential);
    let parallel = diamond(ExecutionStrategy::Parallel);
    assert_eq!(sequential, parallel);
    assert_eq!(sequential.project(0).unwrap().len(), 2);
}

#[test]
fn test_self_consume_is_reported_as_cycle() {
    let mut registry = Registry::new();
    registry.register_domain::<String, _, _, _>("A", ["A"], |_, _| Ok(())).unwrap();
    assert!(matches!(registry.validate(), Err(FactError::CyclicDependency { .. })));
    let scheduler = Scheduler::new(registry, EngineConfig::default());

    match scheduler.materialize("A") {
        Err(FactError::CyclicDependency { cycle }) => assert_eq!(cycle, vec!["A", "A"]),
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
    assert_eq!(scheduler.status("A"), TargetStatus::NotStarted);
}

fn failing_batch(strategy: ExecutionStrategy) -> Scheduler {
    let mut registry = Registry::new();
    types(&mut registry);
    registry.register_domain::<String, _, _, _>("bad", ["T"], |_, _| Err(anyhow::anyhow!("boom"))).unwrap();
    name_filter(&mut registry, "other", "Foo");
    registry.register_domain::<String, _, _, _>("top", ["bad", "other"], |_, _| Ok(())).unwrap();
    Scheduler::new(registry, EngineConfig::default().with_strategy(strategy))
}

#[test]
fn test_parallel_failure_skips_unstarted_siblings() {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();

    for strategy in [ExecutionStrategy::Sequential, ExecutionStrategy::Parallel] {
        let scheduler = failing_batch(strategy);
        let result = pool.install(|| scheduler.materialize("top"));

        assert!(matches!(result, Err(FactError::ExecutionFailure { ref descriptor, .. }) if descriptor == "bad"), "{strategy}");
        assert_eq!(scheduler.status("bad"), TargetStatus::Failed, "{strategy}");
        assert_eq!(scheduler.status("other"), TargetStatus::NotStarted, "{strategy}");
        assert_eq!(scheduler.status("top"), TargetStatus::NotStarted, "{strategy}");
        assert_eq!(scheduler.metrics().total_executed, 2, "{strategy}");
    }
}

#[test]
fn test_parallel_failure_never_runs_later_batches() {
    let scheduler = failing_batch(ExecutionStrategy::Parallel);

    assert!(matches!(scheduler.materialize("top"), Err(FactError::ExecutionFailure { .. })));
    assert_eq!(scheduler.status("bad"), TargetStatus::Failed);
    assert_eq!(scheduler.status("top"), TargetStatus::NotStarted);
    assert_eq!(scheduler.metrics().executions_of("top"), 0);
}

#[test]
fn test_parallel_cancellation_between_batches() {
    let slot: Arc<OnceLock<factdb_core::CancellationToken>> = Arc::new(OnceLock::new());
    let mut registry = Registry::new();
    let token_slot = Arc::clone(&slot);
    registry
        .register_domain::<String, _, _, &str>("T", [], move |_, domain| {
            domain.intern("Foo".to_string())?;
            if let Some(token) = token_slot.get() {
                token.cancel(Some("shutdown"));
            }
            Ok(())
        })
        .unwrap();
    name_filter(&mut registry, "left", "Foo");
    name_filter(&mut registry, "right", "Foo");
    registry.register_domain::<String, _, _, _>("top", ["left", "right"], |_, _| Ok(())).unwrap();
    let scheduler = Scheduler::new(registry, EngineConfig::default().with_strategy(ExecutionStrategy::Parallel));
    slot.set(scheduler.cancellation_token()).unwrap();

    match scheduler.materialize("top") {
        Err(FactError::Cancelled { reason, .. }) => assert_eq!(reason.as_deref(), Some("shutdown")),
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(scheduler.status("T"), TargetStatus::Done);
    for name in ["left", "right", "top"] {
        assert_eq!(scheduler.status(name), TargetStatus::NotStarted, "{name}");
    }
    assert_eq!(scheduler.metrics().total_executed, 1);
}
