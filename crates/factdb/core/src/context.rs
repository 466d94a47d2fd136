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

//! Fill context handed to a descriptor's population logic

use crate::config::EngineConfig;
use crate::descriptor::{AnalysisDescriptor, TargetKind};
use crate::domain::{Domain, ErasedDomain, Fact, downcast_domain};
use crate::error::{AccessViolation, FactError, FactResult};
use crate::handle::{DomainHandle, RelationHandle};
use crate::relation::Relation;
use crate::state::Artifact;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Outputs created by the scheduler before a fill step runs
#[derive(Debug, Default)]
pub(crate) struct Outputs {
    domains: HashMap<String, Arc<dyn ErasedDomain>>,
    relations: HashMap<String, Relation>,
}

impl Outputs {
    pub fn insert_domain(&mut self, domain: Arc<dyn ErasedDomain>) {
        self.domains.insert(domain.name().to_string(), domain);
    }

    pub fn insert_relation(&mut self, relation: Relation) {
        self.relations.insert(relation.name().to_string(), relation);
    }

    pub fn domain(&self, name: &str) -> Option<&Arc<dyn ErasedDomain>> {
        self.domains.get(name)
    }
}

/// View of the run available to one executing descriptor.
///
/// Inputs are the descriptor's declared consumes that were done when the fill
/// step started. Reading anything else fails with
/// [`FactError::UndeclaredDependency`]. Outputs are the descriptor's own
/// produced artifacts, already created empty.
pub struct FillContext<'a> {
    descriptor: &'a AnalysisDescriptor,
    config: &'a EngineConfig,
    inputs: HashMap<String, Artifact>,
    outputs: Outputs,
}

impl<'a> FillContext<'a> {
    pub(crate) fn new(descriptor: &'a AnalysisDescriptor, config: &'a EngineConfig, inputs: HashMap<String, Artifact>, outputs: Outputs) -> Self {
        Self {
            descriptor,
            config,
            inputs,
            outputs,
        }
    }

    /// Name of the executing descriptor
    pub fn descriptor_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// Configuration property, if set
    pub fn property(&self, key: &str) -> Option<&str> {
        self.config.property(key)
    }

    /// Consumed artifact by name
    pub fn input(&self, name: &str) -> FactResult<&Artifact> {
        if !self.descriptor.consumes_name(name) {
            return Err(self.violation(name, AccessViolation::Undeclared));
        }
        self.inputs.get(name).ok_or_else(|| self.violation(name, AccessViolation::NotDone))
    }

    /// Consumed domain without its fact type. Reading a domain freezes it.
    pub fn erased_domain(&self, name: &str) -> FactResult<Arc<dyn ErasedDomain>> {
        match self.input(name)? {
            Artifact::Domain(domain) => {
                if !domain.is_frozen() {
                    trace!(domain = name, reader = self.descriptor.name(), "Freezing domain on first read");
                    domain.freeze();
                }
                Ok(Arc::clone(domain))
            }
            Artifact::Relation(_) => Err(FactError::type_mismatch(name, "domain")),
        }
    }

    /// Consumed domain of facts `F`
    pub fn domain<F: Fact>(&self, handle: &DomainHandle<F>) -> FactResult<Arc<Domain<F>>> {
        downcast_domain(self.erased_domain(handle.name())?)
    }

    /// Consumed relation
    pub fn relation(&self, handle: &RelationHandle) -> FactResult<Arc<Relation>> {
        self.relation_by_name(handle.name())
    }

    pub fn relation_by_name(&self, name: &str) -> FactResult<Arc<Relation>> {
        self.input(name)?.clone().into_relation()
    }

    /// One of the descriptor's own produced domains
    pub fn output_domain<F: Fact>(&self, handle: &DomainHandle<F>) -> FactResult<Arc<Domain<F>>> {
        let domain = self.outputs.domain(handle.name()).ok_or_else(|| self.not_produced(handle.name()))?;
        downcast_domain(Arc::clone(domain))
    }

    /// One of the descriptor's own produced relations
    pub fn output_relation(&mut self, handle: &RelationHandle) -> FactResult<&mut Relation> {
        let name = handle.name();
        if !self.outputs.relations.contains_key(name) {
            return Err(self.not_produced(name));
        }
        self.outputs.relations.get_mut(name).ok_or_else(|| FactError::type_mismatch(name, "relation"))
    }

    pub(crate) fn take_relation(&mut self, name: &str) -> FactResult<Relation> {
        match self.outputs.relations.remove(name) {
            Some(relation) => Ok(relation),
            None => Err(self.not_produced(name)),
        }
    }

    pub(crate) fn restore_relation(&mut self, relation: Relation) {
        self.outputs.insert_relation(relation);
    }

    /// Outputs in the order the descriptor declares them
    pub(crate) fn into_outputs(mut self) -> Vec<Artifact> {
        let mut artifacts = Vec::with_capacity(self.descriptor.produces().len());
        for target in self.descriptor.produces() {
            let artifact = match target.kind() {
                TargetKind::Domain { .. } => self.outputs.domains.remove(target.name()).map(Artifact::Domain),
                TargetKind::Relation { .. } => self.outputs.relations.remove(target.name()).map(|relation| Artifact::Relation(Arc::new(relation))),
            };
            artifacts.extend(artifact);
        }
        artifacts
    }

    fn violation(&self, name: &str, violation: AccessViolation) -> FactError {
        FactError::UndeclaredDependency {
            descriptor: self.descriptor.name().to_string(),
            target: name.to_string(),
            violation,
        }
    }

    fn not_produced(&self, name: &str) -> FactError {
        FactError::UnknownTarget {
            name: name.to_string(),
            requested_by: Some(self.descriptor.name().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature;

    fn types() -> Arc<dyn ErasedDomain> {
        let domain = Domain::new("T");
        domain.extend(["A", "B"].map(String::from)).unwrap();
        Arc::new(domain)
    }

    #[test]
    fn test_reads_are_checked_against_consumes() {
        let descriptor = AnalysisDescriptor::builder("reader").consumes("T").consumes("M").build().unwrap();
        let config = EngineConfig::default();
        let inputs = HashMap::from([("T".to_string(), Artifact::Domain(types()))]);
        let ctx = FillContext::new(&descriptor, &config, inputs, Outputs::default());

        let handle = DomainHandle::<String>::new("T");
        let domain = ctx.domain(&handle).unwrap();
        assert_eq!(domain.size(), 2);
        assert!(domain.is_frozen());

        match ctx.input("M") {
            Err(FactError::UndeclaredDependency { violation, .. }) => assert_eq!(violation, AccessViolation::NotDone),
            other => panic!("expected UndeclaredDependency, got {other:?}"),
        }
        match ctx.input("H") {
            Err(FactError::UndeclaredDependency { violation, .. }) => assert_eq!(violation, AccessViolation::Undeclared),
            other => panic!("expected UndeclaredDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_outputs_keep_declared_order() {
        let descriptor = AnalysisDescriptor::builder("writer")
            .produces_relation("excludeType", Signature::unary("T"))
            .produces_domain::<String>("U")
            .consumes("T")
            .build()
            .unwrap();
        let config = EngineConfig::default();
        let types = types();
        let mut outputs = Outputs::default();
        outputs.insert_domain(Arc::new(Domain::<String>::new("U")));
        outputs.insert_relation(Relation::new("excludeType", Signature::unary("T"), vec![Arc::clone(&types)]).unwrap());

        let mut ctx = FillContext::new(&descriptor, &config, HashMap::new(), outputs);
        ctx.output_relation(&RelationHandle::new("excludeType")).unwrap().add_unary(1).unwrap();
        assert!(matches!(ctx.output_relation(&RelationHandle::new("other")), Err(FactError::UnknownTarget { .. })));

        let names: Vec<String> = ctx.into_outputs().iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["excludeType", "U"]);
    }
}
