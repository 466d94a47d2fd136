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

//! Analysis descriptors
//!
//! A descriptor is the declarative metadata of one analysis unit: what it
//! produces, what it consumes, and the logic that fills its outputs. Nothing
//! runs until the scheduler executes it.

use crate::context::FillContext;
use crate::domain::{ErasedDomain, Fact, make_domain};
use crate::error::{FactError, FactResult};
use crate::signature::Signature;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Population logic of a descriptor
pub type FillFn = Arc<dyn Fn(&mut FillContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Kind of artifact a descriptor produces
#[derive(Clone)]
pub enum TargetKind {
    Domain {
        fact_type: TypeId,
        fact_type_name: &'static str,
        make: fn(&str) -> Arc<dyn ErasedDomain>,
    },
    Relation {
        signature: Signature,
    },
}

impl fmt::Debug for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Domain { fact_type_name, .. } => write!(f, "Domain<{fact_type_name}>"),
            TargetKind::Relation { signature } => write!(f, "Relation({signature})"),
        }
    }
}

/// A named artifact produced by a descriptor
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    kind: TargetKind,
}

impl Target {
    pub fn domain<F: Fact>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Domain {
                fact_type: TypeId::of::<F>(),
                fact_type_name: std::any::type_name::<F>(),
                make: make_domain::<F>,
            },
        }
    }

    pub fn relation(name: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Relation { signature },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    pub fn is_domain(&self) -> bool {
        matches!(self.kind, TargetKind::Domain { .. })
    }

    /// Whether this target is a domain storing `F`
    pub fn is_domain_of<F: Fact>(&self) -> bool {
        matches!(self.kind, TargetKind::Domain { fact_type, .. } if fact_type == TypeId::of::<F>())
    }

    pub fn signature(&self) -> Option<&Signature> {
        match &self.kind {
            TargetKind::Relation { signature } => Some(signature),
            TargetKind::Domain { .. } => None,
        }
    }
}

/// Metadata and population logic of one analysis unit
pub struct AnalysisDescriptor {
    name: String,
    produces: Vec<Target>,
    consumes: Vec<String>,
    fill: FillFn,
}

impl AnalysisDescriptor {
    pub fn builder(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn produces(&self) -> &[Target] {
        &self.produces
    }

    /// Consumed names, including the domains of produced relation signatures
    pub fn consumes(&self) -> &[String] {
        &self.consumes
    }

    /// Names of all produced artifacts
    pub fn outputs(&self) -> impl Iterator<Item = &str> + '_ {
        self.produces.iter().map(Target::name)
    }

    pub fn produces_name(&self, name: &str) -> bool {
        self.outputs().any(|output| output == name)
    }

    pub fn consumes_name(&self, name: &str) -> bool {
        self.consumes.iter().any(|input| input == name)
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.produces.iter().find(|target| target.name == name)
    }

    pub(crate) fn run(&self, ctx: &mut FillContext<'_>) -> anyhow::Result<()> {
        (self.fill)(ctx)
    }
}

impl fmt::Debug for AnalysisDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisDescriptor")
            .field("name", &self.name)
            .field("produces", &self.produces)
            .field("consumes", &self.consumes)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AnalysisDescriptor`]
pub struct DescriptorBuilder {
    name: String,
    produces: Vec<Target>,
    consumes: Vec<String>,
    fill: Option<FillFn>,
}

impl DescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            produces: Vec::new(),
            consumes: Vec::new(),
            fill: None,
        }
    }

    /// Declare a produced domain of facts `F`
    pub fn produces_domain<F: Fact>(mut self, name: impl Into<String>) -> Self {
        self.produces.push(Target::domain::<F>(name));
        self
    }

    /// Declare a produced relation
    pub fn produces_relation(mut self, name: impl Into<String>, signature: Signature) -> Self {
        self.produces.push(Target::relation(name, signature));
        self
    }

    pub fn produces(mut self, target: Target) -> Self {
        self.produces.push(target);
        self
    }

    /// Declare a consumed domain or relation
    pub fn consumes(mut self, name: impl Into<String>) -> Self {
        self.consumes.push(name.into());
        self
    }

    pub fn consumes_all<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.consumes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the population logic. Without one the descriptor publishes empty outputs.
    pub fn fill<Fill>(mut self, fill: Fill) -> Self
    where
        Fill: Fn(&mut FillContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let fill: FillFn = Arc::new(fill);
        self.fill = Some(fill);
        self
    }

    pub fn build(self) -> FactResult<AnalysisDescriptor> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.produces.len());
        for target in &self.produces {
            if seen.contains(&target.name()) {
                return Err(FactError::DuplicateName {
                    name: target.name().to_string(),
                    existing: self.name.clone(),
                });
            }
            seen.push(target.name());
        }

        // Explicit consumes are kept as declared, own outputs included; a
        // self-consume surfaces as a cycle in the resolver
        let mut consumes: Vec<String> = Vec::with_capacity(self.consumes.len());
        for name in &self.consumes {
            if !consumes.contains(name) {
                consumes.push(name.clone());
            }
        }

        // Signature domains are read before the fill step runs, unless produced here
        let implicit = self
            .produces
            .iter()
            .filter_map(Target::signature)
            .flat_map(|signature| signature.domains().into_iter().map(str::to_string).collect::<Vec<_>>());
        for name in implicit {
            if !consumes.contains(&name) && !seen.contains(&name.as_str()) {
                consumes.push(name);
            }
        }

        let fill: FillFn = match self.fill {
            Some(fill) => fill,
            None => Arc::new(fill_nothing),
        };
        Ok(AnalysisDescriptor {
            name: self.name,
            produces: self.produces,
            consumes,
            fill,
        })
    }
}

fn fill_nothing(_: &mut FillContext<'_>) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_domains_become_consumes() {
        let desc = AnalysisDescriptor::builder("excludeType")
            .produces_relation("excludeType", Signature::unary("T"))
            .build()
            .unwrap();
        assert_eq!(desc.consumes(), &["T".to_string()]);
        assert!(desc.produces_name("excludeType"));
    }

    #[test]
    fn test_consumes_are_deduplicated_in_order() {
        let desc = AnalysisDescriptor::builder("MT")
            .consumes("M")
            .consumes("cha")
            .consumes("M")
            .produces_relation("MT", Signature::parse("M0,T0:M0_T0").unwrap())
            .build()
            .unwrap();
        assert_eq!(desc.consumes(), &["M".to_string(), "cha".to_string(), "T".to_string()]);
    }

    #[test]
    fn test_own_domain_is_not_consumed() {
        let desc = AnalysisDescriptor::builder("hierarchy")
            .produces_domain::<String>("T")
            .produces_relation("sub", Signature::parse("T0,T1:T0xT1").unwrap())
            .build()
            .unwrap();
        assert!(desc.consumes().is_empty());
        assert!(desc.target("T").unwrap().is_domain_of::<String>());
        assert!(!desc.target("T").unwrap().is_domain_of::<u32>());
    }

    #[test]
    fn test_explicit_self_consume_is_kept() {
        let desc = AnalysisDescriptor::builder("A").produces_domain::<String>("A").consumes("A").build().unwrap();
        assert_eq!(desc.consumes(), &["A".to_string()]);
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let result = AnalysisDescriptor::builder("twice")
            .produces_domain::<String>("T")
            .produces_domain::<String>("T")
            .build();
        assert!(matches!(result, Err(FactError::DuplicateName { .. })));
    }
}
