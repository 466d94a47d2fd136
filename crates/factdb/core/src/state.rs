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

//! Per-run bookkeeping of target statuses and published artifacts

use crate::domain::{Domain, ErasedDomain, Fact, downcast_domain};
use crate::error::{FactError, FactResult};
use crate::relation::Relation;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of one named target within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
    Failed,
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            TargetStatus::NotStarted => "not started",
            TargetStatus::InProgress => "in progress",
            TargetStatus::Done => "done",
            TargetStatus::Failed => "failed",
        };
        f.write_str(status)
    }
}

/// A published domain or relation
#[derive(Debug, Clone)]
pub enum Artifact {
    Domain(Arc<dyn ErasedDomain>),
    Relation(Arc<Relation>),
}

impl Artifact {
    pub fn name(&self) -> &str {
        match self {
            Artifact::Domain(domain) => domain.name(),
            Artifact::Relation(relation) => relation.name(),
        }
    }

    /// Number of facts or tuples
    pub fn len(&self) -> usize {
        match self {
            Artifact::Domain(domain) => domain.size(),
            Artifact::Relation(relation) => relation.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_domain(&self) -> Option<&Arc<dyn ErasedDomain>> {
        match self {
            Artifact::Domain(domain) => Some(domain),
            Artifact::Relation(_) => None,
        }
    }

    pub fn as_relation(&self) -> Option<&Arc<Relation>> {
        match self {
            Artifact::Relation(relation) => Some(relation),
            Artifact::Domain(_) => None,
        }
    }

    pub fn into_domain<F: Fact>(self) -> FactResult<Arc<Domain<F>>> {
        match self {
            Artifact::Domain(domain) => downcast_domain(domain),
            Artifact::Relation(relation) => Err(FactError::type_mismatch(relation.name(), "domain")),
        }
    }

    pub fn into_relation(self) -> FactResult<Arc<Relation>> {
        match self {
            Artifact::Relation(relation) => Ok(relation),
            Artifact::Domain(domain) => Err(FactError::type_mismatch(domain.name(), "relation")),
        }
    }
}

/// Statuses and artifacts of the current run.
///
/// Owned by the scheduler behind a lock; nothing else writes it.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    statuses: HashMap<String, TargetStatus>,
    artifacts: HashMap<String, Artifact>,
}

impl RunState {
    pub fn status(&self, name: &str) -> TargetStatus {
        self.statuses.get(name).copied().unwrap_or_default()
    }

    pub fn is_done(&self, name: &str) -> bool {
        self.status(name) == TargetStatus::Done
    }

    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.get(name)
    }

    /// Done artifacts among `names`; anything else is left out
    pub fn snapshot<'n, I>(&self, names: I) -> HashMap<String, Artifact>
    where
        I: IntoIterator<Item = &'n String>,
    {
        names
            .into_iter()
            .filter(|name| self.is_done(name))
            .filter_map(|name| self.artifacts.get(name.as_str()).map(|artifact| (name.clone(), artifact.clone())))
            .collect()
    }

    pub fn mark_in_progress(&mut self, names: &[String]) {
        for name in names {
            self.statuses.insert(name.clone(), TargetStatus::InProgress);
        }
    }

    /// Publish a descriptor's outputs and mark them done together
    pub fn publish(&mut self, artifacts: Vec<Artifact>) {
        for artifact in artifacts {
            let name = artifact.name().to_string();
            self.statuses.insert(name.clone(), TargetStatus::Done);
            self.artifacts.insert(name, artifact);
        }
    }

    pub fn fail(&mut self, names: &[String]) {
        for name in names {
            self.artifacts.remove(name);
            self.statuses.insert(name.clone(), TargetStatus::Failed);
        }
    }

    /// Return targets to `NotStarted`
    pub fn forget(&mut self, names: &[String]) {
        for name in names {
            self.artifacts.remove(name);
            self.statuses.remove(name);
        }
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
        self.artifacts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_artifact(name: &str) -> Artifact {
        Artifact::Domain(Arc::new(Domain::<String>::new(name)))
    }

    #[test]
    fn test_unknown_names_are_not_started() {
        let state = RunState::default();
        assert_eq!(state.status("T"), TargetStatus::NotStarted);
        assert!(state.artifact("T").is_none());
    }

    #[test]
    fn test_publish_then_fail_then_forget() {
        let mut state = RunState::default();
        let names = vec!["T".to_string()];
        state.mark_in_progress(&names);
        assert_eq!(state.status("T"), TargetStatus::InProgress);

        state.publish(vec![domain_artifact("T")]);
        assert!(state.is_done("T"));
        assert_eq!(state.snapshot(&names).len(), 1);

        state.fail(&names);
        assert_eq!(state.status("T"), TargetStatus::Failed);
        assert!(state.snapshot(&names).is_empty());

        state.forget(&names);
        assert_eq!(state.status("T"), TargetStatus::NotStarted);
    }

    #[test]
    fn test_artifact_kind_checks() {
        let artifact = domain_artifact("T");
        assert!(artifact.as_relation().is_none());
        assert!(matches!(artifact.clone().into_relation(), Err(FactError::TypeMismatch { .. })));
        assert!(artifact.into_domain::<String>().is_ok());
    }
}
