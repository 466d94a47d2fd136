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

//! The `excludeType` relation.
//!
//! Lists the types whose objects the data-race analysis should ignore. It is
//! filled from the comma-separated property `<namespace>.exclude.type`, where
//! each entry is matched against the display names of the `T` domain. Entries
//! that name no known type are skipped. Whether a consumer actually applies
//! the filter is a separate switch, `<namespace>.exclude.typeflag`, read by
//! [`ExcludeTypeFilter`].

use crate::types::DOM_T;
use factdb_core::{EngineConfig, FactResult, Registry, Relation, RelationHandle, Scheduler, Signature};
use std::sync::Arc;
use tracing::{debug, info};

pub const REL_EXCLUDE_TYPE: &str = "excludeType";

/// One column over `T`
pub const EXCLUDE_TYPE_SIGNATURE: &str = "T1:T1";

/// Property namespace used unless configured otherwise
pub const DEFAULT_NAMESPACE: &str = "chord.datarace";

pub const TYPE_LIST_DELIMITER: char = ',';

/// Where the exclusion properties live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeTypeSettings {
    namespace: String,
}

impl Default for ExcludeTypeSettings {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl ExcludeTypeSettings {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Property holding the type list
    pub fn type_list_key(&self) -> String {
        format!("{}.exclude.type", self.namespace)
    }

    /// Property switching the filter on for consumers
    pub fn flag_key(&self) -> String {
        format!("{}.exclude.typeflag", self.namespace)
    }

    /// Configured type list, empty when unset
    pub fn type_list<'c>(&self, config: &'c EngineConfig) -> &'c str {
        config.property_or(&self.type_list_key(), "")
    }

    pub fn enabled(&self, config: &EngineConfig) -> bool {
        config.flag(&self.flag_key())
    }
}

/// Register the producer of `excludeType`.
///
/// The relation is created and published even when the list is empty.
pub fn register_exclude_type(registry: &mut Registry, settings: ExcludeTypeSettings) -> FactResult<RelationHandle> {
    let signature = Signature::parse(EXCLUDE_TYPE_SIGNATURE)?;
    registry.register_relation(REL_EXCLUDE_TYPE, signature, [DOM_T], move |ctx, relation| {
        let list = settings.type_list(ctx.config());
        if list.is_empty() {
            debug!(key = %settings.type_list_key(), "No excluded types configured");
            return Ok(());
        }

        let report = relation.load_name_filter(list, TYPE_LIST_DELIMITER)?;
        if !report.unmatched.is_empty() {
            debug!(unmatched = ?report.unmatched, "Excluded type entries matched no known type");
        }
        info!(matched = report.matched.len(), unmatched = report.unmatched.len(), "Populated {}", REL_EXCLUDE_TYPE);
        Ok(())
    })
}

/// Gate used by the data-race consumer.
///
/// A type is excluded only when the flag is on and the type is in
/// `excludeType`. With the flag off the relation is never materialized.
#[derive(Debug, Clone)]
pub struct ExcludeTypeFilter {
    excluded: Option<Arc<Relation>>,
}

impl ExcludeTypeFilter {
    pub fn disabled() -> Self {
        Self { excluded: None }
    }

    pub fn enabled(excluded: Arc<Relation>) -> Self {
        Self { excluded: Some(excluded) }
    }

    /// Build the gate from the scheduler's configuration, materializing
    /// `excludeType` if the flag is on
    pub fn from_scheduler(scheduler: &Scheduler, handle: &RelationHandle, settings: &ExcludeTypeSettings) -> FactResult<Self> {
        if !settings.enabled(scheduler.config()) {
            debug!(key = %settings.flag_key(), "Type exclusion disabled");
            return Ok(Self::disabled());
        }
        Ok(Self::enabled(scheduler.relation(handle)?))
    }

    pub fn is_enabled(&self) -> bool {
        self.excluded.is_some()
    }

    /// Whether races on objects of the type at `type_index` are filtered out
    pub fn excludes(&self, type_index: usize) -> bool {
        self.excluded.as_ref().is_some_and(|relation| relation.contains_unary(type_index))
    }

    /// Indices of the excluded types; empty when disabled
    pub fn excluded_types(&self) -> Vec<usize> {
        match &self.excluded {
            Some(relation) => relation.iter().map(|tuple| tuple[0]).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_keys() {
        let settings = ExcludeTypeSettings::default();
        assert_eq!(settings.type_list_key(), "chord.datarace.exclude.type");
        assert_eq!(settings.flag_key(), "chord.datarace.exclude.typeflag");

        let custom = ExcludeTypeSettings::new("bingo");
        assert_eq!(custom.type_list_key(), "bingo.exclude.type");
    }

    #[test]
    fn test_settings_read_config() {
        let settings = ExcludeTypeSettings::default();
        let config = EngineConfig::new().with_property("chord.datarace.exclude.type", "Foo").with_property("chord.datarace.exclude.typeflag", "True");
        assert_eq!(settings.type_list(&config), "Foo");
        assert!(settings.enabled(&config));
        assert_eq!(settings.type_list(&EngineConfig::default()), "");
        assert!(!settings.enabled(&EngineConfig::default()));
    }

    #[test]
    fn test_disabled_filter_excludes_nothing() {
        let filter = ExcludeTypeFilter::disabled();
        assert!(!filter.is_enabled());
        assert!(!filter.excludes(0));
        assert!(filter.excluded_types().is_empty());
    }
}
