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

//! Indexed fact domains
//!
//! A domain assigns every distinct fact a stable index on first insertion.
//! Indices are contiguous from zero and never change. Domains only grow, and
//! they stop growing once a consumer has started reading them.

use crate::error::{FactError, FactResult};
use indexmap::IndexSet;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Values that can be stored in a domain
pub trait Fact: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {}

impl<T> Fact for T where T: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {}

/// Domain of facts of type `F`
#[derive(Debug)]
pub struct Domain<F: Fact> {
    name: String,
    elements: RwLock<IndexSet<F>>,
    frozen: AtomicBool,
}

impl<F: Fact> Domain<F> {
    /// Create an empty domain
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: RwLock::new(IndexSet::new()),
            frozen: AtomicBool::new(false),
        }
    }

    /// Domain name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the index of `fact`, appending it if it has not been seen before.
    ///
    /// Fails with [`FactError::DomainFrozen`] when the fact is new and a consumer
    /// has already started reading the domain.
    pub fn intern(&self, fact: F) -> FactResult<usize> {
        if let Some(index) = self.elements.read().get_index_of(&fact) {
            return Ok(index);
        }

        let mut elements = self.elements.write();
        // Another writer may have appended it between the two locks
        if let Some(index) = elements.get_index_of(&fact) {
            return Ok(index);
        }
        if self.is_frozen() {
            return Err(FactError::DomainFrozen {
                domain: self.name.clone(),
                fact: fact.to_string(),
            });
        }
        let (index, _) = elements.insert_full(fact);
        Ok(index)
    }

    /// Intern every fact of an iterator, returning their indices
    pub fn extend<I>(&self, facts: I) -> FactResult<Vec<usize>>
    where
        I: IntoIterator<Item = F>,
    {
        facts.into_iter().map(|fact| self.intern(fact)).collect()
    }

    /// Fact stored at `index`
    pub fn get(&self, index: usize) -> FactResult<F> {
        let elements = self.elements.read();
        elements.get_index(index).cloned().ok_or_else(|| FactError::OutOfRange {
            domain: self.name.clone(),
            index,
            size: elements.len(),
        })
    }

    /// Index of `fact`, if present
    pub fn index_of(&self, fact: &F) -> Option<usize> {
        self.elements.read().get_index_of(fact)
    }

    pub fn contains(&self, fact: &F) -> bool {
        self.index_of(fact).is_some()
    }

    /// Number of facts
    pub fn size(&self) -> usize {
        self.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of all facts in index order
    pub fn to_vec(&self) -> Vec<F> {
        self.elements.read().iter().cloned().collect()
    }

    /// `(index, fact)` pairs over a snapshot taken now; later interns are not seen
    pub fn iter(&self) -> impl Iterator<Item = (usize, F)> + use<F> {
        self.to_vec().into_iter().enumerate()
    }

    /// Stop accepting new facts
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

/// Type-erased view of a domain.
///
/// Relations and name-keyed lookups only need sizes and display names, so they
/// work through this trait without knowing the fact type.
pub trait ErasedDomain: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn size(&self) -> usize;

    /// Display string of the fact at `index`
    fn label(&self, index: usize) -> FactResult<String>;

    /// Map from each fact's display string to its index.
    ///
    /// When two facts share a display string the later index wins.
    fn name_index(&self) -> HashMap<String, usize>;

    fn freeze(&self);

    fn is_frozen(&self) -> bool;

    /// Rust type name of the stored facts, for diagnostics
    fn fact_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<F: Fact> ErasedDomain for Domain<F> {
    fn name(&self) -> &str {
        Domain::name(self)
    }

    fn size(&self) -> usize {
        Domain::size(self)
    }

    fn label(&self, index: usize) -> FactResult<String> {
        self.get(index).map(|fact| fact.to_string())
    }

    fn name_index(&self) -> HashMap<String, usize> {
        let elements = self.elements.read();
        let mut index = HashMap::with_capacity(elements.len());
        for (i, fact) in elements.iter().enumerate() {
            index.insert(fact.to_string(), i);
        }
        index
    }

    fn freeze(&self) {
        Domain::freeze(self)
    }

    fn is_frozen(&self) -> bool {
        Domain::is_frozen(self)
    }

    fn fact_type(&self) -> &'static str {
        std::any::type_name::<F>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Recover the typed domain behind an erased one
pub fn downcast_domain<F: Fact>(domain: Arc<dyn ErasedDomain>) -> FactResult<Arc<Domain<F>>> {
    let name = domain.name().to_string();
    domain
        .into_any()
        .downcast::<Domain<F>>()
        .map_err(|_| FactError::type_mismatch(&name, format!("domain of {}", std::any::type_name::<F>())))
}

/// Constructor stored in descriptors so the scheduler can create typed domains
pub(crate) fn make_domain<F: Fact>(name: &str) -> Arc<dyn ErasedDomain> {
    Arc::new(Domain::<F>::new(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> Domain<String> {
        let domain = Domain::new("T");
        domain
            .extend(["java.lang.String", "java.util.List", "Foo"].map(String::from))
            .unwrap();
        domain
    }

    #[test]
    fn test_intern_assigns_contiguous_indices() {
        let domain = types();
        assert_eq!(domain.size(), 3);
        assert_eq!(domain.index_of(&"java.lang.String".to_string()), Some(0));
        assert_eq!(domain.index_of(&"Foo".to_string()), Some(2));
    }

    #[test]
    fn test_intern_is_idempotent() {
        let domain = types();
        assert_eq!(domain.intern("java.util.List".to_string()).unwrap(), 1);
        assert_eq!(domain.size(), 3);
    }

    #[test]
    fn test_iter_is_a_snapshot() {
        let domain = types();
        let snapshot = domain.iter();
        domain.intern("Bar".to_string()).unwrap();
        let seen: Vec<(usize, String)> = snapshot.collect();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], (2, "Foo".to_string()));
    }

    #[test]
    fn test_get_out_of_range() {
        let domain = types();
        assert_eq!(domain.get(1).unwrap(), "java.util.List");
        match domain.get(3) {
            Err(FactError::OutOfRange { domain, index, size }) => {
                assert_eq!(domain, "T");
                assert_eq!(index, 3);
                assert_eq!(size, 3);
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_frozen_domain_rejects_new_facts_only() {
        let domain = types();
        domain.freeze();
        assert_eq!(domain.intern("Foo".to_string()).unwrap(), 2);
        assert!(matches!(domain.intern("Bar".to_string()), Err(FactError::DomainFrozen { .. })));
        assert_eq!(domain.size(), 3);
    }

    #[test]
    fn test_name_index_last_duplicate_wins() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct Tagged(&'static str, u8);
        impl fmt::Display for Tagged {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        let domain = Domain::new("H");
        domain.extend([Tagged("a", 0), Tagged("a", 1), Tagged("b", 0)]).unwrap();
        let index = ErasedDomain::name_index(&domain);
        assert_eq!(index["a"], 1);
        assert_eq!(index["b"], 2);
    }

    #[test]
    fn test_downcast_checks_fact_type() {
        let erased: Arc<dyn ErasedDomain> = Arc::new(types());
        assert!(downcast_domain::<String>(erased.clone()).is_ok());
        assert!(matches!(downcast_domain::<u32>(erased), Err(FactError::TypeMismatch { .. })));
    }
}
