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

//! Relations over domain indices

use crate::domain::ErasedDomain;
use crate::error::{FactError, FactResult};
use crate::signature::Signature;
use indexmap::IndexSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Tuple of domain indices, one per signature column
pub type Tuple = Box<[usize]>;

/// Outcome of loading a name filter into a relation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    /// Tokens that matched a fact, with the index that was added
    pub matched: Vec<(String, usize)>,
    /// Tokens with no matching fact; these were skipped
    pub unmatched: Vec<String>,
}

/// Set of tuples over the domains named by a signature.
///
/// Tuples keep insertion order for iteration, but equality and membership are
/// set semantics.
pub struct Relation {
    name: String,
    signature: Signature,
    domains: Vec<Arc<dyn ErasedDomain>>,
    tuples: IndexSet<Tuple>,
}

impl Relation {
    /// Create an empty relation.
    ///
    /// `domains` holds the domain for each signature column, in column order.
    pub fn new(name: impl Into<String>, signature: Signature, domains: Vec<Arc<dyn ErasedDomain>>) -> FactResult<Self> {
        let name = name.into();
        if domains.len() != signature.arity() {
            return Err(FactError::SignatureMismatch {
                relation: name,
                expected: signature.arity(),
                actual: domains.len(),
            });
        }
        for (column, domain) in signature.columns().iter().zip(&domains) {
            if column.domain() != domain.name() {
                return Err(FactError::type_mismatch(domain.name(), format!("domain {} for column {}", column.domain(), column)));
            }
        }
        Ok(Self {
            name,
            signature,
            domains,
            tuples: IndexSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn arity(&self) -> usize {
        self.signature.arity()
    }

    /// Domain backing column `column`
    pub fn domain(&self, column: usize) -> Option<&Arc<dyn ErasedDomain>> {
        self.domains.get(column)
    }

    /// Add a tuple, returning whether it was new.
    ///
    /// Every component must be smaller than the current size of its column's domain.
    pub fn add(&mut self, tuple: &[usize]) -> FactResult<bool> {
        self.check(tuple)?;
        if self.tuples.contains(tuple) {
            return Ok(false);
        }
        Ok(self.tuples.insert(Tuple::from(tuple)))
    }

    /// Add a single-column tuple
    pub fn add_unary(&mut self, index: usize) -> FactResult<bool> {
        self.add(&[index])
    }

    /// Add every tuple of an iterator, stopping at the first invalid one
    pub fn extend<'t, I>(&mut self, tuples: I) -> FactResult<usize>
    where
        I: IntoIterator<Item = &'t [usize]>,
    {
        let mut added = 0;
        for tuple in tuples {
            if self.add(tuple)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn contains(&self, tuple: &[usize]) -> bool {
        self.tuples.contains(tuple)
    }

    pub fn contains_unary(&self, index: usize) -> bool {
        self.contains(&[index])
    }

    /// Tuples in insertion order.
    ///
    /// Consumers should rely on membership only, never on the order.
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.tuples.iter().map(|tuple| &tuple[..])
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Distinct values of one column, in first-seen order
    pub fn project(&self, column: usize) -> FactResult<Vec<usize>> {
        if column >= self.arity() {
            return Err(FactError::SignatureMismatch {
                relation: self.name.clone(),
                expected: self.arity(),
                actual: column + 1,
            });
        }
        let values: IndexSet<usize> = self.tuples.iter().map(|tuple| tuple[column]).collect();
        Ok(values.into_iter().collect())
    }

    /// Display strings of the facts a tuple refers to
    pub fn labels(&self, tuple: &[usize]) -> FactResult<Vec<String>> {
        self.check(tuple)?;
        tuple.iter().zip(&self.domains).map(|(&index, domain)| domain.label(index)).collect()
    }

    /// Populate a single-column relation from a delimited list of fact names.
    ///
    /// Each token is trimmed and looked up by display string in the column's
    /// domain. Matches are added as singleton tuples. Tokens that match nothing
    /// are skipped without error, so an empty or fully unmatched list leaves the
    /// relation empty. Empty tokens are dropped before lookup, so a fact whose
    /// display string is empty can never be selected.
    pub fn load_name_filter(&mut self, list: &str, delimiter: char) -> FactResult<FilterReport> {
        if self.arity() != 1 {
            return Err(FactError::SignatureMismatch {
                relation: self.name.clone(),
                expected: self.arity(),
                actual: 1,
            });
        }

        let mut report = FilterReport::default();
        if list.trim().is_empty() {
            return Ok(report);
        }

        let name_index = self.domains[0].name_index();
        for token in list.split(delimiter).map(str::trim).filter(|token| !token.is_empty()) {
            match name_index.get(token) {
                Some(&index) => {
                    self.add_unary(index)?;
                    report.matched.push((token.to_string(), index));
                }
                None => {
                    debug!(relation = %self.name, domain = %self.domains[0].name(), token, "Skipping unmatched filter entry");
                    report.unmatched.push(token.to_string());
                }
            }
        }
        Ok(report)
    }

    fn check(&self, tuple: &[usize]) -> FactResult<()> {
        if tuple.len() != self.arity() {
            return Err(FactError::SignatureMismatch {
                relation: self.name.clone(),
                expected: self.arity(),
                actual: tuple.len(),
            });
        }
        for (column, (&value, domain)) in tuple.iter().zip(&self.domains).enumerate() {
            let size = domain.size();
            if value >= size {
                return Err(FactError::IndexOutOfBounds {
                    relation: self.name.clone(),
                    column,
                    domain: domain.name().to_string(),
                    value,
                    size,
                });
            }
        }
        Ok(())
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.signature == other.signature && self.tuples == other.tuples
    }
}

impl Eq for Relation {}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .field("tuples", &self.tuples)
            .finish()
    }
}
