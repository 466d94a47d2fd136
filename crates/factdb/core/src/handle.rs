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

//! Typed handles to registered domains and relations

use crate::domain::Fact;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Handle to a domain whose facts have type `F`.
///
/// Handles are minted by the [`Registry`](crate::registry::Registry), which has
/// already checked that the named domain stores `F`.
pub struct DomainHandle<F: Fact> {
    name: Arc<str>,
    _fact: PhantomData<fn() -> F>,
}

impl<F: Fact> DomainHandle<F> {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            _fact: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<F: Fact> Clone for DomainHandle<F> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            _fact: PhantomData,
        }
    }
}

impl<F: Fact> fmt::Debug for DomainHandle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainHandle<{}>({})", std::any::type_name::<F>(), self.name)
    }
}

impl<F: Fact> PartialEq for DomainHandle<F> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<F: Fact> Eq for DomainHandle<F> {}

/// Handle to a registered relation
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RelationHandle {
    name: Arc<str>,
}

impl RelationHandle {
    pub(crate) fn new(name: &str) -> Self {
        Self { name: Arc::from(name) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for RelationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationHandle({})", self.name)
    }
}
