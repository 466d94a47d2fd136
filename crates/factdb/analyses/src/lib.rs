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

//! Analyses built on the factdb engine
//!
//! The type domain `T` and the `excludeType` relation consumed by the
//! data-race analysis.

pub mod exclude_type;
pub mod types;

pub use exclude_type::{DEFAULT_NAMESPACE, ExcludeTypeFilter, ExcludeTypeSettings, REL_EXCLUDE_TYPE, register_exclude_type};
pub use types::{DOM_T, StaticTypes, TypeName, TypeSource, register_type_domain};

use factdb_core::{DomainHandle, FactResult, Registry, RelationHandle};

/// Handles to everything [`register_all`] registered
#[derive(Debug, Clone)]
pub struct Analyses {
    pub types: DomainHandle<TypeName>,
    pub exclude_type: RelationHandle,
}

/// Register the type domain and `excludeType`
pub fn register_all<S: TypeSource>(registry: &mut Registry, source: S, settings: ExcludeTypeSettings) -> FactResult<Analyses> {
    let types = register_type_domain(registry, source)?;
    let exclude_type = register_exclude_type(registry, settings)?;
    Ok(Analyses { types, exclude_type })
}
