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

//! The `T` domain: names of the types in the analyzed program

use anyhow::Context;
use factdb_core::{DomainHandle, FactResult, Registry};
use std::fmt;
use tracing::debug;

/// Name of the type domain
pub const DOM_T: &str = "T";

/// Fully qualified type name, e.g. `java.lang.String`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Supplies the program's types, in discovery order.
///
/// Implemented by whatever front end walks the program; the engine only needs
/// the names.
pub trait TypeSource: Send + Sync + 'static {
    fn types(&self) -> anyhow::Result<Vec<TypeName>>;
}

/// Fixed list of types
#[derive(Debug, Clone, Default)]
pub struct StaticTypes {
    types: Vec<TypeName>,
}

impl StaticTypes {
    pub fn new<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl TypeSource for StaticTypes {
    fn types(&self) -> anyhow::Result<Vec<TypeName>> {
        Ok(self.types.clone())
    }
}

/// Register the producer of `T`, filled from `source`
pub fn register_type_domain<S: TypeSource>(registry: &mut Registry, source: S) -> FactResult<DomainHandle<TypeName>> {
    registry.register_domain::<TypeName, _, _, &str>(DOM_T, [], move |_, domain| {
        let types = source.types().context("failed to enumerate program types")?;
        domain.extend(types)?;
        debug!(domain = DOM_T, size = domain.size(), "Populated type domain");
        Ok(())
    })
}
