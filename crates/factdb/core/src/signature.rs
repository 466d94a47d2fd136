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

//! Relation signatures
//!
//! A signature string looks like `T1:T1` or `M0,T0:M0xT0`. The part before the
//! colon lists one domain instance per tuple column: a domain name followed by
//! an optional instance number. The part after the colon is the variable order
//! and is carried verbatim.

use crate::error::{FactError, FactResult};
use std::fmt;
use std::str::FromStr;

/// One column of a relation signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    domain: String,
    instance: u32,
}

impl Column {
    pub fn new(domain: impl Into<String>, instance: u32) -> Self {
        Self {
            domain: domain.into(),
            instance,
        }
    }

    /// Name of the domain the column ranges over
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }

    fn parse(token: &str, signature: &str) -> FactResult<Self> {
        let invalid = |reason: String| FactError::InvalidSignature {
            signature: signature.to_string(),
            reason,
        };

        let digits_at = token.find(|c: char| c.is_ascii_digit()).unwrap_or(token.len());
        let (domain, instance) = token.split_at(digits_at);
        if domain.is_empty() {
            return Err(invalid(format!("column '{token}' has no domain name")));
        }
        if !domain.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid(format!("column '{token}' has an invalid domain name")));
        }
        let instance = if instance.is_empty() {
            0
        } else {
            instance.parse().map_err(|_| invalid(format!("column '{token}' has an invalid instance number")))?
        };
        Ok(Self::new(domain, instance))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.domain, self.instance)
    }
}

/// Ordered list of columns plus the variable order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    columns: Vec<Column>,
    order: String,
}

impl Signature {
    /// Build a signature from columns, deriving the default variable order
    pub fn new(columns: Vec<Column>) -> Self {
        let order = columns.iter().map(Column::to_string).collect::<Vec<_>>().join("x");
        Self { columns, order }
    }

    /// Single-column signature over instance 1 of `domain`, as used by filter relations
    pub fn unary(domain: &str) -> Self {
        Self::new(vec![Column::new(domain, 1)])
    }

    pub fn parse(signature: &str) -> FactResult<Self> {
        let invalid = |reason: &str| FactError::InvalidSignature {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        let (columns, order) = match signature.split_once(':') {
            Some((columns, order)) => (columns, Some(order.trim())),
            None => (signature, None),
        };

        let columns = columns
            .split(',')
            .map(str::trim)
            .map(|token| {
                if token.is_empty() {
                    Err(invalid("empty column"))
                } else {
                    Column::parse(token, signature)
                }
            })
            .collect::<FactResult<Vec<_>>>()?;

        match order {
            Some("") => Err(invalid("empty variable order")),
            Some(order) => Ok(Self {
                columns,
                order: order.to_string(),
            }),
            None => Ok(Self::new(columns)),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Variable order string
    pub fn order(&self) -> &str {
        &self.order
    }

    /// Distinct domain names in column order
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            if !domains.contains(&column.domain()) {
                domains.push(column.domain());
            }
        }
        domains
    }
}

impl FromStr for Signature {
    type Err = FactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.columns.iter().map(Column::to_string).collect::<Vec<_>>().join(",");
        write!(f, "{}:{}", columns, self.order)
    }
}
