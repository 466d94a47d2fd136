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

//! Error types for the fact engine

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the engine
pub type FactResult<T> = Result<T, FactError>;

/// Why a fill step was refused access to an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessViolation {
    /// The artifact is not listed in the descriptor's consumes set
    Undeclared,
    /// The artifact is declared but had not been materialized when the fill step started
    NotDone,
}

impl fmt::Display for AccessViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessViolation::Undeclared => write!(f, "not declared as consumed"),
            AccessViolation::NotDone => write!(f, "not yet materialized"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FactError {
    #[error("Index {index} out of range for domain {domain} (size {size})")]
    OutOfRange { domain: String, index: usize, size: usize },

    #[error("Tuple of arity {actual} does not match signature of relation {relation} (arity {expected})")]
    SignatureMismatch { relation: String, expected: usize, actual: usize },

    #[error("Column {column} of tuple in relation {relation} holds {value}, but domain {domain} has size {size}")]
    IndexOutOfBounds {
        relation: String,
        column: usize,
        domain: String,
        value: usize,
        size: usize,
    },

    #[error("Invalid signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("Name {name} is already registered by analysis {existing}")]
    DuplicateName { name: String, existing: String },

    #[error("Unknown target {name}{}", .requested_by.as_ref().map(|d| format!(" (consumed by {d})")).unwrap_or_default())]
    UnknownTarget { name: String, requested_by: Option<String> },

    #[error("Cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Analysis {descriptor} read {target}, which is {violation}")]
    UndeclaredDependency { descriptor: String, target: String, violation: AccessViolation },

    #[error("{name} is not a {expected}")]
    TypeMismatch { name: String, expected: String },

    #[error("Domain {domain} is frozen; cannot intern {fact}")]
    DomainFrozen { domain: String, fact: String },

    #[error("Analysis {descriptor} failed: {source}")]
    ExecutionFailure {
        descriptor: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Target {target} failed earlier in this run")]
    PreviouslyFailed { target: String },

    #[error("Run cancelled before analysis {descriptor}{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Cancelled { descriptor: String, reason: Option<String> },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FactError {
    /// Whether the error comes from the engine's structural checks rather than from analysis logic
    pub fn is_structural(&self) -> bool {
        !matches!(self, FactError::ExecutionFailure { .. } | FactError::Cancelled { .. } | FactError::Config(_))
    }

    pub(crate) fn type_mismatch(name: &str, expected: impl Into<String>) -> Self {
        FactError::TypeMismatch {
            name: name.to_string(),
            expected: expected.into(),
        }
    }
}
