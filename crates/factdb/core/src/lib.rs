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

//! factdb core
//!
//! Relational fact engine for program analyses. Analyses register descriptors
//! declaring the domains and relations they produce and consume; the
//! scheduler materializes a requested target by running every producer it
//! depends on, each exactly once, dependencies first.

pub mod cancellation;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod domain;
pub mod error;
pub mod graph;
pub mod handle;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod relation;
pub mod resolver;
pub mod scheduler;
pub mod signature;
pub mod state;

// Re-export the types analyses work with
pub use cancellation::CancellationToken;
pub use config::{EngineConfig, ExecutionStrategy};
pub use context::FillContext;
pub use descriptor::{AnalysisDescriptor, DescriptorBuilder, Target, TargetKind};
pub use domain::{Domain, ErasedDomain, Fact};
pub use error::{AccessViolation, FactError, FactResult};
pub use handle::{DomainHandle, RelationHandle};
pub use registry::Registry;
pub use relation::{FilterReport, Relation};
pub use scheduler::Scheduler;
pub use signature::{Column, Signature};
pub use state::{Artifact, TargetStatus};
