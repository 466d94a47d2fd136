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

//! Tracing subscriber setup

use tracing::Level;

/// Maximum level for a verbosity count
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install a global `fmt` subscriber.
///
/// Returns false when a subscriber was already installed, which is expected
/// when several engines or tests share one process.
pub fn setup_logging(verbosity: u8) -> bool {
    tracing_subscriber::fmt().with_max_level(level_for(verbosity)).with_target(false).try_init().is_ok()
}
