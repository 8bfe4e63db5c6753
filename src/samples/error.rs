// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::time::Duration;

/// Why a single asset failed to load.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to fetch {locator}: {source}")]
    Fetch {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {locator}: {reason}")]
    Decode { locator: String, reason: String },

    #[error("timed out loading {locator} after {after:?}")]
    Timeout { locator: String, after: Duration },

    #[error("load task for {locator} failed: {reason}")]
    Task { locator: String, reason: String },
}

impl AssetError {
    pub(crate) fn decode(locator: &str, reason: impl ToString) -> AssetError {
        AssetError::Decode {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }
}
