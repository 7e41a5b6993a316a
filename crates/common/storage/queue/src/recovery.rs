// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Crash recovery for the queue directory.
//!
//! There is no manifest: the directory listing is the state.
//! 1. Every `<id>.data` contributes to the `[min, max]` id range
//! 2. Every `*.temp` is deleted, its producer died before publishing
//! 3. A `*.data` name that is not an id in `0..=i64::MAX` aborts recovery
//!
//! Names are matched on their raw bytes, so an entry that is not valid
//! UTF-8 is still deleted or rejected by its suffix.
//!
//! Sequence ids start at 1, so an empty directory recovers to
//! `read_cursor = 1, write_counter = 0`.

use std::path::Path;

use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    Result,
    error::{CorruptStateSnafu, ReadDirSnafu, RemoveScratchSnafu},
    path::{Entry, classify},
};

/// Queue state reconstructed from the directory contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryInfo {
    /// Id of the oldest record still present.
    pub read_cursor:     u64,
    /// Id of the newest published record.
    pub write_counter:   u64,
    /// Number of orphaned scratch files deleted during the scan.
    pub scratch_removed: usize,
}

impl Default for RecoveryInfo {
    fn default() -> Self {
        Self {
            read_cursor:     1,
            write_counter:   0,
            scratch_removed: 0,
        }
    }
}

impl RecoveryInfo {
    /// Records between the cursor and the counter, inclusive.
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.write_counter
            .saturating_add(1)
            .saturating_sub(self.read_cursor)
    }
}

/// Scan `dir` and rebuild the cursor range.
///
/// Assumes the directory exists.
pub fn recover(dir: &Path) -> Result<RecoveryInfo> {
    debug!(path = ?dir, "Starting queue recovery");

    let mut range: Option<(u64, u64)> = None;
    let mut scratch_removed = 0;

    for entry in std::fs::read_dir(dir).context(ReadDirSnafu { path: dir })? {
        let entry = entry.context(ReadDirSnafu { path: dir })?;
        let file_name = entry.file_name();

        match classify(&file_name) {
            Entry::Record(id) => {
                range = Some(match range {
                    None => (id, id),
                    Some((min, max)) => (min.min(id), max.max(id)),
                });
            }
            Entry::Malformed => {
                return CorruptStateSnafu {
                    name: file_name.to_string_lossy(),
                }
                .fail();
            }
            Entry::Scratch => {
                let path = entry.path();
                warn!(path = ?path, "Removing orphaned scratch file");
                std::fs::remove_file(&path).context(RemoveScratchSnafu { path })?;
                scratch_removed += 1;
            }
            Entry::Other => {}
        }
    }

    let info = match range {
        Some((read_cursor, write_counter)) => RecoveryInfo {
            read_cursor,
            write_counter,
            scratch_removed,
        },
        None => RecoveryInfo {
            scratch_removed,
            ..RecoveryInfo::default()
        },
    };

    info!(
        path = ?dir,
        read_cursor = info.read_cursor,
        write_counter = info.write_counter,
        scratch_removed = info.scratch_removed,
        "Queue recovery complete"
    );

    Ok(info)
}
