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

use std::{io, path::PathBuf, string::FromUtf8Error};

use snafu::Snafu;

use crate::cancel::CancelReason;

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueueError {
    /// No record is available right now. Not fatal: poll again or `wait`.
    #[snafu(display("Empty queue"))]
    EmptyQueue,

    /// A `wait` was aborted by its cancellation token.
    #[snafu(display("Wait cancelled: {reason}"))]
    Cancelled { reason: CancelReason },

    /// Recovery found a record file whose name is not a sequence id.
    #[snafu(display("Corrupt queue state: unparseable record name {name:?}"))]
    CorruptState { name: String },

    /// The next sequence id would exceed `i64::MAX`.
    #[snafu(display("Sequence ids exhausted after {last}"))]
    IdExhausted { last: u64 },

    #[snafu(display("Failed to create queue directory {}", path.display()))]
    CreateDir { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to list queue directory {}", path.display()))]
    ReadDir { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to create scratch file in {}", dir.display()))]
    CreateScratch { dir: PathBuf, source: io::Error },

    #[snafu(display("Failed to remove scratch file {}", path.display()))]
    RemoveScratch { path: PathBuf, source: io::Error },

    /// Renaming a file into the record namespace failed.
    #[snafu(display("Failed to attach {} as {}", from.display(), to.display()))]
    Attach {
        from:   PathBuf,
        to:     PathBuf,
        source: io::Error,
    },

    #[snafu(display("Failed to open record {}", path.display()))]
    OpenRecord { path: PathBuf, source: io::Error },

    /// The cursor already moved past `id`; only the physical cleanup failed.
    #[snafu(display("Failed to remove committed record {id} at {}", path.display()))]
    RemoveRecord {
        id:     u64,
        path:   PathBuf,
        source: io::Error,
    },

    #[snafu(display("Failed to destroy queue directory {}", path.display()))]
    Destroy { path: PathBuf, source: io::Error },

    /// I/O raised while streaming bytes into or out of a record.
    #[snafu(display("IO error: {source}"), context(false))]
    Io { source: io::Error },

    #[snafu(display("Record is not valid UTF-8"))]
    InvalidUtf8 { source: FromUtf8Error },
}

impl QueueError {
    /// Whether this is the [`QueueError::EmptyQueue`] sentinel.
    #[must_use]
    pub const fn is_empty_queue(&self) -> bool { matches!(self, Self::EmptyQueue) }

    /// Whether this is a cancelled `wait`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled { .. }) }
}

/// Result type for queue operations.
pub type Result<T, E = QueueError> = std::result::Result<T, E>;
