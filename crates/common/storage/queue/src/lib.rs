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

pub mod builder;
pub mod cancel;
pub mod config;
pub mod error;
pub mod path;
pub mod queue;
pub mod record;
pub mod recovery;
mod signal;
pub mod traits;

use std::path::PathBuf;

pub use builder::QueueBuilder;
pub use cancel::{CancelReason, CancellationToken};
pub use config::{FlushMode, QueueConfig};
pub use error::{QueueError, Result};
pub use queue::FileQueue;
pub use record::Record;
pub use traits::{FileBacked, Queue, read_bytes, read_string, steal_by_copy};

/// Open the queue stored in `directory`, creating it if needed.
pub fn open<P: Into<PathBuf>>(directory: P) -> Result<FileQueue> { FileQueue::open(directory) }
