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

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub base_path:  PathBuf,
    pub flush_mode: FlushMode,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_path:  PathBuf::from("./queue_data"),
            flush_mode: FlushMode::Async,
        }
    }
}

/// Durability of a publish.
///
/// The rename into the record namespace is atomic in both modes. `Sync`
/// additionally fsyncs the scratch file before the rename and the directory
/// after it, so a published record survives power loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushMode {
    #[default]
    Async,
    Sync,
}

impl FlushMode {
    pub(crate) fn sync_file(self, file: &File) -> io::Result<()> {
        match self {
            Self::Async => Ok(()),
            Self::Sync => file.sync_all(),
        }
    }

    pub(crate) fn sync_dir(self, dir: &Path) -> io::Result<()> {
        match self {
            Self::Async => Ok(()),
            // Directory handles cannot be opened for syncing on Windows.
            Self::Sync if cfg!(unix) => File::open(dir)?.sync_all(),
            Self::Sync => Ok(()),
        }
    }
}
