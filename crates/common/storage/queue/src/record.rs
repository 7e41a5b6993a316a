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
    io::{self, Read},
    path::{Path, PathBuf},
};

/// Read handle to the oldest record, returned by `peek` and `wait`.
///
/// Peeking does not consume: every handle reads the same immutable bytes.
/// Drop the handle before calling `commit`, some platforms refuse to delete
/// open files.
#[derive(Debug)]
pub struct Record {
    id:   u64,
    path: PathBuf,
    file: File,
}

impl Record {
    pub(crate) const fn new(id: u64, path: PathBuf, file: File) -> Self { Self { id, path, file } }

    /// Sequence id assigned when the record was published.
    #[must_use]
    pub const fn id(&self) -> u64 { self.id }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Size of the record in bytes.
    pub fn len(&self) -> io::Result<u64> { Ok(self.file.metadata()?.len()) }

    pub fn is_empty(&self) -> io::Result<bool> { Ok(self.len()? == 0) }

    /// Read the remaining bytes and close the handle.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for Record {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.file.read(buf) }
}
