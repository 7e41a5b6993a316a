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

//! On-disk naming.
//!
//! ```text
//! <base>/
//!   1.data      published record, raw bytes
//!   2.data
//!   k3Fq9.temp  scratch file owned by one producer
//! ```

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

/// Suffix of a published record.
pub const DATA_SUFFIX: &str = ".data";

/// Suffix of a producer's scratch file.
pub const SCRATCH_SUFFIX: &str = ".temp";

/// Largest assignable id. Ids are non-negative 64-bit signed integers.
pub const MAX_ID: u64 = i64::MAX.unsigned_abs();

/// Kind of a directory entry, decided by its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// `<id>.data`
    Record(u64),
    /// `*.data` whose stem is not a canonical id in `0..=MAX_ID`.
    Malformed,
    /// `*.temp`
    Scratch,
    Other,
}

/// Generates a record file name: `<id>.data`.
pub fn data_file_name(id: u64) -> String { format!("{id}{DATA_SUFFIX}") }

/// Returns full path to a record: `base/<id>.data`.
pub fn data_file_path<P: AsRef<Path>>(base: P, id: u64) -> PathBuf {
    base.as_ref().join(data_file_name(id))
}

/// Classifies a file name found in the queue directory.
///
/// Works on the raw name so entries that are not valid UTF-8 are still
/// recognized by their suffix.
pub fn classify(name: &OsStr) -> Entry {
    let bytes = name.as_encoded_bytes();
    if let Some(stem) = bytes.strip_suffix(DATA_SUFFIX.as_bytes()) {
        return parse_id(stem).map_or(Entry::Malformed, Entry::Record);
    }
    if bytes.ends_with(SCRATCH_SUFFIX.as_bytes()) {
        return Entry::Scratch;
    }
    Entry::Other
}

/// Parses a stem written by [`data_file_name`]. Signs, leading zeros and
/// values above [`MAX_ID`] are rejected.
fn parse_id(stem: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(stem).ok()?;
    let id = u64::try_from(text.parse::<i64>().ok()?).ok()?;
    (id.to_string() == text).then_some(id)
}
