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

//! The queue contract shared by every backend.
//!
//! [`FileQueue`](crate::FileQueue) is the filesystem backend. Other backends
//! implement [`Queue`] and get the copying [`steal`](Queue::steal) for free;
//! a backend whose records are local files can also expose [`FileBacked`] so
//! a destination queue may move the file instead of copying its bytes.

use std::{
    io::{self, Read, Write},
    path::PathBuf,
};

use bytes::Bytes;
use snafu::ResultExt;
use tracing::debug;

use crate::{CancellationToken, Result, error::InvalidUtf8Snafu};

/// FIFO of opaque byte records with many producers and a single consumer.
pub trait Queue {
    /// Handle returned by [`peek`](Self::peek) and [`wait`](Self::wait).
    type Reader: Read;

    /// Publish `data` as the newest record.
    fn put(&self, data: &[u8]) -> Result<()> {
        self.stream(|out| {
            out.write_all(data)?;
            Ok(())
        })
    }

    /// Publish everything `reader` yields as the newest record.
    fn put_reader<R: Read>(&self, mut reader: R) -> Result<()> {
        self.stream(|out| {
            io::copy(&mut reader, out)?;
            Ok(())
        })
    }

    /// Publish whatever `handler` writes. The record becomes visible only if
    /// `handler` returns `Ok`; on error nothing is published.
    fn stream<F>(&self, handler: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>;

    /// Open the oldest record without consuming it, or fail with
    /// [`QueueError::EmptyQueue`](crate::QueueError::EmptyQueue).
    fn peek(&self) -> Result<Self::Reader>;

    /// Discard the oldest record.
    fn commit(&self) -> Result<()>;

    /// Like [`peek`](Self::peek) but blocks while the queue is empty, until a
    /// record arrives or `token` is cancelled.
    fn wait(&self, token: &CancellationToken) -> Result<Self::Reader>;

    /// Move the oldest record of `from` to the back of `self`.
    fn steal<Q: Queue + ?Sized>(&self, from: &Q) -> Result<()> { steal_by_copy(self, from) }

    /// Number of records waiting for commit.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool { self.len() == 0 }

    /// Remove the queue and everything stored in it.
    fn destroy(&self) -> Result<()>;

    /// Capability query for the move-instead-of-copy steal.
    fn as_file_backed(&self) -> Option<&dyn FileBacked> { None }
}

/// A queue whose oldest record is a plain file on a local filesystem.
pub trait FileBacked {
    /// Path of the oldest record. The file may not exist if the queue is
    /// empty or was altered.
    fn current_file(&self) -> PathBuf;
}

/// Copy the oldest record of `from` into `dest`, then commit it in `from`.
///
/// The source is committed only after the copy is published in `dest`.
pub fn steal_by_copy<D, S>(dest: &D, from: &S) -> Result<()>
where
    D: Queue + ?Sized,
    S: Queue + ?Sized,
{
    let mut input = from.peek()?;
    dest.stream(move |out| {
        let copied = io::copy(&mut input, out)?;
        debug!(bytes = copied, "Copied record for steal");
        Ok(())
    })?;
    from.commit()
}

/// Read the oldest record fully without consuming it.
pub fn read_bytes<Q: Queue + ?Sized>(queue: &Q) -> Result<Bytes> {
    let mut reader = queue.peek()?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(Bytes::from(buf))
}

/// [`read_bytes`] decoded as UTF-8.
pub fn read_string<Q: Queue + ?Sized>(queue: &Q) -> Result<String> {
    let bytes = read_bytes(queue)?;
    String::from_utf8(Vec::from(bytes)).context(InvalidUtf8Snafu)
}
