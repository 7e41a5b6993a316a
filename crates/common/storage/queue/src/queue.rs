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

//! Directory-backed queue engine.
//!
//! [`FileQueue`] stores one record per file. It manages:
//! - Recovery of the cursor range on open
//! - Publishing: scratch file, then a rename under the writer lock
//! - Consuming: open the cursor's file under the reader lock, advance on
//!   commit
//! - Waking a blocked consumer through a single-slot signal
//!
//! ## Usage
//!
//! ```ignore
//! let queue = FileQueue::open("/path/to/queue")?;
//!
//! queue.put(b"hello")?;
//!
//! let token = CancellationToken::with_timeout(Duration::from_secs(1));
//! let record = queue.wait(&token)?;
//! let payload = record.into_bytes()?;
//! queue.commit()?;
//! ```
//!
//! ## Locking
//!
//! Producers contend only on the writer lock, held for id assignment and
//! the rename. The reader lock serializes cursor reads and advances. When
//! both are needed the reader lock is taken first.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicI64, Ordering},
};

use crossbeam::channel::select;
use parking_lot::Mutex;
use snafu::{OptionExt, ResultExt};
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::{
    CancelReason, CancellationToken, QueueConfig, QueueError, Result,
    error::{
        AttachSnafu, CancelledSnafu, CreateDirSnafu, CreateScratchSnafu, DestroySnafu,
        EmptyQueueSnafu, IdExhaustedSnafu, OpenRecordSnafu, ReadDirSnafu, RemoveRecordSnafu,
    },
    path::{Entry, MAX_ID, SCRATCH_SUFFIX, classify, data_file_path},
    record::Record,
    recovery::recover,
    signal::WakeSignal,
    traits::{FileBacked, Queue, steal_by_copy},
};

/// A durable FIFO queue where one file is one record.
///
/// Any number of threads may publish concurrently. Consuming is meant for a
/// single consumer; concurrent `peek`/`commit` calls are still serialized so
/// the cursor never advances twice for one record.
pub struct FileQueue {
    /// Base path and flush mode.
    config: QueueConfig,
    /// Id of the oldest unconsumed record.
    reader: Mutex<u64>,
    /// Id of the last published record.
    writer: Mutex<u64>,
    /// Published minus committed records, updated outside both locks.
    length: AtomicI64,
    /// Raised on every publish and commit.
    signal: WakeSignal,
}

impl FileQueue {
    /// Open the queue at `path` with default configuration.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        Self::new(QueueConfig {
            base_path: path.into(),
            ..Default::default()
        })
    }

    /// Create the directory if missing, drop orphaned scratch files and
    /// recover the cursor range from the remaining records.
    pub(crate) fn new(config: QueueConfig) -> Result<Self> {
        fs::create_dir_all(&config.base_path).context(CreateDirSnafu {
            path: config.base_path.clone(),
        })?;

        let recovered = recover(&config.base_path)?;
        let length = i64::try_from(recovered.length()).unwrap_or(i64::MAX);

        info!(
            path = ?config.base_path,
            read_cursor = recovered.read_cursor,
            write_counter = recovered.write_counter,
            length,
            "Queue opened"
        );

        Ok(Self {
            config,
            reader: Mutex::new(recovered.read_cursor),
            writer: Mutex::new(recovered.write_counter),
            length: AtomicI64::new(length),
            signal: WakeSignal::new(),
        })
    }

    /// Move an external file into the queue as its newest record.
    ///
    /// The file is renamed, so it must live on the same filesystem as the
    /// queue directory. An existing record at the assigned id is never
    /// replaced. Returns the assigned id.
    pub fn attach<P: AsRef<Path>>(&self, file: P) -> Result<u64> {
        let from = file.as_ref();
        self.publish_with(|target| {
            TempPath::from_path(from)
                .persist_noclobber(target)
                .map_err(|e| {
                    // Disarm the guard so a failed move leaves the source alone.
                    let _ = e.path.keep();
                    e.error
                })
                .context(AttachSnafu {
                    from,
                    to: target,
                })
        })
    }

    /// Delete record files left behind the cursor by commits whose cleanup
    /// failed. Returns how many were removed.
    pub fn sweep_orphans(&self) -> Result<usize> {
        let cursor = *self.reader.lock();
        let dir = &self.config.base_path;
        let mut removed = 0;

        for entry in fs::read_dir(dir).context(ReadDirSnafu { path: dir })? {
            let entry = entry.context(ReadDirSnafu { path: dir })?;
            let Entry::Record(id) = classify(&entry.file_name()) else {
                continue;
            };
            if id >= cursor {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(source).context(RemoveRecordSnafu { id, path }),
            }
        }

        if removed > 0 {
            info!(removed, cursor, "Swept orphaned records");
        }
        Ok(removed)
    }

    /// Id the next `peek` opens.
    #[must_use]
    pub fn read_cursor(&self) -> u64 { *self.reader.lock() }

    /// Id of the newest record published through this instance or found at
    /// open.
    #[must_use]
    pub fn write_counter(&self) -> u64 { *self.writer.lock() }

    #[must_use]
    pub const fn config(&self) -> &QueueConfig { &self.config }

    #[must_use]
    pub fn path(&self) -> &Path { &self.config.base_path }

    /// Assign the next id and let `rename` move a file onto its path.
    ///
    /// The counter only advances when the rename succeeds. Once it has, the
    /// record is visible and the publish reports success.
    fn publish_with<F>(&self, rename: F) -> Result<u64>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let id = {
            let mut counter = self.writer.lock();
            let last = *counter;
            let id = last
                .checked_add(1)
                .filter(|id| *id <= MAX_ID)
                .context(IdExhaustedSnafu { last })?;
            rename(&data_file_path(&self.config.base_path, id))?;
            *counter = id;
            id
        };

        self.length.fetch_add(1, Ordering::SeqCst);
        self.signal.raise();
        debug!(id, "Record published");

        if let Err(e) = self.config.flush_mode.sync_dir(&self.config.base_path) {
            warn!(id, error = %e, "Failed to sync queue directory after publish");
        }
        Ok(id)
    }

    fn publish_scratch(&self, scratch: TempPath) -> Result<u64> {
        let from = scratch.to_path_buf();
        self.publish_with(|target| {
            // On failure the returned `TempPath` is dropped with the error,
            // deleting the scratch file.
            scratch
                .persist_noclobber(target)
                .map_err(|e| e.error)
                .context(AttachSnafu { from, to: target })
        })
    }
}

impl Queue for FileQueue {
    type Reader = Record;

    fn stream<F>(&self, handler: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let dir = &self.config.base_path;
        let mut scratch = tempfile::Builder::new()
            .prefix("")
            .suffix(SCRATCH_SUFFIX)
            .tempfile_in(dir)
            .context(CreateScratchSnafu { dir })?;

        // Any early return drops `scratch`, which removes the file.
        {
            let mut out = BufWriter::new(scratch.as_file_mut());
            handler(&mut out)?;
            out.flush()?;
        }
        self.config.flush_mode.sync_file(scratch.as_file())?;

        // Close the handle before the rename; the path is still owned.
        self.publish_scratch(scratch.into_temp_path())?;
        Ok(())
    }

    fn peek(&self) -> Result<Record> {
        let cursor = self.reader.lock();
        let id = *cursor;
        let path = data_file_path(&self.config.base_path, id);
        match File::open(&path) {
            Ok(file) => Ok(Record::new(id, path, file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => EmptyQueueSnafu.fail(),
            Err(source) => Err(source).context(OpenRecordSnafu { path }),
        }
    }

    fn commit(&self) -> Result<()> {
        let (id, path) = {
            let mut cursor = self.reader.lock();
            let id = *cursor;
            let path = data_file_path(&self.config.base_path, id);
            // Nothing published past the cursor: refuse instead of moving
            // the cursor ahead of the next id to be assigned. A file at the
            // cursor means another instance published it.
            if id > *self.writer.lock() && !path.exists() {
                return EmptyQueueSnafu.fail();
            }
            *cursor = id.checked_add(1).context(IdExhaustedSnafu { last: id })?;
            (id, path)
        };

        self.length.fetch_sub(1, Ordering::SeqCst);
        self.signal.raise();

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(id, "Record committed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(id, "Committed record was already removed");
                Ok(())
            }
            Err(source) => Err(source).context(RemoveRecordSnafu { id, path }),
        }
    }

    fn wait(&self, token: &CancellationToken) -> Result<Record> {
        let deadline = token.deadline_timer();
        loop {
            match self.peek() {
                Err(e) if e.is_empty_queue() => {}
                other => return other,
            }

            select! {
                recv(token.cancelled()) -> _ => {
                    return CancelledSnafu {
                        reason: token.reason().unwrap_or(CancelReason::Cancelled),
                    }
                    .fail();
                }
                recv(deadline) -> _ => {
                    return CancelledSnafu {
                        reason: CancelReason::DeadlineExceeded,
                    }
                    .fail();
                }
                recv(self.signal.receiver()) -> _ => {}
            }
        }
    }

    /// Moves the source file when it exposes one, falling back to a copy
    /// when that is unsupported or the rename fails (e.g. across volumes).
    fn steal<Q: Queue + ?Sized>(&self, from: &Q) -> Result<()> {
        if let Some(source) = from.as_file_backed() {
            match self.attach(source.current_file()) {
                Ok(id) => {
                    debug!(id, "Stole record by rename");
                    return from.commit();
                }
                Err(e @ QueueError::Attach { .. }) => {
                    debug!(error = %e, "Rename steal failed, copying instead");
                }
                Err(e) => return Err(e),
            }
        }
        steal_by_copy(self, from)
    }

    fn len(&self) -> u64 { u64::try_from(self.length.load(Ordering::SeqCst)).unwrap_or(0) }

    fn destroy(&self) -> Result<()> {
        let path = &self.config.base_path;
        fs::remove_dir_all(path).context(DestroySnafu { path })?;
        info!(path = ?path, "Queue destroyed");
        Ok(())
    }

    fn as_file_backed(&self) -> Option<&dyn FileBacked> { Some(self) }
}

impl FileBacked for FileQueue {
    fn current_file(&self) -> PathBuf {
        data_file_path(&self.config.base_path, *self.reader.lock())
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Read, sync::Arc, thread, time::Duration};

    use tempfile::TempDir;

    use super::*;
    use crate::{FlushMode, QueueBuilder, read_string};

    fn open(temp_dir: &TempDir) -> FileQueue { FileQueue::open(temp_dir.path()).unwrap() }

    #[test]
    fn test_first_record_gets_id_one() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);

        queue.put(b"a").unwrap();

        assert_eq!(queue.write_counter(), 1);
        assert_eq!(queue.read_cursor(), 1);
        assert!(temp_dir.path().join("1.data").exists());
    }

    #[test]
    fn test_failed_stream_publishes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);

        let err = queue
            .stream(|out| {
                out.write_all(b"partial")?;
                Err(io::Error::other("producer failed").into())
            })
            .unwrap_err();

        assert!(matches!(err, QueueError::Io { .. }));
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.write_counter(), 0);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stream_leaves_no_scratch_files() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);

        queue
            .stream(|out| {
                out.write_all(b"hello ")?;
                out.write_all(b"world")?;
                Ok(())
            })
            .unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["1.data".to_string()]);
        assert_eq!(read_string(&queue).unwrap(), "hello world");
    }

    #[test]
    fn test_peek_does_not_consume() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);
        queue.put(b"same").unwrap();

        let mut first = queue.peek().unwrap();
        let mut second = queue.peek().unwrap();
        let mut a = String::new();
        let mut b = String::new();
        first.read_to_string(&mut a).unwrap();
        second.read_to_string(&mut b).unwrap();

        assert_eq!(a, "same");
        assert_eq!(a, b);
        assert_eq!(first.id(), second.id());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.read_cursor(), 1);
    }

    #[test]
    fn test_commit_tolerates_removed_file() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);
        queue.put(b"gone").unwrap();
        fs::remove_file(temp_dir.path().join("1.data")).unwrap();

        queue.commit().unwrap();

        assert_eq!(queue.len(), 0);
        assert_eq!(queue.read_cursor(), 2);
    }

    #[test]
    fn test_commit_on_empty_queue_keeps_cursor() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);

        assert!(queue.commit().unwrap_err().is_empty_queue());
        assert_eq!(queue.read_cursor(), 1);
        assert_eq!(queue.len(), 0);

        queue.put(b"first").unwrap();
        assert_eq!(read_string(&queue).unwrap(), "first");
    }

    #[test]
    fn test_commit_sees_record_from_other_instance() {
        let temp_dir = TempDir::new().unwrap();
        let consumer = open(&temp_dir);
        let producer = open(&temp_dir);

        producer.put(b"elsewhere").unwrap();

        assert_eq!(read_string(&consumer).unwrap(), "elsewhere");
        consumer.commit().unwrap();
        assert!(!temp_dir.path().join("1.data").exists());
    }

    #[test]
    fn test_attach_moves_external_file() {
        let temp_dir = TempDir::new().unwrap();
        let queue = FileQueue::open(temp_dir.path().join("q")).unwrap();
        let external = temp_dir.path().join("incoming.bin");
        fs::write(&external, b"adopted").unwrap();

        let id = queue.attach(&external).unwrap();

        assert_eq!(id, 1);
        assert!(!external.exists());
        assert_eq!(queue.len(), 1);
        assert_eq!(read_string(&queue).unwrap(), "adopted");
    }

    #[test]
    fn test_attach_missing_file_keeps_counter() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);

        let err = queue.attach(temp_dir.path().join("nope")).unwrap_err();

        assert!(matches!(err, QueueError::Attach { .. }));
        assert_eq!(queue.write_counter(), 0);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_attach_never_replaces_existing_record() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);
        // Another instance published id 1 after this one opened.
        fs::write(temp_dir.path().join("1.data"), b"theirs").unwrap();
        let external = temp_dir.path().join("incoming.bin");
        fs::write(&external, b"ours").unwrap();

        let err = queue.attach(&external).unwrap_err();

        assert!(matches!(err, QueueError::Attach { .. }));
        assert!(external.exists());
        assert_eq!(fs::read(temp_dir.path().join("1.data")).unwrap(), b"theirs");
        assert_eq!(queue.write_counter(), 0);
    }

    #[test]
    fn test_put_never_replaces_existing_record() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);
        fs::write(temp_dir.path().join("1.data"), b"theirs").unwrap();

        let err = queue.put(b"ours").unwrap_err();

        assert!(matches!(err, QueueError::Attach { .. }));
        assert_eq!(fs::read(temp_dir.path().join("1.data")).unwrap(), b"theirs");
        assert_eq!(queue.len(), 0);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_put_after_largest_id_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("9223372036854775807.data"), b"last").unwrap();
        let queue = open(&temp_dir);
        assert_eq!(queue.len(), 1);

        let err = queue.put(b"overflow").unwrap_err();

        assert!(matches!(err, QueueError::IdExhausted { last } if last == MAX_ID));
        assert_eq!(queue.write_counter(), MAX_ID);
        assert_eq!(queue.len(), 1);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_publish_succeeds_when_directory_sync_fails() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("q");
        let moved = temp_dir.path().join("moved");
        let queue = QueueBuilder::new(&base)
            .flush_mode(FlushMode::Sync)
            .build()
            .unwrap();

        // The record lands, then the directory vanishes before its fsync.
        let id = queue
            .publish_with(|target| {
                fs::write(target, b"visible")?;
                fs::rename(&base, &moved)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(queue.write_counter(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(fs::read(moved.join("1.data")).unwrap(), b"visible");
    }

    #[test]
    fn test_current_file_tracks_cursor() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);
        queue.put(b"1").unwrap();
        queue.put(b"2").unwrap();

        assert_eq!(queue.current_file(), temp_dir.path().join("1.data"));
        queue.commit().unwrap();
        assert_eq!(queue.current_file(), temp_dir.path().join("2.data"));
    }

    #[test]
    fn test_sweep_orphans_removes_only_records_behind_cursor() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);
        for payload in [b"a", b"b", b"c"] {
            queue.put(payload).unwrap();
        }
        queue.commit().unwrap();
        queue.commit().unwrap();
        // Simulate deletions that failed during commit.
        fs::write(temp_dir.path().join("1.data"), b"a").unwrap();
        fs::write(temp_dir.path().join("2.data"), b"b").unwrap();

        assert_eq!(queue.sweep_orphans().unwrap(), 2);
        assert!(!temp_dir.path().join("1.data").exists());
        assert!(!temp_dir.path().join("2.data").exists());
        assert_eq!(read_string(&queue).unwrap(), "c");
        assert_eq!(queue.sweep_orphans().unwrap(), 0);
    }

    #[test]
    fn test_wait_returns_published_record() {
        let temp_dir = TempDir::new().unwrap();
        let queue = Arc::new(open(&temp_dir));
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.put(b"late").unwrap();
        });

        let token = CancellationToken::with_timeout(Duration::from_secs(5));
        let record = queue.wait(&token).unwrap();
        assert_eq!(record.into_bytes().unwrap(), b"late");
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_cancelled_by_token() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);
        let token = CancellationToken::new();
        let canceller = token.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let err = queue.wait(&token).unwrap_err();
        assert!(matches!(
            err,
            QueueError::Cancelled {
                reason: CancelReason::Cancelled
            }
        ));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_returns_ready_record_even_if_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let queue = open(&temp_dir);
        queue.put(b"ready").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(queue.wait(&token).unwrap().id(), 1);
    }

    #[test]
    fn test_destroy_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doomed");
        let queue = FileQueue::open(&path).unwrap();
        queue.put(b"x").unwrap();

        queue.destroy().unwrap();

        assert!(!path.exists());
    }
}
