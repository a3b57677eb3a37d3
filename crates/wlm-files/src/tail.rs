//! Follow a file that is still being written, like `tail -f`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::files::{FileError, open};

/// How long a read waits for a change notification before looking again.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Reader that never reports end-of-file while the file keeps growing.
///
/// At the current end a read blocks until the file changes, then returns the
/// appended bytes. If the file shrinks (log rotation by truncation) reading
/// restarts from the beginning. Dropping the reader stops the watch.
#[derive(Debug)]
pub struct TailReader {
    file: File,
    path: Utf8PathBuf,
    events: Receiver<()>,
    _watcher: RecommendedWatcher,
}

impl TailReader {
    pub fn open(path: &Utf8Path) -> Result<Self, FileError> {
        let file = open(path)?;
        let (tx, rx) = channel();

        let watch_err = |source| FileError::Watch {
            path: path.to_path_buf(),
            source,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        let _ = tx.send(());
                    }
                }
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )
        .map_err(watch_err)?;

        watcher
            .watch(path.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(watch_err)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            events: rx,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn rewind_if_truncated(&mut self) -> io::Result<()> {
        let position = self.file.stream_position()?;
        let len = self.file.metadata()?.len();
        if len < position {
            tracing::debug!(path = %self.path, "file truncated, reading from start");
            self.file.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }
}

impl Read for TailReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.file.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            // Timeouts are retried too; some filesystems never deliver events.
            match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => self.rewind_if_truncated()?,
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
    }
}
