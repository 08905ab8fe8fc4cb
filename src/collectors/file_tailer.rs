use crate::error::FileAccessError;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A complete line read from a monitored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailedLine {
    /// File the line came from
    pub path: PathBuf,
    /// Line content without its terminator
    pub line: String,
}

/// Result of a single poll pass over every monitored file
#[derive(Debug, Default)]
pub struct PollOutput {
    /// Lines in file order, then read order within a file
    pub lines: Vec<TailedLine>,
    /// Per-file faults raised during this pass
    pub faults: Vec<FileAccessError>,
}

/// Outcome of one attempt to read a line past the cursor
enum ReadStep {
    Line(String),
    Pending,
}

/// One tracked file and its read cursor
///
/// `cursor` always sits on a line boundary: it only moves past bytes that
/// ended in `\n`. A missing reader means the file will be reopened at
/// `cursor` on the next poll. `fault_reported` stays set until a read
/// through a fresh handle succeeds, so a persistent fault surfaces once.
#[derive(Debug)]
struct MonitoredFile {
    path: PathBuf,
    cursor: u64,
    reader: Option<BufReader<File>>,
    fault_reported: bool,
}

impl MonitoredFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cursor: 0,
            reader: None,
            fault_reported: false,
        }
    }

    /// Open the file and position it at the cursor
    fn reopen(&mut self) -> Result<(), FileAccessError> {
        let mut file = File::open(&self.path).map_err(|source| FileAccessError::Open {
            path: self.path.clone(),
            source,
        })?;

        if self.cursor > 0 {
            file.seek(SeekFrom::Start(self.cursor))
                .map_err(|source| FileAccessError::Read {
                    path: self.path.clone(),
                    source,
                })?;
        }

        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    /// Read one terminated line past the cursor, or rewind if none is complete
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<ReadStep> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(ReadStep::Pending),
        };

        buf.clear();
        let read = reader.read_until(b'\n', buf)?;

        if read > 0 && buf.last() == Some(&b'\n') {
            self.cursor += read as u64;
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            return Ok(ReadStep::Line(String::from_utf8_lossy(buf).into_owned()));
        }

        if read > 0 {
            // Producer is mid-write: leave the partial bytes for a later poll
            reader.seek(SeekFrom::Start(self.cursor))?;
        }
        Ok(ReadStep::Pending)
    }
}

/// Fixed set of read cursors, one per monitored path
///
/// Files are polled in the order they were registered. Each poll reads at
/// most `lines_per_poll` complete lines per file without blocking, and never
/// re-reads bytes that were already yielded.
#[derive(Debug)]
pub struct FileCursorSet {
    files: Vec<MonitoredFile>,
    lines_per_poll: usize,
}

impl FileCursorSet {
    /// Open every path with its cursor at byte 0
    ///
    /// Paths that cannot be opened stay in the set and are retried on each
    /// poll. Their open faults are returned alongside the set.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use errwatch::collectors::FileCursorSet;
    /// use std::path::PathBuf;
    ///
    /// let (mut cursors, faults) = FileCursorSet::open(&[PathBuf::from("/var/log/app.log")]);
    /// assert!(faults.is_empty());
    /// let output = cursors.poll();
    /// ```
    pub fn open(paths: &[PathBuf]) -> (Self, Vec<FileAccessError>) {
        let mut faults = Vec::new();
        let files = paths
            .iter()
            .map(|path| {
                let mut file = MonitoredFile::new(path.clone());
                match file.reopen() {
                    Ok(()) => debug!("Opened {} for tailing", path.display()),
                    Err(e) => {
                        file.fault_reported = true;
                        faults.push(e);
                    }
                }
                file
            })
            .collect();

        (
            Self {
                files,
                lines_per_poll: 1,
            },
            faults,
        )
    }

    /// Set how many complete lines a single poll may take from each file
    ///
    /// Values below 1 are treated as 1.
    pub fn with_lines_per_poll(mut self, lines_per_poll: usize) -> Self {
        self.lines_per_poll = lines_per_poll.max(1);
        self
    }

    /// Perform one pass over all files
    pub fn poll(&mut self) -> PollOutput {
        let mut output = PollOutput::default();
        let mut buf = Vec::new();
        let lines_per_poll = self.lines_per_poll;

        for file in self.files.iter_mut() {
            if file.reader.is_none() {
                if let Err(e) = file.reopen() {
                    if !file.fault_reported {
                        file.fault_reported = true;
                        output.faults.push(e);
                    }
                    continue;
                }
            }

            for _ in 0..lines_per_poll {
                let step = match file.read_line(&mut buf) {
                    Ok(step) => step,
                    Err(source) => {
                        file.reader = None;
                        if !file.fault_reported {
                            warn!(
                                "Read failed on {}, suspending until it can be reopened",
                                file.path.display()
                            );
                            file.fault_reported = true;
                            output.faults.push(FileAccessError::Read {
                                path: file.path.clone(),
                                source,
                            });
                        }
                        break;
                    }
                };

                if file.fault_reported {
                    file.fault_reported = false;
                    info!(
                        "Resumed tailing {} at offset {}",
                        file.path.display(),
                        file.cursor
                    );
                }

                match step {
                    ReadStep::Line(line) => output.lines.push(TailedLine {
                        path: file.path.clone(),
                        line,
                    }),
                    ReadStep::Pending => break,
                }
            }
        }

        output
    }

    /// Release every handle, collecting failures instead of stopping early
    pub fn close(self) -> Vec<FileAccessError> {
        self.close_with(|_, file| release(file))
    }

    fn close_with<F>(mut self, mut release: F) -> Vec<FileAccessError>
    where
        F: FnMut(&Path, File) -> io::Result<()>,
    {
        let mut failures = Vec::new();

        for file in self.files.iter_mut() {
            if let Some(reader) = file.reader.take() {
                if let Err(source) = release(file.path.as_path(), reader.into_inner()) {
                    failures.push(FileAccessError::Close {
                        path: file.path.clone(),
                        source,
                    });
                }
            }
        }

        debug!(
            "Closed {} monitored files ({} failures)",
            self.files.len(),
            failures.len()
        );
        failures
    }

    /// Monitored paths in poll order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|file| file.path.as_path())
    }

    /// Byte offset of the last consumed line boundary for `path`
    pub fn cursor(&self, path: &Path) -> Option<u64> {
        self.files
            .iter()
            .find(|file| file.path == path)
            .map(|file| file.cursor)
    }

    /// Number of files with an open handle
    pub fn open_count(&self) -> usize {
        self.files.iter().filter(|file| file.reader.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Close a file so that the OS result is observable
#[cfg(unix)]
fn release(file: File) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = file.into_raw_fd();
    // SAFETY: fd was just taken out of an owned File and is not used again.
    let rc = unsafe { libc::close(fd) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn release(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}
