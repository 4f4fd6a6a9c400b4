//! Concurrent processing of many files.
//!
//! Each file is handled by one worker from start to finish with its own
//! handles and its own derived key. The only shared state is the result
//! table, written once per file under a lock.

use crate::codec::{decrypt_file_with, encrypt_file_with};
use crate::crypto::KdfParams;
use crate::discover::Mode;
use crate::erase::secure_delete;
use crate::error::{Error, ErrorKind, Result};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

impl Operation {
    /// The discovery mode that selects inputs for this operation.
    pub fn mode(self) -> Mode {
        match self {
            Operation::Encrypt => Mode::Encrypt,
            Operation::Decrypt => Mode::Decrypt,
        }
    }

    fn run(self, path: &Path, password: &str, kdf: KdfParams) -> Result<PathBuf> {
        match self {
            Operation::Encrypt => encrypt_file_with(path, password, kdf),
            Operation::Decrypt => decrypt_file_with(path, password, kdf),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Encrypt => f.write_str("encrypt"),
            Operation::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Cooperative cancellation flag, checked before each file is dispatched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum Status {
    Succeeded { output: PathBuf },
    Failed(Error),
    /// Not started because the batch was cancelled.
    Skipped,
}

/// What happened to one file.
#[derive(Debug)]
pub struct FileOutcome {
    path: PathBuf,
    status: Status,
    erase_error: Option<Error>,
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, Status::Succeeded { .. })
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, Status::Failed(_))
    }

    pub fn skipped(&self) -> bool {
        matches!(self.status, Status::Skipped)
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.status {
            Status::Succeeded { output } => Some(output),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.status {
            Status::Failed(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Human readable failure reason, if the file failed.
    pub fn reason(&self) -> Option<String> {
        match &self.status {
            Status::Failed(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// A secure-delete failure after an otherwise successful operation.
    pub fn erase_error(&self) -> Option<&Error> {
        self.erase_error.as_ref()
    }
}

/// Aggregate result of [`Engine::run_batch`].
#[derive(Debug)]
pub struct BatchReport {
    operation: Operation,
    started: DateTime<Local>,
    finished: DateTime<Local>,
    outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    pub fn finished(&self) -> DateTime<Local> {
        self.finished
    }

    /// Per-file outcomes, in the order the paths were given.
    pub fn outcomes(&self) -> &[FileOutcome] {
        &self.outcomes
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.skipped()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.skipped()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, String)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.reason().map(|r| (o.path(), r)))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Receives progress events from the workers.
///
/// Called concurrently from several threads.
pub trait Reporter: Send + Sync {
    fn file_started(&self, _path: &Path, _operation: Operation) {}
    fn file_finished(&self, _outcome: &FileOutcome) {}
    fn batch_finished(&self, _report: &BatchReport) {}
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Number of worker threads.
    pub concurrency: usize,
    /// Securely delete the input after a successful operation.
    pub shred: bool,
    /// Key derivation costs for every file in the run.
    pub kdf: KdfParams,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism().map_or(1, |n| n.get()),
            shred: false,
            kdf: KdfParams::default(),
        }
    }
}

/// Runs encrypt/decrypt operations with an injected reporter.
pub struct Engine {
    options: BatchOptions,
    reporter: Arc<dyn Reporter>,
    pool: rayon::ThreadPool,
}

impl Engine {
    pub fn new(options: BatchOptions, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.concurrency.max(1))
            .thread_name(|i| format!("sniper-crypt-{i}"))
            .build()
            .map_err(|e| Error::Io(io::Error::other(e)))?;

        Ok(Self {
            options,
            reporter,
            pool,
        })
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Processes a single file and surfaces its error directly.
    ///
    /// With shredding enabled, an erase failure is returned as
    /// [`Error::Erase`] even though the output was written.
    pub fn process(&self, path: &Path, operation: Operation, password: &str) -> Result<PathBuf> {
        self.options.kdf.validate()?;
        let output = operation.run(path, password, self.options.kdf)?;
        if self.options.shred {
            secure_delete(path)?;
        }
        Ok(output)
    }

    /// Processes every path on the worker pool.
    ///
    /// Individual failures are recorded in the report and never stop the
    /// other files. Only a configuration error aborts the batch, before
    /// anything is dispatched.
    pub fn run_batch(
        &self,
        paths: &[PathBuf],
        operation: Operation,
        password: &str,
        cancel: &CancelToken,
    ) -> Result<BatchReport> {
        let kdf = self.options.kdf;
        kdf.validate()?;
        debug!(
            mem_cost_kib = kdf.mem_cost_kib(),
            time_cost = kdf.time_cost(),
            parallelism = kdf.parallelism(),
            files = paths.len(),
            "starting batch"
        );

        let started = Local::now();
        let slots: Mutex<Vec<Option<FileOutcome>>> =
            Mutex::new(paths.iter().map(|_| None).collect());

        self.pool.install(|| {
            paths
                .par_iter()
                .enumerate()
                .with_max_len(1)
                .for_each(|(i, path)| {
                    let outcome = if cancel.is_cancelled() {
                        debug!(path = %path.display(), "cancelled, not dispatching");
                        FileOutcome {
                            path: path.clone(),
                            status: Status::Skipped,
                            erase_error: None,
                        }
                    } else {
                        self.run_one(path, operation, password)
                    };

                    self.reporter.file_finished(&outcome);
                    slots.lock().unwrap_or_else(PoisonError::into_inner)[i] = Some(outcome);
                });
        });

        let outcomes = slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .zip(paths)
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| FileOutcome {
                    path: path.clone(),
                    status: Status::Skipped,
                    erase_error: None,
                })
            })
            .collect();

        let report = BatchReport {
            operation,
            started,
            finished: Local::now(),
            outcomes,
        };

        if cancel.is_cancelled() {
            warn!(skipped = report.skipped(), "batch cancelled");
        }
        info!(
            operation = %operation,
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch finished"
        );

        self.reporter.batch_finished(&report);
        Ok(report)
    }

    fn run_one(&self, path: &Path, operation: Operation, password: &str) -> FileOutcome {
        self.reporter.file_started(path, operation);

        let (status, erase_error) = match operation.run(path, password, self.options.kdf) {
            Ok(output) => {
                let erase_error = if self.options.shred {
                    secure_delete(path).err()
                } else {
                    None
                };
                if let Some(e) = &erase_error {
                    warn!(path = %path.display(), error = %e, "secure delete failed");
                }
                (Status::Succeeded { output }, erase_error)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "{operation} failed");
                (Status::Failed(e), None)
            }
        };

        FileOutcome {
            path: path.to_path_buf(),
            status,
            erase_error,
        }
    }
}
