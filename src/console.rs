//! Terminal progress output for directory runs.

use sniper_crypt::{BatchReport, FileOutcome, Reporter, Status};
use std::sync::{Mutex, PoisonError};

/// Prints one line per finished file and a closing summary.
pub struct ConsoleReporter {
    total: usize,
    done: Mutex<usize>,
}

impl ConsoleReporter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: Mutex::new(0),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn file_finished(&self, outcome: &FileOutcome) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        *done += 1;
        let progress = format!("[{}/{}]", *done, self.total);
        let path = outcome.path().display();

        match outcome.status() {
            Status::Succeeded { output } => {
                println!("{progress} ok    {path} -> {}", output.display());
                if let Some(e) = outcome.erase_error() {
                    eprintln!("{progress} warn  {e}");
                }
            }
            Status::Failed(e) => eprintln!("{progress} fail  {path} [{}]: {e}", e.kind()),
            Status::Skipped => println!("{progress} skip  {path}"),
        }
    }

    fn batch_finished(&self, report: &BatchReport) {
        let elapsed = report.finished() - report.started();
        println!();
        println!(
            "{}: {} attempted, {} succeeded, {} failed, {} skipped ({:.1}s)",
            report.operation(),
            report.attempted(),
            report.succeeded(),
            report.failed(),
            report.skipped(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );

        if report.failed() > 0 {
            println!("Failures:");
            for (path, reason) in report.failures() {
                println!("  {}: {reason}", path.display());
            }
        }
    }
}
