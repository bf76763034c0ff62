//! Implementation of different callback functions.
use crate::core::estimators::{BasicEstimators, Estimators};
use crate::real::Real;
use crate::state::Snapshot;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Trait for observing a running integration.
///
/// The supervisor invokes [`poll`](Self::poll) once per polling interval
/// with the freshly published statistics. Implementations must not block
/// for long; the supervisor cannot check for convergence while a callback
/// runs.
pub trait Callback<T: Real> {
    /// This method is called after each supervisor poll and may print or
    /// record information about the run so far.
    fn poll(&self, snapshot: &Snapshot<T>);
}

/// A callback function that does nothing
pub struct SinkCallback {}

impl<T: Real> Callback<T> for SinkCallback {
    fn poll(&self, _: &Snapshot<T>) {}
}

/// A callback function that prints the state of the run at each poll
pub struct SimpleCallback {}

impl<T: Real> Callback<T> for SimpleCallback {
    fn poll(&self, snapshot: &Snapshot<T>) {
        println!(
            "N={} E={} \u{b1} {}",
            snapshot.calls(),
            snapshot.mean(),
            snapshot.error_estimate()
        );
    }
}

/// A callback that appends each snapshot to a file as one JSON object per
/// line, so a long run can be watched or plotted from outside the process.
pub struct FileWriterCallback {
    path: PathBuf,
}

impl FileWriterCallback {
    /// Creates a callback writing to the file at `path`. The file is
    /// created on the first poll and appended to afterwards.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl<T: Real + Serialize> Callback<T> for FileWriterCallback {
    fn poll(&self, snapshot: &Snapshot<T>) {
        // a failed write must not take down the run
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) else {
            return;
        };
        if let Ok(line) = serde_json::to_string(snapshot) {
            let _ = writeln!(file, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SharedState;
    use std::fs::read_to_string;
    use tempfile::NamedTempFile;

    #[test]
    fn file_writer_appends_json_lines() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path();

        let state = SharedState::new(&[1.0, 3.0], 1e-3);
        let callback = FileWriterCallback::new(path);

        Callback::<f64>::poll(&callback, &state.snapshot());
        Callback::<f64>::poll(&callback, &state.snapshot());

        let contents = read_to_string(path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        for line in lines {
            let snapshot: Snapshot<f64> = serde_json::from_str(line).unwrap();
            assert_eq!(snapshot.calls(), 2);
            assert_eq!(snapshot.mean(), 2.0);
        }
    }
}
