//! Job status snapshots reported by execution providers.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::state::JobState;

/// Files larger than this are summarised as head + marker + tail.
pub const SUMMARY_TRUNCATION_THRESHOLD: u64 = 2048;

/// Inserted between the head and tail of a truncated summary.
pub const SUMMARY_ELISION_MARKER: &str = "\n...\n";

/// A job state together with diagnostic details.
///
/// Design: a snapshot. Providers build a new `JobStatus` on every poll
/// instead of mutating an old one, so there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    state: JobState,
    message: Option<String>,
    exit_code: Option<i32>,
    stdout_path: Option<PathBuf>,
    stderr_path: Option<PathBuf>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            message: None,
            exit_code: None,
            stdout_path: None,
            stderr_path: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_stdout_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_path = Some(path.into());
        self
    }

    pub fn with_stderr_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_path = Some(path.into());
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stdout_path(&self) -> Option<&Path> {
        self.stdout_path.as_deref()
    }

    pub fn stderr_path(&self) -> Option<&Path> {
        self.stderr_path.as_deref()
    }

    pub fn terminal(&self) -> bool {
        self.state.terminal()
    }

    pub fn status_name(&self) -> &'static str {
        self.state.status_name()
    }

    /// Full stdout content, or `None` when no path was recorded or it can't be read.
    pub fn stdout(&self) -> Option<String> {
        self.stdout_path.as_deref().and_then(read_log)
    }

    /// Full stderr content, or `None` when no path was recorded or it can't be read.
    pub fn stderr(&self) -> Option<String> {
        self.stderr_path.as_deref().and_then(read_log)
    }

    /// Bounded excerpt of stdout (see [`SUMMARY_TRUNCATION_THRESHOLD`]).
    pub fn stdout_summary(&self) -> Option<String> {
        self.stdout_path.as_deref().and_then(read_log_summary)
    }

    /// Bounded excerpt of stderr (see [`SUMMARY_TRUNCATION_THRESHOLD`]).
    pub fn stderr_summary(&self) -> Option<String> {
        self.stderr_path.as_deref().and_then(read_log_summary)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({})", self.state, message),
            None => write!(f, "{}", self.state),
        }
    }
}

/// ログ読み込みの失敗は None に落とす（ジョブの結果を隠さないため）。
///
/// バックエンドは出力が無いとファイル自体を作らないことがあるので、
/// NotFound もここに含まれます。
fn read_log(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            tracing::debug!(
                path = %path.display(),
                error = %err,
                "log unavailable, treating as absent"
            );
            None
        }
    }
}

/// Public helper so callers holding only a path (e.g. the CLI) get the same excerpt.
pub fn read_log_summary(path: &Path) -> Option<String> {
    match summarize(path) {
        Ok(summary) => Some(summary),
        Err(err) => {
            tracing::debug!(
                path = %path.display(),
                error = %err,
                "log summary unavailable, treating as absent"
            );
            None
        }
    }
}

fn summarize(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;

    if size <= SUMMARY_TRUNCATION_THRESHOLD {
        let mut bytes = Vec::with_capacity(size as usize);
        file.read_to_end(&mut bytes)?;
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }

    // 奇数の閾値なら切り捨て
    let half = SUMMARY_TRUNCATION_THRESHOLD / 2;
    let mut head = Vec::with_capacity(half as usize);
    (&mut file).take(half).read_to_end(&mut head)?;

    file.seek(SeekFrom::Start(size - half))?;
    let mut tail = Vec::with_capacity(half as usize);
    file.take(half).read_to_end(&mut tail)?;

    let mut summary = String::from_utf8_lossy(&head).into_owned();
    summary.push_str(SUMMARY_ELISION_MARKER);
    summary.push_str(&String::from_utf8_lossy(&tail));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn log_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[rstest]
    #[case::pending(JobState::Pending, false)]
    #[case::completed(JobState::Completed, true)]
    fn terminal_and_name_delegate_to_state(#[case] state: JobState, #[case] terminal: bool) {
        let status = JobStatus::new(state);
        assert_eq!(status.terminal(), terminal);
        assert_eq!(status.status_name(), state.status_name());
    }

    #[test]
    fn display_includes_message_when_present() {
        let plain = JobStatus::new(JobState::Running);
        let failed = JobStatus::new(JobState::Failed).with_message("node lost");

        assert_eq!(plain.to_string(), "RUNNING");
        assert_eq!(failed.to_string(), "FAILED (node lost)");
    }

    #[test]
    fn stdout_reads_full_content() {
        let file = log_file(b"hello\nworld\n");
        let status = JobStatus::new(JobState::Completed).with_stdout_path(file.path());

        assert_eq!(status.stdout().as_deref(), Some("hello\nworld\n"));
    }

    #[test]
    fn missing_path_is_absent() {
        let status = JobStatus::new(JobState::Completed);

        assert_eq!(status.stdout(), None);
        assert_eq!(status.stderr(), None);
        assert_eq!(status.stdout_summary(), None);
        assert_eq!(status.stderr_summary(), None);
    }

    #[test]
    fn missing_file_is_absent_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-created.out");
        let status = JobStatus::new(JobState::Completed)
            .with_stdout_path(&path)
            .with_stderr_path(&path);

        assert_eq!(status.stdout(), None);
        assert_eq!(status.stderr_summary(), None);
    }

    #[test]
    fn summary_at_threshold_is_unmodified() {
        let content = vec![b'a'; SUMMARY_TRUNCATION_THRESHOLD as usize];
        let file = log_file(&content);
        let status = JobStatus::new(JobState::Failed).with_stderr_path(file.path());

        let summary = status.stderr_summary().unwrap();
        assert_eq!(summary.as_bytes(), content.as_slice());
    }

    #[test]
    fn summary_above_threshold_keeps_head_and_tail() {
        let mut content = vec![b'h'; 1024];
        content.extend(vec![b'm'; 4000 - 2048]);
        content.extend(vec![b't'; 1024]);
        assert_eq!(content.len(), 4000);
        let file = log_file(&content);
        let status = JobStatus::new(JobState::Failed).with_stdout_path(file.path());

        let summary = status.stdout_summary().unwrap();
        let expected = format!(
            "{}{}{}",
            "h".repeat(1024),
            SUMMARY_ELISION_MARKER,
            "t".repeat(1024)
        );
        assert_eq!(summary, expected);
        assert!(summary.len() < content.len());
        assert!(!summary.contains('m'));
    }

    #[test]
    fn summary_of_small_file_is_full_content() {
        let file = log_file(b"short\n");
        let status = JobStatus::new(JobState::Completed).with_stdout_path(file.path());

        assert_eq!(status.stdout_summary().as_deref(), Some("short\n"));
    }
}
