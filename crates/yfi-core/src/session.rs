//! Run session: the report folder and the names of the files inside it.
//!
//! Layout of one run under the output root:
//!
//! ```text
//! /var/tmp/yfi_reports/
//! └── alice_wifi_diag_260115_143022/
//!     ├── 0_summary_260115_143022.txt
//!     ├── 0_archive_alice_wifi_diag_260115_143022.zip
//!     ├── 1_report_260115_143022.json
//!     ├── 1_markdown_260115_143022.md
//!     ├── 1_logs_260115_143022.log
//!     ├── 2_diag_<filename>_<stamp>.txt
//!     ├── 3_test_<filename>_<token>_<stamp>.txt
//!     └── dump_260115_143022.pcap
//! ```

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use yfi_common::{DiagName, RunStamp};

use crate::capabilities::HostFacts;
use crate::collect::CommandRunner;
use crate::logging::event_names;

/// Where report folders go unless `--output-root` says otherwise.
pub const DEFAULT_OUTPUT_ROOT: &str = "/var/tmp/yfi_reports";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot create output root {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create report folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub fn path(&self) -> &Path {
        match self {
            SessionError::CreateRoot { path, .. } | SessionError::CreateFolder { path, .. } => path,
        }
    }

    pub fn io_error(&self) -> &io::Error {
        match self {
            SessionError::CreateRoot { source, .. } | SessionError::CreateFolder { source, .. } => {
                source
            }
        }
    }
}

/// One run's report folder.
#[derive(Debug, Clone)]
pub struct RunSession {
    pub started_at: DateTime<Local>,
    pub stamp: RunStamp,
    pub diag_name: DiagName,
    pub root: PathBuf,
    pub dir: PathBuf,
}

impl RunSession {
    /// Name and create `<root>/<diag name>`.
    ///
    /// The root may already exist; the run folder must not.
    pub fn create(
        root: &Path,
        host: &HostFacts,
        started_at: DateTime<Local>,
    ) -> Result<Self, SessionError> {
        let stamp = RunStamp::from_datetime(&started_at);
        let diag_name = DiagName::new(&host.username, host.is_root(), &stamp);

        fs::create_dir_all(root).map_err(|source| SessionError::CreateRoot {
            path: root.to_path_buf(),
            source,
        })?;
        let dir = root.join(diag_name.as_str());
        fs::create_dir(&dir).map_err(|source| SessionError::CreateFolder {
            path: dir.clone(),
            source,
        })?;

        info!(
            event = event_names::SESSION_CREATED,
            dir = %dir.display(),
            diag_name = %diag_name,
            "report folder created"
        );

        Ok(RunSession {
            started_at,
            stamp,
            diag_name,
            root: root.to_path_buf(),
            dir,
        })
    }

    /// Hand the output root to the login user when running under sudo.
    /// Failure is logged and otherwise ignored.
    pub fn ensure_ownership(&self, runner: &dyn CommandRunner, username: &str) {
        info!(root = %self.root.display(), "ensuring ownership of the output root");
        let command = format!("chown {} {}", username, self.root.display());
        let outcome = runner.run(&command, Duration::from_secs(5));
        if !outcome.status.is_ok() {
            warn!(command = %command, status = %outcome.status, "could not change ownership");
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(format!("1_logs_{}.log", self.stamp))
    }

    pub fn pcap_path(&self) -> PathBuf {
        self.dir.join(format!("dump_{}.pcap", self.stamp))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(format!("0_archive_{}.zip", self.diag_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::OutcomeStatus;
    use crate::mock_runner::ScriptedRunner;
    use chrono::TimeZone;

    fn host(started_by: &str) -> HostFacts {
        HostFacts {
            started_by: started_by.to_string(),
            username: "alice".to_string(),
            os_type: "linux".to_string(),
            adapter: "wlan0".to_string(),
        }
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 15, 14, 30, 22).unwrap()
    }

    #[test]
    fn test_create_privileged_session() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("reports");
        let session = RunSession::create(&root, &host("root"), at()).unwrap();

        assert_eq!(session.diag_name.as_str(), "alice_wifi_diag_260115_143022");
        assert!(session.dir.is_dir());
        assert_eq!(session.dir, root.join("alice_wifi_diag_260115_143022"));
        assert!(session.log_path().ends_with("1_logs_260115_143022.log"));
        assert!(session.pcap_path().ends_with("dump_260115_143022.pcap"));
        assert!(session
            .archive_path()
            .ends_with("0_archive_alice_wifi_diag_260115_143022.zip"));
    }

    #[test]
    fn test_unprivileged_session_is_basic() {
        let tmp = tempfile::tempdir().unwrap();
        let session = RunSession::create(tmp.path(), &host("alice"), at()).unwrap();
        assert_eq!(
            session.diag_name.as_str(),
            "alice_basic_wifi_diag_260115_143022"
        );
    }

    #[test]
    fn test_existing_run_folder_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        RunSession::create(tmp.path(), &host("root"), at()).unwrap();
        let err = RunSession::create(tmp.path(), &host("root"), at()).unwrap_err();
        assert!(matches!(err, SessionError::CreateFolder { .. }));
        assert_eq!(err.io_error().kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_ownership_runs_chown_on_root() {
        let tmp = tempfile::tempdir().unwrap();
        let session = RunSession::create(tmp.path(), &host("root"), at()).unwrap();
        let runner = ScriptedRunner::new().respond("chown", OutcomeStatus::NotOk, "");
        session.ensure_ownership(&runner, "alice");
        assert_eq!(
            runner.calls(),
            [format!("chown alice {}", tmp.path().display())]
        );
    }
}
