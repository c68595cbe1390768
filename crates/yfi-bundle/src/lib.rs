//! Report folder archives for yfi.
//!
//! A bundle is a ZIP of one run's report folder with a `manifest.json`
//! listing every file and its SHA-256, so a support engineer receiving the
//! archive can confirm nothing was lost or altered in transit.
//!
//! # Layout
//!
//! ```text
//! 0_archive_alice_wifi_diag_260115_143022.zip
//! ├── manifest.json
//! ├── 0_summary_260115_143022.txt
//! ├── 1_report_260115_143022.json
//! ├── 1_logs_260115_143022.log
//! ├── 2_diag_ifconfig_260115_143022.txt
//! └── dump_260115_143022.pcap
//! ```

mod error;
mod manifest;
mod reader;
mod writer;

pub use error::{BundleError, Result};
pub use manifest::{BundleManifest, FileEntry, BUNDLE_SCHEMA_VERSION, MANIFEST_FILE_NAME};
pub use reader::BundleReader;
pub use writer::BundleWriter;
