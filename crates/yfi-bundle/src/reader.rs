//! Bundle reader: opens an archive and checks every file against the
//! manifest.

use crate::{BundleError, BundleManifest, FileEntry, Result, BUNDLE_SCHEMA_VERSION, MANIFEST_FILE_NAME};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

pub struct BundleReader<R: Read + Seek> {
    manifest: BundleManifest,
    archive: ZipArchive<R>,
    verified: HashSet<String>,
}

impl BundleReader<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl BundleReader<Cursor<Vec<u8>>> {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> BundleReader<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let manifest = Self::read_manifest(&mut archive)?;
        manifest.validate()?;

        info!(
            run_id = %manifest.run_id,
            diag_name = %manifest.diag_name,
            files = manifest.file_count(),
            "Bundle opened"
        );

        Ok(Self {
            manifest,
            archive,
            verified: HashSet::new(),
        })
    }

    fn read_manifest(archive: &mut ZipArchive<R>) -> Result<BundleManifest> {
        let mut manifest_file = archive
            .by_name(MANIFEST_FILE_NAME)
            .map_err(|_| BundleError::MissingFile(MANIFEST_FILE_NAME.to_string()))?;

        let mut json = String::new();
        manifest_file.read_to_string(&mut json)?;

        let manifest = BundleManifest::from_json(&json)?;
        if manifest.bundle_version != BUNDLE_SCHEMA_VERSION {
            warn!(
                bundle_version = %manifest.bundle_version,
                supported = %BUNDLE_SCHEMA_VERSION,
                "Bundle version mismatch"
            );
        }
        Ok(manifest)
    }

    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.manifest.files
    }

    /// Read a file without checking it against the manifest.
    pub fn read_raw(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|_| BundleError::FileNotFound(path.to_string()))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        debug!(path, bytes = data.len(), "Read file from bundle (unverified)");
        Ok(data)
    }

    /// Read a file and check its SHA-256 against the manifest.
    pub fn read_verified(&mut self, path: &str) -> Result<Vec<u8>> {
        let expected = self
            .manifest
            .find_file(path)
            .ok_or_else(|| BundleError::FileNotFound(path.to_string()))?
            .sha256
            .clone();

        let data = self.read_raw(path)?;
        let actual = FileEntry::compute_checksum(&data);
        if actual != expected {
            return Err(BundleError::ChecksumMismatch {
                path: path.to_string(),
                expected,
                actual,
            });
        }

        self.verified.insert(path.to_string());
        Ok(data)
    }

    pub fn is_verified(&self, path: &str) -> bool {
        self.verified.contains(path)
    }

    /// Verify every manifest entry. Returns the paths that failed.
    pub fn verify_all(&mut self) -> Vec<String> {
        let paths: Vec<String> = self.manifest.files.iter().map(|f| f.path.clone()).collect();
        let mut failures = Vec::new();

        for path in paths {
            if let Err(e) = self.read_verified(&path) {
                warn!(path = %path, error = %e, "Verification failed");
                failures.push(path);
            }
        }

        if failures.is_empty() {
            info!("All files verified");
        } else {
            warn!(failures = ?failures, "Some files failed verification");
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BundleWriter;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn sample_bytes() -> Vec<u8> {
        let mut writer = BundleWriter::new("run-1", "alice_wifi_diag_260115_143022");
        writer.add_file("0_summary.txt", b"Your score: 50%".to_vec());
        writer.add_file("1_report.json", br#"{"score":50}"#.to_vec());
        writer.write_to_vec().unwrap().0
    }

    #[test]
    fn test_open_and_verify() {
        let mut reader = BundleReader::from_bytes(sample_bytes()).unwrap();
        assert_eq!(reader.manifest().diag_name, "alice_wifi_diag_260115_143022");
        assert_eq!(reader.files().len(), 2);
        assert!(reader.verify_all().is_empty());
        assert!(reader.is_verified("0_summary.txt"));
        assert_eq!(reader.read_verified("1_report.json").unwrap(), br#"{"score":50}"#);
    }

    #[test]
    fn test_unknown_file() {
        let mut reader = BundleReader::from_bytes(sample_bytes()).unwrap();
        assert!(matches!(
            reader.read_verified("nope.txt"),
            Err(BundleError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_missing_manifest() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            zip.start_file("a.txt", FileOptions::<'_, ()>::default()).unwrap();
            zip.write_all(b"a").unwrap();
            zip.finish().unwrap();
        }
        assert!(matches!(
            BundleReader::from_bytes(buffer.into_inner()),
            Err(BundleError::MissingFile(_))
        ));
    }

    #[test]
    fn test_tampered_file_fails_verification() {
        let mut manifest = BundleManifest::new("run-1", "diag");
        manifest.add_file(FileEntry::for_data("a.txt", b"original"));

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options = FileOptions::<'_, ()>::default();
            zip.start_file(MANIFEST_FILE_NAME, options).unwrap();
            zip.write_all(manifest.to_json().unwrap().as_bytes()).unwrap();
            zip.start_file("a.txt", options).unwrap();
            zip.write_all(b"tampered").unwrap();
            zip.finish().unwrap();
        }

        let mut reader = BundleReader::from_bytes(buffer.into_inner()).unwrap();
        assert!(matches!(
            reader.read_verified("a.txt"),
            Err(BundleError::ChecksumMismatch { .. })
        ));
        assert_eq!(reader.verify_all(), vec!["a.txt".to_string()]);
        assert!(!reader.is_verified("a.txt"));
    }
}
