//! Bundle writer: collects files and writes a ZIP with `manifest.json`
//! first and the rest in path order.

use crate::{BundleError, BundleManifest, FileEntry, Result, MANIFEST_FILE_NAME};
use std::fs::{self, File};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Builder for a report archive.
pub struct BundleWriter {
    manifest: BundleManifest,
    files: Vec<(String, Vec<u8>)>,
}

impl BundleWriter {
    pub fn new(run_id: impl Into<String>, diag_name: impl Into<String>) -> Self {
        Self {
            manifest: BundleManifest::new(run_id, diag_name),
            files: Vec::new(),
        }
    }

    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.manifest = self.manifest.with_tool_version(version);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.manifest = self.manifest.with_host(host);
        self
    }

    /// Add a file to the bundle.
    pub fn add_file(&mut self, path: impl Into<String>, data: Vec<u8>) {
        let path = path.into();
        let entry = FileEntry::for_data(path.clone(), &data);
        debug!(path = %path, bytes = entry.bytes, "Adding file to bundle");
        self.manifest.add_file(entry);
        self.files.push((path, data));
    }

    /// Add every regular file directly inside `dir`, skipping `exclude`.
    ///
    /// Returns the number of files added. Subdirectories are not descended.
    pub fn add_dir(&mut self, dir: &Path, exclude: Option<&Path>) -> Result<usize> {
        let mut added = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if exclude.is_some_and(|skip| skip == path) || !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| BundleError::InvalidFileName(path.clone()))?;
            if name == MANIFEST_FILE_NAME {
                continue;
            }
            self.add_file(name, fs::read(&path)?);
            added += 1;
        }
        Ok(added)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.manifest.total_bytes()
    }

    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    /// Write the bundle to a file.
    pub fn write(self, path: &Path) -> Result<BundleManifest> {
        let file = File::create(path)?;
        let (_, manifest) = self.write_into(file)?;
        info!(
            path = %path.display(),
            files = manifest.file_count(),
            bytes = manifest.total_bytes(),
            "Bundle written"
        );
        Ok(manifest)
    }

    /// Write the bundle to a byte vector.
    pub fn write_to_vec(self) -> Result<(Vec<u8>, BundleManifest)> {
        let (cursor, manifest) = self.write_into(Cursor::new(Vec::new()))?;
        Ok((cursor.into_inner(), manifest))
    }

    fn write_into<W: Write + Seek>(mut self, sink: W) -> Result<(W, BundleManifest)> {
        if self.files.is_empty() {
            return Err(BundleError::EmptyBundle);
        }

        self.manifest.sort_files();
        self.files.sort_by(|a, b| a.0.cmp(&b.0));
        let manifest_json = self.manifest.to_json()?;

        let mut zip = ZipWriter::new(sink);
        let options: FileOptions<'_, ()> = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        zip.start_file(MANIFEST_FILE_NAME, options)?;
        zip.write_all(manifest_json.as_bytes())?;

        for (file_path, data) in &self.files {
            zip.start_file(file_path.as_str(), options)?;
            zip.write_all(data)?;
        }

        let sink = zip.finish()?;
        Ok((sink, self.manifest))
    }
}
