//! Archive a real report folder and read it back from disk.

use std::fs;
use tempfile::TempDir;
use yfi_bundle::{BundleReader, BundleWriter, BUNDLE_SCHEMA_VERSION, MANIFEST_FILE_NAME};

fn report_folder() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let files: [(&str, &[u8]); 5] = [
        ("0_summary_260115_143022.txt", b"Your score: 75%\n3/4 tests passed\n"),
        ("1_report_260115_143022.json", br#"{"score":{"score":75}}"#),
        ("1_logs_260115_143022.log", b"{\"event\":\"run_started\"}\n"),
        ("2_diag_ifconfig_260115_143022.txt", b"en0: flags=8863<UP>\n"),
        ("dump_260115_143022.pcap", &[0xd4, 0xc3, 0xb2, 0xa1, 0x02, 0x00]),
    ];
    for (name, data) in files {
        fs::write(dir.path().join(name), data).expect("write fixture");
    }
    dir
}

#[test]
fn test_folder_round_trip_verifies() {
    let dir = report_folder();
    let archive = dir.path().join("0_archive_alice_wifi_diag_260115_143022.zip");

    let mut writer = BundleWriter::new("run-0123456789ab", "alice_wifi_diag_260115_143022")
        .with_tool_version("1.5.0");
    assert_eq!(writer.add_dir(dir.path(), Some(&archive)).expect("add dir"), 5);
    let written = writer.write(&archive).expect("write archive");

    let mut reader = BundleReader::open(&archive).expect("open archive");
    let manifest = reader.manifest().clone();
    assert_eq!(manifest.bundle_version, BUNDLE_SCHEMA_VERSION);
    assert_eq!(manifest.run_id, "run-0123456789ab");
    assert_eq!(manifest.files, written.files);
    assert!(manifest.find_file(MANIFEST_FILE_NAME).is_none());
    assert!(reader.verify_all().is_empty());

    let pcap = reader.read_verified("dump_260115_143022.pcap").expect("pcap");
    assert_eq!(pcap[..4], [0xd4, 0xc3, 0xb2, 0xa1]);
}

#[test]
fn test_rearchiving_excludes_previous_archive() {
    let dir = report_folder();
    let archive = dir.path().join("0_archive.zip");

    let mut first = BundleWriter::new("run-1", "diag");
    first.add_dir(dir.path(), Some(&archive)).expect("add dir");
    first.write(&archive).expect("write");

    let mut second = BundleWriter::new("run-1", "diag");
    assert_eq!(second.add_dir(dir.path(), Some(&archive)).expect("add dir"), 5);
}

#[test]
fn test_open_rejects_non_zip() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("not.zip");
    fs::write(&path, "plain text").expect("write");
    assert!(BundleReader::open(&path).is_err());
}
