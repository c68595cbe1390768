//! Fuzz target for report archive reading.
//!
//! Archives are handed around between people, so `bundle verify` must
//! reject anything malformed without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yfi_bundle::BundleReader;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut reader) = BundleReader::from_bytes(data.to_vec()) {
        let _ = reader.verify_all();
    }
});
