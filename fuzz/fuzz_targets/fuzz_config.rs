//! Fuzz target for config.json parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yfi_config::{validate_config, Config};

fuzz_target!(|data: &[u8]| {
    // Parsing and validation should only ever return errors
    if let Ok(config) = serde_json::from_slice::<Config>(data) {
        let _ = validate_config(&config);
    }
});
