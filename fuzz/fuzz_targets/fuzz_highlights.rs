//! Fuzz target for the built-in highlight rules.
//!
//! Runs every preset's rules over an arbitrary narrative. Rules must never
//! panic, whatever the collected output looked like.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yfi_config::{get_preset, PresetName};
use yfi_core::report::{compile_rules, highlight_lines, ScoreTally};

fuzz_target!(|data: &[u8]| {
    let Ok(narrative) = std::str::from_utf8(data) else {
        return;
    };
    for name in PresetName::ALL {
        if let Ok(rules) = compile_rules(&get_preset(*name).highlights) {
            let _ = highlight_lines(&rules, narrative);
        }
    }
    let tally = ScoreTally::from_narrative(narrative);
    assert!(tally.score.percent().is_none_or(|p| p <= 100));
});
