//! Fuzz target for fact extraction.
//!
//! Command output is arbitrary bytes from whatever the host prints, and
//! patterns come from user configuration.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use yfi_core::collect::PatternSet;

#[derive(Debug, Arbitrary)]
struct Input {
    patterns: Vec<String>,
    output: String,
}

fuzz_target!(|input: Input| {
    if let Ok(set) = PatternSet::compile(input.patterns.iter().take(8)) {
        let lines = set.matches(&input.output);
        assert_eq!(set.extract(&input.output), lines.join("\n"));
    }
});
