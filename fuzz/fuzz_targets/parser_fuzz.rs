//! Fuzz target for the SUTRA parser.
//!
//! Parsing arbitrary input never panics, and whatever was accepted survives
//! a pretty-print and reparse unchanged.
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use sutra_dsl::{parse, pretty_print, DslError};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    match parse(input) {
        Ok(program) => {
            let printed = pretty_print(&program);
            assert_eq!(parse(&printed).ok(), Some(program), "{}", printed);
        }
        Err(DslError::Lex(err)) => {
            assert!(err.line >= 1 && err.column >= 1);
        }
        Err(DslError::Parse(err)) => {
            assert!(err.line >= 1 && err.column >= 1);
            assert!(!err.message.is_empty());
        }
    }
});
