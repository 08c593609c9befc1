//! Fuzz target for the SUTRA lexer.
//!
//! Any UTF-8 input must either tokenize or fail with a located `LexError`;
//! the lexer never panics or loops.
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use sutra_dsl::{Lexer, TokenKind};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    match Lexer::new(input).tokenize() {
        Ok(tokens) => {
            assert_eq!(
                tokens.last().map(|t| &t.kind),
                Some(&TokenKind::Eof),
                "token stream must end with Eof"
            );
            for token in &tokens {
                assert!(token.span.start <= token.span.end);
                assert!(token.span.end <= input.len());
                assert!(token.span.line >= 1);
                assert!(token.span.column >= 1);
            }
        }
        Err(err) => {
            assert!(err.line >= 1);
            assert!(err.column >= 1);
            assert!(!err.message.is_empty());
        }
    }
});
