//! Peephole optimizer over P-code
//!
//! One left-to-right scan with a single instruction of lookahead:
//!
//! - an instruction textually equal to the next one is dropped
//! - an instruction containing `LIT 0` followed by one containing `ADD` is
//!   dropped together with it
//!
//! Both rules match on instruction text only. Two deliberate, identical
//! `PRINT`s in a row are indistinguishable from a redundant one.

use serde::Serialize;

/// Optimized code plus what was taken out, in original order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeepholeResult {
    pub code: Vec<String>,
    pub removed: Vec<String>,
}

pub fn optimize<S: AsRef<str>>(code: &[S]) -> PeepholeResult {
    let mut result = PeepholeResult::default();
    let mut i = 0;
    while i < code.len() {
        let current = code[i].as_ref();
        let next = code.get(i + 1).map(AsRef::as_ref);

        match next {
            Some(next) if current == next => {
                result.removed.push(current.to_string());
                i += 1;
            }
            Some(next) if current.contains("LIT 0") && next.contains("ADD") => {
                result.removed.push(current.to_string());
                result.removed.push(next.to_string());
                i += 2;
            }
            _ => {
                result.code.push(current.to_string());
                i += 1;
            }
        }
    }

    tracing::debug!(
        kept = result.code.len(),
        removed = result.removed.len(),
        "peephole pass finished"
    );
    result
}
