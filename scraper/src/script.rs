//! A small interpreter for the JavaScript subset that gate pages use to compute their redirect.
//!
//! Scripts run against a private global scope holding only pure intrinsics (string and number
//! helpers, `eval`, `setTimeout`). Nothing reachable from a script touches the host: there is no
//! DOM, filesystem, network, clock or randomness. Every run is bounded by a wall-clock deadline,
//! a step ceiling, a call-depth ceiling and a memory budget.

mod ast;
mod interpreter;
mod lexer;
mod parser;
mod value;

use std::time::Duration;

pub use crate::script::interpreter::Sandbox;
pub use crate::script::value::Value;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScriptError {
    #[error("Syntax error at offset {pos}: {message}")]
    Syntax { pos: usize, message: String },
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("Script exceeded the step limit of {0}")]
    StepLimit(u64),
    #[error("Script exceeded the time limit of {0:?}")]
    Timeout(Duration),
    #[error("Script exceeded the call depth limit of {0}")]
    DepthLimit(usize),
    #[error("Script exceeded the nesting limit of {0} frames")]
    NestingLimit(usize),
    #[error("Script exceeded the memory limit of {0} bytes")]
    MemoryLimit(usize),
}

#[derive(Copy, Clone, Debug)]
pub struct Limits {
    pub timeout: Duration,
    pub max_steps: u64,
    pub max_depth: usize,
    /// Longest string, in bytes, a script may build.
    pub max_string_len: usize,
    /// Total bytes a run may allocate for strings, arrays, objects, closures and timers. Nothing is credited back
    /// when values are dropped.
    pub max_heap_bytes: usize,
}

impl Limits {
    pub fn with_timeout(timeout: Duration) -> Limits {
        Limits { timeout, ..Limits::default() }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            timeout: Duration::from_secs(2),
            max_steps: 5_000_000,
            max_depth: 256,
            max_string_len: 1 << 20,
            max_heap_bytes: 64 << 20,
        }
    }
}
