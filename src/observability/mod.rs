//! Observability
//!
//! Diagnostic logging for `toolconf`. Records meant for the caller go to
//! stdout; everything here goes to stderr.

pub mod logging;

pub use logging::{LogFormat, init_logging};
