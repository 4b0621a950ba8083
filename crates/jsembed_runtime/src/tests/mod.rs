//! Tests for the jsembed runtime extension
//!
//! Unit tests cover the Rust side (native module registry, module resolution,
//! timer bookkeeping); integration tests spin up a JavaScript runtime with the
//! extension installed and exercise the script-visible API.
