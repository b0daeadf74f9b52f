//! Trellis CLI library
//!
//! Argument parsing and command implementations for the `trellis` binary.
//! Every command works against a JSON graph snapshot loaded into the
//! in-memory backend.

pub mod cli;
pub mod commands;
pub mod logging;
