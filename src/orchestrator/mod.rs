//! Application-level orchestration.
//!
//! Owns the runner and routes observer commands (start/cancel/fault/quit) to
//! it. UI/CLI layers call into this module to keep responsibilities separated.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
