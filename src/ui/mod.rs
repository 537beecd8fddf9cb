// UI module - interactive console
//
// This module contains:
// - Console: reads commands from stdin and drives the workflow on the runtime
// - Command: parsed console commands

pub mod console;

pub use console::{Command, Console};
