//! Tabula Control library - command implementations behind the CLI

pub mod commands;
pub mod output;
