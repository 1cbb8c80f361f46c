//! Running the packaging and publishing tools.

pub mod command;
pub mod runner;

pub use command::ToolCommand;
pub use runner::{ProcessOutput, ProcessRunner, SystemRunner};
