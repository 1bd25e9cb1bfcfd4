//! Stage commands behind the `bsc` binary.

pub mod commands;
pub mod output;
pub mod paths;
