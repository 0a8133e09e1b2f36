//! Process-level helpers shared by the binary and the pipeline.

pub mod bootstrap;
pub mod retry;
