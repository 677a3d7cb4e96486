//! I/O adapters: filesystem, git, and child processes.

pub mod assets;
pub mod config;
pub mod git;
pub mod history_store;
pub mod process;
pub mod repo_context;
pub mod workspace;
