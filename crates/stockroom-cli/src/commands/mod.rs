pub mod add;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod failures;
pub mod list;
pub mod show;
pub mod status;
pub mod sync;
pub mod update;
pub mod watch;
