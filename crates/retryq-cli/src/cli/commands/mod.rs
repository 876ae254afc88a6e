//! CLI command handlers. Each command is in its own file.

mod clear;
mod drain;
mod enqueue;
mod remove;
mod send;
mod status;

pub use clear::run_clear;
pub use drain::run_drain;
pub use enqueue::run_enqueue;
pub use remove::run_remove;
pub use send::run_send;
pub use status::run_status;
