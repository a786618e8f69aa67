//! Conversational review turns: threads, runs, tool calls and replies.

pub mod context;
mod pool;
mod reply;
mod run;
mod session;
mod thread;
mod tools;

pub use pool::{ReviewPool, ReviewRequest};
pub use reply::ResponseContent;
pub use session::{ReviewContext, ReviewSession};
