mod batch;
mod merged;
mod preview;
mod review;
mod status;

pub use batch::run_batch;
pub use merged::run_merged;
pub use preview::run_preview;
pub use review::{read_prompt, run_review};
pub use status::run_status;
