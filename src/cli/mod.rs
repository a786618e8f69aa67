mod args;
mod paths;

pub use args::{Cli, Commands};
pub use paths::{resolve_project_name, resolve_state_dir, resolve_workspace_root};
