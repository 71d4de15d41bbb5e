//! CLI commands
//!
//! Command implementations for the `stb` binary.

mod auth;
mod list;
mod progress;
mod style;
mod submit;

pub use auth::{AuthAction, run_auth};
pub use list::run_list;
pub use style::Stylize;
pub use submit::{SubmitAction, run_submit};
