//! stb - package, validate and submit task folders
//!
//! Library behind the `stb` binary. A task folder is zipped, uploaded to a
//! presigned object-storage URL, validated by the review platform and then
//! registered as a submission; the folder remembers its submission id in a
//! marker file so later runs can revise it.
//!
//! The remote side is abstracted by [`backend::RemoteBackend`], with an HTTP
//! implementation and an offline stub selected by [`config::Settings`].

pub mod archive;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod submit;
pub mod tracker;
pub mod types;

pub use error::{Error, Result};
