//! # Bootbin Core Library
//!
//! This crate contains the logic behind the `bootbin` tool: making sure an external
//! command-line tool can be run before a workflow that needs it starts.
//!
//! A tool found on the executable search path is used as-is. When it is missing, a
//! pinned, platform-appropriate build is downloaded, verified and installed into a
//! well-known cache directory under the user's home, and that path is returned.
//!
//! ## Modules Overview
//! - [`tool`] – The tool descriptor ([`ToolSpec`]) and its TOML form
//! - [`lookup`] – Searching the executable search path
//! - [`resolver`] – Search first, bootstrap second ([`BootstrapResolver`])
//! - [`installer`] – The fetch-and-install capability and its HTTP implementation
//! - [`cancel`] – Abort flag and deadline for installs
//! - [`error`] – Errors surfaced to callers
//! - [`registry`] – Built-in tool descriptors
//! - [`util`] – Platform naming, checksums, archive extraction
//! - [`global`] – User base directory and the per-cache-root download cache


pub mod tool;
pub mod lookup;
pub mod resolver;
pub mod installer;
pub mod cancel;
pub mod error;
pub mod registry;
pub mod util;
pub mod global;

pub use tool::*;
pub use lookup::*;
pub use resolver::*;
pub use installer::*;
pub use cancel::*;
pub use error::*;
pub use registry::*;
pub use global::utils::*;
