//! `toolconf` - configuration engine for a set of cooperating tool components
//!
//! The engine discovers components, derives their typed option schemas,
//! rewrites their line-oriented configuration files without disturbing
//! unrelated content, interprets change requests, validates configuration
//! state, and asks running components to reload.

pub mod change;
pub mod cli;
pub mod confile;
pub mod engine;
pub mod error;
pub mod notify;
pub mod observability;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod settings;
pub mod validate;

pub use engine::{Engine, Target};
pub use error::{Result, ToolconfError};
pub use settings::Settings;
