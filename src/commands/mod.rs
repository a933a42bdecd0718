//! Command handlers besides `check`
//!
//! - `list`: print the check catalog
//! - `templates`: validate Talos configuration templates

pub mod list;
pub mod templates;
