//! Swarm commit history for a date range picked in KST.
//!
//! Two flows that share nothing at runtime:
//! - scrape: range -> commits list view -> scroll-until-stable loader -> row parser -> result table
//! - changes: credentials -> REST change list -> per-change diff -> printer

mod error;
mod macros;

pub mod config;
pub mod loader;
pub mod model;
pub mod parse;
pub mod process;
pub mod range;
pub mod request;
pub mod view;

pub use error::{Error, Result};
