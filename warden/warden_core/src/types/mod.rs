//! Data structures shared by the registry crates.

pub mod principal;

pub use principal::{attributes, Attributes, Principal};
