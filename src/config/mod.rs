// src/config/mod.rs
// Configuration: environment credentials and profile resolution

pub mod env;
pub mod profiles;

pub use env::{ApiKeys, EnvConfig};
pub use profiles::{ProfileError, ProfileStore, ResolvedProfile};
