#[macro_use]
extern crate serde_derive;

pub mod artifacts;
pub mod broadcast;
pub mod config;
pub mod deploy;
pub mod env_file;
pub mod errors;
pub mod forge;
pub mod manifest;
pub mod rpc;
pub mod wallet;

pub use alloy::primitives::utils::format_ether;
pub use alloy_signer_local::PrivateKeySigner;
pub use errors::{DeckhandError, Result};
