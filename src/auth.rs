//! Client identity, access tokens, the credential exchange, and the coalescing token cache.

pub mod cache;
pub mod client;
pub mod credentials;
pub mod id;
pub mod token;

pub use cache::*;
pub use client::*;
pub use credentials::*;
pub use id::*;
pub use token::{secret::*, *};
