//! Client for CozoDB.
//!
//! A [`Client`] either embeds an engine in this process through an [`EmbeddedEngine`]
//! binding or talks to a remote server over HTTP. Both give the same results and the same
//! errors.

pub mod client;
pub mod config;
pub mod daemon;
pub mod embedded;
pub mod error;
pub mod remote;
pub mod reply;
#[cfg(feature = "table")]
pub mod table;

pub use client::{Client, Output};
pub use config::{ClientConfig, RemoteOptions};
pub use embedded::{EmbeddedEngine, EmbeddedHandle, EngineOpener, NativeOpener};
pub use error::{Error, Failure, Result};
pub use reply::{NamedRows, Params, Relations};
