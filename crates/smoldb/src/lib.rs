//! # smoldb
//!
//! Embedded key-value store persisted to a single human-readable text file.
//!
//! - One `RwLock` per store; every mutation is on disk before it returns
//! - New keys are appended, deletes blank their lines in place, and the file
//!   is compacted once dead space builds up
//! - Optional per-key time-to-live with race-free expiration
//! - Values are any `serde` type; [`Node`] holds them untyped
//!
//! ```no_run
//! use std::time::Duration;
//! use smoldb::Store;
//!
//! # fn main() -> smoldb::Result<()> {
//! let store: Store<String, Vec<u32>> = Store::open("db.txt")?
//!     .with_ttl(Duration::from_secs(60));
//! store.set("ports".to_string(), vec![80, 443])?;
//! assert_eq!(store.get(&"ports".to_string())?, vec![80, 443]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod config;
mod error;
mod expiry;
pub mod stats;
mod storage;

pub use codec::{encode_key, from_node, to_node, Decoder, Encoder, Key, Node, Scalar, Token, Tokenizer};
pub use config::Options;
pub use error::{Error, FormatError, Result, ValueError};
pub use stats::Stats;
pub use storage::Store;
