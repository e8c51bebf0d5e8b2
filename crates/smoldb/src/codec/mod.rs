//! Text codec for the store file.
//!
//! The dialect is a small, line-oriented subset of YAML:
//!
//! ```text
//! "name": "smol"
//! "ports":
//!   - 80
//!   - 443
//! "owner": ~
//! ```
//!
//! Strings are always quoted, numbers and booleans are bare, nesting is two
//! spaces per level. Blank lines and `#` comments are ignored on read.

mod de;
mod decode;
mod encode;
mod node;
mod ser;
mod token;

use std::collections::HashMap;
use std::hash::BuildHasher;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use de::from_node;
pub use decode::Decoder;
pub use encode::{encode, encode_entry, encode_key, Encoder};
pub use node::{Key, Node, Scalar, EMPTY_MAP, EMPTY_SEQ, NULL};
pub use ser::to_node;
pub use token::{Token, Tokenizer};

use crate::error::{Result, ValueError};

/// Decodes store text held in memory.
pub fn from_str<K, V, S>(text: &str) -> Result<HashMap<K, V, S>>
where
    K: Key,
    V: DeserializeOwned,
    S: BuildHasher + Default,
{
    Decoder::new(text.as_bytes()).decode()
}

/// Encodes a map as store text. Same as [`encode`].
pub fn to_string<K, V, S>(map: &HashMap<K, V, S>) -> std::result::Result<String, ValueError>
where
    K: Key,
    V: Serialize,
    S: BuildHasher,
{
    encode(map)
}
