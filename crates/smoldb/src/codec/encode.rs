//! Encoder: typed values to store text.
//!
//! Rendering is deterministic. Maps are written in key order, so two stores
//! holding the same entries produce identical files.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::fmt::Write as _;
use std::io::Write;

use serde::Serialize;

use super::node::{Key, Node, Scalar, EMPTY_MAP, EMPTY_SEQ};
use super::ser::to_node;
use crate::error::{Result, ValueError};

/// Spaces added per nesting level.
const INDENT: usize = 2;

/// Streams entries to a writer, one top-level entry at a time.
pub struct Encoder<W> {
    writer: W,
    buf: String,
}

impl<W: Write> Encoder<W> {
    /// Creates an encoder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: String::new(),
        }
    }

    /// Writes every entry of `map`, sorted by key. Nothing is written if a
    /// value fails to convert.
    pub fn encode<K, V, S>(&mut self, map: &HashMap<K, V, S>) -> Result<()>
    where
        K: Key,
        V: Serialize,
        S: BuildHasher,
    {
        self.buf = encode(map)?;
        self.writer.write_all(self.buf.as_bytes())?;
        Ok(())
    }

    /// Writes a single `key: value` entry.
    pub fn encode_entry<K: Key, V: Serialize + ?Sized>(&mut self, key: &K, value: &V) -> Result<()> {
        let node = to_node(value)?;
        self.buf.clear();
        write_entry(&mut self.buf, 0, &key.to_scalar(), &node);
        self.writer.write_all(self.buf.as_bytes())?;
        Ok(())
    }

    /// Writes a bare value with no key, as a top-level block.
    pub fn encode_node(&mut self, node: &Node) -> Result<()> {
        self.buf.clear();
        write_node(&mut self.buf, 0, node);
        self.writer.write_all(self.buf.as_bytes())?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Renders the exact text every entry for `key` starts with.
///
/// The tombstone search uses this as a line prefix, so it must match what
/// [`encode_entry`] writes byte for byte.
pub fn encode_key<K: Key>(key: &K) -> String {
    format!("{}:", key.to_scalar())
}

/// Renders one entry, including its trailing newline.
pub fn encode_entry<K: Key, V: Serialize + ?Sized>(
    key: &K,
    value: &V,
) -> std::result::Result<String, ValueError> {
    let node = to_node(value)?;
    let mut out = String::new();
    write_entry(&mut out, 0, &key.to_scalar(), &node);
    Ok(out)
}

/// Renders a whole map, sorted by key.
pub fn encode<K, V, S>(map: &HashMap<K, V, S>) -> std::result::Result<String, ValueError>
where
    K: Key,
    V: Serialize,
    S: BuildHasher,
{
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (key, value) in entries {
        write_entry(&mut out, 0, &key.to_scalar(), &to_node(value)?);
    }
    Ok(out)
}

fn write_entry(out: &mut String, indent: usize, key: &Scalar, node: &Node) {
    pad(out, indent);
    write_scalar(out, key);
    out.push(':');
    write_tail(out, indent, node);
}

fn write_item(out: &mut String, indent: usize, node: &Node) {
    pad(out, indent);
    out.push('-');
    write_tail(out, indent, node);
}

/// Everything after `key:` or `-`: an inline scalar, an empty marker, or a
/// line break followed by a nested block.
fn write_tail(out: &mut String, indent: usize, node: &Node) {
    match node {
        Node::Scalar(scalar) => {
            out.push(' ');
            write_scalar(out, scalar);
            out.push('\n');
        }
        Node::Seq(items) if items.is_empty() => {
            out.push(' ');
            out.push_str(EMPTY_SEQ);
            out.push('\n');
        }
        Node::Map(entries) if entries.is_empty() => {
            out.push(' ');
            out.push_str(EMPTY_MAP);
            out.push('\n');
        }
        block => {
            out.push('\n');
            write_node(out, indent + INDENT, block);
        }
    }
}

fn write_node(out: &mut String, indent: usize, node: &Node) {
    match node {
        Node::Seq(items) if !items.is_empty() => {
            for item in items {
                write_item(out, indent, item);
            }
        }
        Node::Map(entries) if !entries.is_empty() => {
            for (key, value) in entries {
                write_entry(out, indent, key, value);
            }
        }
        Node::Scalar(scalar) => {
            pad(out, indent);
            write_scalar(out, scalar);
            out.push('\n');
        }
        Node::Seq(_) => {
            pad(out, indent);
            out.push_str(EMPTY_SEQ);
            out.push('\n');
        }
        Node::Map(_) => {
            pad(out, indent);
            out.push_str(EMPTY_MAP);
            out.push('\n');
        }
    }
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

fn write_scalar(out: &mut String, scalar: &Scalar) {
    let _ = write!(out, "{}", scalar);
}
