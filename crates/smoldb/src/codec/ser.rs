//! serde serializer producing [`Node`]s.
//!
//! Mapping of the serde data model:
//!
//! - `()`, unit structs and `None` become `~`; `Some(x)` becomes `x`, so
//!   `Some(None)` and `None` are indistinguishable once stored
//! - integers up to `i128` and `u64` are bare integers; `u128` beyond `i128`
//!   is rejected
//! - strings and chars are quoted; bytes are a sequence of integers
//! - unit variants are their name; other variants are a one-entry mapping
//!   from the name to the payload
//! - map keys must serialize to a scalar

use serde::ser::{self, Serialize};

use super::node::{Node, Scalar};
use crate::error::ValueError;

/// Converts a serializable value into a node.
pub fn to_node<T: Serialize + ?Sized>(value: &T) -> Result<Node, ValueError> {
    value.serialize(NodeSerializer)
}

fn scalar(scalar: Scalar) -> Result<Node, ValueError> {
    Ok(Node::Scalar(scalar))
}

fn key_scalar(node: Node) -> Result<Scalar, ValueError> {
    match node {
        Node::Scalar(scalar) => Ok(scalar),
        other => Err(ValueError::new(format!(
            "map key must be a scalar, found {}",
            other.describe()
        ))),
    }
}

struct NodeSerializer;

impl ser::Serializer for NodeSerializer {
    type Ok = Node;
    type Error = ValueError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantBuilder<SeqBuilder>;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantBuilder<MapBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Node, ValueError> {
        scalar(Scalar::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Node, ValueError> {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Node, ValueError> {
        let int = i128::try_from(v)
            .map_err(|_| ValueError::new(format!("integer {} out of range", v)))?;
        scalar(Scalar::Int(int))
    }

    fn serialize_f32(self, v: f32) -> Result<Node, ValueError> {
        // Widen through the shortest decimal so 0.1f32 is stored as 0.1.
        let wide = v.to_string().parse().unwrap_or(f64::from(v));
        scalar(Scalar::Float(wide))
    }

    fn serialize_f64(self, v: f64) -> Result<Node, ValueError> {
        scalar(Scalar::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Node, ValueError> {
        scalar(Scalar::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Node, ValueError> {
        scalar(Scalar::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Node, ValueError> {
        Ok(Node::Seq(
            v.iter().map(|&b| Node::Scalar(Scalar::Int(b.into()))).collect(),
        ))
    }

    fn serialize_none(self) -> Result<Node, ValueError> {
        Ok(Node::null())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Node, ValueError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Node, ValueError> {
        Ok(Node::null())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Node, ValueError> {
        Ok(Node::null())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Node, ValueError> {
        scalar(Scalar::from(variant))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Node, ValueError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Node, ValueError> {
        Ok(Node::Map(vec![(Scalar::from(variant), to_node(value)?)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, ValueError> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, ValueError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, ValueError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<SeqBuilder>, ValueError> {
        Ok(VariantBuilder {
            variant,
            inner: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, ValueError> {
        Ok(MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, ValueError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<MapBuilder>, ValueError> {
        Ok(VariantBuilder {
            variant,
            inner: self.serialize_map(Some(len))?,
        })
    }
}

struct SeqBuilder {
    items: Vec<Node>,
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ValueError> {
        self.items.push(to_node(value)?);
        Ok(())
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Seq(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ValueError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Node, ValueError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ValueError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Node, ValueError> {
        ser::SerializeSeq::end(self)
    }
}

struct MapBuilder {
    entries: Vec<(Scalar, Node)>,
    next_key: Option<Scalar>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), ValueError> {
        self.next_key = Some(key_scalar(to_node(key)?)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ValueError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| ValueError::new("map value serialized before its key"))?;
        self.entries.push((key, to_node(value)?));
        Ok(())
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Map(self.entries))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ValueError> {
        self.entries.push((Scalar::from(key), to_node(value)?));
        Ok(())
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Node::Map(self.entries))
    }
}

/// Payload of a tuple or struct variant, wrapped as `{variant: payload}`.
struct VariantBuilder<B> {
    variant: &'static str,
    inner: B,
}

impl<B> VariantBuilder<B> {
    fn wrap(variant: &'static str, payload: Node) -> Node {
        Node::Map(vec![(Scalar::from(variant), payload)])
    }
}

impl ser::SerializeTupleVariant for VariantBuilder<SeqBuilder> {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ValueError> {
        ser::SerializeSeq::serialize_element(&mut self.inner, value)
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Self::wrap(self.variant, Node::Seq(self.inner.items)))
    }
}

impl ser::SerializeStructVariant for VariantBuilder<MapBuilder> {
    type Ok = Node;
    type Error = ValueError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ValueError> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Node, ValueError> {
        Ok(Self::wrap(self.variant, Node::Map(self.inner.entries)))
    }
}

impl Serialize for Scalar {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(int) => {
                if let Ok(v) = i64::try_from(*int) {
                    serializer.serialize_i64(v)
                } else if let Ok(v) = u64::try_from(*int) {
                    serializer.serialize_u64(v)
                } else {
                    serializer.serialize_i128(*int)
                }
            }
            Scalar::Float(x) => serializer.serialize_f64(*x),
            Scalar::Str(text) => serializer.serialize_str(text),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Scalar(scalar) => scalar.serialize(serializer),
            Node::Seq(items) => serializer.collect_seq(items),
            Node::Map(entries) => serializer.collect_map(entries.iter().map(|(k, v)| (k, v))),
        }
    }
}
