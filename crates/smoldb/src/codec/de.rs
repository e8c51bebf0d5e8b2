//! serde deserializer reading from [`Node`]s, and `Deserialize` for the
//! node types themselves.

use std::fmt;
use std::vec;

use serde::de::value::StringDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, Unexpected, Visitor};
use serde::forward_to_deserialize_any;

use super::node::{Node, Scalar};
use crate::error::ValueError;

/// Converts a node into any deserializable type.
pub fn from_node<T: DeserializeOwned>(node: Node) -> Result<T, ValueError> {
    T::deserialize(node)
}

impl Scalar {
    fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Scalar::Null => Unexpected::Unit,
            Scalar::Bool(b) => Unexpected::Bool(*b),
            Scalar::Int(int) => match i64::try_from(*int) {
                Ok(v) => Unexpected::Signed(v),
                Err(_) => Unexpected::Other("large integer"),
            },
            Scalar::Float(x) => Unexpected::Float(*x),
            Scalar::Str(text) => Unexpected::Str(text),
        }
    }
}

impl Node {
    fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Node::Scalar(scalar) => scalar.unexpected(),
            Node::Seq(_) => Unexpected::Seq,
            Node::Map(_) => Unexpected::Map,
        }
    }
}

fn invalid(node: &Node, expected: &str) -> ValueError {
    <ValueError as de::Error>::invalid_type(node.unexpected(), &expected)
}

fn visit_scalar<'de, V: Visitor<'de>>(scalar: Scalar, visitor: V) -> Result<V::Value, ValueError> {
    match scalar {
        Scalar::Null => visitor.visit_unit(),
        Scalar::Bool(b) => visitor.visit_bool(b),
        Scalar::Int(int) => {
            if let Ok(v) = i64::try_from(int) {
                visitor.visit_i64(v)
            } else if let Ok(v) = u64::try_from(int) {
                visitor.visit_u64(v)
            } else {
                visitor.visit_i128(int)
            }
        }
        Scalar::Float(x) => visitor.visit_f64(x),
        Scalar::Str(text) => visitor.visit_string(text),
    }
}

fn visit_seq<'de, V: Visitor<'de>>(items: Vec<Node>, visitor: V) -> Result<V::Value, ValueError> {
    let len = items.len();
    let mut reader = SeqReader {
        iter: items.into_iter(),
    };
    let value = visitor.visit_seq(&mut reader)?;
    if reader.iter.len() == 0 {
        Ok(value)
    } else {
        Err(de::Error::invalid_length(len, &"fewer elements"))
    }
}

fn visit_map<'de, V: Visitor<'de>>(
    entries: Vec<(Scalar, Node)>,
    visitor: V,
) -> Result<V::Value, ValueError> {
    let mut reader = MapReader {
        iter: entries.into_iter(),
        value: None,
    };
    visitor.visit_map(&mut reader)
}

impl<'de> de::Deserializer<'de> for Node {
    type Error = ValueError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self {
            Node::Scalar(scalar) => visit_scalar(scalar, visitor),
            Node::Seq(items) => visit_seq(items, visitor),
            Node::Map(entries) => visit_map(entries, visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self {
            Node::Scalar(Scalar::Null) => visitor.visit_none(),
            other => visitor.visit_some(other),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        match self {
            Node::Scalar(Scalar::Str(variant)) => {
                let unit: StringDeserializer<ValueError> = variant.into_deserializer();
                visitor.visit_enum(unit)
            }
            Node::Map(mut entries) if entries.len() == 1 => match entries.remove(0) {
                (Scalar::Str(variant), value) => visitor.visit_enum(EnumReader { variant, value }),
                (key, _) => Err(invalid(&Node::Scalar(key), "variant name")),
            },
            other => Err(invalid(&other, "enum variant")),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

struct SeqReader {
    iter: vec::IntoIter<Node>,
}

impl<'de> de::SeqAccess<'de> for SeqReader {
    type Error = ValueError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ValueError> {
        self.iter.next().map(|node| seed.deserialize(node)).transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapReader {
    iter: vec::IntoIter<(Scalar, Node)>,
    value: Option<Node>,
}

impl<'de> de::MapAccess<'de> for MapReader {
    type Error = ValueError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, ValueError> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(Node::Scalar(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, ValueError> {
        match self.value.take() {
            Some(value) => seed.deserialize(value),
            None => Err(de::Error::custom("map value requested before its key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumReader {
    variant: String,
    value: Node,
}

impl<'de> de::EnumAccess<'de> for EnumReader {
    type Error = ValueError;
    type Variant = VariantReader;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, VariantReader), ValueError> {
        let variant = seed.deserialize(Node::Scalar(Scalar::Str(self.variant)))?;
        Ok((variant, VariantReader { value: self.value }))
    }
}

struct VariantReader {
    value: Node,
}

impl<'de> de::VariantAccess<'de> for VariantReader {
    type Error = ValueError;

    fn unit_variant(self) -> Result<(), ValueError> {
        match self.value {
            Node::Scalar(Scalar::Null) => Ok(()),
            other => Err(invalid(&other, "unit variant")),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, ValueError> {
        seed.deserialize(self.value)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, ValueError> {
        match self.value {
            Node::Seq(items) => visit_seq(items, visitor),
            other => Err(invalid(&other, "tuple variant")),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        match self.value {
            Node::Map(entries) => visit_map(entries, visitor),
            other => Err(invalid(&other, "struct variant")),
        }
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a store value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Bool(v)))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Int(v.into())))
    }

    fn visit_i128<E>(self, v: i128) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Int(v)))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Int(v.into())))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Node, E> {
        i128::try_from(v)
            .map(|int| Node::Scalar(Scalar::Int(int)))
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Float(v)))
    }

    fn visit_str<E>(self, v: &str) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::from(v)))
    }

    fn visit_string<E>(self, v: String) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Str(v)))
    }

    fn visit_unit<E>(self) -> Result<Node, E> {
        Ok(Node::null())
    }

    fn visit_none<E>(self) -> Result<Node, E> {
        Ok(Node::null())
    }

    fn visit_some<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        de::Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Seq(items))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<Scalar, Node>()? {
            entries.push(entry);
        }
        Ok(Node::Map(entries))
    }
}

impl<'de> de::Deserialize<'de> for Node {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

impl<'de> de::Deserialize<'de> for Scalar {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match deserializer.deserialize_any(NodeVisitor)? {
            Node::Scalar(scalar) => Ok(scalar),
            other => Err(<D::Error as de::Error>::invalid_type(
                other.unexpected(),
                &"a scalar map key",
            )),
        }
    }
}
