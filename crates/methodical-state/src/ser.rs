//! `serde::Serializer` that builds a [`Node`] directly.
//!
//! The layout matches `serde_json::to_value` (externally tagged enums, unit
//! as `null`, newtypes unwrapped) except where JSON has no representation:
//!
//! - `NaN`, `+inf` and `-inf` become the strings `"NaN"`, `"inf"`, `"-inf"`,
//! - map keys that are not strings become their compact JSON text, so a
//!   `(1, 2)` key is stored under `"[1,2]"`.

use crate::node::{Map, Node};
use serde::ser::{self, Error as _, Serialize};
use std::sync::Arc;

type Error = serde_json::Error;

pub(crate) fn to_node<T: Serialize + ?Sized>(value: &T) -> Result<Node, Error> {
    value.serialize(NodeSerializer)
}

fn float(v: f64) -> Node {
    match serde_json::Number::from_f64(v) {
        Some(n) => Node::Number(n),
        None if v.is_nan() => Node::from("NaN"),
        None if v > 0.0 => Node::from("inf"),
        None => Node::from("-inf"),
    }
}

fn map_key(key: Node) -> String {
    match key {
        Node::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn tagged(variant: &'static str, value: Node) -> Node {
    let mut map = Map::new();
    map.insert(variant.to_owned(), value);
    Node::from(map)
}

struct NodeSerializer;

impl ser::Serializer for NodeSerializer {
    type Ok = Node;
    type Error = Error;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = Tagged<SeqBuilder>;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = Tagged<MapBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Node, Error> {
        Ok(Node::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Node, Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Node, Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Node, Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Node, Error> {
        Ok(Node::Number(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Node, Error> {
        if let Ok(v) = i64::try_from(v) {
            self.serialize_i64(v)
        } else if let Ok(v) = u64::try_from(v) {
            self.serialize_u64(v)
        } else {
            Err(Error::custom(format!("integer {v} does not fit a state number")))
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Node, Error> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Node, Error> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Node, Error> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Node, Error> {
        Ok(Node::Number(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Node, Error> {
        u64::try_from(v)
            .map_err(|_| Error::custom(format!("integer {v} does not fit a state number")))
            .and_then(|v| self.serialize_u64(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Node, Error> {
        Ok(float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Node, Error> {
        Ok(float(v))
    }

    fn serialize_char(self, v: char) -> Result<Node, Error> {
        Ok(Node::String(Arc::from(v.to_string())))
    }

    fn serialize_str(self, v: &str) -> Result<Node, Error> {
        Ok(Node::String(Arc::from(v)))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Node, Error> {
        Ok(Node::from(v.iter().map(|&b| Node::from(u32::from(b))).collect::<Vec<_>>()))
    }

    fn serialize_none(self) -> Result<Node, Error> {
        Ok(Node::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Node, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Node, Error> {
        Ok(Node::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Node, Error> {
        Ok(Node::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Node, Error> {
        Ok(Node::from(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Node, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Node, Error> {
        Ok(tagged(variant, to_node(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, Error> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Tagged<SeqBuilder>, Error> {
        Ok(Tagged {
            variant,
            inner: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, Error> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapBuilder, Error> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Tagged<MapBuilder>, Error> {
        Ok(Tagged {
            variant,
            inner: MapBuilder::default(),
        })
    }
}

struct SeqBuilder {
    items: Vec<Node>,
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.items.push(to_node(value)?);
        Ok(())
    }

    fn end(self) -> Result<Node, Error> {
        Ok(Node::from(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Node, Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Node, Error> {
        ser::SerializeSeq::end(self)
    }
}

#[derive(Default)]
struct MapBuilder {
    map: Map,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Error> {
        self.pending_key = Some(map_key(to_node(key)?));
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Error::custom("map value serialized before its key"))?;
        self.map.insert(key, to_node(value)?);
        Ok(())
    }

    fn end(self) -> Result<Node, Error> {
        Ok(Node::from(self.map))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.map.insert(key.to_owned(), to_node(value)?);
        Ok(())
    }

    fn end(self) -> Result<Node, Error> {
        Ok(Node::from(self.map))
    }
}

/// An enum variant with content, wrapped as `{variant: content}` on `end`.
struct Tagged<B> {
    variant: &'static str,
    inner: B,
}

impl ser::SerializeTupleVariant for Tagged<SeqBuilder> {
    type Ok = Node;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(&mut self.inner, value)
    }

    fn end(self) -> Result<Node, Error> {
        Ok(tagged(self.variant, ser::SerializeSeq::end(self.inner)?))
    }
}

impl ser::SerializeStructVariant for Tagged<MapBuilder> {
    type Ok = Node;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Node, Error> {
        Ok(tagged(self.variant, ser::SerializeStruct::end(self.inner)?))
    }
}
