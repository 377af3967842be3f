//! Deserializer that matches section keys to model fields ignoring case.
//!
//! Keys in a generation are folded to lowercase, while serde compares field
//! names exactly. Whenever a struct is bound, each table key is replaced by
//! the declared field it equals under ASCII case folding, so `Server`,
//! `server` and `SERVER` all reach a field renamed to `Server`. Scalars are
//! handed to `config::Value`, which keeps its string coercions.

use crate::core::Table;
use config::{ConfigError as ValueError, Value, ValueKind};
use serde::de::value::StringDeserializer;
use serde::de::{self, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor};

/// A `config::Value` bound with case-insensitive field matching.
pub(crate) struct FieldMatcher(pub(crate) Value);

macro_rules! forward_to_value {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
                self.0.$method(visitor)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for FieldMatcher {
    type Error = ValueError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self.0.kind {
            ValueKind::Table(table) => visitor.visit_map(TableAccess::new(table, &[])),
            ValueKind::Array(items) => visitor.visit_seq(ArrayAccess(items.into_iter())),
            kind => Value::new(None, kind).deserialize_any(visitor),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        match self.0.kind {
            ValueKind::Table(table) => visitor.visit_map(TableAccess::new(table, fields)),
            kind => Value::new(None, kind).deserialize_struct(name, fields, visitor),
        }
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self.0.kind {
            ValueKind::Table(table) => visitor.visit_map(TableAccess::new(table, &[])),
            kind => Value::new(None, kind).deserialize_map(visitor),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self.0.kind {
            ValueKind::Array(items) => visitor.visit_seq(ArrayAccess(items.into_iter())),
            kind => Value::new(None, kind).deserialize_seq(visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self.0.kind {
            ValueKind::Nil => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        self.0.deserialize_unit_struct(name, visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        self.0.deserialize_enum(name, variants, visitor)
    }

    forward_to_value! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_unit deserialize_identifier
        deserialize_ignored_any
    }
}

struct TableAccess {
    entries: std::vec::IntoIter<(String, Value)>,
    pending: Option<Value>,
}

impl TableAccess {
    fn new(table: Table, fields: &'static [&'static str]) -> Self {
        let entries: Vec<(String, Value)> = table
            .into_iter()
            .map(|(key, value)| {
                let key = fields
                    .iter()
                    .find(|field| field.eq_ignore_ascii_case(&key))
                    .map_or(key, |field| (*field).to_string());
                (key, value)
            })
            .collect();
        Self {
            entries: entries.into_iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for TableAccess {
    type Error = ValueError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, ValueError> {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                let key: StringDeserializer<ValueError> = key.into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, ValueError> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| <ValueError as de::Error>::custom("value requested before its key"))?;
        seed.deserialize(FieldMatcher(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct ArrayAccess(std::vec::IntoIter<Value>);

impl<'de> SeqAccess<'de> for ArrayAccess {
    type Error = ValueError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, ValueError> {
        self.0
            .next()
            .map(|value| seed.deserialize(FieldMatcher(value)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.0.len())
    }
}
