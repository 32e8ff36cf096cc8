//! Flattening of composite values into leaf property entries.
//!
//! A [`serde::Serializer`] that walks any serializable value and emits
//! `(key, string)` leaves:
//! - map members become `key.member`
//! - sequence, tuple and byte-string elements become `key[i]`
//! - scalars are rendered in their canonical string form
//!
//! Records (structs, tuple structs, data-carrying enum variants) are
//! rejected: a property holds values, not objects.

use std::fmt;

use serde::Serialize;
use serde::ser::{self, Impossible};

use crate::error::{Result, TarkibError};

/// Flattens `value` under `key` into leaf entries.
pub(crate) fn flatten<V: Serialize + ?Sized>(key: &str, value: &V) -> Result<Vec<(String, String)>> {
    let mut leaves = Vec::new();
    value
        .serialize(Flattener {
            key: key.to_string(),
            leaves: &mut leaves,
        })
        .map_err(FlattenError::into_tarkib)?;
    Ok(leaves)
}

#[derive(Debug)]
pub(crate) struct FlattenError {
    key: String,
    value: String,
    reason: String,
}

impl FlattenError {
    fn record(key: String, what: String) -> Self {
        Self {
            key,
            value: what,
            reason: "records cannot be stored as a property, set their fields individually".to_string(),
        }
    }

    fn map_key(what: &str) -> Self {
        Self {
            key: String::new(),
            value: what.to_string(),
            reason: "map key cannot be converted to a string".to_string(),
        }
    }

    fn into_tarkib(self) -> TarkibError {
        TarkibError::conversion(self.key, self.value, "string", self.reason)
    }
}

impl fmt::Display for FlattenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.key, self.value, self.reason)
    }
}

impl std::error::Error for FlattenError {}

impl ser::Error for FlattenError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self {
            key: String::new(),
            value: String::new(),
            reason: msg.to_string(),
        }
    }
}

struct Flattener<'a> {
    key: String,
    leaves: &'a mut Vec<(String, String)>,
}

impl Flattener<'_> {
    fn leaf(self, value: impl ToString) -> std::result::Result<(), FlattenError> {
        self.leaves.push((self.key, value.to_string()));
        Ok(())
    }
}

impl<'a> ser::Serializer for Flattener<'a> {
    type Ok = ();
    type Error = FlattenError;
    type SerializeSeq = SeqFlattener<'a>;
    type SerializeTuple = SeqFlattener<'a>;
    type SerializeTupleStruct = Impossible<(), FlattenError>;
    type SerializeTupleVariant = Impossible<(), FlattenError>;
    type SerializeMap = MapFlattener<'a>;
    type SerializeStruct = Impossible<(), FlattenError>;
    type SerializeStructVariant = Impossible<(), FlattenError>;

    fn serialize_bool(self, v: bool) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_i8(self, v: i8) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_i16(self, v: i16) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_i32(self, v: i32) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_i64(self, v: i64) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_i128(self, v: i128) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_u8(self, v: u8) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_u16(self, v: u16) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_u32(self, v: u32) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_u64(self, v: u64) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_u128(self, v: u128) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_char(self, v: char) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_str(self, v: &str) -> std::result::Result<(), FlattenError> {
        self.leaf(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> std::result::Result<(), FlattenError> {
        for (index, byte) in v.iter().enumerate() {
            self.leaves.push((format!("{}[{}]", self.key, index), byte.to_string()));
        }
        Ok(())
    }

    fn serialize_none(self) -> std::result::Result<(), FlattenError> {
        self.leaf("")
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> std::result::Result<(), FlattenError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> std::result::Result<(), FlattenError> {
        self.leaf("")
    }

    fn serialize_unit_struct(self, name: &'static str) -> std::result::Result<(), FlattenError> {
        Err(FlattenError::record(self.key, format!("struct {name}")))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> std::result::Result<(), FlattenError> {
        self.leaf(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<(), FlattenError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _value: &T,
    ) -> std::result::Result<(), FlattenError> {
        Err(FlattenError::record(self.key, format!("{name}::{variant}")))
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<SeqFlattener<'a>, FlattenError> {
        Ok(SeqFlattener {
            key: self.key,
            leaves: self.leaves,
            index: 0,
        })
    }

    fn serialize_tuple(self, len: usize) -> std::result::Result<SeqFlattener<'a>, FlattenError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeTupleStruct, FlattenError> {
        Err(FlattenError::record(self.key, format!("struct {name}")))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeTupleVariant, FlattenError> {
        Err(FlattenError::record(self.key, format!("{name}::{variant}")))
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<MapFlattener<'a>, FlattenError> {
        Ok(MapFlattener {
            key: self.key,
            leaves: self.leaves,
            member: None,
        })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeStruct, FlattenError> {
        Err(FlattenError::record(self.key, format!("struct {name}")))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeStructVariant, FlattenError> {
        Err(FlattenError::record(self.key, format!("{name}::{variant}")))
    }
}

struct SeqFlattener<'a> {
    key: String,
    leaves: &'a mut Vec<(String, String)>,
    index: usize,
}

impl SeqFlattener<'_> {
    fn element<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), FlattenError> {
        let key = format!("{}[{}]", self.key, self.index);
        self.index += 1;
        value.serialize(Flattener {
            key,
            leaves: &mut *self.leaves,
        })
    }
}

impl ser::SerializeSeq for SeqFlattener<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), FlattenError> {
        self.element(value)
    }

    fn end(self) -> std::result::Result<(), FlattenError> {
        Ok(())
    }
}

impl ser::SerializeTuple for SeqFlattener<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), FlattenError> {
        self.element(value)
    }

    fn end(self) -> std::result::Result<(), FlattenError> {
        Ok(())
    }
}

struct MapFlattener<'a> {
    key: String,
    leaves: &'a mut Vec<(String, String)>,
    member: Option<String>,
}

impl ser::SerializeMap for MapFlattener<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> std::result::Result<(), FlattenError> {
        let member = key.serialize(KeyStringifier).map_err(|err| FlattenError {
            key: self.key.clone(),
            ..err
        })?;
        self.member = Some(member);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), FlattenError> {
        let member = self
            .member
            .take()
            .ok_or_else(|| <FlattenError as ser::Error>::custom("map value serialized before its key"))?;
        value.serialize(Flattener {
            key: format!("{}.{}", self.key, member),
            leaves: &mut *self.leaves,
        })
    }

    fn end(self) -> std::result::Result<(), FlattenError> {
        Ok(())
    }
}

/// Renders a map key as the string used in the flattened key.
struct KeyStringifier;

impl ser::Serializer for KeyStringifier {
    type Ok = String;
    type Error = FlattenError;
    type SerializeSeq = Impossible<String, FlattenError>;
    type SerializeTuple = Impossible<String, FlattenError>;
    type SerializeTupleStruct = Impossible<String, FlattenError>;
    type SerializeTupleVariant = Impossible<String, FlattenError>;
    type SerializeMap = Impossible<String, FlattenError>;
    type SerializeStruct = Impossible<String, FlattenError>;
    type SerializeStructVariant = Impossible<String, FlattenError>;

    fn serialize_bool(self, v: bool) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_char(self, v: char) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> std::result::Result<String, FlattenError> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> std::result::Result<String, FlattenError> {
        Err(FlattenError::map_key("bytes"))
    }

    fn serialize_none(self) -> std::result::Result<String, FlattenError> {
        Err(FlattenError::map_key("none"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> std::result::Result<String, FlattenError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> std::result::Result<String, FlattenError> {
        Err(FlattenError::map_key("()"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> std::result::Result<String, FlattenError> {
        Err(FlattenError::map_key(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> std::result::Result<String, FlattenError> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<String, FlattenError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _value: &T,
    ) -> std::result::Result<String, FlattenError> {
        Err(FlattenError::map_key(variant))
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<Self::SerializeSeq, FlattenError> {
        Err(FlattenError::map_key("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> std::result::Result<Self::SerializeTuple, FlattenError> {
        Err(FlattenError::map_key("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeTupleStruct, FlattenError> {
        Err(FlattenError::map_key(name))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeTupleVariant, FlattenError> {
        Err(FlattenError::map_key(variant))
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<Self::SerializeMap, FlattenError> {
        Err(FlattenError::map_key("map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeStruct, FlattenError> {
        Err(FlattenError::map_key(name))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self::SerializeStructVariant, FlattenError> {
        Err(FlattenError::map_key(variant))
    }
}
