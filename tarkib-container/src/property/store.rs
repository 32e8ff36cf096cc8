//! The property store: flattened configuration entries with typed reads.

use std::any::{Any, type_name};
use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tarkib_support::rendering::suggest_similar;
use tracing::{debug, trace};

use crate::error::{NotFoundError, Result, Subject, TarkibError};
use crate::property::coerce::FromProperty;
use crate::property::flatten::flatten;

/// Where [`PropertyStore::retrieve`] writes a value.
///
/// Built from a reference: `&mut T` is writable, `&T` is read-only and
/// makes the retrieve fail with [`TarkibError::NotSettable`].
pub enum Target<'a> {
    Writable {
        slot: &'a mut dyn Any,
        type_name: &'static str,
    },
    ReadOnly {
        type_name: &'static str,
    },
}

impl Target<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Target::Writable { type_name, .. } | Target::ReadOnly { type_name } => type_name,
        }
    }
}

impl<'a, T: Any> From<&'a mut T> for Target<'a> {
    fn from(slot: &'a mut T) -> Self {
        Target::Writable {
            slot,
            type_name: type_name::<T>(),
        }
    }
}

impl<'a, T: Any> From<&'a T> for Target<'a> {
    fn from(_: &'a T) -> Self {
        Target::ReadOnly {
            type_name: type_name::<T>(),
        }
    }
}

/// Holds configuration as flattened `key → string` entries.
///
/// Values go in through [`set`](Self::set) as anything serializable and
/// come out either raw ([`get`](Self::get)) or coerced into a scalar
/// ([`value`](Self::value), [`retrieve`](Self::retrieve)).
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
/// use tarkib_container::property::PropertyStore;
///
/// let store = PropertyStore::new();
/// store.set("server.port", &8080).unwrap();
/// store.set("hosts", &["a", "b"]).unwrap();
///
/// let mut limits = BTreeMap::new();
/// limits.insert("max", 10);
/// store.set("limits", &limits).unwrap();
///
/// assert_eq!(store.get("hosts[1]").unwrap(), "b");
/// assert_eq!(store.value::<u16>("server.port").unwrap(), 8080);
///
/// let mut max: Option<u32> = None;
/// store.retrieve("limits.max", &mut max).unwrap();
/// assert_eq!(max, Some(10));
/// ```
#[derive(Debug, Default)]
pub struct PropertyStore {
    entries: RwLock<HashMap<String, String>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, overwriting existing leaves.
    ///
    /// Maps expand to `key.member`, sequences to `key[i]`, recursively.
    /// Every leaf is written under one lock, so a failing composite
    /// leaves the store unchanged.
    ///
    /// # Errors
    /// [`TarkibError::Conversion`] if a map key or a leaf cannot be
    /// rendered as a string (structs and other records).
    pub fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<()> {
        let leaves = flatten(key, value)?;
        let count = leaves.len();

        let mut entries = self.entries.write();
        for (leaf_key, leaf_value) in leaves {
            trace!(key = %leaf_key, value = %leaf_value, "Property leaf stored");
            entries.insert(leaf_key, leaf_value);
        }
        debug!(key, leaves = count, "Property set");
        Ok(())
    }

    /// Returns the raw string stored under `key`.
    pub fn get(&self, key: &str) -> Result<String> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(value) => Ok(value.clone()),
            None => {
                let known: Vec<&str> = entries.keys().map(String::as_str).collect();
                Err(TarkibError::NotFound(NotFoundError {
                    subject: Subject::Property,
                    name: key.to_string(),
                    required_by: None,
                    suggestions: suggest_similar(key, &known, 3),
                }))
            }
        }
    }

    /// Reads `key` and coerces it into `T`.
    pub fn value<T: FromProperty>(&self, key: &str) -> Result<T> {
        let raw = self.get(key)?;
        T::from_property(&raw).map_err(|reason| TarkibError::conversion(key, raw, T::target_name(), reason))
    }

    /// Reads `key` and writes it through `target`.
    ///
    /// The target may be any integer width, `f32`, `f64`, `bool`,
    /// `String`, or an `Option` of one of those (a `None` is allocated
    /// to `Some` and written through).
    ///
    /// # Errors
    /// - [`TarkibError::NotFound`] if `key` is absent
    /// - [`TarkibError::NotSettable`] if `target` is read-only
    /// - [`TarkibError::UnsupportedType`] for any other target type
    /// - [`TarkibError::Conversion`] if the string does not parse or overflows
    pub fn retrieve<'a>(&self, key: &str, target: impl Into<Target<'a>>) -> Result<()> {
        let raw = self.get(key)?;
        let target = target.into();
        let target_name = target.type_name();

        let slot = match target {
            Target::Writable { slot, .. } => slot,
            Target::ReadOnly { type_name } => {
                return Err(TarkibError::NotSettable {
                    target: type_name.to_string(),
                    reason: "pass a mutable reference to receive the value".to_string(),
                });
            }
        };

        match write_scalar(slot, &raw) {
            Some(Ok(())) => {
                trace!(key, target = target_name, "Property retrieved");
                Ok(())
            }
            Some(Err((reason, scalar))) => Err(TarkibError::conversion(key, raw, scalar, reason)),
            None => Err(TarkibError::UnsupportedType {
                target: target_name.to_string(),
                binding: format!("property '{key}'"),
            }),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Removes a single leaf entry and returns its value.
    pub fn remove(&self, key: &str) -> Result<String> {
        self.entries
            .write()
            .remove(key)
            .ok_or_else(|| TarkibError::not_found(Subject::Property, key))
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

type WriteOutcome = Option<std::result::Result<(), (String, &'static str)>>;

macro_rules! write_scalars {
    ($slot:ident, $raw:ident; $($ty:ty),+ $(,)?) => {
        $(
            if let Some(target) = $slot.downcast_mut::<$ty>() {
                return Some(
                    <$ty as FromProperty>::from_property($raw)
                        .map(|value| *target = value)
                        .map_err(|reason| (reason, stringify!($ty))),
                );
            }
            if let Some(target) = $slot.downcast_mut::<Option<$ty>>() {
                return Some(
                    <$ty as FromProperty>::from_property($raw)
                        .map(|value| *target = Some(value))
                        .map_err(|reason| (reason, stringify!($ty))),
                );
            }
        )+
    };
}

/// Writes `raw` into `slot` if it holds a supported scalar; `None` otherwise.
fn write_scalar(slot: &mut dyn Any, raw: &str) -> WriteOutcome {
    write_scalars!(
        slot, raw;
        u8, u16, u32, u64, u128, usize,
        i8, i16, i32, i64, i128, isize,
        f32, f64, bool, String,
    );
    None
}
