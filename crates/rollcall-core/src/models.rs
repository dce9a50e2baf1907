//! Data models for rollcall
//!
//! Defines the user record shown in the list. Only `id` and `name` are
//! interpreted; every other attribute the backend sends is kept verbatim.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of a user record, assigned by the backend
pub type UserId = String;

/// A user record
///
/// Deserializes from an object with `id` or `_id`. When both are present
/// `id` wins and `_id` is dropped.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    /// Stable identifier (the backend sends it as `_id`)
    pub id: UserId,
    /// Display name, used by search
    pub name: String,
    /// Opaque attributes (email, age, ...) carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Create a user with no extra attributes
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }

    /// Attach an opaque attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look up an opaque attribute
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Build a user from a JSON object
    ///
    /// The identity and name are removed from `fields`; what is left becomes
    /// the opaque attributes. The error text names the offending field.
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, String> {
        let id = take_id(&mut fields)?;

        let name = match fields.remove("name") {
            Some(Value::String(name)) => name,
            Some(_) => return Err("field `name` is not a string".to_string()),
            None => return Err("missing field `name`".to_string()),
        };

        Ok(Self {
            id,
            name,
            extra: fields,
        })
    }
}

/// Remove and return the identity, preferring `id` over `_id`
///
/// Both keys are removed so neither ends up in the attributes.
pub fn take_id(fields: &mut Map<String, Value>) -> Result<UserId, String> {
    let id = fields.remove("id");
    let mongo_id = fields.remove("_id");

    match id.or(mongo_id) {
        Some(Value::String(id)) => Ok(id),
        Some(_) => Err("field `id` is not a string".to_string()),
        None => Err("missing field `id`".to_string()),
    }
}

impl<'de> Deserialize<'de> for User {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        User::from_fields(fields).map_err(de::Error::custom)
    }
}
