//! # Dynamic messages
//!
//! [`DynamicMessage`] is an instance of any message described by a [`MessageDescriptor`].
//! It replaces the per-message structs a code generator would emit: the same encode,
//! decode and JSON projection code serves every message type of the schema.
//!
//! ## Default instance
//!
//! [`DynamicMessage::new`] returns the default instance of a type, which is also the
//! starting point of every decode:
//!
//! * Singular scalars hold their zero value (`0`, `false`, `""`, empty bytes, first enum value).
//! * Repeated and map fields are empty.
//! * Message fields and proto3 `optional` fields are absent.
mod decode;
mod encode;
mod value;

pub use value::*;

use crate::schema::{FieldDescriptor, Kind, MessageDescriptor};

/// Errors raised when assigning a value to a field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("Message '{message}' has no field named '{field}'")]
    UnknownField { message: String, field: String },
    #[error("Value {value:?} does not match the type of field '{message}.{field}'")]
    TypeMismatch {
        message: String,
        field: String,
        value: Value,
    },
}

/// An instance of a message type known only at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicMessage {
    desc: MessageDescriptor,
    /// One slot per field, in declaration order. `None` only for fields with presence.
    values: Vec<Option<Value>>,
}

impl DynamicMessage {
    /// Creates the default instance of `desc`.
    pub fn new(desc: MessageDescriptor) -> Self {
        let values = desc.fields().map(|field| base_value(&field)).collect();
        Self { desc, values }
    }

    /// Creates a default-filled instance and overlays the given fields.
    ///
    /// Fields are looked up by proto name or JSON name and type-checked.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ctrlwire_core::controlplane;
    /// use ctrlwire_core::message::{DynamicMessage, Value};
    ///
    /// let desc = controlplane::schema()
    ///     .get_message_by_name("controlplane.v1.WorkflowServiceDeleteRequest")
    ///     .unwrap();
    /// let request = DynamicMessage::from_partial(desc, [("name", Value::from("build"))]).unwrap();
    ///
    /// assert_eq!(request.get_by_name("name").and_then(Value::as_str), Some("build"));
    /// assert_eq!(request.get_by_name("projectName").and_then(Value::as_str), Some(""));
    /// ```
    pub fn from_partial<'a>(
        desc: MessageDescriptor,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<Self, ValueError> {
        let mut message = Self::new(desc);
        for (name, value) in fields {
            message.set_by_name(name, value)?;
        }
        Ok(message)
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.desc
    }

    /// Returns the value of a field, or `None` when a field with presence is unset.
    pub fn get(&self, field: &FieldDescriptor) -> Option<&Value> {
        self.slot(field)?.as_ref()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let field = self.desc.get_field_by_name(name)?;
        self.get(&field)
    }

    pub fn get_by_number(&self, number: u32) -> Option<&Value> {
        let field = self.desc.get_field(number)?;
        self.get(&field)
    }

    /// Whether a field holds a value that would be written to the wire.
    pub fn has(&self, field: &FieldDescriptor) -> bool {
        match self.get(field) {
            None => false,
            Some(_) if field.has_presence() => true,
            Some(Value::List(items)) => !items.is_empty(),
            Some(Value::Map(entries)) => !entries.is_empty(),
            Some(value) => !value.is_default(),
        }
    }

    /// Sets a field after checking that the value matches its type.
    pub fn set(&mut self, field: &FieldDescriptor, value: Value) -> Result<(), ValueError> {
        if field.containing_message() != &self.desc {
            return Err(self.unknown_field(field.name()));
        }

        let kind = field.kind();
        let valid = match &value {
            Value::List(items) if field.is_repeated() => {
                items.iter().all(|item| item.is_valid_for(&kind))
            }
            _ if field.is_repeated() => false,
            _ => value.is_valid_for(&kind),
        };

        if !valid {
            return Err(ValueError::TypeMismatch {
                message: self.desc.full_name().to_string(),
                field: field.name().to_string(),
                value,
            });
        }

        self.values[field.index()] = Some(value);
        Ok(())
    }

    pub fn set_by_name(&mut self, name: &str, value: Value) -> Result<(), ValueError> {
        let field = self
            .desc
            .get_field_by_name(name)
            .ok_or_else(|| self.unknown_field(name))?;
        self.set(&field, value)
    }

    /// Resets a field to its state in the default instance.
    pub fn clear(&mut self, field: &FieldDescriptor) {
        if field.containing_message() == &self.desc {
            self.values[field.index()] = base_value(field);
        }
    }

    /// Iterates over the fields that hold a value, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldDescriptor, &Value)> + '_ {
        self.desc
            .fields()
            .zip(self.values.iter())
            .filter_map(|(field, value)| value.as_ref().map(|v| (field, v)))
    }

    fn slot(&self, field: &FieldDescriptor) -> Option<&Option<Value>> {
        if field.containing_message() != &self.desc {
            return None;
        }
        self.values.get(field.index())
    }

    /// Stores a value produced by the decoder, which has already checked its kind.
    pub(crate) fn put(&mut self, field: &FieldDescriptor, value: Value) {
        self.values[field.index()] = Some(value);
    }

    /// Mutable access for the decoder to append to repeated and map fields.
    pub(crate) fn slot_mut(&mut self, field: &FieldDescriptor) -> &mut Option<Value> {
        &mut self.values[field.index()]
    }

    fn unknown_field(&self, name: &str) -> ValueError {
        ValueError::UnknownField {
            message: self.desc.full_name().to_string(),
            field: name.to_string(),
        }
    }
}

fn base_value(field: &FieldDescriptor) -> Option<Value> {
    if field.is_repeated() {
        return Some(Value::List(Vec::new()));
    }
    if field.has_presence() {
        return None;
    }
    match field.kind() {
        // Singular message fields always have presence, handled above.
        Kind::Message(_) => None,
        kind => Some(Value::default_for(&kind)),
    }
}
