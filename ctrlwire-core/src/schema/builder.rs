//! Declarative construction of a [`Schema`].
//!
//! ```rust
//! use ctrlwire_core::schema::{FieldDef, MessageDef, SchemaBuilder, ServiceDef, TypeDef};
//!
//! let schema = SchemaBuilder::new()
//!     .message(MessageDef::new("pkg.Item").field(FieldDef::new(1, "name", TypeDef::String)))
//!     .message(
//!         MessageDef::new("pkg.ListResponse")
//!             .field(FieldDef::new(1, "result", TypeDef::message("pkg.Item")).repeated()),
//!     )
//!     .message(MessageDef::new("pkg.ListRequest"))
//!     .service(ServiceDef::new("pkg.ItemService").method("List", "pkg.ListRequest", "pkg.ListResponse"))
//!     .build()
//!     .unwrap();
//!
//! assert!(schema.get_service_by_name("pkg.ItemService").is_some());
//! ```
use super::{
    EnumInner, EnumValue, FieldInner, KindIndex, Label, MessageInner, MethodInner, Schema,
    SchemaInner, ServiceInner, Symbol, TIMESTAMP_TYPE,
};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<u32> = 19_000..=19_999;

/// Errors that can occur when assembling a [`Schema`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Symbol '{0}' is defined more than once")]
    DuplicateSymbol(String),
    #[error("Field number {number} in '{message}' is outside the valid range")]
    InvalidFieldNumber { message: String, number: u32 },
    #[error("Field number {number} is used more than once in '{message}'")]
    DuplicateFieldNumber { message: String, number: u32 },
    #[error("Field name '{name}' is used more than once in '{message}'")]
    DuplicateFieldName { message: String, name: String },
    #[error("Type '{type_name}' of field '{message}.{field}' is not defined")]
    UnresolvedType {
        message: String,
        field: String,
        type_name: String,
    },
    #[error("Map field '{message}.{field}' must have an integral, bool or string key")]
    InvalidMapKey { message: String, field: String },
    #[error("Map field '{message}.{field}' cannot be repeated, optional or hold another map")]
    InvalidMapField { message: String, field: String },
    #[error("Type '{type_name}' used by method '{service}/{method}' is not a message")]
    UnresolvedMethodType {
        service: String,
        method: String,
        type_name: String,
    },
    #[error("Method name '{service}/{method}' is not a valid protobuf identifier")]
    InvalidMethodName { service: String, method: String },
    #[error("Enum '{0}' declares no values")]
    EmptyEnum(String),
    #[error("Field '{message}.{field}' has unsupported protobuf type {type_code}")]
    UnsupportedFieldType {
        message: String,
        field: String,
        type_code: i32,
    },
    #[error("Failed to decode file descriptor set: '{0}'")]
    Decode(#[from] prost::DecodeError),
}

/// The declared type of a field, referencing messages and enums by full name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Bool,
    String,
    Bytes,
    Double,
    Float,
    Enum(String),
    Message(String),
    Map(Box<TypeDef>, Box<TypeDef>),
}

impl TypeDef {
    pub fn message(full_name: impl Into<String>) -> Self {
        TypeDef::Message(full_name.into())
    }

    pub fn enumeration(full_name: impl Into<String>) -> Self {
        TypeDef::Enum(full_name.into())
    }

    pub fn map(key: TypeDef, value: TypeDef) -> Self {
        TypeDef::Map(Box::new(key), Box::new(value))
    }
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    number: u32,
    name: String,
    json_name: Option<String>,
    label: Label,
    ty: TypeDef,
}

impl FieldDef {
    pub fn new(number: u32, name: impl Into<String>, ty: TypeDef) -> Self {
        Self {
            number,
            name: name.into(),
            json_name: None,
            label: Label::Singular,
            ty,
        }
    }

    /// Marks the field as proto3 `optional` (explicit presence).
    pub fn optional(mut self) -> Self {
        self.label = Label::Optional;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.label = Label::Repeated;
        self
    }

    /// Overrides the lowerCamelCase name derived from the proto name.
    pub fn json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = Some(json_name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct MessageDef {
    full_name: String,
    fields: Vec<FieldDef>,
}

impl MessageDef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    full_name: String,
    values: Vec<EnumValue>,
}

impl EnumDef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push(EnumValue {
            name: name.into(),
            number,
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServiceDef {
    full_name: String,
    methods: Vec<(String, String, String)>,
}

impl ServiceDef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            methods: Vec::new(),
        }
    }

    /// Adds a unary method taking `input` and returning `output` (message full names).
    pub fn method(
        mut self,
        name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.methods.push((name.into(), input.into(), output.into()));
        self
    }
}

/// Collects definitions and resolves them into an immutable [`Schema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
    services: Vec<ServiceDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enumeration(mut self, enumeration: EnumDef) -> Self {
        self.enums.push(enumeration);
        self
    }

    pub fn service(mut self, service: ServiceDef) -> Self {
        self.services.push(service);
        self
    }

    /// Validates every definition and resolves type references.
    ///
    /// `google.protobuf.Timestamp` is added when no definition for it was provided.
    pub fn build(mut self) -> Result<Schema, SchemaError> {
        if !self.messages.iter().any(|m| m.full_name == TIMESTAMP_TYPE) {
            self.messages.push(timestamp_def());
        }

        let mut symbols = HashMap::new();
        let entries = self
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| (&m.full_name, Symbol::Message(i)))
            .chain(
                self.enums
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (&e.full_name, Symbol::Enum(i))),
            )
            .chain(
                self.services
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (&s.full_name, Symbol::Service(i))),
            );

        for (name, symbol) in entries {
            match symbols.entry(name.clone()) {
                Entry::Occupied(_) => return Err(SchemaError::DuplicateSymbol(name.clone())),
                Entry::Vacant(slot) => {
                    slot.insert(symbol);
                }
            }
        }

        let enums = self
            .enums
            .into_iter()
            .map(|def| {
                if def.values.is_empty() {
                    return Err(SchemaError::EmptyEnum(def.full_name));
                }
                Ok(EnumInner {
                    full_name: def.full_name,
                    values: def.values,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let messages = self
            .messages
            .into_iter()
            .map(|def| build_message(def, &symbols))
            .collect::<Result<Vec<_>, _>>()?;

        let services = self
            .services
            .into_iter()
            .map(|def| build_service(def, &symbols))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Schema {
            inner: Arc::new(SchemaInner {
                messages,
                enums,
                services,
                symbols,
            }),
        })
    }
}

fn build_message(
    def: MessageDef,
    symbols: &HashMap<String, Symbol>,
) -> Result<MessageInner, SchemaError> {
    let mut by_number = HashMap::new();
    let mut by_name = HashMap::new();
    let mut fields = Vec::with_capacity(def.fields.len());

    for (index, field) in def.fields.into_iter().enumerate() {
        if field.number == 0
            || field.number > MAX_FIELD_NUMBER
            || RESERVED_FIELD_NUMBERS.contains(&field.number)
        {
            return Err(SchemaError::InvalidFieldNumber {
                message: def.full_name,
                number: field.number,
            });
        }

        if by_number.insert(field.number, index).is_some() {
            return Err(SchemaError::DuplicateFieldNumber {
                message: def.full_name,
                number: field.number,
            });
        }

        let json_name = field
            .json_name
            .clone()
            .unwrap_or_else(|| to_json_name(&field.name));

        for name in [&field.name, &json_name] {
            match by_name.insert(name.clone(), index) {
                Some(other) if other != index => {
                    return Err(SchemaError::DuplicateFieldName {
                        message: def.full_name,
                        name: name.clone(),
                    });
                }
                _ => {}
            }
        }

        let kind = resolve_type(&field.ty, symbols).map_err(|type_name| {
            SchemaError::UnresolvedType {
                message: def.full_name.clone(),
                field: field.name.clone(),
                type_name,
            }
        })?;

        if let KindIndex::Map(key, value) = &kind {
            if field.label != Label::Singular || matches!(**value, KindIndex::Map(..)) {
                return Err(SchemaError::InvalidMapField {
                    message: def.full_name,
                    field: field.name,
                });
            }
            if !matches!(
                **key,
                KindIndex::Int32
                    | KindIndex::Int64
                    | KindIndex::Uint32
                    | KindIndex::Uint64
                    | KindIndex::Bool
                    | KindIndex::String
            ) {
                return Err(SchemaError::InvalidMapKey {
                    message: def.full_name,
                    field: field.name,
                });
            }
        }

        fields.push(FieldInner {
            number: field.number,
            name: field.name,
            json_name,
            label: field.label,
            kind,
        });
    }

    Ok(MessageInner {
        full_name: def.full_name,
        fields,
        by_number,
        by_name,
    })
}

/// Resolves a declared type, returning the offending type name when it is unknown.
fn resolve_type(ty: &TypeDef, symbols: &HashMap<String, Symbol>) -> Result<KindIndex, String> {
    Ok(match ty {
        TypeDef::Int32 => KindIndex::Int32,
        TypeDef::Int64 => KindIndex::Int64,
        TypeDef::Uint32 => KindIndex::Uint32,
        TypeDef::Uint64 => KindIndex::Uint64,
        TypeDef::Bool => KindIndex::Bool,
        TypeDef::String => KindIndex::String,
        TypeDef::Bytes => KindIndex::Bytes,
        TypeDef::Double => KindIndex::Double,
        TypeDef::Float => KindIndex::Float,
        TypeDef::Enum(name) => match symbols.get(name) {
            Some(Symbol::Enum(index)) => KindIndex::Enum(*index),
            _ => return Err(name.clone()),
        },
        TypeDef::Message(name) => match symbols.get(name) {
            Some(Symbol::Message(index)) => KindIndex::Message(*index),
            _ => return Err(name.clone()),
        },
        TypeDef::Map(key, value) => KindIndex::Map(
            Box::new(resolve_type(key, symbols)?),
            Box::new(resolve_type(value, symbols)?),
        ),
    })
}

fn build_service(
    def: ServiceDef,
    symbols: &HashMap<String, Symbol>,
) -> Result<ServiceInner, SchemaError> {
    let invalid_name = |method: &str| SchemaError::InvalidMethodName {
        service: def.full_name.clone(),
        method: method.to_string(),
    };
    if !def.full_name.split('.').all(is_identifier) {
        return Err(invalid_name(""));
    }

    let resolve = |method: &str, type_name: &str| match symbols.get(type_name) {
        Some(Symbol::Message(index)) => Ok(*index),
        _ => Err(SchemaError::UnresolvedMethodType {
            service: def.full_name.clone(),
            method: method.to_string(),
            type_name: type_name.to_string(),
        }),
    };

    let methods = def
        .methods
        .iter()
        .map(|(name, input, output)| {
            if !is_identifier(name) {
                return Err(invalid_name(name));
            }
            Ok(MethodInner {
                name: name.clone(),
                input: resolve(name, input)?,
                output: resolve(name, output)?,
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;

    Ok(ServiceInner {
        full_name: def.full_name,
        methods,
    })
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the names that can appear in a gRPC path.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn timestamp_def() -> MessageDef {
    MessageDef::new(TIMESTAMP_TYPE)
        .field(FieldDef::new(1, "seconds", TypeDef::Int64))
        .field(FieldDef::new(2, "nanos", TypeDef::Int32))
}

/// Derives the JSON name of a field the way `protoc` does: underscores are dropped and
/// the following character is upper-cased.
pub(crate) fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut capitalize_next = false;

    for c in name.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }

    out
}
