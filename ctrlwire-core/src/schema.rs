//! # Schema
//!
//! Descriptors for messages, enums and services.
//!
//! A [`Schema`] is built once (through [`SchemaBuilder`], from a binary `FileDescriptorSet`,
//! or from the built-in [`crate::controlplane`] catalog) and is immutable afterwards. The
//! descriptor types ([`MessageDescriptor`], [`FieldDescriptor`], [`EnumDescriptor`],
//! [`ServiceDescriptor`], [`MethodDescriptor`]) are lightweight handles into it: an `Arc`
//! to the shared tables plus an index. Cloning them is cheap and they can be sent freely
//! across tasks and threads.
//!
//! Message and enum references between fields are resolved by index at build time, so
//! recursive message types are supported.
mod builder;
mod file_descriptor;

pub use builder::*;

use crate::wire::WireType;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Full name of the well-known timestamp type, which has a dedicated JSON mapping.
pub const TIMESTAMP_TYPE: &str = "google.protobuf.Timestamp";

/// Enum number used for values that are not part of the known set.
pub const UNRECOGNIZED: i32 = -1;

/// An immutable registry of message, enum and service descriptors.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

struct SchemaInner {
    messages: Vec<MessageInner>,
    enums: Vec<EnumInner>,
    services: Vec<ServiceInner>,
    symbols: HashMap<String, Symbol>,
}

#[derive(Debug, Clone, Copy)]
enum Symbol {
    Message(usize),
    Enum(usize),
    Service(usize),
}

struct MessageInner {
    full_name: String,
    fields: Vec<FieldInner>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

struct FieldInner {
    number: u32,
    name: String,
    json_name: String,
    label: Label,
    kind: KindIndex,
}

struct EnumInner {
    full_name: String,
    values: Vec<EnumValue>,
}

struct ServiceInner {
    full_name: String,
    methods: Vec<MethodInner>,
}

struct MethodInner {
    name: String,
    input: usize,
    output: usize,
}

/// Cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Implicit presence: omitted on the wire when equal to its default.
    Singular,
    /// Explicit presence (proto3 `optional`): emitted whenever set.
    Optional,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KindIndex {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Bool,
    String,
    Bytes,
    Double,
    Float,
    Enum(usize),
    Message(usize),
    Map(Box<KindIndex>, Box<KindIndex>),
}

/// The type of a field, with message and enum references resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Bool,
    String,
    Bytes,
    Double,
    Float,
    Enum(EnumDescriptor),
    Message(MessageDescriptor),
    Map { key: Box<Kind>, value: Box<Kind> },
}

impl Kind {
    /// The wire type a single value of this kind is encoded with.
    pub fn wire_type(&self) -> WireType {
        match self {
            Kind::Int32 | Kind::Int64 | Kind::Uint32 | Kind::Uint64 | Kind::Bool | Kind::Enum(_) => {
                WireType::Varint
            }
            Kind::Double => WireType::SixtyFourBit,
            Kind::Float => WireType::ThirtyTwoBit,
            Kind::String | Kind::Bytes | Kind::Message(_) | Kind::Map { .. } => {
                WireType::LengthDelimited
            }
        }
    }

    /// Whether repeated values of this kind may arrive in packed form.
    pub fn is_packable(&self) -> bool {
        matches!(
            self.wire_type(),
            WireType::Varint | WireType::SixtyFourBit | WireType::ThirtyTwoBit
        )
    }

    /// Whether this kind can be used as the key of a map field.
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            Kind::Int32 | Kind::Int64 | Kind::Uint32 | Kind::Uint64 | Kind::Bool | Kind::String
        )
    }
}

/// A symbolic enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

impl Schema {
    /// Looks up a message by its fully qualified name (e.g. `controlplane.v1.Group`).
    pub fn get_message_by_name(&self, name: &str) -> Option<MessageDescriptor> {
        match self.inner.symbols.get(name)? {
            Symbol::Message(index) => Some(MessageDescriptor::new(self.clone(), *index)),
            _ => None,
        }
    }

    pub fn get_enum_by_name(&self, name: &str) -> Option<EnumDescriptor> {
        match self.inner.symbols.get(name)? {
            Symbol::Enum(index) => Some(EnumDescriptor {
                schema: self.clone(),
                index: *index,
            }),
            _ => None,
        }
    }

    pub fn get_service_by_name(&self, name: &str) -> Option<ServiceDescriptor> {
        match self.inner.symbols.get(name)? {
            Symbol::Service(index) => Some(ServiceDescriptor {
                schema: self.clone(),
                index: *index,
            }),
            _ => None,
        }
    }

    /// Looks up a method by its gRPC path (`/package.Service/Method`).
    pub fn get_method_by_path(&self, path: &str) -> Option<MethodDescriptor> {
        let (service, method) = path.strip_prefix('/')?.split_once('/')?;
        self.get_service_by_name(service)?.get_method(method)
    }

    pub fn messages(&self) -> impl Iterator<Item = MessageDescriptor> + '_ {
        (0..self.inner.messages.len()).map(|index| MessageDescriptor::new(self.clone(), index))
    }

    pub fn enums(&self) -> impl Iterator<Item = EnumDescriptor> + '_ {
        (0..self.inner.enums.len()).map(|index| EnumDescriptor {
            schema: self.clone(),
            index,
        })
    }

    pub fn services(&self) -> impl Iterator<Item = ServiceDescriptor> + '_ {
        (0..self.inner.services.len()).map(|index| ServiceDescriptor {
            schema: self.clone(),
            index,
        })
    }

    fn resolve_kind(&self, kind: &KindIndex) -> Kind {
        match kind {
            KindIndex::Int32 => Kind::Int32,
            KindIndex::Int64 => Kind::Int64,
            KindIndex::Uint32 => Kind::Uint32,
            KindIndex::Uint64 => Kind::Uint64,
            KindIndex::Bool => Kind::Bool,
            KindIndex::String => Kind::String,
            KindIndex::Bytes => Kind::Bytes,
            KindIndex::Double => Kind::Double,
            KindIndex::Float => Kind::Float,
            KindIndex::Enum(index) => Kind::Enum(EnumDescriptor {
                schema: self.clone(),
                index: *index,
            }),
            KindIndex::Message(index) => Kind::Message(MessageDescriptor::new(self.clone(), *index)),
            KindIndex::Map(key, value) => Kind::Map {
                key: Box::new(self.resolve_kind(key)),
                value: Box::new(self.resolve_kind(value)),
            },
        }
    }

    fn same(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("messages", &self.inner.messages.len())
            .field("enums", &self.inner.enums.len())
            .field("services", &self.inner.services.len())
            .finish()
    }
}

/// Handle to a message type.
#[derive(Clone)]
pub struct MessageDescriptor {
    schema: Schema,
    index: usize,
}

impl MessageDescriptor {
    fn new(schema: Schema, index: usize) -> Self {
        Self { schema, index }
    }

    fn inner(&self) -> &MessageInner {
        &self.schema.inner.messages[self.index]
    }

    /// The schema this descriptor belongs to.
    pub fn parent_schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the full_name (e.g.,`controlplane.v1.WorkflowItem`)
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// Returns the name (e.g.,`WorkflowItem`)
    pub fn name(&self) -> &str {
        short_name(self.full_name())
    }

    /// Returns the package name (e.g.,`controlplane.v1`)
    pub fn package_name(&self) -> &str {
        package_name(self.full_name())
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        (0..self.inner().fields.len()).map(|index| FieldDescriptor {
            message: self.clone(),
            index,
        })
    }

    pub fn get_field(&self, number: u32) -> Option<FieldDescriptor> {
        let index = *self.inner().by_number.get(&number)?;
        Some(FieldDescriptor {
            message: self.clone(),
            index,
        })
    }

    /// Finds a field by its proto name or by its JSON name.
    pub fn get_field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        let index = *self.inner().by_name.get(name)?;
        Some(FieldDescriptor {
            message: self.clone(),
            index,
        })
    }

    pub fn is_timestamp(&self) -> bool {
        self.full_name() == TIMESTAMP_TYPE
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.schema.same(&other.schema) && self.index == other.index
    }
}

impl Eq for MessageDescriptor {}

impl Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageDescriptor")
            .field(&self.full_name())
            .finish()
    }
}

/// Handle to a field of a message.
#[derive(Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    message: MessageDescriptor,
    index: usize,
}

impl FieldDescriptor {
    fn inner(&self) -> &FieldInner {
        &self.message.inner().fields[self.index]
    }

    /// Position of the field in its message's declaration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn number(&self) -> u32 {
        self.inner().number
    }

    pub fn name(&self) -> &str {
        &self.inner().name
    }

    pub fn json_name(&self) -> &str {
        &self.inner().json_name
    }

    pub fn label(&self) -> Label {
        self.inner().label
    }

    pub fn kind(&self) -> Kind {
        self.message.schema.resolve_kind(&self.inner().kind)
    }

    pub fn is_repeated(&self) -> bool {
        self.label() == Label::Repeated
    }

    pub fn is_optional(&self) -> bool {
        self.label() == Label::Optional
    }

    pub fn is_map(&self) -> bool {
        matches!(self.inner().kind, KindIndex::Map(..))
    }

    /// Whether an unset value is distinguishable from a default one.
    pub fn has_presence(&self) -> bool {
        self.is_optional()
            || (!self.is_repeated() && matches!(self.inner().kind, KindIndex::Message(_)))
    }

    pub fn containing_message(&self) -> &MessageDescriptor {
        &self.message
    }

    pub fn wire_type(&self) -> WireType {
        self.kind().wire_type()
    }
}

impl Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("message", &self.message.full_name())
            .field("number", &self.number())
            .field("name", &self.name())
            .finish()
    }
}

/// Handle to an enum type.
#[derive(Clone)]
pub struct EnumDescriptor {
    schema: Schema,
    index: usize,
}

impl EnumDescriptor {
    fn inner(&self) -> &EnumInner {
        &self.schema.inner.enums[self.index]
    }

    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    pub fn name(&self) -> &str {
        short_name(self.full_name())
    }

    pub fn package_name(&self) -> &str {
        package_name(self.full_name())
    }

    pub fn values(&self) -> &[EnumValue] {
        &self.inner().values
    }

    pub fn get_value(&self, number: i32) -> Option<&EnumValue> {
        self.values().iter().find(|v| v.number == number)
    }

    pub fn get_value_by_name(&self, name: &str) -> Option<&EnumValue> {
        self.values().iter().find(|v| v.name == name)
    }

    /// The default value: the first declared one, which proto3 requires to be zero.
    pub fn default_number(&self) -> i32 {
        self.values().first().map_or(0, |v| v.number)
    }
}

impl PartialEq for EnumDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.schema.same(&other.schema) && self.index == other.index
    }
}

impl Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnumDescriptor")
            .field(&self.full_name())
            .finish()
    }
}

/// Handle to a service.
#[derive(Clone)]
pub struct ServiceDescriptor {
    schema: Schema,
    index: usize,
}

impl ServiceDescriptor {
    fn inner(&self) -> &ServiceInner {
        &self.schema.inner.services[self.index]
    }

    /// Returns the full_name (e.g.,`controlplane.v1.WorkflowService`)
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    pub fn name(&self) -> &str {
        short_name(self.full_name())
    }

    pub fn package_name(&self) -> &str {
        package_name(self.full_name())
    }

    pub fn methods(&self) -> impl ExactSizeIterator<Item = MethodDescriptor> + '_ {
        (0..self.inner().methods.len()).map(|index| MethodDescriptor {
            service: self.clone(),
            index,
        })
    }

    pub fn get_method(&self, name: &str) -> Option<MethodDescriptor> {
        self.methods().find(|m| m.name() == name)
    }
}

impl PartialEq for ServiceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.schema.same(&other.schema) && self.index == other.index
    }
}

impl Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceDescriptor")
            .field(&self.full_name())
            .finish()
    }
}

/// Handle to a unary method of a service.
#[derive(Clone, PartialEq)]
pub struct MethodDescriptor {
    service: ServiceDescriptor,
    index: usize,
}

impl MethodDescriptor {
    fn inner(&self) -> &MethodInner {
        &self.service.inner().methods[self.index]
    }

    pub fn name(&self) -> &str {
        &self.inner().name
    }

    pub fn parent_service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn input(&self) -> MessageDescriptor {
        MessageDescriptor::new(self.service.schema.clone(), self.inner().input)
    }

    pub fn output(&self) -> MessageDescriptor {
        MessageDescriptor::new(self.service.schema.clone(), self.inner().output)
    }

    /// The HTTP/2 path of the method (e.g. `/controlplane.v1.WorkflowService/List`).
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service.full_name(), self.name())
    }
}

impl Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MethodDescriptor")
            .field(&self.path())
            .finish()
    }
}

fn short_name(full_name: &str) -> &str {
    full_name.rsplit_once('.').map_or(full_name, |(_, name)| name)
}

fn package_name(full_name: &str) -> &str {
    full_name.rsplit_once('.').map_or("", |(package, _)| package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn names_are_split_on_the_last_dot() {
        assert_eq!(short_name("controlplane.v1.Group"), "Group");
        assert_eq!(package_name("controlplane.v1.Group"), "controlplane.v1");
        assert_eq!(short_name("Bare"), "Bare");
        assert_eq!(package_name("Bare"), "");
    }

    #[test]
    fn method_paths_resolve_back_to_methods() {
        let schema = SchemaBuilder::new()
            .message(MessageDef::new("pkg.Req"))
            .message(MessageDef::new("pkg.Res"))
            .service(ServiceDef::new("pkg.Svc").method("Get", "pkg.Req", "pkg.Res"))
            .build()
            .unwrap();

        let method = schema.get_method_by_path("/pkg.Svc/Get").unwrap();
        assert_eq!(method.path(), "/pkg.Svc/Get");
        assert_eq!(method.input().full_name(), "pkg.Req");
        assert_eq!(method.output().full_name(), "pkg.Res");
        assert!(schema.get_method_by_path("/pkg.Svc/Missing").is_none());
        assert!(schema.get_method_by_path("pkg.Svc/Get").is_none());
    }

    #[test]
    fn descriptors_are_equal_only_within_one_schema() {
        let build = || {
            SchemaBuilder::new()
                .message(MessageDef::new("pkg.A"))
                .build()
                .unwrap()
        };
        let first = build();
        let second = build();

        assert_eq!(
            first.get_message_by_name("pkg.A"),
            first.get_message_by_name("pkg.A")
        );
        assert_ne!(
            first.get_message_by_name("pkg.A"),
            second.get_message_by_name("pkg.A")
        );
    }
}
