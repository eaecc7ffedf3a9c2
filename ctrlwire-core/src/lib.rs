//! # Ctrlwire Core
//!
//! `ctrlwire-core` is the library behind the `ctrlwire` CLI. It talks to the control-plane
//! API over gRPC and gRPC-Web with one descriptor-driven codec instead of a generated
//! struct per message.
//!
//! ## Key Components
//!
//! * **[`schema`]:** Immutable message, enum and service descriptors, built in code with
//!   [`schema::SchemaBuilder`] or loaded from a `FileDescriptorSet`.
//! * **[`message::DynamicMessage`]:** An instance of any described message, with binary
//!   encode and decode driven by its descriptor.
//! * **[`json`]:** The canonical proto3 JSON projection of a message.
//! * **[`grpc`]:** A `tonic` codec and a unary client generic over the transport.
//! * **[`client::CtrlClient`]:** The high-level entry point, resolving methods by name and
//!   exchanging JSON.
//! * **[`controlplane`]:** A built-in schema for the workflow and group services.
//!
//! ## Wire primitives
//!
//! [`wire`] holds the varint, tag and length-delimited helpers the message engine is
//! built on. They are public for callers that need to frame or inspect raw payloads.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-types` and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod controlplane;
pub mod grpc;
pub mod json;
pub mod message;
pub mod schema;
pub mod wire;

// Re-exports
pub use prost;
pub use prost_types;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
