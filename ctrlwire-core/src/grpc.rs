//! # Unary gRPC transport
//!
//! The low-level building blocks for calling control-plane methods with
//! [`DynamicMessage`](crate::message::DynamicMessage) payloads.
//!
//! Framing, HTTP/2 and gRPC-Web are delegated to `tonic` and `tonic-web`; this module only
//! supplies the codec and the request/response plumbing around `tonic::client::Grpc`.
pub mod client;
pub mod codec;
