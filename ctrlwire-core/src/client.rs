//! # Control-plane client
//!
//! [`CtrlClient`] pairs a [`Schema`] with an optional connection. It uses a **Typestate
//! Pattern** so that calls can only be issued once a transport exists:
//!
//! 1. **[`Offline`]**: The client holds a schema only. It can list services and describe
//!    symbols but cannot perform calls.
//! 2. **[`Online`]**: The client is connected, over native gRPC or gRPC-Web, and resolves
//!    methods against its schema.
//!
//! ## Example: State Transition
//!
//! ```rust,no_run
//! use ctrlwire_core::client::{ClientConfig, CtrlClient};
//! use ctrlwire_core::controlplane;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Offline State (Schema only)
//! let offline = CtrlClient::offline(controlplane::schema());
//! let services = offline.list_services();
//!
//! // 2. Online State (gRPC-Web over HTTP/1.1)
//! let config = ClientConfig::new("http://localhost:8080")
//!     .with_default_metadata(vec![("authorization".into(), "Bearer token".into())]);
//! let client = CtrlClient::connect_grpc_web(&config, controlplane::schema())?;
//! # Ok(())
//! # }
//! ```
pub mod offline;
pub mod online;
mod types;

pub use types::*;

use crate::grpc::client::GrpcClient;
use crate::schema::Schema;
use tonic::transport::Channel;

/// The main client for the control-plane API.
///
/// The generic parameter `T` represents the current state of the client.
#[derive(Clone, Debug)]
pub struct CtrlClient<T> {
    state: T,
}

/// State: Connected to a server.
#[derive(Debug, Clone)]
pub struct Online<S = Channel> {
    grpc_client: GrpcClient<S>,
    schema: Schema,
}

/// State: Disconnected, schema only.
#[derive(Debug, Clone)]
pub struct Offline {
    schema: Schema,
}

/// Access to the schema of any client state.
pub trait SchemaState {
    fn schema(&self) -> &Schema;
}

impl SchemaState for Offline {
    fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl<S> SchemaState for Online<S> {
    fn schema(&self) -> &Schema {
        &self.schema
    }
}
