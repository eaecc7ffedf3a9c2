//! # Client State: Online
//!
//! This module defines the `CtrlClient` behavior when it is connected to a server.
//! Two transports are provided:
//!
//! * **Native gRPC** over a `tonic` [`Channel`] (HTTP/2).
//! * **gRPC-Web** over an HTTP/1.1 `hyper-util` client wrapped in `tonic-web`'s
//!   [`GrpcWebClientLayer`], as used by browsers talking to the control plane.
use super::{CtrlClient, DynamicRequest, Online, SchemaState};
use crate::{
    BoxError,
    client::ClientConfig,
    grpc::client::{GrpcClient, GrpcRequestError},
    json::JsonError,
    message::DynamicMessage,
    schema::{MethodDescriptor, Schema},
};
use http_body::Body as HttpBody;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tonic::transport::{Channel, Endpoint};
use tonic_web::{GrpcWebCall, GrpcWebClientLayer, GrpcWebClientService};

/// The service stack used for gRPC-Web calls.
pub type GrpcWebChannel =
    GrpcWebClientService<Client<HttpConnector, GrpcWebCall<tonic::body::Body>>>;

/// Errors that can occur when connecting to a server.
#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Invalid URL '{0}': {1}")]
    InvalidUri(String, #[source] http::uri::InvalidUri),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// Errors that can occur during a dynamic call.
#[derive(Debug, thiserror::Error)]
pub enum DynamicCallError {
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
    #[error("Method '{0}' not found")]
    MethodNotFound(String),
    #[error("Invalid request body: '{0}'")]
    InvalidBody(#[from] JsonError),
    #[error(transparent)]
    GrpcRequestError(#[from] GrpcRequestError),
}

impl CtrlClient<Online<Channel>> {
    /// Connects to a server over native gRPC (HTTP/2).
    ///
    /// # Returns
    ///
    /// * `Ok(CtrlClient<Online>)` - The connected client.
    /// * `Err(ClientConnectError)` - If the URL is invalid or connection fails.
    pub async fn connect(config: &ClientConfig, schema: Schema) -> Result<Self, ClientConnectError> {
        let host = &config.host;
        let endpoint = Endpoint::new(host.clone())
            .map_err(|e| ClientConnectError::InvalidUrl(host.clone(), e))?;

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ClientConnectError::ConnectionFailed(host.clone(), e))?;

        tracing::debug!(host = %host, "connected over gRPC");

        Ok(Self::from_grpc_client(
            configure(GrpcClient::new(channel), config),
            schema,
        ))
    }
}

impl CtrlClient<Online<GrpcWebChannel>> {
    /// Creates a gRPC-Web client for `config.host`.
    ///
    /// No connection is opened until the first call.
    pub fn connect_grpc_web(config: &ClientConfig, schema: Schema) -> Result<Self, ClientConnectError> {
        let host = &config.host;
        let origin: http::Uri = host
            .parse()
            .map_err(|e| ClientConnectError::InvalidUri(host.clone(), e))?;

        let client = Client::builder(TokioExecutor::new()).build_http();
        let service = tower::ServiceBuilder::new()
            .layer(GrpcWebClientLayer::new())
            .service(client);

        tracing::debug!(host = %host, "using gRPC-Web transport");

        Ok(Self::from_grpc_client(
            configure(GrpcClient::with_origin(service, origin), config),
            schema,
        ))
    }
}

fn configure<S>(client: GrpcClient<S>, config: &ClientConfig) -> GrpcClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    let client = client.with_default_metadata(config.default_metadata.clone());
    match config.timeout {
        Some(timeout) => client.with_timeout(timeout),
        None => client,
    }
}

impl<S> CtrlClient<Online<S>>
where
    S: tonic::client::GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a client from an existing service, e.g. an in-process server or a custom
    /// `tower` stack.
    pub fn from_service(service: S, schema: Schema) -> Self {
        Self::from_grpc_client(GrpcClient::new(service), schema)
    }

    pub fn from_grpc_client(grpc_client: GrpcClient<S>, schema: Schema) -> Self {
        Self {
            state: Online {
                grpc_client,
                schema,
            },
        }
    }

    /// Performs a unary call with a message built by the caller.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        message: DynamicMessage,
        headers: &[(String, String)],
    ) -> Result<DynamicMessage, GrpcRequestError> {
        self.state.grpc_client.unary(method, message, headers).await
    }

    /// Executes a unary call whose request and response are JSON projections.
    ///
    /// 1. Resolves `request.service` and `request.method` in the schema.
    /// 2. Builds the request message from `request.body`.
    /// 3. Executes the call and projects the response back to JSON.
    pub async fn dynamic(
        &mut self,
        request: DynamicRequest,
    ) -> Result<serde_json::Value, DynamicCallError> {
        let method = self
            .state
            .schema()
            .get_service_by_name(&request.service)
            .ok_or_else(|| DynamicCallError::ServiceNotFound(request.service.clone()))?
            .get_method(&request.method)
            .ok_or_else(|| DynamicCallError::MethodNotFound(request.method.clone()))?;

        let message = DynamicMessage::from_json(method.input(), &request.body)?;
        let response = self.unary(&method, message, &request.headers).await?;

        Ok(response.to_json())
    }
}
