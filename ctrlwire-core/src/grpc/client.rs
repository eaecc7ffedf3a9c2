//! # Unary gRPC client
//!
//! Wraps `tonic::client::Grpc` to perform unary calls described by a [`MethodDescriptor`].
//!
//! ## Call lifecycle
//!
//! Each call goes `Idle -> Sent -> {Succeeded, Failed}`; there are no retries. On an `OK`
//! status the response body is decoded with the method's output descriptor, any other
//! status becomes an [`RpcError`]. Dropping the returned future cancels the call.
//!
//! ## Metadata
//!
//! Default metadata configured on the client is sent with every call. Per-call metadata
//! is applied afterwards, so it wins on key collisions.
use super::codec::DynamicCodec;
use crate::BoxError;
use crate::message::DynamicMessage;
use crate::schema::MethodDescriptor;
use http_body::Body as HttpBody;
use std::str::FromStr;
use std::time::Duration;
use tonic::{
    Code,
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataMap, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};

/// A non-OK gRPC status returned by the server or the transport.
///
/// Callers branch on [`RpcError::code`]; the message is for humans.
#[derive(Debug, Clone, thiserror::Error)]
#[error("RPC failed with status {code:?}: '{message}'")]
pub struct RpcError {
    pub code: Code,
    pub message: String,
    /// Trailing metadata sent with the status.
    pub metadata: MetadataMap,
}

impl RpcError {
    /// The numeric gRPC status code (`7` for `PERMISSION_DENIED`).
    pub fn code_number(&self) -> i32 {
        self.code as i32
    }
}

impl From<tonic::Status> for RpcError {
    fn from(status: tonic::Status) -> Self {
        Self {
            code: status.code(),
            message: status.message().to_string(),
            metadata: status.metadata().clone(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
    #[error("Method '{method}' expects '{expected}' but the request is a '{found}'")]
    RequestTypeMismatch {
        method: String,
        expected: String,
        found: String,
    },
    #[error(transparent)]
    Status(#[from] RpcError),
}

impl GrpcRequestError {
    /// The status of a call that reached the server, if any.
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            GrpcRequestError::Status(err) => Some(err),
            _ => None,
        }
    }
}

/// A unary gRPC client generic over the underlying HTTP service.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
    default_metadata: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self::from_grpc(tonic::client::Grpc::new(service))
    }

    /// Creates a client that rewrites every request URI onto `origin`.
    ///
    /// Required for services such as a plain HTTP client that route on the request URI.
    pub fn with_origin(service: S, origin: http::Uri) -> Self {
        Self::from_grpc(tonic::client::Grpc::with_origin(service, origin))
    }

    fn from_grpc(client: tonic::client::Grpc<S>) -> Self {
        Self {
            client,
            default_metadata: Vec::new(),
            timeout: None,
        }
    }

    /// Metadata attached to every call, e.g. an `authorization` header.
    pub fn with_default_metadata(mut self, metadata: Vec<(String, String)>) -> Self {
        self.default_metadata = metadata;
        self
    }

    /// Sets a `grpc-timeout` deadline on every call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Performs a Unary gRPC call (Single Request -> Single Response).
    ///
    /// # Returns
    ///
    /// * `Ok(DynamicMessage)` - The server answered `OK`; the message has the method's output type.
    /// * `Err(GrpcRequestError::Status)` - The call completed with a non-OK status.
    /// * `Err(GrpcRequestError)` - The request could not be built or sent.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        payload: DynamicMessage,
        headers: &[(String, String)],
    ) -> Result<DynamicMessage, GrpcRequestError> {
        let input = method.input();
        if payload.descriptor() != &input {
            return Err(GrpcRequestError::RequestTypeMismatch {
                method: method.path(),
                expected: input.full_name().to_string(),
                found: payload.descriptor().full_name().to_string(),
            });
        }

        let path = http_path(method);
        let request = self.build_request(payload, headers)?;

        self.client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        tracing::debug!(path = %path, "sending unary request");

        let codec = DynamicCodec::new(method.output());
        match self.client.unary(request, path.clone(), codec).await {
            Ok(response) => {
                tracing::debug!(path = %path, "unary call succeeded");
                Ok(response.into_inner())
            }
            Err(status) => {
                tracing::warn!(
                    path = %path,
                    code = ?status.code(),
                    message = status.message(),
                    "unary call failed"
                );
                Err(RpcError::from(status).into())
            }
        }
    }

    fn build_request<T>(
        &self,
        payload: T,
        headers: &[(String, String)],
    ) -> Result<tonic::Request<T>, GrpcRequestError> {
        let mut request = tonic::Request::new(payload);

        for (k, v) in self.default_metadata.iter().chain(headers) {
            let key =
                MetadataKey::from_str(k).map_err(|source| GrpcRequestError::InvalidMetadataKey {
                    key: k.clone(),
                    source,
                })?;
            let val = MetadataValue::from_str(v).map_err(|source| {
                GrpcRequestError::InvalidMetadataValue {
                    key: k.clone(),
                    source,
                }
            })?;
            request.metadata_mut().insert(key, val);
        }

        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }

        Ok(request)
    }
}

fn http_path(method: &MethodDescriptor) -> http::uri::PathAndQuery {
    http::uri::PathAndQuery::from_str(&method.path())
        .expect("schema validates service and method names")
}
