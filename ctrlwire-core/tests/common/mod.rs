//! An in-process control-plane server for integration tests.
//!
//! Requests are routed by gRPC path to closures registered with [`MockControlPlane::on`]
//! and decoded with the same [`DynamicCodec`] the client uses.
use ctrlwire_core::grpc::codec::DynamicCodec;
use ctrlwire_core::message::DynamicMessage;
use ctrlwire_core::schema::Schema;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::{Ready, ready};
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::codegen::BoxFuture;
use tonic::server::UnaryService;
use tonic::{Request, Response, Status};

type Handler =
    Arc<dyn Fn(Request<DynamicMessage>) -> Result<Response<DynamicMessage>, Status> + Send + Sync>;

#[derive(Clone)]
pub struct MockControlPlane {
    schema: Schema,
    handlers: HashMap<String, Handler>,
}

impl MockControlPlane {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            handlers: HashMap::new(),
        }
    }

    /// Answers calls to `path` (e.g. `/controlplane.v1.WorkflowService/List`) with `handler`.
    pub fn on<F>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<DynamicMessage>) -> Result<Response<DynamicMessage>, Status>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(path.to_string(), Arc::new(handler));
        self
    }
}

struct UnaryHandler(Handler);

impl UnaryService<DynamicMessage> for UnaryHandler {
    type Response = DynamicMessage;
    type Future = Ready<Result<Response<DynamicMessage>, Status>>;

    fn call(&mut self, request: Request<DynamicMessage>) -> Self::Future {
        ready((self.0)(request))
    }
}

impl tower::Service<http::Request<tonic::body::Body>> for MockControlPlane {
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<tonic::body::Body>) -> Self::Future {
        let path = req.uri().path().to_string();
        let method = self.schema.get_method_by_path(&path);
        let handler = self.handlers.get(&path).cloned();

        match (method, handler) {
            (Some(method), Some(handler)) => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(DynamicCodec::new(method.input()));
                Ok(grpc.unary(UnaryHandler(handler), req).await)
            }),
            _ => Box::pin(async move {
                let mut response = http::Response::new(tonic::body::Body::default());
                let headers = response.headers_mut();
                headers.insert(
                    tonic::Status::GRPC_STATUS,
                    (tonic::Code::Unimplemented as i32).into(),
                );
                headers.insert(
                    http::header::CONTENT_TYPE,
                    tonic::metadata::GRPC_CONTENT_TYPE,
                );
                Ok(response)
            }),
        }
    }
}
