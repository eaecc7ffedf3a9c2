use assert_matches::assert_matches;
use common::MockControlPlane;
use ctrlwire_core::client::{CtrlClient, Descriptor, DynamicRequest, Online};
use ctrlwire_core::client::online::DynamicCallError;
use ctrlwire_core::controlplane;
use ctrlwire_core::grpc::client::{GrpcClient, GrpcRequestError};
use ctrlwire_core::message::{DynamicMessage, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use tonic::metadata::MetadataMap;
use tonic::{Code, Response, Status};

mod common;

const LIST: &str = "/controlplane.v1.WorkflowService/List";
const DELETE: &str = "/controlplane.v1.WorkflowService/Delete";

fn list_response(items: serde_json::Value) -> Result<Response<DynamicMessage>, Status> {
    let desc = controlplane::schema()
        .get_message_by_name("controlplane.v1.WorkflowServiceListResponse")
        .unwrap();
    let message = DynamicMessage::from_json(desc, &json!({ "result": items }))
        .map_err(|e| Status::internal(e.to_string()))?;
    Ok(Response::new(message))
}

fn setup_client(server: MockControlPlane) -> CtrlClient<Online<MockControlPlane>> {
    CtrlClient::from_service(server, controlplane::schema())
}

fn list_request(body: serde_json::Value, headers: Vec<(String, String)>) -> DynamicRequest {
    DynamicRequest {
        service: "controlplane.v1.WorkflowService".to_string(),
        method: "List".to_string(),
        body,
        headers,
    }
}

#[tokio::test]
async fn test_list_resolves_with_server_items() {
    let server = MockControlPlane::new(controlplane::schema()).on(LIST, |request| {
        let filter = request.get_ref().to_json();
        assert_eq!(filter, json!({"projectNames": ["core"], "workflowPublic": false}));

        list_response(json!([
            {"id": "wf-1", "name": "build", "project": "core", "runsCount": 3},
            {"id": "wf-2", "name": "release", "project": "core", "createdAt": "2024-01-02T03:04:05Z"}
        ]))
    });
    let mut client = setup_client(server);

    let response = client
        .dynamic(list_request(
            json!({"projectNames": ["core"], "workflowPublic": false}),
            vec![],
        ))
        .await
        .unwrap();

    assert_eq!(
        response,
        json!({
            "result": [
                {"id": "wf-1", "name": "build", "project": "core", "runsCount": 3},
                {"id": "wf-2", "name": "release", "project": "core", "createdAt": "2024-01-02T03:04:05Z"}
            ]
        })
    );
}

#[tokio::test]
async fn test_permission_denied_rejects_with_code_and_message() {
    let server = MockControlPlane::new(controlplane::schema()).on(LIST, |_| {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-denied-by", "policy".parse().unwrap());
        Err(Status::with_metadata(
            Code::PermissionDenied,
            "permission denied",
            metadata,
        ))
    });
    let mut client = setup_client(server);

    let err = client
        .dynamic(list_request(json!({}), vec![]))
        .await
        .unwrap_err();

    let err = match err {
        DynamicCallError::GrpcRequestError(err) => err,
        other => panic!("Expected a request error, got {other:?}"),
    };
    let status = err.rpc_error().expect("Expected an RPC status");

    assert_eq!(status.code, Code::PermissionDenied);
    assert_eq!(status.code_number(), 7);
    assert_eq!(status.message, "permission denied");
    assert_eq!(
        status.metadata.get("x-denied-by").and_then(|v| v.to_str().ok()),
        Some("policy")
    );
}

#[tokio::test]
async fn test_call_metadata_overrides_defaults() {
    let server = MockControlPlane::new(controlplane::schema()).on(LIST, |request| {
        let header = |key: &str| {
            request
                .metadata()
                .get(key)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        list_response(json!([
            {"id": header("authorization")},
            {"id": header("x-org")}
        ]))
    });

    let grpc_client = GrpcClient::new(server).with_default_metadata(vec![
        ("authorization".to_string(), "Bearer default".to_string()),
        ("x-org".to_string(), "acme".to_string()),
    ]);
    let mut client = CtrlClient::from_grpc_client(grpc_client, controlplane::schema());

    let response = client
        .dynamic(list_request(
            json!({}),
            vec![("authorization".to_string(), "Bearer call".to_string())],
        ))
        .await
        .unwrap();

    assert_eq!(
        response,
        json!({"result": [{"id": "Bearer call"}, {"id": "acme"}]})
    );
}

#[tokio::test]
async fn test_typed_unary_call() {
    let server = MockControlPlane::new(controlplane::schema()).on(DELETE, |request| {
        let name = request
            .get_ref()
            .get_by_name("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if name != "build" {
            return Err(Status::not_found(format!("workflow '{name}' not found")));
        }

        let desc = controlplane::schema()
            .get_message_by_name("controlplane.v1.WorkflowServiceDeleteResponse")
            .unwrap();
        Ok(Response::new(DynamicMessage::new(desc)))
    });
    let mut client = setup_client(server);

    let schema = controlplane::schema();
    let method = schema.get_method_by_path(DELETE).unwrap();

    let request =
        DynamicMessage::from_partial(method.input(), [("name", Value::from("build"))]).unwrap();
    let response = client.unary(&method, request, &[]).await.unwrap();
    assert_eq!(response.descriptor(), &method.output());

    let request =
        DynamicMessage::from_partial(method.input(), [("name", Value::from("ghost"))]).unwrap();
    let err = client.unary(&method, request, &[]).await.unwrap_err();
    assert_matches!(
        err.rpc_error(),
        Some(status) if status.code == Code::NotFound && status.message == "workflow 'ghost' not found"
    );
}

#[tokio::test]
async fn test_request_type_is_checked_before_sending() {
    let server = MockControlPlane::new(controlplane::schema())
        .on(DELETE, |_| Err(Status::internal("must not be reached")));
    let mut client = setup_client(server);

    let schema = controlplane::schema();
    let method = schema.get_method_by_path(DELETE).unwrap();
    let wrong = DynamicMessage::new(
        schema
            .get_message_by_name("controlplane.v1.WorkflowItem")
            .unwrap(),
    );

    let err = client.unary(&method, wrong, &[]).await.unwrap_err();
    assert_matches!(
        err,
        GrpcRequestError::RequestTypeMismatch { expected, .. }
            if expected == "controlplane.v1.WorkflowServiceDeleteRequest"
    );
}

#[tokio::test]
async fn test_unhandled_method_is_unimplemented() {
    let mut client = setup_client(MockControlPlane::new(controlplane::schema()));

    let err = client
        .dynamic(DynamicRequest {
            service: "controlplane.v1.GroupService".to_string(),
            method: "List".to_string(),
            body: json!({"groupName": "admins"}),
            headers: vec![],
        })
        .await
        .unwrap_err();

    assert_matches!(
        err,
        DynamicCallError::GrpcRequestError(GrpcRequestError::Status(status))
            if status.code == Code::Unimplemented
    );
}

#[tokio::test]
async fn test_error_cases() {
    let mut client = setup_client(MockControlPlane::new(controlplane::schema()));

    // 1. Service Not Found
    let mut req = list_request(json!({}), vec![]);
    req.service = "controlplane.v1.GhostService".to_string();
    assert_matches!(
        client.dynamic(req).await,
        Err(DynamicCallError::ServiceNotFound(_))
    );

    // 2. Method Not Found
    let mut req = list_request(json!({}), vec![]);
    req.method = "Watch".to_string();
    assert_matches!(
        client.dynamic(req).await,
        Err(DynamicCallError::MethodNotFound(_))
    );

    // 3. Body does not fit the input type
    let req = list_request(json!({"projectNames": "core"}), vec![]);
    assert_matches!(
        client.dynamic(req).await,
        Err(DynamicCallError::InvalidBody(_))
    );

    // 4. Invalid metadata key
    let req = list_request(json!({}), vec![("bad key".to_string(), "v".to_string())]);
    assert_matches!(
        client.dynamic(req).await,
        Err(DynamicCallError::GrpcRequestError(
            GrpcRequestError::InvalidMetadataKey { .. }
        ))
    );
}

#[tokio::test]
async fn test_online_client_keeps_introspection() {
    let client = setup_client(MockControlPlane::new(controlplane::schema()));

    assert!(
        client
            .list_services()
            .contains(&"controlplane.v1.GroupService".to_string())
    );
    assert_matches!(
        client.get_descriptor_by_symbol("controlplane.v1.Group"),
        Some(Descriptor::MessageDescriptor(_))
    );
}
