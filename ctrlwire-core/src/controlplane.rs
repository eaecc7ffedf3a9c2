//! # Built-in control-plane schema
//!
//! Descriptors for the `controlplane.v1` workflow and group services, so that the common
//! calls work without a `FileDescriptorSet`. Field numbers and names follow the
//! control-plane `.proto` definitions.
//!
//! For any other service, load the server's descriptor set with
//! [`Schema::decode_file_descriptor_set`].
use crate::schema::{
    EnumDef, FieldDef, MessageDef, Schema, SchemaBuilder, ServiceDef, TIMESTAMP_TYPE, TypeDef,
};
use std::sync::LazyLock;

pub const PACKAGE: &str = "controlplane.v1";
pub const WORKFLOW_SERVICE: &str = "controlplane.v1.WorkflowService";
pub const GROUP_SERVICE: &str = "controlplane.v1.GroupService";

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    builder()
        .build()
        .expect("built-in control-plane schema is valid")
});

/// Returns the built-in schema. Every call returns a handle to the same instance.
pub fn schema() -> Schema {
    SCHEMA.clone()
}

fn name(short: &str) -> String {
    format!("{PACKAGE}.{short}")
}

fn message(short: &str) -> TypeDef {
    TypeDef::message(name(short))
}

fn timestamp() -> TypeDef {
    TypeDef::message(TIMESTAMP_TYPE)
}

fn builder() -> SchemaBuilder {
    SchemaBuilder::new()
        .message(
            MessageDef::new(name("OffsetPaginationRequest"))
                .field(FieldDef::new(1, "page", TypeDef::Int32))
                .field(FieldDef::new(2, "page_size", TypeDef::Int32)),
        )
        .message(
            MessageDef::new(name("OffsetPaginationResponse"))
                .field(FieldDef::new(1, "page", TypeDef::Int32))
                .field(FieldDef::new(2, "page_size", TypeDef::Int32))
                .field(FieldDef::new(3, "total_count", TypeDef::Int32))
                .field(FieldDef::new(4, "total_pages", TypeDef::Int32)),
        )
        .message(
            MessageDef::new(name("WorkflowItem"))
                .field(FieldDef::new(1, "id", TypeDef::String))
                .field(FieldDef::new(2, "name", TypeDef::String))
                .field(FieldDef::new(3, "project", TypeDef::String))
                .field(FieldDef::new(4, "team", TypeDef::String))
                .field(FieldDef::new(5, "created_at", timestamp()))
                .field(FieldDef::new(6, "runs_count", TypeDef::Int32))
                .field(FieldDef::new(8, "contract_name", TypeDef::String))
                .field(FieldDef::new(9, "public", TypeDef::Bool))
                .field(FieldDef::new(10, "description", TypeDef::String))
                .field(FieldDef::new(11, "contract_revision_latest", TypeDef::Int32))
                .field(FieldDef::new(12, "project_id", TypeDef::String)),
        )
        .message(
            MessageDef::new(name("WorkflowServiceListRequest"))
                .field(FieldDef::new(1, "workflow_name", TypeDef::String))
                .field(FieldDef::new(2, "project_names", TypeDef::String).repeated())
                .field(FieldDef::new(3, "workflow_description", TypeDef::String))
                .field(FieldDef::new(4, "workflow_team", TypeDef::String))
                .field(FieldDef::new(6, "workflow_public", TypeDef::Bool).optional())
                .field(FieldDef::new(8, "pagination", message("OffsetPaginationRequest"))),
        )
        .message(
            MessageDef::new(name("WorkflowServiceListResponse"))
                .field(FieldDef::new(1, "result", message("WorkflowItem")).repeated())
                .field(FieldDef::new(2, "pagination", message("OffsetPaginationResponse"))),
        )
        .message(
            MessageDef::new(name("WorkflowServiceCreateRequest"))
                .field(FieldDef::new(1, "name", TypeDef::String))
                .field(FieldDef::new(2, "project_name", TypeDef::String))
                .field(FieldDef::new(3, "team", TypeDef::String))
                .field(FieldDef::new(4, "contract_name", TypeDef::String))
                .field(FieldDef::new(5, "description", TypeDef::String))
                .field(FieldDef::new(6, "public", TypeDef::Bool)),
        )
        .message(
            MessageDef::new(name("WorkflowServiceCreateResponse"))
                .field(FieldDef::new(1, "result", message("WorkflowItem"))),
        )
        .message(
            MessageDef::new(name("WorkflowServiceDeleteRequest"))
                .field(FieldDef::new(1, "name", TypeDef::String))
                .field(FieldDef::new(2, "project_name", TypeDef::String)),
        )
        .message(MessageDef::new(name("WorkflowServiceDeleteResponse")))
        .service(
            ServiceDef::new(WORKFLOW_SERVICE)
                .method(
                    "List",
                    name("WorkflowServiceListRequest"),
                    name("WorkflowServiceListResponse"),
                )
                .method(
                    "Create",
                    name("WorkflowServiceCreateRequest"),
                    name("WorkflowServiceCreateResponse"),
                )
                .method(
                    "Delete",
                    name("WorkflowServiceDeleteRequest"),
                    name("WorkflowServiceDeleteResponse"),
                ),
        )
        .enumeration(
            EnumDef::new(name("MembershipRole"))
                .value("MEMBERSHIP_ROLE_UNSPECIFIED", 0)
                .value("MEMBERSHIP_ROLE_ORG_VIEWER", 1)
                .value("MEMBERSHIP_ROLE_ORG_ADMIN", 2)
                .value("MEMBERSHIP_ROLE_ORG_OWNER", 3)
                .value("MEMBERSHIP_ROLE_ORG_MEMBER", 4)
                .value("MEMBERSHIP_ROLE_ORG_CONTRIBUTOR", 5),
        )
        .message(
            MessageDef::new(name("Group"))
                .field(FieldDef::new(1, "id", TypeDef::String))
                .field(FieldDef::new(2, "name", TypeDef::String))
                .field(FieldDef::new(3, "description", TypeDef::String))
                .field(FieldDef::new(4, "organization_id", TypeDef::String))
                .field(FieldDef::new(5, "member_count", TypeDef::Int32))
                .field(FieldDef::new(6, "created_at", timestamp()))
                .field(FieldDef::new(7, "updated_at", timestamp()))
                .field(FieldDef::new(
                    8,
                    "labels",
                    TypeDef::map(TypeDef::String, TypeDef::String),
                )),
        )
        .message(
            MessageDef::new(name("GroupMember"))
                .field(FieldDef::new(1, "user_email", TypeDef::String))
                .field(FieldDef::new(2, "maintainer", TypeDef::Bool))
                .field(FieldDef::new(3, "created_at", timestamp()))
                .field(FieldDef::new(4, "updated_at", timestamp()))
                .field(FieldDef::new(5, "role", TypeDef::enumeration(name("MembershipRole")))),
        )
        .message(
            MessageDef::new(name("GroupServiceListRequest"))
                .field(FieldDef::new(1, "group_name", TypeDef::String).optional())
                .field(FieldDef::new(2, "group_description", TypeDef::String).optional())
                .field(FieldDef::new(3, "member_email", TypeDef::String).optional())
                .field(FieldDef::new(4, "pagination", message("OffsetPaginationRequest"))),
        )
        .message(
            MessageDef::new(name("GroupServiceListResponse"))
                .field(FieldDef::new(1, "groups", message("Group")).repeated())
                .field(FieldDef::new(2, "pagination", message("OffsetPaginationResponse"))),
        )
        .message(
            MessageDef::new(name("GroupServiceListMembersRequest"))
                .field(FieldDef::new(1, "group_name", TypeDef::String))
                .field(FieldDef::new(2, "maintainers", TypeDef::Bool).optional())
                .field(FieldDef::new(3, "member_email", TypeDef::String).optional())
                .field(FieldDef::new(4, "pagination", message("OffsetPaginationRequest"))),
        )
        .message(
            MessageDef::new(name("GroupServiceListMembersResponse"))
                .field(FieldDef::new(1, "members", message("GroupMember")).repeated())
                .field(FieldDef::new(2, "pagination", message("OffsetPaginationResponse"))),
        )
        .service(
            ServiceDef::new(GROUP_SERVICE)
                .method(
                    "List",
                    name("GroupServiceListRequest"),
                    name("GroupServiceListResponse"),
                )
                .method(
                    "ListMembers",
                    name("GroupServiceListMembersRequest"),
                    name("GroupServiceListMembersResponse"),
                ),
        )
}
