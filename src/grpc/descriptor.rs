//! The `a2a.v1` protobuf schema, assembled as descriptors at runtime.
//!
//! Field numbers follow `a2a.proto`. JSON names match the uniform types in
//! [`crate::types`], so a uniform value converts to a `DynamicMessage` and
//! back through the proto3 JSON mapping alone.

use std::sync::OnceLock;

use prost_reflect::{DescriptorPool, ServiceDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions, MethodDescriptorProto, OneofDescriptorProto,
    ServiceDescriptorProto,
};

/// Fully qualified name of the A2A gRPC service.
pub const SERVICE_NAME: &str = "a2a.v1.A2AService";

const PACKAGE: &str = "a2a.v1";

/// The schema could not be registered.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid a2a.v1 schema: {0}")]
pub struct SchemaError(String);

/// The `a2a.v1.A2AService` descriptor. Built once per process.
pub fn a2a_service() -> Result<ServiceDescriptor, SchemaError> {
    static SERVICE: OnceLock<Result<ServiceDescriptor, SchemaError>> = OnceLock::new();
    SERVICE.get_or_init(build_service).clone()
}

fn build_service() -> Result<ServiceDescriptor, SchemaError> {
    // The global pool already holds the well-known types.
    let mut pool = DescriptorPool::global();
    pool.add_file_descriptor_proto(a2a_file())
        .map_err(|e| SchemaError(e.to_string()))?;
    pool.get_service_by_name(SERVICE_NAME)
        .ok_or_else(|| SchemaError(format!("{SERVICE_NAME} is missing")))
}

#[derive(Clone, Copy)]
enum Kind {
    String,
    Bytes,
    Bool,
    Int32,
    Enum(&'static str),
    Message(&'static str),
}

const STRUCT: Kind = Kind::Message(".google.protobuf.Struct");
const TIMESTAMP: Kind = Kind::Message(".google.protobuf.Timestamp");

impl Kind {
    fn proto_type(self) -> (Type, Option<String>) {
        match self {
            Kind::String => (Type::String, None),
            Kind::Bytes => (Type::Bytes, None),
            Kind::Bool => (Type::Bool, None),
            Kind::Int32 => (Type::Int32, None),
            Kind::Enum(name) => (Type::Enum, Some(qualify(name))),
            Kind::Message(name) => (Type::Message, Some(qualify(name))),
        }
    }
}

fn qualify(name: &str) -> String {
    if name.starts_with('.') {
        name.to_string()
    } else {
        format!(".{PACKAGE}.{name}")
    }
}

/// `snake_case` to the proto3 JSON name, e.g. `oauth2_metadata_url` to
/// `oauth2MetadataUrl`.
fn json_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn upper_camel(field: &str) -> String {
    let lower = json_name(field);
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn field(name: &str, number: i32, kind: Kind, label: Label) -> FieldDescriptorProto {
    let (ty, type_name) = kind.proto_type();
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name,
        json_name: Some(json_name(name)),
        ..Default::default()
    }
}

struct Msg {
    name: &'static str,
    proto: DescriptorProto,
}

impl Msg {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            proto: DescriptorProto {
                name: Some(name.to_string()),
                ..Default::default()
            },
        }
    }

    fn field(mut self, name: &str, number: i32, kind: Kind) -> Self {
        self.proto.field.push(field(name, number, kind, Label::Optional));
        self
    }

    fn repeated(mut self, name: &str, number: i32, kind: Kind) -> Self {
        self.proto.field.push(field(name, number, kind, Label::Repeated));
        self
    }

    fn oneof(mut self, name: &str, members: &[(&str, i32, Kind)]) -> Self {
        let index = self.proto.oneof_decl.len() as i32;
        self.proto.oneof_decl.push(OneofDescriptorProto {
            name: Some(name.to_string()),
            ..Default::default()
        });
        for &(member, number, kind) in members {
            let mut member = field(member, number, kind, Label::Optional);
            member.oneof_index = Some(index);
            self.proto.field.push(member);
        }
        self
    }

    /// `map<string, value>`.
    fn map(mut self, name: &str, number: i32, value: Kind) -> Self {
        let entry = format!("{}Entry", upper_camel(name));
        self.proto.nested_type.push(DescriptorProto {
            name: Some(entry.clone()),
            field: vec![
                field("key", 1, Kind::String, Label::Optional),
                field("value", 2, value, Label::Optional),
            ],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });
        self.proto.field.push(FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Repeated as i32),
            r#type: Some(Type::Message as i32),
            type_name: Some(format!("{}.{entry}", qualify(self.name))),
            json_name: Some(json_name(name)),
            ..Default::default()
        });
        self
    }

    /// Overrides the JSON name of an existing field.
    fn json(mut self, field: &str, json: &str) -> Self {
        if let Some(f) = self
            .proto
            .field
            .iter_mut()
            .find(|f| f.name.as_deref() == Some(field))
        {
            f.json_name = Some(json.to_string());
        }
        self
    }

    fn build(self) -> DescriptorProto {
        self.proto
    }
}

fn enumeration(name: &str, values: &[&str]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: values
            .iter()
            .zip(0..)
            .map(|(value, number)| EnumValueDescriptorProto {
                name: Some(value.to_string()),
                number: Some(number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn method(name: &str, input: &str, output: &str, streaming: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(qualify(input)),
        output_type: Some(qualify(output)),
        client_streaming: Some(false),
        server_streaming: Some(streaming),
        ..Default::default()
    }
}

fn messages() -> Vec<DescriptorProto> {
    use Kind::*;

    vec![
        Msg::new("SendMessageConfiguration")
            .repeated("accepted_output_modes", 1, String)
            .field("push_notification", 2, Message("PushNotificationConfig"))
            .field("history_length", 3, Int32)
            .field("blocking", 4, Bool),
        Msg::new("Task")
            .field("id", 1, String)
            .field("context_id", 2, String)
            .field("status", 3, Message("TaskStatus"))
            .repeated("artifacts", 4, Message("Artifact"))
            .repeated("history", 5, Message("Message"))
            .field("metadata", 6, STRUCT),
        Msg::new("TaskStatus")
            .field("state", 1, Enum("TaskState"))
            .field("update", 2, Message("Message"))
            .field("timestamp", 3, TIMESTAMP)
            .json("update", "message"),
        Msg::new("Part")
            .oneof(
                "part",
                &[
                    ("text", 1, String),
                    ("file", 2, Message("FilePart")),
                    ("data", 3, Message("DataPart")),
                ],
            )
            .field("metadata", 4, STRUCT),
        Msg::new("FilePart")
            .oneof("file", &[("file_with_uri", 1, String), ("file_with_bytes", 2, Bytes)])
            .field("mime_type", 3, String)
            .field("name", 4, String),
        Msg::new("DataPart").field("data", 1, STRUCT),
        Msg::new("Message")
            .field("message_id", 1, String)
            .field("context_id", 2, String)
            .field("task_id", 3, String)
            .field("role", 4, Enum("Role"))
            .repeated("content", 5, Message("Part"))
            .field("metadata", 6, STRUCT)
            .repeated("extensions", 7, String),
        Msg::new("Artifact")
            .field("artifact_id", 1, String)
            .field("name", 3, String)
            .field("description", 4, String)
            .repeated("parts", 5, Message("Part"))
            .field("metadata", 6, STRUCT)
            .repeated("extensions", 7, String),
        Msg::new("TaskStatusUpdateEvent")
            .field("task_id", 1, String)
            .field("context_id", 2, String)
            .field("status", 3, Message("TaskStatus"))
            .field("final", 4, Bool)
            .field("metadata", 5, STRUCT),
        Msg::new("TaskArtifactUpdateEvent")
            .field("task_id", 1, String)
            .field("context_id", 2, String)
            .field("artifact", 3, Message("Artifact"))
            .field("append", 4, Bool)
            .field("last_chunk", 5, Bool)
            .field("metadata", 6, STRUCT),
        Msg::new("PushNotificationConfig")
            .field("id", 1, String)
            .field("url", 2, String)
            .field("token", 3, String)
            .field("authentication", 4, Message("AuthenticationInfo")),
        Msg::new("AuthenticationInfo")
            .repeated("schemes", 1, String)
            .field("credentials", 2, String),
        Msg::new("AgentInterface")
            .field("url", 1, String)
            .field("transport", 2, String),
        Msg::new("AgentCard")
            .field("name", 1, String)
            .field("description", 2, String)
            .field("url", 3, String)
            .field("provider", 4, Message("AgentProvider"))
            .field("version", 5, String)
            .field("documentation_url", 6, String)
            .field("capabilities", 7, Message("AgentCapabilities"))
            .map("security_schemes", 8, Message("SecurityScheme"))
            .repeated("security", 9, Message("Security"))
            .repeated("default_input_modes", 10, String)
            .repeated("default_output_modes", 11, String)
            .repeated("skills", 12, Message("AgentSkill"))
            .field("supports_authenticated_extended_card", 13, Bool)
            .field("preferred_transport", 14, String)
            .repeated("additional_interfaces", 15, Message("AgentInterface"))
            .field("protocol_version", 16, String)
            .repeated("signatures", 17, Message("AgentCardSignature"))
            .field("icon_url", 18, String),
        Msg::new("AgentProvider")
            .field("url", 1, String)
            .field("organization", 2, String),
        Msg::new("AgentCapabilities")
            .field("streaming", 1, Bool)
            .field("push_notifications", 2, Bool)
            .repeated("extensions", 3, Message("AgentExtension"))
            .field("state_transition_history", 4, Bool),
        Msg::new("AgentExtension")
            .field("uri", 1, String)
            .field("description", 2, String)
            .field("required", 3, Bool)
            .field("params", 4, STRUCT),
        Msg::new("AgentSkill")
            .field("id", 1, String)
            .field("name", 2, String)
            .field("description", 3, String)
            .repeated("tags", 4, String)
            .repeated("examples", 5, String)
            .repeated("input_modes", 6, String)
            .repeated("output_modes", 7, String)
            .repeated("security", 8, Message("Security")),
        Msg::new("AgentCardSignature")
            .field("protected", 1, String)
            .field("signature", 2, String)
            .field("header", 3, STRUCT),
        Msg::new("TaskPushNotificationConfig")
            .field("name", 1, String)
            .field("push_notification_config", 2, Message("PushNotificationConfig")),
        Msg::new("StringList").repeated("list", 1, String),
        Msg::new("Security").map("schemes", 1, Message("StringList")),
        Msg::new("SecurityScheme").oneof(
            "scheme",
            &[
                ("api_key_security_scheme", 1, Message("APIKeySecurityScheme")),
                ("http_auth_security_scheme", 2, Message("HTTPAuthSecurityScheme")),
                ("oauth2_security_scheme", 3, Message("OAuth2SecurityScheme")),
                ("open_id_connect_security_scheme", 4, Message("OpenIdConnectSecurityScheme")),
                ("mtls_security_scheme", 5, Message("MutualTlsSecurityScheme")),
            ],
        ),
        Msg::new("APIKeySecurityScheme")
            .field("description", 1, String)
            .field("location", 2, String)
            .field("name", 3, String),
        Msg::new("HTTPAuthSecurityScheme")
            .field("description", 1, String)
            .field("scheme", 2, String)
            .field("bearer_format", 3, String),
        Msg::new("OAuth2SecurityScheme")
            .field("description", 1, String)
            .field("flows", 2, Message("OAuthFlows"))
            .field("oauth2_metadata_url", 3, String),
        Msg::new("OpenIdConnectSecurityScheme")
            .field("description", 1, String)
            .field("open_id_connect_url", 2, String),
        Msg::new("MutualTlsSecurityScheme").field("description", 1, String),
        Msg::new("OAuthFlows").oneof(
            "flow",
            &[
                ("authorization_code", 1, Message("AuthorizationCodeOAuthFlow")),
                ("client_credentials", 2, Message("ClientCredentialsOAuthFlow")),
                ("implicit", 3, Message("ImplicitOAuthFlow")),
                ("password", 4, Message("PasswordOAuthFlow")),
            ],
        ),
        Msg::new("AuthorizationCodeOAuthFlow")
            .field("authorization_url", 1, String)
            .field("token_url", 2, String)
            .field("refresh_url", 3, String)
            .map("scopes", 4, String),
        Msg::new("ClientCredentialsOAuthFlow")
            .field("token_url", 1, String)
            .field("refresh_url", 2, String)
            .map("scopes", 3, String),
        Msg::new("ImplicitOAuthFlow")
            .field("authorization_url", 1, String)
            .field("refresh_url", 2, String)
            .map("scopes", 3, String),
        Msg::new("PasswordOAuthFlow")
            .field("token_url", 1, String)
            .field("refresh_url", 2, String)
            .map("scopes", 3, String),
        Msg::new("SendMessageRequest")
            .field("request", 1, Message("Message"))
            .field("configuration", 2, Message("SendMessageConfiguration"))
            .field("metadata", 3, STRUCT)
            .json("request", "message"),
        Msg::new("GetTaskRequest")
            .field("name", 1, String)
            .field("history_length", 2, Int32),
        Msg::new("CancelTaskRequest").field("name", 1, String),
        Msg::new("TaskSubscriptionRequest").field("name", 1, String),
        Msg::new("ListTasksRequest")
            .field("context_id", 1, String)
            .field("status", 2, Enum("TaskState"))
            .field("page_size", 3, Int32)
            .field("page_token", 4, String)
            .field("history_length", 5, Int32),
        Msg::new("ListTasksResponse")
            .repeated("tasks", 1, Message("Task"))
            .field("next_page_token", 2, String),
        Msg::new("CreateTaskPushNotificationConfigRequest")
            .field("parent", 1, String)
            .field("config_id", 2, String)
            .field("config", 3, Message("TaskPushNotificationConfig")),
        Msg::new("GetTaskPushNotificationConfigRequest").field("name", 1, String),
        Msg::new("ListTaskPushNotificationConfigRequest")
            .field("parent", 1, String)
            .field("page_size", 2, Int32)
            .field("page_token", 3, String),
        Msg::new("ListTaskPushNotificationConfigResponse")
            .repeated("configs", 1, Message("TaskPushNotificationConfig"))
            .field("next_page_token", 2, String),
        Msg::new("DeleteTaskPushNotificationConfigRequest").field("name", 1, String),
        Msg::new("GetAgentCardRequest"),
        Msg::new("SendMessageResponse")
            .oneof("payload", &[("task", 1, Message("Task")), ("msg", 2, Message("Message"))])
            .json("msg", "message"),
        Msg::new("StreamResponse")
            .oneof(
                "payload",
                &[
                    ("task", 1, Message("Task")),
                    ("msg", 2, Message("Message")),
                    ("status_update", 3, Message("TaskStatusUpdateEvent")),
                    ("artifact_update", 4, Message("TaskArtifactUpdateEvent")),
                ],
            )
            .json("msg", "message"),
    ]
    .into_iter()
    .map(Msg::build)
    .collect()
}

fn a2a_file() -> FileDescriptorProto {
    let service = ServiceDescriptorProto {
        name: Some("A2AService".to_string()),
        method: vec![
            method("SendMessage", "SendMessageRequest", "SendMessageResponse", false),
            method("SendStreamingMessage", "SendMessageRequest", "StreamResponse", true),
            method("GetTask", "GetTaskRequest", "Task", false),
            method("ListTasks", "ListTasksRequest", "ListTasksResponse", false),
            method("CancelTask", "CancelTaskRequest", "Task", false),
            method("TaskSubscription", "TaskSubscriptionRequest", "StreamResponse", true),
            method(
                "CreateTaskPushNotificationConfig",
                "CreateTaskPushNotificationConfigRequest",
                "TaskPushNotificationConfig",
                false,
            ),
            method(
                "GetTaskPushNotificationConfig",
                "GetTaskPushNotificationConfigRequest",
                "TaskPushNotificationConfig",
                false,
            ),
            method(
                "ListTaskPushNotificationConfig",
                "ListTaskPushNotificationConfigRequest",
                "ListTaskPushNotificationConfigResponse",
                false,
            ),
            method("GetAgentCard", "GetAgentCardRequest", "AgentCard", false),
            method(
                "DeleteTaskPushNotificationConfig",
                "DeleteTaskPushNotificationConfigRequest",
                ".google.protobuf.Empty",
                false,
            ),
        ],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("a2a.proto".to_string()),
        package: Some(PACKAGE.to_string()),
        dependency: vec![
            "google/protobuf/empty.proto".to_string(),
            "google/protobuf/struct.proto".to_string(),
            "google/protobuf/timestamp.proto".to_string(),
        ],
        message_type: messages(),
        enum_type: vec![
            enumeration(
                "TaskState",
                &[
                    "TASK_STATE_UNSPECIFIED",
                    "TASK_STATE_SUBMITTED",
                    "TASK_STATE_WORKING",
                    "TASK_STATE_COMPLETED",
                    "TASK_STATE_FAILED",
                    "TASK_STATE_CANCELLED",
                    "TASK_STATE_INPUT_REQUIRED",
                    "TASK_STATE_REJECTED",
                    "TASK_STATE_AUTH_REQUIRED",
                ],
            ),
            enumeration("Role", &["ROLE_UNSPECIFIED", "ROLE_USER", "ROLE_AGENT"]),
        ],
        service: vec![service],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}
