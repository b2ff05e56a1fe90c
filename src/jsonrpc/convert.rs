//! Conversion between the uniform contract ([`crate::types`]) and the
//! JSON-RPC dialect ([`super::types`]).
//!
//! Requests go uniform -> dialect, results come back dialect -> uniform.
//! Resource names are parsed here and nowhere else.

use chrono::DateTime;
use serde_json::Value;

use crate::types as pb;

use super::types as rpc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ConversionError(String);

impl ConversionError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

type Result<T> = std::result::Result<T, ConversionError>;

// ============================================================================
// Resource names
// ============================================================================

const TASKS: &str = "tasks";
const PUSH_CONFIGS: &str = "pushNotificationConfigs";

/// A task identifier taken from a `tasks/{id}` resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses `tasks/{id}`.
pub fn parse_task_name(name: &str) -> Result<TaskId> {
    match name.split('/').collect::<Vec<_>>().as_slice() {
        [TASKS, id] if !id.is_empty() => Ok(TaskId(id.to_string())),
        _ => Err(ConversionError::new(format!(
            "invalid task name {name:?}: expected tasks/{{id}}"
        ))),
    }
}

/// Parses `tasks/{id}/pushNotificationConfigs/{configId}`.
pub fn parse_push_config_name(name: &str) -> Result<(TaskId, String)> {
    match name.split('/').collect::<Vec<_>>().as_slice() {
        [TASKS, id, PUSH_CONFIGS, config_id] if !id.is_empty() && !config_id.is_empty() => {
            Ok((TaskId(id.to_string()), config_id.to_string()))
        }
        _ => Err(ConversionError::new(format!(
            "invalid push notification config name {name:?}: \
             expected tasks/{{id}}/pushNotificationConfigs/{{configId}}"
        ))),
    }
}

pub fn push_config_name(task_id: &str, config_id: &str) -> String {
    format!("{TASKS}/{task_id}/{PUSH_CONFIGS}/{config_id}")
}

// ============================================================================
// Helpers
// ============================================================================

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn non_empty_vec<T>(v: Vec<T>) -> Option<Vec<T>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

fn positive(n: i32) -> Option<i32> {
    if n > 0 {
        Some(n)
    } else {
        None
    }
}

fn struct_value(s: Option<pb::Struct>) -> Option<Value> {
    s.map(Value::Object)
}

fn to_struct(value: Option<Value>, what: &str) -> Result<Option<pb::Struct>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(ConversionError::new(format!(
            "{what} must be a JSON object, got {other}"
        ))),
    }
}

fn checked_timestamp(ts: Option<String>) -> Result<Option<String>> {
    match ts {
        Some(ts) => {
            DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| ConversionError::new(format!("invalid timestamp {ts:?}: {e}")))?;
            Ok(Some(ts))
        }
        None => Ok(None),
    }
}

// ============================================================================
// Requests: uniform -> dialect
// ============================================================================

pub fn send_message_params(req: pb::SendMessageRequest) -> Result<rpc::MessageSendParams> {
    let message = req
        .message
        .ok_or_else(|| ConversionError::new("message is required"))?;
    Ok(rpc::MessageSendParams {
        message: message_to_dialect(message)?,
        configuration: req.configuration.map(send_configuration_to_dialect),
        metadata: struct_value(req.metadata),
    })
}

fn send_configuration_to_dialect(
    config: pb::SendMessageConfiguration,
) -> rpc::MessageSendConfiguration {
    rpc::MessageSendConfiguration {
        accepted_output_modes: non_empty_vec(config.accepted_output_modes),
        push_notification_config: config.push_notification.map(push_config_to_dialect),
        history_length: positive(config.history_length),
        blocking: Some(config.blocking),
    }
}

pub fn message_to_dialect(msg: pb::Message) -> Result<rpc::Message> {
    let role = match msg.role {
        pb::Role::User => rpc::Role::User,
        pb::Role::Agent => rpc::Role::Agent,
        pb::Role::Unspecified => {
            return Err(ConversionError::new(format!(
                "message {:?} has no role",
                msg.message_id
            )))
        }
    };
    Ok(rpc::Message {
        message_id: msg.message_id,
        role,
        kind: "message".to_string(),
        parts: msg.content.into_iter().map(part_to_dialect).collect(),
        context_id: non_empty(msg.context_id),
        task_id: non_empty(msg.task_id),
        metadata: struct_value(msg.metadata),
        extensions: non_empty_vec(msg.extensions),
        reference_task_ids: None,
    })
}

fn part_to_dialect(part: pb::Part) -> rpc::Part {
    let metadata = struct_value(part.metadata);
    match part.part {
        pb::PartKind::Text(text) => rpc::Part::Text { text, metadata },
        pb::PartKind::File(file) => {
            let mime_type = non_empty(file.mime_type);
            let name = non_empty(file.name);
            let file = match file.file {
                pb::FileSource::FileWithUri(uri) => rpc::FileContent::Uri(rpc::FileWithUri {
                    uri,
                    mime_type,
                    name,
                }),
                pb::FileSource::FileWithBytes(bytes) => {
                    rpc::FileContent::Bytes(rpc::FileWithBytes {
                        bytes,
                        mime_type,
                        name,
                    })
                }
            };
            rpc::Part::File { file, metadata }
        }
        pb::PartKind::Data(data) => rpc::Part::Data {
            data: Value::Object(data.data),
            metadata,
        },
    }
}

fn push_config_to_dialect(config: pb::PushNotificationConfig) -> rpc::PushNotificationConfig {
    rpc::PushNotificationConfig {
        id: non_empty(config.id),
        url: config.url,
        token: non_empty(config.token),
        authentication: config
            .authentication
            .map(|auth| rpc::PushNotificationAuthenticationInfo {
                schemes: auth.schemes,
                credentials: non_empty(auth.credentials),
            }),
    }
}

pub fn get_task_params(req: pb::GetTaskRequest) -> Result<rpc::TaskQueryParams> {
    let id = parse_task_name(&req.name)?;
    Ok(rpc::TaskQueryParams {
        id: id.into_string(),
        history_length: positive(req.history_length),
        metadata: None,
    })
}

/// `{id}` params for cancel, resubscribe and push config listing.
pub fn task_id_params(name: &str) -> Result<rpc::TaskIdParams> {
    Ok(rpc::TaskIdParams::new(parse_task_name(name)?.into_string()))
}

pub fn set_push_config_params(
    req: pb::CreateTaskPushNotificationConfigRequest,
) -> Result<rpc::TaskPushNotificationConfig> {
    let task_id = parse_task_name(&req.parent)?;
    let mut config = req
        .config
        .and_then(|c| c.push_notification_config)
        .ok_or_else(|| ConversionError::new("push notification config is required"))?;
    if config.id.is_empty() {
        config.id = req.config_id;
    }
    Ok(rpc::TaskPushNotificationConfig {
        task_id: task_id.into_string(),
        push_notification_config: push_config_to_dialect(config),
    })
}

pub fn get_push_config_params(name: &str) -> Result<rpc::GetTaskPushNotificationConfigParams> {
    let (task_id, config_id) = parse_push_config_name(name)?;
    Ok(rpc::GetTaskPushNotificationConfigParams {
        id: task_id.into_string(),
        push_notification_config_id: Some(config_id),
        metadata: None,
    })
}

pub fn delete_push_config_params(
    name: &str,
) -> Result<rpc::DeleteTaskPushNotificationConfigParams> {
    let (task_id, config_id) = parse_push_config_name(name)?;
    Ok(rpc::DeleteTaskPushNotificationConfigParams {
        id: task_id.into_string(),
        push_notification_config_id: config_id,
        metadata: None,
    })
}

// ============================================================================
// Results: dialect -> uniform
// ============================================================================

pub fn send_message_response(resp: rpc::SendMessageResponse) -> Result<pb::SendMessageResponse> {
    Ok(match resp {
        rpc::SendMessageResponse::Task(task) => pb::SendMessageResponse::Task(task_from_dialect(task)?),
        rpc::SendMessageResponse::Message(msg) => {
            pb::SendMessageResponse::Message(message_from_dialect(msg)?)
        }
    })
}

pub fn stream_response(event: rpc::StreamResponse) -> Result<pb::StreamResponse> {
    Ok(match event {
        rpc::StreamResponse::Task(task) => pb::StreamResponse::Task(task_from_dialect(task)?),
        rpc::StreamResponse::Message(msg) => pb::StreamResponse::Message(message_from_dialect(msg)?),
        rpc::StreamResponse::StatusUpdate(update) => {
            pb::StreamResponse::StatusUpdate(pb::TaskStatusUpdateEvent {
                task_id: update.task_id,
                context_id: update.context_id,
                status: Some(status_from_dialect(update.status)?),
                r#final: update.r#final,
                metadata: to_struct(update.metadata, "status update metadata")?,
            })
        }
        rpc::StreamResponse::ArtifactUpdate(update) => {
            pb::StreamResponse::ArtifactUpdate(pb::TaskArtifactUpdateEvent {
                task_id: update.task_id,
                context_id: update.context_id,
                artifact: Some(artifact_from_dialect(update.artifact)?),
                append: update.append.unwrap_or(false),
                last_chunk: update.last_chunk.unwrap_or(false),
                metadata: to_struct(update.metadata, "artifact update metadata")?,
            })
        }
    })
}

pub fn task_from_dialect(task: rpc::Task) -> Result<pb::Task> {
    Ok(pb::Task {
        id: task.id,
        context_id: task.context_id,
        status: Some(status_from_dialect(task.status)?),
        artifacts: task
            .artifacts
            .unwrap_or_default()
            .into_iter()
            .map(artifact_from_dialect)
            .collect::<Result<_>>()?,
        history: task
            .history
            .unwrap_or_default()
            .into_iter()
            .map(message_from_dialect)
            .collect::<Result<_>>()?,
        metadata: to_struct(task.metadata, "task metadata")?,
    })
}

fn status_from_dialect(status: rpc::TaskStatus) -> Result<pb::TaskStatus> {
    Ok(pb::TaskStatus {
        state: state_from_dialect(status.state),
        message: status.message.map(message_from_dialect).transpose()?,
        timestamp: checked_timestamp(status.timestamp)?,
    })
}

fn state_from_dialect(state: rpc::TaskState) -> pb::TaskState {
    match state {
        rpc::TaskState::Submitted => pb::TaskState::Submitted,
        rpc::TaskState::Working => pb::TaskState::Working,
        rpc::TaskState::Completed => pb::TaskState::Completed,
        rpc::TaskState::Failed => pb::TaskState::Failed,
        rpc::TaskState::Canceled => pb::TaskState::Cancelled,
        rpc::TaskState::InputRequired => pb::TaskState::InputRequired,
        rpc::TaskState::Rejected => pb::TaskState::Rejected,
        rpc::TaskState::AuthRequired => pb::TaskState::AuthRequired,
        rpc::TaskState::Unknown => pb::TaskState::Unspecified,
    }
}

pub fn message_from_dialect(msg: rpc::Message) -> Result<pb::Message> {
    Ok(pb::Message {
        message_id: msg.message_id,
        context_id: msg.context_id.unwrap_or_default(),
        task_id: msg.task_id.unwrap_or_default(),
        role: match msg.role {
            rpc::Role::User => pb::Role::User,
            rpc::Role::Agent => pb::Role::Agent,
        },
        content: msg
            .parts
            .into_iter()
            .map(part_from_dialect)
            .collect::<Result<_>>()?,
        metadata: to_struct(msg.metadata, "message metadata")?,
        extensions: msg.extensions.unwrap_or_default(),
    })
}

fn part_from_dialect(part: rpc::Part) -> Result<pb::Part> {
    Ok(match part {
        rpc::Part::Text { text, metadata } => pb::Part {
            part: pb::PartKind::Text(text),
            metadata: to_struct(metadata, "part metadata")?,
        },
        rpc::Part::File { file, metadata } => {
            let file = match file {
                rpc::FileContent::Uri(f) => pb::FilePart {
                    file: pb::FileSource::FileWithUri(f.uri),
                    mime_type: f.mime_type.unwrap_or_default(),
                    name: f.name.unwrap_or_default(),
                },
                rpc::FileContent::Bytes(f) => pb::FilePart {
                    file: pb::FileSource::FileWithBytes(f.bytes),
                    mime_type: f.mime_type.unwrap_or_default(),
                    name: f.name.unwrap_or_default(),
                },
            };
            pb::Part {
                part: pb::PartKind::File(file),
                metadata: to_struct(metadata, "part metadata")?,
            }
        }
        rpc::Part::Data { data, metadata } => pb::Part {
            part: pb::PartKind::Data(pb::DataPart {
                data: to_struct(Some(data), "data part")?.unwrap_or_default(),
            }),
            metadata: to_struct(metadata, "part metadata")?,
        },
    })
}

fn artifact_from_dialect(artifact: rpc::Artifact) -> Result<pb::Artifact> {
    Ok(pb::Artifact {
        artifact_id: artifact.artifact_id,
        name: artifact.name.unwrap_or_default(),
        description: artifact.description.unwrap_or_default(),
        parts: artifact
            .parts
            .into_iter()
            .map(part_from_dialect)
            .collect::<Result<_>>()?,
        metadata: to_struct(artifact.metadata, "artifact metadata")?,
        extensions: artifact.extensions.unwrap_or_default(),
    })
}

/// An agent may omit the config id; `requested` (the id the caller asked
/// for, if any) fills in, otherwise the name ends in an empty segment.
pub fn push_config_from_dialect(
    config: rpc::TaskPushNotificationConfig,
    requested: Option<&str>,
) -> pb::TaskPushNotificationConfig {
    let push = config.push_notification_config;
    let config_id = push
        .id
        .or_else(|| requested.map(str::to_string))
        .unwrap_or_default();
    pb::TaskPushNotificationConfig {
        name: push_config_name(&config.task_id, &config_id),
        push_notification_config: Some(pb::PushNotificationConfig {
            id: config_id,
            url: push.url,
            token: push.token.unwrap_or_default(),
            authentication: push.authentication.map(|auth| pb::AuthenticationInfo {
                schemes: auth.schemes,
                credentials: auth.credentials.unwrap_or_default(),
            }),
        }),
    }
}

pub fn push_config_list(
    configs: Vec<rpc::TaskPushNotificationConfig>,
) -> pb::ListTaskPushNotificationConfigResponse {
    pb::ListTaskPushNotificationConfigResponse {
        configs: configs
            .into_iter()
            .map(|config| push_config_from_dialect(config, None))
            .collect(),
        next_page_token: String::new(),
    }
}

pub fn agent_card_from_dialect(card: rpc::AgentCard) -> Result<pb::AgentCard> {
    Ok(pb::AgentCard {
        protocol_version: card.protocol_version.unwrap_or_default(),
        name: card.name,
        description: card.description,
        url: card.url,
        preferred_transport: card.preferred_transport.unwrap_or_default(),
        additional_interfaces: card
            .additional_interfaces
            .unwrap_or_default()
            .into_iter()
            .map(|i| pb::AgentInterface {
                url: i.url,
                transport: i.transport,
            })
            .collect(),
        provider: card.provider.map(|p| pb::AgentProvider {
            url: p.url,
            organization: p.organization,
        }),
        version: card.version,
        documentation_url: card.documentation_url.unwrap_or_default(),
        capabilities: Some(capabilities_from_dialect(card.capabilities)?),
        security_schemes: card
            .security_schemes
            .unwrap_or_default()
            .into_iter()
            .map(|(name, scheme)| (name, security_scheme_from_dialect(scheme)))
            .collect(),
        security: security_from_dialect(card.security),
        default_input_modes: card.default_input_modes,
        default_output_modes: card.default_output_modes,
        skills: card
            .skills
            .into_iter()
            .map(|s| pb::AgentSkill {
                id: s.id,
                name: s.name,
                description: s.description,
                tags: s.tags,
                examples: s.examples.unwrap_or_default(),
                input_modes: s.input_modes.unwrap_or_default(),
                output_modes: s.output_modes.unwrap_or_default(),
                security: security_from_dialect(s.security),
            })
            .collect(),
        supports_authenticated_extended_card: card
            .supports_authenticated_extended_card
            .unwrap_or(false),
        signatures: card
            .signatures
            .unwrap_or_default()
            .into_iter()
            .map(|s| {
                Ok(pb::AgentCardSignature {
                    protected: s.protected,
                    signature: s.signature,
                    header: to_struct(s.header, "signature header")?,
                })
            })
            .collect::<Result<_>>()?,
        icon_url: card.icon_url.unwrap_or_default(),
    })
}

fn capabilities_from_dialect(caps: rpc::AgentCapabilities) -> Result<pb::AgentCapabilities> {
    Ok(pb::AgentCapabilities {
        streaming: caps.streaming.unwrap_or(false),
        push_notifications: caps.push_notifications.unwrap_or(false),
        extensions: caps
            .extensions
            .unwrap_or_default()
            .into_iter()
            .map(|e| {
                Ok(pb::AgentExtension {
                    uri: e.uri,
                    description: e.description.unwrap_or_default(),
                    required: e.required.unwrap_or(false),
                    params: to_struct(e.params, "extension params")?,
                })
            })
            .collect::<Result<_>>()?,
        state_transition_history: caps.state_transition_history.unwrap_or(false),
    })
}

fn security_from_dialect(
    security: Option<Vec<std::collections::HashMap<String, Vec<String>>>>,
) -> Vec<pb::Security> {
    security
        .unwrap_or_default()
        .into_iter()
        .map(|requirement| pb::Security {
            schemes: requirement
                .into_iter()
                .map(|(name, list)| (name, pb::StringList { list }))
                .collect(),
        })
        .collect()
}

fn security_scheme_from_dialect(scheme: rpc::SecurityScheme) -> pb::SecurityScheme {
    match scheme {
        rpc::SecurityScheme::ApiKey {
            description,
            location,
            name,
        } => pb::SecurityScheme::ApiKeySecurityScheme(pb::ApiKeySecurityScheme {
            description: description.unwrap_or_default(),
            location: match location {
                rpc::ApiKeyLocation::Cookie => "cookie",
                rpc::ApiKeyLocation::Header => "header",
                rpc::ApiKeyLocation::Query => "query",
            }
            .to_string(),
            name,
        }),
        rpc::SecurityScheme::Http {
            description,
            scheme,
            bearer_format,
        } => pb::SecurityScheme::HttpAuthSecurityScheme(pb::HttpAuthSecurityScheme {
            description: description.unwrap_or_default(),
            scheme,
            bearer_format: bearer_format.unwrap_or_default(),
        }),
        rpc::SecurityScheme::OAuth2 {
            description,
            flows,
            oauth2_metadata_url,
        } => pb::SecurityScheme::Oauth2SecurityScheme(pb::OAuth2SecurityScheme {
            description: description.unwrap_or_default(),
            flows: Some(pb::OAuthFlows {
                authorization_code: flows.authorization_code.map(oauth_flow_from_dialect),
                client_credentials: flows.client_credentials.map(oauth_flow_from_dialect),
                implicit: flows.implicit.map(oauth_flow_from_dialect),
                password: flows.password.map(oauth_flow_from_dialect),
            }),
            oauth2_metadata_url: oauth2_metadata_url.unwrap_or_default(),
        }),
        rpc::SecurityScheme::OpenIdConnect {
            description,
            open_id_connect_url,
        } => pb::SecurityScheme::OpenIdConnectSecurityScheme(pb::OpenIdConnectSecurityScheme {
            description: description.unwrap_or_default(),
            open_id_connect_url,
        }),
        rpc::SecurityScheme::MutualTls { description } => {
            pb::SecurityScheme::MtlsSecurityScheme(pb::MutualTlsSecurityScheme {
                description: description.unwrap_or_default(),
            })
        }
    }
}

fn oauth_flow_from_dialect(flow: rpc::OAuthFlow) -> pb::OAuthFlow {
    pb::OAuthFlow {
        authorization_url: flow.authorization_url.unwrap_or_default(),
        token_url: flow.token_url.unwrap_or_default(),
        refresh_url: flow.refresh_url.unwrap_or_default(),
        scopes: flow.scopes,
    }
}
