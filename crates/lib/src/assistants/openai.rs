//! OpenAI Assistants v2 client (https://api.openai.com/v1 by default).
//!
//! Every request carries the bearer key and `OpenAI-Beta: assistants=v2`. Wire types are private
//! and converted into the domain types from the parent module.

use super::{
    Annotation, AnnotationKind, AssistantId, AssistantSpec, AssistantsGateway, GatewayError,
    MessageContent, MessageOrder, MessageRole, RequiredToolCall, Run, RunError, RunId, RunStatus,
    ThreadMessage, ThreadRun, ToolOutput,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";
const PAGE_LIMIT: u32 = 100;

/// Client for the Assistants API.
#[derive(Clone)]
pub struct OpenAiAssistantsClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiAssistantsClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
    }

    /// Send the request and decode a 2xx JSON body; non-2xx becomes `GatewayError::Api`.
    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let data: T = res.json().await?;
        Ok(data)
    }
}

#[async_trait]
impl AssistantsGateway for OpenAiAssistantsClient {
    /// POST /assistants
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<AssistantId, GatewayError> {
        let body = CreateAssistantRequest {
            name: &spec.name,
            instructions: &spec.instructions,
            model: &spec.model,
            tools: spec
                .tools
                .iter()
                .map(|t| WireTool {
                    typ: "function",
                    function: WireToolFunction {
                        name: &t.name,
                        description: t.description.as_deref(),
                        parameters: &t.parameters,
                    },
                })
                .collect(),
        };
        let data: IdObject = self.send(self.post("/assistants").json(&body)).await?;
        non_empty_id(data.id, "assistant")
    }

    /// GET /assistants/{id}
    async fn get_assistant(&self, assistant_id: &str) -> Result<AssistantId, GatewayError> {
        let data: IdObject = self
            .send(self.get(&format!("/assistants/{}", assistant_id)))
            .await?;
        non_empty_id(data.id, "assistant")
    }

    /// POST /threads/runs
    async fn create_thread_and_run(
        &self,
        assistant_id: &str,
        initial_message: &str,
    ) -> Result<ThreadRun, GatewayError> {
        let body = CreateThreadAndRunRequest {
            assistant_id,
            thread: WireThread {
                messages: vec![WireNewMessage {
                    role: MessageRole::User.as_str(),
                    content: initial_message,
                }],
            },
        };
        let data: WireRun = self.send(self.post("/threads/runs").json(&body)).await?;
        Ok(ThreadRun {
            thread_id: data.thread_id,
            run_id: data.id,
        })
    }

    /// POST /threads/{thread_id}/messages
    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), GatewayError> {
        let body = WireNewMessage {
            role: role.as_str(),
            content,
        };
        let _: IdObject = self
            .send(
                self.post(&format!("/threads/{}/messages", thread_id))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    /// POST /threads/{thread_id}/runs
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunId, GatewayError> {
        let body = CreateRunRequest { assistant_id };
        let data: WireRun = self
            .send(self.post(&format!("/threads/{}/runs", thread_id)).json(&body))
            .await?;
        Ok(data.id)
    }

    /// GET /threads/{thread_id}/runs/{run_id}
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        let data: WireRun = self
            .send(self.get(&format!("/threads/{}/runs/{}", thread_id, run_id)))
            .await?;
        Ok(wire_run_to_run(data))
    }

    /// POST /threads/{thread_id}/runs/{run_id}/submit_tool_outputs
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<(), GatewayError> {
        let body = SubmitToolOutputsRequest {
            tool_outputs: outputs,
        };
        let _: WireRun = self
            .send(
                self.post(&format!(
                    "/threads/{}/runs/{}/submit_tool_outputs",
                    thread_id, run_id
                ))
                .json(&body),
            )
            .await?;
        Ok(())
    }

    /// GET /threads/{thread_id}/messages, following `has_more` / `last_id` pages.
    async fn list_messages(
        &self,
        thread_id: &str,
        order: MessageOrder,
    ) -> Result<Vec<ThreadMessage>, GatewayError> {
        let path = format!("/threads/{}/messages", thread_id);
        let mut out = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let limit = PAGE_LIMIT.to_string();
            let mut query: Vec<(&str, &str)> = vec![("order", order.as_query()), ("limit", limit.as_str())];
            if let Some(ref a) = after {
                query.push(("after", a.as_str()));
            }
            let page: WireMessageList = self.send(self.get(&path).query(&query)).await?;
            out.extend(page.data.into_iter().map(wire_message_to_message));
            match (page.has_more, page.last_id) {
                (true, Some(last)) if after.as_deref() != Some(last.as_str()) => {
                    after = Some(last);
                }
                _ => break,
            }
        }
        Ok(out)
    }
}

fn non_empty_id(id: String, what: &str) -> Result<String, GatewayError> {
    if id.trim().is_empty() {
        Err(GatewayError::Malformed(format!("{} response without id", what)))
    } else {
        Ok(id)
    }
}

// --- Request wire types ---

#[derive(Debug, Serialize)]
struct CreateAssistantRequest<'a> {
    name: &'a str,
    instructions: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    typ: &'a str,
    function: WireToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireToolFunction<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct CreateThreadAndRunRequest<'a> {
    assistant_id: &'a str,
    thread: WireThread<'a>,
}

#[derive(Debug, Serialize)]
struct WireThread<'a> {
    messages: Vec<WireNewMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireNewMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SubmitToolOutputsRequest {
    tool_outputs: Vec<ToolOutput>,
}

// --- Response wire types ---

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdObject {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireRun {
    #[serde(default)]
    id: String,
    #[serde(default)]
    thread_id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<WireRequiredAction>,
    #[serde(default)]
    last_error: Option<WireRunError>,
}

#[derive(Debug, Deserialize)]
struct WireRequiredAction {
    #[serde(default)]
    submit_tool_outputs: Option<WireSubmitToolOutputs>,
}

#[derive(Debug, Deserialize)]
struct WireSubmitToolOutputs {
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct WireToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireRunError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireMessageList {
    #[serde(default)]
    data: Vec<WireMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    role: MessageRole,
    #[serde(default)]
    content: Vec<WireContent>,
    #[serde(default)]
    created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text {
        text: WireText,
    },
    ImageFile {
        image_file: WireFileRef,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireText {
    #[serde(default)]
    value: String,
    #[serde(default)]
    annotations: Vec<WireAnnotation>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireAnnotation {
    FileCitation {
        #[serde(default)]
        text: String,
        #[serde(default)]
        start_index: usize,
        #[serde(default)]
        end_index: usize,
        file_citation: WireFileRef,
    },
    FilePath {
        #[serde(default)]
        text: String,
        #[serde(default)]
        start_index: usize,
        #[serde(default)]
        end_index: usize,
        file_path: WireFileRef,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireFileRef {
    #[serde(default)]
    file_id: String,
}

fn wire_run_to_run(data: WireRun) -> Run {
    let required_tool_calls = data
        .required_action
        .and_then(|a| a.submit_tool_outputs)
        .map(|s| {
            s.tool_calls
                .into_iter()
                .map(|tc| RequiredToolCall {
                    id: tc.id,
                    function_name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect()
        })
        .unwrap_or_default();
    Run {
        id: data.id,
        thread_id: data.thread_id,
        status: data.status,
        required_tool_calls,
        last_error: data.last_error.map(|e| RunError {
            code: e.code,
            message: e.message,
        }),
    }
}

fn wire_message_to_message(m: WireMessage) -> ThreadMessage {
    let content = m
        .content
        .into_iter()
        .filter_map(|c| match c {
            WireContent::Text { text } => Some(MessageContent::Text {
                value: text.value,
                annotations: text
                    .annotations
                    .into_iter()
                    .filter_map(wire_annotation_to_annotation)
                    .collect(),
            }),
            WireContent::ImageFile { image_file } => Some(MessageContent::ImageFile {
                file_id: image_file.file_id,
            }),
            WireContent::Other => None,
        })
        .collect();
    ThreadMessage {
        id: m.id,
        role: m.role,
        content,
        created_at: m.created_at,
    }
}

fn wire_annotation_to_annotation(a: WireAnnotation) -> Option<Annotation> {
    match a {
        WireAnnotation::FileCitation {
            text,
            start_index,
            end_index,
            file_citation,
        } => Some(Annotation {
            kind: AnnotationKind::FileCitation,
            text,
            file_id: file_citation.file_id,
            start_index,
            end_index,
        }),
        WireAnnotation::FilePath {
            text,
            start_index,
            end_index,
            file_path,
        } => Some(Annotation {
            kind: AnnotationKind::FilePath,
            text,
            file_id: file_path.file_id,
            start_index,
            end_index,
        }),
        WireAnnotation::Other => None,
    }
}
