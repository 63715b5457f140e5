use crate::config::Settings;
use crate::conversation::ApiMessage;
use crate::sign::{self, Credentials, SigningParams};
use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

const SERVICE: &str = "bedrock";
const CHANNEL_CAPACITY: usize = 1000;

/// Events emitted while a response streams in.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// One text fragment of the incremental response.
    Delta(String),
    /// The stream ended normally.
    Complete,
    /// The stream failed mid-flight.
    Error(String),
}

/// The remote text-generation service as the controller sees it. Could be
/// the Bedrock runtime, the reverse proxy, or a scripted test double.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// One blocking request returning the complete response text.
    async fn converse(&self, model_id: &str, messages: Vec<ApiMessage>) -> Result<String>;

    /// Open an incremental response; events arrive strictly in order.
    async fn converse_stream(
        &self,
        model_id: &str,
        messages: Vec<ApiMessage>,
    ) -> Result<mpsc::Receiver<StreamEvent>>;
}

#[derive(Serialize)]
struct ConverseRequest {
    messages: Vec<ApiMessage>,
}

#[derive(Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Deserialize)]
struct ConverseOutput {
    message: OutputMessage,
}

#[derive(Deserialize)]
struct OutputMessage {
    content: Vec<OutputBlock>,
}

#[derive(Deserialize)]
struct OutputBlock {
    text: Option<String>,
}

/// HTTP client for the Converse endpoints.
pub struct BedrockClient {
    http: reqwest::Client,
    credentials: Credentials,
    region: String,
    endpoint: String,
    api_key: Option<String>,
}

impl BedrockClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let endpoint = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", settings.region));

        Ok(Self {
            http,
            credentials: Credentials {
                access_key: settings.access_key.clone(),
                secret_key: settings.secret_key.clone(),
            },
            region: settings.region.clone(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    /// Build a signed POST to `/model/{model_id}/{operation}`.
    fn signed_request(
        &self,
        model_id: &str,
        operation: &str,
        messages: Vec<ApiMessage>,
    ) -> Result<reqwest::RequestBuilder> {
        if !self.credentials.is_complete() {
            bail!("No credentials configured. Run `bedrock-chat settings set` first.");
        }

        let path = format!("/model/{}/{}", sign::uri_encode_segment(model_id), operation);
        let url = format!("{}{}", self.endpoint, path);
        let parsed = reqwest::Url::parse(&url).context("Invalid endpoint URL")?;
        let host = host_header(&parsed)?;

        let payload =
            serde_json::to_vec(&ConverseRequest { messages }).context("Failed to encode request")?;

        let timestamp = Utc::now();
        let amz_date = sign::amz_date(timestamp);
        let headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("host".to_string(), host),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        let authorization = sign::authorization_header(
            &self.credentials,
            &SigningParams {
                method: "POST",
                path: &path,
                query: "",
                headers: &headers,
                payload: &payload,
                region: &self.region,
                service: SERVICE,
                timestamp,
            },
        );

        let mut request = self
            .http
            .post(parsed)
            .header("content-type", "application/json")
            .header("x-amz-date", amz_date)
            .header("authorization", authorization)
            .body(payload);

        if let Some(key) = &self.api_key {
            request = request.header("x-bedrock-api-key", key);
        }

        Ok(request)
    }
}

#[async_trait]
impl GenerationService for BedrockClient {
    async fn converse(&self, model_id: &str, messages: Vec<ApiMessage>) -> Result<String> {
        let response = self
            .signed_request(model_id, "converse", messages)?
            .timeout(Duration::from_secs(60))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("Bedrock API error ({}): {}", status, text);
        }

        let converse: ConverseResponse = response.json().await?;
        let text: String = converse
            .output
            .message
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            bail!("Bedrock returned an empty response");
        }

        Ok(text)
    }

    async fn converse_stream(
        &self,
        model_id: &str,
        messages: Vec<ApiMessage>,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let response = self
            .signed_request(model_id, "converse-stream", messages)?
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("Bedrock API error ({}): {}", status, text);
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(process_event_stream(response, tx));
        Ok(rx)
    }
}

/// Host header value for a parsed URL, including any non-default port.
fn host_header(url: &reqwest::Url) -> Result<String> {
    let host = url
        .host_str()
        .context("Endpoint URL has no host")?
        .to_string();
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// What a single SSE line amounts to.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta(String),
    Stop,
}

/// Parse one line of the `data: {json}` stream the Converse endpoints
/// produce. Lines that carry neither a text delta nor a stop reason
/// (message/content-block bookkeeping, metadata) are ignored.
fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data: ")?.trim();
    if data == "[DONE]" {
        return Some(SseEvent::Stop);
    }

    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    if let Some(text) = value
        .get("delta")
        .and_then(|delta| delta.get("text"))
        .and_then(|text| text.as_str())
    {
        return Some(SseEvent::Delta(text.to_string()));
    }
    if value.get("stopReason").is_some() {
        return Some(SseEvent::Stop);
    }
    None
}

/// Consume the response body line by line, forwarding deltas in arrival
/// order. Exactly one terminal event (`Complete` or `Error`) is sent.
async fn process_event_stream(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = tx.send(StreamEvent::Error(err.to_string())).await;
                return;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(newline) = buffer.find('\n') {
            let line = buffer[..newline].trim().to_string();
            buffer = buffer[newline + 1..].to_string();

            match parse_sse_line(&line) {
                Some(SseEvent::Delta(delta)) => {
                    let _ = tx.send(StreamEvent::Delta(delta)).await;
                }
                Some(SseEvent::Stop) => {
                    let _ = tx.send(StreamEvent::Complete).await;
                    return;
                }
                None => {}
            }
        }
    }

    // Flush a trailing line that arrived without a newline.
    if let Some(SseEvent::Delta(delta)) = parse_sse_line(buffer.trim()) {
        let _ = tx.send(StreamEvent::Delta(delta)).await;
    }
    let _ = tx.send(StreamEvent::Complete).await;
}

/// One scripted reply for [`MockService`].
pub enum MockReply {
    /// Complete response for the non-streaming path.
    Text(String),
    /// Deltas followed by a clean end of stream.
    Deltas(Vec<String>),
    /// Deltas followed by a mid-stream failure.
    DeltasThenError(Vec<String>, String),
    /// The request itself fails.
    Failure(String),
    /// A stream that never produces anything and never ends.
    Hang,
}

/// A scripted generation service for tests. Replies are served in order;
/// request payloads are recorded for assertions.
#[derive(Default)]
pub struct MockService {
    script: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<Vec<ApiMessage>>>,
    held: Mutex<Vec<mpsc::Sender<StreamEvent>>>,
}

impl MockService {
    pub fn new(script: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        }
    }

    /// Payloads of every request received so far.
    pub fn requests(&self) -> Vec<Vec<ApiMessage>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, model_id: &str, messages: Vec<ApiMessage>) -> Result<MockReply> {
        assert!(!model_id.is_empty(), "mock called without a model id");
        self.requests.lock().unwrap().push(messages);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("MockService: script exhausted"))
    }
}

#[async_trait]
impl GenerationService for MockService {
    async fn converse(&self, model_id: &str, messages: Vec<ApiMessage>) -> Result<String> {
        match self.next_reply(model_id, messages)? {
            MockReply::Text(text) => Ok(text),
            MockReply::Failure(message) => bail!(message),
            _ => bail!("MockService: streaming reply scripted for a blocking request"),
        }
    }

    async fn converse_stream(
        &self,
        model_id: &str,
        messages: Vec<ApiMessage>,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        match self.next_reply(model_id, messages)? {
            MockReply::Deltas(deltas) => {
                for delta in deltas {
                    let _ = tx.send(StreamEvent::Delta(delta)).await;
                }
                let _ = tx.send(StreamEvent::Complete).await;
            }
            MockReply::DeltasThenError(deltas, message) => {
                for delta in deltas {
                    let _ = tx.send(StreamEvent::Delta(delta)).await;
                }
                let _ = tx.send(StreamEvent::Error(message)).await;
            }
            MockReply::Failure(message) => bail!(message),
            MockReply::Hang => {
                self.held.lock().unwrap().push(tx);
            }
            MockReply::Text(_) => bail!("MockService: blocking reply scripted for a stream"),
        }
        Ok(rx)
    }
}
