use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::transport::{decode_response, require, Transport, TransportError};

pub const DEFAULT_LANGFLOW_URL: &str = "https://api.langflow.astra.datastax.com";

/// Components of the hosted flow that receive (empty) per-run tweaks
const DEFAULT_TWEAK_COMPONENTS: &[&str] = &[
    "ChatOutput-IE6ZB",
    "ChatInput-9QCNU",
    "Prompt-nN4AV",
    "ParseData-Re1HY",
    "AstraDBToolComponent-OJH1D",
    "GoogleGenerativeAIModel-Ngh2g",
];

pub fn default_tweaks() -> Map<String, Value> {
    DEFAULT_TWEAK_COMPONENTS
        .iter()
        .map(|id| (id.to_string(), Value::Object(Map::new())))
        .collect()
}

/// Graph execution endpoint for a flow
pub fn run_url(base_url: &str, flow_id: &str, graph_id: &str) -> String {
    format!(
        "{}/lf/{}/api/v1/run/{}?stream=false",
        base_url.trim_end_matches('/'),
        flow_id,
        graph_id
    )
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub input_value: String,
    pub output_type: String,
    pub input_type: String,
    pub tweaks: Map<String, Value>,
}

impl RunRequest {
    pub fn chat(message: &str, tweaks: Map<String, Value>) -> Self {
        Self {
            input_value: message.to_string(),
            output_type: "chat".to_string(),
            input_type: "chat".to_string(),
            tweaks,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct RunResponse {
    outputs: Vec<FlowOutput>,
}

#[derive(Deserialize, Debug)]
struct FlowOutput {
    outputs: Vec<ComponentOutput>,
}

#[derive(Deserialize, Debug)]
struct ComponentOutput {
    results: ComponentResults,
}

#[derive(Deserialize, Debug)]
struct ComponentResults {
    message: ResultMessage,
}

#[derive(Deserialize, Debug)]
struct ResultMessage {
    text: String,
}

impl RunResponse {
    /// Text of the first chat output of the first flow output
    pub fn into_reply(self) -> Result<String, TransportError> {
        let flow = self
            .outputs
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::MalformedResponse("`outputs` is empty".to_string()))?;
        let component = flow.outputs.into_iter().next().ok_or_else(|| {
            TransportError::MalformedResponse("`outputs[0].outputs` is empty".to_string())
        })?;
        Ok(component.results.message.text)
    }
}

#[derive(Clone)]
pub struct LangflowClient {
    client: Client,
    base_url: String,
    flow_id: String,
    graph_id: String,
    token: String,
    tweaks: Map<String, Value>,
}

impl LangflowClient {
    pub fn new(base_url: &str, flow_id: &str, graph_id: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            flow_id: flow_id.to_string(),
            graph_id: graph_id.to_string(),
            token: token.to_string(),
            tweaks: default_tweaks(),
        }
    }

    pub fn with_tweaks(mut self, tweaks: Map<String, Value>) -> Self {
        self.tweaks = tweaks;
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn run_url(&self) -> String {
        run_url(&self.base_url, &self.flow_id, &self.graph_id)
    }
}

#[async_trait]
impl Transport for LangflowClient {
    fn name(&self) -> &'static str {
        "langflow"
    }

    fn check_config(&self) -> Result<(), TransportError> {
        require(&self.token, "ASTRA_TOKEN")?;
        require(&self.flow_id, "FLOW_ID")?;
        require(&self.graph_id, "GRAPH_ID")
    }

    async fn send(&self, message: &str) -> Result<String, TransportError> {
        let url = self.run_url();
        let request = RunRequest::chat(message, self.tweaks.clone());
        debug!(%url, chars = message.len(), "running langflow graph");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let run: RunResponse = decode_response(response).await?;
        run.into_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_support::{direct_client, serve_once};

    const REPLY: &str = r#"{
        "session_id": "abc",
        "outputs": [{
            "inputs": {"input_value": "hi"},
            "outputs": [{
                "results": {"message": {"text": "Hello there", "sender": "Machine"}},
                "artifacts": {}
            }]
        }]
    }"#;

    #[test]
    fn test_run_url_trims_trailing_slash() {
        assert_eq!(
            run_url("https://example.test/", "flow", "graph"),
            "https://example.test/lf/flow/api/v1/run/graph?stream=false"
        );
    }

    #[test]
    fn test_run_request_body() {
        let body = serde_json::to_value(RunRequest::chat("hi", default_tweaks())).unwrap();
        assert_eq!(body["input_value"], "hi");
        assert_eq!(body["output_type"], "chat");
        assert_eq!(body["input_type"], "chat");
        assert_eq!(body["tweaks"].as_object().unwrap().len(), 6);
        assert_eq!(body["tweaks"]["ChatInput-9QCNU"], serde_json::json!({}));
    }

    #[test]
    fn test_reply_extraction_rejects_empty_outputs() {
        let run: RunResponse = serde_json::from_str(r#"{"outputs": []}"#).unwrap();
        assert!(matches!(
            run.into_reply(),
            Err(TransportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_missing_token_is_reported() {
        let client = LangflowClient::new(DEFAULT_LANGFLOW_URL, "flow", "graph", "");
        assert!(matches!(
            client.check_config(),
            Err(TransportError::MissingConfig("ASTRA_TOKEN"))
        ));
    }

    #[tokio::test]
    async fn test_send_extracts_reply_and_authorizes() {
        let (base_url, request) = serve_once(200, REPLY).await;
        let client = LangflowClient::new(&base_url, "flow-1", "graph-2", "secret")
            .with_http_client(direct_client());

        let reply = client.send("hi").await.unwrap();
        assert_eq!(reply, "Hello there");

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /lf/flow-1/api/v1/run/graph-2?stream=false "));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(raw.contains(r#""input_value":"hi""#));
    }

    #[tokio::test]
    async fn test_send_surfaces_http_failure() {
        let (base_url, _request) = serve_once(500, r#"{"detail":"boom"}"#).await;
        let client = LangflowClient::new(&base_url, "flow", "graph", "secret")
            .with_http_client(direct_client());

        match client.send("hi").await {
            Err(TransportError::Http { status, body }) => {
                assert_eq!(status.as_u16(), 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_rejects_unexpected_shape() {
        let (base_url, _request) = serve_once(200, r#"{"result": "nope"}"#).await;
        let client = LangflowClient::new(&base_url, "flow", "graph", "secret")
            .with_http_client(direct_client());

        assert!(matches!(
            client.send("hi").await,
            Err(TransportError::MalformedResponse(_))
        ));
    }
}
