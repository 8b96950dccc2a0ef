use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::langflow::RunResponse;
use crate::transport::{decode_response, require, Transport, TransportError};

pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000/api/getdata";

/// Body accepted by the forwarding proxy's `/api/getdata` route
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProxyRequest {
    pub message: String,
    #[serde(default = "chat")]
    pub input_type: String,
    #[serde(default = "chat")]
    pub output_type: String,
}

fn chat() -> String {
    "chat".to_string()
}

impl ProxyRequest {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            input_type: chat(),
            output_type: chat(),
        }
    }
}

/// Talks to Langflow through the local forwarding proxy
#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
    endpoint: String,
    token: String,
}

impl ProxyClient {
    pub fn new(endpoint: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl Transport for ProxyClient {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn check_config(&self) -> Result<(), TransportError> {
        require(&self.endpoint, "FLOWCHAT_PROXY_URL")?;
        require(&self.token, "ASTRA_TOKEN")
    }

    async fn send(&self, message: &str) -> Result<String, TransportError> {
        debug!(endpoint = %self.endpoint, "sending message through proxy");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&ProxyRequest::new(message))
            .send()
            .await?;

        let run: RunResponse = decode_response(response).await?;
        run.into_reply()
    }
}
