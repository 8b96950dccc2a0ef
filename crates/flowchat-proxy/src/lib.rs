use std::convert::Infallible;
use std::future::Future;
use std::io::{Error as IoError, ErrorKind};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use flowchat_core::ai::langflow::{self, RunRequest};
use flowchat_core::ai::proxy::ProxyRequest;
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE,
};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Method, Request, Response, Server, StatusCode};
use serde::de::IgnoredAny;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const INTERNAL_ERROR_BODY: &str = r#"{"error":"Internal Server Error"}"#;

#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub listen: SocketAddr,
    /// Base URL of the Langflow service, e.g. `https://api.langflow.astra.datastax.com`
    pub upstream: String,
    pub flow_id: String,
    pub graph_id: String,
    /// Used when the caller sends no Authorization header
    pub token: Option<String>,
    pub tweaks: Map<String, Value>,
}

impl ProxyConfig {
    pub fn new(listen: SocketAddr, upstream: &str, flow_id: &str, graph_id: &str) -> Self {
        Self {
            listen,
            upstream: upstream.trim_end_matches('/').to_string(),
            flow_id: flow_id.to_string(),
            graph_id: graph_id.to_string(),
            token: None,
            tweaks: langflow::default_tweaks(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }
}

#[derive(Debug, Error)]
enum ForwardError {
    #[error("failed to read request body: {0}")]
    Body(#[from] hyper::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

struct Shared {
    config: ProxyConfig,
    client: reqwest::Client,
}

pub fn spawn_proxy<S>(
    config: ProxyConfig,
    shutdown: S,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)>
where
    S: Future<Output = ()> + Send + 'static,
{
    spawn_proxy_with_client(config, reqwest::Client::new(), shutdown)
}

/// Like [`spawn_proxy`], with the HTTP client used for upstream calls supplied by the caller
pub fn spawn_proxy_with_client<S>(
    config: ProxyConfig,
    client: reqwest::Client,
    shutdown: S,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listen_addr = config.listen;
    let shared = Arc::new(Shared { config, client });

    let make_svc = make_service_fn(move |_conn: &AddrStream| {
        let shared = shared.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle_request(req, shared.clone())))
        }
    });

    let std_listener = TcpListener::bind(listen_addr)?;
    std_listener.set_nonblocking(true)?;
    let local_addr = std_listener.local_addr()?;
    let builder =
        Server::from_tcp(std_listener).map_err(|err| IoError::new(ErrorKind::Other, err))?;
    let server = builder.http1_only(true).serve(make_svc);
    let graceful = server.with_graceful_shutdown(async move {
        shutdown.await;
    });

    let handle = tokio::spawn(async move {
        if let Err(err) = graceful.await {
            error!(error = %err, "proxy server exited with error");
        }
    });

    Ok((local_addr, handle))
}

async fn handle_request(
    req: Request<Body>,
    shared: Arc<Shared>,
) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path().to_string();
    let Some(rest) = path.strip_prefix("/api/") else {
        return Ok(json_response(StatusCode::NOT_FOUND, r#"{"error":"Not Found"}"#));
    };

    let method = req.method().clone();
    debug!(%method, %path, "incoming request");

    match method {
        Method::OPTIONS => Ok(json_response(StatusCode::OK, "{}")),
        Method::POST => {
            let result = if rest == "getdata" {
                forward_chat(req, &shared).await
            } else {
                forward_raw(req, rest, &shared).await
            };
            match result {
                Ok(resp) => Ok(resp),
                Err(err) => {
                    error!(%path, error = %err, "failed to forward request");
                    Ok(json_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        INTERNAL_ERROR_BODY,
                    ))
                }
            }
        }
        _ => Ok(json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            r#"{"error":"Method Not Allowed"}"#,
        )),
    }
}

/// `/api/getdata`: wrap the caller's message in a flow run request
async fn forward_chat(req: Request<Body>, shared: &Shared) -> Result<Response<Body>, ForwardError> {
    let authorization = authorization_for(&req, &shared.config);
    let body = hyper::body::to_bytes(req.into_body()).await?;
    let incoming: ProxyRequest = serde_json::from_slice(&body)?;

    let run = RunRequest {
        input_value: incoming.message,
        output_type: incoming.output_type,
        input_type: incoming.input_type,
        tweaks: shared.config.tweaks.clone(),
    };
    let url = langflow::run_url(
        &shared.config.upstream,
        &shared.config.flow_id,
        &shared.config.graph_id,
    );

    let upstream = shared
        .client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, authorization)
        .json(&run)
        .send()
        .await?;

    let status = upstream.status();
    let bytes = upstream.bytes().await?;
    // The reply is relayed unchanged, but it has to be JSON
    serde_json::from_slice::<IgnoredAny>(&bytes)?;

    info!(%status, flow_id = %shared.config.flow_id, "relayed flow run");
    Ok(relay(status, bytes))
}

/// Any other `/api/{path}`: forward the body as-is to `{upstream}/{path}`
async fn forward_raw(
    req: Request<Body>,
    rest: &str,
    shared: &Shared,
) -> Result<Response<Body>, ForwardError> {
    let authorization = authorization_for(&req, &shared.config);
    let mut url = format!("{}/{}", shared.config.upstream, rest);
    if let Some(query) = req.uri().query() {
        url.push('?');
        url.push_str(query);
    }
    let body = hyper::body::to_bytes(req.into_body()).await?;

    let upstream = shared
        .client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, authorization)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let bytes = upstream.bytes().await?;
    debug!(%status, %url, "relayed pass-through request");
    Ok(relay(status, bytes))
}

/// Caller's header wins, then the configured token, then empty
fn authorization_for(req: &Request<Body>, config: &ProxyConfig) -> HeaderValue {
    if let Some(value) = req.headers().get(AUTHORIZATION) {
        return value.clone();
    }
    config
        .token
        .as_ref()
        .and_then(|token| HeaderValue::from_str(&format!("Bearer {}", token)).ok())
        .unwrap_or_else(|| HeaderValue::from_static(""))
}

fn relay(status: StatusCode, body: Bytes) -> Response<Body> {
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    with_cors(resp)
}

fn json_response(status: StatusCode, body: &'static str) -> Response<Body> {
    relay(status, Bytes::from_static(body.as_bytes()))
}

fn with_cors(mut resp: Response<Body>) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    resp
}
