pub mod gemini;
pub mod langflow;
pub mod proxy;

#[cfg(test)]
pub(crate) mod test_support;

pub use gemini::GeminiClient;
pub use langflow::LangflowClient;
pub use proxy::ProxyClient;
