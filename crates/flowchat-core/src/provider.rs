#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Langflow,
    Proxy,
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Langflow => "langflow",
            Provider::Proxy => "proxy",
            Provider::Gemini => "gemini",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "langflow" => Some(Provider::Langflow),
            "proxy" => Some(Provider::Proxy),
            "gemini" => Some(Provider::Gemini),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Langflow, Provider::Proxy, Provider::Gemini]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Langflow => "Langflow (Astra)",
            Provider::Proxy => "Langflow via local proxy",
            Provider::Gemini => "Gemini (Google)",
        }
    }

    /// Environment variable holding this provider's credential
    pub fn key_env(&self) -> &'static str {
        match self {
            Provider::Langflow | Provider::Proxy => "ASTRA_TOKEN",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }
}
