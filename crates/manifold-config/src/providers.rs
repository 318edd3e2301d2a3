use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported backend kinds
///
/// A closed set: the gateway speaks exactly these five wire dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions (including Azure OpenAI)
    Openai,
    /// Anthropic Claude via AWS Bedrock
    Claude,
    /// Google Gemini via the Generative Language API
    Gemini,
    /// Alibaba Qwen via the DashScope API
    Qwen,
    /// DeepSeek's OpenAI-shaped REST API
    Deepseek,
}

impl ProviderKind {
    /// Stable lowercase name, matching the serde representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Qwen => "qwen",
            Self::Deepseek => "deepseek",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a single backend provider instance
///
/// One config yields exactly one provider in the pool; configs are never
/// shared between pool entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Backend kind
    pub kind: ProviderKind,
    /// Model identifier sent to the backend and matched during selection
    pub model: String,
    /// Display name used in logs and status output
    #[serde(default)]
    pub name: Option<String>,
    /// API key / access key ID for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Secondary credential (AWS secret access key for Bedrock)
    #[serde(default)]
    pub secret_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub api_base: Option<Url>,
    /// API version (Azure OpenAI deployments)
    #[serde(default)]
    pub api_version: Option<String>,
    /// Cloud region (Bedrock)
    #[serde(default)]
    pub region: Option<String>,
    /// Cloud project identifier (Gemini on Vertex)
    #[serde(default)]
    pub project_id: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Transport-level retry count within one logical call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Default sampling temperature when the caller sets none
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Default nucleus sampling threshold when the caller sets none
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Default generation cap when the caller sets none
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

const fn default_timeout() -> u64 {
    60
}

const fn default_max_retries() -> u32 {
    3
}

impl ProviderConfig {
    /// Minimal config for a kind and model; everything else defaulted
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            name: None,
            api_key: None,
            secret_key: None,
            api_base: None,
            api_version: None,
            region: None,
            project_id: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }
}

/// Build the provider list from environment variables
///
/// Each provider family understands a plural `*_API_KEYS` form (comma
/// separated, one pool entry per key) and a singular fallback.
pub(crate) fn from_env() -> Vec<ProviderConfig> {
    let mut configs = Vec::new();

    // OpenAI: keys and bases are zipped pairwise and must match in length
    let openai_keys = split_csv(&env_var("OPENAI_API_KEYS").or_else(|| env_var("OPENAI_API_KEY")));
    let openai_bases = split_csv(&env_var("OPENAI_API_BASES").or_else(|| env_var("OPENAI_API_BASE")));
    if !openai_keys.is_empty() && openai_keys.len() == openai_bases.len() {
        for (key, base) in openai_keys.into_iter().zip(openai_bases) {
            let mut config = ProviderConfig::new(
                ProviderKind::Openai,
                env_var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_owned()),
            );
            config.api_key = Some(SecretString::from(key));
            config.api_base = parse_base(base.as_str());
            config.api_version = Some(env_var("OPENAI_API_VERSION").unwrap_or_else(|| "2024-02-15-preview".to_owned()));
            configs.push(config);
        }
    }

    // Qwen
    for key in split_csv(&env_var("QWEN_API_KEYS").or_else(|| env_var("QWEN_API_KEY"))) {
        let mut config = ProviderConfig::new(
            ProviderKind::Qwen,
            env_var("QWEN_MODEL").unwrap_or_else(|| "qwen-turbo".to_owned()),
        );
        config.api_key = Some(SecretString::from(key));
        config.api_base = env_var("QWEN_API_BASE").as_deref().and_then(parse_base);
        configs.push(config);
    }

    // DeepSeek
    for key in split_csv(&env_var("DEEPSEEK_API_KEYS").or_else(|| env_var("DEEPSEEK_API_KEY"))) {
        let mut config = ProviderConfig::new(
            ProviderKind::Deepseek,
            env_var("DEEPSEEK_MODEL").unwrap_or_else(|| "deepseek-chat".to_owned()),
        );
        config.api_key = Some(SecretString::from(key));
        config.api_base = env_var("DEEPSEEK_API_BASE").as_deref().and_then(parse_base);
        configs.push(config);
    }

    // Claude via Bedrock: access key + shared secret key and region
    for key in split_csv(&env_var("CLAUDE_ACCESS_KEYS").or_else(|| env_var("CLAUDE_ACCESS_KEY"))) {
        let mut config = ProviderConfig::new(
            ProviderKind::Claude,
            env_var("CLAUDE_MODEL").unwrap_or_else(|| "anthropic.claude-3-5-sonnet-20241022-v2:0".to_owned()),
        );
        config.api_key = Some(SecretString::from(key));
        config.secret_key = env_var("CLAUDE_SECRET_KEY").map(SecretString::from);
        config.region = Some(env_var("CLAUDE_REGION").unwrap_or_else(|| "us-east-1".to_owned()));
        configs.push(config);
    }

    // Gemini
    for key in split_csv(&env_var("GEMINI_API_KEYS").or_else(|| env_var("GEMINI_API_KEY"))) {
        let mut config = ProviderConfig::new(
            ProviderKind::Gemini,
            env_var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash-exp".to_owned()),
        );
        config.api_key = Some(SecretString::from(key));
        config.project_id = env_var("GEMINI_PROJECT_ID");
        config.region = env_var("GEMINI_REGION");
        configs.push(config);
    }

    configs
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn split_csv(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_base(value: &str) -> Option<Url> {
    match Url::parse(value) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(base_url = value, error = %e, "ignoring unparseable base URL");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_lowercase() {
        assert_eq!(ProviderKind::Openai.as_str(), "openai");
        assert_eq!(ProviderKind::Deepseek.to_string(), "deepseek");
    }

    #[test]
    fn defaults_applied() {
        let config = ProviderConfig::new(ProviderKind::Qwen, "qwen-turbo");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_retries, 3);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn env_builds_one_entry_per_key() {
        let vars = [
            ("DEEPSEEK_API_KEYS", Some("k1, k2")),
            ("DEEPSEEK_MODEL", Some("deepseek-chat")),
        ];
        temp_env::with_vars(vars, || {
            let configs = from_env();
            let deepseek: Vec<_> = configs.iter().filter(|c| c.kind == ProviderKind::Deepseek).collect();
            assert_eq!(deepseek.len(), 2);
            assert!(deepseek.iter().all(|c| c.model == "deepseek-chat"));
        });
    }

    #[test]
    fn singular_key_fallback() {
        let vars = [
            ("QWEN_API_KEYS", None),
            ("QWEN_API_KEY", Some("single")),
            ("QWEN_MODEL", None),
        ];
        temp_env::with_vars(vars, || {
            let configs = from_env();
            let qwen: Vec<_> = configs.iter().filter(|c| c.kind == ProviderKind::Qwen).collect();
            assert_eq!(qwen.len(), 1);
            assert_eq!(qwen[0].model, "qwen-turbo");
        });
    }
}
