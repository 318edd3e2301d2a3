use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, placeholder expansion
    /// fails, TOML parsing fails, or validation fails.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        for (index, provider) in self.providers.iter().enumerate() {
            if provider.model.trim().is_empty() {
                anyhow::bail!("provider #{index} ({}) has an empty model name", provider.kind);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, ProviderKind};

    #[test]
    fn parses_provider_list_in_order() {
        let raw = r#"
            [[providers]]
            kind = "openai"
            model = "gpt-4o"
            api_version = "2024-02-15-preview"

            [[providers]]
            kind = "deepseek"
            model = "deepseek-chat"
            timeout_secs = 30
            max_retries = 1
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::Openai);
        assert_eq!(config.providers[0].timeout_secs, 60);
        assert_eq!(config.providers[1].kind, ProviderKind::Deepseek);
        assert_eq!(config.providers[1].timeout_secs, 30);
        assert_eq!(config.providers[1].max_retries, 1);
    }

    #[test]
    fn empty_pool_fails_validation() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_model_fails_validation() {
        let raw = r#"
            [[providers]]
            kind = "qwen"
            model = ""
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn sampling_defaults_parse() {
        let raw = r#"
            [[providers]]
            kind = "claude"
            model = "anthropic.claude-3-5-sonnet-20241022-v2:0"
            region = "us-east-1"
            temperature = 0.2
            max_tokens = 2048
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        let provider = &config.providers[0];
        assert_eq!(provider.temperature, Some(0.2));
        assert_eq!(provider.max_tokens, Some(2048));
        assert_eq!(provider.region.as_deref(), Some("us-east-1"));
    }
}
