use secrecy::ExposeSecret;
use shopmate_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;

pub fn show() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let llm_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "(unset)".to_string());
    let search_key = config
        .search
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "(unset)".to_string());

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        format!("  database.url = {}", config.database.url),
        format!("  database.max_connections = {}", config.database.max_connections),
        format!("  database.timeout_secs = {}", config.database.timeout_secs),
        format!("  llm.provider = {:?}", config.llm.provider),
        format!("  llm.api_key = {llm_key}"),
        format!("  llm.base_url = {}", config.llm.base_url.as_deref().unwrap_or("(default)")),
        format!("  llm.model = {}", config.llm.model),
        format!("  llm.timeout_secs = {}", config.llm.timeout_secs),
        format!("  search.endpoint = {}", config.search.endpoint),
        format!("  search.api_key = {search_key}"),
        format!("  search.timeout_secs = {}", config.search.timeout_secs),
        format!("  advisor.min_score = {}", config.advisor.min_score),
        format!("  advisor.top_k = {}", config.advisor.top_k),
        format!("  advisor.recent_turns = {}", config.advisor.recent_turns),
        format!("  server.bind_address = {}", config.server.bind_address),
        format!("  server.port = {}", config.server.port),
        format!("  logging.level = {}", config.logging.level),
        format!("  logging.format = {:?}", config.logging.format),
    ];
    lines.join("\n")
}

pub fn validate() -> CommandResult {
    match AppConfig::load(LoadOptions::default()) {
        Ok(_) => CommandResult::success("config", "configuration is valid"),
        Err(error) => CommandResult::failure(
            "config",
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        ),
    }
}

/// Keeps enough of a token to recognize it in a trace without exposing it.
fn redact_token(token: &str) -> String {
    if token.is_empty() {
        return "(empty)".to_string();
    }
    let visible: String = token.chars().take(4).collect();
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn redaction_keeps_only_a_short_prefix() {
        assert_eq!(redact_token("sk-super-secret-key"), "sk-s***");
        assert_eq!(redact_token("ab"), "ab***");
        assert_eq!(redact_token(""), "(empty)");
    }
}
