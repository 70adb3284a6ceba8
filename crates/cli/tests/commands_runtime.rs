use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use shopmate_cli::commands::{ask, config, migrate, seed};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("SHOPMATE_DATABASE_URL", "sqlite::memory:?cache=shared")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("applied"), "summary should report a count: {message}");
        assert!(
            message.contains("sqlite::memory:"),
            "summary should name the database: {message}"
        );
    });
}

#[test]
fn seed_loads_the_demo_catalog() {
    with_env(&[("SHOPMATE_DATABASE_URL", "sqlite::memory:?cache=shared")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected successful seed run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("seeded"), "seed summary should report a count: {message}");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("SHOPMATE_DATABASE_URL", "sqlite::memory:?cache=shared")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(
            parse_payload(&first.output)["message"],
            parse_payload(&second.output)["message"]
        );
    });
}

#[test]
fn config_validate_rejects_a_bad_log_level() {
    with_env(&[("SHOPMATE_LOGGING_LEVEL", "shouting")], || {
        let result = config::validate();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_show_redacts_api_keys() {
    with_env(&[("SHOPMATE_LLM_API_KEY", "sk-very-secret-value")], || {
        let output = config::show();
        assert!(!output.contains("sk-very-secret-value"));
        assert!(output.contains("llm.api_key = sk-v***"));
    });
}

#[test]
fn ask_rejects_a_too_short_query() {
    with_env(&[], || {
        let result = ask::run("hi");
        assert_eq!(result.exit_code, 2, "expected invalid query failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["error_class"], "invalid_query");

        // Two code points, six bytes. Length is counted in characters.
        let result = ask::run("日本");
        assert_eq!(result.exit_code, 2, "expected invalid query failure code");
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_query");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHOPMATE_DATABASE_URL",
        "SHOPMATE_DATABASE_MAX_CONNECTIONS",
        "SHOPMATE_DATABASE_TIMEOUT_SECS",
        "SHOPMATE_LLM_PROVIDER",
        "SHOPMATE_LLM_API_KEY",
        "SHOPMATE_LLM_BASE_URL",
        "SHOPMATE_LLM_MODEL",
        "SHOPMATE_LLM_TIMEOUT_SECS",
        "SHOPMATE_SEARCH_ENDPOINT",
        "SHOPMATE_SEARCH_API_KEY",
        "SHOPMATE_SEARCH_TIMEOUT_SECS",
        "SHOPMATE_ADVISOR_MIN_SCORE",
        "SHOPMATE_ADVISOR_TOP_K",
        "SHOPMATE_ADVISOR_RECENT_TURNS",
        "SHOPMATE_SERVER_BIND_ADDRESS",
        "SHOPMATE_SERVER_PORT",
        "SHOPMATE_LOGGING_LEVEL",
        "SHOPMATE_LOGGING_FORMAT",
        "SHOPMATE_LOG_LEVEL",
        "SHOPMATE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
