use ho_domain::config::{Config, ConfigSeverity, CursorPolicy};

#[test]
fn empty_file_uses_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.sessions.history_max_chars, 20_000);
    assert_eq!(config.delivery.chunk_chars, 3_800);
    assert_eq!(config.analysis.deadline_secs, 120);
    assert_eq!(config.orchestrator.reply_deadline_secs, 180);
    assert_eq!(config.llm.models.len(), 5);
    assert_eq!(config.llm.cursor_policy, CursorPolicy::Sticky);
    assert!(config.sources.is_empty());
}

#[test]
fn sources_parse_with_defaults() {
    let toml_str = r#"
[sources.router]
label = "OpenWrt"
command = "logread | tail -n {lines}"

[sources.proxy]
command = "cat /var/log/proxy.log"
timeout_secs = 5
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.sources.len(), 2);
    let router = &config.sources["router"];
    assert_eq!(router.label.as_deref(), Some("OpenWrt"));
    assert_eq!(router.timeout_secs, 30);
    assert_eq!(config.sources["proxy"].timeout_secs, 5);
}

#[test]
fn access_section_parses() {
    let toml_str = r#"
[access]
admin_id = "1001"
allowed_users = ["1002", "1003"]
permissions_file = "/var/lib/homeops/permissions.json"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.access.admin_id.as_deref(), Some("1001"));
    assert_eq!(config.access.allowed_users.len(), 2);
    assert_eq!(
        config.access.permissions_file.as_deref(),
        Some("/var/lib/homeops/permissions.json")
    );
}

#[test]
fn grants_are_in_memory_by_default() {
    assert!(Config::default().access.permissions_file.is_none());
}

#[test]
fn submit_defaults_to_dry_run() {
    let config = Config::default();
    assert!(config.submit.webhook_url.is_none());
    assert_eq!(config.submit.token_env, "HOMEOPS_SUBMIT_TOKEN");
}

#[test]
fn validate_flags_empty_models_and_zero_chunk() {
    let toml_str = r#"
[llm]
models = []

[delivery]
chunk_chars = 0
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    let fields: Vec<&str> = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .map(|e| e.field.as_str())
        .collect();
    assert!(fields.contains(&"llm.models"));
    assert!(fields.contains(&"delivery.chunk_chars"));
    assert!(config.has_errors());
}

#[test]
fn validate_flags_blank_source_command() {
    let toml_str = r#"
[sources.router]
command = "   "
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.field == "sources.router.command" && e.severity == ConfigSeverity::Error));
}

#[test]
fn validate_warns_without_keys() {
    let toml_str = r#"
[llm]
key_env = "HO_TEST_UNSET_KEY_ENV_4410"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    let key_issue = issues.iter().find(|e| e.field == "llm.keys").unwrap();
    assert_eq!(key_issue.severity, ConfigSeverity::Warning);
    assert!(!config.has_errors());
}

#[test]
fn validate_rejects_non_http_webhook() {
    let toml_str = r#"
[submit]
webhook_url = "ftp://router.lan/apply"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config.has_errors());
}

#[test]
fn config_error_display_format() {
    let toml_str = r#"
[delivery]
chunk_chars = 0
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issue = config
        .validate()
        .into_iter()
        .find(|e| e.field == "delivery.chunk_chars")
        .unwrap();
    assert_eq!(
        issue.to_string(),
        "[ERROR] delivery.chunk_chars: chunk size must be greater than 0"
    );
}
