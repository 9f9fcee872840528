use ho_domain::config::{Config, ConfigSeverity};

/// Print every validation issue. Returns `false` when any is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (defaults filled in) as TOML. API keys are
/// masked.
pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

fn render(config: &Config) -> anyhow::Result<String> {
    let mut masked = config.clone();
    masked.llm.keys = masked.llm.keys.iter().map(|_| "***".to_string()).collect();
    toml::to_string_pretty(&masked).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}
