use anyhow::Result;
use rapportapp::RapportConfig;
use serde::Serialize;
use serde_json::Value;

const REDACTED: &str = "***";

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", to_json(value)?);
    Ok(())
}

/// The configuration as JSON, with the bearer token masked.
pub fn redacted_config(config: &RapportConfig) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(token) = value.get_mut("drive_token") {
        if !token.is_null() {
            *token = Value::String(REDACTED.to_string());
        }
    }
    Ok(value)
}
