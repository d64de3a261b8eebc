use anyhow::{Context, Result};
use serde::Serialize;

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
}

pub fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", to_json(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnvReport;

    #[test]
    fn test_env_report_json_shape() {
        let json = to_json(&EnvReport {
            command: "node app.js".into(),
            env: vec!["A=1".into()],
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["command"], "node app.js");
        assert_eq!(value["env"][0], "A=1");
    }
}
