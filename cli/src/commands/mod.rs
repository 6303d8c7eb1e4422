pub mod checkpoint;
pub mod cli;
pub mod run;

use std::path::PathBuf;

use anyhow::Context;
use serde_json::Value;
use taskflow_core::{AppConfig, Params};

/// Parse repeated `KEY=VALUE` arguments into workflow parameters.
///
/// Values are read as JSON (`500`, `true`, `{"a":1}`); anything that is not
/// valid JSON is kept as a string.
pub fn parse_params(pairs: &[String]) -> anyhow::Result<Params> {
    let mut params = Params::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("invalid --param '{pair}', expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("invalid --param '{pair}', empty key");
        }
        let value =
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

/// Checkpoint directory from the flag, falling back to config.
pub fn checkpoint_dir(flag: Option<&PathBuf>, cfg: &AppConfig) -> PathBuf {
    flag.cloned()
        .unwrap_or_else(|| PathBuf::from(&cfg.checkpoint.directory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn values_are_typed_when_they_parse_as_json() {
        let params = parse_params(&args(&[
            "date=2024-12-15",
            "batch_size=500",
            "threshold=0.7",
            "include_graphs=true",
            "region=Europe",
            "note=a=b",
        ]))
        .unwrap();

        assert_eq!(params["date"], json!("2024-12-15"));
        assert_eq!(params["batch_size"], json!(500));
        assert_eq!(params["threshold"], json!(0.7));
        assert_eq!(params["include_graphs"], json!(true));
        assert_eq!(params["region"], json!("Europe"));
        assert_eq!(params["note"], json!("a=b"));
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(parse_params(&args(&["no_equals"])).is_err());
        assert!(parse_params(&args(&["=value"])).is_err());
    }

    #[test]
    fn flag_overrides_configured_directory() {
        let cfg = AppConfig::default();
        assert_eq!(checkpoint_dir(None, &cfg), PathBuf::from("workflow_checkpoints"));
        let flag = PathBuf::from("/tmp/cp");
        assert_eq!(checkpoint_dir(Some(&flag), &cfg), flag);
    }
}
