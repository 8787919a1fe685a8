//! YAML loading with `!env_var` substitution
//!
//! `!env_var NAME` is replaced by the variable's value; `!env_var NAME default`
//! falls back to `default` when the variable is unset. Substituted values are
//! re-read as YAML scalars so `!env_var TIMEOUT 600` yields a number.

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// Read a YAML file and resolve its tags
pub fn load_yaml_file(path: &Path) -> ConfigResult<Value> {
    debug!("Loading YAML file: {:?}", path);
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_yaml_str(&content, path)
}

/// Parse YAML text and resolve its tags; `source` names it in errors
pub fn load_yaml_str(content: &str, source: &Path) -> ConfigResult<Value> {
    // An empty document parses to null, which the config treats as all defaults
    let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::Yaml {
        path: source.to_path_buf(),
        source: e,
    })?;
    process_value(value, source)
}

fn process_value(value: Value, source: &Path) -> ConfigResult<Value> {
    match value {
        Value::Tagged(tagged) => process_tagged(*tagged, source),
        Value::Mapping(map) => {
            let mut result = serde_yaml::Mapping::new();
            for (k, v) in map {
                result.insert(process_value(k, source)?, process_value(v, source)?);
            }
            Ok(Value::Mapping(result))
        }
        Value::Sequence(seq) => Ok(Value::Sequence(
            seq.into_iter()
                .map(|v| process_value(v, source))
                .collect::<ConfigResult<Vec<_>>>()?,
        )),
        _ => Ok(value),
    }
}

fn process_tagged(tagged: TaggedValue, source: &Path) -> ConfigResult<Value> {
    let tag = tagged.tag.to_string();
    trace!("Processing tag '{}' with value {:?}", tag, tagged.value);

    if tag == "!env_var" {
        return process_env_var(tagged.value, source);
    }

    // Unknown tags are kept; serde will report them if they land in a typed field
    let processed = process_value(tagged.value, source)?;
    Ok(Value::Tagged(Box::new(TaggedValue {
        tag: tagged.tag,
        value: processed,
    })))
}

fn process_env_var(value: Value, source: &Path) -> ConfigResult<Value> {
    let text = match value {
        Value::String(s) => s,
        other => {
            return Err(ConfigError::InvalidTag {
                path: source.to_path_buf(),
                reason: format!("expected 'NAME [default]', got {:?}", other),
            })
        }
    };

    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let var = parts.next().unwrap_or_default().to_string();
    if var.is_empty() {
        return Err(ConfigError::InvalidTag {
            path: source.to_path_buf(),
            reason: "missing variable name".to_string(),
        });
    }
    let default = parts.next().map(str::trim);

    let raw = match (std::env::var(&var), default) {
        (Ok(value), _) => value,
        (Err(_), Some(default)) => default.to_string(),
        (Err(_), None) => {
            return Err(ConfigError::MissingEnvVar {
                var,
                path: source.to_path_buf(),
            })
        }
    };

    debug!("Substituted env var: {}", var);
    Ok(scalar(raw))
}

/// Re-type a substituted string as a YAML scalar
fn scalar(raw: String) -> Value {
    match serde_yaml::from_str::<Value>(&raw) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        _ => Value::String(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(content: &str) -> ConfigResult<Value> {
        load_yaml_str(content, Path::new("test.yaml"))
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RETRO_LOADER_TEST_LEVEL", "debug");
        let value = load("level: !env_var RETRO_LOADER_TEST_LEVEL").unwrap();
        assert_eq!(value["level"], Value::String("debug".into()));
    }

    #[test]
    fn test_env_var_default_is_typed() {
        let value = load("secs: !env_var RETRO_LOADER_TEST_UNSET_1 600").unwrap();
        assert_eq!(value["secs"].as_u64(), Some(600));

        let value = load("name: !env_var RETRO_LOADER_TEST_UNSET_2 two words").unwrap();
        assert_eq!(value["name"], Value::String("two words".into()));
    }

    #[test]
    fn test_env_var_missing() {
        let err = load("x: !env_var RETRO_LOADER_TEST_UNSET_3").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar { ref var, .. } if var == "RETRO_LOADER_TEST_UNSET_3"));
    }

    #[test]
    fn test_env_var_in_sequence() {
        std::env::set_var("RETRO_LOADER_TEST_PERM", "unsafe");
        let value = load("perms: [screen_read, !env_var RETRO_LOADER_TEST_PERM]").unwrap();
        assert_eq!(value["perms"][1], Value::String("unsafe".into()));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(load("a: [1, 2"), Err(ConfigError::Yaml { .. })));
    }
}
