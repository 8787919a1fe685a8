//! Script documents: a program plus its interrupt rules
//!
//! ```yaml
//! file: farm.ra
//! flows:
//!   - name: main
//!     body: [...]
//!   - name: emergency_stop
//!     body: [...]
//! interrupts:
//!   - id: panic_key
//!     priority: 100
//!     trigger: {type: hotkey, combo: ctrl+shift+q}
//!     handler: {flow: emergency_stop}
//! ```

use crate::error::{RunResult, RunnerError};
use retro_interrupt::{Handler, InterruptRule};
use retro_script::Program;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDocument {
    #[serde(flatten)]
    pub program: Program,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interrupts: Vec<InterruptRule>,
}

impl ScriptDocument {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            interrupts: Vec::new(),
        }
    }

    pub fn with_interrupt(mut self, rule: InterruptRule) -> Self {
        self.interrupts.push(rule);
        self
    }

    /// Load a `.json` document, or YAML for any other extension
    pub fn load(path: impl AsRef<Path>) -> RunResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| RunnerError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let document: Self = if is_json {
            serde_json::from_str(&content).map_err(|e| RunnerError::Json {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| RunnerError::Yaml {
                path: path.to_path_buf(),
                source: e,
            })?
        };

        debug!(
            path = %path.display(),
            flows = document.program.flows.len(),
            interrupts = document.interrupts.len(),
            "Script document loaded"
        );
        Ok(document)
    }

    /// Structural problems that would fail a run, in a stable order
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let program = &self.program;

        let mut flow_names = HashSet::new();
        for flow in &program.flows {
            if !flow_names.insert(flow.name.as_str()) {
                problems.push(format!("duplicate flow '{}'", flow.name));
            }
        }

        if let Some(main) = &program.main_flow {
            if program.flow(main).is_none() {
                problems.push(format!("main flow '{}' is not defined", main));
            }
        }

        let mut rule_ids = HashSet::new();
        for rule in &self.interrupts {
            if !rule_ids.insert(rule.id.as_str()) {
                problems.push(format!("duplicate interrupt '{}'", rule.id));
            }
            if let Handler::Flow(flow) = &rule.handler {
                match program.flow(flow) {
                    None => problems.push(format!(
                        "interrupt '{}' runs unknown flow '{}'",
                        rule.id, flow
                    )),
                    Some(decl) if !decl.params.is_empty() => problems.push(format!(
                        "interrupt '{}' runs flow '{}' which takes parameters",
                        rule.id, flow
                    )),
                    Some(_) => {}
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
file: farm.ra
main_flow: farm
constants:
  - {name: rounds, value: {type: literal, value: 3}}
flows:
  - name: farm
    body:
      - {type: return, span: {line: 2}, value: {type: identifier, name: rounds}}
  - name: recover
    body: []
interrupts:
  - id: popup
    priority: 5
    trigger: {type: image, asset: popup}
    handler:
      actions: [{type: click}]
  - id: panic
    trigger: {type: hotkey, combo: ctrl+q}
    handler: {flow: recover}
"#;

    #[test]
    fn test_yaml_document_flattens_program() {
        let document: ScriptDocument = serde_yaml::from_str(DOCUMENT).unwrap();
        assert_eq!(document.program.file, "farm.ra");
        assert_eq!(document.program.main().map(|f| f.name.as_str()), Some("farm"));
        assert_eq!(document.program.constants.len(), 1);
        assert_eq!(document.interrupts.len(), 2);
        assert!(document.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut document: ScriptDocument = serde_yaml::from_str(DOCUMENT).unwrap();
        document.program.main_flow = Some("missing".into());
        document.interrupts[1].handler = Handler::Flow("nowhere".into());
        document.interrupts.push(document.interrupts[0].clone());

        assert_eq!(
            document.validate(),
            vec![
                "main flow 'missing' is not defined".to_string(),
                "interrupt 'panic' runs unknown flow 'nowhere'".to_string(),
                "duplicate interrupt 'popup'".to_string(),
            ]
        );
    }

    #[test]
    fn test_document_without_interrupts() {
        let document: ScriptDocument =
            serde_json::from_str(r#"{"flows": [{"name": "main", "body": []}]}"#).unwrap();
        assert!(document.interrupts.is_empty());
        assert_eq!(document.program.file, "<script>");
    }
}
