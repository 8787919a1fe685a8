//! Stack frames and inspectable variables

use retro_core::Value;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FrameId(u64);

impl FrameId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for FrameId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One active flow call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackFrame {
    pub id: FrameId,
    pub flow_name: String,
    /// Line of the statement about to run; 0 before the first step
    pub line: u32,
    pub locals: HashMap<String, Value>,
}

/// A variable as shown in an inspector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    pub type_name: &'static str,
    /// Lists and maps can be expanded
    pub expandable: bool,
    /// Elements of a list or entries of a map, one level deep
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Variable>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let children = match &value {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::leaf(format!("[{}]", i), item.clone()))
                .collect(),
            Value::Map(map) => map
                .iter()
                .map(|(key, item)| Self::leaf(key.clone(), item.clone()))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            children,
            ..Self::leaf(name.into(), value)
        }
    }

    fn leaf(name: String, value: Value) -> Self {
        Self {
            name,
            type_name: value.type_name(),
            expandable: value.is_composite(),
            value,
            children: Vec::new(),
        }
    }
}

/// Inspector view of a variable map, sorted by name
pub(crate) fn variables_of(values: &HashMap<String, Value>) -> Vec<Variable> {
    let mut variables: Vec<Variable> = values
        .iter()
        .map(|(name, value)| Variable::new(name.clone(), value.clone()))
        .collect();
    variables.sort_by(|a, b| a.name.cmp(&b.name));
    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_core::ValueMap;

    #[test]
    fn test_composites_expand_one_level() {
        let inner = Value::List(vec![Value::Int(1)]);
        let mut map = ValueMap::new();
        map.insert("nested".into(), inner.clone());
        map.insert("n".into(), Value::Int(2));

        let var = Variable::new("m", Value::Map(map));
        assert!(var.expandable);
        assert_eq!(var.type_name, "map");
        assert_eq!(var.children.len(), 2);
        assert_eq!(var.children[0].name, "nested");
        assert!(var.children[0].expandable);
        assert!(var.children[0].children.is_empty());
    }

    #[test]
    fn test_scalars_have_no_children() {
        let var = Variable::new("s", Value::from("text"));
        assert!(!var.expandable);
        assert_eq!(var.type_name, "string");
        assert!(var.children.is_empty());
    }

    #[test]
    fn test_variables_sorted_by_name() {
        let values: HashMap<String, Value> =
            [("b", 1), ("a", 2), ("c", 3)].iter().map(|(k, v)| (k.to_string(), Value::Int(*v))).collect();
        let names: Vec<String> = variables_of(&values).into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
