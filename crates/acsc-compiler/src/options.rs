//! Resolved build options.

use crate::error::LinkResult;
use acsc_codegen::{Engine, InitOptions};
use serde::{Deserialize, Serialize};

/// Output bytecode target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Target {
    #[default]
    Zdacs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Write an IR archive instead of bytecode.
    pub output_ir: bool,
    pub target: Target,
    pub engine: Engine,
    /// Libraries the output loads at runtime.
    pub libraries: Vec<String>,
    /// Output base name.
    pub output_name: String,
    pub init: InitOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output_ir: false,
            target: Target::Zdacs,
            engine: Engine::ZDoom,
            libraries: Vec::new(),
            output_name: "out".into(),
            init: InitOptions::default(),
        }
    }
}

impl Options {
    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json(s: &str) -> LinkResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let opts = Options::from_json(r#"{"engine":"Zandronum","init":{"delay":2}}"#).unwrap();
        assert_eq!(opts.engine, Engine::Zandronum);
        assert_eq!(opts.init.delay, Some(2));
        assert_eq!(opts.init.script_number, 999);
        assert_eq!(opts.target, Target::Zdacs);
    }

    #[test]
    fn target_name_is_uppercase() {
        let opts = Options::from_json(r#"{"target":"ZDACS"}"#).unwrap();
        assert_eq!(opts.target, Target::Zdacs);
        assert!(Options::from_json(r#"{"target":"wasm"}"#).is_err());
    }
}
