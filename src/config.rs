use crate::backend::{DEFAULT_COMMAND, DEFAULT_TIMEOUT, ProcessInterpreter, node_driver_args};
use crate::emit::DEFAULT_GROUP;
use crate::normalize::{DEFAULT_IDENTITY_PATTERN, DEFAULT_PLACEHOLDER, Normalizer};
use crate::transcript::{DEFAULT_PRIMARY_PROMPT, Prompts};
use crate::t_args;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct InterpreterCfg {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    /// Seconds per statement.
    pub timeout: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PromptsCfg {
    pub primary: Option<String>,
    pub continuation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct IdentityCfg {
    pub pattern: Option<String>,
    pub placeholder: Option<String>,
    pub consistent: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

// Accept lowercase keys as well
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RawConfig {
    #[serde(alias = "interpreter")]
    pub interpreter: Option<InterpreterCfg>,
    #[serde(alias = "prompts")]
    pub prompts: Option<PromptsCfg>,
    #[serde(alias = "identity")]
    pub identity: Option<IdentityCfg>,
    #[serde(alias = "prologue")]
    pub prologue: Option<String>,
    #[serde(alias = "extensions")]
    pub extensions: Option<OneOrMany>,
    #[serde(alias = "group")]
    pub group: Option<String>,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub command: Option<String>,
    pub timeout: Option<u64>,
    pub prologue: Option<String>,
    pub prompt: Option<String>,
    pub identity_pattern: Option<String>,
    pub consistent_identity: bool,
    pub group: Option<String>,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub interpreter: ProcessInterpreter,
    pub prompts: Prompts,
    pub normalizer: Normalizer,
    pub prologue: Option<String>,
    pub extensions: Vec<String>,
    pub group: String,
}

pub fn load_config(path: &Path) -> Result<RawConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| t_args!("config-failed-to-read", "file" => path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| t_args!("config-yaml-error", "file" => path.display()))
}

fn resolve_path_relative_to_config(cmd: &str, config_path: &Path) -> String {
    let path = Path::new(cmd);
    // bare names are looked up on PATH
    if path.is_absolute() || path.components().count() < 2 {
        return cmd.to_string();
    }
    match config_path.parent() {
        Some(dir) => dir.join(path).to_string_lossy().into_owned(),
        None => cmd.to_string(),
    }
}

fn is_node(command: &str) -> bool {
    Path::new(command)
        .file_stem()
        .is_some_and(|stem| stem == DEFAULT_COMMAND)
}

/// Merges built-in defaults, the config file (if any) and CLI overrides.
pub fn resolve(config: Option<(&RawConfig, &Path)>, overrides: &Overrides) -> Result<Settings> {
    let raw = config.map(|(raw, _)| raw.clone()).unwrap_or_default();
    let interp_cfg = raw.interpreter.unwrap_or_default();
    let prompts_cfg = raw.prompts.unwrap_or_default();
    let identity_cfg = raw.identity.unwrap_or_default();

    let command = match (&overrides.command, &interp_cfg.command, config) {
        (Some(cmd), _, _) => cmd.trim().to_string(),
        (None, Some(cmd), Some((_, path))) => resolve_path_relative_to_config(cmd.trim(), path),
        (None, Some(cmd), None) => cmd.trim().to_string(),
        (None, None, _) => DEFAULT_COMMAND.to_string(),
    };
    let args = match interp_cfg.args {
        Some(args) => args,
        None if is_node(&command) => node_driver_args(),
        None => Vec::new(),
    };
    let timeout = overrides
        .timeout
        .or(interp_cfg.timeout)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);

    let primary = overrides
        .prompt
        .clone()
        .or(prompts_cfg.primary)
        .unwrap_or_else(|| DEFAULT_PRIMARY_PROMPT.to_string());
    // a different primary prompt on the CLI implies its own continuation
    let continuation = if overrides.prompt.is_some() {
        None
    } else {
        prompts_cfg.continuation
    };
    let prompts = match continuation {
        Some(cont) => Prompts::with_continuation(&primary, &cont)?,
        None => Prompts::new(&primary)?,
    };

    let pattern = overrides
        .identity_pattern
        .clone()
        .or(identity_cfg.pattern)
        .unwrap_or_else(|| DEFAULT_IDENTITY_PATTERN.to_string());
    let placeholder = identity_cfg
        .placeholder
        .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string());
    let normalizer = Normalizer::new(&pattern, &placeholder)?.with_consistent_identity(
        overrides.consistent_identity || identity_cfg.consistent.unwrap_or(false),
    );

    let extensions = raw
        .extensions
        .map(OneOrMany::into_vec)
        .unwrap_or_else(|| vec!["js".to_string()])
        .into_iter()
        .map(|e| e.trim().trim_start_matches('.').to_string())
        .collect();

    Ok(Settings {
        interpreter: ProcessInterpreter {
            command,
            args,
            timeout: Some(timeout),
            quiet: overrides.quiet,
        },
        prompts,
        normalizer,
        prologue: overrides.prologue.clone().or(raw.prologue),
        extensions,
        group: overrides
            .group
            .clone()
            .or(raw.group)
            .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_bundled_node_driver() {
        let settings = resolve(None, &Overrides::default()).unwrap();
        assert_eq!(settings.interpreter.command, "node");
        assert_eq!(settings.interpreter.args, node_driver_args());
        assert_eq!(settings.interpreter.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(settings.prompts, Prompts::default());
        assert_eq!(settings.extensions, vec!["js"]);
        assert!(settings.prologue.is_none());
    }

    #[test]
    fn config_file_then_cli_overrides() {
        let yaml = r#"
Interpreter:
  Command: tools/rhino-driver
  Args: ["--strict"]
  Timeout: 5
Prompts:
  Primary: "rb>"
  Continuation: "  *"
Identity:
  Consistent: true
Prologue: "importPackage(Packages.widgets);"
Extensions: [".js", "txt"]
Group: widgets
"#;
        let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
        let path = Path::new("/project/doctest.yaml");
        let settings = resolve(Some((&raw, path)), &Overrides::default()).unwrap();
        assert_eq!(settings.interpreter.command, "/project/tools/rhino-driver");
        assert_eq!(settings.interpreter.args, vec!["--strict"]);
        assert_eq!(settings.interpreter.timeout, Some(Duration::from_secs(5)));
        assert_eq!(settings.prompts.continuation, "  *");
        assert!(settings.normalizer.is_consistent());
        assert_eq!(settings.extensions, vec!["js", "txt"]);
        assert_eq!(settings.group, "widgets");

        let overrides = Overrides {
            command: Some("node".into()),
            timeout: Some(1),
            prompt: Some(">>>".into()),
            prologue: Some("var x = 1;".into()),
            ..Overrides::default()
        };
        let settings = resolve(Some((&raw, path)), &overrides).unwrap();
        assert_eq!(settings.interpreter.command, "node");
        assert_eq!(settings.interpreter.args, vec!["--strict"]);
        assert_eq!(settings.interpreter.timeout, Some(Duration::from_secs(1)));
        assert_eq!(settings.prompts.primary, ">>>");
        assert_eq!(settings.prompts.continuation, "  >");
        assert_eq!(settings.prologue.as_deref(), Some("var x = 1;"));
    }

    #[test]
    fn lowercase_keys_and_single_extension() {
        let raw: RawConfig = serde_yaml::from_str("interpreter:\n  Command: rhino\nextensions: doctest\n").unwrap();
        let settings = resolve(Some((&raw, Path::new("cfg.yaml"))), &Overrides::default()).unwrap();
        assert_eq!(settings.interpreter.command, "rhino");
        assert!(settings.interpreter.args.is_empty());
        assert_eq!(settings.extensions, vec!["doctest"]);
    }

    #[test]
    fn bad_identity_pattern_is_rejected() {
        let overrides = Overrides {
            identity_pattern: Some(r"\w+@[0-9a-f]+".into()),
            ..Overrides::default()
        };
        assert!(resolve(None, &overrides).is_err());
    }
}
