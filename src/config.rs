use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;

use crate::shell::context::ShellContext;

pub const DEFAULT_PROMPT: &str = "$ ";
const RC_FILE: &str = ".mish.toml";

/// Optional rc-file settings. Everything has a default; a missing rc file
/// is simply an empty config.
#[derive(Debug, Default, Deserialize)]
pub struct ShellConfig {
    pub prompt: Option<String>,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryConfig {
    pub file: Option<String>,
    pub limit: Option<usize>,
}

impl ShellConfig {
    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }

    pub fn history_limit(&self) -> Option<usize> {
        self.history.limit
    }

    /// History file resolution order: $HISTFILE, then the rc file entry,
    /// then none (history stays in memory).
    pub fn history_file(&self, ctx: &ShellContext) -> Option<PathBuf> {
        let raw = ctx
            .var("HISTFILE")
            .map(str::to_owned)
            .or_else(|| self.history.file.clone())?;
        Some(expand_home(&raw, ctx))
    }
}

fn expand_home(path: &str, ctx: &ShellContext) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = ctx.var("HOME") {
            return Path::new(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load the rc file from an explicit path or from $HOME. An explicit path
/// must exist; the implicit one is optional.
pub fn load_config(explicit: Option<&Path>, ctx: &ShellContext) -> Result<ShellConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let Some(home) = ctx.var("HOME") else {
                return Ok(ShellConfig::default());
            };
            let path = Path::new(home).join(RC_FILE);
            if !path.exists() {
                return Ok(ShellConfig::default());
            }
            path
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: ShellConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    debug!("loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(vars: &[(&str, &str)]) -> ShellContext {
        let mut ctx = ShellContext::new();
        ctx.env.clear();
        for (k, v) in vars {
            ctx.env.insert(k.to_string(), v.to_string());
        }
        ctx
    }

    #[test]
    fn defaults_when_nothing_is_configured() {
        let config = ShellConfig::default();
        assert_eq!(config.prompt(), "$ ");
        assert_eq!(config.history_limit(), None);
        assert_eq!(config.history_file(&ctx_with(&[])), None);
    }

    #[test]
    fn rc_file_settings_parse() {
        let config: ShellConfig = toml::from_str(
            r#"
            prompt = "% "

            [history]
            file = "~/.mish_history"
            limit = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.prompt(), "% ");
        assert_eq!(config.history_limit(), Some(500));

        let ctx = ctx_with(&[("HOME", "/home/someone")]);
        assert_eq!(
            config.history_file(&ctx),
            Some(PathBuf::from("/home/someone/.mish_history"))
        );
    }

    #[test]
    fn histfile_env_beats_the_rc_file() {
        let config: ShellConfig =
            toml::from_str("[history]\nfile = \"/tmp/rc_history\"\n").unwrap();
        let ctx = ctx_with(&[("HISTFILE", "/tmp/env_history")]);
        assert_eq!(
            config.history_file(&ctx),
            Some(PathBuf::from("/tmp/env_history"))
        );
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let ctx = ctx_with(&[]);
        let missing = Path::new("/nonexistent/mish-config.toml");
        assert!(load_config(Some(missing), &ctx).is_err());
    }
}
