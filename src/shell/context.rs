use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Mutable session state threaded through every component that needs it.
///
/// Only the dispatch loop applies mutations (`cd`, exit status), between
/// pipelines. Concurrent pipeline stages receive clones.
#[derive(Debug, Clone)]
pub struct ShellContext {
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub exit_code: i32,
}

impl ShellContext {
    pub fn new() -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            cwd,
            env,
            exit_code: 0,
        }
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Resolve a path argument against the session working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.cwd.join(p)
        }
    }
}

impl Default for ShellContext {
    fn default() -> Self {
        Self::new()
    }
}
