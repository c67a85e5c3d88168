use std::fs;
use std::path::{Path, PathBuf};

use crate::shell::context::ShellContext;

/// Find the first executable match for `name` across the session's PATH
/// directories, or resolve an explicit path relative to the session cwd.
pub fn find_executable(ctx: &ShellContext, name: &str) -> Option<PathBuf> {
    which::which_in(name, ctx.var("PATH"), &ctx.cwd).ok()
}

/// Collect executable names on the PATH starting with `prefix`, sorted
/// lexicographically. Unreadable directories are skipped; a missing PATH
/// yields no candidates.
pub fn executables_with_prefix(ctx: &ShellContext, prefix: &str) -> Vec<String> {
    let mut matches = Vec::new();
    let Some(path_env) = ctx.var("PATH") else {
        return matches;
    };
    for dir in std::env::split_paths(path_env) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) && is_executable_file(&entry.path()) {
                matches.push(name);
            }
        }
    }
    matches.sort();
    matches
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
