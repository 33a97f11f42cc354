use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{ProvisionError, ProvisionResult};
use tempfile::NamedTempFile;

/// Find an executable on `PATH`.
///
/// Names containing a path separator are checked as given.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) {
        let candidate = PathBuf::from(name);
        return candidate.is_file().then_some(candidate);
    }

    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            tracing::debug!(tool = name, path = %candidate.display(), "Found tool");
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Mode for files [`write_atomic`] creates.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Replace `path` with `contents` without exposing a partially written file.
///
/// The data goes to a temp file in the same directory, is synced, then
/// renamed over the destination. Missing parent directories are created.
/// A symlinked destination has its target replaced, and an existing file
/// keeps its permissions.
pub fn write_atomic(path: &Path, contents: &[u8]) -> ProvisionResult<()> {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let path = resolved.as_path();

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| {
        ProvisionError::Storage(format!("failed to create {}: {}", parent.display(), e))
    })?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    if let Some(permissions) = permissions_for(path) {
        tmp.as_file().set_permissions(permissions)?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| {
        ProvisionError::Storage(format!("failed to replace {}: {}", path.display(), e.error))
    })?;
    Ok(())
}

#[cfg(unix)]
fn permissions_for(path: &Path) -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = std::fs::metadata(path)
        .map(|m| m.permissions())
        .unwrap_or_else(|_| std::fs::Permissions::from_mode(NEW_FILE_MODE));
    Some(permissions)
}

#[cfg(not(unix))]
fn permissions_for(path: &Path) -> Option<std::fs::Permissions> {
    std::fs::metadata(path).ok().map(|m| m.permissions())
}

/// Write `contents` to a fresh file in `scratch_dir`.
///
/// Used for files that an elevated `install` later copies into place; the
/// file is removed when the returned handle drops.
pub fn stage_file(scratch_dir: &Path, contents: &str) -> ProvisionResult<NamedTempFile> {
    std::fs::create_dir_all(scratch_dir)?;
    let mut tmp = NamedTempFile::new_in(scratch_dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Account that started provisioning, looking through `sudo`.
pub fn invoking_user() -> String {
    if let Ok(user) = std::env::var("SUDO_USER")
        && !user.is_empty()
    {
        return user;
    }

    match nix::unistd::User::from_uid(nix::unistd::getuid()) {
        Ok(Some(user)) => user.name,
        _ => std::env::var("USER").unwrap_or_else(|_| "pi".to_string()),
    }
}
