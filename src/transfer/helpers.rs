use std::path::Path;

use crate::SyncError;

/// Express `local` relative to `project_root` as a forward-slash path.
/// Remote paths are always slash-separated regardless of the host OS, so the
/// relative part is rebuilt from components instead of using the platform
/// separator.
pub fn project_relative(local: &Path, project_root: &Path) -> Result<String, SyncError> {
    let rel = local.strip_prefix(project_root).map_err(|_| {
        SyncError::Configuration(format!(
            "文件不在项目根目录下: {}（root: {}）",
            local.display(),
            project_root.display()
        ))
    })?;
    let mut out = String::new();
    for comp in rel.components() {
        use std::path::Component;
        match comp {
            Component::Normal(seg) => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(&seg.to_string_lossy());
            }
            Component::CurDir => {}
            _ => {
                return Err(SyncError::Configuration(format!(
                    "相对路径包含非法分量: {}",
                    rel.display()
                )));
            }
        }
    }
    if out.is_empty() {
        return Err(SyncError::Configuration(format!(
            "路径与项目根目录相同: {}",
            local.display()
        )));
    }
    Ok(out)
}

/// Collapse repeated slashes; remote paths never contain backslashes by the
/// time they get here.
pub fn normalize_remote(p: &str) -> String {
    let mut s = p.to_string();
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    s
}

/// Join the remote root with a slash-relative path.
pub fn join_remote(remote_root: &str, rel: &str) -> String {
    normalize_remote(&format!("{}/{}", remote_root.trim_end_matches('/'), rel))
}

/// Ancestor directories of `remote` below `remote_root`, ordered root-to-leaf
/// and excluding both the root itself and the final (file) segment.
/// `remote` is expected to live under the root (the orchestrator builds it
/// that way); anything else yields an empty chain.
pub fn ancestor_dirs(remote_root: &str, remote: &str) -> Vec<String> {
    let root = remote_root.trim_end_matches('/');
    let Some(rel) = remote.strip_prefix(root) else {
        return Vec::new();
    };
    let rel = rel.trim_start_matches('/');
    let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return Vec::new();
    }
    let mut chain = Vec::with_capacity(segments.len() - 1);
    let mut accum = root.to_string();
    for seg in &segments[..segments.len() - 1] {
        accum.push('/');
        accum.push_str(seg);
        chain.push(accum.clone());
    }
    chain
}
