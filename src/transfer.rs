// transfer module: upload orchestration over registry-owned sessions
pub mod helpers;
pub mod link;
pub mod session;

pub use helpers::{join_remote, project_relative};

use std::path::Path;
use std::sync::PoisonError;

use crate::SyncError;
use crate::registry::SessionRegistry;

/// Non-failure outcomes of one upload intent. A skip by ignore rule is
/// deliberately not an error.
#[derive(Debug, Clone)]
pub enum UploadStatus {
    Uploaded { remote: String, bytes: u64 },
    Skipped { pattern: String },
}

/// The editing-environment side of the protocol. The orchestrator asks it to
/// initialize a target at most once per call and hands it every user-visible
/// status line; debug logging goes through `tracing` instead.
pub trait Frontend {
    /// Discover and validate the settings document governing `file` and
    /// register the resulting target with the session registry.
    fn initialize_target(&self, file: &Path) -> anyhow::Result<()>;
    fn report_status(&self, message: &str);
}

/// Drive one local file through its target's session: registry lookup (with
/// a single initialization request on miss), ignore filtering on the
/// slash-relative project path, then the session's upload protocol. Every
/// failure is recorded as a status line and re-propagated; nothing is
/// swallowed except the ignore skip.
pub fn upload_path(
    registry: &SessionRegistry,
    frontend: &dyn Frontend,
    name: &str,
    local: &Path,
) -> anyhow::Result<UploadStatus> {
    let session = match registry.get(name) {
        Some(s) => s,
        None => {
            if let Err(e) = frontend.initialize_target(local) {
                frontend.report_status(&format!("SFTP: {}", e));
                return Err(e);
            }
            match registry.get(name) {
                Some(s) => s,
                None => {
                    let e = SyncError::InitializationFailed(name.to_string());
                    frontend.report_status(&format!("SFTP: {}", e));
                    return Err(e.into());
                }
            }
        }
    };
    let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);

    // 相对路径与忽略规则均不触网，失败直接上报
    let (rel, remote) = {
        let target = session.target();
        let rel = match project_relative(local, &target.project_root) {
            Ok(r) => r,
            Err(e) => {
                frontend.report_status(&format!("SFTP: {}", e));
                return Err(e.into());
            }
        };
        for pattern in &target.ignore {
            if pattern.is_match(&rel) {
                tracing::debug!("忽略文件 {}（规则 {}）", rel, pattern);
                return Ok(UploadStatus::Skipped { pattern: pattern.to_string() });
            }
        }
        let remote = join_remote(&target.remote_path, &rel);
        (rel, remote)
    };

    match session.upload(local, &remote) {
        Ok(bytes) => {
            let file_name = local.file_name().map(|s| s.to_string_lossy().to_string());
            frontend.report_status(&format!("done {}", file_name.as_deref().unwrap_or(&rel)));
            tracing::debug!("{} → {}", rel, remote);
            Ok(UploadStatus::Uploaded { remote, bytes })
        }
        Err(e) => {
            frontend.report_status(&format!("SFTP: {}", e));
            Err(e.into())
        }
    }
}
