use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use owo_colors::OwoColorize;

use crate::SyncError;
use crate::config;
use crate::registry::SessionRegistry;
use crate::transfer::{Frontend, UploadStatus, upload_path};
use crate::util;

/// CLI side of the collaborator protocol: discovers/registers targets and
/// turns status lines into colored terminal output. Single-threaded by
/// design — the session serializes uploads anyway.
pub struct CliFrontend<'a> {
    registry: &'a SessionRegistry,
    quiet: bool,
    spinner: RefCell<Option<ProgressBar>>,
}

impl<'a> CliFrontend<'a> {
    pub fn new(registry: &'a SessionRegistry, quiet: bool) -> Self {
        let _ = util::try_enable_ansi_on_windows();
        CliFrontend { registry, quiet, spinner: RefCell::new(None) }
    }

    fn begin(&self, file_name: &str) {
        if !self.quiet {
            let pb = util::transfer_spinner(format!("local → remote {}", file_name));
            self.spinner.replace(Some(pb));
        }
    }

    fn clear_spinner(&self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl Frontend for CliFrontend<'_> {
    fn initialize_target(&self, file: &Path) -> Result<()> {
        let target = config::resolve_target(file)?;
        let name = target.name.clone();
        tracing::debug!("注册目标 '{}'（{}）", name, target.addr());
        self.registry.get_or_create(&name, target);
        Ok(())
    }

    fn report_status(&self, message: &str) {
        self.clear_spinner();
        if self.quiet {
            return;
        }
        if message.starts_with("done ") {
            println!("{}", message.green());
        } else {
            eprintln!("{}", message.red());
        }
    }
}

fn absolutize(p: &Path) -> Result<PathBuf> {
    if p.is_absolute() {
        Ok(p.to_path_buf())
    } else {
        let cwd = std::env::current_dir().with_context(|| "无法获取当前工作目录")?;
        Ok(cwd.join(p))
    }
}

/// `ups up`：逐个文件驱动编排器；全部尝试后如有失败，重新抛出首个失败。
pub fn handle_up(files: Vec<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let registry = SessionRegistry::new();
    let frontend = CliFrontend::new(&registry, quiet);
    let start = Instant::now();

    let mut uploaded: u64 = 0;
    let mut skipped: u64 = 0;
    let mut total_bytes: u64 = 0;
    let mut failures: Vec<SyncError> = Vec::new();

    for file in &files {
        let local = absolutize(file)?;
        let display_name = local
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| local.display().to_string());

        // 先解析目标名；会话注册延迟到编排器的初始化请求
        let name = match config::resolve_target(&local) {
            Ok(t) => t.name,
            Err(e) => {
                frontend.report_status(&format!("SFTP: {}", e));
                failures.push(e);
                continue;
            }
        };

        frontend.begin(&display_name);
        match upload_path(&registry, &frontend, &name, &local) {
            Ok(UploadStatus::Uploaded { remote, bytes }) => {
                uploaded += 1;
                total_bytes += bytes;
                tracing::debug!("已上传 {} → {}", local.display(), remote);
            }
            Ok(UploadStatus::Skipped { pattern }) => {
                skipped += 1;
                frontend.clear_spinner();
                tracing::debug!("已跳过 {}（规则 {}）", local.display(), pattern);
            }
            Err(e) => {
                let err = match e.downcast::<SyncError>() {
                    Ok(se) => se,
                    Err(other) => SyncError::Configuration(other.to_string()),
                };
                failures.push(err);
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    if !quiet {
        println!(
            "完成: {} 文件 ({}) | 跳过: {} | 失败: {} | 耗时 {:.2} 秒",
            uploaded,
            util::human_bytes(total_bytes),
            skipped,
            failures.len(),
            elapsed
        );
    }

    let mut failures_path: Option<PathBuf> = None;
    if !failures.is_empty() {
        failures_path = util::write_failures_jsonl(None, &failures);
        if !quiet
            && let Some(ref p) = failures_path
        {
            println!("失败清单已写入: {}", p.display());
        }
    }

    if json {
        let summary_obj = serde_json::json!({
            "uploaded": uploaded,
            "skipped": skipped,
            "failures": failures.len(),
            "total_bytes": total_bytes,
            "elapsed_secs": elapsed,
            "failures_path": failures_path.as_ref().map(|p| p.to_string_lossy().to_string()),
        });
        if let Ok(line) = serde_json::to_string(&summary_obj) {
            println!("{}", line);
        }
    }

    match failures.into_iter().next() {
        Some(first) => Err(first.into()),
        None => Ok(()),
    }
}

/// `ups check`：解析并校验最近的配置文档，不触网。
pub fn handle_check(path: PathBuf) -> Result<()> {
    let start = absolutize(&path)?;
    let Some((settings_path, project_root)) = config::discover(&start) else {
        eprintln!(
            "❌ 未找到 {}/{}（从 {} 向上查找）",
            config::SETTINGS_DIR,
            config::SETTINGS_FILE,
            start.display()
        );
        return Ok(());
    };
    match config::load(&settings_path, project_root) {
        Ok(target) => {
            println!("✅ 配置有效: {}", settings_path.display());
            println!("  name:        {}", target.name);
            println!("  remote:      {}@{}", target.username, target.addr());
            println!("  remotePath:  {}", target.remote_path);
            println!("  projectRoot: {}", target.project_root.display());
            println!("  hostKey:     {}", target.host_key_policy);
            println!(
                "  permissions: dir={} file={}",
                target
                    .directory_permissions
                    .map(|m| format!("{:o}", m))
                    .unwrap_or_else(|| "-".to_string()),
                target
                    .file_permissions
                    .map(|m| format!("{:o}", m))
                    .unwrap_or_else(|| "-".to_string()),
            );
            println!("  uploadOnSave: {}", target.upload_on_save);
            println!("  ignore:      {} 条规则", target.ignore.len());
        }
        Err(e) => {
            eprintln!("❌ {}", e);
        }
    }
    Ok(())
}
