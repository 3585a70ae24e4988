use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::SyncError;

/// 项目内配置文档的位置：<project root>/.upsync/sftp.json
pub const SETTINGS_DIR: &str = ".upsync";
pub const SETTINGS_FILE: &str = "sftp.json";

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_directory_permissions() -> Option<String> {
    Some("755".to_string())
}

fn default_file_permissions() -> Option<String> {
    Some("644".to_string())
}

/// Settings document as written by the user. Field names are the literal
/// document keys; unknown keys are rejected at parse time so typos surface
/// immediately instead of silently falling back to defaults.
/// 显式 null 可用于关闭 directoryPermissions / filePermissions 的 chmod。
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawTargetConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub remote_path: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default = "default_directory_permissions")]
    pub directory_permissions: Option<String>,
    #[serde(default = "default_file_permissions")]
    pub file_permissions: Option<String>,
    #[serde(default)]
    pub upload_on_save: bool,
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Host-key verification policy, chosen by the presence of `knownHostsPath`.
/// `AutoTrust` is the original tool's weaker-security fallback; it is kept as
/// a named policy value so callers can see (and log) which mode is active.
#[derive(Debug, Clone)]
pub enum HostKeyPolicy {
    /// 严格按 known_hosts 文件校验，未知或不匹配即认证失败
    StrictFile(PathBuf),
    /// 自动信任远端主机密钥
    AutoTrust,
}

impl std::fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostKeyPolicy::StrictFile(p) => write!(f, "strict ({})", p.display()),
            HostKeyPolicy::AutoTrust => write!(f, "auto-trust"),
        }
    }
}

/// Validated, immutable description of one remote target. Constructed only
/// through [`TargetConfig::from_raw`]; owned by the registry entry it seeds.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub name: String,
    pub username: String,
    pub password: Option<String>,
    pub host_key_policy: HostKeyPolicy,
    pub private_key_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub remote_path: String,
    pub connect_timeout: Duration,
    pub directory_permissions: Option<u32>,
    pub file_permissions: Option<u32>,
    pub upload_on_save: bool,
    pub ignore: Vec<Regex>,
    /// 配置文档所在项目根目录，由发现逻辑注入，不来自文档本身
    pub project_root: PathBuf,
}

impl TargetConfig {
    /// Validating constructor: required fields must be present and non-empty,
    /// permissions parse as base-8 strings, ignore patterns compile up front.
    pub fn from_raw(raw: RawTargetConfig, project_root: PathBuf) -> Result<Self, SyncError> {
        let name = require(raw.name, "name")?;
        let username = require(raw.username, "username")?;
        let host = require(raw.host, "host")?;
        let remote_path = require(raw.remote_path, "remotePath")?;

        let host_key_policy = match raw.known_hosts_path {
            Some(p) => HostKeyPolicy::StrictFile(p),
            None => HostKeyPolicy::AutoTrust,
        };

        let directory_permissions =
            raw.directory_permissions.as_deref().map(parse_octal).transpose()?;
        let file_permissions = raw.file_permissions.as_deref().map(parse_octal).transpose()?;

        let mut ignore = Vec::with_capacity(raw.ignore.len());
        for pattern in &raw.ignore {
            let re = Regex::new(pattern).map_err(|e| {
                SyncError::Configuration(format!("ignore 规则无效: {} — {}", pattern, e))
            })?;
            ignore.push(re);
        }

        Ok(TargetConfig {
            name,
            username,
            password: raw.password,
            host_key_policy,
            private_key_path: raw.private_key_path,
            host,
            port: raw.port,
            remote_path,
            connect_timeout: Duration::from_secs(raw.connect_timeout),
            directory_permissions,
            file_permissions,
            upload_on_save: raw.upload_on_save,
            ignore,
            project_root,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn require(value: Option<String>, key: &str) -> Result<String, SyncError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SyncError::MissingField(key.to_string())),
    }
}

/// 权限字符串按八进制解析（"755" -> 0o755）
fn parse_octal(s: &str) -> Result<u32, SyncError> {
    u32::from_str_radix(s.trim(), 8)
        .map_err(|_| SyncError::Configuration(format!("权限必须为八进制字符串: '{}'", s)))
}

/// Walk up from `start` looking for the nearest settings document.
/// Returns (document path, project root). The project root is the directory
/// that contains the `.upsync` directory.
pub fn discover(start: &Path) -> Option<(PathBuf, PathBuf)> {
    let mut dir = if start.is_dir() { Some(start) } else { start.parent() };
    while let Some(d) = dir {
        let candidate = d.join(SETTINGS_DIR).join(SETTINGS_FILE);
        if candidate.is_file() {
            return Some((candidate, d.to_path_buf()));
        }
        dir = d.parent();
    }
    None
}

/// Read, parse and validate a settings document into a [`TargetConfig`].
pub fn load(settings_path: &Path, project_root: PathBuf) -> Result<TargetConfig, SyncError> {
    let text = std::fs::read_to_string(settings_path).map_err(|e| {
        SyncError::Configuration(format!("读取配置失败: {} — {}", settings_path.display(), e))
    })?;
    let raw: RawTargetConfig = serde_json::from_str(&text).map_err(|e| {
        SyncError::Configuration(format!("配置解析失败: {} — {}", settings_path.display(), e))
    })?;
    TargetConfig::from_raw(raw, project_root)
}

/// Resolve the target name governing `file`, or explain why none applies.
pub fn resolve_target(file: &Path) -> Result<TargetConfig, SyncError> {
    let (settings_path, project_root) = discover(file).ok_or_else(|| {
        SyncError::Configuration(format!(
            "未找到 {}/{}（从 {} 向上查找）",
            SETTINGS_DIR,
            SETTINGS_FILE,
            file.display()
        ))
    })?;
    tracing::debug!("发现配置 {}", settings_path.display());
    load(&settings_path, project_root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(doc: &str) -> Result<TargetConfig, SyncError> {
        let raw: RawTargetConfig = serde_json::from_str(doc).expect("valid json");
        TargetConfig::from_raw(raw, PathBuf::from("/tmp/proj"))
    }

    #[test]
    fn defaults_applied() {
        let t = parse(
            r#"{"name":"prod","username":"deploy","host":"example.com","remotePath":"/var/www"}"#,
        )
        .expect("valid config");
        assert_eq!(t.port, 22);
        assert_eq!(t.connect_timeout, Duration::from_secs(5));
        assert_eq!(t.directory_permissions, Some(0o755));
        assert_eq!(t.file_permissions, Some(0o644));
        assert!(!t.upload_on_save);
        assert!(t.ignore.is_empty());
        assert!(matches!(t.host_key_policy, HostKeyPolicy::AutoTrust));
    }

    #[test]
    fn explicit_null_disables_chmod() {
        let t = parse(
            r#"{"name":"prod","username":"deploy","host":"example.com","remotePath":"/var/www",
                "directoryPermissions":null,"filePermissions":null}"#,
        )
        .expect("valid config");
        assert_eq!(t.directory_permissions, None);
        assert_eq!(t.file_permissions, None);
    }

    #[test]
    fn missing_required_field() {
        let err = parse(r#"{"name":"prod","username":"deploy","host":"example.com"}"#)
            .expect_err("remotePath missing");
        assert!(matches!(err, SyncError::MissingField(ref k) if k == "remotePath"));
        // 空字符串同样视为缺失
        let err = parse(
            r#"{"name":"prod","username":"","host":"example.com","remotePath":"/var/www"}"#,
        )
        .expect_err("empty username");
        assert!(matches!(err, SyncError::MissingField(ref k) if k == "username"));
    }

    #[test]
    fn unknown_key_rejected() {
        let res: Result<RawTargetConfig, _> = serde_json::from_str(
            r#"{"name":"prod","username":"u","host":"h","remotePath":"/r","remotepath":"/typo"}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn octal_permissions() {
        assert_eq!(parse_octal("755").expect("octal"), 0o755);
        assert_eq!(parse_octal("0644").expect("octal"), 0o644);
        assert!(parse_octal("rwx").is_err());
        assert!(parse_octal("789").is_err());
    }

    #[test]
    fn known_hosts_path_selects_strict_policy() {
        let t = parse(
            r#"{"name":"prod","username":"deploy","host":"example.com","remotePath":"/var/www",
                "knownHostsPath":"/home/me/.ssh/known_hosts"}"#,
        )
        .expect("valid config");
        assert!(matches!(t.host_key_policy, HostKeyPolicy::StrictFile(_)));
    }

    #[test]
    fn invalid_ignore_pattern_rejected() {
        let err = parse(
            r#"{"name":"prod","username":"deploy","host":"example.com","remotePath":"/var/www",
                "ignore":["([unclosed"]}"#,
        )
        .expect_err("bad regex");
        assert!(matches!(err, SyncError::Configuration(_)));
    }
}
