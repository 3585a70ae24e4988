use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use crate::SyncError;
use crate::config::{HostKeyPolicy, TargetConfig};
use crate::error::PutError;
use crate::transfer::helpers;
use crate::transfer::link::{RemoteLink, Ssh2Link};

// 未显式配置 directoryPermissions 时 mkdir 使用的模式
const DEFAULT_DIR_MODE: i32 = 0o755;

/// Factory for authenticated links. The production implementation is
/// [`Ssh2Connector`]; tests inject scripted connectors.
pub trait Connector: Send {
    fn connect(&self, target: &TargetConfig) -> Result<Box<dyn RemoteLink>, SyncError>;
}

/// ssh2-backed connector: TCP connect under the configured timeout,
/// handshake, host-key verification per policy, key-then-password auth,
/// then the SFTP channel.
pub struct Ssh2Connector;

impl Connector for Ssh2Connector {
    fn connect(&self, target: &TargetConfig) -> Result<Box<dyn RemoteLink>, SyncError> {
        let addr = target.addr();
        let tcp = create_tcp_connection(target)?;
        let mut sess = ssh2::Session::new().map_err(|e| {
            SyncError::Connect(addr.clone(), format!("无法创建 SSH Session: {}", e))
        })?;
        sess.set_tcp_stream(tcp);
        sess.handshake()
            .map_err(|e| SyncError::Connect(addr.clone(), format!("SSH 握手失败: {}", e)))?;
        verify_host_key(&sess, target)?;
        authenticate(&sess, target)?;
        let sftp = sess
            .sftp()
            .map_err(|e| SyncError::Connect(addr, format!("创建 SFTP 会话失败: {}", e)))?;
        Ok(Box::new(Ssh2Link { sess, sftp }))
    }
}

fn create_tcp_connection(target: &TargetConfig) -> Result<TcpStream, SyncError> {
    let addr = target.addr();
    let mut addrs = addr
        .to_socket_addrs()
        .map_err(|e| SyncError::Connect(addr.clone(), format!("无法解析地址: {}", e)))?;
    let sock = addrs
        .next()
        .ok_or_else(|| SyncError::Connect(addr.clone(), "无法解析地址".to_string()))?;
    TcpStream::connect_timeout(&sock, target.connect_timeout)
        .map_err(|e| SyncError::Connect(addr, format!("TCP 连接失败: {}", e)))
}

fn verify_host_key(sess: &ssh2::Session, target: &TargetConfig) -> Result<(), SyncError> {
    let addr = target.addr();
    match &target.host_key_policy {
        HostKeyPolicy::AutoTrust => {
            // 未配置 knownHostsPath：按显式策略自动信任远端主机密钥
            tracing::debug!("自动信任主机密钥 ({})", addr);
            Ok(())
        }
        HostKeyPolicy::StrictFile(path) => {
            let mut kh = sess
                .known_hosts()
                .map_err(|e| SyncError::Connect(addr.clone(), e.to_string()))?;
            kh.read_file(path, ssh2::KnownHostFileKind::OpenSSH).map_err(|e| {
                SyncError::Configuration(format!(
                    "known_hosts 读取失败: {} — {}",
                    path.display(),
                    e
                ))
            })?;
            let (key, _) = sess.host_key().ok_or_else(|| {
                SyncError::Authentication(addr.clone(), "无法获取远端主机密钥".to_string())
            })?;
            match kh.check_port(&target.host, target.port, key) {
                ssh2::CheckResult::Match => Ok(()),
                ssh2::CheckResult::Mismatch => Err(SyncError::Authentication(
                    addr,
                    "主机密钥与 known_hosts 不匹配".to_string(),
                )),
                ssh2::CheckResult::NotFound => Err(SyncError::Authentication(
                    addr,
                    "known_hosts 中没有该主机".to_string(),
                )),
                ssh2::CheckResult::Failure => {
                    Err(SyncError::Authentication(addr, "主机密钥校验失败".to_string()))
                }
            }
        }
    }
}

/// 密钥优先，密码兜底；两者都配置时由密钥先行尝试
fn authenticate(sess: &ssh2::Session, target: &TargetConfig) -> Result<(), SyncError> {
    let addr = target.addr();
    if let Some(key) = &target.private_key_path
        && let Err(e) = sess.userauth_pubkey_file(&target.username, None, key, None)
    {
        tracing::debug!("密钥认证未通过 ({}): {}", addr, e);
    }
    if !sess.authenticated()
        && let Some(password) = &target.password
        && let Err(e) = sess.userauth_password(&target.username, password)
    {
        tracing::debug!("密码认证未通过 ({}): {}", addr, e);
    }
    if sess.authenticated() {
        Ok(())
    } else {
        Err(SyncError::Authentication(addr, "密钥与密码认证均被拒绝".to_string()))
    }
}

/// One reusable session per target. The link handle is nullable: `None`
/// means not yet connected or invalidated. A live link is only trusted
/// until the next probe; the session cycles DISCONNECTED → CONNECTED →
/// DISCONNECTED indefinitely and is never destroyed.
pub struct Session {
    target: TargetConfig,
    link: Option<Box<dyn RemoteLink>>,
    connector: Box<dyn Connector>,
}

impl Session {
    pub(crate) fn new(target: TargetConfig, connector: Box<dyn Connector>) -> Self {
        Session { target, link: None, connector }
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Upload one file. Probes an existing link first (the transport gives no
    /// synchronous signal when the peer silently drops the connection),
    /// reconnects if needed, provisions missing remote directories on demand
    /// with a single put retry, then applies the configured file mode.
    pub fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, SyncError> {
        if let Some(link) = self.link.as_ref()
            && let Err(e) = link.probe()
        {
            tracing::debug!("连接探测失败，作废会话 ({}): {}", self.target.name, e);
            self.link = None;
        }

        if self.link.is_none() {
            let link = self.connector.connect(&self.target)?;
            tracing::debug!("新连接已建立 ({})", self.target.name);
            self.link = Some(link);
        } else {
            tracing::debug!("复用连接 ({})", self.target.name);
        }
        let link = self
            .link
            .as_deref()
            .ok_or_else(|| SyncError::Connect(self.target.addr(), "会话不可用".to_string()))?;

        let bytes = match link.put(local, remote) {
            Ok(n) => n,
            Err(PutError::MissingParent(_)) => {
                provision_parents(link, &self.target, remote)?;
                // 补建后仅重试一次；再失败即为致命错误，避免对持续异常的
                // 远端文件系统无限循环
                match link.put(local, remote) {
                    Ok(n) => n,
                    Err(PutError::LocalRead(p, m)) => return Err(SyncError::LocalRead(p, m)),
                    Err(e) => {
                        return Err(SyncError::RemoteFilesystem(
                            remote.to_string(),
                            e.to_string(),
                        ));
                    }
                }
            }
            Err(PutError::LocalRead(p, m)) => return Err(SyncError::LocalRead(p, m)),
            Err(PutError::Remote(p, m)) => return Err(SyncError::RemoteFilesystem(p, m)),
        };

        if let Some(mode) = self.target.file_permissions {
            link.chmod(remote, mode)
                .map_err(|m| SyncError::PermissionApplication(remote.to_string(), m))?;
        }
        Ok(bytes)
    }
}

/// Provision the ancestor chain of `remote` below the target's remote root,
/// strictly root-to-leaf. The root itself is assumed to exist and is never
/// created nor chmod'd. Existence is checked by listing; only directories
/// created here get the configured directory mode.
fn provision_parents(
    link: &dyn RemoteLink,
    target: &TargetConfig,
    remote: &str,
) -> Result<(), SyncError> {
    for dir in helpers::ancestor_dirs(&target.remote_path, remote) {
        if link.listdir(&dir).is_ok() {
            continue;
        }
        link.mkdir(&dir, DEFAULT_DIR_MODE).map_err(|m| {
            SyncError::RemoteFilesystem(dir.clone(), format!("创建远端目录失败: {}", m))
        })?;
        tracing::debug!("已创建远端目录 {}", dir);
        if let Some(mode) = target.directory_permissions {
            link.chmod(&dir, mode).map_err(|m| {
                SyncError::RemoteFilesystem(dir.clone(), format!("目录权限设置失败: {}", m))
            })?;
        }
    }
    Ok(())
}
