/// Structured outcome of a single SFTP put attempt. The missing-parent case
/// is a first-class result (not an error-type match) so the session can
/// decide to provision directories and retry exactly once.
#[derive(Debug, Clone)]
pub enum PutError {
    /// 远端父目录链缺失，需要先行创建
    MissingParent(String),
    /// 本地文件打开/读取失败，保留路径与原始错误消息
    LocalRead(String, String),
    /// SFTP 层返回的其他错误
    Remote(String, String),
}

impl std::fmt::Display for PutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PutError::MissingParent(p) => write!(f, "远端父目录不存在: {}", p),
            PutError::LocalRead(p, msg) => write!(f, "本地文件读取失败: {} — {}", p, msg),
            PutError::Remote(p, msg) => write!(f, "远端写入失败: {} — {}", p, msg),
        }
    }
}

impl std::error::Error for PutError {}

/// Upload/session errors that are useful to represent programmatically
/// instead of ad-hoc formatted strings.
#[derive(Debug, Clone)]
pub enum SyncError {
    /// 配置缺少必填字段
    MissingField(String),
    /// 其他配置问题（未找到配置、八进制权限/正则无效等）
    Configuration(String),
    /// 请求初始化后仍未注册会话
    InitializationFailed(String),
    /// 认证失败（密码/密钥/主机密钥校验）
    Authentication(String, String),
    /// 连接失败（超时/不可达/握手）
    Connect(String, String),
    /// 本地文件读取失败
    LocalRead(String, String),
    /// put/mkdir 在一次目录补建重试后仍失败
    RemoteFilesystem(String, String),
    /// 内容上传成功，但 chmod 失败
    PermissionApplication(String, String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use SyncError::*;
        match self {
            MissingField(key) => write!(f, "配置缺少必填字段 '{}'", key),
            Configuration(msg) => write!(f, "配置错误: {}", msg),
            InitializationFailed(name) => write!(f, "初始化失败: 目标 '{}' 未注册会话", name),
            Authentication(addr, msg) => write!(f, "认证失败: {} — {}", addr, msg),
            Connect(addr, msg) => write!(f, "连接失败: {} — {}", addr, msg),
            LocalRead(path, msg) => write!(f, "本地文件读取失败: {} — {}", path, msg),
            RemoteFilesystem(path, msg) => write!(f, "远端文件系统操作失败: {} — {}", path, msg),
            PermissionApplication(path, msg) => {
                write!(f, "文件已上传，但权限设置失败: {} — {}", path, msg)
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl SyncError {
    /// Whether the remote file content was fully delivered despite the error.
    /// Only the post-upload chmod failure qualifies; callers use this to
    /// report a partial success instead of a content-delivery failure.
    pub fn content_was_delivered(&self) -> bool {
        matches!(self, SyncError::PermissionApplication(_, _))
    }

    /// Whether the error was raised before any session existed for the
    /// target (configuration and initialization problems).
    pub fn is_pre_session(&self) -> bool {
        use SyncError::*;
        matches!(self, MissingField(_) | Configuration(_) | InitializationFailed(_))
    }

    /// Stable variant name for the structured failure log.
    pub fn variant_name(&self) -> &'static str {
        use SyncError::*;
        match self {
            MissingField(_) => "MissingField",
            Configuration(_) => "Configuration",
            InitializationFailed(_) => "InitializationFailed",
            Authentication(_, _) => "Authentication",
            Connect(_, _) => "Connect",
            LocalRead(_, _) => "LocalRead",
            RemoteFilesystem(_, _) => "RemoteFilesystem",
            PermissionApplication(_, _) => "PermissionApplication",
        }
    }
}
