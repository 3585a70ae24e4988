use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::PutError;

// SFTP 状态码：父目录缺失时 create 返回这两种之一
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
const LIBSSH2_FX_NO_SUCH_PATH: i32 = 10;

/// Trait abstracting the remote operations one session needs. Implementors
/// must be Send so links can be stored inside registry-owned sessions as
/// trait objects; tests inject scripted mock links.
pub trait RemoteLink: Send {
    /// Zero-effect keepalive on the existing transport. An error means the
    /// peer is gone (half-open socket, broken pipe) and the link must be
    /// discarded.
    fn probe(&self) -> Result<(), String>;
    /// Existence check by directory listing.
    fn listdir(&self, path: &str) -> Result<(), String>;
    fn mkdir(&self, path: &str, mode: i32) -> Result<(), String>;
    fn chmod(&self, path: &str, mode: u32) -> Result<(), String>;
    /// Upload `local` to `remote`, returning the byte count written.
    fn put(&self, local: &Path, remote: &str) -> Result<u64, PutError>;
}

/// Adapter that owns an authenticated `ssh2::Session` together with its SFTP
/// channel and implements [`RemoteLink`] over them.
pub struct Ssh2Link {
    pub(crate) sess: ssh2::Session,
    pub(crate) sftp: ssh2::Sftp,
}

impl RemoteLink for Ssh2Link {
    fn probe(&self) -> Result<(), String> {
        self.sess.keepalive_send().map(|_| ()).map_err(|e| e.to_string())
    }

    fn listdir(&self, path: &str) -> Result<(), String> {
        self.sftp.readdir(Path::new(path)).map(|_| ()).map_err(|e| e.to_string())
    }

    fn mkdir(&self, path: &str, mode: i32) -> Result<(), String> {
        self.sftp.mkdir(Path::new(path), mode).map_err(|e| e.to_string())
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), String> {
        let stat = ssh2::FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: Some(mode),
            atime: None,
            mtime: None,
        };
        self.sftp.setstat(Path::new(path), stat).map_err(|e| e.to_string())
    }

    fn put(&self, local: &Path, remote: &str) -> Result<u64, PutError> {
        let mut src = File::open(local)
            .map_err(|e| PutError::LocalRead(local.display().to_string(), e.to_string()))?;
        let mut dst = self.sftp.create(Path::new(remote)).map_err(|e| {
            if matches!(e.code(), ssh2::ErrorCode::SFTP(c)
                if c == LIBSSH2_FX_NO_SUCH_FILE || c == LIBSSH2_FX_NO_SUCH_PATH)
            {
                PutError::MissingParent(remote.to_string())
            } else {
                PutError::Remote(remote.to_string(), e.to_string())
            }
        })?;

        let mut buf = vec![0u8; 128 * 1024];
        let mut total: u64 = 0;
        loop {
            match src.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    dst.write_all(&buf[..n]).map_err(|e| {
                        PutError::Remote(remote.to_string(), e.to_string())
                    })?;
                    total += n as u64;
                }
                Err(e) => {
                    return Err(PutError::LocalRead(
                        local.display().to_string(),
                        e.to_string(),
                    ));
                }
            }
        }
        Ok(total)
    }
}
