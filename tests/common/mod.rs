#![allow(dead_code)]
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use upsync::config::{RawTargetConfig, TargetConfig};
use upsync::error::PutError;
use upsync::transfer::Frontend;
use upsync::transfer::link::RemoteLink;
use upsync::transfer::session::Connector;
use upsync::SyncError;

/// Scripted remote endpoint shared by every link a MockConnector hands out.
/// Records every operation in call order and simulates the directory tree.
#[derive(Default)]
pub struct MockRemote {
    ops: Mutex<Vec<String>>,
    dirs: Mutex<HashSet<String>>,
    pub kill_next_probe: AtomicBool,
    pub fail_chmod: AtomicBool,
    pub connects: AtomicUsize,
}

impl MockRemote {
    /// The remote root is pre-seeded: it always exists and must never be
    /// created by the code under test.
    pub fn new(remote_root: &str) -> Arc<Self> {
        let r = MockRemote::default();
        r.dirs
            .lock()
            .unwrap()
            .insert(remote_root.trim_end_matches('/').to_string());
        Arc::new(r)
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn ops_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.ops().into_iter().filter(|o| o.starts_with(prefix)).collect()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

pub struct MockLink {
    pub remote: Arc<MockRemote>,
}

impl RemoteLink for MockLink {
    fn probe(&self) -> Result<(), String> {
        self.remote.record("probe".to_string());
        if self.remote.kill_next_probe.swap(false, Ordering::SeqCst) {
            Err("simulated broken pipe".to_string())
        } else {
            Ok(())
        }
    }

    fn listdir(&self, path: &str) -> Result<(), String> {
        self.remote.record(format!("listdir {}", path));
        if self.remote.dirs.lock().unwrap().contains(path) {
            Ok(())
        } else {
            Err("no such file".to_string())
        }
    }

    fn mkdir(&self, path: &str, _mode: i32) -> Result<(), String> {
        self.remote.record(format!("mkdir {}", path));
        self.remote.dirs.lock().unwrap().insert(path.to_string());
        Ok(())
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), String> {
        self.remote.record(format!("chmod {} {:o}", path, mode));
        if self.remote.fail_chmod.load(Ordering::SeqCst) {
            Err("simulated permission denied".to_string())
        } else {
            Ok(())
        }
    }

    fn put(&self, _local: &Path, remote_path: &str) -> Result<u64, PutError> {
        self.remote.record(format!("put {}", remote_path));
        let parent = match remote_path.rfind('/') {
            Some(0) => "/".to_string(),
            Some(i) => remote_path[..i].to_string(),
            None => {
                return Err(PutError::Remote(
                    remote_path.to_string(),
                    "relative remote path".to_string(),
                ));
            }
        };
        if self.remote.dirs.lock().unwrap().contains(&parent) {
            Ok(42)
        } else {
            Err(PutError::MissingParent(remote_path.to_string()))
        }
    }
}

/// Connector returning links onto the shared scripted remote; counts every
/// connection attempt and can reject authentication.
pub struct MockConnector {
    pub remote: Arc<MockRemote>,
    pub fail_auth: bool,
}

impl Connector for MockConnector {
    fn connect(&self, target: &TargetConfig) -> Result<Box<dyn RemoteLink>, SyncError> {
        self.remote.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth {
            return Err(SyncError::Authentication(
                target.addr(),
                "simulated auth reject".to_string(),
            ));
        }
        Ok(Box::new(MockLink { remote: self.remote.clone() }))
    }
}

/// Build a validated target the same way the CLI does: through the settings
/// document parser, so serde defaults apply.
pub fn make_target(
    name: &str,
    project_root: &str,
    remote_root: &str,
    ignore: &[&str],
) -> TargetConfig {
    let doc = serde_json::json!({
        "name": name,
        "username": "deploy",
        "host": "mock.invalid",
        "remotePath": remote_root,
        "ignore": ignore,
    });
    let raw: RawTargetConfig = serde_json::from_value(doc).expect("valid doc");
    TargetConfig::from_raw(raw, PathBuf::from(project_root)).expect("valid target")
}

/// Frontend double: counts initialization requests, records status lines and
/// delegates initialization to a test-supplied closure.
pub struct TestFrontend<F: Fn(&Path) -> anyhow::Result<()>> {
    pub init: F,
    pub init_calls: AtomicUsize,
    pub statuses: Mutex<Vec<String>>,
}

impl<F: Fn(&Path) -> anyhow::Result<()>> TestFrontend<F> {
    pub fn new(init: F) -> Self {
        TestFrontend { init, init_calls: AtomicUsize::new(0), statuses: Mutex::new(Vec::new()) }
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }
}

impl<F: Fn(&Path) -> anyhow::Result<()>> Frontend for TestFrontend<F> {
    fn initialize_target(&self, file: &Path) -> anyhow::Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        (self.init)(file)
    }

    fn report_status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }
}
