//! Directory access grants.
//!
//! A build may need the user (or some other external party) to grant access
//! to the project directory before it can be imported. The orchestrator
//! asks an [`AccessRequester`] to start that flow, then blocks on
//! [`DirectoryAccess`] until [`DirectoryAccess::grant`] is called from
//! another thread or the timeout passes. Grants are remembered per project
//! path in a [`GrantStore`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use buildenv_shared::errors::BuildEnvResult;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::util::fs::write_atomic;

const UNKNOWN_PROJECT: &str = "Unknown Project";

/// A granted, readable project root on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessHandle(PathBuf);

impl AccessHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Display name of the granted directory.
    pub fn name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| UNKNOWN_PROJECT.to_string())
    }
}

/// One-slot rendezvous between a waiting build and the grant signal.
#[derive(Debug, Default)]
pub struct DirectoryAccess {
    granted: Mutex<Option<AccessHandle>>,
    cond: Condvar,
}

impl DirectoryAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a grant and wake every waiter.
    pub fn grant(&self, handle: AccessHandle) {
        tracing::info!(path = %handle.path().display(), "Directory access granted");
        *self.granted.lock() = Some(handle);
        self.cond.notify_all();
    }

    /// Clear any stale grant, run `request`, then wait up to `timeout`.
    ///
    /// `request` runs without the slot lock held, so it may grant
    /// synchronously.
    pub fn wait_for_grant(
        &self,
        timeout: Duration,
        request: impl FnOnce(),
    ) -> Option<AccessHandle> {
        *self.granted.lock() = None;
        request();

        let deadline = Instant::now() + timeout;
        let mut granted = self.granted.lock();
        while granted.is_none() {
            if self.cond.wait_until(&mut granted, deadline).timed_out() {
                break;
            }
        }
        granted.take()
    }
}

/// Starts the external flow that ends in [`DirectoryAccess::grant`].
///
/// Must not block waiting for the grant itself.
pub trait AccessRequester: Send + Sync {
    fn request_access(&self, project_path: &str, access: &DirectoryAccess);
}

/// Grants any project path that exists as a directory on this host.
#[derive(Debug, Default)]
pub struct HostDirectoryAccess;

impl AccessRequester for HostDirectoryAccess {
    fn request_access(&self, project_path: &str, access: &DirectoryAccess) {
        let path = Path::new(project_path);
        if path.is_dir() {
            access.grant(AccessHandle::new(path));
        } else {
            tracing::warn!(project_path, "Project path is not a directory, not granting");
        }
    }
}

/// Persisted project path to [`AccessHandle`] map in `grants.json`.
#[derive(Debug)]
pub struct GrantStore {
    path: PathBuf,
    grants: Mutex<BTreeMap<String, AccessHandle>>,
}

impl GrantStore {
    /// Missing or malformed files start empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let grants = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed grants file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            grants: Mutex::new(grants),
        }
    }

    pub fn get(&self, project_path: &str) -> Option<AccessHandle> {
        self.grants.lock().get(project_path).cloned()
    }

    pub fn len(&self) -> usize {
        self.grants.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remember a grant. Returns the number of persisted grants.
    pub fn persist(&self, project_path: &str, handle: AccessHandle) -> BuildEnvResult<usize> {
        let mut grants = self.grants.lock();
        grants.insert(project_path.to_string(), handle);
        self.save(&grants)?;
        Ok(grants.len())
    }

    /// Forget a grant. Returns whether one existed.
    pub fn release(&self, project_path: &str) -> BuildEnvResult<bool> {
        let mut grants = self.grants.lock();
        if grants.remove(project_path).is_none() {
            return Ok(false);
        }
        self.save(&grants)?;
        Ok(true)
    }

    fn save(&self, grants: &BTreeMap<String, AccessHandle>) -> BuildEnvResult<()> {
        let json = serde_json::to_vec_pretty(grants)?;
        write_atomic(&self.path, &json)
    }
}
