//! File-backed persistence for a single [`Credential`].

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::Credential;

/// Reads and writes the credential file.
///
/// A missing or unreadable file is "no credential"; it never fails the caller.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted credential, if a well-formed one exists.
    pub fn load(&self) -> Option<Credential> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored credential");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read stored credential");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Stored credential is malformed, ignoring it"
                );
                None
            }
        }
    }

    /// Persist `credential`, logging on failure. Returns whether it was written.
    ///
    /// The in-memory credential stays usable either way.
    pub fn save(&self, credential: &Credential) -> bool {
        match self.try_save(credential) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Stored credential");
                true
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to persist credential; it will be re-acquired next start"
                );
                false
            }
        }
    }

    /// Atomically replace the credential file, readable by the owner only.
    pub fn try_save(&self, credential: &Credential) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_vec_pretty(credential).map_err(io::Error::other)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
