//! Platform capability probe.
//!
//! The probe runs once per command.  Every metadata decision in the
//! filesystem layer consults the resulting [`Platform`] instead of branching
//! on the operating system at each call site.
use std::fmt;

/// Detected operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux, macOS, and the BSDs.
    Unix,
    /// Windows.
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix => write!(f, "unix"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Effective user and group of the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessIdentity {
    /// Effective user id.
    pub uid: u32,
    /// Effective group id.
    pub gid: u32,
}

/// Metadata fields that can be captured and re-applied on this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct MetadataSupport {
    /// POSIX permission bits.
    pub permissions: bool,
    /// Owner and group identifiers.
    pub ownership: bool,
    /// Modification times, including on symlinks themselves.
    pub timestamps: bool,
}

/// Platform information for the current process.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// Process identity, when the platform exposes one.
    pub identity: Option<ProcessIdentity>,
    /// Supported metadata fields.
    pub metadata: MetadataSupport,
}

impl Platform {
    /// Probe the current platform.
    #[must_use]
    pub fn detect() -> Self {
        let os = if cfg!(windows) { Os::Windows } else { Os::Unix };
        let identity = probe_identity();
        let unix = os == Os::Unix;
        Self {
            os,
            identity,
            metadata: MetadataSupport {
                permissions: unix,
                ownership: unix && identity.is_some(),
                timestamps: true,
            },
        }
    }

    /// Create a platform with explicit values (for testing).
    #[cfg(test)]
    #[must_use]
    pub const fn new(os: Os, identity: Option<ProcessIdentity>, metadata: MetadataSupport) -> Self {
        Self {
            os,
            identity,
            metadata,
        }
    }

    /// Whether the process may change ownership of arbitrary files.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.identity.is_some_and(|id| id.uid == 0)
    }

    /// Whether ownership changes to `uid`/`gid` can be expected to succeed.
    ///
    /// An unprivileged process can only keep its own uid; it may still
    /// change the group to one it belongs to, which is left to the kernel.
    #[must_use]
    pub fn can_chown_to(&self, uid: u32) -> bool {
        if !self.metadata.ownership {
            return false;
        }
        self.is_privileged() || self.identity.is_some_and(|id| id.uid == uid)
    }
}

/// Read the effective uid/gid from a freshly created anonymous temp file.
#[cfg(unix)]
fn probe_identity() -> Option<ProcessIdentity> {
    use std::os::unix::fs::MetadataExt;

    let file = tempfile::tempfile().ok()?;
    let meta = file.metadata().ok()?;
    Some(ProcessIdentity {
        uid: meta.uid(),
        gid: meta.gid(),
    })
}

#[cfg(not(unix))]
const fn probe_identity() -> Option<ProcessIdentity> {
    None
}
