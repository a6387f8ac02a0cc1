//! Namespace resolution: create fresh namespaces or join a running process's

use nix::sched::{setns, unshare};
use nix::unistd::{chdir, chroot};
use nsexec_core::{Error, ProcessId, Result};
use std::fs::File;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::config::{NamespaceConfig, NamespaceFlags, NamespaceKind, NamespaceRequest};

const PROC_ROOT: &str = "/proc";

/// Kernel identity of a namespace (the nsfs device and inode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId {
    /// Device of the nsfs mount
    pub dev: u64,
    /// Inode identifying the namespace
    pub ino: u64,
}

/// Result of trying to join one namespace of the target process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// `setns(2)` switched us into the target's namespace
    Joined,
    /// We already share this namespace with the target
    AlreadyShared,
    /// Joining failed; the target's root was entered with chroot instead
    FailedWithFallbackApplied,
    /// Joining failed and nothing could stand in for it
    FailedFatal(String),
}

/// One namespace as resolved at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDescriptor {
    /// Namespace kind
    pub kind: NamespaceKind,
    /// Handle path under `/proc`
    pub path: PathBuf,
    /// Identity behind the handle, when it could be read
    pub identity: Option<NamespaceId>,
    /// Attach outcome; `None` for freshly created namespaces
    pub outcome: Option<JoinOutcome>,
}

/// Outcome of namespace resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Namespaces actually created or joined
    pub flags: NamespaceFlags,
    /// Per-kind detail
    pub descriptors: Vec<NamespaceDescriptor>,
}

/// OS operations the resolver depends on
pub trait NamespaceBackend {
    /// Identity of the namespace behind a `/proc/<pid>/ns/<kind>` handle
    fn identity(&self, path: &Path) -> io::Result<NamespaceId>;

    /// Open the handle and join the namespace
    fn join(&self, path: &Path, kind: NamespaceKind) -> Result<()>;

    /// Unshare fresh namespaces
    fn unshare(&self, flags: NamespaceFlags) -> Result<()>;

    /// Change the root directory
    fn change_root(&self, path: &Path) -> Result<()>;

    /// Current working directory
    fn current_dir(&self) -> Result<PathBuf>;

    /// Change the working directory
    fn change_dir(&self, path: &Path) -> Result<()>;
}

/// Backend operating on the real process
#[derive(Debug, Clone, Copy, Default)]
pub struct HostBackend;

impl NamespaceBackend for HostBackend {
    fn identity(&self, path: &Path) -> io::Result<NamespaceId> {
        let meta = std::fs::metadata(path)?;
        Ok(NamespaceId {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    fn join(&self, path: &Path, kind: NamespaceKind) -> Result<()> {
        // std opens with O_CLOEXEC and the handle is closed on return
        let handle = File::open(path).map_err(|e| Error::Namespace {
            message: format!("Could not open {}: {e}", path.display()),
        })?;
        setns(&handle, kind.clone_flag()).map_err(|e| Error::Namespace {
            message: format!("Could not attach to {kind} namespace: {e}"),
        })
    }

    fn unshare(&self, flags: NamespaceFlags) -> Result<()> {
        unshare(flags.to_clone_flags()).map_err(|e| Error::Namespace {
            message: format!("unshare({flags}): {e}"),
        })
    }

    fn change_root(&self, path: &Path) -> Result<()> {
        chroot(path).map_err(|e| Error::Namespace {
            message: format!("chroot {}: {e}", path.display()),
        })
    }

    fn current_dir(&self) -> Result<PathBuf> {
        std::env::current_dir().map_err(|e| Error::Namespace {
            message: format!("Could not read working directory: {e}"),
        })
    }

    fn change_dir(&self, path: &Path) -> Result<()> {
        chdir(path).map_err(|e| Error::Namespace {
            message: format!("chdir {}: {e}", path.display()),
        })
    }
}

/// Resolves a [`NamespaceRequest`] into the namespaces the process ends up in
#[derive(Debug, Default)]
pub struct NamespaceResolver<B = HostBackend> {
    backend: B,
}

impl NamespaceResolver<HostBackend> {
    /// Create a resolver acting on the current process
    #[must_use]
    pub const fn new() -> Self {
        Self {
            backend: HostBackend,
        }
    }
}

impl<B: NamespaceBackend> NamespaceResolver<B> {
    /// Create a resolver with a custom backend
    pub const fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Get the backend
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Create or attach, depending on the request
    ///
    /// # Errors
    /// Returns error if a namespace cannot be created or joined
    pub fn resolve(&self, request: &NamespaceRequest) -> Result<Resolution> {
        match request {
            NamespaceRequest::Create(config) => self.create(config),
            NamespaceRequest::Attach(pid) => self.attach(*pid),
        }
    }

    /// Unshare the namespaces enabled in `config`
    ///
    /// # Errors
    /// Returns error if the kernel rejects the flag combination
    pub fn create(&self, config: &NamespaceConfig) -> Result<Resolution> {
        let flags = config.effective_flags();

        if flags.is_empty() {
            tracing::debug!("No namespaces requested");
            return Ok(Resolution {
                flags,
                descriptors: Vec::new(),
            });
        }

        tracing::debug!(namespaces = %flags, "Creating namespaces");

        self.backend.unshare(flags).inspect_err(|e| {
            tracing::error!(namespaces = %flags, error = %e, "Failed to create namespaces");
        })?;

        let descriptors = flags
            .kinds()
            .map(|kind| {
                let path = self_handle(kind, true);
                NamespaceDescriptor {
                    kind,
                    identity: self.backend.identity(&path).ok(),
                    path,
                    outcome: None,
                }
            })
            .collect();

        tracing::info!(namespaces = %flags, "Namespaces created");

        Ok(Resolution { flags, descriptors })
    }

    /// Join every namespace of `pid` that differs from ours
    ///
    /// A failed mount-namespace join falls back to chroot into the target's
    /// root. The working directory is restored by path afterwards.
    ///
    /// # Errors
    /// Returns error if a non-mount namespace cannot be joined, if the chroot
    /// fallback fails, or if the working directory cannot be restored
    pub fn attach(&self, pid: ProcessId) -> Result<Resolution> {
        let cwd = self.backend.current_dir()?;

        tracing::debug!(pid = %pid, cwd = %cwd.display(), "Attaching to namespaces");

        let mut flags = NamespaceFlags::NONE;
        let mut descriptors = Vec::with_capacity(NamespaceKind::ALL.len());

        for kind in NamespaceKind::ALL {
            let descriptor = self.attach_one(pid, kind);

            match &descriptor.outcome {
                Some(JoinOutcome::Joined) => flags.insert(kind.flag()),
                Some(JoinOutcome::FailedFatal(message)) => {
                    tracing::error!(pid = %pid, namespace = %kind, "Attach failed");
                    return Err(Error::Namespace {
                        message: message.clone(),
                    });
                }
                _ => {}
            }

            descriptors.push(descriptor);
        }

        self.backend.change_dir(&cwd)?;

        tracing::info!(pid = %pid, namespaces = %flags, "Attached to namespaces");

        Ok(Resolution { flags, descriptors })
    }

    fn attach_one(&self, pid: ProcessId, kind: NamespaceKind) -> NamespaceDescriptor {
        let path = pid_handle(pid, kind);
        let target = self.backend.identity(&path).ok();
        let own = self.backend.identity(&self_handle(kind, false)).ok();

        let outcome = if target.is_some() && target == own {
            tracing::debug!(namespace = %kind, "Namespace already shared");
            JoinOutcome::AlreadyShared
        } else {
            match self.backend.join(&path, kind) {
                Ok(()) => {
                    tracing::debug!(namespace = %kind, "Joined namespace");
                    JoinOutcome::Joined
                }
                Err(e) if kind == NamespaceKind::Mnt => self.chroot_fallback(pid, &e),
                Err(e) => JoinOutcome::FailedFatal(describe(&e)),
            }
        };

        NamespaceDescriptor {
            kind,
            path,
            identity: target,
            outcome: Some(outcome),
        }
    }

    fn chroot_fallback(&self, pid: ProcessId, cause: &Error) -> JoinOutcome {
        let root = Path::new(PROC_ROOT).join(pid.to_string()).join("root");

        match self.backend.change_root(&root) {
            Ok(()) => {
                tracing::warn!(
                    pid = %pid,
                    error = %cause,
                    "Mount namespace unavailable, entered target root with chroot"
                );
                JoinOutcome::FailedWithFallbackApplied
            }
            Err(e) => JoinOutcome::FailedFatal(format!(
                "{}; fallback failed: {}",
                describe(cause),
                describe(&e)
            )),
        }
    }
}

/// Error text without the variant prefix, for nesting into another message
fn describe(err: &Error) -> String {
    match err {
        Error::Namespace { message } => message.clone(),
        other => other.to_string(),
    }
}

fn pid_handle(pid: ProcessId, kind: NamespaceKind) -> PathBuf {
    Path::new(PROC_ROOT)
        .join(pid.to_string())
        .join("ns")
        .join(kind.proc_name())
}

/// Our own handle; a freshly unshared PID namespace only applies to children
fn self_handle(kind: NamespaceKind, for_children: bool) -> PathBuf {
    let name = match kind {
        NamespaceKind::Pid if for_children => "pid_for_children",
        _ => kind.proc_name(),
    };
    Path::new(PROC_ROOT).join("self").join("ns").join(name)
}
