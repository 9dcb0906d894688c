use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Registry of every transient file written during a run
///
/// Files live directly in `root` and carry `prefix` in their name. Stages call
/// [`Workspace::track`] for each file they create; [`Workspace::sweep`] removes
/// every tracked path plus any stray entry in `root` that carries the prefix.
/// Clones share the same registry.
#[derive(Debug, Clone)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

#[derive(Debug)]
struct WorkspaceInner {
    root: PathBuf,
    prefix: String,
    state: Mutex<WorkspaceState>,
}

#[derive(Debug, Default)]
struct WorkspaceState {
    tracked: Vec<PathBuf>,
    kept: HashSet<PathBuf>,
}

/// What a sweep removed and what it could not
#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(WorkspaceInner {
                root: root.into(),
                prefix: prefix.into(),
                state: Mutex::new(WorkspaceState::default()),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Path of a transient file called `name` (the prefix is prepended)
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.inner.root.join(format!("{}{}", self.inner.prefix, name))
    }

    /// Register a path for removal at sweep time
    pub fn track(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut state = self.state();
        if !state.tracked.contains(&path) {
            tracing::trace!("Tracking transient file: {}", path.display());
            state.tracked.push(path);
        }
    }

    /// Exempt a path from the sweep, even if it carries the prefix
    pub fn keep(&self, path: impl Into<PathBuf>) {
        self.state().kept.insert(path.into());
    }

    pub fn tracked(&self) -> Vec<PathBuf> {
        self.state().tracked.clone()
    }

    /// Acquire a guard that sweeps when dropped
    pub fn guard(&self) -> WorkspaceGuard {
        WorkspaceGuard {
            workspace: self.clone(),
        }
    }

    /// Best-effort removal of every transient file
    pub fn sweep(&self) -> SweepReport {
        let mut state = self.state();
        let mut report = SweepReport::default();

        let tracked = std::mem::take(&mut state.tracked);
        for path in tracked {
            if state.kept.contains(&path) {
                continue;
            }
            remove_entry(&path, &mut report);
        }

        // Tools may leave siblings we never saw (partial downloads, renamed outputs)
        if !self.inner.prefix.is_empty() {
            match fs_err::read_dir(&self.inner.root) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let name = entry.file_name();
                        let path = entry.path();
                        if !name.to_string_lossy().starts_with(&self.inner.prefix)
                            || state.kept.contains(&path)
                        {
                            continue;
                        }
                        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                            remove_entry(&path, &mut report);
                        }
                    }
                }
                Err(e) => tracing::warn!("Could not scan workspace: {}", e),
            }
        }

        if report.failed.is_empty() {
            tracing::debug!("Workspace sweep removed {} file(s)", report.removed);
        } else {
            tracing::warn!(
                "Workspace sweep removed {} file(s), {} could not be removed",
                report.removed,
                report.failed.len()
            );
        }

        report
    }

    fn state(&self) -> MutexGuard<'_, WorkspaceState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn remove_entry(path: &Path, report: &mut SweepReport) {
    match fs_err::remove_file(path) {
        Ok(()) => report.removed += 1,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::debug!("{}", e);
            report.failed.push((path.to_path_buf(), e.to_string()));
        }
    }
}

/// Sweeps its workspace when it goes out of scope
///
/// Held for the whole of a pipeline run so that normal return, early `?`
/// return, panic unwinding and future cancellation all end in a sweep.
#[must_use = "the workspace is swept as soon as the guard is dropped"]
pub struct WorkspaceGuard {
    workspace: Workspace,
}

impl WorkspaceGuard {
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        self.workspace.sweep();
    }
}
