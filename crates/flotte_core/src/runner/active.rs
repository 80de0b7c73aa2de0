//! Shared table of running child processes.
//!
//! Workers register their child here for the duration of a run so that a
//! shutdown request can reach every in-flight process.

use std::collections::HashMap;
use std::io;
use std::process::Child;
use std::sync::Arc;

use parking_lot::Mutex;

/// A live child process, shared between its worker and the table.
pub type ChildHandle = Arc<Mutex<Child>>;

/// Job name → live process, safe for concurrent insert/remove.
#[derive(Debug, Clone, Default)]
pub struct ActiveProcesses {
    inner: Arc<Mutex<HashMap<String, ChildHandle>>>,
}

impl ActiveProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a child under `name`.
    ///
    /// The entry is removed when the returned guard is dropped, whether the
    /// run finished normally or bailed out with an error.
    #[must_use = "dropping the guard immediately unregisters the process"]
    pub fn register(&self, name: &str, child: ChildHandle) -> ActiveGuard {
        self.inner
            .lock()
            .insert(name.to_string(), Arc::clone(&child));
        ActiveGuard {
            table: self.clone(),
            name: name.to_string(),
            child,
        }
    }

    /// Whether a process is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().contains_key(name)
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Names of registered jobs, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Kill every registered process. Errors are swallowed.
    ///
    /// Returns the number of processes a kill was sent to.
    pub fn terminate_all(&self) -> usize {
        let snapshot: Vec<(String, ChildHandle)> = self
            .inner
            .lock()
            .iter()
            .map(|(name, child)| (name.clone(), Arc::clone(child)))
            .collect();

        let mut sent = 0;
        for (name, child) in snapshot {
            tracing::info!("Terminating process for job {}", name);
            match kill_process_tree(&mut child.lock()) {
                Ok(()) => sent += 1,
                Err(e) => tracing::debug!("Terminate failed for job {}: {}", name, e),
            }
        }
        sent
    }

    /// Remove `name` only if it still maps to `child`, so a later job that
    /// reused the name keeps its entry.
    fn remove_if_same(&self, name: &str, child: &ChildHandle) {
        let mut table = self.inner.lock();
        if table.get(name).is_some_and(|c| Arc::ptr_eq(c, child)) {
            table.remove(name);
        }
    }
}

/// Kill a child together with everything it started.
///
/// Jobs are spawned as process-group leaders on unix, so the whole group is
/// signalled. Helpers the program launched would otherwise keep its output
/// pipes open after the parent is gone. Falls back to killing the child
/// alone when it does not lead a group.
pub(crate) fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            if killpg(Pid::from_raw(pid), Signal::SIGKILL).is_ok() {
                return Ok(());
            }
        }
    }
    child.kill()
}

/// Removes its job from the active table on drop.
#[derive(Debug)]
pub struct ActiveGuard {
    table: ActiveProcesses,
    name: String,
    child: ChildHandle,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.table.remove_if_same(&self.name, &self.child);
    }
}
