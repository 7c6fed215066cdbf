//! Running server handle

use crate::output;
use rbacprobe_core::{ServerAddress, TeardownError};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`ServerInstance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Ready,
    Failed,
    Stopped,
}

/// A `mongod` process owned by the caller that started it
pub struct ServerInstance {
    address: ServerAddress,
    state: ServerState,
    child: Option<Child>,
    data_dir: Option<TempDir>,
    forwarders: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl ServerInstance {
    pub(crate) fn new(
        address: ServerAddress,
        child: Child,
        data_dir: TempDir,
        forwarders: Vec<JoinHandle<()>>,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            address,
            state: ServerState::Starting,
            child: Some(child),
            data_dir: Some(data_dir),
            forwarders,
            shutdown_grace,
        }
    }

    pub fn address(&self) -> ServerAddress {
        self.address.clone()
    }

    pub fn host(&self) -> &str {
        &self.address.host
    }

    pub fn port(&self) -> u16 {
        self.address.port
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// `None` once released
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_ref().map(TempDir::path)
    }

    /// OS process id, while the process is owned
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    pub(crate) fn set_state(&mut self, state: ServerState) {
        debug!("Server {} state {:?} -> {:?}", self.address, self.state, state);
        self.state = state;
    }

    pub(crate) fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    pub(crate) fn forwarders_mut(&mut self) -> &mut Vec<JoinHandle<()>> {
        &mut self.forwarders
    }

    /// Terminate the process and remove its data directory.
    ///
    /// SIGTERM first, SIGKILL after the shutdown grace period. Calling this
    /// again after it has run is a no-op returning `Ok(())`. When several
    /// steps fail, the first failure is returned and the rest are logged.
    pub async fn release(&mut self) -> Result<(), TeardownError> {
        if self.state == ServerState::Stopped {
            debug!("Server {} already released", self.address);
            return Ok(());
        }

        info!("Stopping server on {}", self.address);
        let mut first_error = None;

        if let Some(mut child) = self.child.take() {
            if let Err(e) = terminate(&mut child, self.shutdown_grace).await {
                first_error.get_or_insert(e);
            }
        }

        output::drain(&mut self.forwarders, Duration::from_secs(1)).await;

        if let Some(data_dir) = self.data_dir.take() {
            let path = data_dir.path().to_path_buf();
            match data_dir.close() {
                Ok(()) => debug!("Removed data directory {:?}", path),
                Err(e) => {
                    let e = TeardownError::DataDir(e);
                    if first_error.is_some() {
                        warn!("Additional teardown failure: {}", e);
                    } else {
                        first_error = Some(e);
                    }
                }
            }
        }

        self.state = ServerState::Stopped;

        match first_error {
            None => {
                info!("Server on {} stopped", self.address);
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for ServerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerInstance")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("pid", &self.pid())
            .field("data_dir", &self.data_dir())
            .finish()
    }
}

impl Drop for ServerInstance {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            warn!("Server on {} dropped without release; killing it", self.address);
            let _ = child.start_kill();
        }
        for handle in &self.forwarders {
            handle.abort();
        }
    }
}

/// Stop `child` and reap it
pub(crate) async fn terminate(child: &mut Child, grace: Duration) -> Result<(), TeardownError> {
    if child.try_wait().map_err(TeardownError::Wait)?.is_some() {
        // Exited on its own; nothing to signal
        return Ok(());
    }

    match send_terminate(child) {
        Ok(()) => match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Server exited with {}", status);
                return Ok(());
            }
            Ok(Err(e)) => return Err(TeardownError::Wait(e)),
            Err(_) => warn!("Server ignored SIGTERM for {:?}; killing", grace),
        },
        Err(e) => warn!("{}; killing", e),
    }

    child.kill().await.map_err(TeardownError::Wait)
}

#[cfg(unix)]
fn send_terminate(child: &Child) -> Result<(), TeardownError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .map_err(|e| TeardownError::Signal(e.to_string()))
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) -> Result<(), TeardownError> {
    Err(TeardownError::Signal("SIGTERM unsupported on this platform".to_string()))
}
