//! Starting `mongod` and waiting for readiness

use crate::instance::{ServerInstance, ServerState};
use crate::output::{self, OutputTail};
use rbacprobe_core::{ServerAddress, ServerSection, StartupError};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Starts server instances from one [`ServerSection`]
#[derive(Debug, Clone)]
pub struct ServerLauncher {
    config: ServerSection,
}

impl ServerLauncher {
    pub fn new(config: ServerSection) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerSection {
        &self.config
    }

    /// Command-line arguments for a server using `data_dir`
    pub fn args(&self, data_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--bind_ip".into(),
            self.config.host.clone().into(),
            "--port".into(),
            self.config.port.to_string().into(),
            "--dbpath".into(),
            data_dir.as_os_str().to_owned(),
        ];
        if self.config.auth {
            args.push("--auth".into());
        }
        args.extend(self.config.extra_args.iter().map(OsString::from));
        args
    }

    /// Run `<binary> --version` and compare against `expected`.
    ///
    /// Bounded by the startup timeout; a binary still running after it is
    /// killed.
    pub async fn check_version(&self, expected: &str) -> Result<String, StartupError> {
        let timeout = self.config.startup_timeout();
        let mut command = Command::new(&self.config.binary);
        command
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| {
                StartupError::VersionCheck(format!(
                    "`{} --version` did not finish within {:?}",
                    self.binary_name(),
                    timeout
                ))
            })?
            .map_err(|source| StartupError::Spawn {
                binary: self.binary_name(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let found = parse_version(&stdout).ok_or_else(|| {
            StartupError::VersionCheck(format!(
                "no 'db version' line in `{} --version` output",
                self.binary_name()
            ))
        })?;

        if !version_matches(expected, &found) {
            return Err(StartupError::VersionMismatch {
                expected: expected.to_string(),
                found,
            });
        }

        debug!("Server binary reports version {}", found);
        Ok(found)
    }

    /// Spawn the server and block until it accepts TCP connections.
    ///
    /// On failure the process is killed and its data directory removed
    /// before the error is returned.
    pub async fn start(&self) -> Result<ServerInstance, StartupError> {
        if let Some(expected) = self.config.version_requirement() {
            self.check_version(expected).await?;
        }

        let address = self.config.address();
        if probe(&address, self.config.probe_interval()).await {
            return Err(StartupError::PortInUse {
                host: address.host,
                port: address.port,
            });
        }

        let data_dir = tempfile::Builder::new()
            .prefix("rbacprobe-mongod-")
            .tempdir()
            .map_err(StartupError::DataDir)?;

        let mut child = Command::new(&self.config.binary)
            .args(self.args(data_dir.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StartupError::Spawn {
                binary: self.binary_name(),
                source,
            })?;

        info!(
            pid = child.id(),
            auth = self.config.auth,
            "Spawned {} on {} (data dir {:?})",
            self.binary_name(),
            address,
            data_dir.path()
        );

        let tail = OutputTail::new(self.config.output_lines);
        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(output::forward(stdout, "stdout", tail.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(output::forward(stderr, "stderr", tail.clone()));
        }

        let mut instance = ServerInstance::new(
            address,
            child,
            data_dir,
            forwarders,
            self.config.shutdown_grace(),
        );

        match self.await_ready(&mut instance, &tail).await {
            Ok(()) => {
                instance.set_state(ServerState::Ready);
                info!("Server ready on {}", instance.address());
                Ok(instance)
            }
            Err(e) => {
                instance.set_state(ServerState::Failed);
                if let Err(cleanup) = instance.release().await {
                    warn!("Cleanup after failed start also failed: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn await_ready(
        &self,
        instance: &mut ServerInstance,
        tail: &OutputTail,
    ) -> Result<(), StartupError> {
        let address = instance.address();
        let timeout = self.config.startup_timeout();
        let interval = self.config.probe_interval();
        let deadline = Instant::now() + timeout;

        loop {
            let exited = match instance.child_mut() {
                Some(child) => child.try_wait().map_err(|e| StartupError::ExitedEarly {
                    status: format!("unknown ({})", e),
                    output: tail.snapshot(),
                })?,
                None => None,
            };

            if let Some(status) = exited {
                output::drain(instance.forwarders_mut(), Duration::from_secs(1)).await;
                return Err(StartupError::ExitedEarly {
                    status: status.to_string(),
                    output: tail.snapshot(),
                });
            }

            if probe(&address, interval).await {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(StartupError::ReadinessTimeout {
                    address: address.to_string(),
                    timeout,
                });
            }

            sleep(interval).await;
        }
    }

    fn binary_name(&self) -> String {
        self.config.binary.display().to_string()
    }
}

/// Whether something accepts TCP connections on `address`
async fn probe(address: &ServerAddress, limit: Duration) -> bool {
    let connect = TcpStream::connect((address.host.as_str(), address.port));
    matches!(tokio::time::timeout(limit, connect).await, Ok(Ok(_)))
}

/// Extract `X.Y.Z` from `mongod --version` output (`db version vX.Y.Z`)
pub fn parse_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("db version")?.trim_start();
        let version = rest.strip_prefix('v').unwrap_or(rest);
        let version = version.split_whitespace().next()?;
        (!version.is_empty()).then(|| version.to_string())
    })
}

/// `expected` is either the full version or a dotted prefix of it
fn version_matches(expected: &str, found: &str) -> bool {
    let expected = expected.trim_start_matches('v');
    found == expected
        || found
            .strip_prefix(expected)
            .map_or(false, |rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_enable_auth() {
        let launcher = ServerLauncher::new(ServerSection::default());
        let args = launcher.args(Path::new("/tmp/db"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["--bind_ip", "localhost", "--port", "27018", "--dbpath", "/tmp/db", "--auth"]
        );
    }

    #[test]
    fn test_args_without_auth_and_extras() {
        let config = ServerSection {
            auth: false,
            extra_args: vec!["--nounixsocket".to_string()],
            ..ServerSection::default()
        };
        let args = ServerLauncher::new(config).args(Path::new("/tmp/db"));
        assert!(!args.iter().any(|a| a == "--auth"));
        let last = args.last().map(|a| a.to_string_lossy().into_owned());
        assert_eq!(last.as_deref(), Some("--nounixsocket"));
    }

    #[test]
    fn test_parse_version() {
        let output = "db version v4.4.29\nBuild Info: {\n    \"version\": \"4.4.29\"\n}\n";
        assert_eq!(parse_version(output), Some("4.4.29".to_string()));
        assert_eq!(parse_version("mongod: command not found"), None);
    }

    #[test]
    fn test_version_prefix_matching() {
        assert!(version_matches("4.4", "4.4.29"));
        assert!(version_matches("v4.4.29", "4.4.29"));
        assert!(!version_matches("4.4", "4.40.1"));
        assert!(!version_matches("6.0", "4.4.29"));
    }
}
