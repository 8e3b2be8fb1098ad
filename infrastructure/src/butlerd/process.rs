//! Daemon process supervision.
//!
//! [`DaemonProcess`] spawns `butler daemon` with a piped standard output and
//! keeps the child alive for as long as the handle lives. [`supervise_stdout`]
//! reads the daemon's standard output, classifies every line and dispatches
//! typed notifications to the daemon registry.

use super::error::{ButlerError, Result};
use super::transport::LineReader;
use crate::config::FileDaemonConfig;
use butlerd_application::{Channel, Direction, Dispatch, NotificationRegistry, TrafficLogger};
use butlerd_domain::{DaemonLine, classify_daemon_line};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info, trace, warn};

/// The resolved command line for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonCommand {
    pub binary: String,
    pub db_path: PathBuf,
    pub extra_args: Vec<String>,
}

impl DaemonCommand {
    pub fn from_config(config: &FileDaemonConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            db_path: config.db_path.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    /// Arguments passed to the binary.
    ///
    /// `destiny_pid` ties the daemon's lifetime to this process.
    pub fn arguments(&self, destiny_pid: u32) -> Vec<String> {
        let mut args = vec![
            "daemon".to_string(),
            "--json".to_string(),
            "--dbpath".to_string(),
            self.db_path.to_string_lossy().into_owned(),
            "--destiny-pid".to_string(),
            destiny_pid.to_string(),
            "--keep-alive".to_string(),
            "--log".to_string(),
            "--verbose".to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Locate the binary on `PATH` (or check an explicit path).
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        which::which(&self.binary).map_err(|source| ButlerError::DaemonNotInstalled {
            binary: self.binary.clone(),
            source,
        })
    }
}

/// A running daemon. Dropping the handle kills the child.
pub struct DaemonProcess {
    child: Child,
}

impl DaemonProcess {
    /// Spawn the daemon and hand back its standard output.
    ///
    /// Standard error is drained in the background and logged at debug level.
    pub fn spawn(command: &DaemonCommand) -> Result<(Self, ChildStdout)> {
        let binary = command.resolve_binary()?;
        let args = command.arguments(std::process::id());
        debug!("Spawning butlerd: {} {}", binary.display(), args.join(" "));

        let mut cmd = Command::new(&binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Linux: request kernel to send SIGTERM to child when parent dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ButlerError::Io(std::io::Error::other("Failed to capture stdout")))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        info!(pid = child.id(), "butlerd started");
        Ok((Self { child }, stdout))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the daemon and wait for it to exit.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Failed to kill butlerd: {}", e);
        }
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        debug!("DaemonProcess dropping, killing butlerd child process");
        let _ = self.child.start_kill();
    }
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = LineReader::new(stderr, usize::MAX);
    while let Some(line) = lines.next_line().await {
        debug!(target: "butlerd::stderr", "{}", line);
    }
}

/// Read daemon output until it closes, dispatching notifications.
///
/// Plain-text lines are logged; malformed JSON objects are logged and
/// dropped. A handler fault never stops the loop.
pub async fn supervise_stdout<R>(
    mut lines: LineReader<R>,
    registry: &NotificationRegistry,
    traffic: &dyn TrafficLogger,
) where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next_line().await {
        traffic.record(Channel::Daemon, Direction::Inbound, &line);
        match classify_daemon_line(&line) {
            DaemonLine::Notification {
                notification_type,
                body,
            } => match registry.dispatch(&notification_type, &body) {
                Dispatch::Handled(()) => trace!(%notification_type, "Daemon notification handled"),
                Dispatch::UnknownName => {
                    debug!(%notification_type, "No handler for daemon notification")
                }
                Dispatch::Fault(fault) => {
                    warn!(%notification_type, "Daemon notification handler failed: {}", fault)
                }
            },
            DaemonLine::Text(text) => debug!(target: "butlerd::stdout", "{}", text),
            DaemonLine::Malformed(reason) => {
                warn!(%reason, "Discarding malformed daemon line: {}", line)
            }
        }
    }
    debug!("butlerd standard output closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use butlerd_application::NoTrafficLogger;
    use butlerd_domain::{ListenNotification, LogNotification};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncWriteExt, duplex};

    fn command() -> DaemonCommand {
        DaemonCommand {
            binary: "butler".into(),
            db_path: PathBuf::from("/var/lib/app/butler.db"),
            extra_args: vec!["--address".into(), "https://itch.io".into()],
        }
    }

    #[test]
    fn arguments_follow_daemon_conventions() {
        assert_eq!(
            command().arguments(4242),
            vec![
                "daemon",
                "--json",
                "--dbpath",
                "/var/lib/app/butler.db",
                "--destiny-pid",
                "4242",
                "--keep-alive",
                "--log",
                "--verbose",
                "--address",
                "https://itch.io",
            ]
        );
    }

    #[test]
    fn missing_binary_is_reported_as_not_installed() {
        let command = DaemonCommand {
            binary: "definitely-not-a-real-butler-binary-7f3a".into(),
            ..command()
        };
        match command.resolve_binary() {
            Err(ButlerError::DaemonNotInstalled { binary, .. }) => {
                assert_eq!(binary, "definitely-not-a-real-butler-binary-7f3a")
            }
            other => panic!("unexpected: {:?}", other.map(|p| p.display().to_string())),
        }
    }

    #[test]
    fn spawn_fails_fast_without_binary() {
        let command = DaemonCommand {
            binary: "definitely-not-a-real-butler-binary-7f3a".into(),
            ..command()
        };
        assert!(matches!(
            DaemonProcess::spawn(&command),
            Err(ButlerError::DaemonNotInstalled { .. })
        ));
    }

    #[tokio::test]
    async fn stdout_lines_are_dispatched_by_type() {
        let registry = NotificationRegistry::new("daemon notification");
        let secrets = Arc::new(Mutex::new(Vec::new()));
        let logs = Arc::new(Mutex::new(Vec::new()));
        {
            let secrets = Arc::clone(&secrets);
            registry
                .register("butlerd/listen-notification", move |n: ListenNotification| {
                    secrets.lock().unwrap().push(n.secret)
                })
                .unwrap();
            let logs = Arc::clone(&logs);
            registry
                .register("log", move |n: LogNotification| logs.lock().unwrap().push(n.message))
                .unwrap();
        }

        let (mut tx, rx) = duplex(4096);
        tx.write_all(
            concat!(
                "plain text banner\n",
                "{\"no_type\": true}\n",
                "{\"type\":\"log\",\"level\":\"info\",\"message\":\"booting\",\"time\":1}\n",
                "{\"type\":\"log\",\"level\":\"info\"}\n",
                "{\"type\":\"mystery\"}\n",
                "{\"type\":\"butlerd/listen-notification\",\"secret\":\"abc\",\"tcp\":{\"address\":\"127.0.0.1:1234\"},\"time\":2}\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();
        drop(tx);

        supervise_stdout(LineReader::new(rx, 1 << 20), &registry, &NoTrafficLogger).await;

        assert_eq!(*logs.lock().unwrap(), vec!["booting".to_string()]);
        assert_eq!(*secrets.lock().unwrap(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn invalid_utf8_output_does_not_stop_supervision() {
        let registry = NotificationRegistry::new("daemon notification");
        let secrets = Arc::new(Mutex::new(Vec::new()));
        {
            let secrets = Arc::clone(&secrets);
            registry
                .register("butlerd/listen-notification", move |n: ListenNotification| {
                    secrets.lock().unwrap().push(n.secret)
                })
                .unwrap();
        }

        let (mut tx, rx) = duplex(4096);
        tx.write_all(b"garbled \xff\xfe output\n").await.unwrap();
        tx.write_all(
            b"{\"type\":\"butlerd/listen-notification\",\"secret\":\"later\",\"tcp\":{\"address\":\"127.0.0.1:1\"},\"time\":2}\n",
        )
        .await
        .unwrap();
        drop(tx);

        supervise_stdout(LineReader::new(rx, 1 << 20), &registry, &NoTrafficLogger).await;

        assert_eq!(*secrets.lock().unwrap(), vec!["later".to_string()]);
    }
}
