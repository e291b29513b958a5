//! Platform capabilities for reaching the Docker daemon.
//!
//! Whether the daemon can be launched on demand is a property of the host
//! platform, not a runtime branch inside the retry loop: [`Platform::autostart`]
//! returns `Some` only where a background launch is supported (Docker Desktop
//! on macOS). Everywhere else an unreachable daemon fails immediately with a
//! start hint.

use std::time::Duration;

/// Host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
}

impl Platform {
    /// Detect the current platform.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "windows" => Platform::Windows,
            _ => Platform::Linux,
        }
    }

    /// Instructions to start the Docker daemon on this platform.
    pub fn start_hint(&self) -> &'static str {
        match self {
            Platform::MacOS => "Start Docker Desktop from Applications, or run: open -a Docker",
            Platform::Linux => "Start the Docker daemon: sudo systemctl start docker",
            Platform::Windows => "Start Docker Desktop from the Start menu",
        }
    }

    /// How to launch the daemon in the background, if this platform can.
    pub fn autostart(&self) -> Option<DaemonAutostart> {
        match self {
            Platform::MacOS => Some(DaemonAutostart {
                program: "open".to_string(),
                args: vec!["-a".to_string(), "Docker".to_string()],
                attempts: 12,
                interval: Duration::from_secs(5),
            }),
            Platform::Linux | Platform::Windows => None,
        }
    }
}

/// Launch command plus the bounded re-probe schedule that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonAutostart {
    pub program: String,
    pub args: Vec<String>,
    /// Probes after launching before giving up.
    pub attempts: u32,
    /// Delay before each probe.
    pub interval: Duration,
}

impl DaemonAutostart {
    /// Spawn the launcher and wait for it to exit.
    pub async fn launch(&self) -> std::io::Result<()> {
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!(
                "'{}' exited with {}",
                self.program, status
            )))
        }
    }
}
