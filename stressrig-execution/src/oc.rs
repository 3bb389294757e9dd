//! Cluster operations backed by the `oc` command line

use async_trait::async_trait;
use std::process::Stdio;
use stressrig_config::ClusterConfig;
use stressrig_core::ResourceId;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::cluster::{ClusterOps, LogStream};
use crate::error::ClusterError;

/// Runs `oc scale`, `oc get` and `oc logs -f` (or a compatible binary)
#[derive(Debug, Clone)]
pub struct OcCli {
    binary: String,
    args: Vec<String>,
    kind: String,
}

impl OcCli {
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            args: config.args.clone(),
            kind: config.kind.clone(),
        }
    }

    fn target(&self, resource: &ResourceId) -> String {
        format!("{}/{}", self.kind, resource)
    }

    fn command<I, S>(&self, args: I) -> (Command, String)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cmd = Command::new(&self.binary);
        let mut line = self.binary.clone();
        let extra = args.into_iter().map(|a| a.as_ref().to_string());
        for arg in self.args.iter().cloned().chain(extra) {
            line.push(' ');
            line.push_str(&arg);
            cmd.arg(arg);
        }
        cmd.stdin(Stdio::null());
        (cmd, line)
    }

    /// Run a command to completion, returning stdout
    async fn run(&self, mut cmd: Command, line: String) -> Result<Vec<u8>, ClusterError> {
        debug!("Running {}", line);
        let output = cmd.output().await.map_err(|source| ClusterError::Spawn {
            command: line.clone(),
            source,
        })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(ClusterError::Exit {
                command: line,
                status: output.status.to_string(),
                output: combined,
            });
        }

        Ok(output.stdout)
    }
}

impl Default for OcCli {
    fn default() -> Self {
        Self::new(&ClusterConfig::default())
    }
}

#[async_trait]
impl ClusterOps for OcCli {
    async fn scale(&self, resource: &ResourceId, units: u32) -> Result<(), ClusterError> {
        let replicas = format!("--replicas={}", units);
        let (cmd, line) = self.command(["scale", replicas.as_str(), self.target(resource).as_str()]);
        self.run(cmd, line).await.map(|_| ())
    }

    async fn query_status(&self, resource: &ResourceId) -> Result<Vec<u8>, ClusterError> {
        let (cmd, line) = self.command(["get", self.target(resource).as_str()]);
        self.run(cmd, line).await
    }

    async fn stream_logs(&self, resource: &ResourceId) -> Result<LogStream, ClusterError> {
        let (mut cmd, line) = self.command(["logs", "-f", self.target(resource).as_str()]);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Starting {}", line);
        let mut child = cmd.spawn().map_err(|source| ClusterError::Spawn {
            command: line.clone(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| ClusterError::Io {
            command: line.clone(),
            source: std::io::Error::other("stdout not captured"),
        })?;

        // Drain stderr concurrently so a chatty command cannot block on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let exit = async move {
            let status = child.wait().await.map_err(|source| ClusterError::Io {
                command: line.clone(),
                source,
            })?;
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            if status.success() {
                Ok(())
            } else {
                Err(ClusterError::Exit {
                    command: line,
                    status: status.to_string(),
                    output: stderr,
                })
            }
        };

        Ok(LogStream::new(BufReader::new(stdout), exit))
    }
}
