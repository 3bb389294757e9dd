//! In-memory cluster for tests
//!
//! [`ScriptedCluster`] answers status queries from a per-resource script,
//! serves log streams from fixed text or from a live in-memory pipe, and
//! records every scale request. Enabled with the `testing` feature.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use stressrig_core::ResourceId;
use tokio::io::{BufReader, DuplexStream};

use crate::cluster::{ClusterOps, LogStream};
use crate::error::ClusterError;

/// Buffer size of live log pipes
const PIPE_CAPACITY: usize = 64 * 1024;

enum ScriptedLog {
    Text {
        content: Vec<u8>,
        exit: Result<(), ClusterError>,
    },
    Live(DuplexStream),
}

#[derive(Default)]
struct Script {
    statuses: HashMap<ResourceId, VecDeque<Vec<u8>>>,
    queries: HashMap<ResourceId, u32>,
    logs: HashMap<ResourceId, VecDeque<ScriptedLog>>,
    scale_calls: Vec<(ResourceId, u32)>,
    failing_scale: HashSet<ResourceId>,
    failing_logs: HashSet<ResourceId>,
}

/// Scripted [`ClusterOps`] implementation. Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedCluster {
    script: Arc<Mutex<Script>>,
}

impl ScriptedCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a status listing. The last queued listing keeps being returned.
    pub fn push_status(&self, resource: &ResourceId, listing: impl Into<Vec<u8>>) {
        self.script()
            .statuses
            .entry(resource.clone())
            .or_default()
            .push_back(listing.into());
    }

    /// Queue a log stream with fixed content that exits successfully
    pub fn push_log(&self, resource: &ResourceId, content: &str) {
        self.push_log_with_exit(resource, content, Ok(()));
    }

    /// Queue a log stream with fixed content and the given exit result
    pub fn push_log_with_exit(
        &self,
        resource: &ResourceId,
        content: &str,
        exit: Result<(), ClusterError>,
    ) {
        self.script()
            .logs
            .entry(resource.clone())
            .or_default()
            .push_back(ScriptedLog::Text {
                content: content.as_bytes().to_vec(),
                exit,
            });
    }

    /// Queue a live log stream. Whatever is written to the returned pipe is
    /// streamed; dropping it ends the stream with a successful exit.
    pub fn open_log(&self, resource: &ResourceId) -> DuplexStream {
        let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        self.script()
            .logs
            .entry(resource.clone())
            .or_default()
            .push_back(ScriptedLog::Live(reader));
        writer
    }

    /// Make every scale request on the resource fail
    pub fn fail_scale(&self, resource: &ResourceId) {
        self.script().failing_scale.insert(resource.clone());
    }

    /// Make every log stream launch on the resource fail
    pub fn fail_logs(&self, resource: &ResourceId) {
        self.script().failing_logs.insert(resource.clone());
    }

    /// Scale requests received so far, in order
    pub fn scale_calls(&self) -> Vec<(ResourceId, u32)> {
        self.script().scale_calls.clone()
    }

    /// Number of status queries for the resource
    pub fn status_queries(&self, resource: &ResourceId) -> u32 {
        self.script().queries.get(resource).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ClusterOps for ScriptedCluster {
    async fn scale(&self, resource: &ResourceId, units: u32) -> Result<(), ClusterError> {
        let mut script = self.script();
        script.scale_calls.push((resource.clone(), units));
        if script.failing_scale.contains(resource) {
            return Err(ClusterError::Exit {
                command: format!("scale --replicas={} dc/{}", units, resource),
                status: "exit status: 1".to_string(),
                output: format!("deploymentconfigs \"{}\" not found", resource),
            });
        }
        Ok(())
    }

    async fn query_status(&self, resource: &ResourceId) -> Result<Vec<u8>, ClusterError> {
        let mut script = self.script();
        *script.queries.entry(resource.clone()).or_default() += 1;

        let queue = script
            .statuses
            .get_mut(resource)
            .ok_or_else(|| ClusterError::UnknownResource(resource.clone()))?;
        let listing = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        listing.ok_or_else(|| ClusterError::UnknownResource(resource.clone()))
    }

    async fn stream_logs(&self, resource: &ResourceId) -> Result<LogStream, ClusterError> {
        let mut script = self.script();
        if script.failing_logs.contains(resource) {
            return Err(ClusterError::Spawn {
                command: format!("logs -f dc/{}", resource),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted launch failure"),
            });
        }

        let scripted = script.logs.get_mut(resource).and_then(VecDeque::pop_front);
        Ok(match scripted {
            Some(ScriptedLog::Text { content, exit }) => {
                LogStream::new(Cursor::new(content), async move { exit })
            }
            Some(ScriptedLog::Live(reader)) => LogStream::new(BufReader::new(reader), async { Ok(()) }),
            None => LogStream::new(Cursor::new(Vec::new()), async { Ok(()) }),
        })
    }
}
