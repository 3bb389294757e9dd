//! Cluster capabilities the engine depends on

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::pin::Pin;
use stressrig_core::ResourceId;
use tokio::io::AsyncBufRead;

use crate::error::ClusterError;

/// A live line-oriented log stream plus its terminal exit status.
///
/// `exit` resolves once the producing command has terminated; it must only
/// be awaited after `lines` has been read to the end.
pub struct LogStream {
    pub lines: Pin<Box<dyn AsyncBufRead + Send>>,
    pub exit: BoxFuture<'static, Result<(), ClusterError>>,
}

impl LogStream {
    pub fn new(
        lines: impl AsyncBufRead + Send + 'static,
        exit: impl std::future::Future<Output = Result<(), ClusterError>> + Send + 'static,
    ) -> Self {
        Self {
            lines: Box::pin(lines),
            exit: Box::pin(exit),
        }
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream").finish_non_exhaustive()
    }
}

/// External operations against the cluster
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Request a replica count change
    async fn scale(&self, resource: &ResourceId, units: u32) -> Result<(), ClusterError>;

    /// Fetch the tabular status listing (`name revision desired current trigger`)
    async fn query_status(&self, resource: &ResourceId) -> Result<Vec<u8>, ClusterError>;

    /// Start following the resource's logs
    async fn stream_logs(&self, resource: &ResourceId) -> Result<LogStream, ClusterError>;
}
