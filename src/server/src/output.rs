//! Server output forwarding
//!
//! stdout/stderr of the child are drained into `tracing` so the pipes never
//! fill up, and the most recent lines are kept for startup diagnostics.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Bounded tail of server output shared with the forwarding tasks
#[derive(Debug, Clone)]
pub(crate) struct OutputTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl OutputTail {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub(crate) fn snapshot(&self) -> String {
        let lines = self.lines.lock();
        lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Drain `reader` line by line until EOF
pub(crate) fn forward<R>(reader: R, stream: &'static str, tail: OutputTail) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "rbacprobe::mongod", stream, "{}", line);
            tail.push(line);
        }
    })
}

/// Wait briefly for forwarders to hit EOF so the tail is complete
pub(crate) async fn drain(handles: &mut Vec<JoinHandle<()>>, limit: Duration) {
    for handle in handles.drain(..) {
        if tokio::time::timeout(limit, handle).await.is_err() {
            debug!("Output forwarder still running after {:?}", limit);
        }
    }
}
