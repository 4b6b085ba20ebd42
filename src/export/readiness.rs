//! Waiting for nodes to finish mounting before capture.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::canvas::{CanvasDocument, NodeId};

/// Polls node readiness until everything is mounted or time runs out.
#[derive(Debug, Clone, Copy)]
pub struct RenderReadinessWaiter {
    poll_interval: Duration,
    max_wait: Duration,
}

impl RenderReadinessWaiter {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self { poll_interval, max_wait }
    }

    /// Returns the nodes still not ready when waiting stopped; empty means
    /// everything mounted. Never fails: the caller decides what a leftover
    /// node means.
    pub async fn wait(&self, doc: &dyn CanvasDocument) -> Vec<NodeId> {
        let deadline = Instant::now() + self.max_wait;
        let mut pending: Vec<NodeId> = doc
            .nodes()
            .into_iter()
            .filter(|n| !n.is_ready())
            .map(|n| n.id)
            .collect();

        loop {
            // Nodes removed meanwhile no longer block the capture.
            pending.retain(|id| doc.node(id).is_some_and(|n| !n.is_ready()));
            if pending.is_empty() {
                return pending;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "{}: {} node(s) still loading after {:?}",
                    doc.id(),
                    pending.len(),
                    self.max_wait
                );
                return pending;
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::memory::MemoryCanvas;
    use crate::canvas::{CanvasModel, Node};
    use crate::SurfaceSize;
    use std::sync::Arc;

    fn canvas() -> Arc<MemoryCanvas> {
        let model = CanvasModel {
            nodes: vec![
                Node::new("a", 0.0, 0.0, 10.0, 10.0),
                Node::new("b", 20.0, 0.0, 10.0, 10.0),
            ],
            edges: vec![],
        };
        Arc::new(MemoryCanvas::new("c", model, SurfaceSize::default()))
    }

    fn waiter() -> RenderReadinessWaiter {
        RenderReadinessWaiter::new(Duration::from_millis(10), Duration::from_millis(15000))
    }

    #[tokio::test(start_paused = true)]
    async fn ready_canvas_returns_immediately() {
        let c = canvas();
        let start = Instant::now();
        assert!(waiter().wait(c.as_ref()).await.is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_node_times_out_within_one_interval() {
        let c = canvas();
        c.set_node_ready(&NodeId::from("b"), false);
        let start = Instant::now();
        let pending = waiter().wait(c.as_ref()).await;
        let elapsed = start.elapsed();
        assert_eq!(pending, vec![NodeId::from("b")]);
        assert!(elapsed >= Duration::from_millis(15000));
        assert!(elapsed <= Duration::from_millis(15010));
    }

    #[tokio::test(start_paused = true)]
    async fn late_mount_is_picked_up() {
        let c = canvas();
        let id = NodeId::from("a");
        c.set_node_ready(&id, false);

        let c2 = c.clone();
        let id2 = id.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(250)).await;
            c2.set_node_ready(&id2, true);
        });

        let start = Instant::now();
        assert!(waiter().wait(c.as_ref()).await.is_empty());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed <= Duration::from_millis(260));
    }
}
