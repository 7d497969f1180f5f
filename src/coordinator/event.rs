use tokio::sync::{mpsc, oneshot};

use crate::core::{Frame, Result};
use crate::radio::ReceivedFrame;

/// Work for the dispatcher. Radio receive callbacks and the uplink timer
/// only ever enqueue these; nothing else runs outside the dispatch loop.
#[derive(Debug)]
pub enum Event {
    /// A packet from the radio, tagged with its configuration epoch
    FrameReceived(ReceivedFrame),
    /// Time for the node's own uplink
    UplinkTick,
    /// Shut down; acknowledged once the coordinator is idle
    Stop(oneshot::Sender<()>),
}

/// Next-hop transport for frames the relay decides to forward
pub trait Upstream: Send {
    fn send_upstream(&mut self, frame: &Frame) -> Result<()>;
}

/// Where forwarded frames go
pub enum UpstreamRoute {
    /// Re-transmit on the relay radio
    OverAir,
    /// Hand to an external transport
    Collaborator(Box<dyn Upstream>),
}

impl Default for UpstreamRoute {
    fn default() -> Self {
        UpstreamRoute::OverAir
    }
}

/// Cloneable handle for stopping a running coordinator from elsewhere
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    pub(super) events: mpsc::Sender<Event>,
}

impl CoordinatorHandle {
    /// Requests a stop and waits until the coordinator is idle.
    ///
    /// Returns immediately if the coordinator has already stopped.
    pub async fn stop(&self) {
        let (ack, done) = oneshot::channel();
        if self.events.send(Event::Stop(ack)).await.is_err() {
            return;
        }
        let _ = done.await;
    }

    /// Whether the coordinator's queue is still open
    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }
}
