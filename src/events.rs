// Every event for the controller goes through this one queue, in order.

use crate::assembler::AssemblyReport;
use crate::error::PanelError;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Identifies one generator run. Events from older runs are discarded.
pub type RunId = u64;

/// Callback used to wake the display layer after an event is posted.
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug)]
pub enum RunEvent {
    Tick { run: RunId },
    ProcessExited { run: RunId, code: Option<i32> },
    AssemblyFinished(Result<AssemblyReport, PanelError>),
}

#[derive(Clone)]
pub struct EventSink {
    tx: UnboundedSender<RunEvent>,
    notify: Option<Notifier>,
}

impl EventSink {
    /// Returns false once the controller side of the queue is gone.
    pub fn post(&self, event: RunEvent) -> bool {
        let delivered = self.tx.send(event).is_ok();
        if let Some(notify) = &self.notify {
            notify();
        }
        delivered
    }
}

pub fn event_queue(notify: Option<Notifier>) -> (EventSink, UnboundedReceiver<RunEvent>) {
    let (tx, rx) = unbounded_channel();
    (EventSink { tx, notify }, rx)
}
