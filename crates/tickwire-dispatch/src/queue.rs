//! The hand-off queue between the receive loop and the dispatcher.
//!
//! An unbounded FIFO with exactly one producer and one consumer. The
//! producer never waits; the consumer pops without blocking and gets
//! `None` when there is nothing to do this tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use tickwire_transport::Frame;

/// Creates a connected producer/consumer pair.
pub fn hand_off() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let backlog = Arc::new(AtomicUsize::new(0));
    (
        FrameSender {
            tx,
            backlog: Arc::clone(&backlog),
        },
        FrameReceiver { rx, backlog },
    )
}

/// The producing end. Not `Clone`: one queue, one producer.
#[derive(Debug)]
pub struct FrameSender {
    tx: UnboundedSender<Frame>,
    backlog: Arc<AtomicUsize>,
}

impl FrameSender {
    /// Appends a frame. Never waits.
    ///
    /// # Errors
    /// Hands the frame back if the consumer is gone.
    pub fn push(&self, frame: Frame) -> Result<(), Frame> {
        // Count first so the consumer can never observe a frame that
        // isn't counted yet.
        self.backlog.fetch_add(1, Ordering::AcqRel);
        self.tx.send(frame).map_err(|rejected| {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
            rejected.0
        })
    }

    /// Whether the consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The consuming end.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: UnboundedReceiver<Frame>,
    backlog: Arc<AtomicUsize>,
}

impl FrameReceiver {
    /// Pops the oldest frame, or `None` if the queue is empty right now.
    pub fn try_pop(&mut self) -> Option<Frame> {
        let frame = self.rx.try_recv().ok()?;
        self.backlog.fetch_sub(1, Ordering::AcqRel);
        Some(frame)
    }

    /// Frames waiting to be popped.
    pub fn len(&self) -> usize {
        self.backlog.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
