//! Receive and dispatch for Tickwire.
//!
//! Two execution contexts meet here:
//!
//! - the **receive loop**, a Tokio task that waits on the connection and
//!   pushes whole frames onto a queue, and
//! - the **dispatcher**, which the game ticks from its own loop and which
//!   pops a bounded number of frames per tick and hands them to a
//!   [`MessageHandler`].
//!
//! ```text
//! Connection ──read_frame──▶ ReceiveLoop ──push──▶ queue ──try_pop──▶ Dispatcher::tick ──▶ handler
//!              (Tokio task)                                            (game thread)
//! ```
//!
//! The queue is the only state the two sides share. Handlers always run
//! on the thread that calls [`Dispatcher::tick`], one at a time.

mod clock;
mod config;
mod dispatch;
mod error;
pub mod queue;
mod receive;
mod router;

pub use clock::{ClockConfig, ClockStats, LatePolicy, TickClock, TickInfo};
pub use config::{DisconnectPolicy, DispatchConfig};
pub use dispatch::{DispatchStats, Dispatcher, MessageHandler, TickSummary};
pub use error::DispatchError;
pub use receive::{ReceiveExit, ReceiveLoop};
pub use router::{Router, RouterStats};
