//! Error types for the dispatch layer.

/// Errors that can occur while setting up dispatch.
///
/// Nothing that happens *during* a tick is an error: unreadable frames
/// are dropped and counted, and a dead connection just stops the receive
/// loop.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The receive loop for this dispatcher already exists.
    ///
    /// A dispatcher owns at most one receive loop for its whole life.
    #[error("receive loop already started")]
    AlreadyStarted,

    /// The receive loop can only start on a connected transport.
    #[error("connection is not connected")]
    NotConnected,

    /// No Tokio runtime to spawn the receive loop on.
    #[error("no Tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
