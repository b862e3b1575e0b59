//! Per-message-type routing.
//!
//! [`Router`] is a [`MessageHandler`] that looks the tag up in a table
//! of handlers. Typed routes decode the frame through the codec registry
//! first; if decoding fails, the frame is logged and dropped and the
//! next frame is routed as usual.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use tickwire_protocol::{CodecRegistry, Frame, MessageType, ProtocolError};

use crate::MessageHandler;

type Route = Box<dyn FnMut(Frame) -> Result<(), ProtocolError> + Send>;
type Fallback = Box<dyn FnMut(MessageType, Frame) + Send>;

/// Counters kept by a [`Router`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterStats {
    /// Frames handed to a route (including ones that then failed to decode).
    pub routed: u64,
    /// Frames whose route failed to decode them.
    pub decode_failures: u64,
    /// Frames with no route (sent to the fallback, if any).
    pub unrouted: u64,
}

/// Maps message types to handlers.
///
/// ```rust
/// use std::sync::Arc;
/// use tickwire_dispatch::Router;
/// use tickwire_protocol::CodecRegistry;
///
/// let registry = Arc::new(CodecRegistry::standard().unwrap());
/// let router = Router::new(registry)
///     .on_frame(1u8, |frame| println!("ping, {} bytes", frame.len()))
///     .fallback(|tag, _| println!("no route for {tag}"));
/// assert!(router.handles(1u8));
/// ```
pub struct Router {
    registry: Arc<CodecRegistry>,
    routes: HashMap<MessageType, Route>,
    fallback: Option<Fallback>,
    stats: RouterStats,
}

impl Router {
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        Self {
            registry,
            routes: HashMap::new(),
            fallback: None,
            stats: RouterStats::default(),
        }
    }

    /// Routes `message_type` to a handler that receives the decoded `T`.
    ///
    /// Replaces any earlier route for the same tag.
    pub fn on<T: 'static>(
        self,
        message_type: impl Into<MessageType>,
        mut handler: impl FnMut(T) + Send + 'static,
    ) -> Self {
        let registry = Arc::clone(&self.registry);
        self.route(message_type.into(), move |frame: Frame| {
            let value = registry.decode::<T>(&frame)?;
            handler(value);
            Ok(())
        })
    }

    /// Routes `message_type` to a handler that receives the raw frame.
    pub fn on_frame(
        self,
        message_type: impl Into<MessageType>,
        mut handler: impl FnMut(Frame) + Send + 'static,
    ) -> Self {
        self.route(message_type.into(), move |frame: Frame| {
            handler(frame);
            Ok(())
        })
    }

    /// Handler for tags with no route. Without one, such frames are
    /// logged at `debug` and dropped.
    pub fn fallback(mut self, handler: impl FnMut(MessageType, Frame) + Send + 'static) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    fn route(
        mut self,
        message_type: MessageType,
        route: impl FnMut(Frame) -> Result<(), ProtocolError> + Send + 'static,
    ) -> Self {
        if self.routes.insert(message_type, Box::new(route)).is_some() {
            debug!(%message_type, "route replaced");
        }
        self
    }

    /// Whether `message_type` has a route.
    pub fn handles(&self, message_type: impl Into<MessageType>) -> bool {
        self.routes.contains_key(&message_type.into())
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }
}

impl MessageHandler for Router {
    fn on_message(&mut self, message_type: MessageType, frame: Frame) {
        match self.routes.get_mut(&message_type) {
            Some(route) => {
                self.stats.routed += 1;
                if let Err(e) = route(frame) {
                    self.stats.decode_failures += 1;
                    warn!(%message_type, error = %e, "failed to decode routed frame");
                }
            }
            None => {
                self.stats.unrouted += 1;
                match self.fallback.as_mut() {
                    Some(fallback) => fallback(message_type, frame),
                    None => debug!(%message_type, "no route, dropping frame"),
                }
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.routes.keys().map(|t| t.get()).collect();
        tags.sort_unstable();
        f.debug_struct("Router")
            .field("routes", &tags)
            .field("fallback", &self.fallback.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tickwire_protocol::Envelope;

    use super::*;

    fn registry() -> Arc<CodecRegistry> {
        Arc::new(CodecRegistry::standard().unwrap())
    }

    fn tag(value: u8) -> MessageType {
        MessageType::from_u8(value)
    }

    #[test]
    fn test_typed_route_decodes() {
        let registry = registry();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut router = Router::new(Arc::clone(&registry))
            .on::<Envelope>(3u8, move |env| sink.lock().unwrap().push(env.message_type().get()));

        let frame = registry.encode(&Envelope::new(tag(3))).unwrap();
        router.on_message(tag(3), frame);

        assert_eq!(*seen.lock().unwrap(), vec![3]);
        assert_eq!(router.stats().routed, 1);
        assert_eq!(router.stats().decode_failures, 0);
    }

    #[test]
    fn test_decode_failure_is_counted_not_fatal() {
        let registry = registry();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut router = Router::new(Arc::clone(&registry))
            .on::<Envelope>(5u8, move |_| *counter.lock().unwrap() += 1);

        // A string is not an envelope.
        router.on_message(tag(5), Frame::from(vec![0xa1, b'x']));
        assert_eq!(router.stats().decode_failures, 1);

        let good = registry.encode(&Envelope::new(tag(5))).unwrap();
        router.on_message(tag(5), good);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_unrouted_goes_to_fallback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut router = Router::new(registry())
            .on_frame(1u8, |_| {})
            .fallback(move |t, _| sink.lock().unwrap().push(t.get()));

        router.on_message(tag(9), Frame::from(vec![0x91, 0x09]));
        router.on_message(tag(1), Frame::from(vec![0x91, 0x01]));

        assert_eq!(*seen.lock().unwrap(), vec![9]);
        assert_eq!(router.stats().unrouted, 1);
        assert_eq!(router.stats().routed, 1);
    }

    #[test]
    fn test_unrouted_without_fallback_is_dropped() {
        let mut router = Router::new(registry());
        router.on_message(tag(200), Frame::from(vec![0x91, 0xcc, 0xc8]));
        assert_eq!(router.stats().unrouted, 1);
        assert!(!router.handles(200u8));
    }
}
