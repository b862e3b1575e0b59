use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tickwire::prelude::*;
use tickwire_transport::framing::{self, FrameConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

const PING: u8 = 10;
const PONG: u8 = 11;

#[derive(Debug, Clone, PartialEq)]
struct Ping {
    seq: u32,
    note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct Pong {
    seq: u32,
    served_by: String,
}

impl Message for Ping {
    const BODY_FIELDS: u32 = 2;

    fn envelope(&self) -> Envelope {
        Envelope::new(MessageType::from_u8(PING))
    }

    fn write_body(&self, fields: &mut FieldWriter<'_>) -> Result<(), ProtocolError> {
        fields.field(&self.seq)?;
        fields.optional(self.note.as_ref())
    }

    fn read_body(envelope: Envelope, fields: &mut FieldReader<'_, '_>) -> Result<Self, ProtocolError> {
        envelope.expect(MessageType::from_u8(PING))?;
        Ok(Ping {
            seq: fields.field()?,
            note: fields.optional()?,
        })
    }
}

impl Message for Pong {
    const BODY_FIELDS: u32 = 2;

    fn envelope(&self) -> Envelope {
        Envelope::new(MessageType::from_u8(PONG))
    }

    fn write_body(&self, fields: &mut FieldWriter<'_>) -> Result<(), ProtocolError> {
        fields.field(&self.seq)?;
        fields.field(&self.served_by)
    }

    fn read_body(envelope: Envelope, fields: &mut FieldReader<'_, '_>) -> Result<Self, ProtocolError> {
        envelope.expect(MessageType::from_u8(PONG))?;
        Ok(Pong {
            seq: fields.field()?,
            served_by: fields.field()?,
        })
    }
}

fn registry() -> Result<Arc<CodecRegistry>, ProtocolError> {
    let registry = CodecRegistry::builder()
        .standard()
        .provider(
            FormatterTable::new("ping-pong")
                .with_message::<Ping>()
                .with_message::<Pong>(),
        )
        .build()?;
    Ok(Arc::new(registry))
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Answers each ping with a pong, then hangs up after `rounds` of them.
async fn serve(listener: TcpListener, registry: Arc<CodecRegistry>, rounds: u32) {
    let (mut stream, peer) = match listener.accept().await {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!(error = %e, "accept failed");
            return;
        }
    };
    info!(%peer, "server: client connected");

    if let Err(e) = answer(&mut stream, &registry, rounds).await {
        warn!(error = %e, "server: session ended early");
    }
    info!("server: hanging up");
}

async fn answer(
    stream: &mut TcpStream,
    registry: &CodecRegistry,
    rounds: u32,
) -> Result<(), TickwireError> {
    let config = FrameConfig::default();
    for _ in 0..rounds {
        let frame = framing::read_frame(stream, &config).await?;
        let ping: Ping = registry.decode(&frame)?;
        info!(seq = ping.seq, note = ?ping.note, "server: ping");

        let pong = Pong {
            seq: ping.seq,
            served_by: "demo-server".into(),
        };
        framing::write_frame(stream, &registry.encode(&pong)?, &config).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Sends `rounds` pings and ticks until every pong is in or the server
/// hangs up. Returns the number of pongs handled.
async fn play(addr: &str, registry: Arc<CodecRegistry>, rounds: u32) -> Result<u32, TickwireError> {
    let received = Arc::new(AtomicU32::new(0));
    let done = Arc::new(Notify::new());

    let counter = Arc::clone(&received);
    let notify = Arc::clone(&done);
    let router = Router::new(Arc::clone(&registry))
        .on::<Pong>(PONG, move |pong| {
            info!(seq = pong.seq, from = %pong.served_by, "client: pong");
            if counter.fetch_add(1, Ordering::Relaxed) + 1 == rounds {
                notify.notify_one();
            }
        })
        .fallback(|tag, frame| warn!(%tag, len = frame.len(), "client: unexpected message"));

    let config = ClientConfig {
        address: addr.to_string(),
        tick_rate_hz: 30,
        dispatch: DispatchConfig {
            max_frames_per_tick: 4,
            disconnect_policy: DisconnectPolicy::Drain,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut client = GameClientBuilder::new()
        .config(config)
        .registry(registry)
        .connect(router)
        .await?;

    for seq in 0..rounds {
        let note = (seq % 2 == 0).then(|| format!("round {seq}"));
        client.send(&Ping { seq, note }).await?;
    }

    let stop = async {
        tokio::select! {
            _ = done.notified() => {}
            _ = tokio::time::sleep(Duration::from_secs(5)) => warn!("client: gave up waiting"),
        }
    };
    let summary = client.run_until(stop).await;
    info!(exit = ?summary.exit, ticks = summary.ticks, delivered = summary.delivered, "client: done");

    if client.is_connected() {
        client.disconnect().await?;
    }
    Ok(received.load(Ordering::Relaxed))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tickwire::logging::init("info")?;

    let rounds = 5;
    let registry = registry()?;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    info!(%addr, "starting ping-pong demo");

    let server = tokio::spawn(serve(listener, Arc::clone(&registry), rounds));
    let pongs = play(&addr, registry, rounds).await?;
    server.await?;

    info!(pongs, rounds, "finished");
    Ok(())
}
