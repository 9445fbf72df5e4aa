//! Tunnel lifecycle and the packet loop.
//!
//! One blocking reader pulls frames off the virtual interface and feeds
//! a dispatcher, which fans each packet out to a short-lived handler
//! task. Blocked queries are answered locally; everything else goes to
//! the upstream resolver and the reply is written back.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dns::DnsQuery;
use crate::error::{Error, Result};
use crate::filter::{Category, FilterToggles, LoadSummary, PolicyEngine, PolicySource};
use crate::packet::UdpFrame;
use crate::stats::{Stats, StatsSnapshot};
use crate::tun::{MTU, TunInterface};
use crate::upstream::{DEFAULT_TIMEOUT, Upstream};

const PACKET_QUEUE: usize = 1024;
const EVENT_QUEUE: usize = 256;

/// Lifecycle of the tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl TunnelState {
    pub fn is_running(&self) -> bool {
        matches!(self, TunnelState::Running)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TunnelState::Error)
    }
}

/// Notifications pushed to the embedding host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelEvent {
    StateChanged(TunnelState),
    QueryObserved {
        domain: String,
        blocked: bool,
        category: Option<Category>,
    },
    StatsUpdated(StatsSnapshot),
}

/// Configuration supplied at start.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    pub upstream: SocketAddr,
    pub toggles: FilterToggles,
    pub policy: PolicySource,
    pub upstream_timeout: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            upstream: SocketAddr::from(([8, 8, 8, 8], 53)),
            toggles: FilterToggles::default(),
            policy: PolicySource {
                blocklist: PathBuf::from("blocklist.txt"),
                whitelist: PathBuf::from("whitelist.txt"),
            },
            upstream_timeout: DEFAULT_TIMEOUT,
        }
    }
}

struct Shared {
    engine: PolicyEngine,
    stats: Stats,
    state_tx: watch::Sender<TunnelState>,
    events: mpsc::Sender<TunnelEvent>,
}

impl Shared {
    fn set_state(&self, state: TunnelState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            let _ = self.events.try_send(TunnelEvent::StateChanged(state));
        }
    }

    fn observe_query(&self, domain: &str, blocked: bool, category: Option<Category>) {
        let _ = self.events.try_send(TunnelEvent::QueryObserved {
            domain: domain.to_string(),
            blocked,
            category,
        });
        let _ = self
            .events
            .try_send(TunnelEvent::StatsUpdated(self.stats.snapshot()));
    }
}

struct Active {
    device: Arc<dyn TunInterface>,
    config: TunnelConfig,
    stop_requested: Arc<AtomicBool>,
    run: JoinHandle<()>,
}

/// A DNS-filtering tunnel over one virtual interface.
pub struct Tunnel {
    shared: Arc<Shared>,
    active: Mutex<Option<Active>>,
}

impl Tunnel {
    /// Create a tunnel and the receiver for its event stream.
    ///
    /// Events are best-effort: when the receiver lags they are dropped
    /// rather than blocking the packet path. The watch state and the
    /// counters stay authoritative regardless.
    pub fn new() -> (Self, mpsc::Receiver<TunnelEvent>) {
        Self::with_engine(PolicyEngine::new())
    }

    /// Same, with a caller-built policy engine (custom classifier rules).
    pub fn with_engine(engine: PolicyEngine) -> (Self, mpsc::Receiver<TunnelEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (state_tx, _) = watch::channel(TunnelState::Stopped);
        let tunnel = Self {
            shared: Arc::new(Shared {
                engine,
                stats: Stats::new(),
                state_tx,
                events,
            }),
            active: Mutex::new(None),
        };
        (tunnel, events_rx)
    }

    /// Start filtering on `device`.
    ///
    /// The policy load runs alongside the packet loop; queries arriving
    /// before the first load completes see the previous snapshot (empty
    /// on a fresh tunnel) and are forwarded.
    pub async fn start(&self, device: Arc<dyn TunInterface>, config: TunnelConfig) -> Result<()> {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.as_ref() {
            if !existing.run.is_finished() {
                return Err(Error::AlreadyRunning);
            }
            // previous run ended on its own; reap it
            active.take();
        }

        info!(upstream = %config.upstream, "starting tunnel");
        self.shared.set_state(TunnelState::Starting);

        {
            let shared = self.shared.clone();
            let source = config.policy.clone();
            let toggles = config.toggles;
            tokio::task::spawn_blocking(move || {
                shared.engine.reload(&source, toggles);
            });
        }

        let stop_requested = Arc::new(AtomicBool::new(false));
        let (packet_tx, packet_rx) = mpsc::channel::<Vec<u8>>(PACKET_QUEUE);

        // Blocking reader; released by closing the device.
        let reader = {
            let device = device.clone();
            tokio::task::spawn_blocking(move || read_loop(device, packet_tx))
        };

        let upstream = Upstream::new(config.upstream).with_timeout(config.upstream_timeout);

        self.shared.set_state(TunnelState::Running);

        let run = tokio::spawn(run_loop(
            self.shared.clone(),
            device.clone(),
            upstream,
            packet_rx,
            reader,
            stop_requested.clone(),
        ));

        *active = Some(Active {
            device,
            config,
            stop_requested,
            run,
        });
        Ok(())
    }

    /// Stop filtering and release the interface reader.
    ///
    /// A no-op when nothing is running. Also clears a tunnel that ended
    /// in the error state, making a later `start` possible.
    pub async fn stop(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };

        if !active.run.is_finished() {
            self.shared.set_state(TunnelState::Stopping);
        }
        active.stop_requested.store(true, Ordering::Release);
        active.device.close();
        let _ = active.run.await;
        self.shared.set_state(TunnelState::Stopped);
        info!("tunnel stopped");
    }

    pub fn state(&self) -> TunnelState {
        *self.shared.state_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Watch every state transition, not just the event stream's view.
    pub fn subscribe_state(&self) -> watch::Receiver<TunnelState> {
        self.shared.state_tx.subscribe()
    }

    /// Cumulative counters for this tunnel.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Blocked domains in the active policy snapshot.
    pub fn blocked_domains(&self) -> usize {
        self.shared.engine.blocked_len()
    }

    /// Re-read the list files configured at start and swap the snapshot.
    ///
    /// Returns `None` when the tunnel is not running.
    pub async fn reload_policy(&self) -> Option<LoadSummary> {
        let (source, toggles) = {
            let active = self.active.lock().await;
            let active = active.as_ref()?;
            (active.config.policy.clone(), active.config.toggles)
        };
        let shared = self.shared.clone();
        tokio::task::spawn_blocking(move || shared.engine.reload(&source, toggles))
            .await
            .ok()
    }
}

/// Blocking read loop. Ends with `Ok` when the device reports
/// end-of-stream, `Err` when a read fails.
fn read_loop(device: Arc<dyn TunInterface>, packets: mpsc::Sender<Vec<u8>>) -> io::Result<()> {
    let mut buf = [0u8; MTU];
    loop {
        match device.recv(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                if packets.blocking_send(buf[..n].to_vec()).is_err() {
                    // dispatcher gone; shutting down
                    return Ok(());
                }
            }
            Err(e) => return Err(e),
        }
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    device: Arc<dyn TunInterface>,
    upstream: Upstream,
    mut packets: mpsc::Receiver<Vec<u8>>,
    reader: JoinHandle<io::Result<()>>,
    stop_requested: Arc<AtomicBool>,
) {
    let io_failed = Arc::new(AtomicBool::new(false));
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            maybe = packets.recv() => match maybe {
                Some(packet) => {
                    let ctx = HandlerCtx {
                        shared: shared.clone(),
                        device: device.clone(),
                        upstream: upstream.clone(),
                        io_failed: io_failed.clone(),
                    };
                    handlers.spawn(handle_packet(ctx, packet));
                }
                None => break,
            },
            Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
        }
    }

    // In-flight forwards are dropped, not awaited.
    handlers.abort_all();

    let read_result = reader.await;

    let final_state = if stop_requested.load(Ordering::Acquire) {
        TunnelState::Stopped
    } else {
        match read_result {
            Ok(Ok(())) if !io_failed.load(Ordering::Acquire) => TunnelState::Stopped,
            Ok(Ok(())) => TunnelState::Error,
            Ok(Err(e)) => {
                error!(error = %e, "interface read failed");
                TunnelState::Error
            }
            Err(e) => {
                error!(error = %e, "interface reader panicked");
                TunnelState::Error
            }
        }
    };
    shared.set_state(final_state);
}

struct HandlerCtx {
    shared: Arc<Shared>,
    device: Arc<dyn TunInterface>,
    upstream: Upstream,
    io_failed: Arc<AtomicBool>,
}

async fn handle_packet(ctx: HandlerCtx, packet: Vec<u8>) {
    let Some(frame) = UdpFrame::parse(&packet) else {
        // not IPv4/UDP to port 53; dropped
        return;
    };

    let Some(query) = DnsQuery::parse(frame.payload) else {
        // undecodable DNS goes upstream untouched, never evaluated
        forward(&ctx, &frame, None).await;
        return;
    };

    let decision = ctx.shared.engine.evaluate(&query.domain);
    if decision.blocked {
        let category = decision.category.unwrap_or(Category::Ads);
        ctx.shared.stats.record_blocked(category);
        ctx.shared.observe_query(&query.domain, true, Some(category));
        debug!(domain = %query.domain, category = category.as_str(), "query blocked");

        let reply = frame.reframe(&query.blocked_response());
        write_reply(&ctx, &reply);
        return;
    }

    forward(&ctx, &frame, Some(&query)).await;
}

/// Relay one payload upstream; a failed or timed-out forward produces
/// no reply and touches no counter.
async fn forward(ctx: &HandlerCtx, frame: &UdpFrame<'_>, query: Option<&DnsQuery>) {
    match ctx.upstream.resolve(frame.payload).await {
        Ok(reply) => {
            if let Some(query) = query {
                ctx.shared.stats.record_allowed();
                ctx.shared.observe_query(&query.domain, false, None);
                debug!(domain = %query.domain, "query forwarded");
            }
            write_reply(ctx, &frame.reframe(&reply));
        }
        Err(e) => {
            warn!(error = %e, "upstream resolution failed");
        }
    }
}

fn write_reply(ctx: &HandlerCtx, reply_frame: &[u8]) {
    if let Err(e) = ctx.device.send(reply_frame) {
        error!(error = %e, "interface write failed");
        if !ctx.io_failed.swap(true, Ordering::AcqRel) {
            ctx.device.close();
        }
    }
}
