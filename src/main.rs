use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sinkhole::filter::{FilterToggles, PolicySource};
#[cfg(unix)]
use sinkhole::tun::FdTun;
use sinkhole::tunnel::{Tunnel, TunnelConfig, TunnelEvent};

#[derive(Parser)]
#[command(name = "sinkhole")]
#[command(about = "DNS-filtering tunnel engine", long_about = None)]
struct Args {
    /// Inherited tun device file descriptor
    #[arg(long)]
    tun_fd: i32,

    /// Upstream DNS resolver address
    #[arg(short, long, default_value = "8.8.8.8")]
    upstream: IpAddr,

    /// Blocklist file, one domain per line
    #[arg(long, default_value = "blocklist.txt")]
    blocklist: PathBuf,

    /// Whitelist file, one domain per line
    #[arg(long, default_value = "whitelist.txt")]
    whitelist: PathBuf,

    /// Upstream reply timeout in seconds
    #[arg(long, default_value = "5")]
    upstream_timeout: u64,

    /// Leave ad domains unblocked
    #[arg(long)]
    allow_ads: bool,

    /// Leave tracker domains unblocked
    #[arg(long)]
    allow_trackers: bool,

    /// Leave annoyance domains unblocked
    #[arg(long)]
    allow_annoyances: bool,
}

impl Args {
    fn tunnel_config(&self) -> TunnelConfig {
        TunnelConfig {
            upstream: SocketAddr::new(self.upstream, 53),
            toggles: FilterToggles {
                block_ads: !self.allow_ads,
                block_trackers: !self.allow_trackers,
                block_annoyances: !self.allow_annoyances,
            },
            policy: PolicySource {
                blocklist: self.blocklist.clone(),
                whitelist: self.whitelist.clone(),
            },
            upstream_timeout: Duration::from_secs(self.upstream_timeout),
        }
    }
}

#[cfg(unix)]
async fn run(args: Args) -> sinkhole::Result<()> {
    let config = args.tunnel_config();

    // SAFETY: the collaborator that established the device hands this fd
    // to the process for exclusive use
    let device = Arc::new(unsafe { FdTun::from_raw_fd(args.tun_fd) });

    let (tunnel, mut events) = Tunnel::new();
    let tunnel = Arc::new(tunnel);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TunnelEvent::StateChanged(state) => info!(?state, "tunnel state"),
                TunnelEvent::QueryObserved {
                    domain, blocked, ..
                } => {
                    if blocked {
                        info!(%domain, "blocked");
                    }
                }
                TunnelEvent::StatsUpdated(_) => {}
            }
        }
    });

    tunnel.start(device, config).await?;
    info!(domains = tunnel.blocked_domains(), "filtering active");

    let stats_tunnel = tunnel.clone();
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await; // the first tick completes immediately
        loop {
            interval.tick().await;
            let stats = stats_tunnel.stats();
            info!(
                blocked = stats.total_blocked,
                allowed = stats.total_allowed,
                "stats"
            );
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(sinkhole::Error::Interface)?;
    info!("shutting down");

    stats_task.abort();
    tunnel.stop().await;

    let stats = tunnel.stats();
    info!(
        blocked = stats.total_blocked,
        allowed = stats.total_allowed,
        ads = stats.ads_blocked,
        trackers = stats.trackers_blocked,
        annoyances = stats.annoyances_blocked,
        "final stats"
    );
    Ok(())
}

#[cfg(unix)]
fn main() -> sinkhole::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(sinkhole::Error::Interface)?;

    rt.block_on(run(args))
}

#[cfg(not(unix))]
fn main() {
    eprintln!("sinkhole needs a unix tun file descriptor to run");
    std::process::exit(1);
}
