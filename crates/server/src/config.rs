//! Command-line and environment configuration for the `fetchtube` binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fetchtube_server_jobs::DeliveryConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "fetchtube", version, about = "Media fetch server with live download progress")]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "FETCHTUBE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "FETCHTUBE_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Directory downloads and previews are written to and served from.
    #[arg(long, env = "FETCHTUBE_MEDIA_DIR", default_value = "./media")]
    pub media_dir: PathBuf,

    /// Frontend build to serve for every non-API path.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    #[arg(long = "yt-dlp", env = "FETCHTUBE_YT_DLP", default_value = "yt-dlp")]
    pub yt_dlp: PathBuf,

    #[arg(long, env = "FETCHTUBE_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Seconds between keep-alive comments on an idle progress stream.
    #[arg(long, default_value_t = 30)]
    pub heartbeat_secs: u64,

    /// Snapshots buffered per observer before delivery waits.
    #[arg(long, default_value_t = 16)]
    pub sink_capacity: usize,

    /// How long a publish waits on a full observer before dropping the
    /// snapshot for it. 0 waits indefinitely.
    #[arg(long, default_value_t = 5000)]
    pub send_timeout_ms: u64,

    /// Close progress streams after this many seconds. 0 disables the limit.
    #[arg(long, default_value_t = 7200)]
    pub session_max_secs: u64,

    /// Keep finished jobs queryable for this many seconds.
    #[arg(long, default_value_t = 3600)]
    pub retention_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn delivery(&self) -> DeliveryConfig {
        DeliveryConfig {
            sink_capacity: self.sink_capacity.max(1),
            send_timeout: (self.send_timeout_ms > 0)
                .then(|| Duration::from_millis(self.send_timeout_ms)),
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs.max(1)),
            max_session_lifetime: (self.session_max_secs > 0)
                .then(|| Duration::from_secs(self.session_max_secs)),
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
