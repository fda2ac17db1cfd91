use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;

/// Command line options for the file sharer.
#[derive(Parser, Debug, Clone)]
#[command(name = "file-sharer", version, about = "Share a directory over HTTP")]
pub struct Config {
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT, help = "Listen port")]
    pub port: u16,

    #[arg(long, default_value = "./", help = "The root path to serve")]
    pub root: PathBuf,

    #[arg(long, help = "Only listen on the local machine")]
    pub local: bool,

    #[arg(
        long,
        conflicts_with = "local",
        help = "Only listen on the first intranet IPv4 address"
    )]
    pub intranet: bool,

    #[arg(long, help = "Serve the upload/download page instead of a plain file server")]
    pub advance: bool,

    #[arg(long, help = "Abort requests that run longer than this many seconds")]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Loopback,
    Intranet,
    AllInterfaces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerSet {
    Basic,
    Extended,
}

impl Config {
    pub fn bind_mode(&self) -> BindMode {
        match (self.local, self.intranet) {
            (true, _) => BindMode::Loopback,
            (false, true) => BindMode::Intranet,
            (false, false) => BindMode::AllInterfaces,
        }
    }

    pub fn handler_set(&self) -> HandlerSet {
        if self.advance {
            HandlerSet::Extended
        } else {
            HandlerSet::Basic
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
