use anyhow::{Context, bail};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration for the `incident-tonic-server` binary.
///
/// Values come from CLI arguments or environment variables (a `.env` file is
/// loaded first when present). The defaults serve plaintext gRPC on every
/// interface at port 50051.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "incident-tonic-server",
    version,
    about = "A gRPC service for in-memory incident reports and greetings"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/incident-tonic.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Do not expose the gRPC reflection service.
    ///
    /// Environment variable: `NO_REFLECTION`
    #[arg(long, env = "NO_REFLECTION", default_value_t = false)]
    pub no_reflection: bool,
}

/// Where the server accepts connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listen {
    Tcp(SocketAddr),
    Uds(PathBuf),
}

impl std::fmt::Display for Listen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Listen::Tcp(addr) => write!(f, "{addr}"),
            Listen::Uds(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: Listen,
    pub reflection: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let listen = if args.uds {
            if args.server_addr.is_empty() {
                bail!("SERVER_ADDR must be a socket path when --uds is set");
            }
            if cfg!(not(unix)) {
                bail!("Unix domain sockets are not supported on this platform");
            }
            Listen::Uds(PathBuf::from(args.server_addr))
        } else {
            let addr = args
                .server_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid SERVER_ADDR `{}`", args.server_addr))?;
            Listen::Tcp(addr)
        };

        Ok(Self {
            listen,
            reflection: !args.no_reflection,
        })
    }
}
