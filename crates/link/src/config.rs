use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Process stdin/stdout, e.g. when spawned behind a real serial port.
    Stdio,
    /// Serve one peer at a time on a TCP socket.
    TcpListen,
    /// Dial a serial-over-TCP bridge and keep reconnecting.
    TcpConnect,
}

impl FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(LinkMode::Stdio),
            "tcp-listen" | "listen" => Ok(LinkMode::TcpListen),
            "tcp-connect" | "connect" => Ok(LinkMode::TcpConnect),
            other => Err(format!("unknown link mode {other:?}")),
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkMode::Stdio => "stdio",
            LinkMode::TcpListen => "tcp-listen",
            LinkMode::TcpConnect => "tcp-connect",
        })
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub mode: LinkMode,
    pub addr: String,
    pub max_frame_len: usize,
    pub append_newline: bool,
    pub read_chunk: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            mode: LinkMode::TcpListen,
            addr: "127.0.0.1:7070".to_string(),
            max_frame_len: 1024,
            append_newline: true,
            read_chunk: 256,
        }
    }
}

impl LinkConfig {
    pub fn from_env() -> Self {
        let mut cfg = LinkConfig::default();

        if let Ok(v) = env::var("PICOGO_LINK_MODE") {
            match v.parse::<LinkMode>() {
                Ok(mode) => cfg.mode = mode,
                Err(err) => tracing::warn!(%err, "ignoring PICOGO_LINK_MODE"),
            }
        }
        if let Ok(v) = env::var("PICOGO_LINK_ADDR") {
            if !v.is_empty() {
                cfg.addr = v;
            }
        }
        if let Ok(v) = env::var("PICOGO_LINK_MAX_FRAME") {
            if let Ok(n) = v.parse::<usize>() {
                if n > 0 {
                    cfg.max_frame_len = n;
                }
            }
        }
        if let Ok(v) = env::var("PICOGO_LINK_NEWLINE") {
            if let Some(b) = parse_bool(&v) {
                cfg.append_newline = b;
            }
        }

        cfg
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
