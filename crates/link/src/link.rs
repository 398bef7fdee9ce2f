use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{LinkConfig, LinkMode};
use crate::framing::FrameDecoder;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

// A bridge connection shorter than this counts as a failed attempt
const STABLE_CONNECTION: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no peer connected")]
    NotConnected,
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// State shared between the link handle and its background I/O task
#[derive(Clone)]
struct IoShared {
    writer: Arc<Mutex<Option<BoxedWriter>>>,
    ready: Arc<AtomicBool>,
    frames_tx: mpsc::Sender<Vec<u8>>,
    max_frame_len: usize,
    read_chunk: usize,
}

impl IoShared {
    async fn attach(&self, writer: BoxedWriter) {
        *self.writer.lock().await = Some(writer);
        self.ready.store(true, Ordering::Relaxed);
    }

    async fn detach(&self) {
        self.ready.store(false, Ordering::Relaxed);
        *self.writer.lock().await = None;
    }
}

/// Bidirectional JSON message channel to the remote controller.
///
/// Inbound bytes are split into frames by a background task; the main loop
/// polls them with [`SerialLink::try_recv`] and answers with
/// [`SerialLink::send`]. Dropping the link stops the task.
pub struct SerialLink {
    writer: Arc<Mutex<Option<BoxedWriter>>>,
    ready: Arc<AtomicBool>,
    frames: mpsc::Receiver<Vec<u8>>,
    append_newline: bool,
    local_addr: Option<SocketAddr>,
    io_handle: JoinHandle<()>,
}

impl SerialLink {
    pub async fn open(config: LinkConfig) -> Result<Self, LinkError> {
        match config.mode {
            LinkMode::Stdio => {
                info!("serial link on stdio");
                Ok(Self::from_io(tokio::io::stdin(), tokio::io::stdout(), &config))
            }
            LinkMode::TcpListen => {
                let listener = TcpListener::bind(&config.addr).await?;
                let local = listener.local_addr()?;
                info!(addr = %local, "serial link listening");
                let (shared, frames) = io_shared(&config, None);
                let handle = tokio::spawn(serve_listener(listener, shared.clone()));
                Ok(Self::assemble(&config, &shared, frames, handle, Some(local)))
            }
            LinkMode::TcpConnect => {
                info!(addr = %config.addr, "serial link dialing bridge");
                let (shared, frames) = io_shared(&config, None);
                let handle = tokio::spawn(dial_loop(config.addr.clone(), shared.clone()));
                Ok(Self::assemble(&config, &shared, frames, handle, None))
            }
        }
    }

    /// Link over an already open byte stream; must be called inside a tokio
    /// runtime. The writer stays attached after the reader hits EOF, and
    /// `recv` then returns `None`.
    pub fn from_io<R, W>(reader: R, writer: W, config: &LinkConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (shared, frames) = io_shared(config, Some(Box::new(writer)));
        let task_shared = shared.clone();
        let handle = tokio::spawn(async move {
            match pump(reader, &task_shared).await {
                Ok(()) => info!("link input closed"),
                Err(err) => warn!(?err, "link input failed"),
            }
        });
        Self::assemble(config, &shared, frames, handle, None)
    }

    fn assemble(
        config: &LinkConfig,
        shared: &IoShared,
        frames: mpsc::Receiver<Vec<u8>>,
        io_handle: JoinHandle<()>,
        local_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            writer: shared.writer.clone(),
            ready: shared.ready.clone(),
            frames,
            append_newline: config.append_newline,
            local_addr,
            io_handle,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Non-blocking read attempt; `None` means nothing is waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.frames.try_recv().ok()
    }

    /// Next inbound frame, or `None` once the input side is gone for good.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.frames.recv().await
    }

    pub async fn send(&self, text: &str) -> Result<(), LinkError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(LinkError::NotConnected)?;
        if let Err(err) = write_message(writer, text, self.append_newline).await {
            *guard = None;
            self.ready.store(false, Ordering::Relaxed);
            return Err(err.into());
        }
        Ok(())
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.io_handle.abort();
    }
}

fn io_shared(config: &LinkConfig, writer: Option<BoxedWriter>) -> (IoShared, mpsc::Receiver<Vec<u8>>) {
    let (frames_tx, frames) = mpsc::channel(64);
    let shared = IoShared {
        ready: Arc::new(AtomicBool::new(writer.is_some())),
        writer: Arc::new(Mutex::new(writer)),
        frames_tx,
        max_frame_len: config.max_frame_len,
        read_chunk: config.read_chunk.max(1),
    };
    (shared, frames)
}

async fn write_message(writer: &mut BoxedWriter, text: &str, newline: bool) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    if newline {
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, shared: &IoShared) -> std::io::Result<()> {
    let mut decoder = FrameDecoder::new(shared.max_frame_len);
    let mut chunk = vec![0u8; shared.read_chunk];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if decoder.buffered() > 0 {
                debug!(bytes = decoder.buffered(), "discarding partial frame at EOF");
            }
            return Ok(());
        }
        for frame in decoder.push(&chunk[..n]) {
            if shared.frames_tx.send(frame).await.is_err() {
                // Link handle dropped
                return Ok(());
            }
        }
    }
}

async fn serve_listener(listener: TcpListener, shared: IoShared) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(?err, "accept failed");
                sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        info!(%peer, "peer connected");
        let (reader, writer) = stream.into_split();
        shared.attach(Box::new(writer)).await;
        if let Err(err) = pump(reader, &shared).await {
            warn!(%peer, ?err, "peer read failed");
        }
        shared.detach().await;
        info!(%peer, "peer disconnected");
        if shared.frames_tx.is_closed() {
            return;
        }
    }
}

async fn dial_loop(addr: String, shared: IoShared) {
    let mut backoff_secs = 1u64;
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!(%addr, "bridge connected");
                let connected_at = Instant::now();
                let (reader, writer) = stream.into_split();
                shared.attach(Box::new(writer)).await;
                if let Err(err) = pump(reader, &shared).await {
                    warn!(?err, "bridge read failed");
                }
                shared.detach().await;
                if shared.frames_tx.is_closed() {
                    return;
                }
                // Only a connection that held up resets the backoff
                if connected_at.elapsed() >= STABLE_CONNECTION {
                    backoff_secs = 1;
                }
                warn!(%addr, retry_secs = backoff_secs.min(30), "bridge closed; reconnecting");
            }
            Err(e) => {
                error!(error = ?e, %addr, "bridge connect failed; will retry");
            }
        }
        // Exponential backoff with cap
        let wait = backoff_secs.min(30);
        sleep(Duration::from_secs(wait)).await;
        backoff_secs = (backoff_secs * 2).min(60);
    }
}
