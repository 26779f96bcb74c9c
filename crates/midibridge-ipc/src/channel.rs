//! Socket channel that drives a [`MessageFilter`] on the I/O thread.
//!
//! Reads [`PeerMessage`] frames and hands each to the filter; writes the
//! [`HostMessage`]s the filter sends. The filter sees `on_filter_added` once
//! the stream is set up, and exactly one of `on_channel_closing` (peer hung up
//! or the stream failed) or `on_filter_removed` ([`IpcChannel::close`]).

use crate::config::IpcConfig;
use crate::framing::{read_frame, write_frame};
use crate::io_thread::IoHandle;
use crate::{IpcError, Result};
use midibridge_core::{HostMessage, MessageFilter, MessageSender, PeerMessage, TaskRunner};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

/// Outbound half handed to the filter. Queues onto the writer task.
struct ChannelSender {
    outgoing: mpsc::UnboundedSender<HostMessage>,
}

impl MessageSender for ChannelSender {
    fn send(&self, message: HostMessage) {
        if self.outgoing.send(message).is_err() {
            trace!("Channel writer gone; message discarded");
        }
    }
}

struct ChannelState {
    detached: AtomicBool,
    reader: Mutex<Option<AbortHandle>>,
}

impl ChannelState {
    /// Returns `true` for the first caller only.
    fn detach(&self) -> bool {
        !self.detached.swap(true, Ordering::AcqRel)
    }
}

pub struct IpcChannel {
    io: IoHandle,
    filter: Arc<dyn MessageFilter>,
    state: Arc<ChannelState>,
}

impl IpcChannel {
    /// Attach `filter` to an already-connected stream.
    ///
    /// Setup runs on the I/O thread; this returns once it is queued.
    pub fn attach<S>(
        stream: S,
        io: IoHandle,
        filter: Arc<dyn MessageFilter>,
        config: &IpcConfig,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::attach_with(move || Ok(stream), io, filter, config)
    }

    /// Connect to the peer's Unix socket at `config.socket_path` and attach `filter`.
    #[cfg(unix)]
    pub fn connect(io: IoHandle, filter: Arc<dyn MessageFilter>, config: &IpcConfig) -> Result<Self> {
        config.validate()?;
        let stream = std::os::unix::net::UnixStream::connect(&config.socket_path)?;
        stream.set_nonblocking(true)?;
        debug!("Connected to MIDI peer at {}", config.socket_path.display());

        // Registering with the reactor has to happen inside the I/O runtime.
        Self::attach_with(
            move || tokio::net::UnixStream::from_std(stream),
            io,
            filter,
            config,
        )
    }

    fn attach_with<S, F>(
        open: F,
        io: IoHandle,
        filter: Arc<dyn MessageFilter>,
        config: &IpcConfig,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        F: FnOnce() -> std::io::Result<S> + Send + 'static,
    {
        config.validate()?;
        let state = Arc::new(ChannelState {
            detached: AtomicBool::new(false),
            reader: Mutex::new(None),
        });

        let task_io = io.clone();
        let task_filter = Arc::clone(&filter);
        let task_state = Arc::clone(&state);
        let max_frame_len = config.max_frame_len;
        let posted = io.post_task(Box::new(move || {
            match open() {
                Ok(stream) => Self::run(stream, &task_io, task_filter, task_state, max_frame_len),
                Err(e) => {
                    warn!("Failed to open MIDI channel stream: {}", e);
                    task_state.detach();
                }
            }
        }));
        if !posted {
            return Err(IpcError::ChannelClosed(
                "I/O thread has shut down".to_string(),
            ));
        }

        Ok(Self { io, filter, state })
    }

    /// Runs on the I/O thread inside its runtime.
    fn run<S>(
        stream: S,
        io: &IoHandle,
        filter: Arc<dyn MessageFilter>,
        state: Arc<ChannelState>,
        max_frame_len: usize,
    ) where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if state.detached.load(Ordering::Acquire) {
            debug!("Channel closed before it was set up");
            return;
        }

        let (mut read_half, mut write_half) = tokio::io::split(stream);
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<HostMessage>();

        filter.on_filter_added(Arc::new(ChannelSender { outgoing }));

        // Ends once the filter drops its sender, or on the first write error.
        io.spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                if let Err(e) = write_frame(&mut write_half, &message, max_frame_len).await {
                    match e {
                        IpcError::FrameTooLarge { .. } => {
                            warn!("Dropping outbound message: {}", e);
                            continue;
                        }
                        _ => {
                            warn!("MIDI channel write failed: {}", e);
                            break;
                        }
                    }
                }
            }
            trace!("MIDI channel writer finished");
        });

        let reader_state = Arc::clone(&state);
        let reader = io.spawn(async move {
            loop {
                match read_frame::<_, PeerMessage>(&mut read_half, max_frame_len).await {
                    Ok(Some(message)) => {
                        if reader_state.detached.load(Ordering::Acquire) {
                            break;
                        }
                        if !filter.on_message_received(&message) {
                            match &message {
                                PeerMessage::Error { message } => {
                                    warn!("MIDI peer reported error: {}", message)
                                }
                                other => warn!("Unhandled MIDI peer message {}", other.name()),
                            }
                        }
                    }
                    Ok(None) => {
                        debug!("MIDI peer closed the channel");
                        break;
                    }
                    Err(e) => {
                        warn!("MIDI channel read failed: {}", e);
                        break;
                    }
                }
            }

            if reader_state.detach() {
                filter.on_channel_closing();
            }
        });
        *state.reader.lock() = Some(reader.abort_handle());
    }

    /// Detach the filter. Idempotent; a no-op once the peer has hung up.
    pub fn close(&self) {
        let filter = Arc::clone(&self.filter);
        let state = Arc::clone(&self.state);
        let posted = self.io.post_task(Box::new(move || {
            if !state.detach() {
                return;
            }
            if let Some(reader) = state.reader.lock().take() {
                reader.abort();
            }
            filter.on_filter_removed();
            debug!("MIDI filter removed from channel");
        }));
        if !posted {
            debug!("I/O thread already shut down; channel dropped with it");
        }
    }

    /// Whether the channel has stopped delivering to the filter.
    pub fn is_closed(&self) -> bool {
        self.state.detached.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for IpcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcChannel")
            .field("io", &self.io)
            .field("closed", &self.is_closed())
            .finish()
    }
}
