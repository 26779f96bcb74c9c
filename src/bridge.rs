//! Ready-to-use bridge: main-thread loop, I/O thread, filter and channel.

use crate::{MidiBridgeBuilder, Result};
use midibridge_core::{
    ClientHandle, FilterConfig, LoopHandle, MidiMessageFilter, MidiResult, TaskLoop, TaskRunner,
};
use midibridge_ipc::{IoHandle, IoThread, IpcChannel, IpcConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Owns everything needed to share one MIDI peer session.
///
/// Not `Sync`: it must stay on the thread that built it, which pumps client
/// notifications through [`run_until_idle`](Self::run_until_idle) or
/// [`run_one_timeout`](Self::run_one_timeout).
pub struct MidiBridge {
    filter: Arc<MidiMessageFilter>,
    channel: Option<IpcChannel>,
    config: IpcConfig,
    // Dropped after `filter` and `channel` so teardown tasks still run.
    io: IoThread,
    main: TaskLoop,
}

impl MidiBridge {
    pub fn builder() -> MidiBridgeBuilder {
        MidiBridgeBuilder::default()
    }

    pub(crate) fn new(filter_config: FilterConfig, config: IpcConfig) -> Result<Self> {
        let main = TaskLoop::new();
        let io = IoThread::spawn(&config.io_thread_name)?;

        let filter = MidiMessageFilter::new(
            filter_config,
            Arc::new(main.handle()),
            Arc::new(io.handle()),
        )?;

        Ok(Self {
            filter,
            channel: None,
            config,
            io,
            main,
        })
    }

    /// Connect to the peer's socket from the configured path.
    #[cfg(unix)]
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();
        let channel = IpcChannel::connect(self.io.handle(), self.filter.clone(), &self.config)?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Attach to an already-open stream to the peer.
    pub fn attach<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.disconnect();
        let channel =
            IpcChannel::attach(stream, self.io.handle(), self.filter.clone(), &self.config)?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Detach from the peer. Later sends are discarded until reattached.
    pub fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            debug!("Disconnecting MIDI bridge");
            channel.close();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(|c| !c.is_closed())
    }

    pub fn add_client(&self, client: ClientHandle) {
        self.filter.add_client(client);
    }

    pub fn remove_client(&self, client: &ClientHandle) {
        self.filter.remove_client(client);
    }

    pub fn send_midi_data(&self, port: u32, data: &[u8], timestamp: f64) {
        self.filter.send_midi_data(port, data, timestamp);
    }

    pub fn session_result(&self) -> MidiResult {
        self.filter.session_result()
    }

    pub fn unacknowledged_bytes(&self) -> usize {
        self.filter.unacknowledged_bytes()
    }

    /// Run queued main-thread work, including work it queues.
    pub fn run_until_idle(&self) -> usize {
        self.main.run_until_idle()
    }

    /// Run only the main-thread work queued right now.
    pub fn run_pending(&self) -> usize {
        self.main.run_pending()
    }

    /// Wait up to `timeout` for one main-thread task, then drain the rest.
    pub fn run_one_timeout(&self, timeout: Duration) -> usize {
        if self.main.run_one_timeout(timeout) {
            1 + self.main.run_until_idle()
        } else {
            0
        }
    }

    pub fn filter(&self) -> &Arc<MidiMessageFilter> {
        &self.filter
    }

    pub fn main_handle(&self) -> LoopHandle {
        self.main.handle()
    }

    pub fn io_handle(&self) -> IoHandle {
        self.io.handle()
    }

    pub fn config(&self) -> &IpcConfig {
        &self.config
    }
}

impl Drop for MidiBridge {
    fn drop(&mut self) {
        self.disconnect();
        self.io.shutdown();
    }
}

impl std::fmt::Debug for MidiBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiBridge")
            .field("main_thread", &self.main.handle().thread_id())
            .field("io", &self.io)
            .field("connected", &self.is_connected())
            .finish()
    }
}
