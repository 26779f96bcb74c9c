//! MIDI message filter: one peer session shared by many clients.
//!
//! - Main thread: client registration, outbound sends, client notifications.
//! - I/O thread: channel attach/detach, inbound dispatch, writes to the peer.
//!
//! Each entry point checks that it runs on its thread. Work for the other side
//! is posted as a task that owns a copy of its payload and a strong reference
//! to the filter, so the filter outlives every task in flight.

use crate::backpressure::BackpressureTracker;
use crate::channel::{MessageFilter, MessageSender};
use crate::client::ClientHandle;
use crate::config::FilterConfig;
use crate::context::{TaskRunner, ThreadBound};
use crate::error::Result;
use crate::protocol::{HostMessage, MidiPortInfo, MidiResult, PeerMessage};
use crate::registry::ClientRegistry;
use crate::session::{is_internal_fault, JoinAction, SessionCoordinator, SessionOutcome, StartId};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

pub struct MidiMessageFilter {
    weak_self: Weak<MidiMessageFilter>,
    config: FilterConfig,
    main_runner: Arc<dyn TaskRunner>,
    io_runner: Arc<dyn TaskRunner>,
    // I/O thread
    sender: ThreadBound<Option<Arc<dyn MessageSender>>>,
    // Main thread
    session: ThreadBound<SessionCoordinator>,
    clients: ThreadBound<ClientRegistry>,
    backpressure: ThreadBound<BackpressureTracker>,
}

impl MidiMessageFilter {
    pub fn new(
        config: FilterConfig,
        main_runner: Arc<dyn TaskRunner>,
        io_runner: Arc<dyn TaskRunner>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let main_thread = main_runner.thread_id();
        let io_thread = io_runner.thread_id();

        Ok(Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            sender: ThreadBound::new(io_thread, "channel sender", None),
            session: ThreadBound::new(main_thread, "session", SessionCoordinator::new()),
            clients: ThreadBound::new(main_thread, "client registry", ClientRegistry::new()),
            backpressure: ThreadBound::new(
                main_thread,
                "backpressure",
                BackpressureTracker::new(config.max_unacknowledged_bytes),
            ),
            config,
            main_runner,
            io_runner,
        }))
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    // ==================== Main thread ====================

    /// Register `client` for the session. Main thread.
    ///
    /// The first client triggers a start request; later clients wait for the
    /// same answer, or get it immediately once known. Re-registering is a no-op.
    pub fn add_client(&self, client: ClientHandle) {
        self.assert_main_thread("add_client");
        trace!("MidiMessageFilter::add_client");

        if !self.clients.with(|clients| clients.add_waiting(client)) {
            debug!("MIDI client already registered; ignoring");
            return;
        }

        match self.session.with(|session| session.client_joined()) {
            JoinAction::Start(id) => {
                debug!("First MIDI client registered; starting session");
                self.post_to_io(move |filter| filter.start_session_on_io_thread(id));
            }
            JoinAction::Wait => {}
            JoinAction::Admit(result) => self.admit_waiting_clients(result),
        }
    }

    /// Unregister `client`. Main thread.
    ///
    /// Removing the last client ends the session.
    pub fn remove_client(&self, client: &ClientHandle) {
        self.assert_main_thread("remove_client");

        let (removed, now_empty) = self
            .clients
            .with(|clients| (clients.remove(client), clients.is_empty()));
        if !removed {
            return;
        }

        if now_empty {
            debug!("Last MIDI client removed; ending session");
            self.session.with(|session| session.all_clients_left());
            self.post_to_io(|filter| filter.end_session_on_io_thread());
        }
    }

    /// Send MIDI bytes to `port` on the peer. Main thread.
    ///
    /// Dropped without notice if the send window cannot take `data.len()` more
    /// bytes, or if the payload is larger than the channel can carry.
    pub fn send_midi_data(&self, port: u32, data: &[u8], timestamp: f64) {
        self.assert_main_thread("send_midi_data");

        if data.len() > self.config.max_payload_len {
            warn!(
                "MIDI payload of {} bytes exceeds the {} byte limit; dropping for port {}",
                data.len(),
                self.config.max_payload_len,
                port
            );
            self.backpressure.with(|window| window.record_dropped(data.len()));
            return;
        }

        if !self.backpressure.with(|window| window.try_send(data.len())) {
            warn!(
                "MIDI send window full; dropping {} bytes for port {}",
                data.len(),
                port
            );
            return;
        }

        let data = data.to_vec();
        self.post_to_io(move |filter| {
            filter.send_on_io_thread(HostMessage::SendData {
                port,
                data,
                timestamp,
            });
        });
    }

    /// Bytes sent but not yet acknowledged. Main thread.
    pub fn unacknowledged_bytes(&self) -> usize {
        self.assert_main_thread("unacknowledged_bytes");
        self.backpressure.with(|window| window.unacknowledged())
    }

    /// Bytes refused by the send window so far. Main thread.
    pub fn dropped_bytes(&self) -> u64 {
        self.assert_main_thread("dropped_bytes");
        self.backpressure.with(|window| window.dropped_bytes())
    }

    /// Last known session outcome; `NotInitialized` while starting or idle. Main thread.
    pub fn session_result(&self) -> MidiResult {
        self.assert_main_thread("session_result");
        self.session.with(|session| session.result())
    }

    /// Registered clients, waiting and admitted. Main thread.
    pub fn client_count(&self) -> usize {
        self.assert_main_thread("client_count");
        self.clients.with(|clients| clients.len())
    }

    /// Clients still waiting for the session outcome. Main thread.
    pub fn waiting_client_count(&self) -> usize {
        self.assert_main_thread("waiting_client_count");
        self.clients.with(|clients| clients.waiting_len())
    }

    /// Clients that received the session outcome. Main thread.
    pub fn admitted_client_count(&self) -> usize {
        self.assert_main_thread("admitted_client_count");
        self.clients.with(|clients| clients.admitted_len())
    }

    /// `(starts, ends)` requested of the peer over the filter's lifetime. Main thread.
    pub fn session_requests(&self) -> (u64, u64) {
        self.assert_main_thread("session_requests");
        self.session
            .with(|session| (session.starts_requested(), session.ends_requested()))
    }

    fn handle_session_started(
        &self,
        result: MidiResult,
        inputs: Vec<MidiPortInfo>,
        outputs: Vec<MidiPortInfo>,
    ) {
        self.assert_main_thread("handle_session_started");
        trace!("MidiMessageFilter::handle_session_started");

        let admit = self
            .session
            .with(|session| session.session_started(result, inputs, outputs));
        if admit {
            self.admit_waiting_clients(result);
        }
    }

    fn handle_start_delivered(&self, id: StartId, delivered: bool) {
        self.assert_main_thread("handle_start_delivered");
        self.session.with(|session| session.start_delivered(id, delivered));
    }

    fn handle_channel_attached(&self) {
        self.assert_main_thread("handle_channel_attached");

        if let Some(id) = self.session.with(|session| session.channel_attached()) {
            debug!("Session start was lost with the previous channel; requesting again");
            self.post_to_io(move |filter| filter.start_session_on_io_thread(id));
        }
    }

    fn handle_channel_detached(&self) {
        self.assert_main_thread("handle_channel_detached");
        self.session.with(|session| session.channel_detached());
    }

    /// Deliver `result` to every waiting client and move them to admitted.
    fn admit_waiting_clients(&self, result: MidiResult) {
        self.assert_main_thread("admit_waiting_clients");

        let outcome = SessionOutcome::from_result(result);
        if is_internal_fault(result) {
            error!("Peer reported unexpected session result {:?}", result);
            debug_assert!(false, "unexpected session result {:?}", result);
        }

        let (inputs, outputs) = self.session.with(|session| {
            (session.inputs().to_vec(), session.outputs().to_vec())
        });
        let waiting = self.clients.with(|clients| clients.waiting_snapshot());

        for client in waiting {
            // Clients may register or unregister from inside their callbacks;
            // admit first so a nested admission never notifies twice.
            if !self.clients.with(|clients| clients.admit(&client)) {
                continue;
            }
            if outcome.success {
                let active = true;
                for info in &inputs {
                    client.did_add_input_port(info, active);
                }
                for info in &outputs {
                    client.did_add_output_port(info, active);
                }
            }
            client.did_start_session(outcome.success, outcome.error_name(), outcome.message);
        }
    }

    fn handle_data_received(&self, port: u32, data: Vec<u8>, timestamp: f64) {
        self.assert_main_thread("handle_data_received");
        debug_assert!(!data.is_empty(), "peer delivered an empty MIDI payload");

        let clients = self.clients.with(|clients| clients.admitted_snapshot());
        for client in clients {
            if self.clients.with(|clients| clients.is_admitted(&client)) {
                client.did_receive_midi_data(port, &data, timestamp);
            }
        }
    }

    fn handle_acknowledge_sent_data(&self, bytes_sent: usize) {
        self.assert_main_thread("handle_acknowledge_sent_data");

        if let Err(e) = self.backpressure.with(|window| window.acknowledge(bytes_sent)) {
            error!("{}", e);
            debug_assert!(false, "{}", e);
        }
    }

    // ==================== I/O thread ====================

    /// Writes the start request and reports back whether a channel took it.
    /// The report is queued ahead of any reply read after this point.
    fn start_session_on_io_thread(&self, id: StartId) {
        self.assert_io_thread("start_session_on_io_thread");
        let delivered = self.send_on_io_thread(HostMessage::StartSession);
        self.post_to_main(move |filter| filter.handle_start_delivered(id, delivered));
    }

    fn end_session_on_io_thread(&self) {
        self.assert_io_thread("end_session_on_io_thread");
        self.send_on_io_thread(HostMessage::EndSession);
    }

    /// Returns `false` if no channel was attached to take `message`.
    fn send_on_io_thread(&self, message: HostMessage) -> bool {
        self.assert_io_thread("send_on_io_thread");
        match self.sender.with(|sender| sender.clone()) {
            Some(sender) => {
                sender.send(message);
                true
            }
            None => {
                trace!("No channel attached; discarding {:?}", message);
                false
            }
        }
    }

    /// Whether a channel is attached. I/O thread.
    pub fn is_attached(&self) -> bool {
        self.assert_io_thread("is_attached");
        self.sender.with(|sender| sender.is_some())
    }

    // ==================== Posting ====================

    fn post_to_io<F>(&self, task: F)
    where
        F: FnOnce(&MidiMessageFilter) + Send + 'static,
    {
        self.post(&self.io_runner, "io", task);
    }

    fn post_to_main<F>(&self, task: F)
    where
        F: FnOnce(&MidiMessageFilter) + Send + 'static,
    {
        self.post(&self.main_runner, "main", task);
    }

    fn post<F>(&self, runner: &Arc<dyn TaskRunner>, target: &'static str, task: F)
    where
        F: FnOnce(&MidiMessageFilter) + Send + 'static,
    {
        // Entry points are reached through an Arc, so this only fails mid-drop.
        let Some(this) = self.weak_self.upgrade() else {
            return;
        };
        if !runner.post_task(Box::new(move || task(&this))) {
            debug!("{} context has shut down; task dropped", target);
        }
    }

    #[track_caller]
    fn assert_main_thread(&self, operation: &str) {
        assert!(
            self.main_runner.belongs_to_current_thread(),
            "MidiMessageFilter::{} must run on the main thread",
            operation
        );
    }

    #[track_caller]
    fn assert_io_thread(&self, operation: &str) {
        assert!(
            self.io_runner.belongs_to_current_thread(),
            "MidiMessageFilter::{} must run on the I/O thread",
            operation
        );
    }
}

impl MessageFilter for MidiMessageFilter {
    fn on_filter_added(&self, sender: Arc<dyn MessageSender>) {
        self.assert_io_thread("on_filter_added");
        debug!("MIDI filter attached to channel");
        self.sender.with(|slot| *slot = Some(sender));
        self.post_to_main(|filter| filter.handle_channel_attached());
    }

    fn on_filter_removed(&self) {
        self.assert_io_thread("on_filter_removed");
        self.on_channel_closing();
    }

    fn on_channel_closing(&self) {
        self.assert_io_thread("on_channel_closing");
        debug!("MIDI channel closing");
        let was_attached = self.sender.with(|slot| slot.take().is_some());
        if was_attached {
            self.post_to_main(|filter| filter.handle_channel_detached());
        }
    }

    fn on_message_received(&self, message: &PeerMessage) -> bool {
        self.assert_io_thread("on_message_received");
        trace!("MidiMessageFilter received {}", message.name());

        match message {
            PeerMessage::SessionStarted {
                result,
                inputs,
                outputs,
            } => {
                let (result, inputs, outputs) = (*result, inputs.clone(), outputs.clone());
                self.post_to_main(move |filter| {
                    filter.handle_session_started(result, inputs, outputs)
                });
                true
            }
            PeerMessage::DataReceived {
                port,
                data,
                timestamp,
            } => {
                let (port, data, timestamp) = (*port, data.clone(), *timestamp);
                self.post_to_main(move |filter| filter.handle_data_received(port, data, timestamp));
                true
            }
            PeerMessage::AcknowledgeSentData { bytes_sent } => {
                let bytes_sent = *bytes_sent;
                self.post_to_main(move |filter| filter.handle_acknowledge_sent_data(bytes_sent));
                true
            }
            PeerMessage::Error { .. } => false,
        }
    }
}

impl std::fmt::Debug for MidiMessageFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiMessageFilter")
            .field(
                "max_unacknowledged_bytes",
                &self.config.max_unacknowledged_bytes,
            )
            .field("main_thread", &self.main_runner.thread_id())
            .field("io_thread", &self.io_runner.thread_id())
            .finish()
    }
}
