//! Session Controller
//!
//! Owns the rendezvous session lifecycle and wires every direct channel into
//! the shared context. Each channel gets its own task that is the sole reader
//! of the channel's event queue: `open` admits it to the registry, `data` is
//! decoded into the message log, `close`/`error` retire it.
//!
//! Session state changes happen only while the session lock is held, and
//! every connect or disconnect bumps an attempt counter first. A connect
//! whose attempt is no longer current when its rendezvous call returns tears
//! its own link down and reports [`SessionError::Superseded`].

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use peerlink_core::{
    decode_frame, encode, AppEvent, ChannelEvent, ChannelId, Direction, EndpointId, FileSource,
    PeerlinkError, PeerlinkResult, PendingChannel, RawInput, Rendezvous, RendezvousConfig,
    RendezvousEvent, RendezvousLink, SessionError, SessionEvent, SessionState,
    StateTransitionError,
};

use crate::context::PeerContext;
use crate::dispatcher::{BroadcastReport, OutboundDispatcher};
use crate::managers::{Channel, ChannelOrigin, ChannelRegistry, MessageLog};

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

/// The live rendezvous link and the task listening to it
struct ActiveSession {
    attempt: u64,
    link: Arc<dyn RendezvousLink>,
    listener: JoinHandle<()>,
}

struct ControllerInner {
    context: Arc<PeerContext>,
    rendezvous: Arc<dyn Rendezvous>,
    files: Arc<dyn FileSource>,
    dispatcher: OutboundDispatcher,
    state: watch::Sender<SessionState>,
    session: Mutex<Option<ActiveSession>>,
    attempts: AtomicU64,
}

/// Drives one PeerLink client: connect, disconnect, dial, send
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

impl SessionController {
    pub fn new(
        context: Arc<PeerContext>,
        rendezvous: Arc<dyn Rendezvous>,
        files: Arc<dyn FileSource>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let dispatcher = OutboundDispatcher::new(context.registry().clone())
            .with_send_timeout(context.send_timeout());
        Self {
            inner: Arc::new(ControllerInner {
                context,
                rendezvous,
                files,
                dispatcher,
                state,
                session: Mutex::new(None),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Open a rendezvous session and return the endpoint id it assigned
    ///
    /// An existing session is torn down first. On failure the session moves
    /// to the error state and the cause is returned; calling again retries.
    pub async fn connect(&self, config: &RendezvousConfig) -> PeerlinkResult<EndpointId> {
        let inner = &self.inner;
        let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut session = inner.session.lock().await;
            if !inner.is_current(attempt) {
                return Err(SessionError::Superseded.into());
            }
            if let Some(previous) = session.take() {
                info!(own_id = %previous.link.own_id(), "Replacing existing session");
                previous.listener.abort();
                previous.link.disconnect().await;
                inner.apply(SessionEvent::Disconnect)?;
            }
            inner.apply(SessionEvent::Connect)?;

            if let Err(e) = config.validate() {
                inner.apply(SessionEvent::ConnectFailed {
                    cause: e.to_string(),
                })?;
                return Err(e.into());
            }
        }

        info!(host = %config.host, port = config.port, secure = config.secure, "Connecting to rendezvous");
        let result = inner.rendezvous.connect(config).await;

        let mut session = inner.session.lock().await;
        if !inner.is_current(attempt) {
            drop(session);
            if let Ok(stale) = result {
                stale.link.disconnect().await;
            }
            debug!(attempt, "Connect attempt superseded");
            return Err(SessionError::Superseded.into());
        }

        match result {
            Ok(established) => {
                let own_id = established.link.own_id().clone();
                let listener = tokio::spawn(listen(
                    Arc::downgrade(inner),
                    attempt,
                    established.events,
                ));
                *session = Some(ActiveSession {
                    attempt,
                    link: established.link,
                    listener,
                });
                inner.apply(SessionEvent::Established {
                    own_id: own_id.clone(),
                })?;
                info!(own_id = %own_id, "Connected to rendezvous");
                Ok(own_id)
            }
            Err(e) => {
                warn!("Rendezvous connect failed: {}", e);
                inner.apply(SessionEvent::ConnectFailed {
                    cause: e.to_string(),
                })?;
                Err(e.into())
            }
        }
    }

    /// Tear down the rendezvous link
    ///
    /// Idempotent. Open channels are left alone, and an in-flight connect is
    /// superseded.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        inner.attempts.fetch_add(1, Ordering::SeqCst);

        let mut session = inner.session.lock().await;
        if let Some(active) = session.take() {
            active.listener.abort();
            active.link.disconnect().await;
            info!(own_id = %active.link.own_id(), "Disconnected from rendezvous");
        }
        if let Err(e) = inner.apply(SessionEvent::Disconnect) {
            error!("Disconnect rejected: {}", e);
        }
    }

    /// Request a direct channel to `remote`
    ///
    /// Returns the id of the pending channel; it joins the registry once the
    /// transport reports it open. Dials while not connected, with an empty
    /// id, or that the transport rejects are logged and dropped.
    pub async fn dial(&self, remote: &EndpointId) -> Option<ChannelId> {
        if remote.is_empty() {
            warn!("Ignoring dial to empty endpoint id");
            return None;
        }

        let link = {
            let session = self.inner.session.lock().await;
            session.as_ref().map(|active| active.link.clone())
        };
        let Some(link) = link else {
            warn!(remote = %remote, "Dropping dial, session not connected");
            return None;
        };

        match link.dial(remote).await {
            Ok(pending) => Some(self.inner.attach(pending, ChannelOrigin::Dialed)),
            Err(e) => {
                warn!(remote = %remote, "Dial failed: {}", e);
                None
            }
        }
    }

    /// Close every local channel to `remote`, returning how many were open
    pub async fn close_channels(&self, remote: &EndpointId) -> usize {
        let context = &self.inner.context;
        let channels = context.registry().channels_for(remote);
        for channel in &channels {
            context.retire(channel, Some("closed locally".to_string()));
            channel.close().await;
        }
        if channels.is_empty() {
            debug!(remote = %remote, "No open channels to close");
        }
        channels.len()
    }

    // ------------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------------

    /// Encode, log and broadcast one outbound payload
    pub async fn send(&self, input: RawInput) -> BroadcastReport {
        let envelope = encode(input);
        self.inner
            .context
            .record(Direction::Outbound, envelope.to_message());
        self.inner.dispatcher.broadcast(&envelope).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> BroadcastReport {
        self.send(RawInput::Text(text.into())).await
    }

    /// Read a file and broadcast it as a binary payload
    ///
    /// A read failure is logged and nothing is logged or dispatched.
    pub async fn send_file(&self, path: impl AsRef<Path>) -> Option<BroadcastReport> {
        let path = path.as_ref();
        let data = match self.inner.files.read(path).await {
            Ok(data) => data,
            Err(source) => {
                let err = PeerlinkError::FileRead {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                return None;
            }
        };
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);
        Some(self.send(RawInput::File { name, data }).await)
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Own endpoint id, present only while connected
    pub fn own_id(&self) -> Option<EndpointId> {
        self.inner.state.borrow().own_id().cloned()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AppEvent> {
        self.inner.context.subscribe()
    }

    pub fn registry(&self) -> &ChannelRegistry {
        self.inner.context.registry()
    }

    pub fn log(&self) -> &MessageLog {
        self.inner.context.log()
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &*self.inner.state.borrow())
            .field("registry", self.inner.context.registry())
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Internals
// ----------------------------------------------------------------------------

impl ControllerInner {
    fn is_current(&self, attempt: u64) -> bool {
        self.attempts.load(Ordering::SeqCst) == attempt
    }

    /// Feed an event to the state machine, publishing real changes
    fn apply(&self, event: SessionEvent) -> Result<SessionState, StateTransitionError> {
        let mut outcome = Ok(SessionState::Disconnected);
        let changed = self.state.send_if_modified(|state| {
            match state.clone().transition(event) {
                Ok(next) => {
                    let changed = *state != next;
                    *state = next.clone();
                    outcome = Ok(next);
                    changed
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });

        if let (true, Ok(next)) = (changed, &outcome) {
            debug!(state = %next, "Session state changed");
            self.context.emit(AppEvent::SessionStateChanged(next.clone()));
        }
        outcome
    }

    /// Start driving a channel's event queue
    fn attach(&self, pending: PendingChannel, origin: ChannelOrigin) -> ChannelId {
        let channel = Channel::new(pending.channel, origin);
        let id = channel.id();
        debug!(channel = %id, remote = %channel.remote(), ?origin, "Channel attached");
        tokio::spawn(drive_channel(self.context.clone(), channel, pending.events));
        id
    }

    /// Drop the session of `attempt` after its link broke
    async fn fail_session(&self, attempt: u64, cause: String) {
        let mut session = self.session.lock().await;
        match session.as_ref() {
            Some(active) if active.attempt == attempt => {}
            _ => return,
        }
        if let Some(active) = session.take() {
            // The listener is the caller; its handle is dropped, not aborted
            active.link.disconnect().await;
        }
        warn!("Rendezvous link failed: {}", cause);
        if let Err(e) = self.apply(SessionEvent::LinkFailed { cause }) {
            error!("Link failure rejected: {}", e);
        }
    }
}

/// Listen to one rendezvous session until it ends or is torn down
async fn listen(
    controller: Weak<ControllerInner>,
    attempt: u64,
    mut events: mpsc::Receiver<RendezvousEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = controller.upgrade() else {
            return;
        };
        match event {
            RendezvousEvent::InboundChannel(pending) => {
                info!(remote = %pending.channel.remote(), "Inbound channel");
                inner.attach(pending, ChannelOrigin::Inbound);
            }
            RendezvousEvent::LinkError(cause) => {
                inner.fail_session(attempt, cause).await;
                return;
            }
        }
    }

    if let Some(inner) = controller.upgrade() {
        inner
            .fail_session(attempt, "rendezvous event stream ended".to_string())
            .await;
    }
}

/// Sole consumer of one channel's events
async fn drive_channel(
    context: Arc<PeerContext>,
    channel: Channel,
    mut events: mpsc::Receiver<ChannelEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Open => context.admit(&channel),
            ChannelEvent::Data(frame) => {
                let message = decode_frame(&frame);
                context.record(
                    Direction::Inbound {
                        from: channel.remote().clone(),
                    },
                    message,
                );
            }
            ChannelEvent::Close => {
                context.retire(&channel, None);
                return;
            }
            ChannelEvent::Error(cause) => {
                warn!(channel = %channel.id(), remote = %channel.remote(), "Channel error: {}", cause);
                context.retire(&channel, Some(cause));
                return;
            }
        }
    }

    debug!(channel = %channel.id(), "Channel event queue closed");
    context.retire(&channel, Some("event queue closed".to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use peerlink_core::{ChannelConfig, FsFileSource, RendezvousError, RendezvousSession};

    /// Rendezvous that refuses every connect
    struct RefusingRendezvous;

    #[async_trait]
    impl Rendezvous for RefusingRendezvous {
        async fn connect(
            &self,
            _config: &RendezvousConfig,
        ) -> Result<RendezvousSession, RendezvousError> {
            Err(RendezvousError::Refused {
                reason: "closed for maintenance".to_string(),
            })
        }
    }

    fn controller() -> SessionController {
        SessionController::new(
            Arc::new(PeerContext::new(&ChannelConfig::default())),
            Arc::new(RefusingRendezvous),
            Arc::new(FsFileSource),
        )
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let controller = controller();
        assert_eq!(controller.state(), SessionState::Disconnected);
        assert!(controller.own_id().is_none());
        assert!(controller.registry().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_enters_error_state() {
        let controller = controller();
        let mut events = controller.subscribe_events();

        let result = controller.connect(&RendezvousConfig::default()).await;
        assert!(matches!(result, Err(PeerlinkError::Rendezvous(_))));
        assert!(controller.state().error_cause().is_some());

        assert_eq!(
            events.recv().await.unwrap(),
            AppEvent::SessionStateChanged(SessionState::Connecting)
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            AppEvent::SessionStateChanged(SessionState::Error { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_enters_error_state() {
        let controller = controller();
        let config = RendezvousConfig::new("", 10000, true);
        let result = controller.connect(&config).await;
        assert!(matches!(result, Err(PeerlinkError::Config(_))));
        assert!(matches!(controller.state(), SessionState::Error { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let controller = controller();
        let mut state = controller.subscribe_state();

        controller.disconnect().await;
        controller.disconnect().await;

        assert_eq!(controller.state(), SessionState::Disconnected);
        assert!(!state.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_dial_without_session_is_dropped() {
        let controller = controller();
        assert!(controller.dial(&EndpointId::new("abc123")).await.is_none());
        assert!(controller.dial(&EndpointId::new("  ")).await.is_none());
        assert!(controller.registry().is_empty());
    }

    #[tokio::test]
    async fn test_send_without_channels_still_logs() {
        let controller = controller();
        let report = controller.send_text("hello").await;
        assert_eq!(report.attempted, 0);
        assert_eq!(controller.log().len(), 1);
        assert_eq!(controller.log().messages()[0].content(), "hello");
    }

    #[tokio::test]
    async fn test_send_missing_file_dispatches_nothing() {
        let controller = controller();
        let missing = std::env::temp_dir().join("peerlink-missing-image.png");
        assert!(controller.send_file(&missing).await.is_none());
        assert!(controller.log().is_empty());
    }
}
