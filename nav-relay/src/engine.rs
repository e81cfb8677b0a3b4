//! Sync protocol engine.
//!
//! Serves at most one subscriber. Upstream events are debounced, parsed on the
//! blocking pool, and compared with the last state actually sent to decide
//! between a full snapshot, a patch, or nothing at all.
//!
//! ```text
//! notify(raw) ──► timer (0 or threshold) ──► spawn_blocking(extract + diff)
//!                                                       │
//!                        generation still current? ◄────┘
//!                                   │ yes
//!                                   ▼
//!                        snapshot / patch ──► subscriber channel
//! ```
//!
//! Every scheduled pipeline carries the generation it was started under.
//! Cancelling bumps the generation, so a pipeline that finishes after being
//! cancelled finds a mismatch and drops its result.

use crate::error::UpstreamError;
use crate::protocol::{Action, ErrorKind, Frame, NavigationOptions, Payload};
use crate::upstream::{navigation_uri, Upstream};
use nav_extractor::{diff, CodecError, DiffPatch, Format, NavigationData, NotificationLayout, RawNotification};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

pub const DEFAULT_DEBOUNCE_THRESHOLD: Duration = Duration::from_millis(500);
pub const DEFAULT_NAVIGATION_WAIT: Duration = Duration::from_millis(2500);

/// Defaults applied to every new subscriber
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub debounce_threshold: Duration,
    /// How long after connecting to wait for navigation before reporting none
    pub navigation_wait: Duration,
    pub format: Format,
    pub app_id: String,
    pub app_version: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_threshold: DEFAULT_DEBOUNCE_THRESHOLD,
            navigation_wait: DEFAULT_NAVIGATION_WAIT,
            format: Format::Text,
            app_id: env!("CARGO_PKG_NAME").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A message ready for the socket writer
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Binary(Vec<u8>),
    /// Close the connection with a policy-violation reason
    Close(String),
}

impl Outbound {
    pub fn encode(frame: &Frame, format: Format) -> Result<Self, CodecError> {
        match format {
            Format::Text => Ok(Outbound::Text(frame.to_text()?)),
            Format::Binary => Ok(Outbound::Binary(frame.encode(Format::Binary)?)),
        }
    }

    /// Decode a data message back into a frame; `None` for `Close`
    pub fn frame(&self) -> Option<Result<Frame, CodecError>> {
        match self {
            Outbound::Text(text) => Some(Frame::decode(text.as_bytes(), Format::Text)),
            Outbound::Binary(bytes) => Some(Frame::decode(bytes, Format::Binary)),
            Outbound::Close(_) => None,
        }
    }
}

/// A message received from the subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

impl Inbound {
    fn decode(&self) -> Result<Frame, CodecError> {
        match self {
            Inbound::Text(text) => Frame::decode(text.as_bytes(), Format::Text),
            Inbound::Binary(bytes) => Frame::decode(bytes, Format::Binary),
        }
    }

    fn describe(&self) -> String {
        match self {
            Inbound::Text(text) => text.clone(),
            Inbound::Binary(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No subscriber
    Idle,
    /// Subscriber connected, notifications cannot be read yet
    AwaitingAccess,
    Syncing,
}

/// The accepted subscriber's end of the outbound channel
#[derive(Debug)]
pub struct Subscriber {
    pub id: u64,
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

#[derive(Debug)]
pub enum Admission {
    Accepted(Subscriber),
    /// Messages to send before dropping the connection
    Rejected(Vec<Outbound>),
}

struct Connection {
    id: u64,
    tx: mpsc::UnboundedSender<Outbound>,
}

/// What a finished pipeline should send
#[derive(Debug, PartialEq)]
enum Outgoing {
    Snapshot,
    Patch(DiffPatch),
    Unchanged,
}

fn plan(last_sent: Option<&NavigationData>, current: &NavigationData) -> Outgoing {
    match last_sent {
        None => Outgoing::Snapshot,
        Some(last) => {
            let patch = diff(last, current);
            if patch.is_empty() {
                Outgoing::Unchanged
            } else {
                Outgoing::Patch(patch)
            }
        }
    }
}

fn same_snapshot(a: &Option<Arc<NavigationData>>, b: &Option<Arc<NavigationData>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

struct EngineState {
    connection: Option<Connection>,
    session: SessionState,
    /// Upstream work is only done while a subscriber is connected
    enabled: bool,
    current: Option<Arc<NavigationData>>,
    last_sent: Option<Arc<NavigationData>>,
    /// Most recent upstream notification, kept for rescheduling
    pending: Option<RawNotification>,
    timer: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
    generation: u64,
    threshold: Duration,
    format: Format,
    next_id: u64,
}

impl EngineState {
    fn new(settings: &SyncSettings) -> Self {
        Self {
            connection: None,
            session: SessionState::Idle,
            enabled: false,
            current: None,
            last_sent: None,
            pending: None,
            timer: None,
            watchdog: None,
            generation: 0,
            threshold: settings.debounce_threshold,
            format: settings.format,
            next_id: 1,
        }
    }

    fn connection_id(&self) -> Option<u64> {
        self.connection.as_ref().map(|connection| connection.id)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.enabled && self.generation == generation
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    fn cancel_pipeline(&mut self) {
        self.cancel_timer();
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
    }

    /// Back to `Idle`: no subscriber, no state, nothing scheduled
    fn reset(&mut self) {
        self.cancel_pipeline();
        self.connection = None;
        self.session = SessionState::Idle;
        self.enabled = false;
        self.current = None;
        self.last_sent = None;
    }

    fn options(&self) -> NavigationOptions {
        NavigationOptions::current(self.threshold, self.format)
    }

    /// Returns whether the debounce threshold changed
    fn apply_options(&mut self, options: NavigationOptions, default_threshold: Duration) -> bool {
        let previous = self.threshold;

        if let Some(millis) = options.debounce_threshold_millis {
            self.threshold = if millis < 0 {
                default_threshold
            } else {
                Duration::from_millis(millis as u64)
            };
        }
        if let Some(use_binary) = options.use_binary_format {
            self.format = Format::from_binary_flag(use_binary);
        }

        previous != self.threshold
    }

    /// Send to the subscriber. A dead channel counts as a disconnect.
    fn send(&mut self, frame: Frame) -> bool {
        let Some(connection) = &self.connection else {
            trace!("No client connected, dropping {} frame", frame.action);
            return false;
        };

        if let Payload::Error { kind, message } = &frame.data {
            error!("Sending error {:?} to client: {}", kind, message);
        } else {
            trace!("Sending {} frame to client {}", frame.action, connection.id);
        }

        let message = match Outbound::encode(&frame, self.format) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to encode {} frame: {}", frame.action, e);
                return false;
            }
        };

        let delivered = connection.tx.send(message).is_ok();
        if !delivered {
            warn!("Client connection is gone, resetting");
            self.reset();
        }
        delivered
    }
}

struct Shared<U> {
    upstream: U,
    layout: NotificationLayout,
    settings: SyncSettings,
    state: Mutex<EngineState>,
}

/// Handle to the engine; clones share the same state
pub struct SyncEngine<U> {
    shared: Arc<Shared<U>>,
}

impl<U> Clone for SyncEngine<U> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<U: Upstream> SyncEngine<U> {
    pub fn new(upstream: U, layout: NotificationLayout, settings: SyncSettings) -> Self {
        let state = EngineState::new(&settings);
        Self {
            shared: Arc::new(Shared {
                upstream,
                layout,
                settings,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn upstream(&self) -> &U {
        &self.shared.upstream
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.shared.settings
    }

    pub async fn session_state(&self) -> SessionState {
        self.shared.state.lock().await.session
    }

    pub async fn options(&self) -> NavigationOptions {
        self.shared.state.lock().await.options()
    }

    /// Admit a new subscriber, or refuse it while another one is active
    pub async fn connect(&self) -> Admission {
        let settings = &self.shared.settings;
        let mut state = self.shared.state.lock().await;

        if let Some(existing) = &state.connection {
            if !existing.tx.is_closed() {
                warn!("We've already a client... Refusing new connection");
                let refusal = Frame::error(ErrorKind::NotAuthorized, "Another client is already connected");
                let mut messages = Vec::new();
                match Outbound::encode(&refusal, Format::Text) {
                    Ok(message) => messages.push(message),
                    Err(e) => error!("Failed to encode refusal: {}", e),
                }
                messages.push(Outbound::Close("Only one client is supported".to_string()));
                return Admission::Rejected(messages);
            }
            debug!("Replacing stale connection {}", existing.id);
            state.reset();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = state.next_id;
        state.next_id += 1;
        state.connection = Some(Connection { id, tx });
        state.enabled = true;
        state.threshold = settings.debounce_threshold;
        state.format = settings.format;
        info!("Connection with peer {} started", id);

        state.send(Frame::hello(&settings.app_id, &settings.app_version));

        let access = self.shared.upstream.has_notification_access();
        if access {
            state.session = SessionState::Syncing;
        } else {
            state.session = SessionState::AwaitingAccess;
            state.send(Frame::error(
                ErrorKind::NoNotificationsAccess,
                "The service has no notifications access",
            ));
        }

        let engine = self.clone();
        let wait = settings.navigation_wait;
        state.watchdog = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            engine.check_navigation(id).await;
        }));

        if access {
            if let Some(raw) = self.shared.upstream.active_notification() {
                debug!("Replaying active navigation notification");
                self.schedule(&mut state, raw);
            }
        }

        Admission::Accepted(Subscriber { id, outbound: rx })
    }

    /// Upstream change event
    pub async fn notify(&self, raw: RawNotification) {
        let mut state = self.shared.state.lock().await;
        self.schedule(&mut state, raw);
    }

    /// Upstream reports that the navigation notification went away
    pub async fn notification_removed(&self) {
        let mut state = self.shared.state.lock().await;
        state.cancel_timer();
        state.pending = None;
        state.last_sent = None;

        if state.current.take().is_some() {
            info!("Navigation ended");
            state.send(Frame::error(ErrorKind::NoNavigationInProgress, "Navigation ended"));
        }
    }

    pub async fn access_changed(&self, granted: bool) {
        let mut state = self.shared.state.lock().await;
        if state.connection.is_none() {
            return;
        }

        if granted {
            if state.session == SessionState::AwaitingAccess {
                info!("Notification access granted");
                state.session = SessionState::Syncing;
                let replay = self.shared.upstream.active_notification().or_else(|| state.pending.clone());
                if let Some(raw) = replay {
                    self.schedule(&mut state, raw);
                }
            }
        } else if state.session == SessionState::Syncing {
            warn!("Notification access revoked");
            state.session = SessionState::AwaitingAccess;
            state.cancel_timer();
            state.current = None;
            state.last_sent = None;
            state.send(Frame::error(
                ErrorKind::NoNotificationsAccess,
                "The service has no notifications access",
            ));
        }
    }

    pub async fn disconnect(&self, id: u64) {
        let mut state = self.shared.state.lock().await;
        if state.connection_id() == Some(id) {
            info!("Connection with peer {} closed", id);
            state.reset();
        }
    }

    /// Handle one inbound message to completion, replying exactly once
    pub async fn handle_inbound(&self, id: u64, inbound: Inbound) {
        let mut state = self.shared.state.lock().await;
        if state.connection_id() != Some(id) {
            debug!("Ignoring message from inactive connection {}", id);
            return;
        }

        let reply = match inbound.decode() {
            Ok(frame) => {
                trace!("Received {:?}", frame);
                self.dispatch(&mut state, frame)
            }
            Err(e) => Frame::error(
                ErrorKind::InvalidRequest,
                format!("Failed to handle client request {}: {}", inbound.describe(), e),
            ),
        };

        state.send(reply);
    }

    fn dispatch(&self, state: &mut EngineState, frame: Frame) -> Frame {
        let upstream = &self.shared.upstream;

        match (frame.action, frame.data) {
            (Action::Resync, _) => match state.current.clone() {
                Some(current) => {
                    let snapshot = Frame::snapshot(&current);
                    state.last_sent = Some(current);
                    snapshot
                }
                None if !upstream.has_notification_access() => Frame::error(
                    ErrorKind::NoNotificationsAccess,
                    "The service has no notifications access",
                ),
                None => Frame::error(ErrorKind::NoNavigationInProgress, "No navigation in progress"),
            },
            (Action::Get, _) => Frame::options(state.options()),
            (Action::Set, Payload::Options(options)) => {
                if state.apply_options(options, self.shared.settings.debounce_threshold) {
                    debug!("Debounce threshold is now {:?}", state.threshold);
                    state.cancel_timer();
                    if let Some(raw) = upstream.active_notification().or_else(|| state.pending.clone()) {
                        self.schedule(state, raw);
                    }
                }
                Frame::new(Action::Set, Payload::Options(state.options()))
            }
            (Action::Start, Payload::NavigationStart { destination, mode, avoid }) => {
                let uri = navigation_uri(&destination, mode, &avoid);
                info!("Navigating to URI: {}", uri);
                match upstream.start_navigation(&uri) {
                    Ok(()) => Frame::status(format!("Navigating to {}", destination)),
                    Err(e) => upstream_failure(e),
                }
            }
            (Action::Stop, _) => match &state.current {
                None => Frame::error(ErrorKind::NoNavigationInProgress, "No navigation in progress"),
                Some(current) if !current.can_stop => {
                    Frame::error(ErrorKind::NotSupported, "The current navigation cannot be stopped")
                }
                Some(_) => match upstream.stop_navigation() {
                    Ok(()) => Frame::status("Navigation stopped"),
                    Err(e) => upstream_failure(e),
                },
            },
            (action @ (Action::Set | Action::Start), data) => Frame::error(
                ErrorKind::InvalidRequest,
                format!("Failed to handle client request {}: unexpected data {:?}", action, data),
            ),
            (action, _) => Frame::error(
                ErrorKind::InvalidAction,
                format!("Impossible to handle action {}", action),
            ),
        }
    }

    /// Start (or restart) the debounce timer for `raw`
    fn schedule(&self, state: &mut EngineState, raw: RawNotification) {
        state.pending = Some(raw.clone());
        if !state.enabled || state.session != SessionState::Syncing {
            trace!("Not syncing, keeping notification for later");
            return;
        }

        state.cancel_timer();
        let generation = state.generation;
        let delay = if state.current.is_none() {
            Duration::ZERO
        } else {
            state.threshold
        };
        trace!("Scheduling navigation update in {:?}", delay);

        let engine = self.clone();
        state.timer = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            engine.run_pipeline(generation, raw).await;
        }));
    }

    async fn run_pipeline(&self, generation: u64, raw: RawNotification) {
        let basis = {
            let state = self.shared.state.lock().await;
            if !state.is_current(generation) {
                return;
            }
            state.last_sent.clone()
        };

        let shared = Arc::clone(&self.shared);
        let worker_basis = basis.clone();
        let work = tokio::task::spawn_blocking(move || {
            let data = shared.layout.extract(&raw);
            let outgoing = plan(worker_basis.as_deref(), &data);
            (data, outgoing)
        })
        .await;

        let (data, mut outgoing) = match work {
            Ok(result) => result,
            Err(e) => {
                error!("Navigation parsing task failed: {}", e);
                return;
            }
        };

        let mut state = self.shared.state.lock().await;
        if !state.is_current(generation) {
            debug!("Dropping navigation update from a cancelled pipeline");
            return;
        }
        if !data.is_valid() {
            debug!("Ignoring invalid navigation data");
            return;
        }

        // A resync may have replaced the snapshot while we were parsing
        if !same_snapshot(&state.last_sent, &basis) {
            outgoing = plan(state.last_sent.as_deref(), &data);
        }

        let data = Arc::new(data);
        state.current = Some(Arc::clone(&data));

        let frame = match outgoing {
            Outgoing::Unchanged => {
                trace!("Navigation data unchanged, nothing to send");
                return;
            }
            Outgoing::Snapshot => Frame::snapshot(&data),
            Outgoing::Patch(patch) => Frame::update(patch),
        };

        if state.send(frame) {
            state.last_sent = Some(data);
        }
    }

    async fn check_navigation(&self, id: u64) {
        let mut state = self.shared.state.lock().await;
        if state.connection_id() == Some(id) && state.current.is_none() {
            state.send(Frame::error(ErrorKind::NoNavigationInProgress, "No navigation in progress"));
        }
    }
}

fn upstream_failure(e: UpstreamError) -> Frame {
    match e {
        UpstreamError::NoAccess => Frame::error(ErrorKind::NoNotificationsAccess, e.to_string()),
        UpstreamError::CommandFailed(_) => Frame::error(ErrorKind::Internal, e.to_string()),
    }
}
