// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon core: one actor task owning the session store, the provider
//! registry, the launcher, and the event fan-out. IPC connection tasks and
//! the polkit bridge post messages in; ordering per session is the arrival
//! order into this loop.

use std::collections::{HashMap, VecDeque};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use nix::fcntl::{Flock, FlockArg};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actor::{
    extract_subject_pid, resolve_requestor, ActorInfo, DesktopIndex, ProcSource, ProcfsSource,
};
use crate::config;
use crate::limits::{HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT};
use crate::polkit::{PolkitCommand, PolkitEvent, PolkitLink};
use crate::protocol::{
    parse_client_line, ClientRequest, ConnId, DaemonEvent, LineError, PinTerminal, ReplyResult,
    RequestError, Requestor, SessionContext, SessionResult, SessionSource,
};
use crate::providers::{self, ProviderLauncher, ProviderManifest};
use crate::registry::ProviderRegistry;
use crate::session::{SessionPhase, SessionStore, SubsystemHandle};

/// Events queued for legacy `next` polling clients; bounded so an idle
/// poller cannot grow the daemon.
const EVENT_QUEUE_LIMIT: usize = 256;

/// Messages posted to the core actor.
#[derive(Debug)]
pub enum CoreMsg {
    Connected { conn: ConnId, tx: mpsc::UnboundedSender<String> },
    Line { conn: ConnId, line: String },
    Disconnected { conn: ConnId },
}

/// Startup options distilled from the CLI configuration.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub socket_path: PathBuf,
    pub system_provider_dir: PathBuf,
    pub default_fallback: Option<PathBuf>,
}

struct Conn {
    tx: mpsc::UnboundedSender<String>,
    subscribed: bool,
}

struct Core {
    sessions: SessionStore,
    registry: ProviderRegistry,
    launcher: ProviderLauncher,
    manifests: Vec<ProviderManifest>,
    conns: HashMap<ConnId, Conn>,
    event_queue: VecDeque<serde_json::Value>,
    polkit_commands: mpsc::Sender<PolkitCommand>,
    procs: Box<dyn ProcSource + Send>,
    desktop: DesktopIndex,
    daemon_uid: u32,
    socket_path: PathBuf,
    default_fallback: Option<PathBuf>,
}

/// Run the daemon: bind the socket, take the instance lock, and drive the
/// core loop until shutdown.
pub async fn run(
    options: DaemonOptions,
    mut polkit: PolkitLink,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let socket_path = options.socket_path.clone();

    let lock_path = crate::paths::lock_path(&socket_path);
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    let _lock = match Flock::lock(lock_file, FlockArg::LockExclusiveNonblock) {
        Ok(lock) => lock,
        Err((_, errno)) => {
            anyhow::bail!("another instance holds {} ({errno})", lock_path.display());
        }
    };

    // The socket file is removed and re-created at every startup.
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)?;
    std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))?;
    info!("IPC listening on {}", socket_path.display());

    let search_dirs = providers::default_search_dirs(&options.system_provider_dir);
    let discovered = providers::discover(&search_dirs);
    for warning in &discovered.warnings {
        warn!("{warning}");
    }
    info!("discovered {} provider manifest(s)", discovered.manifests.len());

    let mut core = Core {
        sessions: SessionStore::new(),
        registry: ProviderRegistry::new(),
        launcher: ProviderLauncher::new(),
        manifests: discovered.manifests,
        conns: HashMap::new(),
        event_queue: VecDeque::new(),
        polkit_commands: polkit.commands.clone(),
        procs: Box::new(ProcfsSource),
        desktop: DesktopIndex::from_standard_locations(),
        daemon_uid: nix::unistd::Uid::current().as_raw(),
        socket_path: socket_path.clone(),
        default_fallback: options.default_fallback.clone(),
    };

    let (core_tx, mut core_rx) = mpsc::channel::<CoreMsg>(256);
    tokio::spawn(crate::ipc::serve(listener, core_tx, shutdown.clone()));

    let mut sweep = tokio::time::interval(HEARTBEAT_INTERVAL);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut polkit_open = true;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            msg = core_rx.recv() => {
                match msg {
                    Some(CoreMsg::Connected { conn, tx }) => {
                        core.conns.insert(conn, Conn { tx, subscribed: false });
                    }
                    Some(CoreMsg::Line { conn, line }) => core.handle_line(conn, &line).await,
                    Some(CoreMsg::Disconnected { conn }) => core.handle_disconnected(conn).await,
                    None => break,
                }
            }

            event = polkit.events.recv(), if polkit_open => {
                match event {
                    Some(event) => core.handle_polkit_event(event).await,
                    // Glue gone; keep serving IPC clients.
                    None => polkit_open = false,
                }
            }

            _ = sweep.tick() => core.sweep().await,
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

impl Core {
    // -- Plumbing --------------------------------------------------------------

    fn send_to(&self, conn: ConnId, event: &DaemonEvent) {
        if let Some(entry) = self.conns.get(&conn) {
            let _ = entry.tx.send(event.to_line());
        }
    }

    /// Fan out a session event to all subscribers and the `next` queue.
    fn broadcast(&mut self, event: &DaemonEvent) {
        if let Ok(value) = serde_json::to_value(event) {
            if self.event_queue.len() >= EVENT_QUEUE_LIMIT {
                self.event_queue.pop_front();
            }
            self.event_queue.push_back(value);
        }
        for entry in self.conns.values().filter(|c| c.subscribed) {
            let _ = entry.tx.send(event.to_line());
        }
    }

    fn apply_election(&mut self) {
        let change = self.registry.recompute_active();
        if !change.changed() {
            return;
        }
        if let Some(previous) = change.previous {
            let id = self.registry.get(previous).map(|p| p.id.clone());
            self.send_to(previous, &DaemonEvent::UiActive { id, active: false });
        }
        if let Some(current) = change.current {
            let id = self.registry.get(current).map(|p| p.id.clone());
            info!(provider = id.as_deref().unwrap_or("?"), "active provider changed");
            self.send_to(current, &DaemonEvent::UiActive { id, active: true });
        }
    }

    async fn check_launch(&mut self, reason: &str) {
        let legacy = config::legacy_fallback_path();
        let outcome = self.launcher.try_launch(
            &self.manifests,
            &self.socket_path,
            reason,
            self.registry.has_active(),
            self.sessions.has_pending(),
            legacy.as_deref(),
            self.default_fallback.as_deref(),
        );
        if outcome.launched {
            info!("{}", outcome.detail);
        } else if outcome.attempted {
            warn!("{}", outcome.detail);
        } else if outcome.detail != "skip: no launch required" {
            debug!("{}", outcome.detail);
        }
    }

    async fn close_session(
        &mut self,
        id: &str,
        result: SessionResult,
        error: Option<String>,
    ) {
        let Some(session) = self.sessions.remove(id) else {
            return;
        };
        let closed = session.to_closed_event(result, error);
        self.broadcast(&closed);

        // Subsystem delivery. Keyring and pinentry replies carry passwords,
        // so those are written by the handlers that hold them; polkit
        // completion always flows through here, exactly once.
        if matches!(session.handle, SubsystemHandle::Polkit) {
            let _ = self
                .polkit_commands
                .send(PolkitCommand::Complete { cookie: session.id.clone() })
                .await;
        }
    }

    fn resolve_actor(&self, details: &HashMap<String, String>) -> ActorInfo {
        let Some(pid) = extract_subject_pid(details) else {
            return ActorInfo::unknown();
        };
        match self.procs.read(pid) {
            Some(subject) => {
                resolve_requestor(&subject, self.daemon_uid, self.procs.as_ref(), &self.desktop)
            }
            None => {
                let mut actor = ActorInfo::unknown();
                actor.proc.pid = pid;
                actor
            }
        }
    }

    // -- IPC dispatch ----------------------------------------------------------

    async fn handle_line(&mut self, conn: ConnId, line: &str) {
        match parse_client_line(line) {
            Ok(request) => self.handle_request(conn, request).await,
            Err(error) => {
                if error == LineError::InvalidJson {
                    debug!(conn, "rejecting unparseable line");
                }
                self.send_to(conn, &DaemonEvent::error_message(error.message()));
            }
        }
    }

    async fn handle_request(&mut self, conn: ConnId, request: ClientRequest) {
        match request {
            ClientRequest::Ping => self.send_to(conn, &DaemonEvent::Pong),

            ClientRequest::Next => {
                let reply = match self.event_queue.pop_front() {
                    Some(value) => {
                        if let Some(entry) = self.conns.get(&conn) {
                            let _ = entry.tx.send(value.to_string());
                        }
                        return;
                    }
                    None => DaemonEvent::Empty,
                };
                self.send_to(conn, &reply);
            }

            ClientRequest::Subscribe => self.handle_subscribe(conn),

            ClientRequest::UiRegister { name, kind, priority } => {
                let provider = self.registry.register(conn, name, kind, priority);
                info!(id = %provider.id, kind = %provider.kind, priority = provider.priority, "provider registered");
                self.apply_election();
                let active = self.registry.active_conn() == Some(conn);
                self.send_to(conn, &DaemonEvent::UiRegistered { id: provider.id, active });
            }

            ClientRequest::UiHeartbeat { id } => {
                let Some(id) = id.filter(|i| !i.is_empty()) else {
                    self.send_to(conn, &DaemonEvent::error_code(RequestError::MissingId));
                    return;
                };
                if self.registry.heartbeat(&id) {
                    self.send_to(conn, &DaemonEvent::Ok);
                } else {
                    self.send_to(conn, &DaemonEvent::error_code(RequestError::UnknownProvider));
                }
            }

            ClientRequest::SessionRespond { id, response } => {
                self.handle_respond(conn, id, response.unwrap_or_default()).await;
            }

            ClientRequest::SessionCancel { id } => self.handle_cancel(conn, id).await,

            ClientRequest::KeyringRequest {
                cookie,
                title,
                message,
                description,
                password_new,
                confirm_only,
            } => {
                self.handle_keyring_request(
                    conn,
                    cookie,
                    title,
                    message,
                    description,
                    password_new,
                    confirm_only,
                )
                .await;
            }

            ClientRequest::PinentryRequest {
                cookie,
                title,
                prompt,
                description,
                repeat,
                keyinfo,
                error,
                confirm_only,
            } => {
                self.handle_pinentry_request(
                    conn,
                    cookie,
                    title,
                    prompt,
                    description,
                    repeat,
                    keyinfo,
                    error,
                    confirm_only,
                )
                .await;
            }

            ClientRequest::PinentryResult { cookie, result, error } => {
                self.handle_pinentry_result(conn, cookie, result, error).await;
            }
        }
    }

    fn handle_subscribe(&mut self, conn: ConnId) {
        let active = self.registry.has_active();
        if let Some(entry) = self.conns.get_mut(&conn) {
            entry.subscribed = true;
        }
        self.send_to(conn, &DaemonEvent::Subscribed { active });

        // Backfill: pending sessions survive provider re-elections, so a
        // fresh subscriber immediately learns about all of them.
        let mut pending: Vec<_> = self.sessions.iter().filter(|s| !s.is_terminal()).collect();
        pending.sort_by_key(|s| s.created_at);
        let events: Vec<DaemonEvent> = pending
            .iter()
            .flat_map(|session| {
                let mut events = vec![session.to_created_event()];
                if session.prompt.is_some() {
                    events.push(session.to_updated_event());
                }
                events
            })
            .collect();
        for event in events {
            self.send_to(conn, &event);
        }
    }

    async fn handle_respond(&mut self, conn: ConnId, id: Option<String>, response: String) {
        let Some(id) = id.filter(|i| !i.is_empty()) else {
            self.send_to(conn, &DaemonEvent::error_code(RequestError::MissingId));
            return;
        };
        if !self.registry.is_authorized(conn) {
            self.send_to(conn, &DaemonEvent::error_message("Not active UI provider"));
            return;
        }

        let Some(session) = self.sessions.get(&id) else {
            self.send_to(conn, &DaemonEvent::error_code(RequestError::InvalidCookie));
            return;
        };
        // One response per prompt cycle.
        if session.phase != SessionPhase::Prompting {
            self.send_to(conn, &DaemonEvent::error_code(RequestError::InvalidCookie));
            return;
        }
        let handle = session.handle;
        let confirm_only = session.context.confirm_only;

        match handle {
            SubsystemHandle::Polkit => {
                self.sessions.update(&id, |s| s.phase = SessionPhase::Awaiting);
                let _ = self
                    .polkit_commands
                    .send(PolkitCommand::SubmitResponse { cookie: id, response })
                    .await;
                self.send_to(conn, &DaemonEvent::Ok);
            }
            SubsystemHandle::Keyring { conn: requester } => {
                let reply = DaemonEvent::KeyringResponse {
                    id: id.clone(),
                    result: if confirm_only { ReplyResult::Confirmed } else { ReplyResult::Ok },
                    password: (!confirm_only).then_some(response),
                };
                self.send_to(conn, &DaemonEvent::Ok);
                self.send_to(requester, &reply);
                self.close_session(&id, SessionResult::Success, None).await;
            }
            SubsystemHandle::Pinentry { conn: Some(requester) } => {
                let reply = DaemonEvent::PinentryResponse {
                    id: id.clone(),
                    result: if confirm_only { ReplyResult::Confirmed } else { ReplyResult::Ok },
                    password: (!confirm_only).then_some(response),
                };
                self.sessions.update(&id, |s| {
                    s.phase = SessionPhase::Awaiting;
                    // The adapter closes its request connection after this
                    // reply; the session itself stays open for the terminal
                    // result.
                    s.handle = SubsystemHandle::Pinentry { conn: None };
                });
                self.send_to(conn, &DaemonEvent::Ok);
                self.send_to(requester, &reply);
            }
            SubsystemHandle::Pinentry { conn: None } => {
                self.send_to(conn, &DaemonEvent::error_code(RequestError::InvalidCookie));
            }
        }
    }

    async fn handle_cancel(&mut self, conn: ConnId, id: Option<String>) {
        let Some(id) = id.filter(|i| !i.is_empty()) else {
            self.send_to(conn, &DaemonEvent::error_code(RequestError::MissingId));
            return;
        };
        if !self.registry.is_authorized(conn) {
            self.send_to(conn, &DaemonEvent::error_message("Not active UI provider"));
            return;
        }
        let Some(session) = self.sessions.get(&id) else {
            self.send_to(conn, &DaemonEvent::error_code(RequestError::InvalidCookie));
            return;
        };
        let handle = session.handle;

        self.send_to(conn, &DaemonEvent::Ok);
        match handle {
            SubsystemHandle::Polkit => {
                let _ =
                    self.polkit_commands.send(PolkitCommand::Cancel { cookie: id.clone() }).await;
            }
            SubsystemHandle::Keyring { conn: requester } => {
                let reply = DaemonEvent::KeyringResponse {
                    id: id.clone(),
                    result: ReplyResult::Cancelled,
                    password: None,
                };
                self.send_to(requester, &reply);
            }
            SubsystemHandle::Pinentry { conn: requester } => {
                if let Some(requester) = requester {
                    let reply = DaemonEvent::PinentryResponse {
                        id: id.clone(),
                        result: ReplyResult::Cancelled,
                        password: None,
                    };
                    self.send_to(requester, &reply);
                }
            }
        }
        self.close_session(&id, SessionResult::Cancelled, None).await;
    }

    async fn handle_keyring_request(
        &mut self,
        conn: ConnId,
        cookie: Option<String>,
        title: Option<String>,
        message: Option<String>,
        description: Option<String>,
        password_new: bool,
        confirm_only: bool,
    ) {
        let Some(cookie) = cookie.filter(|c| !c.is_empty()) else {
            warn!("keyring request missing cookie");
            self.send_to(conn, &DaemonEvent::error_code(RequestError::MissingCookie));
            return;
        };

        let context = SessionContext {
            message: title.unwrap_or_default(),
            description: description.filter(|d| !d.is_empty()),
            confirm_only,
            password_new,
            ..SessionContext::default()
        };

        let prompt = message.unwrap_or_default();
        let events = match self.sessions.create(
            cookie.clone(),
            SessionSource::Keyring,
            context,
            SubsystemHandle::Keyring { conn },
        ) {
            Ok(session) => {
                info!(cookie = %session.id, "keyring request received");
                session.set_prompt(prompt, false);
                (session.to_created_event(), session.to_updated_event())
            }
            Err(_) => {
                self.send_to(conn, &DaemonEvent::error_code(RequestError::DuplicateId));
                return;
            }
        };

        // The reply line for this request is the eventual keyring_response.
        self.broadcast(&events.0);
        self.broadcast(&events.1);
        self.check_launch("keyring-request").await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_pinentry_request(
        &mut self,
        conn: ConnId,
        cookie: Option<String>,
        title: Option<String>,
        prompt: Option<String>,
        description: Option<String>,
        repeat: bool,
        keyinfo: Option<String>,
        error: Option<String>,
        confirm_only: bool,
    ) {
        let Some(cookie) = cookie.filter(|c| !c.is_empty()) else {
            self.send_to(conn, &DaemonEvent::error_code(RequestError::MissingCookie));
            return;
        };
        let prompt = prompt.filter(|p| !p.is_empty()).unwrap_or_else(|| "Passphrase:".to_owned());

        if let Some(session) = self.sessions.get(&cookie) {
            if session.source != SessionSource::Pinentry {
                self.send_to(conn, &DaemonEvent::error_code(RequestError::DuplicateId));
                return;
            }
            // Resume: a retry cycle re-issues the prompt under the same
            // cookie, with the reply socket re-pointed at this connection.
            let updated = {
                let mut event = None;
                self.sessions.update(&cookie, |s| {
                    if let Some(title) = title.as_ref().filter(|t| !t.is_empty()) {
                        s.context.message = title.clone();
                    }
                    s.context.description =
                        description.clone().filter(|d| !d.is_empty()).or(s.context.description.take());
                    s.context.keyinfo = keyinfo.clone().or(s.context.keyinfo.take());
                    s.context.confirm_only = confirm_only;
                    s.handle = SubsystemHandle::Pinentry { conn: Some(conn) };
                    s.set_prompt(prompt.clone(), false);
                    if let Some(error) = error.clone().filter(|e| !e.is_empty()) {
                        s.set_error(error);
                    }
                    event = Some(s.to_updated_event());
                });
                event
            };
            if let Some(event) = updated {
                self.broadcast(&event);
            }
            self.check_launch("pinentry-resume").await;
            return;
        }

        let context = SessionContext {
            message: title.unwrap_or_default(),
            description: description.filter(|d| !d.is_empty()),
            requestor: Requestor { name: "gpg".to_owned(), ..Requestor::default() },
            keyinfo,
            confirm_only,
            password_new: repeat,
            ..SessionContext::default()
        };

        let events = match self.sessions.create(
            cookie.clone(),
            SessionSource::Pinentry,
            context,
            SubsystemHandle::Pinentry { conn: Some(conn) },
        ) {
            Ok(session) => {
                info!(cookie = %session.id, confirm_only, "pinentry request received");
                session.set_prompt(prompt, false);
                if let Some(error) = error.filter(|e| !e.is_empty()) {
                    session.set_error(error);
                }
                (session.to_created_event(), session.to_updated_event())
            }
            Err(_) => {
                self.send_to(conn, &DaemonEvent::error_code(RequestError::DuplicateId));
                return;
            }
        };

        // Deferred reply: the pinentry_response is written when a provider
        // answers the session.
        self.broadcast(&events.0);
        self.broadcast(&events.1);
        self.check_launch("pinentry-request").await;
    }

    async fn handle_pinentry_result(
        &mut self,
        conn: ConnId,
        cookie: Option<String>,
        result: PinTerminal,
        error: Option<String>,
    ) {
        let Some(cookie) = cookie.filter(|c| !c.is_empty()) else {
            self.send_to(conn, &DaemonEvent::error_code(RequestError::MissingCookie));
            return;
        };
        let valid = self
            .sessions
            .get(&cookie)
            .is_some_and(|s| s.source == SessionSource::Pinentry);
        if !valid {
            self.send_to(conn, &DaemonEvent::error_code(RequestError::InvalidCookie));
            return;
        }

        self.send_to(conn, &DaemonEvent::Ok);
        match result {
            PinTerminal::Success => {
                self.close_session(&cookie, SessionResult::Success, None).await;
            }
            PinTerminal::Error => {
                let text = error.unwrap_or_else(|| "Authentication failed".to_owned());
                self.close_session(&cookie, SessionResult::Error, Some(text)).await;
            }
            PinTerminal::Cancelled => {
                self.close_session(&cookie, SessionResult::Cancelled, None).await;
            }
            PinTerminal::Retry => {
                let mut exhausted = false;
                let mut updated = None;
                self.sessions.update(&cookie, |s| {
                    if !s.bump_retry() {
                        exhausted = true;
                        return;
                    }
                    s.set_error(
                        error.clone().unwrap_or_else(|| "Authentication failed".to_owned()),
                    );
                    // The adapter re-issues the prompt with the next
                    // pinentry_request under the same cookie.
                    s.phase = SessionPhase::Awaiting;
                    updated = Some(s.to_updated_event());
                });
                if exhausted {
                    self.close_session(
                        &cookie,
                        SessionResult::Error,
                        Some("Too many failed attempts".to_owned()),
                    )
                    .await;
                } else if let Some(event) = updated {
                    self.broadcast(&event);
                }
            }
        }
    }

    // -- Connection lifecycle --------------------------------------------------

    async fn handle_disconnected(&mut self, conn: ConnId) {
        self.conns.remove(&conn);

        if let Some(provider) = self.registry.unregister_conn(conn) {
            info!(id = %provider.id, "provider disconnected");
            self.apply_election();
            self.check_launch("provider-disconnected").await;
        }

        // Keyring and in-flight pinentry requests die with their socket.
        for id in self.sessions.ids_for_conn(conn) {
            debug!(cookie = %id, "cancelling session for closed subsystem socket");
            self.close_session(&id, SessionResult::Cancelled, None).await;
        }
    }

    // -- Polkit ----------------------------------------------------------------

    async fn handle_polkit_event(&mut self, event: PolkitEvent) {
        match event {
            PolkitEvent::Initiate { cookie, action_id, message, icon, details, user } => {
                let actor = self.resolve_actor(&details);
                let context = SessionContext {
                    message,
                    requestor: actor.to_requestor(),
                    action_id: (!action_id.is_empty()).then_some(action_id),
                    user,
                    icon,
                    ..SessionContext::default()
                };
                match self.sessions.create(
                    cookie.clone(),
                    SessionSource::Polkit,
                    context,
                    SubsystemHandle::Polkit,
                ) {
                    Ok(session) => {
                        info!(cookie = %session.id, "new authentication session");
                        let created = session.to_created_event();
                        self.broadcast(&created);
                        self.check_launch("session-created").await;
                    }
                    Err(duplicate) => {
                        warn!(cookie = %duplicate.0, "rejecting duplicate polkit session");
                        let _ = self
                            .polkit_commands
                            .send(PolkitCommand::InitiateError {
                                cookie,
                                error: "Duplicate session".to_owned(),
                            })
                            .await;
                    }
                }
            }

            PolkitEvent::Prompt { cookie, prompt, echo } => {
                let mut updated = None;
                self.sessions.update(&cookie, |s| {
                    s.set_prompt(prompt.clone(), echo);
                    updated = Some(s.to_updated_event());
                });
                if let Some(event) = updated {
                    self.broadcast(&event);
                    self.check_launch("auth-prompt").await;
                }
            }

            PolkitEvent::ShowError { cookie, text } => {
                let mut updated = None;
                self.sessions.update(&cookie, |s| {
                    s.set_error(text.clone());
                    updated = Some(s.to_updated_event());
                });
                if let Some(event) = updated {
                    self.broadcast(&event);
                }
            }

            PolkitEvent::ShowInfo { cookie, text } => {
                let mut updated = None;
                self.sessions.update(&cookie, |s| {
                    s.set_info(text.clone());
                    updated = Some(s.to_updated_event());
                });
                if let Some(event) = updated {
                    self.broadcast(&event);
                }
            }

            PolkitEvent::Completed { cookie, gained_authorization } => {
                if gained_authorization {
                    self.close_session(&cookie, SessionResult::Success, None).await;
                    return;
                }
                let mut retry_allowed = false;
                let mut updated = None;
                self.sessions.update(&cookie, |s| {
                    s.set_error("Authentication failed");
                    retry_allowed = s.bump_retry();
                    updated = Some(s.to_updated_event());
                });
                let Some(event) = updated else {
                    debug!(cookie = %cookie, "completion for unknown session");
                    return;
                };
                self.broadcast(&event);
                if retry_allowed {
                    let _ = self
                        .polkit_commands
                        .send(PolkitCommand::Reattempt { cookie })
                        .await;
                } else {
                    // Reaching the bound fails the current attempt, not the next.
                    self.close_session(
                        &cookie,
                        SessionResult::Error,
                        Some("Too many failed attempts".to_owned()),
                    )
                    .await;
                }
            }

            PolkitEvent::CancelAll => {
                let ids: Vec<String> = self
                    .sessions
                    .iter()
                    .filter(|s| s.source == SessionSource::Polkit)
                    .map(|s| s.id.clone())
                    .collect();
                info!(count = ids.len(), "cancelling all polkit sessions");
                for id in ids {
                    self.close_session(&id, SessionResult::Cancelled, None).await;
                }
            }
        }
    }

    // -- Timers ----------------------------------------------------------------

    async fn sweep(&mut self) {
        let evicted = self.registry.evict_stale(HEARTBEAT_TIMEOUT.as_millis() as u64);
        if evicted.is_empty() {
            return;
        }
        for provider in &evicted {
            warn!(id = %provider.id, "evicting provider without heartbeat");
        }
        self.apply_election();
        self.check_launch("provider-evicted").await;
    }
}
