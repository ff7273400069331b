//! Process manager for one Minecraft server.
//!
//! # Lifecycle
//!
//! `Closed → Opening → Open → Closing → Closed`. [`open`](ServerProcessManager::open)
//! and [`close`](ServerProcessManager::close) are idempotent and serialized by
//! one lock, so concurrent callers converge on a single transition.
//!
//! # Workers
//!
//! Each open starts three tasks:
//! - stdout pump and stderr pump: read lines into one inbound queue
//! - outbound pump: waits for the server to announce readiness, then sends
//!   queued commands one at a time, in submission order
//!
//! Steady-state I/O goes through the queues; the lock only guards
//! transitions.

use std::fmt;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use encoding_rs::Encoding;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mcpm_events::{EventFilter, EventHooks};
use mcpm_models::{
    truncate, ClassifiedEvent, CmdAction, EchoPacket, EventKindTag, InPacket, OutPacket, ServerId,
    DEFAULT_TRUNCATE_LEN,
};
use mcpm_patterns::{classify, ClassifyError, PatternSet};

use crate::channel::{CommandChannel, RawPipe, RconLink};
use crate::config::{LaunchSpec, RconConfig, ServerConfig};
use crate::error::{Result, RuntimeError};
use crate::process;
use crate::registry::{Registration, ServerRegistry};

/// Lifecycle state of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagerState::Closed => "closed",
            ManagerState::Opening => "opening",
            ManagerState::Open => "open",
            ManagerState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// A command waiting for the outbound pump.
struct PendingCommand {
    command: String,
    reply: oneshot::Sender<Result<String>>,
}

/// Queues of one open period. Replaced on every open, dropped on close.
struct Queues {
    inbound: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    outbound: mpsc::UnboundedSender<PendingCommand>,
}

/// What exists only while the server runs.
struct Running {
    child: tokio::process::Child,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

/// Owns one server process and its I/O.
pub struct ServerProcessManager {
    id: ServerId,
    config: ServerConfig,
    launch: LaunchSpec,
    /// Held until the name is released; a released manager cannot reopen.
    registration: StdMutex<Option<Registration>>,
    state: watch::Sender<ManagerState>,
    /// Latched once per open when the ready event is observed.
    ready: watch::Sender<bool>,
    hooks: EventHooks,
    queues: StdMutex<Option<Queues>>,
    running: Mutex<Option<Running>>,
    exit_code: StdMutex<Option<i32>>,
}

impl ServerProcessManager {
    /// Checks the config and claims the server name.
    ///
    /// Fails on any configuration error; the manager starts Closed.
    pub fn new(config: ServerConfig, registry: &ServerRegistry) -> Result<Self> {
        let launch = config.resolve()?;
        let registration = registry.claim(config.name.clone())?;
        let (state, _) = watch::channel(ManagerState::Closed);
        let (ready, _) = watch::channel(false);

        debug!(
            server = %config.name,
            program = %launch.program.display(),
            work_dir = %launch.work_dir.display(),
            "server manager created"
        );

        Ok(Self {
            id: config.name.clone(),
            config,
            launch,
            registration: StdMutex::new(Some(registration)),
            state,
            ready,
            hooks: EventHooks::new(),
            queues: StdMutex::new(None),
            running: Mutex::new(None),
            exit_code: StdMutex::new(None),
        })
    }

    pub fn id(&self) -> &ServerId {
        &self.id
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.launch.patterns
    }

    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ManagerState::Open
    }

    /// Whether queued commands are being sent.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Exit code of the last process run, if it exited with one.
    pub fn last_exit_code(&self) -> Option<i32> {
        *lock(&self.exit_code)
    }

    /// Starts the server process and its workers.
    ///
    /// No-op if already open. On failure the manager stays Closed and the
    /// call may be retried.
    pub async fn open(&self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }
        if !self.is_registered() {
            return Err(RuntimeError::Closed);
        }

        self.state.send_replace(ManagerState::Opening);
        self.ready.send_replace(false);
        if self.config.rcon.is_none() {
            warn!(server = %self.id, "RCON disabled, command responses will always be empty");
        }

        let cancel = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (stdout_tx, stdout_rx) = oneshot::channel::<ChildStdout>();
        let (stderr_tx, stderr_rx) = oneshot::channel::<ChildStderr>();
        let (stdin_tx, stdin_rx) = oneshot::channel::<ChildStdin>();

        // Workers wait for their streams, which exist only once the spawn
        // succeeds. A failed spawn drops the senders and the workers exit.
        let workers = vec![
            tokio::spawn(pump_lines(LinePump {
                server: self.id.clone(),
                stream: "stdout",
                source: stdout_rx,
                decoder: self.launch.decoder,
                inbound: inbound_tx.clone(),
                cancel: cancel.clone(),
                to_console: self.config.to_console,
            })),
            tokio::spawn(pump_lines(LinePump {
                server: self.id.clone(),
                stream: "stderr",
                source: stderr_rx,
                decoder: self.launch.decoder,
                inbound: inbound_tx,
                cancel: cancel.clone(),
                to_console: self.config.to_console,
            })),
            tokio::spawn(pump_commands(CommandPump {
                server: self.id.clone(),
                stdin: stdin_rx,
                rcon: self.config.rcon.clone(),
                encoder: self.launch.encoder,
                ready: self.ready.subscribe(),
                commands: outbound_rx,
                cancel: cancel.clone(),
            })),
        ];

        let mut command = Command::new(&self.launch.program);
        command
            .args(&self.launch.args)
            .current_dir(&self.launch.work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(env) = &self.launch.env {
            command.env_clear().envs(env);
        }

        let spawned = command
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                server: self.id.clone(),
                source,
            })
            .and_then(|mut child| {
                let stdin = child.stdin.take();
                let stdout = child.stdout.take();
                let stderr = child.stderr.take();
                match (stdin, stdout, stderr) {
                    (Some(stdin), Some(stdout), Some(stderr)) => Ok((child, stdin, stdout, stderr)),
                    (stdin, stdout, _) => {
                        let stream = if stdin.is_none() {
                            "stdin"
                        } else if stdout.is_none() {
                            "stdout"
                        } else {
                            "stderr"
                        };
                        // kill_on_drop takes care of the half-started child.
                        Err(RuntimeError::StreamUnavailable {
                            server: self.id.clone(),
                            stream,
                        })
                    }
                }
            });

        let (child, stdin, stdout, stderr) = match spawned {
            Ok(parts) => parts,
            Err(e) => {
                error!(server = %self.id, error = %e, "server failed to start");
                drop((stdout_tx, stderr_tx, stdin_tx));
                cancel.cancel();
                futures::future::join_all(workers).await;
                self.state.send_replace(ManagerState::Closed);
                return Err(e);
            }
        };

        info!(server = %self.id, pid = ?child.id(), "server process started");

        let _ = stdout_tx.send(stdout);
        let _ = stderr_tx.send(stderr);
        let _ = stdin_tx.send(stdin);

        *lock(&self.exit_code) = None;
        *lock(&self.queues) = Some(Queues {
            inbound: Arc::new(Mutex::new(inbound_rx)),
            outbound: outbound_tx,
        });
        *running = Some(Running {
            child,
            cancel,
            workers,
        });
        self.state.send_replace(ManagerState::Open);

        info!(server = %self.id, "server manager running");
        Ok(())
    }

    /// Stops the server process and its workers.
    ///
    /// No-op if already closed. Queued lines and commands are dropped;
    /// callers still waiting in [`output`](Self::output) get
    /// [`RuntimeError::Closed`].
    pub async fn close(&self) -> Result<()> {
        if self.state() == ManagerState::Closed {
            return Ok(());
        }

        let mut running = self.running.lock().await;
        let Some(Running {
            mut child,
            cancel,
            workers,
        }) = running.take()
        else {
            return Ok(());
        };

        self.state.send_replace(ManagerState::Closing);
        info!(server = %self.id, "closing server");

        if let Err(e) = process::terminate(&mut child) {
            warn!(server = %self.id, error = %e, "failed to signal server process");
        }
        cancel.cancel();

        let waited = process::wait_or_kill(&mut child, self.config.shutdown_grace).await;

        for joined in futures::future::join_all(workers).await {
            if let Err(e) = joined {
                error!(server = %self.id, error = %e, "server worker panicked");
            }
        }

        *lock(&self.queues) = None;
        self.ready.send_replace(false);

        let result = match waited {
            Ok(status) => {
                *lock(&self.exit_code) = status.code();
                info!(server = %self.id, exit_code = ?status.code(), %status, "server process exited");
                Ok(())
            }
            Err(e) => {
                error!(server = %self.id, error = %e, "failed to reap server process");
                Err(RuntimeError::Io(e))
            }
        };

        debug!(server = %self.id, "IO queues cleared");
        self.state.send_replace(ManagerState::Closed);
        info!(server = %self.id, "server manager stopped");
        result
    }

    /// Closes the manager and releases its name.
    pub async fn dispose(self) -> Result<()> {
        let closed = self.close().await;
        self.release();
        closed
    }

    /// Releases the server name, even while other handles to the manager
    /// are alive. The manager cannot be opened afterwards.
    pub fn release(&self) {
        if let Some(registration) = lock(&self.registration).take() {
            registration.release();
        }
    }

    /// Whether the manager still owns its name.
    pub fn is_registered(&self) -> bool {
        lock(&self.registration).is_some()
    }

    /// Waits for the next output line of the server.
    ///
    /// Blocks while the manager is not open, and while no line is available.
    pub async fn input(&self) -> InPacket {
        loop {
            self.wait_open().await;
            let inbound = lock(&self.queues).as_ref().map(|q| Arc::clone(&q.inbound));
            let Some(inbound) = inbound else {
                self.wait_not_open().await;
                continue;
            };

            let line = inbound.lock().await.recv().await;
            match line {
                Some(line) if self.is_current(&inbound) => {
                    return InPacket::new(self.id.clone(), line);
                }
                // Left over from a run that has since closed.
                Some(_) => continue,
                // Both output streams ended; nothing more until reopened.
                None => self.wait_not_open().await,
            }
        }
    }

    /// Queues a command and returns its response.
    ///
    /// Waits while the manager is not open. With RCON the call resolves once
    /// the server answered; without it, as soon as the command is queued,
    /// with an empty echo.
    pub async fn output(&self, packet: OutPacket) -> Result<EchoPacket> {
        self.wait_open().await;

        let (reply, response) = oneshot::channel();
        let queued = lock(&self.queues).as_ref().map(|q| {
            q.outbound.send(PendingCommand {
                command: packet.command.clone(),
                reply,
            })
        });
        match queued {
            Some(Ok(())) => {}
            _ => return Err(RuntimeError::Closed),
        }
        debug!(
            server = %self.id,
            packet = %packet.id,
            command = %truncate(&packet.command, DEFAULT_TRUNCATE_LEN),
            "command queued"
        );

        if self.config.rcon.is_none() {
            return Ok(EchoPacket::no_echo(&packet));
        }

        let content = response.await.map_err(|_| RuntimeError::Closed)??;
        debug!(
            server = %self.id,
            packet = %packet.id,
            response = %truncate(&content, DEFAULT_TRUNCATE_LEN),
            "command answered"
        );
        Ok(EchoPacket::response(&packet, content))
    }

    /// Sends a command line.
    pub async fn submit(&self, command: impl Into<String>) -> Result<EchoPacket> {
        self.output(OutPacket::new(command)).await
    }

    /// Sends a command built from an action.
    pub async fn send_action(&self, action: &CmdAction) -> Result<EchoPacket> {
        self.output(OutPacket::from_action(action)).await
    }

    /// Classifies a line with this server's patterns.
    pub fn classify(&self, line: &str) -> std::result::Result<ClassifiedEvent, ClassifyError> {
        classify(&self.id, line, &self.launch.patterns)
    }

    /// Lets the manager react to a classified event of its own output.
    ///
    /// The configured ready event releases queued commands; hooks registered
    /// with [`once`](Self::once) are fired.
    pub fn observe(&self, event: &ClassifiedEvent) {
        if event.server_id() != &self.id {
            return;
        }
        if event.kind_tag() == self.config.ready_event && !self.is_ready() {
            self.ready.send_replace(true);
            info!(server = %self.id, "server ready, dispatching commands");
        }
        self.hooks.fire(event);
    }

    /// Notifies once, on the next event of this server matching `filter`.
    pub fn once(&self, filter: EventFilter) -> oneshot::Receiver<ClassifiedEvent> {
        self.hooks.once(filter.with_server_id(self.id.clone()))
    }

    /// Notifies once, on this server's next RCON ready event.
    pub fn on_rcon_ready(&self) -> oneshot::Receiver<ClassifiedEvent> {
        self.once(EventFilter::new().with_kind(EventKindTag::RconReady))
    }

    async fn wait_open(&self) {
        let mut state = self.state.subscribe();
        // The sender lives in self, so this cannot fail.
        let _ = state.wait_for(|s| *s == ManagerState::Open).await;
    }

    async fn wait_not_open(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s != ManagerState::Open).await;
    }

    fn is_current(&self, inbound: &Arc<Mutex<mpsc::UnboundedReceiver<String>>>) -> bool {
        self.is_open()
            && lock(&self.queues)
                .as_ref()
                .is_some_and(|q| Arc::ptr_eq(&q.inbound, inbound))
    }
}

impl Drop for ServerProcessManager {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut() {
            running.cancel.cancel();
        }
    }
}

impl fmt::Display for ServerProcessManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ServerProcessManager name={}>", self.id)
    }
}

impl fmt::Debug for ServerProcessManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct LinePump<R> {
    server: ServerId,
    stream: &'static str,
    source: oneshot::Receiver<R>,
    decoder: &'static Encoding,
    inbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    to_console: bool,
}

/// Reads lines from one output stream into the inbound queue.
async fn pump_lines<R: AsyncRead + Unpin>(pump: LinePump<R>) {
    let Ok(source) = pump.source.await else {
        return;
    };
    let mut reader = BufReader::new(source);
    let mut buf: Vec<u8> = Vec::with_capacity(1024);

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = pump.cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                let (line, _) = pump.decoder.decode_without_bom_handling(&buf);
                if pump.to_console {
                    debug!(
                        server = %pump.server,
                        stream = pump.stream,
                        "{}",
                        truncate(&line, DEFAULT_TRUNCATE_LEN)
                    );
                }
                if pump.inbound.send(line.into_owned()).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(server = %pump.server, stream = pump.stream, error = %e, "output stream read failed");
                break;
            }
        }
    }

    info!(server = %pump.server, stream = pump.stream, "output pump stopped");
}

struct CommandPump {
    server: ServerId,
    stdin: oneshot::Receiver<ChildStdin>,
    rcon: Option<RconConfig>,
    encoder: &'static Encoding,
    ready: watch::Receiver<bool>,
    commands: mpsc::UnboundedReceiver<PendingCommand>,
    cancel: CancellationToken,
}

/// Sends queued commands once the server is ready.
async fn pump_commands(mut pump: CommandPump) {
    let Ok(stdin) = pump.stdin.await else {
        return;
    };

    tokio::select! {
        _ = pump.cancel.cancelled() => return,
        ready = pump.ready.wait_for(|ready| *ready) => {
            if ready.is_err() {
                return;
            }
        }
    }

    // In RCON mode stdin stays open, unused, for the life of the pump.
    let (mut channel, _stdin): (Box<dyn CommandChannel>, Option<ChildStdin>) = match &pump.rcon {
        Some(rcon) => {
            let connected = tokio::select! {
                _ = pump.cancel.cancelled() => return,
                connected = RconLink::connect(pump.server.clone(), rcon) => connected,
            };
            match connected {
                Ok(link) => (Box::new(link), Some(stdin)),
                Err(e) => {
                    error!(server = %pump.server, error = %e, "RCON connect failed, commands disabled until reopened");
                    return;
                }
            }
        }
        None => (Box::new(RawPipe::new(stdin, pump.encoder)), None),
    };

    loop {
        let pending = tokio::select! {
            _ = pump.cancel.cancelled() => break,
            pending = pump.commands.recv() => match pending {
                Some(pending) => pending,
                None => break,
            },
        };

        let result = tokio::select! {
            _ = pump.cancel.cancelled() => None,
            result = channel.send(&pending.command) => Some(result),
        };
        let Some(result) = result else {
            let _ = pending.reply.send(Err(RuntimeError::Closed));
            break;
        };
        if let Err(e) = &result {
            error!(
                server = %pump.server,
                command = %truncate(&pending.command, DEFAULT_TRUNCATE_LEN),
                error = %e,
                "command failed"
            );
        }
        let _ = pending.reply.send(result);
    }

    if let Err(e) = channel.close().await {
        debug!(server = %pump.server, error = %e, "command channel close failed");
    }
    info!(server = %pump.server, "command pump stopped");
}
