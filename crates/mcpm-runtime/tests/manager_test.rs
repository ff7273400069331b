//! Integration tests for the server process manager, driven by /bin/sh.
#![cfg(unix)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use mcpm_events::EventFilter;
use mcpm_models::{EventKindTag, ServerId};
use mcpm_rcon::{Packet, PacketType};
use mcpm_runtime::{
    LaunchCommand, ManagerState, RconConfig, Runtime, RuntimeError, ServerConfig,
    ServerProcessManager, ServerRegistry,
};

const LIMIT: Duration = Duration::from_secs(5);

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(LIMIT, future)
        .await
        .expect("timed out")
}

fn sh(name: &str, script: &str) -> ServerConfig {
    ServerConfig::new(name, LaunchCommand::program("/bin/sh", ["-c", script]))
        .with_shutdown_grace(Duration::from_secs(5))
}

fn manager(config: ServerConfig) -> Arc<ServerProcessManager> {
    Arc::new(ServerProcessManager::new(config, &ServerRegistry::new()).unwrap())
}

/// Feeds the manager the line a server prints once RCON is up.
fn announce_rcon(manager: &ServerProcessManager) {
    let event = manager
        .classify("[12:00:00] [Server thread/INFO]: RCON running on 0.0.0.0:25575")
        .unwrap();
    assert_eq!(event.kind_tag(), EventKindTag::RconReady);
    manager.observe(&event);
}

/// Accepts one RCON session, answers every command with its upper-cased
/// body and reports the commands received.
async fn fake_rcon(password: &'static str) -> (u16, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let login = Packet::read_from(&mut socket).await.unwrap();
        let id = if login.body == password { login.id } else { -1 };
        Packet::new(id, PacketType::AUTH_RESPONSE, "")
            .write_to(&mut socket)
            .await
            .unwrap();

        while let Ok(request) = Packet::read_from(&mut socket).await {
            let _ = tx.send(request.body.clone());
            Packet::new(request.id, PacketType::RESPONSE, request.body.to_uppercase())
                .write_to(&mut socket)
                .await
                .unwrap();
        }
    });

    (port, rx)
}

#[tokio::test]
async fn test_concurrent_open_spawns_once() {
    let dir = tempfile::tempdir().unwrap();
    let server = manager(
        sh("lobby", "echo started >> starts.txt; echo up; exec sleep 30").with_work_dir(dir.path()),
    );

    let opens = (0..5).map(|_| {
        let server = Arc::clone(&server);
        async move { server.open().await }
    });
    for result in within(futures::future::join_all(opens)).await {
        result.unwrap();
    }
    assert_eq!(server.state(), ManagerState::Open);

    // The line is printed after the file is appended.
    assert_eq!(within(server.input()).await.line, "up");
    let starts = std::fs::read_to_string(dir.path().join("starts.txt")).unwrap();
    assert_eq!(starts.lines().count(), 1);

    within(server.close()).await.unwrap();
}

#[tokio::test]
async fn test_close_when_closed_is_noop() {
    let server = manager(sh("lobby", "exec sleep 30"));

    within(server.close()).await.unwrap();
    assert_eq!(server.state(), ManagerState::Closed);

    within(server.open()).await.unwrap();
    within(server.close()).await.unwrap();
    within(server.close()).await.unwrap();
    assert_eq!(server.state(), ManagerState::Closed);
}

#[tokio::test]
async fn test_input_merges_stdout_and_stderr() {
    let server = manager(sh("lobby", "echo out; echo err 1>&2; exec sleep 30"));
    within(server.open()).await.unwrap();

    let mut lines = HashSet::new();
    for _ in 0..2 {
        let packet = within(server.input()).await;
        assert_eq!(packet.server_id, ServerId::new("lobby"));
        lines.insert(packet.line);
    }
    assert_eq!(lines, HashSet::from(["out".to_string(), "err".to_string()]));

    within(server.close()).await.unwrap();
}

#[tokio::test]
async fn test_input_waits_while_closed() {
    let server = manager(sh("lobby", "echo hello; exec sleep 30"));

    let waited = tokio::time::timeout(Duration::from_millis(200), server.input()).await;
    assert!(waited.is_err());

    let reader = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.input().await })
    };
    within(server.open()).await.unwrap();
    assert_eq!(within(reader).await.unwrap().line, "hello");

    within(server.close()).await.unwrap();
}

#[tokio::test]
async fn test_reopen_starts_fresh_process() {
    let server = manager(sh("lobby", "echo hello; exec sleep 30"));

    within(server.open()).await.unwrap();
    assert_eq!(within(server.input()).await.line, "hello");
    within(server.close()).await.unwrap();

    within(server.open()).await.unwrap();
    assert_eq!(within(server.input()).await.line, "hello");
    within(server.close()).await.unwrap();
}

#[tokio::test]
async fn test_crlf_and_charset_decoding() {
    // "été" in ISO-8859-1, ended with CRLF.
    let server = manager(
        sh("lobby", r"printf '\351t\351\r\n'; exec sleep 30").with_decoding("latin1"),
    );
    within(server.open()).await.unwrap();

    assert_eq!(within(server.input()).await.line, "été");

    within(server.close()).await.unwrap();
}

#[tokio::test]
async fn test_env_replaces_inherited_environment() {
    let mut env = HashMap::new();
    env.insert("MCPM_GREETING".to_string(), "hi".to_string());
    if let Ok(path) = std::env::var("PATH") {
        env.insert("PATH".to_string(), path);
    }
    let server = manager(
        sh("lobby", r#"echo "$MCPM_GREETING ${HOME:-unset}"; exec sleep 30"#).with_env(env),
    );
    within(server.open()).await.unwrap();

    assert_eq!(within(server.input()).await.line, "hi unset");

    within(server.close()).await.unwrap();
}

#[tokio::test]
async fn test_raw_pipe_commands_wait_for_ready() {
    let server = manager(sh("lobby", "exec cat"));
    within(server.open()).await.unwrap();
    assert!(!server.is_ready());

    for command in ["say one", "say two", "say three"] {
        let echo = within(server.submit(command)).await.unwrap();
        assert!(echo.no_echo);
        assert_eq!(echo.result(), None);
    }

    // Nothing reaches stdin before the ready event.
    let early = tokio::time::timeout(Duration::from_millis(300), server.input()).await;
    assert!(early.is_err());

    announce_rcon(&server);
    assert!(server.is_ready());

    for expected in ["say one", "say two", "say three"] {
        assert_eq!(within(server.input()).await.line, expected);
    }

    within(server.close()).await.unwrap();
    assert!(!server.is_ready());
}

#[tokio::test]
async fn test_ready_event_is_configurable() {
    let server = manager(sh("lobby", "exec cat").with_ready_event(EventKindTag::ServerReady));
    within(server.open()).await.unwrap();
    within(server.submit("list")).await.unwrap();

    announce_rcon(&server);
    assert!(!server.is_ready());

    let done = server
        .classify(r#"[12:00:00] [Server thread/INFO]: Done (3.2s)! For help, type "help""#)
        .unwrap();
    server.observe(&done);
    assert!(server.is_ready());
    assert_eq!(within(server.input()).await.line, "list");

    within(server.close()).await.unwrap();
}

#[tokio::test]
async fn test_rcon_commands_in_order() {
    let (port, mut received) = fake_rcon("secret").await;
    let server = manager(
        sh("lobby", "exec sleep 30").with_rcon(
            RconConfig::new("127.0.0.1")
                .with_port(port)
                .with_password("secret"),
        ),
    );
    within(server.open()).await.unwrap();

    let submitted = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let sends = ["list", "say a", "say b"].map(|c| server.submit(c));
            futures::future::join_all(sends).await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(received.try_recv().is_err());

    announce_rcon(&server);

    let echoes = within(submitted).await.unwrap();
    let contents: Vec<_> = echoes
        .into_iter()
        .map(|echo| echo.unwrap().content)
        .collect();
    assert_eq!(contents, ["LIST", "SAY A", "SAY B"]);

    for expected in ["list", "say a", "say b"] {
        assert_eq!(within(received.recv()).await.unwrap(), expected);
    }

    within(server.close()).await.unwrap();
}

#[tokio::test]
async fn test_close_fails_pending_commands() {
    let server = manager(
        sh("lobby", "exec sleep 30").with_rcon(RconConfig::new("127.0.0.1").with_port(1)),
    );
    within(server.open()).await.unwrap();

    let pending = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.submit("list").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    within(server.close()).await.unwrap();
    let result = within(pending).await.unwrap();
    assert!(matches!(result, Err(RuntimeError::Closed)));
}

#[tokio::test]
async fn test_spawn_failure_leaves_manager_closed() {
    let server = manager(ServerConfig::new(
        "lobby",
        LaunchCommand::program("/nonexistent/mcpm/server", Vec::<String>::new()),
    ));

    for _ in 0..2 {
        let err = within(server.open()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Spawn { .. }));
        assert_eq!(server.state(), ManagerState::Closed);
    }
}

#[tokio::test]
async fn test_exit_code_recorded() {
    let server = manager(sh(
        "lobby",
        "trap 'exit 3' TERM; echo armed; while true; do sleep 0.1; done",
    ));
    within(server.open()).await.unwrap();
    assert_eq!(within(server.input()).await.line, "armed");
    assert_eq!(server.last_exit_code(), None);

    within(server.close()).await.unwrap();
    assert_eq!(server.last_exit_code(), Some(3));
}

#[tokio::test]
async fn test_once_hook_fires_for_own_server() {
    let server = manager(sh("lobby", "exec sleep 30"));
    let hook = server.on_rcon_ready();

    let other = ServerProcessManager::new(sh("other", "exec sleep 30"), &ServerRegistry::new())
        .unwrap();
    let foreign = other
        .classify("[12:00:00] [Server thread/INFO]: RCON running on 0.0.0.0:25575")
        .unwrap();
    server.observe(&foreign);

    announce_rcon(&server);
    let event = within(hook).await.unwrap();
    assert_eq!(event.server_id(), &ServerId::new("lobby"));
}

#[tokio::test]
async fn test_name_released_on_dispose() {
    let registry = ServerRegistry::new();
    let first = ServerProcessManager::new(sh("lobby", "exec sleep 30"), &registry).unwrap();

    let err = ServerProcessManager::new(sh("lobby", "exec sleep 30"), &registry).unwrap_err();
    assert!(matches!(err, RuntimeError::DuplicateName(_)));

    within(first.open()).await.unwrap();
    within(first.close()).await.unwrap();
    assert!(registry.contains(&ServerId::new("lobby")));

    within(first.dispose()).await.unwrap();
    assert!(!registry.contains(&ServerId::new("lobby")));
    assert!(ServerProcessManager::new(sh("lobby", "exec sleep 30"), &registry).is_ok());
}

#[tokio::test]
async fn test_release_with_handles_held() {
    let registry = ServerRegistry::new();
    let first = Arc::new(ServerProcessManager::new(sh("lobby", "exec sleep 30"), &registry).unwrap());
    let held = Arc::clone(&first);

    within(first.open()).await.unwrap();
    within(first.close()).await.unwrap();
    first.release();

    assert!(!held.is_registered());
    assert!(!registry.contains(&ServerId::new("lobby")));
    assert!(matches!(within(held.open()).await, Err(RuntimeError::Closed)));
    assert!(ServerProcessManager::new(sh("lobby", "exec sleep 30"), &registry).is_ok());
}

#[tokio::test]
async fn test_runtime_publishes_chat() {
    let mut runtime = Runtime::new();
    let mut chat = runtime.subscribe_filtered(EventFilter::new().with_kind(EventKindTag::Message));
    runtime
        .add_server(sh(
            "lobby",
            "echo '[12:00:00] [Server thread/INFO]: Starting'; \
             echo '[12:00:01] [Server thread/INFO]: <Steve> hello'; \
             exec sleep 30",
        ))
        .unwrap();

    within(runtime.start()).await.unwrap();

    let event = within(chat.recv()).await.unwrap();
    assert_eq!(event.player_name(), Some("Steve"));
    assert_eq!(event.content(), "<Steve> hello");

    within(runtime.shutdown()).await.unwrap();
    assert!(runtime.registry().is_empty());
}
