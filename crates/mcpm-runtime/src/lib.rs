//! Server process management for mcpm.
//!
//! This crate runs Minecraft-style server processes and moves their I/O:
//! - `ServerProcessManager` - spawns one server, merges its stdout and stderr
//!   into one inbound queue, and sends queued commands over stdin or RCON
//!   once the server is ready
//! - `Dispatcher` - classifies a manager's output and publishes the events
//! - `Runtime` - main entry point combining managers, dispatchers and an
//!   event bus
//!
//! # Example
//!
//! ```no_run
//! use mcpm_runtime::{LaunchCommand, RconConfig, Runtime, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runtime = Runtime::new();
//!     let mut events = runtime.subscribe();
//!
//!     let config = ServerConfig::new(
//!         "survival",
//!         LaunchCommand::java("/usr/bin/java", "server.jar").with_postfix_args(["nogui"]),
//!     )
//!     .with_work_dir("/srv/survival")
//!     .with_rcon(RconConfig::new("127.0.0.1").with_password("secret"));
//!     let server = runtime.add_server(config)?;
//!
//!     runtime.start().await?;
//!
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}", event.summary());
//!         }
//!     });
//!
//!     // Held until the server has started RCON.
//!     let echo = server.submit("list").await?;
//!     println!("{}", echo.content);
//!
//!     tokio::signal::ctrl_c().await?;
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Key Concepts
//!
//! ## Readiness gate
//!
//! Commands submitted before the server announces it is ready are queued,
//! not lost. The announcement is the configured ready event (RCON ready by
//! default), observed on the server's own classified output.
//!
//! ## Shutdown
//!
//! Closing a server sends SIGTERM, then kills it if it is still alive after
//! the shutdown grace period.

pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod process;
pub mod registry;
pub mod runtime;

pub use channel::{CommandChannel, RawPipe, RconLink};
pub use config::{
    load_servers, LaunchCommand, LaunchSpec, PatternConfig, RconConfig, ServerConfig,
    DEFAULT_CHARSET, DEFAULT_RCON_PORT,
};
pub use dispatch::Dispatcher;
pub use error::{Result, RuntimeError};
pub use manager::{ManagerState, ServerProcessManager};
pub use registry::{Registration, ServerRegistry};
pub use runtime::Runtime;
