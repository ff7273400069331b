//! Command channels: how commands reach a server.

use async_trait::async_trait;
use encoding_rs::Encoding;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use mcpm_models::ServerId;
use mcpm_rcon::RconClient;

use crate::config::RconConfig;
use crate::error::Result;

/// A connection that carries console commands to a server.
#[async_trait]
pub trait CommandChannel: Send {
    /// Sends one command and returns the server's response text.
    async fn send(&mut self, command: &str) -> Result<String>;

    /// Releases the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Writes commands as lines to the server's standard input.
///
/// Stdin gives no reply, so every response is empty.
pub struct RawPipe<W> {
    writer: W,
    encoding: &'static Encoding,
}

impl<W: AsyncWrite + Unpin + Send> RawPipe<W> {
    pub fn new(writer: W, encoding: &'static Encoding) -> Self {
        Self { writer, encoding }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> CommandChannel for RawPipe<W> {
    async fn send(&mut self, command: &str) -> Result<String> {
        let line = format!("{}\n", command);
        let (bytes, _, unmappable) = self.encoding.encode(&line);
        if unmappable {
            warn!(
                encoding = self.encoding.name(),
                "command has characters the encoding cannot represent"
            );
        }
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(String::new())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Sends commands over an authenticated RCON connection.
pub struct RconLink {
    server: ServerId,
    client: RconClient,
    cmd_timeout: std::time::Duration,
}

impl RconLink {
    /// Connects and authenticates within the configured init timeout.
    pub async fn connect(server: ServerId, config: &RconConfig) -> Result<Self> {
        let client = RconClient::connect(
            &config.host,
            config.port,
            &config.password,
            config.init_timeout,
        )
        .await?;
        info!(server = %server, address = %client.address(), "RCON link established");
        Ok(Self {
            server,
            client,
            cmd_timeout: config.cmd_timeout,
        })
    }
}

#[async_trait]
impl CommandChannel for RconLink {
    async fn send(&mut self, command: &str) -> Result<String> {
        Ok(self.client.send_command(command, self.cmd_timeout).await?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let RconLink { server, client, .. } = *self;
        client.close().await?;
        info!(server = %server, "RCON link closed");
        Ok(())
    }
}
