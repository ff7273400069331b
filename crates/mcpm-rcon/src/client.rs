//! RCON client connection.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info};

use crate::error::{RconError, Result};
use crate::packet::{Packet, PacketType, MAX_REQUEST_BODY};

/// An authenticated RCON connection.
///
/// Requests are answered in order, one at a time. A response whose id does
/// not match the request in flight (for example the late reply to a
/// command that timed out) is discarded.
#[derive(Debug)]
pub struct RconClient {
    stream: TcpStream,
    address: String,
    next_id: i32,
    /// Bytes read but not yet parsed into a packet. Reading into this
    /// buffer keeps a timed-out read from losing part of a frame.
    pending: Vec<u8>,
}

impl RconClient {
    /// Connects and authenticates.
    ///
    /// `timeout` bounds the TCP connect and the login exchange separately.
    pub async fn connect(host: &str, port: u16, password: &str, timeout: Duration) -> Result<Self> {
        let address = format!("{}:{}", host, port);
        let stream = time::timeout(timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| RconError::Timeout("connect"))?
            .map_err(|source| RconError::Connect {
                address: address.clone(),
                source,
            })?;

        let mut client = Self {
            stream,
            address,
            next_id: 0,
            pending: Vec::new(),
        };
        time::timeout(timeout, client.login(password))
            .await
            .map_err(|_| RconError::Timeout("login"))??;

        info!(address = %client.address, "RCON connected");
        Ok(client)
    }

    /// Address this client is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Runs one command and returns the server's response text.
    pub async fn send_command(&mut self, command: &str, timeout: Duration) -> Result<String> {
        if command.len() > MAX_REQUEST_BODY {
            return Err(RconError::CommandTooLong(command.len()));
        }

        let id = self.next_request_id();
        time::timeout(timeout, self.exchange(id, command))
            .await
            .map_err(|_| RconError::Timeout("command"))?
    }

    /// Shuts the connection down.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        debug!(address = %self.address, "RCON closed");
        Ok(())
    }

    async fn login(&mut self, password: &str) -> Result<()> {
        let id = self.next_request_id();
        Packet::new(id, PacketType::LOGIN, password)
            .write_to(&mut self.stream)
            .await?;

        loop {
            let packet = self.read_packet().await?;
            if packet.id == -1 {
                return Err(RconError::Auth(self.address.clone()));
            }
            if packet.id == id {
                return Ok(());
            }
            debug!(expected = id, got = packet.id, "Discarding unexpected RCON packet during login");
        }
    }

    async fn exchange(&mut self, id: i32, command: &str) -> Result<String> {
        Packet::new(id, PacketType::COMMAND, command)
            .write_to(&mut self.stream)
            .await?;

        loop {
            let packet = self.read_packet().await?;
            if packet.id == id {
                return Ok(packet.body);
            }
            debug!(expected = id, got = packet.id, "Discarding stale RCON response");
        }
    }

    async fn read_packet(&mut self) -> Result<Packet> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(packet) = Packet::parse(&mut self.pending)? {
                return Ok(packet);
            }
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(RconError::Closed);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Positive ids only; -1 signals failed authentication.
    fn next_request_id(&mut self) -> i32 {
        self.next_id = if self.next_id == i32::MAX {
            1
        } else {
            self.next_id + 1
        };
        self.next_id
    }
}
