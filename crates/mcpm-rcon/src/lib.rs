//! Minimal Minecraft RCON client.
//!
//! Speaks the Source RCON framing Minecraft uses: little-endian length,
//! request id and type, a NUL-terminated body and one padding byte.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use mcpm_rcon::RconClient;
//!
//! # async fn demo() -> mcpm_rcon::Result<()> {
//! let mut rcon = RconClient::connect("127.0.0.1", 25575, "secret", Duration::from_secs(10)).await?;
//! let players = rcon.send_command("list", Duration::from_secs(5)).await?;
//! println!("{}", players);
//! rcon.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod packet;

pub use client::RconClient;
pub use error::{RconError, Result};
pub use packet::{Packet, PacketType};
