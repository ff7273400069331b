//! mcpm CLI library.
//!
//! This crate provides the `mcpm` command line: running configured servers
//! with a console, listing them, classifying log files and sending one-off
//! RCON commands.

pub mod cli;
pub mod commands;
