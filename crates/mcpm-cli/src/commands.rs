//! Command handlers for CLI subcommands.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use mcpm_models::{truncate, ServerId};
use mcpm_patterns::{classify, PatternSet};
use mcpm_rcon::RconClient;
use mcpm_runtime::{load_servers, LaunchCommand, Runtime, ServerConfig};

use crate::cli::{Commands, OutputFormat};

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Execute a CLI command.
pub fn execute(command: Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Run { servers } => cmd_run(config_path, &servers),
        Commands::List { format } => cmd_list(config_path, format),
        Commands::Classify { file, server, json } => {
            cmd_classify(config_path, file.as_deref(), server.as_deref(), json)
        }
        Commands::Rcon {
            host,
            port,
            password,
            timeout,
            command,
        } => cmd_rcon(&host, port, &password, Duration::from_secs(timeout), &command),
    }
}

/// Loads the config file and keeps the named servers, or all if none named.
fn select_servers(config_path: &Path, names: &[String]) -> Result<Vec<ServerConfig>> {
    let configs = load_servers(config_path)?;
    if names.is_empty() {
        return Ok(configs);
    }

    names
        .iter()
        .map(|name| {
            configs
                .iter()
                .find(|c| c.name.as_str() == name)
                .cloned()
                .ok_or_else(|| format!("Server not configured: {}", name).into())
        })
        .collect()
}

fn cmd_run(config_path: &Path, names: &[String]) -> Result<()> {
    let configs = select_servers(config_path, names)?;
    if configs.is_empty() {
        return Err(format!("No servers configured in {}", config_path.display()).into());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_servers(configs))
}

async fn run_servers(configs: Vec<ServerConfig>) -> Result<()> {
    let mut runtime = Runtime::new();
    let mut events = runtime.subscribe();

    let default_server = configs[0].name.clone();
    for config in configs {
        runtime.add_server(config)?;
    }

    if let Err(e) = runtime.start().await {
        warn!(error = %e, "not every server started");
        eprintln!("Warning: {}", e);
    }
    println!(
        "Running {} server(s). Type commands, '@<server> <command>' to pick a server, Ctrl-C to stop.",
        runtime.servers().len()
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => println!("[{}] {}", event.server_id(), event.text()),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let Some((server, command)) = parse_target(&line, &default_server) else {
                        continue;
                    };
                    match runtime.manager(&server) {
                        Ok(manager) => {
                            let manager = manager.clone();
                            tokio::spawn(async move {
                                match manager.submit(command).await {
                                    Ok(echo) => {
                                        if let Some(result) = echo.result() {
                                            println!("[{}] > {}", manager.id(), result);
                                        }
                                    }
                                    Err(e) => eprintln!("[{}] Error: {}", manager.id(), e),
                                }
                            });
                        }
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    stdin_open = false;
                }
            },
        }
    }

    println!("Stopping servers...");
    runtime.shutdown().await?;
    Ok(())
}

/// Splits a console line into its target server and command.
///
/// `@name command` targets `name`; anything else targets `default`.
/// Blank lines yield nothing.
fn parse_target(line: &str, default: &ServerId) -> Option<(ServerId, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match line.strip_prefix('@') {
        Some(rest) => {
            let (name, command) = rest.split_once(char::is_whitespace)?;
            let command = command.trim();
            if name.is_empty() || command.is_empty() {
                return None;
            }
            Some((ServerId::new(name), command.to_string()))
        }
        None => Some((default.clone(), line.to_string())),
    }
}

fn cmd_list(config_path: &Path, format: OutputFormat) -> Result<()> {
    let configs = load_servers(config_path)?;

    match format {
        OutputFormat::Table => {
            if configs.is_empty() {
                println!("No servers configured.");
                return Ok(());
            }

            println!("{:<16}  {:<24}  {:<32}  WORK DIR", "NAME", "CHANNEL", "LAUNCH");
            println!("{}", "-".repeat(90));
            for config in &configs {
                println!(
                    "{:<16}  {:<24}  {:<32}  {}",
                    truncate(config.name.as_str(), 16),
                    channel_summary(config),
                    truncate(&launch_summary(&config.launch), 32),
                    config
                        .work_dir
                        .as_deref()
                        .map(|d| d.display().to_string())
                        .unwrap_or_else(|| ".".to_string())
                );
            }
            println!("\n{} server(s)", configs.len());
        }
        OutputFormat::Brief => {
            for config in &configs {
                println!("{}\t{}", config.name, channel_summary(config));
            }
        }
    }

    Ok(())
}

fn channel_summary(config: &ServerConfig) -> String {
    match &config.rcon {
        Some(rcon) => format!("rcon {}:{}", rcon.host, rcon.port),
        None => "stdin".to_string(),
    }
}

fn launch_summary(launch: &LaunchCommand) -> String {
    match launch {
        LaunchCommand::Java { java, jar, .. } => {
            format!("{} -jar {}", java.display(), jar.display())
        }
        LaunchCommand::Program { program, args } => {
            let mut words = vec![program.display().to_string()];
            words.extend(args.iter().cloned());
            words.join(" ")
        }
        LaunchCommand::Shell { command } => command.clone(),
    }
}

fn cmd_classify(
    config_path: &Path,
    file: Option<&Path>,
    server: Option<&str>,
    json: bool,
) -> Result<()> {
    let patterns = match server {
        Some(name) => {
            let config = select_servers(config_path, &[name.to_string()])?.remove(0);
            config.patterns.build()?
        }
        None => PatternSet::default(),
    };
    let server_id = ServerId::new(server.unwrap_or_else(|| source_name(file)));

    let reader: Box<dyn BufRead> = match file {
        Some(path) => Box::new(BufReader::new(File::open(path).map_err(|e| {
            format!("Cannot open {}: {}", path.display(), e)
        })?)),
        None => Box::new(io::stdin().lock()),
    };

    let stdout = io::stdout();
    let count = classify_lines(reader, &mut stdout.lock(), &server_id, &patterns, json)?;
    info!(lines = count, "classification finished");
    Ok(())
}

fn source_name(file: Option<&Path>) -> &str {
    file.and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("stdin")
}

/// Classifies every line of `reader`, writing one result per line.
///
/// Lines that fail classification are reported on stderr and skipped.
fn classify_lines<R: BufRead, W: Write>(
    reader: R,
    out: &mut W,
    server_id: &ServerId,
    patterns: &PatternSet,
    json: bool,
) -> Result<usize> {
    let mut count = 0;
    for line in reader.lines() {
        let line = line?;
        match classify(server_id, &line, patterns) {
            Ok(event) => {
                if json {
                    writeln!(out, "{}", serde_json::to_string(&event)?)?;
                } else {
                    writeln!(
                        out,
                        "{:<14}  {}",
                        format!("{:?}", event.kind_tag()),
                        event.summary()
                    )?;
                }
                count += 1;
            }
            Err(e) => eprintln!("Skipped: {}", e),
        }
    }
    Ok(count)
}

fn cmd_rcon(host: &str, port: u16, password: &str, timeout: Duration, command: &[String]) -> Result<()> {
    let command = command.join(" ");
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut client = RconClient::connect(host, port, password, timeout).await?;
        let response = client.send_command(&command, timeout).await?;
        if !response.is_empty() {
            println!("{}", response);
        }
        client.close().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const SERVERS: &str = r#"[
        {"name": "lobby", "launch": {"type": "program", "program": "/bin/sh", "args": "-c 'exec cat'"}},
        {"name": "survival",
         "launch": {"type": "shell", "command": "java -jar server.jar nogui"},
         "rcon": {"port": 25580, "password": "pw"},
         "patterns": {"extra_messages": ["\\[(?P<name>[^\\]]+)\\] (?P<message>.*)"]}}
    ]"#;

    fn write_config() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, SERVERS).unwrap();
        (dir, path)
    }

    #[test]
    fn test_parse_target() {
        let default = ServerId::new("lobby");
        assert_eq!(
            parse_target("list", &default),
            Some((default.clone(), "list".to_string()))
        );
        assert_eq!(
            parse_target("@survival  say hi ", &default),
            Some((ServerId::new("survival"), "say hi".to_string()))
        );
        assert_eq!(parse_target("   ", &default), None);
        assert_eq!(parse_target("@survival", &default), None);
    }

    #[test]
    fn test_select_servers() {
        let (_dir, path) = write_config();
        assert_eq!(select_servers(&path, &[]).unwrap().len(), 2);

        let picked = select_servers(&path, &["survival".to_string()]).unwrap();
        assert_eq!(picked[0].name, ServerId::new("survival"));
        assert_eq!(picked[0].rcon.as_ref().unwrap().port, 25580);

        assert!(select_servers(&path, &["creative".to_string()]).is_err());
    }

    #[test]
    fn test_cmd_list() {
        let (_dir, path) = write_config();
        cmd_list(&path, OutputFormat::Table).unwrap();
        cmd_list(&path, OutputFormat::Brief).unwrap();
    }

    #[test]
    fn test_launch_summary() {
        let (_dir, path) = write_config();
        let configs = load_servers(&path).unwrap();
        assert_eq!(launch_summary(&configs[0].launch), "/bin/sh -c exec cat");
        assert_eq!(launch_summary(&configs[1].launch), "java -jar server.jar nogui");
        assert_eq!(channel_summary(&configs[0]), "stdin");
        assert_eq!(channel_summary(&configs[1]), "rcon 127.0.0.1:25580");
    }

    #[test]
    fn test_classify_lines_text() {
        let input = "[10:00:00] [Server thread/INFO]: <Steve> hello\n\
                     [10:00:01] [Server thread/INFO]: <x> bad name\n\
                     random output\n";
        let mut out = Vec::new();
        let count = classify_lines(
            Cursor::new(input),
            &mut out,
            &ServerId::new("lobby"),
            &PatternSet::default(),
            false,
        )
        .unwrap();

        assert_eq!(count, 2);
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert!(lines[0].starts_with("Message"));
        assert!(lines[0].ends_with("hello"));
        assert!(lines[1].starts_with("Log"));
        assert!(lines[1].ends_with("random output"));
    }

    #[test]
    fn test_classify_lines_json() {
        let mut out = Vec::new();
        classify_lines(
            Cursor::new("[10:00:00] [Server thread/INFO]: Steve left the game\n"),
            &mut out,
            &ServerId::new("lobby"),
            &PatternSet::default(),
            true,
        )
        .unwrap();

        let event: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(event["server_id"], "lobby");
    }

    #[test]
    fn test_classify_with_server_patterns() {
        let (_dir, path) = write_config();
        let config = select_servers(&path, &["survival".to_string()])
            .unwrap()
            .remove(0);
        let patterns = config.patterns.build().unwrap();

        let mut out = Vec::new();
        classify_lines(
            Cursor::new("[10:00:00] [Server thread/INFO]: [Steve] hi there\n"),
            &mut out,
            &ServerId::new("survival"),
            &patterns,
            false,
        )
        .unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("Message"));
    }

    #[test]
    fn test_source_name() {
        assert_eq!(source_name(Some(Path::new("/var/log/latest.log"))), "latest");
        assert_eq!(source_name(None), "stdin");
    }
}
