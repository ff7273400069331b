//! Server configuration.
//!
//! A [`ServerConfig`] describes one managed server: how to launch it, where,
//! with which environment, how to talk to it and how to read its output.
//! It is plain data; [`ServerConfig::resolve`] checks it and produces the
//! [`LaunchSpec`] a manager actually runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::Encoding;
use serde::{Deserialize, Deserializer};

use mcpm_models::{EventKindTag, ServerId};
use mcpm_patterns::PatternSet;

use crate::error::{Result, RuntimeError};

/// Default RCON port of a Minecraft server.
pub const DEFAULT_RCON_PORT: u16 = 25575;
/// Charset used when none is configured.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// How the server process is started.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LaunchCommand {
    /// `<java> <jvm_flags> -jar <jar> <postfix_args>`.
    Java {
        java: PathBuf,
        jar: PathBuf,
        #[serde(default, deserialize_with = "words")]
        jvm_flags: Vec<String>,
        #[serde(default, deserialize_with = "words")]
        postfix_args: Vec<String>,
    },
    /// An executable and its arguments.
    Program {
        program: PathBuf,
        #[serde(default, deserialize_with = "words")]
        args: Vec<String>,
    },
    /// A literal command line, split with shell word rules.
    Shell { command: String },
}

impl LaunchCommand {
    pub fn java(java: impl Into<PathBuf>, jar: impl Into<PathBuf>) -> Self {
        LaunchCommand::Java {
            java: java.into(),
            jar: jar.into(),
            jvm_flags: Vec::new(),
            postfix_args: Vec::new(),
        }
    }

    pub fn program<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LaunchCommand::Program {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shell(command: impl Into<String>) -> Self {
        LaunchCommand::Shell {
            command: command.into(),
        }
    }

    /// Sets JVM flags. No effect on non-Java commands.
    pub fn with_jvm_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let LaunchCommand::Java { jvm_flags, .. } = &mut self {
            *jvm_flags = flags.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Sets arguments passed after the jar. No effect on non-Java commands.
    pub fn with_postfix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let LaunchCommand::Java { postfix_args, .. } = &mut self {
            *postfix_args = args.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Resolves the command into a program and its arguments.
    ///
    /// For Java launches the executable and jar must exist.
    pub fn resolve(&self) -> Result<(PathBuf, Vec<String>)> {
        match self {
            LaunchCommand::Java {
                java,
                jar,
                jvm_flags,
                postfix_args,
            } => {
                let java = existing_path(java)?;
                let jar = existing_path(jar)?;
                let mut args = jvm_flags.clone();
                args.push("-jar".to_string());
                args.push(jar.to_string_lossy().into_owned());
                args.extend(postfix_args.iter().cloned());
                Ok((java, args))
            }
            LaunchCommand::Program { program, args } => Ok((expand(program)?, args.clone())),
            LaunchCommand::Shell { command } => {
                let mut words = shlex::split(command)
                    .ok_or_else(|| RuntimeError::InvalidCommand(command.clone()))?
                    .into_iter();
                let program = words
                    .next()
                    .ok_or_else(|| RuntimeError::InvalidCommand(command.clone()))?;
                Ok((expand(Path::new(&program))?, words.collect()))
            }
        }
    }
}

/// RCON connection settings. A server without them is driven through stdin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RconConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Bound on connecting and authenticating.
    #[serde(deserialize_with = "seconds")]
    pub init_timeout: Duration,
    /// Bound on each command.
    #[serde(deserialize_with = "seconds")]
    pub cmd_timeout: Duration,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_RCON_PORT,
            password: String::new(),
            init_timeout: Duration::from_secs(10),
            cmd_timeout: Duration::from_secs(5),
        }
    }
}

impl RconConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn with_cmd_timeout(mut self, timeout: Duration) -> Self {
        self.cmd_timeout = timeout;
        self
    }
}

/// Overrides for the log-line recognizers, as regex source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub line: Option<String>,
    /// Replaces the built-in chat pattern.
    pub message: Option<String>,
    /// Chat patterns tried after the main one.
    pub extra_messages: Vec<String>,
    pub player_name: Option<String>,
    pub player_joined: Option<String>,
    pub player_left: Option<String>,
    pub server_ready: Option<String>,
    pub rcon_ready: Option<String>,
}

impl PatternConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Compiles the overrides on top of the built-in patterns.
    pub fn build(&self) -> Result<PatternSet> {
        if self.is_empty() {
            return Ok(PatternSet::default());
        }

        let mut builder = PatternSet::builder();
        if let Some(p) = &self.line {
            builder = builder.line(p.as_str());
        }
        if let Some(p) = &self.message {
            builder = builder.message(p.as_str());
        }
        for p in &self.extra_messages {
            builder = builder.add_message(p.as_str());
        }
        if let Some(p) = &self.player_name {
            builder = builder.player_name(p.as_str());
        }
        if let Some(p) = &self.player_joined {
            builder = builder.player_joined(p.as_str());
        }
        if let Some(p) = &self.player_left {
            builder = builder.player_left(p.as_str());
        }
        if let Some(p) = &self.server_ready {
            builder = builder.server_ready(p.as_str());
        }
        if let Some(p) = &self.rcon_ready {
            builder = builder.rcon_ready(p.as_str());
        }
        Ok(builder.build()?)
    }
}

/// Configuration for one managed server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Unique server name.
    pub name: ServerId,
    pub launch: LaunchCommand,
    /// Working directory; the current directory if unset.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Replaces the whole child environment when set.
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
    #[serde(default)]
    pub rcon: Option<RconConfig>,
    /// Charset of commands written to stdin.
    #[serde(default = "default_charset")]
    pub encoding: String,
    /// Charset of lines read from stdout/stderr.
    #[serde(default = "default_charset")]
    pub decoding: String,
    /// How long `close` waits after the termination signal before killing.
    #[serde(default = "default_grace", deserialize_with = "seconds")]
    pub shutdown_grace: Duration,
    /// Log every output line at debug level.
    #[serde(default)]
    pub to_console: bool,
    /// Event kind that releases queued commands.
    #[serde(default = "default_ready_event")]
    pub ready_event: EventKindTag,
    #[serde(default)]
    pub patterns: PatternConfig,
}

impl ServerConfig {
    /// Creates a config with default values.
    pub fn new(name: impl Into<ServerId>, launch: LaunchCommand) -> Self {
        Self {
            name: name.into(),
            launch,
            work_dir: None,
            env: None,
            rcon: None,
            encoding: default_charset(),
            decoding: default_charset(),
            shutdown_grace: default_grace(),
            to_console: false,
            ready_event: default_ready_event(),
            patterns: PatternConfig::default(),
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_rcon(mut self, rcon: RconConfig) -> Self {
        self.rcon = Some(rcon);
        self
    }

    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = label.into();
        self
    }

    pub fn with_decoding(mut self, label: impl Into<String>) -> Self {
        self.decoding = label.into();
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_to_console(mut self, to_console: bool) -> Self {
        self.to_console = to_console;
        self
    }

    pub fn with_ready_event(mut self, kind: EventKindTag) -> Self {
        self.ready_event = kind;
        self
    }

    pub fn with_patterns(mut self, patterns: PatternConfig) -> Self {
        self.patterns = patterns;
        self
    }

    /// Checks every setting and resolves paths, charsets and patterns.
    pub fn resolve(&self) -> Result<LaunchSpec> {
        let (program, args) = self.launch.resolve()?;
        let work_dir = match &self.work_dir {
            Some(dir) => existing_path(dir)?,
            None => {
                let cwd = std::env::current_dir().map_err(|source| RuntimeError::InvalidPath {
                    path: PathBuf::from("."),
                    source,
                })?;
                existing_path(&cwd)?
            }
        };

        Ok(LaunchSpec {
            program,
            args,
            work_dir,
            env: self.env.clone(),
            encoder: charset(&self.encoding)?,
            decoder: charset(&self.decoding)?,
            patterns: Arc::new(self.patterns.build()?),
        })
    }
}

/// A checked, ready-to-run server launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub env: Option<HashMap<String, String>>,
    pub encoder: &'static Encoding,
    pub decoder: &'static Encoding,
    pub patterns: Arc<PatternSet>,
}

/// Loads a JSON array of server configs.
pub fn load_servers(path: &Path) -> Result<Vec<ServerConfig>> {
    let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::InvalidPath {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| RuntimeError::Config(format!("{}: {}", path.display(), e)))
}

fn charset(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| RuntimeError::UnknownCharset(label.to_string()))
}

/// Expands `~` and environment variables in a configured path.
fn expand(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    shellexpand::full(&raw)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .map_err(|e| RuntimeError::InvalidPath {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })
}

fn existing_path(path: &Path) -> Result<PathBuf> {
    let expanded = expand(path)?;
    expanded
        .canonicalize()
        .map_err(|source| RuntimeError::InvalidPath {
            path: expanded,
            source,
        })
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

fn default_grace() -> Duration {
    Duration::from_secs(30)
}

fn default_ready_event() -> EventKindTag {
    EventKindTag::RconReady
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

/// Accepts either a list of words or one string split with shell rules.
fn words<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Words {
        One(String),
        Many(Vec<String>),
    }

    match Words::deserialize(deserializer)? {
        Words::Many(words) => Ok(words),
        Words::One(line) => shlex::split(&line)
            .ok_or_else(|| serde::de::Error::custom(format!("unbalanced quotes in {:?}", line))),
    }
}
