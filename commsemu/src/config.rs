//! Runtime configuration: an optional TOML file, overridden by command-line flags.
//!
//! ```toml
//! listen = "127.0.0.1:7447"
//! prefix = "/robot_comms_emu_helper"
//! out_of_range = "clamp"
//! command_timeout_ms = 5000
//! sudo = true
//!
//! [[links]]
//! source = "atlas"
//! target = "bestla"
//! interfaces = ["veth-atlas", "veth-bestla"]
//! ```

use std::{
    collections::HashSet,
    io,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use commsemu_bus::trie::{SEPARATOR, SINGLE_WILDCARD, TAIL_WILDCARD};

use crate::{
    link::{Link, LinkError, DEFAULT_PREFIX},
    policy::InputPolicy,
};

/// Port of the default listen address.
pub const DEFAULT_PORT: u16 = 7447;

/// Default deadline for a single `tc` invocation.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// Why a configuration could not be loaded or validated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("expected 2 (SOURCE TARGET) or 4 (SOURCE SOURCE_IFACE TARGET TARGET_IFACE) link arguments, got {0}")]
    Arity(usize),
    #[error("no links configured")]
    NoLinks,
    #[error("link {name}: {source}")]
    Link { name: String, source: LinkError },
    #[error("link {0} is configured twice")]
    DuplicateLink(String),
    #[error("topic prefix {0:?} contains a wildcard")]
    Prefix(String),
}

/// Result of configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings of a `commsemu run` invocation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the bus listens on for publishers.
    pub listen: SocketAddr,
    /// Topic prefix every link is scoped under.
    pub prefix: String,
    /// Treatment of finite samples outside their valid range.
    pub out_of_range: InputPolicy,
    /// Deadline for a single `tc` invocation. 0 waits forever.
    pub command_timeout_ms: u64,
    /// Run `tc` through `sudo -n`.
    pub sudo: bool,
    /// Log directives instead of running them.
    pub dry_run: bool,
    /// Links to emulate, each with its own coordinator.
    pub links: Vec<LinkConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            prefix: DEFAULT_PREFIX.to_owned(),
            out_of_range: InputPolicy::default(),
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            sudo: true,
            dry_run: false,
            links: Vec::new(),
        }
    }
}

/// One `[[links]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    /// Sending robot.
    pub source: String,
    /// Receiving robot.
    pub target: String,
    /// Interfaces to shape. Derived from the peer names when absent.
    #[serde(default)]
    pub interfaces: Option<Vec<String>>,
}

impl LinkConfig {
    /// Parses `SOURCE TARGET` or `SOURCE SOURCE_IFACE TARGET TARGET_IFACE`.
    pub fn from_positionals<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_owned()).collect();
        match args.as_slice() {
            [source, target] => Ok(Self { source: source.clone(), target: target.clone(), interfaces: None }),
            [source, source_iface, target, target_iface] => Ok(Self {
                source: source.clone(),
                target: target.clone(),
                interfaces: Some(vec![source_iface.clone(), target_iface.clone()]),
            }),
            _ => Err(ConfigError::Arity(args.len())),
        }
    }

    /// Builds the link, deriving interfaces when none are given.
    pub fn to_link(&self) -> Link {
        match &self.interfaces {
            Some(interfaces) => Link::new(&self.source, &self.target, interfaces.clone()),
            None => Link::with_derived_interfaces(&self.source, &self.target),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Link positionals. When present they replace the configured links.
    pub endpoints: Vec<String>,
    pub listen: Option<SocketAddr>,
    pub prefix: Option<String>,
    pub out_of_range: Option<InputPolicy>,
    pub command_timeout_ms: Option<u64>,
    pub no_sudo: bool,
    pub dry_run: bool,
}

impl Config {
    /// Reads and parses the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        Self::from_toml(&contents)
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies command-line overrides on top of the file.
    pub fn apply(&mut self, overrides: Overrides) -> Result<()> {
        if !overrides.endpoints.is_empty() {
            self.links = vec![LinkConfig::from_positionals(overrides.endpoints.as_slice())?];
        }
        if let Some(listen) = overrides.listen {
            self.listen = listen;
        }
        if let Some(prefix) = overrides.prefix {
            self.prefix = prefix;
        }
        if let Some(policy) = overrides.out_of_range {
            self.out_of_range = policy;
        }
        if let Some(ms) = overrides.command_timeout_ms {
            self.command_timeout_ms = ms;
        }
        if overrides.no_sudo {
            self.sudo = false;
        }
        if overrides.dry_run {
            self.dry_run = true;
        }

        Ok(())
    }

    /// The `tc` deadline, or `None` when disabled.
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_ms > 0).then(|| Duration::from_millis(self.command_timeout_ms))
    }

    /// Validates the configuration and builds its links.
    pub fn links(&self) -> Result<Vec<Link>> {
        if self.prefix.split(SEPARATOR).any(|s| s == SINGLE_WILDCARD || s == TAIL_WILDCARD) {
            return Err(ConfigError::Prefix(self.prefix.clone()));
        }
        if self.links.is_empty() {
            return Err(ConfigError::NoLinks);
        }

        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(self.links.len());
        for config in &self.links {
            let link = config.to_link();
            link.validate().map_err(|source| ConfigError::Link { name: link.name(), source })?;
            if !seen.insert(link.name()) {
                return Err(ConfigError::DuplicateLink(link.name()));
            }
            links.push(link);
        }

        Ok(links)
    }
}
