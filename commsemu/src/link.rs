use std::fmt;

use thiserror::Error;

use commsemu_bus::trie::{SEPARATOR, SINGLE_WILDCARD, TAIL_WILDCARD};
use commsemu_tc::{applier::validate_interfaces, ApplyError};

/// Topic prefix every link is scoped under unless configured otherwise.
pub const DEFAULT_PREFIX: &str = "/robot_comms_emu_helper";

/// Longest interface name the kernel accepts (`IFNAMSIZ - 1`).
pub const MAX_INTERFACE_NAME: usize = 15;

/// Prefix of interface names derived from peer names.
pub const DERIVED_INTERFACE_PREFIX: &str = "veth-";

/// One of the independently updated impairment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Packet loss, published as a fraction in `[0, 1]`.
    Drop,
    /// Rate cap in Mbit/s.
    Bandwidth,
    /// Added delay in milliseconds.
    Delay,
}

impl Dimension {
    pub const ALL: [Self; 3] = [Self::Drop, Self::Bandwidth, Self::Delay];

    /// Last topic segment carrying samples for this dimension.
    pub const fn topic_suffix(self) -> &'static str {
        match self {
            Self::Drop => "packet_drop_rate",
            Self::Bandwidth => "bandwidth",
            Self::Delay => "delay",
        }
    }

    /// Inclusive range of accepted sample values.
    pub const fn valid_range(self) -> (f64, f64) {
        match self {
            Self::Drop => (0.0, 1.0),
            Self::Bandwidth | Self::Delay => (0.0, f64::INFINITY),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic_suffix())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("peer name {0:?} is not usable in a topic")]
    InvalidName(String),
    #[error(transparent)]
    Interfaces(#[from] ApplyError),
}

/// A directed source→target link and the interfaces its impairment is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    source: String,
    target: String,
    interfaces: Vec<String>,
}

impl Link {
    /// Creates a link without validating it. See [`Link::validate`].
    pub fn new(source: impl Into<String>, target: impl Into<String>, interfaces: Vec<String>) -> Self {
        Self { source: source.into(), target: target.into(), interfaces }
    }

    /// A link shaping `veth-<source>` and `veth-<target>`.
    pub fn with_derived_interfaces(source: impl Into<String>, target: impl Into<String>) -> Self {
        let (source, target) = (source.into(), target.into());
        let interfaces = vec![derive_interface(&source), derive_interface(&target)];
        Self { source, target, interfaces }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// `<source>_to_<target>`
    pub fn name(&self) -> String {
        format!("{}_to_{}", self.source, self.target)
    }

    /// The topic scope of this link under `prefix`.
    pub fn scope(&self, prefix: &str) -> String {
        format!("{}{SEPARATOR}{}", prefix.trim_end_matches(SEPARATOR), self.name())
    }

    /// The topic carrying samples for `dimension`.
    pub fn topic(&self, prefix: &str, dimension: Dimension) -> String {
        format!("{}{SEPARATOR}{}", self.scope(prefix), dimension.topic_suffix())
    }

    /// Checks that both peer names fit in a topic segment and that the interface set can be
    /// shaped.
    pub fn validate(&self) -> Result<(), LinkError> {
        for name in [&self.source, &self.target] {
            if !is_valid_segment(name) {
                return Err(LinkError::InvalidName(name.clone()));
            }
        }
        validate_interfaces(self.interfaces.as_slice())?;

        Ok(())
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{} [{}]", self.source, self.target, self.interfaces.join(", "))
    }
}

/// `true` if `segment` can appear as a literal topic segment.
pub(crate) fn is_valid_segment(segment: &str) -> bool {
    !segment.trim().is_empty()
        && !segment.contains(SEPARATOR)
        && segment != SINGLE_WILDCARD
        && segment != TAIL_WILDCARD
}

/// `veth-<name>`, cut to the kernel's interface name limit.
pub fn derive_interface(name: &str) -> String {
    let mut interface = format!("{DERIVED_INTERFACE_PREFIX}{name}");
    if interface.len() > MAX_INTERFACE_NAME {
        let mut end = MAX_INTERFACE_NAME;
        while !interface.is_char_boundary(end) {
            end -= 1;
        }
        interface.truncate(end);
    }
    interface
}
