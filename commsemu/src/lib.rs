#![doc = "Emulates link impairments between robot peers: impairment samples arrive on a pub/sub bus and are applied with `tc netem`."]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod coordinator;
pub mod link;
pub mod policy;
pub mod wiring;

pub use config::{Config, ConfigError, LinkConfig, Overrides};
pub use coordinator::{Coordinator, Update};
pub use link::{Dimension, Link, LinkError, DEFAULT_PREFIX};
pub use policy::{InputError, InputPolicy};
pub use wiring::subscribe_link;

pub use commsemu_bus as bus;
pub use commsemu_tc as tc;
pub use commsemu_wire as wire;
