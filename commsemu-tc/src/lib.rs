#![cfg_attr(docsrs, feature(doc_cfg))]

//! Linux traffic control for commsemu.
//!
//! An [`ImpairmentProfile`] is turned into [`Directive`]s (one `tc qdisc replace ... netem` per
//! interface) by the [`Applier`], which hands them to a [`Shaper`]. The [`TcShaper`] spawns the
//! `tc` binary; the [`RecordingShaper`] only records what would have been run.

pub mod applier;
pub mod command;
pub mod directive;
pub mod profile;
pub mod setup;
pub mod shaper;

pub use applier::{Applier, ApplyError, ApplyReport, InterfaceOutcome};
pub use directive::{Directive, QdiscDeleteRequest, QdiscNetemRequest, QdiscPrioRequest};
pub use profile::ImpairmentProfile;
pub use shaper::{RecordingShaper, Shaper, TcShaper};
