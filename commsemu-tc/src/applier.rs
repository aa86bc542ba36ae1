use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    command,
    directive::{Directive, QdiscNetemRequest},
    profile::ImpairmentProfile,
    shaper::Shaper,
};

/// Most interfaces a single link may shape.
pub const MAX_INTERFACES: usize = 2;

/// The apply call was refused before any directive was issued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("no interfaces to shape")]
    NoInterfaces,
    #[error("interface #{index} has an empty name")]
    EmptyInterface { index: usize },
    #[error("{0} interfaces given, at most {max} are supported", max = MAX_INTERFACES)]
    TooManyInterfaces(usize),
}

/// Checks the interface set a profile is about to be applied to.
pub fn validate_interfaces<S: AsRef<str>>(interfaces: &[S]) -> Result<(), ApplyError> {
    if interfaces.is_empty() {
        return Err(ApplyError::NoInterfaces);
    }
    if interfaces.len() > MAX_INTERFACES {
        return Err(ApplyError::TooManyInterfaces(interfaces.len()));
    }
    if let Some(index) = interfaces.iter().position(|i| i.as_ref().trim().is_empty()) {
        return Err(ApplyError::EmptyInterface { index });
    }

    Ok(())
}

/// The result of shaping one interface.
#[derive(Debug)]
pub struct InterfaceOutcome {
    pub interface: String,
    pub result: command::Result<()>,
}

/// Per-interface results of a single apply.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub profile: ImpairmentProfile,
    pub outcomes: Vec<InterfaceOutcome>,
}

impl ApplyReport {
    /// `true` if every interface accepted its directive.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Outcomes of the interfaces that rejected their directive.
    pub fn failures(&self) -> impl Iterator<Item = &InterfaceOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// The outcome for `interface`, if it was part of the apply.
    pub fn outcome(&self, interface: &str) -> Option<&InterfaceOutcome> {
        self.outcomes.iter().find(|o| o.interface == interface)
    }
}

/// Translates an [`ImpairmentProfile`] into one netem directive per interface.
#[derive(Debug, Clone)]
pub struct Applier<S> {
    shaper: S,
}

impl<S: Shaper> Applier<S> {
    pub const fn new(shaper: S) -> Self {
        Self { shaper }
    }

    /// Shapes every interface to match `profile`.
    ///
    /// Interfaces are attempted in order, and a failure on one does not stop the next. Nothing
    /// is issued if the interface set itself is invalid.
    pub async fn apply<I: AsRef<str>>(
        &self,
        profile: &ImpairmentProfile,
        interfaces: &[I],
    ) -> Result<ApplyReport, ApplyError> {
        validate_interfaces(interfaces)?;

        let mut report = ApplyReport { profile: *profile, outcomes: Vec::with_capacity(interfaces.len()) };
        for interface in interfaces {
            let interface = interface.as_ref();
            let directive: Directive = QdiscNetemRequest::new(interface, *profile).into();

            let result = self.shaper.execute(&directive).await;
            match &result {
                Ok(()) => debug!(%directive, "directive applied"),
                Err(e) => warn!(%directive, err = %e, "directive failed"),
            }

            report.outcomes.push(InterfaceOutcome { interface: interface.to_owned(), result });
        }

        Ok(report)
    }
}
