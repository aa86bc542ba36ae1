//! `tc` directives understood by a [`Shaper`](crate::Shaper).
//!
//! Each request renders to the argument list of a single `tc` invocation. The builders mirror
//! the qdisc requests of the kernel API so that a netlink-backed shaper can consume the same
//! values.

use std::fmt;

use crate::profile::ImpairmentProfile;

/// Number of priorities the kernel maps onto prio bands (`TC_PRIO_MAX + 1`).
pub const PRIO_MAP_LEN: usize = 16;
/// Smallest band count accepted by the prio qdisc.
pub const PRIO_MIN_BANDS: u8 = 2;
/// Largest band count accepted by the prio qdisc (`TCQ_PRIO_BANDS`).
pub const PRIO_MAX_BANDS: u8 = 16;
/// Priority map that sends every priority to band 0.
pub const PRIO_MAP_ALL_BAND_ZERO: [u8; PRIO_MAP_LEN] = [0; PRIO_MAP_LEN];

/// `tc qdisc replace dev <interface> root netem delay <D>ms loss <L>% rate <R>mbit`
///
/// Uses `replace`, so issuing the same request twice leaves the interface in the same state.
#[derive(Debug, Clone, PartialEq)]
pub struct QdiscNetemRequest {
    pub interface: String,
    pub profile: ImpairmentProfile,
}

impl QdiscNetemRequest {
    pub fn new(interface: impl Into<String>, profile: ImpairmentProfile) -> Self {
        Self { interface: interface.into(), profile }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "qdisc".into(),
            "replace".into(),
            "dev".into(),
            self.interface.clone(),
            "root".into(),
            "netem".into(),
            "delay".into(),
            format!("{}ms", tc_number(self.profile.delay_ms)),
            "loss".into(),
            format!("{}%", tc_number(self.profile.drop_percent)),
            "rate".into(),
            format!("{}mbit", tc_number(self.profile.bandwidth_mbps)),
        ]
    }
}

/// Renders `value` with at most six decimals and no trailing zeros, so `7.000000000000001`
/// becomes `7`.
fn tc_number(value: f64) -> String {
    let fixed = format!("{value:.6}");
    match fixed.trim_end_matches('0').trim_end_matches('.') {
        "-0" => "0".to_owned(),
        trimmed => trimmed.to_owned(),
    }
}

/// `tc qdisc add dev <interface> root handle 1: prio bands <B> priomap <16 bands>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QdiscPrioRequest<'a> {
    pub interface: &'a str,
    pub bands: u8,
    pub priomap: [u8; PRIO_MAP_LEN],
}

impl<'a> QdiscPrioRequest<'a> {
    /// A prio request with [`PRIO_MIN_BANDS`] bands where everything lands in band 0.
    pub const fn new(interface: &'a str) -> Self {
        Self { interface, bands: PRIO_MIN_BANDS, priomap: PRIO_MAP_ALL_BAND_ZERO }
    }

    pub const fn with_bands(mut self, bands: u8) -> Self {
        self.bands = bands;
        self
    }

    pub const fn with_priomap(mut self, priomap: [u8; PRIO_MAP_LEN]) -> Self {
        self.priomap = priomap;
        self
    }

    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["qdisc", "add", "dev", self.interface, "root", "handle", "1:", "prio"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push("bands".into());
        args.push(self.bands.to_string());
        args.push("priomap".into());
        args.extend(self.priomap.iter().map(u8::to_string));
        args
    }
}

/// `tc qdisc del dev <interface> root`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QdiscDeleteRequest<'a> {
    pub interface: &'a str,
}

impl<'a> QdiscDeleteRequest<'a> {
    pub const fn new(interface: &'a str) -> Self {
        Self { interface }
    }

    pub fn args(&self) -> Vec<String> {
        ["qdisc", "del", "dev", self.interface, "root"].into_iter().map(String::from).collect()
    }
}

/// A single `tc` invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Netem(QdiscNetemRequest),
    Prio { interface: String, bands: u8, priomap: [u8; PRIO_MAP_LEN] },
    Delete { interface: String },
}

impl Directive {
    pub fn interface(&self) -> &str {
        match self {
            Self::Netem(req) => &req.interface,
            Self::Prio { interface, .. } | Self::Delete { interface } => interface,
        }
    }

    /// Arguments passed to `tc`.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Netem(req) => req.args(),
            Self::Prio { interface, bands, priomap } => {
                QdiscPrioRequest::new(interface).with_bands(*bands).with_priomap(*priomap).args()
            }
            Self::Delete { interface } => QdiscDeleteRequest::new(interface).args(),
        }
    }
}

impl From<QdiscNetemRequest> for Directive {
    fn from(value: QdiscNetemRequest) -> Self {
        Self::Netem(value)
    }
}

impl From<QdiscPrioRequest<'_>> for Directive {
    fn from(value: QdiscPrioRequest<'_>) -> Self {
        Self::Prio { interface: value.interface.to_owned(), bands: value.bands, priomap: value.priomap }
    }
}

impl From<QdiscDeleteRequest<'_>> for Directive {
    fn from(value: QdiscDeleteRequest<'_>) -> Self {
        Self::Delete { interface: value.interface.to_owned() }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tc {}", self.args().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netem_replace_args() {
        let req = QdiscNetemRequest::new("vA", ImpairmentProfile::new(10.0, 50.0, 5.0));
        assert_eq!(
            Directive::from(req).to_string(),
            "tc qdisc replace dev vA root netem delay 5ms loss 10% rate 50mbit"
        );
    }

    #[test]
    fn netem_keeps_fractions() {
        let req = QdiscNetemRequest::new("eth0", ImpairmentProfile::new(0.5, 72.0, 2.5));
        let args = req.args();
        assert_eq!(&args[6..], ["delay", "2.5ms", "loss", "0.5%", "rate", "72mbit"]);
    }

    #[test]
    fn netem_hides_float_noise() {
        let req = QdiscNetemRequest::new("eth0", ImpairmentProfile::new(0.07 * 100.0, 0.1 + 0.2, 1.0 / 3.0));
        assert_eq!(&req.args()[6..], ["delay", "0.333333ms", "loss", "7%", "rate", "0.3mbit"]);
    }

    #[test]
    fn zero_profile_still_sets_rate() {
        let req = QdiscNetemRequest::new("eth0", ImpairmentProfile::default());
        assert_eq!(&req.args()[6..], ["delay", "0ms", "loss", "0%", "rate", "0mbit"]);
    }

    #[test]
    fn prio_all_band_zero() {
        let directive = Directive::from(QdiscPrioRequest::new("lo").with_bands(8));
        assert_eq!(
            directive.to_string(),
            "tc qdisc add dev lo root handle 1: prio bands 8 priomap 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0"
        );
        assert_eq!(directive.interface(), "lo");
    }

    #[test]
    fn delete_root() {
        let directive = Directive::from(QdiscDeleteRequest::new("lo"));
        assert_eq!(directive.to_string(), "tc qdisc del dev lo root");
    }
}
