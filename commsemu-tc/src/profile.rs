use std::fmt;

/// The impairment currently governing a link.
///
/// Every field maps onto one `netem` parameter. An all-zero profile (the default) adds no delay
/// and no loss, and issues `rate 0mbit`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImpairmentProfile {
    /// Packet loss, in percent (0.0 to 100.0).
    pub drop_percent: f64,
    /// Rate cap in megabits per second.
    pub bandwidth_mbps: f64,
    /// One-way delay added to every packet, in milliseconds.
    pub delay_ms: f64,
}

impl ImpairmentProfile {
    pub const fn new(drop_percent: f64, bandwidth_mbps: f64, delay_ms: f64) -> Self {
        Self { drop_percent, bandwidth_mbps, delay_ms }
    }
}

impl fmt::Display for ImpairmentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delay={}ms loss={}% rate={}mbit", self.delay_ms, self.drop_percent, self.bandwidth_mbps)
    }
}
