/// Topic names used on the message channel
pub struct Topic;

impl Topic {
    /// Availability probe results, one event per probe
    pub const SITE_AVAILABILITY_MONITORING: &'static str = "site-availability-monitoring";
}
