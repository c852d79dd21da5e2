//! Process-wide-looking values grouped into an injectable config struct
//! rather than globals (`spec.md` §9 "Global clock and randomness";
//! `SPEC_FULL.md` §1 "Configuration").

/// Tuning knobs for one [`crate::transport::Transport`] instance. Defaults
/// match the values `spec.md` calls out explicitly: inbound queue depth
/// 5000 (§4.6), max message size 65535 (§4.3), consumer wake 200ms (§5).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bounded inbound queue capacity; overflow drops the newest message
    /// (`spec.md` §4.6 "Inbound queue").
    pub inbound_queue_depth: usize,
    /// `spec.md` §4.3: messages larger than this are rejected with 513.
    pub max_message_size: usize,
    /// `spec.md` §5 "Suspension points": the consumer loop's maximum wait
    /// on an empty queue, so it can still observe shutdown.
    pub consumer_wake_interval: std::time::Duration,
    /// Bypasses the inbound queue and dispatches inline on the channel's
    /// own receive task (`spec.md` §4.6 "stateless mode bypasses the queue
    /// and processes inline").
    pub stateless: bool,
    /// Open new outbound-only channels on demand when no registered
    /// channel can reach a destination (`spec.md` §4.6 step "If no such
    /// channel exists and on-demand creation is enabled...").
    pub allow_on_demand_channels: bool,
    /// The public host to rewrite a single "any"-host Contact to, when set
    /// (`spec.md` §4.6 "Header fixups at send time"). `None` falls back to
    /// the send-from endpoint.
    pub public_contact_host: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            inbound_queue_depth: 5000,
            max_message_size: sip_core::MAX_MESSAGE_SIZE,
            consumer_wake_interval: std::time::Duration::from_millis(200),
            stateless: false,
            allow_on_demand_channels: true,
            public_contact_host: None,
        }
    }
}
