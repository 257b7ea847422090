//! Round statistics.

/// Metrics gathered over one `negotiate_key` round.
///
/// Counters are strictly local: each side counts its own traffic, and the
/// two peers' views of a round differ (the announcer sends more).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Raw pulses pushed through the quantum channel.
    pub pulses: usize,

    /// Sifted bits accumulated (main and test basis together).
    pub sifted_bits: usize,

    /// Observed quantum bit error rate over the test basis.
    pub qber: f64,

    /// Classical messages written to the side channel.
    pub messages_sent: usize,

    /// Classical messages read from the side channel.
    pub messages_received: usize,

    /// Classical bytes written, including framing and MACs.
    pub bytes_sent: usize,

    /// Classical bytes read, including framing and MACs.
    pub bytes_read: usize,
}
