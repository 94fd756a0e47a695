/// Per-connection protocol and buffering parameters.
///
/// Both sides of a connection must agree on the data registry, but the
/// buffer sizing here is local: a server typically runs a much larger
/// remote-received budget than a client.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Scratch buffer size for assembling one outbound batch. A batch that
    /// outgrows it fails to send with a capacity error.
    pub send_buffer_size: usize,
    /// Largest inbound frame payload the transport will accept.
    pub receive_buffer_size: usize,
    /// Byte budget for inbound frames queued behind the simulation thread.
    pub max_receive_queue_size: usize,
    /// Byte budget for sent batches retained while awaiting acknowledgment.
    pub max_remote_received_queue_size: usize,
    /// Minimum milliseconds between latency probes.
    pub ping_interval_ms: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: 10_000,
            receive_buffer_size: 10_000,
            max_receive_queue_size: 50_000,
            max_remote_received_queue_size: 500_000,
            ping_interval_ms: 5_000,
        }
    }
}
