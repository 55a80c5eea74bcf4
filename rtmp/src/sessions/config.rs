/// The configuration options that govern how each accepted connection behaves
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Write chunk size announced with SetChunkSize once a client connects
    pub chunk_size: u32,

    /// WindowAcknowledgementSize announced once a client connects
    pub window_ack_size: u32,

    /// SetPeerBandwidth (dynamic) announced once a client connects
    pub peer_bandwidth: u32,

    /// `fmsVer` reported in the connect result
    pub fms_version: String,

    /// Socket read size used until the handshake completes
    pub handshake_read_size: usize,

    /// How many socket reads may wait for the consumer before the producer stops reading
    pub inbound_queue_depth: usize,
}

impl ServerConfig {
    /// Creates a new server config with overridable defaults
    pub fn new() -> ServerConfig {
        ServerConfig {
            chunk_size: 4096,
            window_ack_size: 2_500_000,
            peer_bandwidth: 2_500_000,
            fms_version: "FMS/3,0,1,123".to_string(),
            handshake_read_size: 1536,
            inbound_queue_depth: 32,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new()
    }
}
