//! Peer server configuration.
//!
//! For now this only configures where the HTTP server listens. Each peer
//! picks a random port from the configured range, so several replicas can
//! share one machine during experiments.

use rand::Rng;

/// Configuration for the peer HTTP server.
#[derive(Clone, Debug)]
pub struct PeerConfig {
    /// Host the server binds to and advertises to other peers.
    pub listen_host: String,
    /// Inclusive lower bound of the port range.
    pub port_min: u16,
    /// Exclusive upper bound of the port range.
    pub port_max: u16,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            port_min: 50000,
            port_max: 60000,
        }
    }
}

impl PeerConfig {
    /// Picks a random port from the configured range.
    pub fn pick_port(&self) -> u16 {
        rand::thread_rng().gen_range(self.port_min..self.port_max)
    }

    /// The public address other peers use to reach this one.
    pub fn public_addr(&self, port: u16) -> String {
        format!("http://{}:{}", self.listen_host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picked_ports_stay_in_range() {
        let cfg = PeerConfig::default();
        for _ in 0..100 {
            let port = cfg.pick_port();
            assert!((cfg.port_min..cfg.port_max).contains(&port));
        }
    }

    #[test]
    fn public_addr_is_an_http_url() {
        let cfg = PeerConfig::default();
        assert_eq!(cfg.public_addr(50001), "http://127.0.0.1:50001");
    }
}
