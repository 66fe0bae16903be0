use std::fmt;

/// A proxy entry configured on the router, reconstructed from the
/// node-listing page. `latency_ms` and `offline` stay at their zero
/// values until the node has been probed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyNode {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: String,
    pub latency_ms: u64,
    pub offline: bool,
}

impl fmt::Display for ProxyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "(unnamed)" } else { &self.name };
        if self.offline {
            write!(f, "{} {}:{} - offline", name, self.host, self.port)
        } else if self.latency_ms > 0 {
            write!(f, "{} {}:{} - {}ms", name, self.host, self.port, self.latency_ms)
        } else {
            write!(f, "{} {}:{}", name, self.host, self.port)
        }
    }
}
