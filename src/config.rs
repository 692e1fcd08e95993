//! Configuration for WebSocket connections and the server shell.

use std::time::Duration;

/// Configuration applied to every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long to wait for the peer's Close frame after sending ours.
    ///
    /// Default: 5 seconds.
    pub close_wait: Duration,

    /// Maximum size of an HTTP upgrade header in bytes.
    ///
    /// Default: 16 KB (16 * 1024)
    pub max_header_size: usize,

    /// Whether to set `TCP_NODELAY` on sockets.
    ///
    /// Default: true
    pub nodelay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            close_wait: Duration::from_secs(5),
            max_header_size: 16 * 1024,
            nodelay: true,
        }
    }
}

impl Config {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the close handshake wait duration.
    #[must_use]
    pub const fn with_close_wait(mut self, close_wait: Duration) -> Self {
        self.close_wait = close_wait;
        self
    }

    /// Set the maximum HTTP header size.
    #[must_use]
    pub const fn with_max_header_size(mut self, max_header_size: usize) -> Self {
        self.max_header_size = max_header_size;
        self
    }

    /// Set whether `TCP_NODELAY` is applied to sockets.
    #[must_use]
    pub const fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.close_wait, Duration::from_secs(5));
        assert_eq!(config.max_header_size, 16 * 1024);
        assert!(config.nodelay);
    }

    #[test]
    fn test_builder_methods() {
        let config = Config::new()
            .with_close_wait(Duration::from_millis(250))
            .with_max_header_size(4096)
            .with_nodelay(false);
        assert_eq!(config.close_wait, Duration::from_millis(250));
        assert_eq!(config.max_header_size, 4096);
        assert!(!config.nodelay);
    }
}
