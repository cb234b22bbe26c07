use std::time::Duration;

use switchboard_fabric::transport::DEFAULT_MAX_FRAME_LEN;
use switchboard_fabric::DialOptions;

/// Default bound on handler invocations in flight per connection
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

/// Server-side connection settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) max_in_flight: usize,
    pub(crate) max_frame_len: usize,
    pub(crate) read_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }
}

/// Builder for [`ServerConfig`]
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Requests dispatched concurrently on one connection before the
    /// connection stops reading. Values below 1 are raised to 1.
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.config.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Largest frame accepted from or sent to a client
    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.config.max_frame_len = max_frame_len;
        self
    }

    /// Close connections that send nothing for this long
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

/// Client-side connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub(crate) fn dial_options(&self) -> DialOptions {
        DialOptions {
            connect_timeout: self.connect_timeout,
            max_frame_len: self.max_frame_len,
        }
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.config.max_frame_len = max_frame_len;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = ServerConfig::builder()
            .max_in_flight(0)
            .read_timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.max_in_flight(), 1);
        assert_eq!(config.max_frame_len(), DEFAULT_MAX_FRAME_LEN);
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(5)));
    }
}
