//! Configuration for framelink endpoints

use crate::error::{NetError, Result};
use std::time::Duration;

/// Default cap on the payload length encoded in the frame header.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;

/// Default per-connection receive timeout used by the service server.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-connection send timeout used by the service server.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoint configuration builder.
///
/// `max_message_size` bounds the payload length a frame header may announce;
/// the receive buffers of the service client, service server and datagram
/// receiver are sized `max_message_size + HEADER_SIZE`. The two timeouts
/// apply to the server side of a service (per-connection receive and send);
/// client calls and datagram operations take their timeout per call.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Maximum payload bytes per frame
    pub max_message_size: usize,
    /// Server-side timeout for receiving a request on an accepted connection
    pub receive_timeout: Duration,
    /// Server-side timeout for sending the response
    pub send_timeout: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

impl NetConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum payload size in bytes
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the server-side receive timeout
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the server-side send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 || self.max_message_size > u32::MAX as usize {
            return Err(NetError::InvalidFrame);
        }

        if self.receive_timeout.is_zero() || self.send_timeout.is_zero() {
            return Err(NetError::failed());
        }

        Ok(())
    }
}
