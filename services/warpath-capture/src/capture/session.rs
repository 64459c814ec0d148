//! libpcap capture session
//!
//! Opens the device with an inactive handle, applies snapshot length, read
//! timeout, monitor mode and promiscuous mode, then activates it.

use std::time::Duration;

use pcap::{Active, Capture};
use tracing::{debug, info};

use super::error::CaptureError;
use crate::frame::LinkType;

/// Anything the capture loop can pull raw packets from
pub trait PacketSource: Send + 'static {
    /// Install a BPF filter expression
    fn apply_filter(&mut self, expression: &str) -> Result<(), CaptureError>;

    /// Read the next packet. `Ok(None)` means the read timed out.
    fn next_packet(&mut self) -> Result<Option<Vec<u8>>, CaptureError>;

    /// Link-layer header type of the packets returned
    fn link_type(&self) -> LinkType;
}

/// Capture handle settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Snapshot length in bytes
    pub snaplen: i32,
    /// Read timeout; also bounds how long a stop request can go unnoticed
    pub timeout: Duration,
    /// Request RF monitor mode
    pub rfmon: bool,
    pub promisc: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snaplen: 65535,
            timeout: Duration::from_secs(1),
            rfmon: true,
            promisc: true,
        }
    }
}

/// Activated libpcap handle bound to one device
pub struct CaptureSession {
    device: String,
    capture: Capture<Active>,
    link_type: LinkType,
}

impl CaptureSession {
    /// Create and activate a handle on `device`
    pub fn activate(device: &str, config: &SessionConfig) -> Result<Self, CaptureError> {
        let activation_error = |source: pcap::Error| CaptureError::Activation {
            device: device.to_string(),
            source,
        };

        let timeout_ms = config.timeout.as_millis().min(i32::MAX as u128) as i32;

        let inactive = Capture::from_device(device)
            .map_err(activation_error)?
            .snaplen(config.snaplen)
            .timeout(timeout_ms)
            .promisc(config.promisc);

        #[cfg(not(target_os = "windows"))]
        let inactive = inactive.rfmon(config.rfmon);

        let capture = inactive.open().map_err(activation_error)?;
        let link_type = LinkType::from(capture.get_datalink().0);

        info!(
            "Capture activated on {} (snaplen={}, timeout={}ms, rfmon={}, promisc={})",
            device, config.snaplen, timeout_ms, config.rfmon, config.promisc
        );
        info!("Datalink type: {} ({})", link_type.dlt(), link_type.name());

        Ok(Self {
            device: device.to_string(),
            capture,
            link_type,
        })
    }
}

impl PacketSource for CaptureSession {
    fn apply_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        debug!("Applying BPF filter on {}: {}", self.device, expression);
        self.capture
            .filter(expression, true)
            .map_err(|source| CaptureError::InvalidFilter {
                expression: expression.to_string(),
                source,
            })
    }

    fn next_packet(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Some(packet.data.to_vec())),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(CaptureError::Read(e)),
        }
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }
}
