//! Capture error types

use thiserror::Error;

use super::engine::EngineState;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to find any wireless devices")]
    NoWirelessDevice,

    #[error("failed to list network devices: {0}")]
    DeviceList(#[source] pcap::Error),

    #[error("cannot use device \"{device}\" to capture packets")]
    UnsupportedDevice { device: String },

    #[error("failed to activate capture on \"{device}\": {source}")]
    Activation {
        device: String,
        #[source]
        source: pcap::Error,
    },

    #[error("invalid filter \"{expression}\": {source}")]
    InvalidFilter {
        expression: String,
        #[source]
        source: pcap::Error,
    },

    #[error("failed to read packet: {0}")]
    Read(#[source] pcap::Error),

    #[error("cannot {operation} while engine is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },

    #[error("engine control channels are closed")]
    Closed,

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("capture thread panicked")]
    WorkerPanicked,
}
