//! 802.11 capture
//!
//! Device selection, the libpcap session and the background capture engine.

mod device;
mod engine;
mod error;
mod session;

pub use device::{
    can_capture_packets, find_wireless_device, hw_addr_of, select_device, InterfaceProbe,
    NetDevice, PcapProbe,
};
pub use engine::{
    CaptureEngine, EngineControl, EngineState, EngineStats, CONTROL_QUEUE_SIZE, OUTPUT_QUEUE_SIZE,
};
pub use error::CaptureError;
pub use session::{CaptureSession, PacketSource, SessionConfig};
