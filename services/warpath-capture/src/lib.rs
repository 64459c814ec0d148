//! Warpath capture engine
//!
//! Puts a wireless interface into monitor mode, filters management frames,
//! decodes each one into a [`frame::CapturedFrame`] with an estimated
//! transmitter distance, and streams the records to a consumer.

pub mod capture;
pub mod config;
pub mod filter;
pub mod frame;
pub mod hwaddr;
pub mod logging;
pub mod sink;
