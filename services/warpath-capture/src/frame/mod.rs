//! 802.11 frame decoding
//!
//! 1. Split the captured packet into radiotap and 802.11 layers
//! 2. Estimate transmitter distance from signal strength and channel frequency
//! 3. Build the `CapturedFrame` record handed to consumers

mod captured;
mod distance;
pub mod layers;

pub use captured::{pack, CapturedFrame};
pub use distance::estimate_distance;
pub use layers::LinkType;
