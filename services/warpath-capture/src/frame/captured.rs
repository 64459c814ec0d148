//! Decoded frame record

use serde::{Serialize, Serializer};

use super::distance::estimate_distance;
use super::layers::{decompose, LinkType, PacketLayers};

/// One decoded 802.11 observation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapturedFrame {
    /// Frame subtype label ("beacon", "probe-req", ...); empty without an 802.11 layer
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Reserved, never populated by the capture engine
    pub latitude: f64,
    /// Reserved, never populated by the capture engine
    pub longitude: f64,
    /// Estimated distance to the transmitter in meters, 0 when unknown
    pub distance: f64,
    /// Capture time, seconds since the Unix epoch
    pub timestamp: i64,
    /// Address 2 packed big-endian, 0 when absent
    pub source: u64,
    /// Raw captured bytes
    #[serde(serialize_with = "serialize_hex")]
    pub data: Vec<u8>,
}

impl CapturedFrame {
    /// Decode a raw packet captured on a handle with the given link type
    pub fn decode(data: &[u8], link_type: LinkType) -> Self {
        let layers = decompose(data, link_type);
        Self::from_layers(data, &layers)
    }

    /// Build a frame from an already decomposed packet.
    ///
    /// Missing layers leave the corresponding fields at their defaults.
    pub fn from_layers(data: &[u8], layers: &PacketLayers) -> Self {
        let mut frame = CapturedFrame::default();

        if let Some((signal, freq)) = layers.radio.and_then(|r| r.signal_and_frequency()) {
            frame.distance = estimate_distance(signal_dbm(signal) as f64, freq as f64);
        }

        if let Some(dot11) = &layers.dot11 {
            frame.frame_type = dot11.label().to_string();
            frame.source = dot11.address2.map(|addr| pack(&addr)).unwrap_or(0);
        }

        frame.timestamp = chrono::Utc::now().timestamp();
        frame.data = data.to_vec();
        frame
    }
}

/// Map the signed antenna signal byte to dBm.
///
/// Signed values of 127 or more wrap to `value - 255`; only 127 itself
/// qualifies, becoming -128.
fn signal_dbm(raw: i8) -> i32 {
    let value = raw as i32;
    if value >= 127 {
        value - 255
    } else {
        value
    }
}

/// Pack up to 8 bytes into a big-endian u64.
///
/// Empty input or more than 8 bytes yields 0.
pub fn pack(bytes: &[u8]) -> u64 {
    if bytes.is_empty() || bytes.len() > 8 {
        return 0;
    }
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn serialize_hex<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::distance::estimate_distance;

    const RADIOTAP_HEX: &str = "00000f002e00000000026c09a000c7";
    const BEACON_HEX: &str = "80000000ffffffffffff1122deadbeef1122deadbeef1000";
    const PROBE_REQ_HEX: &str = "40000000ffffffffffff020000000001ffffffffffff2000";

    #[test]
    fn test_pack_eight_bytes() {
        let bytes = [0x87, 0x65, 0x43, 0x21, 0x87, 0x65, 0x43, 0x21];
        assert_eq!(pack(&bytes), 0x8765432187654321);
    }

    #[test]
    fn test_pack_short_inputs() {
        assert_eq!(pack(&[0xAB]), 0xAB);
        assert_eq!(pack(&[0x11, 0x22, 0xDE, 0xAD, 0xBE, 0xEF]), 0x1122DEADBEEF);
    }

    #[test]
    fn test_pack_rejects_empty_and_oversized() {
        assert_eq!(pack(&[]), 0);
        assert_eq!(pack(&[0xFF; 9]), 0);
    }

    #[test]
    fn test_signal_is_signed() {
        assert_eq!(signal_dbm(127), -128);
        assert_eq!(signal_dbm(-57), -57);
        assert_eq!(signal_dbm(-1), -1);
        assert_eq!(signal_dbm(-128), -128);
        assert_eq!(signal_dbm(40), 40);
    }

    #[test]
    fn test_decode_radiotap_beacon() {
        let mut data = hex::decode(RADIOTAP_HEX).unwrap();
        data.extend(hex::decode(BEACON_HEX).unwrap());

        let frame = CapturedFrame::decode(&data, LinkType::Radiotap);
        assert_eq!(frame.frame_type, "beacon");
        assert_eq!(frame.source, 0x1122DEADBEEF);
        assert_eq!(frame.distance, estimate_distance(-57.0, 2412.0));
        assert!((frame.distance - 7.000397427391187).abs() < 1e-9);
        assert_eq!(frame.latitude, 0.0);
        assert_eq!(frame.longitude, 0.0);
        assert_eq!(frame.data, data);
        assert!(frame.timestamp > 0);
    }

    #[test]
    fn test_decode_without_radiotap() {
        let data = hex::decode(PROBE_REQ_HEX).unwrap();
        let frame = CapturedFrame::decode(&data, LinkType::Ieee80211);
        assert_eq!(frame.distance, 0.0);
        assert_eq!(frame.frame_type, "probe-req");
        assert_eq!(frame.source, 0x020000000001);
    }

    #[test]
    fn test_decode_without_any_layer() {
        let data = vec![0xde, 0xad];
        let frame = CapturedFrame::decode(&data, LinkType::Ieee80211);
        assert_eq!(frame.frame_type, "");
        assert_eq!(frame.source, 0);
        assert_eq!(frame.distance, 0.0);
        assert_eq!(frame.data, data);
    }

    #[test]
    fn test_decode_preserves_order_and_degrades() {
        let mut beacon = hex::decode(RADIOTAP_HEX).unwrap();
        beacon.extend(hex::decode(BEACON_HEX).unwrap());
        let probe_req = hex::decode(PROBE_REQ_HEX).unwrap();
        let garbage = vec![0x01, 0x02, 0x03];

        let packets = [
            (beacon.clone(), LinkType::Radiotap),
            (probe_req.clone(), LinkType::Ieee80211),
            (garbage.clone(), LinkType::Other(1)),
        ];
        let frames: Vec<CapturedFrame> = packets
            .iter()
            .map(|(data, link)| CapturedFrame::decode(data, *link))
            .collect();

        assert_eq!(frames.len(), 3);

        assert_eq!(frames[0].data, beacon);
        assert_eq!(frames[0].frame_type, "beacon");
        assert!(frames[0].distance > 0.0);

        assert_eq!(frames[1].data, probe_req);
        assert_eq!(frames[1].frame_type, "probe-req");
        assert_eq!(frames[1].distance, 0.0);

        assert_eq!(frames[2].data, garbage);
        assert_eq!(frames[2].frame_type, "");
        assert_eq!(frames[2].source, 0);
        assert_eq!(frames[2].distance, 0.0);
    }

    #[test]
    fn test_serialize_json() {
        let frame = CapturedFrame {
            frame_type: "probe-resp".to_string(),
            timestamp: 1_700_000_000,
            source: 42,
            data: vec![0xca, 0xfe],
            ..Default::default()
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "probe-resp");
        assert_eq!(json["source"], 42);
        assert_eq!(json["data"], "cafe");
        assert_eq!(json["distance"], 0.0);
    }
}
