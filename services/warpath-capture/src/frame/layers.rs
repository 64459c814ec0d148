//! Protocol layer decomposition of captured packets
//!
//! A packet captured in monitor mode is either:
//! - DLT 127: a radiotap header followed by an 802.11 frame
//! - DLT 105: a bare 802.11 frame (no radio metadata)
//!
//! Any other link type carries neither layer as far as we are concerned.

use radiotap::Radiotap;
use tracing::{debug, trace};

/// Link-layer header type reported by the capture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// DLT_IEEE802_11_RADIO
    Radiotap,
    /// DLT_IEEE802_11
    Ieee80211,
    Other(i32),
}

impl From<i32> for LinkType {
    fn from(dlt: i32) -> Self {
        match dlt {
            127 => Self::Radiotap,
            105 => Self::Ieee80211,
            other => Self::Other(other),
        }
    }
}

impl LinkType {
    pub fn dlt(&self) -> i32 {
        match self {
            Self::Radiotap => 127,
            Self::Ieee80211 => 105,
            Self::Other(dlt) => *dlt,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.dlt() {
            1 => "Ethernet (EN10MB)",
            105 => "IEEE 802.11 (raw)",
            119 => "IEEE 802.11 PrismHeader",
            127 => "IEEE 802.11 Radiotap",
            192 => "PPI",
            _ => "Unknown",
        }
    }
}

/// Radio metadata extracted from a radiotap header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioMetadata {
    /// Antenna signal in dBm, as carried on the wire
    pub antenna_signal: Option<i8>,
    /// Channel frequency in MHz
    pub channel_freq: Option<u16>,
}

impl RadioMetadata {
    /// Signal strength and frequency, only when both fields are present
    pub fn signal_and_frequency(&self) -> Option<(i8, u16)> {
        match (self.antenna_signal, self.channel_freq) {
            (Some(signal), Some(freq)) if freq > 0 => Some((signal, freq)),
            _ => None,
        }
    }
}

/// 802.11 frame type field (2 bits of the frame control)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dot11Kind {
    Management,
    Control,
    Data,
    Extension,
}

impl From<u8> for Dot11Kind {
    fn from(ftype: u8) -> Self {
        match ftype & 0x03 {
            0 => Self::Management,
            1 => Self::Control,
            2 => Self::Data,
            _ => Self::Extension,
        }
    }
}

/// The parts of an 802.11 MAC header we care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dot11Header {
    pub kind: Dot11Kind,
    pub subtype: u8,
    /// Transmitter / source address, absent on ACK and CTS frames
    pub address2: Option<[u8; 6]>,
}

/// Frame control (2) + duration (2) + address 1 (6)
const DOT11_MIN_HEADER_LEN: usize = 10;

/// Address 2 offset within the MAC header
const ADDRESS2_OFFSET: usize = 10;

const SUBTYPE_CTS: u8 = 12;
const SUBTYPE_ACK: u8 = 13;

impl Dot11Header {
    /// Parse the MAC header at the start of `data`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < DOT11_MIN_HEADER_LEN {
            return None;
        }

        let fc0 = data[0];
        let kind = Dot11Kind::from((fc0 >> 2) & 0x03);
        let subtype = (fc0 >> 4) & 0x0F;

        let has_address2 = !(kind == Dot11Kind::Control
            && (subtype == SUBTYPE_CTS || subtype == SUBTYPE_ACK));

        let address2 = if has_address2 && data.len() >= ADDRESS2_OFFSET + 6 {
            let mut addr = [0u8; 6];
            addr.copy_from_slice(&data[ADDRESS2_OFFSET..ADDRESS2_OFFSET + 6]);
            Some(addr)
        } else {
            None
        };

        Some(Self {
            kind,
            subtype,
            address2,
        })
    }

    /// Subtype label, using the same names as BPF `subtype` qualifiers
    pub fn label(&self) -> &'static str {
        match self.kind {
            Dot11Kind::Management => match self.subtype {
                0 => "assoc-req",
                1 => "assoc-resp",
                2 => "reassoc-req",
                3 => "reassoc-resp",
                4 => "probe-req",
                5 => "probe-resp",
                6 => "timing-adv",
                8 => "beacon",
                9 => "atim",
                10 => "disassoc",
                11 => "auth",
                12 => "deauth",
                13 => "action",
                14 => "action-no-ack",
                _ => "mgt-reserved",
            },
            Dot11Kind::Control => match self.subtype {
                7 => "ctl-wrapper",
                8 => "bar",
                9 => "ba",
                10 => "ps-poll",
                11 => "rts",
                12 => "cts",
                13 => "ack",
                14 => "cf-end",
                15 => "cf-end-ack",
                _ => "ctl-reserved",
            },
            Dot11Kind::Data => match self.subtype {
                0 => "data",
                1 => "data-cf-ack",
                2 => "data-cf-poll",
                3 => "data-cf-ack-poll",
                4 => "null",
                5 => "cf-ack",
                6 => "cf-poll",
                7 => "cf-ack-poll",
                8 => "qos-data",
                9 => "qos-data-cf-ack",
                10 => "qos-data-cf-poll",
                11 => "qos-data-cf-ack-poll",
                12 => "qos",
                14 => "qos-cf-poll",
                15 => "qos-cf-ack-poll",
                _ => "data-reserved",
            },
            Dot11Kind::Extension => "ext",
        }
    }
}

/// Layers found in one captured packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketLayers {
    pub radio: Option<RadioMetadata>,
    pub dot11: Option<Dot11Header>,
}

/// Split a raw packet into its radiotap and 802.11 layers
pub fn decompose(data: &[u8], link_type: LinkType) -> PacketLayers {
    match link_type {
        LinkType::Radiotap => {
            let (radio, header_len) = match Radiotap::from_bytes(data) {
                Ok(rt) => {
                    let radio = RadioMetadata {
                        antenna_signal: rt.antenna_signal.map(|s| s.value),
                        channel_freq: rt.channel.map(|c| c.freq),
                    };
                    (Some(radio), Some(rt.header.length))
                }
                Err(e) => {
                    debug!("Radiotap header rejected: {:?}", e);
                    (None, raw_radiotap_length(data))
                }
            };

            let dot11 = header_len
                .filter(|&len| len <= data.len())
                .and_then(|len| Dot11Header::parse(&data[len..]));

            PacketLayers { radio, dot11 }
        }
        LinkType::Ieee80211 => PacketLayers {
            radio: None,
            dot11: Dot11Header::parse(data),
        },
        LinkType::Other(dlt) => {
            trace!("No 802.11 layers for datalink type {}", dlt);
            PacketLayers::default()
        }
    }
}

/// Header length straight from the radiotap preamble (version 0 only)
fn raw_radiotap_length(data: &[u8]) -> Option<usize> {
    if data.len() < 4 || data[0] != 0 {
        return None;
    }
    Some(u16::from_le_bytes([data[2], data[3]]) as usize)
}
