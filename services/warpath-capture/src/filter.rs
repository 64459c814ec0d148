//! BPF filter selection

use tracing::info;

pub const FILTER_BEACON_FRAMES: &str = "type mgt subtype beacon";
pub const FILTER_PROBE_REQUEST_FRAMES: &str = "type mgt subtype probe-req";
pub const FILTER_PROBE_RESPONSE_FRAMES: &str = "type mgt subtype probe-resp";
pub const FILTER_ALL_FRAMES: &str = "(type mgt subtype beacon) or (type mgt subtype probe-req) or (type mgt subtype probe-resp)";

/// Management frames the capture can be narrowed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFilter {
    Beacon,
    ProbeRequest,
    ProbeResponse,
    /// Beacons, probe requests and probe responses
    All,
}

impl FrameFilter {
    /// Case-insensitive; unknown names select [`FrameFilter::All`]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "beacon" => Self::Beacon,
            "probe-req" => Self::ProbeRequest,
            "probe-resp" => Self::ProbeResponse,
            _ => {
                info!("using default filter: {}", FILTER_ALL_FRAMES);
                Self::All
            }
        }
    }

    pub fn expression(&self) -> &'static str {
        match self {
            Self::Beacon => FILTER_BEACON_FRAMES,
            Self::ProbeRequest => FILTER_PROBE_REQUEST_FRAMES,
            Self::ProbeResponse => FILTER_PROBE_RESPONSE_FRAMES,
            Self::All => FILTER_ALL_FRAMES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_filters() {
        assert_eq!(FrameFilter::from_name("beacon").expression(), "type mgt subtype beacon");
        assert_eq!(
            FrameFilter::from_name("probe-req").expression(),
            "type mgt subtype probe-req"
        );
        assert_eq!(
            FrameFilter::from_name("probe-resp").expression(),
            "type mgt subtype probe-resp"
        );
    }

    #[test]
    fn test_names_are_case_insensitive() {
        assert_eq!(FrameFilter::from_name("BEACON"), FrameFilter::Beacon);
        assert_eq!(FrameFilter::from_name("Probe-Req"), FrameFilter::ProbeRequest);
    }

    #[test]
    fn test_unknown_names_select_all() {
        for name in ["all", "", "data", "probe"] {
            assert_eq!(FrameFilter::from_name(name), FrameFilter::All);
        }
        assert_eq!(
            FrameFilter::All.expression(),
            "(type mgt subtype beacon) or (type mgt subtype probe-req) or (type mgt subtype probe-resp)"
        );
    }
}
