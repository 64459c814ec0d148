//! Wireless device discovery and capability checks

use std::ffi::CString;
use std::path::Path;

use pcap::Device;
use tracing::{debug, info, warn};

use super::error::CaptureError;
use crate::hwaddr::HwAddr;

/// A host network device as seen by one enumeration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetDevice {
    pub name: String,
    pub wireless: bool,
}

/// Host network capability queries
pub trait InterfaceProbe {
    /// Devices in host enumeration order
    fn list_devices(&self) -> Result<Vec<NetDevice>, CaptureError>;

    /// Whether the device can be placed into RF monitor mode
    fn can_set_rfmon(&self, device: &str) -> bool;

    fn is_wireless(&self, device: &str) -> bool {
        match self.list_devices() {
            Ok(devices) => devices.iter().any(|d| d.name == device && d.wireless),
            Err(e) => {
                debug!("Device list failed while checking {}: {}", device, e);
                false
            }
        }
    }
}

/// Probe backed by libpcap and, on Linux, sysfs
#[derive(Debug, Default, Clone, Copy)]
pub struct PcapProbe;

impl InterfaceProbe for PcapProbe {
    fn list_devices(&self) -> Result<Vec<NetDevice>, CaptureError> {
        let devices = Device::list().map_err(CaptureError::DeviceList)?;
        Ok(devices
            .into_iter()
            .map(|d| NetDevice {
                // sysfs first, then libpcap's own PCAP_IF_WIRELESS flag
                wireless: sysfs_is_wireless(&d.name) || d.flags.is_wireless(),
                name: d.name,
            })
            .collect())
    }

    fn can_set_rfmon(&self, device: &str) -> bool {
        match pcap_can_set_rfmon(device) {
            Ok(capable) => capable,
            Err(reason) => {
                warn!("Monitor mode check failed for {}: {}", device, reason);
                false
            }
        }
    }
}

/// Return the first wireless device the host reports.
///
/// Selection follows host enumeration order, so the result is host-dependent.
pub fn find_wireless_device(probe: &impl InterfaceProbe) -> Result<String, CaptureError> {
    let devices = probe.list_devices()?;
    debug!("Host devices: {:?}", devices);
    devices
        .into_iter()
        .find(|d| d.wireless)
        .map(|d| d.name)
        .ok_or(CaptureError::NoWirelessDevice)
}

/// A device is usable when it is wireless and supports monitor mode
pub fn can_capture_packets(probe: &impl InterfaceProbe, device: &str) -> bool {
    probe.is_wireless(device) && probe.can_set_rfmon(device)
}

/// Resolve the device to capture on: the operator's choice or the first
/// wireless device, validated for monitor-mode capture.
pub fn select_device(
    probe: &impl InterfaceProbe,
    requested: Option<&str>,
) -> Result<String, CaptureError> {
    let (device, usable) = match requested.filter(|name| !name.is_empty()) {
        Some(name) => (name.to_string(), can_capture_packets(probe, name)),
        None => {
            let found = find_wireless_device(probe)?;
            info!("Auto-selected wireless device: {}", found);
            let usable = probe.can_set_rfmon(&found);
            (found, usable)
        }
    };

    if !usable {
        return Err(CaptureError::UnsupportedDevice { device });
    }
    Ok(device)
}

/// Hardware address of a local interface
pub fn hw_addr_of(device: &str) -> Option<HwAddr> {
    let path = Path::new("/sys/class/net").join(device).join("address");
    let contents = std::fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

fn sysfs_is_wireless(device: &str) -> bool {
    let base = Path::new("/sys/class/net").join(device);
    base.join("wireless").exists() || base.join("phy80211").exists()
}

mod ffi {
    use std::ffi::{c_char, c_int};

    pub const PCAP_ERRBUF_SIZE: usize = 256;

    #[repr(C)]
    pub struct PcapT {
        _private: [u8; 0],
    }

    #[cfg_attr(not(windows), link(name = "pcap"))]
    #[cfg_attr(windows, link(name = "wpcap"))]
    extern "C" {
        pub fn pcap_create(source: *const c_char, errbuf: *mut c_char) -> *mut PcapT;
        pub fn pcap_can_set_rfmon(p: *mut PcapT) -> c_int;
        pub fn pcap_geterr(p: *mut PcapT) -> *mut c_char;
        pub fn pcap_close(p: *mut PcapT);
    }
}

/// `pcap_can_set_rfmon` on a throwaway, never-activated handle.
/// The `pcap` crate does not wrap this call.
fn pcap_can_set_rfmon(device: &str) -> Result<bool, String> {
    let name = CString::new(device).map_err(|e| e.to_string())?;
    let mut errbuf = [0 as std::ffi::c_char; ffi::PCAP_ERRBUF_SIZE];

    // SAFETY: `name` is NUL-terminated and outlives the call; `errbuf` has
    // PCAP_ERRBUF_SIZE bytes as libpcap requires.
    let handle = unsafe { ffi::pcap_create(name.as_ptr(), errbuf.as_mut_ptr()) };
    if handle.is_null() {
        // SAFETY: libpcap NUL-terminates errbuf on failure.
        let msg = unsafe { std::ffi::CStr::from_ptr(errbuf.as_ptr()) };
        return Err(format!("pcap_create: {}", msg.to_string_lossy()));
    }

    // SAFETY: `handle` is a valid, non-null handle from pcap_create and is
    // closed exactly once below.
    unsafe {
        let rc = ffi::pcap_can_set_rfmon(handle);
        let outcome = if rc < 0 {
            let msg = std::ffi::CStr::from_ptr(ffi::pcap_geterr(handle));
            Err(format!("pcap_can_set_rfmon: {}", msg.to_string_lossy()))
        } else {
            Ok(rc == 1)
        };
        ffi::pcap_close(handle);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeProbe {
        devices: Vec<&'static str>,
        wireless: Vec<&'static str>,
        rfmon: Vec<&'static str>,
        listings: Cell<usize>,
    }

    impl InterfaceProbe for FakeProbe {
        fn list_devices(&self) -> Result<Vec<NetDevice>, CaptureError> {
            self.listings.set(self.listings.get() + 1);
            Ok(self
                .devices
                .iter()
                .map(|d| NetDevice {
                    name: d.to_string(),
                    wireless: self.wireless.iter().any(|w| w == d),
                })
                .collect())
        }

        fn can_set_rfmon(&self, device: &str) -> bool {
            self.rfmon.iter().any(|d| *d == device)
        }
    }

    fn probe() -> FakeProbe {
        FakeProbe {
            devices: vec!["lo", "eth0", "wlan1", "wlan0"],
            wireless: vec!["wlan1", "wlan0"],
            rfmon: vec!["wlan0"],
            listings: Cell::new(0),
        }
    }

    #[test]
    fn test_find_first_wireless_in_host_order() {
        assert_eq!(find_wireless_device(&probe()).unwrap(), "wlan1");
    }

    #[test]
    fn test_selection_lists_devices_once() {
        let probe = probe();
        find_wireless_device(&probe).unwrap();
        assert_eq!(probe.listings.get(), 1);

        let probe = FakeProbe {
            devices: vec!["lo", "eth0", "wlan0"],
            wireless: vec!["wlan0"],
            rfmon: vec!["wlan0"],
            listings: Cell::new(0),
        };
        assert_eq!(select_device(&probe, None).unwrap(), "wlan0");
        assert_eq!(probe.listings.get(), 1);
    }

    #[test]
    fn test_find_without_wireless_devices() {
        let probe = FakeProbe {
            devices: vec!["lo", "eth0"],
            wireless: vec![],
            rfmon: vec![],
            listings: Cell::new(0),
        };
        assert!(matches!(
            find_wireless_device(&probe),
            Err(CaptureError::NoWirelessDevice)
        ));
    }

    #[test]
    fn test_can_capture_requires_both_predicates() {
        let probe = probe();
        assert!(can_capture_packets(&probe, "wlan0"));
        assert!(!can_capture_packets(&probe, "wlan1"));
        assert!(!can_capture_packets(&probe, "eth0"));
    }

    #[test]
    fn test_select_requested_device() {
        assert_eq!(select_device(&probe(), Some("wlan0")).unwrap(), "wlan0");
    }

    #[test]
    fn test_select_rejects_incapable_device() {
        match select_device(&probe(), Some("eth0")) {
            Err(CaptureError::UnsupportedDevice { device }) => assert_eq!(device, "eth0"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_select_auto_discovered_must_support_monitor_mode() {
        // wlan1 is found first but cannot do rfmon
        let err = select_device(&probe(), None).unwrap_err();
        assert!(err.to_string().contains("wlan1"));
    }

    #[test]
    fn test_empty_request_means_auto_select() {
        let probe = FakeProbe {
            devices: vec!["wlan0"],
            wireless: vec!["wlan0"],
            rfmon: vec!["wlan0"],
            listings: Cell::new(0),
        };
        assert_eq!(select_device(&probe, Some("")).unwrap(), "wlan0");
    }
}
