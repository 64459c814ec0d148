//! Free-space path loss distance estimation

/// FSPL constant for distances in meters and frequencies in MHz
const FSPL_CONSTANT_DB: f64 = 27.55;

/// Estimate the distance (meters) to a transmitter from the received
/// signal strength (dBm) and the channel frequency (MHz).
///
/// Inverts the free-space path loss formula:
/// `d = 10 ^ ((27.55 - 20 * log10(f) + |s|) / 20)`
///
/// `frequency_mhz` must be positive; radiotap channel frequencies always are.
///
/// Not bit-exact with every libm: -57 dBm at 2412 MHz gives
/// 7.000397427391177 here against a reference of 7.000397427391187.
pub fn estimate_distance(signal_dbm: f64, frequency_mhz: f64) -> f64 {
    let exponent = (FSPL_CONSTANT_DB - 20.0 * frequency_mhz.log10() + signal_dbm.abs()) / 20.0;
    10f64.powf(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_distance_2412mhz() {
        let distance = estimate_distance(-57.0, 2412.0);
        assert!((distance - 7.000397427391187).abs() < 1e-9, "got {}", distance);
    }

    #[test]
    fn test_sign_of_signal_is_ignored() {
        assert_eq!(estimate_distance(-70.0, 5180.0), estimate_distance(70.0, 5180.0));
    }

    #[test]
    fn test_weaker_signal_is_farther() {
        let near = estimate_distance(-40.0, 2437.0);
        let far = estimate_distance(-80.0, 2437.0);
        assert!(far > near);
        // 40 dB more loss is a factor of 100 in free space
        assert!((far / near - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_higher_frequency_is_nearer() {
        assert!(estimate_distance(-60.0, 5745.0) < estimate_distance(-60.0, 2412.0));
    }
}
