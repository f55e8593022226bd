pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two `(lat, lng)` points given in degrees.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identical_points_are_zero() {
        assert_eq!(haversine_km((40.7128, -74.0060), (40.7128, -74.0060)), 0.0);
    }

    #[test]
    fn test_known_distance() {
        // New York to London is roughly 5570 km
        let distance = haversine_km((40.7128, -74.0060), (51.5074, -0.1278));
        assert!((distance - 5570.0).abs() < 15.0, "got {}", distance);
    }

    #[test]
    fn test_antipodal_points() {
        let distance = haversine_km((0.0, 0.0), (0.0, 180.0));
        assert!((distance - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(12.345), 12.3);
        assert_eq!(round_to_tenth(12.36), 12.4);
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(
            lat1 in -90.0f64..90.0, lng1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lng2 in -180.0f64..180.0,
        ) {
            let there = haversine_km((lat1, lng1), (lat2, lng2));
            let back = haversine_km((lat2, lng2), (lat1, lng1));
            prop_assert!((there - back).abs() < 1e-6);
        }

        #[test]
        fn distance_to_self_is_zero(lat in -90.0f64..90.0, lng in -180.0f64..180.0) {
            prop_assert!(haversine_km((lat, lng), (lat, lng)).abs() < 1e-9);
        }

        #[test]
        fn distance_is_bounded(
            lat1 in -90.0f64..90.0, lng1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lng2 in -180.0f64..180.0,
        ) {
            let d = haversine_km((lat1, lng1), (lat2, lng2));
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
        }
    }
}
