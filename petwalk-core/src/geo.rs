pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers (Haversine formula).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_km(lat1, lon1, lat2, lon2) * 1000.0
}

/// Implied travel speed in km/h. Zero or negative elapsed time yields `None`.
pub fn speed_kmh(distance_km: f64, elapsed_seconds: f64) -> Option<f64> {
    if elapsed_seconds <= 0.0 {
        return None;
    }
    Some(distance_km / (elapsed_seconds / 3600.0))
}

pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points_have_zero_distance() {
        assert_eq!(haversine_km(37.5665, 126.9780, 37.5665, 126.9780), 0.0);
    }

    #[test]
    fn test_seoul_to_busan() {
        let d = haversine_km(37.5665, 126.9780, 35.1796, 129.0756);
        assert!(d > 320.0 && d < 330.0, "got {}", d);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let ab = haversine_km(37.50, 127.00, 37.51, 127.02);
        let ba = haversine_km(37.51, 127.02, 37.50, 127.00);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_triangle_inequality() {
        let (a, b, c) = ((37.50, 127.00), (37.52, 127.03), (37.49, 127.05));
        let ab = haversine_km(a.0, a.1, b.0, b.1);
        let bc = haversine_km(b.0, b.1, c.0, c.1);
        let ac = haversine_km(a.0, a.1, c.0, c.1);
        assert!(ac <= ab + bc + 1e-9);
    }

    #[test]
    fn test_speed_requires_positive_elapsed() {
        assert_eq!(speed_kmh(1.0, 0.0), None);
        assert_eq!(speed_kmh(1.0, -5.0), None);
        let v = speed_kmh(1.0, 60.0).unwrap();
        assert!((v - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(is_valid_coordinate(90.0, -180.0));
        assert!(!is_valid_coordinate(90.1, 0.0));
        assert!(!is_valid_coordinate(0.0, 180.5));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
    }
}
