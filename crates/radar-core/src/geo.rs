//! Geographic coordinates on the surface of the earth.

use std::fmt;

/// Earth diameter used for great-circle distances, in nautical miles.
pub const EARTH_DIAMETER_NM: f64 = 6880.14;

/// A latitude/longitude pair, both in decimal degrees.
///
/// Positive latitude is north, positive longitude is east.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

/// Result of a great-circle computation between two coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreatCircle {
    /// Initial true bearing from the origin towards the destination, `[0, 360)` degrees.
    pub bearing_deg: f64,
    /// Great-circle distance in nautical miles.
    pub distance_nm: f64,
}

impl LatLng {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Computes bearing and distance from `self` to `dest` using the haversine formula.
    pub fn great_circle_to(&self, dest: &LatLng) -> GreatCircle {
        let lat1 = self.latitude.to_radians();
        let lat2 = dest.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (dest.longitude - self.longitude).to_radians();

        let s_lat = (d_lat / 2.0).sin();
        let s_lon = (d_lon / 2.0).sin();
        let q = s_lat * s_lat + lat1.cos() * lat2.cos() * s_lon * s_lon;
        let distance_nm = EARTH_DIAMETER_NM * q.sqrt().min(1.0).asin();

        let y = d_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
        let bearing_deg = (y.atan2(x).to_degrees() + 360.0) % 360.0;

        GreatCircle {
            bearing_deg,
            distance_nm,
        }
    }

    /// Great-circle distance to `dest` in nautical miles.
    pub fn distance_nm(&self, dest: &LatLng) -> f64 {
        self.great_circle_to(dest).distance_nm
    }

    /// Point reached by travelling `distance_nm` along the great circle that
    /// leaves `self` on `bearing_deg`.
    pub fn destination(&self, bearing_deg: f64, distance_nm: f64) -> LatLng {
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let bearing = bearing_deg.to_radians();
        let angular = 2.0 * distance_nm / EARTH_DIAMETER_NM;

        let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
        let lon2 = lon1
            + (bearing.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

        // normalise to [-180, 180)
        let longitude = (lon2.to_degrees() + 540.0) % 360.0 - 180.0;
        LatLng::new(lat2.to_degrees(), longitude)
    }
}

// Degrees, two-digit minutes and seconds with three decimals: `47°26′59.999″`.
// Rounds to whole milliseconds of arc first so `59.9995″` carries into the
// next minute instead of printing as `60.000″`.
fn write_dms(f: &mut fmt::Formatter<'_>, raw: f64) -> fmt::Result {
    const MILLIS_PER_DEGREE: f64 = 3_600_000.0;
    let total = (raw.abs() * MILLIS_PER_DEGREE).round() as u64;
    let degrees = total / 3_600_000;
    let minutes = total / 60_000 % 60;
    let millis = total % 60_000;
    write!(
        f,
        "{}\u{00B0}{:02}\u{2032}{:02}.{:03}\u{2033}",
        degrees,
        minutes,
        millis / 1000,
        millis % 1000
    )
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.latitude >= 0.0 { "N" } else { "S" })?;
        write_dms(f, self.latitude)?;
        f.write_str(if self.longitude >= 0.0 { " E" } else { " W" })?;
        write_dms(f, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_degree_of_latitude_is_sixty_nautical_miles() {
        // Arrange
        let origin = LatLng::new(0.0, 0.0);
        let north = LatLng::new(1.0, 0.0);

        // Act
        let gc = origin.great_circle_to(&north);

        // Assert
        assert!((gc.distance_nm - 60.04).abs() < 0.1, "got {}", gc.distance_nm);
        assert!(gc.bearing_deg.abs() < 1e-9);
    }

    #[test]
    fn test_bearing_due_east_and_due_west() {
        let origin = LatLng::new(0.0, 0.0);

        let east = origin.great_circle_to(&LatLng::new(0.0, 1.0));
        let west = origin.great_circle_to(&LatLng::new(0.0, -1.0));

        assert!((east.bearing_deg - 90.0).abs() < 1e-9);
        assert!((west.bearing_deg - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = LatLng::new(47.45, -122.31);
        assert_eq!(p.distance_nm(&p), 0.0);
    }

    #[test]
    fn test_display_formats_degrees_minutes_seconds_with_hemispheres() {
        let p = LatLng::new(47.5, -122.25);
        assert_eq!(p.to_string(), "N47°30′00.000″ W122°15′00.000″");
    }

    #[test]
    fn test_display_carries_rounded_seconds_into_minutes() {
        // Arrange: 47.4499999° is 47°26′59.99964″
        let p = LatLng::new(47.4499999, -122.0);

        // Act
        let text = p.to_string();

        // Assert
        assert_eq!(text, "N47°27′00.000″ W122°00′00.000″");
    }

    #[test]
    fn test_display_carries_into_degrees() {
        let p = LatLng::new(9.99999999, 0.0);
        assert_eq!(p.to_string(), "N10°00′00.000″ E0°00′00.000″");
    }

    #[test]
    fn test_display_southern_eastern_hemisphere() {
        let p = LatLng::new(-33.75, 151.125);
        assert_eq!(p.to_string(), "S33°45′00.000″ E151°07′30.000″");
    }

    #[test]
    fn test_destination_round_trips_with_great_circle() {
        // Arrange
        let origin = LatLng::new(47.4502, -122.3088);

        // Act
        let dest = origin.destination(135.0, 42.0);
        let back = origin.great_circle_to(&dest);

        // Assert
        assert!((back.distance_nm - 42.0).abs() < 1e-6, "got {}", back.distance_nm);
        assert!((back.bearing_deg - 135.0).abs() < 1e-6, "got {}", back.bearing_deg);
    }

    #[test]
    fn test_destination_wraps_across_antimeridian() {
        let dest = LatLng::new(0.0, 179.5).destination(90.0, 60.0);
        assert!(dest.longitude < -179.0, "got {}", dest.longitude);
    }
}
