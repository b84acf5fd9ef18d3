//! Generic photography-related types
use std::str::FromStr;

/// A geographical position, in decimal degrees
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    /// Whether both coordinates are within their valid ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Whether two positions agree to within roughly a centimetre
    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.lat - other.lat).abs() < 1e-7 && (self.lon - other.lon).abs() < 1e-7
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let precision = f.precision().unwrap_or(3);
        let lat = dms_coordinates::DMS::from_ddeg_latitude(self.lat);
        let lon = dms_coordinates::DMS::from_ddeg_longitude(self.lon);
        write!(
            f,
            "{0}° {1}′ {2:.8$}″{3}, {4}° {5}′ {6:.8$}″{7}",
            lat.degrees,
            lat.minutes,
            lat.seconds,
            lat.cardinal.map(|c| format!(" {c}")).unwrap_or_default(),
            lon.degrees,
            lon.minutes,
            lon.seconds,
            lon.cardinal.map(|c| format!(" {c}")).unwrap_or_default(),
            precision,
        )
    }
}

/// Rating errors
#[derive(Clone, PartialEq, Eq, Debug)]
#[derive(thiserror::Error)]
pub enum RatingError {
    #[error("Rating must be between 0 and 5, got {0}")]
    OutOfRange(i64),
    #[error("Rating must be a number: {0}")]
    NotANumber(#[from] std::num::ParseIntError),
}

/// A star rating, from 0 (unrated) to 5
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    /// The number of stars
    pub fn stars(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(stars) if stars <= Self::MAX => Ok(Self(stars)),
            _ => Err(RatingError::OutOfRange(value)),
        }
    }
}

impl FromStr for Rating {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>()?.try_into()
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_position() {
        let position = Position {
            lat: 57.700767,
            lon: 11.953715,
        };
        assert_eq!(
            position.to_string(),
            "57° 42′ 2.761″ N, 11° 57′ 13.374″ E"
        );
        assert_eq!(
            format!("{position:.1}"),
            "57° 42′ 2.8″ N, 11° 57′ 13.4″ E"
        );
    }

    #[test]
    fn display_position_southwest() {
        let position = Position {
            lat: -38.8897,
            lon: -77.0089,
        };
        assert_eq!(format!("{position:.0}"), "38° 53′ 23″ S, 77° 0′ 32″ W");
    }

    #[test]
    fn validate_position() {
        assert!(Position { lat: 0.0, lon: 0.0 }.is_valid());
        assert!(Position { lat: -90.0, lon: 180.0 }.is_valid());
        assert!(!Position { lat: 91.0, lon: 0.0 }.is_valid());
        assert!(!Position { lat: 0.0, lon: -180.5 }.is_valid());
        assert!(!Position { lat: f64::NAN, lon: 0.0 }.is_valid());
    }

    #[test]
    fn parse_rating() {
        assert_eq!("3".parse::<Rating>(), Ok(Rating(3)));
        assert_eq!(" 0 ".parse::<Rating>(), Ok(Rating(0)));
        assert_eq!("6".parse::<Rating>(), Err(RatingError::OutOfRange(6)));
        assert_eq!(Rating::try_from(-1), Err(RatingError::OutOfRange(-1)));
        assert!(matches!(
            "three".parse::<Rating>(),
            Err(RatingError::NotANumber(_))
        ));
        assert_eq!(Rating(4).to_string(), "4/5");
    }
}
