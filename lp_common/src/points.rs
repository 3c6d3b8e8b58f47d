use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------      Points       -----------------------------------------------------------
/// A loyalty-points amount with two decimal places of precision.
///
/// Amounts are stored as an integer number of hundredths of a point, so arithmetic is exact. The database stores the
/// raw integer value; the JSON representation is a decimal number (`500.5`), matching what the accrual oracle sends.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct Points(i64);

const CENTS_PER_POINT: i64 = 100;

impl Points {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_points(points: i64) -> Self {
        Self(points * CENTS_PER_POINT)
    }

    /// The raw value in hundredths of a point.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / CENTS_PER_POINT as f64
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in points: {0}")]
pub struct PointsConversionError(String);

impl From<i64> for Points {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl TryFrom<f64> for Points {
    type Error = PointsConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(PointsConversionError(format!("{value} is not a finite number")));
        }
        let cents = (value * CENTS_PER_POINT as f64).round();
        if cents.abs() >= i64::MAX as f64 {
            return Err(PointsConversionError(format!("{value} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }
}

impl FromStr for Points {
    type Err = PointsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sign, s) = match s.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, s),
        };
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > 2 {
            return Err(PointsConversionError(format!("{s} has more than two decimal places")));
        }
        let whole = whole.parse::<i64>().map_err(|e| PointsConversionError(e.to_string()))?;
        let frac = if frac.is_empty() {
            0
        } else {
            // pad "5" out to "50" so that 12.5 == 12.50
            format!("{frac:0<2}").parse::<i64>().map_err(|e| PointsConversionError(e.to_string()))?
        };
        Ok(Self(sign * (whole * CENTS_PER_POINT + frac)))
    }
}

impl PartialEq for Points {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Points {}

impl Add for Points {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Points {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Points {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Points {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Points {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}{}.{:02}", cents / CENTS_PER_POINT, cents % CENTS_PER_POINT)
    }
}

impl Serialize for Points {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Points::try_from(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::Points;

    #[test]
    fn arithmetic_is_exact() {
        let a = Points::from_points(500);
        let b = Points::from_cents(1);
        assert_eq!(a + b, Points::from_cents(50_001));
        assert_eq!(a - b, Points::from_cents(49_999));
        assert_eq!(-b, Points::from_cents(-1));
        let total: Points = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Points::from_cents(50_002));
    }

    #[test]
    fn display_has_two_decimal_places() {
        assert_eq!(Points::from_cents(50_000).to_string(), "500.00");
        assert_eq!(Points::from_cents(1).to_string(), "0.01");
        assert_eq!(Points::from_cents(-1_250).to_string(), "-12.50");
    }

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("500.00".parse::<Points>().unwrap(), Points::from_points(500));
        assert_eq!("12.5".parse::<Points>().unwrap(), Points::from_cents(1_250));
        assert_eq!("7".parse::<Points>().unwrap(), Points::from_points(7));
        assert_eq!("-0.01".parse::<Points>().unwrap(), Points::from_cents(-1));
        assert!("1.234".parse::<Points>().is_err());
        assert!("abc".parse::<Points>().is_err());
    }

    #[test]
    fn json_round_trip() {
        let p = Points::from_cents(50_050);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "500.5");
        let back: Points = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn rejects_non_finite_floats() {
        assert!(Points::try_from(f64::NAN).is_err());
        assert!(Points::try_from(f64::INFINITY).is_err());
        assert_eq!(Points::try_from(500.0).unwrap(), Points::from_points(500));
    }
}
