mod points;

pub use points::{Points, PointsConversionError};
