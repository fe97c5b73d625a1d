//! Star ratings on product reviews.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A rating outside one to five stars.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between {min} and {max} (got {got})", min = Rating::MIN, max = Rating::MAX)]
pub struct RatingError {
    pub got: i64,
}

/// One to five stars.
///
/// ```
/// use atelier_core::Rating;
///
/// assert_eq!(Rating::new(4).unwrap().get(), 4);
/// assert!(Rating::new(0).is_err());
/// assert!(Rating::new(6).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i16")]
pub struct Rating(i16);

impl Rating {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 5;

    /// Validate a star count.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError`] outside `1..=5`.
    pub fn new(stars: i64) -> Result<Self, RatingError> {
        i16::try_from(stars)
            .ok()
            .filter(|s| (Self::MIN..=Self::MAX).contains(s))
            .map(Self)
            .ok_or(RatingError { got: stars })
    }

    #[must_use]
    pub const fn get(self) -> i16 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i16 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Rating {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i16 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Rating {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let stars = <i16 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Self::new(i64::from(stars)).map_err(Into::into)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Rating {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i16 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(Rating::new(1).is_ok());
        assert!(Rating::new(5).is_ok());
        assert_eq!(Rating::new(0), Err(RatingError { got: 0 }));
        assert_eq!(Rating::new(6), Err(RatingError { got: 6 }));
        assert!(Rating::new(i64::from(i16::MAX) + 1).is_err());
        assert_eq!(
            Rating::new(9).unwrap_err().to_string(),
            "rating must be between 1 and 5 (got 9)"
        );
    }

    #[test]
    fn test_serde_is_bare_number() {
        let rating: Rating = serde_json::from_str("3").unwrap();
        assert_eq!(serde_json::to_string(&rating).unwrap(), "3");
        assert!(serde_json::from_str::<Rating>("7").is_err());
    }
}
