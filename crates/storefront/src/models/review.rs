//! Product reviews.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kedai_core::{ProductId, ReviewId, ReviewStatus};

/// A review as shown on the product page.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub rating: i16,
    pub title: Option<String>,
    pub body: String,
    pub reviewer_name: String,
    pub is_verified_purchase: bool,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

/// Aggregate of approved reviews.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
    /// Count per star, index 0 is one star.
    pub histogram: [i64; 5],
}

impl RatingSummary {
    /// Build from `(rating, count)` pairs. Out-of-range ratings are ignored.
    #[must_use]
    pub fn from_counts(counts: &[(i16, i64)]) -> Self {
        let mut histogram = [0i64; 5];
        let mut weighted = 0i64;
        for &(rating, count) in counts {
            let slot = usize::try_from(rating - 1)
                .ok()
                .and_then(|i| histogram.get_mut(i));
            if let Some(slot) = slot {
                *slot += count;
                weighted += i64::from(rating) * count;
            }
        }
        let count: i64 = histogram.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let average = (count > 0).then(|| {
            let avg = weighted as f64 / count as f64;
            (avg * 10.0).round() / 10.0
        });
        Self {
            average,
            count,
            histogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_counts() {
        let summary = RatingSummary::from_counts(&[(5, 3), (4, 1), (1, 1)]);
        assert_eq!(summary.count, 5);
        assert_eq!(summary.histogram, [1, 0, 0, 1, 3]);
        // (15 + 4 + 1) / 5 = 4.0
        assert_eq!(summary.average, Some(4.0));
    }

    #[test]
    fn test_empty_and_invalid() {
        assert_eq!(RatingSummary::from_counts(&[]), RatingSummary::default());
        let summary = RatingSummary::from_counts(&[(0, 4), (9, 2), (3, 2)]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(3.0));
    }
}
