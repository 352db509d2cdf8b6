use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// One user's score for one scenario. Unique per (scenario, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub scenario_id: String,
    pub user_id: String,
    pub rating: u8,
    pub created_at_unix_ms: u64,
    pub updated_at_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingAggregate {
    pub scenario_id: String,
    pub average: f64,
    pub count: u64,
}

/// Accepts integers 1 through 5 only.
pub fn parse_rating(v: Option<&Value>) -> Result<u8, ApiError> {
    let n = v.and_then(|v| v.as_u64()).ok_or_else(|| {
        ApiError::validation(format!(
            "rating must be an integer between {MIN_RATING} and {MAX_RATING}"
        ))
    })?;
    if !(MIN_RATING as u64..=MAX_RATING as u64).contains(&n) {
        return Err(ApiError::validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(n as u8)
}

fn round_two(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn aggregate<'a, I>(scenario_id: &str, ratings: I) -> RatingAggregate
where
    I: IntoIterator<Item = &'a Rating>,
{
    let (sum, count) = ratings
        .into_iter()
        .filter(|r| r.scenario_id == scenario_id)
        .fold((0u64, 0u64), |(s, c), r| (s + r.rating as u64, c + 1));
    RatingAggregate {
        scenario_id: scenario_id.to_string(),
        average: if count == 0 {
            0.0
        } else {
            round_two(sum as f64 / count as f64)
        },
        count,
    }
}

pub fn aggregate_all<'a, I>(ratings: I) -> BTreeMap<String, RatingAggregate>
where
    I: IntoIterator<Item = &'a Rating>,
{
    let mut sums: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for r in ratings {
        let e = sums.entry(r.scenario_id.as_str()).or_default();
        e.0 += r.rating as u64;
        e.1 += 1;
    }
    sums.into_iter()
        .map(|(id, (sum, count))| {
            (
                id.to_string(),
                RatingAggregate {
                    scenario_id: id.to_string(),
                    average: round_two(sum as f64 / count as f64),
                    count,
                },
            )
        })
        .collect()
}
