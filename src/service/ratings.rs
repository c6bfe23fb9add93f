//! Tour rating aggregates, recomputed after every review write.

use crate::error::AppError;
use crate::query::Condition;
use crate::service::Resource;
use crate::store::Document;
use serde_json::{json, Value};

/// Rating shown for a tour nobody has reviewed yet.
pub const DEFAULT_RATING: f64 = 4.5;

/// (quantity, average rounded to one decimal) over the given reviews' ratings.
pub fn summarize(reviews: &[Value]) -> (u64, f64) {
    let ratings: Vec<f64> = reviews.iter().filter_map(|r| r.get("rating").and_then(Value::as_f64)).collect();
    if ratings.is_empty() {
        return (0, DEFAULT_RATING);
    }
    let avg = ratings.iter().sum::<f64>() / ratings.len() as f64;
    (ratings.len() as u64, (avg * 10.0).round() / 10.0)
}

/// Write ratingsQuantity/ratingsAverage for `tour_id` from its current reviews.
pub async fn recalculate_tour_ratings(reviews: &Resource, tours: &Resource, tour_id: &str) -> Result<(), AppError> {
    let found = reviews.find_all(vec![Condition::eq("tour", json!(tour_id))]).await?;
    let (quantity, average) = summarize(&found);
    let mut patch = Document::new();
    patch.insert("ratingsQuantity".into(), json!(quantity));
    patch.insert("ratingsAverage".into(), json!(average));
    match tours.patch_raw(tour_id, patch).await? {
        Some(_) => tracing::debug!(tour = %tour_id, quantity, average, "tour ratings updated"),
        None => tracing::debug!(tour = %tour_id, "ratings target tour no longer exists"),
    }
    Ok(())
}
