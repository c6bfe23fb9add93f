//! Tour aggregates and geo queries computed over the public tour documents.

use crate::error::AppError;
use crate::query::coerce::parse_timestamp;
use chrono::Datelike;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Earth radius used for spherical distances, km.
const EARTH_RADIUS_KM: f64 = 6378.1;
const EARTH_RADIUS_MI: f64 = 3963.2;
const METERS_TO_MILES: f64 = 0.000621371;
const METERS_TO_KM: f64 = 0.001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Kilometers,
}

impl DistanceUnit {
    /// `mi` means miles; anything else is kilometres.
    pub fn parse(raw: &str) -> Self {
        if raw == "mi" {
            DistanceUnit::Miles
        } else {
            DistanceUnit::Kilometers
        }
    }
}

/// A `lat,lng` path segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::BadRequest("Please provide latitude and longitude in the format lat,lng.".into());
        let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(invalid());
        }
        Ok(GeoPoint { lat, lng })
    }

    /// GeoJSON point (`{"type":"Point","coordinates":[lng,lat]}`).
    fn from_geojson(v: &Value) -> Option<Self> {
        let coords = v.get("coordinates")?.as_array()?;
        Some(GeoPoint {
            lng: coords.first()?.as_f64()?,
            lat: coords.get(1)?.as_f64()?,
        })
    }

    /// Central angle to `other` in radians (haversine).
    fn angle_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * a.sqrt().min(1.0).asin()
    }
}

fn num(doc: &Value, field: &str) -> Option<f64> {
    doc.get(field).and_then(Value::as_f64)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Tours rated 4.5 or better, grouped by upper-cased difficulty, cheapest group first.
pub fn tour_stats(tours: &[Value]) -> Vec<Value> {
    #[derive(Default)]
    struct Group {
        num_tours: u64,
        num_ratings: f64,
        rating_sum: f64,
        price_sum: f64,
        min_price: Option<f64>,
        max_price: Option<f64>,
    }
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for tour in tours {
        if num(tour, "ratingsAverage").map(|r| r < 4.5).unwrap_or(true) {
            continue;
        }
        let difficulty = tour
            .get("difficulty")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_uppercase();
        let g = groups.entry(difficulty).or_default();
        let price = num(tour, "price").unwrap_or(0.0);
        g.num_tours += 1;
        g.num_ratings += num(tour, "ratingsQuantity").unwrap_or(0.0);
        g.rating_sum += num(tour, "ratingsAverage").unwrap_or(0.0);
        g.price_sum += price;
        g.min_price = Some(g.min_price.map_or(price, |m| m.min(price)));
        g.max_price = Some(g.max_price.map_or(price, |m| m.max(price)));
    }
    let mut stats: Vec<(f64, Value)> = groups
        .into_iter()
        .map(|(difficulty, g)| {
            let n = g.num_tours as f64;
            let avg_price = round2(g.price_sum / n);
            (
                avg_price,
                json!({
                    "difficulty": difficulty,
                    "numTours": g.num_tours,
                    "numRatings": g.num_ratings,
                    "avgRating": round2(g.rating_sum / n),
                    "avgPrice": avg_price,
                    "minPrice": g.min_price,
                    "maxPrice": g.max_price,
                }),
            )
        })
        .collect();
    stats.sort_by(|a, b| a.0.total_cmp(&b.0));
    stats.into_iter().map(|(_, v)| v).collect()
}

/// Tour starts per month of `year`, busiest month first, at most twelve entries.
pub fn monthly_plan(tours: &[Value], year: i32) -> Vec<Value> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in tours {
        let name = tour.get("name").and_then(Value::as_str).unwrap_or("").to_string();
        let dates = tour.get("startDates").and_then(Value::as_array).cloned().unwrap_or_default();
        for date in dates.iter().filter_map(Value::as_str).filter_map(parse_timestamp) {
            if date.year() == year {
                months.entry(date.month()).or_default().push(name.clone());
            }
        }
    }
    let mut plan: Vec<(u32, Vec<String>)> = months.into_iter().collect();
    plan.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
    plan.into_iter()
        .take(12)
        .map(|(month, tours)| json!({"month": month, "numTourStarts": tours.len(), "tours": tours}))
        .collect()
}

/// Tours whose start location lies inside the spherical cap of `distance` around `center`.
pub fn tours_within(tours: Vec<Value>, center: GeoPoint, distance: f64, unit: DistanceUnit) -> Vec<Value> {
    let radius = match unit {
        DistanceUnit::Miles => distance / EARTH_RADIUS_MI,
        DistanceUnit::Kilometers => distance / EARTH_RADIUS_KM,
    };
    tours
        .into_iter()
        .filter(|t| {
            t.get("startLocation")
                .and_then(GeoPoint::from_geojson)
                .map(|p| center.angle_to(&p) <= radius)
                .unwrap_or(false)
        })
        .collect()
}

/// Distance from `origin` to every tour start location, nearest first.
pub fn distances(tours: &[Value], origin: GeoPoint, unit: DistanceUnit) -> Vec<Value> {
    let multiplier = match unit {
        DistanceUnit::Miles => METERS_TO_MILES,
        DistanceUnit::Kilometers => METERS_TO_KM,
    };
    let mut out: Vec<(f64, Value)> = tours
        .iter()
        .filter_map(|t| {
            let point = t.get("startLocation").and_then(GeoPoint::from_geojson)?;
            let meters = origin.angle_to(&point) * EARTH_RADIUS_KM * 1000.0;
            let distance = meters * multiplier;
            Some((
                distance,
                json!({"id": t.get("id"), "name": t.get("name"), "distance": distance}),
            ))
        })
        .collect();
    out.sort_by(|a, b| a.0.total_cmp(&b.0));
    out.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour(name: &str, difficulty: &str, price: f64, rating: f64) -> Value {
        json!({"name": name, "difficulty": difficulty, "price": price, "ratingsAverage": rating, "ratingsQuantity": 10})
    }

    #[test]
    fn stats_group_by_difficulty_and_sort_by_price() {
        let tours = vec![
            tour("A", "difficult", 997.0, 4.8),
            tour("B", "easy", 397.0, 4.7),
            tour("C", "easy", 497.0, 4.9),
            tour("D", "medium", 1497.0, 4.0),
        ];
        let stats = tour_stats(&tours);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0]["difficulty"], json!("EASY"));
        assert_eq!(stats[0]["numTours"], json!(2));
        assert_eq!(stats[0]["avgPrice"], json!(447.0));
        assert_eq!(stats[0]["minPrice"], json!(397.0));
        assert_eq!(stats[1]["difficulty"], json!("DIFFICULT"));
    }

    #[test]
    fn monthly_plan_counts_starts_in_year() {
        let tours = vec![
            json!({"name": "A", "startDates": ["2021-04-25T09:00:00.000Z", "2021-07-20T09:00:00.000Z", "2022-04-01"]}),
            json!({"name": "B", "startDates": ["2021-07-05"]}),
        ];
        let plan = monthly_plan(&tours, 2021);
        assert_eq!(plan[0], json!({"month": 7, "numTourStarts": 2, "tours": ["A", "B"]}));
        assert_eq!(plan[1]["month"], json!(4));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn latlng_parsing() {
        assert_eq!(GeoPoint::parse("34.11,-118.11").unwrap(), GeoPoint { lat: 34.11, lng: -118.11 });
        assert!(GeoPoint::parse("34.11").is_err());
        assert!(GeoPoint::parse("north,west").is_err());
    }

    #[test]
    fn geo_queries_use_start_location() {
        let la = GeoPoint { lat: 34.05, lng: -118.24 };
        let tours = vec![
            json!({"id": "near", "name": "Near", "startLocation": {"type": "Point", "coordinates": [-118.3, 34.1]}}),
            json!({"id": "far", "name": "Far", "startLocation": {"type": "Point", "coordinates": [-73.98, 40.75]}}),
            json!({"id": "none", "name": "Nowhere"}),
        ];
        let within = tours_within(tours.clone(), la, 200.0, DistanceUnit::Miles);
        assert_eq!(within.len(), 1);
        assert_eq!(within[0]["id"], json!("near"));

        let ds = distances(&tours, la, DistanceUnit::Kilometers);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[0]["id"], json!("near"));
        let far_km = ds[1]["distance"].as_f64().unwrap();
        assert!((3900.0..4000.0).contains(&far_km), "LA to NYC was {far_km}");
    }
}
