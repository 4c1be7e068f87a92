//! Feature derivation engine.
//!
//! Pure, per-record arithmetic over cleaned trips. Never removes a record and
//! never fails: degenerate divisions resolve to 0 through [`guarded_div`].
//!
//! Optional feature groups follow the input capabilities:
//! - tip features only when the batch carried `tip_amount`
//! - `has_surcharge` only when the batch carried `extra_surcharge`
//! - zone-relationship features only when a [`ZoneLookup`] is supplied

pub mod categories;
pub mod types;
pub mod utility;

use chrono::{Datelike, Timelike, Weekday};
use rayon::prelude::*;
use tracing::info;

use crate::cleaning::DEFAULT_PARALLEL_THRESHOLD;
use crate::record::{CleanTrip, Field, InputSchema};
use crate::zones::{Zone, ZoneLookup};
use categories::{
    distance_category, duration_category, is_rush_hour, time_of_day, tip_category,
};
use types::{DerivedFeatures, EnrichedTrip, TipFeatures, ZoneFeatures};
pub use utility::guarded_div;

pub const MAX_AVERAGE_SPEED_MPH: f64 = 80.0;
pub const CONGESTION_SPEED_MPH: f64 = 10.0;
const MANHATTAN: &str = "Manhattan";

pub struct FeatureEngine<'a> {
    has_tip: bool,
    has_surcharge: bool,
    zones: Option<&'a ZoneLookup>,
    parallel_threshold: usize,
}

impl<'a> FeatureEngine<'a> {
    pub fn new(schema: &InputSchema, zones: Option<&'a ZoneLookup>) -> Self {
        Self {
            has_tip: schema.has(Field::TipAmount),
            has_surcharge: schema.has(Field::ExtraSurcharge),
            zones,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Names of the derived columns this engine produces.
    pub fn features_created(&self) -> Vec<&'static str> {
        let mut names = vec![
            "pickup_hour",
            "pickup_day_of_week",
            "pickup_day_name",
            "pickup_month",
            "is_weekend",
            "time_of_day",
            "is_rush_hour",
            "trip_duration_seconds",
            "trip_duration_minutes",
            "fare_per_mile",
            "revenue_per_minute",
        ];
        if self.has_surcharge {
            names.push("has_surcharge");
        }
        if self.has_tip {
            names.extend(["tip_percentage", "tip_category"]);
        }
        names.extend([
            "average_speed_mph",
            "distance_category",
            "duration_category",
            "is_congested",
        ]);
        if self.zones.is_some() {
            names.extend([
                "pickup_borough",
                "pickup_zone",
                "dropoff_borough",
                "dropoff_zone",
                "is_inter_borough",
                "from_manhattan",
                "to_manhattan",
                "from_airport",
                "to_airport",
            ]);
        }
        names
    }

    /// Attaches derived features to every trip, preserving order.
    #[tracing::instrument(skip_all, fields(records = trips.len()))]
    pub fn enrich(&self, trips: Vec<CleanTrip>) -> Vec<EnrichedTrip> {
        let attach = |trip: CleanTrip| {
            let features = self.derive(&trip);
            EnrichedTrip { trip, features }
        };

        let enriched: Vec<_> = if trips.len() >= self.parallel_threshold {
            trips.into_par_iter().map(attach).collect()
        } else {
            trips.into_iter().map(attach).collect()
        };

        info!(
            records = enriched.len(),
            features = self.features_created().len(),
            "Features derived"
        );
        enriched
    }

    pub fn derive(&self, trip: &CleanTrip) -> DerivedFeatures {
        let pickup = trip.pickup_time;
        let hour = pickup.hour();
        let day_of_week = pickup.weekday().num_days_from_monday();

        let duration_seconds = trip.trip_duration_seconds;
        let duration_minutes = duration_seconds / 60.0;
        let average_speed_mph = average_speed_mph(trip.trip_distance, duration_seconds);

        DerivedFeatures {
            pickup_hour: hour,
            pickup_day_of_week: day_of_week,
            pickup_day_name: day_name(pickup.weekday()),
            pickup_month: pickup.month(),
            is_weekend: day_of_week >= 5,
            time_of_day: time_of_day(hour),
            is_rush_hour: is_rush_hour(day_of_week, hour),

            trip_duration_seconds: duration_seconds,
            trip_duration_minutes: duration_minutes,

            fare_per_mile: guarded_div(trip.fare_amount, trip.trip_distance),
            revenue_per_minute: guarded_div(trip.total_amount, duration_minutes),
            has_surcharge: self
                .has_surcharge
                .then(|| trip.extra_surcharge.is_some_and(|e| e > 0.0)),
            tip: self.has_tip.then(|| tip_features(trip)),

            average_speed_mph,
            distance_category: distance_category(trip.trip_distance),
            duration_category: duration_category(duration_minutes),
            is_congested: average_speed_mph < CONGESTION_SPEED_MPH,

            zones: self.zones.map(|lookup| zone_features(trip, lookup)),
        }
    }
}

/// Distance over duration in hours, 0 for a zero duration, clamped to
/// [`MAX_AVERAGE_SPEED_MPH`].
pub fn average_speed_mph(distance_miles: f64, duration_seconds: f64) -> f64 {
    guarded_div(distance_miles, duration_seconds / 3600.0).min(MAX_AVERAGE_SPEED_MPH)
}

fn tip_features(trip: &CleanTrip) -> TipFeatures {
    let tip = trip.tip_amount.unwrap_or(0.0);
    let tip_percentage = guarded_div(tip, trip.fare_amount) * 100.0;
    TipFeatures {
        tip_percentage,
        tip_category: tip_category(tip_percentage),
    }
}

fn zone_features(trip: &CleanTrip, lookup: &ZoneLookup) -> ZoneFeatures {
    let pickup = lookup.get(trip.pickup_zone_id);
    let dropoff = lookup.get(trip.dropoff_zone_id);

    let pickup_borough = pickup.and_then(Zone::known_borough);
    let dropoff_borough = dropoff.and_then(Zone::known_borough);
    let is_airport = |z: Option<&Zone>| z.is_some_and(Zone::is_airport);

    // Unknown boroughs never compare equal, not even to each other.
    let is_inter_borough = match (pickup_borough, dropoff_borough) {
        (Some(p), Some(d)) => p != d,
        _ => true,
    };

    ZoneFeatures {
        pickup_borough: pickup_borough.map(str::to_string),
        pickup_zone: pickup.map(|z| z.zone_name.clone()),
        dropoff_borough: dropoff_borough.map(str::to_string),
        dropoff_zone: dropoff.map(|z| z.zone_name.clone()),
        is_inter_borough,
        from_manhattan: pickup_borough == Some(MANHATTAN),
        to_manhattan: dropoff_borough == Some(MANHATTAN),
        from_airport: is_airport(pickup),
        to_airport: is_airport(dropoff),
    }
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
