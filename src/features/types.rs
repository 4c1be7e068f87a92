//! Derived attribute types attached to each cleaned trip.

use serde::Serialize;

use crate::features::categories::{DistanceCategory, DurationCategory, TimeOfDay, TipCategory};
use crate::record::CleanTrip;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TipFeatures {
    pub tip_percentage: f64,
    pub tip_category: TipCategory,
}

/// Features that need the zone lookup join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneFeatures {
    pub pickup_borough: Option<String>,
    pub pickup_zone: Option<String>,
    pub dropoff_borough: Option<String>,
    pub dropoff_zone: Option<String>,
    pub is_inter_borough: bool,
    pub from_manhattan: bool,
    pub to_manhattan: bool,
    pub from_airport: bool,
    pub to_airport: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedFeatures {
    pub pickup_hour: u32,
    /// 0 = Monday.
    pub pickup_day_of_week: u32,
    pub pickup_day_name: &'static str,
    pub pickup_month: u32,
    pub is_weekend: bool,
    pub time_of_day: TimeOfDay,
    pub is_rush_hour: bool,

    pub trip_duration_seconds: f64,
    pub trip_duration_minutes: f64,

    pub fare_per_mile: f64,
    pub revenue_per_minute: f64,
    /// `None` when the input carried no surcharge column.
    pub has_surcharge: Option<bool>,
    /// `None` when the input carried no tip column.
    pub tip: Option<TipFeatures>,

    pub average_speed_mph: f64,
    pub distance_category: DistanceCategory,
    pub duration_category: DurationCategory,
    pub is_congested: bool,

    /// `None` when no zone lookup was supplied.
    pub zones: Option<ZoneFeatures>,
}

/// A cleaned trip with its derived features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTrip {
    pub trip: CleanTrip,
    pub features: DerivedFeatures,
}
