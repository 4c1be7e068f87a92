//! The fixed cleaning stages, in execution order.
//!
//! | # | Stage        | Reasons |
//! |---|--------------|---------|
//! | 1 | duplicates   | `duplicates` |
//! | 2 | temporal     | `null_timestamp`, `invalid_time_order`, `excessive_duration`, `too_short_duration` |
//! | 3 | location     | `null_location`, `invalid_pickup_zone_id`, `invalid_dropoff_zone_id` |
//! | 4 | distance     | `negative_distance`, `excessive_distance`, `zero_distance_long_duration` |
//! | 5 | fare         | `negative_fare_amount`, `negative_total_amount`, `excessive_fare`, `zero_fare_with_distance` |
//! | 6 | passengers   | `invalid_passenger_count` |
//! | 7 | null sweep   | `missing_critical_values` |
//!
//! Range rules only look at present values. Nulls are left to the rule that
//! names them, so a null distance surfaces as `missing_critical_values`.

use std::collections::HashSet;

use crate::cleaning::stage::{CleaningStage, Rule, RuleStage, StageContext, StageOutput};
use crate::cleaning::types::{ExclusionEvent, ExclusionReason};
use crate::record::{Field, TripRecord, parse_timestamp};

pub const MIN_DURATION_SECONDS: f64 = 60.0;
pub const MAX_DURATION_SECONDS: f64 = 86_400.0;
pub const MAX_ZONE_ID: i64 = 300;
pub const MAX_DISTANCE_MILES: f64 = 200.0;
/// A stationary trip longer than this is treated as a GPS failure.
pub const ZERO_DISTANCE_MAX_SECONDS: f64 = 300.0;
pub const MAX_TOTAL_AMOUNT: f64 = 500.0;
pub const ZERO_FARE_MAX_DISTANCE: f64 = 1.0;
pub const MIN_PASSENGERS: i64 = 1;
pub const MAX_PASSENGERS: i64 = 6;

/// The seven stages in their mandatory order.
pub fn standard_stages() -> Vec<Box<dyn CleaningStage>> {
    vec![
        Box::new(DuplicateStage),
        Box::new(temporal_stage()),
        Box::new(location_stage()),
        Box::new(distance_stage()),
        Box::new(fare_stage()),
        Box::new(passenger_stage()),
        Box::new(null_sweep_stage()),
    ]
}

/// Removes records whose raw fields all equal those of an earlier record.
pub struct DuplicateStage;

impl CleaningStage for DuplicateStage {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    fn apply(&self, records: Vec<TripRecord>, _ctx: &StageContext<'_>) -> StageOutput {
        let before = records.len();
        let mut seen = HashSet::with_capacity(before);
        let survivors: Vec<_> = records
            .into_iter()
            .filter(|r| seen.insert(r.raw_key()))
            .collect();

        let removed = before - survivors.len();
        let events = if removed > 0 {
            vec![ExclusionEvent::new(ExclusionReason::Duplicates, removed)]
        } else {
            Vec::new()
        };

        StageOutput { survivors, events }
    }
}

/// Coerces both timestamps and retains the trip duration for later stages.
pub fn coerce_timestamps(mut r: TripRecord) -> TripRecord {
    r.pickup_at = r.pickup_time.as_deref().and_then(parse_timestamp);
    r.dropoff_at = r.dropoff_time.as_deref().and_then(parse_timestamp);
    r.trip_duration_seconds = match (r.pickup_at, r.dropoff_at) {
        (Some(pickup), Some(dropoff)) => {
            Some((dropoff - pickup).num_milliseconds() as f64 / 1000.0)
        }
        _ => None,
    };
    r
}

fn null_timestamp(r: &TripRecord) -> bool {
    r.pickup_at.is_none() || r.dropoff_at.is_none()
}

fn invalid_time_order(r: &TripRecord) -> bool {
    matches!((r.pickup_at, r.dropoff_at), (Some(p), Some(d)) if d <= p)
}

fn excessive_duration(r: &TripRecord) -> bool {
    r.trip_duration_seconds
        .is_some_and(|s| s > MAX_DURATION_SECONDS)
}

fn too_short_duration(r: &TripRecord) -> bool {
    r.trip_duration_seconds
        .is_some_and(|s| s < MIN_DURATION_SECONDS)
}

pub fn temporal_stage() -> RuleStage {
    RuleStage::new(
        "temporal",
        vec![
            Rule::new(ExclusionReason::NullTimestamp, null_timestamp),
            Rule::new(ExclusionReason::InvalidTimeOrder, invalid_time_order),
            Rule::new(ExclusionReason::ExcessiveDuration, excessive_duration),
            Rule::new(ExclusionReason::TooShortDuration, too_short_duration),
        ],
    )
    .with_prepare(coerce_timestamps)
}

fn zone_out_of_range(zone_id: Option<i64>) -> bool {
    zone_id.is_some_and(|id| !(1..=MAX_ZONE_ID).contains(&id))
}

fn null_location(r: &TripRecord) -> bool {
    r.pickup_zone_id.is_none() || r.dropoff_zone_id.is_none()
}

fn invalid_pickup_zone(r: &TripRecord) -> bool {
    zone_out_of_range(r.pickup_zone_id)
}

fn invalid_dropoff_zone(r: &TripRecord) -> bool {
    zone_out_of_range(r.dropoff_zone_id)
}

pub fn location_stage() -> RuleStage {
    RuleStage::new(
        "location",
        vec![
            Rule::new(ExclusionReason::NullLocation, null_location),
            Rule::new(ExclusionReason::InvalidPickupZoneId, invalid_pickup_zone),
            Rule::new(ExclusionReason::InvalidDropoffZoneId, invalid_dropoff_zone),
        ],
    )
}

fn negative_distance(r: &TripRecord) -> bool {
    r.trip_distance.is_some_and(|d| d < 0.0)
}

fn excessive_distance(r: &TripRecord) -> bool {
    r.trip_distance.is_some_and(|d| d > MAX_DISTANCE_MILES)
}

fn zero_distance_long_duration(r: &TripRecord) -> bool {
    r.trip_distance == Some(0.0)
        && r
            .trip_duration_seconds
            .is_some_and(|s| s > ZERO_DISTANCE_MAX_SECONDS)
}

pub fn distance_stage() -> RuleStage {
    RuleStage::new(
        "distance",
        vec![
            Rule::new(ExclusionReason::NegativeDistance, negative_distance),
            Rule::new(ExclusionReason::ExcessiveDistance, excessive_distance),
            Rule::new(
                ExclusionReason::ZeroDistanceLongDuration,
                zero_distance_long_duration,
            ),
        ],
    )
}

fn negative_fare(r: &TripRecord) -> bool {
    r.fare_amount.is_some_and(|f| f < 0.0)
}

fn negative_total(r: &TripRecord) -> bool {
    r.total_amount.is_some_and(|t| t < 0.0)
}

fn excessive_fare(r: &TripRecord) -> bool {
    r.total_amount.is_some_and(|t| t > MAX_TOTAL_AMOUNT)
}

fn zero_fare_with_distance(r: &TripRecord) -> bool {
    r.fare_amount == Some(0.0)
        && r
            .trip_distance
            .is_some_and(|d| d > ZERO_FARE_MAX_DISTANCE)
}

pub fn fare_stage() -> RuleStage {
    RuleStage::new(
        "fare",
        vec![
            Rule::new(ExclusionReason::NegativeFareAmount, negative_fare),
            Rule::new(ExclusionReason::NegativeTotalAmount, negative_total),
            Rule::new(ExclusionReason::ExcessiveFare, excessive_fare),
            Rule::new(ExclusionReason::ZeroFareWithDistance, zero_fare_with_distance),
        ],
    )
}

// A null count is outside the range too.
fn invalid_passenger_count(r: &TripRecord) -> bool {
    !r.passenger_count
        .is_some_and(|p| (MIN_PASSENGERS..=MAX_PASSENGERS).contains(&p))
}

pub fn passenger_stage() -> RuleStage {
    RuleStage::new(
        "passengers",
        vec![Rule::new(
            ExclusionReason::InvalidPassengerCount,
            invalid_passenger_count,
        )],
    )
    .requiring(Field::PassengerCount)
}

fn missing_critical_values(r: &TripRecord) -> bool {
    Field::REQUIRED.iter().any(|f| r.is_null(*f))
}

pub fn null_sweep_stage() -> RuleStage {
    RuleStage::new(
        "null_sweep",
        vec![Rule::new(
            ExclusionReason::MissingCriticalValues,
            missing_critical_values,
        )],
    )
}
