//! Provenance types produced by the cleaning stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a record was removed. The serialized codes are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Duplicates,
    NullTimestamp,
    InvalidTimeOrder,
    ExcessiveDuration,
    TooShortDuration,
    NullLocation,
    InvalidPickupZoneId,
    InvalidDropoffZoneId,
    NegativeDistance,
    ExcessiveDistance,
    ZeroDistanceLongDuration,
    NegativeFareAmount,
    NegativeTotalAmount,
    ExcessiveFare,
    ZeroFareWithDistance,
    InvalidPassengerCount,
    MissingCriticalValues,
}

impl ExclusionReason {
    pub fn code(self) -> &'static str {
        match self {
            ExclusionReason::Duplicates => "duplicates",
            ExclusionReason::NullTimestamp => "null_timestamp",
            ExclusionReason::InvalidTimeOrder => "invalid_time_order",
            ExclusionReason::ExcessiveDuration => "excessive_duration",
            ExclusionReason::TooShortDuration => "too_short_duration",
            ExclusionReason::NullLocation => "null_location",
            ExclusionReason::InvalidPickupZoneId => "invalid_pickup_zone_id",
            ExclusionReason::InvalidDropoffZoneId => "invalid_dropoff_zone_id",
            ExclusionReason::NegativeDistance => "negative_distance",
            ExclusionReason::ExcessiveDistance => "excessive_distance",
            ExclusionReason::ZeroDistanceLongDuration => "zero_distance_long_duration",
            ExclusionReason::NegativeFareAmount => "negative_fare_amount",
            ExclusionReason::NegativeTotalAmount => "negative_total_amount",
            ExclusionReason::ExcessiveFare => "excessive_fare",
            ExclusionReason::ZeroFareWithDistance => "zero_fare_with_distance",
            ExclusionReason::InvalidPassengerCount => "invalid_passenger_count",
            ExclusionReason::MissingCriticalValues => "missing_critical_values",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExclusionReason::Duplicates => "Exact duplicate records",
            ExclusionReason::NullTimestamp => "Null or unparsable pickup or dropoff timestamp",
            ExclusionReason::InvalidTimeOrder => "Dropoff not after pickup",
            ExclusionReason::ExcessiveDuration => "Trip duration > 24 hours",
            ExclusionReason::TooShortDuration => "Trip duration < 1 minute",
            ExclusionReason::NullLocation => "Null pickup or dropoff location",
            ExclusionReason::InvalidPickupZoneId => "Invalid pickup_zone_id value",
            ExclusionReason::InvalidDropoffZoneId => "Invalid dropoff_zone_id value",
            ExclusionReason::NegativeDistance => "Negative trip distance",
            ExclusionReason::ExcessiveDistance => "Trip distance > 200 miles",
            ExclusionReason::ZeroDistanceLongDuration => "Zero distance but long duration",
            ExclusionReason::NegativeFareAmount => "Negative fare_amount",
            ExclusionReason::NegativeTotalAmount => "Negative total_amount",
            ExclusionReason::ExcessiveFare => "Total amount > $500",
            ExclusionReason::ZeroFareWithDistance => "Zero fare but significant distance",
            ExclusionReason::InvalidPassengerCount => "Passenger count not between 1-6",
            ExclusionReason::MissingCriticalValues => "Missing values in critical columns",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How many records one stage rule removed, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExclusionEvent {
    pub reason_code: ExclusionReason,
    pub human_description: String,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

impl ExclusionEvent {
    pub fn new(reason: ExclusionReason, count: usize) -> Self {
        Self {
            reason_code: reason,
            human_description: reason.description().to_string(),
            count,
            timestamp: Utc::now(),
        }
    }
}

/// Running counts for one cleaning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStatistics {
    pub original_count: usize,
    pub final_count: usize,
    pub exclusions_by_reason: BTreeMap<ExclusionReason, usize>,
}

impl CleaningStatistics {
    pub fn new(original_count: usize) -> Self {
        Self {
            original_count,
            final_count: original_count,
            exclusions_by_reason: BTreeMap::new(),
        }
    }

    /// Folds an event into the cumulative per-reason counts.
    pub fn record(&mut self, event: &ExclusionEvent) {
        *self.exclusions_by_reason.entry(event.reason_code).or_default() += event.count;
        self.final_count = self.final_count.saturating_sub(event.count);
    }

    pub fn total_excluded(&self) -> usize {
        self.exclusions_by_reason.values().sum()
    }

    pub fn excluded(&self, reason: ExclusionReason) -> usize {
        self.exclusions_by_reason.get(&reason).copied().unwrap_or(0)
    }

    /// Share of the original batch that survived, in percent.
    pub fn retention_rate(&self) -> f64 {
        pct(self.final_count, self.original_count)
    }

    /// Reasons ordered by descending count, ties broken by reason code.
    pub fn reasons_by_count(&self) -> Vec<(ExclusionReason, usize)> {
        let mut reasons: Vec<_> = self
            .exclusions_by_reason
            .iter()
            .map(|(r, c)| (*r, *c))
            .collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.code().cmp(b.0.code())));
        reasons
    }
}

pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}
