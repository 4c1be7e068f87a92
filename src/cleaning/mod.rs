//! Cleaning stage engine.
//!
//! Runs the fixed stage sequence over a materialized batch. Each stage sees
//! exactly the survivors of the stage before it, so a record is excluded at
//! most once and `final_count = original_count - Σ exclusions` holds for
//! every run.

pub mod stage;
pub mod stages;
pub mod types;

use tracing::{debug, info};

use crate::error::SchemaError;
use crate::record::{InputSchema, TripBatch, TripRecord};
use stage::{CleaningStage, StageContext};
use types::{CleaningStatistics, ExclusionEvent};

pub const DEFAULT_PARALLEL_THRESHOLD: usize = 50_000;

/// Result of one cleaning run.
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub schema: InputSchema,
    pub survivors: Vec<TripRecord>,
    pub events: Vec<ExclusionEvent>,
    pub statistics: CleaningStatistics,
}

pub struct CleaningEngine {
    stages: Vec<Box<dyn CleaningStage>>,
    parallel_threshold: usize,
}

impl Default for CleaningEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CleaningEngine {
    pub fn new() -> Self {
        Self {
            stages: stages::standard_stages(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Batches at least this large have their per-record rules evaluated in
    /// parallel. `usize::MAX` keeps everything on the calling thread.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingFields`] before any stage runs when the
    /// batch schema lacks a required field.
    #[tracing::instrument(skip_all, fields(records = batch.len()))]
    pub fn run(&self, batch: TripBatch) -> Result<CleaningOutcome, SchemaError> {
        let TripBatch { schema, records } = batch;

        let missing = schema.missing_required();
        if !missing.is_empty() {
            return Err(SchemaError::MissingFields(missing));
        }

        let mut statistics = CleaningStatistics::new(records.len());
        let mut events = Vec::new();
        // NaN reals count as null for every stage.
        let mut survivors: Vec<TripRecord> = records
            .into_iter()
            .map(TripRecord::normalize_nulls)
            .collect();

        for stage in &self.stages {
            let ctx = StageContext {
                schema: &schema,
                statistics: &statistics,
                parallel_threshold: self.parallel_threshold,
            };
            let before = survivors.len();
            let output = stage.apply(survivors, &ctx);
            survivors = output.survivors;

            for event in &output.events {
                debug!(
                    stage = stage.name(),
                    reason = %event.reason_code,
                    count = event.count,
                    "Records excluded"
                );
                statistics.record(event);
            }
            events.extend(output.events);

            info!(
                stage = stage.name(),
                removed = before - survivors.len(),
                remaining = survivors.len(),
                "Stage complete"
            );
        }

        debug_assert_eq!(statistics.final_count, survivors.len());

        Ok(CleaningOutcome {
            schema,
            survivors,
            events,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;
    use types::ExclusionReason;

    fn trip(pickup: &str, dropoff: &str, passengers: i64) -> TripRecord {
        TripRecord {
            pickup_time: Some(pickup.to_string()),
            dropoff_time: Some(dropoff.to_string()),
            pickup_zone_id: Some(142),
            dropoff_zone_id: Some(236),
            trip_distance: Some(2.1),
            fare_amount: Some(10.5),
            total_amount: Some(13.3),
            tip_amount: Some(2.0),
            extra_surcharge: Some(0.5),
            passenger_count: Some(passengers),
            ratecode_id: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_schema_error_before_any_stage() {
        let schema = InputSchema::full()
            .without(Field::FareAmount)
            .without(Field::DropoffZoneId);
        let batch = TripBatch::new(schema, vec![TripRecord::default()]);

        let err = CleaningEngine::new().run(batch).unwrap_err();

        assert_eq!(
            err,
            SchemaError::MissingFields(vec![Field::DropoffZoneId, Field::FareAmount])
        );
    }

    #[test]
    fn test_empty_batch() {
        let outcome = CleaningEngine::new()
            .run(TripBatch::from_records(Vec::new()))
            .unwrap();

        assert!(outcome.survivors.is_empty());
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.statistics.original_count, 0);
        assert_eq!(outcome.statistics.final_count, 0);
    }

    #[test]
    fn test_counts_balance() {
        let records = vec![
            trip("2019-01-07 08:00:00", "2019-01-07 08:12:00", 1),
            trip("2019-01-07 08:00:00", "2019-01-07 08:12:00", 1),
            trip("2019-01-07 09:00:00", "2019-01-07 08:12:00", 1),
            trip("2019-01-07 10:00:00", "2019-01-07 10:00:30", 2),
            trip("2019-01-07 11:00:00", "2019-01-07 11:20:00", 7),
            trip("2019-01-07 12:00:00", "2019-01-07 12:20:00", 3),
        ];

        let outcome = CleaningEngine::new().run(TripBatch::from_records(records)).unwrap();
        let stats = &outcome.statistics;

        assert_eq!(stats.original_count, 6);
        assert_eq!(stats.final_count, 2);
        assert_eq!(stats.final_count, stats.original_count - stats.total_excluded());
        assert_eq!(outcome.survivors.len(), 2);
        assert_eq!(stats.excluded(ExclusionReason::TooShortDuration), 1);
    }

    #[test]
    fn test_nan_critical_values_are_swept_as_nulls() {
        let mut bad = trip("2019-01-07 08:00:00", "2019-01-07 08:12:00", 1);
        bad.trip_distance = Some(f64::NAN);
        bad.fare_amount = Some(f64::NAN);
        let good = trip("2019-01-07 09:00:00", "2019-01-07 09:12:00", 1);

        let outcome = CleaningEngine::new()
            .run(TripBatch::from_records(vec![bad, good.clone()]))
            .unwrap();

        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.survivors[0].pickup_time, good.pickup_time);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(
            outcome.events[0].reason_code,
            ExclusionReason::MissingCriticalValues
        );
    }

    #[test]
    fn test_stage_names_follow_fixed_order() {
        assert_eq!(
            CleaningEngine::new().stage_names(),
            vec![
                "duplicates",
                "temporal",
                "location",
                "distance",
                "fare",
                "passengers",
                "null_sweep"
            ]
        );
    }

    #[test]
    fn test_parallel_threshold_does_not_change_outcome() {
        let records: Vec<_> = (0..200)
            .map(|i| {
                let minute = i % 60;
                trip(
                    &format!("2019-01-07 08:{minute:02}:00"),
                    "2019-01-07 09:30:00",
                    i % 8,
                )
            })
            .collect();

        let sequential = CleaningEngine::new()
            .with_parallel_threshold(usize::MAX)
            .run(TripBatch::from_records(records.clone()))
            .unwrap();
        let parallel = CleaningEngine::new()
            .with_parallel_threshold(0)
            .run(TripBatch::from_records(records))
            .unwrap();

        assert_eq!(sequential.survivors, parallel.survivors);
        assert_eq!(sequential.statistics, parallel.statistics);
    }
}
