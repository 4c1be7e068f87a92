//! Cleaning → provenance → feature derivation, over one materialized batch.
//!
//! The pipeline does no loading and no persistence of its own. Exclusion
//! provenance goes to the injected [`ExclusionSink`]; the enriched batch is
//! returned whole.

use serde::Serialize;
use tracing::info;

use crate::cleaning::CleaningEngine;
use crate::cleaning::types::{CleaningStatistics, ExclusionEvent};
use crate::error::Result;
use crate::exclusion_log::ExclusionSink;
use crate::features::FeatureEngine;
use crate::features::types::EnrichedTrip;
use crate::record::{CleanTrip, TripBatch};
use crate::zones::ZoneLookup;

/// Everything a run hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub enriched: Vec<EnrichedTrip>,
    pub events: Vec<ExclusionEvent>,
    pub statistics: CleaningStatistics,
    pub features_created: Vec<&'static str>,
}

pub struct Pipeline {
    engine: CleaningEngine,
    parallel_threshold: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(crate::cleaning::DEFAULT_PARALLEL_THRESHOLD)
    }
}

impl Pipeline {
    pub fn new(parallel_threshold: usize) -> Self {
        Self {
            engine: CleaningEngine::new().with_parallel_threshold(parallel_threshold),
            parallel_threshold,
        }
    }

    /// Cleans `batch`, publishes its exclusion events and summary to `sink`,
    /// then derives features for every survivor.
    ///
    /// # Errors
    ///
    /// A missing required field fails the run before any stage executes and
    /// before anything reaches the sink. Sink failures are propagated.
    #[tracing::instrument(skip_all, fields(records = batch.len(), zones = zones.is_some()))]
    pub fn run(
        &self,
        batch: TripBatch,
        zones: Option<&ZoneLookup>,
        sink: &mut dyn ExclusionSink,
    ) -> Result<PipelineOutput> {
        let outcome = self.engine.run(batch)?;

        let trips = outcome
            .survivors
            .into_iter()
            .map(CleanTrip::try_from)
            .collect::<Result<Vec<_>>>()?;

        for event in &outcome.events {
            sink.append_exclusion_event(event)?;
        }
        sink.write_run_summary(&outcome.statistics, &outcome.events)?;

        let features = FeatureEngine::new(&outcome.schema, zones)
            .with_parallel_threshold(self.parallel_threshold);
        let features_created = features.features_created();
        let enriched = features.enrich(trips);

        info!(
            original = outcome.statistics.original_count,
            r#final = outcome.statistics.final_count,
            events = outcome.events.len(),
            features = features_created.len(),
            "Pipeline complete"
        );

        Ok(PipelineOutput {
            enriched,
            events: outcome.events,
            statistics: outcome.statistics,
            features_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::types::ExclusionReason;
    use crate::error::{PipelineError, SchemaError};
    use crate::exclusion_log::{MemorySink, NullSink};
    use crate::record::{Field, InputSchema, TripRecord};

    fn trip(distance: f64) -> TripRecord {
        TripRecord {
            pickup_time: Some("2019-01-07 08:00:00".to_string()),
            dropoff_time: Some("2019-01-07 08:20:00".to_string()),
            pickup_zone_id: Some(142),
            dropoff_zone_id: Some(236),
            trip_distance: Some(distance),
            fare_amount: Some(14.0),
            total_amount: Some(18.0),
            tip_amount: Some(2.1),
            extra_surcharge: Some(0.5),
            passenger_count: Some(1),
            ratecode_id: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_publishes_events_then_summary() {
        let batch = TripBatch::from_records(vec![trip(3.0), trip(3.0), trip(250.0), trip(4.0)]);
        let mut sink = MemorySink::default();

        let out = Pipeline::default().run(batch, None, &mut sink).unwrap();

        assert_eq!(out.enriched.len(), 2);
        assert_eq!(sink.events, out.events);
        let reasons: Vec<_> = out.events.iter().map(|e| e.reason_code).collect();
        assert_eq!(
            reasons,
            vec![ExclusionReason::Duplicates, ExclusionReason::ExcessiveDistance]
        );
        let summary = sink.summary.unwrap();
        assert_eq!(summary.original_count, 4);
        assert_eq!(summary.final_count, 2);
    }

    #[test]
    fn test_schema_error_reaches_nothing() {
        let schema = InputSchema::full().without(Field::TotalAmount);
        let batch = TripBatch::new(schema, vec![trip(3.0)]);
        let mut sink = MemorySink::default();

        let err = Pipeline::default().run(batch, None, &mut sink).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Schema(SchemaError::MissingFields(ref f)) if f == &[Field::TotalAmount]
        ));
        assert!(sink.events.is_empty());
        assert!(sink.summary.is_none());
    }

    #[test]
    fn test_enriched_trips_reuse_cleaned_duration() {
        let batch = TripBatch::from_records(vec![trip(5.0)]);
        let out = Pipeline::default().run(batch, None, &mut NullSink).unwrap();

        let e = &out.enriched[0];
        assert_eq!(e.trip.trip_duration_seconds, 1200.0);
        assert_eq!(e.features.trip_duration_minutes, 20.0);
        assert_eq!(e.features.average_speed_mph, 15.0);
        assert!(out.features_created.contains(&"tip_category"));
        assert!(!out.features_created.contains(&"to_airport"));
    }

    #[test]
    fn test_nan_distance_never_reaches_features() {
        let batch = TripBatch::from_records(vec![trip(f64::NAN), trip(2.0)]);
        let mut sink = MemorySink::default();

        let out = Pipeline::default().run(batch, None, &mut sink).unwrap();

        assert_eq!(out.enriched.len(), 1);
        assert_eq!(out.enriched[0].trip.trip_distance, 2.0);
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].reason_code, ExclusionReason::MissingCriticalValues);
    }

    #[test]
    fn test_parallel_and_sequential_runs_agree() {
        let records: Vec<_> = (0..200).map(|i| trip(f64::from(i % 220))).collect();

        let seq = Pipeline::new(usize::MAX)
            .run(TripBatch::from_records(records.clone()), None, &mut NullSink)
            .unwrap();
        let par = Pipeline::new(0)
            .run(TripBatch::from_records(records), None, &mut NullSink)
            .unwrap();

        assert_eq!(seq.statistics, par.statistics);
        assert_eq!(seq.enriched, par.enriched);
    }
}
