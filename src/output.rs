//! Output formatting and persistence for enriched trips and run statistics.
//!
//! Supports pretty-printing, JSON serialization, and CSV export.

use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cleaning::types::{CleaningStatistics, pct};
use crate::error::{PipelineError, Result};
use crate::features::types::{DerivedFeatures, EnrichedTrip};
use crate::record::CleanTrip;

/// Retention below this share of the input is worth a warning.
const LOW_RETENTION_PCT: f64 = 50.0;

/// Logs run statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &CleaningStatistics) {
    debug!("{:#?}", stats);
}

/// Logs run statistics as pretty-printed JSON.
pub fn print_json(stats: &CleaningStatistics) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Logs the cleaning summary: totals, then each reason by descending count.
pub fn log_summary(stats: &CleaningStatistics) {
    info!(
        original = stats.original_count,
        r#final = stats.final_count,
        excluded = stats.total_excluded(),
        retention_pct = format!("{:.2}", stats.retention_rate()),
        "Cleaning summary"
    );

    for (reason, count) in stats.reasons_by_count() {
        info!(
            reason = %reason,
            count,
            pct = format!("{:.2}", pct(count, stats.original_count)),
            "Exclusions"
        );
    }

    if stats.original_count > 0 && stats.retention_rate() < LOW_RETENTION_PCT {
        warn!(
            retention_pct = format!("{:.2}", stats.retention_rate()),
            "Less than half of the input survived cleaning"
        );
    }
}

/// Raw trip columns written ahead of the derived features.
pub const TRIP_COLUMNS: [&str; 11] = [
    "pickup_time",
    "dropoff_time",
    "pickup_zone_id",
    "dropoff_zone_id",
    "passenger_count",
    "ratecode_id",
    "trip_distance",
    "fare_amount",
    "extra_surcharge",
    "tip_amount",
    "total_amount",
];

fn flag(b: bool) -> String {
    u8::from(b).to_string()
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn trip_cells(t: &CleanTrip) -> [String; 11] {
    [
        t.pickup_time.to_string(),
        t.dropoff_time.to_string(),
        t.pickup_zone_id.to_string(),
        t.dropoff_zone_id.to_string(),
        cell(t.passenger_count),
        cell(t.ratecode_id),
        t.trip_distance.to_string(),
        t.fare_amount.to_string(),
        cell(t.extra_surcharge),
        cell(t.tip_amount),
        t.total_amount.to_string(),
    ]
}

/// Renders one derived column. `None` means the trip does not carry the
/// feature group the column belongs to.
fn feature_cell(f: &DerivedFeatures, column: &str) -> Option<String> {
    let tip = f.tip.as_ref();
    let zones = f.zones.as_ref();

    let value = match column {
        "pickup_hour" => f.pickup_hour.to_string(),
        "pickup_day_of_week" => f.pickup_day_of_week.to_string(),
        "pickup_day_name" => f.pickup_day_name.to_string(),
        "pickup_month" => f.pickup_month.to_string(),
        "is_weekend" => flag(f.is_weekend),
        "time_of_day" => f.time_of_day.to_string(),
        "is_rush_hour" => flag(f.is_rush_hour),
        "trip_duration_seconds" => f.trip_duration_seconds.to_string(),
        "trip_duration_minutes" => f.trip_duration_minutes.to_string(),
        "fare_per_mile" => f.fare_per_mile.to_string(),
        "revenue_per_minute" => f.revenue_per_minute.to_string(),
        "has_surcharge" => flag(f.has_surcharge?),
        "tip_percentage" => tip?.tip_percentage.to_string(),
        "tip_category" => tip?.tip_category.to_string(),
        "average_speed_mph" => f.average_speed_mph.to_string(),
        "distance_category" => f.distance_category.to_string(),
        "duration_category" => f.duration_category.to_string(),
        "is_congested" => flag(f.is_congested),
        "pickup_borough" => cell(zones?.pickup_borough.as_deref()),
        "pickup_zone" => cell(zones?.pickup_zone.as_deref()),
        "dropoff_borough" => cell(zones?.dropoff_borough.as_deref()),
        "dropoff_zone" => cell(zones?.dropoff_zone.as_deref()),
        "is_inter_borough" => flag(zones?.is_inter_borough),
        "from_manhattan" => flag(zones?.from_manhattan),
        "to_manhattan" => flag(zones?.to_manhattan),
        "from_airport" => flag(zones?.from_airport),
        "to_airport" => flag(zones?.to_airport),
        _ => return None,
    };
    Some(value)
}

/// Writes enriched trips as CSV: the raw trip columns, then exactly the
/// derived `features` (as listed by `FeatureEngine::features_created`).
/// Flags are written as 0/1. The header is written even for an empty batch.
pub fn write_enriched<W: Write>(
    writer: W,
    trips: &[EnrichedTrip],
    features: &[&str],
) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(TRIP_COLUMNS.iter().chain(features))?;

    let mut row = Vec::with_capacity(TRIP_COLUMNS.len() + features.len());
    for trip in trips {
        row.clear();
        row.extend(trip_cells(&trip.trip));
        for column in features {
            let value = feature_cell(&trip.features, column).ok_or_else(|| {
                PipelineError::Invariant(format!("trip has no value for feature {column}"))
            })?;
            row.push(value);
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes enriched trips to `path`, gzip-compressing when `gzip` is set.
#[tracing::instrument(skip(path, trips, features), fields(path = %path.display(), rows = trips.len()))]
pub fn write_enriched_file(
    path: &Path,
    trips: &[EnrichedTrip],
    features: &[&str],
    gzip: bool,
) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);

    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_enriched(&mut encoder, trips, features)?;
        encoder.finish()?.flush()?;
    } else {
        write_enriched(file, trips, features)?;
    }

    info!("Enriched trips written");
    Ok(())
}
