//! CSV ingestion for trip batches and the zone lookup table.
//!
//! Trip files may be plain CSV or gzip-compressed (`.gz`). The whole batch is
//! materialized before it is handed to the pipeline.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;
use crate::record::{InputSchema, TripBatch, TripRecord};
use crate::zones::{ZoneLookup, ZoneRow};

fn open(path: &Path) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Reads a trip batch from any CSV source, keeping at most `limit` rows.
///
/// # Errors
///
/// Fails on unreadable input or on cells that cannot be parsed as their
/// field's numeric type. Unparsable timestamps are kept for the cleaning
/// stages to coerce.
pub fn read_trips<R: Read>(reader: R, limit: Option<usize>) -> Result<TripBatch> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let schema = InputSchema::from_headers(headers.iter());
    debug!(columns = headers.len(), ?schema, "Trip headers read");

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        if limit.is_some_and(|n| records.len() >= n) {
            break;
        }
        let record: TripRecord = result?;
        records.push(record.normalize_nulls());
    }

    Ok(TripBatch::new(schema, records))
}

/// Loads a trip batch from a `.csv` or `.csv.gz` file.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_trips(path: &Path, limit: Option<usize>) -> Result<TripBatch> {
    let batch = read_trips(open(path)?, limit)?;
    info!(rows = batch.len(), "Trip data loaded");
    Ok(batch)
}

pub fn read_zone_lookup<R: Read>(reader: R) -> Result<ZoneLookup> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut lookup = ZoneLookup::new();
    for result in rdr.deserialize() {
        let row: ZoneRow = result?;
        let (id, zone) = row.into_entry();
        lookup.insert(id, zone);
    }

    Ok(lookup)
}

/// Loads `taxi_zone_lookup.csv` (`LocationID,Borough,Zone,service_zone`).
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_zone_lookup(path: &Path) -> Result<ZoneLookup> {
    let lookup = read_zone_lookup(open(path)?)?;
    info!(
        zones = lookup.len(),
        boroughs = lookup.borough_count(),
        "Zone lookup loaded"
    );
    Ok(lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::record::Field;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const TRIPS: &str = "\
VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,RatecodeID,PULocationID,DOLocationID,fare_amount,extra,tip_amount,total_amount
1,2019-01-01 00:46:40,2019-01-01 00:53:20,1,1.5,1,151,239,7,0.5,1.65,9.95
1,2019-01-01 00:59:47,2019-01-01 01:18:59,1.0,2.6,1,239,246,14,0.5,1,16.3
2,garbage,2019-01-01 01:18:59,,NaN,1,239,246,14,0.5,,16.3
";

    #[test]
    fn test_read_trips_maps_columns() {
        let batch = read_trips(TRIPS.as_bytes(), None).unwrap();

        assert_eq!(batch.len(), 3);
        assert!(batch.schema.missing_required().is_empty());
        assert!(batch.schema.has(Field::TipAmount));

        let first = &batch.records[0];
        assert_eq!(first.pickup_time.as_deref(), Some("2019-01-01 00:46:40"));
        assert_eq!(first.pickup_zone_id, Some(151));
        assert_eq!(first.dropoff_zone_id, Some(239));
        assert_eq!(first.extra_surcharge, Some(0.5));
        assert_eq!(first.total_amount, Some(9.95));
        assert_eq!(first.trip_duration_seconds, None);
    }

    #[test]
    fn test_read_trips_accepts_integral_reals_and_nulls() {
        let batch = read_trips(TRIPS.as_bytes(), None).unwrap();

        assert_eq!(batch.records[1].passenger_count, Some(1));

        let third = &batch.records[2];
        assert_eq!(third.pickup_time.as_deref(), Some("garbage"));
        assert_eq!(third.passenger_count, None);
        assert_eq!(third.trip_distance, None);
        assert_eq!(third.tip_amount, None);
    }

    #[test]
    fn test_read_trips_respects_limit() {
        let batch = read_trips(TRIPS.as_bytes(), Some(2)).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_read_trips_partial_schema() {
        let csv = "tpep_pickup_datetime,tpep_dropoff_datetime,PULocationID\n\
                   2019-01-01 00:00:00,2019-01-01 00:10:00,4\n";
        let batch = read_trips(csv.as_bytes(), None).unwrap();

        assert_eq!(batch.len(), 1);
        assert!(batch.schema.missing_required().contains(&Field::FareAmount));
        assert_eq!(batch.records[0].fare_amount, None);
    }

    #[test]
    fn test_read_trips_rejects_non_numeric_cell() {
        let csv = "tpep_pickup_datetime,fare_amount\n2019-01-01 00:00:00,ten\n";
        let err = read_trips(csv.as_bytes(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Csv(_)));
    }

    #[test]
    fn test_load_trips_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trips.csv.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(TRIPS.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let batch = load_trips(&path, None).unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_read_zone_lookup() {
        let csv = "\"LocationID\",\"Borough\",\"Zone\",\"service_zone\"\n\
                   1,\"EWR\",\"Newark Airport\",\"EWR\"\n\
                   264,\"Unknown\",\"NV\",\"N/A\"\n\
                   265,\"Unknown\",,\n";
        let lookup = read_zone_lookup(csv.as_bytes()).unwrap();

        assert_eq!(lookup.len(), 3);
        let newark = lookup.get(1).unwrap();
        assert_eq!(newark.borough, "EWR");
        assert!(newark.is_airport());
        assert_eq!(lookup.get(265).unwrap().zone_name, "");
    }
}
