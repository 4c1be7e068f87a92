//! Trip records as ingested, the input schema they came with, and the typed
//! view of a record that survived cleaning.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::PipelineError;

/// A raw TripRecord field, named independently of the source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PickupTime,
    DropoffTime,
    PickupZoneId,
    DropoffZoneId,
    TripDistance,
    FareAmount,
    TotalAmount,
    TipAmount,
    ExtraSurcharge,
    PassengerCount,
    RatecodeId,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::PickupTime,
        Field::DropoffTime,
        Field::PickupZoneId,
        Field::DropoffZoneId,
        Field::TripDistance,
        Field::FareAmount,
        Field::TotalAmount,
        Field::TipAmount,
        Field::ExtraSurcharge,
        Field::PassengerCount,
        Field::RatecodeId,
    ];

    /// Fields a batch must carry before any stage runs. Also the field set
    /// checked by the residual null sweep.
    pub const REQUIRED: [Field; 7] = [
        Field::PickupTime,
        Field::DropoffTime,
        Field::PickupZoneId,
        Field::DropoffZoneId,
        Field::TripDistance,
        Field::FareAmount,
        Field::TotalAmount,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::PickupTime => "pickup_time",
            Field::DropoffTime => "dropoff_time",
            Field::PickupZoneId => "pickup_zone_id",
            Field::DropoffZoneId => "dropoff_zone_id",
            Field::TripDistance => "trip_distance",
            Field::FareAmount => "fare_amount",
            Field::TotalAmount => "total_amount",
            Field::TipAmount => "tip_amount",
            Field::ExtraSurcharge => "extra_surcharge",
            Field::PassengerCount => "passenger_count",
            Field::RatecodeId => "ratecode_id",
        }
    }

    /// Column name used by TLC yellow-taxi trip files.
    pub fn column(self) -> &'static str {
        match self {
            Field::PickupTime => "tpep_pickup_datetime",
            Field::DropoffTime => "tpep_dropoff_datetime",
            Field::PickupZoneId => "PULocationID",
            Field::DropoffZoneId => "DOLocationID",
            Field::TripDistance => "trip_distance",
            Field::FareAmount => "fare_amount",
            Field::TotalAmount => "total_amount",
            Field::TipAmount => "tip_amount",
            Field::ExtraSurcharge => "extra",
            Field::PassengerCount => "passenger_count",
            Field::RatecodeId => "RatecodeID",
        }
    }

    pub fn from_column(column: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.column() == column)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of raw fields present in an input source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    fields: BTreeSet<Field>,
}

impl InputSchema {
    /// A schema carrying every field the record model knows about.
    pub fn full() -> Self {
        Field::ALL.into_iter().collect()
    }

    /// Builds a schema from a header row, ignoring unrelated columns.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        headers.into_iter().filter_map(Field::from_column).collect()
    }

    pub fn has(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    pub fn without(mut self, field: Field) -> Self {
        self.fields.remove(&field);
        self
    }

    /// Required fields absent from this schema, in declaration order.
    pub fn missing_required(&self) -> Vec<Field> {
        Field::REQUIRED
            .into_iter()
            .filter(|f| !self.has(*f))
            .collect()
    }
}

impl FromIterator<Field> for InputSchema {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// One observed trip as ingested. Any raw field may be null.
///
/// `trip_duration_seconds` and the coerced timestamps are not raw fields: the
/// temporal stage fills them on its survivors and later stages reuse them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TripRecord {
    #[serde(rename = "tpep_pickup_datetime", default)]
    pub pickup_time: Option<String>,
    #[serde(rename = "tpep_dropoff_datetime", default)]
    pub dropoff_time: Option<String>,
    #[serde(rename = "PULocationID", default, deserialize_with = "lenient_int")]
    pub pickup_zone_id: Option<i64>,
    #[serde(rename = "DOLocationID", default, deserialize_with = "lenient_int")]
    pub dropoff_zone_id: Option<i64>,
    #[serde(default)]
    pub trip_distance: Option<f64>,
    #[serde(default)]
    pub fare_amount: Option<f64>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub tip_amount: Option<f64>,
    #[serde(rename = "extra", default)]
    pub extra_surcharge: Option<f64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub passenger_count: Option<i64>,
    #[serde(rename = "RatecodeID", default, deserialize_with = "lenient_int")]
    pub ratecode_id: Option<i64>,

    #[serde(skip)]
    pub pickup_at: Option<NaiveDateTime>,
    #[serde(skip)]
    pub dropoff_at: Option<NaiveDateTime>,
    #[serde(skip)]
    pub trip_duration_seconds: Option<f64>,
}

/// Integer columns are sometimes exported as `1.0`; accept integral reals.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(v) if v.is_nan() => Ok(None),
        Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(Some(v as i64)),
        Some(v) => Err(serde::de::Error::custom(format!(
            "expected an integer, found {v}"
        ))),
    }
}

/// Hashable image of every raw field, used for exact-duplicate detection.
/// Reals compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawKey {
    times: (Option<String>, Option<String>),
    ints: [Option<i64>; 4],
    reals: [Option<u64>; 5],
}

impl TripRecord {
    pub fn raw_key(&self) -> RawKey {
        let bits = |v: Option<f64>| v.map(f64::to_bits);
        RawKey {
            times: (self.pickup_time.clone(), self.dropoff_time.clone()),
            ints: [
                self.pickup_zone_id,
                self.dropoff_zone_id,
                self.passenger_count,
                self.ratecode_id,
            ],
            reals: [
                bits(self.trip_distance),
                bits(self.fare_amount),
                bits(self.total_amount),
                bits(self.tip_amount),
                bits(self.extra_surcharge),
            ],
        }
    }

    /// Whether the raw value of `field` is null.
    pub fn is_null(&self, field: Field) -> bool {
        match field {
            Field::PickupTime => self.pickup_time.is_none(),
            Field::DropoffTime => self.dropoff_time.is_none(),
            Field::PickupZoneId => self.pickup_zone_id.is_none(),
            Field::DropoffZoneId => self.dropoff_zone_id.is_none(),
            Field::TripDistance => self.trip_distance.is_none(),
            Field::FareAmount => self.fare_amount.is_none(),
            Field::TotalAmount => self.total_amount.is_none(),
            Field::TipAmount => self.tip_amount.is_none(),
            Field::ExtraSurcharge => self.extra_surcharge.is_none(),
            Field::PassengerCount => self.passenger_count.is_none(),
            Field::RatecodeId => self.ratecode_id.is_none(),
        }
    }

    /// Maps `NaN` reals to null so every later check sees one notion of missing.
    pub fn normalize_nulls(mut self) -> Self {
        for value in [
            &mut self.trip_distance,
            &mut self.fare_amount,
            &mut self.total_amount,
            &mut self.tip_amount,
            &mut self.extra_surcharge,
        ] {
            if value.is_some_and(f64::is_nan) {
                *value = None;
            }
        }
        for value in [&mut self.pickup_time, &mut self.dropoff_time] {
            if value.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *value = None;
            }
        }
        self
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Coerces a raw timestamp. Returns `None` for anything unparsable.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// A fully materialized input batch together with the schema it was read with.
#[derive(Debug, Clone, Default)]
pub struct TripBatch {
    pub schema: InputSchema,
    pub records: Vec<TripRecord>,
}

impl TripBatch {
    pub fn new(schema: InputSchema, records: Vec<TripRecord>) -> Self {
        Self { schema, records }
    }

    /// A batch built in memory, where every field is considered present.
    pub fn from_records(records: Vec<TripRecord>) -> Self {
        Self::new(InputSchema::full(), records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A record that survived cleaning, with every critical field present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanTrip {
    pub pickup_time: NaiveDateTime,
    pub dropoff_time: NaiveDateTime,
    pub pickup_zone_id: u32,
    pub dropoff_zone_id: u32,
    pub trip_distance: f64,
    pub fare_amount: f64,
    pub total_amount: f64,
    pub tip_amount: Option<f64>,
    pub extra_surcharge: Option<f64>,
    pub passenger_count: Option<i64>,
    pub ratecode_id: Option<i64>,
    pub trip_duration_seconds: f64,
}

impl TryFrom<TripRecord> for CleanTrip {
    type Error = PipelineError;

    fn try_from(r: TripRecord) -> Result<Self, Self::Error> {
        fn need<T>(value: Option<T>, what: &str) -> Result<T, PipelineError> {
            value.ok_or_else(|| PipelineError::Invariant(format!("survivor has no {what}")))
        }
        fn zone(value: Option<i64>, what: &str) -> Result<u32, PipelineError> {
            let id = need(value, what)?;
            u32::try_from(id)
                .map_err(|_| PipelineError::Invariant(format!("survivor {what} {id} out of range")))
        }

        Ok(CleanTrip {
            pickup_time: need(r.pickup_at, "coerced pickup time")?,
            dropoff_time: need(r.dropoff_at, "coerced dropoff time")?,
            pickup_zone_id: zone(r.pickup_zone_id, "pickup zone id")?,
            dropoff_zone_id: zone(r.dropoff_zone_id, "dropoff zone id")?,
            trip_distance: need(r.trip_distance, "trip distance")?,
            fare_amount: need(r.fare_amount, "fare amount")?,
            total_amount: need(r.total_amount, "total amount")?,
            tip_amount: r.tip_amount,
            extra_surcharge: r.extra_surcharge,
            passenger_count: r.passenger_count,
            ratecode_id: r.ratecode_id,
            trip_duration_seconds: need(r.trip_duration_seconds, "trip duration")?,
        })
    }
}
