//! Taxi zone metadata supplied alongside a trip batch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Zone names containing any of these mark an airport zone. Case-sensitive.
pub const AIRPORT_KEYWORDS: [&str; 4] = ["Airport", "JFK", "LaGuardia", "Newark"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub borough: String,
    pub zone_name: String,
    pub service_zone: String,
}

impl Zone {
    /// The borough, or `None` when the lookup left it blank.
    pub fn known_borough(&self) -> Option<&str> {
        Some(self.borough.trim()).filter(|b| !b.is_empty())
    }

    pub fn is_airport(&self) -> bool {
        AIRPORT_KEYWORDS
            .iter()
            .any(|k| self.zone_name.contains(k))
    }
}

/// One row of `taxi_zone_lookup.csv`.
#[derive(Debug, Deserialize)]
pub(crate) struct ZoneRow {
    #[serde(rename = "LocationID")]
    pub(crate) location_id: u32,
    #[serde(rename = "Borough", default)]
    pub(crate) borough: Option<String>,
    #[serde(rename = "Zone", default)]
    pub(crate) zone: Option<String>,
    #[serde(default)]
    pub(crate) service_zone: Option<String>,
}

/// Zone id → zone metadata.
#[derive(Debug, Clone, Default)]
pub struct ZoneLookup {
    zones: HashMap<u32, Zone>,
}

impl ZoneLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, zone_id: u32, zone: Zone) {
        self.zones.insert(zone_id, zone);
    }

    pub fn get(&self, zone_id: u32) -> Option<&Zone> {
        self.zones.get(&zone_id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn borough_count(&self) -> usize {
        let mut boroughs: Vec<&str> = self.zones.values().map(|z| z.borough.as_str()).collect();
        boroughs.sort_unstable();
        boroughs.dedup();
        boroughs.len()
    }
}

impl FromIterator<(u32, Zone)> for ZoneLookup {
    fn from_iter<I: IntoIterator<Item = (u32, Zone)>>(iter: I) -> Self {
        Self {
            zones: iter.into_iter().collect(),
        }
    }
}

impl ZoneRow {
    pub(crate) fn into_entry(self) -> (u32, Zone) {
        (
            self.location_id,
            Zone {
                borough: self.borough.unwrap_or_default(),
                zone_name: self.zone.unwrap_or_default(),
                service_zone: self.service_zone.unwrap_or_default(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(borough: &str, name: &str) -> Zone {
        Zone {
            borough: borough.to_string(),
            zone_name: name.to_string(),
            service_zone: "Yellow Zone".to_string(),
        }
    }

    #[test]
    fn test_airport_detection() {
        assert!(zone("Queens", "JFK Airport").is_airport());
        assert!(zone("Queens", "LaGuardia Airport").is_airport());
        assert!(zone("EWR", "Newark Airport").is_airport());
        assert!(!zone("Manhattan", "Midtown Center").is_airport());
    }

    #[test]
    fn test_airport_detection_is_case_sensitive() {
        assert!(!zone("Queens", "jfk").is_airport());
        assert!(!zone("Queens", "AIRPORT").is_airport());
    }

    #[test]
    fn test_blank_borough_is_unknown() {
        assert_eq!(zone("Queens", "Astoria").known_borough(), Some("Queens"));
        assert_eq!(zone("", "NV").known_borough(), None);
        assert_eq!(zone("  ", "NV").known_borough(), None);
    }

    #[test]
    fn test_borough_count() {
        let lookup: ZoneLookup = [
            (1, zone("EWR", "Newark Airport")),
            (4, zone("Manhattan", "Alphabet City")),
            (13, zone("Manhattan", "Battery Park City")),
        ]
        .into_iter()
        .collect();

        assert_eq!(lookup.len(), 3);
        assert_eq!(lookup.borough_count(), 2);
        assert!(lookup.get(2).is_none());
    }
}
