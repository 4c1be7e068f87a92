//! Categorical buckets for derived features. All ranges are half-open.

use serde::Serialize;
use std::fmt;

macro_rules! labelled {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labelled!(TimeOfDay {
    Morning => "Morning",
    Afternoon => "Afternoon",
    Evening => "Evening",
    Night => "Night",
});

labelled!(TipCategory {
    NoTip => "No Tip",
    Low => "Low Tip",
    Standard => "Standard Tip",
    Generous => "Generous Tip",
});

labelled!(DistanceCategory {
    VeryShort => "Very Short",
    Short => "Short",
    Medium => "Medium",
    Long => "Long",
});

labelled!(DurationCategory {
    Quick => "Quick",
    Short => "Short",
    Medium => "Medium",
    Long => "Long",
});

/// | Hour    | Bucket    |
/// |---------|-----------|
/// | 6–11    | Morning   |
/// | 12–16   | Afternoon |
/// | 17–20   | Evening   |
/// | other   | Night     |
pub fn time_of_day(hour: u32) -> TimeOfDay {
    match hour {
        6..=11 => TimeOfDay::Morning,
        12..=16 => TimeOfDay::Afternoon,
        17..=20 => TimeOfDay::Evening,
        _ => TimeOfDay::Night,
    }
}

/// Weekday (0 = Monday) mornings 7–9 and evenings 17–19, inclusive.
pub fn is_rush_hour(day_of_week: u32, hour: u32) -> bool {
    day_of_week < 5 && matches!(hour, 7..=9 | 17..=19)
}

/// Buckets a tip percentage: exactly 0 is no tip, then `(0,15)`, `[15,20)`,
/// `[20,∞)`. Negative percentages fall in the low bucket.
pub fn tip_category(pct: f64) -> TipCategory {
    match pct {
        p if p == 0.0 => TipCategory::NoTip,
        p if p < 15.0 => TipCategory::Low,
        p if p < 20.0 => TipCategory::Standard,
        _ => TipCategory::Generous,
    }
}

/// Miles: `<1`, `[1,3)`, `[3,10)`, `≥10`.
pub fn distance_category(miles: f64) -> DistanceCategory {
    match miles {
        d if d < 1.0 => DistanceCategory::VeryShort,
        d if d < 3.0 => DistanceCategory::Short,
        d if d < 10.0 => DistanceCategory::Medium,
        _ => DistanceCategory::Long,
    }
}

/// Minutes: `<10`, `[10,20)`, `[20,40)`, `≥40`.
pub fn duration_category(minutes: f64) -> DurationCategory {
    match minutes {
        m if m < 10.0 => DurationCategory::Quick,
        m if m < 20.0 => DurationCategory::Short,
        m if m < 40.0 => DurationCategory::Medium,
        _ => DurationCategory::Long,
    }
}
