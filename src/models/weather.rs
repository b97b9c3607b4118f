use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Weather classification derived from the pressure trend.
///
/// Barometer scale, left to right:
/// Stormy | Rain | Change | Fair | Dry
///
/// The ordinal is the stored/wire representation. Stormy, Rain and Change are
/// the storm tiers (falling pressure); Dry is rising pressure and Fair the
/// neutral default — the ordinal order is storage layout, not a severity
/// scale. Severity comparisons only make sense among the storm tiers, via
/// [`WeatherLevel::escalated_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherLevel {
    Stormy,
    Rain,
    Change,
    Fair,
    Dry,
}

impl Default for WeatherLevel {
    fn default() -> Self {
        WeatherLevel::Fair
    }
}

impl WeatherLevel {
    pub fn ordinal(self) -> i64 {
        match self {
            WeatherLevel::Stormy => 0,
            WeatherLevel::Rain => 1,
            WeatherLevel::Change => 2,
            WeatherLevel::Fair => 3,
            WeatherLevel::Dry => 4,
        }
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(WeatherLevel::Stormy),
            1 => Some(WeatherLevel::Rain),
            2 => Some(WeatherLevel::Change),
            3 => Some(WeatherLevel::Fair),
            4 => Some(WeatherLevel::Dry),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeatherLevel::Stormy => "STORMY",
            WeatherLevel::Rain => "RAIN",
            WeatherLevel::Change => "CHANGE",
            WeatherLevel::Fair => "FAIR",
            WeatherLevel::Dry => "DRY",
        }
    }

    pub fn is_storm_tier(self) -> bool {
        matches!(
            self,
            WeatherLevel::Change | WeatherLevel::Rain | WeatherLevel::Stormy
        )
    }

    /// Severity rank among the storm tiers; non-storm levels rank zero.
    fn storm_severity(self) -> u8 {
        match self {
            WeatherLevel::Stormy => 3,
            WeatherLevel::Rain => 2,
            WeatherLevel::Change => 1,
            WeatherLevel::Fair | WeatherLevel::Dry => 0,
        }
    }

    /// True when this level is a worse storm tier than `previous`.
    ///
    /// Scoped to the storm tiers: a move into or out of Dry is never an
    /// escalation, regardless of ordinal distance.
    pub fn escalated_from(self, previous: WeatherLevel) -> bool {
        self.storm_severity() > previous.storm_severity()
    }
}

impl fmt::Display for WeatherLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// The wire and storage representation is the ordinal.
impl Serialize for WeatherLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for WeatherLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        WeatherLevel::from_ordinal(value)
            .ok_or_else(|| de::Error::custom(format!("unknown weather level ordinal {value}")))
    }
}

/// Active display mode of the station front panel.
///
/// Owned by the display layer; the engine only stores and echoes it so status
/// consumers can see what the panel is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayMode {
    Temperature,
    Pressure,
    StormLevel,
}

impl Default for DisplayMode {
    fn default() -> Self {
        DisplayMode::Temperature
    }
}

impl DisplayMode {
    pub fn label(self) -> &'static str {
        match self {
            DisplayMode::Temperature => "TEMPERATURE",
            DisplayMode::Pressure => "PRESSURE",
            DisplayMode::StormLevel => "STORM_LEVEL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_round_trips() {
        for ordinal in 0..5 {
            let level = WeatherLevel::from_ordinal(ordinal).unwrap();
            assert_eq!(level.ordinal(), ordinal);
        }
        assert_eq!(WeatherLevel::from_ordinal(5), None);
        assert_eq!(WeatherLevel::from_ordinal(-1), None);
    }

    #[test]
    fn escalation_is_scoped_to_storm_tiers() {
        assert!(WeatherLevel::Rain.escalated_from(WeatherLevel::Change));
        assert!(WeatherLevel::Stormy.escalated_from(WeatherLevel::Fair));
        assert!(!WeatherLevel::Change.escalated_from(WeatherLevel::Rain));
        // Dry sits past Fair in ordinal order but is not a storm state.
        assert!(!WeatherLevel::Dry.escalated_from(WeatherLevel::Fair));
        assert!(!WeatherLevel::Fair.escalated_from(WeatherLevel::Dry));
        assert!(WeatherLevel::Change.escalated_from(WeatherLevel::Dry));
    }

    #[test]
    fn serializes_as_ordinal() {
        let json = serde_json::to_string(&WeatherLevel::Stormy).unwrap();
        assert_eq!(json, "0");
        let level: WeatherLevel = serde_json::from_str("4").unwrap();
        assert_eq!(level, WeatherLevel::Dry);
        assert!(serde_json::from_str::<WeatherLevel>("9").is_err());
    }
}
