//! A minimal human-readable duration, e.g. `"15m"`, `"168h"`. `spec.md` §6
//! contracts every interval as a short suffixed string; a dependency on a
//! full calendar-duration crate would be overkill for "number + unit".

use std::fmt;
use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        let split_at = input
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("duration {input:?} is missing a unit suffix"))?;
        let (digits, unit) = input.split_at(split_at);
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("duration {input:?} has a non-numeric magnitude"))?;
        let seconds = match unit {
            "s" => value,
            "m" => value * 60,
            "h" => value * 3600,
            "d" => value * 86_400,
            other => return Err(format!("duration {input:?} has unknown unit {other:?}")),
        };
        Ok(HumanDuration(Duration::from_secs(seconds)))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}

impl From<HumanDuration> for Duration {
    fn from(value: HumanDuration) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        HumanDuration::parse(&raw).map_err(de::Error::custom)
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
