//! Common types for Cadence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Unique identifier for campaign owners
pub type OwnerId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for recipients
pub type RecipientId = Uuid;

/// Unique identifier for campaign messages
pub type MessageId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// A wall-clock time of day with minute resolution, parsed from `HH:MM`.
///
/// Used for business-hour bounds and one-shot pause triggers. Comparisons
/// happen on the minute-of-day value in the campaign timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    /// Create a time of day from hour and minute
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self {
                minutes: (hour * 60 + minute) as u16,
            })
        } else {
            None
        }
    }

    /// Parse a `HH:MM` string
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.split_once(':')?;
        let hour: u32 = h.parse().ok()?;
        let minute: u32 = m.parse().ok()?;
        Self::new(hour, minute)
    }

    /// Minutes since midnight
    pub fn minute_of_day(&self) -> u32 {
        self.minutes as u32
    }

    /// Hour component
    pub fn hour(&self) -> u32 {
        self.minutes as u32 / 60
    }

    /// Minute component
    pub fn minute(&self) -> u32 {
        self.minutes as u32 % 60
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| crate::Error::Validation(format!("Invalid time of day: {}", s)))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TimeOfDay::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid HH:MM time: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_parse() {
        let t = TimeOfDay::parse("08:30").unwrap();
        assert_eq!(t.hour(), 8);
        assert_eq!(t.minute(), 30);
        assert_eq!(t.minute_of_day(), 510);
        assert_eq!(t.to_string(), "08:30");
    }

    #[test]
    fn test_time_of_day_bounds() {
        assert!(TimeOfDay::parse("00:00").is_some());
        assert!(TimeOfDay::parse("23:59").is_some());
        assert!(TimeOfDay::parse("24:00").is_none());
        assert!(TimeOfDay::parse("12:60").is_none());
        assert!(TimeOfDay::parse("noon").is_none());
        assert!(TimeOfDay::parse("12").is_none());
    }

    #[test]
    fn test_time_of_day_ordering() {
        let morning = TimeOfDay::parse("08:00").unwrap();
        let evening = TimeOfDay::parse("18:00").unwrap();
        assert!(morning < evening);
    }

    #[test]
    fn test_time_of_day_serde_round_trip() {
        let t = TimeOfDay::parse("18:05").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"18:05\"");
        let back: TimeOfDay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
