//! Display-timestamp formatting for export metadata.

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;

use crate::error::{ExportError, Result};

pub fn from_unix_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    let millis = (seconds * 1000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Formats Unix-second timestamps as localized display strings,
/// either in a configured IANA timezone or the system local zone.
#[derive(Debug, Clone, Default)]
pub struct TimeFormatter {
    tz: Option<Tz>,
}

impl TimeFormatter {
    pub fn new(timezone: Option<&str>) -> Result<Self> {
        let tz = match timezone {
            Some(name) if !name.is_empty() => Some(name.parse::<Tz>().map_err(|_| {
                ExportError::config(format!("unknown timezone '{name}'"))
            })?),
            _ => None,
        };
        Ok(Self { tz })
    }

    pub fn display(&self, unix_seconds: Option<f64>) -> String {
        let Some(ts) = unix_seconds.and_then(from_unix_seconds) else {
            return String::new();
        };
        match self.tz {
            Some(tz) => ts
                .with_timezone(&tz)
                .format("%Y-%m-%d %H:%M:%S %Z")
                .to_string(),
            None => ts
                .with_timezone(&Local::now().timezone())
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        }
    }
}
