use chrono::{DateTime, Local, TimeZone};

/// Second precision with a `±HH:MM` offset, e.g. `2026-01-09T15:30:45+09:00`.
pub fn local_iso_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

pub fn now_local_iso() -> String {
    local_iso_timestamp(&Local::now())
}
