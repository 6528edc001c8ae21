use chrono::{NaiveDate, NaiveDateTime, SubsecRound};

/// Format every persisted timestamp uses. Always six fractional digits and no zone suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// This is the standard way of converting a date to a string in keytrail.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// File name of a session, derived from the moment it started. For example
/// `2024-03-15_Typing_Session_09-05pm.json`.
pub fn session_file_name(start: NaiveDateTime) -> String {
    format!(
        "{}_Typing_Session_{}.json",
        date_to_record_name(start.date()),
        start.format("%I-%M%P")
    )
}

/// File name of the aggregate log for a calendar date.
pub fn daily_log_file_name(date: NaiveDate) -> String {
    format!("{}_Daily_Typing_Log.json", date_to_record_name(date))
}

/// Drops precision below microseconds, which is all the persisted format keeps.
pub fn to_record_precision(moment: NaiveDateTime) -> NaiveDateTime {
    moment.trunc_subsecs(6)
}

/// Serde adapter for [NaiveDateTime] values stored with [TIMESTAMP_FORMAT].
pub mod iso_micros {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S>(moment: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&moment.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // %.f accepts any number of fractional digits, including none.
        NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f").map_err(serde::de::Error::custom)
    }
}
