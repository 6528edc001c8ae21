use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::utils::time::iso_micros;

/// Separator inserted into continuous sessions after a pause.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// A span of typing activity, stored as one JSON document. Field order is the on-disk order.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    #[serde(rename = "session_start", with = "iso_micros")]
    pub start_time: NaiveDateTime,
    #[serde(rename = "session_end", with = "iso_micros")]
    pub end_time: NaiveDateTime,
    pub content: String,
    pub character_count: usize,
    pub word_count: usize,
    #[serde(rename = "total_keystrokes")]
    pub keystroke_count: usize,
    pub duration_seconds: f64,
    #[serde(with = "iso_micros")]
    pub last_activity: NaiveDateTime,
}

impl Session {
    pub fn open(at: NaiveDateTime) -> Self {
        Self {
            start_time: at,
            end_time: at,
            content: String::new(),
            character_count: 0,
            word_count: 0,
            keystroke_count: 0,
            duration_seconds: 0.,
            last_activity: at,
        }
    }

    pub fn push(&mut self, c: char) {
        self.content.push(c);
    }

    pub fn push_str(&mut self, s: &str) {
        self.content.push_str(s);
    }

    /// Removes the last character. Does nothing on empty content.
    pub fn backspace(&mut self) {
        self.content.pop();
    }

    /// Records a keystroke at `at` and brings every derived field in line with the content.
    pub fn touch(&mut self, at: NaiveDateTime) {
        self.keystroke_count += 1;
        self.last_activity = at;
        self.end_time = at;
        self.recount();
    }

    fn recount(&mut self) {
        self.character_count = self.content.chars().count();
        self.word_count = count_words(&self.content);
        self.duration_seconds = seconds_between(self.start_time, self.last_activity);
    }
}

/// Number of maximal non-whitespace runs.
pub fn count_words(content: &str) -> usize {
    content.split_whitespace().count()
}

fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.,
        None => delta.num_milliseconds() as f64 / 1_000.,
    }
}

/// All sessions of one calendar date. Totals are derived from `sessions` on every change.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct DailyLog {
    pub date: NaiveDate,
    #[serde(with = "iso_micros")]
    pub created: NaiveDateTime,
    #[serde(with = "iso_micros")]
    pub last_updated: NaiveDateTime,
    pub total_sessions: usize,
    pub total_characters: usize,
    pub total_words: usize,
    pub total_keystrokes: usize,
    pub sessions: Vec<Session>,
}

impl DailyLog {
    pub fn new(date: NaiveDate, now: NaiveDateTime) -> Self {
        Self {
            date,
            created: now,
            last_updated: now,
            total_sessions: 0,
            total_characters: 0,
            total_words: 0,
            total_keystrokes: 0,
            sessions: vec![],
        }
    }

    /// Adds a closed session. A session that was merged before (same start) is replaced, so
    /// merging is safe to repeat.
    pub fn record(&mut self, session: Session, now: NaiveDateTime) {
        match self
            .sessions
            .iter_mut()
            .find(|v| v.start_time == session.start_time)
        {
            Some(existing) => *existing = session,
            None => {
                self.sessions.push(session);
                self.sessions.sort_by_key(|v| v.start_time);
            }
        }
        self.last_updated = now;
        self.recount();
    }

    fn recount(&mut self) {
        self.total_sessions = self.sessions.len();
        self.total_characters = self.sessions.iter().map(|v| v.character_count).sum();
        self.total_words = self.sessions.iter().map(|v| v.word_count).sum();
        self.total_keystrokes = self.sessions.iter().map(|v| v.keystroke_count).sum();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    use super::*;

    fn moment(ms: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_micro_opt(14, 30, 0, 250_000)
            .unwrap()
            + TimeDelta::milliseconds(ms)
    }

    fn typed(text: &str, start: NaiveDateTime) -> Session {
        let mut session = Session::open(start);
        for (i, c) in text.chars().enumerate() {
            session.push(c);
            session.touch(start + TimeDelta::milliseconds(100 * i as i64));
        }
        session
    }

    #[test]
    fn test_word_count_is_non_whitespace_runs() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("one"), 1);
        assert_eq!(count_words("  one\t two\n\nthree "), 3);
    }

    #[test]
    fn test_session_json_field_names_and_order() -> anyhow::Result<()> {
        let session = typed("hi", moment(0));
        let json = serde_json::to_string(&session)?;
        let keys = [
            "\"session_start\"",
            "\"session_end\"",
            "\"content\"",
            "\"character_count\"",
            "\"word_count\"",
            "\"total_keystrokes\"",
            "\"duration_seconds\"",
            "\"last_activity\"",
        ];
        let positions = keys
            .iter()
            .map(|k| json.find(k).expect("key should be present"))
            .collect::<Vec<_>>();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
        assert!(json.contains("\"session_start\":\"2024-03-15T14:30:00.250000\""));
        Ok(())
    }

    #[test]
    fn test_session_json_round_trip() -> anyhow::Result<()> {
        let session = typed("round trip", moment(0));
        let json = serde_json::to_string_pretty(&session)?;
        let parsed: Session = serde_json::from_str(&json)?;
        assert_eq!(parsed, session);
        Ok(())
    }

    #[test]
    fn test_session_reads_timestamps_without_fraction() -> anyhow::Result<()> {
        let json = r#"{
            "session_start": "2024-03-15T14:30:00",
            "session_end": "2024-03-15T14:30:01.5",
            "content": "a",
            "character_count": 1,
            "word_count": 1,
            "total_keystrokes": 1,
            "duration_seconds": 1.5,
            "last_activity": "2024-03-15T14:30:01.5"
        }"#;
        let session: Session = serde_json::from_str(json)?;
        assert_eq!(session.last_activity - session.start_time, TimeDelta::milliseconds(1500));
        Ok(())
    }

    #[test]
    fn test_touch_updates_derived_fields() {
        let mut session = Session::open(moment(0));
        session.push_str("ab cd");
        session.touch(moment(1500));
        assert_eq!(session.character_count, 5);
        assert_eq!(session.word_count, 2);
        assert_eq!(session.keystroke_count, 1);
        assert_eq!(session.duration_seconds, 1.5);
        assert_eq!(session.end_time, moment(1500));
    }

    #[test]
    fn test_daily_log_totals_follow_sessions() {
        let mut log = DailyLog::new(moment(0).date(), moment(0));
        log.record(typed("one two", moment(0)), moment(10));
        log.record(typed("three", moment(60_000)), moment(20));

        assert_eq!(log.total_sessions, 2);
        assert_eq!(log.total_characters, 12);
        assert_eq!(log.total_words, 3);
        assert_eq!(log.total_keystrokes, 12);
        assert_eq!(log.created, moment(0));
        assert_eq!(log.last_updated, moment(20));
    }

    #[test]
    fn test_daily_log_replaces_remerged_session() {
        let mut log = DailyLog::new(moment(0).date(), moment(0));
        log.record(typed("draft", moment(0)), moment(10));
        log.record(typed("draft final", moment(0)), moment(20));

        assert_eq!(log.total_sessions, 1);
        assert_eq!(log.sessions[0].content, "draft final");
        assert_eq!(log.total_words, 2);
    }
}
