use chrono::TimeDelta;
use tracing::{debug, trace};

use crate::{
    key_api::{KeyEvent, KeyKind},
    tracker::{
        config::GroupingMode,
        storage::entities::{Session, PARAGRAPH_BREAK},
    },
};

/// Outcome of applying one key event.
#[derive(Debug, PartialEq)]
pub enum Applied {
    /// The event went into the open session.
    Continue,
    /// A boundary was crossed. The returned session is closed; the event opened a new one.
    SessionClosed(Session),
    /// Stop was requested. Carries the open session, if there was one.
    Terminated(Option<Session>),
}

/// Owns the session being typed and decides where sessions (or paragraphs) end.
pub struct SessionAccumulator {
    mode: GroupingMode,
    session_gap: TimeDelta,
    current: Option<Session>,
}

impl SessionAccumulator {
    pub fn new(mode: GroupingMode, session_gap: TimeDelta) -> Self {
        Self {
            mode,
            session_gap,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Closes whatever is open without an event, for shutdown paths that have no terminate
    /// event to apply.
    pub fn take(&mut self) -> Option<Session> {
        self.current.take()
    }

    pub fn apply(&mut self, event: &KeyEvent) -> Applied {
        if event.kind == KeyKind::Terminate {
            return Applied::Terminated(self.current.take());
        }

        let boundary = self
            .current
            .as_ref()
            .is_some_and(|session| self.is_boundary(session, event));

        let mut closed = None;
        if boundary {
            match self.mode {
                GroupingMode::Daily => {
                    closed = self.current.take();
                    debug!("Closing session after a pause at {}", event.timestamp);
                }
                GroupingMode::Continuous => {
                    trace!("Inserting paragraph break");
                    if let Some(session) = self.current.as_mut() {
                        session.push_str(PARAGRAPH_BREAK);
                    }
                }
            }
        }

        let session = self
            .current
            .get_or_insert_with(|| Session::open(event.timestamp));
        apply_key(session, event);

        match closed {
            Some(session) => Applied::SessionClosed(session),
            None => Applied::Continue,
        }
    }

    fn is_boundary(&self, session: &Session, event: &KeyEvent) -> bool {
        let gap = event.timestamp - session.last_activity;
        if gap >= self.session_gap {
            return true;
        }
        // A daily session never straddles midnight, it belongs to exactly one log.
        self.mode == GroupingMode::Daily && event.timestamp.date() != session.last_activity.date()
    }
}

fn apply_key(session: &mut Session, event: &KeyEvent) {
    match event.kind {
        KeyKind::Character('\r') | KeyKind::Character('\n') | KeyKind::Enter => session.push('\n'),
        KeyKind::Character(c) => session.push(c),
        KeyKind::Space => session.push(' '),
        KeyKind::Tab => session.push('\t'),
        KeyKind::Backspace => session.backspace(),
        KeyKind::OtherSpecial | KeyKind::Terminate => {}
    }
    session.touch(event.timestamp);
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    use crate::{
        key_api::{KeyEvent, KeyKind},
        tracker::{config::GroupingMode, storage::entities::Session},
    };

    use super::{Applied, SessionAccumulator};

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(),
        chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    );

    fn at(ms: i64) -> NaiveDateTime {
        TEST_START_DATE + TimeDelta::milliseconds(ms)
    }

    fn key(kind: KeyKind, ms: i64) -> KeyEvent {
        KeyEvent::new(kind, at(ms))
    }

    fn chars(text: &str, start_ms: i64) -> Vec<KeyEvent> {
        text.chars()
            .enumerate()
            .map(|(i, c)| key(KeyKind::Character(c), start_ms + 100 * i as i64))
            .collect()
    }

    fn accumulator(mode: GroupingMode) -> SessionAccumulator {
        SessionAccumulator::new(mode, TimeDelta::seconds(5))
    }

    /// Feeds events and collects every session that came out, including the one terminated.
    fn run(mode: GroupingMode, events: &[KeyEvent]) -> Vec<Session> {
        let mut accumulator = accumulator(mode);
        let mut sessions = vec![];
        for event in events {
            match accumulator.apply(event) {
                Applied::Continue => {}
                Applied::SessionClosed(session) => sessions.push(session),
                Applied::Terminated(session) => sessions.extend(session),
            }
        }
        sessions
    }

    #[test]
    fn test_scenario_two_characters() {
        for mode in [GroupingMode::Daily, GroupingMode::Continuous] {
            let sessions = run(
                mode,
                &[
                    key(KeyKind::Character('h'), 0),
                    key(KeyKind::Character('i'), 100),
                    key(KeyKind::Terminate, 200),
                ],
            );

            assert_eq!(sessions.len(), 1);
            let session = &sessions[0];
            assert_eq!(session.content, "hi");
            assert_eq!(session.character_count, 2);
            assert_eq!(session.word_count, 1);
            assert_eq!(session.keystroke_count, 2);
            assert_eq!(session.start_time, at(0));
            assert_eq!(session.last_activity, at(100));
            assert_eq!(session.end_time, at(100));
            assert_eq!(session.duration_seconds, 0.1);
        }
    }

    #[test]
    fn test_scenario_pause_in_continuous_mode_adds_paragraph() {
        let sessions = run(
            GroupingMode::Continuous,
            &[
                key(KeyKind::Character('a'), 0),
                key(KeyKind::Character('b'), 6000),
                key(KeyKind::Terminate, 6100),
            ],
        );

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].content, "a\n\nb");
        assert_eq!(sessions[0].character_count, 4);
        assert_eq!(sessions[0].word_count, 2);
        assert_eq!(sessions[0].keystroke_count, 2);
    }

    #[test]
    fn test_scenario_pause_in_daily_mode_splits_sessions() {
        let sessions = run(
            GroupingMode::Daily,
            &[
                key(KeyKind::Character('a'), 0),
                key(KeyKind::Character('b'), 6000),
                key(KeyKind::Terminate, 6100),
            ],
        );

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].content, "a");
        assert_eq!(sessions[0].character_count, 1);
        assert_eq!(sessions[1].content, "b");
        assert_eq!(sessions[1].character_count, 1);
        assert_eq!(sessions[1].start_time, at(6000));
    }

    #[test]
    fn test_scenario_backspace_edits_content() {
        let sessions = run(
            GroupingMode::Continuous,
            &[
                key(KeyKind::Character('a'), 0),
                key(KeyKind::Character('b'), 100),
                key(KeyKind::Backspace, 200),
                key(KeyKind::Character('c'), 300),
                key(KeyKind::Terminate, 400),
            ],
        );

        assert_eq!(sessions[0].content, "ac");
        assert_eq!(sessions[0].character_count, 2);
        assert_eq!(sessions[0].keystroke_count, 4);
    }

    #[test]
    fn test_scenario_terminate_without_keys_yields_nothing() {
        let mut accumulator = accumulator(GroupingMode::Daily);
        assert_eq!(
            accumulator.apply(&key(KeyKind::Terminate, 0)),
            Applied::Terminated(None)
        );
    }

    #[test]
    fn test_backspace_on_empty_session_is_harmless() {
        let sessions = run(
            GroupingMode::Continuous,
            &[
                key(KeyKind::Backspace, 0),
                key(KeyKind::Backspace, 100),
                key(KeyKind::Terminate, 200),
            ],
        );

        assert_eq!(sessions[0].content, "");
        assert_eq!(sessions[0].character_count, 0);
        assert_eq!(sessions[0].word_count, 0);
        assert_eq!(sessions[0].keystroke_count, 2);
    }

    #[test]
    fn test_gap_exactly_at_threshold_is_a_boundary() {
        let sessions = run(
            GroupingMode::Daily,
            &[
                key(KeyKind::Character('a'), 0),
                key(KeyKind::Character('b'), 5000),
                key(KeyKind::Terminate, 5001),
            ],
        );
        assert_eq!(sessions.len(), 2);

        let sessions = run(
            GroupingMode::Daily,
            &[
                key(KeyKind::Character('a'), 0),
                key(KeyKind::Character('b'), 4999),
                key(KeyKind::Terminate, 5001),
            ],
        );
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_gap_is_measured_from_last_activity() {
        // Steady typing for longer than the gap never splits.
        let events = chars("abcdefghijklmnopqrstuvwxyzabcdefghijklmnopqrstuvwxyzabcdefghijkl", 0);
        let mut all = events.clone();
        all.push(key(KeyKind::Terminate, 7000));

        let sessions = run(GroupingMode::Daily, &all);

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].character_count, events.len());
    }

    #[test]
    fn test_named_keys_append_their_characters() {
        let sessions = run(
            GroupingMode::Continuous,
            &[
                key(KeyKind::Character('a'), 0),
                key(KeyKind::Space, 100),
                key(KeyKind::Character('b'), 200),
                key(KeyKind::Tab, 300),
                key(KeyKind::Character('c'), 400),
                key(KeyKind::Enter, 500),
                key(KeyKind::Character('\r'), 600),
                key(KeyKind::Terminate, 700),
            ],
        );

        assert_eq!(sessions[0].content, "a b\tc\n\n");
        assert_eq!(sessions[0].character_count, 7);
        assert_eq!(sessions[0].word_count, 3);
        assert_eq!(sessions[0].keystroke_count, 7);
    }

    #[test]
    fn test_other_special_keys_only_count_keystrokes() {
        let sessions = run(
            GroupingMode::Continuous,
            &[
                key(KeyKind::OtherSpecial, 0),
                key(KeyKind::Character('x'), 100),
                key(KeyKind::OtherSpecial, 200),
                key(KeyKind::Terminate, 300),
            ],
        );

        assert_eq!(sessions[0].content, "x");
        assert_eq!(sessions[0].character_count, 1);
        assert_eq!(sessions[0].keystroke_count, 3);
        assert_eq!(sessions[0].start_time, at(0));
    }

    #[test]
    fn test_backspace_can_remove_paragraph_break() {
        let sessions = run(
            GroupingMode::Continuous,
            &[
                key(KeyKind::Character('a'), 0),
                key(KeyKind::Backspace, 6000),
                key(KeyKind::Terminate, 6100),
            ],
        );

        assert_eq!(sessions[0].content, "a\n");
        assert_eq!(sessions[0].character_count, 2);
        assert_eq!(sessions[0].word_count, 1);
    }

    #[test]
    fn test_word_count_tracks_runs_of_text() {
        let mut events = chars("one  two", 0);
        events.push(key(KeyKind::Backspace, 900));
        events.push(key(KeyKind::Backspace, 1000));
        events.push(key(KeyKind::Backspace, 1100));
        events.push(key(KeyKind::Terminate, 1200));

        let sessions = run(GroupingMode::Continuous, &events);

        assert_eq!(sessions[0].content, "one  ");
        assert_eq!(sessions[0].word_count, 1);
    }

    #[test]
    fn test_daily_mode_splits_at_midnight() {
        let before = NaiveDate::from_ymd_opt(2018, 7, 4)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let after = before + TimeDelta::seconds(1);
        let mut accumulator = accumulator(GroupingMode::Daily);

        accumulator.apply(&KeyEvent::new(KeyKind::Character('a'), before));
        let closed = accumulator.apply(&KeyEvent::new(KeyKind::Character('b'), after));

        assert!(matches!(closed, Applied::SessionClosed(ref s) if s.content == "a"));
        assert_eq!(accumulator.current().map(|s| s.start_time), Some(after));
    }

    #[test]
    fn test_continuous_mode_ignores_midnight() {
        let before = NaiveDate::from_ymd_opt(2018, 7, 4)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let mut accumulator = accumulator(GroupingMode::Continuous);

        accumulator.apply(&KeyEvent::new(KeyKind::Character('a'), before));
        let result = accumulator.apply(&KeyEvent::new(
            KeyKind::Character('b'),
            before + TimeDelta::seconds(1),
        ));

        assert_eq!(result, Applied::Continue);
        assert_eq!(accumulator.current().map(|s| s.content.as_str()), Some("ab"));
    }

    #[test]
    fn test_session_reopens_after_close() {
        let mut accumulator = accumulator(GroupingMode::Daily);
        accumulator.apply(&key(KeyKind::Character('a'), 0));
        assert!(matches!(
            accumulator.apply(&key(KeyKind::Terminate, 100)),
            Applied::Terminated(Some(_))
        ));
        assert!(accumulator.current().is_none());

        assert_eq!(
            accumulator.apply(&key(KeyKind::Character('b'), 200)),
            Applied::Continue
        );
        assert_eq!(accumulator.current().map(|s| s.start_time), Some(at(200)));
    }

    #[test]
    fn test_take_closes_open_session() {
        let mut accumulator = accumulator(GroupingMode::Continuous);
        accumulator.apply(&key(KeyKind::Character('a'), 0));
        assert_eq!(accumulator.take().map(|s| s.content), Some("a".into()));
        assert!(accumulator.take().is_none());
    }
}
