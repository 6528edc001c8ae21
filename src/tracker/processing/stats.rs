use std::collections::VecDeque;

use chrono::{NaiveDateTime, TimeDelta};

const WPM_WINDOW: TimeDelta = TimeDelta::seconds(60);

/// Words per minute over the trailing minute. Sampled whenever a word is completed, so the rate
/// is the growth of the word count between the oldest and newest sample in the window.
#[derive(Default)]
pub struct WpmMeter {
    samples: VecDeque<(NaiveDateTime, usize)>,
}

impl WpmMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: NaiveDateTime, word_count: usize) {
        self.samples.push_back((at, word_count));
        self.prune(at);
    }

    /// Forgets all samples, for when word counts restart with a new session.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn wpm(&self, now: NaiveDateTime) -> f64 {
        let cutoff = now - WPM_WINDOW;
        let mut recent = self.samples.iter().filter(|(at, _)| *at > cutoff);
        let Some(&(first_at, first_words)) = recent.next() else {
            return 0.;
        };
        let Some(&(last_at, last_words)) = recent.last() else {
            return 0.;
        };

        let minutes = (last_at - first_at).num_milliseconds() as f64 / 60_000.;
        if minutes <= 0. {
            return 0.;
        }
        last_words.saturating_sub(first_words) as f64 / minutes
    }

    fn prune(&mut self, now: NaiveDateTime) {
        let cutoff = now - WPM_WINDOW;
        while self.samples.front().is_some_and(|(at, _)| *at <= cutoff) {
            self.samples.pop_front();
        }
    }
}
