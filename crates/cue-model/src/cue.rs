//! Timed text cues and their animation fragments.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Slack allowed when checking that word timings sit inside their cue.
/// Transcription engines round word boundaries independently of segment
/// boundaries.
pub const WORD_TIME_TOLERANCE_SECS: f64 = 0.001;

/// A single word with its own timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }
}

/// One timed text entry (a subtitle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Unique within one export.
    pub id: String,

    /// Display text; may contain explicit line breaks.
    pub text: String,

    /// Start time in seconds.
    pub start: f64,

    /// End time in seconds (exclusive).
    pub end: f64,

    /// Per-word timings, ordered. Required for word-level animation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

impl Cue {
    pub fn new(id: impl Into<String>, text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            start,
            end,
            words: None,
        }
    }

    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.words = Some(words);
        self
    }

    /// Word timings, treating an empty list the same as a missing one.
    pub fn timed_words(&self) -> Option<&[Word]> {
        match &self.words {
            Some(words) if !words.is_empty() => Some(words),
            _ => None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Check the cue's own invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.id.trim().is_empty() {
            return Err(ModelError::cue(&self.id, "id must not be empty"));
        }
        if self.text.trim().is_empty() {
            return Err(ModelError::cue(&self.id, "text must not be empty"));
        }
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(ModelError::cue(&self.id, "start and end must be finite"));
        }
        if self.start < 0.0 {
            return Err(ModelError::cue(
                &self.id,
                format!("start {} is negative", self.start),
            ));
        }
        if self.end <= self.start {
            return Err(ModelError::cue(
                &self.id,
                format!("end {} must be after start {}", self.end, self.start),
            ));
        }

        if let Some(words) = self.timed_words() {
            let mut previous_start = f64::NEG_INFINITY;
            for (i, word) in words.iter().enumerate() {
                if word.word.trim().is_empty() {
                    return Err(ModelError::cue(&self.id, format!("word {i} is blank")));
                }
                if !word.start.is_finite() || !word.end.is_finite() {
                    return Err(ModelError::cue(
                        &self.id,
                        format!("word {i} has non-finite timing"),
                    ));
                }
                if word.end < word.start {
                    return Err(ModelError::cue(
                        &self.id,
                        format!("word {i} ({:?}) ends before it starts", word.word),
                    ));
                }
                if word.start < previous_start {
                    return Err(ModelError::cue(
                        &self.id,
                        format!("word {i} ({:?}) starts before the previous word", word.word),
                    ));
                }
                if word.start < self.start - WORD_TIME_TOLERANCE_SECS
                    || word.end > self.end + WORD_TIME_TOLERANCE_SECS
                {
                    return Err(ModelError::cue(
                        &self.id,
                        format!(
                            "word {i} ({:?}) [{}, {}] lies outside the cue [{}, {}]",
                            word.word, word.start, word.end, self.start, self.end
                        ),
                    ));
                }
                previous_start = word.start;
            }
        }

        Ok(())
    }
}

/// Validate every cue and check that ids are unique.
pub fn validate_cues(cues: &[Cue]) -> Result<(), ModelError> {
    let mut seen = HashSet::with_capacity(cues.len());
    for cue in cues {
        cue.validate()?;
        if !seen.insert(cue.id.as_str()) {
            return Err(ModelError::cue(&cue.id, "duplicate cue id"));
        }
    }
    Ok(())
}

/// A time-sliced fragment of a cue, produced for reveal animations.
///
/// Exists only for the lifetime of one render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCue {
    /// Unique within one job; derived from `original_id`.
    pub id: String,

    /// Id of the cue this fragment was expanded from.
    pub original_id: String,

    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl SubCue {
    /// The whole cue as a single fragment.
    pub fn whole(cue: &Cue) -> Self {
        Self {
            id: cue.id.clone(),
            original_id: cue.id.clone(),
            text: cue.text.clone(),
            start: cue.start,
            end: cue.end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `t` falls inside the half-open window `[start, end)`.
    pub fn is_visible_at(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words() -> Vec<Word> {
        vec![
            Word::new("Hallo", 1.5, 2.5),
            Word::new("Welt", 2.6, 4.0),
        ]
    }

    #[test]
    fn test_valid_cue() {
        let cue = Cue::new("c1", "Hallo Welt", 1.5, 4.0).with_words(words());
        assert!(cue.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_times() {
        let cue = Cue::new("c1", "Hallo", 4.0, 4.0);
        let err = cue.validate().unwrap_err();
        assert!(err.to_string().contains("must be after start"));
        assert!(Cue::new("c1", "Hallo", -1.0, 2.0).validate().is_err());
        assert!(Cue::new("c1", "Hallo", 0.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_rejects_blank_text() {
        assert!(Cue::new("c1", "  \n ", 0.0, 1.0).validate().is_err());
    }

    #[test]
    fn test_rejects_words_outside_cue() {
        let cue = Cue::new("c1", "Hallo Welt", 2.0, 4.0).with_words(words());
        assert!(cue.validate().is_err());
    }

    #[test]
    fn test_rejects_non_monotonic_words() {
        let cue = Cue::new("c1", "Hallo Welt", 1.0, 4.0).with_words(vec![
            Word::new("Hallo", 2.0, 2.5),
            Word::new("Welt", 1.5, 3.0),
        ]);
        assert!(cue.validate().is_err());
    }

    #[test]
    fn test_rejects_blank_word() {
        let cue = Cue::new("c1", "Hallo Welt", 1.0, 4.0).with_words(vec![
            Word::new("Hallo", 1.5, 2.5),
            Word::new("  ", 2.5, 3.0),
            Word::new("Welt", 3.0, 4.0),
        ]);
        let err = cue.validate().unwrap_err();
        assert!(err.to_string().contains("word 1 is blank"), "{err}");
    }

    #[test]
    fn test_empty_words_behave_like_missing() {
        let cue = Cue::new("c1", "Hallo", 0.0, 1.0).with_words(Vec::new());
        assert!(cue.timed_words().is_none());
        assert!(cue.validate().is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let cues = vec![Cue::new("a", "one", 0.0, 1.0), Cue::new("a", "two", 1.0, 2.0)];
        assert!(validate_cues(&cues).is_err());
    }

    #[test]
    fn test_cue_deserializes_without_words() {
        let cue: Cue =
            serde_json::from_str(r#"{"id":"1","text":"Hallo Welt","start":1.5,"end":4.0}"#)
                .unwrap();
        assert!(cue.words.is_none());
        assert_eq!(cue.duration(), 2.5);
    }

    #[test]
    fn test_sub_cue_window_is_half_open() {
        let sub = SubCue::whole(&Cue::new("c", "x", 1.0, 2.0));
        assert!(sub.is_visible_at(1.0));
        assert!(sub.is_visible_at(1.999));
        assert!(!sub.is_visible_at(2.0));
        assert_eq!(sub.original_id, "c");
    }
}
