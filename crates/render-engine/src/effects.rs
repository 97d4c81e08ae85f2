//! Word-level reveal animations.
//!
//! An animated cue is expanded into a sequence of sub-cues, each shown for
//! its own window and rasterized on its own.

use subburn_cue_model::cue::{Cue, SubCue, Word};
use subburn_cue_model::style::EffectType;

/// Shortest window a cumulative step may have. Steps that would be shorter
/// are merged into the following step.
pub const MIN_STEP_SECS: f64 = 0.05;

/// Expand `cue` into time-sliced sub-cues for `effect`.
///
/// Never returns an empty list. Cues without word timings are split
/// evenly across their whitespace-separated words.
pub fn expand(cue: &Cue, effect: EffectType) -> Vec<SubCue> {
    let expanded = match effect {
        EffectType::None => Vec::new(),
        EffectType::WordByWord => word_by_word(cue, &cue_words(cue)),
        EffectType::CumulativePopOn => cumulative_pop_on(cue, &cue_words(cue)),
    };

    if expanded.is_empty() {
        vec![SubCue::whole(cue)]
    } else {
        expanded
    }
}

fn cue_words(cue: &Cue) -> Vec<Word> {
    match cue.timed_words() {
        Some(words) => words.to_vec(),
        None => even_split(cue),
    }
}

/// One sub-cue per word, visible only for that word's own timing.
fn word_by_word(cue: &Cue, words: &[Word]) -> Vec<SubCue> {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| SubCue {
            id: format!("{}:w{i}", cue.id),
            original_id: cue.id.clone(),
            text: word.word.trim().to_string(),
            start: word.start,
            end: word.end,
        })
        .collect()
}

/// Step `i` shows words `0..=i` from word `i`'s start until the next word
/// starts (or the cue ends). Consecutive steps meet without a gap.
fn cumulative_pop_on(cue: &Cue, words: &[Word]) -> Vec<SubCue> {
    let mut steps: Vec<SubCue> = Vec::with_capacity(words.len());
    let mut text = String::new();
    // start of a step too short to show, carried into the next one
    let mut carried_start: Option<f64> = None;

    for (i, word) in words.iter().enumerate() {
        let token = word.word.trim();
        if !text.is_empty() && !token.is_empty() {
            text.push(' ');
        }
        text.push_str(token);

        let start = carried_start.unwrap_or_else(|| word.start.max(cue.start));
        let end = words
            .get(i + 1)
            .map(|next| next.start)
            .unwrap_or(cue.end)
            .min(cue.end);
        let is_last = i + 1 == words.len();

        if end - start < MIN_STEP_SECS && !is_last {
            carried_start = Some(start);
            continue;
        }
        if end <= start {
            continue;
        }

        carried_start = None;
        steps.push(SubCue {
            id: format!("{}:c{i}", cue.id),
            original_id: cue.id.clone(),
            text: text.clone(),
            start,
            end,
        });
    }

    if let Some(last) = steps.last_mut() {
        last.end = cue.end;
    }
    steps
}

/// Fallback word timings: equal slices of the cue across its words.
fn even_split(cue: &Cue) -> Vec<Word> {
    let tokens: Vec<&str> = cue.text.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let slice = cue.duration() / tokens.len() as f64;
    let last = tokens.len() - 1;
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let start = cue.start + i as f64 * slice;
            let end = if i == last {
                cue.end
            } else {
                cue.start + (i + 1) as f64 * slice
            };
            Word::new(*token, start, end)
        })
        .collect()
}
