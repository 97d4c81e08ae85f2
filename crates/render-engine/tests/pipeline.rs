mod common;

use std::sync::{Arc, Mutex};

use common::{leftover_files, pipeline, FakeBackend};
use subburn_common::error::SubburnError;
use subburn_cue_model::cue::{Cue, Word};
use subburn_cue_model::request::RenderInput;
use subburn_cue_model::style::{EffectType, Style};

const VIDEO: &[u8] = b"not really an mp4, the fake encoder only copies bytes";

fn four_word_cue(id: &str, start: f64) -> Cue {
    Cue::new(id, "eins zwei drei vier", start, start + 4.0).with_words(vec![
        Word::new("eins", start, start + 1.0),
        Word::new("zwei", start + 1.0, start + 2.0),
        Word::new("drei", start + 2.0, start + 3.0),
        Word::new("vier", start + 3.0, start + 4.0),
    ])
}

fn word_by_word() -> Style {
    Style {
        effect_type: EffectType::WordByWord,
        ..Style::default()
    }
}

fn collect_progress() -> (Arc<Mutex<Vec<f64>>>, impl Fn(f64)) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |value| sink.lock().unwrap().push(value))
}

#[test]
fn single_plain_cue_renders_in_one_batch() {
    let temp = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new(1280, 720, 10.0));
    let pipeline = pipeline(backend.clone(), temp.path(), 200);
    let input = RenderInput::new(
        VIDEO.to_vec(),
        vec![Cue::new("c1", "Hallo Welt", 1.5, 4.0)],
        Style::default(),
    )
    .unwrap();

    let (seen, progress) = collect_progress();
    let output = pipeline.render("job-1", &input, &progress).unwrap();

    assert_eq!(output, VIDEO);
    let observed = backend.observed();
    assert_eq!(observed.len(), 1);
    let graph = &observed[0].invocation.filter_graph;
    assert!(graph.contains("enable='gte(t,1.500)*lt(t,4.000)'"), "{graph}");
    assert!(observed[0].overlays_valid);
    assert_eq!(seen.lock().unwrap().last().copied(), Some(100.0));
    assert!(leftover_files(temp.path()).is_empty());
}

#[test]
fn word_by_word_cue_expands_to_four_overlays_in_one_batch() {
    let temp = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new(1920, 1080, 8.0));
    let pipeline = pipeline(backend.clone(), temp.path(), 200);
    let input = RenderInput::new(VIDEO.to_vec(), vec![four_word_cue("c1", 0.0)], word_by_word())
        .unwrap();

    pipeline.render("job-2", &input, &|_| {}).unwrap();

    let observed = backend.observed();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].invocation.overlays.len(), 4);
    assert_eq!(observed[0].invocation.filter_graph.matches("overlay=").count(), 4);
    assert!(leftover_files(temp.path()).is_empty());
}

#[test]
fn five_hundred_captions_run_three_chained_batches() {
    let temp = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new(1280, 720, 600.0));
    let pipeline = pipeline(backend.clone(), temp.path(), 200);
    let cues: Vec<Cue> = (0..125)
        .map(|i| four_word_cue(&format!("c{i}"), i as f64 * 4.0))
        .collect();
    let input = RenderInput::new(VIDEO.to_vec(), cues, word_by_word()).unwrap();

    let (seen, progress) = collect_progress();
    let output = pipeline.render("job-3", &input, &progress).unwrap();
    assert_eq!(output, VIDEO);

    let observed = backend.observed();
    let overlay_counts: Vec<usize> = observed.iter().map(|o| o.invocation.overlays.len()).collect();
    assert_eq!(overlay_counts, vec![200, 200, 100]);

    // each batch reads the previous batch's output
    assert_eq!(observed[1].invocation.input_video, observed[0].invocation.output);
    assert_eq!(observed[2].invocation.input_video, observed[1].invocation.output);
    assert!(observed.iter().all(|o| o.live_videos <= 2));

    let seen = seen.lock().unwrap().clone();
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    assert_eq!(seen.last().copied(), Some(100.0));
    for checkpoint in [100.0 / 3.0, 200.0 / 3.0] {
        assert!(seen.iter().any(|v| (v - checkpoint).abs() < 1e-6), "{seen:?}");
    }

    // captions are ordered by start time across batches
    let starts: Vec<&str> = observed
        .iter()
        .map(|o| o.invocation.filter_graph.as_str())
        .collect();
    assert!(starts[0].contains("gte(t,0.000)"));
    assert!(starts[2].contains("lt(t,500.000)"));

    assert!(leftover_files(temp.path()).is_empty());
}

#[test]
fn encoder_failure_cleans_up_and_reports_retryable_error() {
    let temp = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new(1280, 720, 600.0).failing_on(2));
    let pipeline = pipeline(backend.clone(), temp.path(), 200);
    let cues: Vec<Cue> = (0..125)
        .map(|i| four_word_cue(&format!("c{i}"), i as f64 * 4.0))
        .collect();
    let input = RenderInput::new(VIDEO.to_vec(), cues, word_by_word()).unwrap();

    let err = pipeline.render("job-4", &input, &|_| {}).unwrap_err();

    assert!(matches!(err, SubburnError::Encoder { .. }));
    assert!(err.is_retryable());
    assert_eq!(backend.observed().len(), 2);
    assert!(leftover_files(temp.path()).is_empty());
}

#[test]
fn job_without_cues_returns_input_unchanged() {
    let temp = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new(640, 360, 3.0));
    let pipeline = pipeline(backend.clone(), temp.path(), 200);
    let input = RenderInput {
        video: VIDEO.to_vec(),
        cues: Vec::new(),
        style: Style::default(),
    };

    let (seen, progress) = collect_progress();
    let output = pipeline.render("job-5", &input, &progress).unwrap();

    assert_eq!(output, VIDEO);
    assert!(backend.observed().is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![100.0]);
    assert!(leftover_files(temp.path()).is_empty());
}

#[test]
fn concurrent_jobs_use_separate_directories() {
    let temp = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new(1280, 720, 10.0));
    let pipeline = Arc::new(pipeline(backend.clone(), temp.path(), 200));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || {
                let input = RenderInput::new(
                    VIDEO.to_vec(),
                    vec![Cue::new("c", format!("job {i}"), 0.0, 1.0)],
                    Style::default(),
                )
                .unwrap();
                pipeline.render(&format!("job-{i}"), &input, &|_| {})
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let dirs: std::collections::HashSet<_> = backend
        .observed()
        .iter()
        .map(|o| o.invocation.output.parent().unwrap().to_path_buf())
        .collect();
    assert_eq!(dirs.len(), 4);
    assert!(leftover_files(temp.path()).is_empty());
}
