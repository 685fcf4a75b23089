//! End-to-end scenarios not already covered by inline unit tests: empty
//! hypothesis (all deletions), alias normalization, and a two-utterance
//! streaming session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use pronunciapa::config::PipelineConfig;
use pronunciapa::inventory::{self, Inventory};
use pronunciapa::kernel::Kernel;
use pronunciapa::plugins::builtin::asr_stub::StubAsr;
use pronunciapa::plugins::builtin::textref_dictionary::DictionaryTextRef;
use pronunciapa::plugins::registry::PluginRegistry;
use pronunciapa::session::events::{ControlMessage, Inbound, SessionEvent, SessionState};
use pronunciapa::session::StreamingSession;
use pronunciapa::types::{Confidence, EvaluationLevel, IpaToken, RunOptions};

fn toks(strs: &[&str]) -> Vec<IpaToken> {
    strs.iter().map(|s| IpaToken::new(*s).unwrap()).collect()
}

fn synth_tone(seconds: f32, freq: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let n = (16_000.0 * seconds) as usize;
        for i in 0..n {
            let t = i as f32 / 16_000.0;
            let s = (t * 2.0 * std::f32::consts::PI * freq).sin() * 0.5;
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn test_kernel() -> Kernel {
    let registry = PluginRegistry::new();
    registry.register_asr(Arc::new(StubAsr::new()));
    registry.register_textref(Arc::new(DictionaryTextRef::bundled_en()));
    Kernel::new(PipelineConfig::default_stub(), registry)
}

/// Scenario 4 (spec §8): the stub backend always emits an empty hypothesis,
/// so against a real audio clip (gate passes) the comparator is run with an
/// empty `hyp`, yielding all deletions and `per == 1.0`.
#[tokio::test]
async fn empty_hypothesis_yields_all_deletions_end_to_end() {
    let kernel = test_kernel();
    let bytes = synth_tone(1.5, 180.0);
    let options = RunOptions::default();
    let report = kernel.compare(&bytes, Some("audio/wav"), "cat", &options).await.unwrap();

    assert!(report.quality.gate_passed);
    assert_eq!(report.compare.per, 1.0);
    assert_eq!(report.compare.score, 0.0);
    assert_eq!(report.compare.confidence, Confidence::Low);
    assert!(report.compare.ops.iter().all(|op| op.hyp_token.is_none()));
}

/// Scenario 5 (spec §8): an alias mapping collapses a raw nasalized vowel to
/// its oral counterpart before comparison, making an otherwise-divergent
/// hypothesis match the reference exactly.
#[test]
fn alias_normalization_collapses_divergent_hypothesis() {
    let mut inventory = Inventory::new("es");
    inventory.canonical = HashSet::from(["p", "ɾ", "o", "β", "a", "n", "d", "o"].map(String::from));
    inventory.aliases = HashMap::from([("ã".to_string(), "a".to_string())]);
    inventory.validate().unwrap();

    let reference = toks(&["p", "ɾ", "o", "β", "a", "n", "d", "o"]);
    let raw_hyp = toks(&["p", "ɾ", "o", "β", "ã", "n", "d", "o"]);

    let (normalized_hyp, warnings) = inventory::normalize(&raw_hyp, &inventory, EvaluationLevel::Phonemic).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(normalized_hyp, reference);

    let weights = pronunciapa::alignment::Weights::for_mode(pronunciapa::types::CompareMode::Objective);
    let (ops, per) = pronunciapa::alignment::align(&reference, &normalized_hyp, &weights);
    assert_eq!(per, 0.0);
    assert!(ops.iter().all(|op| op.op == pronunciapa::types::EditKind::Eq));
}

/// Scenario 6 (spec §8), adapted for a deterministic stub backend: two
/// utterances separated by silence each produce a transcription event and
/// (since `reference_text` is configured) a comparison event, with
/// monotonically increasing `seq`; `reset` then returns the session to
/// `idle` with an empty buffer.
#[tokio::test]
async fn streaming_two_utterances_then_reset() {
    let kernel = Arc::new(test_kernel());
    let (session, mut events) = StreamingSession::spawn(kernel, "en");

    match events.recv().await.unwrap() {
        SessionEvent::Ready { seq } => assert_eq!(seq, 0),
        other => panic!("expected Ready, got {other:?}"),
    }

    session
        .send(Inbound::Control(ControlMessage::Config {
            lang: Some("en".to_string()),
            reference_text: Some("cat".to_string()),
            compare_mode: None,
            evaluation_level: None,
        }))
        .await
        .unwrap();
    match events.recv().await.unwrap() {
        SessionEvent::State { state, .. } => assert_eq!(state, SessionState::Listening),
        other => panic!("expected State(Listening), got {other:?}"),
    }

    let loud_frame: Vec<i16> = (0..480)
        .map(|i| ((i as f32 / 480.0 * std::f32::consts::PI * 2.0 * 200.0).sin() * 20000.0) as i16)
        .collect();
    let silent_frame: Vec<i16> = vec![0i16; 480];

    let mut last_seq = 0u64;
    let mut transcriptions = 0u32;
    let mut comparisons = 0u32;

    for utterance in 0..2 {
        for _ in 0..20 {
            session.send(Inbound::Pcm(loud_frame.clone())).await.unwrap();
        }
        for _ in 0..30 {
            session.send(Inbound::Pcm(silent_frame.clone())).await.unwrap();
        }

        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for session event")
                .expect("event channel closed unexpectedly");
            let seq = match &event {
                SessionEvent::State { seq, .. }
                | SessionEvent::Transcription { seq, .. }
                | SessionEvent::Comparison { seq, .. }
                | SessionEvent::Lag { seq, .. }
                | SessionEvent::Error { seq, .. }
                | SessionEvent::Pong { seq }
                | SessionEvent::Ready { seq } => *seq,
            };
            assert!(seq >= last_seq, "seq must be monotonically increasing");
            last_seq = seq;

            match event {
                SessionEvent::Transcription { .. } => transcriptions += 1,
                SessionEvent::Comparison { .. } => {
                    comparisons += 1;
                    break;
                }
                SessionEvent::State { state, .. } if state == SessionState::Listening && utterance > 0 => break,
                _ => {}
            }
        }
    }

    assert_eq!(transcriptions, 2);
    assert_eq!(comparisons, 2);

    session.send(Inbound::Control(ControlMessage::Reset)).await.unwrap();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for reset state event")
            .expect("event channel closed unexpectedly");
        if let SessionEvent::State { state, .. } = event {
            assert_eq!(state, SessionState::Idle);
            break;
        }
    }
}
