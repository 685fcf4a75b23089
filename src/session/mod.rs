//! Streaming Session (spec §4.8): per-connection state machine over a
//! rolling PCM buffer, grounded on `voice_session::VoiceSession`'s
//! mpsc/`tokio::select!` task shape, translated from a conversational agent
//! loop to the kernel's transcribe/compare cycle.

pub mod events;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use events::{ControlMessage, Inbound, SessionEvent, SessionState};

use crate::audio::vad::is_speech_frame;
use crate::kernel::Kernel;
use crate::types::{AudioBuffer, CompareMode, EvaluationLevel, RunOptions};

const FRAME_SAMPLES: usize = 480; // 30ms @ 16kHz
const HANGOVER_MS: u64 = 250;
const BACKPRESSURE_THRESHOLD_MS: u64 = 3_000;
const BUFFER_CAP_MS: u64 = 30_000;
const DROP_CHUNK_MS: u64 = 100;
const SAMPLES_PER_MS: u64 = 16; // 16kHz mono

/// Handle to a running session task: send inbound frames, receive events.
pub struct StreamingSession {
    inbound_tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamingSession {
    pub fn spawn(kernel: Arc<Kernel>, default_lang: impl Into<String>) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let default_lang = default_lang.into();

        let task = tokio::spawn(async move {
            run(kernel, inbound_rx, event_tx, task_cancel, default_lang).await;
        });

        (Self { inbound_tx, cancel, task }, event_rx)
    }

    pub async fn send(&self, message: Inbound) -> Result<(), mpsc::error::SendError<Inbound>> {
        self.inbound_tx.send(message).await
    }

    /// Closes the transport: cancels the pipeline future in flight, discards
    /// partial results, emits no further events (spec §4.8 "Cancellation").
    pub fn close(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

struct Settings {
    lang: String,
    reference_text: Option<String>,
    compare_mode: CompareMode,
    evaluation_level: EvaluationLevel,
}

async fn run(
    kernel: Arc<Kernel>,
    mut inbound_rx: mpsc::Receiver<Inbound>,
    event_tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
    default_lang: String,
) {
    let seq = AtomicU64::new(0);
    let emit = |event_tx: &mpsc::Sender<SessionEvent>, build: &dyn Fn(u64) -> SessionEvent| {
        let n = seq.fetch_add(1, Ordering::SeqCst);
        let _ = event_tx.try_send(build(n));
    };
    emit(&event_tx, &|n| SessionEvent::Ready { seq: n });

    let mut state = SessionState::Idle;
    let mut settings = Settings {
        lang: default_lang,
        reference_text: None,
        compare_mode: CompareMode::default(),
        evaluation_level: EvaluationLevel::default(),
    };

    let mut buffer: Vec<i16> = Vec::new();
    let mut pending_frame: VecDeque<i16> = VecDeque::new();
    let mut hangover_remaining_ms: u64 = HANGOVER_MS;
    let mut buffer_started_at: Option<Instant> = None;

    loop {
        if cancel.is_cancelled() {
            info!("session cancelled; discarding partial state");
            return;
        }

        let inbound = tokio::select! {
            _ = cancel.cancelled() => {
                info!("session cancelled mid-select; discarding partial state");
                return;
            }
            msg = inbound_rx.recv() => msg,
        };

        let Some(inbound) = inbound else {
            debug!("inbound channel closed; ending session");
            return;
        };

        match inbound {
            Inbound::Control(ControlMessage::Ping) => {
                emit(&event_tx, &|n| SessionEvent::Pong { seq: n });
            }
            Inbound::Control(ControlMessage::Reset) => {
                buffer.clear();
                pending_frame.clear();
                hangover_remaining_ms = HANGOVER_MS;
                buffer_started_at = None;
                state = SessionState::Idle;
                emit(&event_tx, &|n| SessionEvent::State { seq: n, state: SessionState::Idle });
            }
            Inbound::Control(ControlMessage::Config { lang, reference_text, compare_mode, evaluation_level }) => {
                if state == SessionState::Error {
                    continue;
                }
                if let Some(lang) = lang {
                    settings.lang = lang;
                }
                if let Some(reference_text) = reference_text {
                    settings.reference_text = Some(reference_text);
                }
                if let Some(compare_mode) = compare_mode {
                    settings.compare_mode = compare_mode;
                }
                if let Some(evaluation_level) = evaluation_level {
                    settings.evaluation_level = evaluation_level;
                }
                if state == SessionState::Idle {
                    state = SessionState::Listening;
                    emit(&event_tx, &|n| SessionEvent::State { seq: n, state: SessionState::Listening });
                }
            }
            Inbound::Control(ControlMessage::Flush) => {
                if state == SessionState::Error {
                    continue;
                }
                if state == SessionState::Speaking {
                    state = finalize_utterance(
                        &kernel,
                        &event_tx,
                        &seq,
                        &mut buffer,
                        &mut inbound_rx,
                        &cancel,
                        &settings,
                    )
                    .await;
                }
            }
            Inbound::Pcm(samples) => {
                if state == SessionState::Error || state == SessionState::Idle {
                    // spec §4.8: idle only leaves on `config`; audio arriving
                    // before configuration is dropped rather than buffered
                    // against an unconfigured language/reference.
                    continue;
                }
                if buffer.is_empty() {
                    buffer_started_at = Some(Instant::now());
                }
                buffer.extend_from_slice(&samples);
                pending_frame.extend(samples);

                enforce_backpressure(&mut buffer, &mut buffer_started_at, &event_tx, &seq);

                while pending_frame.len() >= FRAME_SAMPLES {
                    let frame: Vec<i16> = pending_frame.drain(..FRAME_SAMPLES).collect();
                    let frame_f32: Vec<f32> = frame.iter().map(|&s| s as f32 / 32768.0).collect();
                    let is_speech = is_speech_frame(&frame_f32);

                    match state {
                        SessionState::Listening if is_speech => {
                            state = SessionState::Speaking;
                            hangover_remaining_ms = HANGOVER_MS;
                            emit(&event_tx, &|n| SessionEvent::State { seq: n, state: SessionState::Speaking });
                        }
                        SessionState::Speaking if is_speech => {
                            hangover_remaining_ms = HANGOVER_MS;
                        }
                        SessionState::Speaking => {
                            let frame_ms = (FRAME_SAMPLES as u64 * 1000) / 16_000;
                            hangover_remaining_ms = hangover_remaining_ms.saturating_sub(frame_ms);
                            if hangover_remaining_ms == 0 {
                                state = finalize_utterance(
                                    &kernel,
                                    &event_tx,
                                    &seq,
                                    &mut buffer,
                                    &mut inbound_rx,
                                    &cancel,
                                    &settings,
                                )
                                .await;
                                buffer_started_at = None;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

fn enforce_backpressure(
    buffer: &mut Vec<i16>,
    buffer_started_at: &mut Option<Instant>,
    event_tx: &mpsc::Sender<SessionEvent>,
    seq: &AtomicU64,
) {
    let cap_samples = (BUFFER_CAP_MS * SAMPLES_PER_MS) as usize;
    let exceeded_rate = buffer_started_at
        .map(|start| start.elapsed() > Duration::from_millis(BACKPRESSURE_THRESHOLD_MS))
        .unwrap_or(false);

    if !exceeded_rate && buffer.len() <= cap_samples {
        return;
    }

    let drop_chunk_samples = (DROP_CHUNK_MS * SAMPLES_PER_MS) as usize;
    let mut dropped_samples = 0usize;
    while buffer.len() > cap_samples || (exceeded_rate && buffer.len() > drop_chunk_samples) {
        let take = drop_chunk_samples.min(buffer.len());
        buffer.drain(0..take);
        dropped_samples += take;
        if buffer.len() <= cap_samples && !exceeded_rate {
            break;
        }
        if dropped_samples >= cap_samples {
            break;
        }
    }

    if dropped_samples > 0 {
        let dropped_ms = dropped_samples as u64 / SAMPLES_PER_MS;
        let n = seq.fetch_add(1, Ordering::SeqCst);
        let _ = event_tx.try_send(SessionEvent::Lag { seq: n, dropped_ms });
    }
}

/// Runs the pipeline on the buffered utterance (spec §4.8 "processing").
/// PCM arriving while the pipeline future is in flight is buffered, never
/// dropped, and fed back into the main buffer once processing completes.
async fn finalize_utterance(
    kernel: &Arc<Kernel>,
    event_tx: &mpsc::Sender<SessionEvent>,
    seq: &AtomicU64,
    buffer: &mut Vec<i16>,
    inbound_rx: &mut mpsc::Receiver<Inbound>,
    cancel: &CancellationToken,
    settings: &Settings,
) -> SessionState {
    let utterance = std::mem::take(buffer);
    if utterance.is_empty() {
        return SessionState::Listening;
    }

    let emit = |n: u64, ev: SessionEvent| {
        let _ = event_tx.try_send(ev);
        n
    };
    let state_seq = seq.fetch_add(1, Ordering::SeqCst);
    emit(state_seq, SessionEvent::State { seq: state_seq, state: SessionState::Processing });

    let audio_buffer = AudioBuffer::from_f32(
        &utterance.iter().map(|&s| s as f32 / 32768.0).collect::<Vec<_>>(),
        16_000,
    );
    let options = RunOptions {
        lang: settings.lang.clone(),
        evaluation_level: settings.evaluation_level,
        compare_mode: settings.compare_mode,
        quick: false,
        ..RunOptions::default()
    };

    let mut deferred: Vec<Inbound> = Vec::new();
    let transcribe_fut = async {
        let pcm = audio_buffer.to_f32();
        let bytes = encode_wav_bytes(&pcm, audio_buffer.sample_rate);
        kernel.transcribe(&bytes, Some("audio/wav"), &options).await
    };
    tokio::pin!(transcribe_fut);

    let transcription = loop {
        tokio::select! {
            _ = cancel.cancelled() => return SessionState::Processing,
            result = &mut transcribe_fut => break result,
            maybe = inbound_rx.recv() => {
                match maybe {
                    Some(item) => deferred.push(item),
                    None => return SessionState::Processing,
                }
            }
        }
    };

    for item in deferred {
        if let Inbound::Pcm(samples) = item {
            buffer.extend_from_slice(&samples);
        }
    }

    match transcription {
        Ok(report) => {
            let n = seq.fetch_add(1, Ordering::SeqCst);
            let _ = event_tx.try_send(SessionEvent::Transcription { seq: n, report });
        }
        Err(err) => {
            error!(error = %err, "transcription failed during streaming session");
            let n = seq.fetch_add(1, Ordering::SeqCst);
            let _ = event_tx.try_send(SessionEvent::Error { seq: n, detail: err.to_string() });
            let err_seq = seq.fetch_add(1, Ordering::SeqCst);
            let _ = event_tx.try_send(SessionEvent::State { seq: err_seq, state: SessionState::Error });
            return SessionState::Error;
        }
    }

    if let Some(reference_text) = &settings.reference_text {
        let pcm = audio_buffer.to_f32();
        let bytes = encode_wav_bytes(&pcm, audio_buffer.sample_rate);
        match kernel.compare(&bytes, Some("audio/wav"), reference_text, &options).await {
            Ok(report) => {
                let n = seq.fetch_add(1, Ordering::SeqCst);
                let _ = event_tx.try_send(SessionEvent::Comparison { seq: n, report });
            }
            Err(err) => {
                error!(error = %err, "comparison failed during streaming session");
                let n = seq.fetch_add(1, Ordering::SeqCst);
                let _ = event_tx.try_send(SessionEvent::Error { seq: n, detail: err.to_string() });
                let err_seq = seq.fetch_add(1, Ordering::SeqCst);
                let _ = event_tx.try_send(SessionEvent::State { seq: err_seq, state: SessionState::Error });
                return SessionState::Error;
            }
        }
    }

    let n = seq.fetch_add(1, Ordering::SeqCst);
    let _ = event_tx.try_send(SessionEvent::State { seq: n, state: SessionState::Listening });
    SessionState::Listening
}

fn encode_wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("in-memory wav writer");
        for &s in samples {
            let clamped = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(clamped).expect("in-memory wav sample write");
        }
        writer.finalize().expect("in-memory wav finalize");
    }
    cursor.into_inner()
}
