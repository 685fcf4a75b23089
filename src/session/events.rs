//! Control/event message types for a streaming session (spec §4.8, §6
//! "Streaming transport").

use crate::types::{CompareMode, EvaluationLevel, FullReport, TranscriptionReport};

/// Inbound control frame (spec §4.8 "Control messages accepted").
#[derive(Debug, Clone)]
pub enum ControlMessage {
    Config {
        lang: Option<String>,
        reference_text: Option<String>,
        compare_mode: Option<CompareMode>,
        evaluation_level: Option<EvaluationLevel>,
    },
    Flush,
    Reset,
    Ping,
}

/// One inbound item: either a control frame or a chunk of PCM16 mono 16 kHz
/// samples (spec §6 "binary PCM16 little-endian mono 16 kHz frames").
#[derive(Debug, Clone)]
pub enum Inbound {
    Control(ControlMessage),
    Pcm(Vec<i16>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Speaking,
    Processing,
    Error,
}

/// Outbound event (spec §6 "server ... JSON event frames with
/// `type ∈ {ready, state, transcription, comparison, error, pong}`"). Each
/// event carries a monotonically increasing `seq` (spec §4.8).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Ready { seq: u64 },
    State { seq: u64, state: SessionState },
    Transcription { seq: u64, report: TranscriptionReport },
    Comparison { seq: u64, report: FullReport },
    Lag { seq: u64, dropped_ms: u64 },
    Error { seq: u64, detail: String },
    Pong { seq: u64 },
}
