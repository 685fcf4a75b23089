//! Built-in plugin implementations (spec §B supplement): bundled enough to
//! run the kernel without any external provider configured.

pub mod asr_stub;
#[cfg(feature = "whisper")]
pub mod asr_whisper;
pub mod comparator_default;
pub mod textref_dictionary;
pub mod textref_grapheme;
