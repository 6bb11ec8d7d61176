//! Модуль синхронизации речи с видео

pub mod arbiter;
pub mod rate;
pub mod synchronizer;

pub use arbiter::{CueRef, Generation, SynthesisArbiter, SynthesisRequest};
pub use synchronizer::{PlaybackSynchronizer, SessionState, SyncPhase, SynthesisOutcome};
