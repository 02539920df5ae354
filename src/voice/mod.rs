//! Voice processing module
//!
//! Handles microphone recording sessions, audio routing, and spoken
//! playback of replies. Transcription and synthesis are delegated to the
//! backend relay (see `client`).

mod capture;
mod playback;
mod recorder;
mod routing;
mod speech;

pub use capture::{CpalMicrophone, Microphone, SAMPLE_RATE, rms, write_wav};
pub use playback::{AudioOutput, CpalSpeaker, PLAYBACK_SAMPLE_RATE, Pcm, decode_mp3};
pub use recorder::{AudioCaptureSession, AudioClip};
pub use routing::{AudioMode, AudioRouting, ModeSwitch};
pub use speech::{
    SpeechCanceller, SpeechOptions, SpeechOutcome, SpeechPlayback, voice_locale,
};
