//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::sync::Arc;
use std::time::Duration;

use allie::voice::{
    AudioCaptureSession, AudioMode, AudioRouting, ModeSwitch, SAMPLE_RATE, SpeechOptions,
    SpeechOutcome, SpeechPlayback, rms, voice_locale, write_wav,
};

mod common;
use common::{EchoSynth, FakeMic, TimedOutput};

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

#[test]
fn test_rms_of_silence_and_tone() {
    assert!(rms(&[]).abs() < f32::EPSILON);
    assert!(rms(&vec![0.0; 1600]).abs() < f32::EPSILON);

    // A sine's RMS is amplitude / sqrt(2)
    let tone = generate_sine_samples(440.0, 0.5, 0.5);
    let expected = 0.5 / std::f32::consts::SQRT_2;
    assert!((rms(&tone) - expected).abs() < 0.01);
}

#[test]
fn test_wav_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let samples = generate_sine_samples(440.0, 0.1, 0.3);

    write_wav(&path, &samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);

    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(decoded.len(), samples.len());
}

#[test]
fn test_wav_clamps_out_of_range_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loud.wav");

    write_wav(&path, &[2.0, -2.0], SAMPLE_RATE).unwrap();

    let decoded: Vec<i16> = hound::WavReader::open(&path)
        .unwrap()
        .samples::<i16>()
        .map(Result::unwrap)
        .collect();
    assert_eq!(decoded, vec![i16::MAX, i16::MIN]);
}

#[test]
fn test_recording_flips_route() {
    let dir = tempfile::tempdir().unwrap();
    let routing = Arc::new(ModeSwitch::new());
    let mut session =
        AudioCaptureSession::new(FakeMic { allowed: true }, routing.clone(), dir.path());

    session.start().unwrap();
    assert_eq!(routing.mode(), AudioMode::Recording);

    let clip = session.stop().unwrap();
    assert_eq!(routing.mode(), AudioMode::Playback);
    assert!(clip.path.starts_with(dir.path()));
    assert_eq!(clip.sample_rate, 16000);
}

#[tokio::test]
async fn test_speech_returns_route_to_recording() {
    let routing = Arc::new(ModeSwitch::new());
    routing.set_mode(AudioMode::Playback);
    let output = TimedOutput::new(Duration::from_millis(5));
    let speech = SpeechPlayback::new(Arc::new(EchoSynth), output.clone(), routing.clone());

    let outcome = speech
        .speak("Hello from Allie", &SpeechOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, SpeechOutcome::Finished);
    assert_eq!(routing.mode(), AudioMode::Recording);
    assert_eq!(*output.played.lock().unwrap(), vec!["Hello from Allie"]);
}

#[tokio::test]
async fn test_new_utterance_preempts_old() {
    let routing = Arc::new(ModeSwitch::new());
    let output = TimedOutput::new(Duration::from_secs(10));
    let speech = Arc::new(SpeechPlayback::new(Arc::new(EchoSynth), output, routing));

    let first = tokio::spawn({
        let speech = Arc::clone(&speech);
        async move { speech.speak("first", &SpeechOptions::default()).await }
    });
    while !speech.is_speaking() {
        tokio::task::yield_now().await;
    }

    // Starting a second utterance cancels the first
    let second = tokio::spawn({
        let speech = Arc::clone(&speech);
        async move { speech.speak("second", &SpeechOptions::default()).await }
    });

    let first = tokio::time::timeout(Duration::from_secs(2), first)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first, SpeechOutcome::Cancelled);

    assert!(speech.cancel());
    let second = tokio::time::timeout(Duration::from_secs(2), second)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second, SpeechOutcome::Cancelled);
    assert!(!speech.is_speaking());
}

#[test]
fn test_voice_locale_follows_language() {
    assert_eq!(voice_locale("es"), "es-MX");
    assert_eq!(voice_locale("en"), "en-US");
    assert_eq!(voice_locale("fr"), "en-US");
    assert_eq!(
        SpeechOptions::for_language("es").language.as_deref(),
        Some("es-MX")
    );
}
