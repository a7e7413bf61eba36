//! Presentation pipeline integration tests
//!
//! Lip-sync strategies, idle motion, and subtitle timing through the
//! public crate API, with no renderer attached.

use std::time::Duration;

use astra_gateway::lipsync::{
    AmplitudeDriven, LipSyncDriver, ScriptedCycle, morphs,
};
use astra_gateway::playback::OutputLevel;
use astra_gateway::scene::{AvatarDescriptor, IdleMotion, SubtitleTicker};

#[test]
fn scripted_cycle_walks_visemes_while_speaking() {
    let mut driver = LipSyncDriver::new(Box::new(ScriptedCycle::with_seed(11)));
    driver.start();

    // Sample one frame per scripted tick over a full cycle
    let mut seen = Vec::new();
    for step in 0..morphs::TALKING_CYCLE.len() {
        let (weights, _) = driver.frame(Duration::from_millis(step as u64 * 100));
        let active: Vec<&str> = morphs::TALKING_CYCLE
            .iter()
            .filter(|v| weights.get(v) > 0.0)
            .copied()
            .collect();
        assert_eq!(active.len(), 1, "exactly one viseme per frame");
        seen.push(active[0]);

        // Mouth openness tracks the viseme intensity band
        let mouth = weights.get(morphs::MOUTH_OPEN);
        assert!(mouth >= 0.7 * 0.3 - f32::EPSILON);
        assert!(mouth <= 0.7 * 0.8 + f32::EPSILON);
    }

    // The cycle advances rather than repeating one shape
    assert_eq!(seen, morphs::TALKING_CYCLE.to_vec());
}

#[test]
fn amplitude_driver_follows_the_output_level() {
    let level = OutputLevel::default();
    let mut driver = LipSyncDriver::new(Box::new(AmplitudeDriven::new(level.clone())));
    driver.start();

    level.set(0.9);
    let (weights, _) = driver.frame(Duration::from_millis(33));
    assert!(weights.get(morphs::VISEME_AA) > 0.5);

    level.set(0.0);
    let (weights, _) = driver.frame(Duration::from_millis(66));
    assert!(weights.get(morphs::VISEME_AA).abs() < f32::EPSILON);
    assert!(weights.get(morphs::VISEME_SIL) > 0.9);
}

#[test]
fn stopping_speech_zeroes_weights_immediately() {
    let mut driver = LipSyncDriver::new(Box::new(ScriptedCycle::with_seed(3)));
    driver.start();
    driver.frame(Duration::from_millis(100));
    assert!(!driver.weights().is_all_zero());

    driver.stop();
    assert!(driver.weights().is_all_zero());

    // Frames after stop stay at rest
    let (weights, sway) = driver.frame(Duration::from_secs(2));
    assert!(weights.is_all_zero());
    assert!(sway.yaw.abs() < f32::EPSILON);
}

#[test]
fn head_sway_differs_between_speaking_and_rest() {
    let mut driver = LipSyncDriver::new(Box::new(ScriptedCycle::with_seed(5)));
    driver.start();
    let (_, speaking_sway) = driver.frame(Duration::from_millis(400));
    assert!(speaking_sway.yaw.abs() <= 0.08 + f32::EPSILON);
    assert!(speaking_sway.pitch.abs() <= 0.03 + f32::EPSILON);

    let mut idle = IdleMotion::with_seed(5);
    let idle_frame = idle.frame(Duration::from_millis(400));
    assert!(idle_frame.sway.yaw.abs() <= 0.03 + f32::EPSILON);
    assert!(idle_frame.sway.pitch.abs() < f32::EPSILON);
}

#[test]
fn subtitles_reveal_on_a_fixed_cadence() {
    let ticker = SubtitleTicker::new("the stars favor a quiet morning");

    assert_eq!(ticker.revealed(Duration::ZERO), "the");
    assert_eq!(ticker.revealed(Duration::from_millis(290)), "the stars");
    assert_eq!(
        ticker.revealed(Duration::from_secs(10)),
        "the stars favor a quiet morning"
    );
    assert!(ticker.is_complete(Duration::from_secs(10)));
}

#[test]
fn default_avatar_allows_placeholder_fallback() {
    let avatar = AvatarDescriptor::default();
    assert!(avatar.placeholder);
    assert!(avatar.url.ends_with(".glb"));
}
