use std::path::PathBuf;
use std::time::{Duration, Instant};

use curved_carousel::carousel::Carousel;
use curved_carousel::carousel::interaction::PointerSource;
use curved_carousel::carousel::motion::{
    FRICTION, MAX_MOMENTUM, MOMENTUM_FLOOR, MotionPhase, PointerPosition,
};
use curved_carousel::carousel::resize::ResizeDebouncer;
use curved_carousel::config::{Configuration, Direction};
use winit::dpi::PhysicalSize;

const HEIGHT: f64 = 720.0;

fn three_images() -> Configuration {
    Configuration {
        speed: 10.0,
        gap: -20.0,
        direction: Direction::Left,
        images: vec![
            PathBuf::from("a.jpg"),
            PathBuf::from("b.jpg"),
            PathBuf::from("c.jpg"),
        ],
        ..Configuration::default()
    }
    .validated()
    .unwrap()
}

fn at(x: f64) -> PointerPosition {
    PointerPosition::new(x, HEIGHT / 2.0)
}

#[test]
fn one_auto_scroll_frame_moves_left() {
    let mut carousel = Carousel::new(&three_images());
    let frame = carousel.advance();
    assert_eq!(frame.phase, MotionPhase::AutoScroll);
    assert!((carousel.state().time + 0.00001).abs() < 1e-15);
    assert!((carousel.scene_offset() + 0.0001).abs() < 1e-12);
}

#[test]
fn single_drag_frame_adds_scaled_delta() {
    let mut carousel = Carousel::new(&three_images());
    let t0 = Instant::now();
    assert!(carousel.pointer_pressed(PointerSource::Mouse, at(100.0), HEIGHT, t0));
    assert!(carousel.pointer_moved(PointerSource::Mouse, at(80.0), t0 + Duration::from_millis(16)));
    assert!((carousel.state().drag_velocity - 0.018).abs() < 1e-12);
    assert!((carousel.state().time - 0.018).abs() < 1e-12);
}

#[test]
fn release_seeds_momentum_from_average_velocity() {
    let mut carousel = Carousel::new(&three_images());
    let t0 = Instant::now();
    carousel.pointer_pressed(PointerSource::Mouse, at(100.0), HEIGHT, t0);
    // -5 px over 10 ms: -0.5 px/ms
    carousel.pointer_moved(PointerSource::Mouse, at(95.0), t0 + Duration::from_millis(10));
    let momentum = carousel.pointer_released(PointerSource::Mouse).unwrap();
    assert!((momentum - 0.00225).abs() < 1e-12);
    assert!(!carousel.is_dragging());
}

#[test]
fn release_without_samples_has_no_momentum() {
    let mut carousel = Carousel::new(&three_images());
    carousel.pointer_pressed(PointerSource::Mouse, at(300.0), HEIGHT, Instant::now());
    assert_eq!(carousel.pointer_released(PointerSource::Mouse), Some(0.0));
    assert_eq!(carousel.state().target_velocity, 0.0);
}

#[test]
fn release_momentum_is_clamped() {
    let mut carousel = Carousel::new(&three_images());
    let t0 = Instant::now();
    carousel.pointer_pressed(PointerSource::Mouse, at(1000.0), HEIGHT, t0);
    carousel.pointer_moved(PointerSource::Mouse, at(0.0), t0 + Duration::from_millis(1));
    assert_eq!(carousel.pointer_released(PointerSource::Mouse), Some(MAX_MOMENTUM));

    carousel.pointer_pressed(PointerSource::Mouse, at(0.0), HEIGHT, t0);
    carousel.pointer_moved(PointerSource::Mouse, at(1000.0), t0 + Duration::from_millis(1));
    assert_eq!(carousel.pointer_released(PointerSource::Mouse), Some(-MAX_MOMENTUM));
}

#[test]
fn press_outside_drag_band_is_ignored() {
    let mut carousel = Carousel::new(&three_images());
    let now = Instant::now();
    for y in [0.0, 0.2 * HEIGHT, 0.34 * HEIGHT, 0.66 * HEIGHT, HEIGHT] {
        assert!(!carousel.pointer_pressed(PointerSource::Mouse, PointerPosition::new(10.0, y), HEIGHT, now));
        assert!(!carousel.is_dragging());
    }
    assert!(carousel.pointer_pressed(PointerSource::Mouse, PointerPosition::new(10.0, 0.35 * HEIGHT), HEIGHT, now));
    assert!(carousel.is_dragging());
}

#[test]
fn momentum_decays_geometrically_until_floor() {
    let mut carousel = Carousel::new(&three_images());
    let t0 = Instant::now();
    carousel.pointer_pressed(PointerSource::Mouse, at(1000.0), HEIGHT, t0);
    carousel.pointer_moved(PointerSource::Mouse, at(0.0), t0 + Duration::from_millis(1));
    let initial = carousel.pointer_released(PointerSource::Mouse).unwrap();

    let mut frames = 0;
    while carousel.state().target_velocity.abs() > MOMENTUM_FLOOR {
        let frame = carousel.advance();
        frames += 1;
        assert_eq!(frame.phase, MotionPhase::Momentum);
        let expected = initial.abs() * FRICTION.powi(frames);
        assert!((carousel.state().target_velocity.abs() - expected).abs() < 1e-12);
    }
    assert_eq!(frames, 36);
}

#[test]
fn auto_scroll_resumes_once_momentum_is_negligible() {
    let mut carousel = Carousel::new(&three_images());
    let t0 = Instant::now();
    carousel.pointer_pressed(PointerSource::Mouse, at(100.0), HEIGHT, t0);
    // 0.001 px/ms seeds momentum far below the auto-scroll threshold
    carousel.pointer_moved(PointerSource::Mouse, at(99.99), t0 + Duration::from_millis(10));
    let momentum = carousel.pointer_released(PointerSource::Mouse).unwrap();
    assert!(momentum.abs() < 0.0001);
    assert_eq!(carousel.advance().phase, MotionPhase::AutoScroll);
}

#[test]
fn offset_stays_within_one_loop_width() {
    let mut carousel = Carousel::new(&three_images());
    let loop_width = carousel.bounds().width();
    let t0 = Instant::now();
    let mut x = 500.0;
    for round in 0..40u32 {
        let start = t0 + Duration::from_millis(u64::from(round) * 100);
        carousel.pointer_pressed(PointerSource::Mouse, at(x), HEIGHT, start);
        for step in 1..=5u64 {
            x -= 150.0;
            carousel.pointer_moved(PointerSource::Mouse, at(x), start + Duration::from_millis(step));
            assert!(carousel.scene_offset().abs() <= loop_width);
        }
        carousel.pointer_released(PointerSource::Mouse);
        for _ in 0..60 {
            carousel.advance();
            assert!(carousel.scene_offset().abs() <= loop_width);
        }
    }
}

#[test]
fn paused_carousel_holds_position() {
    let mut carousel = Carousel::new(&three_images());
    carousel.pause();
    for _ in 0..10 {
        assert_eq!(carousel.advance().phase, MotionPhase::Still);
    }
    assert_eq!(carousel.scene_offset(), 0.0);
    assert!(!carousel.toggle_pause());
    assert_eq!(carousel.advance().phase, MotionPhase::AutoScroll);
}

#[test]
fn reverse_flips_auto_scroll_only() {
    let mut carousel = Carousel::new(&three_images());
    carousel.relayout(1280, 720);
    let before: Vec<f64> = carousel.layout().unwrap().tiles.iter().map(|t| t.x).collect();
    assert!(carousel.reverse());
    carousel.advance();
    assert!(carousel.state().time > 0.0);
    carousel.relayout(1280, 720);
    let after: Vec<f64> = carousel.layout().unwrap().tiles.iter().map(|t| t.x).collect();
    assert_eq!(before, after);
}

#[test]
fn second_touch_does_not_steal_the_drag() {
    let mut carousel = Carousel::new(&three_images());
    let t0 = Instant::now();
    assert!(carousel.pointer_pressed(PointerSource::Touch(1), at(200.0), HEIGHT, t0));
    assert!(!carousel.pointer_pressed(PointerSource::Touch(2), at(50.0), HEIGHT, t0));
    assert!(!carousel.pointer_moved(PointerSource::Touch(2), at(0.0), t0 + Duration::from_millis(5)));
    assert_eq!(carousel.state().time, 0.0);
    assert_eq!(carousel.pointer_released(PointerSource::Touch(2)), None);
    assert!(carousel.is_dragging());
    assert!(carousel.pointer_released(PointerSource::Touch(1)).is_some());
}

#[test]
fn focus_loss_releases_drag() {
    let mut carousel = Carousel::new(&three_images());
    let t0 = Instant::now();
    carousel.pointer_pressed(PointerSource::Mouse, at(100.0), HEIGHT, t0);
    carousel.pointer_moved(PointerSource::Mouse, at(95.0), t0 + Duration::from_millis(10));
    let momentum = carousel.cancel_drag().unwrap();
    assert!((momentum - 0.00225).abs() < 1e-12);
    assert!(!carousel.is_dragging());
    assert_eq!(carousel.cancel_drag(), None);
}

#[test]
fn burst_of_resizes_rebuilds_once() {
    let mut carousel = Carousel::new(&three_images());
    let mut debounce = ResizeDebouncer::new(Duration::from_millis(100));
    let t0 = Instant::now();
    let mut rebuilds = 0;
    for ms in (0..=90).step_by(10) {
        let now = t0 + Duration::from_millis(ms);
        debounce.note(PhysicalSize::new(800 + ms as u32, 600), now);
        if let Some(size) = debounce.due(now) {
            carousel.relayout(size.width, size.height);
            rebuilds += 1;
        }
    }
    for ms in (100..=400).step_by(10) {
        if let Some(size) = debounce.due(t0 + Duration::from_millis(ms)) {
            carousel.relayout(size.width, size.height);
            rebuilds += 1;
        }
    }
    assert_eq!(rebuilds, 1);
    assert!(carousel.layout().is_some());
}

#[test]
fn instances_do_not_share_state() {
    let cfg = three_images();
    let mut a = Carousel::new(&cfg);
    let b = Carousel::new(&cfg);
    a.pause();
    a.reverse();
    assert!(!b.state().is_paused);
    assert!(!b.state().is_reversed);
    assert_eq!(b.config().images.len(), 3);
}
