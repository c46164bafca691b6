//! Benchmarks for the per-frame answer path and optotype sizing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};
use visual_acuity::{
    acuity::AcuityTable,
    constants::NUM_HAND_LANDMARKS,
    direction::Direction,
    gesture::GestureClassifier,
    landmarks::{FaceBox, Finger, HandLandmarks, LandmarkFrame, Point2},
    optotype::{render_optotype, OptotypeScaler, PixelPitch},
    voting::{StabilityVoter, VotingConfig},
};

fn pointing_hand(angle_deg: f64) -> HandLandmarks {
    let origin = Point2::new(0.3, 0.7);
    let mut points = [origin; NUM_HAND_LANDMARKS];
    let rad = angle_deg.to_radians();
    for finger in Finger::VOTE_ORDER {
        let (_, tip) = finger.joints();
        points[tip] = Point2::new(origin.x + 0.1 * rad.cos(), origin.y - 0.1 * rad.sin());
    }
    HandLandmarks::from_points(&points).expect("21 points")
}

fn benchmark_gesture(c: &mut Criterion) {
    let mut group = c.benchmark_group("gesture");
    let classifier = GestureClassifier::new();

    let frame = LandmarkFrame {
        hand: Some(pointing_hand(100.0)),
        face: Some(FaceBox::new(0.4, 0.1, 0.2, 0.3)),
    };
    group.bench_function("classify_frame", |b| {
        b.iter(|| black_box(classifier.classify(black_box(&frame))));
    });

    group.bench_function("stability_voting_trial", |b| {
        b.iter(|| {
            let start = Instant::now();
            let mut voter = StabilityVoter::new(VotingConfig::default(), start);
            let mut answer = None;
            for i in 1..=40u32 {
                answer = voter.tick(start + Duration::from_millis(50) * i, Some(Direction::Left));
                if answer.is_some() {
                    break;
                }
            }
            black_box(answer)
        });
    });

    group.finish();
}

fn benchmark_optotype(c: &mut Criterion) {
    let mut group = c.benchmark_group("optotype");
    let pitch = PixelPitch::from_screen(15.6, 1920, 1080).expect("valid screen");
    let scaler = OptotypeScaler::new(Some(pitch));
    let mut table = AcuityTable::clinical();
    scaler.compute_baselines(&mut table).expect("baselines");

    group.bench_function("rescale_clinical_table", |b| {
        b.iter(|| black_box(scaler.rescale(&mut table, black_box(1.37))));
    });

    for size in [16u32, 128, 512] {
        group.bench_with_input(BenchmarkId::new("render", size), &size, |b, &size| {
            b.iter(|| black_box(render_optotype(size, Direction::Down)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_gesture, benchmark_optotype);
criterion_main!(benches);
