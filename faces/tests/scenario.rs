use approx::assert_abs_diff_eq;
use faces::{
    pipeline::{run, PipelineConfig},
    DataPoint, Dataset, Vector,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const WIDTH: usize = 70;
const HEIGHT: usize = 80;
const CLASSES: usize = 40;
const PER_CLASS: usize = 10;

/// Olivetti-shaped synthetic faces: one random template per class, each
/// image a noisy copy of it.
fn synthetic_faces() -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut faces = Dataset::new();
    for class in 0..CLASSES {
        let template: Vec<f64> = (0..WIDTH * HEIGHT)
            .map(|_| rng.gen_range(0.0..255.0))
            .collect();
        for _ in 0..PER_CLASS {
            let image = template
                .iter()
                .map(|p| (p + rng.gen_range(-40.0..40.0)).clamp(0.0, 255.0))
                .collect();
            faces
                .add(DataPoint::one_hot(Vector::new(image), class, CLASSES).unwrap())
                .unwrap();
        }
    }
    faces
}

#[test]
fn test_olivetti_sized_run() {
    let faces = synthetic_faces();
    assert_eq!(faces.len(), 400);

    let outcome = run(&faces, &PipelineConfig::default()).unwrap();

    assert_eq!(outcome.training.len(), 280);
    assert_eq!(outcome.test_size(), 120);

    let basis = outcome.model.basis();
    assert_eq!(basis.height(), 5600);
    assert_eq!(basis.width(), 20);
    let gram = basis.transpose().mul(basis).unwrap();
    for i in 0..20 {
        for j in 0..20 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(gram.get(i, j).unwrap(), expected, epsilon = 1e-8);
        }
    }
    for w in outcome.model.eigenvalues().windows(2) {
        assert!(w[0] >= w[1]);
    }

    let summary = outcome.summary();
    assert!(summary.correct <= 120);
    assert!((0.0..=100.0).contains(&summary.accuracy()));
    assert!(summary.to_string().starts_with(&format!("Got {} correct answers out of 120.", summary.correct)));
}
