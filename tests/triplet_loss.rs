use metric_layers::approx::approx_eq;
use metric_layers::backprop::{l2_normalize, triplet_loss};
use metric_layers::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn built(width: usize) -> TripletLossLayer {
    let mut layer = TripletLossLayer::new();
    layer.build(&InputShape::Single(vec![4, width])).unwrap();
    layer
}

/// Entries bounded away from zero so no slice has a vanishing norm.
fn random_input(rng: &mut StdRng, batch: usize, width: usize) -> Ten64 {
    let data = (0..batch * width)
        .map(|_| {
            let magnitude = rng.random_range(0.2..1.0);
            if rng.random_bool(0.5) { magnitude } else { -magnitude }
        })
        .collect();
    Tensor::new(vec![batch, width], data)
}

/// Central differences of `sum(weights * f(x))` with respect to every entry of `x`.
fn numeric_grad(x: &Ten64, weights: &[f64], f: impl Fn(&Ten64) -> Ten64) -> Vec<f64> {
    let h = 1e-6;
    let objective = |t: &Ten64| -> f64 {
        f(t).data.iter().zip(weights).map(|(o, w)| o * w).sum()
    };
    (0..x.len())
        .map(|i| {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus.data[i] += h;
            minus.data[i] -= h;
            (objective(&plus) - objective(&minus)) / (2.0 * h)
        })
        .collect()
}

#[test]
fn identical_anchor_and_positive_with_orthogonal_negative() {
    let layer = built(6);
    let x = Tensor::new(vec![1, 6], vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    let out = layer.call(&[x], &[]).unwrap();
    assert_eq!(out.shape, vec![1, 1]);
    assert!(approx_eq(&out.data[0], &2.0));
}

#[test]
fn slices_are_normalised_before_distances() {
    // same directions as above, arbitrary lengths
    let layer = built(6);
    let x = Tensor::new(vec![1, 6], vec![3.0, 0.0, 0.5, 0.0, 0.0, 7.0]);
    let out = layer.call(&[x], &[]).unwrap();
    assert!(approx_eq(&out.data[0], &2.0));
}

#[test]
fn swapped_positive_and_negative_flip_the_sign() {
    let layer = built(6);
    let x = Tensor::new(vec![1, 6], vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
    let out = layer.call(&[x], &[]).unwrap();
    assert!(approx_eq(&out.data[0], &-2.0));
}

#[test]
fn output_is_bounded_by_four() {
    let mut rng = StdRng::seed_from_u64(11);
    let layer = built(9);
    let x = random_input(&mut rng, 32, 9);
    let out = layer.call(&[x], &[]).unwrap();
    assert_eq!(out.shape, vec![32, 1]);
    assert!(out.data.iter().all(|v| (-4.0..=4.0).contains(v)));
}

#[test]
fn output_shape_ignores_width() {
    let layer = TripletLossLayer::new();
    for width in [3, 7, 30] {
        let shape = layer
            .compute_output_shape(&InputShape::Single(vec![5, width]))
            .unwrap();
        assert_eq!(shape, vec![5, 1]);
    }
}

#[test]
fn build_derives_slice_width() {
    assert_eq!(built(6).slice_width(), Some(2));
    assert_eq!(built(7).slice_width(), Some(2));
    assert_eq!(built(3).slice_width(), Some(1));
}

#[test]
fn build_rejects_bad_shapes() {
    let mut layer = TripletLossLayer::new();
    assert!(matches!(
        layer.build(&InputShape::Single(vec![4, 2])),
        Err(LayerError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        layer.build(&InputShape::Single(vec![4, 3, 3])),
        Err(LayerError::ShapeMismatch { .. })
    ));
    assert_eq!(
        layer.build(&InputShape::List(vec![vec![4, 6], vec![4, 6]])),
        Err(LayerError::InputArity { expected: 1, got: 2 })
    );
    assert!(!layer.is_built());
}

#[test]
fn output_shape_rejects_input_lists() {
    let layer = TripletLossLayer::new();
    assert_eq!(
        layer.compute_output_shape(&InputShape::List(vec![vec![4, 6], vec![4, 6]])),
        Err(LayerError::InputArity { expected: 1, got: 2 })
    );
}

#[test]
fn call_before_build_is_an_error() {
    let layer = TripletLossLayer::new();
    let x = Ten64::zeros(vec![1, 6]);
    assert_eq!(
        layer.call(&[x.clone()], &[]),
        Err(LayerError::NotBuilt("TripletLossLayer"))
    );
    assert_eq!(
        layer.forward(&WithGrad::new(x)).err(),
        Some(LayerError::NotBuilt("TripletLossLayer"))
    );
}

#[test]
fn call_takes_exactly_one_input() {
    let layer = built(6);
    let x = Ten64::zeros(vec![1, 6]);
    assert_eq!(
        layer.call(&[x.clone(), x], &[]),
        Err(LayerError::InputArity { expected: 1, got: 2 })
    );
}

#[test]
fn masks_are_rejected() {
    let layer = built(6);
    let x = Tensor::new(vec![1, 6], vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    let mask = Tensor::new(vec![1], vec![1.0]);
    assert_eq!(
        layer.call(&[x.clone()], &[Some(mask)]),
        Err(LayerError::MaskingUnsupported("TripletLossLayer"))
    );
    // absent masks are fine
    assert!(layer.call(&[x], &[None]).is_ok());
    assert!(!layer.supports_masking());
}

#[test]
fn narrower_input_than_built_width_is_rejected() {
    let layer = built(9);
    let x = Ten64::zeros(vec![1, 6]);
    assert!(matches!(
        layer.call(&[x], &[]),
        Err(LayerError::ShapeMismatch { .. })
    ));
}

#[test]
fn zero_norm_slice_gives_nan() {
    let layer = built(6);
    let x = Tensor::new(vec![2, 6], vec![
        0.0, 0.0, 1.0, 0.0, 0.0, 1.0, //
        1.0, 0.0, 1.0, 0.0, 0.0, 1.0,
    ]);
    let out = layer.call(&[x], &[]).unwrap();
    assert!(out.data[0].is_nan());
    assert!(approx_eq(&out.data[1], &2.0));
}

#[test]
fn forward_matches_call() {
    let mut rng = StdRng::seed_from_u64(3);
    let layer = built(6);
    let x = random_input(&mut rng, 4, 6);
    let called = layer.call(&[x.clone()], &[]).unwrap();
    let (forward, _) = layer.forward(&WithGrad::new(x)).unwrap();
    assert_eq!(called, forward);
}

#[test]
fn triplet_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(42);
    let (batch, width, n) = (3, 7, 2);
    let x = random_input(&mut rng, batch, width);
    let weights: Vec<f64> = (0..batch).map(|_| rng.random_range(-1.0..1.0)).collect();

    let (_, back) = triplet_loss(&WithGrad::new(x.clone()), n).unwrap();
    let analytic = back(&Tensor::new(vec![batch, 1], weights.clone()));
    assert_eq!(analytic.shape, vec![batch, width]);

    let numeric = numeric_grad(&x, &weights, |t| {
        triplet_loss(&WithGrad::new(t.clone()), n).unwrap().0
    });
    for (i, (a, e)) in analytic.data.iter().zip(&numeric).enumerate() {
        assert!((a - e).abs() < 1e-5, "entry {i}: analytic {a}, numeric {e}");
    }

    // the seventh column is not part of any slice
    for b in 0..batch {
        assert_eq!(analytic.data[b * width + 6], 0.0);
    }
}

#[test]
fn l2_normalize_rows_have_unit_length() {
    let x = WithGrad::new(Tensor::new(vec![2, 2], vec![3.0, 4.0, 0.0, -2.0]));
    let (out, _) = l2_normalize(&x).unwrap();
    assert!(approx_eq(&out, &Tensor::new(vec![2, 2], vec![0.6, 0.8, 0.0, -1.0])));
}

#[test]
fn l2_normalize_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(7);
    let x = random_input(&mut rng, 3, 4);
    let weights: Vec<f64> = (0..x.len()).map(|_| rng.random_range(-1.0..1.0)).collect();

    let (_, back) = l2_normalize(&WithGrad::new(x.clone())).unwrap();
    let analytic = back(&Tensor::new(x.shape.clone(), weights.clone()));

    let numeric = numeric_grad(&x, &weights, |t| {
        l2_normalize(&WithGrad::new(t.clone())).unwrap().0
    });
    for (a, e) in analytic.data.iter().zip(&numeric) {
        assert!((a - e).abs() < 1e-5, "analytic {a}, numeric {e}");
    }
}

#[test]
fn l2_normalize_needs_a_matrix() {
    let x = WithGrad::new(Tensor::new(vec![4], vec![1.0; 4]));
    assert!(matches!(
        l2_normalize(&x).err(),
        Some(LayerError::ShapeMismatch { op: "l2_normalize", .. })
    ));
}
