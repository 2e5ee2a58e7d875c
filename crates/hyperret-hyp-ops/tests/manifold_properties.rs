//! Property tests shared by all three geometries.
//!
//! Each property runs over seeded random batches at several curvatures:
//! - invariant preservation of `projx`, `expmap0`, `centroid`
//! - distance symmetry, non-negativity and zero self-distance
//! - exp/log round trip at the origin
//! - zero-curvature limit
//! - centroid sanity

use approx::assert_abs_diff_eq;
use ndarray::{array, concatenate, s, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use hyperret_hyp_ops::{Curvature, HypError, Lorentz, Manifold, ManifoldKind, Poincare};

const CURVATURES: [f64; 3] = [0.1, 1.0, 5.0];

// ─────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────

fn gaussian(rng: &mut StdRng, n: usize, dim: usize, std: f64) -> Array2<f64> {
    let normal = Normal::new(0.0, std).unwrap();
    Array2::from_shape_simple_fn((n, dim), || normal.sample(rng))
}

/// Tangent vectors at the Lorentz origin: a zero time column prepended.
fn lorentz_tangent(v: &Array2<f64>) -> Array2<f64> {
    concatenate![Axis(1), Array2::<f64>::zeros((v.nrows(), 1)), *v]
}

fn manifolds(k: f64) -> Vec<Manifold> {
    [ManifoldKind::Euclidean, ManifoldKind::Poincare, ManifoldKind::Lorentz]
        .into_iter()
        .map(|kind| Manifold::build(kind, Curvature::fixed(k).unwrap(), 1e-5, 1e-5).unwrap())
        .collect()
}

// ─────────────────────────────────────────────────────
// Invariant preservation
// ─────────────────────────────────────────────────────

#[test]
fn lorentz_maps_preserve_invariant() {
    let mut rng = StdRng::seed_from_u64(1);
    for k in CURVATURES {
        let m = Lorentz::new(Curvature::fixed(k).unwrap()).unwrap();
        for std in [0.01, 0.3, 1.0] {
            let v = gaussian(&mut rng, 64, 16, std);
            let x = m.expmap0(lorentz_tangent(&v).view());
            m.assert_check_point_on_manifold(x.view())
                .unwrap_or_else(|e| panic!("k={k} std={std}: {e}"));
        }
        for std in [0.01, 1.0, 5.0] {
            let arbitrary = gaussian(&mut rng, 64, 17, std);
            m.assert_check_point_on_manifold(m.projx(arbitrary.view()).view())
                .unwrap_or_else(|e| panic!("projx k={k} std={std}: {e}"));
        }
    }
}

#[test]
fn poincare_maps_preserve_invariant() {
    let mut rng = StdRng::seed_from_u64(2);
    for c in CURVATURES {
        let m = Poincare::new(Curvature::fixed(c).unwrap());
        for std in [0.01, 1.0, 50.0] {
            let v = gaussian(&mut rng, 64, 16, std);
            let x = m.expmap0(v.view());
            m.assert_check_point_on_manifold(x.view()).unwrap();
            let y = m.mobius_add(x.view(), x.slice(s![..;-1, ..])).unwrap();
            m.assert_check_point_on_manifold(y.view()).unwrap();
        }
    }
}

#[test]
fn centroids_stay_on_manifold() {
    let mut rng = StdRng::seed_from_u64(3);
    for k in CURVATURES {
        for m in manifolds(k) {
            let pts = m.random(10, 8, 1.0, &mut rng).unwrap();
            let c = m.centroid(pts.view(), None).unwrap();
            m.assert_check_point_on_manifold(c.insert_axis(Axis(0)).view())
                .unwrap_or_else(|e| panic!("{} k={k}: {e}", m.kind()));
        }
    }
}

// ─────────────────────────────────────────────────────
// Distance axioms
// ─────────────────────────────────────────────────────

#[test]
fn distances_are_symmetric_nonnegative_and_zero_on_diagonal() {
    let mut rng = StdRng::seed_from_u64(4);
    for k in CURVATURES {
        for m in manifolds(k) {
            let x = m.random(12, 6, 0.7, &mut rng).unwrap();
            let y = m.random(9, 6, 0.7, &mut rng).unwrap();
            let dxy = m.dist_batch(x.view(), y.view()).unwrap();
            let dyx = m.dist_batch(y.view(), x.view()).unwrap();
            assert_eq!(dxy.dim(), (12, 9));
            assert!(dxy.iter().all(|d| *d >= 0.0 && d.is_finite()));
            for (a, b) in dxy.iter().zip(dyx.t().iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
            let dxx = m.dist_batch(x.view(), x.view()).unwrap();
            for d in dxx.diag() {
                assert!(*d < 1e-6, "{} k={k}: self distance {d}", m.kind());
            }
        }
    }
}

#[test]
fn triangle_inequality_holds() {
    let mut rng = StdRng::seed_from_u64(5);
    for k in CURVATURES {
        for m in manifolds(k) {
            let p = m.random(3, 4, 1.0, &mut rng).unwrap();
            let ab = m.dist(p.row(0), p.row(1)).unwrap();
            let bc = m.dist(p.row(1), p.row(2)).unwrap();
            let ac = m.dist(p.row(0), p.row(2)).unwrap();
            assert!(ac <= ab + bc + 1e-9, "{} k={k}", m.kind());
        }
    }
}

// ─────────────────────────────────────────────────────
// Round trips
// ─────────────────────────────────────────────────────

#[test]
fn exp_log_roundtrip_for_moderate_norms() {
    let mut rng = StdRng::seed_from_u64(6);
    for k in CURVATURES {
        let lorentz = Lorentz::new(Curvature::fixed(k).unwrap()).unwrap();
        let v = lorentz_tangent(&gaussian(&mut rng, 32, 10, 0.3));
        let back = lorentz.logmap0(lorentz.expmap0(v.view()).view());
        for (a, b) in v.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }

        let ball = Poincare::new(Curvature::fixed(k).unwrap());
        let v = gaussian(&mut rng, 32, 10, 0.1);
        let back = ball.logmap0(ball.expmap0(v.view()).view());
        for (a, b) in v.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }
}

// ─────────────────────────────────────────────────────
// Zero-curvature limit
// ─────────────────────────────────────────────────────

#[test]
fn lorentz_distance_tends_to_euclidean() {
    let mut rng = StdRng::seed_from_u64(7);
    let m = Lorentz::new(Curvature::fixed(1e-6).unwrap()).unwrap();
    let u = gaussian(&mut rng, 8, 5, 0.5);
    let w = gaussian(&mut rng, 8, 5, 0.5);
    let x = m.expmap0(lorentz_tangent(&u).view());
    let y = m.expmap0(lorentz_tangent(&w).view());
    let d = m.dist_rows(x.view(), y.view()).unwrap();
    for i in 0..8 {
        let diff = &u.row(i) - &w.row(i);
        let euclid = diff.dot(&diff).sqrt();
        assert_abs_diff_eq!(d[i], euclid, epsilon = 1e-4);
    }
}

#[test]
fn poincare_distance_tends_to_twice_euclidean() {
    let mut rng = StdRng::seed_from_u64(8);
    let m = Poincare::new(Curvature::fixed(1e-8).unwrap());
    let u = gaussian(&mut rng, 8, 5, 0.5);
    let w = gaussian(&mut rng, 8, 5, 0.5);
    let d = m.dist_rows(u.view(), w.view()).unwrap();
    for i in 0..8 {
        let diff = &u.row(i) - &w.row(i);
        assert_abs_diff_eq!(d[i], 2.0 * diff.dot(&diff).sqrt(), epsilon = 1e-5);
    }
}

#[test]
fn origin_maps_tend_to_identity() {
    let mut rng = StdRng::seed_from_u64(9);
    let u = gaussian(&mut rng, 8, 5, 1.0);

    let lorentz = Lorentz::new(Curvature::fixed(1e-8).unwrap()).unwrap();
    let lifted = lorentz.expmap0(lorentz_tangent(&u).view());
    for (a, b) in lifted.slice(s![.., 1..]).iter().zip(u.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
    let x = lorentz.add_time(u.view());
    let back = lorentz.logmap0(x.view());
    for (a, b) in back.iter().zip(lorentz_tangent(&u).iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }

    let ball = Poincare::new(Curvature::fixed(1e-8).unwrap());
    for (a, b) in ball.expmap0(u.view()).iter().zip(u.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
    for (a, b) in ball.logmap0(u.view()).iter().zip(u.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
}

// ─────────────────────────────────────────────────────
// Centroid sanity
// ─────────────────────────────────────────────────────

#[test]
fn lorentz_symmetric_pair_pools_to_origin() {
    let m = Lorentz::new(Curvature::fixed(2.0).unwrap()).unwrap();
    let v = array![[0.0, 0.4, -0.7, 0.1]];
    let pts = concatenate![Axis(0), m.expmap0(v.view()), m.expmap0((-&v).view())];
    let c = m.centroid(pts.view(), None).unwrap();
    let o = m.origin(3);
    for (a, b) in c.iter().zip(o.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-10);
    }
}

#[test]
fn centroid_batch_equals_per_sequence_centroid() {
    let mut rng = StdRng::seed_from_u64(9);
    let m = Lorentz::new(Curvature::fixed(0.5).unwrap()).unwrap();
    let mut seqs = Array3::zeros((3, 4, 6));
    for mut s in seqs.outer_iter_mut() {
        s.assign(&m.random(4, 5, 0.8, &mut rng).unwrap());
    }
    let weights = array![[1.0, 1.0, 1.0, 1.0], [0.0, 2.0, 1.0, 0.5], [3.0, 0.0, 0.0, 0.0]];
    let pooled = m.centroid_batch(seqs.view(), Some(weights.view())).unwrap();
    for b in 0..3 {
        let single = m
            .centroid(seqs.index_axis(Axis(0), b), Some(weights.row(b)))
            .unwrap();
        for (a, e) in pooled.row(b).iter().zip(single.iter()) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-12);
        }
    }
    // all weight on one point returns that point
    for (a, e) in pooled.row(2).iter().zip(seqs.slice(s![2, 0, ..]).iter()) {
        assert_abs_diff_eq!(a, e, epsilon = 1e-9);
    }
}

#[test]
fn every_geometry_rejects_zero_weight_sum() {
    let mut rng = StdRng::seed_from_u64(10);
    for m in manifolds(1.0) {
        let pts = m.random(3, 2, 1.0, &mut rng).unwrap();
        let w = array![0.0, 0.0, 0.0];
        assert!(matches!(
            m.centroid(pts.view(), Some(w.view())),
            Err(HypError::InvalidWeights(_))
        ));
    }
}

// ─────────────────────────────────────────────────────
// Concrete scenario
// ─────────────────────────────────────────────────────

#[test]
fn unit_curvature_points_at_half_are_ln2_apart() {
    let k = Curvature::fixed(1.0).unwrap();
    let m = Manifold::build(ManifoldKind::Lorentz, k, 1e-5, 1e-5).unwrap();
    let lorentz = m.as_lorentz().unwrap();
    let pts = lorentz.add_time(array![[0.5, 0.0], [0.0, 0.5]].view());
    m.assert_check_point_on_manifold(pts.view()).unwrap();
    let d = m.dist_batch(pts.view(), pts.view()).unwrap();
    assert_abs_diff_eq!(d[[0, 1]], std::f64::consts::LN_2, epsilon = 1e-5);
    assert_abs_diff_eq!(d[[1, 0]], std::f64::consts::LN_2, epsilon = 1e-5);
}

#[test]
fn learnable_curvature_update_is_seen_by_manifold() {
    let k = Curvature::learnable(1.0).unwrap();
    let m = Manifold::build(ManifoldKind::Poincare, k.clone(), 1e-5, 1e-5).unwrap();
    let x = array![[0.9, 0.0]];
    m.assert_check_point_on_manifold(x.view()).unwrap();
    k.set(4.0).unwrap();
    // radius is now 0.5
    assert!(m.assert_check_point_on_manifold(x.view()).is_err());
    m.assert_check_point_on_manifold(m.projx(x.view()).view()).unwrap();
}
