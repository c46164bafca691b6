//! Planar-target intrinsic calibration.
//!
//! 1. A homography per view from the planar object points to the detected
//!    image points (normalized DLT).
//! 2. Zhang's closed-form estimate of the intrinsic matrix from those
//!    homographies.
//! 3. Levenberg-Marquardt refinement of `fx, fy, cx, cy` together with every
//!    view's pose, minimizing the reprojection error. Skew and lens
//!    distortion are held at zero.

use crate::{constants::EPSILON, Error, Result};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Rotation3, SymmetricEigen, Vector3};

const MAX_ITERATIONS: usize = 100;
const PARAMS_PER_VIEW: usize = 6;
const INTRINSIC_PARAMS: usize = 4;

/// Pinhole intrinsics without skew or distortion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    /// Horizontal focal length in pixels
    pub fx: f64,
    /// Vertical focal length in pixels
    pub fy: f64,
    /// Principal point x
    pub cx: f64,
    /// Principal point y
    pub cy: f64,
}

impl Intrinsics {
    fn project(&self, pose: &Pose, object: &Point2<f64>) -> Option<Point2<f64>> {
        let camera = pose.rotation * Vector3::new(object.x, object.y, 0.0) + pose.translation;
        if camera.z <= EPSILON {
            return None;
        }
        Some(Point2::new(
            self.fx * camera.x / camera.z + self.cx,
            self.fy * camera.y / camera.z + self.cy,
        ))
    }
}

/// Outcome of a successful calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSolution {
    /// Refined intrinsics
    pub intrinsics: Intrinsics,
    /// Root-mean-square reprojection error in pixels
    pub rms_error_px: f64,
    /// Refinement iterations performed
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy)]
struct Pose {
    rotation: Rotation3<f64>,
    translation: Vector3<f64>,
}

/// Calibrate from planar `object_points` (meters, z = 0) and one list of
/// detected image points per view, in the same order as the object points.
///
/// # Errors
///
/// Returns `InsufficientData` for fewer than three views, `InvalidInput` for
/// mismatched point counts, and `SolveFailed` when the estimate is degenerate
/// or not finite.
pub fn calibrate(object_points: &[Point2<f64>], views: &[Vec<Point2<f64>>]) -> Result<CalibrationSolution> {
    if views.len() < 3 {
        return Err(Error::InsufficientData {
            captured: views.len(),
            required: 3,
        });
    }
    if object_points.len() < 4 {
        return Err(Error::InvalidInput(format!(
            "At least 4 pattern points are needed, got {}",
            object_points.len()
        )));
    }
    for (i, view) in views.iter().enumerate() {
        if view.len() != object_points.len() {
            return Err(Error::InvalidInput(format!(
                "View {i} has {} points, expected {}",
                view.len(),
                object_points.len()
            )));
        }
        if view.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::InvalidInput(format!("View {i} contains non-finite points")));
        }
    }

    let homographies = views
        .iter()
        .map(|view| estimate_homography(object_points, view))
        .collect::<Result<Vec<_>>>()?;

    let initial = closed_form_intrinsics(&homographies, views)?;
    let poses = homographies
        .iter()
        .map(|h| pose_from_homography(&initial, h))
        .collect::<Result<Vec<_>>>()?;

    let solution = refine(object_points, views, initial, &poses);
    let fx = solution.intrinsics.fx;
    if !fx.is_finite() || fx <= 0.0 || !solution.rms_error_px.is_finite() {
        return Err(Error::SolveFailed(format!(
            "Non-finite result: fx={fx}, rms={}",
            solution.rms_error_px
        )));
    }
    Ok(solution)
}

/// Similarity transform moving the centroid to the origin with mean distance sqrt(2)
fn normalization(points: &[Point2<f64>]) -> Matrix3<f64> {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = points.iter().map(|p| (p.x - cx).hypot(p.y - cy)).sum::<f64>() / n;
    let scale = if mean_dist > EPSILON {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(scale, 0.0, -scale * cx, 0.0, scale, -scale * cy, 0.0, 0.0, 1.0)
}

fn apply(h: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    let v = h * Vector3::new(p.x, p.y, 1.0);
    Point2::new(v.x / v.z, v.y / v.z)
}

/// Unit vector spanning the (approximate) null space of `m`
fn null_vector(m: &DMatrix<f64>) -> DVector<f64> {
    let mtm = m.transpose() * m;
    let eigen = SymmetricEigen::new(mtm);
    let smallest = eigen.eigenvalues.imin();
    eigen.eigenvectors.column(smallest).into_owned()
}

/// Homography mapping planar `src` points onto image `dst` points
///
/// # Errors
///
/// Returns `InvalidInput` for fewer than four correspondences or mismatched
/// lengths, and `SolveFailed` for degenerate point sets
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<Matrix3<f64>> {
    if src.len() < 4 || src.len() != dst.len() {
        return Err(Error::InvalidInput(format!(
            "Homography needs at least 4 matching points, got {} and {}",
            src.len(),
            dst.len()
        )));
    }
    let t_src = normalization(src);
    let t_dst = normalization(dst);

    let mut a = DMatrix::<f64>::zeros(2 * src.len(), 9);
    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let s = apply(&t_src, s);
        let d = apply(&t_dst, d);
        let r = 2 * i;
        a.row_mut(r)
            .copy_from_slice(&[-s.x, -s.y, -1.0, 0.0, 0.0, 0.0, d.x * s.x, d.x * s.y, d.x]);
        a.row_mut(r + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, -s.x, -s.y, -1.0, d.y * s.x, d.y * s.y, d.y]);
    }

    let h = null_vector(&a);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| Error::SolveFailed("Degenerate image points".to_string()))?;
    let mut homography = t_dst_inv * h_norm * t_src;

    let scale = homography[(2, 2)];
    if scale.abs() > EPSILON {
        homography /= scale;
    }
    if homography.iter().any(|v| !v.is_finite()) {
        return Err(Error::SolveFailed("Homography estimate is not finite".to_string()));
    }
    Ok(homography)
}

fn zhang_row(h: &Matrix3<f64>, i: usize, j: usize) -> [f64; 6] {
    [
        h[(0, i)] * h[(0, j)],
        h[(0, i)] * h[(1, j)] + h[(1, i)] * h[(0, j)],
        h[(1, i)] * h[(1, j)],
        h[(2, i)] * h[(0, j)] + h[(0, i)] * h[(2, j)],
        h[(2, i)] * h[(1, j)] + h[(1, i)] * h[(2, j)],
        h[(2, i)] * h[(2, j)],
    ]
}

fn closed_form_intrinsics(homographies: &[Matrix3<f64>], views: &[Vec<Point2<f64>>]) -> Result<Intrinsics> {
    // Condition the problem by working in normalized image coordinates
    let all_points: Vec<Point2<f64>> = views.iter().flatten().copied().collect();
    let n = normalization(&all_points);
    let n_inv = n
        .try_inverse()
        .ok_or_else(|| Error::SolveFailed("Degenerate image points".to_string()))?;

    let mut v = DMatrix::<f64>::zeros(2 * homographies.len(), 6);
    for (k, h) in homographies.iter().enumerate() {
        let h = n * h;
        let v12 = zhang_row(&h, 0, 1);
        let v11 = zhang_row(&h, 0, 0);
        let v22 = zhang_row(&h, 1, 1);
        let diff: Vec<f64> = v11.iter().zip(&v22).map(|(a, b)| a - b).collect();
        v.row_mut(2 * k).copy_from_slice(&v12);
        v.row_mut(2 * k + 1).copy_from_slice(&diff);
    }

    let mut b = null_vector(&v);
    if b[0] < 0.0 {
        b = -b;
    }
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    if denom.abs() < f64::EPSILON * b11.abs().max(1.0) || b11.abs() < f64::EPSILON {
        return Err(Error::SolveFailed("Views do not constrain the intrinsics".to_string()));
    }
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    let alpha_sq = lambda / b11;
    let beta_sq = lambda * b11 / denom;
    if !(alpha_sq > 0.0 && beta_sq > 0.0) {
        return Err(Error::SolveFailed(
            "Closed-form estimate is not positive definite".to_string(),
        ));
    }
    let alpha = alpha_sq.sqrt();
    let beta = beta_sq.sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    // Back from normalized to pixel coordinates; skew is dropped
    let k_norm = Matrix3::new(alpha, gamma, u0, 0.0, beta, v0, 0.0, 0.0, 1.0);
    let k = n_inv * k_norm;
    let intrinsics = Intrinsics {
        fx: k[(0, 0)],
        fy: k[(1, 1)],
        cx: k[(0, 2)],
        cy: k[(1, 2)],
    };

    if [intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy]
        .iter()
        .any(|v| !v.is_finite())
        || intrinsics.fx <= 0.0
        || intrinsics.fy <= 0.0
    {
        return Err(Error::SolveFailed(format!("Invalid closed-form intrinsics: {intrinsics:?}")));
    }
    Ok(intrinsics)
}

fn pose_from_homography(k: &Intrinsics, h: &Matrix3<f64>) -> Result<Pose> {
    let k_inv = Matrix3::new(
        1.0 / k.fx,
        0.0,
        -k.cx / k.fx,
        0.0,
        1.0 / k.fy,
        -k.cy / k.fy,
        0.0,
        0.0,
        1.0,
    );
    let mut r1 = k_inv * h.column(0);
    let mut r2 = k_inv * h.column(1);
    let mut t = k_inv * h.column(2);

    let norm = r1.norm();
    if norm < EPSILON {
        return Err(Error::SolveFailed("Degenerate homography".to_string()));
    }
    let lambda = 1.0 / norm;
    r1 *= lambda;
    r2 *= lambda;
    t *= lambda;

    // The pattern must lie in front of the camera
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);
    let approx = Matrix3::from_columns(&[r1, r2, r3]);

    Ok(Pose {
        rotation: Rotation3::from_matrix(&approx),
        translation: t,
    })
}

fn pack(intrinsics: &Intrinsics, poses: &[Pose]) -> DVector<f64> {
    let mut params = DVector::zeros(INTRINSIC_PARAMS + PARAMS_PER_VIEW * poses.len());
    params[0] = intrinsics.fx;
    params[1] = intrinsics.fy;
    params[2] = intrinsics.cx;
    params[3] = intrinsics.cy;
    for (i, pose) in poses.iter().enumerate() {
        let base = INTRINSIC_PARAMS + PARAMS_PER_VIEW * i;
        let axis = pose.rotation.scaled_axis();
        params.rows_mut(base, 3).copy_from(&axis);
        params.rows_mut(base + 3, 3).copy_from(&pose.translation);
    }
    params
}

fn unpack_intrinsics(params: &DVector<f64>) -> Intrinsics {
    Intrinsics {
        fx: params[0],
        fy: params[1],
        cx: params[2],
        cy: params[3],
    }
}

fn unpack_pose(params: &DVector<f64>, view: usize) -> Pose {
    let base = INTRINSIC_PARAMS + PARAMS_PER_VIEW * view;
    Pose {
        rotation: Rotation3::new(Vector3::new(params[base], params[base + 1], params[base + 2])),
        translation: Vector3::new(params[base + 3], params[base + 4], params[base + 5]),
    }
}

fn residuals(params: &DVector<f64>, object_points: &[Point2<f64>], views: &[Vec<Point2<f64>>]) -> DVector<f64> {
    let intrinsics = unpack_intrinsics(params);
    let mut r = DVector::zeros(2 * object_points.len() * views.len());
    for (v, view) in views.iter().enumerate() {
        let pose = unpack_pose(params, v);
        for (p, (object, observed)) in object_points.iter().zip(view).enumerate() {
            let idx = 2 * (v * object_points.len() + p);
            match intrinsics.project(&pose, object) {
                Some(projected) => {
                    r[idx] = projected.x - observed.x;
                    r[idx + 1] = projected.y - observed.y;
                }
                None => {
                    r[idx] = f64::INFINITY;
                    r[idx + 1] = f64::INFINITY;
                }
            }
        }
    }
    r
}

fn jacobian(params: &DVector<f64>, object_points: &[Point2<f64>], views: &[Vec<Point2<f64>>]) -> DMatrix<f64> {
    let rows = 2 * object_points.len() * views.len();
    let mut j = DMatrix::zeros(rows, params.len());
    let mut perturbed = params.clone();
    for col in 0..params.len() {
        let step = 1e-6 * params[col].abs().max(1.0);
        let original = perturbed[col];
        perturbed[col] = original + step;
        let plus = residuals(&perturbed, object_points, views);
        perturbed[col] = original - step;
        let minus = residuals(&perturbed, object_points, views);
        perturbed[col] = original;
        j.column_mut(col).copy_from(&((plus - minus) / (2.0 * step)));
    }
    j
}

#[allow(clippy::cast_precision_loss)]
fn rms(r: &DVector<f64>) -> f64 {
    (r.norm_squared() / (r.len() / 2).max(1) as f64).sqrt()
}

fn refine(
    object_points: &[Point2<f64>],
    views: &[Vec<Point2<f64>>],
    initial: Intrinsics,
    poses: &[Pose],
) -> CalibrationSolution {
    let mut params = pack(&initial, poses);
    let mut r = residuals(&params, object_points, views);
    let mut cost = r.norm_squared();
    let mut damping = 1e-3;
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS && cost.is_finite() {
        iterations += 1;
        let j = jacobian(&params, object_points, views);
        let jt = j.transpose();
        let jtj = &jt * &j;
        let gradient = &jt * &r;

        let mut improved = false;
        while damping < 1e12 {
            let mut system = jtj.clone();
            for d in 0..system.nrows() {
                system[(d, d)] += damping * jtj[(d, d)].max(1e-12);
            }
            let Some(delta) = system.lu().solve(&(-&gradient)) else {
                damping *= 10.0;
                continue;
            };

            let candidate = &params + &delta;
            let candidate_r = residuals(&candidate, object_points, views);
            let candidate_cost = candidate_r.norm_squared();
            if candidate_cost.is_finite() && candidate_cost < cost {
                let gain = cost - candidate_cost;
                let step_small = delta.norm() < 1e-12 * (params.norm() + 1e-12);
                params = candidate;
                r = candidate_r;
                cost = candidate_cost;
                damping = (damping / 10.0).max(1e-15);
                improved = !(gain < 1e-12 * cost.max(f64::MIN_POSITIVE) || step_small);
                break;
            }
            damping *= 10.0;
        }

        if !improved {
            break;
        }
    }

    let intrinsics = unpack_intrinsics(&params);
    let rms_error_px = rms(&r);
    log::debug!(
        "Calibration refined in {} iterations: fx={:.2}, fy={:.2}, cx={:.2}, cy={:.2}, rms={:.4}px",
        iterations,
        intrinsics.fx,
        intrinsics.fy,
        intrinsics.cx,
        intrinsics.cy,
        rms_error_px
    );
    CalibrationSolution {
        intrinsics,
        rms_error_px,
        iterations,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    pub(crate) const TRUE_K: Intrinsics = Intrinsics {
        fx: 800.0,
        fy: 820.0,
        cx: 320.0,
        cy: 240.0,
    };

    pub(crate) fn board(cols: u32, rows: u32, square: f64) -> Vec<Point2<f64>> {
        (0..rows)
            .flat_map(|j| (0..cols).map(move |i| Point2::new(f64::from(i) * square, f64::from(j) * square)))
            .collect()
    }

    pub(crate) fn synthetic_views(object_points: &[Point2<f64>]) -> Vec<Vec<Point2<f64>>> {
        let poses = [
            (Vector3::new(0.35, 0.0, 0.05), Vector3::new(-0.1, -0.06, 0.55)),
            (Vector3::new(0.0, 0.4, -0.05), Vector3::new(-0.12, -0.05, 0.6)),
            (Vector3::new(-0.3, 0.25, 0.1), Vector3::new(-0.08, -0.07, 0.5)),
            (Vector3::new(0.2, -0.3, 0.0), Vector3::new(-0.1, -0.04, 0.65)),
            (Vector3::new(-0.15, -0.35, -0.1), Vector3::new(-0.09, -0.06, 0.58)),
        ];
        poses
            .iter()
            .map(|(axis, translation)| {
                let pose = Pose {
                    rotation: Rotation3::new(*axis),
                    translation: *translation,
                };
                object_points
                    .iter()
                    .map(|p| TRUE_K.project(&pose, p).unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_homography_maps_points() {
        let src = board(4, 3, 0.05);
        let h_true = Matrix3::new(900.0, 20.0, 100.0, -15.0, 880.0, 80.0, 0.1, 0.05, 1.0);
        let dst: Vec<Point2<f64>> = src.iter().map(|p| apply(&h_true, p)).collect();

        let h = estimate_homography(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let mapped = apply(&h, s);
            assert!((mapped - *d).norm() < 1e-6);
        }
    }

    #[test]
    fn test_recovers_synthetic_intrinsics() {
        let object_points = board(9, 6, 0.025);
        let views = synthetic_views(&object_points);

        let solution = calibrate(&object_points, &views).unwrap();
        let k = solution.intrinsics;
        assert!((k.fx - TRUE_K.fx).abs() / TRUE_K.fx < 1e-3, "{k:?}");
        assert!((k.fy - TRUE_K.fy).abs() / TRUE_K.fy < 1e-3, "{k:?}");
        assert!((k.cx - TRUE_K.cx).abs() < 1.0, "{k:?}");
        assert!((k.cy - TRUE_K.cy).abs() < 1.0, "{k:?}");
        assert!(solution.rms_error_px < 1e-3);
    }

    #[test]
    fn test_noisy_views_stay_close() {
        let object_points = board(9, 6, 0.025);
        let mut rng = StdRng::seed_from_u64(7);
        let views: Vec<Vec<Point2<f64>>> = synthetic_views(&object_points)
            .into_iter()
            .map(|view| {
                view.into_iter()
                    .map(|p| Point2::new(p.x + rng.gen_range(-0.2..0.2), p.y + rng.gen_range(-0.2..0.2)))
                    .collect()
            })
            .collect();

        let solution = calibrate(&object_points, &views).unwrap();
        assert!((solution.intrinsics.fx - TRUE_K.fx).abs() / TRUE_K.fx < 0.02);
        assert!(solution.rms_error_px < 0.5);
    }

    #[test]
    fn test_too_few_views() {
        let object_points = board(9, 6, 0.025);
        let views = synthetic_views(&object_points);
        let result = calibrate(&object_points, &views[..2]);
        assert!(matches!(result, Err(Error::InsufficientData { captured: 2, required: 3 })));
    }

    #[test]
    fn test_mismatched_view() {
        let object_points = board(9, 6, 0.025);
        let mut views = synthetic_views(&object_points);
        views[1].pop();
        assert!(matches!(calibrate(&object_points, &views), Err(Error::InvalidInput(_))));
    }
}
