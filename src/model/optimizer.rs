// Bounded Nelder-Mead simplex minimizer
//
// Used for the surrogate's hyperparameter search. The search space is
// small (three log-hyperparameters), so a derivative-free simplex keeps the
// likelihood code free of gradient bookkeeping. Every trial point is
// clamped to the box; non-finite objective values count as +inf.

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Initial simplex edge as a fraction of each bound's width
const INITIAL_STEP_FRACTION: f64 = 0.05;

/// Outcome of one minimization run
#[derive(Debug, Clone)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

fn clamp_into(point: &mut [f64], bounds: &[(f64, f64)]) {
    for (value, &(lo, hi)) in point.iter_mut().zip(bounds) {
        *value = value.clamp(lo, hi);
    }
}

/// Point at `centroid + coef * (centroid - worst)`, clamped
fn step_from(centroid: &[f64], worst: &[f64], coef: f64, bounds: &[(f64, f64)]) -> Vec<f64> {
    let mut p: Vec<f64> = centroid
        .iter()
        .zip(worst)
        .map(|(c, w)| c + coef * (c - w))
        .collect();
    clamp_into(&mut p, bounds);
    p
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        f64::INFINITY
    }
}

/// Minimize `objective` inside the box `bounds`, starting from `start`
pub fn minimize<F>(
    mut objective: F,
    start: &[f64],
    bounds: &[(f64, f64)],
    max_iterations: usize,
    tolerance: f64,
) -> OptimizeResult
where
    F: FnMut(&[f64]) -> f64,
{
    let dim = start.len();
    debug_assert_eq!(dim, bounds.len());

    let mut origin = start.to_vec();
    clamp_into(&mut origin, bounds);

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
    simplex.push(origin.clone());
    for i in 0..dim {
        let (lo, hi) = bounds[i];
        let step = INITIAL_STEP_FRACTION * (hi - lo);
        let mut vertex = origin.clone();
        vertex[i] = if origin[i] + step <= hi {
            origin[i] + step
        } else {
            origin[i] - step
        };
        clamp_into(&mut vertex, bounds);
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| sanitize(objective(v))).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;

        // Order vertices best-first
        let mut order: Vec<usize> = (0..=dim).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[dim];
        let spread = (worst - best).abs();
        let size = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        if best.is_finite() && spread <= tolerance && size <= tolerance.sqrt() {
            converged = true;
            break;
        }

        let mut centroid = vec![0.0; dim];
        for vertex in &simplex[..dim] {
            for (c, x) in centroid.iter_mut().zip(vertex) {
                *c += x / dim as f64;
            }
        }

        let worst_vertex = simplex[dim].clone();
        let along = |coef: f64| step_from(&centroid, &worst_vertex, coef, bounds);

        let reflected = along(REFLECTION);
        let f_reflected = sanitize(objective(&reflected));

        if f_reflected < values[0] {
            let expanded = along(EXPANSION);
            let f_expanded = sanitize(objective(&expanded));
            if f_expanded < f_reflected {
                simplex[dim] = expanded;
                values[dim] = f_expanded;
            } else {
                simplex[dim] = reflected;
                values[dim] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[dim - 1] {
            simplex[dim] = reflected;
            values[dim] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[dim] {
            let p = along(CONTRACTION);
            let f = sanitize(objective(&p));
            (p, f)
        } else {
            let p = along(-CONTRACTION);
            let f = sanitize(objective(&p));
            (p, f)
        };

        if f_contracted < values[dim].min(f_reflected) {
            simplex[dim] = contracted;
            values[dim] = f_contracted;
            continue;
        }

        // Shrink toward the best vertex
        let best_vertex = simplex[0].clone();
        for i in 1..=dim {
            for (x, b) in simplex[i].iter_mut().zip(&best_vertex) {
                *x = b + SHRINK * (*x - b);
            }
            values[i] = sanitize(objective(&simplex[i]));
        }
    }

    let (best_idx, _) = values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .unwrap_or((0, &f64::INFINITY));

    OptimizeResult {
        x: simplex[best_idx].clone(),
        value: values[best_idx],
        iterations,
        converged,
    }
}
