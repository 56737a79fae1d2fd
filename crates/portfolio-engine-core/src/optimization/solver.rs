use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, trace};

use crate::linalg::{max_abs_diff, project_onto_simplex, vec_dot};

/// Smooth objective to be minimised over the probability simplex.
pub trait Objective {
    fn value(&self, w: &[Decimal]) -> Decimal;
    fn gradient(&self, w: &[Decimal]) -> Vec<Decimal>;
}

/// Iteration budget and stopping rule for the solver.
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    pub max_iterations: u32,
    /// Converged once no weight moves by more than this in one iteration.
    pub tolerance: Decimal,
}

/// Result of a solver run. `converged == false` means the budget ran out.
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub weights: Vec<Decimal>,
    pub iterations: u32,
    pub converged: bool,
    /// Largest weight change in the final iteration.
    pub last_delta: Decimal,
}

const INITIAL_STEP: Decimal = dec!(1);
const MAX_STEP: Decimal = dec!(10000);
const MAX_BACKTRACKS: u32 = 60;

/// Projected gradient descent with backtracking line search.
///
/// Each accepted step satisfies
/// f(x+) <= f(x) + g'(x+ - x) + |x+ - x|^2 / (2t),
/// which makes the objective non-increasing from the starting point.
pub fn projected_gradient_descent<O: Objective + ?Sized>(
    objective: &O,
    init: &[Decimal],
    settings: &SolverSettings,
) -> SolverOutcome {
    let mut w = project_onto_simplex(init);
    let mut f = objective.value(&w);
    let mut step = INITIAL_STEP;
    let mut last_delta = Decimal::ZERO;

    for iteration in 1..=settings.max_iterations {
        let grad = objective.gradient(&w);

        let mut t = step;
        let mut accepted: Option<(Vec<Decimal>, Decimal)> = None;
        for _ in 0..MAX_BACKTRACKS {
            let trial: Vec<Decimal> = w
                .iter()
                .zip(grad.iter())
                .map(|(wi, gi)| *wi - t * *gi)
                .collect();
            let candidate = project_onto_simplex(&trial);
            let f_candidate = objective.value(&candidate);

            let diff: Vec<Decimal> = candidate
                .iter()
                .zip(w.iter())
                .map(|(c, x)| *c - *x)
                .collect();
            let bound = f + vec_dot(&grad, &diff) + vec_dot(&diff, &diff) / (dec!(2) * t);
            if f_candidate <= bound {
                accepted = Some((candidate, f_candidate));
                break;
            }
            t /= dec!(2);
        }

        let Some((candidate, f_candidate)) = accepted else {
            // No step length improves on the current point at working precision.
            debug!(iteration, "line search exhausted; treating point as stationary");
            return SolverOutcome {
                weights: w,
                iterations: iteration,
                converged: true,
                last_delta: Decimal::ZERO,
            };
        };

        last_delta = max_abs_diff(&candidate, &w);
        trace!(iteration, %f_candidate, %last_delta, %t, "solver step");
        w = candidate;
        f = f_candidate;

        if last_delta < settings.tolerance {
            debug!(iteration, objective = %f, "solver converged");
            return SolverOutcome {
                weights: w,
                iterations: iteration,
                converged: true,
                last_delta,
            };
        }

        step = (t * dec!(2)).min(MAX_STEP);
    }

    debug!(
        iterations = settings.max_iterations,
        %last_delta,
        "solver exhausted iteration budget"
    );
    SolverOutcome {
        weights: w,
        iterations: settings.max_iterations,
        converged: false,
        last_delta,
    }
}
