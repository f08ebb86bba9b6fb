//! The two search strategies behind the deconvolution fit.
//!
//! Both implement [`Optimizer`] over a shared box-bounded objective: a
//! stochastic differential-evolution sweep to escape local structure, and
//! a projected gradient refiner that polishes the best point found. The
//! controller in `deconv` composes them and keeps whichever final point
//! scores lower.
//!
//! The evolution stage is seeded (ChaCha8, default seed 42) so repeated
//! runs over the same spectrum are bit-identical; only the population
//! evaluation fans out over rayon.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Final point of one optimizer run.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub point: Vec<f64>,
    pub value: f64,
}

/// A box-bounded minimizer. `start` fixes the dimensionality; every
/// coordinate of the result stays inside `bounds`.
pub trait Optimizer {
    fn minimize(
        &self,
        objective: &(dyn Fn(&[f64]) -> f64 + Sync),
        bounds: (f64, f64),
        start: &[f64],
    ) -> OptimizationOutcome;
}

/// best/1/bin differential evolution with generation-dithered mutation.
#[derive(Debug, Clone, Copy)]
pub struct DifferentialEvolution {
    pub population_size: usize,
    pub max_generations: usize,
    /// Mutation factor range; one factor is drawn per generation.
    pub mutation: (f64, f64),
    /// Crossover probability for the binomial recombination.
    pub recombination: f64,
    pub seed: u64,
}

impl Optimizer for DifferentialEvolution {
    fn minimize(
        &self,
        objective: &(dyn Fn(&[f64]) -> f64 + Sync),
        bounds: (f64, f64),
        start: &[f64],
    ) -> OptimizationOutcome {
        let dim = start.len();
        let pop = self.population_size.max(4);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        // Seed the start point into the population so the search can never
        // do worse than the caller's initial guess.
        let mut population: Vec<Vec<f64>> = (0..pop)
            .map(|i| {
                if i == 0 {
                    start
                        .iter()
                        .map(|x| x.clamp(bounds.0, bounds.1))
                        .collect()
                } else {
                    (0..dim).map(|_| rng.gen_range(bounds.0..=bounds.1)).collect()
                }
            })
            .collect();
        let mut energies: Vec<f64> = population.par_iter().map(|x| objective(x)).collect();
        let mut best = argmin(&energies);

        for _generation in 0..self.max_generations {
            let factor = rng.gen_range(self.mutation.0..=self.mutation.1);

            // Trial construction consumes the RNG sequentially; only the
            // evaluations fan out.
            let trials: Vec<Vec<f64>> = (0..pop)
                .map(|i| {
                    let r1 = pick_distinct(&mut rng, pop, &[i]);
                    let r2 = pick_distinct(&mut rng, pop, &[i, r1]);
                    let forced = rng.gen_range(0..dim);

                    let mut trial = population[i].clone();
                    for j in 0..dim {
                        if j == forced || rng.gen::<f64>() < self.recombination {
                            let mutant = population[best][j]
                                + factor * (population[r1][j] - population[r2][j]);
                            trial[j] = mutant.clamp(bounds.0, bounds.1);
                        }
                    }
                    trial
                })
                .collect();

            let trial_energies: Vec<f64> =
                trials.par_iter().map(|x| objective(x)).collect();

            for (i, (trial, energy)) in
                trials.into_iter().zip(trial_energies.into_iter()).enumerate()
            {
                if energy <= energies[i] {
                    population[i] = trial;
                    energies[i] = energy;
                }
            }
            best = argmin(&energies);
        }

        OptimizationOutcome {
            point: population[best].clone(),
            value: energies[best],
        }
    }
}

/// Projected gradient descent with Barzilai-Borwein steps and an Armijo
/// backtracking safeguard. Gradients come from central differences.
#[derive(Debug, Clone, Copy)]
pub struct BoundedGradientDescent {
    pub max_iterations: usize,
    /// Applied to both the function decrease and the projected gradient.
    pub tolerance: f64,
}

impl Optimizer for BoundedGradientDescent {
    fn minimize(
        &self,
        objective: &(dyn Fn(&[f64]) -> f64 + Sync),
        bounds: (f64, f64),
        start: &[f64],
    ) -> OptimizationOutcome {
        let mut x: Vec<f64> = start.iter().map(|v| v.clamp(bounds.0, bounds.1)).collect();
        let mut fx = objective(&x);
        let mut grad = central_gradient(objective, &x, bounds);
        let mut step = 1.0;

        for _iteration in 0..self.max_iterations {
            // Converged when the constrained gradient no longer points
            // anywhere feasible.
            let pg_norm = projected_gradient_norm(&x, &grad, bounds);
            if pg_norm <= self.tolerance {
                break;
            }

            let mut accepted = None;
            let mut trial_step = step;
            for _ in 0..40 {
                let candidate: Vec<f64> = x
                    .iter()
                    .zip(grad.iter())
                    .map(|(xi, gi)| (xi - trial_step * gi).clamp(bounds.0, bounds.1))
                    .collect();
                let decrease_bound: f64 = x
                    .iter()
                    .zip(candidate.iter())
                    .zip(grad.iter())
                    .map(|((xi, ci), gi)| gi * (xi - ci))
                    .sum();
                if decrease_bound <= 0.0 {
                    // Stuck on the boundary in every coordinate.
                    break;
                }
                let f_candidate = objective(&candidate);
                if f_candidate <= fx - 1e-4 * decrease_bound {
                    accepted = Some((candidate, f_candidate));
                    break;
                }
                trial_step *= 0.5;
            }

            let (x_new, f_new) = match accepted {
                Some(pair) => pair,
                None => break,
            };
            let grad_new = central_gradient(objective, &x_new, bounds);

            // Barzilai-Borwein spectral step for the next iteration.
            let mut s_dot_s = 0.0;
            let mut s_dot_y = 0.0;
            for ((xn, xo), (gn, go)) in x_new
                .iter()
                .zip(x.iter())
                .zip(grad_new.iter().zip(grad.iter()))
            {
                let s = xn - xo;
                let y = gn - go;
                s_dot_s += s * s;
                s_dot_y += s * y;
            }
            step = if s_dot_y > 1e-30 {
                (s_dot_s / s_dot_y).clamp(1e-12, 1e12)
            } else {
                1.0
            };

            let improvement = fx - f_new;
            x = x_new;
            grad = grad_new;
            fx = f_new;
            if improvement <= self.tolerance * fx.abs().max(1.0) {
                // Function change below tolerance.
                break;
            }
        }

        OptimizationOutcome { point: x, value: fx }
    }
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v < values[best] {
            best = i;
        }
    }
    best
}

fn pick_distinct(rng: &mut ChaCha8Rng, pop: usize, exclude: &[usize]) -> usize {
    loop {
        let candidate = rng.gen_range(0..pop);
        if !exclude.contains(&candidate) {
            return candidate;
        }
    }
}

/// Central-difference gradient with bound-aware sampling offsets.
fn central_gradient(
    objective: &(dyn Fn(&[f64]) -> f64 + Sync),
    x: &[f64],
    bounds: (f64, f64),
) -> Vec<f64> {
    const REL_STEP: f64 = 1e-6;
    let mut grad = vec![0.0; x.len()];
    let mut probe = x.to_vec();
    for j in 0..x.len() {
        let h = REL_STEP * x[j].abs().max(1.0);
        let hi = (x[j] + h).min(bounds.1);
        let lo = (x[j] - h).max(bounds.0);

        probe[j] = hi;
        let f_hi = objective(&probe);
        probe[j] = lo;
        let f_lo = objective(&probe);
        probe[j] = x[j];

        grad[j] = if hi > lo { (f_hi - f_lo) / (hi - lo) } else { 0.0 };
    }
    grad
}

/// Infinity norm of the gradient restricted to feasible directions.
fn projected_gradient_norm(x: &[f64], grad: &[f64], bounds: (f64, f64)) -> f64 {
    let mut norm = 0.0f64;
    for (xi, gi) in x.iter().zip(grad.iter()) {
        let blocked_low = *xi <= bounds.0 && *gi > 0.0;
        let blocked_high = *xi >= bounds.1 && *gi < 0.0;
        if !(blocked_low || blocked_high) {
            norm = norm.max(gi.abs());
        }
    }
    norm
}
