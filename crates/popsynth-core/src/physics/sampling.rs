use rand::Rng;
use rand_chacha::ChaChaRng;

/// Lower mass limit of the Kroupa IMF in solar masses.
pub const KROUPA_MIN_MASS: f64 = 0.08;

/// Sample from a power-law distribution p(x) ∝ x^α between x_min and x_max
/// using inverse transform sampling.
pub fn sample_power_law(x_min: f64, x_max: f64, alpha: f64, rng: &mut ChaChaRng) -> f64 {
    let u: f64 = rng.random();
    if (alpha + 1.0).abs() < f64::EPSILON {
        return x_min * (x_max / x_min).powf(u);
    }
    let alpha1 = alpha + 1.0;
    (u * (x_max.powf(alpha1) - x_min.powf(alpha1)) + x_min.powf(alpha1)).powf(1.0 / alpha1)
}

/// Sample uniformly in log space between `min` and `max`.
pub fn sample_log_uniform(rng: &mut ChaChaRng, min: f64, max: f64) -> f64 {
    sample_power_law(min, max, -1.0, rng)
}

fn power_law_integral(lo: f64, hi: f64, alpha: f64) -> f64 {
    if hi <= lo {
        return 0.0;
    }
    let alpha1 = alpha + 1.0;
    (hi.powf(alpha1) - lo.powf(alpha1)) / alpha1
}

/// Sample stellar mass from the Kroupa (2001) Initial Mass Function,
/// restricted to `[min_mass, max_mass]`.
///
/// The IMF is a broken power law, continuous at the break:
/// - 0.08 ≤ M < 0.5 M☉: α = -1.3
/// - M ≥ 0.5 M☉: α = -2.3
pub fn sample_mass_kroupa(rng: &mut ChaChaRng, min_mass: f64, max_mass: f64) -> f64 {
    const BREAK: f64 = 0.5;

    let lo = min_mass.max(KROUPA_MIN_MASS);
    let hi = max_mass.max(lo);

    // Continuity at the break: k_high = k_low * BREAK^(α_high - α_low).
    let low_weight = power_law_integral(lo, hi.min(BREAK), -1.3);
    let high_weight = BREAK * power_law_integral(lo.max(BREAK), hi, -2.3);
    let total = low_weight + high_weight;

    if total <= 0.0 {
        return lo;
    }

    let u: f64 = rng.random();
    if u * total < low_weight {
        sample_power_law(lo, hi.min(BREAK), -1.3, rng)
    } else {
        sample_power_law(lo.max(BREAK), hi, -2.3, rng)
    }
}
