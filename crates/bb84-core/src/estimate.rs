//! Decoy-state parameter estimation.
//!
//! Hoeffding-bounded estimates of the vacuum and single-photon detection
//! yields, the phase-error rate, and from them the length of key that can
//! be safely extracted this round. The bounds follow the three-intensity
//! finite-key analysis of Lim et al. (Phys. Rev. A 89, 022307).
//!
//! Everything here is pure floating-point arithmetic over the sifted
//! group sizes and error tallies; both peers observe identical inputs and
//! therefore compute bit-identical key lengths with no further exchange.

use tracing::debug;

use crate::config::PulseAttrs;
use crate::sift::SiftGroup;
use crate::stats::Stats;

/// Hoeffding deviation bound around a decoy subset count.
///
/// `dir` is +1.0 for the upper bound, -1.0 for the lower.
fn hoeffding(mu: f64, p: f64, eps: f64, n: f64, n_k: f64, dir: f64) -> f64 {
    (mu.exp() / p) * (n_k + dir * (n * (21.0 / eps).ln() / 2.0).sqrt())
}

/// Poisson probability mass at `k` for mean `mu`.
fn poisson_pmf(mu: f64, k: u32) -> f64 {
    let mut factorial = 1.0;
    for i in 1..=k {
        factorial *= f64::from(i);
    }
    (-mu).exp() * mu.powi(k as i32) / factorial
}

/// Probability that a pulse carries exactly `k` photons, marginalized
/// over the three intensity preparations.
fn tau(pa: &PulseAttrs, k: u32) -> f64 {
    pa.prob_lo * poisson_pmf(pa.mu_lo, k)
        + pa.prob_med * poisson_pmf(pa.mu_med, k)
        + pa.prob_hi * poisson_pmf(pa.mu_hi, k)
}

/// Binary entropy in bits, pinned to 0 at the endpoints of `[0, 1]`.
///
/// The pin matters: a noiseless round reaches this with exactly 0 and the
/// limit, not NaN, is what the key-length formula needs.
#[must_use]
pub fn binary_entropy(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    if x == 0.0 || x == 1.0 {
        return 0.0;
    }
    -x * x.log2() - (1.0 - x) * (1.0 - x).log2()
}

/// Lower bound on detections caused by vacuum (0-photon) pulses within
/// one basis subset, clamped at 0 where the bound goes vacuously
/// negative.
#[must_use]
pub fn vacuum_bound(meas: &SiftGroup, pa: &PulseAttrs, eps: f64) -> f64 {
    let (mu_med, mu_lo) = (pa.mu_med, pa.mu_lo);
    let n = meas.intensity_total() as f64;
    let n_lo = meas.lo.len() as f64;
    let n_med = meas.med.len() as f64;
    let lo_minus = hoeffding(mu_lo, pa.prob_lo, eps, n, n_lo, -1.0);
    let med_plus = hoeffding(mu_med, pa.prob_med, eps, n, n_med, 1.0);
    let bound = tau(pa, 0) * (mu_med * lo_minus - mu_lo * med_plus) / (mu_med - mu_lo);
    bound.max(0.0)
}

/// Lower bound on detections caused by single-photon pulses within one
/// basis subset, given that subset's vacuum bound `s0`.
#[must_use]
pub fn single_photon_bound(meas: &SiftGroup, pa: &PulseAttrs, eps: f64, s0: f64) -> f64 {
    let (mu_hi, mu_med, mu_lo) = (pa.mu_hi, pa.mu_med, pa.mu_lo);
    let n = meas.intensity_total() as f64;
    let n_hi = meas.hi.len() as f64;
    let n_med = meas.med.len() as f64;
    let n_lo = meas.lo.len() as f64;
    let med_minus = hoeffding(mu_med, pa.prob_med, eps, n, n_med, -1.0);
    let lo_plus = hoeffding(mu_lo, pa.prob_lo, eps, n, n_lo, 1.0);
    let hi_plus = hoeffding(mu_hi, pa.prob_hi, eps, n, n_hi, 1.0);
    let num = tau(pa, 1)
        * mu_hi
        * (med_minus
            - lo_plus
            - (mu_med * mu_med - mu_lo * mu_lo) * (hi_plus - s0 / tau(pa, 0)) / (mu_hi * mu_hi));
    // Strictly positive whenever mu_lo + mu_med < mu_hi holds, which
    // config validation guarantees.
    let denom = mu_hi * (mu_med - mu_lo) - mu_med * mu_med + mu_lo * mu_lo;
    num / denom
}

/// Statistical slack between the observed test-basis error ratio and the
/// phase-error rate of the main basis. Zero observed errors mean zero
/// slack in the limit.
fn gamma_slack(a: f64, b: f64, c: f64, d: f64) -> f64 {
    if b <= 0.0 {
        return 0.0;
    }
    let term1 = (c + d) * (1.0 - b) * b / (c * d * std::f64::consts::LN_2);
    let term2 = (21.0 / a).powi(2) * (c + d) / (c * d * (1.0 - b) * b);
    (term1 * term2.log2()).sqrt()
}

/// Upper-bound the main-basis phase-error rate from the test-basis error
/// tallies. Returns the rate and the total observed test errors.
fn phase_error_rate(
    test: &SiftGroup,
    errors: &SiftGroup,
    pa: &PulseAttrs,
    eps: f64,
    s_x1: f64,
) -> (f64, usize) {
    let (mu_med, mu_lo) = (pa.mu_med, pa.mu_lo);
    let s_z0 = vacuum_bound(test, pa, eps);
    let s_z1 = single_photon_bound(test, pa, eps, s_z0);
    let m_hi = errors.hi.count_ones();
    let m_med = errors.med.count_ones();
    let m_lo = errors.lo.count_ones();
    let m = m_hi + m_med + m_lo;
    let med_plus = hoeffding(mu_med, pa.prob_med, eps, m as f64, m_med as f64, 1.0);
    let lo_minus = hoeffding(mu_lo, pa.prob_lo, eps, m as f64, m_lo as f64, -1.0);
    let nu_z1 = tau(pa, 1) * (med_plus - lo_minus) / (mu_med - mu_lo);
    let ratio = nu_z1 / s_z1;
    (ratio + gamma_slack(eps, ratio, s_z1, s_x1), m)
}

/// Length of key, in bits, that can be safely extracted from the
/// accumulated block, before reconciliation leakage is subtracted.
///
/// Also records the observed QBER into `stats`. May well be negative for
/// undersized or noisy blocks; the caller turns that into
/// `InsufficientKey`.
#[must_use]
pub fn safe_key_len(
    main: &SiftGroup,
    test: &SiftGroup,
    errors: &SiftGroup,
    pa: &PulseAttrs,
    eps_priv: f64,
    eps_correct: f64,
    stats: &mut Stats,
) -> i64 {
    let s_x0 = vacuum_bound(main, pa, eps_priv);
    let s_x1 = single_photon_bound(main, pa, eps_priv, s_x0);
    let (phi_x, m_z) = phase_error_rate(test, errors, pa, eps_priv, s_x1);
    let len = s_x0 + s_x1 * (1.0 - binary_entropy(phi_x))
        - 6.0 * (21.0 / eps_priv).log2()
        - (2.0 / eps_correct).log2();
    stats.qber = m_z as f64 / test.all.len() as f64;
    debug!(
        s_x0,
        s_x1,
        phi_x,
        qber = stats.qber,
        safe_len = len,
        "parameter estimation complete"
    );
    len.floor() as i64
}
