//! Two-sample Kolmogorov-Smirnov test.

/// Result of comparing two samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    /// Largest distance between the two empirical CDFs.
    pub statistic: f64,
    /// Asymptotic p-value of `statistic`.
    pub p_value: f64,
}

/// Compare two samples. Missing values must be filtered out by the caller;
/// either sample being empty yields `None`.
pub fn ks_two_sample(reference: &[f64], current: &[f64]) -> Option<KsResult> {
    if reference.is_empty() || current.is_empty() {
        return None;
    }
    let mut a = reference.to_vec();
    let mut b = current.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        // Step both CDFs past every copy of the smaller value so ties move
        // together.
        let v = a[i].min(b[j]);
        while i < a.len() && a[i] <= v {
            i += 1;
        }
        while j < b.len() && b[j] <= v {
            j += 1;
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }

    let en = (n1 * n2 / (n1 + n2)).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    Some(KsResult {
        statistic: d,
        p_value: kolmogorov_survival(lambda),
    })
}

/// `Q_KS(λ) = 2 Σ (-1)^(k-1) exp(-2 k² λ²)`, the probability of a distance at
/// least this large under the null. The series does not converge for small
/// λ, where the value is 1.
pub fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut prev_term = 0.0;
    for k in 1..=100 {
        let kf = k as f64;
        let term = sign * (a2 * kf * kf).exp();
        sum += term;
        if term.abs() <= 0.001 * prev_term || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term.abs();
    }
    1.0
}
