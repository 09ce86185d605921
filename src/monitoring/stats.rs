//! Distribution statistics over sorted samples.

/// Sort a copy of `values` ascending.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Quantile of an ascending sample with linear interpolation between the
/// two nearest ranks. `None` for an empty sample.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn max(sorted: &[f64]) -> Option<f64> {
    sorted.last().copied()
}

/// Two-sample Kolmogorov-Smirnov statistic: the largest distance between
/// the empirical CDFs of two ascending samples.
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return 0.0;
    }

    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    // Total order so NaN sorts last and compares equal to itself; `x` is
    // always one of the two heads, so each pass advances at least one side.
    while i < n && j < m {
        let x = if a[i].total_cmp(&b[j]).is_le() { a[i] } else { b[j] };
        // Step past every tied value before measuring
        while i < n && a[i].total_cmp(&x).is_le() {
            i += 1;
        }
        while j < m && b[j].total_cmp(&x).is_le() {
            j += 1;
        }
        d = d.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }
    d
}

/// Asymptotic p-value of a two-sample KS statistic `d` for sample sizes
/// `n` and `m`, using the Kolmogorov distribution with the Stephens
/// small-sample correction.
pub fn ks_p_value(d: f64, n: usize, m: usize) -> f64 {
    if n == 0 || m == 0 {
        return 1.0;
    }
    let effective = (n as f64 * m as f64) / (n + m) as f64;
    let root = effective.sqrt();
    kolmogorov_survival((root + 0.12 + 0.11 / root) * d)
}

/// `Q(λ) = 2 Σ (-1)^(k-1) exp(-2 k² λ²)`. Returns 1 where the series does
/// not converge, which only happens for very small λ.
fn kolmogorov_survival(lambda: f64) -> f64 {
    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for k in 1..=100 {
        let k = k as f64;
        let term = sign * (a2 * k * k).exp();
        sum += term;
        if term.abs() <= 1e-3 * previous || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    1.0
}
