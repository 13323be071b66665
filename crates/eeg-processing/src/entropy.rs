//! Spectral and permutation entropy

/// Entropy features for one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntropyExtractor {
    order: usize,
    delay: usize,
}

impl Default for EntropyExtractor {
    fn default() -> Self {
        EntropyExtractor { order: 3, delay: 1 }
    }
}

impl EntropyExtractor {
    pub fn new(order: usize, delay: usize) -> Self {
        EntropyExtractor { order, delay }
    }

    /// Shannon entropy (nats) of the normalised PSD
    ///
    /// Returns `None` when the spectrum carries no usable energy.
    pub fn try_spectral_entropy(psd: &[f64]) -> Option<f64> {
        let total: f64 = psd.iter().sum();
        if !(total > 0.0 && total.is_finite()) {
            return None;
        }

        let entropy = psd
            .iter()
            .map(|v| v / total)
            .filter(|p| *p > 0.0)
            .map(|p| -p * p.ln())
            .sum();
        Some(entropy)
    }

    /// Spectral entropy with 0.0 substituted for a degenerate spectrum
    pub fn spectral_entropy(&self, psd: &[f64]) -> f64 {
        Self::try_spectral_entropy(psd).unwrap_or(0.0)
    }

    /// Normalised permutation entropy with the configured order and delay
    pub fn permutation_entropy(&self, signal: &[f64]) -> f64 {
        permutation_entropy(signal, self.order, self.delay, true)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn delay(&self) -> usize {
        self.delay
    }
}

/// Ordinal-pattern entropy in bits, optionally scaled to `[0, 1]`
///
/// Ties inside a pattern rank by position, so a flat run maps to the
/// ascending pattern.
pub fn permutation_entropy(signal: &[f64], order: usize, delay: usize, normalize: bool) -> f64 {
    if order < 2 || delay == 0 {
        return 0.0;
    }
    let span = (order - 1) * delay;
    if signal.len() <= span {
        return 0.0;
    }
    let patterns = signal.len() - span;

    let mut counts = vec![0usize; factorial(order)];
    let mut ranks: Vec<usize> = Vec::with_capacity(order);
    for start in 0..patterns {
        ranks.clear();
        ranks.extend(0..order);
        ranks.sort_by(|&a, &b| {
            signal[start + a * delay].total_cmp(&signal[start + b * delay])
        });
        counts[lehmer_index(&ranks)] += 1;
    }

    let total = patterns as f64;
    let entropy: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();

    if normalize {
        entropy / (factorial(order) as f64).log2()
    } else {
        entropy
    }
}

fn factorial(n: usize) -> usize {
    (1..=n).product()
}

/// Position of a permutation in lexicographic order
fn lehmer_index(permutation: &[usize]) -> usize {
    let n = permutation.len();
    let mut index = 0;
    for i in 0..n {
        let smaller_after = permutation[i + 1..]
            .iter()
            .filter(|&&v| v < permutation[i])
            .count();
        index = index * (n - i) + smaller_after;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_lehmer_index_covers_all_permutations() {
        assert_eq!(lehmer_index(&[0, 1, 2]), 0);
        assert_eq!(lehmer_index(&[2, 1, 0]), 5);
        let mut seen = vec![false; 6];
        for p in [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            seen[lehmer_index(&p)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_constant_and_monotonic_have_zero_permutation_entropy() {
        let extractor = EntropyExtractor::default();
        assert_eq!(extractor.permutation_entropy(&vec![3.0; 512]), 0.0);
        let ramp: Vec<f64> = (0..512).map(|i| i as f64).collect();
        assert_eq!(extractor.permutation_entropy(&ramp), 0.0);
    }

    #[test]
    fn test_alternating_series_order_two() {
        let series: Vec<f64> = (0..101).map(|i| (i % 2) as f64).collect();
        let pe = permutation_entropy(&series, 2, 1, true);
        assert!((pe - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_random_noise_is_near_maximal() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise: Vec<f64> = (0..10_000).map(|_| rng.gen_range(-50.0..50.0)).collect();
        let pe = EntropyExtractor::default().permutation_entropy(&noise);
        assert!(pe > 0.98 && pe <= 1.0, "pe {}", pe);

        let raw = permutation_entropy(&noise, 3, 1, false);
        assert!(raw > 2.5 && raw <= 6f64.log2());
    }

    #[test]
    fn test_short_series() {
        assert_eq!(permutation_entropy(&[1.0, 2.0], 3, 1, true), 0.0);
        assert_eq!(permutation_entropy(&[1.0, 3.0, 2.0], 3, 1, true), 0.0);
        assert_eq!(permutation_entropy(&[1.0, 3.0, 2.0, 4.0], 3, 0, true), 0.0);
    }

    #[test]
    fn test_spectral_entropy_flat_and_peaked() {
        let extractor = EntropyExtractor::default();
        let flat = vec![2.0; 64];
        assert!((extractor.spectral_entropy(&flat) - 64f64.ln()).abs() < 1e-12);

        let mut peaked = vec![0.0; 64];
        peaked[10] = 5.0;
        assert_eq!(extractor.spectral_entropy(&peaked), 0.0);
    }

    #[test]
    fn test_degenerate_spectrum_uses_sentinel() {
        let extractor = EntropyExtractor::default();
        assert_eq!(EntropyExtractor::try_spectral_entropy(&[0.0; 16]), None);
        assert_eq!(EntropyExtractor::try_spectral_entropy(&[f64::NAN, 1.0]), None);
        assert_eq!(EntropyExtractor::try_spectral_entropy(&[]), None);
        assert_eq!(extractor.spectral_entropy(&[0.0; 16]), 0.0);
    }
}
