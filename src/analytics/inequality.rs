use super::CompensatedSum;

/// Lorenz curve and discrete Gini coefficient of a distribution.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Lorenz {
    /// Cumulative population fraction, `i / n` for `i in 0..=n`.
    pub x: Vec<f64>,
    /// Cumulative value fraction, starting at 0.
    pub y: Vec<f64>,
    pub gini: f64,
}

/// Lorenz curve over `values` sorted ascending, and
/// `gini = 1 - 2 * (trapezoidal area under the curve)`.
///
/// Pareto ranking is descending; the curve must be built ascending.
/// A zero total is replaced by 1.0, which keeps `y` flat at 0 and
/// yields `gini = 1.0`.
pub fn lorenz_and_gini(values: &[f64]) -> Lorenz {
    let n = values.len();
    if n == 0 {
        return Lorenz {
            x: Vec::new(),
            y: Vec::new(),
            gini: 0.0,
        };
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let total = {
        let t = super::fsum(&sorted);
        if t == 0.0 { 1.0 } else { t }
    };

    let mut y = Vec::with_capacity(n + 1);
    y.push(0.0);
    let mut run = CompensatedSum::default();
    for &v in &sorted {
        run.add(v);
        y.push(run.value() / total);
    }

    let nf = n as f64;
    let x: Vec<f64> = (0..=n).map(|i| i as f64 / nf).collect();

    let mut area = CompensatedSum::default();
    for i in 0..n {
        area.add((y[i] + y[i + 1]) / 2.0 * (x[i + 1] - x[i]));
    }
    let gini = 1.0 - 2.0 * area.value();

    Lorenz { x, y, gini }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_distribution() {
        let l = lorenz_and_gini(&[]);
        assert!(l.x.is_empty());
        assert!(l.y.is_empty());
        assert_eq!(l.gini, 0.0);
    }

    #[test]
    fn test_equal_distribution_has_zero_gini() {
        let l = lorenz_and_gini(&[5.0; 8]);
        assert!(l.gini.abs() < 1e-12, "gini = {}", l.gini);
        assert_eq!(l.x.len(), 9);
        assert_eq!(l.y.len(), 9);
        assert!((l.y[8] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_holder_approaches_one_minus_one_over_n() {
        for n in [2usize, 5, 10, 50] {
            let mut values = vec![0.0; n];
            values[0] = 100.0;
            let l = lorenz_and_gini(&values);
            let expected = 1.0 - 1.0 / n as f64;
            assert!((l.gini - expected).abs() < 1e-9, "n={n}: {} vs {expected}", l.gini);
        }
    }

    #[test]
    fn test_sorts_ascending_before_accumulating() {
        let l = lorenz_and_gini(&[30.0, 10.0, 60.0]);
        assert_eq!(l.x, vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]);
        let expected = [0.0, 0.1, 0.4, 1.0];
        for (got, want) in l.y.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_total_yields_gini_one() {
        let l = lorenz_and_gini(&[0.0, 0.0, 0.0]);
        assert!(l.y.iter().all(|&v| v == 0.0));
        assert!((l.gini - 1.0).abs() < 1e-12);
    }
}
