pub mod aggregate;
pub mod inequality;
pub mod pareto;
pub mod report;
pub mod whatif;

/// Neumaier-compensated running sum.
/// Keeps long profit columns exact enough that the last cumulative
/// percentage lands on 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    #[inline]
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Compensated sum of a slice.
pub fn fsum(values: &[f64]) -> f64 {
    let mut acc = CompensatedSum::default();
    for &v in values {
        acc.add(v);
    }
    acc.value()
}

#[inline]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[inline]
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}
