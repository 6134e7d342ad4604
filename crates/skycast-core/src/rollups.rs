//! Null-aware aggregation
//!
//! Absent samples are excluded from every aggregate. They never count as
//! zero, and an aggregate over nothing is `None` rather than NaN.

/// Accumulator for a mean over optional samples
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample; `None` and non-finite values are skipped
    pub fn add(&mut self, value: Option<f64>) {
        match value {
            Some(v) if v.is_finite() => {
                self.sum += v;
                self.count += 1;
            }
            _ => {}
        }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum / self.count as f64)
    }
}

impl FromIterator<Option<f64>> for Accumulator {
    fn from_iter<I: IntoIterator<Item = Option<f64>>>(iter: I) -> Self {
        let mut acc = Accumulator::new();
        for value in iter {
            acc.add(value);
        }
        acc
    }
}

/// Share of `true` among the defined outcomes
pub fn fraction<I>(outcomes: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<bool>>,
{
    outcomes
        .into_iter()
        .map(|o| o.map(|hit| if hit { 1.0 } else { 0.0 }))
        .collect::<Accumulator>()
        .mean()
}
