use rand::Rng;

/// Coin-flip gate in front of a tick's fetch.
///
/// A tick goes ahead only when a uniform draw in `[0, 1)` is strictly greater
/// than the threshold, so `0.0` almost always fetches and `1.0` never does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkipPolicy {
    threshold: f64,
}

impl SkipPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn admits(&self, draw: f64) -> bool {
        draw > self.threshold
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.admits(rng.random::<f64>())
    }
}
