//! Cooling schedules.
//!
//! Both encodings cool geometrically with a temperature-dependent factor.
//! The tree schedule spends longer in the mid range; the sequence-pair
//! schedule is flatter.

/// Inner-loop length and cooling factors of one encoding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Schedule {
    moves_per_block: usize,
    bands: [(f64, f64, f64); 5],
    fallback: f64,
}

impl Schedule {
    /// The schedule used with the packing tree.
    pub const TREE: Schedule = Schedule {
        moves_per_block: 10,
        bands: [
            (1000.0, 2000.0, 0.9),
            (500.0, 1000.0, 0.95),
            (200.0, 500.0, 0.96),
            (10.0, 200.0, 0.96),
            (0.1, 15.0, 0.98),
        ],
        fallback: 0.85,
    };

    /// The schedule used with the sequence pair.
    pub const SEQUENCE_PAIR: Schedule = Schedule {
        moves_per_block: 4,
        bands: [
            (1000.0, 2000.0, 0.95),
            (500.0, 1000.0, 0.95),
            (200.0, 500.0, 0.96),
            (10.0, 200.0, 0.96),
            (0.1, 15.0, 0.98),
        ],
        fallback: 0.95,
    };

    /// Cooling factor at `temperature`. Bands are open intervals checked in
    /// order, so the first matching band wins where two overlap.
    pub fn alpha(&self, temperature: f64) -> f64 {
        self.bands
            .iter()
            .find(|&&(lo, hi, _)| temperature > lo && temperature < hi)
            .map_or(self.fallback, |&(_, _, alpha)| alpha)
    }

    /// Moves attempted at each temperature for `blocks` blocks.
    pub fn moves_per_temperature(&self, blocks: usize) -> usize {
        (self.moves_per_block * blocks).max(1)
    }

    /// Number of temperature steps from `start` down to `stop`.
    pub fn steps(&self, start: f64, stop: f64) -> usize {
        let mut t = start;
        let mut steps = 0;
        while t > stop {
            t *= self.alpha(t);
            steps += 1;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_alpha_bands() {
        let s = Schedule::TREE;
        assert_eq!(s.alpha(30000.0), 0.85);
        assert_eq!(s.alpha(1500.0), 0.9);
        assert_eq!(s.alpha(700.0), 0.95);
        assert_eq!(s.alpha(300.0), 0.96);
        assert_eq!(s.alpha(12.0), 0.96);
        assert_eq!(s.alpha(5.0), 0.98);
        assert_eq!(s.alpha(0.05), 0.85);
    }

    #[test]
    fn sequence_pair_falls_back_to_095() {
        let s = Schedule::SEQUENCE_PAIR;
        assert_eq!(s.alpha(30000.0), 0.95);
        assert_eq!(s.alpha(5.0), 0.98);
        assert_eq!(s.alpha(0.05), 0.95);
    }

    #[test]
    fn inner_loop_length() {
        assert_eq!(Schedule::TREE.moves_per_temperature(7), 70);
        assert_eq!(Schedule::SEQUENCE_PAIR.moves_per_temperature(7), 28);
        assert_eq!(Schedule::TREE.moves_per_temperature(0), 1);
    }

    #[test]
    fn schedule_terminates() {
        let steps = Schedule::TREE.steps(30000.0, 0.01);
        assert!(steps > 100 && steps < 1000, "{steps} steps");
    }
}
