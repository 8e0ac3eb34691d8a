//! Majority-vote smoothing across consecutive predictions
//!
//! Suppresses single-window flicker at the cost of latency: with depth `N`
//! a new gesture needs `N / 2 + 1` agreeing windows before it is emitted.

use heapless::Deque;

use crate::error::ConfigurationError;
use crate::types::{ClassId, Prediction};

/// Largest supported vote depth.
pub const MAX_VOTE_DEPTH: usize = 32;

/// Sliding majority vote over the most recent predictions.
#[derive(Clone, Debug)]
pub struct MajorityVote {
    history: Deque<Prediction, MAX_VOTE_DEPTH>,
    depth: usize,
}

impl MajorityVote {
    /// Create a smoother remembering `depth` predictions.
    ///
    /// # Errors
    ///
    /// `depth` is zero or above [`MAX_VOTE_DEPTH`].
    pub fn new(depth: usize) -> Result<Self, ConfigurationError> {
        if depth == 0 {
            return Err(ConfigurationError::MissingParameter { name: "smoothing depth" });
        }
        if depth > MAX_VOTE_DEPTH {
            return Err(ConfigurationError::CapacityExceeded {
                what: "smoothing depth",
                requested: depth,
                capacity: MAX_VOTE_DEPTH,
            });
        }
        Ok(Self { history: Deque::new(), depth })
    }

    /// Configured depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Record a prediction and return the smoothed one.
    ///
    /// The mode of the history wins, ties going to the lowest class id.
    /// The result carries the newest window index and the score of the most
    /// recent prediction of the winning class.
    pub fn push(&mut self, prediction: Prediction) -> Prediction {
        if self.history.len() == self.depth {
            self.history.pop_front();
        }
        // Capacity is at least depth, so there is always room here
        let _ = self.history.push_back(prediction);

        let mut winner: Option<(ClassId, usize)> = None;
        for candidate in self.history.iter().map(|p| p.class) {
            let votes = self.history.iter().filter(|p| p.class == candidate).count();
            let better = match winner {
                None => true,
                Some((class, best)) => votes > best || (votes == best && candidate < class),
            };
            if better {
                winner = Some((candidate, votes));
            }
        }

        let class = winner.map_or(prediction.class, |(class, _)| class);
        let score = self
            .history
            .iter()
            .rev()
            .find(|p| p.class == class)
            .map_or(prediction.score, |p| p.score);

        Prediction { class, score, window_index: prediction.window_index }
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(class: u16, score: f64, window_index: u64) -> Prediction {
        Prediction { class: ClassId(class), score, window_index }
    }

    #[test]
    fn test_depth_one_is_passthrough() {
        let mut vote = MajorityVote::new(1).unwrap();
        assert_eq!(vote.push(p(2, 0.5, 0)), p(2, 0.5, 0));
        assert_eq!(vote.push(p(1, 0.7, 1)), p(1, 0.7, 1));
    }

    #[test]
    fn test_single_outlier_is_suppressed() {
        let mut vote = MajorityVote::new(3).unwrap();
        vote.push(p(1, 1.0, 0));
        vote.push(p(1, 2.0, 1));
        let out = vote.push(p(3, 9.0, 2));
        assert_eq!(out.class, ClassId(1));
        assert_eq!(out.score, 2.0);
        assert_eq!(out.window_index, 2);
    }

    #[test]
    fn test_tie_goes_to_lowest_class() {
        let mut vote = MajorityVote::new(4).unwrap();
        vote.push(p(2, 1.0, 0));
        vote.push(p(1, 1.0, 1));
        vote.push(p(2, 1.0, 2));
        let out = vote.push(p(1, 4.0, 3));
        assert_eq!(out.class, ClassId(1));
        assert_eq!(out.score, 4.0);
    }

    #[test]
    fn test_old_entries_age_out() {
        let mut vote = MajorityVote::new(2).unwrap();
        vote.push(p(0, 1.0, 0));
        vote.push(p(0, 1.0, 1));
        vote.push(p(5, 1.0, 2));
        assert_eq!(vote.push(p(5, 1.5, 3)).class, ClassId(5));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut vote = MajorityVote::new(3).unwrap();
        vote.push(p(1, 1.0, 0));
        vote.push(p(1, 1.0, 1));
        vote.reset();
        assert_eq!(vote.push(p(2, 1.0, 2)).class, ClassId(2));
    }

    #[test]
    fn test_depth_bounds() {
        assert!(MajorityVote::new(0).is_err());
        assert!(MajorityVote::new(MAX_VOTE_DEPTH + 1).is_err());
        assert!(MajorityVote::new(MAX_VOTE_DEPTH).is_ok());
    }
}
