//! N-step return assembly.

/// Computes discounted n-step returns over the ring storage.
///
/// Returns are assembled per sample and never stored: the walk starts at a
/// validated index, so it never touches cells ahead of the write cursor.
#[derive(Debug, Clone)]
pub struct NStepReturn {
    /// Number of steps to accumulate.
    pub n_step: usize,

    /// Discount factor per step.
    pub discount: f32,
}

impl NStepReturn {
    /// Walks up to `n_step` steps forward from `(t, b)` over the flattened
    /// `[T, B]` reward and done columns.
    ///
    /// Accumulates `sum_k discount^k * reward[t+k, b]`, stopping at the first
    /// done flag; the terminal step's reward is included, later steps
    /// contribute nothing. Returns `(return_, done_n)` where `done_n` is true
    /// iff a done flag was seen within the horizon.
    pub fn compute(
        &self,
        reward: &[f32],
        done: &[i8],
        capacity: usize,
        n_envs: usize,
        t: usize,
        b: usize,
    ) -> (f32, bool) {
        let mut return_ = 0f32;
        let mut disc = 1f32;

        for k in 0..self.n_step {
            let ix = ((t + k) % capacity) * n_envs + b;
            return_ += disc * reward[ix];
            if done[ix] != 0 {
                return (return_, true);
            }
            disc *= self.discount;
        }

        (return_, false)
    }
}

#[cfg(test)]
mod tests {
    use super::NStepReturn;

    #[test]
    fn closed_form_without_termination() {
        let nstep = NStepReturn {
            n_step: 3,
            discount: 0.99,
        };
        let reward = vec![1.0f32, 1.0, 1.0, 1.0];
        let done = vec![0i8; 4];
        let (return_, done_n) = nstep.compute(&reward, &done, 4, 1, 0, 0);
        assert!((return_ - 2.9701).abs() < 1e-6);
        assert!(!done_n);
    }

    #[test]
    fn truncates_at_terminal() {
        let nstep = NStepReturn {
            n_step: 3,
            discount: 0.5,
        };
        // done at offset 1: rewards beyond it are excluded.
        let reward = vec![1.0f32, 2.0, 100.0, 100.0];
        let done = vec![0i8, 1, 0, 0];
        let (return_, done_n) = nstep.compute(&reward, &done, 4, 1, 0, 0);
        assert_eq!(return_, 1.0 + 0.5 * 2.0);
        assert!(done_n);
    }

    #[test]
    fn terminal_at_start() {
        let nstep = NStepReturn {
            n_step: 3,
            discount: 0.9,
        };
        let reward = vec![5.0f32, 1.0, 1.0];
        let done = vec![1i8, 0, 0];
        let (return_, done_n) = nstep.compute(&reward, &done, 3, 1, 0, 0);
        assert_eq!(return_, 5.0);
        assert!(done_n);
    }

    #[test]
    fn wraps_around_the_time_axis() {
        let nstep = NStepReturn {
            n_step: 2,
            discount: 1.0,
        };
        // T = 3, B = 2; start at t = 2 of env 1, second step wraps to t = 0.
        let reward = vec![7.0f32, 8.0, 0.0, 0.0, 0.0, 9.0];
        let done = vec![0i8; 6];
        let (return_, done_n) = nstep.compute(&reward, &done, 3, 2, 2, 1);
        assert_eq!(return_, 9.0 + 8.0);
        assert!(!done_n);
    }
}
