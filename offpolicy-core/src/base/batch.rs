//! Interface of batches sampled for training.

/// A batch of transitions with n-step returns, as consumed by the
/// optimization loops.
///
/// The "now" inputs of a sample are `(obs, prev_act, prev_reward)` and the
/// bootstrap ("next") inputs are `(next_obs, next_prev_act, next_prev_reward)`,
/// taken `n_step` steps ahead of the sampled index.
pub trait TransitionBatch {
    /// A set of observations in a batch.
    type ObsBatch;

    /// A set of actions in a batch.
    type ActBatch;

    /// Returns the number of samples in the batch.
    fn len(&self) -> usize;

    /// Returns `true` if the batch holds no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observations at the sampled indices.
    fn obs(&self) -> &Self::ObsBatch;

    /// Actions taken one step before the sampled indices.
    fn prev_act(&self) -> &Self::ActBatch;

    /// Rewards received one step before the sampled indices.
    fn prev_reward(&self) -> &Vec<f32>;

    /// Actions taken at the sampled indices.
    fn act(&self) -> &Self::ActBatch;

    /// Discounted n-step returns from the sampled indices.
    fn return_(&self) -> &Vec<f32>;

    /// Episode-end flags at the sampled indices.
    fn done(&self) -> &Vec<i8>;

    /// Whether the episode ended within the n-step horizon.
    fn done_n(&self) -> &Vec<i8>;

    /// Observations `n_step` steps ahead of the sampled indices.
    fn next_obs(&self) -> &Self::ObsBatch;

    /// Actions one step before the "next" indices.
    fn next_prev_act(&self) -> &Self::ActBatch;

    /// Rewards one step before the "next" indices.
    fn next_prev_reward(&self) -> &Vec<f32>;
}
