//! Windowed LCS diff for inputs too large for a single DP table
//!
//! The inputs are walked with a sliding window. Each window is diffed with
//! the full LCS and everything up to the last kept token is committed; the
//! rest of the window is carried into the next one. Windows grow while no
//! stable point is found and are capped, so the DP table stays bounded.

use std::collections::HashSet;

use log::debug;

use super::lcs::{Edit, edit_script};

/// Runtime abort rule for inputs that turn out to share almost nothing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuntimeStop {
    /// Committed tokens (both sides) before the ratio is checked
    pub max_processed_tokens: usize,
    pub min_unchanged_ratio: f64,
}

impl Default for RuntimeStop {
    fn default() -> Self {
        Self {
            max_processed_tokens: 150_000,
            min_unchanged_ratio: 0.001,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkOptions {
    pub batch_size: usize,
    pub runtime_stop: Option<RuntimeStop>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            runtime_stop: Some(RuntimeStop::default()),
        }
    }
}

/// The runtime stop rule fired
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
#[error("unchanged ratio {ratio:.4} after {processed} tokens")]
pub struct EarlyStop {
    pub processed: usize,
    pub ratio: f64,
}

/// Adaptive window sizing
#[derive(Debug)]
struct WindowPlan {
    base_chunk: usize,
    chunk: usize,
    max_window: usize,
    min_commit: usize,
    step: usize,
    stalls: u32,
}

impl WindowPlan {
    const STALL_LIMIT: u32 = 3;
    const MAX_GROWTH: usize = 8;

    fn new(batch_size: usize) -> Self {
        let base_chunk = batch_size.max(1);
        Self {
            base_chunk,
            chunk: base_chunk,
            max_window: Self::window_cap(base_chunk),
            min_commit: Self::commit_floor(base_chunk),
            step: Self::growth_step(base_chunk),
            stalls: 0,
        }
    }

    fn window_cap(chunk: usize) -> usize {
        (chunk * 6).max(chunk + 512)
    }

    fn commit_floor(chunk: usize) -> usize {
        (chunk / 10).max(1)
    }

    fn growth_step(chunk: usize) -> usize {
        (chunk / 2).max(64)
    }

    fn record_commit(&mut self, committed: usize) {
        if committed < self.min_commit {
            self.stalls += 1;
        } else {
            self.stalls = 0;
        }
        if self.stalls >= Self::STALL_LIMIT {
            self.grow();
            self.stalls = 0;
        }
    }

    fn grow(&mut self) {
        let ceiling = self.base_chunk * Self::MAX_GROWTH;
        if self.chunk >= ceiling {
            return;
        }
        let next = (self.chunk + self.step).max(self.chunk * 3 / 2).min(ceiling);
        if next == self.chunk {
            return;
        }
        debug!("Growing diff batch {} -> {next}", self.chunk);
        self.chunk = next;
        self.max_window = self.max_window.max(Self::window_cap(next));
        self.min_commit = Self::commit_floor(next);
        self.step = Self::growth_step(next);
    }
}

/// Diff `base` against `comparison` window by window.
///
/// `emit` receives committed edits in order, with indices into the full
/// inputs. Every token of both inputs is covered exactly once.
pub fn chunked_edits<T: Eq>(
    base: &[T],
    comparison: &[T],
    options: &ChunkOptions,
    mut emit: impl FnMut(&[Edit]),
) -> Result<(), EarlyStop> {
    let (n, m) = (base.len(), comparison.len());
    let mut plan = WindowPlan::new(options.batch_size);

    // committed prefix
    let (mut pos1, mut pos2) = (0usize, 0usize);
    // end of the tokens already taken into a window
    let (mut end1, mut end2) = (0usize, 0usize);

    let mut processed = 0usize;
    let mut unchanged = 0usize;

    while pos1 < n || pos2 < m {
        let carried = (end1 - pos1).max(end2 - pos2);
        let mut window = plan.chunk.max(carried);

        let (edits, last_keep, reached_end) = loop {
            end1 = end1.max((pos1 + window).min(n));
            end2 = end2.max((pos2 + window).min(m));
            let w1 = &base[pos1..end1];
            let w2 = &comparison[pos2..end2];

            let edits = edit_script(w1, w2);
            let last_keep = edits.iter().rposition(|e| matches!(e, Edit::Keep { .. }));
            let reached_end = end1 == n && end2 == m;
            let too_large = w1.len() >= plan.max_window || w2.len() >= plan.max_window;

            if last_keep.is_some() || reached_end || too_large {
                break (edits, last_keep, reached_end);
            }
            window = (window + plan.step).min(plan.max_window);
        };

        let commit_len = if reached_end {
            edits.len()
        } else if let Some(idx) = last_keep {
            idx + 1
        } else {
            plan.min_commit.min(edits.len())
        };

        let committed: Vec<Edit> = edits[..commit_len]
            .iter()
            .map(|edit| match *edit {
                Edit::Keep { base, comparison } => Edit::Keep {
                    base: base + pos1,
                    comparison: comparison + pos2,
                },
                Edit::Insert { comparison } => Edit::Insert {
                    comparison: comparison + pos2,
                },
                Edit::Delete { base } => Edit::Delete { base: base + pos1 },
            })
            .collect();

        let used1 = committed.iter().filter(|e| e.takes_base()).count();
        let used2 = committed.iter().filter(|e| e.takes_comparison()).count();
        pos1 += used1;
        pos2 += used2;
        processed += used1 + used2;
        unchanged += committed
            .iter()
            .filter(|e| matches!(e, Edit::Keep { .. }))
            .count();

        if !committed.is_empty() {
            emit(&committed);
        }

        if let Some(stop) = options.runtime_stop {
            if processed >= stop.max_processed_tokens {
                let ratio = unchanged as f64 / processed.max(1) as f64;
                if ratio < stop.min_unchanged_ratio {
                    return Err(EarlyStop { processed, ratio });
                }
            }
        }

        if reached_end {
            break;
        }
        plan.record_commit(commit_len);
    }

    Ok(())
}

/// Sampled unigram and bigram Jaccard similarity of two token streams
#[must_use]
pub fn sampled_similarity<S: AsRef<str>>(base: &[S], comparison: &[S], sample_limit: usize) -> (f64, f64) {
    let uni = jaccard(&sample_set(base, sample_limit, 1), &sample_set(comparison, sample_limit, 1));
    let bi = jaccard(&sample_set(base, sample_limit, 2), &sample_set(comparison, sample_limit, 2));
    (uni, bi)
}

fn sample_set<S: AsRef<str>>(tokens: &[S], sample_limit: usize, ngram: usize) -> HashSet<String> {
    let mut set = HashSet::new();
    if tokens.is_empty() {
        return set;
    }
    let stride = tokens.len().div_ceil(sample_limit.max(1)).max(1);
    let mut i = 0;
    while i + ngram <= tokens.len() {
        let gram = &tokens[i..i + ngram];
        if gram.iter().all(|t| !t.as_ref().is_empty()) {
            let key = gram.iter().map(|t| t.as_ref()).collect::<Vec<&str>>().join("|");
            set.insert(key);
        }
        i += stride;
    }
    set
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|v| large.contains(*v)).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::lcs::lcs_len;

    fn collect(base: &[u32], comparison: &[u32], batch: usize) -> Vec<Edit> {
        let options = ChunkOptions {
            batch_size: batch,
            runtime_stop: None,
        };
        let mut all = Vec::new();
        chunked_edits(base, comparison, &options, |edits| all.extend_from_slice(edits)).unwrap();
        all
    }

    fn reconstruct(edits: &[Edit]) -> (Vec<usize>, Vec<usize>) {
        let mut a = Vec::new();
        let mut b = Vec::new();
        for e in edits {
            match *e {
                Edit::Keep { base, comparison } => {
                    a.push(base);
                    b.push(comparison);
                }
                Edit::Delete { base } => a.push(base),
                Edit::Insert { comparison } => b.push(comparison),
            }
        }
        (a, b)
    }

    /// Deterministic pseudo-random token stream
    fn stream(len: usize, seed: u32, alphabet: u32) -> Vec<u32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (state >> 16) % alphabet
            })
            .collect()
    }

    #[test]
    fn small_input_matches_single_window() {
        let base = stream(60, 1, 8);
        let comparison = stream(70, 2, 8);
        let edits = collect(&base, &comparison, 5000);
        assert_eq!(edits, edit_script(&base, &comparison));
    }

    #[test]
    fn covers_every_token_exactly_once() {
        let base = stream(900, 3, 20);
        let mut comparison = base.clone();
        comparison.splice(100..140, stream(55, 9, 20));
        comparison.splice(600..605, []);

        let edits = collect(&base, &comparison, 32);
        let (a, b) = reconstruct(&edits);
        assert_eq!(a, (0..base.len()).collect::<Vec<_>>());
        assert_eq!(b, (0..comparison.len()).collect::<Vec<_>>());
        for e in &edits {
            if let Edit::Keep { base: i, comparison: j } = *e {
                assert_eq!(base[i], comparison[j]);
            }
        }
    }

    #[test]
    fn near_identical_inputs_keep_nearly_everything() {
        for seed in [5, 11, 23, 42] {
            let base = stream(1200, seed, 500);
            let mut comparison = base.clone();
            comparison[(seed as usize * 97) % base.len()] = 9999;
            let expected = lcs_len(&base, &comparison);

            for batch in [16, 40, 64, 256] {
                let edits = collect(&base, &comparison, batch);
                let kept = edits.iter().filter(|e| matches!(e, Edit::Keep { .. })).count();
                assert_eq!(kept, expected, "seed {seed}, batch {batch}");
                let (a, b) = reconstruct(&edits);
                assert_eq!(a.len(), base.len());
                assert_eq!(b.len(), comparison.len());
            }
        }
    }

    #[test]
    fn disjoint_inputs_make_progress() {
        let base: Vec<u32> = (0..500).collect();
        let comparison: Vec<u32> = (1000..1300).collect();
        let edits = collect(&base, &comparison, 16);
        let (a, b) = reconstruct(&edits);
        assert_eq!(a.len(), 500);
        assert_eq!(b.len(), 300);
    }

    #[test]
    fn runtime_stop_fires_on_dissimilar_inputs() {
        let base: Vec<u32> = (0..400).collect();
        let comparison: Vec<u32> = (1000..1400).collect();
        let options = ChunkOptions {
            batch_size: 50,
            runtime_stop: Some(RuntimeStop {
                max_processed_tokens: 100,
                min_unchanged_ratio: 0.01,
            }),
        };
        let result = chunked_edits(&base, &comparison, &options, |_| {});
        assert!(result.is_err());
    }

    #[test]
    fn window_plan_grows_after_three_stalls() {
        let mut plan = WindowPlan::new(100);
        for _ in 0..3 {
            plan.record_commit(1);
        }
        // max(100 + 64, 150)
        assert_eq!(plan.chunk, 164);
        assert_eq!(plan.min_commit, 16);
        assert_eq!(plan.max_window, 984);
    }

    #[test]
    fn window_plan_growth_is_capped() {
        let mut plan = WindowPlan::new(10);
        for _ in 0..50 {
            plan.grow();
        }
        assert_eq!(plan.chunk, 80);
    }

    #[test]
    fn similarity_of_identical_and_disjoint() {
        let a = ["a", "b", "c", "d"];
        let b = ["w", "x", "y", "z"];
        assert_eq!(sampled_similarity(&a, &a, 10), (1.0, 1.0));
        assert_eq!(sampled_similarity(&a, &b, 10), (0.0, 0.0));
    }
}
