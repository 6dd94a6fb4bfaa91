//! String similarity and alignment primitives used by the approximate matchers.
//!
//! All functions operate on raw bytes and compare bases case-sensitively; callers are expected
//! to pass sanitized (upper case) adapter sequences.

/// The length of the longest common subsequence of `alpha` and `beta`.
fn longest_common_subsequence(alpha: &[u8], beta: &[u8]) -> usize {
    let mut prev = vec![0usize; beta.len() + 1];
    let mut curr = vec![0usize; beta.len() + 1];
    for a in alpha {
        for (j, b) in beta.iter().enumerate() {
            curr[j + 1] = if a == b { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[beta.len()]
}

/// Edit distance where only insertions and deletions are allowed (a substitution costs two).
pub fn indel_distance(alpha: &[u8], beta: &[u8]) -> usize {
    alpha.len() + beta.len() - 2 * longest_common_subsequence(alpha, beta)
}

/// Similarity ratio in `[0, 1]`: `(len_a + len_b - indel_distance) / (len_a + len_b)`.
///
/// Two empty strings are identical and have a ratio of `1.0`.
#[allow(clippy::cast_precision_loss)]
pub fn similarity_ratio(alpha: &[u8], beta: &[u8]) -> f64 {
    let total = alpha.len() + beta.len();
    if total == 0 {
        return 1.0;
    }
    (total - indel_distance(alpha, beta)) as f64 / total as f64
}

/// Optimal string alignment distance: substitutions, insertions, deletions and transpositions of
/// adjacent bases each cost one, and no substring is edited more than once.
pub fn osa_distance(alpha: &[u8], beta: &[u8]) -> usize {
    let (n, m) = (alpha.len(), beta.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }
    let width = m + 1;
    let mut d = vec![0usize; (n + 1) * width];
    for i in 0..=n {
        d[i * width] = i;
    }
    for j in 0..=m {
        d[j] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(alpha[i - 1] != beta[j - 1]);
            let mut best = (d[(i - 1) * width + j] + 1)
                .min(d[i * width + j - 1] + 1)
                .min(d[(i - 1) * width + j - 1] + cost);
            if i > 1 && j > 1 && alpha[i - 1] == beta[j - 2] && alpha[i - 2] == beta[j - 1] {
                best = best.min(d[(i - 2) * width + j - 2] + 1);
            }
            d[i * width + j] = best;
        }
    }
    d[n * width + m]
}

/// [`osa_distance`] scaled by the length of the longer string, in `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
pub fn normalized_osa_distance(alpha: &[u8], beta: &[u8]) -> f64 {
    let longest = alpha.len().max(beta.len());
    if longest == 0 {
        return 0.0;
    }
    osa_distance(alpha, beta) as f64 / longest as f64
}

/// Scores for local alignment. Penalties are given as positive numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentScoring {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    /// Cost of the first base of a gap.
    pub gap_open: i32,
    /// Cost of every further base of a gap.
    pub gap_extend: i32,
}

impl Default for AlignmentScoring {
    fn default() -> Self {
        Self { match_score: 1, mismatch_penalty: 3, gap_open: 5, gap_extend: 2 }
    }
}

/// The best local alignment of a query against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAlignment {
    pub score: i32,
    /// First aligned target position.
    pub target_start: usize,
    /// One past the last aligned target position.
    pub target_end: usize,
}

/// A DP cell: best score ending here and the target position where that alignment started.
#[derive(Debug, Clone, Copy)]
struct Cell {
    score: i32,
    start: usize,
}

const EMPTY: Cell = Cell { score: 0, start: 0 };
const NEG: Cell = Cell { score: i32::MIN / 2, start: 0 };

/// Smith-Waterman local alignment with affine gaps (Gotoh).
///
/// Returns `None` if no positive scoring alignment exists. Among equally scoring alignments the
/// one ending earliest in the target wins.
pub fn smith_waterman(
    query: &[u8],
    target: &[u8],
    scoring: &AlignmentScoring,
) -> Option<LocalAlignment> {
    let n = query.len();
    // Columns are query positions; we sweep the target one row at a time.
    let mut h_prev = vec![EMPTY; n + 1];
    let mut h_curr = vec![EMPTY; n + 1];
    // Gaps that consume target bases, carried between rows.
    let mut e = vec![NEG; n + 1];
    let mut best: Option<LocalAlignment> = None;

    for (j, t) in target.iter().enumerate() {
        // Gap that consumes query bases, carried along the row.
        let mut f = NEG;
        h_curr[0] = EMPTY;
        for i in 1..=n {
            let up = h_curr[i - 1];
            f = if up.score - scoring.gap_open >= f.score - scoring.gap_extend {
                Cell { score: up.score - scoring.gap_open, start: up.start }
            } else {
                Cell { score: f.score - scoring.gap_extend, start: f.start }
            };

            let left = h_prev[i];
            e[i] = if left.score - scoring.gap_open >= e[i].score - scoring.gap_extend {
                Cell { score: left.score - scoring.gap_open, start: left.start }
            } else {
                Cell { score: e[i].score - scoring.gap_extend, start: e[i].start }
            };

            let diag = h_prev[i - 1];
            let substitution = if query[i - 1] == *t {
                scoring.match_score
            } else {
                -scoring.mismatch_penalty
            };
            let diag_start = if diag.score == 0 { j } else { diag.start };
            let mut cell = Cell { score: diag.score + substitution, start: diag_start };
            if e[i].score > cell.score {
                cell = e[i];
            }
            if f.score > cell.score {
                cell = f;
            }
            if cell.score <= 0 {
                cell = EMPTY;
            }
            h_curr[i] = cell;

            if cell.score > 0 && best.map_or(true, |b| cell.score > b.score) {
                best = Some(LocalAlignment {
                    score: cell.score,
                    target_start: cell.start,
                    target_end: j + 1,
                });
            }
        }
        std::mem::swap(&mut h_prev, &mut h_curr);
    }
    best
}
