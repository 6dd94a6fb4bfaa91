//! Locate a (possibly corrupted) adapter near the 3' end of a read.
//!
//! Every matcher scans the *reversed* read so that a right anchored search becomes a bounded
//! left to right scan. Only the first `floor(len / stop_after)` reversed positions are tried as
//! a start position, and only the first `match_only` bases of the adapter are used.
//!
//! A match at reversed position `p` is reported as the negative offset `-(p + k)` where `k` is
//! the length of the adapter prefix, whichever variant of it matched: the adapter begins
//! `p + k` bases before the end of the read.
//!
//! Reads are compared case insensitively.

use ahash::AHashSet;
use clap::{ArgEnum, PossibleValue};
use itertools::Itertools;
use log::debug;

use crate::distance::{
    normalized_osa_distance, similarity_ratio, smith_waterman, AlignmentScoring,
};
use crate::errors::{ReasonAdapterInvalid, TrimError};

/// The bases that are allowed in the adapter.
const ALLOWED_BASES: &[u8] = &[b'A', b'C', b'G', b'T', b'N'];

/// The bases used to generate substitutions and insertions.
const VARIANT_BASES: &[u8] = &[b'A', b'C', b'G', b'T'];

/// The default adapter, the 3' adapter of the Illumina small RNA kit.
pub const DEFAULT_ADAPTER: &str = "TGGAATTCTCGGGTGCCAAGG";

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum MatchResult {
    /// The adapter begins `-offset` bases before the end of the read.
    Match { offset: isize },
    NoMatch,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }

    pub fn is_no_match(&self) -> bool {
        !self.is_match()
    }

    /// The exclusive right edge of the part of a read of length `len` that precedes the adapter,
    /// or `None` if there was no match.
    pub fn usable_length(&self, len: usize) -> Option<usize> {
        match self {
            Self::Match { offset } => Some(len.saturating_sub(offset.unsigned_abs())),
            Self::NoMatch => None,
        }
    }
}

#[derive(ArgEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    /// Exact search for every single-edit variant of the adapter.
    #[clap(alias = "adagen")]
    VariantSet,
    /// As `variant-set`, also allowing two adjacent bases to be deleted.
    #[clap(alias = "adagen-fast")]
    WideVariantSet,
    /// Indel similarity ratio over a sliding window.
    #[clap(alias = "leven")]
    Ratio,
    /// Normalized optimal string alignment distance over a sliding window.
    #[clap(alias = "ndleven")]
    NormalizedDistance,
    /// Smith-Waterman local alignment with affine gaps.
    #[clap(alias = "ssw")]
    LocalAlignment,
}

impl MatcherKind {
    pub fn possible_values<'a>() -> impl Iterator<Item = PossibleValue<'a>> {
        MatcherKind::value_variants().iter().filter_map(ArgEnum::to_possible_value)
    }
}

impl std::str::FromStr for MatcherKind {
    type Err = TrimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for variant in Self::value_variants() {
            if variant.to_possible_value().map_or(false, |v| v.matches(s, true)) {
                return Ok(*variant);
            }
        }
        Err(TrimError::UnknownMatcher {
            name: s.to_owned(),
            expected: Self::possible_values().map(|v| v.get_name().to_owned()).join(", "),
        })
    }
}

/// Validated, immutable matcher settings shared by every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    pub kind: MatcherKind,
    /// The adapter, upper cased.
    pub adapter: Vec<u8>,
    /// How many leading adapter bases are used for matching.
    pub match_only: usize,
    /// Maximum normalized distance accepted by the approximate matchers, in `[0, 1]`.
    pub max_distance: f64,
    /// Only the first `len / stop_after` reversed positions are searched.
    pub stop_after: usize,
}

impl MatcherConfig {
    pub fn new(
        kind: MatcherKind,
        adapter: &str,
        match_only: usize,
        max_distance: f64,
        stop_after: usize,
    ) -> Result<Self, TrimError> {
        let adapter = adapter.to_ascii_uppercase().into_bytes();
        if adapter.is_empty() {
            return Err(TrimError::InvalidAdapter {
                adapter: String::new(),
                reason: ReasonAdapterInvalid::EmptyString,
            });
        }
        if let Some(base) = adapter.iter().find(|b| !ALLOWED_BASES.contains(b)) {
            return Err(TrimError::InvalidAdapter {
                adapter: String::from_utf8_lossy(&adapter).into_owned(),
                reason: ReasonAdapterInvalid::InvalidBase(*base),
            });
        }
        if match_only == 0 {
            return Err(TrimError::InvalidOption {
                name: "match-only",
                value: match_only.to_string(),
                reason: "must be at least 1",
            });
        }
        if stop_after == 0 {
            return Err(TrimError::InvalidOption {
                name: "stop-after",
                value: stop_after.to_string(),
                reason: "must be at least 1",
            });
        }
        if !(0.0..=1.0).contains(&max_distance) {
            return Err(TrimError::InvalidOption {
                name: "max-distance",
                value: max_distance.to_string(),
                reason: "must be between 0 and 1",
            });
        }
        Ok(Self { kind, adapter, match_only, max_distance, stop_after })
    }

    /// The adapter bases used for matching.
    pub fn prefix(&self) -> &[u8] {
        &self.adapter[..self.match_only.min(self.adapter.len())]
    }

    /// The adapter prefix in reversed orientation.
    fn reversed_prefix(&self) -> Vec<u8> {
        self.prefix().iter().rev().copied().collect()
    }
}

/// The base trait for all matching algorithms.
pub trait Matcher {
    fn find(&self, seq: &[u8]) -> MatchResult;
}

/// Build the matcher described by `config`. Called once per worker.
pub fn build_matcher(config: &MatcherConfig) -> Box<dyn Matcher + Send> {
    match config.kind {
        MatcherKind::VariantSet | MatcherKind::WideVariantSet => {
            Box::new(VariantSetMatcher::new(config))
        }
        MatcherKind::Ratio => Box::new(RatioMatcher::new(config)),
        MatcherKind::NormalizedDistance => Box::new(NormalizedDistanceMatcher::new(config)),
        MatcherKind::LocalAlignment => Box::new(LocalAlignmentMatcher::new(config)),
    }
}

/// The read reversed and upper cased.
fn reverse_upper(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(u8::to_ascii_uppercase).collect()
}

#[allow(clippy::cast_possible_wrap)]
fn offset(position: usize, length: usize) -> MatchResult {
    MatchResult::Match { offset: -((position + length) as isize) }
}

/// The adapter prefix plus every sequence one substitution, insertion, or deletion away from it,
/// each truncated to `match_only` bases, sorted and deduplicated.
///
/// With `double_deletions` the prefix with any two adjacent bases removed is added as well.
pub fn adapter_variants(
    prefix: &[u8],
    match_only: usize,
    double_deletions: bool,
) -> Vec<Vec<u8>> {
    let truncate = |mut v: Vec<u8>| {
        v.truncate(match_only);
        v
    };
    let substitutions = (0..prefix.len()).flat_map(move |i| {
        VARIANT_BASES.iter().map(move |base| {
            let mut v = prefix.to_vec();
            v[i] = *base;
            v
        })
    });
    let insertions = (0..=prefix.len()).flat_map(move |i| {
        VARIANT_BASES.iter().map(move |base| {
            let mut v = prefix.to_vec();
            v.insert(i, *base);
            v
        })
    });
    let deletions = (0..prefix.len()).map(move |i| {
        let mut v = prefix.to_vec();
        v.remove(i);
        v
    });
    let adjacent_deletions = (0..prefix.len()).filter(move |_| double_deletions).map(move |i| {
        let mut v = prefix.to_vec();
        v.drain(i..(i + 2).min(prefix.len()));
        v
    });
    std::iter::once(prefix.to_vec())
        .chain(substitutions)
        .chain(insertions)
        .chain(deletions)
        .chain(adjacent_deletions)
        .map(truncate)
        .filter(|v| !v.is_empty())
        .sorted()
        .dedup()
        .collect()
}

/// Exact search for any variant of the adapter prefix.
///
/// The earliest reversed position at which some variant starts wins.
pub struct VariantSetMatcher {
    /// Reversed variants, one set per distinct variant length.
    by_length: Vec<(usize, AHashSet<Vec<u8>>)>,
    prefix_len: usize,
    stop_after: usize,
}

impl VariantSetMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        let double_deletions = config.kind == MatcherKind::WideVariantSet;
        let variants = adapter_variants(config.prefix(), config.match_only, double_deletions);
        debug!("Built {} adapter variants", variants.len());
        let by_length = variants
            .into_iter()
            .map(|v| v.into_iter().rev().collect::<Vec<u8>>())
            .into_group_map_by(Vec::len)
            .into_iter()
            .sorted_by_key(|(len, _)| *len)
            .map(|(len, group)| (len, group.into_iter().collect()))
            .collect();
        Self { by_length, prefix_len: config.prefix().len(), stop_after: config.stop_after }
    }
}

impl Matcher for VariantSetMatcher {
    fn find(&self, seq: &[u8]) -> MatchResult {
        let reversed = reverse_upper(seq);
        let limit = seq.len() / self.stop_after;
        for p in 0..limit {
            let found = self
                .by_length
                .iter()
                .any(|(len, set)| reversed.get(p..p + len).map_or(false, |w| set.contains(w)));
            if found {
                return offset(p, self.prefix_len);
            }
        }
        MatchResult::NoMatch
    }
}

/// Sliding window scan shared by the similarity based matchers.
///
/// Windows are adapter sized, clipped at the end of the read.
fn scan_windows(
    seq: &[u8],
    adapter: &[u8],
    limit: usize,
    accept: impl Fn(&[u8]) -> bool,
) -> MatchResult {
    let reversed = reverse_upper(seq);
    for p in 0..limit {
        let window = &reversed[p..(p + adapter.len()).min(reversed.len())];
        if accept(window) {
            return offset(p, adapter.len());
        }
    }
    MatchResult::NoMatch
}

/// Accepts the first window whose indel similarity ratio is at least `1 - max_distance`.
pub struct RatioMatcher {
    reversed_adapter: Vec<u8>,
    min_ratio: f64,
    stop_after: usize,
}

impl RatioMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            reversed_adapter: config.reversed_prefix(),
            min_ratio: 1.0 - config.max_distance,
            stop_after: config.stop_after,
        }
    }
}

impl Matcher for RatioMatcher {
    fn find(&self, seq: &[u8]) -> MatchResult {
        scan_windows(seq, &self.reversed_adapter, seq.len() / self.stop_after, |window| {
            similarity_ratio(&self.reversed_adapter, window) >= self.min_ratio
        })
    }
}

/// Accepts the first window whose normalized OSA distance is at most `max_distance`.
pub struct NormalizedDistanceMatcher {
    reversed_adapter: Vec<u8>,
    max_distance: f64,
    stop_after: usize,
}

impl NormalizedDistanceMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            reversed_adapter: config.reversed_prefix(),
            max_distance: config.max_distance,
            stop_after: config.stop_after,
        }
    }
}

impl Matcher for NormalizedDistanceMatcher {
    fn find(&self, seq: &[u8]) -> MatchResult {
        scan_windows(seq, &self.reversed_adapter, seq.len() / self.stop_after, |window| {
            normalized_osa_distance(&self.reversed_adapter, window) <= self.max_distance
        })
    }
}

/// Aligns the reversed adapter against the searched region of the reversed read.
pub struct LocalAlignmentMatcher {
    reversed_adapter: Vec<u8>,
    min_score_per_base: f64,
    scoring: AlignmentScoring,
    stop_after: usize,
}

impl LocalAlignmentMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            reversed_adapter: config.reversed_prefix(),
            min_score_per_base: 1.0 - config.max_distance,
            scoring: AlignmentScoring::default(),
            stop_after: config.stop_after,
        }
    }
}

impl Matcher for LocalAlignmentMatcher {
    #[allow(clippy::cast_precision_loss)]
    fn find(&self, seq: &[u8]) -> MatchResult {
        let limit = seq.len() / self.stop_after;
        if limit == 0 {
            return MatchResult::NoMatch;
        }
        let adapter_len = self.reversed_adapter.len();
        let region = reverse_upper(&seq[seq.len().saturating_sub(limit + adapter_len)..]);
        match smith_waterman(&self.reversed_adapter, &region, &self.scoring) {
            Some(aln) if f64::from(aln.score) / adapter_len as f64 >= self.min_score_per_base => {
                offset(aln.target_start, adapter_len)
            }
            _ => MatchResult::NoMatch,
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::{
        adapter_variants, build_matcher, MatchResult, Matcher, MatcherConfig, MatcherKind,
        RatioMatcher, VariantSetMatcher, DEFAULT_ADAPTER,
    };
    use crate::errors::{ReasonAdapterInvalid, TrimError};

    fn config(kind: MatcherKind, adapter: &str, match_only: usize) -> MatcherConfig {
        MatcherConfig::new(kind, adapter, match_only, 0.1, 2).unwrap()
    }

    #[test]
    fn test_variants_of_acgt() {
        let variants = adapter_variants(b"ACGT", 4, false);
        let mut expected: Vec<&[u8]> = vec![
            &b"ACGT"[..],
            // substitutions
            b"CCGT", b"GCGT", b"TCGT", b"AAGT", b"AGGT", b"ATGT",
            b"ACAT", b"ACCT", b"ACTT", b"ACGA", b"ACGC", b"ACGG",
            // insertions truncated to four bases, less those equal to a substitution
            b"AACG", b"CACG", b"GACG", b"TACG", b"ACCG", b"AGCG", b"ATCG", b"ACAG", b"ACTG",
            // deletions
            b"CGT", b"AGT", b"ACT", b"ACG",
        ];
        expected.sort_unstable();
        assert_eq!(variants, expected);
    }

    #[test]
    fn test_variants_of_acgt_with_adjacent_deletions() {
        let single = adapter_variants(b"ACGT", 4, false);
        let wide = adapter_variants(b"ACGT", 4, true);
        assert_eq!(wide.len(), 29);
        let added: Vec<&[u8]> =
            wide.iter().filter(|v| !single.contains(v)).map(Vec::as_slice).collect();
        assert_eq!(added, vec![&b"AC"[..], b"AT", b"GT"]);
    }

    #[test]
    fn test_variants_never_empty() {
        let variants = adapter_variants(b"A", 1, true);
        assert_eq!(variants, vec![b"A".to_vec(), b"C".to_vec(), b"G".to_vec(), b"T".to_vec()]);
    }

    #[test]
    fn test_variant_set_finds_exact_match() {
        let matcher = VariantSetMatcher::new(&config(MatcherKind::VariantSet, "ACGT", 4));
        let result = matcher.find(b"XXACGTXX");
        assert_eq!(result, MatchResult::Match { offset: -6 });
        assert_eq!(result.usable_length(8), Some(2));
    }

    #[test]
    fn test_variant_set_prefers_earliest_reversed_position() {
        let matcher = VariantSetMatcher::new(&config(MatcherKind::VariantSet, "ACGT", 4));
        // two copies, the one nearest the 3' end wins
        let result = matcher.find(b"ACGTTTTTTTACGTAA");
        assert_eq!(result.usable_length(16), Some(10));
    }

    #[test]
    fn test_variant_set_tolerates_one_substitution() {
        let cfg = config(MatcherKind::VariantSet, DEFAULT_ADAPTER, 15);
        let matcher = VariantSetMatcher::new(&cfg);
        let insert = b"TACCCTGTAGAACCGAATTTGT";
        let mut read = insert.to_vec();
        read.extend_from_slice(b"TGGAATTCACGGGTGCCAAGG");
        read.extend_from_slice(b"ATCTCG");
        assert_eq!(matcher.find(&read).usable_length(read.len()), Some(insert.len()));
    }

    #[test]
    fn test_variant_set_respects_stop_after() {
        let cfg = MatcherConfig::new(MatcherKind::VariantSet, "ACGT", 4, 0.1, 4).unwrap();
        let matcher = VariantSetMatcher::new(&cfg);
        // reversed start position 4 is past the limit of 12 / 4 = 3
        assert_eq!(matcher.find(b"TTTTACGTTTTT"), MatchResult::NoMatch);
        assert!(matcher.find(b"TTTTTTACGTTT").is_match());
    }

    #[test]
    fn test_ratio_threshold() {
        let cfg = config(MatcherKind::Ratio, "ACGTACGTAC", 10);
        let matcher = RatioMatcher::new(&cfg);
        // identical window: ratio 1.0
        let result = matcher.find(b"GGGGGGGGGGACGTACGTAC");
        assert_eq!(result, MatchResult::Match { offset: -10 });
        assert_eq!(result.usable_length(20), Some(10));
        // no base in common: ratio 0.0
        assert_eq!(matcher.find(b"NNNNNNNNNNNNNNNNNNNN"), MatchResult::NoMatch);
        // one substitution: ratio 0.9
        assert!(matcher.find(b"GGGGGGGGGGACGTTCGTAC").is_match());
    }

    // A window shifted one base into the adapter, `GGAATTCTCGGGTGC`, is two indels away from the
    // prefix and still clears the ratio threshold, so the ratio matcher reports it one base late.
    #[rstest]
    #[case(MatcherKind::VariantSet, 0)]
    #[case(MatcherKind::WideVariantSet, 0)]
    #[case(MatcherKind::Ratio, 1)]
    #[case(MatcherKind::NormalizedDistance, 0)]
    #[case(MatcherKind::LocalAlignment, 0)]
    fn test_every_matcher_finds_the_adapter(#[case] kind: MatcherKind, #[case] late: usize) {
        let matcher = build_matcher(&config(kind, DEFAULT_ADAPTER, 15));
        let insert = b"TGAGGTAGTAGGTTGTATAGTT";
        let mut read = insert.to_vec();
        read.extend_from_slice(DEFAULT_ADAPTER.as_bytes());
        read.extend_from_slice(b"ATCTCGTATG");
        let result = matcher.find(&read);
        assert_eq!(result.usable_length(read.len()), Some(insert.len() + late), "{:?}", kind);
    }

    #[rstest]
    #[case(MatcherKind::VariantSet)]
    #[case(MatcherKind::WideVariantSet)]
    #[case(MatcherKind::Ratio)]
    #[case(MatcherKind::NormalizedDistance)]
    #[case(MatcherKind::LocalAlignment)]
    fn test_every_matcher_ignores_case(#[case] kind: MatcherKind) {
        let matcher = build_matcher(&config(kind, DEFAULT_ADAPTER, 15));
        let mut read = b"TGAGGTAGTAGGTTGTATAGTT".to_vec();
        read.extend_from_slice(DEFAULT_ADAPTER.as_bytes());
        read.extend_from_slice(b"ATCTCGTATG");
        let upper = matcher.find(&read);
        assert!(upper.is_match(), "{:?}", kind);
        assert_eq!(matcher.find(&read.to_ascii_lowercase()), upper, "{:?}", kind);
    }

    #[test]
    fn test_wide_variant_set_finds_adjacent_deletion() {
        // the prefix with its `TT` removed
        let mut read = vec![b'C'; 22];
        read.extend_from_slice(b"TGGAACTCGGGTGCCAAGG");
        let wide = build_matcher(&config(MatcherKind::WideVariantSet, DEFAULT_ADAPTER, 15));
        let result = wide.find(&read);
        // reported at the prefix length, two bases before the deleted adapter starts
        assert_eq!(result, MatchResult::Match { offset: -21 });
        assert_eq!(result.usable_length(read.len()), Some(20));
        let single = build_matcher(&config(MatcherKind::VariantSet, DEFAULT_ADAPTER, 15));
        assert_eq!(single.find(&read), MatchResult::NoMatch);
    }

    #[test]
    fn test_variant_set_reports_prefix_length_for_deletions() {
        let matcher = VariantSetMatcher::new(&config(MatcherKind::VariantSet, "ACGT", 4));
        // `AGT` is ACGT with the C deleted; the offset still spans four bases
        assert_eq!(matcher.find(b"TTTTTTAGT"), MatchResult::Match { offset: -4 });
    }

    #[rstest]
    #[case(MatcherKind::VariantSet)]
    #[case(MatcherKind::WideVariantSet)]
    #[case(MatcherKind::Ratio)]
    #[case(MatcherKind::NormalizedDistance)]
    #[case(MatcherKind::LocalAlignment)]
    fn test_every_matcher_rejects_unrelated_reads(#[case] kind: MatcherKind) {
        let matcher = build_matcher(&config(kind, DEFAULT_ADAPTER, 15));
        assert_eq!(matcher.find(&[b'A'; 50]), MatchResult::NoMatch);
        assert_eq!(matcher.find(b""), MatchResult::NoMatch);
        assert_eq!(matcher.find(b"T"), MatchResult::NoMatch);
    }

    #[rstest]
    #[case("variant-set", MatcherKind::VariantSet)]
    #[case("adagen", MatcherKind::VariantSet)]
    #[case("wide-variant-set", MatcherKind::WideVariantSet)]
    #[case("adagen-fast", MatcherKind::WideVariantSet)]
    #[case("ratio", MatcherKind::Ratio)]
    #[case("leven", MatcherKind::Ratio)]
    #[case("normalized-distance", MatcherKind::NormalizedDistance)]
    #[case("ndleven", MatcherKind::NormalizedDistance)]
    #[case("local-alignment", MatcherKind::LocalAlignment)]
    #[case("SSW", MatcherKind::LocalAlignment)]
    fn test_matcher_kind_from_str(#[case] name: &str, #[case] expected: MatcherKind) {
        assert_eq!(name.parse::<MatcherKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_matcher_kind() {
        let err = "bowtie".parse::<MatcherKind>().unwrap_err();
        assert!(matches!(err, TrimError::UnknownMatcher { ref name, .. } if name == "bowtie"));
        assert!(err.to_string().contains("variant-set"));
    }

    #[test]
    fn test_config_validation() {
        let lower = MatcherConfig::new(MatcherKind::Ratio, "acgtn", 15, 0.1, 2).unwrap();
        assert_eq!(lower.adapter, b"ACGTN".to_vec());
        assert_eq!(lower.prefix(), b"ACGTN");

        let err = MatcherConfig::new(MatcherKind::Ratio, "", 15, 0.1, 2).unwrap_err();
        assert!(matches!(
            err,
            TrimError::InvalidAdapter { reason: ReasonAdapterInvalid::EmptyString, .. }
        ));
        let err = MatcherConfig::new(MatcherKind::Ratio, "ACXT", 15, 0.1, 2).unwrap_err();
        assert!(matches!(
            err,
            TrimError::InvalidAdapter { reason: ReasonAdapterInvalid::InvalidBase(b'X'), .. }
        ));
        for (match_only, max_distance, stop_after) in
            [(0, 0.1, 2), (15, 0.1, 0), (15, -0.1, 2), (15, 1.5, 2), (15, f64::NAN, 2)]
        {
            let err =
                MatcherConfig::new(MatcherKind::Ratio, "ACGT", match_only, max_distance, stop_after)
                    .unwrap_err();
            assert!(matches!(err, TrimError::InvalidOption { .. }));
        }
    }
}
