//! Specificity ranked wildcard matching
//!
//! Patterns may contain `*` (any run of characters) and alternation groups like `{sync|create}`
//! which may be nested. A pattern is expanded into all of its literal variants and every variant
//! is matched shell-style against a candidate. When multiple patterns match the same candidate,
//! the [`Rank`] decides which one is the most specific. Patterns without wildcards always beat
//! patterns with wildcards, patterns with fewer alternatives beat patterns with more alternatives,
//! and equally specific patterns are ordered by how much literal text they pin down.

use lru::LruCache;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Highest (and the literal-only) score a pattern may achieve
pub const MAX_SCORE: u64 = 100_000;

/// Most literal variants a single pattern may expand into
pub const MAX_VARIANTS: usize = 1024;

const WILDCARD: char = '*';
const STAR_PENALTY: u64 = 25;
const DEFAULT_CACHE_SIZE: usize = 256;

/// Specificity of a pattern with respect to one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    /// Score in the range `1..=MAX_SCORE`
    pub score: u64,
    /// Number of wildcards in the best matching variant
    pub stars: usize,
    /// Number of literal (non-wildcard) characters in the best matching variant
    pub literal: usize,
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.stars.cmp(&self.stars))
            .then_with(|| self.literal.cmp(&other.literal))
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Variant {
    regex: Regex,
    stars: usize,
    literal: usize,
}

impl Variant {
    fn compile(variant: &str) -> Result<Self, regex::Error> {
        let body = variant
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = Regex::new(&format!("(?s)^{}$", body))?;

        Ok(Self {
            regex,
            stars: variant.matches(WILDCARD).count(),
            literal: variant.chars().filter(|c| *c != WILDCARD).count(),
        })
    }

    /// Fewer wildcards first, then more literal characters
    fn is_more_specific_than(&self, other: &Variant) -> bool {
        self.stars < other.stars || (self.stars == other.stars && self.literal > other.literal)
    }
}

/// Compiled form of a pattern
struct Expansion {
    /// Number of variants including duplicates
    count: usize,
    variants: Vec<Variant>,
}

/// Matcher which caches the compiled variants of recently used patterns
pub struct WildcardMatcher {
    cache: Mutex<LruCache<String, Arc<Expansion>>>,
}

impl Default for WildcardMatcher {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_SIZE)
    }
}

impl WildcardMatcher {
    /// Creates a new instance which remembers up to `capacity` patterns
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity.max(1))),
        }
    }

    /// Scores how well the pattern matches the candidate, `0` meaning it does not match at all
    pub fn score(&self, pattern: &str, candidate: &str) -> u64 {
        self.rank(pattern, candidate)
            .map(|rank| rank.score)
            .unwrap_or(0)
    }

    /// Detailed ranking of the pattern against the candidate or `None` if it does not match
    pub fn rank(&self, pattern: &str, candidate: &str) -> Option<Rank> {
        let expansion = self.expansion(pattern);
        let count = expansion.count.max(1) as u64;

        let best = expansion
            .variants
            .iter()
            .filter(|variant| variant.regex.is_match(candidate))
            .fold(None, |best: Option<&Variant>, variant| match best {
                Some(current) if !variant.is_more_specific_than(current) => Some(current),
                _ => Some(variant),
            })?;

        let stars = best.stars as u64;
        let score = (MAX_SCORE / count) / (1 + stars * stars * STAR_PENALTY) + best.literal as u64;

        Some(Rank {
            score: score.clamp(1, MAX_SCORE),
            stars: best.stars,
            literal: best.literal,
        })
    }

    /// Picks the value associated with the most specific pattern matching the candidate
    ///
    /// Ties are resolved by [`Rank`] and finally by the lexicographically smallest pattern,
    /// so the result does not depend on the iteration order of the input.
    pub fn resolve<K, V, I>(&self, candidate: &str, patterns: I) -> Option<V>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut best: Option<(Rank, K, V)> = None;

        for (pattern, value) in patterns {
            let rank = match self.rank(pattern.as_ref(), candidate) {
                Some(rank) => rank,
                None => continue,
            };

            let is_better = match &best {
                None => true,
                Some((best_rank, best_pattern, _)) => match rank.cmp(best_rank) {
                    Ordering::Greater => true,
                    Ordering::Equal => pattern.as_ref() < best_pattern.as_ref(),
                    Ordering::Less => false,
                },
            };

            if is_better {
                best = Some((rank, pattern, value));
            }
        }

        best.map(|(_, _, value)| value)
    }

    fn expansion(&self, pattern: &str) -> Arc<Expansion> {
        let key = pattern.to_owned();

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(expansion) = cache.get(&key) {
                return expansion.clone();
            }
        }

        let expansion = Arc::new(compile(pattern));

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, expansion.clone());
        }

        expansion
    }
}

fn compile(pattern: &str) -> Expansion {
    let expanded = match expand_bounded(pattern, MAX_VARIANTS, &mut HashMap::new()) {
        Some(expanded) => expanded,
        None => {
            warn!(pattern, limit = MAX_VARIANTS, "Pattern expands into too many variants");
            return Expansion {
                count: 0,
                variants: Vec::new(),
            };
        }
    };

    let mut seen = HashSet::new();
    let mut variants = Vec::new();

    for variant in expanded.iter().filter(|variant| seen.insert(variant.as_str())) {
        match Variant::compile(variant) {
            Ok(compiled) => variants.push(compiled),
            Err(error) => warn!(pattern, variant = %variant, %error, "Ignoring uncompilable variant"),
        }
    }

    Expansion {
        count: expanded.len(),
        variants,
    }
}

/// Expands every `{a|b}` alternation group into the literal variants of the pattern
///
/// Groups may be nested, unbalanced braces are treated as literal characters and
/// duplicate variants are only reported once. Returns `None` for patterns expanding
/// into more than [`MAX_VARIANTS`] variants.
pub fn expand(pattern: &str) -> Option<Vec<String>> {
    let mut seen = HashSet::new();

    let variants = expand_bounded(pattern, MAX_VARIANTS, &mut HashMap::new())?
        .into_iter()
        .filter(|variant| seen.insert(variant.clone()))
        .collect();

    Some(variants)
}

/// Number of variants the pattern expands into, duplicates included
///
/// Returns `None` for patterns expanding into more than [`MAX_VARIANTS`] variants.
pub fn variant_count(pattern: &str) -> Option<usize> {
    expand_bounded(pattern, MAX_VARIANTS, &mut HashMap::new()).map(|variants| variants.len())
}

fn expand_bounded(
    pattern: &str,
    limit: usize,
    memo: &mut HashMap<String, Vec<String>>,
) -> Option<Vec<String>> {
    if let Some(known) = memo.get(pattern) {
        return Some(known.clone());
    }

    let variants = match find_group(pattern) {
        None => vec![pattern.to_owned()],
        Some((start, end)) => {
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let mut variants: Vec<String> = Vec::new();

            for option in split_options(&pattern[start + 1..end]) {
                let substituted = format!("{}{}{}", prefix, option, suffix);
                variants.extend(expand_bounded(&substituted, limit, memo)?);

                if variants.len() > limit {
                    return None;
                }
            }

            variants
        }
    };

    memo.insert(pattern.to_owned(), variants.clone());
    Some(variants)
}

/// Byte offsets of the first balanced top-level `{ ... }` group
fn find_group(pattern: &str) -> Option<(usize, usize)> {
    let mut start = None;
    let mut depth = 0usize;

    for (index, character) in pattern.char_indices() {
        match character {
            '{' => {
                if depth == 0 {
                    start = Some(index);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|start| (start, index));
                }
            }
            _ => {}
        }
    }

    None
}

/// Splits the inside of a group at every `|` which is not part of a nested group
fn split_options(inner: &str) -> Vec<&str> {
    let mut options = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;

    for (index, character) in inner.char_indices() {
        match character {
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            '|' if depth == 0 => {
                options.push(&inner[last..index]);
                last = index + 1;
            }
            _ => {}
        }
    }

    options.push(&inner[last..]);
    options
}
