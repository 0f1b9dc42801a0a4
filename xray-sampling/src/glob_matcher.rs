// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use lru::LruCache;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::constants::rule::MATCH_ALL;
use crate::types::RequestAttributes;

const CACHE_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(255);

/// Matches `text` against a glob `pattern`.
///
/// `*` matches any sequence of characters, including the empty one, and `?` matches exactly
/// one character. The match is case insensitive and anchored at both ends.
///
/// A lone `*` matches everything, even an absent text. Any other pattern fails on an absent
/// text, and the empty pattern only matches the empty text.
pub fn wildcard_match(pattern: &str, text: Option<&str>) -> bool {
    if pattern == MATCH_ALL {
        return true;
    }
    let Some(text) = text else {
        return false;
    };
    if pattern.is_empty() {
        return text.is_empty();
    }
    glob_match(&pattern.to_lowercase(), &text.to_lowercase())
}

/// Checks that every rule attribute is present in `attributes` with a matching string value.
pub fn attribute_match<A: RequestAttributes + ?Sized>(
    attributes: Option<&A>,
    rule_attributes: &HashMap<String, String>,
) -> bool {
    if rule_attributes.is_empty() {
        return true;
    }
    let Some(attributes) = attributes else {
        return false;
    };
    rule_attributes.iter().all(|(key, pattern)| {
        attributes
            .get_str(key)
            .is_some_and(|value| wildcard_match(pattern, Some(value.as_ref())))
    })
}

/// Backtracking glob algorithm over already lowercased inputs.
fn glob_match(pattern: &str, subject: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let subject: Vec<char> = subject.chars().collect();

    let mut px = 0; // Pattern index
    let mut sx = 0; // Subject index
    let mut next_px = 0; // Next backtracking pattern index
    let mut next_sx = 0; // Next backtracking subject index

    while px < pattern.len() || sx < subject.len() {
        if px < pattern.len() {
            match pattern[px] {
                '?' if sx < subject.len() => {
                    px += 1;
                    sx += 1;
                    continue;
                }
                '*' => {
                    next_px = px;
                    next_sx = sx + 1;
                    px += 1;
                    continue;
                }
                c if c != '?' && sx < subject.len() && subject[sx] == c => {
                    px += 1;
                    sx += 1;
                    continue;
                }
                _ => {}
            }
        }
        // Retry from the last `*`, letting it swallow one more character
        if 0 < next_sx && next_sx <= subject.len() {
            px = next_px;
            sx = next_sx;
            continue;
        }
        return false;
    }
    true
}

/// A precompiled rule predicate.
///
/// Keeps the lowercased pattern and an LRU cache of recent subjects, since the same host or
/// path tends to be matched on every request.
pub struct GlobMatcher {
    pattern: String,
    pattern_lower: String,
    cache: Mutex<LruCache<String, bool>>,
}

impl fmt::Debug for GlobMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobMatcher")
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Self {
        GlobMatcher {
            pattern: pattern.to_string(),
            pattern_lower: pattern.to_lowercase(),
            cache: Mutex::new(LruCache::new(CACHE_SIZE)),
        }
    }

    /// Returns the original pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches_all(&self) -> bool {
        self.pattern == MATCH_ALL
    }

    /// Same semantics as [`wildcard_match`]
    pub fn matches(&self, subject: Option<&str>) -> bool {
        if self.matches_all() {
            return true;
        }
        let Some(subject) = subject else {
            return false;
        };
        if self.pattern_lower.is_empty() {
            return subject.is_empty();
        }

        let subject_lower = subject.to_lowercase();
        // A poisoned cache only loses memoization
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(&result) = cache.get(&subject_lower) {
                return result;
            }
        }
        let result = glob_match(&self.pattern_lower, &subject_lower);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(subject_lower, result);
        }
        result
    }
}

impl Clone for GlobMatcher {
    fn clone(&self) -> Self {
        // Each instance keeps its own cache
        GlobMatcher::new(&self.pattern)
    }
}

impl PartialEq for GlobMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}
