//! Forward-scanning primitives for terminator patterns.
//!
//! Terminator matchers do not test a fixed position: they sweep the working
//! window for the next occurrence of their pattern. These helpers keep the
//! sweeps O(window) with no allocation.

/// Find the first occurrence of `needle` in `haystack`.
///
/// An empty needle matches at offset 0 (the no-constraint wildcard).
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    let first = needle[0];
    let mut pos = 0;
    while pos + needle.len() <= haystack.len() {
        match haystack[pos..].iter().position(|&b| b == first) {
            Some(skip) => {
                pos += skip;
                if pos + needle.len() > haystack.len() {
                    return None;
                }
                if &haystack[pos..pos + needle.len()] == needle {
                    return Some(pos);
                }
                pos += 1;
            }
            None => return None,
        }
    }
    None
}

/// Length of the run of `escape` bytes immediately preceding `pos`.
pub(crate) fn escape_run(haystack: &[u8], pos: usize, escape: u8) -> usize {
    let mut run = 0;
    while run < pos && haystack[pos - run - 1] == escape {
        run += 1;
    }
    run
}

/// Find the first occurrence of `needle` preceded by an even run of
/// `escape` bytes. Odd-run occurrences are escaped data and are skipped.
pub(crate) fn find_escaped(haystack: &[u8], needle: &[u8], escape: u8) -> Option<usize> {
    let mut from = 0;
    while from <= haystack.len() {
        let pos = from + find(&haystack[from..], needle)?;
        if escape_run(haystack, pos, escape) % 2 == 0 {
            return Some(pos);
        }
        from = pos + 1;
    }
    None
}

/// Find the first byte belonging to any of the inclusive `ranges`.
/// Returns the position and the index of the range that matched it.
pub(crate) fn find_in_ranges(haystack: &[u8], ranges: &[(u8, u8)]) -> Option<(usize, usize)> {
    for (pos, &byte) in haystack.iter().enumerate() {
        if let Some(idx) = range_index(byte, ranges) {
            return Some((pos, idx));
        }
    }
    None
}

/// Index of the first range containing `byte`, if any.
pub(crate) fn range_index(byte: u8, ranges: &[(u8, u8)]) -> Option<usize> {
    ranges
        .iter()
        .position(|&(lo, hi)| byte >= lo && byte <= hi)
}

/// Earliest occurrence across all `candidates`: the candidate whose first
/// occurrence has the smallest offset wins, ties broken by list order.
/// Returns `(position, candidate_index)`.
pub(crate) fn first_of(haystack: &[u8], candidates: &[Vec<u8>]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, cand) in candidates.iter().enumerate() {
        if let Some(pos) = find(haystack, cand) {
            match best {
                Some((bpos, _)) if bpos <= pos => {}
                _ => best = Some((pos, idx)),
            }
            if pos == 0 {
                break; // nothing can occur earlier
            }
        }
    }
    best
}
