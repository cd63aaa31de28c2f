// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeSet;

use crate::analysis::Analyzer;

pub const DEFAULT_SNIPPET_CHARS: usize = 300;
pub const HIGHLIGHT_MARKER: &str = "**";

/// Builds a highlighted window of at most `max_chars` characters over the
/// densest cluster of words whose analyzed form is in `terms`.
///
/// Without any match the leading window is returned unhighlighted.
pub fn build_snippet(
    body: &str,
    analyzer: &Analyzer,
    terms: &BTreeSet<String>,
    max_chars: usize,
) -> String {
    let max_chars = max_chars.max(1);
    let char_starts: Vec<usize> = body.char_indices().map(|(idx, _)| idx).collect();
    let total = char_starts.len();
    let to_char = |byte: usize| char_starts.partition_point(|&b| b < byte);
    let to_byte = |ch: usize| char_starts.get(ch).copied().unwrap_or(body.len());

    let matches: Vec<(usize, usize)> = analyzer
        .tokens(body)
        .into_iter()
        .filter(|token| terms.contains(&token.term))
        .map(|token| (to_char(token.start), to_char(token.end)))
        .collect();

    let (mut start, mut end) = match densest_cluster(&matches, max_chars) {
        Some((first, last)) => {
            let (cluster_start, cluster_end) = (matches[first].0, matches[last].1);
            let slack = max_chars.saturating_sub(cluster_end - cluster_start);
            let start = cluster_start.saturating_sub(slack / 2);
            let end = (start + max_chars).max(cluster_end).min(total);
            let start = if end == total {
                start.min(total.saturating_sub(max_chars))
            } else {
                start
            };
            let chars: Vec<char> = body.chars().collect();
            snap_to_words(&chars, start, end, cluster_start, cluster_end)
        }
        None => {
            let end = max_chars.min(total);
            let chars: Vec<char> = body.chars().collect();
            snap_to_words(&chars, 0, end, 0, 0)
        }
    };
    if start > end {
        start = end;
    }
    end = end.min(total);

    let mut out = String::new();
    let mut cursor = start;
    for &(m_start, m_end) in &matches {
        if m_start < start || m_end > end {
            continue;
        }
        out.push_str(&body[to_byte(cursor)..to_byte(m_start)]);
        out.push_str(HIGHLIGHT_MARKER);
        out.push_str(&body[to_byte(m_start)..to_byte(m_end)]);
        out.push_str(HIGHLIGHT_MARKER);
        cursor = m_end;
    }
    out.push_str(&body[to_byte(cursor)..to_byte(end)]);
    out.replace(['\n', '\r'], " ").trim().to_string()
}

/// Index range (inclusive) into `matches` holding the most matches within a
/// `max_chars` span; ties go to the earliest cluster.
fn densest_cluster(matches: &[(usize, usize)], max_chars: usize) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut right = 0;
    for left in 0..matches.len() {
        right = right.max(left);
        while right + 1 < matches.len() && matches[right + 1].1 - matches[left].0 <= max_chars {
            right += 1;
        }
        let better = match best {
            Some((b_left, b_right)) => right - left > b_right - b_left,
            None => true,
        };
        if better {
            best = Some((left, right));
        }
    }
    best
}

/// Moves window edges inward to whitespace without cutting into
/// `[keep_start, keep_end)`.
fn snap_to_words(
    chars: &[char],
    start: usize,
    end: usize,
    keep_start: usize,
    keep_end: usize,
) -> (usize, usize) {
    let mut new_start = start;
    if start > 0 && !chars[start - 1].is_whitespace() {
        if let Some(offset) = chars[start..keep_start.max(start)]
            .iter()
            .position(|c| c.is_whitespace())
        {
            new_start = start + offset + 1;
        }
    }
    let mut new_end = end;
    if end < chars.len() && !chars[end].is_whitespace() {
        let floor = keep_end.max(new_start).min(end);
        if let Some(offset) = chars[floor..end].iter().rposition(|c| c.is_whitespace()) {
            new_end = floor + offset;
        }
    }
    (new_start, new_end)
}
