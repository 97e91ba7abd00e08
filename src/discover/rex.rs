//! Regular-expression induction over string samples.
//!
//! Given a finite set of distinct strings, [`induce`] produces a short
//! ordered list of anchored regular expressions such that every input
//! matches at least one pattern. The generalisation pipeline:
//!
//! 1. tokenise each string into maximal runs of one character class
//!    (digits, upper, lower, then literal runs for punctuation and
//!    whitespace);
//! 2. cluster strings with identical run signatures and record
//!    per-position length ranges;
//! 3. unify clusters whose signatures differ only in letter case into
//!    `[A-Za-z]` positions;
//! 4. merge clusters that differ at a single literal position into a
//!    bounded alternation, guarded by a global length window;
//! 5. render anchored patterns, most specific first.
//!
//! All clustering and ordering follows first-seen input order, so the
//! output is deterministic. Emitted patterns are class-bounded and free
//! of backreferences, which keeps matching linear-time in the `regex`
//! engine.

use tracing::debug;

/// Tuning knobs for the inducer.
#[derive(Debug, Clone)]
pub struct RexOptions {
    /// Maximum number of branches an alternation may carry before the
    /// clusters are kept separate.
    pub alternation_cap: usize,
    /// How far (in characters) a merged pattern's accepted lengths may
    /// stray outside the observed `[min_length, max_length]` window.
    pub length_slack: u32,
}

impl Default for RexOptions {
    fn default() -> Self {
        Self {
            alternation_cap: 8,
            length_slack: 2,
        }
    }
}

/// One run class. `Literal` carries the exact run text; `Choice` is an
/// alternation of literal texts produced by cluster merging.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunClass {
    Digit,
    Upper,
    Lower,
    Letter,
    Literal(String),
    Choice(Vec<String>),
}

impl RunClass {
    fn is_letters(&self) -> bool {
        matches!(self, RunClass::Upper | RunClass::Lower | RunClass::Letter)
    }
}

/// A run with its observed length range (classes) or literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    class: RunClass,
    lo: u32,
    hi: u32,
}

#[derive(Debug, Clone)]
struct Cluster {
    runs: Vec<Run>,
    /// Number of inputs covered, kept for debugging output.
    support: usize,
}

/// Induces an ordered list of anchored regular expressions covering
/// every input string. Empty input produces an empty list.
pub fn induce<S: AsRef<str>>(inputs: &[S], options: &RexOptions) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let s = input.as_ref();
        if !seen.contains(&s) {
            seen.push(s);
        }
    }
    if seen.is_empty() {
        return Vec::new();
    }

    let min_length = seen.iter().map(|s| s.chars().count() as u32).min().unwrap_or(0);
    let max_length = seen.iter().map(|s| s.chars().count() as u32).max().unwrap_or(0);

    let mut clusters: Vec<Cluster> = Vec::new();
    for s in &seen {
        let runs = tokenise(s);
        match clusters.iter_mut().find(|c| same_signature(&c.runs, &runs)) {
            Some(cluster) => {
                for (run, observed) in cluster.runs.iter_mut().zip(&runs) {
                    run.lo = run.lo.min(observed.lo);
                    run.hi = run.hi.max(observed.hi);
                }
                cluster.support += 1;
            }
            None => clusters.push(Cluster { runs, support: 1 }),
        }
    }

    let clusters = unify_letter_case(clusters);
    let clusters = merge_literal_alternations(clusters, options, min_length, max_length);

    let mut patterns: Vec<(usize, String)> = clusters
        .iter()
        .enumerate()
        .map(|(idx, c)| (idx, render(&c.runs)))
        .collect();

    // Most specific first: longest literal prefix, then longest pattern,
    // ties broken by first-seen order.
    patterns.sort_by(|(ia, a), (ib, b)| {
        let prefix_a = literal_prefix_len(&clusters[*ia].runs);
        let prefix_b = literal_prefix_len(&clusters[*ib].runs);
        prefix_b
            .cmp(&prefix_a)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| ia.cmp(ib))
    });

    debug!(
        inputs = seen.len(),
        clusters = clusters.len(),
        "induced regular expressions"
    );
    patterns.into_iter().map(|(_, p)| p).collect()
}

/// Splits a string into maximal same-class runs. Non-ASCII letters and
/// all punctuation/whitespace become literal runs, so the induced
/// pattern can never fail to match its own input.
fn tokenise(s: &str) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut current: Option<(CharKind, u32, String)> = None;

    for c in s.chars() {
        let kind = CharKind::of(c);
        match &mut current {
            Some((k, len, text)) if *k == kind => {
                *len += 1;
                text.push(c);
            }
            _ => {
                if let Some(run) = current.take() {
                    runs.push(finish_run(run));
                }
                current = Some((kind, 1, c.to_string()));
            }
        }
    }
    if let Some(run) = current.take() {
        runs.push(finish_run(run));
    }
    runs
}

/// The per-character class used while tokenising. `Other` keeps the
/// concrete character so only identical punctuation chars form one run.
#[derive(PartialEq, Clone, Copy)]
enum CharKind {
    Digit,
    Upper,
    Lower,
    Other(char),
}

impl CharKind {
    fn of(c: char) -> Self {
        if c.is_ascii_digit() {
            CharKind::Digit
        } else if c.is_ascii_uppercase() {
            CharKind::Upper
        } else if c.is_ascii_lowercase() {
            CharKind::Lower
        } else {
            CharKind::Other(c)
        }
    }
}

fn finish_run((kind, len, text): (CharKind, u32, String)) -> Run {
    let class = match kind {
        CharKind::Digit => RunClass::Digit,
        CharKind::Upper => RunClass::Upper,
        CharKind::Lower => RunClass::Lower,
        CharKind::Other(_) => RunClass::Literal(text),
    };
    Run {
        class,
        lo: len,
        hi: len,
    }
}

/// Two run sequences share a signature when classes (and literal texts)
/// agree position by position; lengths may differ.
fn same_signature(a: &[Run], b: &[Run]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.class == y.class)
}

/// Folds clusters whose signatures differ only in letter case into one
/// cluster with `[A-Za-z]` at the differing positions. Runs to a fixed
/// point so chains of compatible clusters collapse fully.
fn unify_letter_case(mut clusters: Vec<Cluster>) -> Vec<Cluster> {
    loop {
        let mut merged_any = false;
        let mut out: Vec<Cluster> = Vec::with_capacity(clusters.len());
        'next: for cluster in clusters.drain(..) {
            for existing in &mut out {
                if letters_compatible(&existing.runs, &cluster.runs) {
                    merge_letter_runs(&mut existing.runs, &cluster.runs);
                    existing.support += cluster.support;
                    merged_any = true;
                    continue 'next;
                }
            }
            out.push(cluster);
        }
        clusters = out;
        if !merged_any {
            return clusters;
        }
    }
}

fn letters_compatible(a: &[Run], b: &[Run]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut differs = false;
    for (x, y) in a.iter().zip(b) {
        if x.class == y.class {
            continue;
        }
        if x.class.is_letters() && y.class.is_letters() {
            differs = true;
        } else {
            return false;
        }
    }
    differs
}

fn merge_letter_runs(target: &mut [Run], other: &[Run]) {
    for (run, observed) in target.iter_mut().zip(other) {
        if run.class != observed.class {
            run.class = RunClass::Letter;
        }
        run.lo = run.lo.min(observed.lo);
        run.hi = run.hi.max(observed.hi);
    }
}

/// Merges clusters that differ at exactly one position where both carry
/// literal text, producing an alternation. Merging is skipped when the
/// alternation would exceed the branch cap or when the merged pattern
/// would accept lengths outside the observed window plus slack.
fn merge_literal_alternations(
    clusters: Vec<Cluster>,
    options: &RexOptions,
    min_length: u32,
    max_length: u32,
) -> Vec<Cluster> {
    let mut out: Vec<Cluster> = Vec::with_capacity(clusters.len());
    'next: for cluster in clusters {
        for existing in &mut out {
            if let Some(candidate) = try_alternation(existing, &cluster, options.alternation_cap) {
                let (lo, hi) = pattern_length_range(&candidate.runs);
                let window_lo = min_length.saturating_sub(options.length_slack);
                let window_hi = max_length + options.length_slack;
                if lo >= window_lo && hi <= window_hi {
                    *existing = candidate;
                    continue 'next;
                }
            }
        }
        out.push(cluster);
    }
    out
}

fn try_alternation(a: &Cluster, b: &Cluster, cap: usize) -> Option<Cluster> {
    if a.runs.len() != b.runs.len() {
        return None;
    }
    let mut diff_at = None;
    for (i, (x, y)) in a.runs.iter().zip(&b.runs).enumerate() {
        if x == y {
            continue;
        }
        let both_literal = matches!(
            (&x.class, &y.class),
            (
                RunClass::Literal(_) | RunClass::Choice(_),
                RunClass::Literal(_) | RunClass::Choice(_)
            )
        );
        if !both_literal || diff_at.is_some() {
            return None;
        }
        diff_at = Some(i);
    }
    let i = diff_at?;

    let mut branches = branch_texts(&a.runs[i].class);
    for text in branch_texts(&b.runs[i].class) {
        if !branches.contains(&text) {
            branches.push(text);
        }
    }
    if branches.len() > cap {
        return None;
    }

    let (lo, hi) = branches
        .iter()
        .map(|t| t.chars().count() as u32)
        .fold((u32::MAX, 0), |(lo, hi), n| (lo.min(n), hi.max(n)));

    let mut runs = a.runs.clone();
    runs[i] = Run {
        class: RunClass::Choice(branches),
        lo,
        hi,
    };
    Some(Cluster {
        runs,
        support: a.support + b.support,
    })
}

fn branch_texts(class: &RunClass) -> Vec<String> {
    match class {
        RunClass::Literal(text) => vec![text.clone()],
        RunClass::Choice(texts) => texts.clone(),
        _ => Vec::new(),
    }
}

/// The range of total string lengths a cluster's pattern accepts.
fn pattern_length_range(runs: &[Run]) -> (u32, u32) {
    runs.iter()
        .fold((0, 0), |(lo, hi), run| (lo + run.lo, hi + run.hi))
}

fn literal_prefix_len(runs: &[Run]) -> u32 {
    match runs.first() {
        Some(Run {
            class: RunClass::Literal(text),
            ..
        }) => text.chars().count() as u32,
        _ => 0,
    }
}

/// Renders a cluster as an anchored pattern.
fn render(runs: &[Run]) -> String {
    let mut out = String::from("^");
    for run in runs {
        match &run.class {
            RunClass::Digit => push_class_atom(&mut out, "[0-9]", run),
            RunClass::Upper => push_class_atom(&mut out, "[A-Z]", run),
            RunClass::Lower => push_class_atom(&mut out, "[a-z]", run),
            RunClass::Letter => push_class_atom(&mut out, "[A-Za-z]", run),
            RunClass::Literal(text) => out.push_str(&escape_literal(text)),
            RunClass::Choice(branches) => {
                out.push_str("(?:");
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    out.push_str(&escape_literal(branch));
                }
                out.push(')');
            }
        }
    }
    out.push('$');
    out
}

fn push_class_atom(out: &mut String, atom: &str, run: &Run) {
    out.push_str(atom);
    out.push_str(&quantifier(run.lo, run.hi));
}

fn quantifier(lo: u32, hi: u32) -> String {
    if lo == hi {
        if lo == 1 {
            String::new()
        } else {
            format!("{{{lo}}}")
        }
    } else {
        format!("{{{lo},{hi}}}")
    }
}

/// Escapes regex metacharacters, leaving ordinary punctuation (like `-`
/// outside a class) readable.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '.' | '^' | '$' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn assert_covers(patterns: &[String], inputs: &[&str]) {
        let compiled: Vec<Regex> = patterns.iter().map(|p| Regex::new(p).unwrap()).collect();
        for input in inputs {
            assert!(
                compiled.iter().any(|r| r.is_match(input)),
                "{input:?} not covered by {patterns:?}"
            );
        }
    }

    #[test]
    fn test_uniform_codes_collapse_to_one_pattern() {
        let inputs = ["AB-01", "AB-02", "AB-17"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert_eq!(patterns, vec!["^[A-Z]{2}-[0-9]{2}$".to_string()]);
        assert_covers(&patterns, &inputs);
    }

    #[test]
    fn test_length_ranges() {
        let inputs = ["a1", "bc23", "def456"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert_eq!(patterns, vec!["^[a-z]{1,3}[0-9]{1,3}$".to_string()]);
        assert_covers(&patterns, &inputs);
    }

    #[test]
    fn test_mixed_case_unifies_to_letter_class() {
        let inputs = ["ABC", "abc", "XYZ"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert_eq!(patterns, vec!["^[A-Za-z]{3}$".to_string()]);
        assert_covers(&patterns, &inputs);
    }

    #[test]
    fn test_literal_alternation_merge() {
        let inputs = ["1-2", "3_4", "5-6"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert_eq!(patterns, vec!["^[0-9](?:-|_)[0-9]$".to_string()]);
        assert_covers(&patterns, &inputs);
    }

    #[test]
    fn test_alternation_cap_keeps_clusters_separate() {
        let inputs = ["1!", "1?", "1%", "1&"];
        let options = RexOptions {
            alternation_cap: 2,
            ..Default::default()
        };
        let patterns = induce(&inputs, &options);
        assert_eq!(patterns.len(), 2, "cap should split the merge: {patterns:?}");
        assert_covers(&patterns, &inputs);

        // With the default cap all four merge into one alternation.
        let merged = induce(&inputs, &RexOptions::default());
        assert_eq!(merged.len(), 1);
        assert_covers(&merged, &inputs);
    }

    #[test]
    fn test_disjoint_shapes_stay_separate() {
        let inputs = ["AB-01", "2024-01-02", "x"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert_eq!(patterns.len(), 3);
        assert_covers(&patterns, &inputs);
    }

    #[test]
    fn test_specificity_ordering() {
        // The literal-prefixed pattern must come first so verification
        // short-circuits on the most informative match.
        let inputs = ["#123", "#456", "abcdefghij"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert!(patterns[0].starts_with("^#"), "got {patterns:?}");
        assert_covers(&patterns, &inputs);
    }

    #[test]
    fn test_metacharacters_are_escaped() {
        let inputs = ["a.b", "c.d"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert_eq!(patterns, vec![r"^[a-z]\.[a-z]$".to_string()]);
        let re = Regex::new(&patterns[0]).unwrap();
        assert!(re.is_match("a.b"));
        assert!(!re.is_match("axb"));
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let patterns = induce(&Vec::<&str>::new(), &RexOptions::default());
        assert!(patterns.is_empty());
    }

    #[test]
    fn test_empty_string_is_covered() {
        let inputs = ["", "a"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert_covers(&patterns, &inputs);
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let once = induce(&["AB-01", "AB-02"], &RexOptions::default());
        let twice = induce(&["AB-01", "AB-02", "AB-01"], &RexOptions::default());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_determinism_follows_first_seen_order() {
        let a = induce(&["x1", "2024-01-01"], &RexOptions::default());
        let b = induce(&["x1", "2024-01-01"], &RexOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_ascii_becomes_literal() {
        let inputs = ["café", "calé"];
        let patterns = induce(&inputs, &RexOptions::default());
        assert_covers(&patterns, &inputs);
    }
}
