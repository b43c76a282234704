use std::collections::HashMap;

/// Minimum length of the second sequence before frequently occurring
/// characters are dropped from the match index.
const POPULAR_MIN_LEN: usize = 200;

/// A run of equal characters: `a[a_start..a_start + len] == b[b_start..b_start + len]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MatchBlock {
    a_start: usize,
    b_start: usize,
    len: usize,
}

/// Finds matching blocks between two character sequences using the greedy
/// Ratcliff/Obershelp approach: take the longest common substring, then
/// recurse into the unmatched text on either side of it.
///
/// Only the second sequence is indexed, so results can differ depending on
/// argument order.
struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],

    /// Map of character to the (ascending) positions at which it occurs in `b`.
    b_index: HashMap<char, Vec<usize>>,
}

impl<'a> SequenceMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> SequenceMatcher<'a> {
        let mut b_index: HashMap<char, Vec<usize>> = HashMap::new();
        for (i, &c) in b.iter().enumerate() {
            b_index.entry(c).or_default().push(i);
        }

        // Characters which occur in more than 1% of a long sequence are
        // removed from the index. They can still be absorbed when extending
        // a match, but never start one.
        if b.len() >= POPULAR_MIN_LEN {
            let max_count = b.len() / 100 + 1;
            b_index.retain(|_, positions| positions.len() <= max_count);
        }

        SequenceMatcher { a, b, b_index }
    }

    /// Find the longest block in `a[a_lo..a_hi]` and `b[b_lo..b_hi]`.
    ///
    /// Ties go to the block that starts earliest in `a`, and then earliest
    /// in `b`. Returns a block with `len == 0` if there is no match.
    fn longest_match(&self, a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize) -> MatchBlock {
        let mut best = MatchBlock {
            a_start: a_lo,
            b_start: b_lo,
            len: 0,
        };

        // Length of the match ending at `a[i - 1]` and `b[j]`, keyed by `j`.
        let mut run_lens: HashMap<usize, usize> = HashMap::new();
        for i in a_lo..a_hi {
            let mut next_run_lens = HashMap::new();
            if let Some(positions) = self.b_index.get(&self.a[i]) {
                for &j in positions {
                    if j < b_lo {
                        continue;
                    }
                    if j >= b_hi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| run_lens.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_run_lens.insert(j, k);
                    if k > best.len {
                        best = MatchBlock {
                            a_start: i + 1 - k,
                            b_start: j + 1 - k,
                            len: k,
                        };
                    }
                }
            }
            run_lens = next_run_lens;
        }

        // Grow the match over neighbouring characters that were excluded
        // from the index.
        while best.a_start > a_lo
            && best.b_start > b_lo
            && self.a[best.a_start - 1] == self.b[best.b_start - 1]
        {
            best.a_start -= 1;
            best.b_start -= 1;
            best.len += 1;
        }
        while best.a_start + best.len < a_hi
            && best.b_start + best.len < b_hi
            && self.a[best.a_start + best.len] == self.b[best.b_start + best.len]
        {
            best.len += 1;
        }

        best
    }

    /// Return all matching blocks, ordered by position.
    fn matching_blocks(&self) -> Vec<MatchBlock> {
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
            let block = self.longest_match(a_lo, a_hi, b_lo, b_hi);
            if block.len == 0 {
                continue;
            }
            if a_lo < block.a_start && b_lo < block.b_start {
                pending.push((a_lo, block.a_start, b_lo, block.b_start));
            }
            let (a_end, b_end) = (block.a_start + block.len, block.b_start + block.len);
            if a_end < a_hi && b_end < b_hi {
                pending.push((a_end, a_hi, b_end, b_hi));
            }
            blocks.push(block);
        }

        blocks.sort_by_key(|b| (b.a_start, b.b_start));
        blocks
    }

    fn ratio(&self) -> f64 {
        let total_len = self.a.len() + self.b.len();
        if total_len == 0 {
            return 1.0;
        }
        let matched: usize = self.matching_blocks().iter().map(|b| b.len).sum();
        2.0 * matched as f64 / total_len as f64
    }
}

/// Compute the similarity of an OCR prediction to its reference text.
///
/// The result is `2 * M / T`, where `T` is the total number of characters in
/// both strings and `M` is the number of characters in matching blocks. It
/// is in `[0, 1]`, is `1.0` only for identical strings (including two empty
/// strings) and `0.0` when exactly one string is empty.
///
/// `predicted` and `reference` are not interchangeable. The matcher indexes
/// `reference`, and for long references characters that are very frequent
/// are not used to seed matches, so swapping the arguments can change the
/// score.
pub fn score(predicted: &str, reference: &str) -> f64 {
    if predicted == reference {
        return 1.0;
    }
    let a: Vec<char> = predicted.chars().collect();
    let b: Vec<char> = reference.chars().collect();
    SequenceMatcher::new(&a, &b).ratio()
}

#[cfg(test)]
mod tests {
    use super::{score, MatchBlock, SequenceMatcher};

    fn random_string(rng: &mut fastrand::Rng, max_len: usize) -> String {
        let len = rng.usize(1..=max_len);
        (0..len).map(|_| rng.choice(['a', 'b', 'c', ' ', 'é']).unwrap()).collect()
    }

    #[test]
    fn test_identical_strings() {
        let mut rng = fastrand::Rng::with_seed(1234);
        for _ in 0..100 {
            let s = random_string(&mut rng, 300);
            assert_eq!(score(&s, &s), 1.0, "score of {:?} with itself", s);
        }
        assert_eq!(score("", ""), 1.0);
    }

    #[test]
    fn test_empty_string() {
        let mut rng = fastrand::Rng::with_seed(5678);
        for _ in 0..100 {
            let s = random_string(&mut rng, 50);
            assert_eq!(score(&s, ""), 0.0);
            assert_eq!(score("", &s), 0.0);
        }
    }

    #[test]
    fn test_score_in_range() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..200 {
            let a = random_string(&mut rng, 40);
            let b = random_string(&mut rng, 40);
            let s = score(&a, &b);
            assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
            if a != b {
                assert!(s < 1.0);
            }
        }
    }

    #[test]
    fn test_known_ratios() {
        struct Case {
            predicted: &'static str,
            reference: &'static str,
            expected: f64,
        }

        let cases = [
            Case {
                predicted: "abcd",
                reference: "bcde",
                expected: 0.75,
            },
            Case {
                predicted: "hello world",
                reference: "hello world",
                expected: 1.0,
            },
            Case {
                predicted: "abc",
                reference: "xyz",
                expected: 0.0,
            },
            // "abxcd" vs "abcd": blocks "ab" and "cd".
            Case {
                predicted: "abxcd",
                reference: "abcd",
                expected: 8.0 / 9.0,
            },
            // Blocks "ab" and "cd" on either side of the mismatches.
            Case {
                predicted: "qabxcd",
                reference: "abycdf",
                expected: 2.0 * 4.0 / 12.0,
            },
        ];

        for case in cases {
            let actual = score(case.predicted, case.reference);
            assert!(
                (actual - case.expected).abs() < 1e-9,
                "score({:?}, {:?}) = {}, expected {}",
                case.predicted,
                case.reference,
                actual,
                case.expected
            );
        }
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // Each accented character is a single element.
        assert!((score("café", "cafe") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_matching_blocks() {
        let a: Vec<char> = "abxcd".chars().collect();
        let b: Vec<char> = "abcd".chars().collect();
        let blocks = SequenceMatcher::new(&a, &b).matching_blocks();
        assert_eq!(
            blocks,
            [
                MatchBlock {
                    a_start: 0,
                    b_start: 0,
                    len: 2
                },
                MatchBlock {
                    a_start: 3,
                    b_start: 2,
                    len: 2
                },
            ]
        );
    }

    #[test]
    fn test_longest_match_prefers_earliest() {
        let a: Vec<char> = "ab ab".chars().collect();
        let b: Vec<char> = "xab".chars().collect();
        let matcher = SequenceMatcher::new(&a, &b);
        let block = matcher.longest_match(0, a.len(), 0, b.len());
        assert_eq!(
            block,
            MatchBlock {
                a_start: 0,
                b_start: 1,
                len: 2
            }
        );
    }

    #[test]
    fn test_popular_chars_are_not_indexed() {
        // 300 chars where ' ' makes up a third of the text.
        let reference = "ab ".repeat(100);
        let b: Vec<char> = reference.chars().collect();
        let a: Vec<char> = " ".chars().collect();
        let matcher = SequenceMatcher::new(&a, &b);
        assert!(!matcher.b_index.contains_key(&' '));

        // A lone popular character cannot start a match away from the
        // start of the range.
        assert_eq!(score("b", &reference), 0.0);

        // Indexed the other way round, it matches.
        assert!((score(&reference, "b") - 2.0 / 301.0).abs() < 1e-9);
    }

    #[test]
    fn test_argument_order_matters_for_popular_chars() {
        let long = format!("x{}", "a".repeat(249));
        assert!((score(&long, "a") - 2.0 / 251.0).abs() < 1e-9);
        assert_eq!(score("a", &long), 0.0);
    }
}
