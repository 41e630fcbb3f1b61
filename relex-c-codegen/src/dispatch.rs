use relex_codegen::Opts;
use relex_regex::Range;

/// How one state's transitions are rendered. `spans` map unit ranges to
/// goto labels; the span set is contiguous and covers the whole alphabet.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// `switch` cases (or an `if` chain under `-s`) plus a default arm.
    Linear {
        cases: Vec<(Vec<Range>, usize)>,
        default: usize,
    },
    /// Balanced binary decision tree over range boundaries.
    Tree(TreeNode),
    /// Full jump table, one entry per code unit (computed goto).
    Table { targets: Vec<usize> },
}

#[derive(Debug, PartialEq, Eq)]
pub enum TreeNode {
    Leaf(usize),
    Branch {
        pivot: u32,
        lt: Box<TreeNode>,
        ge: Box<TreeNode>,
    },
}

const MAX_LINEAR_TARGETS: usize = 4;
const MAX_LINEAR_RANGE: u32 = 8;
const TABLE_FAN_OUT: usize = 8;
const TABLE_INTERVALS: usize = 6;

/// Picks the dispatch scheme for one state. `spans` are (unit range, label)
/// pairs, adjacent equal labels already merged; the most common label makes
/// the best default arm.
pub fn select_dispatch(spans: &[(Range, usize)], n_units: u32, opts: &Opts) -> Dispatch {
    debug_assert!(!spans.is_empty());

    // the label covering the most units becomes the default arm
    let mut weights: Vec<(usize, u32)> = Vec::new();
    for (range, label) in spans {
        match weights.iter_mut().find(|(l, _)| l == label) {
            Some((_, w)) => *w += range.len(),
            None => weights.push((*label, range.len())),
        }
    }
    let default = weights
        .iter()
        .max_by_key(|(label, w)| (*w, std::cmp::Reverse(*label)))
        .map(|(label, _)| *label)
        .unwrap();

    let cases: Vec<(Vec<Range>, usize)> = {
        let mut cases: Vec<(Vec<Range>, usize)> = Vec::new();
        for (range, label) in spans {
            if *label == default {
                continue;
            }
            match cases.iter_mut().find(|(_, l)| l == label) {
                Some((ranges, _)) => ranges.push(*range),
                None => cases.push((vec![*range], *label)),
            }
        }
        cases
    };

    let fan_out = cases.len();
    let intervals = cases.iter().map(|(ranges, _)| ranges.len()).sum::<usize>();
    let small = cases
        .iter()
        .all(|(ranges, _)| ranges.iter().all(|r| r.len() <= MAX_LINEAR_RANGE));

    if fan_out <= MAX_LINEAR_TARGETS && small {
        return Dispatch::Linear { cases, default };
    }
    if opts.computed_gotos
        && n_units == 0x100
        && (opts.bit_vectors || fan_out > TABLE_FAN_OUT || intervals > TABLE_INTERVALS)
    {
        let mut targets = vec![default; n_units as usize];
        for (range, label) in spans {
            for cu in range.lo..range.hi {
                targets[cu as usize] = *label;
            }
        }
        return Dispatch::Table { targets };
    }
    Dispatch::Tree(build_tree(spans))
}

// Median-range pivot keeps the comparison depth logarithmic in the number
// of spans.
fn build_tree(spans: &[(Range, usize)]) -> TreeNode {
    if spans.len() == 1 {
        return TreeNode::Leaf(spans[0].1);
    }
    let mid = spans.len() / 2;
    TreeNode::Branch {
        pivot: spans[mid].0.lo,
        lt: Box::new(build_tree(&spans[..mid])),
        ge: Box::new(build_tree(&spans[mid..])),
    }
}

impl TreeNode {
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf(_) => 0,
            TreeNode::Branch { lt, ge, .. } => 1 + lt.depth().max(ge.depth()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(lo: u32, hi: u32, label: usize) -> (Range, usize) {
        (Range::new(lo, hi), label)
    }

    fn opts() -> Opts {
        Opts::default()
    }

    #[test]
    fn few_small_targets_go_linear() {
        let spans = [span(0, 0x68, 9), span(0x68, 0x69, 1), span(0x69, 0x100, 9)];
        match select_dispatch(&spans, 0x100, &opts()) {
            Dispatch::Linear { cases, default } => {
                assert_eq!(default, 9);
                assert_eq!(cases, vec![(vec![Range::new(0x68, 0x69)], 1)]);
            }
            other => panic!("expected linear, got {:?}", other),
        }
    }

    #[test]
    fn wide_ranges_build_a_tree() {
        // one wide class: [a-z] -> 1, rest -> 9
        let spans = [span(0, 0x61, 9), span(0x61, 0x7B, 1), span(0x7B, 0x100, 9)];
        match select_dispatch(&spans, 0x100, &opts()) {
            Dispatch::Tree(node) => {
                assert!(node.depth() >= 1);
            }
            other => panic!("expected tree, got {:?}", other),
        }
    }

    #[test]
    fn tree_depth_is_logarithmic() {
        // 16 alternating spans
        let spans: Vec<(Range, usize)> = (0..16u32)
            .map(|i| span(i * 16, (i + 1) * 16, i as usize))
            .collect();
        match select_dispatch(&spans, 0x100, &opts()) {
            Dispatch::Tree(node) => assert!(node.depth() <= 5),
            other => panic!("expected tree, got {:?}", other),
        }
    }

    #[test]
    fn computed_gotos_enable_the_jump_table() {
        let spans: Vec<(Range, usize)> = (0..16u32)
            .map(|i| span(i * 16, (i + 1) * 16, i as usize))
            .collect();
        let opts = Opts {
            computed_gotos: true,
            ..Opts::default()
        };
        match select_dispatch(&spans, 0x100, &opts) {
            Dispatch::Table { targets } => {
                assert_eq!(targets.len(), 0x100);
                assert_eq!(targets[0], 0);
                assert_eq!(targets[0xFF], 15);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn no_table_on_wide_alphabets() {
        let spans: Vec<(Range, usize)> = (0..16u32)
            .map(|i| span(i * 16, (i + 1) * 16, i as usize))
            .chain([span(0x100, 0x10000, 16)])
            .collect();
        let opts = Opts {
            computed_gotos: true,
            ..Opts::default()
        };
        assert!(matches!(
            select_dispatch(&spans, 0x10000, &opts),
            Dispatch::Tree(_)
        ));
    }
}
