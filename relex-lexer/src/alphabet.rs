use std::collections::BTreeSet;

use relex_regex::{Range, RangeSet, Regex};

/// Partition of the code-unit space into disjoint ranges ("cells") such that
/// every symbol set of the compiled rules is a union of cells. NFA and DFA
/// transitions carry cell indices, so the automaton passes iterate over
/// cells and never enumerate single code units.
#[derive(Debug)]
pub struct Alphabet {
    ranges: Vec<Range>,
}

impl Alphabet {
    /// Builds the partition from every `Sym` in the given expressions over
    /// the full code-unit span.
    pub fn from_exprs<'a>(exprs: impl Iterator<Item = &'a Regex>, span: Range) -> Alphabet {
        let mut bounds = BTreeSet::new();
        bounds.insert(span.lo);
        bounds.insert(span.hi);
        for expr in exprs {
            collect_bounds(expr, span, &mut bounds);
        }
        let mut ranges = Vec::with_capacity(bounds.len() - 1);
        let mut iter = bounds.into_iter();
        let mut prev = iter.next().unwrap();
        for next in iter {
            ranges.push(Range::new(prev, next));
            prev = next;
        }
        Alphabet { ranges }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn cell(&self, index: usize) -> Range {
        self.ranges[index]
    }

    pub fn cells(&self) -> &[Range] {
        &self.ranges
    }

    pub fn find(&self, cu: u32) -> Option<usize> {
        let index = self.ranges.partition_point(|r| r.hi <= cu);
        (index < self.ranges.len() && self.ranges[index].contains(cu)).then_some(index)
    }

    /// Indices of all cells covered by the symbol set. The set is always a
    /// union of whole cells by construction.
    pub fn cell_indices(&self, set: &RangeSet) -> Vec<usize> {
        let mut out = Vec::new();
        for (i, cell) in self.ranges.iter().enumerate() {
            if set.contains(cell.lo) {
                debug_assert!(set.contains(cell.hi - 1));
                out.push(i);
            }
        }
        out
    }
}

fn collect_bounds(expr: &Regex, span: Range, bounds: &mut BTreeSet<u32>) {
    match expr {
        Regex::Sym(set) => {
            for r in set.ranges() {
                if r.lo < span.hi {
                    bounds.insert(r.lo.max(span.lo));
                }
                if r.hi > span.lo {
                    bounds.insert(r.hi.min(span.hi));
                }
            }
        }
        Regex::Seq(elements) | Regex::Alt(elements) => {
            for e in elements {
                collect_bounds(e, span, bounds);
            }
        }
        Regex::Iter { body, .. } => collect_bounds(body, span, bounds),
        Regex::Tag(_) => {}
    }
}
