use std::collections::BTreeMap;

use relex_automaton::Dfa;

/// Distinguished sink id: a transition nothing can follow.
pub const DEAD: usize = usize::MAX;

/// A `YYFILL` point: the state checks that `need` more code units are
/// available before dispatching. `slot` is assigned at emission time in
/// storable-state mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub need: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    /// Target state per alphabet cell; total over the alphabet, `DEAD`
    /// where no transition exists.
    pub cells: Vec<usize>,
    /// Accepting rule ids in priority order (lowest first wins).
    pub accept: Vec<usize>,
    /// Accepting state with a non-accepting successor: a longer match may
    /// still fail and back up here.
    pub fallback: bool,
    pub fill: Option<Fill>,
}

impl TableState {
    pub fn accepts(&self) -> Option<usize> {
        self.accept.first().copied()
    }
}

/// DFA in dense table form; state 0 is the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDfa {
    pub states: Vec<TableState>,
}

impl TableDfa {
    /// Runs the table on a cell-index string; the longest-match winner, if
    /// any. Used by tests to check language preservation.
    pub fn longest_match(&self, cells: &[usize]) -> Option<(usize, usize)> {
        let mut state = 0;
        let mut winner = self.states[0].accepts().map(|r| (0, r));
        for (consumed, &cell) in cells.iter().enumerate() {
            state = self.states[state].cells[cell];
            if state == DEAD {
                break;
            }
            if let Some(r) = self.states[state].accepts() {
                winner = Some((consumed + 1, r));
            }
        }
        winner
    }
}

/// Flattens the petgraph powerset DFA into the dense table form. Node
/// insertion order is preserved, so state 0 is the subset-construction
/// start.
pub fn tabulate(dfa: &Dfa<Vec<usize>, usize>, n_cells: usize) -> TableDfa {
    debug_assert_eq!(dfa.start().index(), 0);
    let mut states = Vec::with_capacity(dfa.state_count());
    for (id, node) in dfa.states() {
        let mut cells = vec![DEAD; n_cells];
        for (cell, to) in dfa.transitions_from(id) {
            cells[*cell] = to.index();
        }
        let mut accept = match node {
            relex_automaton::AutomatonState::Accepting(rules) => rules.clone(),
            relex_automaton::AutomatonState::Intermediate(_) => Vec::new(),
        };
        accept.sort_unstable();
        accept.dedup();
        states.push(TableState {
            cells,
            accept,
            fallback: false,
            fill: None,
        });
    }
    TableDfa { states }
}

/// Collapses states that cannot reach an accepting state into the `DEAD`
/// sink and drops states unreachable from the start.
pub fn remove_dead(dfa: TableDfa) -> TableDfa {
    let n = dfa.states.len();
    if n == 0 {
        return dfa;
    }

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, s) in dfa.states.iter().enumerate() {
        for &t in &s.cells {
            if t != DEAD {
                preds[t].push(i);
            }
        }
    }
    let mut live = vec![false; n];
    let mut stack: Vec<usize> = (0..n)
        .filter(|&i| !dfa.states[i].accept.is_empty())
        .collect();
    while let Some(s) = stack.pop() {
        if live[s] {
            continue;
        }
        live[s] = true;
        for &p in &preds[s] {
            if !live[p] {
                stack.push(p);
            }
        }
    }

    let mut reach = vec![false; n];
    let mut stack = vec![0];
    while let Some(s) = stack.pop() {
        if reach[s] {
            continue;
        }
        reach[s] = true;
        for &t in &dfa.states[s].cells {
            if t != DEAD && live[t] && !reach[t] {
                stack.push(t);
            }
        }
    }

    // the start survives even when the language is empty
    let keep: Vec<usize> = (0..n).filter(|&i| (live[i] && reach[i]) || i == 0).collect();
    let mut remap = vec![DEAD; n];
    for (new, &old) in keep.iter().enumerate() {
        remap[old] = new;
    }
    let mut states = Vec::with_capacity(keep.len());
    for &old in &keep {
        let mut s = dfa.states[old].clone();
        for c in s.cells.iter_mut() {
            if *c != DEAD {
                *c = remap[*c];
            }
        }
        states.push(s);
    }
    TableDfa { states }
}

/// Partition refinement: the initial partition splits by accept set, then
/// refines by transition behavior until a fixed point. The representative
/// of each class is the state with the lowest original id, so the result
/// is deterministic.
pub fn minimize(dfa: TableDfa) -> TableDfa {
    let n = dfa.states.len();
    if n == 0 {
        return dfa;
    }

    let mut class = vec![0usize; n];
    let mut count = {
        let mut ids: BTreeMap<&[usize], usize> = BTreeMap::new();
        for (i, s) in dfa.states.iter().enumerate() {
            let next = ids.len();
            class[i] = *ids.entry(s.accept.as_slice()).or_insert(next);
        }
        ids.len()
    };

    loop {
        let mut ids: BTreeMap<(usize, Vec<usize>), usize> = BTreeMap::new();
        let mut next_class = vec![0usize; n];
        for i in 0..n {
            let sig: Vec<usize> = dfa.states[i]
                .cells
                .iter()
                .map(|&t| if t == DEAD { DEAD } else { class[t] })
                .collect();
            let next = ids.len();
            next_class[i] = *ids.entry((class[i], sig)).or_insert(next);
        }
        let new_count = ids.len();
        class = next_class;
        if new_count == count {
            break;
        }
        count = new_count;
    }

    // class ids were handed out in ascending state order, so class k's
    // first member is its lowest original id
    let mut reps = vec![usize::MAX; count];
    for i in (0..n).rev() {
        reps[class[i]] = i;
    }
    let mut states = Vec::with_capacity(count);
    for &rep in &reps {
        let mut s = dfa.states[rep].clone();
        for c in s.cells.iter_mut() {
            if *c != DEAD {
                *c = class[*c];
            }
        }
        states.push(s);
    }
    TableDfa { states }
}

pub fn mark_fallback(dfa: &mut TableDfa) {
    let flags: Vec<bool> = dfa
        .states
        .iter()
        .map(|s| {
            !s.accept.is_empty()
                && s.cells
                    .iter()
                    .any(|&t| t != DEAD && dfa.states[t].accept.is_empty())
        })
        .collect();
    for (s, fallback) in dfa.states.iter_mut().zip(flags) {
        s.fallback = fallback;
    }
}

/// Fill points are the start state and every target of a DFA back edge;
/// `need` is the longest distance (in consumed code units) from the point
/// to the next fill point through the acyclic remainder of the graph.
pub fn compute_fill(dfa: &mut TableDfa) {
    let n = dfa.states.len();
    if n == 0 {
        return;
    }

    let mut color = vec![0u8; n]; // 0 unvisited, 1 on stack, 2 done
    let mut fill_point = vec![false; n];
    fill_point[0] = true;
    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    color[0] = 1;
    while let Some(top) = stack.last_mut() {
        let (s, ci) = *top;
        if ci >= dfa.states[s].cells.len() {
            color[s] = 2;
            stack.pop();
            continue;
        }
        top.1 += 1;
        let t = dfa.states[s].cells[ci];
        if t == DEAD {
            continue;
        }
        match color[t] {
            0 => {
                color[t] = 1;
                stack.push((t, 0));
            }
            1 => fill_point[t] = true,
            _ => {}
        }
    }

    let mut memo = vec![None; n];
    for s in 0..n {
        if fill_point[s] {
            let need = max_distance(dfa, s, &fill_point, &mut memo);
            if need > 0 {
                dfa.states[s].fill = Some(Fill { need });
            }
        }
    }
}

// Longest consumption until the next fill check. Every cycle passes a back
// edge and every back-edge target is a fill point, so the recursion only
// walks the acyclic remainder.
fn max_distance(
    dfa: &TableDfa,
    s: usize,
    fill_point: &[bool],
    memo: &mut Vec<Option<usize>>,
) -> usize {
    let mut best = 0;
    for &t in &dfa.states[s].cells {
        if t == DEAD {
            continue;
        }
        let v = if fill_point[t] {
            1
        } else if let Some(v) = memo[t] {
            1 + v
        } else {
            let v = max_distance(dfa, t, fill_point, memo);
            memo[t] = Some(v);
            1 + v
        };
        best = best.max(v);
    }
    best
}

/// True when some reachable input can fail in a state that no accepting
/// ancestor covers: the emitted matcher would fall through.
pub fn undefined_control_flow(dfa: &TableDfa) -> bool {
    let n = dfa.states.len();
    if n == 0 {
        return false;
    }
    // saved[s]: every path from the start to s passes an accepting state
    let mut saved: Vec<bool> = (0..n).map(|_| true).collect();
    saved[0] = !dfa.states[0].accept.is_empty();
    let mut changed = true;
    while changed {
        changed = false;
        for s in 0..n {
            if saved[s] {
                continue;
            }
            for &t in &dfa.states[s].cells {
                if t != DEAD && saved[t] && dfa.states[t].accept.is_empty() {
                    saved[t] = false;
                    changed = true;
                }
            }
        }
    }
    (0..n).any(|s| !saved[s] && dfa.states[s].cells.iter().any(|&t| t == DEAD))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relex_input::{Characters, Pattern, RuleDef, RulePattern};
    use relex_regex::Enc;

    use crate::compile::compile_block;

    fn literal(s: &str, line: u32) -> RuleDef {
        RuleDef {
            condition: None,
            pattern: RulePattern::Literal {
                characters: s.chars().collect(),
            },
            action: "return;".to_string(),
            line,
        }
    }

    fn word(line: u32) -> RuleDef {
        RuleDef {
            condition: None,
            pattern: RulePattern::Pattern {
                pattern: Pattern::Repetition {
                    min: 1,
                    max: None,
                    inner: Box::new(Pattern::Char {
                        chars: Characters::Range('a', 'z'),
                    }),
                },
            },
            action: "return;".to_string(),
            line,
        }
    }

    fn default_rule(line: u32) -> RuleDef {
        RuleDef {
            condition: None,
            pattern: RulePattern::Default,
            action: "return;".to_string(),
            line,
        }
    }

    fn compile(defs: &[RuleDef]) -> crate::compile::CompiledBlock {
        compile_block(defs, &Enc::default(), 1).unwrap()
    }

    fn cells_of(block: &crate::compile::CompiledBlock, input: &str) -> Vec<usize> {
        input
            .chars()
            .map(|c| block.alphabet.find(c as u32).unwrap())
            .collect()
    }

    #[test]
    fn keyword_builds_a_chain() {
        let block = compile(&[literal("hello", 1)]);
        let dfa = &block.conditions[0].dfa;
        // five consumed units plus the accepting state
        assert_eq!(dfa.states.len(), 6);
        assert_eq!(
            dfa.longest_match(&cells_of(&block, "hello")),
            Some((5, 0))
        );
        assert_eq!(dfa.longest_match(&cells_of(&block, "hell")), None);
    }

    #[test]
    fn transitions_are_total_over_the_alphabet() {
        let block = compile(&[literal("if", 1), word(2)]);
        let dfa = &block.conditions[0].dfa;
        for state in &dfa.states {
            assert_eq!(state.cells.len(), block.alphabet.len());
        }
    }

    #[test]
    fn lowest_priority_wins_on_overlap() {
        let block = compile(&[literal("if", 1), word(2)]);
        let dfa = &block.conditions[0].dfa;
        // "if" matches both rules; rule 0 is listed first
        assert_eq!(dfa.longest_match(&cells_of(&block, "if")), Some((2, 0)));
        // "in" only matches the word rule
        assert_eq!(dfa.longest_match(&cells_of(&block, "in")), Some((2, 1)));
        // the state reached by "if" accepts both, priority order
        let mut state = 0;
        for cell in cells_of(&block, "if") {
            state = dfa.states[state].cells[cell];
        }
        assert_eq!(dfa.states[state].accept, vec![0, 1]);
    }

    #[test]
    fn minimize_merges_equivalent_states_and_is_idempotent() {
        // a|b as two literal rules with one action each: the two states
        // after 'a' and 'b' accept different rules, but "aa" and "ab"
        // suffix states collapse
        let block = compile(&[literal("ac", 1), literal("bc", 2)]);
        let dfa = &block.conditions[0].dfa;
        let again = minimize(dfa.clone());
        assert_eq!(dfa, &again);
        assert_eq!(
            dfa.longest_match(&cells_of(&block, "ac")),
            Some((2, 0))
        );
        assert_eq!(
            dfa.longest_match(&cells_of(&block, "bc")),
            Some((2, 1))
        );
    }

    #[test]
    fn word_loop_merges_to_two_states() {
        let block = compile(&[word(1)]);
        let dfa = &block.conditions[0].dfa;
        // start plus one accepting loop state
        assert_eq!(dfa.states.len(), 2);
        let a = block.alphabet.find('a' as u32).unwrap();
        assert_eq!(dfa.states[1].cells[a], 1);
    }

    #[test]
    fn fallback_marks_accepting_states_with_failing_successors() {
        let block = compile(&[literal("if", 1), word(2)]);
        let dfa = &block.conditions[0].dfa;
        // every accepting state loops within [a-z] only; a non-letter kills
        // the match, but those are DEAD cells, not non-accepting states
        assert!(dfa.states.iter().all(|s| !s.fallback));

        // "ab" and "abcd": after "ab" accepts, "abc" is a dead letter state
        let block = compile(&[literal("ab", 1), literal("abcd", 2)]);
        let dfa = &block.conditions[0].dfa;
        let mut state = 0;
        for cell in cells_of(&block, "ab") {
            state = dfa.states[state].cells[cell];
        }
        assert!(dfa.states[state].fallback);
    }

    #[test]
    fn fill_need_is_longest_lookahead() {
        let block = compile(&[literal("hello", 1)]);
        let dfa = &block.conditions[0].dfa;
        assert_eq!(dfa.states[0].fill, Some(Fill { need: 5 }));
        assert!(dfa.states[1..].iter().all(|s| s.fill.is_none()));
    }

    #[test]
    fn loops_get_their_own_fill_points() {
        let block = compile(&[word(1)]);
        let dfa = &block.conditions[0].dfa;
        assert_eq!(dfa.states[0].fill, Some(Fill { need: 1 }));
        assert_eq!(dfa.states[1].fill, Some(Fill { need: 1 }));
    }

    #[test]
    fn undefined_control_flow_without_default_rule() {
        let block = compile(&[literal("if", 1)]);
        assert!(undefined_control_flow(&block.conditions[0].dfa));
        let block = compile(&[literal("if", 1), default_rule(2)]);
        assert!(!undefined_control_flow(&block.conditions[0].dfa));
    }

    #[test]
    fn empty_rule_set_keeps_the_start_state() {
        let block = compile(&[]);
        assert!(block.conditions.is_empty());
    }
}
