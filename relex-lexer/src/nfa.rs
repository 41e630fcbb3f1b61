use relex_automaton::{Nfa, StateId};
use relex_regex::Regex;

use crate::alphabet::Alphabet;
use crate::compile::Rule;

pub type LexerNfa = Nfa<usize, usize>;

/// Thompson construction for one condition: a shared entry state with an
/// ε-edge into each rule's sub-automaton, whose accepting state carries the
/// rule id.
pub fn build_nfa(alphabet: &Alphabet, rules: &[&Rule]) -> (StateId, LexerNfa) {
    let mut nfa = LexerNfa::new();
    let entry = nfa.add_intermediate_state();
    for rule in rules {
        let rule_start = nfa.add_intermediate_state();
        let rule_end = nfa.add_accepting_state(rule.id);
        nfa.add_epsilon_transition(entry, rule_start);
        build_from_regex(rule_start, rule_end, alphabet, &mut nfa, &rule.regex);
    }
    (entry, nfa)
}

fn chain<'p, I>(
    alphabet: &Alphabet,
    nfa: &mut LexerNfa,
    mut exprs: std::iter::Peekable<I>,
    start: StateId,
    end: StateId,
) -> Vec<StateId>
where
    I: Iterator<Item = &'p Regex>,
{
    let mut intermediates = Vec::new();
    let mut inner_start = start;
    while let Some(e) = exprs.next() {
        if exprs.peek().is_some() {
            let inner_end = nfa.add_intermediate_state();
            intermediates.push(inner_end);
            build_from_regex(inner_start, inner_end, alphabet, nfa, e);
            inner_start = inner_end;
        } else {
            build_from_regex(inner_start, end, alphabet, nfa, e);
        }
    }
    intermediates
}

fn chain_times(
    alphabet: &Alphabet,
    nfa: &mut LexerNfa,
    times: usize,
    expr: &Regex,
    start: StateId,
    end: StateId,
) -> Vec<StateId> {
    chain(
        alphabet,
        nfa,
        (0..times).map(|_| expr).peekable(),
        start,
        end,
    )
}

fn build_from_regex(
    start: StateId,
    end: StateId,
    alphabet: &Alphabet,
    nfa: &mut LexerNfa,
    expr: &Regex,
) {
    match expr {
        Regex::Sym(set) => {
            for cell in alphabet.cell_indices(set) {
                nfa.add_transition(start, end, cell);
            }
        }
        Regex::Seq(elements) => {
            if elements.is_empty() {
                nfa.add_epsilon_transition(start, end);
            } else {
                chain(alphabet, nfa, elements.iter().peekable(), start, end);
            }
        }
        Regex::Alt(elements) => {
            for elem in elements {
                let inner_start = nfa.add_intermediate_state();
                let inner_end = nfa.add_intermediate_state();
                build_from_regex(inner_start, inner_end, alphabet, nfa, elem);
                nfa.add_epsilon_transition(start, inner_start);
                nfa.add_epsilon_transition(inner_end, end);
            }
        }
        Regex::Iter { body, min, max } => {
            let inner_start = nfa.add_intermediate_state();
            let inner_end = nfa.add_intermediate_state();
            nfa.add_epsilon_transition(start, inner_start);

            match (*min, max) {
                (0, None) => {
                    build_from_regex(inner_start, inner_end, alphabet, nfa, body);
                    nfa.add_epsilon_transition(start, end);
                    nfa.add_epsilon_transition(inner_end, inner_start);
                    nfa.add_epsilon_transition(inner_end, end);
                }
                (n, max) => {
                    let mut intermediates = if n == 0 {
                        nfa.add_epsilon_transition(inner_start, inner_end);
                        Vec::new()
                    } else {
                        chain_times(alphabet, nfa, n as usize, body, inner_start, inner_end)
                    };
                    match max {
                        None => {
                            // loop the last repetition
                            let previous = intermediates.pop().unwrap_or(inner_start);
                            nfa.add_epsilon_transition(inner_end, previous);
                            nfa.add_epsilon_transition(inner_end, end);
                        }
                        Some(max) => {
                            let additional = max - n;
                            let max_start = nfa.add_intermediate_state();
                            nfa.add_epsilon_transition(inner_end, max_start);
                            let max_end = nfa.add_intermediate_state();
                            let mut max_intermediates = chain_times(
                                alphabet,
                                nfa,
                                additional as usize,
                                body,
                                max_start,
                                max_end,
                            );
                            max_intermediates.push(max_start);
                            max_intermediates.push(max_end);
                            for mi in max_intermediates {
                                nfa.add_epsilon_transition(mi, end);
                            }
                        }
                    }
                }
            }
        }
        Regex::Tag(_) => {
            // tags match the empty string; the name set is tracked on the
            // block, not in the automaton
            nfa.add_epsilon_transition(start, end);
        }
    }
}
