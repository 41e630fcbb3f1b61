use std::collections::BTreeSet;
use std::fmt::{self, Display};

use relex_input::{Characters, Pattern, RuleDef, RulePattern};
use relex_regex::{Enc, InvalidCodePoint, Range, RangeSet, Regex};

use crate::alphabet::Alphabet;
use crate::dfa::{self, TableDfa};
use crate::nfa::build_nfa;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub code: String,
    pub line: u32,
}

/// A rule ready for NFA construction: its regex is in code-unit terms and
/// its priority is its textual position (lower wins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: usize,
    pub priority: usize,
    pub action: Action,
    pub condition: Option<String>,
    pub regex: Regex,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Encoding {
        line: u32,
        source: InvalidCodePoint,
    },
    InvertedRange {
        line: u32,
        lo: char,
        hi: char,
    },
    BadRepetition {
        line: u32,
        min: u32,
        max: u32,
    },
    DuplicateDefaultRule {
        line: u32,
        condition: Option<String>,
    },
    MixedConditions {
        line: u32,
    },
}

impl CompileError {
    pub fn line(&self) -> u32 {
        match self {
            CompileError::Encoding { line, .. }
            | CompileError::InvertedRange { line, .. }
            | CompileError::BadRepetition { line, .. }
            | CompileError::DuplicateDefaultRule { line, .. }
            | CompileError::MixedConditions { line } => *line,
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Encoding { source, .. } => write!(f, "{}", source),
            CompileError::InvertedRange { lo, hi, .. } => {
                write!(f, "inverted character range {:?}-{:?}", lo, hi)
            }
            CompileError::BadRepetition { min, max, .. } => {
                write!(f, "bad repetition bounds {{{},{}}}", min, max)
            }
            CompileError::DuplicateDefaultRule { condition, .. } => match condition {
                Some(name) => write!(f, "duplicate default rule in condition '{}'", name),
                None => write!(f, "duplicate default rule"),
            },
            CompileError::MixedConditions { .. } => {
                write!(f, "cannot mix conditional and unconditional rules")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// DFA for one condition (or the sole unconditional automaton).
#[derive(Debug)]
pub struct CondDfa {
    pub name: Option<String>,
    pub dfa: TableDfa,
}

#[derive(Debug)]
pub struct CompiledBlock {
    pub rules: Vec<Rule>,
    pub conditions: Vec<CondDfa>,
    pub alphabet: Alphabet,
    pub tags: Vec<String>,
    pub line: u32,
}

impl CompiledBlock {
    pub fn rule(&self, id: usize) -> &Rule {
        &self.rules[id]
    }
}

pub fn compile_block(
    defs: &[RuleDef],
    enc: &Enc,
    line: u32,
) -> Result<CompiledBlock, Vec<CompileError>> {
    let rules = compile_rules(defs, enc)?;

    let mut tags = Vec::new();
    for rule in &rules {
        rule.regex.tags(&mut tags);
    }
    let mut seen = BTreeSet::new();
    tags.retain(|t| seen.insert(t.clone()));

    let alphabet = Alphabet::from_exprs(rules.iter().map(|r| &r.regex), enc.full_range());

    // conditions in first-seen order
    let mut names: Vec<Option<String>> = Vec::new();
    for rule in &rules {
        if !names.contains(&rule.condition) {
            names.push(rule.condition.clone());
        }
    }

    let mut conditions = Vec::new();
    for name in names {
        let cond_rules: Vec<&Rule> = rules.iter().filter(|r| r.condition == name).collect();
        let (entry, nfa) = build_nfa(&alphabet, &cond_rules);
        let table = dfa::tabulate(&nfa.powerset_construction(entry), alphabet.len());
        let table = dfa::remove_dead(table);
        let mut table = dfa::minimize(table);
        dfa::mark_fallback(&mut table);
        dfa::compute_fill(&mut table);
        conditions.push(CondDfa { name, dfa: table });
    }

    Ok(CompiledBlock {
        rules,
        conditions,
        alphabet,
        tags,
        line,
    })
}

fn compile_rules(defs: &[RuleDef], enc: &Enc) -> Result<Vec<Rule>, Vec<CompileError>> {
    let mut errors = Vec::new();
    let mut rules = Vec::new();
    let mut defaults: BTreeSet<Option<String>> = BTreeSet::new();
    let mut conditional = None;

    for (id, def) in defs.iter().enumerate() {
        match (conditional, def.condition.is_some()) {
            (None, c) => conditional = Some(c),
            (Some(prev), c) if prev != c => {
                errors.push(CompileError::MixedConditions { line: def.line });
                continue;
            }
            _ => {}
        }

        let is_default = matches!(def.pattern, RulePattern::Default);
        if is_default && !defaults.insert(def.condition.clone()) {
            errors.push(CompileError::DuplicateDefaultRule {
                line: def.line,
                condition: def.condition.clone(),
            });
            continue;
        }

        let regex = match &def.pattern {
            RulePattern::Literal { characters } => {
                literal_to_regex(enc, characters, def.line)
            }
            RulePattern::Pattern { pattern } => pattern_to_regex(enc, pattern, def.line),
            RulePattern::Default => Ok(full_sym(enc)),
        };
        match regex {
            Ok(regex) => rules.push(Rule {
                id,
                priority: id,
                action: Action {
                    code: def.action.clone(),
                    line: def.line,
                },
                condition: def.condition.clone(),
                regex,
                is_default,
            }),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(rules)
    } else {
        Err(errors)
    }
}

fn full_sym(enc: &Enc) -> Regex {
    let full = enc.full_range();
    Regex::Sym(RangeSet::single(full.lo, full.hi))
}

fn literal_to_regex(enc: &Enc, characters: &[char], line: u32) -> Result<Regex, CompileError> {
    let mut elements = Vec::with_capacity(characters.len());
    for c in characters {
        elements.push(expand_span(enc, *c as u32, *c as u32, line)?);
    }
    Ok(Regex::seq(elements))
}

fn pattern_to_regex(enc: &Enc, pattern: &Pattern, line: u32) -> Result<Regex, CompileError> {
    match pattern {
        Pattern::Sequence { elements } => Ok(Regex::seq(
            elements
                .iter()
                .map(|e| pattern_to_regex(enc, e, line))
                .collect::<Result<_, _>>()?,
        )),
        Pattern::Alternative { elements } => Ok(Regex::alt(
            elements
                .iter()
                .map(|e| pattern_to_regex(enc, e, line))
                .collect::<Result<_, _>>()?,
        )),
        Pattern::Repetition { min, max, inner } => {
            if let Some(max) = max {
                if max < min {
                    return Err(CompileError::BadRepetition {
                        line,
                        min: *min,
                        max: *max,
                    });
                }
            }
            Ok(Regex::Iter {
                body: Box::new(pattern_to_regex(enc, inner, line)?),
                min: *min,
                max: *max,
            })
        }
        Pattern::CharSet { chars, negated } => expand_charset(enc, chars, *negated, line),
        Pattern::Char { chars } => match chars {
            Characters::Single(c) => expand_span(enc, *c as u32, *c as u32, line),
            Characters::Range(lo, hi) => {
                check_order(*lo, *hi, line)?;
                expand_span(enc, *lo as u32, *hi as u32, line)
            }
        },
        Pattern::Any => Ok(full_sym(enc)),
        Pattern::Tag { name } => Ok(Regex::Tag(name.clone())),
    }
}

fn check_order(lo: char, hi: char, line: u32) -> Result<(), CompileError> {
    if lo > hi {
        Err(CompileError::InvertedRange { line, lo, hi })
    } else {
        Ok(())
    }
}

fn expand_charset(
    enc: &Enc,
    chars: &[Characters],
    negated: bool,
    line: u32,
) -> Result<Regex, CompileError> {
    // the class is a set of code points; negation happens in code-point
    // space before the encoding expansion
    let mut points = RangeSet::new();
    for c in chars {
        match c {
            Characters::Single(ch) => points.add(*ch as u32, *ch as u32 + 1),
            Characters::Range(lo, hi) => {
                check_order(*lo, *hi, line)?;
                points.add(*lo as u32, *hi as u32 + 1);
            }
        }
    }
    if negated {
        points = points.negate(Range::new(0, enc.n_code_points()));
    }
    let mut seqs = Vec::new();
    for r in points.ranges() {
        seqs.extend(
            enc.encode_range(r.lo, r.hi - 1)
                .map_err(|source| CompileError::Encoding { line, source })?,
        );
    }
    Ok(seqs_to_regex(seqs))
}

fn expand_span(enc: &Enc, lo: u32, hi: u32, line: u32) -> Result<Regex, CompileError> {
    let seqs = enc
        .encode_range(lo, hi)
        .map_err(|source| CompileError::Encoding { line, source })?;
    Ok(seqs_to_regex(seqs))
}

// Single-unit expansions merge into one symbol set; multi-unit sequences
// become unit concatenations, all joined by alternation.
fn seqs_to_regex(seqs: Vec<Vec<Range>>) -> Regex {
    let mut units = RangeSet::new();
    let mut alts = Vec::new();
    for seq in seqs {
        if seq.len() == 1 {
            units.add_range(seq[0]);
        } else {
            alts.push(Regex::Seq(
                seq.into_iter()
                    .map(|r| Regex::Sym(RangeSet::single(r.lo, r.hi)))
                    .collect(),
            ));
        }
    }
    if !units.is_empty() {
        alts.insert(0, Regex::Sym(units));
    }
    if alts.is_empty() {
        Regex::nothing()
    } else {
        Regex::alt(alts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relex_input::RuleDef;
    use relex_regex::{EncType, Policy};

    fn enc(ty: EncType) -> Enc {
        let mut e = Enc::default();
        assert!(e.set(ty));
        e
    }

    fn def(condition: Option<&str>, pattern: RulePattern, line: u32) -> RuleDef {
        RuleDef {
            condition: condition.map(str::to_string),
            pattern,
            action: "return;".to_string(),
            line,
        }
    }

    #[test]
    fn priorities_follow_textual_order() {
        let defs = [
            def(None, RulePattern::Literal { characters: vec!['i', 'f'] }, 1),
            def(
                None,
                RulePattern::Pattern {
                    pattern: Pattern::Repetition {
                        min: 1,
                        max: None,
                        inner: Box::new(Pattern::Char {
                            chars: Characters::Range('a', 'z'),
                        }),
                    },
                },
                2,
            ),
        ];
        let block = compile_block(&defs, &enc(EncType::Ascii), 1).unwrap();
        assert_eq!(block.rules[0].priority, 0);
        assert_eq!(block.rules[1].priority, 1);
        assert_eq!(block.conditions.len(), 1);
        assert_eq!(block.conditions[0].name, None);
    }

    #[test]
    fn mixed_conditions_are_rejected() {
        let defs = [
            def(Some("c1"), RulePattern::Literal { characters: vec!['a'] }, 1),
            def(None, RulePattern::Literal { characters: vec!['b'] }, 2),
        ];
        let errors = compile_block(&defs, &enc(EncType::Ascii), 1).unwrap_err();
        assert_eq!(errors, vec![CompileError::MixedConditions { line: 2 }]);
    }

    #[test]
    fn duplicate_default_rule_is_rejected() {
        let defs = [
            def(Some("c1"), RulePattern::Default, 1),
            def(Some("c1"), RulePattern::Default, 2),
        ];
        let errors = compile_block(&defs, &enc(EncType::Ascii), 1).unwrap_err();
        assert!(matches!(
            &errors[0],
            CompileError::DuplicateDefaultRule { line: 2, .. }
        ));
    }

    #[test]
    fn charset_negation_respects_code_point_space() {
        let defs = [def(
            None,
            RulePattern::Pattern {
                pattern: Pattern::CharSet {
                    chars: vec![Characters::Range('\u{1}', '\u{ff}')],
                    negated: true,
                },
            },
            1,
        )];
        let block = compile_block(&defs, &enc(EncType::Ascii), 1).unwrap();
        // only NUL remains
        match &block.rules[0].regex {
            Regex::Sym(set) => {
                assert!(set.contains(0));
                assert!(!set.contains(1));
                assert!(!set.contains(0xFF));
            }
            other => panic!("expected symbol, got {:?}", other),
        }
    }

    #[test]
    fn utf8_literal_expands_to_byte_sequence() {
        let defs = [def(
            None,
            RulePattern::Literal {
                characters: vec!['я'],
            },
            1,
        )];
        let block = compile_block(&defs, &enc(EncType::Utf8), 1).unwrap();
        match &block.rules[0].regex {
            Regex::Seq(elements) => {
                assert_eq!(elements.len(), 2);
                assert_eq!(elements[0], Regex::Sym(RangeSet::single(0xD1, 0xD2)));
                assert_eq!(elements[1], Regex::Sym(RangeSet::single(0x8F, 0x90)));
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn fail_policy_propagates_encoding_errors() {
        let mut e = enc(EncType::Ascii);
        e.set_policy(Policy::Fail);
        let defs = [def(
            None,
            RulePattern::Literal {
                characters: vec!['€'],
            },
            3,
        )];
        let errors = compile_block(&defs, &e, 1).unwrap_err();
        assert!(matches!(&errors[0], CompileError::Encoding { line: 3, .. }));
    }

    #[test]
    fn tags_are_collected_in_order() {
        let defs = [def(
            None,
            RulePattern::Pattern {
                pattern: Pattern::Sequence {
                    elements: vec![
                        Pattern::Tag { name: "t1".to_string() },
                        Pattern::Char { chars: Characters::Single('a') },
                        Pattern::Tag { name: "t2".to_string() },
                    ],
                },
            },
            1,
        )];
        let block = compile_block(&defs, &enc(EncType::Ascii), 1).unwrap();
        assert_eq!(block.tags, vec!["t1".to_string(), "t2".to_string()]);
    }
}
