use crate::{
    Characters, Directive, Pattern, RulePattern, Segment, SpecParser, TagsConf,
};

use super::BootstrapSpecParser;

fn parse(input: &str) -> Vec<Segment> {
    BootstrapSpecParser.parse_spec(input).unwrap().segments
}

#[test]
fn verbatim_only() {
    let segments = parse("int main() { return 0; }\n");
    assert_eq!(segments.len(), 1);
    match &segments[0] {
        Segment::Verbatim { text, line } => {
            assert_eq!(text, "int main() { return 0; }\n");
            assert_eq!(*line, 1);
        }
        other => panic!("expected verbatim, got {:?}", other),
    }
}

#[test]
fn single_literal_rule() {
    let segments = parse("/*!relex\n    \"hello\" { return 1; }\n*/\n");
    match &segments[0] {
        Segment::Rules { rules, line } => {
            assert_eq!(*line, 1);
            assert_eq!(rules.len(), 1);
            assert_eq!(rules[0].condition, None);
            assert_eq!(rules[0].action, "return 1;");
            assert_eq!(rules[0].line, 2);
            assert_eq!(
                rules[0].pattern,
                RulePattern::Literal {
                    characters: "hello".chars().collect()
                }
            );
        }
        other => panic!("expected rules, got {:?}", other),
    }
}

#[test]
fn conditions_and_default() {
    let segments = parse(
        "/*!relex\n  <c1> \"a\" { A }\n  <c1> [a-z]+ { B }\n  <c1> * { ERR }\n*/",
    );
    match &segments[0] {
        Segment::Rules { rules, .. } => {
            assert_eq!(rules.len(), 3);
            assert!(rules.iter().all(|r| r.condition.as_deref() == Some("c1")));
            assert_eq!(rules[2].pattern, RulePattern::Default);
            match &rules[1].pattern {
                RulePattern::Pattern { pattern } => match pattern {
                    Pattern::Repetition { min: 1, max: None, inner } => match inner.as_ref() {
                        Pattern::CharSet { chars, negated: false } => {
                            assert_eq!(chars, &[Characters::Range('a', 'z')]);
                        }
                        other => panic!("expected charset, got {:?}", other),
                    },
                    other => panic!("expected repetition, got {:?}", other),
                },
                other => panic!("expected pattern, got {:?}", other),
            }
        }
        other => panic!("expected rules, got {:?}", other),
    }
}

#[test]
fn operators_and_groups() {
    let segments = parse("/*!relex\n  (\"ab\"|[0-9]){2,4}x?@end { X }\n*/");
    let rules = match &segments[0] {
        Segment::Rules { rules, .. } => rules,
        other => panic!("expected rules, got {:?}", other),
    };
    match &rules[0].pattern {
        RulePattern::Pattern {
            pattern: Pattern::Sequence { elements },
        } => {
            assert_eq!(elements.len(), 3);
            assert!(matches!(
                &elements[0],
                Pattern::Repetition { min: 2, max: Some(4), .. }
            ));
            assert!(matches!(
                &elements[1],
                Pattern::Repetition { min: 0, max: Some(1), .. }
            ));
            assert_eq!(
                elements[2],
                Pattern::Tag {
                    name: "end".to_string()
                }
            );
        }
        other => panic!("expected sequence, got {:?}", other),
    }
}

#[test]
fn escapes_in_classes_and_strings() {
    let segments = parse("/*!relex\n  \"a\\n\\u{44F}\" { X }\n  [\\t\\x{20}] { Y }\n*/");
    let rules = match &segments[0] {
        Segment::Rules { rules, .. } => rules,
        other => panic!("expected rules, got {:?}", other),
    };
    assert_eq!(
        rules[0].pattern,
        RulePattern::Literal {
            characters: vec!['a', '\n', 'я']
        }
    );
    match &rules[1].pattern {
        RulePattern::Pattern {
            pattern: Pattern::CharSet { chars, .. },
        } => assert_eq!(chars, &[Characters::Single('\t'), Characters::Single(' ')]),
        other => panic!("expected charset, got {:?}", other),
    }
}

#[test]
fn nested_braces_in_action() {
    let segments = parse("/*!relex\n  \"x\" { if (a) { b(); } return 2; }\n*/");
    let rules = match &segments[0] {
        Segment::Rules { rules, .. } => rules,
        other => panic!("expected rules, got {:?}", other),
    };
    assert_eq!(rules[0].action, "if (a) { b(); } return 2;");
}

#[test]
fn directives() {
    let segments = parse(
        "/*!max:relex*/\nA\n/*!types:relex*/\n/*!tags:relex format = \"long @@;\"; separator = \"\\n\"; */",
    );
    assert!(matches!(
        segments[0],
        Segment::Directive { directive: Directive::MaxFill, line: 1 }
    ));
    match &segments[1] {
        Segment::Verbatim { text, .. } => assert_eq!(text, "\nA\n"),
        other => panic!("expected verbatim, got {:?}", other),
    }
    assert!(matches!(
        segments[2],
        Segment::Directive { directive: Directive::Types, line: 3 }
    ));
    match &segments[3] {
        Segment::Verbatim { text, .. } => assert_eq!(text, "\n"),
        other => panic!("expected verbatim, got {:?}", other),
    }
    match &segments[4] {
        Segment::Directive {
            directive: Directive::Tags(TagsConf { format, separator }),
            line: 4,
        } => {
            assert_eq!(format, "long @@;");
            assert_eq!(separator, "\n");
        }
        other => panic!("expected tags directive, got {:?}", other),
    }
}

#[test]
fn unterminated_block_is_an_error() {
    let err = BootstrapSpecParser
        .parse_spec("/*!relex\n \"a\" { X }\n")
        .unwrap_err();
    assert_eq!(err.line, 1);
}

#[test]
fn verbatim_between_blocks_keeps_line_numbers() {
    let input = "head\n/*!relex\n\"a\" { X }\n*/\ntail\n";
    let segments = parse(input);
    match &segments[2] {
        Segment::Verbatim { text, line } => {
            assert_eq!(text, "\ntail\n");
            assert_eq!(*line, 4);
        }
        other => panic!("expected verbatim, got {:?}", other),
    }
}
