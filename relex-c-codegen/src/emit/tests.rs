use relex_codegen::{OutputFile, Opts};
use relex_input::{Characters, Pattern, RuleDef, RulePattern};
use relex_lexer::{compile_block, LexerCodeGen};
use relex_regex::EncType;

use crate::CLexerCodeGen;

fn literal(s: &str, action: &str, line: u32) -> RuleDef {
    RuleDef {
        condition: None,
        pattern: RulePattern::Literal {
            characters: s.chars().collect(),
        },
        action: action.to_string(),
        line,
    }
}

fn cond_literal(cond: &str, s: &str, action: &str, line: u32) -> RuleDef {
    RuleDef {
        condition: Some(cond.to_string()),
        ..literal(s, action, line)
    }
}

fn opts() -> Opts {
    Opts {
        no_generation_date: true,
        suppress_line_info: true,
        ..Opts::default()
    }
}

fn generate(defs: &[RuleDef], opts: Opts) -> String {
    let block = compile_block(defs, &opts.enc, 1).unwrap();
    let mut out = OutputFile::new(opts);
    CLexerCodeGen::new().generate_block(&block, &mut out);
    let (types, tags) = out.global_lists();
    let mut sink = Vec::new();
    out.emit("out.c", &types, &tags, 1, &mut sink).unwrap();
    String::from_utf8(sink).unwrap()
}

#[test]
fn single_keyword_has_one_action_and_a_fill_guard() {
    let text = generate(&[literal("hello", "return 1;", 2)], opts());
    assert_eq!(text.matches("return 1;").count(), 1);
    assert!(text.contains("if (YYLESSTHAN (5)) YYFILL(5);"));
    assert!(text.contains("case 'h':\tgoto yy1;"));
    assert!(text.contains("yych = YYPEEK ();"));
    // five consumed units
    assert_eq!(text.matches("YYSKIP ();").count(), 6); // 5 chain states + undef stub
}

#[test]
fn overlapping_rules_backup_and_restore() {
    let text = generate(
        &[literal("ab", "return 1;", 2), literal("abcd", "return 2;", 3)],
        opts(),
    );
    assert!(text.contains("YYBACKUP ();"));
    assert!(text.contains("YYRESTORE ();"));
    // one distinct fallback rule: no yyaccept bookkeeping
    assert!(!text.contains("yyaccept"));
}

#[test]
fn several_fallback_rules_use_yyaccept() {
    let text = generate(
        &[
            literal("a", "return 1;", 2),
            literal("abc", "return 2;", 3),
            literal("b", "return 3;", 4),
            literal("bxy", "return 4;", 5),
        ],
        opts(),
    );
    assert!(text.contains("unsigned int yyaccept = 0;"));
    assert!(text.contains("yyaccept = 0;"));
    assert!(text.contains("yyaccept = 1;"));
    assert!(text.contains("switch (yyaccept) {"));
    assert!(text.contains("YYRESTORE ();"));
}

#[test]
fn conditions_dispatch_through_the_enum() {
    let text = generate(
        &[
            cond_literal("c1", "a", "return 1;", 2),
            cond_literal("c2", "b", "return 2;", 3),
        ],
        opts(),
    );
    assert!(text.contains("switch (YYGETCONDITION()) {"));
    assert!(text.contains("case yycc1: goto yyc_c1;"));
    assert!(text.contains("case yycc2: goto yyc_c2;"));
    assert!(text.contains("yyc_c1:\n"));
    assert!(text.contains("yyc_c2:\n"));
}

#[test]
fn computed_gotos_emit_a_jump_table() {
    let rules: Vec<RuleDef> = (0..10)
        .map(|i| {
            literal(
                &char::from_digit(i, 10).unwrap().to_string(),
                &format!("return {};", i),
                i + 2,
            )
        })
        .collect();
    let text = generate(
        &rules,
        Opts {
            computed_gotos: true,
            ..opts()
        },
    );
    assert!(text.contains("static void *yytarget[256] = {"));
    assert!(text.contains("goto *yytarget[yych];"));
}

#[test]
fn nested_ifs_replace_the_switch() {
    let text = generate(
        &[literal("a", "return 1;", 2)],
        Opts {
            nested_ifs: true,
            ..opts()
        },
    );
    assert!(text.contains("if (yych == 'a') goto yy1;"));
    assert!(!text.contains("switch (yych)"));
}

#[test]
fn storable_state_assigns_fill_slots() {
    let defs = [RuleDef {
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
        action: "return 1;".to_string(),
        line: 2,
    }];
    let text = generate(
        &defs,
        Opts {
            storable_state: true,
            ..opts()
        },
    );
    assert!(text.contains("switch (YYGETSTATE()) {"));
    assert!(text.contains("default: goto yy0;"));
    assert!(text.contains("case 0: goto yyFillLabel0;"));
    assert!(text.contains("case 1: goto yyFillLabel1;"));
    assert!(text.contains("YYSETSTATE(0);"));
    assert!(text.contains("YYSETSTATE(1);"));
    assert!(text.contains("yyFillLabel0:"));
    assert!(text.contains("yyFillLabel1:"));
    assert!(text.contains("yyNext:"));
}

#[test]
fn utf8_class_builds_a_decision_tree() {
    let mut o = opts();
    assert!(o.enc.set(EncType::Utf8));
    let defs = [RuleDef {
        condition: None,
        pattern: RulePattern::Pattern {
            pattern: Pattern::Char {
                chars: Characters::Range('а', 'я'),
            },
        },
        action: "return 1;".to_string(),
        line: 2,
    }];
    let text = generate(&defs, o);
    // multi-byte dispatch: lead byte comparisons, continuation ranges
    assert!(text.contains("0xD0") || text.contains("0xD1"));
    assert!(text.contains("if (yych < "));
}

#[test]
fn empty_block_emits_nothing() {
    let text = generate(&[], opts());
    assert_eq!(text, "");
}
