use relex_codegen::{OutputFile, Opts};
use relex_lexer::{CompiledBlock, CondDfa, TableDfa, TableState, DEAD};
use relex_regex::Range;

use crate::dispatch::{select_dispatch, Dispatch, TreeNode};

/// Everything decided about a condition before any of its text is written:
/// label numbers are handed out up front so forward gotos can be emitted in
/// one pass.
struct CondPlan {
    cond_index: usize,
    entry_label: usize,
    state_labels: Vec<usize>,
    /// Extra label with a `YYSKIP` prologue when the start state is also a
    /// transition target.
    start_skip_label: Option<usize>,
    rpo: Vec<usize>,
    /// Distinct fallback rules in emission order; their position is the
    /// `yyaccept` value.
    saved: Vec<usize>,
    use_yyaccept: bool,
    restore_label: Option<usize>,
    undef_label: Option<usize>,
    undef_rule: Option<usize>,
    action_labels: Vec<(usize, usize)>,
}

pub fn emit_block(block: &CompiledBlock, out: &mut OutputFile) {
    let opts = out.opts().clone();

    for cond in &block.conditions {
        if let Some(name) = &cond.name {
            out.block().types.push(name.clone());
        }
    }
    for tag in &block.tags {
        out.block().tags.insert(tag.clone());
    }

    if block.conditions.is_empty() {
        return;
    }
    let has_conds = block.conditions[0].name.is_some();
    let ind = 1u32;

    out.ws("{\n");
    out.wind(ind).ws("YYCTYPE ").ws(&opts.yych).ws(";\n");
    out.wdelay_yyaccept_init(ind);
    if opts.storable_state {
        out.wdelay_state_goto(ind);
    }
    if let Some(label) = &opts.user_start_label {
        out.block().user_start_label = label.clone();
        out.wuser_start_label();
    }

    let plans: Vec<CondPlan> = block
        .conditions
        .iter()
        .enumerate()
        .map(|(i, cond)| plan_condition(i, cond, block, out))
        .collect();
    if plans.iter().any(|p| p.use_yyaccept) {
        out.block().used_yyaccept = true;
    }

    if has_conds {
        out.wdelay_warn_condition_order();
        emit_cond_dispatch(block, out, ind, &opts);
    }

    for plan in &plans {
        emit_condition(block, plan, out, ind, &opts);
    }

    out.ws("}\n");
}

fn reverse_postorder(dfa: &TableDfa) -> Vec<usize> {
    let n = dfa.states.len();
    let mut visited = vec![false; n];
    let mut post = Vec::with_capacity(n);
    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    visited[0] = true;
    while let Some(top) = stack.last_mut() {
        let (s, ci) = *top;
        if ci >= dfa.states[s].cells.len() {
            post.push(s);
            stack.pop();
            continue;
        }
        top.1 += 1;
        let t = dfa.states[s].cells[ci];
        if t != DEAD && !visited[t] {
            visited[t] = true;
            stack.push((t, 0));
        }
    }
    post.reverse();
    post
}

fn first_rule_of_condition(block: &CompiledBlock, name: &Option<String>) -> usize {
    block
        .rules
        .iter()
        .filter(|r| &r.condition == name)
        .map(|r| r.id)
        .min()
        .expect("condition without rules")
}

fn plan_condition(
    cond_index: usize,
    cond: &CondDfa,
    block: &CompiledBlock,
    out: &mut OutputFile,
) -> CondPlan {
    let dfa = &cond.dfa;
    let rpo = reverse_postorder(dfa);

    let mut state_labels = vec![0usize; dfa.states.len()];
    for &s in &rpo {
        state_labels[s] = out.block().next_label();
    }
    let entry_label = state_labels[0];

    let start_is_target = dfa
        .states
        .iter()
        .any(|st| st.cells.iter().any(|&t| t == 0));
    let start_skip_label = start_is_target.then(|| out.block().next_label());

    let mut saved = Vec::new();
    for &s in &rpo {
        let st = &dfa.states[s];
        if st.fallback {
            let winner = st.accept[0];
            if !saved.contains(&winner) {
                saved.push(winner);
            }
        }
    }
    // backup only pays off when some failure actually restores
    let needs_restore = !saved.is_empty()
        && dfa
            .states
            .iter()
            .any(|st| st.accept.is_empty() && st.cells.iter().any(|&t| t == DEAD));
    if !needs_restore {
        saved.clear();
    }
    let use_yyaccept = saved.len() > 1;
    let restore_label = needs_restore.then(|| out.block().next_label());

    let needs_undef = saved.is_empty()
        && dfa
            .states
            .iter()
            .any(|st| st.accept.is_empty() && st.cells.iter().any(|&t| t == DEAD));
    let undef_rule = needs_undef.then(|| first_rule_of_condition(block, &cond.name));
    let undef_label = needs_undef.then(|| out.block().next_label());

    let mut action_labels: Vec<(usize, usize)> = Vec::new();
    {
        let mut reference = |rule: usize, out: &mut OutputFile| {
            if !action_labels.iter().any(|(r, _)| *r == rule) {
                action_labels.push((rule, out.block().next_label()));
            }
        };
        for &s in &rpo {
            if let Some(&winner) = dfa.states[s].accept.first() {
                reference(winner, out);
            }
        }
        for &r in &saved.clone() {
            reference(r, out);
        }
        if let Some(r) = undef_rule {
            reference(r, out);
        }
    }

    CondPlan {
        cond_index,
        entry_label,
        state_labels,
        start_skip_label,
        rpo,
        saved,
        use_yyaccept,
        restore_label,
        undef_label,
        undef_rule,
        action_labels,
    }
}

fn action_label(plan: &CondPlan, rule: usize) -> usize {
    plan.action_labels
        .iter()
        .find(|(r, _)| *r == rule)
        .map(|(_, l)| *l)
        .expect("unplanned action label")
}

fn goto_label(plan: &CondPlan, target: usize) -> usize {
    if target == 0 {
        plan.start_skip_label.expect("unplanned start skip label")
    } else {
        plan.state_labels[target]
    }
}

fn fail_label(plan: &CondPlan, st: &TableState) -> usize {
    // longest match ends here: run the state's own rule; otherwise back up
    // to the last saved match; otherwise control flow is undefined and the
    // warned-about stub takes over
    if let Some(&winner) = st.accept.first() {
        action_label(plan, winner)
    } else if let Some(restore) = plan.restore_label {
        restore
    } else {
        plan.undef_label.expect("failure without a target")
    }
}

fn emit_cond_dispatch(block: &CompiledBlock, out: &mut OutputFile, ind: u32, opts: &Opts) {
    let get_cond = if opts.cond_get_naked {
        opts.cond_get.clone()
    } else {
        format!("{}()", opts.cond_get)
    };
    if opts.computed_gotos {
        out.wind(ind).ws("{\n");
        out.wind(ind + 1)
            .ws("static void *yyctable[")
            .wusize(block.conditions.len())
            .ws("] = {\n");
        for cond in &block.conditions {
            let name = cond.name.as_deref().unwrap();
            out.wind(ind + 2)
                .ws("&&")
                .ws(&opts.cond_label_prefix)
                .ws(name)
                .ws(",\n");
        }
        out.wind(ind + 1).ws("};\n");
        out.wind(ind + 1)
            .ws("goto *yyctable[")
            .ws(&get_cond)
            .ws("];\n");
        out.wind(ind).ws("}\n");
    } else {
        out.wind(ind).ws("switch (").ws(&get_cond).ws(") {\n");
        for cond in &block.conditions {
            let name = cond.name.as_deref().unwrap();
            out.wind(ind)
                .ws("case ")
                .ws(&opts.cond_enum_prefix)
                .ws(name)
                .ws(": goto ")
                .ws(&opts.cond_label_prefix)
                .ws(name)
                .ws(";\n");
        }
        out.wind(ind).ws("}\n");
    }
}

fn emit_condition(
    block: &CompiledBlock,
    plan: &CondPlan,
    out: &mut OutputFile,
    ind: u32,
    opts: &Opts,
) {
    let cond = &block.conditions[plan.cond_index];
    let dfa = &cond.dfa;

    if let Some(name) = &cond.name {
        out.ws(&opts.cond_label_prefix).ws(name).ws(":\n");
    }
    for &s in &plan.rpo {
        emit_state(block, plan, dfa, s, out, ind, opts);
    }

    if let Some(undef) = plan.undef_label {
        out.wlabel(undef).ws(":\n");
        out.wind(ind).ws("YYSKIP ();\n");
        out.wind(ind)
            .ws("goto ")
            .wlabel(action_label(plan, plan.undef_rule.unwrap()))
            .ws(";\n");
    }
    if let Some(restore) = plan.restore_label {
        out.wlabel(restore).ws(":\n");
        out.wind(ind).ws("YYRESTORE ();\n");
        if plan.use_yyaccept {
            out.wind(ind).ws("switch (").ws(&opts.yyaccept).ws(") {\n");
            for (k, &rule) in plan.saved.iter().enumerate() {
                out.wind(ind);
                if k + 1 == plan.saved.len() {
                    out.ws("default:\tgoto ");
                } else {
                    out.ws("case ").wusize(k).ws(":\tgoto ");
                }
                out.wlabel(action_label(plan, rule)).ws(";\n");
            }
            out.wind(ind).ws("}\n");
        } else {
            out.wind(ind)
                .ws("goto ")
                .wlabel(action_label(plan, plan.saved[0]))
                .ws(";\n");
        }
    }

    for &(rule_id, label) in &plan.action_labels {
        let rule = &block.rules[rule_id];
        out.wlabel(label).ws(":\n");
        out.wline_info(rule.action.line, &opts.input_file);
        out.wind(ind).ws("{ ").ws(&rule.action.code).ws(" }\n");
        out.wdelay_line_info();
    }
}

fn emit_state(
    block: &CompiledBlock,
    plan: &CondPlan,
    dfa: &TableDfa,
    s: usize,
    out: &mut OutputFile,
    ind: u32,
    opts: &Opts,
) {
    let st = &dfa.states[s];

    if s == 0 {
        if let Some(skip) = plan.start_skip_label {
            out.wlabel(skip).ws(":\n");
            out.wind(ind).ws("YYSKIP ();\n");
        }
        out.wlabel(plan.entry_label).ws(":\n");
    } else {
        out.wlabel(plan.state_labels[s]).ws(":\n");
        out.wind(ind).ws("YYSKIP ();\n");
    }

    if st.fallback && !plan.saved.is_empty() {
        if plan.use_yyaccept {
            let k = plan
                .saved
                .iter()
                .position(|&r| r == st.accept[0])
                .expect("fallback rule not in the saved set");
            out.wind(ind)
                .ws(&opts.yyaccept)
                .ws(" = ")
                .wusize(k)
                .ws(";\n");
        }
        out.wind(ind).ws("YYBACKUP ();\n");
    }

    if let Some(fill) = &st.fill {
        if opts.storable_state {
            let slot = out.next_fill_index();
            out.wind(ind)
                .ws(&opts.state_set)
                .ws("(")
                .wusize(slot)
                .ws(");\n");
            write_fill(out, ind, fill.need);
            out.ws(&opts.fill_label).wusize(slot).ws(":\n");
        } else {
            write_fill(out, ind, fill.need);
        }
    }

    let has_transitions = st.cells.iter().any(|&t| t != DEAD);
    if !has_transitions {
        out.wind(ind)
            .ws("goto ")
            .wlabel(fail_label(plan, st))
            .ws(";\n");
        return;
    }

    out.wind(ind).ws(&opts.yych).ws(" = YYPEEK ();\n");
    let spans = build_spans(block, plan, st);
    let dispatch = select_dispatch(&spans, opts.enc.n_code_units(), opts);
    emit_dispatch(&dispatch, out, ind, opts);
}

fn write_fill(out: &mut OutputFile, ind: u32, need: usize) {
    out.wind(ind)
        .ws("if (YYLESSTHAN (")
        .wusize(need)
        .ws(")) YYFILL(")
        .wusize(need)
        .ws(");\n");
}

fn build_spans(block: &CompiledBlock, plan: &CondPlan, st: &TableState) -> Vec<(Range, usize)> {
    let mut spans: Vec<(Range, usize)> = Vec::new();
    for (ci, &t) in st.cells.iter().enumerate() {
        let label = if t == DEAD {
            fail_label(plan, st)
        } else {
            goto_label(plan, t)
        };
        let cell = block.alphabet.cell(ci);
        match spans.last_mut() {
            Some((r, l)) if *l == label && r.hi == cell.lo => r.hi = cell.hi,
            _ => spans.push((cell, label)),
        }
    }
    spans
}

fn emit_dispatch(dispatch: &Dispatch, out: &mut OutputFile, ind: u32, opts: &Opts) {
    match dispatch {
        Dispatch::Linear { cases, default } => {
            if opts.nested_ifs {
                for (ranges, label) in cases {
                    for r in ranges {
                        out.wind(ind).ws("if (").ws(&opts.yych);
                        if r.len() == 1 {
                            out.ws(" == ").wc_hex(r.lo);
                        } else {
                            out.ws(" >= ")
                                .wc_hex(r.lo)
                                .ws(" && ")
                                .ws(&opts.yych)
                                .ws(" <= ")
                                .wc_hex(r.hi - 1);
                        }
                        out.ws(") goto ").wlabel(*label).ws(";\n");
                    }
                }
                out.wind(ind).ws("goto ").wlabel(*default).ws(";\n");
            } else {
                out.wind(ind)
                    .ws("switch (")
                    .ws(&opts.yych)
                    .ws(") {\n");
                for (ranges, label) in cases {
                    let units: Vec<u32> = ranges.iter().flat_map(|r| r.lo..r.hi).collect();
                    for (i, &cu) in units.iter().enumerate() {
                        out.wind(ind).ws("case ").wc_hex(cu).ws(":");
                        if i + 1 == units.len() {
                            out.ws("\tgoto ").wlabel(*label).ws(";\n");
                        } else {
                            out.ws("\n");
                        }
                    }
                }
                out.wind(ind)
                    .ws("default:\tgoto ")
                    .wlabel(*default)
                    .ws(";\n");
                out.wind(ind).ws("}\n");
            }
        }
        Dispatch::Tree(node) => emit_tree(node, out, ind, opts),
        Dispatch::Table { targets } => {
            out.wind(ind).ws("{\n");
            out.wind(ind + 1)
                .ws("static void *yytarget[")
                .wusize(targets.len())
                .ws("] = {\n");
            for row in targets.chunks(8) {
                out.wind(ind + 2);
                for (i, &label) in row.iter().enumerate() {
                    out.ws("&&").wlabel(label).ws(",");
                    if i + 1 < row.len() {
                        out.ws(" ");
                    }
                }
                out.ws("\n");
            }
            out.wind(ind + 1).ws("};\n");
            out.wind(ind + 1)
                .ws("goto *yytarget[")
                .ws(&opts.yych)
                .ws("];\n");
            out.wind(ind).ws("}\n");
        }
    }
}

fn emit_tree(node: &TreeNode, out: &mut OutputFile, ind: u32, opts: &Opts) {
    match node {
        TreeNode::Leaf(label) => {
            out.wind(ind).ws("goto ").wlabel(*label).ws(";\n");
        }
        TreeNode::Branch { pivot, lt, ge } => {
            out.wind(ind)
                .ws("if (")
                .ws(&opts.yych)
                .ws(" < ")
                .wc_hex(*pivot)
                .ws(") {\n");
            emit_tree(lt, out, ind + 1, opts);
            out.wind(ind).ws("} else {\n");
            emit_tree(ge, out, ind + 1, opts);
            out.wind(ind).ws("}\n");
        }
    }
}

#[cfg(test)]
mod tests;
