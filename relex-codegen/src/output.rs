use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::print::{prt_ch_or_hex, prt_hex};
use crate::templating::Template;
use crate::Opts;

/// Tag-declaration configuration: `format` is emitted once per global tag
/// name with `@@` substituted, entries joined by `separator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfTags {
    pub format: String,
    pub separator: String,
}

/// One unit of output. `Code` is filled eagerly while emitting a block; the
/// other variants are placeholders whose text depends on information only
/// known after every block has been processed, so they are materialized in
/// the global emit phase.
#[derive(Debug)]
pub enum Fragment {
    Code(String),
    LineInfo,
    StateGoto { indent: u32 },
    Tags { conf: ConfTags },
    Types { indent: u32 },
    WarnCondOrder,
    YyAcceptInit { indent: u32 },
    YyMaxFill,
}

impl Fragment {
    pub fn is_code(&self) -> bool {
        matches!(self, Fragment::Code(_))
    }
}

/// The generated code for one rule block, plus what the global emit phase
/// needs to know about it.
#[derive(Debug)]
pub struct OutputBlock {
    fragments: Vec<Fragment>,
    pub used_yyaccept: bool,
    pub user_start_label: String,
    pub line: u32,
    /// Condition names observed in this block, in first-seen order.
    pub types: Vec<String>,
    pub tags: BTreeSet<String>,
    label_counter: usize,
    state_goto: bool,
}

impl OutputBlock {
    fn new(line: u32) -> Self {
        OutputBlock {
            fragments: vec![Fragment::Code(String::new())],
            used_yyaccept: false,
            user_start_label: String::new(),
            line,
            types: Vec::new(),
            tags: BTreeSet::new(),
            label_counter: 0,
            state_goto: false,
        }
    }

    /// Labels are small integers allocated per block, monotonically.
    pub fn next_label(&mut self) -> usize {
        let label = self.label_counter;
        self.label_counter += 1;
        label
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
}

/// Ordered blocks of fragments plus the file-level counters the deferred
/// fragments resolve against.
pub struct OutputFile {
    blocks: Vec<OutputBlock>,
    fill_index: usize,
    warn_condition_order: bool,
    opts: Opts,
}

impl OutputFile {
    pub fn new(opts: Opts) -> Self {
        // note [condition order]: a requested header file fixes the enum,
        // so implicit ordering is never relied upon
        let warn_condition_order = opts.header_file.is_none();
        let mut out = OutputFile {
            blocks: Vec::new(),
            fill_index: 0,
            warn_condition_order,
            opts,
        };
        out.new_block(0);
        out
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn block(&mut self) -> &mut OutputBlock {
        self.blocks.last_mut().unwrap()
    }

    pub fn blocks(&self) -> &[OutputBlock] {
        &self.blocks
    }

    pub fn new_block(&mut self, line: u32) {
        self.blocks.push(OutputBlock::new(line));
    }

    /// The number of `YYFILL` slots assigned so far; the state-goto switch
    /// covers all of them.
    pub fn next_fill_index(&mut self) -> usize {
        let slot = self.fill_index;
        self.fill_index += 1;
        slot
    }

    fn stream(&mut self) -> &mut String {
        match self.block().fragments.last_mut().unwrap() {
            Fragment::Code(text) => text,
            // every placeholder is followed by a code fragment
            _ => unreachable!("fragment list must end with a code fragment"),
        }
    }

    /// Seals the current code fragment and begins a fresh one.
    pub fn insert_code(&mut self) {
        self.block().fragments.push(Fragment::Code(String::new()));
    }

    fn wdelay(&mut self, fragment: Fragment) {
        self.block().fragments.push(fragment);
        self.insert_code();
    }

    pub fn ws(&mut self, s: &str) -> &mut Self {
        self.stream().push_str(s);
        self
    }

    pub fn wc(&mut self, c: char) -> &mut Self {
        self.stream().push(c);
        self
    }

    pub fn wu32(&mut self, n: u32) -> &mut Self {
        write!(self.stream(), "{}", n).unwrap();
        self
    }

    pub fn wusize(&mut self, n: usize) -> &mut Self {
        write!(self.stream(), "{}", n).unwrap();
        self
    }

    pub fn wlabel(&mut self, label: usize) -> &mut Self {
        let prefix = self.opts.label_prefix.clone();
        write!(self.stream(), "{}{}", prefix, label).unwrap();
        self
    }

    pub fn wind(&mut self, ind: u32) -> &mut Self {
        let indent = self.opts.indent(ind);
        self.stream().push_str(&indent);
        self
    }

    pub fn wu32_hex(&mut self, n: u32) -> &mut Self {
        let sz = self.opts.enc.sz_code_unit();
        let mut s = String::new();
        prt_hex(&mut s, n, sz);
        self.ws(&s)
    }

    pub fn wc_hex(&mut self, n: u32) -> &mut Self {
        let enc = self.opts.enc;
        let mut s = String::new();
        prt_ch_or_hex(&mut s, n, &enc);
        self.ws(&s)
    }

    pub fn wline_info(&mut self, line: u32, file_name: &str) -> &mut Self {
        let mut s = String::new();
        output_line_info(&mut s, line, file_name, &self.opts);
        self.ws(&s)
    }

    pub fn wversion_time(&mut self) -> &mut Self {
        let mut s = String::new();
        output_version_time(&mut s, &self.opts);
        self.ws(&s)
    }

    pub fn wuser_start_label(&mut self) -> &mut Self {
        let label = self.block().user_start_label.clone();
        if !label.is_empty() {
            self.ws(&label).ws(":\n");
        }
        self
    }

    pub fn wdelay_line_info(&mut self) -> &mut Self {
        self.wdelay(Fragment::LineInfo);
        self
    }

    /// Idempotent per block; only meaningful in storable-state mode.
    pub fn wdelay_state_goto(&mut self, indent: u32) -> &mut Self {
        if self.opts.storable_state && !self.block().state_goto {
            self.wdelay(Fragment::StateGoto { indent });
            self.block().state_goto = true;
        }
        self
    }

    pub fn wdelay_types(&mut self) -> &mut Self {
        // note [condition order]: an explicit types directive names the
        // enum members, so implicit ordering stops mattering file-wide
        self.warn_condition_order = false;
        self.wdelay(Fragment::Types { indent: 0 });
        self
    }

    pub fn wdelay_warn_condition_order(&mut self) -> &mut Self {
        self.wdelay(Fragment::WarnCondOrder);
        self
    }

    pub fn wdelay_yyaccept_init(&mut self, indent: u32) -> &mut Self {
        self.wdelay(Fragment::YyAcceptInit { indent });
        self
    }

    pub fn wdelay_yymaxfill(&mut self) -> &mut Self {
        self.wdelay(Fragment::YyMaxFill);
        self
    }

    pub fn wdelay_tags(&mut self, conf: ConfTags) -> &mut Self {
        self.wdelay(Fragment::Tags { conf });
        self
    }

    /// Folds all blocks' condition types into one order-preserving unique
    /// sequence and all tag names into one sorted set.
    pub fn global_lists(&self) -> (Vec<String>, BTreeSet<String>) {
        let mut types = Vec::new();
        let mut tags = BTreeSet::new();
        for block in &self.blocks {
            for t in &block.types {
                if !types.contains(t) {
                    types.push(t.clone());
                }
            }
            tags.extend(block.tags.iter().cloned());
        }
        (types, tags)
    }

    /// Walks blocks in order, materializing placeholders against the global
    /// lists and a running output line count. Returns the source lines of
    /// blocks whose condition-order warning fired.
    pub fn emit(
        &self,
        file_name: &str,
        global_types: &[String],
        global_tags: &BTreeSet<String>,
        max_fill: usize,
        sink: &mut dyn Write,
    ) -> io::Result<Vec<u32>> {
        let mut warnings = Vec::new();
        let mut line_count: u32 = 1;
        for block in &self.blocks {
            for fragment in &block.fragments {
                let mut text = String::new();
                match fragment {
                    Fragment::Code(code) => text.push_str(code),
                    Fragment::LineInfo => {
                        output_line_info(&mut text, line_count + 1, file_name, &self.opts)
                    }
                    Fragment::StateGoto { indent } => {
                        output_state_goto(&mut text, *indent, 0, self.fill_index, &self.opts)
                    }
                    Fragment::Tags { conf } => output_tags(&mut text, conf, global_tags),
                    Fragment::Types { indent } => {
                        output_types(&mut text, *indent, global_types, &self.opts)
                    }
                    Fragment::WarnCondOrder => {
                        if self.warn_condition_order {
                            warnings.push(block.line);
                        }
                    }
                    Fragment::YyAcceptInit { indent } => {
                        output_yyaccept_init(&mut text, *indent, block.used_yyaccept, &self.opts)
                    }
                    Fragment::YyMaxFill => output_yymaxfill(&mut text, max_fill),
                }
                sink.write_all(text.as_bytes())?;
                line_count += text.matches('\n').count() as u32;
            }
        }
        Ok(warnings)
    }
}

/// The `-t` header: banner, line info, condition enum.
pub fn emit_header(
    opts: &Opts,
    file_name: &str,
    global_types: &[String],
    sink: &mut dyn Write,
) -> io::Result<()> {
    let mut text = String::new();
    output_version_time(&mut text, opts);
    output_line_info(&mut text, 3, file_name, opts);
    text.push('\n');
    output_types(&mut text, 0, global_types, opts);
    sink.write_all(text.as_bytes())
}

fn output_tags(o: &mut String, conf: &ConfTags, tags: &BTreeSet<String>) {
    let template = Template::new(&conf.format);
    let mut first = true;
    for tag in tags {
        if !first {
            o.push_str(&conf.separator);
        }
        first = false;
        template.expand(tag, o);
    }
}

fn output_state_goto(
    o: &mut String,
    ind: u32,
    start_label: usize,
    fill_index: usize,
    opts: &Opts,
) {
    let indstr = opts.indent(ind);
    let get_state = output_get_state(opts);
    writeln!(o, "{}switch ({}) {{", indstr, get_state).unwrap();
    if opts.state_abort {
        writeln!(o, "{}default: abort();", indstr).unwrap();
        writeln!(
            o,
            "{}case -1: goto {}{};",
            indstr, opts.label_prefix, start_label
        )
        .unwrap();
    } else {
        writeln!(
            o,
            "{}default: goto {}{};",
            indstr, opts.label_prefix, start_label
        )
        .unwrap();
    }
    for i in 0..fill_index {
        writeln!(o, "{}case {}: goto {}{};", indstr, i, opts.fill_label, i).unwrap();
    }
    writeln!(o, "{}}}", indstr).unwrap();
    if opts.state_next {
        writeln!(o, "{}:", opts.next_label).unwrap();
    }
}

fn output_yyaccept_init(o: &mut String, ind: u32, used_yyaccept: bool, opts: &Opts) {
    if used_yyaccept {
        writeln!(
            o,
            "{}unsigned int {} = 0;",
            opts.indent(ind),
            opts.yyaccept
        )
        .unwrap();
    }
}

fn output_yymaxfill(o: &mut String, max_fill: usize) {
    writeln!(o, "#define YYMAXFILL {}", max_fill).unwrap();
}

fn output_line_info(o: &mut String, line_number: u32, file_name: &str, opts: &Opts) {
    if !opts.suppress_line_info {
        writeln!(o, "#line {} \"{}\"", line_number, file_name).unwrap();
    }
}

fn output_types(o: &mut String, mut ind: u32, types: &[String], opts: &Opts) {
    writeln!(o, "{}enum {} {{", opts.indent(ind), opts.cond_type).unwrap();
    ind += 1;
    for t in types {
        writeln!(o, "{}{}{},", opts.indent(ind), opts.cond_enum_prefix, t).unwrap();
    }
    ind -= 1;
    writeln!(o, "{}}};", opts.indent(ind)).unwrap();
}

fn output_version_time(o: &mut String, opts: &Opts) {
    o.push_str("/* Generated by relex");
    if !opts.version.is_empty() {
        write!(o, " {}", opts.version).unwrap();
    }
    if !opts.no_generation_date {
        let now = chrono::Local::now();
        write!(o, " on {}", now.format("%a %b %e %H:%M:%S %Y")).unwrap();
    }
    o.push_str(" */\n");
}

fn output_get_state(opts: &Opts) -> String {
    if opts.state_get_naked {
        opts.state_get.clone()
    } else {
        format!("{}()", opts.state_get)
    }
}
