use std::path::PathBuf;

use relex_regex::Enc;

mod output;
mod print;
mod templating;

pub use output::{emit_header, ConfTags, Fragment, OutputBlock, OutputFile};
pub use print::{prt_ch_or_hex, prt_hex};
pub use templating::Template;

/// Code-generation options, threaded by reference through the emitters.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Name the action `#line` directives point back into.
    pub input_file: String,
    pub output_file: Option<PathBuf>,
    pub header_file: Option<PathBuf>,
    /// `-f`: storable state via `YYGETSTATE`/`YYSETSTATE`.
    pub storable_state: bool,
    /// `-s`: nested `if`s instead of `switch` for linear dispatch.
    pub nested_ifs: bool,
    /// `-b`: prefer table dispatch.
    pub bit_vectors: bool,
    /// `-g`: computed-goto jump tables.
    pub computed_gotos: bool,
    /// `-i`: no `#line` directives.
    pub suppress_line_info: bool,
    pub no_generation_date: bool,
    pub enc: Enc,
    pub indent_string: String,
    pub label_prefix: String,
    pub cond_label_prefix: String,
    pub cond_enum_prefix: String,
    pub cond_type: String,
    pub cond_get: String,
    pub cond_get_naked: bool,
    pub yych: String,
    pub yyaccept: String,
    pub fill_label: String,
    pub next_label: String,
    pub state_get: String,
    pub state_get_naked: bool,
    pub state_set: String,
    pub state_abort: bool,
    pub state_next: bool,
    pub user_start_label: Option<String>,
    pub version: String,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            input_file: "<stdin>".to_string(),
            output_file: None,
            header_file: None,
            storable_state: false,
            nested_ifs: false,
            bit_vectors: false,
            computed_gotos: false,
            suppress_line_info: false,
            no_generation_date: false,
            enc: Enc::default(),
            indent_string: "\t".to_string(),
            label_prefix: "yy".to_string(),
            cond_label_prefix: "yyc_".to_string(),
            cond_enum_prefix: "yyc".to_string(),
            cond_type: "YYCONDTYPE".to_string(),
            cond_get: "YYGETCONDITION".to_string(),
            cond_get_naked: false,
            yych: "yych".to_string(),
            yyaccept: "yyaccept".to_string(),
            fill_label: "yyFillLabel".to_string(),
            next_label: "yyNext".to_string(),
            state_get: "YYGETSTATE".to_string(),
            state_get_naked: false,
            state_set: "YYSETSTATE".to_string(),
            state_abort: false,
            state_next: true,
            user_start_label: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Opts {
    pub fn indent(&self, ind: u32) -> String {
        self.indent_string.repeat(ind as usize)
    }
}
