use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use relex_c_codegen::CLexerCodeGen;
use relex_codegen::{emit_header, ConfTags, OutputFile};
use relex_input::{Directive, Segment, SpecParser};
use relex_lexer::{compile_block, undefined_control_flow, LexerCodeGen};

mod errors;
mod warn;

pub use errors::{RelexError, Severity};
pub use relex_codegen::Opts;
pub use relex_input::BootstrapSpecParser;
pub use relex_regex::{EncType, Policy};
pub use warn::{Warn, Warning, WarningKind};

/// The generated text, before it touches the filesystem. Buffering the whole
/// output keeps the write atomic: a promoted warning fails the run without
/// leaving a partial file behind.
pub struct Output {
    pub source: String,
    pub header: Option<String>,
}

/// Runs the full pipeline on already-read spec text.
pub fn compile(
    input_name: &Path,
    contents: &str,
    mut opts: Opts,
    warn: &mut Warn,
    parser: &dyn SpecParser,
) -> Result<Output, Vec<RelexError>> {
    opts.input_file = input_name.display().to_string();
    let source = parser
        .parse_spec(contents)
        .map_err(|e| vec![RelexError::parse(input_name, e.line, e.message)])?;

    let mut out = OutputFile::new(opts.clone());
    let codegen = CLexerCodeGen::new();
    let mut errors: Vec<RelexError> = Vec::new();
    let mut max_fill = 1usize;

    out.wversion_time();
    for segment in &source.segments {
        match segment {
            Segment::Verbatim { text, line } => {
                let input_file = opts.input_file.clone();
                out.wline_info(*line, &input_file);
                out.ws(text);
            }
            Segment::Rules { rules, line } => {
                out.new_block(*line);
                match compile_block(rules, &opts.enc, *line) {
                    Ok(block) => {
                        for cond in &block.conditions {
                            for state in &cond.dfa.states {
                                if let Some(fill) = &state.fill {
                                    max_fill = max_fill.max(fill.need);
                                }
                            }
                            if undefined_control_flow(&cond.dfa) {
                                warn.undefined_control_flow(*line, cond.name.as_deref());
                            }
                        }
                        codegen.generate_block(&block, &mut out);
                    }
                    Err(errs) => errors.extend(RelexError::compile(input_name, errs)),
                }
            }
            Segment::Directive { directive, .. } => match directive {
                Directive::MaxFill => {
                    out.wdelay_yymaxfill();
                }
                Directive::Types => {
                    out.wdelay_types();
                }
                Directive::Tags(conf) => {
                    out.wdelay_tags(ConfTags {
                        format: conf.format.clone(),
                        separator: conf.separator.clone(),
                    });
                }
            },
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let (types, tags) = out.global_lists();
    let output_name = opts
        .output_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdout>".to_string());

    let mut source_buf = Vec::new();
    let cond_order_lines = out
        .emit(&output_name, &types, &tags, max_fill, &mut source_buf)
        .map_err(|e| RelexError::io(PathBuf::from(&output_name), e))?;
    for line in cond_order_lines {
        warn.condition_order(line);
    }

    let header = match &opts.header_file {
        Some(path) => {
            let mut buf = Vec::new();
            let name = path.display().to_string();
            emit_header(&opts, &name, &types, &mut buf)
                .map_err(|e| RelexError::io(path.clone(), e))?;
            Some(String::from_utf8(buf).unwrap())
        }
        None => None,
    };

    if warn.error() {
        return Err(warn
            .entries()
            .iter()
            .filter(|w| w.is_error)
            .map(|w| RelexError::promoted_warning(input_name, w.line, w.message.clone()))
            .collect());
    }

    Ok(Output {
        source: String::from_utf8(source_buf).unwrap(),
        header,
    })
}

/// Reads the input file, compiles it, and writes the output (and header,
/// when requested) only after the whole run succeeded.
pub fn generate(
    input_path: &Path,
    opts: Opts,
    warn: &mut Warn,
    parser: &dyn SpecParser,
) -> Result<(), Vec<RelexError>> {
    let contents = fs::read_to_string(input_path)
        .map_err(|e| RelexError::io(input_path.to_path_buf(), e))?;
    let output = compile(input_path, &contents, opts.clone(), warn, parser)?;

    match &opts.output_file {
        Some(path) => {
            fs::write(path, &output.source).map_err(|e| RelexError::io(path.clone(), e))?
        }
        None => std::io::stdout()
            .write_all(output.source.as_bytes())
            .map_err(|e| RelexError::io(PathBuf::from("<stdout>"), e))?,
    }
    if let (Some(path), Some(header)) = (&opts.header_file, &output.header) {
        fs::write(path, header).map_err(|e| RelexError::io(path.clone(), e))?;
    }
    Ok(())
}
