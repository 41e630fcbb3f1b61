use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use relex::{
    generate, BootstrapSpecParser, EncType, Opts, Policy, Warn, WarningKind,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Lexer generator: compiles rule specifications into C matchers", long_about = None)]
struct CommandLine {
    #[arg(required = true)]
    input: String,

    #[arg(short = 'o', long = "output", help = "Output file (default stdout)")]
    output: Option<String>,

    #[arg(short = 't', long = "type-header", help = "Emit the condition enum into a separate header file")]
    type_header: Option<String>,

    #[arg(short = 'e', help = "EBCDIC input encoding")]
    ebcdic: bool,
    #[arg(short = 'x', help = "UTF-16 input encoding")]
    utf16: bool,
    #[arg(short = '8', help = "UTF-8 input encoding")]
    utf8: bool,
    #[arg(short = 'w', help = "UCS-2 input encoding")]
    ucs2: bool,
    #[arg(short = 'u', help = "UTF-32 input encoding")]
    utf32: bool,

    #[arg(long = "encoding-policy", value_parser = ["ignore", "substitute", "fail"], help = "What to do with invalid code points")]
    encoding_policy: Option<String>,

    #[arg(short = 's', help = "Nested ifs instead of switches where beneficial")]
    nested_ifs: bool,
    #[arg(short = 'b', help = "Prefer table dispatch")]
    bit_vectors: bool,
    #[arg(short = 'g', help = "Computed-goto jump tables")]
    computed_gotos: bool,
    #[arg(short = 'f', help = "Storable state: emit the state switch and YYGETSTATE/YYSETSTATE calls")]
    storable_state: bool,

    #[arg(short = 'i', help = "Do not output #line directives")]
    no_line_info: bool,
    #[arg(long = "no-generation-date", help = "Omit the date from the header comment")]
    no_generation_date: bool,

    #[arg(short = 'W', help = "Turn on all warnings")]
    warnings: bool,
    #[arg(long = "Werror", value_name = "WARNING", help = "Promote a warning to an error (e.g. condition-order)")]
    werror: Vec<String>,
}

fn build_opts(cli: &CommandLine) -> Result<Opts, String> {
    let mut opts = Opts {
        output_file: cli.output.as_ref().map(PathBuf::from),
        header_file: cli.type_header.as_ref().map(PathBuf::from),
        storable_state: cli.storable_state,
        nested_ifs: cli.nested_ifs,
        bit_vectors: cli.bit_vectors,
        computed_gotos: cli.computed_gotos,
        suppress_line_info: cli.no_line_info,
        no_generation_date: cli.no_generation_date,
        ..Opts::default()
    };

    let encodings = [
        (cli.ebcdic, EncType::Ebcdic),
        (cli.utf16, EncType::Utf16),
        (cli.utf8, EncType::Utf8),
        (cli.ucs2, EncType::Ucs2),
        (cli.utf32, EncType::Utf32),
    ];
    for (selected, ty) in encodings {
        if selected && !opts.enc.set(ty) {
            return Err("only one input encoding may be selected".to_string());
        }
    }
    match cli.encoding_policy.as_deref() {
        Some("substitute") => opts.enc.set_policy(Policy::Substitute),
        Some("fail") => opts.enc.set_policy(Policy::Fail),
        Some("ignore") | None => opts.enc.set_policy(Policy::Ignore),
        Some(other) => return Err(format!("unknown encoding policy: {}", other)),
    }
    Ok(opts)
}

fn build_warn(cli: &CommandLine) -> Result<Warn, String> {
    let mut warn = Warn::new();
    if cli.warnings {
        warn.enable_all();
    }
    for name in &cli.werror {
        match WarningKind::from_name(name) {
            Some(kind) => warn.promote(kind),
            None => return Err(format!("unknown warning: {}", name)),
        }
    }
    Ok(warn)
}

fn main() -> ExitCode {
    let cli = CommandLine::parse();
    let (opts, mut warn) = match build_opts(&cli).and_then(|o| Ok((o, build_warn(&cli)?))) {
        Ok(v) => v,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::FAILURE;
        }
    };

    let result = generate(
        Path::new(&cli.input),
        opts,
        &mut warn,
        &BootstrapSpecParser,
    );

    for warning in warn.entries() {
        eprintln!("{}", warning);
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(errors) => {
            for (i, error) in errors.iter().enumerate() {
                eprintln!("{}", error);
                if i + 1 < errors.len() {
                    eprintln!();
                }
            }
            ExitCode::FAILURE
        }
    }
}
