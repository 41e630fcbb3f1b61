use nom::{
    branch::alt,
    bytes::complete::{take_while1, take_while_m_n},
    character::complete::{anychar, char, digit1, multispace0},
    combinator::{map, opt, peek},
    multi::{many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use crate::{
    Characters, Directive, Pattern, RuleDef, RulePattern, Segment, Source, SpecParseError,
    SpecParser, TagsConf,
};

const BLOCK_OPEN: &str = "/*!relex";
const MAX_OPEN: &str = "/*!max:relex*/";
const TYPES_OPEN: &str = "/*!types:relex*/";
const TAGS_OPEN: &str = "/*!tags:relex";
const CLOSE: &str = "*/";

/// Minimal spec parser for the embedded `/*!relex ... */` syntax.
pub struct BootstrapSpecParser;

impl SpecParser for BootstrapSpecParser {
    fn parse_spec(&self, input: &str) -> Result<Source, SpecParseError> {
        parse_source(input)
    }
}

fn line_of(input: &str, offset: usize) -> u32 {
    input[..offset].matches('\n').count() as u32 + 1
}

fn parse_source(input: &str) -> Result<Source, SpecParseError> {
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut verbatim_start = 0;

    while let Some(found) = input[pos..].find("/*!") {
        let at = pos + found;
        let rest = &input[at..];
        let line = line_of(input, at);

        let (directive, skip) = if rest.starts_with(MAX_OPEN) {
            (Some(Directive::MaxFill), MAX_OPEN.len())
        } else if rest.starts_with(TYPES_OPEN) {
            (Some(Directive::Types), TYPES_OPEN.len())
        } else if rest.starts_with(TAGS_OPEN) {
            let body_start = at + TAGS_OPEN.len();
            let close = input[body_start..].find(CLOSE).ok_or(SpecParseError {
                line,
                message: "unterminated tags directive".to_string(),
            })?;
            let conf = parse_tags_conf(&input[body_start..body_start + close])
                .map_err(|message| SpecParseError { line, message })?;
            (
                Some(Directive::Tags(conf)),
                TAGS_OPEN.len() + close + CLOSE.len(),
            )
        } else {
            (None, 0)
        };

        if let Some(directive) = directive {
            push_verbatim(input, &mut segments, verbatim_start, at);
            segments.push(Segment::Directive { directive, line });
            pos = at + skip;
            verbatim_start = pos;
            continue;
        }

        let is_block = rest.starts_with(BLOCK_OPEN)
            && rest[BLOCK_OPEN.len()..]
                .chars()
                .next()
                .map_or(false, |c| c.is_whitespace());
        if !is_block {
            pos = at + 3;
            continue;
        }

        push_verbatim(input, &mut segments, verbatim_start, at);
        let body_start = at + BLOCK_OPEN.len();
        let close = input[body_start..].find(CLOSE).ok_or(SpecParseError {
            line,
            message: "unterminated rule block".to_string(),
        })?;
        let body = &input[body_start..body_start + close];
        let rules = parse_rules(body, line_of(input, body_start))?;
        segments.push(Segment::Rules { rules, line });
        pos = body_start + close + CLOSE.len();
        verbatim_start = pos;
    }

    push_verbatim(input, &mut segments, verbatim_start, input.len());
    Ok(Source { segments })
}

fn push_verbatim(input: &str, segments: &mut Vec<Segment>, start: usize, end: usize) {
    if start < end {
        segments.push(Segment::Verbatim {
            text: input[start..end].to_string(),
            line: line_of(input, start),
        });
    }
}

fn parse_rules(body: &str, base_line: u32) -> Result<Vec<RuleDef>, SpecParseError> {
    let mut rules = Vec::new();
    let mut rest = body.trim_start();
    while !rest.is_empty() {
        let offset = body.len() - rest.len();
        let line = base_line + body[..offset].matches('\n').count() as u32;
        let err = |message: &str| SpecParseError {
            line,
            message: message.to_string(),
        };

        let (after, (condition, pattern)) =
            parse_rule_head(rest).map_err(|_| err("cannot parse rule"))?;
        let after = after.trim_start();
        let (after, action) = parse_action(after).map_err(|_| err("cannot parse rule action"))?;
        rules.push(RuleDef {
            condition,
            pattern,
            action: action.trim().to_string(),
            line,
        });
        rest = after.trim_start();
    }
    Ok(rules)
}

fn parse_rule_head(input: &str) -> IResult<&str, (Option<String>, RulePattern)> {
    let (input, condition) = opt(terminated(parse_condition, multispace0))(input)?;
    let (input, pattern) = parse_rule_pattern(input)?;
    Ok((input, (condition, pattern)))
}

fn parse_condition(input: &str) -> IResult<&str, String> {
    let (input, name) = delimited(
        char('<'),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        char('>'),
    )(input)?;
    Ok((input, name.to_string()))
}

fn parse_rule_pattern(input: &str) -> IResult<&str, RulePattern> {
    alt((
        // a bare `*` followed by the action is the default rule
        map(
            terminated(char('*'), peek(pair(multispace0, char('{')))),
            |_| RulePattern::Default,
        ),
        map(
            terminated(parse_string_chars, peek(pair(multispace0, char('{')))),
            |characters| RulePattern::Literal { characters },
        ),
        map(parse_alternative, |pattern| RulePattern::Pattern {
            pattern,
        }),
    ))(input)
}

fn parse_alternative(input: &str) -> IResult<&str, Pattern> {
    let (input, mut seqs) = separated_list1(char('|'), parse_sequence)(input)?;
    if seqs.len() == 1 {
        Ok((input, seqs.remove(0)))
    } else {
        Ok((input, Pattern::Alternative { elements: seqs }))
    }
}

fn parse_sequence(input: &str) -> IResult<&str, Pattern> {
    let (input, mut elements) = many1(parse_postfix)(input)?;
    if elements.len() == 1 {
        Ok((input, elements.remove(0)))
    } else {
        Ok((input, Pattern::Sequence { elements }))
    }
}

fn parse_postfix(input: &str) -> IResult<&str, Pattern> {
    let (mut input, mut pattern) = parse_atom(input)?;
    loop {
        let (rest, rep) = opt(alt((
            map(char('*'), |_| (0, None)),
            map(char('+'), |_| (1, None)),
            map(char('?'), |_| (0, Some(1))),
            parse_braced_repetition,
        )))(input)?;
        match rep {
            Some((min, max)) => {
                pattern = Pattern::Repetition {
                    min,
                    max,
                    inner: Box::new(pattern),
                };
                input = rest;
            }
            None => return Ok((input, pattern)),
        }
    }
}

fn parse_braced_repetition(input: &str) -> IResult<&str, (u32, Option<u32>)> {
    let (input, _) = char('{')(input)?;
    let (input, min) = parse_number(input)?;
    let (input, comma) = opt(char(','))(input)?;
    let (input, max) = if comma.is_some() {
        opt(parse_number)(input)?
    } else {
        (input, Some(min))
    };
    let (input, _) = char('}')(input)?;
    Ok((input, (min, max)))
}

fn parse_number(input: &str) -> IResult<&str, u32> {
    let (input, digits) = digit1(input)?;
    match digits.parse() {
        Ok(n) => Ok((input, n)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn parse_atom(input: &str) -> IResult<&str, Pattern> {
    alt((
        delimited(char('('), parse_alternative, char(')')),
        parse_char_set,
        map(char('.'), |_| Pattern::Any),
        map(
            preceded(
                char('@'),
                take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            ),
            |name: &str| Pattern::Tag {
                name: name.to_string(),
            },
        ),
        map(parse_string_chars, |chars| Pattern::from_chars(&chars)),
        map(parse_plain_char, |ch| Pattern::Char {
            chars: Characters::Single(ch),
        }),
    ))(input)
}

fn parse_char_set(input: &str) -> IResult<&str, Pattern> {
    let (input, _) = char('[')(input)?;
    let (input, negation) = opt(char('^'))(input)?;
    let (input, chars) = many1(parse_char_or_range)(input)?;
    let (input, _) = char(']')(input)?;
    Ok((
        input,
        Pattern::CharSet {
            chars,
            negated: negation.is_some(),
        },
    ))
}

fn parse_char_or_range(input: &str) -> IResult<&str, Characters> {
    let (input, c1) = parse_class_char(input)?;
    let (input, dash) = opt(char('-'))(input)?;
    if dash.is_some() {
        let (input, c2) = parse_class_char(input)?;
        Ok((input, Characters::Range(c1, c2)))
    } else {
        Ok((input, Characters::Single(c1)))
    }
}

fn parse_class_char(input: &str) -> IResult<&str, char> {
    alt((
        parse_escaped_char,
        take_one(|c| c != ']' && c != '\\' && c != '-' && c != '\n'),
    ))(input)
}

fn parse_string_chars(input: &str) -> IResult<&str, Vec<char>> {
    let (input, _) = char('"')(input)?;
    let mut chars = Vec::new();
    let mut rest = input;
    loop {
        if let Ok((r, _)) = char::<_, nom::error::Error<&str>>('"')(rest) {
            return Ok((r, chars));
        }
        let (r, c) = alt((parse_escaped_char, take_one(|c| c != '"' && c != '\n')))(rest)?;
        chars.push(c);
        rest = r;
    }
}

fn parse_plain_char(input: &str) -> IResult<&str, char> {
    alt((
        parse_escaped_char,
        take_one(|c| {
            !c.is_whitespace() && !"()[]{}*+?|\"@.<>\\/".contains(c)
        }),
    ))(input)
}

fn parse_escaped_char(input: &str) -> IResult<&str, char> {
    let (input, _) = char('\\')(input)?;
    let (input, c) = anychar(input)?;
    match c {
        'n' => Ok((input, '\n')),
        'r' => Ok((input, '\r')),
        't' => Ok((input, '\t')),
        '0' => Ok((input, '\0')),
        'x' | 'u' => {
            let (input, code) = delimited(
                char('{'),
                take_while_m_n(1, 6, |c: char| c.is_ascii_hexdigit()),
                char('}'),
            )(input)?;
            u32::from_str_radix(code, 16)
                .ok()
                .and_then(char::from_u32)
                .map(|ch| (input, ch))
                .ok_or_else(|| {
                    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char))
                })
        }
        _ if c.is_ascii_punctuation() => Ok((input, c)),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        ))),
    }
}

fn take_one(pred: impl Fn(char) -> bool) -> impl Fn(&str) -> IResult<&str, char> {
    move |input: &str| {
        let (input, s) = take_while_m_n(1, 1, &pred)(input)?;
        Ok((input, s.chars().next().unwrap()))
    }
}

// Actions are brace-balanced verbatim C code; strings inside are not
// interpreted, which is good enough for the bootstrap syntax.
fn parse_action(input: &str) -> IResult<&str, &str> {
    if !input.starts_with('{') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    }
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], &input[1..i]));
                }
            }
            _ => {}
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::TakeUntil,
    )))
}

fn parse_tags_conf(body: &str) -> Result<TagsConf, String> {
    let mut format = None;
    let mut separator = None;
    let mut rest = body.trim_start();
    while !rest.is_empty() {
        let (after, (key, value)) =
            parse_conf_entry(rest).map_err(|_| "cannot parse tags directive".to_string())?;
        match key {
            "format" => format = Some(value),
            "separator" => separator = Some(value),
            _ => return Err(format!("unknown tags key: {}", key)),
        }
        rest = after.trim_start();
    }
    Ok(TagsConf {
        format: format.ok_or("tags directive is missing 'format'")?,
        separator: separator.unwrap_or_default(),
    })
}

fn parse_conf_entry(input: &str) -> IResult<&str, (&str, String)> {
    let (input, key) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)?;
    let (input, _) = delimited(multispace0, char('='), multispace0)(input)?;
    let (input, value) = parse_string_chars(input)?;
    let (input, _) = preceded(multispace0, char(';'))(input)?;
    Ok((input, (key, value.into_iter().collect())))
}

#[cfg(test)]
mod tests;
