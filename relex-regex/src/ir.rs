use crate::range::RangeSet;

/// Regex intermediate representation. Symbols are sets of *code units*:
/// character classes have already been expanded through the encoding, so a
/// multi-byte code point appears as a `Seq` of single-unit `Sym`s.
/// Immutable after construction; consumed top-down by the NFA builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regex {
    Sym(RangeSet),
    Seq(Vec<Regex>),
    Alt(Vec<Regex>),
    Iter {
        body: Box<Regex>,
        min: u32,
        max: Option<u32>,
    },
    /// Sub-match capture marker; matches the empty string.
    Tag(String),
}

impl Regex {
    /// An expression that never matches anything (the empty symbol set).
    pub fn nothing() -> Regex {
        Regex::Sym(RangeSet::new())
    }

    pub fn seq(mut elements: Vec<Regex>) -> Regex {
        if elements.len() == 1 {
            elements.remove(0)
        } else {
            Regex::Seq(elements)
        }
    }

    pub fn alt(mut elements: Vec<Regex>) -> Regex {
        if elements.len() == 1 {
            elements.remove(0)
        } else {
            Regex::Alt(elements)
        }
    }

    /// Collects every tag name in the expression, in syntactic order.
    pub fn tags(&self, out: &mut Vec<String>) {
        match self {
            Regex::Sym(_) => {}
            Regex::Seq(elements) | Regex::Alt(elements) => {
                for e in elements {
                    e.tags(out);
                }
            }
            Regex::Iter { body, .. } => body.tags(out),
            Regex::Tag(name) => out.push(name.clone()),
        }
    }
}
