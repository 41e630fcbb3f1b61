use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new("@@").unwrap());

/// A text template with `@@` placeholders, as used by the tag-declaration
/// format strings.
pub struct Template<'src> {
    source: &'src str,
}

impl<'src> Template<'src> {
    pub fn new(source: &'src str) -> Self {
        Template { source }
    }

    /// Streams the template into `out`, substituting every placeholder.
    pub fn expand(&self, value: &str, out: &mut String) {
        let mut last_match = 0;
        for m in PLACEHOLDER.find_iter(self.source) {
            out.push_str(&self.source[last_match..m.start()]);
            out.push_str(value);
            last_match = m.end();
        }
        out.push_str(&self.source[last_match..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_every_placeholder() {
        let t = Template::new("const YYCTYPE *@@, *@@_end;");
        let mut out = String::new();
        t.expand("tok", &mut out);
        assert_eq!(out, "const YYCTYPE *tok, *tok_end;");
    }

    #[test]
    fn no_placeholder_is_a_copy() {
        let t = Template::new("nothing here");
        let mut out = String::new();
        t.expand("x", &mut out);
        assert_eq!(out, "nothing here");
    }
}
