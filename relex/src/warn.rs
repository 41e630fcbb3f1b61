use std::collections::BTreeSet;
use std::fmt::{self, Display};

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningKind {
    CondOrder,
    UndefinedControlFlow,
}

impl WarningKind {
    pub fn name(&self) -> &'static str {
        match self {
            WarningKind::CondOrder => "condition-order",
            WarningKind::UndefinedControlFlow => "undefined-control-flow",
        }
    }

    pub fn from_name(name: &str) -> Option<WarningKind> {
        match name {
            "condition-order" => Some(WarningKind::CondOrder),
            "undefined-control-flow" => Some(WarningKind::UndefinedControlFlow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub line: u32,
    pub message: String,
    pub is_error: bool,
}

impl Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.is_error {
            format!("{}", "error".bright_red().bold())
        } else {
            format!("{}", "warning".yellow().bold())
        };
        write!(
            f,
            "{}: line {}: {} [-W{}]",
            severity,
            self.line,
            self.message,
            self.kind.name()
        )
    }
}

/// Diagnostic sink. Warnings are off by default, enabled wholesale with
/// `-W`; any kind can be promoted to an error with `-Werror-<name>`, which
/// makes the final emit fail.
#[derive(Debug, Default)]
pub struct Warn {
    enabled: bool,
    promoted: BTreeSet<WarningKind>,
    entries: Vec<Warning>,
    error: bool,
}

impl Warn {
    pub fn new() -> Self {
        Warn::default()
    }

    pub fn enable_all(&mut self) {
        self.enabled = true;
    }

    pub fn promote(&mut self, kind: WarningKind) {
        self.promoted.insert(kind);
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    pub fn condition_order(&mut self, line: u32) {
        self.report(
            WarningKind::CondOrder,
            line,
            "implicit condition enum order depends on block order".to_string(),
        );
    }

    pub fn undefined_control_flow(&mut self, line: u32, condition: Option<&str>) {
        let message = match condition {
            Some(name) => format!(
                "control flow is undefined for some input in condition '{}', use default rule '*'",
                name
            ),
            None => "control flow is undefined for some input, use default rule '*'".to_string(),
        };
        self.report(WarningKind::UndefinedControlFlow, line, message);
    }

    fn report(&mut self, kind: WarningKind, line: u32, message: String) {
        let is_error = self.promoted.contains(&kind);
        if is_error {
            self.error = true;
        }
        if is_error || self.enabled {
            self.entries.push(Warning {
                kind,
                line,
                message,
                is_error,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_by_default() {
        let mut warn = Warn::new();
        warn.condition_order(4);
        assert!(warn.entries().is_empty());
        assert!(!warn.error());
    }

    #[test]
    fn enabled_warnings_are_recorded() {
        let mut warn = Warn::new();
        warn.enable_all();
        warn.undefined_control_flow(7, Some("c1"));
        assert_eq!(warn.entries().len(), 1);
        assert_eq!(warn.entries()[0].line, 7);
        assert!(!warn.error());
    }

    #[test]
    fn promotion_makes_it_an_error_even_without_w() {
        let mut warn = Warn::new();
        warn.promote(WarningKind::CondOrder);
        warn.condition_order(2);
        assert!(warn.error());
        assert!(warn.entries()[0].is_error);
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [WarningKind::CondOrder, WarningKind::UndefinedControlFlow] {
            assert_eq!(WarningKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(WarningKind::from_name("bogus"), None);
    }
}
