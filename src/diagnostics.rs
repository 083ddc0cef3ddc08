//! Non-fatal conversion events reported back to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A dynamic-data tag with no equivalent expression.
    UnconvertibleTag,
    /// A node type the dispatcher has no converter for.
    UnsupportedElement,
    /// A loop query type that cannot become an Etch loop.
    UnsupportedLoop,
    /// A display condition that cannot be expressed in Etch.
    UnsupportedCondition,
    /// Custom code that cannot run in the target (e.g. PHP).
    UnsupportedCode,
    /// A component instance with no migrated component to reference.
    MissingComponent,
    /// A source node skipped because required fields are missing.
    MalformedNode,
    /// A style class skipped because its record is unusable.
    MalformedClass,
    /// CSS that failed the syntax sanity check.
    InvalidCss,
    /// A document that produced no blocks.
    EmptyDocument,
    /// A style pass that produced no registry entries.
    EmptyStyleRegistry,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::UnconvertibleTag => "unconvertible tag",
            DiagnosticKind::UnsupportedElement => "unsupported element",
            DiagnosticKind::UnsupportedLoop => "unsupported loop",
            DiagnosticKind::UnsupportedCondition => "unsupported condition",
            DiagnosticKind::UnsupportedCode => "unsupported code",
            DiagnosticKind::MissingComponent => "missing component",
            DiagnosticKind::MalformedNode => "malformed node",
            DiagnosticKind::MalformedClass => "malformed class",
            DiagnosticKind::InvalidCss => "invalid css",
            DiagnosticKind::EmptyDocument => "empty document",
            DiagnosticKind::EmptyStyleRegistry => "empty style registry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.element_id {
            Some(id) => write!(f, "{} ({}): {}", self.kind, id, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Ordered sink of diagnostics. Every pushed event is also logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic {
            kind,
            message: message.into(),
            element_id: None,
        });
    }

    pub fn report_for(
        &mut self,
        kind: DiagnosticKind,
        element_id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            kind,
            message: message.into(),
            element_id: Some(element_id.into()),
        });
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
        self.events.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.events.extend(other.events);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter().filter(move |d| d.kind == kind)
    }

    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.events.iter().any(|d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.events
    }
}
