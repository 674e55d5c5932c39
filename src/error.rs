//! Error types for snapshot loading and stylesheet access.

use core::fmt;

/// Processing phase where an error originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Reading document or stylesheet bytes.
    Load,
    /// Tokenizing markup.
    Parse,
    /// Stylesheet parsing and computed-style resolution.
    Style,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Parse => "parse",
            Self::Style => "style",
        };
        f.write_str(name)
    }
}

/// Typed actual-vs-limit context for limit breaches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorLimitContext {
    /// Limit name, e.g. `max_html_bytes`.
    pub kind: &'static str,
    /// Observed value.
    pub actual: usize,
    /// Configured limit.
    pub limit: usize,
}

impl ErrorLimitContext {
    /// Create a limit context.
    pub fn new(kind: &'static str, actual: usize, limit: usize) -> Self {
        Self {
            kind,
            actual,
            limit,
        }
    }
}

/// Structured error for document snapshot loading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanError {
    /// Processing phase where this error originated.
    pub phase: ErrorPhase,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional file path context.
    pub path: Option<Box<str>>,
    /// Optional tokenizer offset in bytes.
    pub token_offset: Option<usize>,
    /// Optional typed actual-vs-limit context.
    pub limit: Option<Box<ErrorLimitContext>>,
}

impl ScanError {
    pub(crate) fn new(phase: ErrorPhase, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            phase,
            code,
            message: message.into().into_boxed_str(),
            path: None,
            token_offset: None,
            limit: None,
        }
    }

    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into().into_boxed_str());
        self
    }

    pub(crate) fn with_token_offset(mut self, offset: usize) -> Self {
        self.token_offset = Some(offset);
        self
    }

    pub(crate) fn with_limit(mut self, kind: &'static str, actual: usize, limit: usize) -> Self {
        self.limit = Some(Box::new(ErrorLimitContext::new(kind, actual, limit)));
        self
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.phase, self.code, self.message)?;
        if let Some(path) = self.path.as_deref() {
            write!(f, " [path={}]", path)?;
        }
        if let Some(offset) = self.token_offset {
            write!(f, " [token_offset={}]", offset)?;
        }
        if let Some(limit) = self.limit.as_deref() {
            write!(
                f,
                " [limit_kind={} actual={} limit={}]",
                limit.kind, limit.actual, limit.limit
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ScanError {}

/// Why a stylesheet's rule list could not be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessDeniedReason {
    /// Stylesheet lives on another origin than the document.
    CrossOrigin,
    /// Stylesheet bytes could not be read or decoded.
    Unreadable(String),
    /// Stylesheet exceeds the configured byte budget.
    TooLarge {
        /// Stylesheet size in bytes.
        actual: usize,
        /// Configured `max_css_bytes`.
        limit: usize,
    },
}

impl fmt::Display for AccessDeniedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrossOrigin => f.write_str("cross-origin stylesheet"),
            Self::Unreadable(msg) => write!(f, "unreadable: {}", msg),
            Self::TooLarge { actual, limit } => {
                write!(f, "exceeds max_css_bytes ({} > {})", actual, limit)
            }
        }
    }
}

/// Reading a stylesheet's rule list failed.
///
/// Never fatal: the collector logs it, records it in the report and moves on
/// to the next stylesheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StylesheetAccessDenied {
    /// Stylesheet location, `None` for inline sheets.
    pub href: Option<String>,
    /// Failure reason.
    pub reason: AccessDeniedReason,
}

impl StylesheetAccessDenied {
    /// Create an access failure for a stylesheet location.
    pub fn new(href: Option<String>, reason: AccessDeniedReason) -> Self {
        Self { href, reason }
    }
}

impl fmt::Display for StylesheetAccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not access stylesheet {}: {}",
            self.href.as_deref().unwrap_or("<inline>"),
            self.reason
        )
    }
}

impl std::error::Error for StylesheetAccessDenied {}
