use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Identifier of a monitoring backend implementation. Used to pick the
/// scope rewrite function that matches the backend's expression syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Prometheus,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Prometheus => "prometheus",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("no scope rewrite function registered for backend kind {0}")]
    UnknownBackend(BackendKind),

    #[error("scope {0:?} is not a valid label value")]
    InvalidScope(String),

    #[error("cannot scope expression {expr:?}: {reason}")]
    Unsupported { expr: String, reason: &'static str },
}

pub type ScopeRewriteFn = fn(expr: &str, scope: &str) -> Result<String, RewriteError>;

/// Backend-kind → rewrite-function table. Built once at startup and passed
/// by reference into the query façade; there is no process-global
/// registration. Exactly one function per supported backend kind.
pub struct ScopeRewriters {
    fns: HashMap<BackendKind, ScopeRewriteFn>,
}

impl ScopeRewriters {
    pub fn empty() -> Self {
        Self { fns: HashMap::new() }
    }

    /// Table covering every backend kind this build ships.
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        table.register(BackendKind::Prometheus, rewrite_prometheus);
        table
    }

    pub fn register(&mut self, kind: BackendKind, f: ScopeRewriteFn) {
        self.fns.insert(kind, f);
    }

    /// Rewrite `expr` so evaluation is restricted to `scope`.
    ///
    /// Callers must handle the empty-scope bypass themselves; an empty scope
    /// is not an error, it just means no rewriting is wanted.
    pub fn rewrite(&self, kind: BackendKind, expr: &str, scope: &str) -> Result<String, RewriteError> {
        let f = self.fns.get(&kind).ok_or(RewriteError::UnknownBackend(kind))?;
        f(expr, scope)
    }
}

/// Prometheus scope enforcement: inject a `namespace="<scope>"` matcher.
///
/// Handles plain vector selectors only (`metric` or `metric{matchers}`);
/// an existing namespace matcher is replaced. Anything more elaborate
/// (functions, operators, subqueries) is refused rather than rewritten
/// wrongly.
pub fn rewrite_prometheus(expr: &str, scope: &str) -> Result<String, RewriteError> {
    if scope.contains('"') || scope.contains('\\') {
        return Err(RewriteError::InvalidScope(scope.to_string()));
    }

    let expr = expr.trim();
    let (name, matchers) = match expr.find('{') {
        None => (expr, None),
        Some(open) => {
            if !expr.ends_with('}') {
                return Err(RewriteError::Unsupported {
                    expr: expr.to_string(),
                    reason: "unbalanced label matcher braces",
                });
            }
            (&expr[..open], Some(&expr[open + 1..expr.len() - 1]))
        }
    };

    if !is_metric_name(name) {
        return Err(RewriteError::Unsupported {
            expr: expr.to_string(),
            reason: "not a plain vector selector",
        });
    }

    let mut matchers = match matchers {
        Some(inner) => split_matchers(inner).ok_or(RewriteError::Unsupported {
            expr: expr.to_string(),
            reason: "malformed label matchers",
        })?,
        None => Vec::new(),
    };
    matchers.retain(|m| matcher_label(m) != "namespace");
    matchers.push(format!("namespace=\"{scope}\""));

    Ok(format!("{name}{{{}}}", matchers.join(",")))
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Split a matcher list on commas outside quoted label values.
/// Returns None when a quoted string is left open.
fn split_matchers(inner: &str) -> Option<Vec<String>> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in inner.chars() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                current.push(c);
            }
            ',' => {
                if !current.trim().is_empty() {
                    out.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if in_string {
        return None;
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    Some(out)
}

fn matcher_label(matcher: &str) -> &str {
    let end = matcher
        .find(|c| c == '=' || c == '!' || c == '~')
        .unwrap_or(matcher.len());
    matcher[..end].trim()
}
