//! Path patterns with named segments.
//!
//! A pattern is literal text with `{name}` or `{name:regex}` placeholders.
//! `{name}` captures one path segment; `{name:regex}` captures whatever the
//! custom expression matches. Custom expressions may contain balanced braces,
//! e.g. `{year:[0-9]{4}}`.

use regex::Regex;

use crate::template::PathVariables;

const SEGMENT: &str = "[^/]+";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param { name: String, pattern: String },
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    parts: Vec<Part>,
    regex: Regex,
}

impl PathPattern {
    /// Compile a pattern that must match the whole path.
    pub fn exact(source: &str) -> Result<Self, String> {
        Self::compile(source, true)
    }

    /// Compile a pattern that must match a leading part of the path.
    pub fn prefix(source: &str) -> Result<Self, String> {
        Self::compile(source, false)
    }

    fn compile(source: &str, anchored_end: bool) -> Result<Self, String> {
        let parts = parse(source)?;

        let mut expr = String::from("^");
        for part in &parts {
            match part {
                Part::Literal(text) => expr.push_str(&regex::escape(text)),
                Part::Param { name, pattern } => {
                    expr.push_str(&format!("(?P<{name}>{pattern})"));
                }
            }
        }
        if anchored_end {
            expr.push('$');
        }

        let regex = Regex::new(&expr).map_err(|e| e.to_string())?;
        Ok(Self {
            source: source.to_owned(),
            parts,
            regex,
        })
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `path`, returning the captured variables.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<PathVariables> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_owned(), m.as_str().to_owned()))
                })
                .collect(),
        )
    }

    /// Render the pattern with `bindings` in place of its placeholders.
    #[must_use]
    pub fn render(&self, bindings: &PathVariables) -> String {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Param { name, .. } => {
                    if let Some(value) = bindings.get(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Param { name, .. } => Some(name.as_str()),
            Part::Literal(_) => None,
        })
    }
}

fn parse(source: &str) -> Result<Vec<Part>, String> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = source.char_indices();

    while let Some((start, c)) = chars.next() {
        match c {
            '{' => {
                let mut depth = 1usize;
                let mut end = None;
                for (i, c) in chars.by_ref() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(i);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| format!("unclosed '{{' at offset {start}"))?;
                let inner = &source[start + 1..end];
                let (name, pattern) = match inner.split_once(':') {
                    Some((name, pattern)) if !pattern.is_empty() => (name, pattern),
                    Some((name, _)) => (name, SEGMENT),
                    None => (inner, SEGMENT),
                };
                validate_name(name)?;
                if parts
                    .iter()
                    .any(|p| matches!(p, Part::Param { name: n, .. } if n == name))
                {
                    return Err(format!("duplicate parameter {name:?}"));
                }
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(Part::Param {
                    name: name.to_owned(),
                    pattern: pattern.to_owned(),
                });
            }
            '}' => return Err(format!("unmatched '}}' at offset {start}")),
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    Ok(parts)
}

fn validate_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(format!("invalid parameter name {name:?}"))
    }
}
