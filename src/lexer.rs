use crate::config::Syntax;
use regex::{Captures, Regex};

/// One lexical piece of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'t> {
    /// Literal text between directives
    Text(&'t str),
    /// Include directive; `path` is the captured reference
    Include { raw: &'t str, path: &'t str },
    /// Variable placeholder; `key` is the captured name
    Variable { raw: &'t str, key: &'t str },
}

impl<'t> Token<'t> {
    /// Source text the token was scanned from
    pub fn raw(&self) -> &'t str {
        match self {
            Token::Text(text) => text,
            Token::Include { raw, .. } | Token::Variable { raw, .. } => raw,
        }
    }
}

/// A directive found in a template, with its byte span
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateReference {
    /// The full match, delimiters included
    pub full_match: String,
    /// The captured path or key
    pub reference: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Include,
    Variable,
}

#[derive(Clone, Copy)]
struct Found<'t> {
    start: usize,
    end: usize,
    capture: &'t str,
}

fn find_at<'t>(regex: &Regex, text: &'t str, pos: usize) -> Option<Found<'t>> {
    regex.captures_at(text, pos).and_then(|caps: Captures<'t>| {
        let whole = caps.get(0)?;
        let capture = caps.get(1).map_or("", |m| m.as_str());
        Some(Found {
            start: whole.start(),
            end: whole.end(),
            capture,
        })
    })
}

/// Splits `text` into literal text, include and variable tokens.
///
/// When both patterns match at the same offset the include wins. Empty
/// matches never produce a token.
pub fn tokenize<'t>(text: &'t str, syntax: &Syntax) -> Vec<Token<'t>> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;
    let mut next_include = find_at(&syntax.include, text, 0);
    let mut next_variable = find_at(&syntax.variable, text, 0);

    while pos < text.len() {
        if next_include.as_ref().is_some_and(|f| f.start < pos) {
            next_include = find_at(&syntax.include, text, pos);
        }
        if next_variable.as_ref().is_some_and(|f| f.start < pos) {
            next_variable = find_at(&syntax.variable, text, pos);
        }

        let kind = match (&next_include, &next_variable) {
            (Some(i), Some(v)) if v.start < i.start => Kind::Variable,
            (Some(i), Some(v)) if v.start == i.start && i.end == i.start => Kind::Variable,
            (Some(_), _) => Kind::Include,
            (None, Some(_)) => Kind::Variable,
            (None, None) => break,
        };
        let found = match kind {
            Kind::Include => next_include,
            Kind::Variable => next_variable,
        };
        let Some(found) = found else { break };

        if found.end == found.start {
            // Step over one character so an empty match cannot stall the scan.
            let step = text[found.start..].chars().next().map_or(1, char::len_utf8);
            pos = found.start + step;
            continue;
        }

        if found.start > text_start {
            tokens.push(Token::Text(&text[text_start..found.start]));
        }
        let raw = &text[found.start..found.end];
        tokens.push(match kind {
            Kind::Include => Token::Include {
                raw,
                path: found.capture,
            },
            Kind::Variable => Token::Variable {
                raw,
                key: found.capture,
            },
        });
        pos = found.end;
        text_start = found.end;
    }

    if text_start < text.len() {
        tokens.push(Token::Text(&text[text_start..]));
    }
    tokens
}

/// Finds all include directives in the given text
pub fn find_includes(text: &str, syntax: &Syntax) -> Vec<TemplateReference> {
    find_with(&syntax.include, text)
}

/// Finds all variable placeholders in the given text
pub fn find_variables(text: &str, syntax: &Syntax) -> Vec<TemplateReference> {
    find_with(&syntax.variable, text)
}

fn find_with(regex: &Regex, text: &str) -> Vec<TemplateReference> {
    let mut references = Vec::new();
    for capture in regex.captures_iter(text) {
        if let Some(full_match) = capture.get(0)
            && let Some(ref_match) = capture.get(1)
        {
            references.push(TemplateReference {
                full_match: full_match.as_str().to_string(),
                reference: ref_match.as_str().to_string(),
                start: full_match.start(),
                end: full_match.end(),
            });
        }
    }
    references
}
