//! Named-placeholder templates for bench directories and commands.
//!
//! A template is literal text with `{name}` placeholders; `{{` and `}}` stand
//! for literal braces. Rendering substitutes the canonical rendering of each
//! setting and fails on the first placeholder the settings do not define. No
//! shell quoting is applied here.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::settings::Settings;

/// Failure to parse or render a [`Template`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template references a setting absent from the assignment.
    #[error("template '{template}' references '{name}', which is not set")]
    MissingPlaceholder {
        /// Source text of the template.
        template: String,
        /// Name of the missing placeholder.
        name: String,
    },
    /// Unbalanced or empty braces.
    #[error("template '{template}' is malformed at byte {offset}")]
    Malformed {
        /// Source text of the template.
        template: String,
        /// Byte offset of the offending brace.
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed template ready to be rendered against [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, validating brace structure.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let malformed = |offset| TemplateError::Malformed {
            template: source.to_string(),
            offset,
        };
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();
        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(malformed(offset)),
                            other => name.push(other),
                        }
                    }
                    let name = name.trim().to_string();
                    if !closed || name.is_empty() {
                        return Err(malformed(offset));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => return Err(malformed(offset)),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes every placeholder with the matching setting.
    pub fn render(&self, settings: &Settings) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value =
                        settings
                            .get(name)
                            .ok_or_else(|| TemplateError::MissingPlaceholder {
                                template: self.source.clone(),
                                name: name.clone(),
                            })?;
                    out.push_str(&value.render());
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Template::parse(source)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
