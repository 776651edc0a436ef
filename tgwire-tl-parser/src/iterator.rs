//! Iterator that drives [`crate::parse_tl_file`].

use std::str::FromStr;

use crate::errors::ParseError;
use crate::tl::{Category, Definition};

pub(crate) struct TlIterator<'a> {
    lines: std::str::Lines<'a>,
    /// Current category context — flips when we see `---functions---`.
    category: Category,
    /// Current layer context — set by `===N===` markers, `None` outside any.
    layer: Option<i32>,
    /// Accumulates multi-line definitions (lines without `;` terminator).
    pending: String,
    /// `//@key value` descriptions waiting for the next declaration.
    directives: Vec<(String, String)>,
}

impl<'a> TlIterator<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            lines: src.lines(),
            category: Category::Types,
            layer: None,
            pending: String::new(),
            directives: Vec::new(),
        }
    }

    fn handle_separator(&mut self, line: &str) -> bool {
        match line {
            "---functions---" => {
                self.category = Category::Functions;
                true
            }
            "---types---" => {
                self.category = Category::Types;
                true
            }
            _ => {
                // `===N===` layer markers
                if let Some(rest) = line.strip_prefix("===") {
                    if let Some(n) = rest.strip_suffix("===") {
                        if let Ok(layer) = n.trim().parse::<i32>() {
                            self.layer = Some(layer);
                            return true;
                        }
                    }
                }
                false
            }
        }
    }

    /// Collect every `//@key value` pair on a directive line.
    ///
    /// TDLib-style schemas pack several on one line:
    /// `//@description Does X //@chat_id Chat identifier`.
    fn handle_directives(&mut self, line: &str) {
        for segment in line.split("//@").skip(1) {
            let (key, value) = match segment.split_once(char::is_whitespace) {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (segment.trim(), ""),
            };
            if !key.is_empty() {
                self.directives.push((key.to_owned(), value.to_owned()));
            }
        }
    }

    /// Attach pending directives to a freshly parsed definition.
    ///
    /// `//@class` batches describe a boxed type, not the next declaration, so
    /// they are discarded wholesale.
    fn attach_directives(&mut self, def: &mut Definition) {
        let directives = std::mem::take(&mut self.directives);
        if directives.iter().any(|(k, _)| k == "class") {
            return;
        }
        for (key, value) in directives {
            if key == "description" {
                def.description = Some(value);
                continue;
            }
            // `//@param_description` documents a parameter literally named
            // `description`
            let param_name = key.strip_prefix("param_").unwrap_or(&key);
            if let Some(p) = def.params.iter_mut().find(|p| p.name == param_name) {
                p.description = Some(value);
            }
        }
    }
}

impl<'a> Iterator for TlIterator<'a> {
    type Item = Result<Definition, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }

            // Directive comments carry descriptions; plain comments don't
            if trimmed.starts_with("//") {
                if trimmed.starts_with("//@") {
                    self.handle_directives(trimmed);
                }
                continue;
            }

            // Category / layer separators
            if self.handle_separator(trimmed) {
                continue;
            }

            // Old-style `lhs ?= rhs` declarations are skipped, not errors
            if trimmed.contains("?=") {
                self.directives.clear();
                continue;
            }

            // Accumulate multi-line definitions
            self.pending.push(' ');
            self.pending.push_str(trimmed);

            // A definition ends with `;`
            if !trimmed.ends_with(';') {
                continue;
            }

            let raw = std::mem::take(&mut self.pending);
            let raw = raw.trim().trim_end_matches(';').trim();

            if raw.is_empty() {
                continue;
            }

            let result = Definition::from_str(raw).map(|mut d| {
                d.category = self.category;
                d.layer = self.layer;
                self.attach_directives(&mut d);
                d
            });
            if result.is_err() {
                self.directives.clear();
            }

            return Some(result);
        }
    }
}
