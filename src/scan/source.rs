//! Single-pass recognizer for test constructs in Python-style source.
//!
//! Nothing is imported or executed. The scanner walks physical lines once,
//! joining bracketed and backslash continuations into logical lines, skipping
//! triple-quoted strings and comments, and keeping a stack of open `class` /
//! `def` scopes keyed by indentation. Headers are matched textually:
//!
//! ```text
//! class LoadTestCase(APITestCase):      -> class-based class (marker ancestor)
//!     def test_create(self): ...        -> leaf (prefixed direct child)
//! class TestUserModel:                  -> function-based grouping class
//! @pytest.mark.django_db
//! def test_with_db(): ...               -> standalone leaf, resource tag "django_db"
//! ```
//!
//! Marker detection is a textual match on the header's base list, so a marker
//! reached only through an alias or re-export is not recognized.

use testnav_core::lang::markers;

use super::inventory::{ClassNode, FrameworkKind, FunctionNode, ModuleEntry};
use crate::config::ScanConfig;

/// Why a file could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub line: usize,
    pub message: String,
}

impl SourceError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ScopeKind {
    /// A recognized test class; index into the entry list.
    TestClass(usize),
    /// Any other class or function body.
    Other,
}

#[derive(Debug)]
struct Scope {
    header_indent: usize,
    body_indent: Option<usize>,
    kind: ScopeKind,
}

/// A logical line being assembled from physical lines.
#[derive(Debug)]
struct Logical {
    indent: usize,
    start_line: usize,
    text: String,
}

/// What [`SourceScanner::track_tokens`] learned about one physical line.
#[derive(Debug, Clone, Copy)]
struct PhysicalTokens {
    /// Byte offset where a trailing `#` comment starts, or the line length.
    code_end: usize,
    /// The line ends in a backslash continuation.
    continued: bool,
}

impl PhysicalTokens {
    fn code_until(code_end: usize) -> Self {
        Self {
            code_end,
            continued: false,
        }
    }
}

/// Line-oriented test recognizer.
pub struct SourceScanner<'a> {
    source: &'a str,
    config: &'a ScanConfig,
    indent_stack: Vec<usize>,
    scopes: Vec<Scope>,
    decorators: Vec<String>,
    entries: Vec<ModuleEntry>,
    /// Open triple-quote delimiter and the line it was opened on.
    open_string: Option<(&'static str, usize)>,
    /// Open brackets as (symbol, line).
    brackets: Vec<(char, usize)>,
    pending: Option<Logical>,
}

impl<'a> SourceScanner<'a> {
    pub fn new(source: &'a str, config: &'a ScanConfig) -> Self {
        Self {
            source,
            config,
            indent_stack: vec![0],
            scopes: Vec::new(),
            decorators: Vec::new(),
            entries: Vec::new(),
            open_string: None,
            brackets: Vec::new(),
            pending: None,
        }
    }

    /// Recognize every test construct, in source order.
    pub fn scan(mut self) -> Result<Vec<ModuleEntry>, SourceError> {
        for (idx, raw) in self.source.lines().enumerate() {
            self.scan_line(raw, idx + 1)?;
        }

        if let Some((delim, line)) = self.open_string {
            return Err(SourceError::new(line, format!("unterminated {delim} string")));
        }
        if let Some(&(symbol, line)) = self.brackets.last() {
            return Err(SourceError::new(line, format!("'{symbol}' was never closed")));
        }
        if let Some(logical) = self.pending.take() {
            // Trailing backslash on the last line.
            self.recognize(logical);
        }
        Ok(self.entries)
    }

    fn scan_line(&mut self, raw: &str, line_no: usize) -> Result<(), SourceError> {
        // Inside a triple-quoted string: only look for the closing delimiter.
        if let Some((delim, _)) = self.open_string {
            let Some(end) = find_unescaped(raw, delim) else {
                return Ok(());
            };
            self.open_string = None;
            let rest = &raw[end + delim.len()..];
            let tokens = self.track_tokens(rest, line_no)?;
            self.extend_pending(&rest[..tokens.code_end]);
            return self.finish_physical(tokens.continued);
        }

        if self.pending.is_some() {
            let tokens = self.track_tokens(raw, line_no)?;
            self.extend_pending(&raw[..tokens.code_end]);
            return self.finish_physical(tokens.continued);
        }

        let (indent, body) = measure_indent(raw, self.config.tab_width);
        if body.is_empty() || body.starts_with('#') {
            return Ok(());
        }

        self.apply_indent(indent, line_no)?;
        let tokens = self.track_tokens(body, line_no)?;
        self.pending = Some(Logical {
            indent,
            start_line: line_no,
            text: body[..tokens.code_end].trim_end().to_string(),
        });
        self.finish_physical(tokens.continued)
    }

    fn extend_pending(&mut self, segment: &str) {
        if let Some(logical) = self.pending.as_mut() {
            logical.text.push(' ');
            logical.text.push_str(segment.trim());
        }
    }

    /// Close the logical line unless brackets, strings or a backslash keep it open.
    fn finish_physical(&mut self, backslash: bool) -> Result<(), SourceError> {
        if backslash || !self.brackets.is_empty() || self.open_string.is_some() {
            if let Some(logical) = self.pending.as_mut() {
                if backslash && logical.text.ends_with('\\') {
                    logical.text.pop();
                }
            }
            return Ok(());
        }
        if let Some(logical) = self.pending.take() {
            self.recognize(logical);
        }
        Ok(())
    }

    /// Check the indentation of a new logical line and close finished scopes.
    fn apply_indent(&mut self, indent: usize, line_no: usize) -> Result<(), SourceError> {
        let current = *self.indent_stack.last().unwrap_or(&0);
        if indent > current {
            self.indent_stack.push(indent);
        } else if indent < current {
            while let Some(&top) = self.indent_stack.last() {
                if indent >= top {
                    break;
                }
                self.indent_stack.pop();
            }
            let landed = *self.indent_stack.last().unwrap_or(&0);
            if landed != indent {
                return Err(SourceError::new(
                    line_no,
                    format!("Inconsistent indentation: expected {} spaces, got {}", landed, indent),
                ));
            }
        }

        while self.scopes.last().is_some_and(|s| s.header_indent >= indent) {
            self.scopes.pop();
        }
        if let Some(scope) = self.scopes.last_mut() {
            if scope.body_indent.is_none() {
                scope.body_indent = Some(indent);
            }
        }
        Ok(())
    }

    /// Update bracket depth and string state for one physical line.
    fn track_tokens(&mut self, text: &str, line_no: usize) -> Result<PhysicalTokens, SourceError> {
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'#' => return Ok(PhysicalTokens::code_until(i)),
                q @ (b'\'' | b'"') => {
                    let triple: &'static str = if q == b'"' { "\"\"\"" } else { "'''" };
                    if text[i..].starts_with(triple) {
                        let after = i + 3;
                        match find_unescaped(&text[after..], triple) {
                            Some(end) => i = after + end + 3,
                            None => {
                                self.open_string = Some((triple, line_no));
                                return Ok(PhysicalTokens::code_until(bytes.len()));
                            }
                        }
                    } else {
                        i = skip_short_string(bytes, i);
                    }
                    continue;
                }
                open @ (b'(' | b'[' | b'{') => self.brackets.push((open as char, line_no)),
                close @ (b')' | b']' | b'}') => {
                    let expected = match close {
                        b')' => '(',
                        b']' => '[',
                        _ => '{',
                    };
                    match self.brackets.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return Err(SourceError::new(line_no, format!("unmatched '{}'", close as char)));
                        }
                    }
                }
                b'\\' if i + 1 == bytes.len() => {
                    return Ok(PhysicalTokens {
                        code_end: bytes.len(),
                        continued: true,
                    });
                }
                _ => {}
            }
            i += 1;
        }
        Ok(PhysicalTokens::code_until(bytes.len()))
    }

    /// Classify one complete logical line.
    fn recognize(&mut self, logical: Logical) {
        let text = logical.text.trim();

        if let Some(decorator) = text.strip_prefix('@') {
            self.decorators.push(decorator_path(decorator));
            return;
        }

        let header = text.strip_prefix("async ").map(str::trim_start).unwrap_or(text);
        let decorators = std::mem::take(&mut self.decorators);

        if let Some(rest) = header.strip_prefix("def ") {
            let name = leading_ident(rest);
            self.on_function(name, logical.indent, logical.start_line, &decorators);
        } else if let Some(rest) = header.strip_prefix("class ") {
            let rest = rest.trim_start();
            let name = leading_ident(rest);
            let bases = base_list(&rest[name.len()..]);
            self.on_class(name, &bases, logical.indent, logical.start_line);
        }
    }

    fn on_function(&mut self, name: &str, indent: usize, line: usize, decorators: &[String]) {
        let resource = self.resource_tag(decorators);
        let prefixed = name.starts_with(self.config.test_prefix.as_str());

        match self.scopes.last() {
            None if indent == 0 && (prefixed || resource.is_some()) => {
                tracing::trace!(name, line, "standalone test");
                self.entries.push(ModuleEntry::Function(FunctionNode {
                    name: name.to_string(),
                    kind: FrameworkKind::FunctionBased,
                    line,
                    resource,
                }));
            }
            Some(Scope {
                kind: ScopeKind::TestClass(idx),
                body_indent: Some(body),
                ..
            }) if *body == indent && prefixed => {
                let idx = *idx;
                if let Some(ModuleEntry::Class(class)) = self.entries.get_mut(idx) {
                    class.methods.push(FunctionNode {
                        name: name.to_string(),
                        kind: class.kind,
                        line,
                        resource,
                    });
                }
            }
            _ => {}
        }

        self.scopes.push(Scope {
            header_indent: indent,
            body_indent: None,
            kind: ScopeKind::Other,
        });
    }

    fn on_class(&mut self, name: &str, bases: &[String], indent: usize, line: usize) {
        let mut kind = ScopeKind::Other;

        if indent == 0 && self.scopes.is_empty() {
            let marker_base = bases.iter().find(|b| self.config.is_marker_ancestor(b));
            let framework = if marker_base.is_some() {
                Some(FrameworkKind::ClassBased)
            } else if name.starts_with(self.config.grouping_prefix.as_str()) {
                Some(FrameworkKind::FunctionBased)
            } else {
                None
            };

            if let Some(framework) = framework {
                tracing::trace!(name, line, %framework, "test class");
                kind = ScopeKind::TestClass(self.entries.len());
                self.entries.push(ModuleEntry::Class(ClassNode {
                    name: name.to_string(),
                    kind: framework,
                    line,
                    marker: marker_base.and_then(|b| markers::from_str(b)),
                    methods: Vec::new(),
                }));
            }
        }

        self.scopes.push(Scope {
            header_indent: indent,
            body_indent: None,
            kind,
        });
    }

    /// First configured resource marker appearing as a segment of any decorator.
    fn resource_tag(&self, decorators: &[String]) -> Option<String> {
        self.config
            .resource_markers
            .iter()
            .find(|marker| decorators.iter().any(|d| d.split('.').any(|seg| seg == marker.as_str())))
            .cloned()
    }
}

/// Scan one source text with the given configuration.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn scan_source(source: &str, config: &ScanConfig) -> Result<Vec<ModuleEntry>, SourceError> {
    SourceScanner::new(source, config).scan()
}

/// Count leading whitespace in columns; return it with the remaining text.
fn measure_indent(line: &str, tab_width: usize) -> (usize, &str) {
    let mut indent = 0;
    for (i, c) in line.char_indices() {
        match c {
            ' ' => indent += 1,
            '\t' => indent += tab_width,
            '\x0c' | '\r' => {}
            _ => return (indent, &line[i..]),
        }
    }
    (indent, "")
}

/// Byte offset of the first `delim` in `text` not preceded by a backslash escape.
fn find_unescaped(text: &str, delim: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(delim.as_bytes()) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Skip a single-quoted or double-quoted string starting at `start`.
///
/// Unterminated strings end at the end of the line.
fn skip_short_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn leading_ident(text: &str) -> &str {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

/// Dotted path of a decorator, without call arguments.
fn decorator_path(decorator: &str) -> String {
    let end = decorator.find('(').unwrap_or(decorator.len());
    decorator[..end].split_whitespace().collect()
}

/// Positional bases from `(A, pkg.B, metaclass=M):`; keyword arguments are dropped.
fn base_list(after_name: &str) -> Vec<String> {
    let Some(open) = after_name.find('(') else {
        return Vec::new();
    };
    let Some(close) = after_name.rfind(')') else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }

    let mut bases = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in after_name[open + 1..close].chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => bases.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    bases.push(current);

    bases
        .into_iter()
        .map(|b| b.split_whitespace().collect::<String>())
        .filter(|b| !b.is_empty() && !b.contains('=') && !b.starts_with('*'))
        .map(|b| match b.find('[') {
            // Generic aliases: `Base[T]`
            Some(i) => b[..i].to_string(),
            None => b,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
