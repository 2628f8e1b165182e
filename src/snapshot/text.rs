//! The text form of a [`NodeSnapshot`], which is how the last-seen source is
//! persisted on a target.
//!
//! ```text
//! {"-Child":{"Collider":"a","Collider":"b"},"Light":"warm"}
//! ```
//!
//! An object is a comma-separated list of `"key":value` entries between
//! braces. A key starting with [`CHILD_MARKER`] names a child node and its
//! value is another object. Any other key names a component type and its
//! value is a quoted payload; a type that appears several times on one node
//! is written once per payload, in order. Backslash and double quote are the
//! only escaped characters.
//!
//! Canonical output sorts entries by key and contains no whitespace. The
//! parser accepts whitespace between tokens.

use std::{fmt, str::FromStr};

use thiserror::Error;

use super::NodeSnapshot;

/// The first character of every key that denotes a child node.
pub const CHILD_MARKER: char = '-';

/// How deeply objects may nest before the text is rejected.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected '{expected}' but reached the end of the text at byte {offset}")]
    UnexpectedEnd { expected: char, offset: usize },

    #[error("expected '{expected}' but found '{found}' at byte {offset}")]
    UnexpectedCharacter {
        expected: char,
        found: char,
        offset: usize,
    },

    #[error("string starting at byte {offset} is never closed")]
    UnterminatedString { offset: usize },

    #[error("unexpected text after the end of the snapshot at byte {offset}")]
    TrailingCharacters { offset: usize },

    #[error("child '{name}' appears twice in the same node, second time at byte {offset}")]
    DuplicateChild { name: String, offset: usize },

    #[error("objects nest more than {max} levels deep at byte {offset}", max = MAX_DEPTH)]
    TooDeep { offset: usize },
}

/// A snapshot that can't be written as text without changing meaning when
/// read back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnrepresentableError {
    #[error(
        "component type '{type_name}' on node '{node}' starts with '{marker}', which is reserved for children",
        marker = CHILD_MARKER
    )]
    ReservedTypeName { node: String, type_name: String },

    #[error("node '{node}' is nested more than {max} levels deep", max = MAX_DEPTH)]
    TooDeep { node: String },
}

impl ParseError {
    /// The byte offset into the text where the problem was detected.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::UnexpectedEnd { offset, .. }
            | ParseError::UnexpectedCharacter { offset, .. }
            | ParseError::UnterminatedString { offset }
            | ParseError::TrailingCharacters { offset }
            | ParseError::DuplicateChild { offset, .. }
            | ParseError::TooDeep { offset } => *offset,
        }
    }
}

enum Entry<'a> {
    Child(&'a NodeSnapshot),
    Component(&'a str),
}

impl NodeSnapshot {
    /// Prints the snapshot in canonical form.
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        write_node(self, &mut output);
        output
    }

    /// Checks that `from_text(to_text())` gives this snapshot back. Component
    /// types starting with [`CHILD_MARKER`] and trees nested deeper than
    /// [`MAX_DEPTH`] can't be.
    pub fn check_representable(&self) -> Result<(), UnrepresentableError> {
        let mut to_visit = vec![("", self, 1)];

        while let Some((name, node, depth)) = to_visit.pop() {
            if depth > MAX_DEPTH {
                return Err(UnrepresentableError::TooDeep {
                    node: name.to_owned(),
                });
            }

            if let Some(type_name) = node
                .components
                .keys()
                .find(|type_name| type_name.starts_with(CHILD_MARKER))
            {
                return Err(UnrepresentableError::ReservedTypeName {
                    node: name.to_owned(),
                    type_name: type_name.clone(),
                });
            }

            for (child_name, child) in &node.children {
                to_visit.push((child_name.as_str(), child, depth + 1));
            }
        }

        Ok(())
    }

    pub fn from_text(text: &str) -> Result<NodeSnapshot, ParseError> {
        let mut parser = Parser {
            text,
            offset: 0,
            depth: 0,
        };
        let snapshot = parser.parse_node()?;

        parser.skip_whitespace();
        if parser.offset < text.len() {
            return Err(ParseError::TrailingCharacters {
                offset: parser.offset,
            });
        }

        Ok(snapshot)
    }
}

impl fmt::Display for NodeSnapshot {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(&self.to_text())
    }
}

impl FromStr for NodeSnapshot {
    type Err = ParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        NodeSnapshot::from_text(source)
    }
}

fn write_node(node: &NodeSnapshot, output: &mut String) {
    let mut entries: Vec<(String, Entry)> = Vec::new();

    for (name, child) in &node.children {
        entries.push((format!("{}{}", CHILD_MARKER, name), Entry::Child(child)));
    }

    for (type_name, payloads) in &node.components {
        for payload in payloads {
            entries.push((type_name.clone(), Entry::Component(payload)));
        }
    }

    // Stable, so repeated component types keep their order.
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    output.push('{');

    for (i, (key, entry)) in entries.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }

        write_string(key, output);
        output.push(':');

        match entry {
            Entry::Child(child) => write_node(child, output),
            Entry::Component(payload) => write_string(payload, output),
        }
    }

    output.push('}');
}

fn write_string(value: &str, output: &mut String) {
    output.push('"');

    for c in value.chars() {
        if c == '\\' || c == '"' {
            output.push('\\');
        }

        output.push(c);
    }

    output.push('"');
}

struct Parser<'a> {
    text: &'a str,
    offset: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.offset..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_ascii_whitespace() {
                break;
            }

            self.offset += c.len_utf8();
        }
    }

    /// Consumes `expected` after any whitespace. When `optional` is set, a
    /// mismatch leaves the parser where it was and returns `Ok(false)`.
    fn expect(&mut self, expected: char, optional: bool) -> Result<bool, ParseError> {
        self.skip_whitespace();

        match self.peek() {
            Some(found) if found == expected => {
                self.offset += found.len_utf8();
                Ok(true)
            }
            _ if optional => Ok(false),
            Some(found) => Err(ParseError::UnexpectedCharacter {
                expected,
                found,
                offset: self.offset,
            }),
            None => Err(ParseError::UnexpectedEnd {
                expected,
                offset: self.offset,
            }),
        }
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        self.expect('"', false)?;

        let start = self.offset - 1;
        let mut value = String::new();
        let text = self.text;
        let mut chars = text[self.offset..].char_indices();

        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.offset += i + 1;
                    return Ok(value);
                }
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                other => value.push(other),
            }
        }

        Err(ParseError::UnterminatedString { offset: start })
    }

    fn parse_node(&mut self) -> Result<NodeSnapshot, ParseError> {
        self.skip_whitespace();

        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                offset: self.offset,
            });
        }

        self.depth += 1;
        let node = self.parse_entries();
        self.depth -= 1;

        node
    }

    fn parse_entries(&mut self) -> Result<NodeSnapshot, ParseError> {
        let mut node = NodeSnapshot::new();

        self.expect('{', false)?;

        if self.expect('}', true)? {
            return Ok(node);
        }

        loop {
            self.skip_whitespace();
            let key_offset = self.offset;
            let key = self.parse_string()?;
            self.expect(':', false)?;

            match key.strip_prefix(CHILD_MARKER) {
                Some(name) => {
                    let child = self.parse_node()?;

                    if node.children.contains_key(name) {
                        return Err(ParseError::DuplicateChild {
                            name: name.to_owned(),
                            offset: key_offset,
                        });
                    }

                    node.children.insert(name.to_owned(), child);
                }
                None => {
                    let payload = self.parse_string()?;
                    node.components.entry(key).or_default().push(payload);
                }
            }

            if !self.expect(',', true)? {
                self.expect('}', false)?;
                return Ok(node);
            }
        }
    }
}
