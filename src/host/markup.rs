//! Markup parser for component templates.
//!
//! Parses the HTML-like strings returned by `Component::template` into a
//! small tree that [`Document::materialize`](super::Document::materialize)
//! turns into host nodes. Supported:
//!
//! - Elements with quoted, unquoted and boolean attributes
//! - Void elements (`<br>`, `<input>`, ...) and explicit `<x/>` self-closing
//! - Text with the common named entities plus `&#NN;` / `&#xHH;`
//! - Comments (skipped)
//!
//! Tag and attribute names are lowercased. Closing tags must match; there is
//! no implicit-close recovery.

use crate::error::MarkupError;

// =============================================================================
// Types
// =============================================================================

/// A parsed markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Parse a markup fragment into its top-level nodes.
pub fn parse(markup: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    let mut parser = Parser { src: markup, pos: 0 };
    parser.parse_nodes(None)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Parse siblings until end of input or the closing tag of `open`.
    fn parse_nodes(&mut self, open: Option<(&str, usize)>) -> Result<Vec<MarkupNode>, MarkupError> {
        let mut nodes = Vec::new();
        loop {
            if self.at_end() {
                return match open {
                    Some((tag, offset)) => Err(MarkupError::UnclosedTag {
                        tag: tag.to_string(),
                        offset,
                    }),
                    None => Ok(nodes),
                };
            }

            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.skip_comment()?;
            } else if rest.starts_with("</") {
                let offset = self.pos;
                let found = self.parse_close_tag()?;
                return match open {
                    Some((tag, _)) if tag == found => Ok(nodes),
                    Some((tag, _)) => Err(MarkupError::MismatchedTag {
                        expected: tag.to_string(),
                        found,
                        offset,
                    }),
                    None => Err(MarkupError::UnexpectedClose { found, offset }),
                };
            } else if starts_tag(rest) {
                nodes.push(self.parse_element()?);
            } else {
                nodes.push(MarkupNode::Text(self.parse_text()));
            }
        }
    }

    fn skip_comment(&mut self) -> Result<(), MarkupError> {
        let offset = self.pos;
        match self.rest()[4..].find("-->") {
            Some(end) => {
                self.pos += 4 + end + 3;
                Ok(())
            }
            None => Err(MarkupError::UnterminatedComment { offset }),
        }
    }

    fn parse_close_tag(&mut self) -> Result<String, MarkupError> {
        self.pos += 2;
        let name = self.parse_name();
        if name.is_empty() {
            return Err(MarkupError::MissingTagName { offset: self.pos });
        }
        self.skip_whitespace();
        match self.bump() {
            Some('>') => Ok(name),
            _ => Err(MarkupError::UnexpectedEnd { offset: self.pos }),
        }
    }

    fn parse_element(&mut self) -> Result<MarkupNode, MarkupError> {
        let offset = self.pos;
        self.bump(); // '<'
        let tag = self.parse_name();
        if tag.is_empty() {
            return Err(MarkupError::MissingTagName { offset });
        }

        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(MarkupError::UnexpectedEnd { offset: self.pos });
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            attributes.push(self.parse_attribute()?);
        };

        let children = if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
            Vec::new()
        } else {
            self.parse_nodes(Some((tag.as_str(), offset)))?
        };

        Ok(MarkupNode::Element {
            tag,
            attributes,
            children,
        })
    }

    fn parse_attribute(&mut self) -> Result<(String, String), MarkupError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '=' | '>' | '/') {
                break;
            }
            self.bump();
        }
        let name = self.src[start..self.pos].to_ascii_lowercase();
        if name.is_empty() {
            // A lone '/' that is not part of "/>"
            self.bump();
            return Err(MarkupError::MissingTagName { offset: start });
        }

        self.skip_whitespace();
        if self.peek() != Some('=') {
            return Ok((name, String::new()));
        }
        self.bump();
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let value_start = self.pos;
                match self.rest().find(quote) {
                    Some(end) => {
                        self.pos += end + 1;
                        &self.src[value_start..value_start + end]
                    }
                    None => return Err(MarkupError::UnexpectedEnd { offset: self.src.len() }),
                }
            }
            Some(_) => {
                let value_start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.bump();
                }
                &self.src[value_start..self.pos]
            }
            None => return Err(MarkupError::UnexpectedEnd { offset: self.pos }),
        };

        Ok((name, decode_entities(value)))
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
        {
            self.bump();
        }
        self.src[start..self.pos].to_ascii_lowercase()
    }

    fn parse_text(&mut self) -> String {
        let start = self.pos;
        // The first char is consumed unconditionally so a '<' that does not
        // open a tag is kept as text.
        self.bump();
        while !self.at_end() {
            let rest = self.rest();
            if starts_tag(rest) || rest.starts_with("</") || rest.starts_with("<!--") {
                break;
            }
            self.bump();
        }
        decode_entities(&self.src[start..self.pos])
    }
}

fn starts_tag(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

// =============================================================================
// Entities
// =============================================================================

/// Decode character references. Unknown references are kept verbatim.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').and_then(|semi| {
            let name = &rest[1..semi];
            decode_reference(name).map(|c| (c, semi + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Escape text content for serialization.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for serialization inside double quotes.
pub fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, attributes: &[(&str, &str)], children: Vec<MarkupNode>) -> MarkupNode {
        MarkupNode::Element {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children,
        }
    }

    fn text(content: &str) -> MarkupNode {
        MarkupNode::Text(content.to_string())
    }

    #[test]
    fn test_nested_elements() {
        let nodes = parse(r#"<div class="card"><span>Hi</span> there</div>"#).unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "div",
                &[("class", "card")],
                vec![element("span", &[], vec![text("Hi")]), text(" there")]
            )]
        );
    }

    #[test]
    fn test_attribute_forms() {
        let nodes = parse("<input type=checkbox checked data-x='a b' disabled/>").unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "input",
                &[("type", "checkbox"), ("checked", ""), ("data-x", "a b"), ("disabled", "")],
                vec![]
            )]
        );
    }

    #[test]
    fn test_void_elements_have_no_children() {
        let nodes = parse("<p>a<br>b</p>").unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "p",
                &[],
                vec![text("a"), element("br", &[], vec![]), text("b")]
            )]
        );
    }

    #[test]
    fn test_case_folding_and_comments() {
        let nodes = parse("<DIV><!-- note --><Span>x</SPAN></div>").unwrap();
        assert_eq!(
            nodes,
            vec![element("div", &[], vec![element("span", &[], vec![text("x")])])]
        );
    }

    #[test]
    fn test_multiple_top_level_nodes() {
        let nodes = parse("<a></a><b></b>").unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#65;&#x42; &bogus;"), "a & b <c> AB &bogus;");
        let nodes = parse(r#"<p title="&quot;q&quot;">1 &lt; 2</p>"#).unwrap();
        assert_eq!(
            nodes,
            vec![element("p", &[("title", "\"q\"")], vec![text("1 < 2")])]
        );
    }

    #[test]
    fn test_lone_less_than_is_text() {
        let nodes = parse("<p>1 < 2</p>").unwrap();
        assert_eq!(nodes, vec![element("p", &[], vec![text("1 < 2")])]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse("<div><span></div>"),
            Err(MarkupError::MismatchedTag { .. })
        ));
        assert!(matches!(parse("<div>"), Err(MarkupError::UnclosedTag { .. })));
        assert!(matches!(parse("</div>"), Err(MarkupError::UnexpectedClose { .. })));
        assert!(matches!(
            parse("<div><!-- open"),
            Err(MarkupError::UnterminatedComment { .. })
        ));
        assert!(matches!(parse("<div class='x"), Err(MarkupError::UnexpectedEnd { .. })));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_text("<a & b>"), "&lt;a &amp; b&gt;");
        assert_eq!(escape_attribute("say \"hi\""), "say &quot;hi&quot;");
    }
}
