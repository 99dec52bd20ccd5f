//! A small CSS selector engine for the in-memory DOM.
//!
//! Supports type and universal selectors, `#id`, `.class`, attribute
//! selectors with `=`, `~=`, `^=`, `$=` and `*=`, `:not(<compound>)`,
//! descendant and child combinators, and selector lists.

use crate::page::{ElementAccess, NodeId, PageError};

use super::dom::Dom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    Prefix,
    Suffix,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Id(String),
    Class(String),
    Attr { name: String, op: AttrOp, value: String },
    Not(Box<Compound>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    parts: Vec<Simple>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compounds from right to left with the combinator joining each to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList(Vec<Complex>);

impl SelectorList {
    pub(crate) fn parse(text: &str) -> Result<Self, PageError> {
        let invalid = || PageError::InvalidSelector(text.to_string());
        let mut complexes = Vec::new();
        for part in super::dom::split_top_level(text, ',') {
            let mut parser = Parser::new(part.trim());
            let complex = parser.complex().ok_or_else(invalid)?;
            if !parser.done() {
                return Err(invalid());
            }
            complexes.push(complex);
        }
        Ok(Self(complexes))
    }

    pub(crate) fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        self.0.iter().any(|complex| complex.matches(dom, node))
    }
}

impl Complex {
    fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        self.subject.matches(dom, node) && matches_ancestors(dom, node, &self.ancestors)
    }
}

fn matches_ancestors(dom: &Dom, node: NodeId, rest: &[(Combinator, Compound)]) -> bool {
    let Some(((combinator, compound), remaining)) = rest.split_first() else {
        return true;
    };
    let mut current = dom.parent(node);
    while let Some(candidate) = current {
        if compound.matches(dom, candidate) && matches_ancestors(dom, candidate, remaining) {
            return true;
        }
        if *combinator == Combinator::Child {
            return false;
        }
        current = dom.parent(candidate);
    }
    false
}

impl Compound {
    fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let Some(element) = dom.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if element.tag_name() != tag.as_str() {
                return false;
            }
        }
        self.parts.iter().all(|part| match part {
            Simple::Id(id) => element.attribute("id") == Some(id.as_str()),
            Simple::Class(class) => element.has_class(class),
            Simple::Attr { name, op, value } => match element.attribute(name) {
                None => false,
                Some(actual) => match op {
                    AttrOp::Exists => true,
                    AttrOp::Equals => actual == value.as_str(),
                    AttrOp::Includes => actual.split_ascii_whitespace().any(|v| v == value.as_str()),
                    AttrOp::Prefix => !value.is_empty() && actual.starts_with(value.as_str()),
                    AttrOp::Suffix => !value.is_empty() && actual.ends_with(value.as_str()),
                    AttrOp::Contains => !value.is_empty() && actual.contains(value.as_str()),
                },
            },
            Simple::Not(inner) => !inner.matches(dom, node),
        })
    }

    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.parts.is_empty()
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    fn identifier(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.bump();
        }
        (self.pos > start).then(|| self.input[start..self.pos].to_string())
    }

    fn complex(&mut self) -> Option<Complex> {
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let spaced = self.skip_whitespace();
            let combinator = if self.eat('>') {
                self.skip_whitespace();
                Combinator::Child
            } else if spaced && !self.done() {
                Combinator::Descendant
            } else {
                break;
            };
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }
        let subject = compounds.pop()?;
        let ancestors = combinators.into_iter().rev().zip(compounds.into_iter().rev()).collect();
        Some(Complex { subject, ancestors })
    }

    fn compound(&mut self) -> Option<Compound> {
        let mut compound = Compound::default();
        let universal = self.eat('*');
        if !universal && self.peek().is_some_and(|c| c.is_alphabetic()) {
            compound.tag = Some(self.identifier()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.parts.push(Simple::Id(self.identifier()?));
                }
                Some('.') => {
                    self.bump();
                    compound.parts.push(Simple::Class(self.identifier()?));
                }
                Some('[') => {
                    self.bump();
                    compound.parts.push(self.attribute()?);
                }
                Some(':') => {
                    self.bump();
                    if self.identifier()?.to_ascii_lowercase() != "not" || !self.eat('(') {
                        return None;
                    }
                    self.skip_whitespace();
                    let inner = self.compound()?;
                    self.skip_whitespace();
                    if inner.is_empty() || !self.eat(')') {
                        return None;
                    }
                    compound.parts.push(Simple::Not(Box::new(inner)));
                }
                _ => break,
            }
        }
        (universal || !compound.is_empty()).then_some(compound)
    }

    fn attribute(&mut self) -> Option<Simple> {
        self.skip_whitespace();
        let name = self.identifier()?.to_ascii_lowercase();
        self.skip_whitespace();
        if self.eat(']') {
            return Some(Simple::Attr {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }
        let op = match self.bump()? {
            '=' => AttrOp::Equals,
            '~' => AttrOp::Includes,
            '^' => AttrOp::Prefix,
            '$' => AttrOp::Suffix,
            '*' => AttrOp::Contains,
            _ => return None,
        };
        if op != AttrOp::Equals && !self.eat('=') {
            return None;
        }
        self.skip_whitespace();
        let value = match self.peek()? {
            quote @ ('"' | '\'') => {
                self.bump();
                let start = self.pos;
                while self.peek()? != quote {
                    self.bump();
                }
                let value = self.input[start..self.pos].to_string();
                self.bump();
                value
            }
            _ => self.identifier()?,
        };
        self.skip_whitespace();
        self.eat(']').then_some(Simple::Attr { name, op, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dom(html: &str) -> Dom {
        let mut dom = Dom::new();
        dom.load_document(Dom::ROOT, html);
        dom
    }

    fn select(dom: &Dom, selector: &str) -> Vec<String> {
        let list = SelectorList::parse(selector).unwrap();
        dom.descendants(Dom::ROOT)
            .into_iter()
            .filter(|node| list.matches(dom, *node))
            .filter_map(|node| dom.element(node)?.attribute("id").map(str::to_string))
            .collect()
    }

    #[test]
    fn matches_the_engine_vocabulary() {
        let dom = dom(
            r#"<div id="list" class="playlist-item active">
                 <img id="a" class="cover-img" loading="lazy" data-src="x.png">
                 <span><img id="b" data-proxy-processed="true"></span>
               </div>
               <video id="v" poster="p.jpg"></video>"#,
        );
        assert_eq!(select(&dom, "img"), vec!["a", "b"]);
        assert_eq!(select(&dom, "[loading=\"lazy\"], [data-src]"), vec!["a"]);
        assert_eq!(select(&dom, "img:not([data-proxy-processed])"), vec!["a"]);
        assert_eq!(select(&dom, "[class*=\"cover\"]"), vec!["a"]);
        assert_eq!(select(&dom, ".playlist-item.active"), vec!["list"]);
        assert_eq!(select(&dom, "#list img"), vec!["a", "b"]);
        assert_eq!(select(&dom, "#list > img"), vec!["a"]);
        assert_eq!(select(&dom, "video[poster], audio[poster]"), vec!["v"]);
        assert_eq!(select(&dom, "*[id^='l']"), vec!["list"]);
    }

    #[test]
    fn rejects_malformed_selectors() {
        for bad in ["", "img[", "div:hover", "a,,b", "[x~y]", ".", "img >"] {
            assert!(SelectorList::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
