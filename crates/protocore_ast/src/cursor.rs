//! A cursor over one level of the lexer's token tree.
//!
//! The lexer has already fused matching brackets into [`Tree`] nodes, so
//! the parser never has to hunt for a closing brace itself: descending
//! into a message body is just recursing into that body's `Tree::children`
//! with a fresh `Cursor`. What the cursor does is skip `Space`/`Comment`
//! leaves and hand the parser a view of only the meaningful tokens at the
//! current nesting level.

use protocore_base::{SourceMap, Span};
use protocore_lexer::{Leaf, TokenId, TokenKind, TokenNode};

/// A read-only walk over one slice of sibling [`TokenNode`]s (a file's
/// top level, or one bracket tree's children), skipping whitespace and
/// comments automatically.
#[derive(Clone)]
pub struct Cursor<'a> {
    nodes: &'a [TokenNode],
    pos: usize,
    map: &'a SourceMap,
    /// The span to report EOF-related diagnostics against: the empty
    /// span just past the end of whatever enclosing scope this cursor
    /// covers (file end, or a tree's close bracket).
    eof_span: Span,
}

impl<'a> Cursor<'a> {
    pub fn new(nodes: &'a [TokenNode], map: &'a SourceMap, eof_span: Span) -> Self {
        let mut cursor = Cursor { nodes, pos: 0, map, eof_span };
        cursor.skip_trivia();
        cursor
    }

    fn is_trivia(node: &TokenNode) -> bool {
        matches!(node, TokenNode::Leaf(Leaf { kind: TokenKind::Space | TokenKind::Comment, .. }))
    }

    fn skip_trivia(&mut self) {
        while self.pos < self.nodes.len() && Self::is_trivia(&self.nodes[self.pos]) {
            self.pos += 1;
        }
    }

    /// The next meaningful token, without consuming it.
    pub fn peek(&self) -> Option<&'a TokenNode> {
        self.nodes.get(self.pos)
    }

    /// The meaningful token after the next one, without consuming
    /// anything. Used for small lookaheads (distinguishing `map<K, V>`
    /// from a named type, `option` statement vs. `optional` label, etc).
    pub fn peek2(&self) -> Option<&'a TokenNode> {
        let mut i = self.pos + 1;
        while i < self.nodes.len() && Self::is_trivia(&self.nodes[i]) {
            i += 1;
        }
        self.nodes.get(i)
    }

    pub fn is_eof(&self) -> bool {
        self.peek().is_none()
    }

    /// Consumes and returns the next meaningful token.
    pub fn bump(&mut self) -> Option<&'a TokenNode> {
        let node = self.nodes.get(self.pos)?;
        self.pos += 1;
        self.skip_trivia();
        Some(node)
    }

    pub fn text(&self, leaf: &Leaf) -> &'a str {
        leaf.span.text(self.map)
    }

    /// The span of the next token, or this scope's EOF span if exhausted.
    pub fn here(&self) -> Span {
        self.peek().map(|n| n.span()).unwrap_or(self.eof_span)
    }

    pub fn eof_span(&self) -> Span {
        self.eof_span
    }

    /// `true` and does not consume if the next token is the punctuation
    /// `text`.
    pub fn at_punct(&self, text: &str) -> bool {
        matches!(self.peek(), Some(TokenNode::Leaf(leaf)) if leaf.kind == TokenKind::Punctuation && self.text(leaf) == text)
    }

    pub fn at_ident(&self, text: &str) -> bool {
        matches!(self.peek(), Some(TokenNode::Leaf(leaf)) if leaf.kind == TokenKind::Identifier && self.text(leaf) == text)
    }

    /// Consumes the next token if it is the punctuation `text`.
    pub fn eat_punct(&mut self, text: &str) -> Option<TokenId> {
        if self.at_punct(text) {
            let id = self.peek().unwrap().id();
            self.bump();
            Some(id)
        } else {
            None
        }
    }

    pub fn eat_ident(&mut self, text: &str) -> Option<TokenId> {
        if self.at_ident(text) {
            let id = self.peek().unwrap().id();
            self.bump();
            Some(id)
        } else {
            None
        }
    }

    /// Consumes the next token if it is an identifier of any spelling,
    /// returning its leaf.
    pub fn eat_any_ident(&mut self) -> Option<Leaf> {
        match self.peek() {
            Some(TokenNode::Leaf(leaf)) if leaf.kind == TokenKind::Identifier => {
                let leaf = *leaf;
                self.bump();
                Some(leaf)
            }
            _ => None,
        }
    }

    /// Consumes the next token if it is a string literal, returning its
    /// leaf (whose id indexes the stream's metadata for the unescaped
    /// value).
    pub fn eat_any_string(&mut self) -> Option<Leaf> {
        match self.peek() {
            Some(TokenNode::Leaf(leaf)) if leaf.kind == TokenKind::String => {
                let leaf = *leaf;
                self.bump();
                Some(leaf)
            }
            _ => None,
        }
    }

    /// Consumes the next token if it is a fused bracket tree whose open
    /// spelling is `open`. Returns the tree's children as a fresh cursor
    /// scoped to the tree's own `eof_span` (the close bracket's span).
    pub fn eat_tree(&mut self, open: &str) -> Option<Cursor<'a>> {
        let idx = self.pos;
        match self.nodes.get(idx) {
            Some(TokenNode::Tree(tree)) if self.text(&tree.open) == open => {
                let eof = tree.close.span;
                let children: &'a [TokenNode] = &tree.children;
                self.bump();
                Some(Cursor::new(children, self.map, eof))
            }
            _ => None,
        }
    }

    pub fn remaining_span(&self) -> Span {
        let start = self.here();
        start.merge(self.eof_span)
    }
}
