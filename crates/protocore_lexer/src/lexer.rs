//! The lexer's main loop: UTF-8 prelude checks, lexical classification,
//! bracket fusion, and implicit string concatenation.

use crate::config::{AffixKind, KeywordAction, LexerConfig};
use crate::numbers::scan_number;
use crate::prelude::check_prelude;
use crate::strings::unescape;
use crate::token::{Leaf, Metadata, NumberValue, TokenKind, TokenNode, TokenStream};
use log::trace;
use protocore_base::{guard_ice, Diagnostic, FileId, OpenError, Report, SourceFile, SourceMap, Span};
use unicode_xid::UnicodeXID;

/// Opens and validates `bytes` from `path`, returning a ready-to-lex
/// [`SourceFile`] registered in `map`, or the fatal [`OpenError`] that
/// makes it unusable (too large, UTF-16, binary, bad UTF-8 byte).
pub fn open_source(map: &mut SourceMap, path: &str, bytes: &[u8]) -> Result<FileId, OpenError> {
    let text = check_prelude(path, bytes)?;
    Ok(map.add(SourceFile::new(path, text)))
}

/// Lexes `file` (already registered in `map`) into a [`TokenStream`] and
/// a [`Report`] of diagnostics. Never panics outward: any bug inside the
/// loop is captured by [`guard_ice`] and surfaces as a `Severity::Ice`
/// diagnostic instead.
pub fn lex(map: &SourceMap, file: FileId, config: &LexerConfig) -> (TokenStream, Report) {
    let source = map.get(file);
    let mut stream = TokenStream::new();
    let mut report = Report::new();

    let mut leaves: Vec<Leaf> = Vec::new();
    let mut cursor = 0usize;
    let text = source.text();

    while cursor < text.len() {
        let start = cursor;
        let step = guard_ice(
            || format!("lexer cursor at byte offset {start}"),
            || scan_one(text, start, config, &mut stream, &mut leaves, file, &mut report),
        );
        match step {
            Ok(next_cursor) => {
                if next_cursor <= start {
                    // The progress guard: a scan step that does not
                    // advance the cursor would loop forever. Treated as
                    // an internal compiler error rather than silently
                    // hanging.
                    panic!("lexer failed to advance past byte offset {start}");
                }
                cursor = next_cursor;
            }
            Err(ice) => {
                report.push(ice.into_diagnostic());
                break;
            }
        }
    }

    trace!("lexed {} leaf tokens from {}", leaves.len(), source.path());

    let leaves = concatenate_adjacent_strings(leaves, source, &mut stream, &mut report);
    let roots = fuse_brackets(leaves, source, file, config, &mut stream, &mut report);
    for root in roots {
        stream.push_root(root);
    }

    report.sort_by_primary_span();
    (stream, report)
}

/// Scans exactly one token (or whitespace run) starting at `start`,
/// pushing it onto `stream`/`leaves`, and returns the new cursor
/// position.
fn scan_one(
    text: &str,
    start: usize,
    config: &LexerConfig,
    stream: &mut TokenStream,
    leaves: &mut Vec<Leaf>,
    file: FileId,
    report: &mut Report,
) -> usize {
    let rest = &text[start..];
    let mut chars = rest.chars();
    let first = chars.next().expect("cursor within bounds");

    if first.is_whitespace() {
        let mut len = 0usize;
        for c in rest.chars() {
            if c.is_whitespace() {
                len += c.len_utf8();
            } else {
                break;
            }
        }
        push_leaf(stream, leaves, TokenKind::Space, file, start, start + len);
        return start + len;
    }

    if let Some((matched, action)) = config.longest_keyword_prefix(rest) {
        let matched_len = matched.len();
        match action {
            KeywordAction::Discard => return start + matched_len,
            KeywordAction::Keep | KeywordAction::Bracket { .. } => {
                push_leaf(stream, leaves, TokenKind::Punctuation, file, start, start + matched_len);
                return start + matched_len;
            }
            KeywordAction::LineComment => {
                let end = rest.find('\n').map_or(rest.len(), |i| i);
                push_leaf(stream, leaves, TokenKind::Comment, file, start, start + end);
                return start + end;
            }
            KeywordAction::BlockComment { close } => {
                let body = &rest[matched_len..];
                let end_rel = match body.find(close) {
                    Some(i) => {
                        if let Some(reopen) = body[..i].find(matched) {
                            report.push(
                                Diagnostic::warning("block comments do not nest")
                                    .with_span(Span::new(file, (start + matched_len + reopen) as u32, (start + matched_len + reopen + matched_len) as u32)),
                            );
                        }
                        matched_len + i + close.len()
                    }
                    None => {
                        report.push(
                            Diagnostic::error("unterminated block comment").with_span(Span::new(file, start as u32, text.len() as u32)),
                        );
                        rest.len()
                    }
                };
                push_leaf(stream, leaves, TokenKind::Comment, file, start, start + end_rel);
                return start + end_rel;
            }
        }
    }

    if first == '"' || first == '\'' {
        return scan_string(text, start, first, config, stream, leaves, file, report);
    }

    if first.is_ascii_digit() || (first == '.' && config.number_can_start_with_dot && rest.as_bytes().get(1).map_or(false, u8::is_ascii_digit)) {
        return scan_number_token(rest, start, config, stream, leaves, file);
    }

    if UnicodeXID::is_xid_start(first) || first == '_' {
        return scan_identifier(text, start, config, stream, leaves, file, report);
    }

    // Anything else: one byte of the "bad bytes" accumulator.
    push_leaf(stream, leaves, TokenKind::Unrecognized, file, start, start + first.len_utf8());
    start + first.len_utf8()
}

fn push_leaf(stream: &mut TokenStream, leaves: &mut Vec<Leaf>, kind: TokenKind, file: FileId, start: usize, end: usize) {
    let id = stream.alloc_id();
    let leaf = Leaf::natural(id, kind, Span::new(file, start as u32, end as u32));
    leaves.push(leaf);
}

fn scan_identifier(
    text: &str,
    start: usize,
    config: &LexerConfig,
    stream: &mut TokenStream,
    leaves: &mut Vec<Leaf>,
    file: FileId,
    report: &mut Report,
) -> usize {
    let rest = &text[start..];
    let mut len = 0usize;
    for c in rest.chars() {
        if UnicodeXID::is_xid_continue(c) || c == '_' {
            len += c.len_utf8();
        } else {
            break;
        }
    }

    // Strip trailing unprintable runes (combining marks left dangling at
    // the end of the run with nothing base-level to attach to).
    let mut ident = &rest[..len];
    while let Some(c) = ident.chars().last() {
        if c.is_alphanumeric() || c == '_' {
            break;
        }
        ident = &ident[..ident.len() - c.len_utf8()];
    }

    if ident.is_empty() {
        push_leaf(stream, leaves, TokenKind::Unrecognized, file, start, start + len.max(1));
        return start + len.max(1);
    }

    let ident_len = ident.len();

    if config.require_ascii_ident && !ident.is_ascii() {
        report.push(
            Diagnostic::warning("identifier contains non-ASCII characters")
                .with_span(Span::new(file, start as u32, (start + ident_len) as u32)),
        );
    }

    // Prefixed string: `r"..."` style, where `ident` is offered whole to
    // IsAffix as a string prefix.
    if let Some(quote) = rest[ident_len..].chars().next().filter(|c| *c == '"' || *c == '\'') {
        if config.is_affix(ident, AffixKind::StringPrefix) {
            return scan_prefixed_string(text, start, ident_len, quote, config, stream, leaves, file, report);
        }
    }

    push_leaf(stream, leaves, TokenKind::Identifier, file, start, start + ident_len);
    start + ident_len
}

fn scan_prefixed_string(
    text: &str,
    start: usize,
    prefix_len: usize,
    quote: char,
    config: &LexerConfig,
    stream: &mut TokenStream,
    leaves: &mut Vec<Leaf>,
    file: FileId,
    report: &mut Report,
) -> usize {
    let string_start = start + prefix_len;
    let end = scan_string(text, string_start, quote, config, stream, leaves, file, report);
    if let Some(leaf) = leaves.last_mut() {
        leaf.span = Span::new(file, start as u32, end as u32);
        if let Some(meta) = stream.metadata(leaf.id).cloned() {
            let mut meta = meta;
            meta.prefix_len = prefix_len as u32;
            stream.set_metadata(*leaf, meta);
        }
    }
    end
}

fn scan_string(
    text: &str,
    start: usize,
    quote: char,
    config: &LexerConfig,
    stream: &mut TokenStream,
    leaves: &mut Vec<Leaf>,
    file: FileId,
    report: &mut Report,
) -> usize {
    let rest = &text[start + quote.len_utf8()..];
    let mut i = 0usize;
    let bytes = rest.as_bytes();
    let mut closed = false;
    while i < bytes.len() {
        let c = rest[i..].chars().next().unwrap();
        if c == '\\' {
            let mut escaped_len = c.len_utf8();
            if let Some(next) = rest[i + c.len_utf8()..].chars().next() {
                escaped_len += next.len_utf8();
            }
            i += escaped_len;
            continue;
        }
        if c == quote {
            closed = true;
            break;
        }
        i += c.len_utf8();
    }

    let content = &rest[..i];
    let content_start = start + quote.len_utf8();
    let end = if closed { content_start + i + quote.len_utf8() } else { content_start + i };

    if !closed {
        report.push(Diagnostic::error("unterminated string literal").with_span(Span::new(file, start as u32, end as u32)));
    }

    let unescaped = unescape(content, config);
    for e in &unescaped.errors {
        report.push(
            Diagnostic::error(e.message.clone())
                .with_span(Span::new(file, (content_start + e.start) as u32, (content_start + e.end) as u32)),
        );
    }

    let id = stream.alloc_id();
    let leaf = Leaf::natural(id, TokenKind::String, Span::new(file, start as u32, end as u32));
    leaves.push(leaf);
    stream.set_metadata(
        leaf,
        Metadata {
            string_value: Some(unescaped.value),
            escapes: unescaped
                .escapes
                .into_iter()
                .map(|e| Span::new(file, (content_start + e.start) as u32, (content_start + e.end) as u32))
                .collect(),
            ..Default::default()
        },
    );
    end
}

fn scan_number_token(
    rest: &str,
    start: usize,
    config: &LexerConfig,
    stream: &mut TokenStream,
    leaves: &mut Vec<Leaf>,
    file: FileId,
) -> usize {
    let scanned = scan_number(rest, config);
    let mut len = scanned.len;

    // A trailing non-digit run is offered to IsAffix as a suffix.
    let after = &rest[len..];
    if let Some(suffix_len) = after.find(|c: char| !(UnicodeXID::is_xid_continue(c) || c == '_')).or(Some(after.len())) {
        if suffix_len > 0 {
            let candidate = &after[..suffix_len];
            if config.is_affix(candidate, AffixKind::NumberSuffix) {
                len += suffix_len;
            }
        }
    }

    let id = stream.alloc_id();
    let leaf = Leaf::natural(id, TokenKind::Number, Span::new(file, start as u32, (start + len) as u32));
    leaves.push(leaf);
    stream.set_metadata(
        leaf,
        Metadata {
            number: Some(if scanned.malformed { NumberValue::Int(0) } else { scanned.value }),
            is_float: scanned.is_float,
            suffix_len: (len - scanned.len) as u32,
            ..Default::default()
        },
    );
    start + len
}

/// Fuses adjacent `String` leaves (separated only by space/comment) into
/// one token whose text is their concatenation. Mixed string prefixes
/// (tracked via `prefix_len`) produce a diagnostic but are still fused.
fn concatenate_adjacent_strings(leaves: Vec<Leaf>, source: &SourceFile, stream: &mut TokenStream, report: &mut Report) -> Vec<Leaf> {
    let mut result: Vec<Leaf> = Vec::with_capacity(leaves.len());
    let mut i = 0usize;
    while i < leaves.len() {
        let leaf = leaves[i];
        if leaf.kind != TokenKind::String {
            result.push(leaf);
            i += 1;
            continue;
        }

        let mut j = i + 1;
        let mut group_end = i;
        loop {
            let mut k = j;
            while k < leaves.len() && matches!(leaves[k].kind, TokenKind::Space | TokenKind::Comment) {
                k += 1;
            }
            if k < leaves.len() && leaves[k].kind == TokenKind::String {
                group_end = k;
                j = k + 1;
            } else {
                break;
            }
        }

        if group_end == i {
            result.push(leaf);
            i += 1;
            continue;
        }

        let mut combined_value = String::new();
        let mut combined_prefix: Option<u32> = None;
        let mut mixed = false;
        for leaf in &leaves[i..=group_end] {
            if leaf.kind != TokenKind::String {
                continue;
            }
            if let Some(meta) = stream.metadata(leaf.id) {
                if let Some(v) = &meta.string_value {
                    combined_value.push_str(v);
                }
                match combined_prefix {
                    None => combined_prefix = Some(meta.prefix_len),
                    Some(p) if p != meta.prefix_len => mixed = true,
                    _ => {}
                }
            }
        }
        if mixed {
            report.push(
                Diagnostic::error("adjacent string literals have mixed prefixes")
                    .with_span(leaves[i].span.merge(leaves[group_end].span)),
            );
        }

        let id = stream.alloc_id();
        let span = leaves[i].span.merge(leaves[group_end].span);
        let fused = Leaf::natural(id, TokenKind::String, span);
        stream.set_metadata(fused, Metadata { string_value: Some(combined_value), concatenated: true, ..Default::default() });
        result.push(fused);
        let _ = source;
        i = group_end + 1;
    }
    result
}

/// A bracket's open/close spellings, used to decide whether a close
/// token actually matches the top of the bracket stack.
fn bracket_pair_matches(open_text: &str, close_text: &str) -> bool {
    matches!(
        (open_text, close_text),
        ("(", ")") | ("{", "}") | ("[", "]") | ("<", ">")
    )
}

/// Bracket fusion: builds the token tree from the flat leaf sequence
/// using a push-down-stack algorithm. On a mismatch, the
/// unmatched close is left as a plain leaf (with a diagnostic) rather
/// than fused, so an outer open can still find its real closer. Leftover
/// opens at EOF are fused to an empty synthetic close.
fn fuse_brackets(
    leaves: Vec<Leaf>,
    source: &SourceFile,
    file: FileId,
    config: &LexerConfig,
    stream: &mut TokenStream,
    report: &mut Report,
) -> Vec<TokenNode> {
    let mut stack: Vec<(Leaf, Vec<TokenNode>)> = vec![(Leaf::natural(stream.alloc_id(), TokenKind::Punctuation, Span::new(file, 0, 0)), Vec::new())];

    for leaf in leaves {
        let text = &source.text()[leaf.span.start as usize..leaf.span.end as usize];
        match config.on_keyword(text) {
            Some(KeywordAction::Bracket { is_open: true }) => {
                stack.push((leaf, Vec::new()));
            }
            Some(KeywordAction::Bracket { is_open: false }) => {
                let top_matches = stack.len() > 1 && {
                    let (open_leaf, _) = stack.last().unwrap();
                    let open_text = &source.text()[open_leaf.span.start as usize..open_leaf.span.end as usize];
                    bracket_pair_matches(open_text, text)
                };
                if top_matches {
                    let (open_leaf, children) = stack.pop().unwrap();
                    let tree_id = stream.alloc_id();
                    let tree = TokenNode::Tree(crate::token::Tree { id: tree_id, open: open_leaf, close: leaf, children });
                    stack.last_mut().unwrap().1.push(tree);
                } else {
                    report.push(Diagnostic::error("unmatched closing bracket").with_span(leaf.span));
                    stack.last_mut().unwrap().1.push(TokenNode::Leaf(leaf));
                }
            }
            _ => {
                stack.last_mut().unwrap().1.push(TokenNode::Leaf(leaf));
            }
        }
    }

    // Leftover opens: synthesize an empty close token at EOF for each,
    // innermost first.
    let eof = source.len() as u32;
    while stack.len() > 1 {
        let (open_leaf, children) = stack.pop().unwrap();
        report.push(Diagnostic::error("unmatched opening bracket").with_span(open_leaf.span));
        let close_id = stream.alloc_id();
        let close_leaf = Leaf::synthetic(close_id, TokenKind::Punctuation, Span::new(file, eof, eof));
        let tree_id = stream.alloc_id();
        let tree = TokenNode::Tree(crate::token::Tree { id: tree_id, open: open_leaf, close: close_leaf, children });
        stack.last_mut().unwrap().1.push(tree);
    }

    stack.pop().unwrap().1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::NumberValue;
    use protocore_base::SourceMap;

    fn lex_text(text: &str) -> (TokenStream, Report) {
        let mut map = SourceMap::new();
        let file = map.add(SourceFile::new("t.proto", text));
        lex(&map, file, &LexerConfig::protobuf())
    }

    fn kinds(stream: &TokenStream) -> Vec<TokenKind> {
        stream
            .roots()
            .iter()
            .filter(|n| !matches!(n, TokenNode::Leaf(l) if l.kind == TokenKind::Space))
            .map(|n| match n {
                TokenNode::Leaf(l) => l.kind,
                TokenNode::Tree(_) => TokenKind::Punctuation,
            })
            .collect()
    }

    #[test]
    fn lexes_simple_message_declaration() {
        let (stream, report) = lex_text("message Foo { }");
        assert!(report.is_empty(), "{report:?}");
        let ks = kinds(&stream);
        assert_eq!(ks, vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Punctuation]);
    }

    #[test]
    fn fuses_matching_braces_into_a_tree() {
        let (stream, _report) = lex_text("{ int32 x = 1; }");
        let tree = stream.roots().iter().find(|n| n.is_tree()).expect("expected a fused tree");
        if let TokenNode::Tree(t) = tree {
            assert!(!t.children.is_empty());
        }
    }

    #[test]
    fn reports_unmatched_opening_bracket_at_eof() {
        let (_stream, report) = lex_text("message Foo {");
        assert!(report.iter().any(|d| d.message.contains("unmatched opening bracket")));
    }

    #[test]
    fn reports_unmatched_closing_bracket() {
        let (_stream, report) = lex_text(") ");
        assert!(report.iter().any(|d| d.message.contains("unmatched closing bracket")));
    }

    #[test]
    fn parses_line_comments() {
        let (stream, report) = lex_text("// a comment\nmessage");
        assert!(report.is_empty());
        let ks = kinds(&stream);
        assert_eq!(ks[0], TokenKind::Comment);
    }

    #[test]
    fn parses_block_comments_and_reports_unterminated() {
        let (_stream, report) = lex_text("/* never closed");
        assert!(report.iter().any(|d| d.message.contains("unterminated block comment")));
    }

    #[test]
    fn implicit_string_concatenation_fuses_adjacent_literals() {
        let (stream, _report) = lex_text(r#""foo" "bar""#);
        let string_leaf = stream
            .roots()
            .iter()
            .find_map(|n| match n {
                TokenNode::Leaf(l) if l.kind == TokenKind::String => Some(*l),
                _ => None,
            })
            .expect("one fused string token");
        let meta = stream.metadata(string_leaf.id).unwrap();
        assert_eq!(meta.string_value.as_deref(), Some("foobar"));
        assert!(meta.concatenated);
    }

    #[test]
    fn number_token_carries_parsed_value() {
        let (stream, _report) = lex_text("12345");
        let leaf = match &stream.roots()[0] {
            TokenNode::Leaf(l) => *l,
            _ => panic!("expected leaf"),
        };
        let meta = stream.metadata(leaf.id).unwrap();
        assert_eq!(meta.number, Some(NumberValue::Int(12345)));
    }

    #[test]
    fn unterminated_string_is_diagnosed() {
        let (_stream, report) = lex_text("\"never closed");
        assert!(report.iter().any(|d| d.message.contains("unterminated string")));
    }

    #[test]
    fn invalid_escape_inside_string_is_diagnosed() {
        let (_stream, report) = lex_text(r#""bad \q escape""#);
        assert!(report.iter().any(|d| d.message.contains("invalid escape")));
    }
}
