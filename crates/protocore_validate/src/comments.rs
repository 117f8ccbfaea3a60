//! Comment attribution for the descriptor-bridge contract: given a
//! declaration's span, finds the comment run(s) around it and
//! classifies each as leading, trailing, or detached, per these rules:
//!
//! (a) a block comment is always its own paragraph — it never merges
//!     with an adjacent line comment into a single run.
//! (b) a line comment starting on the same source line as the previous
//!     non-skippable token becomes that token's trailing comment.
//! (c) a comment run separated by at most one blank line from the
//!     following declaration becomes that declaration's leading
//!     comment.
//! (d) a comment run surrounded by at least two blank lines on both
//!     sides becomes a detached leading comment of the following
//!     declaration.
//!
//! This module only ever reads an already-lexed, already-frozen (or
//! not — freezing is orthogonal) [`TokenStream`]; it never re-lexes or
//! re-parses anything.

use protocore_base::{SourceMap, Span};
use protocore_lexer::{TokenKind, TokenNode, TokenStream};

/// One maximal run of comment leaves with no non-comment, non-space
/// token between them.
#[derive(Clone, Debug)]
pub struct CommentRun {
    pub spans: Vec<Span>,
    /// Number of blank source lines between the end of the previous
    /// non-skippable token (or start of file) and the start of this run.
    pub blank_lines_before: u32,
    /// Number of blank source lines between the end of this run and the
    /// start of the next non-skippable token (or end of file).
    pub blank_lines_after: u32,
    /// Whether this run sits on the same line as the token immediately
    /// preceding it (rule (b): only ever true for a single-leaf line
    /// comment run).
    pub same_line_as_previous: bool,
}

impl CommentRun {
    /// The smallest span covering every leaf in this run.
    pub fn span(&self) -> Span {
        self.spans.iter().copied().reduce(Span::merge).expect("a CommentRun always has at least one span")
    }
}

/// Every comment run attributed to one declaration: at most one trailing
/// run carried over from the *previous* declaration's last token, any
/// number of detached runs, and at most one leading run immediately
/// before the declaration.
#[derive(Clone, Debug, Default)]
pub struct AttributedComments {
    pub trailing_of_previous: Option<CommentRun>,
    pub detached: Vec<CommentRun>,
    pub leading: Option<CommentRun>,
}

/// Flattens `stream`'s token tree into source order, depth-first,
/// descending into fused bracket trees — a comment inside a message
/// body's braces is still found this way.
fn flatten(stream: &TokenStream) -> Vec<&protocore_lexer::Leaf> {
    fn walk<'a>(nodes: &'a [TokenNode], out: &mut Vec<&'a protocore_lexer::Leaf>) {
        for node in nodes {
            match node {
                TokenNode::Leaf(leaf) => out.push(leaf),
                TokenNode::Tree(tree) => {
                    out.push(&tree.open);
                    walk(&tree.children, out);
                    out.push(&tree.close);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(stream.roots(), &mut out);
    out
}

fn is_block_comment(span: Span, map: &SourceMap) -> bool {
    span.text(map).starts_with("/*")
}

fn blank_lines_between(map: &SourceMap, file: protocore_base::FileId, end: u32, start: u32) -> u32 {
    if start <= end {
        return 0;
    }
    let source = map.get(file);
    let end_line = source.line_by_offset(end);
    let start_line = source.line_by_offset(start);
    start_line.saturating_sub(end_line).saturating_sub(1)
}

/// Groups every comment leaf in `stream` into maximal runs, in source
/// order. A block comment always starts (and ends) its own run, per
/// rule (a); consecutive line comments with no blank line between them
/// merge into one run.
pub fn collect_comment_runs(stream: &TokenStream, map: &SourceMap) -> Vec<CommentRun> {
    let leaves = flatten(stream);
    let mut runs = Vec::new();
    let mut prev_code_end: Option<(protocore_base::FileId, u32)> = None;
    let mut i = 0;
    while i < leaves.len() {
        let leaf = leaves[i];
        if leaf.kind != TokenKind::Comment {
            if leaf.kind != TokenKind::Space {
                prev_code_end = Some((leaf.span.file, leaf.span.end));
            }
            i += 1;
            continue;
        }

        let same_line_as_previous = prev_code_end
            .map(|(file, end)| file == leaf.span.file && map.get(file).line_by_offset(end) == map.get(file).line_by_offset(leaf.span.start))
            .unwrap_or(false);
        let blank_before = prev_code_end.map(|(file, end)| blank_lines_between(map, file, end, leaf.span.start)).unwrap_or(0);

        let mut spans = vec![leaf.span];
        let block = is_block_comment(leaf.span, map);
        let mut j = i + 1;
        if !block {
            // Merge forward while the next non-space token is also a
            // line comment with no blank line in between.
            loop {
                let mut k = j;
                while k < leaves.len() && leaves[k].kind == TokenKind::Space {
                    k += 1;
                }
                let Some(next) = leaves.get(k) else { break };
                if next.kind != TokenKind::Comment || is_block_comment(next.span, map) {
                    break;
                }
                let gap = blank_lines_between(map, next.span.file, spans.last().unwrap().end, next.span.start);
                if gap > 0 {
                    break;
                }
                spans.push(next.span);
                j = k + 1;
            }
        }

        // Find the blank-lines-after by locating the next non-space
        // token (comment or code) after this run.
        let mut k = j;
        while k < leaves.len() && leaves[k].kind == TokenKind::Space {
            k += 1;
        }
        let run_end = spans.last().unwrap().end;
        let blank_after = leaves.get(k).map(|next| blank_lines_between(map, next.span.file, run_end, next.span.start)).unwrap_or(0);

        runs.push(CommentRun { spans, blank_lines_before: blank_before, blank_lines_after: blank_after, same_line_as_previous });
        i = j;
    }
    runs
}

/// Attributes the comment runs immediately preceding `declaration_start`
/// (a declaration's own span start, in the same file as `stream`). Runs
/// already consumed as another declaration's trailing comment (rule (b))
/// are the caller's concern to not double-attribute — in practice a
/// descriptor-bridge driver walks declarations in source order and calls
/// this once per declaration, consuming each run exactly once.
pub fn attribute_leading(runs: &[CommentRun], declaration_start: u32) -> AttributedComments {
    let mut preceding: Vec<&CommentRun> = runs.iter().filter(|r| r.span().end <= declaration_start).collect();
    preceding.sort_by_key(|r| r.span().start);

    let mut out = AttributedComments::default();
    let Some(&last) = preceding.last() else { return out };

    if last.same_line_as_previous {
        out.trailing_of_previous = Some(last.clone());
        return out;
    }

    // Walk backward from the last run, consuming contiguous runs (no
    // blank-line break large enough to have already ended the leading
    // group) as either the immediate leading comment or detached runs
    // further back.
    let mut index = preceding.len();
    let mut leading_consumed = false;
    while index > 0 {
        index -= 1;
        let run = preceding[index];
        if run.same_line_as_previous {
            break;
        }
        if !leading_consumed && run.blank_lines_after <= 1 {
            out.leading = Some(run.clone());
            leading_consumed = true;
            continue;
        }
        if run.blank_lines_before >= 2 || run.blank_lines_after >= 2 || leading_consumed {
            out.detached.insert(0, run.clone());
        } else if !leading_consumed {
            out.leading = Some(run.clone());
            leading_consumed = true;
        }
    }
    out
}
