//! Constant folding for field-number/range-bound expressions. A single evaluator serves three callers: ordinary field tags,
//! `reserved`/`extensions` range bounds, and extension field numbers
//! (the latter in a required second pass, since it additionally needs
//! the extendee's already-evaluated extension ranges).

use protocore_ast::{AstContext, Expr, ExprKind};
use protocore_base::{Diagnostic, Id, Report, SourceMap, Span};

use num_bigint::BigInt;
use num_traits::ToPrimitive;

pub const FIRST_RESERVED_TAG: i32 = 19000;
pub const LAST_RESERVED_TAG: i32 = 19999;
/// Field tags are a 29-bit unsigned quantity.
pub const MAX_FIELD_TAG: i64 = (1 << 29) - 1;

/// What kind of numeric value a candidate expression is being evaluated
/// as, so the evaluator can apply the right bit width and sign rules.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NumberKind {
    /// A field or extension tag: 29-bit unsigned, reserved range
    /// forbidden.
    FieldTag,
    /// The lower or upper bound of a `reserved`/`extensions` range:
    /// 29-bit unsigned, but `max` is additionally accepted as the upper
    /// bound.
    RangeBound { is_upper_bound: bool },
    /// An enum value number: full 32-bit signed range, no reserved-range
    /// restriction.
    EnumValueNumber,
}

#[derive(Clone, Copy, Debug)]
pub enum EvaluatedNumber {
    Value(i64),
    /// The `max` keyword in a range's upper bound, meaning "as large as
    /// this axis goes" (`2^29 - 1` for field ranges, `i32::MAX` for enum
    /// value ranges — the caller decides which, since the evaluator
    /// doesn't know which axis without more context than `NumberKind`
    /// alone carries for `EnumValueNumber` ranges).
    Max,
}

/// Evaluates one candidate expression. `token_text` fetches the literal
/// spelling backing an `Int`/`Float` token (the evaluator does not
/// itself touch the lexer's metadata side map — callers pass a closure
/// so this module stays lexer-agnostic).
pub fn evaluate_number(
    ast: &protocore_ast::AstContext,
    expr_id: Id<Expr>,
    kind: NumberKind,
    token_text: &dyn Fn(protocore_lexer::TokenId) -> &str,
    span_of: &dyn Fn(Id<Expr>) -> Span,
) -> Result<EvaluatedNumber, Diagnostic> {
    let expr = &ast.exprs[expr_id];
    let span = span_of(expr_id);
    match &expr.kind {
        ExprKind::Int { token } => evaluate_literal(token_text(*token), false, kind, span),
        ExprKind::Negative(inner) => {
            let inner_expr = &ast.exprs[*inner];
            match &inner_expr.kind {
                ExprKind::Int { token } => evaluate_literal(token_text(*token), true, kind, span),
                _ => Err(Diagnostic::error("expected an integer literal after '-'").with_span(span)),
            }
        }
        ExprKind::Max => match kind {
            NumberKind::RangeBound { is_upper_bound: true } => Ok(EvaluatedNumber::Max),
            _ => Err(Diagnostic::error("'max' is only valid as a range's upper bound").with_span(span)),
        },
        ExprKind::Path(_) => {
            // An enum-value-name default is handled by the default-value
            // evaluator, not this numeric one; reaching here means a
            // name was used where a number was expected.
            Err(Diagnostic::error("expected an integer, found a name").with_span(span))
        }
        _ => Err(Diagnostic::error("expected an integer literal").with_span(span)),
    }
}

fn evaluate_literal(text: &str, negative: bool, kind: NumberKind, span: Span) -> Result<EvaluatedNumber, Diagnostic> {
    let magnitude: BigInt = text.parse().map_err(|_| Diagnostic::error(format!("invalid integer literal '{text}'")).with_span(span))?;
    let signed = if negative { -magnitude } else { magnitude };

    match kind {
        NumberKind::FieldTag | NumberKind::RangeBound { .. } => {
            if negative {
                return Err(
                    Diagnostic::error("field numbers must be non-negative").with_span(span).with_note("tags are a 29-bit unsigned quantity")
                );
            }
            let value = signed.to_i64().ok_or_else(|| {
                Diagnostic::error(format!("field number {signed} is out of range"))
                    .with_span(span)
                    .with_note(format!("valid range is 0..={MAX_FIELD_TAG}"))
            })?;
            if value == 0 || value > MAX_FIELD_TAG {
                return Err(Diagnostic::error(format!("field number {value} is out of range"))
                    .with_span(span)
                    .with_note(format!("valid range is 1..={MAX_FIELD_TAG}")));
            }
            if matches!(kind, NumberKind::FieldTag) && (FIRST_RESERVED_TAG as i64..=LAST_RESERVED_TAG as i64).contains(&value) {
                return Err(Diagnostic::error(format!(
                    "field number {value} falls in the reserved range {FIRST_RESERVED_TAG}-{LAST_RESERVED_TAG}"
                ))
                .with_span(span)
                .with_note("this range is reserved for protocol buffer implementation internals"));
            }
            Ok(EvaluatedNumber::Value(value))
        }
        NumberKind::EnumValueNumber => {
            let value = signed.to_i64().filter(|v| *v >= i32::MIN as i64 && *v <= i32::MAX as i64).ok_or_else(|| {
                Diagnostic::error(format!("enum value {signed} is out of range"))
                    .with_span(span)
                    .with_note(format!("valid range is {}..={}", i32::MIN, i32::MAX))
            })?;
            Ok(EvaluatedNumber::Value(value))
        }
    }
}

/// Scans a type's already-evaluated members for duplicate tags,
/// reporting one diagnostic per collision pointing at both sites.
pub fn find_duplicate_tags(members: &[(Id<crate::model::Member>, i32, Span)]) -> Vec<Diagnostic> {
    let mut by_number: rustc_hash::FxHashMap<i32, (Id<crate::model::Member>, Span)> = rustc_hash::FxHashMap::default();
    let mut diagnostics = Vec::new();
    for &(member, number, span) in members {
        if number == 0 {
            continue;
        }
        match by_number.entry(number) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                let (_, first_span) = *existing.get();
                diagnostics.push(
                    Diagnostic::error(format!("field number {number} is used more than once"))
                        .with_labeled_span(first_span, "first used here")
                        .with_labeled_span(span, "reused here"),
                );
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert((member, span));
            }
        }
    }
    diagnostics
}

/// Checks that `number` lies inside at least one of `ranges`.
pub fn number_in_ranges(number: i32, ranges: &[crate::model::ExtensionRange]) -> bool {
    ranges.iter().any(|r| number >= r.start && number <= r.end)
}

/// Checks that a set of `(start, end)` ranges is pairwise disjoint,
/// returning the indices of the first colliding pair if not.
pub fn find_overlap(ranges: &[(i32, i32)]) -> Option<(usize, usize)> {
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let (a, b) = (ranges[i], ranges[j]);
            if a.0 <= b.1 && b.0 <= a.1 {
                return Some((i, j));
            }
        }
    }
    None
}

/// Reports a [`Report`]-friendly wrapper for `find_overlap`, with
/// pre-built diagnostics naming both ranges.
pub fn check_disjoint_ranges(label: &str, ranges: &[(i32, i32, Span)], report: &mut Report) {
    let bounds: Vec<(i32, i32)> = ranges.iter().map(|(s, e, _)| (*s, *e)).collect();
    if let Some((i, j)) = find_overlap(&bounds) {
        report.push(
            Diagnostic::error(format!("overlapping {label} ranges"))
                .with_labeled_span(ranges[i].2, format!("range {}-{}", ranges[i].0, ranges[i].1))
                .with_labeled_span(ranges[j].2, format!("overlaps range {}-{}", ranges[j].0, ranges[j].1)),
        );
    }
}

/// The field-number evaluation pass: walks every type's own members
/// (top-level and nested alike — extension members live in `Extend`
/// blocks and are handled separately by `evaluate_extension_numbers`
/// below, since they additionally need their extendee's ranges) and
/// evaluates each member's `declared_number_expr`, writing the result
/// into `Member.number`. Runs once per file, strictly before any
/// feature/option resolution that might itself depend on an evaluated
/// number.
pub fn evaluate_file_numbers(ast: &AstContext, map: &SourceMap, arena: &mut crate::model::IrArena, file: &crate::model::File) -> Report {
    let mut report = Report::new();
    for &type_id in &file.types {
        let is_enum = arena.types.get(type_id.to_ptr().unwrap()).is_enum;
        let members = arena.types.get(type_id.to_ptr().unwrap()).members.clone();
        let kind = if is_enum { NumberKind::EnumValueNumber } else { NumberKind::FieldTag };
        let mut evaluated = Vec::with_capacity(members.len());
        for member_id in members {
            let Some(expr) = arena.members.get(member_id.to_ptr().unwrap()).declared_number_expr else {
                continue;
            };
            let span = ast.exprs[expr].span;
            let text = span.text(map);
            let token_text = move |_: protocore_lexer::TokenId| -> &str { text };
            let span_of = |id: Id<Expr>| ast.exprs[id].span;
            match evaluate_number(ast, expr, kind, &token_text, &span_of) {
                Ok(EvaluatedNumber::Value(value)) => {
                    let number = value as i32;
                    arena.members.get_mut(member_id.to_ptr().unwrap()).number = number;
                    evaluated.push((member_id, number, span));
                }
                Ok(EvaluatedNumber::Max) => {
                    report.push(Diagnostic::error("'max' is not a valid field or enum value number").with_span(span));
                }
                Err(diag) => report.push(diag),
            }
        }
        for diag in find_duplicate_tags(&evaluated) {
            report.push(diag);
        }
    }
    report
}

/// Evaluates extension field numbers against their resolved extendee's
/// declared extension ranges: a required second pass, since it needs
/// the extendee's own `evaluate_file_numbers`/range evaluation to have
/// already completed (the extendee may be the same file, an import, or
/// — for a self-referential file like `descriptor.proto` — the file
/// currently being compiled). `extendee_ranges` is supplied by the
/// caller (the session, which alone knows how to resolve a `TypeRef`
/// across files) rather than looked up here.
pub fn evaluate_extension_numbers(
    ast: &AstContext,
    map: &SourceMap,
    arena: &mut crate::model::IrArena,
    extend: &crate::model::Extend,
    extendee_ranges: &[crate::model::ExtensionRange],
) -> Report {
    let mut report = Report::new();
    let mut evaluated = Vec::with_capacity(extend.members.len());
    for &member_id in &extend.members {
        let Some(expr) = arena.members.get(member_id.to_ptr().unwrap()).declared_number_expr else {
            continue;
        };
        let span = ast.exprs[expr].span;
        let text = span.text(map);
        let token_text = move |_: protocore_lexer::TokenId| -> &str { text };
        let span_of = |id: Id<Expr>| ast.exprs[id].span;
        match evaluate_number(ast, expr, NumberKind::FieldTag, &token_text, &span_of) {
            Ok(EvaluatedNumber::Value(value)) => {
                let number = value as i32;
                if !number_in_ranges(number, extendee_ranges) {
                    report.push(
                        Diagnostic::error(format!("extension number {number} is not in a declared extension range of the extendee"))
                            .with_span(span),
                    );
                }
                arena.members.get_mut(member_id.to_ptr().unwrap()).number = number;
                evaluated.push((member_id, number, span));
            }
            Ok(EvaluatedNumber::Max) => {
                report.push(Diagnostic::error("'max' is not a valid extension number").with_span(span));
            }
            Err(diag) => report.push(diag),
        }
    }
    for diag in find_duplicate_tags(&evaluated) {
        report.push(diag);
    }
    report
}
