//! The compilation session: lexing, parsing, and lowering driven end to
//! end for one import graph.
//!
//! [`Session`] owns everything that must outlive a single file — the
//! shared [`Interner`], the [`SourceMap`], the IR [`IrArena`], and the
//! [`SymbolTable`] every file's types register into — and walks a file
//! through the pipeline in order: open, lex, parse, lower
//! ([`walker::walk_file`]), then evaluate field numbers
//! ([`eval::evaluate_file_numbers`]/[`eval::evaluate_extension_numbers`]).
//! Resolving editions features ([`features::FeatureSetArena`]) and
//! semantic validation are driven by the caller (the `protocore-validate`
//! crate) once a file and everything it imports have reached this point,
//! since both can depend on another file's IR.

mod eval;
mod features;
mod imports;
mod model;
mod symbols;
mod walker;
mod wkt;

pub use eval::{
    check_disjoint_ranges, evaluate_extension_numbers, evaluate_file_numbers, evaluate_number,
    find_duplicate_tags, find_overlap, number_in_ranges, EvaluatedNumber, NumberKind,
    FIRST_RESERVED_TAG, LAST_RESERVED_TAG, MAX_FIELD_TAG,
};
pub use features::{descend_into_extension, EditionDefaultTable, FeatureSet, FeatureSetArena, Resolved};
pub use imports::{
    canonicalize_import_path, implicit_descriptor_path, is_implicit_descriptor, looks_like_proto_path,
    transitive_closure, CanonicalizeError, DirectoryOpener, ImportFrame, ImportStack, Importer, Opener,
    OpenedSource, UnionOpener,
};
pub use model::*;
pub use symbols::{resolve_scoped, Symbol, SymbolTable};
pub use walker::walk_file;
pub use wkt::{imported_file_entry, is_well_known, resolve as resolve_well_known};

use indexmap::IndexMap;
use protocore_ast::{AstContext, ImportKind};
use protocore_base::{Diagnostic, FileId, Interner, Report, Span, SourceFile, SourceMap};
use protocore_lexer::LexerConfig;

/// Policy knobs for one session. `Default` gives ordinary proto2/proto3
/// behavior (a file with no `syntax` statement at all is proto2, per
/// Protobuf's own legacy default) with no file-size override and
/// warnings that do not by themselves fail a build.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Edition assumed for a file whose `syntax`/`edition` statement is
    /// missing entirely.
    pub default_edition: Edition,
    /// Informational mirror of the lexer's built-in size ceiling
    /// (`i32::MAX` bytes); a future CLI can use this to reject an
    /// oversized file before even calling [`Opener::open`].
    pub max_file_size: i64,
    /// If set, callers should treat
    /// [`Report::has_severity_at_least`]`(Severity::Warning)` as a build
    /// failure in addition to [`Report::is_failure`].
    pub deny_warnings: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { default_edition: Edition::Proto2, max_file_size: i32::MAX as i64, deny_warnings: false }
    }
}

/// Everything one source file yields after lowering and field-number
/// evaluation: the lowered [`File`] IR and the [`FileId`] its text is
/// registered under in the session's [`SourceMap`].
#[derive(Clone, Debug)]
pub struct CompiledFile {
    pub file_id: FileId,
    pub file: File,
}

/// Owns every piece of state that outlives a single file across one
/// compilation: the interner (names must compare equal across files),
/// the source map (a [`Span`] is meaningless without it), and the IR
/// arena (a cross-file [`TypeRef`] points into the same arena the
/// importing file's own members live in, so resolving one is just an
/// `Id` lookup with no per-file indirection). One `Session` compiles a
/// whole import graph; start a fresh one per independent compilation so
/// the interner and arena do not grow without bound across unrelated
/// runs.
pub struct Session {
    pub config: SessionConfig,
    pub interner: Interner,
    pub map: SourceMap,
    pub arena: IrArena,
    pub symbols: SymbolTable,
    pub features: FeatureSetArena,
    lexer_config: LexerConfig,
    compiled: IndexMap<String, CompiledFile>,
    /// One file's parsed AST per compiled path. `pub` (unlike `compiled`,
    /// which only needs a read-only accessor) because a caller driving
    /// `protocore_validate::validate_file` alongside other session state
    /// (`arena`, `interner`, `features`) needs to borrow this field
    /// disjointly from those — a method call like `ast_mut` would borrow
    /// all of `Session` for the duration instead.
    pub asts: IndexMap<String, AstContext>,
    /// One file's frozen [`protocore_lexer::TokenStream`] per compiled
    /// path, `pub` for the same disjoint-borrow reason as `asts`. A
    /// well-known type has no entry, since it is built directly as IR
    /// with no lexing step at all (see `wkt`). Kept around so a
    /// descriptor-bridge consumer can attribute leading/trailing/
    /// detached comments against a declaration's span after the fact,
    /// rather than needing to thread that decision through lowering.
    pub streams: IndexMap<String, protocore_lexer::TokenStream>,
    import_stack: ImportStack,
    /// A permanently-empty registered file, backing placeholder spans
    /// (cycle frames with no real import declaration to blame, an
    /// unopenable file) that need a valid `FileId` but no real text.
    dummy_file: FileId,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let mut map = SourceMap::new();
        let dummy_file = map.add(SourceFile::new("<session>", ""));
        Session {
            config,
            interner: Interner::new(),
            map,
            arena: IrArena::new(),
            symbols: SymbolTable::new(),
            features: FeatureSetArena::new(),
            lexer_config: LexerConfig::protobuf(),
            compiled: IndexMap::new(),
            asts: IndexMap::new(),
            streams: IndexMap::new(),
            import_stack: ImportStack::new(),
            dummy_file,
        }
    }

    /// The already-compiled file at `canonical_path`, if this session has
    /// processed it (as the entry point, a well-known type, or a
    /// transitive import).
    pub fn compiled(&self, canonical_path: &str) -> Option<&CompiledFile> {
        self.compiled.get(canonical_path)
    }

    /// The parsed [`AstContext`] backing an already-compiled file, for a
    /// caller (the `protocore-validate` crate's `validate_file`) that
    /// needs to read option-literal expressions by the `ExprAny` ids the
    /// IR carries. `None` for a well-known type, which has no AST at
    /// all since it is built directly as IR (see `wkt`).
    pub fn ast(&self, canonical_path: &str) -> Option<&AstContext> {
        self.asts.get(canonical_path)
    }

    /// Mutable access to the same context, for a validator that needs to
    /// allocate placeholder expressions (edition-default literals with
    /// no real source span) into the file's own arena so the `ExprAny`
    /// ids it hands back stay valid against that file's context. A
    /// caller that also needs `arena`/`interner`/`features` borrowed at
    /// the same time `validate_file` wants its `&mut AstContext` should
    /// index `session.asts` directly instead — this method call would
    /// otherwise borrow the whole `Session` for as long as the result is
    /// alive, where a direct field projection lets the borrow checker
    /// see the borrows as disjoint.
    pub fn ast_mut(&mut self, canonical_path: &str) -> Option<&mut AstContext> {
        self.asts.get_mut(canonical_path)
    }

    /// The [`FileId`] an already-compiled file's source text is
    /// registered under in this session's [`SourceMap`], for a caller
    /// that needs a valid (if zero-width) span to anchor a placeholder
    /// diagnostic or expression against.
    pub fn file_id(&self, canonical_path: &str) -> Option<FileId> {
        self.compiled.get(canonical_path).map(|c| c.file_id)
    }

    /// The frozen token stream backing an already-compiled file, for a
    /// descriptor-bridge consumer attributing comments. `None` for a
    /// well-known type.
    pub fn stream(&self, canonical_path: &str) -> Option<&protocore_lexer::TokenStream> {
        self.streams.get(canonical_path)
    }

    /// Compiles one file's already-read `contents` through lex, parse,
    /// lower, and field-number evaluation (including extension numbers
    /// against whatever extendees are already known to the session's
    /// arena), without resolving its imports at all. Useful for tests and
    /// single-file tools; [`Session::compile_tree`] is the end-to-end
    /// entry point that also follows an [`Opener`] across the whole
    /// import graph.
    pub fn compile_source(&mut self, canonical_path: &str, contents: &str) -> (CompiledFile, Report) {
        let (_, mut report) = self.compile_and_cache(canonical_path, contents);
        self.evaluate_extends(canonical_path, &mut report);
        let compiled = self.compiled.get(canonical_path).cloned().expect("compile_and_cache always inserts an entry");
        (compiled, report)
    }

    /// Compiles `entry_path` (read through `opener`) and every file it
    /// transitively imports, returning the entry file's canonical path
    /// and the aggregate [`Report`] across the whole graph (a dependency's
    /// diagnostics appear before the diagnostics of files that import it,
    /// since it must compile first). Every compiled file, including
    /// transitive dependencies, stays in the session and is reachable
    /// afterward through [`Session::compiled`].
    pub fn compile_tree(&mut self, opener: &dyn Opener, entry_path: &str) -> (String, Report) {
        let mut report = Report::new();
        // The entry path comes from the driver, not a parsed import
        // statement, so there is no span to attach a canonicalization
        // warning to; a light normalization is enough; full
        // canonicalization (dot-segment collapsing, `..` rejection)
        // applies to paths spelled inside `import` statements below.
        let canonical = entry_path.trim_start_matches("./").replace('\\', "/");
        self.ensure_compiled(opener, &canonical, None, &mut report);
        (canonical, report)
    }

    /// Lexes, parses, and lowers one file, inserting its [`CompiledFile`]
    /// and [`AstContext`] into the session's caches and returning its raw
    /// (uncanonicalized) import specs for the caller to resolve. Does not
    /// evaluate extension numbers — that needs the extendee's type to
    /// exist in the arena, which for a cross-file extendee means waiting
    /// for imports to resolve first.
    fn compile_and_cache(&mut self, canonical_path: &str, contents: &str) -> (Vec<(String, ImportKind, Span)>, Report) {
        log::debug!("opening {canonical_path}");
        let mut report = Report::new();
        let file_id = match protocore_lexer::open_source(&mut self.map, canonical_path, contents.as_bytes()) {
            Ok(id) => id,
            Err(err) => {
                report.push(Diagnostic::error(err.to_string()));
                let id = self.map.add(SourceFile::new(canonical_path, ""));
                self.compiled.insert(canonical_path.to_string(), CompiledFile { file_id: id, file: empty_file(canonical_path) });
                return (Vec::new(), report);
            }
        };

        log::debug!("lexing {canonical_path}");
        let (stream, lex_report) = protocore_lexer::lex(&self.map, file_id, &self.lexer_config);
        report.extend(lex_report);

        log::debug!("parsing {canonical_path}");
        let parsed = protocore_ast::parse_file(&self.map, file_id, &stream, &self.interner);
        report.extend(parsed.report);

        let import_specs: Vec<(String, ImportKind, Span)> = parsed
            .ast
            .file
            .imports
            .iter()
            .map(|&id| {
                let decl = &parsed.ast.imports[id];
                let text = stream.metadata(decl.path_token).and_then(|m| m.string_value.as_deref()).unwrap_or_default();
                (text.to_string(), decl.kind, decl.span)
            })
            .collect();

        let package = resolve_package(&parsed.ast, &self.interner);
        let (edition, syntax_is_proto2) = resolve_edition(&parsed.ast, &stream, self.config.default_edition);

        log::debug!("lowering {canonical_path}");
        let (mut file, walk_report) = walk_file(
            &parsed.ast,
            &self.interner,
            &self.map,
            &stream,
            &mut self.arena,
            &mut self.symbols,
            package,
            edition,
            syntax_is_proto2,
        );
        report.extend(walk_report);
        file.path = canonical_path.to_string();

        log::debug!("evaluating field numbers for {canonical_path}");
        let number_report = evaluate_file_numbers(&parsed.ast, &self.map, &mut self.arena, &file);
        report.extend(number_report);

        self.compiled.insert(canonical_path.to_string(), CompiledFile { file_id, file });
        self.asts.insert(canonical_path.to_string(), parsed.ast);
        self.streams.insert(canonical_path.to_string(), stream);

        (import_specs, report)
    }

    /// Ensures `canonical_path` (and everything it imports) has been
    /// compiled, recursing through [`Opener::open`] for anything not
    /// already cached and not a well-known type. `decl_span` is the
    /// import declaration that asked for this file, `None` for the
    /// session's own entry point, which has no importer to blame a cycle
    /// on.
    fn ensure_compiled(&mut self, opener: &dyn Opener, canonical_path: &str, decl_span: Option<Span>, report: &mut Report) {
        if self.compiled.contains_key(canonical_path) {
            return;
        }

        if is_well_known(canonical_path) {
            log::debug!("resolving well-known type {canonical_path}");
            let file = resolve_well_known(canonical_path, &mut self.arena, &self.interner)
                .expect("is_well_known and resolve must agree on the same path set");
            let file_id = self.map.add(SourceFile::new(canonical_path, ""));
            self.compiled.insert(canonical_path.to_string(), CompiledFile { file_id, file });
            return;
        }

        let cycle_span = decl_span.unwrap_or(Span::new(self.dummy_file, 0, 0));
        if let Err(cycle) = self.import_stack.enter(canonical_path, cycle_span) {
            report.extend(cycle);
            return;
        }

        let opened = match opener.open(canonical_path) {
            Ok(opened) => opened,
            Err(err) => {
                report.push(Diagnostic::error(err.to_string()));
                self.import_stack.exit(canonical_path);
                return;
            }
        };

        let (import_specs, file_report) = self.compile_and_cache(canonical_path, &opened.contents);
        report.extend(file_report);

        let mut direct = Vec::new();
        for (raw_path, kind, span) in import_specs {
            let (import_canonical, warning) = match canonicalize_import_path(&raw_path, span) {
                Ok(result) => result,
                Err(err) => {
                    report.push(Diagnostic::error(format!("invalid import path: {err}")).with_span(span));
                    continue;
                }
            };
            if let Some(warning) = warning {
                report.push(warning);
            }
            self.ensure_compiled(opener, &import_canonical, Some(span), report);
            if self.compiled.contains_key(&import_canonical) {
                direct.push(ImportedFile { canonical_path: import_canonical, kind, transitive: false, ast: Some(span) });
            }
        }

        if canonical_path != implicit_descriptor_path() {
            self.ensure_compiled(opener, implicit_descriptor_path(), None, report);
            if self.compiled.contains_key(implicit_descriptor_path()) && !direct.iter().any(|i| i.canonical_path == implicit_descriptor_path()) {
                direct.push(imported_file_entry(implicit_descriptor_path(), ImportKind::Plain));
            }
        }

        let compiled = &self.compiled;
        let full = transitive_closure(&direct, |path| {
            compiled.get(path).map(|c| c.file.imports.iter().filter(|i| i.kind == ImportKind::Public).cloned().collect()).unwrap_or_default()
        });
        if let Some(compiled) = self.compiled.get_mut(canonical_path) {
            compiled.file.imports = full;
        }

        self.evaluate_extends(canonical_path, report);
        self.import_stack.exit(canonical_path);
    }

    /// Evaluates every `extend` block's field numbers in the already-
    /// compiled file at `canonical_path` against its extendee's declared
    /// extension ranges. The extendee's `Type` must already be in the
    /// shared arena — true for a same-file extendee as soon as
    /// [`walk_file`] returns, and for a cross-file one once
    /// `ensure_compiled` has resolved that import.
    fn evaluate_extends(&mut self, canonical_path: &str, report: &mut Report) {
        let Some(extend_ids) = self.compiled.get(canonical_path).map(|c| c.file.extends.clone()) else { return };
        let Some(ast) = self.asts.get(canonical_path) else { return };
        for extend_id in extend_ids {
            let Some(ptr) = extend_id.to_ptr() else { continue };
            let extend = self.arena.extends.get(ptr).clone();
            let Some(ranges) = extendee_ranges(&self.arena, extend.extendee) else {
                report.push(Diagnostic::error("cannot resolve the extendee of this extend block").with_span(extend.ast));
                continue;
            };
            let extension_report = evaluate_extension_numbers(ast, &self.map, &mut self.arena, &extend, &ranges);
            report.extend(extension_report);
        }
    }
}

/// The declared extension ranges of the type a `TypeRef` names. Since a
/// [`Session`] keeps one shared [`IrArena`] across every file it
/// compiles, a `TypeRef`'s `id` is already globally valid once its
/// owning file has been lowered — no per-file remapping is needed here.
fn extendee_ranges(arena: &IrArena, reference: TypeRef) -> Option<Vec<ExtensionRange>> {
    let ty = arena.types.try_get(reference.id.to_ptr()?)?;
    Some(ty.extension_ranges.clone())
}

/// Resolves a file's dotted package name from its (optional) `package`
/// declaration. `Name::EMPTY` (no package) is returned for a file with
/// none.
fn resolve_package(ast: &AstContext, interner: &Interner) -> protocore_base::Name {
    match ast.file.package {
        Some(id) => {
            let decl = &ast.packages[id];
            let segments: Vec<String> = decl.path.segments.iter().map(|s| interner.resolve(*s)).collect();
            interner.intern(&segments.join("."))
        }
        None => protocore_base::Name::EMPTY,
    }
}

/// Resolves a file's edition and its legacy-proto2 flag from its
/// (optional) `syntax`/`edition` declaration, falling back to
/// `default_edition` for a file that declares neither.
fn resolve_edition(ast: &AstContext, stream: &protocore_lexer::TokenStream, default_edition: Edition) -> (Edition, bool) {
    match ast.file.syntax {
        Some(id) => {
            let decl = &ast.syntaxes[id];
            match decl.kind {
                protocore_ast::SyntaxKind::Proto2 => (Edition::Proto2, true),
                protocore_ast::SyntaxKind::Proto3 => (Edition::Proto3, false),
                protocore_ast::SyntaxKind::Edition => {
                    let text = decl
                        .edition_token
                        .and_then(|token| stream.metadata(token))
                        .and_then(|m| m.string_value.as_deref())
                        .unwrap_or_default();
                    (Edition::from_str_token(text).unwrap_or(default_edition), false)
                }
            }
        }
        None => (default_edition, default_edition == Edition::Proto2),
    }
}

fn empty_file(path: &str) -> File {
    File { path: path.to_string(), ..File::default() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_source_lowers_a_trivial_file() {
        let mut session = Session::new(SessionConfig::default());
        let (compiled, report) = session.compile_source("t.proto", "syntax = \"proto3\";\nmessage M { int32 x = 1; }\n");
        assert!(!report.is_failure(), "{:?}", report.into_vec());
        assert_eq!(compiled.file.top_level_count, 1);
        let ty = session.arena.types.get(compiled.file.types[0].to_ptr().unwrap());
        assert_eq!(session.interner.resolve(ty.name), "M");
    }

    #[test]
    fn compile_source_evaluates_field_numbers() {
        let mut session = Session::new(SessionConfig::default());
        let (compiled, report) = session.compile_source("t.proto", "syntax = \"proto3\";\nmessage M { int32 x = 5; }\n");
        assert!(!report.is_failure(), "{:?}", report.into_vec());
        let ty = session.arena.types.get(compiled.file.types[0].to_ptr().unwrap());
        let member = session.arena.members.get(ty.members[0].to_ptr().unwrap());
        assert_eq!(member.number, 5);
    }

    #[test]
    fn missing_syntax_defaults_to_proto2() {
        let mut session = Session::new(SessionConfig::default());
        let (compiled, _) = session.compile_source("t.proto", "message M { optional int32 x = 1; }\n");
        assert_eq!(compiled.file.edition, Some(Edition::Proto2));
        assert!(compiled.file.syntax_is_proto2);
    }

    #[test]
    fn default_edition_is_configurable() {
        let mut session = Session::new(SessionConfig { default_edition: Edition::Proto3, ..SessionConfig::default() });
        let (compiled, _) = session.compile_source("t.proto", "message M { int32 x = 1; }\n");
        assert_eq!(compiled.file.edition, Some(Edition::Proto3));
        assert!(!compiled.file.syntax_is_proto2);
    }

    #[test]
    fn same_file_extend_resolves_without_an_opener() {
        let mut session = Session::new(SessionConfig::default());
        let source = "syntax = \"proto2\";\n\
             message M { extensions 100 to 200; }\n\
             extend M { optional int32 ext = 150; }\n";
        let (compiled, report) = session.compile_source("t.proto", source);
        assert!(!report.is_failure(), "{:?}", report.into_vec());
        let extend_id = compiled.file.extends[0];
        let extend = session.arena.extends.get(extend_id.to_ptr().unwrap());
        let member = session.arena.members.get(extend.members[0].to_ptr().unwrap());
        assert_eq!(member.number, 150);
    }
}
