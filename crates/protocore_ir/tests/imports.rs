//! Multi-file import scenarios driven through a real filesystem, since
//! cycle detection and transitive-public-import closure both need more
//! than one source file to exercise honestly.

use std::fs;

use protocore_ir::{DirectoryOpener, Session, SessionConfig};

fn write(dir: &std::path::Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create import root subdirectory");
    }
    fs::write(path, contents).expect("write fixture proto file");
}

#[test]
fn a_two_file_import_cycle_is_reported_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.proto", "syntax = \"proto3\";\nimport \"b.proto\";\nmessage A { B b = 1; }\n");
    write(dir.path(), "b.proto", "syntax = \"proto3\";\nimport \"a.proto\";\nmessage B { A a = 1; }\n");

    let opener = DirectoryOpener::new(vec![dir.path().to_path_buf()]);
    let mut session = Session::new(SessionConfig::default());
    let (_, report) = session.compile_tree(&opener, "a.proto");

    assert!(report.is_failure(), "{:?}", report.clone().into_vec());
    assert!(report.iter().any(|d| d.message.contains("cyclic import")));
}

#[test]
fn a_three_file_cycle_reports_the_whole_chain() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.proto", "syntax = \"proto3\";\nimport \"b.proto\";\nmessage A {}\n");
    write(dir.path(), "b.proto", "syntax = \"proto3\";\nimport \"c.proto\";\nmessage B {}\n");
    write(dir.path(), "c.proto", "syntax = \"proto3\";\nimport \"a.proto\";\nmessage C {}\n");

    let opener = DirectoryOpener::new(vec![dir.path().to_path_buf()]);
    let mut session = Session::new(SessionConfig::default());
    let (_, report) = session.compile_tree(&opener, "a.proto");

    assert!(report.is_failure());
    let cycle = report.iter().find(|d| d.message.contains("cyclic import")).expect("cycle diagnostic present");
    assert!(cycle.snippets.len() >= 3, "{:?}", cycle);
}

#[test]
fn an_acyclic_diamond_import_compiles_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "base.proto", "syntax = \"proto3\";\nmessage Base {}\n");
    write(dir.path(), "left.proto", "syntax = \"proto3\";\nimport \"base.proto\";\nmessage Left { Base b = 1; }\n");
    write(dir.path(), "right.proto", "syntax = \"proto3\";\nimport \"base.proto\";\nmessage Right { Base b = 1; }\n");
    write(
        dir.path(),
        "top.proto",
        "syntax = \"proto3\";\nimport \"left.proto\";\nimport \"right.proto\";\nmessage Top { Left l = 1; Right r = 2; }\n",
    );

    let opener = DirectoryOpener::new(vec![dir.path().to_path_buf()]);
    let mut session = Session::new(SessionConfig::default());
    let (entry, report) = session.compile_tree(&opener, "top.proto");

    assert!(!report.is_failure(), "{:?}", report.clone().into_vec());
    assert!(session.compiled("base.proto").is_some());
    assert!(session.compiled("left.proto").is_some());
    assert!(session.compiled(&entry).is_some());
}

#[test]
fn a_chain_of_public_imports_closes_transitively() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "leaf.proto", "syntax = \"proto3\";\nmessage Leaf {}\n");
    write(dir.path(), "middle.proto", "syntax = \"proto3\";\nimport public \"leaf.proto\";\nmessage Middle {}\n");
    write(dir.path(), "top.proto", "syntax = \"proto3\";\nimport \"middle.proto\";\nmessage Top { Leaf l = 1; }\n");

    let opener = DirectoryOpener::new(vec![dir.path().to_path_buf()]);
    let mut session = Session::new(SessionConfig::default());
    let (entry, report) = session.compile_tree(&opener, "top.proto");

    assert!(!report.is_failure(), "{:?}", report.clone().into_vec());
    let top = session.compiled(&entry).expect("top.proto compiled").file.clone();

    let leaf = top.imports.iter().find(|i| i.canonical_path == "leaf.proto").expect("leaf.proto visible through the public chain");
    assert!(leaf.transitive, "leaf.proto should be marked transitive, not a direct import of top.proto");

    let middle = top.imports.iter().find(|i| i.canonical_path == "middle.proto").expect("middle.proto is a direct import");
    assert!(!middle.transitive);
}

#[test]
fn a_non_public_import_does_not_propagate_to_the_grandparent() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "leaf.proto", "syntax = \"proto3\";\nmessage Leaf {}\n");
    write(dir.path(), "middle.proto", "syntax = \"proto3\";\nimport \"leaf.proto\";\nmessage Middle {}\n");
    write(dir.path(), "top.proto", "syntax = \"proto3\";\nimport \"middle.proto\";\nmessage Top { Middle m = 1; }\n");

    let opener = DirectoryOpener::new(vec![dir.path().to_path_buf()]);
    let mut session = Session::new(SessionConfig::default());
    let (entry, report) = session.compile_tree(&opener, "top.proto");

    assert!(!report.is_failure(), "{:?}", report.clone().into_vec());
    let top = session.compiled(&entry).expect("top.proto compiled").file.clone();
    assert!(top.imports.iter().all(|i| i.canonical_path != "leaf.proto"), "a plain (non-public) import must not become visible to an importer's importer");
}

#[test]
fn a_directory_opener_tries_later_roots_when_earlier_ones_lack_the_file() {
    let primary = tempfile::tempdir().expect("tempdir");
    let secondary = tempfile::tempdir().expect("tempdir");
    write(secondary.path(), "shared/common.proto", "syntax = \"proto3\";\nmessage Common {}\n");
    write(primary.path(), "app.proto", "syntax = \"proto3\";\nimport \"shared/common.proto\";\nmessage App { Common c = 1; }\n");

    let opener = DirectoryOpener::new(vec![primary.path().to_path_buf(), secondary.path().to_path_buf()]);
    let mut session = Session::new(SessionConfig::default());
    let (entry, report) = session.compile_tree(&opener, "app.proto");

    assert!(!report.is_failure(), "{:?}", report.clone().into_vec());
    assert!(session.compiled("shared/common.proto").is_some());
    assert!(session.compiled(&entry).is_some());
}
