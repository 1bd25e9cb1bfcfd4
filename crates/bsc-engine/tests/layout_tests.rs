use bsc_engine::compiler::ast::{params, AstStore, NodeId, NodeType};
use bsc_engine::compiler::layout::{resolve_layout, LayoutOptions, PENDING_DIRTY};
use bsc_engine::{parse_source, CompileError, ErrorKind};

fn resolve(source: &str, max_attempts: Option<u8>) -> Result<AstStore, CompileError> {
    let mut store = parse_source(source)?;
    resolve_layout(&mut store, &LayoutOptions { max_attempts })?;
    Ok(store)
}

fn find(store: &AstStore, node_type: NodeType, name_token: usize, name: &str) -> NodeId {
    store
        .nodes()
        .unwrap()
        .into_iter()
        .find(|n| n.node_type == node_type && n.token(name_token) == name)
        .map(|n| n.id)
        .unwrap_or_else(|| panic!("no {} named {}", node_type, name))
}

fn class_size(store: &AstStore, name: &str) -> u16 {
    let class = find(store, NodeType::Class, 0, name);
    store.param(class, NodeType::Class, params::CLASS_BYTES).unwrap()
}

fn declaration_size(store: &AstStore, name: &str) -> u16 {
    let decl = find(store, NodeType::Declaration, 1, name);
    store
        .param(decl, NodeType::Declaration, params::DECLARATION_BYTES)
        .unwrap()
}

#[test]
fn test_primitive_sizes() {
    let store = resolve("byte a; short b;", None).unwrap();
    assert_eq!(declaration_size(&store, "a"), 1);
    assert_eq!(declaration_size(&store, "b"), 2);
}

#[test]
fn test_class_size_is_sum_of_members() {
    let store = resolve("class P { byte x; short y; byte z; } P p;", None).unwrap();
    assert_eq!(class_size(&store, "P"), 4);
    assert_eq!(declaration_size(&store, "p"), 4);

    let class = find(&store, NodeType::Class, 0, "P");
    assert_eq!(
        store
            .param(class, NodeType::Class, params::CLASS_PENDING)
            .unwrap(),
        PENDING_DIRTY
    );
}

#[test]
fn test_empty_class_is_ready() {
    let store = resolve("E e; class E { }", None).unwrap();
    assert_eq!(class_size(&store, "E"), 0);
    assert_eq!(declaration_size(&store, "e"), 0);
}

#[test]
fn test_class_without_member_declarations_is_ready() {
    let store = resolve("class E { $TEST 1; } E e;", None).unwrap();
    assert_eq!(class_size(&store, "E"), 0);
    assert_eq!(declaration_size(&store, "e"), 0);

    let store = resolve("class O { class I { byte b; } } O o;", None).unwrap();
    assert_eq!(class_size(&store, "O"), 0);
    assert_eq!(class_size(&store, "I"), 1);
    assert_eq!(declaration_size(&store, "o"), 0);
}

#[test]
fn test_forward_reference_resolves() {
    // B uses A before A is declared
    let store = resolve("class B { A a; byte tag; } class A { short s; byte t; }", None).unwrap();
    assert_eq!(class_size(&store, "A"), 3);
    assert_eq!(class_size(&store, "B"), 4);
}

#[test]
fn test_top_level_forward_reference() {
    let store = resolve("P p; class P { short s; }", None).unwrap();
    assert_eq!(declaration_size(&store, "p"), 2);
}

#[test]
fn test_self_reference_is_layout_error() {
    let err = resolve("class A { A inner; }", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Layout);
}

#[test]
fn test_mutual_reference_is_layout_error() {
    let err = resolve("class A { B b; } class B { A a; }", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Layout);
}

#[test]
fn test_unknown_type_is_layout_error() {
    let err = resolve("Missing m;", None).unwrap_err();
    assert!(matches!(err, CompileError::Layout { ref type_name, .. } if type_name == "Missing"));
}

#[test]
fn test_three_class_chain_fits_fixed_bound() {
    let source = "class A { B b; } class B { C c; } class C { short s; }";
    let store = resolve(source, Some(3)).unwrap();
    assert_eq!(class_size(&store, "A"), 2);
}

#[test]
fn test_four_class_chain_exceeds_fixed_bound() {
    let source = "class A { B b; } class B { C c; } class C { D d; } class D { short s; }";

    // three attempts are not enough for four levels declared in reverse
    let err = resolve(source, Some(3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Layout);

    // the default bound grows with the number of classes
    let store = resolve(source, None).unwrap();
    assert_eq!(class_size(&store, "A"), 2);
    assert_eq!(class_size(&store, "B"), 2);
    assert_eq!(class_size(&store, "C"), 2);
}

#[test]
fn test_nested_class_sees_outer_classes() {
    let source = "class Outer { class Inner { byte b; } Inner i; Point p; } class Point { short x; short y; }";
    let store = resolve(source, None).unwrap();
    assert_eq!(class_size(&store, "Inner"), 1);
    assert_eq!(class_size(&store, "Outer"), 5);
}
