use bsc_engine::compiler::ast::{params, AstNode, AstStore, NodeType, ValueType};
use bsc_engine::compiler::checker::{check, fold, CheckSummary};
use bsc_engine::compiler::layout::{resolve_layout, LayoutOptions};
use bsc_engine::{parse_source, CompileError, ErrorKind, NodeId};

fn checked(source: &str) -> Result<(AstStore, CheckSummary), CompileError> {
    let mut store = parse_source(source)?;
    resolve_layout(&mut store, &LayoutOptions::default())?;
    let summary = check(&mut store)?;
    Ok((store, summary))
}

fn nodes_of(store: &AstStore, node_type: NodeType) -> Vec<AstNode> {
    store
        .nodes()
        .unwrap()
        .into_iter()
        .filter(|n| n.node_type == node_type)
        .collect()
}

fn declaration(store: &AstStore, name: &str) -> AstNode {
    nodes_of(store, NodeType::Declaration)
        .into_iter()
        .find(|n| n.token(1) == name)
        .unwrap()
}

// ============================================================================
// Constant folding
// ============================================================================

#[test]
fn test_fold_respects_precedence() {
    let (store, _) = checked("short x = 1 + 2 * 3;").unwrap();
    let decl = declaration(&store, "x");
    let init = store.read(decl.child(0)).unwrap();
    assert_eq!(init.node_type, NodeType::Expression);
    assert_eq!(init.folded_value(), Some(7));
    assert_eq!(init.value_type, ValueType::Short);
}

#[test]
fn test_fold_left_associative_subtraction() {
    let (store, _) = checked("short x = 20 - 5 - 3;").unwrap();
    let init = store.read(declaration(&store, "x").child(0)).unwrap();
    assert_eq!(init.folded_value(), Some(12));
}

#[test]
fn test_fold_unary_minus_and_parentheses() {
    let (store, _) = checked("short x = -(4 - 10) * -2;").unwrap();
    let init = store.read(declaration(&store, "x").child(0)).unwrap();
    assert_eq!(init.folded_value(), Some(-12));
}

#[test]
fn test_fold_division_truncates_toward_zero() {
    let (store, _) = checked("short x = -7 / 2;").unwrap();
    let init = store.read(declaration(&store, "x").child(0)).unwrap();
    assert_eq!(init.folded_value(), Some(-3));
}

#[test]
fn test_fold_through_explicit_cast() {
    // 300 truncated to a byte is 44
    let (store, _) = checked("short x = <byte> 300 + 1;").unwrap();
    let init = store.read(declaration(&store, "x").child(0)).unwrap();
    assert_eq!(init.folded_value(), Some(45));
}

#[test]
fn test_fold_overflow_is_range_error() {
    let err = checked("short x = 200 * 200;").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);

    let err = checked("short x = 32768;").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);

    let (store, _) = checked("short x = -32768;").unwrap();
    let init = store.read(declaration(&store, "x").child(0)).unwrap();
    assert_eq!(init.folded_value(), Some(-32768));
}

#[test]
fn test_fold_division_by_zero_is_range_error() {
    let err = checked("short x = 1 / 0;").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[test]
fn test_mixed_expression_folds_constant_part_only() {
    let (store, _) = checked("short a = 1; short x = a + 2 * 3;").unwrap();
    let init = store.read(declaration(&store, "x").child(0)).unwrap();
    assert_eq!(init.folded_value(), None);
    let right = store.read(init.child(0)).unwrap();
    assert_eq!(right.folded_value(), Some(6));
}

#[test]
fn test_evaluate_helper() {
    assert_eq!(fold::evaluate("*", -4, 3, NodeId::NONE).unwrap(), -12);
    assert_eq!(
        fold::evaluate("+", 32767, 1, NodeId::NONE).unwrap_err().kind(),
        ErrorKind::Range
    );
}

// ============================================================================
// Type propagation
// ============================================================================

#[test]
fn test_constant_takes_declared_type() {
    let (store, _) = checked("short s = 5; byte b = 5;").unwrap();
    let s = store.read(declaration(&store, "s").child(0)).unwrap();
    let b = store.read(declaration(&store, "b").child(0)).unwrap();
    assert_eq!(s.value_type, ValueType::Short);
    assert_eq!(b.value_type, ValueType::Byte);
}

#[test]
fn test_folded_overflow_of_byte_is_type_error() {
    let err = checked("byte x = 100 + 100;").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(matches!(
        err,
        CompileError::TypeMismatch { ref expected, ref found, .. }
            if expected == "byte" && found == "short"
    ));
}

#[test]
fn test_short_into_byte_is_type_error() {
    let err = checked("short s = 1; byte b = s;").unwrap_err();
    assert!(matches!(err, CompileError::TypeMismatch { .. }));

    let err = checked("short s = 1; byte b; b = s + 1;").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_explicit_narrowing_cast_is_accepted() {
    let (store, summary) = checked("short s = 300; byte b = <byte> s;").unwrap();
    assert_eq!(summary.casts, 0);
    let cast = &nodes_of(&store, NodeType::Cast)[0];
    assert_eq!(cast.value_type, ValueType::Byte);
}

#[test]
fn test_folded_cast_keeps_target_type() {
    for source in ["byte b = <short> 5;", "byte b = <short> (2 + 3);"] {
        let err = checked(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type, "{}", source);
    }

    let (store, _) = checked("short s = <byte> 300;").unwrap();
    let init = store.read(declaration(&store, "s").child(0)).unwrap();
    assert_eq!(init.folded_value(), Some(44));
    assert_eq!(init.value_type, ValueType::Short);
}

#[test]
fn test_variable_addresses() {
    let (store, _) = checked("byte a; short b; byte c; c = a;").unwrap();
    let address = |name: &str| declaration(&store, name).params[params::DECLARATION_ADDRESS];
    assert_eq!(address("a"), 0);
    assert_eq!(address("b"), 1);
    assert_eq!(address("c"), 3);

    let assignment = &nodes_of(&store, NodeType::Assignment)[0];
    assert_eq!(assignment.params[params::ACCESS_ADDRESS], 3);
    assert_eq!(assignment.params[params::ACCESS_BYTES], 1);
    let variable = &nodes_of(&store, NodeType::Variable)[0];
    assert_eq!(variable.params[params::ACCESS_ADDRESS], 0);
}

#[test]
fn test_member_access_resolves_address() {
    let source = "class In { byte a; short b; } class Out { byte t; In i; } byte pad; Out o; o.i.b = 4;";
    let (store, _) = checked(source).unwrap();

    let assignment = &nodes_of(&store, NodeType::Assignment)[0];
    // pad(1) + t(1) + a(1)
    assert_eq!(assignment.params[params::ACCESS_ADDRESS], 3);
    assert_eq!(assignment.params[params::ACCESS_BYTES], 2);
    assert_eq!(assignment.value_type, ValueType::Short);

    let members = nodes_of(&store, NodeType::Member);
    assert_eq!(members[0].params[params::ACCESS_ADDRESS], 2);
    assert_eq!(members[0].value_type, ValueType::UserDefined);
    assert_eq!(members[1].params[params::ACCESS_ADDRESS], 3);
}

#[test]
fn test_undefined_names() {
    let err = checked("byte a = b;").unwrap_err();
    assert!(matches!(err, CompileError::UndefinedName { ref name, .. } if name == "b"));

    // a variable is not visible in its own initializer
    let err = checked("byte a = a;").unwrap_err();
    assert!(matches!(err, CompileError::UndefinedName { .. }));

    // outer variables are not visible inside a class body
    let err = checked("byte g; class C { byte m = g; }").unwrap_err();
    assert!(matches!(err, CompileError::UndefinedName { .. }));
}

#[test]
fn test_unknown_member() {
    let err = checked("class P { byte x; } P p; p.y = 1;").unwrap_err();
    assert!(matches!(err, CompileError::UnknownMember { ref member, .. } if member == "y"));

    let err = checked("byte b; b.x = 1;").unwrap_err();
    assert!(matches!(err, CompileError::UnknownMember { .. }));
}

#[test]
fn test_class_values() {
    assert!(checked("class P { byte x; } P p; P q = p;").is_ok());

    let err = checked("class P { byte x; } class Q { byte x; } P p; Q q = p;").unwrap_err();
    assert!(matches!(err, CompileError::TypeMismatch { .. }));

    let err = checked("class P { byte x; } P p; byte b = p;").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    let err = checked("class P { byte x; } P p; P q = p + 1;").unwrap_err();
    assert!(matches!(err, CompileError::InvalidOperation { .. }));

    let err = checked("class P { byte x; } P p; short s = <short> p;").unwrap_err();
    assert!(matches!(err, CompileError::InvalidOperation { .. }));

    let err = checked("class P { byte x; } byte b; P p = <P> b;").unwrap_err();
    assert!(matches!(err, CompileError::InvalidOperation { .. }));
}

// ============================================================================
// Cast insertion
// ============================================================================

#[test]
fn test_byte_into_short_inserts_one_cast() {
    let (store, summary) = checked("byte b = 5; short s = b;").unwrap();
    assert_eq!(summary.casts, 1);

    let casts = nodes_of(&store, NodeType::Cast);
    assert_eq!(casts.len(), 1);
    let cast = &casts[0];
    assert_eq!(cast.token(0), "short");
    assert_eq!(cast.value_type, ValueType::Short);

    let decl = declaration(&store, "s");
    assert_eq!(decl.child(0), cast.id);
    assert_eq!(cast.parent, decl.id);
    assert_eq!(store.value_type(cast.child(0)).unwrap(), ValueType::Byte);
}

#[test]
fn test_mixed_width_operands_widen_narrow_side() {
    let (store, summary) = checked("byte b = 1; short s = 2; short t = b + s;").unwrap();
    assert_eq!(summary.casts, 1);
    let cast = &nodes_of(&store, NodeType::Cast)[0];
    let expression = store.read(cast.parent).unwrap();
    assert_eq!(expression.node_type, NodeType::Expression);
    assert_eq!(expression.child(2), cast.id);
}

#[test]
fn test_folded_constant_widens_in_place() {
    // under a cast the constant gets its narrowest type, byte
    let (store, summary) = checked("short s = 1; byte b = <byte> (s + 1);").unwrap();
    assert_eq!(summary.casts, 0);

    let expression = nodes_of(&store, NodeType::Expression)
        .into_iter()
        .find(|n| !n.child(1).is_none())
        .unwrap();
    assert_eq!(expression.value_type, ValueType::Short);
    let constant_term = store.read(expression.child(0)).unwrap();
    assert_eq!(constant_term.folded_value(), Some(1));
    assert_eq!(constant_term.value_type, ValueType::Short);
}
