//! Parser tests

use crate::ast::{
    BinOp, Callee, CastType, Expr, IncDecOp, IncludeKind, MagicConst, NodeIdGen, Program, Stmt,
    StrPart, UnOp, VarName,
};
use crate::lexer::tokenize;
use crate::parser::parse;

/// Helper to parse a script and return the AST
fn parse_program(source: &str) -> crate::Result<Program> {
    let tokens = tokenize(source)?;
    parse("test.php", source, tokens, &mut NodeIdGen::new())
}

/// Helper to parse and expect success
fn parse_ok(source: &str) -> Program {
    parse_program(source).expect("Parse should succeed")
}

/// Helper to check if parsing fails
fn parse_fails(source: &str) -> bool {
    parse_program(source).is_err()
}

/// Parse `<?php <expr>;` and return the expression
fn expr_of(code: &str) -> Expr {
    let prog = parse_ok(&format!("<?php {code};"));
    match prog.statements.into_iter().next().map(|s| s.node) {
        Some(Stmt::Expr(e)) => e.node,
        other => panic!("Expected expression statement, got {other:?}"),
    }
}

fn var(name: &str) -> Expr {
    Expr::Variable(VarName::Simple(name.to_string()))
}

// ============================================
// Statements
// ============================================

#[test]
fn test_parse_inline_html_and_echo() {
    let prog = parse_ok("Hello <?php echo 1, 2 ?>\nWorld");
    assert_eq!(prog.statements.len(), 3);
    assert_eq!(prog.statements[0].node, Stmt::InlineHtml("Hello ".to_string()));
    if let Stmt::Echo(exprs) = &prog.statements[1].node {
        assert_eq!(exprs.len(), 2);
    } else {
        panic!("Expected Echo");
    }
    assert_eq!(prog.statements[2].node, Stmt::InlineHtml("World".to_string()));
}

#[test]
fn test_parse_short_echo_tag() {
    let prog = parse_ok("<?= 'a' ?>");
    assert!(matches!(prog.statements[0].node, Stmt::Echo(_)));
}

#[test]
fn test_parse_if_elseif_else() {
    let prog = parse_ok("<?php if ($a) { echo 1; } elseif ($b) echo 2; else { echo 3; }");
    if let Stmt::If { branches, else_branch } = &prog.statements[0].node {
        assert_eq!(branches.len(), 2);
        assert!(else_branch.is_some());
    } else {
        panic!("Expected If");
    }
}

#[test]
fn test_parse_alternative_if() {
    let prog = parse_ok("<?php if ($a): echo 1; elseif ($b): echo 2; else: echo 3; endif;");
    if let Stmt::If { branches, else_branch } = &prog.statements[0].node {
        assert_eq!(branches.len(), 2);
        assert!(matches!(branches[0].body.node, Stmt::Block(ref b) if b.len() == 1));
        assert!(else_branch.is_some());
    } else {
        panic!("Expected If");
    }
}

#[test]
fn test_parse_alternative_loops() {
    parse_ok("<?php while ($i < 3): $i++; endwhile;");
    parse_ok("<?php for ($i = 0; $i < 3; $i++): echo $i; endfor;");
}

#[test]
fn test_parse_loops() {
    let prog = parse_ok("<?php while (true) {} do { $i++; } while ($i < 3); for (;;) break;");
    assert!(matches!(prog.statements[0].node, Stmt::While(_)));
    assert!(matches!(prog.statements[1].node, Stmt::DoWhile(_)));
    if let Stmt::For { init, cond, step, .. } = &prog.statements[2].node {
        assert!(init.is_empty() && cond.is_empty() && step.is_empty());
    } else {
        panic!("Expected For");
    }
}

#[test]
fn test_parse_for_expression_lists() {
    let prog = parse_ok("<?php for ($i = 0, $j = 5; $i < $j; $i++, $j--) {}");
    if let Stmt::For { init, step, .. } = &prog.statements[0].node {
        assert_eq!(init.len(), 2);
        assert_eq!(step.len(), 2);
    } else {
        panic!("Expected For");
    }
}

#[test]
fn test_parse_break_levels() {
    let prog = parse_ok("<?php break; continue 2;");
    assert_eq!(prog.statements[0].node, Stmt::Break(1));
    assert_eq!(prog.statements[1].node, Stmt::Continue(2));
}

#[test]
fn test_break_zero_fails() {
    let err = parse_program("<?php break 0;").unwrap_err();
    assert_eq!(err.message(), "'break' operator accepts only positive integers");
}

#[test]
fn test_parse_function_definition() {
    let prog = parse_ok("<?php function add(int $a, ?float $b = null, int|string $c = 1): int { return $a; }");
    if let Stmt::FunctionDef(f) = &prog.statements[0].node {
        assert_eq!(f.name.node, "add");
        assert_eq!(f.params.len(), 3);
        assert_eq!(f.params[0].name.node, "$a");
        assert_eq!(f.params[1].ty.as_ref().map(|t| t.to_string()), Some("?float".to_string()));
        assert_eq!(f.params[2].ty.as_ref().map(|t| t.types.len()), Some(2));
        assert_eq!(f.required_params(), 1);
        assert_eq!(f.ret_ty.as_ref().map(|t| t.to_string()), Some("int".to_string()));
        assert_eq!(f.body.len(), 1);
    } else {
        panic!("Expected FunctionDef");
    }
}

#[test]
fn test_every_cast_keyword_works_as_parameter_type() {
    for ty in ["int", "float", "string", "bool", "array"] {
        let prog = parse_ok(&format!("<?php function f({ty} $x, ?{ty} ...$rest): {ty} {{}}"));
        let Stmt::FunctionDef(f) = &prog.statements[0].node else {
            panic!("Expected FunctionDef");
        };
        assert_eq!(f.params[0].ty.as_ref().map(|t| t.to_string()), Some(ty.to_string()));
        assert_eq!(f.ret_ty.as_ref().map(|t| t.to_string()), Some(ty.to_string()));
    }
}

#[test]
fn test_parse_variadic_parameter() {
    let prog = parse_ok("<?php function f($a, int ...$rest) {}");
    if let Stmt::FunctionDef(f) = &prog.statements[0].node {
        assert!(f.is_variadic());
        assert!(!f.params[0].variadic);
        assert_eq!(f.required_params(), 1);
    } else {
        panic!("Expected FunctionDef");
    }
    assert!(parse_fails("<?php function f(...$a, $b) {}"));
    assert!(parse_fails("<?php function f(...$a = []) {}"));
}

#[test]
fn test_function_ids_are_unique() {
    let prog = parse_ok("<?php function a() {} function b() {}");
    let ids: Vec<_> = prog
        .statements
        .iter()
        .filter_map(|s| match &s.node {
            Stmt::FunctionDef(f) => Some(f.id),
            _ => None,
        })
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_parse_const_global_unset() {
    let prog = parse_ok("<?php const A = 1, B = 2; global $x, $y; unset($x, $a['k']);");
    assert!(matches!(&prog.statements[0].node, Stmt::Const(items) if items.len() == 2));
    if let Stmt::Global(names) = &prog.statements[1].node {
        assert_eq!(names[0].node, "x");
    } else {
        panic!("Expected Global");
    }
    assert!(matches!(&prog.statements[2].node, Stmt::Unset(targets) if targets.len() == 2));
}

#[test]
fn test_unset_requires_variable() {
    assert!(parse_fails("<?php unset(1);"));
}

#[test]
fn test_missing_semicolon_fails() {
    let err = parse_program("<?php echo 1").unwrap_err();
    assert_eq!(err.message(), "syntax error, unexpected end of file, expecting \";\"");
}

#[test]
fn test_unexpected_token_message() {
    let err = parse_program("<?php echo ;").unwrap_err();
    assert_eq!(err.message(), "syntax error, unexpected token \";\"");
}

#[test]
fn test_unclosed_block_fails() {
    assert!(parse_fails("<?php if (1) { echo 1;"));
}

// ============================================
// Operator precedence
// ============================================

#[test]
fn test_multiplication_binds_tighter() {
    if let Expr::Binary { op, right, .. } = expr_of("1 + 2 * 3") {
        assert_eq!(op, BinOp::Add);
        assert!(matches!(right.node, Expr::Binary { op: BinOp::Mul, .. }));
    } else {
        panic!("Expected Binary");
    }
}

#[test]
fn test_concat_is_below_additive() {
    if let Expr::Binary { op, right, .. } = expr_of("'a' . 1 + 2") {
        assert_eq!(op, BinOp::Concat);
        assert!(matches!(right.node, Expr::Binary { op: BinOp::Add, .. }));
    } else {
        panic!("Expected Binary");
    }
}

#[test]
fn test_pow_is_right_assoc_and_above_negation() {
    if let Expr::Unary { op, expr } = expr_of("-2 ** 3 ** 2") {
        assert_eq!(op, UnOp::Neg);
        if let Expr::Binary { op, right, .. } = &expr.node {
            assert_eq!(*op, BinOp::Pow);
            assert!(matches!(right.node, Expr::Binary { op: BinOp::Pow, .. }));
        } else {
            panic!("Expected Pow");
        }
    } else {
        panic!("Expected Unary");
    }
}

#[test]
fn test_keyword_and_is_below_assignment() {
    if let Expr::Binary { left, op, .. } = expr_of("$a = true and false") {
        assert_eq!(op, BinOp::And);
        assert!(matches!(left.node, Expr::Assign { .. }));
    } else {
        panic!("Expected Binary");
    }
}

#[test]
fn test_chained_assignment_is_right_assoc() {
    if let Expr::Assign { target, value } = expr_of("$a = $b = $c = 42") {
        assert_eq!(target.node, var("a"));
        assert!(matches!(value.node, Expr::Assign { .. }));
    } else {
        panic!("Expected Assign");
    }
}

#[test]
fn test_assignment_inside_binary_operand() {
    if let Expr::Binary { right, .. } = expr_of("1 + $a = 2") {
        assert!(matches!(right.node, Expr::Assign { .. }));
    } else {
        panic!("Expected Binary");
    }
}

#[test]
fn test_compound_assignment_ops() {
    for (code, expected) in [
        ("$a += 1", BinOp::Add),
        ("$a .= 'x'", BinOp::Concat),
        ("$a **= 2", BinOp::Pow),
        ("$a <<= 1", BinOp::Shl),
        ("$a %= 3", BinOp::Mod),
    ] {
        assert!(
            matches!(expr_of(code), Expr::CompoundAssign { op, .. } if op == expected),
            "{code}"
        );
    }
    assert!(matches!(expr_of("$a ??= 1"), Expr::CoalesceAssign { .. }));
}

#[test]
fn test_ternary_and_short_ternary() {
    assert!(matches!(expr_of("$a ? 1 : 2"), Expr::Ternary { then_branch: Some(_), .. }));
    assert!(matches!(expr_of("$a ?: 2"), Expr::Ternary { then_branch: None, .. }));
}

#[test]
fn test_coalesce_is_right_assoc() {
    if let Expr::Coalesce { right, .. } = expr_of("$a ?? $b ?? 3") {
        assert!(matches!(right.node, Expr::Coalesce { .. }));
    } else {
        panic!("Expected Coalesce");
    }
}

#[test]
fn test_not_equal_forms() {
    assert!(matches!(expr_of("1 <> 2"), Expr::Binary { op: BinOp::Ne, .. }));
    assert!(matches!(expr_of("1 <=> 2"), Expr::Binary { op: BinOp::Spaceship, .. }));
    assert!(matches!(expr_of("1 === 2"), Expr::Binary { op: BinOp::Identical, .. }));
}

// ============================================
// Primary expressions
// ============================================

#[test]
fn test_literal_keywords_ignore_case() {
    assert_eq!(expr_of("TRUE"), Expr::Bool(true));
    assert_eq!(expr_of("False"), Expr::Bool(false));
    assert_eq!(expr_of("NULL"), Expr::Null);
    assert_eq!(expr_of("PHP_EOL"), Expr::Const("PHP_EOL".to_string()));
    assert_eq!(expr_of("__line__"), Expr::Magic(MagicConst::Line));
}

#[test]
fn test_variable_variables() {
    let expected = Expr::Variable(VarName::Dynamic(Box::new(crate::ast::Spanned::new(
        Expr::Variable(VarName::Dynamic(Box::new(crate::ast::Spanned::new(
            var("v"),
            crate::ast::Span::new(8, 10),
        )))),
        crate::ast::Span::new(7, 10),
    ))));
    assert_eq!(expr_of("$$$v"), expected);
    assert!(matches!(expr_of("${'a' . 'b'}"), Expr::Variable(VarName::Dynamic(_))));
}

#[test]
fn test_subscript_and_append() {
    if let Expr::Assign { target, .. } = expr_of("$a[] = 1") {
        assert!(matches!(target.node, Expr::Subscript { index: None, .. }));
    } else {
        panic!("Expected Assign");
    }
    assert!(matches!(expr_of("$a['x'][0]"), Expr::Subscript { index: Some(_), .. }));
}

#[test]
fn test_array_literals() {
    if let Expr::Array(items) = expr_of("[1, 'k' => 2, ]") {
        assert_eq!(items.len(), 2);
        assert!(items[0].key.is_none());
        assert!(items[1].key.is_some());
    } else {
        panic!("Expected Array");
    }
    assert!(matches!(expr_of("array(1, 2)"), Expr::Array(items) if items.len() == 2));
    assert!(matches!(expr_of("[]"), Expr::Array(items) if items.is_empty()));
}

#[test]
fn test_calls() {
    if let Expr::Call { callee, args } = expr_of("strlen('abc')") {
        assert_eq!(callee, Callee::Name("strlen".to_string()));
        assert_eq!(args.len(), 1);
    } else {
        panic!("Expected Call");
    }
    assert!(matches!(expr_of("$fn(1, 2)"), Expr::Call { callee: Callee::Dynamic(_), .. }));
}

#[test]
fn test_casts_and_unary() {
    assert!(matches!(expr_of("(int) '5'"), Expr::Cast { ty: CastType::Int, .. }));
    assert!(matches!(expr_of("(array) 1"), Expr::Cast { ty: CastType::Array, .. }));
    assert!(matches!(expr_of("!$a"), Expr::Unary { op: UnOp::Not, .. }));
    assert!(matches!(expr_of("~5"), Expr::Unary { op: UnOp::BitNot, .. }));
    assert!(matches!(expr_of("@$a"), Expr::Silence(_)));
}

#[test]
fn test_cast_keyword_prefix_in_call_arguments() {
    for code in ["count(array(1, 2))", "intval(integer_like())", "f(int_value)", "f(( int ) $x)"] {
        assert!(matches!(expr_of(code), Expr::Call { .. }), "{code}");
    }
    assert!(matches!(expr_of("( float ) $x"), Expr::Cast { ty: CastType::Float, .. }));
    assert!(matches!(expr_of("(BOOLEAN) $x"), Expr::Cast { ty: CastType::Bool, .. }));
    assert!(matches!(expr_of("(binary) $x"), Expr::Cast { ty: CastType::String, .. }));
    assert!(matches!(expr_of("(real) $x"), Expr::Cast { ty: CastType::Float, .. }));
}

#[test]
fn test_parenthesized_constant_is_not_a_cast() {
    assert!(matches!(expr_of("(PHP_EOL)"), Expr::Const(_)));
}

#[test]
fn test_parse_foreach_forms() {
    let prog = parse_ok("<?php foreach ($a as $v) echo $v; foreach ($a as $k => $v): endforeach;");
    let Stmt::Foreach(plain) = &prog.statements[0].node else {
        panic!("Expected Foreach");
    };
    assert!(plain.key.is_none());
    assert_eq!(plain.value.node, var("v"));
    let Stmt::Foreach(keyed) = &prog.statements[1].node else {
        panic!("Expected Foreach");
    };
    assert_eq!(keyed.key.as_ref().map(|k| k.node.clone()), Some(var("k")));
    assert!(parse_fails("<?php foreach ($a as &$v) {}"));
    assert!(parse_fails("<?php foreach ($a as 1) {}"));
}

#[test]
fn test_parse_include_and_eval() {
    assert!(matches!(
        expr_of("require_once 'lib' . '.php'"),
        Expr::Include { kind: IncludeKind::RequireOnce, .. }
    ));
    assert!(matches!(expr_of("include('a.php')"), Expr::Include { kind: IncludeKind::Include, .. }));
    assert!(matches!(expr_of("eval('echo 1;')"), Expr::Eval(_)));
}

#[test]
fn test_increment_forms() {
    assert!(matches!(
        expr_of("++$a"),
        Expr::IncDec { op: IncDecOp::Inc, prefix: true, .. }
    ));
    assert!(matches!(
        expr_of("$a--"),
        Expr::IncDec { op: IncDecOp::Dec, prefix: false, .. }
    ));
    assert!(parse_fails("<?php ++1;"));
}

#[test]
fn test_intrinsics() {
    assert!(matches!(expr_of("isset($a, $b['k'])"), Expr::Isset(args) if args.len() == 2));
    assert!(matches!(expr_of("empty($a)"), Expr::Empty(_)));
    assert!(matches!(expr_of("exit"), Expr::Exit(None)));
    assert!(matches!(expr_of("die()"), Expr::Exit(None)));
    assert!(matches!(expr_of("exit(3)"), Expr::Exit(Some(_))));
    assert!(matches!(expr_of("print 'x'"), Expr::Print(_)));
}

// ============================================
// Double-quoted strings
// ============================================

#[test]
fn test_plain_double_quoted_is_str() {
    assert_eq!(expr_of(r#""a\tb\x41\101\u{1F600}\$x""#), Expr::Str("a\tbAA\u{1F600}$x".to_string()));
}

#[test]
fn test_unknown_escape_is_kept() {
    assert_eq!(expr_of(r#""a\qb""#), Expr::Str(r"a\qb".to_string()));
}

#[test]
fn test_simple_interpolation() {
    if let Expr::Interpolated(parts) = expr_of(r#""Hi $name!""#) {
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], StrPart::Lit("Hi ".to_string()));
        assert!(matches!(&parts[1], StrPart::Expr(e) if e.node == var("name")));
        assert_eq!(parts[2], StrPart::Lit("!".to_string()));
    } else {
        panic!("Expected Interpolated");
    }
}

#[test]
fn test_interpolated_subscripts() {
    if let Expr::Interpolated(parts) = expr_of(r#""$a[k] $a[0] $a[$i]""#) {
        let subscripts = parts
            .iter()
            .filter(|p| matches!(p, StrPart::Expr(e) if matches!(e.node, Expr::Subscript { .. })))
            .count();
        assert_eq!(subscripts, 3);
    } else {
        panic!("Expected Interpolated");
    }
}

#[test]
fn test_braced_interpolation() {
    if let Expr::Interpolated(parts) = expr_of(r#""{$a['k']}x""#) {
        assert!(matches!(&parts[0], StrPart::Expr(e) if matches!(e.node, Expr::Subscript { .. })));
        assert_eq!(parts[1], StrPart::Lit("x".to_string()));
    } else {
        panic!("Expected Interpolated");
    }
}

#[test]
fn test_dollar_brace_interpolation() {
    if let Expr::Interpolated(parts) = expr_of(r#""${name}s""#) {
        assert!(matches!(&parts[0], StrPart::Expr(e) if e.node == var("name")));
    } else {
        panic!("Expected Interpolated");
    }
}

#[test]
fn test_lone_dollar_is_literal() {
    assert_eq!(expr_of(r#""costs $5""#), Expr::Str("costs $5".to_string()));
}

#[test]
fn test_unterminated_brace_fails() {
    assert!(parse_fails(r#"<?php "{$a";"#));
}
