//! Integration tests for phpi
//!
//! Whole scripts go through `Interpreter::process`; assertions are on the
//! printed output, the fatal error text and the exit code.

use phpi::interp::{Interpreter, PhpError};
use phpi::{Config, Request};

fn interpreter() -> Interpreter {
    Interpreter::new(Config::dev().with_filename("test.php"), Request::default())
}

/// Output of a script that must finish without a fatal error
fn run(source: &str) -> String {
    let (output, error) = interpreter().process(source);
    assert_eq!(error, None, "unexpected fatal error, output so far: {output}");
    output
}

/// Output so far plus the fatal error that stopped the script
fn run_fatal(source: &str) -> (String, PhpError) {
    let (output, error) = interpreter().process(source);
    match error {
        Some(err) => (output, err),
        None => panic!("script finished without an error: {output}"),
    }
}

// ============================================
// Values and coercion
// ============================================

#[test]
fn test_boolean_conversion_table() {
    let source = r#"<?php
        $values = [0, 1, -1, 0.0, 0.5, "", "0", "0.0", "a", null, [], [42]];
        $i = 0;
        while ($i < count($values)) {
            echo $values[$i] ? 'T' : 'F';
            $i++;
        }"#;
    assert_eq!(run(source), "FTTFTFFTTFFT");
}

#[test]
fn test_integer_coercion_is_idempotent() {
    let source = r#"<?php
        var_dump((int) "12abc", (int) (int) "12abc", (int) 3.99, (int) (int) 3.99, (int) true, (int) null);"#;
    assert_eq!(run(source), "int(12)\nint(12)\nint(3)\nint(3)\nint(1)\nint(0)\n");
}

#[test]
fn test_numeric_promotion() {
    let source = "<?php var_dump(is_float(PHP_INT_MAX + 1), 7 / 2, 6 / 2, '10' + 5, '1.5' + 1, 7 % 3, -7 % 3, 2 ** 3, 2 ** 0.5 > 1.41);";
    assert_eq!(
        run(source),
        "bool(true)\nfloat(3.5)\nint(3)\nint(15)\nfloat(2.5)\nint(1)\nint(-1)\nint(8)\nbool(true)\n"
    );
}

#[test]
fn test_array_key_canonicalization() {
    let source = r#"<?php
        $a = [];
        $a["5"] = 'string five';
        $a[5] = 'int five';
        $a["05"] = 'padded';
        $a[true] = 'bool';
        $a[null] = 'null';
        $a[1.7] = 'float';
        var_dump($a);"#;
    assert_eq!(
        run(source),
        "array(4) {\n  [5]=>\n  string(8) \"int five\"\n  [\"05\"]=>\n  string(6) \"padded\"\n  [1]=>\n  string(5) \"float\"\n  [\"\"]=>\n  string(4) \"null\"\n}\n"
    );
}

// ============================================
// Variables and assignment
// ============================================

#[test]
fn test_variable_variables() {
    assert_eq!(run(r#"<?php $var = "hi"; $$var = "hello"; echo $hi, ${'h' . 'i'};"#), "hellohello");
}

#[test]
fn test_chained_assignment() {
    assert_eq!(
        run("<?php $a = $b = $c = 42; var_dump($a == 42 && $b == 42 && $c == 42);"),
        "bool(true)\n"
    );
}

#[test]
fn test_compound_assignment_sequence() {
    assert_eq!(run("<?php $a = 42; $a += 2; echo $a, ' '; $a += $a; echo $a;"), "44 88");
    assert_eq!(
        run("<?php $s = 'a'; $s .= 'b'; $n = 10; $n -= 3; $n *= 2; $n **= 2; $n %= 100; $m = null; $m ??= 'x'; echo $s, $n, $m;"),
        "ab96x"
    );
}

#[test]
fn test_increment_rules() {
    let source = "<?php $s = 'a'; $s++; $t = 'Az'; $t++; $u = 'zz'; $u++; $n = null; $n++; $d = null; $d--;
        var_dump($s, $t, $u, $n, $d);";
    assert_eq!(
        run(source),
        "string(1) \"b\"\nstring(2) \"Ba\"\nstring(3) \"aaa\"\nint(1)\nNULL\n"
    );
}

#[test]
fn test_arrays_copy_on_assignment_and_call() {
    let source = "<?php
        function append($list) { $list[] = 'added'; return count($list); }
        $a = [1, 2];
        $b = $a;
        $b[] = 3;
        echo count($a), count($b), append($a), count($a);";
    assert_eq!(run(source), "2332");
}

// ============================================
// Comparison
// ============================================

#[test]
fn test_identity_comparison() {
    let source = "<?php var_dump('234' === 234, [1, 2] === [1, 2], [1, 2] === [2, 1], 1.0 === 1, null === null);";
    assert_eq!(run(source), "bool(false)\nbool(true)\nbool(false)\nbool(false)\nbool(true)\n");
}

#[test]
fn test_loose_comparison() {
    let source = "<?php var_dump('234' == 234, '1e3' == '1000', 'abc' == 0, null == false, [] == false, '' == null, 'a' < 'b', 1 <=> 2, [1, 2] == [2 => 1]);";
    assert_eq!(
        run(source),
        "bool(true)\nbool(true)\nbool(false)\nbool(true)\nbool(true)\nbool(true)\nbool(true)\nint(-1)\nbool(false)\n"
    );
}

// ============================================
// Control flow
// ============================================

#[test]
fn test_break_two_levels() {
    let source = "<?php
        for ($i = 0; $i < 3; $i++) {
            for ($j = 0; $j < 3; $j++) {
                if ($j == 1) continue 1;
                if ($i == 1) break 2;
                echo $i, $j, ',';
            }
        }
        echo 'done';";
    assert_eq!(run(source), "00,02,done");
}

#[test]
fn test_alternative_syntax() {
    let source = "<?php $n = 3; while ($n > 0): echo $n; $n--; endwhile;
        if ($n == 0): echo ' zero'; elseif ($n > 0): echo ' pos'; else: echo ' neg'; endif;
        for ($i = 0; $i < 2; $i++): echo $i; endfor;";
    assert_eq!(run(source), "321 zero01");
}

#[test]
fn test_logical_operators_short_circuit() {
    let source = "<?php
        function side($v) { echo 's'; return $v; }
        var_dump(false && side(true), true || side(false), true xor true, (false or side(1)));";
    assert_eq!(run(source), "sbool(false)\nbool(true)\nbool(false)\nbool(true)\n");
}

#[test]
fn test_exit_stops_everything() {
    let mut interp = interpreter();
    let (output, error) = interp.process("<?php function f() { echo 'in'; exit(4); } f(); echo 'after';");
    assert_eq!((output.as_str(), error), ("in", None));
    assert_eq!(interp.exit_code(), 4);
}

// ============================================
// Functions
// ============================================

#[test]
fn test_recursive_function() {
    let source = "<?php
        function fib(int $n): int { return $n < 2 ? $n : fib($n - 1) + fib($n - 2); }
        echo fib(20);";
    assert_eq!(run(source), "6765");
}

#[test]
fn test_nested_function_definition_is_hoisted() {
    let source = "<?php if (true) { function inner() { return 'inner'; } } echo inner();";
    assert_eq!(run(source), "inner");
}

#[test]
fn test_function_redeclaration_is_fatal() {
    let (_, err) = run_fatal("<?php function f() {} function F() {}");
    assert_eq!(err.message(), "Cannot redeclare F()");
}

#[test]
fn test_function_scope_is_isolated() {
    let source = "<?php $x = 'global'; function f() { return isset($x) ? 'sees' : 'isolated'; } echo f();";
    assert_eq!(run(source), "isolated");
}

#[test]
fn test_nullable_and_union_parameters() {
    let source = "<?php
        function describe(?int $a, int|string $b = 'none') { return gettype($a) . '/' . gettype($b); }
        echo describe(null), ' ', describe(1, 'x'), ' ', describe('7', 2.0);";
    assert_eq!(run(source), "NULL/string integer/string integer/integer");
}

// ============================================
// Native calls and validation
// ============================================

#[test]
fn test_native_argument_type_error() {
    let (_, err) = run_fatal("<?php chr('abc');");
    assert_eq!(
        err.message(),
        "Uncaught TypeError: chr(): Argument #1 ($codepoint) must be of type int, string given"
    );
}

#[test]
fn test_native_argument_count_errors() {
    let (_, err) = run_fatal("<?php strlen();");
    assert_eq!(err.message(), "Uncaught ArgumentCountError: strlen() expects exactly 1 argument, 0 given");
    let (_, err) = run_fatal("<?php strlen('a', 'b');");
    assert_eq!(err.message(), "Uncaught ArgumentCountError: strlen() expects exactly 1 argument, 2 given");
    let (_, err) = run_fatal("<?php round();");
    assert_eq!(err.message(), "Uncaught ArgumentCountError: round() expects at least 1 argument, 0 given");
}

#[test]
fn test_undefined_function_and_constant() {
    let (output, err) = run_fatal("<?php echo 'before'; nope();");
    assert_eq!(output, "before");
    assert_eq!(err.message(), "Uncaught Error: Call to undefined function nope()");
    let (_, err) = run_fatal("<?php echo MISSING;");
    assert_eq!(err.message(), "Uncaught Error: Undefined constant \"MISSING\"");
}

#[test]
fn test_division_by_zero() {
    let (_, err) = run_fatal("<?php echo 1 / 0;");
    assert_eq!(err.message(), "Uncaught DivisionByZeroError: Division by zero");
    let (_, err) = run_fatal("<?php echo 1 % 0;");
    assert_eq!(err.message(), "Uncaught DivisionByZeroError: Modulo by zero");
}

#[test]
fn test_unsupported_operands() {
    let (_, err) = run_fatal("<?php $x = [1] + 1;");
    assert_eq!(err.message(), "Uncaught TypeError: Unsupported operand types: array + int");
    assert_eq!(run("<?php print_r([1, 2] + [5, 6, 7]);"), "Array\n(\n    [0] => 1\n    [1] => 2\n    [2] => 7\n)\n");
}

// ============================================
// Output and diagnostics
// ============================================

#[test]
fn test_output_buffer_nesting() {
    let source = "<?php echo 0; ob_start(); ob_start(); ob_start(); ob_start(); echo 1; ob_end_flush();
        echo 2; $x=ob_get_clean(); echo 3; ob_flush(); ob_end_clean(); echo 4; ob_end_flush(); echo '-'.$x;";
    assert_eq!(run(source), "034-12");
}

#[test]
fn test_fatal_error_keeps_buffered_output() {
    let (output, err) = run_fatal("<?php ob_start(); echo 'buffered'; intdiv(1, 0);");
    assert_eq!(output, "buffered");
    assert_eq!(err.to_string(), "Fatal error: Uncaught DivisionByZeroError: Division by zero");
}

#[test]
fn test_warnings_are_inline_and_maskable() {
    let source = "<?php\n$a = [];\necho $a['k'], 'x';\nerror_reporting(E_ALL & ~E_WARNING);\necho $a['k'], 'y';";
    assert_eq!(run(source), "\nWarning: Undefined array key \"k\" in test.php:3:6\nxy");
}

#[test]
fn test_string_interpolation() {
    let source = r#"<?php $name = 'World'; $list = ['a' => 'A', 2 => 'two']; $n = 3;
        echo "Hello, $name! {$list['a']} $list[2] {$n}rd\t\x41\u{1F600}\\\$";"#;
    assert_eq!(run(source), "Hello, World! A two 3rd\tA\u{1F600}\\$");
}

#[test]
fn test_inline_html_and_echo_tag() {
    let source = "<ul>\n<?php $i = 0; while ($i < 2): ?>\n<li><?= $i++ ?></li>\n<?php endwhile; ?>\n</ul>";
    assert_eq!(run(source), "<ul>\n<li>0</li>\n<li>1</li>\n</ul>");
}

#[test]
fn test_superglobals_from_request() {
    let request = Request {
        query_string: "page=2&sort=name&tags[]=a&tags[]=b&f[x]=1".to_string(),
        body: "page=9".to_string(),
        cookie: "theme=dark".to_string(),
        args: vec!["first".to_string()],
        ..Request::default()
    };
    let mut interp = Interpreter::new(Config::dev().with_filename("script.php"), request);
    let (output, error) = interp.process(
        "<?php echo $_GET['page'], $_GET['sort'], $_REQUEST['page'], $argc, $argv[1], $_SERVER['SCRIPT_NAME'], count($_FILES);
        echo ' ', implode(',', $_GET['tags']), $_GET['f']['x'], $_COOKIE['theme'];",
    );
    assert_eq!(error, None);
    assert_eq!(output, "2name92firstscript.php0 a,b1dark");
}

#[test]
fn test_config_from_toml() {
    let config = Config::from_toml("error_reporting = 0\nfilename = \"quiet.php\"").unwrap();
    let mut interp = Interpreter::new(config, Request::default());
    let (output, error) = interp.process("<?php echo $undefined, __FILE__;");
    assert_eq!((output.as_str(), error), ("quiet.php", None));
}

#[test]
fn test_typed_parameters_named_like_casts() {
    let source = "<?php
        function describe(int $a, float $b, string $c, bool $d, array $e): string {
            return $a . '|' . $b . '|' . $c . '|' . ($d ? 'T' : 'F') . '|' . count($e);
        }
        echo describe('4', 2, 3, 1, array(1, 2));";
    assert_eq!(run(source), "4|2|3|T|2");
    let (_, err) = run_fatal("<?php function f(int $n) {} f('x');");
    assert_eq!(
        err.message(),
        "Uncaught TypeError: f(): Argument #1 ($n) must be of type int, string given"
    );
}

#[test]
fn test_casts_next_to_calls() {
    let source = "<?php
        echo count(array(1, 2, 3)), (int) '7 apples', (string) 1.5, (bool) '0' ? 'y' : 'n';
        echo implode(',', (array_keys(['a' => 1]))), (array) 'x' === ['x'] ? 'A' : 'B';";
    assert_eq!(run(source), "371.5naA");
}

#[test]
fn test_block_comments() {
    let source = "<?php /* header\n * spans lines */ echo 1 /* inline */ + 2; /**/ echo /* a */ 'x';";
    assert_eq!(run(source), "3x");
    let (output, err) = run_fatal("<?php echo 1; /* not closed");
    assert_eq!(output, "");
    assert_eq!(err.message(), "Unterminated comment in test.php:1:15");
}

#[test]
fn test_foreach_over_nested_data() {
    let source = "<?php
        $people = ['ann' => ['age' => 31], 'bob' => ['age' => 27]];
        $total = 0;
        foreach ($people as $name => $info) {
            $total += $info['age'];
            echo ucfirst($name), ' ';
        }
        foreach ($people as $name => $people[$name]['seen']) {}
        echo $total, ' ', count($people['bob']);";
    assert_eq!(run(source), "Ann Bob 58 2");
}

#[test]
fn test_variadic_sum() {
    let source = "<?php
        function total(string $label, int|float ...$amounts): string {
            return $label . ': ' . array_sum($amounts);
        }
        echo total('none'), '; ', total('some', 1, 2.5, '3');";
    assert_eq!(run(source), "none: 0; some: 6.5");
}

#[test]
fn test_eval_defines_and_returns() {
    let source = "<?php
        $code = 'function twice($x) { return $x * 2; } return twice(21);';
        echo eval($code), ' ', twice(4);";
    assert_eq!(run(source), "42 8");
}

#[test]
fn test_require_once_library() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("math.php"),
        "<?php\nconst FACTOR = 3;\nfunction scale($n) { return $n * FACTOR; }\n",
    )
    .unwrap();
    let main = dir.path().join("index.php");
    let mut interp = Interpreter::new(Config::dev().with_filename(main.display().to_string()), Request::default());
    let (output, error) = interp.process(
        "<?php require_once 'math.php'; require_once __DIR__ . '/math.php'; echo scale(5);",
    );
    assert_eq!(error, None);
    assert_eq!(output, "15");
}

#[test]
fn test_array_stack_functions() {
    let source = "<?php
        $stack = [];
        array_push($stack, 'a', 'b');
        $stack[] = 'c';
        echo array_pop($stack), array_key_last($stack), array_key_first($stack), count($stack);";
    assert_eq!(run(source), "c102");
}

#[test]
fn test_string_and_date_additions() {
    let source = "<?php echo substr('interpreter', 5, 4), ' ', md5('phpi') === md5('phpi') ? 'same' : 'diff', ' ',
        date('Y-m-d', mktime(0, 0, 0, 2, 30, 2024)), ' ', getdate(0)['weekday'];";
    assert_eq!(run(source), "pret same 2024-03-01 Thursday");
}
