//! End-to-end tests: source files on disk through to generated Python, and
//! (when an interpreter is available) the behavior of the generated program.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use pretty_assertions::assert_eq;
use snake::{compile, compile_source, compile_with, CompileOptions, Stage};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

fn compile_text(source: &str) -> Result<String, Vec<snake::Diagnostic>> {
    compile_source(source, "test.sk", &CompileOptions::default())
}

fn kinds(source: &str) -> Vec<String> {
    compile_text(source)
        .unwrap_err()
        .into_iter()
        .map(|d| d.kind)
        .collect()
}

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Run generated source, returning (stdout, exit code)
fn run_python(source: &str, args: &[&str]) -> (String, i32) {
    let out = Command::new("python3")
        .arg("-c")
        .arg(source)
        .args(args)
        .env("PYTHONIOENCODING", "utf-8")
        .output()
        .unwrap();
    (String::from_utf8_lossy(&out.stdout).into_owned(), out.status.code().unwrap_or(-1))
}

#[test]
fn test_import_graph_compiles() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "shapes.sk", "struct Point { x: int; y: int }\nconst ORIGIN_X: int = 0;\n");
    write(dir.path(), "util.sk", "import \"shapes.sk\";\ndef shift(p: Point, d: int) -> Point:\n    return Point(p.x + d, p.y);\n");
    let main = write(
        dir.path(),
        "main.sk",
        "import \"util.sk\";\nimport \"shapes.sk\";\np: Point = shift(Point(ORIGIN_X, 2), 3);\nprint(p);\n",
    );

    let py = compile(&main, &[]).unwrap();
    assert_eq!(py.matches("class Point:").count(), 1);
    let class = py.find("class Point:").unwrap();
    let func = py.find("def shift(").unwrap();
    let stmt = py.find("p: Point = shift(").unwrap();
    assert!(class < func && func < stmt);
}

#[test]
fn test_import_cycle_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.sk", "import \"b.sk\";\n");
    write(dir.path(), "b.sk", "import \"a.sk\";\n");
    let main = write(dir.path(), "main.sk", "import \"a.sk\";\n");

    let diagnostics = compile(&main, &[]).unwrap_err();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].stage, Stage::Resolve);
    assert_eq!(diagnostics[0].kind, "ImportCycle");
}

#[test]
fn test_diagnostics_name_the_right_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "lib.sk", "const PI: float = 3.14;\n");
    let main = write(dir.path(), "main.sk", "import \"lib.sk\";\n\nPI = 3.0;\n");

    let diagnostics = compile(&main, &[]).unwrap_err();
    assert_eq!(diagnostics.len(), 1);
    let diag = &diagnostics[0];
    assert_eq!(diag.kind, "ConstantReassignment");
    assert!(diag.file.as_deref().unwrap().ends_with("main.sk"));
    assert_eq!((diag.line, diag.column), (Some(3), Some(1)));
}

#[test]
fn test_library_roots_are_searched() {
    let dir = TempDir::new().unwrap();
    let libs = TempDir::new().unwrap();
    write(libs.path(), "mathx/__main__.sk", "def double(n: int) -> int:\n    return n * 2;\n");
    let main = write(dir.path(), "main.sk", "import \"mathx\";\nprint(double(4));\n");

    assert_eq!(compile(&main, &[]).unwrap_err()[0].kind, "NotFound");
    let py = compile(&main, &[libs.path().to_path_buf()]).unwrap();
    assert!(py.contains("def double(n: int) -> int:"));
}

#[test]
fn test_check_diagnostics_accumulate_in_order() {
    let source = "\
struct Point { x: int; y: int }
p: Point = Point(\"10\", 20);
mixed: list[int] = [1, \"two\", 3];
print(undefined_name);
";
    let diagnostics = compile_text(source).unwrap_err();
    let kinds: Vec<&str> = diagnostics.iter().map(|d| d.kind.as_str()).collect();
    assert_eq!(kinds, vec!["TypeMismatch", "TypeMismatch", "UndefinedSymbol"]);
    assert!(diagnostics[0].message.contains("x"));
    let lines: Vec<Option<usize>> = diagnostics.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![Some(2), Some(3), Some(4)]);
}

#[test]
fn test_failures_by_stage() {
    assert_eq!(kinds("x: int = 1 orelse 2 + (3 orelse 4);"), vec!["InvalidFallbackContext"]);
    assert_eq!(kinds("x: int = );"), vec!["UnexpectedToken"]);
    assert_eq!(kinds("x: int = 1\nprint(x);\n"), vec!["UnexpectedToken"]);
    assert_eq!(kinds("def f(x) -> None:\n    pass;\n"), vec!["MissingTypeAnnotation"]);
    assert_eq!(kinds("const A: int = B;\nconst B: int = A;\n"), vec!["ConstantCycle"]);
    assert_eq!(kinds("const PI: float = 3.14;\nPI = 3.14;\n"), vec!["ConstantReassignment"]);

    let cycle = compile_text("const A: int = B;\nconst B: int = A;\n").unwrap_err();
    assert_eq!(cycle[0].stage, Stage::Fold);
    assert!(cycle[0].message.contains("A -> B -> A"), "{}", cycle[0].message);
}

#[test]
fn test_operator_spelling_does_not_change_output() {
    let words = "a: bool = True;\nif not a or (a and a):\n    print(\"x\");\n";
    let symbols = "a: bool = True;\nif !a || (a && a):\n    print(\"x\");\n";
    assert_eq!(compile_text(words).unwrap(), compile_text(symbols).unwrap());
}

#[test]
fn test_constants_emitted_in_dependency_order() {
    let py = compile_text("const B: int = A * 2;\nconst A: int = 3;\nprint(B);\n").unwrap();
    let expected_tail = "\n\nA: int = 3\nB: int = 6\n\n\nprint(B)\n";
    assert!(py.ends_with(expected_tail), "{}", py);
}

#[test]
fn test_program_name_binds_argv0() {
    let options = CompileOptions {
        search_roots: Vec::new(),
        program_name: Some("prog.sk".to_string()),
    };
    let py = compile_source("print(argc);\n", "prog.sk", &options).unwrap();
    assert!(py.contains("argv = [\"prog.sk\"] + sys.argv[1:]\nargc = len(argv)\n"));
}

#[test]
fn test_fallback_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let source = "\
a: int = int(\"b\") orelse 0;
b: float = float(\"10.5\") orelse 0.0;
c: int = int(\"x\") orelse int(\"y\") orelse 7;
print(a, b, c);
";
    let (out, code) = run_python(&compile_text(source).unwrap(), &[]);
    assert_eq!(code, 0);
    assert_eq!(out, "0 10.5 7\n");
}

#[test]
fn test_argc_argv_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let options = CompileOptions {
        search_roots: Vec::new(),
        program_name: Some("prog.sk".to_string()),
    };
    let py = compile_source("print(argc, argv[0], argv[3]);\n", "prog.sk", &options).unwrap();
    let (out, code) = run_python(&py, &["one", "two", "three"]);
    assert_eq!(code, 0);
    assert_eq!(out, "4 prog.sk three\n");
}

#[test]
fn test_enum_and_struct_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let source = "\
enum Color: RED, GREEN, BLUE
enum Level:
    LOW = 10;
    HIGH = 20;
struct Point { x: int; y: int }

c: Color = Color.GREEN;
print(c.value, Level.HIGH.value, c == Color.GREEN, c == Color.RED);
p: Point = Point(1, 2);
p.x = 5;
print(p);
";
    let (out, code) = run_python(&compile_text(source).unwrap(), &[]);
    assert_eq!(code, 0);
    assert_eq!(out, "1 20 True False\nPoint(x=5, y=2)\n");
}

#[test]
fn test_error_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let source = "\
error NotFound(path: str) -> f\"missing {path}\";

def main() -> None:
    try:
        raise NotFound(\"a.txt\");
    except NotFound as e:
        print(str(e));

main();
";
    let (out, code) = run_python(&compile_text(source).unwrap(), &[]);
    assert_eq!(code, 0);
    assert_eq!(out, "missing a.txt\n");
}

#[test]
fn test_globals_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let source = "\
counter: int = 0;
def bump() -> None:
    counter += 1;
bump();
bump();
print(counter);
";
    let (out, code) = run_python(&compile_text(source).unwrap(), &[]);
    assert_eq!(code, 0);
    assert_eq!(out, "2\n");
}

#[test]
fn test_comparison_chain_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let source = "\
a: any = 1;
b: any = 3;
c: any = 2;
x: int = 5;
print(a < b < c, 0 < x < 10, 1 == 1 != 2);
";
    let (out, code) = run_python(&compile_text(source).unwrap(), &[]);
    assert_eq!(code, 0);
    assert_eq!(out, "False True True\n");
}

#[test]
fn test_constant_from_variable_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let source = "\
const D: int = 4;
base: int = 5;
const C: int = base * 2;
print(C, C + D);
";
    let (out, code) = run_python(&compile_text(source).unwrap(), &[]);
    assert_eq!(code, 0);
    assert_eq!(out, "10 14\n");
}

#[test]
fn test_string_escapes_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let source = r#"s: str = "\x41\u00e9\101\q";
print(s, len(s));
"#;
    let (out, code) = run_python(&compile_text(source).unwrap(), &[]);
    assert_eq!(code, 0);
    assert_eq!(out, "A\u{e9}A\\q 5\n");
}

#[test]
fn test_struct_with_text_field_runtime() {
    if !python_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let source = "\
struct Tag { name: str; count: int }
print(Tag(\"a\", 2));
";
    let (out, code) = run_python(&compile_text(source).unwrap(), &[]);
    assert_eq!(code, 0);
    assert_eq!(out, "Tag(name=a, count=2)\n");
}
