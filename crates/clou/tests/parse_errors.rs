//! Negative scenarios from §8: each input should fail with an error whose
//! message contains the documented substring.

use clou::{Clou, NoPrint};
use pretty_assertions::assert_eq;

fn run_err(path: &str, source: &str) -> String {
    let mut engine = Clou::new();
    engine.set_print(NoPrint);
    engine.module_store().add_file(path, source);
    engine.run_file(path).unwrap_err().to_string()
}

#[test]
fn undefined_variable() {
    let msg = run_err("main.clou", "print(x);");
    assert!(msg.contains("Undefined variable 'x'"), "got: {msg}");
}

#[test]
fn const_reassignment() {
    let msg = run_err("main.clou", "const x = 10; x = 20;");
    assert!(msg.contains("Cannot reassign const variable 'x'"), "got: {msg}");
}

#[test]
fn division_by_zero() {
    let msg = run_err("main.clou", "let x=10; let y=0; let z=x/y;");
    assert!(msg.contains("Division by zero"), "got: {msg}");
}

#[test]
fn modulo_by_zero() {
    let msg = run_err("main.clou", "let x=10; let y=0; let z=x%y;");
    assert!(msg.contains("Modulo by zero"), "got: {msg}");
}

#[test]
fn array_index_out_of_bounds() {
    let msg = run_err("main.clou", "let a=[1,2,3]; print(a[10]);");
    assert!(msg.contains("Array index out of bounds"), "got: {msg}");
}

#[test]
fn calling_a_non_function() {
    let msg = run_err("main.clou", "let x = 10; x();");
    assert!(msg.contains("Can only call functions and classes"), "got: {msg}");
}

#[test]
fn missing_semicolon_after_var_declaration() {
    let msg = run_err("main.clou", "let x=10\nprint(x);");
    assert!(msg.contains("Expect ';' after variable declaration"), "got: {msg}");
}

#[test]
fn const_without_initializer() {
    let msg = run_err("main.clou", "const x;");
    assert!(msg.contains("Expect initializer for const declaration"), "got: {msg}");
}

#[test]
fn invalid_assignment_target() {
    let msg = run_err("main.clou", "1 + 2 = 3;");
    assert!(msg.contains("Invalid assignment target"), "got: {msg}");
}

#[test]
fn new_on_a_non_class() {
    let msg = run_err("main.clou", "let NotAClass = 5; let x = new NotAClass();");
    assert!(msg.contains("Can only construct instances of classes"), "got: {msg}");
}

#[test]
fn super_outside_subclass_method() {
    let msg = run_err(
        "main.clou",
        "class A { function init(){} function m(){ super.init(); } } let a = new A(); a.m();",
    );
    assert!(msg.contains("'super' used outside"), "got: {msg}");
}

#[test]
fn unterminated_string_reports_lex_error() {
    let msg = run_err("main.clou", "let x = \"unterminated;");
    assert!(msg.contains("Unterminated string"), "got: {msg}");
}

#[test]
fn too_many_parameters_is_rejected() {
    let mut params = String::new();
    for i in 0..256 {
        if i > 0 {
            params.push(',');
        }
        params.push_str(&format!("p{i}"));
    }
    let source = format!("function f({params}) {{ return 0; }}");
    let msg = run_err("main.clou", &source);
    assert_eq!(msg, "[line 1] Can't have more than 255 parameters");
}
