//! Module loader scenarios from §4.4/§8: resolution, exports caching, and
//! tolerance of `require` cycles.

use clou::{Clou, NoPrint};
use pretty_assertions::assert_eq;

fn engine_with(files: &[(&str, &str)]) -> Clou {
    let mut engine = Clou::new();
    engine.set_print(NoPrint);
    for (path, content) in files {
        engine.module_store().add_file(*path, *content);
    }
    engine
}

#[test]
fn require_returns_the_exported_function() {
    let mut engine = engine_with(&[
        ("math.clou", "function add(a,b){return a+b;} exports.add = add;"),
        ("main.clou", r#"const m = require("./math.clou"); print(m.add(2,3));"#),
    ]);
    let sink = collecting(&mut engine);
    engine.run_file("main.clou").unwrap();
    assert_eq!(sink.borrow().clone(), vec!["5"]);
}

#[test]
fn cached_require_returns_the_same_exports_identity() {
    let src = r#"
        const a = require("math.clou");
        const b = require("math.clou");
        print(a == b);
    "#;
    let mut engine = engine_with(&[
        ("math.clou", "exports.value = 1;"),
        ("main.clou", src),
    ]);
    let sink = collecting(&mut engine);
    engine.run_file("main.clou").unwrap();
    assert_eq!(sink.borrow().clone(), vec!["true"]);
}

#[test]
fn circular_dependency_completes_with_partial_exports() {
    let mut engine = engine_with(&[
        (
            "a.clou",
            r#"const b = require("./b.clou");
               function getValue() { return "A" + b.getValue(); }
               exports.getValue = getValue;"#,
        ),
        (
            "b.clou",
            r#"const a = require("./a.clou");
               function getValue() { return "B" + a.getValue(); }
               exports.getValue = getValue;"#,
        ),
        (
            "main.clou",
            r#"const a = require("./a.clou"); print("Value: " + a.getValue());"#,
        ),
    ]);
    let sink = collecting(&mut engine);
    engine.run_file("main.clou").unwrap();
    assert_eq!(sink.borrow().clone(), vec!["Value: AB"]);
}

#[test]
fn module_not_found_is_a_runtime_error() {
    let mut engine = engine_with(&[("main.clou", r#"require("nope.clou");"#)]);
    let err = engine.run_file("main.clou").unwrap_err();
    assert!(err.to_string().contains("Module not found"));
}

#[test]
fn extensionless_require_resolves_against_module_store() {
    let mut engine = engine_with(&[
        ("lib/math.clou", "exports.two = 2;"),
        ("main.clou", r#"const m = require("./lib/math"); print(m.two);"#),
    ]);
    let sink = collecting(&mut engine);
    engine.run_file("main.clou").unwrap();
    assert_eq!(sink.borrow().clone(), vec!["2"]);
}

fn collecting(engine: &mut Clou) -> std::rc::Rc<std::cell::RefCell<Vec<String>>> {
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedPrint(Rc<RefCell<Vec<String>>>);
    impl clou::PrintWriter for SharedPrint {
        fn print_line(&mut self, line: &str) {
            self.0.borrow_mut().push(line.to_string());
        }
    }

    let sink = SharedPrint::default();
    let handle = Rc::clone(&sink.0);
    engine.set_print(sink);
    handle
}
