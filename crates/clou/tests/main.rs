//! End-to-end positive scenarios from the public `Clou` API, matching the
//! worked examples enumerated in §8.

use std::cell::RefCell;
use std::rc::Rc;

use clou::{Clou, PrintWriter, Value};
use pretty_assertions::assert_eq;

#[derive(Clone, Default)]
struct SharedPrint(Rc<RefCell<Vec<String>>>);

impl PrintWriter for SharedPrint {
    fn print_line(&mut self, line: &str) {
        self.0.borrow_mut().push(line.to_string());
    }
}

fn run(path: &str, source: &str) -> Vec<String> {
    let mut engine = Clou::new();
    let sink = SharedPrint::default();
    engine.set_print(sink.clone());
    engine.module_store().add_file(path, source);
    engine.run_file(path).unwrap();
    sink.0.borrow().clone()
}

#[test]
fn arithmetic_result() {
    let lines = run("main.clou", r#"let x = 10; const PI = 3.14159; let r = (5+3)*2/(1+1); print("Result:", r);"#);
    assert_eq!(lines, vec!["Result: 8"]);
}

#[test]
fn recursive_fibonacci() {
    let lines = run(
        "main.clou",
        "function fib(n){ if (n <= 1) return n; return fib(n-1)+fib(n-2);} print(fib(10));",
    );
    assert_eq!(lines, vec!["55"]);
}

#[test]
fn inheritance_with_super() {
    let src = r#"
        class A { function init(n){this.n=n;} function s(){print(this.n+" a");}}
        class B extends A {
            function init(n,b){super.init(n); this.b=b;}
            function s(){print(this.n+" b");}
            function d(){print(this.n+" is "+this.b);}
        }
        let x = new B("Rex","GS"); x.s(); x.d();
    "#;
    let lines = run("main.clou", src);
    assert_eq!(lines, vec!["Rex b", "Rex is GS"]);
}

#[test]
fn array_grows_on_out_of_bounds_write() {
    let lines = run("main.clou", "let arr = []; for (let i=0;i<5;i=i+1) arr[i]=i*i; print(arr);");
    assert_eq!(lines, vec!["[0, 1, 4, 9, 16]"]);
}

#[test]
fn closures_capture_their_defining_environment() {
    let src = r#"
        function makeCounter() {
            let count = 0;
            function increment() {
                count = count + 1;
                return count;
            }
            return increment;
        }
        let c1 = makeCounter();
        let c2 = makeCounter();
        print(c1(), c1(), c2());
    "#;
    let lines = run("main.clou", src);
    assert_eq!(lines, vec!["1 2 1"]);
}

#[test]
fn rest_parameter_and_default_parameter() {
    let src = r#"
        function sum(first = 0, ...rest) {
            let total = first;
            for (let i = 0; i < len(rest); i = i + 1) total = total + rest[i];
            return total;
        }
        print(sum());
        print(sum(1, 2, 3));
    "#;
    let lines = run("main.clou", src);
    assert_eq!(lines, vec!["0", "6"]);
}

#[test]
fn object_and_array_print_order() {
    let lines = run("main.clou", r#"let o = {a: 1, b: 2, c: 3}; print(o);"#);
    assert_eq!(lines, vec!["{ a: 1, b: 2, c: 3 }"]);
}

#[test]
fn run_file_returns_value_that_run_prompt_would_echo() {
    let mut engine = Clou::new();
    engine.set_print(clou::NoPrint);
    engine.module_store().add_file("main.clou", "1 + 2;");
    let value = engine.run_file("main.clou").unwrap();
    assert!(matches!(value, Value::Number(n) if n == 3.0));
}
