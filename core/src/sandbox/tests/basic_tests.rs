//! Core language semantics

use super::helpers::{run_error, run_script, run_script_with, run_to_string};
use crate::sandbox::{ExecError, Val};

/* ===================== Expressions ===================== */

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(run_script("return 1 + 2 * 3 - 4 / 2").unwrap(), Val::Num(5.0));
    assert_eq!(run_script("return 2 ** 3 ** 2").unwrap(), Val::Num(512.0));
    assert_eq!(run_script("return 7 % 3 + (-7 % 3)").unwrap(), Val::Num(0.0));
}

#[test]
fn test_string_concat_and_templates() {
    let source = r#"
        const name = 'x';
        return `hi ${name} ${1 + 1}` + '!' + 3;
    "#;
    assert_eq!(run_to_string(source), "hi x 2!3");
}

#[test]
fn test_equality_operators() {
    let source = r#"
        return [1 == '1', 1 === '1', null == undefined, null === undefined, NaN === NaN]
            .join(',');
    "#;
    assert_eq!(run_to_string(source), "true,false,true,false,false");
}

#[test]
fn test_optional_chaining_and_nullish() {
    let source = r#"
        const o = { a: null, f: null };
        return [o.a?.b, o.x ?? 'd', o.a?.b.c.d, o.f?.(), 0 ?? 1, 0 || 1].map(String).join(',');
    "#;
    assert_eq!(run_to_string(source), "undefined,d,undefined,undefined,0,1");
}

#[test]
fn test_typeof_undeclared_identifier() {
    assert_eq!(run_to_string("return typeof missing"), "undefined");
    assert_eq!(run_to_string("return typeof (() => 1)"), "function");
    assert_eq!(run_to_string("return typeof null"), "object");
}

#[test]
fn test_update_and_compound_assignment() {
    let source = r#"
        let i = 1;
        const a = i++;
        const b = ++i;
        i *= 10;
        let s = null;
        s ??= 'set';
        return [a, b, i, s].join(',');
    "#;
    assert_eq!(run_to_string(source), "1,3,30,set");
}

/* ===================== Bindings ===================== */

#[test]
fn test_let_bindings_are_fresh_per_iteration() {
    let source = r#"
        const fns = [];
        for (let i = 0; i < 3; i++) {
            fns.push(() => i);
        }
        return fns.map(f => f()).join(',');
    "#;
    assert_eq!(run_to_string(source), "0,1,2");
}

#[test]
fn test_object_destructuring_with_defaults_and_rest() {
    let source = r#"
        const { a, b: { c = 5 }, ...rest } = { a: 1, b: {}, d: 4, e: 5 };
        return [a, c, Object.keys(rest).join('')].join('-');
    "#;
    assert_eq!(run_to_string(source), "1-5-de");
}

#[test]
fn test_array_destructuring_with_holes_and_rest() {
    let source = r#"
        const [x, , y = 3, ...zs] = [1, 2, undefined, 4, 5];
        return x + y + zs.length;
    "#;
    assert_eq!(run_script(source).unwrap(), Val::Num(6.0));
}

#[test]
fn test_function_hoisting_and_var() {
    let source = r#"
        const r = double(4);
        function double(n) { return n * 2; }
        if (true) { var late = 'v'; }
        return r + late;
    "#;
    assert_eq!(run_to_string(source), "8v");
}

#[test]
fn test_closures_capture_variables() {
    let source = r#"
        function counter() {
            let n = 0;
            return { inc: () => ++n, get: () => n };
        }
        const c = counter();
        c.inc();
        c.inc();
        return c.get();
    "#;
    assert_eq!(run_script(source).unwrap(), Val::Num(2.0));
}

#[test]
fn test_recursion_depth() {
    let source = r#"
        function depth(n) { return n === 0 ? 0 : 1 + depth(n - 1); }
        return [depth(100), depth(900)].join();
    "#;
    assert_eq!(run_to_string(source), "100,900");
    assert_eq!(
        run_error("function down(n) { return down(n + 1); } return down(0);"),
        "RangeError: Maximum call stack size exceeded"
    );
}

/* ===================== Statements ===================== */

#[test]
fn test_loops_and_switch() {
    let source = r#"
        const out = [];
        for (const k in { a: 1, b: 2 }) out.push(k);
        for (const v of [1, 2]) out.push(v);
        let n = 0;
        while (n < 3) { n++; if (n === 2) continue; out.push('w' + n); }
        do { n--; } while (n > 0);
        switch (n) {
            case 0:
                out.push('zero');
            case 1:
                out.push('fall');
                break;
            default:
                out.push('never');
        }
        return out.join(',');
    "#;
    assert_eq!(run_to_string(source), "a,b,1,2,w1,w3,zero,fall");
}

#[test]
fn test_try_catch_finally() {
    let source = r#"
        const log = [];
        try {
            log.push('a');
            throw new Error('boom');
        } catch (e) {
            log.push(e.message);
        } finally {
            log.push('f');
        }
        return log.join(',');
    "#;
    assert_eq!(run_to_string(source), "a,boom,f");
}

/* ===================== Classes ===================== */

#[test]
fn test_class_inheritance() {
    let source = r#"
        class Animal {
            constructor(name) { this.name = name; }
            speak() { return `${this.name} makes a sound`; }
        }
        class Dog extends Animal {
            constructor(name) { super(name); this.kind = 'dog'; }
            bark() { return this.speak() + '!'; }
        }
        const d = new Dog('Rex');
        return [d.bark(), d instanceof Animal, d.kind].join('|');
    "#;
    assert_eq!(run_to_string(source), "Rex makes a sound!|true|dog");
}

#[test]
fn test_class_fields_and_statics() {
    let source = r#"
        class C {
            static count = 2;
            value = C.count * 2;
            handler = () => this.value + 1;
        }
        const c = new C();
        const h = c.handler;
        return h();
    "#;
    assert_eq!(run_script(source).unwrap(), Val::Num(5.0));
}

#[test]
fn test_error_subclass_message() {
    let source = r#"
        class MyErr extends Error {
            constructor(m) { super(m); this.name = 'MyErr'; }
        }
        throw new MyErr('bad');
    "#;
    assert_eq!(run_error(source), "MyErr: bad");
}

/* ===================== Errors ===================== */

#[test]
fn test_reference_error_message() {
    assert_eq!(
        run_error("return foo + 1"),
        "ReferenceError: foo is not defined"
    );
}

#[test]
fn test_const_reassignment_fails() {
    assert_eq!(
        run_error("const a = 1; a = 2;"),
        "TypeError: Assignment to constant variable."
    );
}

#[test]
fn test_temporal_dead_zone() {
    assert_eq!(
        run_error("x; let x = 1;"),
        "ReferenceError: Cannot access 'x' before initialization"
    );
}

#[test]
fn test_calling_non_function() {
    assert_eq!(
        run_error("const o = {}; o.missing();"),
        "TypeError: o.missing is not a function"
    );
}

#[test]
fn test_reading_property_of_undefined() {
    assert_eq!(
        run_error("const o = {}; return o.a.b;"),
        "TypeError: Cannot read properties of undefined (reading 'b')"
    );
}

#[test]
fn test_thrown_non_error_values() {
    assert_eq!(run_error("throw 'plain'"), "Uncaught: plain");
}

/* ===================== Budget ===================== */

#[test]
fn test_infinite_loop_exhausts_budget() {
    let (result, _) = run_script_with("while (true) {}", 10_000);
    assert_eq!(result, Err(ExecError::runtime("execution budget exceeded")));
}

#[test]
fn test_budget_cannot_be_caught() {
    let source = r#"
        try {
            while (true) {}
        } catch (e) {
            return 'caught';
        } finally {
            return 'finally';
        }
    "#;
    let (result, _) = run_script_with(source, 10_000);
    assert_eq!(result, Err(ExecError::runtime("execution budget exceeded")));
}
