//! Builtin library and captured console

use super::helpers::{run_error, run_script, run_script_with, run_to_string};
use crate::sandbox::{ConsoleLevel, Val, DEFAULT_MAX_STEPS};

/* ===================== Arrays ===================== */

#[test]
fn test_array_sort_orders() {
    assert_eq!(run_to_string("return [3, 1, 2].sort().join()"), "1,2,3");
    assert_eq!(run_to_string("return [10, 9, 1].sort().join()"), "1,10,9");
    assert_eq!(
        run_to_string("return [10, 9, 1].sort((a, b) => a - b).join()"),
        "1,9,10"
    );
}

#[test]
fn test_array_pipeline() {
    let source = "return [1, 2, 3, 4].filter(n => n % 2 === 0).map(n => n * 10).reduce((a, b) => a + b, 0)";
    assert_eq!(run_script(source).unwrap(), Val::Num(60.0));
}

#[test]
fn test_array_splice_and_mutators() {
    let source = r#"
        const a = [1, 2, 3, 4];
        const removed = a.splice(1, 2, 'x');
        a.unshift(0);
        a.push(9);
        const last = a.pop();
        return a.join() + '|' + removed.join() + '|' + last;
    "#;
    assert_eq!(run_to_string(source), "0,1,x,4|2,3|9");
}

#[test]
fn test_array_search_methods() {
    let source = r#"
        const a = [5, 12, 8, NaN];
        return [
            a.find(n => n > 6),
            a.findIndex(n => n > 6),
            a.includes(NaN),
            a.indexOf(NaN),
            a.some(n => n > 10),
            a.every(n => n > 1),
            a.at(-2),
        ].join();
    "#;
    assert_eq!(run_to_string(source), "12,1,true,-1,true,false,8");
}

#[test]
fn test_array_constructor_statics() {
    let source = r#"
        return [
            Array.isArray([]),
            Array.from('abc').join('-'),
            Array.from({ length: 3 }, (_, i) => i * 2).join(''),
            [[1, [2]], [3]].flat().length,
        ].join();
    "#;
    assert_eq!(run_to_string(source), "true,a-b-c,024,3");
}

#[test]
fn test_reduce_empty_array_without_initial_value() {
    assert_eq!(
        run_error("return [].reduce((a, b) => a + b)"),
        "TypeError: Reduce of empty array with no initial value"
    );
}

#[test]
fn test_self_containing_array_to_string() {
    assert_eq!(run_to_string("const a = [1]; a.push(a); return String(a)"), "1,");
}

/* ===================== Strings & Numbers ===================== */

#[test]
fn test_string_methods() {
    let source = r#"
        return [
            '  Hello World '.trim().toUpperCase().split(' ').join('-'),
            '5'.padStart(3, '0'),
            'a-b-c'.replaceAll('-', '+'),
            'a-b-c'.replace('-', '+'),
            'abcdef'.slice(-3),
            'abc'.includes('bc'),
            'x'.repeat(3),
        ].join(' ');
    "#;
    assert_eq!(
        run_to_string(source),
        "HELLO-WORLD 005 a+b+c a+b-c def true xxx"
    );
}

#[test]
fn test_number_formatting() {
    let source = r#"
        return [
            (1234.5678).toFixed(2),
            (255).toString(16),
            (1234567.891).toLocaleString(),
            String(0.1 + 0.2),
            String(1 / 0),
        ].join(' ');
    "#;
    assert_eq!(
        run_to_string(source),
        "1234.57 ff 1,234,567.891 0.30000000000000004 Infinity"
    );
}

#[test]
fn test_number_parsing_globals() {
    let source = r#"
        return [parseInt('42px'), parseInt('0x1f'), parseFloat('3.5e1x'), isNaN('abc'), Number('')].join();
    "#;
    assert_eq!(run_to_string(source), "42,31,35,true,0");
}

#[test]
fn test_math_functions() {
    let source = "return Math.max(1, 5, 3) + Math.min(4, 2) + Math.round(2.5) + Math.abs(-1)";
    assert_eq!(run_script(source).unwrap(), Val::Num(11.0));
    let random = run_script("const r = Math.random(); return r >= 0 && r < 1").unwrap();
    assert_eq!(random, Val::Bool(true));
}

/* ===================== Regular Expressions ===================== */

#[test]
fn test_regex_literal_test_and_exec() {
    let source = r#"
        const re = /(\d+)-(\d+)/;
        const m = re.exec('call 555-1234 now');
        return [
            re.test('12-34'),
            re.test('abc'),
            m[0],
            m[1],
            m[2],
            re.source,
            String(/a/gi),
            typeof re,
            re.exec('none') === null,
        ].join('|');
    "#;
    assert_eq!(
        run_to_string(source),
        r"true|false|555-1234|555|1234|(\d+)-(\d+)|/a/gi|object|true"
    );
}

#[test]
fn test_string_methods_accept_regex() {
    let source = r#"
        return [
            'a1b22c333'.replace(/\d+/g, '#'),
            'a1b22c333'.replace(/\d+/, '#'),
            'John Smith'.replace(/(\w+)\s(\w+)/, '$2, $1'),
            'x-y_z'.split(/[-_]/).join(','),
            'aXbxc'.split(/x/i).length,
            'one two three'.match(/\w+/g).join(','),
            'abc'.match(/z/) === null,
            'hello'.search(/l+/),
            'a.b.c'.replaceAll(/\./g, '/'),
        ].join(' ');
    "#;
    assert_eq!(
        run_to_string(source),
        "a#b#c# a#b22c333 Smith, John x,y,z 3 one,two,three true 2 a/b/c"
    );
}

#[test]
fn test_regex_replace_with_function_and_named_groups() {
    let source = r#"
        const doubled = '2 apples and 5 pears'.replace(
            /(\d+) (\w+)/g,
            (m, n, fruit, offset) => (n * 2) + ' ' + fruit + '@' + offset
        );
        const date = '2024-05'.replace(/(?<year>\d{4})-(?<month>\d{2})/, '$<month>/$<year>');
        const pairs = [...'a=1, b=2'.matchAll(/(\w)=(\d)/g)].map(m => m[1] + m[2]);
        return [doubled, date, pairs.join('+')].join(' | ');
    "#;
    assert_eq!(
        run_to_string(source),
        "4 apples@0 and 10 pears@13 | 05/2024 | a1+b2"
    );
}

#[test]
fn test_global_regex_exec_advances_last_index() {
    let source = r#"
        const re = /o/g;
        const seen = [];
        while (re.exec('foo boo') !== null) {
            seen.push(re.lastIndex);
        }
        return seen.join() + '|' + re.lastIndex;
    "#;
    assert_eq!(run_to_string(source), "2,3,6,7|0");
}

#[test]
fn test_regexp_constructor() {
    let source = r#"
        const re = new RegExp('b+', 'g');
        return [
            re.flags,
            re.global,
            'abbcb'.replace(re, 'X'),
            RegExp(re).source,
            new RegExp('a/b').test('a/b'),
        ].join();
    "#;
    assert_eq!(run_to_string(source), "g,true,aXcX,b+,true");
}

#[test]
fn test_regex_errors() {
    assert_eq!(
        run_error("return 'ab'.replaceAll(/a/, 'x')"),
        "TypeError: replaceAll must be called with a global RegExp"
    );
    let backreference = run_error(r"return /(a)\1/.test('aa')");
    assert!(
        backreference.starts_with("SyntaxError: Invalid regular expression"),
        "{}",
        backreference
    );
    assert!(run_error("return new RegExp('a', 'gg')").starts_with("SyntaxError"));
}

/* ===================== Objects & JSON ===================== */

#[test]
fn test_object_statics() {
    let source = r#"
        const merged = Object.assign({}, { a: 1 }, { b: 2 });
        const pairs = Object.entries(merged).map(([k, v]) => k + v).join();
        const back = Object.fromEntries([['x', 1]]);
        return [pairs, Object.values(merged).join(''), back.x, merged.hasOwnProperty('a')].join('|');
    "#;
    assert_eq!(run_to_string(source), "a1,b2|12|1|true");
}

#[test]
fn test_json_round_trip() {
    let source = r#"
        const text = JSON.stringify({ a: [1, 'x'], b: undefined });
        return text + '|' + (JSON.parse('{"n": 2}').n + 1);
    "#;
    assert_eq!(run_to_string(source), r#"{"a":[1,"x"]}|3"#);
}

#[test]
fn test_function_call_apply_bind() {
    let source = r#"
        function greet(greeting, mark) { return greeting + ' ' + this.name + mark; }
        const who = { name: 'Ada' };
        const bound = greet.bind(who, 'Hey');
        return [greet.call(who, 'Hi', '!'), greet.apply(who, ['Yo', '?']), bound('.')].join(' ');
    "#;
    assert_eq!(run_to_string(source), "Hi Ada! Yo Ada? Hey Ada.");
}

/* ===================== Capability Scope ===================== */

#[test]
fn test_host_globals_are_not_visible() {
    let source = "return typeof window + typeof fetch + typeof globalThis + typeof require";
    assert_eq!(
        run_to_string(source),
        "undefinedundefinedundefinedundefined"
    );
}

#[test]
fn test_no_runtime_code_construction() {
    assert_eq!(
        run_error("return eval('1')"),
        "ReferenceError: eval is not defined"
    );
    assert_eq!(
        run_error("return new Function('return 1')"),
        "ReferenceError: Function is not defined"
    );
}

/* ===================== Console ===================== */

#[test]
fn test_console_output_is_captured() {
    let source = r#"
        console.log('a', 1, { x: 1 });
        console.warn('careful');
        return null;
    "#;
    let (result, console) = run_script_with(source, DEFAULT_MAX_STEPS);
    assert_eq!(result.unwrap(), Val::Null);
    assert_eq!(console.len(), 2);
    assert_eq!(console[0].level, ConsoleLevel::Log);
    assert_eq!(console[0].message, "a 1 { x: 1 }");
    assert_eq!(console[1].level, ConsoleLevel::Warn);
    assert_eq!(console[1].message, "careful");
}
