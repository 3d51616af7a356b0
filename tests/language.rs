use std::rc::Rc;

use assert2::{check, let_assert};
use sprig::{
    run, Arity, Error, Host, Interop, Interpreter, Key, MemoryDataStore, MemoryLog, MemoryScriptStore, Options,
    SyntaxErrorKind, Value,
};

fn args(pairs: &[(&str, Value)]) -> Value {
    Value::map(
        pairs
            .iter()
            .map(|(key, value)| (Key::from(Value::string(key)), value.clone()))
            .collect(),
    )
}

#[test]
fn args_are_bound_for_the_program() {
    let report = run(
        r#"(prn (get $args "n") ($args "missing"))"#,
        args(&[("n", Value::Number(5.0))]),
        Options::default(),
        Host::default(),
    );
    check!(report.ok);
    check!(report.message == "5 nil\n");
}

#[test]
fn elapsed_time_only_when_asked() {
    let timed = run("(+ 1 2)", args(&[("time", Value::Bool(true))]), Options::default(), Host::default());
    check!(timed.elapsed.is_some());

    let untimed = run("(+ 1 2)", Value::Nil, Options::default(), Host::default());
    check!(untimed.elapsed.is_none());
}

#[test]
fn failures_lead_the_message() {
    let report = run(r#"(print "kept") (car 1)"#, Value::Nil, Options::default(), Host::default());
    check!(!report.ok);
    check!(report.message == "unbound symbol: car\nkept");
}

#[test]
fn unterminated_input_is_a_syntax_error() {
    let interpreter = Interpreter::with_defaults().unwrap();
    let_assert!(Err(error) = interpreter.read_all("(a (b c)"));
    check!(error.kind == SyntaxErrorKind::UnexpectedEof);
    check!(error.to_string() == "syntax error: premature end of input");

    let_assert!(Err(Error::Syntax(_)) = interpreter.eval_str("(def x 1) (def y"));
    check!(interpreter.eval_str("x").is_err(), "nothing runs when reading fails");
}

#[test]
fn generated_names_differ_between_expansions() {
    let interpreter = Interpreter::with_defaults().unwrap();
    let_assert!(
        Ok(_) = interpreter.eval_str(
            "(defmacro pair [] ^(x# x#))
             (def a (macroexpand (pair)))
             (def b (macroexpand (pair)))"
        )
    );
    let_assert!(Ok(Value::List(a)) = interpreter.eval_str("a"));
    let_assert!(Ok(Value::List(b)) = interpreter.eval_str("b"));
    check!(a.get(0) == a.get(1));
    check!(a.get(0) != b.get(0));
    let_assert!(Some(Value::Symbol(name)) = a.get(0));
    check!(interpreter.resolve(*name).starts_with("x__auto_"));
}

#[test]
fn macros_do_not_capture_caller_bindings() {
    let interpreter = Interpreter::with_defaults().unwrap();
    let_assert!(Ok(value) = interpreter.eval_str("(let [v 2] (or false v))"));
    check!(value == Value::Number(2.0));
}

#[test]
fn definitions_persist_across_evaluations() {
    let interpreter = Interpreter::with_defaults().unwrap();
    let_assert!(Ok(_) = interpreter.eval_str("(defn twice [x] (* 2 x))"));
    let_assert!(Ok(value) = interpreter.eval_str("(twice 21)"));
    check!(value == Value::Number(42.0));
}

#[test]
fn core_library_can_be_skipped() {
    let interpreter = Interpreter::new(Options::default().without_preload(), Host::default()).unwrap();
    let_assert!(Err(Error::UnboundSymbol(name)) = interpreter.eval_str("(defn f [] 1)"));
    check!(&*name == "defn");
    let_assert!(Ok(value) = interpreter.eval_str("(inc 1)"));
    check!(value == Value::Number(2.0));
}

#[test]
fn evaluation_depth_is_configurable() {
    let interpreter = Interpreter::new(Options::default().with_max_depth(50), Host::default()).unwrap();
    let_assert!(
        Err(Error::DepthExceeded(50)) = interpreter.eval_str("(defn down [n] (down (inc n))) (down 0)")
    );
    let_assert!(Ok(_) = interpreter.eval_str("(+ 1 2)"), "depth is restored after a failure");
}

#[test]
fn natives_can_reenter_the_interpreter() {
    let interpreter = Interpreter::with_defaults().unwrap();
    interpreter.define_native("call-twice", Arity::Exact(2), |interpreter, args| {
        let once = interpreter.apply(&args[0], vec![args[1].clone()])?;
        interpreter.apply(&args[0], vec![once])
    });
    let_assert!(Ok(value) = interpreter.eval_str("(call-twice (fn [x] (* x 3)) 2)"));
    check!(value == Value::Number(18.0));
}

#[test]
fn data_store_is_only_visible_to_libraries() {
    let scripts = MemoryScriptStore::with_core();
    scripts.insert(
        "store",
        r#"(defn save! [doc] ((get $db "insert") doc))
           (defn saved [query] ((get $db "find") query))
           (defn rename! [from to] ((get $db "update") {"name" from} {"name" to}))"#,
    );
    let data = Rc::new(MemoryDataStore::new());
    let host = Host::default().with_scripts(Rc::new(scripts)).with_data(data.clone());
    let mut options = Options::default();
    options.preload.push("store".into());

    let report = run(
        r#"(save! {"name" "ada" "age" 36})
           (save! {"name" "bob" "age" 41})
           (prn (rename! "bob" "rob"))
           (prn (map (fn [doc] (get doc "name")) (saved nil)))
           (prn (count (saved {"age" 36})))"#,
        Value::Nil,
        options.clone(),
        host.clone(),
    );
    check!(report.message == "1\n(\"ada\" \"rob\")\n1\n");
    check!(data.len() == 2);

    let report = run("$db", Value::Nil, options, host);
    check!(!report.ok);
    check!(report.message == "unbound symbol: $db\n");
}

#[test]
fn log_lines_go_to_the_host() {
    let log = Rc::new(MemoryLog::default());
    let host = Host::default().with_log(log.clone());
    let report = run(r#"(log "hello" 1) ($dbg [1 2])"#, Value::Nil, Options::default(), host);
    check!(report.ok);
    check!(report.message == "");
    check!(log.lines() == ["hello 1", "(1 2)"]);
}

#[test]
fn member_access_on_plain_values() {
    let interpreter = Interpreter::with_defaults().unwrap();
    let_assert!(Ok(value) = interpreter.eval_str(r#"(list ("length" "abc") ($get [1 2 3] "length") ($typeof {}))"#));
    check!(value == Value::sequence(vec![Value::Number(3.0), Value::Number(3.0), Value::string("hash-map")]));

    let_assert!(Err(Error::Host(reason)) = interpreter.eval_str(r#"($new "Point")"#));
    check!(&*reason == "construct is not supported by this host");
}

struct Points;

impl Interop for Points {
    fn construct(&self, _: &Interpreter, class: &Value, args: Vec<Value>) -> Result<Value, Error> {
        match (class.as_str(), args.as_slice()) {
            (Some("Point"), [x, y]) => Ok(Value::map(
                [("x", x), ("y", y)]
                    .into_iter()
                    .map(|(key, value)| (Key::from(Value::string(key)), value.clone()))
                    .collect(),
            )),
            _ => Err(Error::Host("unknown class".into())),
        }
    }
}

#[test]
fn hosts_can_construct_objects() {
    let host = Host::default().with_interop(Rc::new(Points));
    let report = run(
        r#"(def p ($new "Point" 1 2)) (prn (+ ("x" p) ($get p "y")))"#,
        Value::Nil,
        Options::default(),
        host,
    );
    check!(report.ok, "{}", report.message);
    check!(report.message == "3\n");
}

#[test]
fn evaluation_examples() {
    let interpreter = Interpreter::with_defaults().unwrap();
    let cases = [
        ("(+ 1 2 3)", "6"),
        ("(- 5)", "-5"),
        ("(*)", "1"),
        ("(let [x 1] (let [x 2] x))", "2"),
        ("(let [x 1] (do (let [x 2] x) x))", "1"),
        ("(let [[a & more] [1 2 3]] [a more])", "(1 (2 3))"),
        ("(loop [i 0 acc 0] (if (= i 5) acc (recur (inc i) (+ acc i))))", "10"),
        (r#"(if 0 "yes" "no")"#, r#""yes""#),
        ("^(a ~(+ 1 2) ~@(list 3 4))", "(a 3 3 4)"),
    ];
    for (source, expected) in cases {
        let_assert!(Ok(value) = interpreter.eval_str(source), "{source}");
        check!(interpreter.print(&value, true) == expected, "{source}");
    }
}
