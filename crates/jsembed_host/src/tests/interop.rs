use super::{as_json, eval_json, running_host};
use crate::{CallContext, Host, HostError, JsObject, ModuleError, NativeFunction, ValueKind};
use camino::Utf8PathBuf;
use jsembed_config::Config;
use serde_json::{Value, json};
use serial_test::serial;
use std::fs;
use std::rc::Rc;

fn register_math(host: &mut Host, target: Option<&str>) {
    host.register_module(
        "math",
        |module| {
            module
                .function("add", |_ctx, args| {
                    let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
                    Ok(json!(sum))
                })
                .function("fail", |_ctx, _args| Err(ModuleError::failed("cannot divide by zero")))
                .export("PI", json!(3.5));
        },
        None,
        target,
    )
    .expect("registration should succeed");
}

fn global_object(host: &mut Host, name: &str) -> JsObject {
    let root = host.root_object().unwrap();
    let value = host.get_value(&root, name).unwrap();
    host.as_object(value).unwrap()
}

#[test]
#[serial]
fn test_evaluate_returns_completion_value() {
    let mut host = running_host();
    let value = host.evaluate("21 * 2").unwrap();

    assert_eq!(host.deserialize::<i64>(&value).unwrap(), 42);
    assert_eq!(as_json(&mut host, &value), json!(42));
    assert_eq!(host.kind_of(&value).unwrap(), ValueKind::Number);
}

#[test]
#[serial]
fn test_evaluate_undefined_is_success() {
    let mut host = running_host();
    let value = host.evaluate("undefined").unwrap();
    assert_eq!(host.kind_of(&value).unwrap(), ValueKind::Undefined);
}

#[test]
#[serial]
fn test_syntax_error_leaves_engine_usable() {
    let mut host = running_host();

    let err = host.evaluate("let = ;").unwrap_err();
    let script = err.script_error().expect("script error details");
    assert!(
        script.message.contains("SyntaxError"),
        "unexpected message: {}",
        script.message
    );

    assert_eq!(eval_json(&mut host, "1 + 1"), json!(2));
}

#[test]
#[serial]
fn test_thrown_error_is_reported() {
    let mut host = running_host();
    let err = host.evaluate("throw new RangeError('too far')").unwrap_err();
    assert!(matches!(err, HostError::Script(_)));
    assert!(err.to_string().contains("too far"));
}

#[test]
#[serial]
fn test_register_module_with_target_binds_global() {
    let mut host = running_host();
    host.register_module("m", |_| {}, None, Some("m")).unwrap();

    assert_eq!(eval_json(&mut host, "typeof m"), json!("object"));
    assert_eq!(
        host.engine().unwrap().global_bindings().module_for("m"),
        Some("m")
    );
}

#[test]
#[serial]
fn test_register_module_with_read_only_target_fails() {
    let mut host = running_host();

    for target in ["undefined", "NaN", "locked"] {
        if target == "locked" {
            host.evaluate(
                "Object.defineProperty(globalThis, 'locked', { value: 1, writable: false })",
            )
            .unwrap();
        }
        let err = host
            .register_module("m", |_| {}, None, Some(target))
            .unwrap_err();
        assert!(matches!(err, HostError::Script(_)), "{target}: {err}");
    }

    assert_eq!(eval_json(&mut host, "typeof undefined"), json!("undefined"));
    assert_eq!(eval_json(&mut host, "typeof NaN"), json!("number"));
    assert_eq!(eval_json(&mut host, "locked"), json!(1));
    assert!(
        host.engine().unwrap().global_bindings().is_empty(),
        "failed targets are not recorded"
    );
    assert!(host.engine().unwrap().modules().has("m"), "module itself is registered");
}

#[test]
#[serial]
fn test_register_module_without_target() {
    let mut host = running_host();
    register_math(&mut host, None);

    assert_eq!(eval_json(&mut host, "typeof math"), json!("undefined"));
    assert_eq!(
        eval_json(&mut host, "process.binding('math').add(1, 2)"),
        json!(3)
    );
    assert!(host.engine().unwrap().global_bindings().is_empty());
    assert!(host.engine().unwrap().modules().has("math"));
}

#[test]
#[serial]
fn test_call_matches_script_invocation() {
    let mut host = running_host();
    register_math(&mut host, Some("math"));

    let from_script = eval_json(&mut host, "math.add(2, 40)");

    let math = global_object(&mut host, "math");
    let args = [
        host.from_json(&json!(2)).unwrap(),
        host.from_json(&json!(40)).unwrap(),
    ];
    let result = host.call(&math, "add", &args).unwrap();

    assert_eq!(as_json(&mut host, &result), from_script);
    assert_eq!(from_script, json!(42));

    let pi = host.get_value(&math, "PI").unwrap();
    assert_eq!(as_json(&mut host, &pi), json!(3.5));
}

#[test]
#[serial]
fn test_native_error_surfaces_as_script_error() {
    let mut host = running_host();
    register_math(&mut host, Some("math"));

    let math = global_object(&mut host, "math");
    let err = host.call(&math, "fail", &[]).unwrap_err();
    assert!(err.to_string().contains("cannot divide by zero"), "{err}");

    assert_eq!(
        eval_json(
            &mut host,
            "try { math.fail(); 'no error' } catch (e) { e instanceof Error }"
        ),
        json!(true)
    );
}

#[test]
#[serial]
fn test_reregistering_replaces_module() {
    let mut host = running_host();
    host.register_module(
        "m",
        |module| {
            module.function("version", |_ctx, _args| Ok(json!(1)));
        },
        None,
        Some("m"),
    )
    .unwrap();
    host.register_module(
        "m",
        |module| {
            module.function("version", |_ctx, _args| Ok(json!(2)));
        },
        None,
        None,
    )
    .unwrap();

    assert_eq!(eval_json(&mut host, "m.version()"), json!(2));
    assert_eq!(
        eval_json(&mut host, "process.binding('m').version()"),
        json!(2)
    );
    assert_eq!(host.engine().unwrap().modules().len(), 1);
}

#[test]
#[serial]
fn test_register_module_functions() {
    let mut host = running_host();
    let shout: NativeFunction = Rc::new(
        |_ctx: &CallContext<'_>, args: Vec<Value>| -> Result<Value, ModuleError> {
            let text = args.first().and_then(Value::as_str).unwrap_or_default();
            Ok(json!(text.to_uppercase()))
        },
    );
    host.register_module_functions("text", [("shout".to_string(), shout)], Some("text"))
        .unwrap();

    assert_eq!(eval_json(&mut host, "text.shout('hey')"), json!("HEY"));
}

#[test]
#[serial]
fn test_private_data_reaches_module_functions() {
    let mut host = running_host();
    host.register_module(
        "greeter",
        |module| {
            module.function("greet", |ctx, args| {
                let greeting = ctx
                    .private::<String>()
                    .ok_or_else(|| ModuleError::failed("no greeting"))?;
                let name = args.first().and_then(Value::as_str).unwrap_or("stranger");
                Ok(json!(format!("{greeting}, {name}")))
            });
        },
        Some(Rc::new("Hello".to_string())),
        Some("greeter"),
    )
    .unwrap();

    assert_eq!(
        eval_json(&mut host, "greeter.greet('Ada')"),
        json!("Hello, Ada")
    );
}

#[test]
#[serial]
fn test_get_value_errors() {
    let mut host = running_host();
    host.evaluate("globalThis.thing = { present: null, get broken() { throw new Error('getter failed'); } }")
        .unwrap();
    let thing = global_object(&mut host, "thing");

    let present = host.get_value(&thing, "present").unwrap();
    assert_eq!(host.kind_of(&present).unwrap(), ValueKind::Null);

    assert!(matches!(
        host.get_value(&thing, "absent"),
        Err(HostError::MissingMember(name)) if name == "absent"
    ));
    assert!(matches!(
        host.get_value(&thing, "broken"),
        Err(HostError::Script(_))
    ));
}

#[test]
#[serial]
fn test_call_errors_and_receiver() {
    let mut host = running_host();
    host.evaluate(
        r"
        globalThis.counter = {
            n: 1,
            next() { return this.n + 1; },
            explode() { throw new TypeError('nope'); },
            nothing() {},
        };
        ",
    )
    .unwrap();
    let counter = global_object(&mut host, "counter");

    let next = host.call(&counter, "next", &[]).unwrap();
    assert_eq!(as_json(&mut host, &next), json!(2), "receiver is the object");

    let nothing = host.call(&counter, "nothing", &[]).unwrap();
    assert_eq!(host.kind_of(&nothing).unwrap(), ValueKind::Undefined);

    assert!(matches!(
        host.call(&counter, "n", &[]),
        Err(HostError::NotCallable(_))
    ));
    assert!(matches!(
        host.call(&counter, "missing", &[]),
        Err(HostError::MissingMember(_))
    ));

    let err = host.call(&counter, "explode", &[]).unwrap_err();
    assert_eq!(err.script_error().unwrap().message, "Uncaught TypeError: nope");
}

#[test]
#[serial]
fn test_script_error_text_is_the_same_on_every_path() {
    let mut host = running_host();
    let thrower = host
        .evaluate("globalThis.thrower = { go() { throw new RangeError('same text'); } }; thrower")
        .unwrap();
    let thrower = host.as_object(thrower).unwrap();

    let from_evaluate = host.evaluate("thrower.go()").unwrap_err();
    let from_call = host.call(&thrower, "go", &[]).unwrap_err();

    assert_eq!(
        from_evaluate.script_error().unwrap().message,
        "Uncaught RangeError: same text"
    );
    assert_eq!(
        from_call.script_error().unwrap().message,
        from_evaluate.script_error().unwrap().message
    );

    let thrown_string = host.evaluate("({ get bad() { throw 'plain'; } })").unwrap();
    let thrown_string = host.as_object(thrown_string).unwrap();
    let err = host.get_value(&thrown_string, "bad").unwrap_err();
    assert_eq!(err.script_error().unwrap().message, "Uncaught plain");
}

#[test]
#[serial]
fn test_call_function_by_reference() {
    let mut host = running_host();
    let function = host
        .evaluate("(function (a, b) { return this.base + a + b; })")
        .unwrap();
    let receiver = host.from_json(&json!({ "base": 10 })).unwrap();
    let args = [
        host.from_json(&json!(1)).unwrap(),
        host.from_json(&json!(2)).unwrap(),
    ];

    let result = host.call_function(&receiver, &function, &args).unwrap();
    assert_eq!(as_json(&mut host, &result), json!(13));

    let not_a_function = host.from_json(&json!("text")).unwrap();
    assert!(matches!(
        host.call_function(&receiver, &not_a_function, &[]),
        Err(HostError::NotCallable(_))
    ));
}

#[test]
#[serial]
fn test_value_kinds() {
    let mut host = running_host();
    let cases = [
        ("null", ValueKind::Null),
        ("true", ValueKind::Boolean),
        ("1.5", ValueKind::Number),
        ("10n", ValueKind::BigInt),
        ("'text'", ValueKind::String),
        ("Symbol('s')", ValueKind::Symbol),
        ("() => 1", ValueKind::Function),
        ("[1, 2]", ValueKind::Array),
        ("({})", ValueKind::Object),
    ];

    for (source, expected) in cases {
        let value = host.evaluate(source).unwrap();
        assert_eq!(host.kind_of(&value).unwrap(), expected, "kind of {source}");
    }

    let number = host.evaluate("7").unwrap();
    assert!(matches!(
        host.as_object(number),
        Err(HostError::Conversion(_))
    ));
}

#[test]
#[serial]
fn test_json_round_trip_through_engine() {
    let mut host = running_host();
    let input = json!({ "name": "jsembed", "tags": ["a", "b"], "nested": { "ok": true } });
    let value = host.from_json(&input).unwrap();
    let object = host.as_object(value).unwrap();

    let tags = host.get_value(&object, "tags").unwrap();
    assert_eq!(as_json(&mut host, &tags), json!(["a", "b"]));
    assert_eq!(as_json(&mut host, object.as_value()), input);
}

#[test]
#[serial]
fn test_run_script_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("helper.js"),
        "module.exports = { twice: (n) => n * 2 };",
    )
    .unwrap();
    let main = dir.path().join("main.js");
    fs::write(&main, "const helper = require('./helper');\nhelper.twice(21);\n").unwrap();

    let mut host = running_host();
    let value = host.run(&main).unwrap();
    assert_eq!(as_json(&mut host, &value), json!(42));
    assert_eq!(
        eval_json(&mut host, "__filename.endsWith('main.js')"),
        json!(true)
    );
}

#[test]
#[serial]
fn test_run_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = running_host();

    let err = host.run(dir.path().join("missing.js")).unwrap_err();
    assert!(matches!(err, HostError::Io { .. }));
    assert_eq!(eval_json(&mut host, "1"), json!(1));
}

#[test]
#[serial]
fn test_run_script_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bad.js");
    fs::write(&script, "throw new Error('bad script');").unwrap();

    let mut host = running_host();
    let err = host.run(&script).unwrap_err();
    assert!(err.to_string().contains("bad script"));
}

#[test]
#[serial]
fn test_failed_script_restores_script_globals() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.js");
    fs::write(&good, "1;").unwrap();
    let broken = dir.path().join("broken.js");
    fs::write(&broken, "let = ;").unwrap();

    let mut host = running_host();
    assert!(host.run(&broken).is_err());
    assert_eq!(eval_json(&mut host, "typeof __filename"), json!("undefined"));
    assert_eq!(eval_json(&mut host, "typeof require"), json!("function"));

    host.run(&good).unwrap();
    assert!(host.run(&broken).is_err());
    assert_eq!(
        eval_json(&mut host, "__filename.endsWith('good.js')"),
        json!(true),
        "globals still describe the last script that ran"
    );
}

fn host_with_module_dir(dir: &std::path::Path) -> Host {
    let mut config = Config::default();
    config.module_paths = vec![Utf8PathBuf::from_path_buf(dir.to_path_buf()).unwrap()];
    let mut host = Host::with_config(config);
    host.initialize("jsembed-test", &[]).unwrap();
    host
}

#[test]
#[serial]
fn test_include_module_from_search_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("greet.js"),
        "module.exports = { hello: (name) => `hello ${name}` };",
    )
    .unwrap();

    let mut host = host_with_module_dir(dir.path());
    let greet = host.include_module("greet").unwrap();
    let name = host.from_json(&json!("bob")).unwrap();
    let result = host.call(&greet, "hello", &[name]).unwrap();

    assert_eq!(as_json(&mut host, &result), json!("hello bob"));
}

#[test]
#[serial]
fn test_include_module_package_directory() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("widgets");
    fs::create_dir_all(package.join("lib")).unwrap();
    fs::write(package.join("package.json"), r#"{ "main": "lib/entry.js" }"#).unwrap();
    fs::write(package.join("lib/entry.js"), "exports.kind = 'widget';").unwrap();

    let mut host = host_with_module_dir(dir.path());
    let widgets = host.include_module("widgets").unwrap();
    let kind = host.get_value(&widgets, "kind").unwrap();
    assert_eq!(as_json(&mut host, &kind), json!("widget"));
}

#[test]
#[serial]
fn test_include_module_failures() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.js"), "module.exports = ;").unwrap();
    fs::write(dir.path().join("scalar.js"), "module.exports = 5;").unwrap();

    let mut host = host_with_module_dir(dir.path());

    assert!(matches!(
        host.include_module("not-there"),
        Err(HostError::ModuleNotFound(name)) if name == "not-there"
    ));
    assert!(matches!(
        host.include_module("broken"),
        Err(HostError::Script(_))
    ));
    assert!(matches!(
        host.include_module("scalar"),
        Err(HostError::Conversion(_))
    ));
}
