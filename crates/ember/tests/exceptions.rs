//! Structured exception handling: try/catch/finally, error Types and traces.

use ember::{CodeBuilder, ExcType, Exception, NoPrint, Object, Opcode, ParamSpec, ResourceLimits, Runtime, StackFrame};
use pretty_assertions::assert_eq;

fn run(runtime: &mut Runtime, b: CodeBuilder) -> Result<Object, Exception> {
    runtime.execute(&b.build(), &mut NoPrint)
}

fn throw_str(b: &mut CodeBuilder, message: &str) {
    b.push_str(message).emit(Opcode::Throw);
}

#[test]
fn finally_runs_after_a_return_from_the_try_body() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(0).define_var("x");
    b.function("f", vec![], |b| {
        b.try_finally(
            |b| {
                b.push_int(0).emit(Opcode::Return);
            },
            |b| {
                b.push_int(1).emit(Opcode::SetVar("x".to_owned()));
            },
        );
    });
    b.define_var("f");
    b.get_var("f").emit(Opcode::Call(0));
    b.get_var("x");
    b.emit(Opcode::BuildList(2)).emit(Opcode::Return);

    assert_eq!(
        run(&mut runtime, b).unwrap(),
        Object::List(vec![Object::Int(0), Object::Int(1)])
    );
}

#[test]
fn error_from_finally_replaces_the_pending_error() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.try_finally(|b| throw_str(b, "first"), |b| throw_str(b, "second"));
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.type_name(), "Error");
    assert_eq!(err.message(), "second");
}

#[test]
fn return_from_finally_replaces_the_pending_error() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.try_finally(
        |b| throw_str(b, "lost"),
        |b| {
            b.push_str("kept").emit(Opcode::Return);
        },
    );
    assert_eq!(run(&mut runtime, b).unwrap(), Object::Str("kept".to_owned()));
}

#[test]
fn catch_binds_the_error_object() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.try_catch(
        Some("e"),
        |b| {
            b.get_var("ValueError").push_str("bad input").emit(Opcode::Call(1));
            b.emit(Opcode::Throw);
        },
        |b| {
            b.get_var("e").emit(Opcode::GetMember("message".to_owned()));
            b.get_var("isinstance").get_var("e").get_var("Error").emit(Opcode::Call(2));
            b.emit(Opcode::BuildList(2)).emit(Opcode::Return);
        },
    );
    assert_eq!(
        run(&mut runtime, b).unwrap(),
        Object::List(vec![Object::Str("bad input".to_owned()), Object::Bool(true)])
    );
}

#[test]
fn catch_binding_is_scoped_to_the_catch_body() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.try_catch(Some("e"), |b| throw_str(b, "x"), |_| {});
    b.get_var("e");
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::NameError));
}

#[test]
fn typed_catch_rethrows_other_errors() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.try_catch(
        Some("e"),
        |b| {
            b.push_int(1).push_int(0).operator("op_div", 2);
        },
        |b| {
            b.get_var("e").get_var("KeyError").emit(Opcode::TypeTest("rethrow".to_owned()));
            b.push_str("key").emit(Opcode::Return);
            b.label("rethrow");
            b.emit(Opcode::Throw);
        },
    );
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ZeroDivisionError));
}

#[test]
fn error_in_catch_still_runs_finally() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(0).define_var("cleaned");
    b.try_catch_finally(
        None,
        |b| throw_str(b, "first"),
        |b| throw_str(b, "from catch"),
        |b| {
            b.push_int(1).emit(Opcode::SetVar("cleaned".to_owned()));
        },
    );
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.message(), "from catch");

    let cleaned = runtime.get_global("cleaned").unwrap();
    assert_eq!(runtime.to_object(cleaned), Object::Int(1));
}

#[test]
fn user_error_types_keep_their_name_and_builtin_ancestor() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.get_var("ValueError");
    b.class("ParseError", 1, |b| {
        b.function("init", vec![ParamSpec::new("self"), ParamSpec::new("line")], |b| {
            b.get_var("self").get_var("line").emit(Opcode::SetMember("line".to_owned()));
        });
        b.define_var("init");
    });
    b.define_var("ParseError");
    b.get_var("ParseError").push_int(42).emit(Opcode::Call(1)).emit(Opcode::Throw);

    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.type_name(), "ParseError");
    assert_eq!(err.exc_type(), Some(ExcType::ValueError));
    assert_eq!(err.message(), "42");
    assert!(err.is(ExcType::Error));
}

#[test]
fn throwing_a_non_error_is_a_type_error() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(1).emit(Opcode::Throw);
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
}

#[test]
fn traceback_names_each_function_with_its_arguments() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.function("inner", vec![ParamSpec::new("a")], |b| throw_str(b, "boom"));
    b.define_var("inner");
    b.function("outer", vec![ParamSpec::new("a"), ParamSpec::new("b")], |b| {
        b.get_var("inner").get_var("b").emit(Opcode::Call(1)).emit(Opcode::Return);
    });
    b.define_var("outer");
    b.get_var("outer").push_int(1).push_str("two").emit(Opcode::Call(2));

    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(
        err.traceback(),
        &[
            StackFrame {
                function: "inner".to_owned(),
                args: vec![Object::Str("two".to_owned())],
            },
            StackFrame {
                function: "outer".to_owned(),
                args: vec![Object::Int(1), Object::Str("two".to_owned())],
            },
        ]
    );
    assert_eq!(
        err.to_string(),
        "Error: boom\n  at inner('two')\n  at outer(1, 'two')\n"
    );
}

#[test]
fn rethrown_errors_keep_the_layers_they_were_caught_with() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.function("inner", vec![ParamSpec::new("a")], |b| throw_str(b, "boom"));
    b.define_var("inner");
    b.function("outer", vec![ParamSpec::new("a")], |b| {
        b.try_catch(
            Some("e"),
            |b| {
                b.get_var("inner").get_var("a").emit(Opcode::Call(1)).emit(Opcode::Pop(1));
            },
            |b| {
                b.get_var("e").emit(Opcode::Throw);
            },
        );
    });
    b.define_var("outer");
    b.get_var("outer").push_int(7).emit(Opcode::Call(1));

    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.message(), "boom");
    assert_eq!(
        err.traceback(),
        &[
            StackFrame {
                function: "inner".to_owned(),
                args: vec![Object::Int(7)],
            },
            StackFrame {
                function: "outer".to_owned(),
                args: vec![Object::Int(7)],
            },
        ]
    );
}

#[test]
fn argument_errors_from_signatures() {
    let mut runtime = Runtime::new().unwrap();

    let mut b = CodeBuilder::new();
    b.push_int(1);
    b.function("f", vec![ParamSpec::new("a").with_default(), ParamSpec::new("b")], |_| {});
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ArgumentError));

    let mut b = CodeBuilder::new();
    b.function("g", vec![ParamSpec::new("a")], |_| {});
    b.emit(Opcode::Call(0));
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ArgumentCountError));
    assert!(err.is(ExcType::ArgumentError));

    let mut b = CodeBuilder::new();
    b.function("h", vec![ParamSpec::new("a").typed("int")], |_| {});
    b.push_str("not an int").emit(Opcode::Call(1));
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TypeError));
}

#[test]
fn recursion_limit_is_catchable() {
    let limits = ResourceLimits::new().max_recursion_depth(Some(30));
    let mut runtime = Runtime::with_limits(limits).unwrap();
    let mut b = CodeBuilder::new();
    b.function("f", vec![], |b| {
        b.get_var("f").emit(Opcode::Call(0)).emit(Opcode::Return);
    });
    b.define_var("f");
    b.try_catch(
        Some("e"),
        |b| {
            b.get_var("f").emit(Opcode::Call(0)).emit(Opcode::Return);
        },
        |b| {
            b.get_var("nameof").get_var("typeof").get_var("e").emit(Opcode::Call(1));
            b.emit(Opcode::Call(1)).emit(Opcode::Return);
        },
    );
    assert_eq!(run(&mut runtime, b).unwrap(), Object::Str("RecursionError".to_owned()));
}

#[test]
fn operation_limit_skips_catch_and_finally() {
    let mut runtime = Runtime::with_limits(ResourceLimits::new().max_operations(500)).unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(0).define_var("cleaned");
    b.try_catch_finally(
        None,
        |b| {
            b.label("spin").emit(Opcode::Jump("spin".to_owned()));
        },
        |b| {
            b.push_str("caught").emit(Opcode::Return);
        },
        |b| {
            b.push_int(1).emit(Opcode::SetVar("cleaned".to_owned()));
        },
    );
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::TimeoutError));

    let cleaned = runtime.get_global("cleaned").unwrap();
    assert_eq!(runtime.to_object(cleaned), Object::Int(0));
}

#[test]
fn internal_errors_skip_catch_and_finally() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(0).define_var("cleaned");
    b.try_catch_finally(
        None,
        |b| {
            b.emit(Opcode::Pop(1));
        },
        |b| {
            b.push_str("caught").emit(Opcode::Return);
        },
        |b| {
            b.push_int(1).emit(Opcode::SetVar("cleaned".to_owned()));
        },
    );
    let err = run(&mut runtime, b).unwrap_err();
    assert_eq!(err.type_name(), "InternalError");

    let cleaned = runtime.get_global("cleaned").unwrap();
    assert_eq!(runtime.to_object(cleaned), Object::Int(0));
}

#[test]
fn exceptions_serialize_for_the_host() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    throw_str(&mut b, "nope");
    let err = run(&mut runtime, b).unwrap_err();
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["type_name"], "Error");
    assert_eq!(json["message"], "nope");
    assert_eq!(json["causes"], serde_json::json!([]));
}
