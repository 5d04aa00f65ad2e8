//! Generator suspension and resumption, including yields inside try blocks.

use ember::{CodeBuilder, ExcType, Exception, NoPrint, Object, Opcode, ParamSpec, ResourceLimits, Runtime};
use pretty_assertions::assert_eq;

fn incr(b: &mut CodeBuilder, name: &str) {
    b.get_var(name).push_int(1).operator("op_add", 2);
    b.emit(Opcode::SetVar(name.to_owned()));
}

fn yield_int(b: &mut CodeBuilder, i: i64) {
    b.push_int(i).emit(Opcode::Yield);
}

/// Steps the generator bound to the global `g` once.
fn step(runtime: &mut Runtime) -> Result<Object, Exception> {
    let next = runtime.get_global("next").unwrap();
    let g = runtime.get_global("g").unwrap();
    runtime.call(next, vec![g], &mut NoPrint).map(|v| runtime.to_object(v))
}

fn global(runtime: &Runtime, name: &str) -> Object {
    let value = runtime.get_global(name).unwrap();
    runtime.to_object(value)
}

#[test]
fn yields_in_order_then_stops_without_rerunning() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(0).define_var("runs");
    b.generator("count", vec![], |b| {
        incr(b, "runs");
        yield_int(b, 1);
        yield_int(b, 2);
    });
    b.define_var("count");
    b.get_var("count").emit(Opcode::Call(0)).define_var("g");
    runtime.execute(&b.build(), &mut NoPrint).unwrap();

    // calling a generator function runs none of its body
    assert_eq!(global(&runtime, "runs"), Object::Int(0));

    assert_eq!(step(&mut runtime).unwrap(), Object::Int(1));
    assert_eq!(step(&mut runtime).unwrap(), Object::Int(2));
    for _ in 0..2 {
        let err = step(&mut runtime).unwrap_err();
        assert_eq!(err.exc_type(), Some(ExcType::IteratorStopped));
    }
    assert_eq!(global(&runtime, "runs"), Object::Int(1));
}

#[test]
fn for_each_drains_a_generator() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.generator("squares", vec![ParamSpec::new("n")], |b| {
        b.for_each(
            "i",
            |b| {
                b.get_var("range").get_var("n").emit(Opcode::Call(1));
            },
            |b| {
                b.get_var("i").get_var("i").operator("op_mul", 2).emit(Opcode::Yield);
            },
        );
    });
    b.define_var("squares");
    b.get_var("list").get_var("squares").push_int(4).emit(Opcode::Call(1));
    b.emit(Opcode::Call(1)).emit(Opcode::Return);

    assert_eq!(
        runtime.execute(&b.build(), &mut NoPrint).unwrap(),
        Object::List(vec![Object::Int(0), Object::Int(1), Object::Int(4), Object::Int(9)])
    );
}

#[test]
fn yield_inside_try_resumes_the_block() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.emit(Opcode::BuildList(0)).define_var("log");
    b.generator("guarded", vec![], |b| {
        b.try_finally(
            |b| {
                yield_int(b, 1);
                yield_int(b, 2);
            },
            |b| {
                b.get_var("log").emit(Opcode::GetMember("append".to_owned()));
                b.push_str("finally").emit(Opcode::Call(1)).emit(Opcode::Pop(1));
            },
        );
        yield_int(b, 3);
    });
    b.define_var("guarded");
    b.get_var("guarded").emit(Opcode::Call(0)).define_var("g");
    runtime.execute(&b.build(), &mut NoPrint).unwrap();

    assert_eq!(step(&mut runtime).unwrap(), Object::Int(1));
    assert_eq!(step(&mut runtime).unwrap(), Object::Int(2));
    assert_eq!(global(&runtime, "log"), Object::List(vec![]));
    assert_eq!(step(&mut runtime).unwrap(), Object::Int(3));
    assert_eq!(global(&runtime, "log"), Object::List(vec![Object::Str("finally".to_owned())]));
    assert_eq!(step(&mut runtime).unwrap_err().exc_type(), Some(ExcType::IteratorStopped));
}

#[test]
fn yield_inside_catch_resumes_the_handler() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.generator("recovering", vec![], |b| {
        b.try_catch(
            Some("e"),
            |b| {
                b.push_str("broken").emit(Opcode::Throw);
            },
            |b| {
                b.get_var("e").emit(Opcode::GetMember("message".to_owned())).emit(Opcode::Yield);
                yield_int(b, 2);
            },
        );
    });
    b.define_var("recovering");
    b.get_var("recovering").emit(Opcode::Call(0)).define_var("g");
    runtime.execute(&b.build(), &mut NoPrint).unwrap();

    assert_eq!(step(&mut runtime).unwrap(), Object::Str("broken".to_owned()));
    assert_eq!(step(&mut runtime).unwrap(), Object::Int(2));
    assert_eq!(step(&mut runtime).unwrap_err().exc_type(), Some(ExcType::IteratorStopped));
}

#[test]
fn error_finishes_the_generator() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.generator("failing", vec![], |b| {
        yield_int(b, 1);
        b.push_str("late failure").emit(Opcode::Throw);
    });
    b.define_var("failing");
    b.get_var("failing").emit(Opcode::Call(0)).define_var("g");
    runtime.execute(&b.build(), &mut NoPrint).unwrap();

    assert_eq!(step(&mut runtime).unwrap(), Object::Int(1));
    let err = step(&mut runtime).unwrap_err();
    assert_eq!(err.message(), "late failure");
    assert_eq!(step(&mut runtime).unwrap_err().exc_type(), Some(ExcType::IteratorStopped));
}

#[test]
fn inner_scopes_are_restored_on_resume() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.generator("nested", vec![], |b| {
        b.push_str("outer").define_var("x");
        b.emit(Opcode::EnterScope);
        b.push_str("inner").define_var("x");
        b.get_var("x").emit(Opcode::Yield);
        b.get_var("x").emit(Opcode::Yield);
        b.emit(Opcode::ExitScope);
        b.get_var("x").emit(Opcode::Yield);
    });
    b.define_var("nested");
    b.get_var("nested").emit(Opcode::Call(0)).define_var("g");
    runtime.execute(&b.build(), &mut NoPrint).unwrap();

    for expected in ["inner", "inner", "outer"] {
        assert_eq!(step(&mut runtime).unwrap(), Object::Str(expected.to_owned()));
    }
    assert_eq!(step(&mut runtime).unwrap_err().exc_type(), Some(ExcType::IteratorStopped));
}

#[test]
fn yield_outside_a_generator_is_rejected() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    yield_int(&mut b, 1);
    let err = runtime.execute(&b.build(), &mut NoPrint).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::YieldSignal));
}

#[test]
fn generator_locals_survive_garbage_collection() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.generator("holder", vec![], |b| {
        b.push_str("kept").emit(Opcode::BuildList(1)).define_var("data");
        yield_int(b, 0);
        b.get_var("data").emit(Opcode::Yield);
    });
    b.define_var("holder");
    b.get_var("holder").emit(Opcode::Call(0)).define_var("g");
    runtime.execute(&b.build(), &mut NoPrint).unwrap();

    assert_eq!(step(&mut runtime).unwrap(), Object::Int(0));
    runtime.collect_garbage(&[]);
    assert_eq!(
        step(&mut runtime).unwrap(),
        Object::List(vec![Object::Str("kept".to_owned())])
    );
}

#[test]
fn draining_a_generator_survives_collection_at_every_instruction() {
    let mut runtime = Runtime::with_limits(ResourceLimits::new().gc_interval(1)).unwrap();
    let mut b = CodeBuilder::new();
    b.generator("labelled", vec![ParamSpec::new("n")], |b| {
        b.for_each(
            "i",
            |b| {
                b.get_var("range").get_var("n").emit(Opcode::Call(1));
            },
            |b| {
                b.try_finally(
                    |b| {
                        b.push_str("item").get_var("i").emit(Opcode::BuildList(2)).emit(Opcode::Yield);
                    },
                    |b| {
                        b.emit(Opcode::Nop);
                    },
                );
            },
        );
    });
    b.define_var("labelled");
    b.get_var("list").get_var("labelled").push_int(30).emit(Opcode::Call(1));
    b.emit(Opcode::Call(1)).emit(Opcode::Return);

    let Object::List(items) = runtime.execute(&b.build(), &mut NoPrint).unwrap() else {
        panic!("list() must return a list");
    };
    assert_eq!(items.len(), 30);
    for (i, item) in items.into_iter().enumerate() {
        assert_eq!(
            item,
            Object::List(vec![Object::Str("item".to_owned()), Object::Int(i as i64)])
        );
    }
}
