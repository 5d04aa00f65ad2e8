//! Host-facing behaviour of `Runtime`: scopes, printing, limits, tracing,
//! garbage collection and loading code as JSON.

use ember::{
    Code, CodeBuilder, CollectStringPrint, ExcType, Exception, LimitedTracker, NoPrint, Object, Opcode, ParamSpec,
    ResourceLimits, Runtime,
    tracer::{ProfilingTracer, RecordingTracer, TraceEvent},
};
use pretty_assertions::assert_eq;

fn execute(runtime: &mut Runtime, b: CodeBuilder) -> Result<Object, Exception> {
    runtime.execute(&b.build(), &mut NoPrint)
}

#[test]
fn inner_scopes_shadow_and_set_reaches_outward() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(1).define_var("x");
    b.push_int(10).define_var("y");
    b.emit(Opcode::EnterScope);
    b.push_int(2).define_var("x");
    b.push_int(20).emit(Opcode::SetVar("y".to_owned()));
    b.emit(Opcode::ExitScope);
    b.get_var("x").get_var("y").emit(Opcode::BuildList(2)).emit(Opcode::Return);

    assert_eq!(
        execute(&mut runtime, b).unwrap(),
        Object::List(vec![Object::Int(1), Object::Int(20)])
    );
}

#[test]
fn undefined_names_are_name_errors() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(1).emit(Opcode::SetVar("missing".to_owned()));
    assert_eq!(execute(&mut runtime, b).unwrap_err().exc_type(), Some(ExcType::NameError));

    let mut b = CodeBuilder::new();
    b.get_var("missing");
    assert_eq!(execute(&mut runtime, b).unwrap_err().exc_type(), Some(ExcType::NameError));
}

#[test]
fn closures_keep_their_defining_scope() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.function("counter", vec![], |b| {
        b.push_int(0).define_var("n");
        b.function("inc", vec![], |b| {
            b.get_var("n").push_int(1).operator("op_add", 2);
            b.emit(Opcode::SetVar("n".to_owned()));
            b.get_var("n").emit(Opcode::Return);
        });
        b.emit(Opcode::Return);
    });
    b.define_var("counter");
    b.get_var("counter").emit(Opcode::Call(0)).define_var("c");
    b.get_var("c").emit(Opcode::Call(0)).emit(Opcode::Pop(1));
    b.get_var("c").emit(Opcode::Call(0)).emit(Opcode::Return);

    assert_eq!(execute(&mut runtime, b).unwrap(), Object::Int(2));
}

#[test]
fn defaults_and_rest_parameters() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(10);
    b.function("f", vec![ParamSpec::new("a"), ParamSpec::new("b").with_default()], |b| {
        b.get_var("a").get_var("b").emit(Opcode::BuildList(2)).emit(Opcode::Return);
    });
    b.define_var("f");
    b.function("g", vec![ParamSpec::new("a"), ParamSpec::new("more").rest()], |b| {
        b.get_var("a").get_var("more").emit(Opcode::BuildList(2)).emit(Opcode::Return);
    });
    b.define_var("g");
    b.get_var("f").push_int(1).emit(Opcode::Call(1));
    b.get_var("g").push_int(1).emit(Opcode::Call(1));
    b.get_var("g").push_int(1).push_int(2).push_int(3).emit(Opcode::Call(3));
    b.emit(Opcode::BuildList(3)).emit(Opcode::Return);

    let int = Object::Int;
    assert_eq!(
        execute(&mut runtime, b).unwrap(),
        Object::List(vec![
            Object::List(vec![int(1), int(10)]),
            Object::List(vec![int(1), Object::List(vec![])]),
            Object::List(vec![int(1), Object::List(vec![int(2), int(3)])]),
        ])
    );
}

#[test]
fn rest_parameter_cannot_follow_a_default() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(1);
    b.function("f", vec![ParamSpec::new("a").with_default(), ParamSpec::new("more").rest()], |_| {});
    assert_eq!(execute(&mut runtime, b).unwrap_err().exc_type(), Some(ExcType::ArgumentError));
}

#[test]
fn spread_call_passes_list_elements() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.get_var("isinstance");
    b.push_int(3).get_var("num").emit(Opcode::BuildList(2));
    b.emit(Opcode::CallSpread).emit(Opcode::Return);
    assert_eq!(execute(&mut runtime, b).unwrap(), Object::Bool(true));
}

#[test]
fn globals_persist_between_executions() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_int(41).define_var("answer");
    execute(&mut runtime, b).unwrap();

    let mut b = CodeBuilder::new();
    b.get_var("answer").push_int(1).operator("op_add", 2).emit(Opcode::Return);
    assert_eq!(execute(&mut runtime, b).unwrap(), Object::Int(42));

    let value = runtime.alloc(Object::Str("host".to_owned())).unwrap();
    runtime.set_global("answer", value).unwrap();
    let answer = runtime.get_global("answer").unwrap();
    assert_eq!(runtime.to_object(answer), Object::Str("host".to_owned()));

    runtime.delete_global("answer").unwrap();
    assert!(runtime.get_global("answer").is_none());
    assert_eq!(
        runtime.delete_global("answer").unwrap_err().exc_type(),
        Some(ExcType::NameError)
    );
}

#[test]
fn print_writes_display_forms_separated_by_spaces() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.get_var("print").push_str("a").push_int(1).emit(Opcode::PushNum(2.5)).emit(Opcode::PushNull);
    b.push_int(1).push_str("x").emit(Opcode::BuildList(2));
    b.emit(Opcode::Call(5)).emit(Opcode::Pop(1));
    b.get_var("print").emit(Opcode::PushNum(2.0)).emit(Opcode::Call(1));

    let mut print = CollectStringPrint::new();
    runtime.execute(&b.build(), &mut print).unwrap();
    assert_eq!(print.output(), "a 1 2.5 null [1, 'x']\n2.0\n");
}

#[test]
fn user_op_str_is_used_by_print() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.class("Named", 0, |b| {
        b.function("op_str", vec![ParamSpec::new("self")], |b| {
            b.push_str("<named>").emit(Opcode::Return);
        });
        b.define_var("op_str");
    });
    b.define_var("Named");
    b.get_var("print").get_var("Named").emit(Opcode::Call(0)).emit(Opcode::Call(1));

    let mut print = CollectStringPrint::new();
    runtime.execute(&b.build(), &mut print).unwrap();
    assert_eq!(print.into_output(), "<named>\n");
}

#[test]
fn limits_load_from_json() {
    let limits: ResourceLimits =
        serde_json::from_str(r#"{"max_allocations": 50, "max_recursion_depth": 20, "gc_interval": 1000}"#).unwrap();
    assert_eq!(
        limits,
        ResourceLimits::new()
            .max_allocations(50)
            .max_recursion_depth(Some(20))
            .gc_interval(1000)
    );

    // every list stays on the operand stack, so collection cannot help
    let mut runtime = Runtime::with_limits(limits).unwrap();
    let mut b = CodeBuilder::new();
    b.label("grow").emit(Opcode::BuildList(0));
    b.emit(Opcode::Jump("grow".to_owned()));
    let err = execute(&mut runtime, b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::MemoryError));
}

fn empty_loop(count: i64, body: impl FnOnce(&mut CodeBuilder)) -> CodeBuilder {
    let mut b = CodeBuilder::new();
    b.for_each(
        "i",
        |b| {
            b.get_var("range").push_int(count).emit(Opcode::Call(1));
        },
        body,
    );
    b
}

#[test]
fn long_loops_collect_garbage_while_running() {
    let mut runtime = Runtime::with_limits(ResourceLimits::new().gc_interval(1_000)).unwrap();
    let before = runtime.heap_stats().live_objects;
    execute(&mut runtime, empty_loop(100_000, |_| {})).unwrap();
    let after = runtime.heap_stats().live_objects;
    assert!(after < before + 2_000, "live objects grew from {before} to {after}");
}

#[test]
fn allocation_limit_counts_live_objects() {
    let mut runtime = Runtime::with_limits(ResourceLimits::new().max_allocations(10_000)).unwrap();
    let b = empty_loop(20_000, |b| {
        b.emit(Opcode::BuildList(0)).emit(Opcode::Pop(1));
    });
    execute(&mut runtime, b).unwrap();
    let total = runtime.heap_stats().tracker_allocations.unwrap();
    assert!(total > 40_000, "tracked {total} allocations");
}

#[test]
fn automatic_collection_keeps_values_held_by_running_calls() {
    let mut runtime = Runtime::with_limits(ResourceLimits::new().gc_interval(1)).unwrap();
    let mut b = CodeBuilder::new();
    b.function("pair", vec![ParamSpec::new("a"), ParamSpec::new("b")], |b| {
        b.get_var("a").get_var("b").emit(Opcode::BuildList(2)).emit(Opcode::Return);
    });
    b.define_var("pair");
    b.emit(Opcode::BuildList(0)).define_var("out");
    b.for_each(
        "i",
        |b| {
            b.get_var("range").push_int(20).emit(Opcode::Call(1));
        },
        |b| {
            b.get_var("out").emit(Opcode::GetMember("append".to_owned()));
            b.get_var("pair").push_str("n").get_var("i").emit(Opcode::Call(2));
            b.emit(Opcode::Call(1)).emit(Opcode::Pop(1));
        },
    );
    b.get_var("out").emit(Opcode::Return);

    let result = execute(&mut runtime, b).unwrap();
    let Object::List(items) = result else {
        panic!("expected a list, got {result:?}");
    };
    assert_eq!(items.len(), 20);
    assert_eq!(
        items[19],
        Object::List(vec![Object::Str("n".to_owned()), Object::Int(19)])
    );
}

#[test]
fn oversized_map_operand_count_is_an_internal_error() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.emit(Opcode::BuildMap(usize::MAX));
    let err = execute(&mut runtime, b).unwrap_err();
    assert_eq!(err.type_name(), "InternalError");
    assert_eq!(err.exc_type(), None);
    assert!(err.message().contains("BuildMap"), "{}", err.message());
}

#[test]
fn bootstrap_allocations_are_not_counted() {
    let runtime = Runtime::with_tracker(Box::new(LimitedTracker::new(ResourceLimits::new()))).unwrap();
    assert_eq!(runtime.heap_stats().tracker_allocations, Some(0));
}

#[test]
fn garbage_collection_frees_unreachable_objects() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_str("kept").emit(Opcode::BuildList(1)).define_var("keep");
    for i in 0..10 {
        b.push_int(i).emit(Opcode::BuildList(1)).emit(Opcode::Pop(1));
    }
    execute(&mut runtime, b).unwrap();

    let before = runtime.heap_stats();
    let freed = runtime.collect_garbage(&[]);
    let after = runtime.heap_stats();
    assert!(freed >= 10, "freed {freed}");
    assert_eq!(after.live_objects, before.live_objects - freed);
    assert_eq!(after.free_slots, before.free_slots + freed);

    let keep = runtime.get_global("keep").unwrap();
    assert_eq!(
        runtime.to_object(keep),
        Object::List(vec![Object::Str("kept".to_owned())])
    );
}

#[test]
fn extra_roots_survive_collection() {
    let mut runtime = Runtime::new().unwrap();
    let held = runtime
        .alloc(Object::List(vec![Object::Int(1), Object::Int(2)]))
        .unwrap();
    runtime.collect_garbage(&[held]);
    assert_eq!(
        runtime.to_object(held),
        Object::List(vec![Object::Int(1), Object::Int(2)])
    );
}

#[test]
fn heap_stats_count_objects_by_kind() {
    let mut runtime = Runtime::new().unwrap();
    let before = runtime.heap_stats().objects_by_kind.get("Map").copied().unwrap_or(0);
    let mut b = CodeBuilder::new();
    b.emit(Opcode::BuildMap(0)).define_var("m");
    execute(&mut runtime, b).unwrap();
    assert_eq!(runtime.heap_stats().objects_by_kind.get("Map").copied(), Some(before + 1));
}

#[test]
fn recording_tracer_sees_calls_and_definitions() {
    let mut runtime = Runtime::new().unwrap().with_tracer(Box::new(RecordingTracer::new()));
    let mut b = CodeBuilder::new();
    b.function("f", vec![], |b| {
        b.push_int(1).emit(Opcode::Return);
    });
    b.emit(Opcode::Call(0)).emit(Opcode::Return);
    execute(&mut runtime, b).unwrap();

    let events = runtime.tracer::<RecordingTracer>().unwrap().events();
    assert!(events.contains(&TraceEvent::MakeFunction {
        name: "f".to_owned(),
        defaults_count: 0,
    }));
    assert!(
        events
            .iter()
            .any(|event| matches!(event, TraceEvent::Call { func_name, .. } if func_name == "f"))
    );
    assert!(runtime.tracer::<ProfilingTracer>().is_none());
}

#[test]
fn profiling_tracer_counts_instructions() {
    let mut runtime = Runtime::new().unwrap().with_tracer(Box::new(ProfilingTracer::new()));
    let mut b = CodeBuilder::new();
    b.push_int(1).push_int(2).operator("op_add", 2).emit(Opcode::Return);
    execute(&mut runtime, b).unwrap();

    let report = runtime.tracer::<ProfilingTracer>().unwrap().report();
    assert_eq!(report.total_instructions, 4);
}

#[test]
fn code_loads_from_json() {
    let json = r#"[
        {"op": {"PushInt": 2}},
        {"op": {"PushInt": 5}},
        {"op": {"Operator": {"name": "op_mul", "argc": 2}}},
        {"op": "Return"}
    ]"#;
    let code: Code = serde_json::from_str(json).unwrap();
    let mut runtime = Runtime::new().unwrap();
    assert_eq!(runtime.execute(&code, &mut NoPrint).unwrap(), Object::Int(10));
}

#[test]
fn built_code_survives_a_json_round_trip() {
    let mut b = CodeBuilder::new();
    b.push_int(0).define_var("total");
    b.for_each(
        "i",
        |b| {
            b.get_var("range").push_int(5).emit(Opcode::Call(1));
        },
        |b| {
            b.get_var("total").get_var("i").operator("op_add", 2);
            b.emit(Opcode::SetVar("total".to_owned()));
        },
    );
    b.get_var("total").emit(Opcode::Return);
    let code = b.build();

    let text = serde_json::to_string(&code).unwrap();
    let reloaded: Code = serde_json::from_str(&text).unwrap();
    assert_eq!(reloaded.instructions(), code.instructions());

    let mut runtime = Runtime::new().unwrap();
    assert_eq!(runtime.execute(&reloaded, &mut NoPrint).unwrap(), Object::Int(10));
}

#[test]
fn results_convert_to_plain_json() {
    let mut runtime = Runtime::new().unwrap();
    let mut b = CodeBuilder::new();
    b.push_str("xs").push_int(1).emit(Opcode::PushNull).emit(Opcode::BuildList(2));
    b.emit(Opcode::BuildMap(1)).emit(Opcode::Return);
    let result = execute(&mut runtime, b).unwrap();
    assert_eq!(result.to_json_value(), serde_json::json!({"xs": [1, null]}));
}
