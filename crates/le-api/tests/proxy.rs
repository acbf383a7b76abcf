use le_api::{CapabilitySet, EngineError, EngineFactory, Value};

#[test]
fn proxy_is_none_when_an_operation_is_missing() {
    let engine = EngineFactory::default().script_engine();
    engine
        .eval("(def Greeter#greet (fn [name] (str \"hi \" name)))")
        .expect("def");
    let partial = CapabilitySet::new("Greeter", ["greet", "wave"]);
    assert!(engine.get_interface(&partial).expect("build").is_none());
}

#[test]
fn proxy_dispatches_resolved_operations() {
    let engine = EngineFactory::default().script_engine();
    engine
        .eval("(def Greeter#greet (fn [name] (str \"hi \" name)))")
        .expect("def");
    let capability = CapabilitySet::new("Greeter", ["greet"]);
    let proxy = engine
        .get_interface(&capability)
        .expect("build")
        .expect("all operations resolve");
    assert_eq!(
        proxy.call("greet", &[Value::string("bob")]).expect("greet"),
        Value::string("hi bob")
    );
    assert_eq!(
        proxy.call("toString", &[]).expect("toString"),
        Value::string("Proxy implementation of lisp-engine/Greeter")
    );
    assert_eq!(
        proxy.call("equals", &[proxy.to_value()]).expect("equals"),
        Value::Bool(true)
    );
    assert_eq!(
        proxy.call("equals", &[Value::Int(1)]).expect("equals"),
        Value::Bool(false)
    );
    assert!(matches!(
        proxy.call("unknown", &[]),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn proxy_with_receiver_passes_it_first() {
    let engine = EngineFactory::default().script_engine();
    engine
        .eval("(def Counter#describe (fn [self n] (str self \"/\" n)))")
        .expect("def");
    let capability = CapabilitySet::new("Counter", ["describe"]);
    let receiver = Value::string("obj");
    let proxy = engine
        .get_interface_for(&receiver, &capability)
        .expect("build")
        .expect("resolves");
    assert_eq!(
        proxy.call("describe", &[Value::Int(1)]).expect("describe"),
        Value::string("obj/1")
    );
    assert_eq!(
        proxy.call("hashCode", &[]).expect("hashCode"),
        Value::Int(receiver.hash_code())
    );
    assert_eq!(
        proxy.call("equals", &[Value::string("obj")]).expect("equals"),
        Value::Bool(true)
    );
}

#[test]
fn proxy_rejects_nil_receiver_and_empty_name() {
    let engine = EngineFactory::default().script_engine();
    let capability = CapabilitySet::new("Counter", ["describe"]);
    let error = engine
        .get_interface_for(&Value::Nil, &capability)
        .expect_err("nil receiver");
    assert_eq!(error.kind(), "INVALID_ARGUMENT");
    let error = engine
        .get_interface(&CapabilitySet::new("", ["describe"]))
        .expect_err("empty name");
    assert_eq!(error.kind(), "INVALID_ARGUMENT");
}
