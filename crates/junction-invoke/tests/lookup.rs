use std::sync::Arc;

use junction_invoke::access::{MODE_PACKAGE, MODE_PRIVATE, MODE_PUBLIC};
use junction_invoke::{InvokeError, LinkError, ObjRef, TargetKind, Value};
use junction_signature::{
    ClassInfo, ClassName, Type, ACC_ABSTRACT, ACC_FINAL, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC,
    ACC_STATIC, ACC_VOLATILE,
};
use junction_test_utils::{sig, Fixture, FixtureWorld};
use pretty_assertions::assert_eq;

const SHAPE: &str = "a.Shape";
const SQUARE: &str = "a.Square";
const CIRCLE: &str = "a.Circle";
const BLOB: &str = "a.Blob";
const BASE: &str = "a.Base";
const DERIVED: &str = "b.Derived";
const POINT: &str = "a.Point";
const POINT3: &str = "a.Point3";
const LOCKED: &str = "a.Locked";
const ABSTRACT: &str = "a.Abstract";

fn constant_body(value: Value) -> junction_test_utils::MethodBody {
    Arc::new(move |_: &[Value]| -> Result<Value, InvokeError> { Ok(value.clone()) })
}

fn fixture() -> Fixture {
    let mut world = FixtureWorld::new();
    world
        .add_class(ClassInfo::interface(SHAPE))
        .add_class(ClassInfo::class(SQUARE).implements(SHAPE))
        .add_class(ClassInfo::class(CIRCLE).implements(SHAPE))
        .add_class(ClassInfo::class(BLOB).implements(SHAPE))
        .add_class(ClassInfo::class(BASE))
        .add_class(ClassInfo::class("a.Base$Inner"))
        .add_class(ClassInfo::class("a.Other"))
        .add_class(ClassInfo::class(DERIVED).extends(BASE))
        .add_class(ClassInfo::class("c.Stranger"))
        .add_class(ClassInfo::class(POINT))
        .add_class(ClassInfo::class(POINT3).extends(POINT))
        .add_class(ClassInfo::class(LOCKED))
        .add_class(ClassInfo::class(ABSTRACT).with_flags(ACC_PUBLIC | ACC_ABSTRACT));

    let area = sig(Type::INT, &[]);
    world.abstract_method(SHAPE, "area", area.clone());
    world.virtual_method(SQUARE, "area", area.clone(), |_| Ok(Value::Int(4)));
    world.virtual_method(CIRCLE, "area", area, |_| Ok(Value::Int(3)));

    let name = sig(Type::string(), &[]);
    let int = sig(Type::INT, &[]);
    world.virtual_method(BASE, "name", name.clone(), |_| Ok(Value::string("base")));
    world.virtual_method(DERIVED, "name", name, |_| Ok(Value::string("derived")));
    world.method(BASE, "secret", int.clone(), ACC_PROTECTED, Some(constant_body(Value::Int(1))));
    world.method(BASE, "hidden", int.clone(), ACC_PRIVATE, Some(constant_body(Value::Int(2))));
    world.method(BASE, "pkg", int.clone(), 0, Some(constant_body(Value::Int(3))));
    world.static_method(BASE, "version", int.clone(), |_| Ok(Value::Int(7)));
    world.static_method(LOCKED, "open", int, |_| Ok(Value::Int(0)));

    world.field(POINT, "x", Type::INT, ACC_PUBLIC);
    world.field(POINT, "label", Type::string(), ACC_PUBLIC | ACC_VOLATILE);
    world.field(POINT, "id", Type::INT, ACC_PUBLIC | ACC_FINAL);
    world.field(POINT, "count", Type::LONG, ACC_PUBLIC | ACC_STATIC);
    world.field(POINT3, "z", Type::INT, ACC_PUBLIC);
    world.constructor(POINT, &[Type::INT, Type::INT], |args| {
        let this = args[0].as_object().expect("instance");
        this.field(0).expect("x").store(args[1].clone(), false);
        this.field(2).expect("id").store(args[2].clone(), false);
        Ok(Value::Void)
    });
    world.constructor(ABSTRACT, &[], |_| Ok(Value::Void));

    world.deny(LOCKED);
    world.build()
}

fn class(name: &str) -> ClassName {
    ClassName::new(name)
}

fn instance(fixture: &Fixture, name: &str) -> Value {
    Value::Ref(fixture.instance(name))
}

#[test]
fn interface_calls_dispatch_on_the_receiver() {
    let fixture = fixture();
    let lookup = fixture.lookup("a.Main");
    let area = lookup
        .find_virtual(&class(SHAPE), "area", &sig(Type::INT, &[]))
        .unwrap();
    assert_eq!(area.kind(), TargetKind::InterfaceCall);
    assert_eq!(area.signature(), &sig(Type::INT, &[Type::class(SHAPE)]));

    assert_eq!(area.invoke_exact(vec![instance(&fixture, SQUARE)]).unwrap(), Value::Int(4));
    assert_eq!(area.invoke_exact(vec![instance(&fixture, CIRCLE)]).unwrap(), Value::Int(3));

    let err = area.invoke_exact(vec![instance(&fixture, BLOB)]).unwrap_err();
    assert!(matches!(err, InvokeError::AbstractMethod { .. }), "{err:?}");
    let err = area.invoke_exact(vec![Value::Null]).unwrap_err();
    assert!(matches!(err, InvokeError::NullReference(_)), "{err:?}");
    let err = area.invoke_exact(vec![instance(&fixture, BASE)]).unwrap_err();
    assert!(matches!(err, InvokeError::TypeMismatch { .. }), "{err:?}");
}

#[test]
fn virtual_and_special_calls() {
    let fixture = fixture();
    let name = sig(Type::string(), &[]);
    let derived = instance(&fixture, DERIVED);

    let lookup = fixture.lookup(DERIVED);
    let virtual_name = lookup.find_virtual(&class(BASE), "name", &name).unwrap();
    assert_eq!(virtual_name.kind(), TargetKind::VirtualCall);
    assert_eq!(virtual_name.invoke_exact(vec![derived.clone()]).unwrap(), Value::string("derived"));
    assert_eq!(
        virtual_name.invoke_exact(vec![instance(&fixture, BASE)]).unwrap(),
        Value::string("base")
    );

    let special = lookup
        .find_special(&class(BASE), "name", &name, &class(DERIVED))
        .unwrap();
    assert_eq!(special.kind(), TargetKind::DirectCall);
    assert_eq!(special.signature(), &sig(Type::string(), &[Type::class(DERIVED)]));
    assert_eq!(special.invoke_exact(vec![derived]).unwrap(), Value::string("base"));

    let err = fixture
        .lookup("a.Other")
        .find_special(&class(BASE), "name", &name, &class(DERIVED))
        .unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");
}

#[test]
fn static_and_instance_lookups_do_not_mix() {
    let fixture = fixture();
    let lookup = fixture.lookup("a.Main");
    let int = sig(Type::INT, &[]);

    let version = lookup.find_static(&class(BASE), "version", &int).unwrap();
    assert_eq!(version.invoke_exact(vec![]).unwrap(), Value::Int(7));

    let err = lookup.find_virtual(&class(BASE), "version", &int).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");
    let err = lookup
        .find_static(&class(BASE), "name", &sig(Type::string(), &[]))
        .unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");

    let err = lookup.find_static(&class(BASE), "missing", &int).unwrap_err();
    assert!(matches!(err, LinkError::NoSuchMethod { .. }), "{err:?}");
    let err = lookup
        .find_static(&class(BASE), "version", &sig(Type::LONG, &[]))
        .unwrap_err();
    assert!(matches!(err, LinkError::NoSuchMethod { .. }), "{err:?}");
}

#[test]
fn member_access_follows_the_decision_table() {
    let fixture = fixture();
    let int = sig(Type::INT, &[]);
    let base = class(BASE);

    let stranger = fixture.lookup("c.Stranger");
    let err = stranger.find_virtual(&base, "secret", &int).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");
    let err = stranger.find_virtual(&base, "pkg", &int).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");

    // Protected access from another package narrows the receiver to the caller.
    let secret = fixture
        .lookup(DERIVED)
        .find_virtual(&base, "secret", &int)
        .unwrap();
    assert_eq!(secret.signature(), &sig(Type::INT, &[Type::class(DERIVED)]));
    assert_eq!(
        secret.invoke_exact(vec![instance(&fixture, DERIVED)]).unwrap(),
        Value::Int(1)
    );

    let same_package = fixture.lookup("a.Other");
    assert!(same_package.find_virtual(&base, "pkg", &int).is_ok());
    let err = same_package.find_virtual(&base, "hidden", &int).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");

    let nestmate = fixture.lookup("a.Base$Inner");
    let hidden = nestmate.find_virtual(&base, "hidden", &int).unwrap();
    assert_eq!(hidden.kind(), TargetKind::DirectCall);
    assert_eq!(hidden.invoke_exact(vec![instance(&fixture, BASE)]).unwrap(), Value::Int(2));
}

#[test]
fn narrowed_lookups_lose_modes() {
    let fixture = fixture();
    let int = sig(Type::INT, &[]);
    let base = class(BASE);
    let full = fixture.lookup(BASE);

    let other = full.in_class(&class("a.Other"));
    assert_eq!(other.lookup_class(), &class("a.Other"));
    assert_eq!(other.modes(), MODE_PUBLIC | MODE_PACKAGE);
    assert!(other.find_virtual(&base, "pkg", &int).is_ok());
    let err = other.find_virtual(&base, "hidden", &int).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");

    let inner = full.in_class(&class("a.Base$Inner"));
    assert_ne!(inner.modes() & MODE_PRIVATE, 0);

    let public = full.public_lookup();
    assert_eq!(public.modes(), MODE_PUBLIC);
    assert!(public.find_virtual(&base, "name", &sig(Type::string(), &[])).is_ok());
    let err = public.find_virtual(&base, "pkg", &int).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");
}

#[test]
fn access_checker_rejections_surface_unchanged() {
    let fixture = fixture();
    let err = fixture
        .lookup("a.Main")
        .find_static(&class(LOCKED), "open", &sig(Type::INT, &[]))
        .unwrap_err();
    assert!(matches!(err, LinkError::SecurityViolation { .. }), "{err:?}");
}

#[test]
fn instance_field_accessors() {
    let fixture = fixture();
    let lookup = fixture.lookup("a.Main");
    let point = class(POINT);

    let get_x = lookup.find_getter(&point, "x", &Type::INT).unwrap();
    let set_x = lookup.find_setter(&point, "x", &Type::INT).unwrap();
    assert_eq!(get_x.kind(), TargetKind::FieldRead);
    assert_eq!(get_x.signature(), &sig(Type::INT, &[Type::class(POINT)]));
    assert_eq!(set_x.signature(), &sig(Type::VOID, &[Type::class(POINT), Type::INT]));

    let p = instance(&fixture, POINT);
    assert_eq!(get_x.invoke_exact(vec![p.clone()]).unwrap(), Value::Int(0));
    set_x.invoke_exact(vec![p.clone(), Value::Int(9)]).unwrap();
    assert_eq!(get_x.invoke_exact(vec![p.clone()]).unwrap(), Value::Int(9));

    let get_label = lookup.find_getter(&point, "label", &Type::string()).unwrap();
    let set_label = lookup.find_setter(&point, "label", &Type::string()).unwrap();
    set_label.invoke_exact(vec![p.clone(), Value::string("origin")]).unwrap();
    assert_eq!(get_label.invoke_exact(vec![p]).unwrap(), Value::string("origin"));

    let err = get_x.invoke_exact(vec![Value::Null]).unwrap_err();
    assert!(matches!(err, InvokeError::NullReference(_)), "{err:?}");

    let err = lookup.find_setter(&point, "id", &Type::INT).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");
    let err = lookup.find_getter(&point, "count", &Type::LONG).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");
    let err = lookup.find_getter(&point, "y", &Type::INT).unwrap_err();
    assert!(matches!(err, LinkError::NoSuchField { .. }), "{err:?}");
}

#[test]
fn inherited_fields_keep_their_offsets() {
    let fixture = fixture();
    let lookup = fixture.lookup("a.Main");
    let point3 = class(POINT3);

    let set_x = lookup.find_setter(&point3, "x", &Type::INT).unwrap();
    let get_z = lookup.find_getter(&point3, "z", &Type::INT).unwrap();
    let set_z = lookup.find_setter(&point3, "z", &Type::INT).unwrap();
    let get_point_x = lookup.find_getter(&class(POINT), "x", &Type::INT).unwrap();

    let p = instance(&fixture, POINT3);
    set_x.invoke_exact(vec![p.clone(), Value::Int(1)]).unwrap();
    set_z.invoke_exact(vec![p.clone(), Value::Int(3)]).unwrap();
    assert_eq!(get_z.invoke_exact(vec![p.clone()]).unwrap(), Value::Int(3));
    assert_eq!(get_point_x.invoke_exact(vec![p]).unwrap(), Value::Int(1));
}

#[test]
fn static_field_accessors() {
    let fixture = fixture();
    let lookup = fixture.lookup("a.Main");
    let point = class(POINT);

    let get = lookup.find_static_getter(&point, "count", &Type::LONG).unwrap();
    let set = lookup.find_static_setter(&point, "count", &Type::LONG).unwrap();
    assert_eq!(get.signature(), &sig(Type::LONG, &[]));
    assert_eq!(set.signature(), &sig(Type::VOID, &[Type::LONG]));

    assert_eq!(get.invoke_exact(vec![]).unwrap(), Value::Long(0));
    set.invoke_exact(vec![Value::Long(-5)]).unwrap();
    assert_eq!(get.invoke_exact(vec![]).unwrap(), Value::Long(-5));

    let err = lookup.find_static_getter(&point, "x", &Type::INT).unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");
}

#[test]
fn constructors_return_the_new_instance() {
    let fixture = fixture();
    let lookup = fixture.lookup("a.Main");
    let point = class(POINT);

    let new_point = lookup
        .find_constructor(&point, &sig(Type::VOID, &[Type::INT, Type::INT]))
        .unwrap();
    assert_eq!(new_point.signature(), &sig(Type::class(POINT), &[Type::INT, Type::INT]));

    let created = new_point.invoke_exact(vec![Value::Int(4), Value::Int(11)]).unwrap();
    let obj: &ObjRef = created.as_object().expect("instance");
    assert_eq!(obj.runtime_type(), &Type::class(POINT));
    let get_x = lookup.find_getter(&point, "x", &Type::INT).unwrap();
    let get_id = lookup.find_getter(&point, "id", &Type::INT).unwrap();
    assert_eq!(get_x.invoke_exact(vec![created.clone()]).unwrap(), Value::Int(4));
    assert_eq!(get_id.invoke_exact(vec![created]).unwrap(), Value::Int(11));

    let err = lookup
        .find_constructor(&point, &sig(Type::INT, &[Type::INT, Type::INT]))
        .unwrap_err();
    assert!(matches!(err, LinkError::Signature(_)), "{err:?}");
    let err = lookup
        .find_constructor(&class(ABSTRACT), &sig(Type::VOID, &[]))
        .unwrap_err();
    assert!(matches!(err, LinkError::IllegalAccess { .. }), "{err:?}");
    // Constructors are not inherited.
    let err = lookup
        .find_constructor(&class(POINT3), &sig(Type::VOID, &[Type::INT, Type::INT]))
        .unwrap_err();
    assert!(matches!(err, LinkError::NoSuchMethod { .. }), "{err:?}");
}
