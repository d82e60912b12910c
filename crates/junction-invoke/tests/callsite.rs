use std::sync::Arc;
use std::thread;

use junction_invoke::{
    constant, CallSite, CallSitePolicy, InvokeError, LinkError, TargetKind, Value,
};
use junction_signature::Type;
use junction_test_utils::{sig, FixtureWorld};
use pretty_assertions::assert_eq;

#[test]
fn constant_sites_cannot_be_retargeted() {
    let fixture = FixtureWorld::new().build();
    let one = constant(&fixture.runtime, &Type::INT, Value::Int(1)).unwrap();
    let two = constant(&fixture.runtime, &Type::INT, Value::Int(2)).unwrap();

    let site = CallSite::constant(one.clone());
    assert_eq!(site.policy(), CallSitePolicy::Constant);
    let err = site.set_target(two).unwrap_err();
    assert!(matches!(err, LinkError::IllegalArgument(_)), "{err:?}");
    assert!(site.dynamic_invoker().unwrap().ptr_eq(&one));

    let err = CallSite::unlinked(&fixture.runtime, CallSitePolicy::Constant, one.signature())
        .unwrap_err();
    assert!(matches!(err, LinkError::IllegalArgument(_)), "{err:?}");
}

#[test]
fn targets_must_match_the_site_signature() {
    let fixture = FixtureWorld::new().build();
    let int = constant(&fixture.runtime, &Type::INT, Value::Int(1)).unwrap();
    let long = constant(&fixture.runtime, &Type::LONG, Value::Long(1)).unwrap();

    let site = CallSite::mutable(int);
    let err = site.set_target(long).unwrap_err();
    match err {
        LinkError::TypeMismatch { expected, found } => {
            assert_eq!(expected, sig(Type::INT, &[]));
            assert_eq!(found, sig(Type::LONG, &[]));
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }
}

#[test]
fn dynamic_invokers_follow_retargeting() {
    let fixture = FixtureWorld::new().build();
    let runtime = &fixture.runtime;
    let first = constant(runtime, &Type::string(), Value::string("first")).unwrap();
    let second = constant(runtime, &Type::string(), Value::string("second")).unwrap();

    for policy in [CallSitePolicy::Mutable, CallSitePolicy::Volatile] {
        let site = CallSite::with_policy(policy, first.clone());
        let invoker = site.dynamic_invoker().unwrap();
        assert_eq!(invoker.kind(), TargetKind::DynamicCallSiteInvoker);
        assert_eq!(invoker.signature(), site.signature());

        assert_eq!(invoker.invoke_exact(vec![]).unwrap(), Value::string("first"));
        site.set_target(second.clone()).unwrap();
        assert_eq!(invoker.invoke_exact(vec![]).unwrap(), Value::string("second"));
        assert!(site.target().ptr_eq(&second));
    }
}

#[test]
fn unlinked_sites_fail_until_linked() {
    let fixture = FixtureWorld::new().build();
    let ty = sig(Type::INT, &[]);
    let site = CallSite::unlinked(&fixture.runtime, CallSitePolicy::Volatile, &ty).unwrap();
    assert_eq!(site.target().kind(), TargetKind::Unlinked);

    let invoker = site.dynamic_invoker().unwrap();
    let err = invoker.invoke_exact(vec![]).unwrap_err();
    assert!(matches!(err, InvokeError::IllegalState(_)), "{err:?}");

    site.set_target(constant(&fixture.runtime, &Type::INT, Value::Int(5)).unwrap())
        .unwrap();
    assert_eq!(invoker.invoke_exact(vec![]).unwrap(), Value::Int(5));
}

#[test]
fn writes_from_other_threads_become_visible() {
    let fixture = FixtureWorld::new().build();
    let runtime = Arc::clone(&fixture.runtime);
    let initial = constant(&runtime, &Type::INT, Value::Int(0)).unwrap();
    let volatile = CallSite::volatile(initial.clone());
    let mutable = CallSite::mutable(initial);

    let writers: Vec<_> = [volatile.clone(), mutable.clone()]
        .into_iter()
        .map(|site| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                let target = constant(&runtime, &Type::INT, Value::Int(42)).unwrap();
                site.set_target(target).unwrap();
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    CallSite::sync_all(&[volatile.clone(), mutable.clone()]);
    for site in [volatile, mutable] {
        assert_eq!(site.target().invoke_exact(vec![]).unwrap(), Value::Int(42));
    }
}

#[test]
fn readers_see_either_the_old_or_the_new_target() {
    let fixture = FixtureWorld::new().build();
    let runtime = &fixture.runtime;
    let old = constant(runtime, &Type::INT, Value::Int(1)).unwrap();
    let new = constant(runtime, &Type::INT, Value::Int(2)).unwrap();
    let site = CallSite::volatile(old);
    let invoker = site.dynamic_invoker().unwrap();

    thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let invoker = invoker.clone();
                scope.spawn(move || {
                    (0..200)
                        .map(|_| invoker.invoke_exact(vec![]).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        site.set_target(new).unwrap();
        for reader in readers {
            let seen = reader.join().unwrap();
            assert!(seen
                .iter()
                .all(|value| *value == Value::Int(1) || *value == Value::Int(2)));
        }
    });
    assert_eq!(invoker.invoke_exact(vec![]).unwrap(), Value::Int(2));
}
