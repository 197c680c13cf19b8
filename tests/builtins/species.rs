//! Species construction and realm boundaries

use std::rc::Rc;

use jsarray::species::{array_species_create, typed_array_species_create};
use jsarray::value::ExoticObject;
use jsarray::{ElementStore, JsValue, PropertyKey, Runtime, TypedArrayKind};

use super::{call_array_method, call_method, elements, get_at, length_of, number_array};

fn prototype_of(v: &JsValue) -> jsarray::JsObjectRef {
    let JsValue::Object(o) = v else { panic!("expected object") };
    let p = o.borrow().prototype.clone();
    p.unwrap()
}

fn species_key(rt: &Runtime) -> PropertyKey {
    PropertyKey::Symbol(rt.symbols.species.clone())
}

#[test]
fn test_default_species_builds_array_of_current_realm() {
    let mut rt = Runtime::new();
    let arr = number_array(&mut rt, &[1.0, 2.0, 3.0]);
    let r = call_method(&mut rt, &arr, "slice", &[JsValue::Number(1.0)]).unwrap();
    assert!(r.is_array());
    assert!(Rc::ptr_eq(
        &prototype_of(&r),
        &rt.current_realm().array_prototype
    ));
}

#[test]
fn test_non_array_source_ignores_constructor() {
    let mut rt = Runtime::new();
    // Species resolution only applies to genuine arrays.
    let o = JsValue::Object(rt.create_object());
    rt.set_property(&o, PropertyKey::from("constructor"), JsValue::Number(5.0)).unwrap();
    rt.set_property(&o, PropertyKey::from("length"), JsValue::Number(1.0)).unwrap();
    rt.set_property(&o, PropertyKey::from("0"), JsValue::Number(7.0)).unwrap();
    let r = call_array_method(&mut rt, &o, "slice", &[]).unwrap();
    assert!(r.is_array());
    assert_eq!(elements(&mut rt, &r), vec![Some(7.0)]);
}

#[test]
fn test_primitive_constructor_is_type_error() {
    let mut rt = Runtime::new();
    let arr = number_array(&mut rt, &[1.0]);
    rt.set_property(&arr, PropertyKey::from("constructor"), JsValue::Number(5.0)).unwrap();
    let err = call_method(&mut rt, &arr, "slice", &[]).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_species_undefined_or_null_means_default() {
    let mut rt = Runtime::new();
    for marker in [JsValue::Undefined, JsValue::Null] {
        let arr = number_array(&mut rt, &[1.0, 2.0]);
        let fake_ctor = JsValue::Object(rt.create_object());
        let key = species_key(&rt);
        rt.set_property(&fake_ctor, key, marker).unwrap();
        rt.set_property(&arr, PropertyKey::from("constructor"), fake_ctor).unwrap();
        let r = call_method(&mut rt, &arr, "slice", &[]).unwrap();
        assert!(r.is_array());
        assert_eq!(elements(&mut rt, &r), vec![Some(1.0), Some(2.0)]);
    }
}

#[test]
fn test_non_constructor_species_is_type_error() {
    let mut rt = Runtime::new();
    let arr = number_array(&mut rt, &[1.0]);
    let fake_ctor = JsValue::Object(rt.create_object());
    let not_ctor = JsValue::Object(rt.create_native_function(
        "f",
        0,
        Rc::new(|_rt: &mut Runtime, _this: JsValue, _args: &[JsValue]| Ok(JsValue::Undefined)),
    ));
    let key = species_key(&rt);
    rt.set_property(&fake_ctor, key, not_ctor).unwrap();
    rt.set_property(&arr, PropertyKey::from("constructor"), fake_ctor).unwrap();
    let err = array_species_create(&mut rt, &arr, 0).unwrap_err();
    assert!(err.is_type_error());
    // The same failure surfaces through a derived-array algorithm.
    assert!(call_method(&mut rt, &arr, "slice", &[]).unwrap_err().is_type_error());
}

#[test]
fn test_species_steers_derived_arrays() {
    let mut rt = Runtime::new();
    // Use another realm's Array as an explicit species constructor: the
    // derived array then carries that realm's prototype.
    let other = rt.create_realm();
    let arr = number_array(&mut rt, &[1.0, 2.0, 3.0]);
    let other_ctor = JsValue::Object(rt.realm(other).array_constructor.clone());
    let holder = JsValue::Object(rt.create_object());
    let key = species_key(&rt);
    rt.set_property(&holder, key, other_ctor).unwrap();
    rt.set_property(&arr, PropertyKey::from("constructor"), holder).unwrap();
    let r = call_method(&mut rt, &arr, "slice", &[JsValue::Number(1.0)]).unwrap();
    assert!(Rc::ptr_eq(&prototype_of(&r), &rt.realm(other).array_prototype));
    assert_eq!(elements(&mut rt, &r), vec![Some(2.0), Some(3.0)]);
}

#[test]
fn test_cross_realm_default_constructor_falls_back() {
    let mut rt = Runtime::new();
    let home = rt.current_realm_id();
    let other = rt.create_realm();
    // Array born in the other realm; its inherited `constructor` is the
    // other realm's Array, which must not leak into derived arrays here.
    let store = ElementStore::from_values(vec![JsValue::Number(1.0), JsValue::Number(2.0)]);
    let arr = JsValue::Object(rt.create_array_in_realm(other, store));
    let r = call_method(&mut rt, &arr, "slice", &[]).unwrap();
    assert!(Rc::ptr_eq(&prototype_of(&r), &rt.realm(home).array_prototype));
}

#[test]
fn test_same_realm_constructor_is_honored() {
    let mut rt = Runtime::new();
    let other = rt.create_realm();
    let store = ElementStore::from_values(vec![JsValue::Number(1.0)]);
    let arr = JsValue::Object(rt.create_array_in_realm(other, store));
    rt.set_current_realm(other);
    let r = call_method(&mut rt, &arr, "slice", &[]).unwrap();
    assert!(Rc::ptr_eq(&prototype_of(&r), &rt.realm(other).array_prototype));
}

#[test]
fn test_map_and_filter_use_species() {
    let mut rt = Runtime::new();
    let other = rt.create_realm();
    let arr = number_array(&mut rt, &[1.0, 2.0]);
    let other_ctor = JsValue::Object(rt.realm(other).array_constructor.clone());
    let holder = JsValue::Object(rt.create_object());
    let key = species_key(&rt);
    rt.set_property(&holder, key, other_ctor).unwrap();
    rt.set_property(&arr, PropertyKey::from("constructor"), holder).unwrap();
    let id = super::callback(&mut rt, |_rt, _this, args| Ok(args[0].clone()));
    let mapped = call_method(&mut rt, &arr, "map", &[id.clone()]).unwrap();
    assert!(Rc::ptr_eq(&prototype_of(&mapped), &rt.realm(other).array_prototype));
    let filtered = call_method(&mut rt, &arr, "filter", &[id]).unwrap();
    assert!(Rc::ptr_eq(&prototype_of(&filtered), &rt.realm(other).array_prototype));
}

// ── typed-array species ────────────────────────────────────────────────

fn typed(rt: &mut Runtime, kind: TypedArrayKind, len: f64) -> JsValue {
    let ctor = JsValue::Object(rt.current_realm().typed_array_constructor(kind));
    rt.construct(&ctor, &[JsValue::Number(len)]).unwrap()
}

fn kind_of(v: &JsValue) -> TypedArrayKind {
    let JsValue::Object(o) = v else { panic!("expected object") };
    let b = o.borrow();
    match &b.exotic {
        ExoticObject::TypedArray(view) => view.kind,
        _ => panic!("expected typed array"),
    }
}

#[test]
fn test_typed_species_defaults_to_source_kind() {
    let mut rt = Runtime::new();
    let src = typed(&mut rt, TypedArrayKind::Int32, 4.0);
    let r = typed_array_species_create(&mut rt, &src, &[JsValue::Number(2.0)]).unwrap();
    assert_eq!(kind_of(&r), TypedArrayKind::Int32);
    assert_eq!(length_of(&mut rt, &r), 2.0);
}

#[test]
fn test_typed_species_override_changes_kind() {
    let mut rt = Runtime::new();
    let src = typed(&mut rt, TypedArrayKind::Int32, 4.0);
    let f64_ctor = JsValue::Object(
        rt.current_realm().typed_array_constructor(TypedArrayKind::Float64),
    );
    rt.set_property(&src, PropertyKey::from("constructor"), f64_ctor).unwrap();
    let r = typed_array_species_create(&mut rt, &src, &[JsValue::Number(3.0)]).unwrap();
    assert_eq!(kind_of(&r), TypedArrayKind::Float64);
    assert_eq!(length_of(&mut rt, &r), 3.0);
}

#[test]
fn test_typed_species_rejects_array_result() {
    let mut rt = Runtime::new();
    let src = typed(&mut rt, TypedArrayKind::Uint8, 2.0);
    let array_ctor = JsValue::Object(rt.current_realm().array_constructor.clone());
    rt.set_property(&src, PropertyKey::from("constructor"), array_ctor).unwrap();
    let err = typed_array_species_create(&mut rt, &src, &[JsValue::Number(2.0)]).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_typed_species_on_non_typed_receiver_is_type_error() {
    let mut rt = Runtime::new();
    let arr = number_array(&mut rt, &[1.0]);
    let err = typed_array_species_create(&mut rt, &arr, &[JsValue::Number(1.0)]).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_species_symbol_on_array_constructor_is_itself() {
    let mut rt = Runtime::new();
    let ctor = JsValue::Object(rt.current_realm().array_constructor.clone());
    let key = species_key(&rt);
    let species = rt.get_property(&ctor, &key).unwrap();
    assert_eq!(species, ctor);
}

#[test]
fn test_species_construction_gets_length_argument() {
    let mut rt = Runtime::new();
    let arr = number_array(&mut rt, &[1.0, 2.0, 3.0, 4.0]);
    // A species container pre-sized to the slice count.
    let r = array_species_create(&mut rt, &arr, 9).unwrap();
    assert_eq!(length_of(&mut rt, &r), 9.0);
    assert!(!super::has_at(&mut rt, &r, 0));
    assert_eq!(get_at(&mut rt, &r, 0), JsValue::Undefined);
}
