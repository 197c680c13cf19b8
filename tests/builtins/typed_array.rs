//! Typed-array construction and element semantics

use std::cell::RefCell;
use std::rc::Rc;

use jsarray::{JsValue, PropertyKey, Runtime, TypedArrayKind};

use super::{callback, get_at, has_at, length_of, set_at};

fn ctor(rt: &Runtime, kind: TypedArrayKind) -> JsValue {
    JsValue::Object(rt.current_realm().typed_array_constructor(kind))
}

fn typed_from(rt: &mut Runtime, kind: TypedArrayKind, args: &[JsValue]) -> JsValue {
    let c = ctor(rt, kind);
    rt.construct(&c, args).unwrap()
}

fn byte_prop(rt: &mut Runtime, v: &JsValue, name: &str) -> f64 {
    rt.get_property(v, &PropertyKey::from(name)).unwrap().to_number()
}

// ── construction ───────────────────────────────────────────────────────

#[test]
fn test_fresh_buffer_construction() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Int32, &[JsValue::Number(4.0)]);
    assert_eq!(length_of(&mut rt, &ta), 4.0);
    assert_eq!(byte_prop(&mut rt, &ta, "byteLength"), 16.0);
    assert_eq!(byte_prop(&mut rt, &ta, "byteOffset"), 0.0);
    // Zero-filled.
    assert_eq!(get_at(&mut rt, &ta, 0), JsValue::Number(0.0));
    assert_eq!(get_at(&mut rt, &ta, 3), JsValue::Number(0.0));
}

#[test]
fn test_no_arguments_means_empty() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Uint8, &[]);
    assert_eq!(length_of(&mut rt, &ta), 0.0);
}

#[test]
fn test_negative_length_is_range_error() {
    let mut rt = Runtime::new();
    let c = ctor(&rt, TypedArrayKind::Uint8);
    let err = rt.construct(&c, &[JsValue::Number(-1.0)]).unwrap_err();
    assert!(err.is_range_error());
}

#[test]
fn test_buffer_wrap_full() {
    let mut rt = Runtime::new();
    let buf = JsValue::Object(rt.create_array_buffer(16));
    let ta = typed_from(&mut rt, TypedArrayKind::Int32, &[buf]);
    assert_eq!(length_of(&mut rt, &ta), 4.0);
}

#[test]
fn test_buffer_wrap_with_offset() {
    let mut rt = Runtime::new();
    let buf = JsValue::Object(rt.create_array_buffer(16));
    let ta = typed_from(
        &mut rt,
        TypedArrayKind::Int32,
        &[buf.clone(), JsValue::Number(4.0)],
    );
    assert_eq!(length_of(&mut rt, &ta), 3.0);
    assert_eq!(byte_prop(&mut rt, &ta, "byteOffset"), 4.0);
    // Writes land in the shared buffer where a full-width view sees them.
    set_at(&mut rt, &ta, 0, JsValue::Number(7.0));
    let full = typed_from(&mut rt, TypedArrayKind::Int32, &[buf]);
    assert_eq!(get_at(&mut rt, &full, 1), JsValue::Number(7.0));
}

#[test]
fn test_misaligned_offset_is_range_error() {
    let mut rt = Runtime::new();
    let buf = JsValue::Object(rt.create_array_buffer(16));
    let c = ctor(&rt, TypedArrayKind::Int32);
    let err = rt.construct(&c, &[buf, JsValue::Number(2.0)]).unwrap_err();
    assert!(err.is_range_error());
}

#[test]
fn test_ragged_buffer_length_is_range_error() {
    let mut rt = Runtime::new();
    let buf = JsValue::Object(rt.create_array_buffer(10));
    let c = ctor(&rt, TypedArrayKind::Int32);
    // 10 bytes is not a whole number of 4-byte elements.
    let err = rt.construct(&c, &[buf]).unwrap_err();
    assert!(err.is_range_error());
}

#[test]
fn test_explicit_length_beyond_buffer_is_range_error() {
    let mut rt = Runtime::new();
    let buf = JsValue::Object(rt.create_array_buffer(16));
    let c = ctor(&rt, TypedArrayKind::Int32);
    let err = rt
        .construct(&c, &[buf, JsValue::Number(8.0), JsValue::Number(3.0)])
        .unwrap_err();
    assert!(err.is_range_error());
}

#[test]
fn test_explicit_length_within_buffer() {
    let mut rt = Runtime::new();
    let buf = JsValue::Object(rt.create_array_buffer(16));
    let ta = typed_from(
        &mut rt,
        TypedArrayKind::Int32,
        &[buf, JsValue::Number(4.0), JsValue::Number(2.0)],
    );
    assert_eq!(length_of(&mut rt, &ta), 2.0);
    assert_eq!(byte_prop(&mut rt, &ta, "byteLength"), 8.0);
}

#[test]
fn test_copy_from_other_view_converts_elements() {
    let mut rt = Runtime::new();
    let src = typed_from(&mut rt, TypedArrayKind::Float64, &[JsValue::Number(2.0)]);
    set_at(&mut rt, &src, 0, JsValue::Number(1.5));
    set_at(&mut rt, &src, 1, JsValue::Number(-2.5));
    let dst = typed_from(&mut rt, TypedArrayKind::Int32, &[src.clone()]);
    assert_eq!(length_of(&mut rt, &dst), 2.0);
    assert_eq!(get_at(&mut rt, &dst, 0), JsValue::Number(1.0));
    assert_eq!(get_at(&mut rt, &dst, 1), JsValue::Number(-2.0));
    // Copy construction got a fresh buffer; the source is untouched.
    set_at(&mut rt, &dst, 0, JsValue::Number(9.0));
    assert_eq!(get_at(&mut rt, &src, 0), JsValue::Number(1.5));
}

#[test]
fn test_from_array_like() {
    let mut rt = Runtime::new();
    let arr = super::number_array(&mut rt, &[7.0, 8.0]);
    let ta = typed_from(&mut rt, TypedArrayKind::Uint8, &[arr]);
    assert_eq!(length_of(&mut rt, &ta), 2.0);
    assert_eq!(get_at(&mut rt, &ta, 0), JsValue::Number(7.0));
    assert_eq!(get_at(&mut rt, &ta, 1), JsValue::Number(8.0));
}

#[test]
fn test_from_iterable_drains_iterator() {
    let mut rt = Runtime::new();
    let iterable = JsValue::Object(rt.create_object());
    let iter_obj = rt.create_object();
    let counter = Rc::new(RefCell::new(0u32));
    let next = callback(&mut rt, move |_rt, _this, _args| {
        let mut c = counter.borrow_mut();
        *c += 1;
        let step = jsarray::value::JsObject::new();
        let step = Rc::new(RefCell::new(step));
        if *c <= 3 {
            step.borrow_mut()
                .set_property(PropertyKey::from("done"), JsValue::Boolean(false));
            step.borrow_mut()
                .set_property(PropertyKey::from("value"), JsValue::Number(f64::from(*c)));
        } else {
            step.borrow_mut()
                .set_property(PropertyKey::from("done"), JsValue::Boolean(true));
        }
        Ok(JsValue::Object(step))
    });
    iter_obj
        .borrow_mut()
        .set_property(PropertyKey::from("next"), next);
    let iter_fn = callback(&mut rt, move |_rt, _this, _args| {
        Ok(JsValue::Object(iter_obj.clone()))
    });
    let key = PropertyKey::Symbol(rt.symbols.iterator.clone());
    rt.set_property(&iterable, key, iter_fn).unwrap();

    let ta = typed_from(&mut rt, TypedArrayKind::Uint8, &[iterable]);
    assert_eq!(length_of(&mut rt, &ta), 3.0);
    assert_eq!(get_at(&mut rt, &ta, 0), JsValue::Number(1.0));
    assert_eq!(get_at(&mut rt, &ta, 2), JsValue::Number(3.0));
}

#[test]
fn test_detached_buffer_construction_is_type_error() {
    let mut rt = Runtime::new();
    let buf = JsValue::Object(rt.create_array_buffer(8));
    rt.detach_array_buffer(&buf).unwrap();
    let c = ctor(&rt, TypedArrayKind::Uint8);
    let err = rt.construct(&c, &[buf]).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_detach_during_offset_coercion_is_caught() {
    let mut rt = Runtime::new();
    let buf = JsValue::Object(rt.create_array_buffer(8));
    // valueOf detaches the buffer mid-construction; the post-coercion
    // liveness check must see it.
    let sneaky = JsValue::Object(rt.create_object());
    let target = buf.clone();
    let value_of = callback(&mut rt, move |rt, _this, _args| {
        rt.detach_array_buffer(&target)?;
        Ok(JsValue::Number(0.0))
    });
    rt.set_property(&sneaky, PropertyKey::from("valueOf"), value_of).unwrap();
    let c = ctor(&rt, TypedArrayKind::Uint8);
    let err = rt.construct(&c, &[buf, sneaky]).unwrap_err();
    assert!(err.is_type_error());
}

// ── element semantics ──────────────────────────────────────────────────

#[test]
fn test_element_access_on_detached_view_is_type_error() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Int32, &[JsValue::Number(2.0)]);
    rt.detach_array_buffer(&ta).unwrap();
    let err = rt
        .get_property(&ta, &PropertyKey::from_element_index(0))
        .unwrap_err();
    assert!(err.is_type_error());
    let err = rt
        .set_property(&ta, PropertyKey::from_element_index(0), JsValue::Number(1.0))
        .unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_out_of_range_write_is_dropped() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Uint8, &[JsValue::Number(2.0)]);
    rt.set_property(&ta, PropertyKey::from_element_index(10), JsValue::Number(5.0)).unwrap();
    assert_eq!(length_of(&mut rt, &ta), 2.0);
    assert!(!has_at(&mut rt, &ta, 10));
}

#[test]
fn test_canonical_index_never_consults_prototype() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Uint8, &[JsValue::Number(1.0)]);
    // Even with a matching index on the prototype, an out-of-range read
    // stays undefined.
    let proto = rt.current_realm().typed_array_prototype.clone();
    proto
        .borrow_mut()
        .set_property(PropertyKey::from_element_index(5), JsValue::Number(42.0));
    assert_eq!(get_at(&mut rt, &ta, 5), JsValue::Undefined);
}

#[test]
fn test_write_conversion_wraps_and_clamps() {
    let mut rt = Runtime::new();
    let wrap = typed_from(&mut rt, TypedArrayKind::Uint8, &[JsValue::Number(1.0)]);
    set_at(&mut rt, &wrap, 0, JsValue::Number(300.0));
    assert_eq!(get_at(&mut rt, &wrap, 0), JsValue::Number(44.0));
    let clamp = typed_from(&mut rt, TypedArrayKind::Uint8Clamped, &[JsValue::Number(1.0)]);
    set_at(&mut rt, &clamp, 0, JsValue::Number(300.0));
    assert_eq!(get_at(&mut rt, &clamp, 0), JsValue::Number(255.0));
}

#[test]
fn test_write_coerces_through_value_of() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Int32, &[JsValue::Number(1.0)]);
    let boxed = JsValue::Object(rt.create_object());
    let value_of = callback(&mut rt, |_rt, _this, _args| Ok(JsValue::Number(11.0)));
    rt.set_property(&boxed, PropertyKey::from("valueOf"), value_of).unwrap();
    set_at(&mut rt, &ta, 0, boxed);
    assert_eq!(get_at(&mut rt, &ta, 0), JsValue::Number(11.0));
}

// ── array algorithms over typed receivers ──────────────────────────────

#[test]
fn test_array_sort_over_typed_receiver() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Int32, &[JsValue::Number(3.0)]);
    set_at(&mut rt, &ta, 0, JsValue::Number(3.0));
    set_at(&mut rt, &ta, 1, JsValue::Number(1.0));
    set_at(&mut rt, &ta, 2, JsValue::Number(2.0));
    let arr = super::number_array(&mut rt, &[]);
    let sort = rt.get_property(&arr, &PropertyKey::from("sort")).unwrap();
    let cmp = callback(&mut rt, |_rt, _this, args| {
        Ok(JsValue::Number(args[0].to_number() - args[1].to_number()))
    });
    rt.call_function(&sort, &ta, &[cmp]).unwrap();
    assert_eq!(get_at(&mut rt, &ta, 0), JsValue::Number(1.0));
    assert_eq!(get_at(&mut rt, &ta, 2), JsValue::Number(3.0));
}

#[test]
fn test_detach_during_sort_comparator_is_type_error() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Int32, &[JsValue::Number(2.0)]);
    set_at(&mut rt, &ta, 0, JsValue::Number(3.0));
    set_at(&mut rt, &ta, 1, JsValue::Number(1.0));
    let arr = super::number_array(&mut rt, &[]);
    let sort = rt.get_property(&arr, &PropertyKey::from("sort")).unwrap();
    let target = ta.clone();
    let cmp = callback(&mut rt, move |rt, _this, args| {
        rt.detach_array_buffer(&target)?;
        Ok(JsValue::Number(args[0].to_number() - args[1].to_number()))
    });
    // The write-back phase hits the now-dead buffer.
    let err = rt.call_function(&sort, &ta, &[cmp]).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn test_array_join_over_typed_receiver() {
    let mut rt = Runtime::new();
    let ta = typed_from(&mut rt, TypedArrayKind::Uint8, &[JsValue::Number(3.0)]);
    set_at(&mut rt, &ta, 0, JsValue::Number(1.0));
    set_at(&mut rt, &ta, 1, JsValue::Number(2.0));
    set_at(&mut rt, &ta, 2, JsValue::Number(3.0));
    let arr = super::number_array(&mut rt, &[]);
    let join = rt.get_property(&arr, &PropertyKey::from("join")).unwrap();
    assert_eq!(
        rt.call_function(&join, &ta, &[JsValue::from("-")]).unwrap(),
        JsValue::from("1-2-3")
    );
}

#[test]
fn test_bytes_per_element() {
    let mut rt = Runtime::new();
    for (kind, size) in [
        (TypedArrayKind::Uint8, 1.0),
        (TypedArrayKind::Int16, 2.0),
        (TypedArrayKind::Float64, 8.0),
    ] {
        let c = ctor(&rt, kind);
        assert_eq!(byte_prop(&mut rt, &c, "BYTES_PER_ELEMENT"), size);
    }
}
