//! Typed-array constructors
//!
//! One constructor per element kind, all sharing the realm's typed-array
//! prototype. The constructor body is a dispatch over the first argument:
//! nothing/number (fresh buffer), ArrayBuffer (wrap with offset/length
//! validation), another view (copy with per-kind conversion), iterable
//! (drain then convert), or plain array-like (indexed reads). Any argument
//! coercion can run user code, so buffer liveness is re-checked after each
//! coercion point on the ArrayBuffer path.

use std::rc::Rc;

use crate::buffer::{BufferData, BufferRef, TypedArrayKind, TypedArrayView};
use crate::error::JsError;
use crate::realm::RealmId;
use crate::runtime::Runtime;
use crate::value::{
    CheapClone, ExoticObject, JsValue, NativeFn, Property, PropertyKey, to_integer_or_infinity,
};

/// Upper bound on a view's byte length; matches the engine-typical i32
/// addressing limit.
const MAX_BYTE_LENGTH: u64 = i32::MAX as u64;

/// Create the per-kind constructors for a freshly created realm and hang
/// them off the shared typed-array prototype.
pub(crate) fn install(rt: &mut Runtime, realm: RealmId) {
    let object_prototype = rt.realm(realm).object_prototype.cheap_clone();
    let typed_prototype = rt.realm(realm).typed_array_prototype.cheap_clone();
    for kind in TypedArrayKind::ALL {
        let ctor = rt.create_bare_function(
            kind.name(),
            3,
            true,
            constructor_fn(kind),
            &object_prototype,
        );
        ctor.borrow_mut().define_property(
            PropertyKey::from("prototype"),
            Property::with_attributes(
                JsValue::Object(typed_prototype.cheap_clone()),
                false,
                false,
                false,
            ),
        );
        ctor.borrow_mut().define_property(
            PropertyKey::from("BYTES_PER_ELEMENT"),
            Property::with_attributes(
                JsValue::Number(kind.element_size() as f64),
                false,
                false,
                false,
            ),
        );
        ctor.borrow_mut().define_property(
            PropertyKey::Symbol(rt.symbols.species.clone()),
            Property::with_attributes(JsValue::Object(ctor.cheap_clone()), false, false, true),
        );
        rt.realm_mut(realm).typed_array_constructors.push((kind, ctor));
    }
}

fn constructor_fn(kind: TypedArrayKind) -> NativeFn {
    Rc::new(move |rt: &mut Runtime, this: JsValue, args: &[JsValue]| {
        construct_typed_array(rt, kind, this, args)
    })
}

fn construct_typed_array(
    rt: &mut Runtime,
    kind: TypedArrayKind,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let JsValue::Object(receiver) = &this else {
        return Err(JsError::type_error(format!(
            "Constructor {} requires 'new'",
            kind.name()
        )));
    };

    let first = args.first().cloned().unwrap_or(JsValue::Undefined);
    let view = match &first {
        JsValue::Undefined => allocate(kind, 0)?,
        JsValue::Object(obj) => {
            let (exotic_buffer, exotic_view) = {
                let b = obj.borrow();
                match &b.exotic {
                    ExoticObject::ArrayBuffer(buf) => (Some(buf.cheap_clone()), None),
                    ExoticObject::TypedArray(v) => (None, Some(v.clone())),
                    _ => (None, None),
                }
            };
            if let Some(buf) = exotic_buffer {
                from_array_buffer(rt, kind, buf, args)?
            } else if let Some(src) = exotic_view {
                from_typed_array(kind, &src)?
            } else {
                let iterator_key = PropertyKey::Symbol(rt.symbols.iterator.clone());
                let iter_fn = rt.get_property(&first, &iterator_key)?;
                if iter_fn.is_callable() {
                    let values = drain_iterator(rt, &first, &iter_fn)?;
                    from_values(rt, kind, values)?
                } else {
                    from_array_like(rt, kind, &first)?
                }
            }
        }
        // Any other primitive is a length.
        _ => {
            let len = rt.to_index(&first, "typed array length")?;
            allocate(kind, len)?
        }
    };

    receiver.borrow_mut().exotic = ExoticObject::TypedArray(view);
    Ok(this)
}

fn allocate(kind: TypedArrayKind, length: u64) -> Result<TypedArrayView, JsError> {
    let byte_length = length
        .checked_mul(kind.element_size() as u64)
        .filter(|b| *b <= MAX_BYTE_LENGTH)
        .ok_or_else(|| JsError::range_error("Invalid typed array length"))?;
    Ok(TypedArrayView::new(
        BufferData::new(byte_length as usize),
        kind,
        0,
        length as usize,
    ))
}

/// Wrap an existing buffer: validate offset alignment and bounds, and
/// re-check liveness after every coercion that can run user code.
fn from_array_buffer(
    rt: &mut Runtime,
    kind: TypedArrayKind,
    buf: BufferRef,
    args: &[JsValue],
) -> Result<TypedArrayView, JsError> {
    let size = kind.element_size() as u64;
    let offset_arg = args.get(1).cloned().unwrap_or(JsValue::Undefined);
    let byte_offset = rt.to_index(&offset_arg, "typed array byte offset")?;
    if byte_offset % size != 0 {
        return Err(JsError::range_error(format!(
            "Start offset of {} should be a multiple of {}",
            kind.name(),
            size
        )));
    }
    let length_arg = args.get(2).cloned().unwrap_or(JsValue::Undefined);
    let explicit_length = if length_arg.is_undefined() {
        None
    } else {
        Some(rt.to_index(&length_arg, "typed array length")?)
    };
    // Both ToIndex calls above may have run valueOf; only now look at the
    // buffer's current state.
    if buf.borrow().is_detached() {
        return Err(JsError::type_error(format!(
            "Cannot perform {} operation on a detached ArrayBuffer",
            kind.name()
        )));
    }
    let buffer_bytes = buf.borrow().byte_length() as u64;
    let length = match explicit_length {
        None => {
            if byte_offset > buffer_bytes || (buffer_bytes - byte_offset) % size != 0 {
                return Err(JsError::range_error(format!(
                    "Byte length of {} should be a multiple of {}",
                    kind.name(),
                    size
                )));
            }
            (buffer_bytes - byte_offset) / size
        }
        Some(n) => {
            let end = byte_offset
                .checked_add(n.checked_mul(size).unwrap_or(u64::MAX))
                .unwrap_or(u64::MAX);
            if end > buffer_bytes {
                return Err(JsError::range_error("Invalid typed array length"));
            }
            n
        }
    };
    if length * size > MAX_BYTE_LENGTH {
        return Err(JsError::range_error("Invalid typed array length"));
    }
    Ok(TypedArrayView::new(
        buf,
        kind,
        byte_offset as usize,
        length as usize,
    ))
}

/// Copy construction from another view, onto a fresh buffer, converting
/// element-by-element into the target kind.
fn from_typed_array(kind: TypedArrayKind, src: &TypedArrayView) -> Result<TypedArrayView, JsError> {
    if src.is_detached() {
        return Err(JsError::type_error(format!(
            "Cannot perform {} operation on a detached ArrayBuffer",
            kind.name()
        )));
    }
    let len = src.length() as u64;
    let view = allocate(kind, len)?;
    for i in 0..len {
        if let Some(JsValue::Number(n)) = src.get(i)? {
            view.set(i, n)?;
        }
    }
    Ok(view)
}

fn from_values(
    rt: &mut Runtime,
    kind: TypedArrayKind,
    values: Vec<JsValue>,
) -> Result<TypedArrayView, JsError> {
    let view = allocate(kind, values.len() as u64)?;
    for (i, v) in values.into_iter().enumerate() {
        let n = rt.to_numeric(&v)?;
        view.set(i as u64, n)?;
    }
    Ok(view)
}

fn from_array_like(
    rt: &mut Runtime,
    kind: TypedArrayKind,
    source: &JsValue,
) -> Result<TypedArrayView, JsError> {
    let raw = rt.get_property(source, &PropertyKey::from("length"))?;
    let n = to_integer_or_infinity(rt.to_numeric(&raw)?);
    let len = if n <= 0.0 { 0 } else { n as u64 };
    let view = allocate(kind, len)?;
    for i in 0..len {
        let v = rt.get_property(source, &PropertyKey::from_element_index(i))?;
        let n = rt.to_numeric(&v)?;
        view.set(i, n)?;
    }
    Ok(view)
}

/// Drain an iterable to completion. An abrupt completion while reading a
/// step closes the iterator before propagating.
fn drain_iterator(
    rt: &mut Runtime,
    iterable: &JsValue,
    iter_fn: &JsValue,
) -> Result<Vec<JsValue>, JsError> {
    let iterator = rt.call_function(iter_fn, iterable, &[])?;
    let next = rt.get_property(&iterator, &PropertyKey::from("next"))?;
    let mut out = Vec::new();
    loop {
        let step = rt.call_function(&next, &iterator, &[])?;
        let done = match rt.get_property(&step, &PropertyKey::from("done")) {
            Ok(d) => d.to_boolean(),
            Err(e) => {
                close_iterator(rt, &iterator);
                return Err(e);
            }
        };
        if done {
            break;
        }
        match rt.get_property(&step, &PropertyKey::from("value")) {
            Ok(v) => out.push(v),
            Err(e) => {
                close_iterator(rt, &iterator);
                return Err(e);
            }
        }
    }
    Ok(out)
}

/// Best-effort `return()`; its own failures are swallowed, the original
/// abrupt completion wins.
fn close_iterator(rt: &mut Runtime, iterator: &JsValue) {
    if let Ok(ret) = rt.get_property(iterator, &PropertyKey::from("return"))
        && ret.is_callable()
    {
        let _ = rt.call_function(&ret, iterator, &[]);
    }
}
