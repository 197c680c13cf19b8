//! Array constructor and Array.prototype algorithms
//!
//! Every builtin takes the shared native signature and coerces its receiver
//! with ToObject, so each works on genuine arrays and on generic array-like
//! receivers alike. Genuine arrays additionally get storage-level fast paths
//! keyed off the element store's shape; those paths are observationally
//! equivalent to the generic element-wise protocol because direct storage
//! cannot carry accessors.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::JsError;
use crate::realm::RealmId;
use crate::runtime::Runtime;
use crate::species::array_species_create;
use crate::storage::{ElementStore, MAX_SAFE_INTEGER};
use crate::traversal::{
    ElementCursor, has_element, next_element_index, previous_element_index,
};
use crate::value::{
    CheapClone, JsValue, NativeFn, Property, PropertyKey, to_integer_or_infinity,
};

use super::native;

/// Longest string `join` will build before raising a RangeError.
const MAX_STRING_LENGTH: u64 = (1 << 31) - 1;

/// The native body of the `Array` constructor for `realm`. Split out from
/// [`install`] because realm setup needs the function object before the
/// prototype methods exist.
pub(crate) fn array_constructor_fn_for(realm: RealmId) -> NativeFn {
    Rc::new(
        move |rt: &mut Runtime, _this: JsValue, args: &[JsValue]| {
            let store = if let [JsValue::Number(n)] = args {
                let len = to_integer_or_infinity(*n);
                if len != *n || !(0.0..=MAX_SAFE_INTEGER as f64).contains(&len) {
                    return Err(JsError::range_error("Invalid array length"));
                }
                ElementStore::with_length(len as u64)?
            } else {
                ElementStore::from_values(args.to_vec())
            };
            Ok(JsValue::Object(rt.create_array_in_realm(realm, store)))
        },
    )
}

/// Wire up `Array`, `Array.prototype`, and the prototype methods for a
/// freshly created realm.
pub(crate) fn install(rt: &mut Runtime, realm: RealmId) {
    let proto = rt.realm(realm).array_prototype.cheap_clone();
    let ctor = rt.realm(realm).array_constructor.cheap_clone();

    ctor.borrow_mut().define_property(
        PropertyKey::from("prototype"),
        Property::with_attributes(JsValue::Object(proto.cheap_clone()), false, false, false),
    );
    proto.borrow_mut().define_property(
        PropertyKey::from("constructor"),
        Property::with_attributes(JsValue::Object(ctor.cheap_clone()), true, false, true),
    );
    // @@species on the standard constructor resolves to the constructor
    // itself; subclasses override it to steer species construction.
    ctor.borrow_mut().define_property(
        PropertyKey::Symbol(rt.symbols.species.clone()),
        Property::with_attributes(JsValue::Object(ctor.cheap_clone()), false, false, true),
    );

    rt.register_method(&ctor, "isArray", 1, native(array_is_array));

    rt.register_method(&proto, "push", 1, native(array_push));
    rt.register_method(&proto, "pop", 0, native(array_pop));
    rt.register_method(&proto, "shift", 0, native(array_shift));
    rt.register_method(&proto, "unshift", 1, native(array_unshift));
    rt.register_method(&proto, "slice", 2, native(array_slice));
    rt.register_method(&proto, "splice", 2, native(array_splice));
    rt.register_method(&proto, "concat", 1, native(array_concat));
    rt.register_method(&proto, "join", 1, native(array_join));
    rt.register_method(&proto, "indexOf", 1, native(array_index_of));
    rt.register_method(&proto, "lastIndexOf", 1, native(array_last_index_of));
    rt.register_method(&proto, "includes", 1, native(array_includes));
    rt.register_method(&proto, "sort", 1, native(array_sort));
    rt.register_method(&proto, "reverse", 0, native(array_reverse));
    rt.register_method(&proto, "fill", 1, native(array_fill));
    rt.register_method(&proto, "copyWithin", 2, native(array_copy_within));
    rt.register_method(&proto, "every", 1, native(array_every));
    rt.register_method(&proto, "some", 1, native(array_some));
    rt.register_method(&proto, "forEach", 1, native(array_for_each));
    rt.register_method(&proto, "map", 1, native(array_map));
    rt.register_method(&proto, "filter", 1, native(array_filter));
    rt.register_method(&proto, "find", 1, native(array_find));
    rt.register_method(&proto, "findIndex", 1, native(array_find_index));
    rt.register_method(&proto, "findLast", 1, native(array_find_last));
    rt.register_method(&proto, "findLastIndex", 1, native(array_find_last_index));
    rt.register_method(&proto, "reduce", 1, native(array_reduce));
    rt.register_method(&proto, "reduceRight", 1, native(array_reduce_right));
    rt.register_method(&proto, "at", 1, native(array_at));
}

// ── shared helpers ─────────────────────────────────────────────────────

fn arg(args: &[JsValue], i: usize) -> JsValue {
    args.get(i).cloned().unwrap_or(JsValue::Undefined)
}

/// LengthOfArrayLike: read `length`, coerce, clamp to [0, 2^53-1].
fn length_of_array_like(rt: &mut Runtime, o: &JsValue) -> Result<u64, JsError> {
    let raw = rt.get_property(o, &PropertyKey::from("length"))?;
    let n = to_integer_or_infinity(rt.to_numeric(&raw)?);
    if n <= 0.0 {
        Ok(0)
    } else {
        Ok(n.min(MAX_SAFE_INTEGER as f64) as u64)
    }
}

fn get_index(rt: &mut Runtime, o: &JsValue, i: u64) -> Result<JsValue, JsError> {
    rt.get_property(o, &PropertyKey::from_element_index(i))
}

fn set_index(rt: &mut Runtime, o: &JsValue, i: u64, v: JsValue) -> Result<(), JsError> {
    rt.set_property(o, PropertyKey::from_element_index(i), v)
}

fn delete_index(rt: &mut Runtime, o: &JsValue, i: u64) -> Result<(), JsError> {
    rt.delete_property(o, &PropertyKey::from_element_index(i))?;
    Ok(())
}

fn set_length(rt: &mut Runtime, o: &JsValue, len: u64) -> Result<(), JsError> {
    rt.set_property(o, PropertyKey::from("length"), JsValue::Number(len as f64))
}

/// Resolve a relative index against `len`: negative counts from the end,
/// both directions clamp into [0, len].
fn relative_index(n: f64, len: u64) -> u64 {
    if n < 0.0 {
        let back = len as f64 + n;
        if back < 0.0 { 0 } else { back as u64 }
    } else if n > len as f64 {
        len
    } else {
        n as u64
    }
}

fn relative_from(rt: &mut Runtime, v: &JsValue, len: u64) -> Result<u64, JsError> {
    let n = to_integer_or_infinity(rt.to_numeric(v)?);
    Ok(relative_index(n, len))
}

fn require_callable(v: &JsValue) -> Result<(), JsError> {
    if v.is_callable() {
        Ok(())
    } else {
        Err(JsError::type_error(format!(
            "{} is not a function",
            v.to_js_string()
        )))
    }
}

/// Storage shape of a mutable genuine array, or `None` when the receiver
/// must go through the generic element-wise protocol (non-array, or frozen
/// so that storage writes would not be silently ignored the way the
/// property model ignores them).
enum ArrayShape {
    Dense,
    Holey,
    Sparse,
}

fn mutable_array_shape(o: &JsValue) -> Option<ArrayShape> {
    let JsValue::Object(obj) = o else { return None };
    let b = obj.borrow();
    if b.frozen {
        return None;
    }
    match b.elements() {
        Some(s) if s.is_sparse() => Some(ArrayShape::Sparse),
        Some(s) if s.is_dense() => Some(ArrayShape::Dense),
        Some(_) => Some(ArrayShape::Holey),
        None => None,
    }
}

/// Run `f` against the receiver's element store. The closure must not call
/// back into the runtime; the store is borrowed for its duration.
fn with_store<R>(o: &JsValue, f: impl FnOnce(&mut ElementStore) -> R) -> Option<R> {
    let JsValue::Object(obj) = o else { return None };
    let mut b = obj.borrow_mut();
    b.elements_mut().map(f)
}

fn frozen_object(o: &JsValue) -> bool {
    matches!(o, JsValue::Object(obj) if obj.borrow().frozen)
}

// ── Array statics ──────────────────────────────────────────────────────

fn array_is_array(
    _rt: &mut Runtime,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(arg(args, 0).is_array()))
}

// ── length-mutating algorithms ─────────────────────────────────────────

fn array_push(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let count = args.len() as u64;
    // All-or-nothing: reject before any element lands.
    if len + count > MAX_SAFE_INTEGER {
        return Err(JsError::type_error(
            "Pushing element on array would exceed the maximum safe length",
        ));
    }
    for (i, item) in args.iter().enumerate() {
        set_index(rt, &o, len + i as u64, item.clone())?;
    }
    let new_len = len + count;
    set_length(rt, &o, new_len)?;
    Ok(JsValue::Number(new_len as f64))
}

fn array_pop(rt: &mut Runtime, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    if len == 0 {
        set_length(rt, &o, 0)?;
        return Ok(JsValue::Undefined);
    }
    let idx = len - 1;
    let value = get_index(rt, &o, idx)?;
    delete_index(rt, &o, idx)?;
    set_length(rt, &o, idx)?;
    Ok(value)
}

fn array_shift(rt: &mut Runtime, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    if len == 0 {
        set_length(rt, &o, 0)?;
        return Ok(JsValue::Undefined);
    }
    let first = get_index(rt, &o, 0)?;
    match mutable_array_shape(&o) {
        Some(ArrayShape::Dense) => {
            // Relabel in place by dropping the front slot.
            with_store(&o, |store| {
                store.shift_front(1);
            });
        }
        Some(ArrayShape::Holey) => {
            let moved = with_store(&o, |store| -> Result<(), JsError> {
                for i in 0..len - 1 {
                    match store.get(i + 1) {
                        Some(v) => store.set(i, v)?,
                        None => store.delete(i),
                    }
                }
                store.set_length(len - 1)
            });
            if let Some(r) = moved {
                r?;
            }
        }
        Some(ArrayShape::Sparse) => {
            // Only populated slots move; the gaps relabel for free.
            let moved = with_store(&o, |store| -> Result<(), JsError> {
                for (idx, v) in store.populated() {
                    if idx == 0 {
                        store.delete(0);
                    } else {
                        store.set(idx - 1, v)?;
                        store.delete(idx);
                    }
                }
                store.set_length(len - 1)
            });
            if let Some(r) = moved {
                r?;
            }
        }
        None => {
            for k in 1..len {
                if has_element(rt, &o, k)? {
                    let v = get_index(rt, &o, k)?;
                    set_index(rt, &o, k - 1, v)?;
                } else {
                    delete_index(rt, &o, k - 1)?;
                }
            }
            delete_index(rt, &o, len - 1)?;
            set_length(rt, &o, len - 1)?;
        }
    }
    Ok(first)
}

fn array_unshift(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let count = args.len() as u64;
    if count > 0 {
        if len + count > MAX_SAFE_INTEGER {
            return Err(JsError::type_error(
                "Pushing element on array would exceed the maximum safe length",
            ));
        }
        let spliced = matches!(mutable_array_shape(&o), Some(ArrayShape::Dense))
            && with_store(&o, |store| store.splice_dense(0, 0, args)).unwrap_or(false);
        if !spliced {
            // Copy up from the back so sources are read before overwrite.
            let mut k = len;
            while k > 0 {
                let from = k - 1;
                let to = k + count - 1;
                if has_element(rt, &o, from)? {
                    let v = get_index(rt, &o, from)?;
                    set_index(rt, &o, to, v)?;
                } else {
                    delete_index(rt, &o, to)?;
                }
                k -= 1;
            }
            for (i, item) in args.iter().enumerate() {
                set_index(rt, &o, i as u64, item.clone())?;
            }
        }
    }
    let new_len = len + count;
    set_length(rt, &o, new_len)?;
    Ok(JsValue::Number(new_len as f64))
}

// ── copying algorithms ─────────────────────────────────────────────────

fn array_slice(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let start = relative_from(rt, &arg(args, 0), len)?;
    let end = match arg(args, 1) {
        JsValue::Undefined => len,
        v => relative_from(rt, &v, len)?,
    };
    let count = end.saturating_sub(start);
    let target = array_species_create(rt, &o, count)?;
    // Walk only populated indices; holes stay holes in the copy.
    let mut pos = if start == 0 { None } else { Some(start - 1) };
    while let Some(k) = next_element_index(rt, &o, pos, end)? {
        let v = get_index(rt, &o, k)?;
        set_index(rt, &target, k - start, v)?;
        pos = Some(k);
    }
    set_length(rt, &target, count)?;
    Ok(target)
}

fn array_splice(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let start = relative_from(rt, &arg(args, 0), len)?;
    // With exactly one argument everything from `start` is deleted, even
    // though a missing delete count coerces to zero elsewhere. Matches the
    // de-facto behavior of the major engines.
    let delete_count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => {
            let requested = to_integer_or_infinity(rt.to_numeric(&arg(args, 1))?);
            relative_index(requested.max(0.0), len - start)
        }
    };
    let items: &[JsValue] = args.get(2..).unwrap_or_default();
    let item_count = items.len() as u64;
    if len - delete_count + item_count > MAX_SAFE_INTEGER {
        return Err(JsError::type_error(
            "Pushing element on array would exceed the maximum safe length",
        ));
    }
    let new_len = len - delete_count + item_count;

    let removed = array_species_create(rt, &o, delete_count)?;
    let mut pos = if start == 0 { None } else { Some(start - 1) };
    while let Some(k) = next_element_index(rt, &o, pos, start + delete_count)? {
        let v = get_index(rt, &o, k)?;
        set_index(rt, &removed, k - start, v)?;
        pos = Some(k);
    }
    set_length(rt, &removed, delete_count)?;

    match mutable_array_shape(&o) {
        Some(ArrayShape::Dense) => {
            with_store(&o, |store| {
                store.splice_dense(start as usize, delete_count as usize, items)
            });
        }
        Some(ArrayShape::Holey) => {
            let moved = with_store(&o, |store| -> Result<(), JsError> {
                if item_count < delete_count {
                    for k in start..len - delete_count {
                        match store.get(k + delete_count) {
                            Some(v) => store.set(k + item_count, v)?,
                            None => store.delete(k + item_count),
                        }
                    }
                } else if item_count > delete_count {
                    let mut k = len - delete_count;
                    while k > start {
                        match store.get(k + delete_count - 1) {
                            Some(v) => store.set(k + item_count - 1, v)?,
                            None => store.delete(k + item_count - 1),
                        }
                        k -= 1;
                    }
                }
                for (i, item) in items.iter().enumerate() {
                    store.set(start + i as u64, item.clone())?;
                }
                // Deletes past the old length are no-ops, so a trailing hole
                // only survives a growing splice if the length is written out.
                store.set_length(new_len)?;
                Ok(())
            });
            if let Some(r) = moved {
                r?;
            }
        }
        Some(ArrayShape::Sparse) => {
            let moved = with_store(&o, |store| -> Result<(), JsError> {
                let entries = store.populated();
                store.set_length(0)?;
                store.set_length(new_len)?;
                for (idx, v) in entries {
                    if idx < start {
                        store.set(idx, v)?;
                    } else if idx >= start + delete_count {
                        store.set(idx - delete_count + item_count, v)?;
                    }
                }
                for (i, item) in items.iter().enumerate() {
                    store.set(start + i as u64, item.clone())?;
                }
                Ok(())
            });
            if let Some(r) = moved {
                r?;
            }
        }
        None => {
            if item_count < delete_count {
                for k in start..len - delete_count {
                    let from = k + delete_count;
                    let to = k + item_count;
                    if has_element(rt, &o, from)? {
                        let v = get_index(rt, &o, from)?;
                        set_index(rt, &o, to, v)?;
                    } else {
                        delete_index(rt, &o, to)?;
                    }
                }
                let mut k = len;
                while k > new_len {
                    delete_index(rt, &o, k - 1)?;
                    k -= 1;
                }
            } else if item_count > delete_count {
                let mut k = len - delete_count;
                while k > start {
                    let from = k + delete_count - 1;
                    let to = k + item_count - 1;
                    if has_element(rt, &o, from)? {
                        let v = get_index(rt, &o, from)?;
                        set_index(rt, &o, to, v)?;
                    } else {
                        delete_index(rt, &o, to)?;
                    }
                    k -= 1;
                }
            }
            for (i, item) in items.iter().enumerate() {
                set_index(rt, &o, start + i as u64, item.clone())?;
            }
            set_length(rt, &o, new_len)?;
        }
    }
    Ok(removed)
}

fn array_concat(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let target = array_species_create(rt, &o, 0)?;
    let mut n: u64 = 0;
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(o);
    parts.extend(args.iter().cloned());
    for part in parts {
        if is_concat_spreadable(rt, &part)? {
            let part_len = length_of_array_like(rt, &part)?;
            if n + part_len > MAX_SAFE_INTEGER {
                return Err(JsError::type_error(
                    "Concatenating arrays would exceed the maximum safe length",
                ));
            }
            let mut pos = None;
            while let Some(k) = next_element_index(rt, &part, pos, part_len)? {
                let v = get_index(rt, &part, k)?;
                set_index(rt, &target, n + k, v)?;
                pos = Some(k);
            }
            n += part_len;
        } else {
            if n >= MAX_SAFE_INTEGER {
                return Err(JsError::type_error(
                    "Concatenating arrays would exceed the maximum safe length",
                ));
            }
            set_index(rt, &target, n, part)?;
            n += 1;
        }
    }
    set_length(rt, &target, n)?;
    Ok(target)
}

/// IsConcatSpreadable: @@isConcatSpreadable when present, IsArray otherwise.
fn is_concat_spreadable(rt: &mut Runtime, v: &JsValue) -> Result<bool, JsError> {
    if !v.is_object() {
        return Ok(false);
    }
    let key = PropertyKey::Symbol(rt.symbols.is_concat_spreadable.clone());
    match rt.get_property(v, &key)? {
        JsValue::Undefined => Ok(v.is_array()),
        flag => Ok(flag.to_boolean()),
    }
}

// ── string conversion ──────────────────────────────────────────────────

fn array_join(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let sep = match arg(args, 0) {
        JsValue::Undefined => ",".to_string(),
        v => v.to_js_string().as_str().to_string(),
    };
    if len == 0 {
        return Ok(JsValue::from(""));
    }
    if len == 1 {
        return Ok(JsValue::from(element_string(rt, &o, 0)?));
    }
    if len == 2 {
        let a = element_string(rt, &o, 0)?;
        let b = element_string(rt, &o, 1)?;
        return Ok(JsValue::from(format!("{}{}{}", a, sep, b)));
    }
    let sparse = matches!(&o, JsValue::Object(obj)
        if obj.borrow().elements().is_some_and(ElementStore::is_sparse));
    if sparse {
        // Pre-size from the populated slots; the holes between them
        // contribute separators only.
        let parts: Vec<(u64, String)> = with_store(&o, |store| store.populated())
            .unwrap_or_default()
            .into_iter()
            .map(|(idx, v)| {
                let s = if v.is_null_or_undefined() {
                    String::new()
                } else {
                    v.to_js_string().as_str().to_string()
                };
                (idx, s)
            })
            .collect();
        // Saturate on overflow; a wrapped total would slip past the guard.
        let total = (sep.len() as u64)
            .checked_mul(len - 1)
            .and_then(|seps| {
                parts.iter().try_fold(seps, |acc, (_, s)| {
                    acc.checked_add(s.len() as u64)
                })
            })
            .unwrap_or(u64::MAX);
        if total > MAX_STRING_LENGTH {
            return Err(JsError::range_error("Invalid string length"));
        }
        let mut out = String::with_capacity(total as usize);
        let mut prev = 0u64;
        for (idx, s) in parts {
            for _ in prev..idx {
                out.push_str(&sep);
            }
            out.push_str(&s);
            prev = idx;
        }
        for _ in prev..len - 1 {
            out.push_str(&sep);
        }
        return Ok(JsValue::from(out));
    }
    let mut out = String::new();
    for k in 0..len {
        if k > 0 {
            out.push_str(&sep);
        }
        out.push_str(&element_string(rt, &o, k)?);
    }
    Ok(JsValue::from(out))
}

fn element_string(rt: &mut Runtime, o: &JsValue, i: u64) -> Result<String, JsError> {
    let v = get_index(rt, o, i)?;
    if v.is_null_or_undefined() {
        Ok(String::new())
    } else {
        Ok(v.to_js_string().as_str().to_string())
    }
}

// ── search algorithms ──────────────────────────────────────────────────

fn array_index_of(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    if len == 0 {
        return Ok(JsValue::Number(-1.0));
    }
    let search = arg(args, 0);
    let n = to_integer_or_infinity(rt.to_numeric(&arg(args, 1))?);
    if n >= len as f64 {
        return Ok(JsValue::Number(-1.0));
    }
    let start = if n >= 0.0 {
        n as u64
    } else {
        relative_index(n, len)
    };
    // Strict equality; holes are skipped.
    let mut pos = if start == 0 { None } else { Some(start - 1) };
    while let Some(k) = next_element_index(rt, &o, pos, len)? {
        let v = get_index(rt, &o, k)?;
        if v.strict_equals(&search) {
            return Ok(JsValue::Number(k as f64));
        }
        pos = Some(k);
    }
    Ok(JsValue::Number(-1.0))
}

fn array_last_index_of(
    rt: &mut Runtime,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    if len == 0 {
        return Ok(JsValue::Number(-1.0));
    }
    let search = arg(args, 0);
    let n = if args.len() >= 2 {
        to_integer_or_infinity(rt.to_numeric(&arg(args, 1))?)
    } else {
        (len - 1) as f64
    };
    let last = if n < 0.0 {
        let back = len as f64 + n;
        if back < 0.0 {
            return Ok(JsValue::Number(-1.0));
        }
        back as u64
    } else {
        (n as u64).min(len - 1)
    };
    let mut pos = Some(last + 1);
    while let Some(k) = previous_element_index(rt, &o, pos, len)? {
        let v = get_index(rt, &o, k)?;
        if v.strict_equals(&search) {
            return Ok(JsValue::Number(k as f64));
        }
        pos = Some(k);
    }
    Ok(JsValue::Number(-1.0))
}

fn array_includes(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    if len == 0 {
        return Ok(JsValue::Boolean(false));
    }
    let search = arg(args, 0);
    let n = to_integer_or_infinity(rt.to_numeric(&arg(args, 1))?);
    if n >= len as f64 {
        return Ok(JsValue::Boolean(false));
    }
    let start = if n >= 0.0 {
        n as u64
    } else {
        relative_index(n, len)
    };
    // SameValueZero, and holes are visited: a hole reads as undefined, so
    // `includes(undefined)` finds it where `indexOf` would not.
    for k in start..len {
        let v = get_index(rt, &o, k)?;
        if v.same_value_zero(&search) {
            return Ok(JsValue::Boolean(true));
        }
    }
    Ok(JsValue::Boolean(false))
}

// ── ordering algorithms ────────────────────────────────────────────────

enum SortComparator {
    User(JsValue),
    Numeric,
    Lexicographic,
}

impl SortComparator {
    fn compare(&self, rt: &mut Runtime, a: &JsValue, b: &JsValue) -> Result<Ordering, JsError> {
        match self {
            SortComparator::User(f) => {
                let r = rt.call_function(f, &JsValue::Undefined, &[a.clone(), b.clone()])?;
                let n = rt.to_numeric(&r)?;
                if n < 0.0 {
                    Ok(Ordering::Less)
                } else if n > 0.0 {
                    Ok(Ordering::Greater)
                } else {
                    Ok(Ordering::Equal)
                }
            }
            SortComparator::Numeric => {
                let (x, y) = (a.to_number(), b.to_number());
                Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal))
            }
            SortComparator::Lexicographic => {
                Ok(a.to_js_string().as_str().cmp(b.to_js_string().as_str()))
            }
        }
    }
}

/// Stable recursive merge sort. `std` sorting is unusable here: the
/// comparator is fallible and may be observably inconsistent, and the
/// element order must stay well-defined regardless.
fn merge_sort(
    rt: &mut Runtime,
    mut items: Vec<JsValue>,
    cmp: &SortComparator,
) -> Result<Vec<JsValue>, JsError> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(rt, items, cmp)?;
    let right = merge_sort(rt, right, cmp)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut li = left.into_iter().peekable();
    let mut ri = right.into_iter().peekable();
    loop {
        // Stability: the left element wins ties.
        let take_right = match (li.peek(), ri.peek()) {
            (Some(l), Some(r)) => cmp.compare(rt, r, l)? == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { ri.next() } else { li.next() };
        if let Some(v) = next {
            out.push(v);
        }
    }
    Ok(out)
}

fn array_sort(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let comparator = arg(args, 0);
    if !comparator.is_undefined()
        && !comparator.is_callable()
        && !rt.options.relaxed_sort_comparator
    {
        return Err(JsError::type_error(
            "The comparison function must be either a function or undefined",
        ));
    }
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;

    // Extract populated elements, leaving holes behind.
    let mut items = Vec::new();
    let mut pos = None;
    while let Some(k) = next_element_index(rt, &o, pos, len)? {
        items.push(get_index(rt, &o, k)?);
        pos = Some(k);
    }
    // Undefineds sort after every defined value without consulting the
    // comparator.
    let undefined_count = items.iter().filter(|v| v.is_undefined()).count() as u64;
    items.retain(|v| !v.is_undefined());

    let cmp = if comparator.is_callable() {
        SortComparator::User(comparator)
    } else if matches!(&o, JsValue::Object(obj)
        if obj.borrow().elements().is_some_and(ElementStore::is_numeric_kind))
    {
        SortComparator::Numeric
    } else {
        SortComparator::Lexicographic
    };
    let sorted = merge_sort(rt, items, &cmp)?;

    // The comparator ran arbitrary code; check writability only now, at
    // the start of the write phase.
    if frozen_object(&o) {
        return Err(JsError::type_error("Cannot modify a frozen array"));
    }
    let present = sorted.len() as u64 + undefined_count;
    for (i, v) in sorted.into_iter().enumerate() {
        set_index(rt, &o, i as u64, v)?;
    }
    for i in present - undefined_count..present {
        set_index(rt, &o, i, JsValue::Undefined)?;
    }
    for i in present..len {
        delete_index(rt, &o, i)?;
    }
    Ok(o)
}

fn array_reverse(rt: &mut Runtime, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    if matches!(mutable_array_shape(&o), Some(ArrayShape::Sparse)) {
        // Mirror the populated slots around the midpoint in one pass.
        let moved = with_store(&o, |store| -> Result<(), JsError> {
            let entries = store.populated();
            store.set_length(0)?;
            store.set_length(len)?;
            for (idx, v) in entries {
                store.set(len - 1 - idx, v)?;
            }
            Ok(())
        });
        if let Some(r) = moved {
            r?;
        }
        return Ok(o);
    }
    let legacy = rt.options.legacy_reverse;
    let middle = len / 2;
    for lower in 0..middle {
        let upper = len - lower - 1;
        let (lower_exists, lower_value, upper_exists, upper_value);
        if legacy {
            // Reads precede the presence checks, so a getter fires even
            // for an index the presence check would skip.
            lower_value = get_index(rt, &o, lower)?;
            upper_value = get_index(rt, &o, upper)?;
            lower_exists = has_element(rt, &o, lower)?;
            upper_exists = has_element(rt, &o, upper)?;
        } else {
            lower_exists = has_element(rt, &o, lower)?;
            lower_value = if lower_exists {
                get_index(rt, &o, lower)?
            } else {
                JsValue::Undefined
            };
            upper_exists = has_element(rt, &o, upper)?;
            upper_value = if upper_exists {
                get_index(rt, &o, upper)?
            } else {
                JsValue::Undefined
            };
        }
        match (lower_exists, upper_exists) {
            (true, true) => {
                set_index(rt, &o, lower, upper_value)?;
                set_index(rt, &o, upper, lower_value)?;
            }
            (false, true) => {
                set_index(rt, &o, lower, upper_value)?;
                delete_index(rt, &o, upper)?;
            }
            (true, false) => {
                delete_index(rt, &o, lower)?;
                set_index(rt, &o, upper, lower_value)?;
            }
            (false, false) => {}
        }
    }
    Ok(o)
}

// ── in-place fill algorithms ───────────────────────────────────────────

fn array_fill(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let value = arg(args, 0);
    let start = relative_from(rt, &arg(args, 1), len)?;
    let end = match arg(args, 2) {
        JsValue::Undefined => len,
        v => relative_from(rt, &v, len)?,
    };
    for k in start..end {
        set_index(rt, &o, k, value.clone())?;
    }
    Ok(o)
}

fn array_copy_within(
    rt: &mut Runtime,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let target = relative_from(rt, &arg(args, 0), len)?;
    let start = relative_from(rt, &arg(args, 1), len)?;
    let end = match arg(args, 2) {
        JsValue::Undefined => len,
        v => relative_from(rt, &v, len)?,
    };
    let count = end.saturating_sub(start).min(len - target);
    if count == 0 {
        return Ok(o);
    }
    if start < target && target < start + count {
        // Overlapping ranges with the destination ahead copy backward.
        for i in (0..count).rev() {
            let from = start + i;
            let to = target + i;
            if has_element(rt, &o, from)? {
                let v = get_index(rt, &o, from)?;
                set_index(rt, &o, to, v)?;
            } else {
                delete_index(rt, &o, to)?;
            }
        }
    } else {
        for i in 0..count {
            let from = start + i;
            let to = target + i;
            if has_element(rt, &o, from)? {
                let v = get_index(rt, &o, from)?;
                set_index(rt, &o, to, v)?;
            } else {
                delete_index(rt, &o, to)?;
            }
        }
    }
    Ok(o)
}

// ── callback-driven algorithms ─────────────────────────────────────────

fn array_every(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    let mut cursor = ElementCursor::ascending(len);
    while let Some(k) = cursor.advance(rt, &o)? {
        let v = get_index(rt, &o, k)?;
        let r = rt.call_function(&callback, &this_arg, &[v, JsValue::Number(k as f64), o.clone()])?;
        if !r.to_boolean() {
            return Ok(JsValue::Boolean(false));
        }
    }
    Ok(JsValue::Boolean(true))
}

fn array_some(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    let mut cursor = ElementCursor::ascending(len);
    while let Some(k) = cursor.advance(rt, &o)? {
        let v = get_index(rt, &o, k)?;
        let r = rt.call_function(&callback, &this_arg, &[v, JsValue::Number(k as f64), o.clone()])?;
        if r.to_boolean() {
            return Ok(JsValue::Boolean(true));
        }
    }
    Ok(JsValue::Boolean(false))
}

fn array_for_each(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    let mut cursor = ElementCursor::ascending(len);
    while let Some(k) = cursor.advance(rt, &o)? {
        let v = get_index(rt, &o, k)?;
        rt.call_function(&callback, &this_arg, &[v, JsValue::Number(k as f64), o.clone()])?;
    }
    Ok(JsValue::Undefined)
}

fn array_map(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    let target = array_species_create(rt, &o, len)?;
    let mut cursor = ElementCursor::ascending(len);
    while let Some(k) = cursor.advance(rt, &o)? {
        let v = get_index(rt, &o, k)?;
        let r = rt.call_function(&callback, &this_arg, &[v, JsValue::Number(k as f64), o.clone()])?;
        set_index(rt, &target, k, r)?;
    }
    Ok(target)
}

fn array_filter(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    let target = array_species_create(rt, &o, 0)?;
    let mut to: u64 = 0;
    let mut cursor = ElementCursor::ascending(len);
    while let Some(k) = cursor.advance(rt, &o)? {
        let v = get_index(rt, &o, k)?;
        let r = rt.call_function(
            &callback,
            &this_arg,
            &[v.clone(), JsValue::Number(k as f64), o.clone()],
        )?;
        if r.to_boolean() {
            set_index(rt, &target, to, v)?;
            to += 1;
        }
    }
    Ok(target)
}

fn array_find(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    // The find family visits every index; holes surface as undefined.
    for k in 0..len {
        let v = get_index(rt, &o, k)?;
        let r = rt.call_function(
            &callback,
            &this_arg,
            &[v.clone(), JsValue::Number(k as f64), o.clone()],
        )?;
        if r.to_boolean() {
            return Ok(v);
        }
    }
    Ok(JsValue::Undefined)
}

fn array_find_index(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    for k in 0..len {
        let v = get_index(rt, &o, k)?;
        let r = rt.call_function(&callback, &this_arg, &[v, JsValue::Number(k as f64), o.clone()])?;
        if r.to_boolean() {
            return Ok(JsValue::Number(k as f64));
        }
    }
    Ok(JsValue::Number(-1.0))
}

fn array_find_last(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    for k in (0..len).rev() {
        let v = get_index(rt, &o, k)?;
        let r = rt.call_function(
            &callback,
            &this_arg,
            &[v.clone(), JsValue::Number(k as f64), o.clone()],
        )?;
        if r.to_boolean() {
            return Ok(v);
        }
    }
    Ok(JsValue::Undefined)
}

fn array_find_last_index(
    rt: &mut Runtime,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let this_arg = arg(args, 1);
    for k in (0..len).rev() {
        let v = get_index(rt, &o, k)?;
        let r = rt.call_function(&callback, &this_arg, &[v, JsValue::Number(k as f64), o.clone()])?;
        if r.to_boolean() {
            return Ok(JsValue::Number(k as f64));
        }
    }
    Ok(JsValue::Number(-1.0))
}

fn array_reduce(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let mut pos = None;
    let mut acc = if args.len() >= 2 {
        arg(args, 1)
    } else {
        match next_element_index(rt, &o, None, len)? {
            Some(k) => {
                pos = Some(k);
                get_index(rt, &o, k)?
            }
            None => {
                return Err(JsError::type_error(
                    "Reduce of empty array with no initial value",
                ));
            }
        }
    };
    while let Some(k) = next_element_index(rt, &o, pos, len)? {
        let v = get_index(rt, &o, k)?;
        acc = rt.call_function(
            &callback,
            &JsValue::Undefined,
            &[acc, v, JsValue::Number(k as f64), o.clone()],
        )?;
        pos = Some(k);
    }
    Ok(acc)
}

fn array_reduce_right(
    rt: &mut Runtime,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let callback = arg(args, 0);
    require_callable(&callback)?;
    let mut pos = None;
    let mut acc = if args.len() >= 2 {
        arg(args, 1)
    } else {
        match previous_element_index(rt, &o, None, len)? {
            Some(k) => {
                pos = Some(k);
                get_index(rt, &o, k)?
            }
            None => {
                return Err(JsError::type_error(
                    "Reduce of empty array with no initial value",
                ));
            }
        }
    };
    while let Some(k) = previous_element_index(rt, &o, pos, len)? {
        let v = get_index(rt, &o, k)?;
        acc = rt.call_function(
            &callback,
            &JsValue::Undefined,
            &[acc, v, JsValue::Number(k as f64), o.clone()],
        )?;
        pos = Some(k);
    }
    Ok(acc)
}

fn array_at(rt: &mut Runtime, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = rt.to_object(&this)?;
    let len = length_of_array_like(rt, &o)?;
    let n = to_integer_or_infinity(rt.to_numeric(&arg(args, 0))?);
    let idx = if n >= 0.0 { n } else { len as f64 + n };
    if idx < 0.0 || idx >= len as f64 {
        return Ok(JsValue::Undefined);
    }
    get_index(rt, &o, idx as u64)
}
