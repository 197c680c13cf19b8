//! Species construction
//!
//! Decides which constructor manufactures a derived array or typed-array.
//! Resolution reads ordinary properties (`constructor`, `@@species`) and may
//! invoke an arbitrary constructor, so by the time these functions return,
//! the source's length, storage kind or buffer state may have changed;
//! callers re-validate per their own contracts.

use crate::buffer::TypedArrayKind;
use crate::error::JsError;
use crate::runtime::Runtime;
use crate::storage::ElementStore;
use crate::value::{ExoticObject, JsValue, PropertyKey};

/// ArraySpeciesCreate: produce the result container for a derived array of
/// `length` elements.
pub fn array_species_create(
    rt: &mut Runtime,
    original: &JsValue,
    length: u64,
) -> Result<JsValue, JsError> {
    // Non-array sources always get a default array of the executing realm.
    if !original.is_array() {
        return default_array(rt, length);
    }
    let c = rt.get_property(original, &PropertyKey::from("constructor"))?;

    // An Array constructor of a *different* realm is treated as "use
    // default": constructors do not leak across realm boundaries.
    if let JsValue::Object(c_obj) = &c
        && let Some(owner) = rt.realm_of_array_constructor(c_obj)
        && owner != rt.current_realm_id()
    {
        return default_array(rt, length);
    }

    let species = match &c {
        JsValue::Undefined => JsValue::Undefined,
        JsValue::Object(_) => {
            let key = PropertyKey::Symbol(rt.symbols.species.clone());
            match rt.get_property(&c, &key)? {
                JsValue::Null => JsValue::Undefined,
                other => other,
            }
        }
        // A primitive `constructor` cannot be constructed.
        _ => return Err(JsError::type_error("Constructor expected")),
    };

    if species.is_undefined() {
        return default_array(rt, length);
    }
    if !rt.is_constructor(&species) {
        return Err(JsError::type_error("Constructor expected"));
    }
    rt.construct(&species, &[JsValue::Number(length as f64)])
}

fn default_array(rt: &mut Runtime, length: u64) -> Result<JsValue, JsError> {
    let store = ElementStore::with_length(length)?;
    Ok(JsValue::Object(rt.create_array_with_store(store)))
}

/// TypedArraySpeciesCreate: produce a derived typed-array via the source's
/// species, then validate what the constructor actually built.
pub fn typed_array_species_create(
    rt: &mut Runtime,
    source: &JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let kind = source_kind(source)
        .ok_or_else(|| JsError::type_error("Receiver is not a typed array"))?;
    let default_ctor = JsValue::Object(rt.current_realm().typed_array_constructor(kind));

    let c = rt.get_property(source, &PropertyKey::from("constructor"))?;
    let species = match &c {
        JsValue::Undefined => JsValue::Undefined,
        JsValue::Object(_) => {
            let key = PropertyKey::Symbol(rt.symbols.species.clone());
            match rt.get_property(&c, &key)? {
                JsValue::Null => JsValue::Undefined,
                other => other,
            }
        }
        _ => return Err(JsError::type_error("Constructor expected")),
    };

    let ctor = if species.is_undefined() { default_ctor } else { species };
    if !rt.is_constructor(&ctor) {
        return Err(JsError::type_error("Constructor expected"));
    }
    let result = rt.construct(&ctor, args)?;

    // Validate: must be a view, backed by a live buffer, and at least as
    // long as requested when constructed from a single numeric length.
    let JsValue::Object(result_obj) = &result else {
        return Err(JsError::type_error("Species constructor did not return a typed array"));
    };
    let view = match &result_obj.borrow().exotic {
        ExoticObject::TypedArray(view) => view.clone(),
        _ => {
            return Err(JsError::type_error(
                "Species constructor did not return a typed array",
            ));
        }
    };
    if view.is_detached() {
        return Err(JsError::type_error(
            "Species constructor returned a view over a detached ArrayBuffer",
        ));
    }
    if let [JsValue::Number(requested)] = args
        && (view.length() as f64) < *requested
    {
        return Err(JsError::type_error(
            "Species constructor returned a typed array that is too small",
        ));
    }
    Ok(result)
}

fn source_kind(source: &JsValue) -> Option<TypedArrayKind> {
    let JsValue::Object(obj) = source else {
        return None;
    };
    match &obj.borrow().exotic {
        ExoticObject::TypedArray(view) => Some(view.kind),
        _ => None,
    }
}
