//! Runtime: realms, the property model, and function invocation
//!
//! This is the collaborator surface the array algorithms are written
//! against. The property model here implements exactly what the algorithms
//! need: prototype-chain get/set/has/delete with accessor invocation, and
//! interception of element indices and `length` for genuine arrays and
//! typed-array views. Anything an algorithm does through this module can run
//! user code (getters, setters, callbacks, constructors), so callers must
//! re-validate cached state afterwards where their contracts demand it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::buffer::BufferData;
use crate::builtins;
use crate::error::JsError;
use crate::realm::{Realm, RealmId};
use crate::storage::{ElementStore, MAX_SAFE_INTEGER};
use crate::value::{
    CheapClone, ExoticObject, JsObject, JsObjectRef, JsString, JsSymbol, JsValue, NativeFn,
    NativeFunction, Property, PropertyKey, to_integer_or_infinity,
};

/// Compatibility switches. Defaults follow modern ECMAScript semantics;
/// the flags reproduce observable behaviors of older engines where the
/// embedding asks for them.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// `reverse` reads each element before testing presence (pre-ES6
    /// ordering) instead of testing presence first. The difference is
    /// observable through getters.
    pub legacy_reverse: bool,
    /// `sort` treats a non-callable comparator as absent instead of
    /// raising a TypeError.
    pub relaxed_sort_comparator: bool,
}

/// Well-known symbols consulted by the algorithms.
pub struct WellKnownSymbols {
    pub species: JsSymbol,
    pub is_concat_spreadable: JsSymbol,
    pub iterator: JsSymbol,
}

/// The array subsystem's execution context.
///
/// Single-threaded and run-to-completion: there is no locking and no
/// suspension. The only reentrancy is user code invoked synchronously
/// through [`Runtime::call_function`] and friends.
pub struct Runtime {
    realms: Vec<Realm>,
    current_realm: RealmId,
    next_symbol_id: u64,
    pub symbols: WellKnownSymbols,
    pub options: RuntimeOptions,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        let mut rt = Runtime {
            realms: Vec::new(),
            current_realm: RealmId(0),
            next_symbol_id: 4,
            symbols: WellKnownSymbols {
                species: JsSymbol::new(1, Some("Symbol.species".to_string())),
                is_concat_spreadable: JsSymbol::new(2, Some("Symbol.isConcatSpreadable".to_string())),
                iterator: JsSymbol::new(3, Some("Symbol.iterator".to_string())),
            },
            options,
        };
        let id = rt.create_realm();
        rt.current_realm = id;
        rt
    }

    /// Create a fresh realm with its own intrinsics and return its token.
    /// The current realm is left unchanged.
    pub fn create_realm(&mut self) -> RealmId {
        let id = RealmId(self.realms.len() as u32);
        let object_prototype = Rc::new(RefCell::new(JsObject::new()));
        let array_prototype = Rc::new(RefCell::new(JsObject::with_prototype(
            object_prototype.cheap_clone(),
        )));
        let typed_array_prototype = Rc::new(RefCell::new(JsObject::with_prototype(
            object_prototype.cheap_clone(),
        )));
        // Constructor objects are filled in by the install passes below.
        let array_constructor = self.create_bare_function(
            "Array",
            1,
            true,
            builtins::array::array_constructor_fn_for(id),
            &object_prototype,
        );
        self.realms.push(Realm {
            id,
            object_prototype,
            array_prototype,
            array_constructor,
            typed_array_prototype,
            typed_array_constructors: Vec::new(),
        });
        builtins::array::install(self, id);
        builtins::typed_array::install(self, id);
        id
    }

    pub fn current_realm_id(&self) -> RealmId {
        self.current_realm
    }

    pub fn set_current_realm(&mut self, id: RealmId) {
        self.current_realm = id;
    }

    // RealmId values are only minted by create_realm and realms are never
    // removed, so the index is always in range.
    #[allow(clippy::indexing_slicing)]
    pub fn realm(&self, id: RealmId) -> &Realm {
        &self.realms[id.0 as usize]
    }

    pub fn current_realm(&self) -> &Realm {
        self.realm(self.current_realm)
    }

    #[allow(clippy::indexing_slicing)]
    pub(crate) fn realm_mut(&mut self, id: RealmId) -> &mut Realm {
        &mut self.realms[id.0 as usize]
    }

    /// The realm whose standard Array constructor `obj` is, if any.
    pub fn realm_of_array_constructor(&self, obj: &JsObjectRef) -> Option<RealmId> {
        self.realms
            .iter()
            .find(|r| Rc::ptr_eq(&r.array_constructor, obj))
            .map(|r| r.id)
    }

    pub fn new_symbol(&mut self, description: Option<String>) -> JsSymbol {
        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        JsSymbol::new(id, description)
    }

    // ── property model ─────────────────────────────────────────────────

    /// [[Get]]: element/length interception, then prototype-chain walk with
    /// accessor-getter invocation. Can run user code.
    pub fn get_property(&mut self, target: &JsValue, key: &PropertyKey) -> Result<JsValue, JsError> {
        let JsValue::Object(obj) = target else {
            return Ok(JsValue::Undefined);
        };
        if let Some(idx) = key.as_index() {
            let b = obj.borrow();
            match &b.exotic {
                ExoticObject::Array(store) => {
                    if let Some(v) = store.get(idx) {
                        return Ok(v);
                    }
                    // Hole: fall through so inherited accessors stay visible.
                }
                ExoticObject::TypedArray(view) => {
                    // Canonical indices never consult the prototype.
                    return match view.get(idx)? {
                        Some(v) => Ok(v),
                        None => Ok(JsValue::Undefined),
                    };
                }
                _ => {}
            }
        }
        {
            let b = obj.borrow();
            match &b.exotic {
                ExoticObject::Array(store) if key.eq_str("length") => {
                    return Ok(JsValue::Number(store.length() as f64));
                }
                ExoticObject::TypedArray(view) => {
                    if key.eq_str("length") {
                        return Ok(JsValue::Number(view.length() as f64));
                    }
                    if key.eq_str("byteLength") {
                        return Ok(JsValue::Number(view.byte_length() as f64));
                    }
                    if key.eq_str("byteOffset") {
                        return Ok(JsValue::Number(view.byte_offset as f64));
                    }
                }
                ExoticObject::ArrayBuffer(buf) if key.eq_str("byteLength") => {
                    return Ok(JsValue::Number(buf.borrow().byte_length() as f64));
                }
                _ => {}
            }
        }

        let mut current = obj.cheap_clone();
        loop {
            let found = current.borrow().get_own_property(key).cloned();
            if let Some(prop) = found {
                if prop.is_accessor() {
                    return match prop.getter {
                        Some(getter) => {
                            self.call_function(&JsValue::Object(getter), target, &[])
                        }
                        None => Ok(JsValue::Undefined),
                    };
                }
                return Ok(prop.value);
            }
            let next = current.borrow().prototype.clone();
            match next {
                Some(proto) => current = proto,
                None => return Ok(JsValue::Undefined),
            }
        }
    }

    /// [[Set]]: element/length interception, setter invocation, otherwise a
    /// data write on the receiver. Can run user code.
    pub fn set_property(
        &mut self,
        target: &JsValue,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<(), JsError> {
        let JsValue::Object(obj) = target else {
            return Ok(());
        };
        if let Some(idx) = key.as_index() {
            let route = {
                let b = obj.borrow();
                match &b.exotic {
                    ExoticObject::Array(_) => Some(ElementRoute::Array),
                    ExoticObject::TypedArray(view) => Some(ElementRoute::Typed(view.clone())),
                    _ => None,
                }
            };
            match route {
                Some(ElementRoute::Array) => {
                    if obj.borrow().frozen {
                        return Ok(());
                    }
                    let mut b = obj.borrow_mut();
                    if let Some(store) = b.elements_mut() {
                        store.set(idx, value)?;
                    }
                    return Ok(());
                }
                Some(ElementRoute::Typed(view)) => {
                    // The coercion may run user code; the view re-checks
                    // detachment at the write itself.
                    let n = self.to_numeric(&value)?;
                    view.set(idx, n)?;
                    return Ok(());
                }
                None => {}
            }
        }
        if key.eq_str("length") {
            let is_array = matches!(obj.borrow().exotic, ExoticObject::Array(_));
            if is_array {
                if obj.borrow().frozen {
                    return Ok(());
                }
                let n = self.to_numeric(&value)?;
                let len = to_integer_or_infinity(n);
                if len != n || !(0.0..=MAX_SAFE_INTEGER as f64).contains(&len) {
                    return Err(JsError::range_error("Invalid array length"));
                }
                let mut b = obj.borrow_mut();
                if let Some(store) = b.elements_mut() {
                    store.set_length(len as u64)?;
                }
                return Ok(());
            }
            if matches!(obj.borrow().exotic, ExoticObject::TypedArray(_)) {
                // View lengths are immutable after construction.
                return Ok(());
            }
        }

        // Accessor search along the chain; data properties on prototypes are
        // shadowed on the receiver.
        let mut current = obj.cheap_clone();
        loop {
            let found = current.borrow().get_own_property(&key).cloned();
            if let Some(prop) = found {
                if prop.is_accessor() {
                    return match prop.setter {
                        Some(setter) => self
                            .call_function(&JsValue::Object(setter), target, &[value])
                            .map(|_| ()),
                        None => Ok(()),
                    };
                }
                break;
            }
            let next = current.borrow().prototype.clone();
            match next {
                Some(proto) => current = proto,
                None => break,
            }
        }
        obj.borrow_mut().set_property(key, value);
        Ok(())
    }

    /// [[HasProperty]], prototype chain included.
    pub fn has_property(&mut self, target: &JsValue, key: &PropertyKey) -> Result<bool, JsError> {
        let JsValue::Object(obj) = target else {
            return Ok(false);
        };
        if let Some(idx) = key.as_index() {
            let b = obj.borrow();
            match &b.exotic {
                ExoticObject::Array(store) => {
                    if store.has(idx) {
                        return Ok(true);
                    }
                }
                ExoticObject::TypedArray(view) => {
                    // In-range indices are present; whether reading them
                    // will succeed is a separate (detachment) question.
                    return Ok(idx < view.length() as u64);
                }
                _ => {}
            }
        }
        if key.eq_str("length")
            && matches!(
                obj.borrow().exotic,
                ExoticObject::Array(_) | ExoticObject::TypedArray(_)
            )
        {
            return Ok(true);
        }
        let mut current = obj.cheap_clone();
        loop {
            if current.borrow().has_own_property(key) {
                return Ok(true);
            }
            let next = current.borrow().prototype.clone();
            match next {
                Some(proto) => current = proto,
                None => return Ok(false),
            }
        }
    }

    /// [[Delete]]. Returns whether the deletion succeeded.
    pub fn delete_property(&mut self, target: &JsValue, key: &PropertyKey) -> Result<bool, JsError> {
        let JsValue::Object(obj) = target else {
            return Ok(true);
        };
        if let Some(idx) = key.as_index() {
            let mut b = obj.borrow_mut();
            let frozen = b.frozen;
            match &mut b.exotic {
                ExoticObject::Array(store) => {
                    if frozen {
                        return Ok(false);
                    }
                    store.delete(idx);
                    return Ok(true);
                }
                ExoticObject::TypedArray(view) => {
                    return Ok(idx >= view.length() as u64);
                }
                _ => {}
            }
        }
        if key.eq_str("length") && matches!(obj.borrow().exotic, ExoticObject::Array(_)) {
            return Ok(false);
        }
        let mut b = obj.borrow_mut();
        let configurable = b.properties.get(key).map(|p| p.configurable);
        if let Some(configurable) = configurable {
            if !configurable || b.frozen {
                return Ok(false);
            }
            b.properties.shift_remove(key);
        }
        Ok(true)
    }

    // ── invocation ─────────────────────────────────────────────────────

    pub fn is_callable(&self, value: &JsValue) -> bool {
        value.is_callable()
    }

    pub fn is_constructor(&self, value: &JsValue) -> bool {
        match value {
            JsValue::Object(obj) => match &obj.borrow().exotic {
                ExoticObject::Function(f) => f.is_constructor,
                _ => false,
            },
            _ => false,
        }
    }

    /// Invoke a callable value. This is the doorway through which all user
    /// code runs.
    pub fn call_function(
        &mut self,
        callee: &JsValue,
        this_value: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let JsValue::Object(obj) = callee else {
            return Err(JsError::type_error("Not a function"));
        };
        let func = {
            let b = obj.borrow();
            match &b.exotic {
                ExoticObject::Function(f) => f.func.cheap_clone(),
                _ => return Err(JsError::type_error("Not a function")),
            }
        };
        func(self, this_value.clone(), args)
    }

    /// Invoke a constructor value with `new` semantics: a fresh object wired
    /// to `ctor.prototype` becomes `this`; an object-valued return wins.
    pub fn construct(&mut self, ctor: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        if !self.is_constructor(ctor) {
            return Err(JsError::type_error("Constructor expected"));
        }
        let proto = match self.get_property(ctor, &PropertyKey::from("prototype"))? {
            JsValue::Object(p) => p,
            _ => self.current_realm().object_prototype.cheap_clone(),
        };
        let this_obj = Rc::new(RefCell::new(JsObject::with_prototype(proto)));
        let result = self.call_function(ctor, &JsValue::Object(this_obj.cheap_clone()), args)?;
        match result {
            JsValue::Object(_) => Ok(result),
            _ => Ok(JsValue::Object(this_obj)),
        }
    }

    // ── coercion shims ─────────────────────────────────────────────────

    /// ToObject. Wrapping of non-nullish primitives is intentionally thin:
    /// no array algorithm observes wrapper internals.
    pub fn to_object(&mut self, value: &JsValue) -> Result<JsValue, JsError> {
        match value {
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(
                "Cannot convert undefined or null to object",
            )),
            JsValue::Object(_) => Ok(value.clone()),
            _ => Ok(JsValue::Object(self.create_object())),
        }
    }

    /// ToNumber that honors `valueOf` on objects, so numeric coercion of
    /// arguments is a reentrancy point exactly as in a full engine.
    pub fn to_numeric(&mut self, value: &JsValue) -> Result<f64, JsError> {
        match value {
            JsValue::Symbol(_) => Err(JsError::type_error(
                "Cannot convert a Symbol value to a number",
            )),
            JsValue::Object(_) => {
                let value_of = self.get_property(value, &PropertyKey::from("valueOf"))?;
                if value_of.is_callable() {
                    let prim = self.call_function(&value_of, value, &[])?;
                    if !prim.is_object() {
                        return Ok(prim.to_number());
                    }
                }
                Ok(f64::NAN)
            }
            _ => Ok(value.to_number()),
        }
    }

    /// ToIndex: a non-negative integer below 2^53, or a RangeError.
    pub fn to_index(&mut self, value: &JsValue, what: &str) -> Result<u64, JsError> {
        if value.is_undefined() {
            return Ok(0);
        }
        let n = self.to_numeric(value)?;
        let int = to_integer_or_infinity(n);
        if int < 0.0 || int > MAX_SAFE_INTEGER as f64 {
            return Err(JsError::range_error(format!("Invalid {}", what)));
        }
        Ok(int as u64)
    }

    // ── creation helpers ───────────────────────────────────────────────

    /// New ordinary object in the current realm.
    pub fn create_object(&mut self) -> JsObjectRef {
        Rc::new(RefCell::new(JsObject::with_prototype(
            self.current_realm().object_prototype.cheap_clone(),
        )))
    }

    /// New array in the current realm, representation picked from the
    /// initializer.
    pub fn create_array(&mut self, values: Vec<JsValue>) -> JsObjectRef {
        self.create_array_in_realm(self.current_realm, ElementStore::from_values(values))
    }

    /// New array in the current realm around an existing store.
    pub fn create_array_with_store(&mut self, store: ElementStore) -> JsObjectRef {
        self.create_array_in_realm(self.current_realm, store)
    }

    pub fn create_array_in_realm(&mut self, realm: RealmId, store: ElementStore) -> JsObjectRef {
        let mut obj = JsObject::with_prototype(self.realm(realm).array_prototype.cheap_clone());
        obj.exotic = ExoticObject::Array(store);
        Rc::new(RefCell::new(obj))
    }

    /// New ArrayBuffer object with zeroed storage.
    pub fn create_array_buffer(&mut self, byte_length: usize) -> JsObjectRef {
        let mut obj = JsObject::with_prototype(self.current_realm().object_prototype.cheap_clone());
        obj.exotic = ExoticObject::ArrayBuffer(BufferData::new(byte_length));
        Rc::new(RefCell::new(obj))
    }

    /// Detach the buffer behind an ArrayBuffer object (or behind a view).
    pub fn detach_array_buffer(&mut self, value: &JsValue) -> Result<(), JsError> {
        let JsValue::Object(obj) = value else {
            return Err(JsError::type_error("ArrayBuffer expected"));
        };
        let buf = {
            let b = obj.borrow();
            match &b.exotic {
                ExoticObject::ArrayBuffer(buf) => buf.cheap_clone(),
                ExoticObject::TypedArray(view) => view.buffer.cheap_clone(),
                _ => return Err(JsError::type_error("ArrayBuffer expected")),
            }
        };
        buf.borrow_mut().detach();
        Ok(())
    }

    /// New native function object (not a constructor).
    pub fn create_native_function(&mut self, name: &str, arity: usize, func: NativeFn) -> JsObjectRef {
        let proto = self.current_realm().object_prototype.cheap_clone();
        self.create_bare_function(name, arity, false, func, &proto)
    }

    pub(crate) fn create_bare_function(
        &mut self,
        name: &str,
        arity: usize,
        is_constructor: bool,
        func: NativeFn,
        proto: &JsObjectRef,
    ) -> JsObjectRef {
        let mut obj = JsObject::with_prototype(proto.cheap_clone());
        obj.exotic = ExoticObject::Function(NativeFunction {
            name: JsString::from(name),
            func,
            arity,
            is_constructor,
        });
        obj.define_property(
            PropertyKey::String(JsString::from("name")),
            Property::with_attributes(JsValue::from(name), false, false, true),
        );
        obj.define_property(
            PropertyKey::String(JsString::from("length")),
            Property::with_attributes(JsValue::Number(arity as f64), false, false, true),
        );
        Rc::new(RefCell::new(obj))
    }

    /// Register a native method as a non-enumerable data property.
    pub fn register_method(&mut self, obj: &JsObjectRef, name: &str, arity: usize, func: NativeFn) {
        let f = self.create_native_function(name, arity, func);
        obj.borrow_mut().define_property(
            PropertyKey::from(name),
            Property::with_attributes(JsValue::Object(f), true, false, true),
        );
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

enum ElementRoute {
    Array,
    Typed(crate::buffer::TypedArrayView),
}
