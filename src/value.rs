//! JavaScript value representation
//!
//! The core `JsValue` type and the object model the array algorithms operate
//! on. Objects are reference-counted; the embedding is expected to bring its
//! own garbage collector, so cycles created through prototypes or captured
//! callbacks are the embedder's concern, not this crate's.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::buffer::{BufferRef, TypedArrayView};
use crate::error::JsError;
use crate::runtime::Runtime;
use crate::storage::ElementStore;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// Makes it explicit when a clone is just a reference-count increment rather
/// than a data copy.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A JavaScript value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
}

impl JsValue {
    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    /// Check if this value is callable (a function)
    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    /// Check if this value is a genuine array (backed by an element store)
    pub fn is_array(&self) -> bool {
        match self {
            JsValue::Object(obj) => matches!(obj.borrow().exotic, ExoticObject::Array(_)),
            _ => false,
        }
    }

    /// Check if this value is a typed-array view
    pub fn is_typed_array(&self) -> bool {
        match self {
            JsValue::Object(obj) => matches!(obj.borrow().exotic, ExoticObject::TypedArray(_)),
            _ => false,
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) => true,
            JsValue::Object(_) => true,
        }
    }

    /// Convert to number (ToNumber), primitives only.
    ///
    /// Objects yield NaN here; call sites that must honor `valueOf` use
    /// [`Runtime::to_numeric`] instead, which can run user code.
    pub fn to_number(&self) -> f64 {
        match self {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(true) => 1.0,
            JsValue::Boolean(false) => 0.0,
            JsValue::Number(n) => *n,
            JsValue::String(s) => {
                let t = s.as_str().trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            JsValue::Symbol(_) => f64::NAN,
            JsValue::Object(_) => f64::NAN,
        }
    }

    /// Convert to string (ToString)
    pub fn to_js_string(&self) -> JsString {
        match self {
            JsValue::Undefined => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(true) => JsString::from("true"),
            JsValue::Boolean(false) => JsString::from("false"),
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            JsValue::String(s) => s.clone(),
            JsValue::Symbol(s) => match &s.description {
                Some(desc) => JsString::from(format!("Symbol({})", desc)),
                None => JsString::from("Symbol()"),
            },
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    JsString::from("function")
                } else {
                    JsString::from("[object Object]")
                }
            }
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => {
                // NaN !== NaN
                if a.is_nan() || b.is_nan() { false } else { a == b }
            }
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// SameValueZero: like strict equality but NaN equals NaN.
    /// This is what `includes` uses, distinguishing it from `indexOf`.
    pub fn same_value_zero(&self, other: &JsValue) -> bool {
        if let (JsValue::Number(a), JsValue::Number(b)) = (self, other)
            && a.is_nan()
            && b.is_nan()
        {
            return true;
        }
        self.strict_equals(other)
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", n),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_ref()),
            JsValue::Symbol(s) => match &s.description {
                Some(desc) => write!(f, "Symbol({})", desc),
                None => write!(f, "Symbol()"),
            },
            JsValue::Object(obj) => write!(f, "{:?}", obj.borrow()),
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

// Conversions from Rust types

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

/// Format a finite or non-finite f64 the way ToString does for the cases the
/// array algorithms hit (join separators, default sort keys, length reads).
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// ToIntegerOrInfinity: truncate toward zero, mapping NaN to 0 and passing
/// infinities through.
pub fn to_integer_or_infinity(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() {
        n
    } else {
        n.trunc()
    }
}

/// Reference-counted string for efficient string handling
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JsString(Rc<str>);

// JsString wraps Rc<str>, so clone is cheap
impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn parse<F: std::str::FromStr>(&self) -> Result<F, F::Err> {
        self.0.parse()
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JavaScript Symbol primitive.
/// Symbols are unique identifiers, optionally with a description.
#[derive(Clone, Debug)]
pub struct JsSymbol {
    id: u64,
    pub description: Option<String>,
}

impl JsSymbol {
    pub fn new(id: u64, description: Option<String>) -> Self {
        Self { id, description }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Reference to a heap-allocated object
pub type JsObjectRef = Rc<RefCell<JsObject>>;

/// Own-property table. Insertion order is observable through `own_keys`, so
/// this is an `IndexMap` rather than a plain hash map.
pub type PropertyTable = IndexMap<PropertyKey, Property, FxBuildHasher>;

/// A JavaScript object
pub struct JsObject {
    /// Prototype link
    pub prototype: Option<JsObjectRef>,
    /// Whether the object can have properties added
    pub extensible: bool,
    /// Whether the object is frozen (no modifications allowed)
    pub frozen: bool,
    /// Object properties
    pub properties: PropertyTable,
    /// Exotic object behavior
    pub exotic: ExoticObject,
}

impl JsObject {
    /// Create a new ordinary object
    pub fn new() -> Self {
        Self {
            prototype: None,
            extensible: true,
            frozen: false,
            properties: PropertyTable::default(),
            exotic: ExoticObject::Ordinary,
        }
    }

    /// Create a new ordinary object with a prototype
    pub fn with_prototype(prototype: JsObjectRef) -> Self {
        Self {
            prototype: Some(prototype),
            ..Self::new()
        }
    }

    /// Check if this object is callable
    pub fn is_callable(&self) -> bool {
        matches!(self.exotic, ExoticObject::Function(_))
    }

    /// Get an own property
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Set a data property, respecting writability and extensibility
    pub fn set_property(&mut self, key: PropertyKey, value: JsValue) {
        if self.frozen {
            return;
        }
        if let Some(prop) = self.properties.get_mut(&key) {
            if prop.writable {
                prop.value = value;
            }
        } else if self.extensible {
            self.properties.insert(key, Property::data(value));
        }
    }

    /// Define a property with explicit attributes
    pub fn define_property(&mut self, key: PropertyKey, prop: Property) {
        self.properties.insert(key, prop);
    }

    /// Check if object has an own property
    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    /// Get own property keys in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.properties.keys().cloned().collect()
    }

    /// The element store, if this is a genuine array
    pub fn elements(&self) -> Option<&ElementStore> {
        match &self.exotic {
            ExoticObject::Array(store) => Some(store),
            _ => None,
        }
    }

    /// Mutable element store, if this is a genuine array
    pub fn elements_mut(&mut self) -> Option<&mut ElementStore> {
        match &mut self.exotic {
            ExoticObject::Array(store) => Some(store),
            _ => None,
        }
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exotic {
            ExoticObject::Ordinary => write!(f, "{{...}}"),
            ExoticObject::Array(store) => write!(f, "[len {}]", store.length()),
            ExoticObject::Function(func) => write!(f, "[Function: {}]", func.name),
            ExoticObject::ArrayBuffer(buf) => {
                write!(f, "ArrayBuffer({})", buf.borrow().byte_length())
            }
            ExoticObject::TypedArray(view) => {
                write!(f, "{}({})", view.kind.name(), view.length())
            }
        }
    }
}

/// Exotic object behavior
pub enum ExoticObject {
    /// Ordinary object
    Ordinary,
    /// Array exotic object, backed by an element store
    Array(ElementStore),
    /// Function exotic object
    Function(NativeFunction),
    /// ArrayBuffer exotic object; the byte storage may be shared by views
    ArrayBuffer(BufferRef),
    /// Typed-array view over a buffer
    TypedArray(TypedArrayView),
}

/// Property key (string, index, or symbol)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
    Symbol(JsSymbol),
}

impl PropertyKey {
    /// Check if this key equals a string literal (avoids allocation)
    #[inline]
    pub fn eq_str(&self, s: &str) -> bool {
        match self {
            PropertyKey::String(js_str) => js_str.as_str() == s,
            PropertyKey::Index(_) | PropertyKey::Symbol(_) => false,
        }
    }

    /// The element index this key denotes, if any
    pub fn as_index(&self) -> Option<u64> {
        match self {
            PropertyKey::Index(i) => Some(u64::from(*i)),
            PropertyKey::String(s) => canonical_index(s.as_str()),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// Key for element index `i`. Indices beyond the u32 range are ordinary
    /// string keys, which is how generic receivers see them.
    pub fn from_element_index(i: u64) -> Self {
        match u32::try_from(i) {
            Ok(small) => PropertyKey::Index(small),
            Err(_) => PropertyKey::String(JsString::from(i.to_string())),
        }
    }
}

/// Parse a canonical numeric string ("0", "17", but not "017" or "1.5").
fn canonical_index(s: &str) -> Option<u64> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok()
}

impl From<&str> for PropertyKey {
    #[inline]
    fn from(s: &str) -> Self {
        if let Some(idx) = canonical_index(s)
            && let Ok(small) = u32::try_from(idx)
        {
            return PropertyKey::Index(small);
        }
        PropertyKey::String(JsString::from(s))
    }
}

impl From<JsString> for PropertyKey {
    #[inline]
    fn from(s: JsString) -> Self {
        if let Some(idx) = canonical_index(s.as_str())
            && let Ok(small) = u32::try_from(idx)
        {
            return PropertyKey::Index(small);
        }
        PropertyKey::String(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(idx: u32) -> Self {
        PropertyKey::Index(idx)
    }
}

impl From<JsSymbol> for PropertyKey {
    fn from(sym: JsSymbol) -> Self {
        PropertyKey::Symbol(sym)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(s) => match &s.description {
                Some(desc) => write!(f, "Symbol({})", desc),
                None => write!(f, "Symbol()"),
            },
        }
    }
}

/// Object property descriptor
#[derive(Clone)]
pub struct Property {
    pub value: JsValue,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
    /// Getter function (for accessor properties)
    pub getter: Option<JsObjectRef>,
    /// Setter function (for accessor properties)
    pub setter: Option<JsObjectRef>,
}

impl Property {
    pub fn data(value: JsValue) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
            getter: None,
            setter: None,
        }
    }

    /// Create an accessor property with getter and/or setter
    pub fn accessor(getter: Option<JsObjectRef>, setter: Option<JsObjectRef>) -> Self {
        Self {
            value: JsValue::Undefined,
            writable: false,
            enumerable: true,
            configurable: true,
            getter,
            setter,
        }
    }

    /// Check if this is an accessor property
    pub fn is_accessor(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }

    pub fn with_attributes(
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            value,
            writable,
            enumerable,
            configurable,
            getter: None,
            setter: None,
        }
    }
}

/// Signature shared by every built-in and by embedder-supplied callbacks.
///
/// `Rc<dyn Fn>` rather than a plain fn pointer so callbacks can capture
/// state; reentrant callbacks (a comparator that detaches the buffer it is
/// sorting, a mapper that shrinks the array) are part of the contract and
/// exercised by the tests.
pub type NativeFn = Rc<dyn Fn(&mut Runtime, JsValue, &[JsValue]) -> Result<JsValue, JsError>>;

/// A native function object
#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub func: NativeFn,
    pub arity: usize,
    /// Whether the function may be used as a constructor target
    pub is_constructor: bool,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}
