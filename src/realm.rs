//! Realms
//!
//! A realm is an explicit identity token plus the intrinsics created for it.
//! Values travel freely between realms; the species machinery compares realm
//! tokens to decide whether a `constructor` property is "the" Array
//! constructor of somewhere else and must be ignored.

use crate::buffer::TypedArrayKind;
use crate::value::JsObjectRef;

/// Realm identity. Comparison is by token equality, never by inspecting
/// globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RealmId(pub(crate) u32);

/// Per-realm intrinsics used by the array subsystem.
pub struct Realm {
    pub id: RealmId,
    pub object_prototype: JsObjectRef,
    pub array_prototype: JsObjectRef,
    pub array_constructor: JsObjectRef,
    pub typed_array_prototype: JsObjectRef,
    pub(crate) typed_array_constructors: Vec<(TypedArrayKind, JsObjectRef)>,
}

impl Realm {
    /// The realm's constructor for the given element kind.
    pub fn typed_array_constructor(&self, kind: TypedArrayKind) -> JsObjectRef {
        // Installed for every kind during realm setup.
        self.typed_array_constructors
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, c)| c.clone())
            .unwrap_or_else(|| self.array_constructor.clone())
    }
}
