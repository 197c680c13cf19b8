//! Built-in algorithm implementations
//!
//! Each submodule installs its methods on the owning realm's prototypes
//! during realm setup.

pub mod array;
pub mod typed_array;

use std::rc::Rc;

use crate::error::JsError;
use crate::runtime::Runtime;
use crate::value::{JsValue, NativeFn};

/// Wrap a plain builtin fn in the shared native-function signature.
pub(crate) fn native(
    f: fn(&mut Runtime, JsValue, &[JsValue]) -> Result<JsValue, JsError>,
) -> NativeFn {
    Rc::new(f)
}
