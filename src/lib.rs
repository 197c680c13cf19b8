//! Array subsystem: element storage, hole-aware traversal, species
//! construction, and the Array / typed-array algorithm library
//!
//! # Example
//!
//! ```
//! use jsarray::{JsValue, PropertyKey, Runtime};
//!
//! let mut rt = Runtime::new();
//! let arr = JsValue::Object(rt.create_array(vec![
//!     JsValue::Number(3.0),
//!     JsValue::Number(1.0),
//!     JsValue::Number(2.0),
//! ]));
//! let sort = rt.get_property(&arr, &PropertyKey::from("sort")).unwrap();
//! rt.call_function(&sort, &arr, &[]).unwrap();
//! let first = rt.get_property(&arr, &PropertyKey::from("0")).unwrap();
//! assert_eq!(first, JsValue::Number(1.0));
//! ```

pub mod buffer;
pub mod builtins;
pub mod error;
pub mod realm;
pub mod runtime;
pub mod species;
pub mod storage;
pub mod traversal;
pub mod value;

pub use buffer::BufferData;
pub use buffer::TypedArrayKind;
pub use buffer::TypedArrayView;
pub use error::JsError;
pub use realm::RealmId;
pub use runtime::Runtime;
pub use runtime::RuntimeOptions;
pub use storage::ElementStore;
pub use storage::MAX_SAFE_INTEGER;
pub use value::CheapClone;
pub use value::JsObjectRef;
pub use value::JsString;
pub use value::JsValue;
pub use value::NativeFn;
pub use value::Property;
pub use value::PropertyKey;
