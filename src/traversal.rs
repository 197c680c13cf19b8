//! Hole-aware index traversal
//!
//! Decides which indices an algorithm visits and in what order. The order is
//! observable (getters, inherited accessors), so it is part of each
//! algorithm's contract rather than an implementation detail.
//!
//! Genuine arrays delegate to their element store, which short-circuits for
//! dense storage and scans the index set for holey/sparse storage. Generic
//! receivers fall back to linearly querying the property model, an O(n)
//! worst case.

use crate::error::JsError;
use crate::runtime::Runtime;
use crate::value::{ExoticObject, JsValue, PropertyKey};

/// Presence test for an element index, hole-aware for genuine arrays and
/// delegated to the property model for everything else.
pub fn has_element(rt: &mut Runtime, receiver: &JsValue, index: u64) -> Result<bool, JsError> {
    rt.has_property(receiver, &PropertyKey::from_element_index(index))
}

/// Smallest populated index greater than `current` (`None` seeds from the
/// front), bounded by `length`. Returns `None` when nothing remains.
pub fn next_element_index(
    rt: &mut Runtime,
    receiver: &JsValue,
    current: Option<u64>,
    length: u64,
) -> Result<Option<u64>, JsError> {
    if let Some(next) = store_next(receiver, current) {
        return Ok(next.filter(|i| *i < length));
    }
    // Generic receiver: walk every candidate index.
    let mut k = match current {
        Some(c) => match c.checked_add(1) {
            Some(k) => k,
            None => return Ok(None),
        },
        None => 0,
    };
    while k < length {
        if has_element(rt, receiver, k)? {
            return Ok(Some(k));
        }
        k += 1;
    }
    Ok(None)
}

/// Largest populated index smaller than `current` (`None` seeds from the
/// end of `length`). Returns `None` when the front has been passed.
pub fn previous_element_index(
    rt: &mut Runtime,
    receiver: &JsValue,
    current: Option<u64>,
    length: u64,
) -> Result<Option<u64>, JsError> {
    if let Some(prev) = store_previous(receiver, current, length) {
        return Ok(prev);
    }
    let mut k = current.unwrap_or(length).min(length);
    while k > 0 {
        k -= 1;
        if has_element(rt, receiver, k)? {
            return Ok(Some(k));
        }
    }
    Ok(None)
}

/// First populated index, the forward-iteration seed. For sparse stores this
/// avoids scanning from zero.
pub fn first_element_index(
    rt: &mut Runtime,
    receiver: &JsValue,
    length: u64,
) -> Result<Option<u64>, JsError> {
    next_element_index(rt, receiver, None, length)
}

/// Last populated index, the reverse-iteration seed.
pub fn last_element_index(
    rt: &mut Runtime,
    receiver: &JsValue,
    length: u64,
) -> Result<Option<u64>, JsError> {
    previous_element_index(rt, receiver, None, length)
}

/// Fast-path traversal through the element store or typed view, when the
/// receiver has one. `None` means "no fast path, scan generically".
fn store_next(receiver: &JsValue, current: Option<u64>) -> Option<Option<u64>> {
    let JsValue::Object(obj) = receiver else {
        return None;
    };
    let b = obj.borrow();
    match &b.exotic {
        ExoticObject::Array(store) => Some(store.next_index(current)),
        ExoticObject::TypedArray(view) => {
            let start = match current {
                Some(c) => c.checked_add(1)?,
                None => 0,
            };
            Some((start < view.length() as u64).then_some(start))
        }
        _ => None,
    }
}

fn store_previous(
    receiver: &JsValue,
    current: Option<u64>,
    length: u64,
) -> Option<Option<u64>> {
    let JsValue::Object(obj) = receiver else {
        return None;
    };
    let b = obj.borrow();
    match &b.exotic {
        ExoticObject::Array(store) => {
            let bounded = Some(current.unwrap_or(length).min(store.length().min(length)));
            Some(store.previous_index(bounded))
        }
        ExoticObject::TypedArray(view) => {
            let end = current.unwrap_or(length).min(view.length() as u64);
            Some(end.checked_sub(1))
        }
        _ => None,
    }
}

/// Per-traversal cursor: direction, position and the `length` snapshot it
/// was created with. Algorithms that iterate the snapshot-length contract
/// (`forEach`, `map`, ...) drive one of these.
pub struct ElementCursor {
    length: u64,
    position: Option<u64>,
    descending: bool,
}

impl ElementCursor {
    pub fn ascending(length: u64) -> Self {
        ElementCursor {
            length,
            position: None,
            descending: false,
        }
    }

    pub fn descending(length: u64) -> Self {
        ElementCursor {
            length,
            position: None,
            descending: true,
        }
    }

    /// The captured length snapshot.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Advance to the next populated index, or `None` when exhausted.
    pub fn advance(&mut self, rt: &mut Runtime, receiver: &JsValue) -> Result<Option<u64>, JsError> {
        let next = if self.descending {
            previous_element_index(rt, receiver, self.position, self.length)?
        } else {
            next_element_index(rt, receiver, self.position, self.length)?
        };
        if next.is_some() {
            self.position = next;
        } else {
            // Park at the end so further advances stay exhausted.
            self.position = if self.descending { Some(0) } else { Some(self.length) };
        }
        Ok(next)
    }
}
