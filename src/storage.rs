//! Element storage for genuine arrays
//!
//! An array is backed at any moment by exactly one `ElementStore` variant.
//! Storage starts as dense as the initializer allows and lazily generalizes
//! (int -> double -> object, dense -> holey -> sparse) the first time an
//! operation demands it. Transitions never lose observable elements and
//! never fail; only writes that would push `length` past 2^53 - 1 error.

use std::collections::BTreeMap;

use crate::error::JsError;
use crate::value::JsValue;

/// 2^53 - 1, the largest exactly representable integer length.
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Writes that would need a backing vector longer than this go to the
/// sparse representation instead.
pub const MAX_DENSE_LEN: u64 = 1 << 20;

/// The interchangeable internal representations of an array's elements.
pub enum ElementStore {
    /// Contiguous, every index holds a small integer
    DenseInt(Vec<i32>),
    /// Contiguous, every index holds a double
    DenseDouble(Vec<f64>),
    /// Contiguous, every index holds an arbitrary value
    DenseObject(Vec<JsValue>),
    /// Same layouts, but some indices may be absent ("holes")
    HoleyInt(Vec<Option<i32>>),
    HoleyDouble(Vec<Option<f64>>),
    HoleyObject(Vec<Option<JsValue>>),
    /// Index -> value map for arrays whose populated indices are few
    /// relative to `length`, or exceed practical vector bounds.
    /// Invariant: every key is < `length`.
    Sparse {
        map: BTreeMap<u64, JsValue>,
        length: u64,
    },
}

/// Element kind classification used to pick and transition representations.
enum Classified {
    Int(i32),
    Double(f64),
    Object(JsValue),
}

fn classify(value: &JsValue) -> Classified {
    if let JsValue::Number(n) = value {
        if n.fract() == 0.0
            && *n >= i32::MIN as f64
            && *n <= i32::MAX as f64
            && !(*n == 0.0 && n.is_sign_negative())
        {
            Classified::Int(*n as i32)
        } else {
            Classified::Double(*n)
        }
    } else {
        Classified::Object(value.clone())
    }
}

fn length_error() -> JsError {
    JsError::range_error("Invalid array length")
}

impl ElementStore {
    /// Empty store; the most specific representation, generalized on demand.
    pub fn new() -> Self {
        ElementStore::DenseInt(Vec::new())
    }

    /// Build a store from an initializer, picking the most specific dense
    /// representation the values allow.
    pub fn from_values(values: Vec<JsValue>) -> Self {
        let all_int = values.iter().all(|v| matches!(classify(v), Classified::Int(_)));
        if all_int {
            return ElementStore::DenseInt(
                values
                    .iter()
                    .map(|v| match classify(v) {
                        Classified::Int(i) => i,
                        _ => 0,
                    })
                    .collect(),
            );
        }
        if values.iter().all(|v| matches!(v, JsValue::Number(_))) {
            return ElementStore::DenseDouble(values.iter().map(JsValue::to_number).collect());
        }
        ElementStore::DenseObject(values)
    }

    /// Store for `new Array(len)`: conceptual length `len`, no elements.
    pub fn with_length(len: u64) -> Result<Self, JsError> {
        if len > MAX_SAFE_INTEGER {
            return Err(length_error());
        }
        if len == 0 {
            Ok(ElementStore::new())
        } else if len <= MAX_DENSE_LEN {
            Ok(ElementStore::HoleyObject(vec![None; len as usize]))
        } else {
            Ok(ElementStore::Sparse {
                map: BTreeMap::new(),
                length: len,
            })
        }
    }

    pub fn length(&self) -> u64 {
        match self {
            ElementStore::DenseInt(v) => v.len() as u64,
            ElementStore::DenseDouble(v) => v.len() as u64,
            ElementStore::DenseObject(v) => v.len() as u64,
            ElementStore::HoleyInt(v) => v.len() as u64,
            ElementStore::HoleyDouble(v) => v.len() as u64,
            ElementStore::HoleyObject(v) => v.len() as u64,
            ElementStore::Sparse { length, .. } => *length,
        }
    }

    /// Read the element at `index`. `None` is a hole, distinguishable from
    /// an index explicitly storing `undefined`.
    pub fn get(&self, index: u64) -> Option<JsValue> {
        if index >= self.length() {
            return None;
        }
        let i = index as usize;
        match self {
            ElementStore::DenseInt(v) => v.get(i).map(|n| JsValue::Number(f64::from(*n))),
            ElementStore::DenseDouble(v) => v.get(i).map(|n| JsValue::Number(*n)),
            ElementStore::DenseObject(v) => v.get(i).cloned(),
            ElementStore::HoleyInt(v) => v.get(i).copied().flatten().map(|n| JsValue::Number(f64::from(n))),
            ElementStore::HoleyDouble(v) => v.get(i).copied().flatten().map(JsValue::Number),
            ElementStore::HoleyObject(v) => v.get(i).cloned().flatten(),
            ElementStore::Sparse { map, .. } => map.get(&index).cloned(),
        }
    }

    pub fn has(&self, index: u64) -> bool {
        if index >= self.length() {
            return false;
        }
        let i = index as usize;
        match self {
            ElementStore::DenseInt(_) | ElementStore::DenseDouble(_) | ElementStore::DenseObject(_) => true,
            ElementStore::HoleyInt(v) => matches!(v.get(i), Some(Some(_))),
            ElementStore::HoleyDouble(v) => matches!(v.get(i), Some(Some(_))),
            ElementStore::HoleyObject(v) => matches!(v.get(i), Some(Some(_))),
            ElementStore::Sparse { map, .. } => map.contains_key(&index),
        }
    }

    /// Write `value` at `index`, transitioning representation as needed.
    /// Extending past 2^53 - 1 fails atomically with a RangeError.
    pub fn set(&mut self, index: u64, value: JsValue) -> Result<(), JsError> {
        if index >= MAX_SAFE_INTEGER {
            return Err(length_error());
        }
        let len = self.length();
        if index > len || (index == len && len >= MAX_DENSE_LEN && !self.is_sparse()) {
            // Gap write or an append that would outgrow the dense budget.
            if index >= MAX_DENSE_LEN && !self.is_sparse() {
                self.to_sparse();
            } else if index > len && !self.is_sparse() {
                self.to_holey();
                self.grow_holey(index as usize);
            }
        }
        match self {
            ElementStore::DenseInt(v) => match classify(&value) {
                Classified::Int(n) => {
                    let i = index as usize;
                    if let Some(slot) = v.get_mut(i) {
                        *slot = n;
                    } else {
                        v.push(n);
                    }
                    Ok(())
                }
                Classified::Double(_) => {
                    self.to_double();
                    self.set(index, value)
                }
                Classified::Object(_) => {
                    self.to_object_kind();
                    self.set(index, value)
                }
            },
            ElementStore::DenseDouble(v) => match classify(&value) {
                Classified::Int(n) => {
                    let i = index as usize;
                    if let Some(slot) = v.get_mut(i) {
                        *slot = f64::from(n);
                    } else {
                        v.push(f64::from(n));
                    }
                    Ok(())
                }
                Classified::Double(n) => {
                    let i = index as usize;
                    if let Some(slot) = v.get_mut(i) {
                        *slot = n;
                    } else {
                        v.push(n);
                    }
                    Ok(())
                }
                Classified::Object(_) => {
                    self.to_object_kind();
                    self.set(index, value)
                }
            },
            ElementStore::DenseObject(v) => {
                let i = index as usize;
                if let Some(slot) = v.get_mut(i) {
                    *slot = value;
                } else {
                    v.push(value);
                }
                Ok(())
            }
            ElementStore::HoleyInt(v) => match classify(&value) {
                Classified::Int(n) => {
                    let i = index as usize;
                    if i >= v.len() {
                        v.resize(i + 1, None);
                    }
                    if let Some(slot) = v.get_mut(i) {
                        *slot = Some(n);
                    }
                    Ok(())
                }
                Classified::Double(_) => {
                    self.to_double();
                    self.set(index, value)
                }
                Classified::Object(_) => {
                    self.to_object_kind();
                    self.set(index, value)
                }
            },
            ElementStore::HoleyDouble(v) => match classify(&value) {
                Classified::Int(n) => {
                    let i = index as usize;
                    if i >= v.len() {
                        v.resize(i + 1, None);
                    }
                    if let Some(slot) = v.get_mut(i) {
                        *slot = Some(f64::from(n));
                    }
                    Ok(())
                }
                Classified::Double(n) => {
                    let i = index as usize;
                    if i >= v.len() {
                        v.resize(i + 1, None);
                    }
                    if let Some(slot) = v.get_mut(i) {
                        *slot = Some(n);
                    }
                    Ok(())
                }
                Classified::Object(_) => {
                    self.to_object_kind();
                    self.set(index, value)
                }
            },
            ElementStore::HoleyObject(v) => {
                let i = index as usize;
                if i >= v.len() {
                    v.resize(i + 1, None);
                }
                if let Some(slot) = v.get_mut(i) {
                    *slot = Some(value);
                }
                Ok(())
            }
            ElementStore::Sparse { map, length } => {
                map.insert(index, value);
                if index >= *length {
                    *length = index + 1;
                }
                Ok(())
            }
        }
    }

    /// Remove the element at `index` without changing `length`.
    pub fn delete(&mut self, index: u64) {
        if index >= self.length() {
            return;
        }
        if self.is_dense() {
            self.to_holey();
        }
        let i = index as usize;
        match self {
            ElementStore::HoleyInt(v) => {
                if let Some(slot) = v.get_mut(i) {
                    *slot = None;
                }
            }
            ElementStore::HoleyDouble(v) => {
                if let Some(slot) = v.get_mut(i) {
                    *slot = None;
                }
            }
            ElementStore::HoleyObject(v) => {
                if let Some(slot) = v.get_mut(i) {
                    *slot = None;
                }
            }
            ElementStore::Sparse { map, .. } => {
                map.remove(&index);
            }
            // to_holey above rules these out
            ElementStore::DenseInt(_) | ElementStore::DenseDouble(_) | ElementStore::DenseObject(_) => {}
        }
    }

    /// Set the conceptual length, truncating or growing with holes.
    pub fn set_length(&mut self, new_len: u64) -> Result<(), JsError> {
        if new_len > MAX_SAFE_INTEGER {
            return Err(length_error());
        }
        let len = self.length();
        if new_len == len {
            return Ok(());
        }
        if new_len < len {
            match self {
                ElementStore::DenseInt(v) => v.truncate(new_len as usize),
                ElementStore::DenseDouble(v) => v.truncate(new_len as usize),
                ElementStore::DenseObject(v) => v.truncate(new_len as usize),
                ElementStore::HoleyInt(v) => v.truncate(new_len as usize),
                ElementStore::HoleyDouble(v) => v.truncate(new_len as usize),
                ElementStore::HoleyObject(v) => v.truncate(new_len as usize),
                ElementStore::Sparse { map, length } => {
                    map.split_off(&new_len);
                    *length = new_len;
                }
            }
            return Ok(());
        }
        // Growing introduces holes.
        if new_len > MAX_DENSE_LEN {
            self.to_sparse();
        }
        match self {
            ElementStore::Sparse { length, .. } => {
                *length = new_len;
            }
            _ => {
                self.to_holey();
                self.grow_holey(new_len as usize);
            }
        }
        Ok(())
    }

    /// Smallest populated index greater than `current` (`None` starts from
    /// zero). Dense stores short-circuit to `current + 1`.
    pub fn next_index(&self, current: Option<u64>) -> Option<u64> {
        let start = match current {
            Some(c) => c.checked_add(1)?,
            None => 0,
        };
        let len = self.length();
        if start >= len {
            return None;
        }
        match self {
            ElementStore::DenseInt(_) | ElementStore::DenseDouble(_) | ElementStore::DenseObject(_) => Some(start),
            ElementStore::HoleyInt(v) => scan_forward(v, start as usize),
            ElementStore::HoleyDouble(v) => scan_forward(v, start as usize),
            ElementStore::HoleyObject(v) => scan_forward(v, start as usize),
            ElementStore::Sparse { map, .. } => map.range(start..).next().map(|(k, _)| *k),
        }
    }

    /// Largest populated index smaller than `current` (`None` starts from
    /// the end).
    pub fn previous_index(&self, current: Option<u64>) -> Option<u64> {
        let len = self.length();
        let end = current.unwrap_or(len).min(len);
        if end == 0 {
            return None;
        }
        match self {
            ElementStore::DenseInt(_) | ElementStore::DenseDouble(_) | ElementStore::DenseObject(_) => Some(end - 1),
            ElementStore::HoleyInt(v) => scan_backward(v, end as usize),
            ElementStore::HoleyDouble(v) => scan_backward(v, end as usize),
            ElementStore::HoleyObject(v) => scan_backward(v, end as usize),
            ElementStore::Sparse { map, .. } => map.range(..end).next_back().map(|(k, _)| *k),
        }
    }

    /// First populated index, used to seed forward iteration over sparse
    /// stores without scanning from zero.
    pub fn first_index(&self) -> Option<u64> {
        self.next_index(None)
    }

    /// Last populated index, the reverse-iteration seed.
    pub fn last_index(&self) -> Option<u64> {
        self.previous_index(None)
    }

    pub fn is_dense(&self) -> bool {
        matches!(
            self,
            ElementStore::DenseInt(_) | ElementStore::DenseDouble(_) | ElementStore::DenseObject(_)
        )
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, ElementStore::Sparse { .. })
    }

    /// Whether the representation admits holes. A holey store that happens
    /// to be fully populated still reports true; the classification follows
    /// the representation, not its momentary contents.
    pub fn has_holes(&self) -> bool {
        !self.is_dense()
    }

    /// Whether the store holds numbers only, which lets sort use a numeric
    /// default comparator.
    pub fn is_numeric_kind(&self) -> bool {
        matches!(
            self,
            ElementStore::DenseInt(_)
                | ElementStore::DenseDouble(_)
                | ElementStore::HoleyInt(_)
                | ElementStore::HoleyDouble(_)
        )
    }

    /// Remove the first `count` indices of a dense store in one block,
    /// relabeling the rest. Returns false (and does nothing) for stores
    /// where blockwise removal is not sound.
    pub fn shift_front(&mut self, count: usize) -> bool {
        match self {
            ElementStore::DenseInt(v) => {
                v.drain(..count.min(v.len()));
                true
            }
            ElementStore::DenseDouble(v) => {
                v.drain(..count.min(v.len()));
                true
            }
            ElementStore::DenseObject(v) => {
                v.drain(..count.min(v.len()));
                true
            }
            _ => false,
        }
    }

    /// Blockwise splice for dense stores: remove `delete_count` elements at
    /// `start` and insert `items`. Returns false if the store is not dense
    /// (the caller falls back to element-wise movement).
    pub fn splice_dense(&mut self, start: usize, delete_count: usize, items: &[JsValue]) -> bool {
        if !self.is_dense() {
            return false;
        }
        let compatible = match self {
            ElementStore::DenseInt(_) => items.iter().all(|v| matches!(classify(v), Classified::Int(_))),
            ElementStore::DenseDouble(_) => items.iter().all(|v| matches!(v, JsValue::Number(_))),
            _ => true,
        };
        if !compatible {
            self.to_object_kind();
        }
        match self {
            ElementStore::DenseInt(v) => {
                let end = (start + delete_count).min(v.len());
                v.splice(
                    start.min(v.len())..end,
                    items.iter().map(|i| match classify(i) {
                        Classified::Int(n) => n,
                        _ => 0,
                    }),
                );
            }
            ElementStore::DenseDouble(v) => {
                let end = (start + delete_count).min(v.len());
                v.splice(start.min(v.len())..end, items.iter().map(JsValue::to_number));
            }
            ElementStore::DenseObject(v) => {
                let end = (start + delete_count).min(v.len());
                v.splice(start.min(v.len())..end, items.iter().cloned());
            }
            _ => return false,
        }
        true
    }

    /// Populated `(index, value)` pairs in ascending index order.
    pub fn populated(&self) -> Vec<(u64, JsValue)> {
        let mut out = Vec::new();
        let mut cursor = self.first_index();
        while let Some(i) = cursor {
            if let Some(v) = self.get(i) {
                out.push((i, v));
            }
            cursor = self.next_index(Some(i));
        }
        out
    }

    // ── representation transitions ─────────────────────────────────────

    fn to_double(&mut self) {
        let replaced = std::mem::replace(self, ElementStore::new());
        *self = match replaced {
            ElementStore::DenseInt(v) => {
                ElementStore::DenseDouble(v.into_iter().map(f64::from).collect())
            }
            ElementStore::HoleyInt(v) => {
                ElementStore::HoleyDouble(v.into_iter().map(|o| o.map(f64::from)).collect())
            }
            other => other,
        };
    }

    fn to_object_kind(&mut self) {
        let replaced = std::mem::replace(self, ElementStore::new());
        *self = match replaced {
            ElementStore::DenseInt(v) => ElementStore::DenseObject(
                v.into_iter().map(|n| JsValue::Number(f64::from(n))).collect(),
            ),
            ElementStore::DenseDouble(v) => {
                ElementStore::DenseObject(v.into_iter().map(JsValue::Number).collect())
            }
            ElementStore::HoleyInt(v) => ElementStore::HoleyObject(
                v.into_iter()
                    .map(|o| o.map(|n| JsValue::Number(f64::from(n))))
                    .collect(),
            ),
            ElementStore::HoleyDouble(v) => ElementStore::HoleyObject(
                v.into_iter().map(|o| o.map(JsValue::Number)).collect(),
            ),
            other => other,
        };
    }

    fn to_holey(&mut self) {
        let replaced = std::mem::replace(self, ElementStore::new());
        *self = match replaced {
            ElementStore::DenseInt(v) => {
                ElementStore::HoleyInt(v.into_iter().map(Some).collect())
            }
            ElementStore::DenseDouble(v) => {
                ElementStore::HoleyDouble(v.into_iter().map(Some).collect())
            }
            ElementStore::DenseObject(v) => {
                ElementStore::HoleyObject(v.into_iter().map(Some).collect())
            }
            other => other,
        };
    }

    fn to_sparse(&mut self) {
        let length = self.length();
        let replaced = std::mem::replace(self, ElementStore::new());
        let map: BTreeMap<u64, JsValue> = match replaced {
            ElementStore::Sparse { map, .. } => map,
            other => other.populated().into_iter().collect(),
        };
        *self = ElementStore::Sparse { map, length };
    }

    fn grow_holey(&mut self, min_len: usize) {
        match self {
            ElementStore::HoleyInt(v) if v.len() < min_len => v.resize(min_len, None),
            ElementStore::HoleyDouble(v) if v.len() < min_len => v.resize(min_len, None),
            ElementStore::HoleyObject(v) if v.len() < min_len => v.resize(min_len, None),
            _ => {}
        }
    }
}

impl Default for ElementStore {
    fn default() -> Self {
        Self::new()
    }
}

fn scan_forward<T>(v: &[Option<T>], start: usize) -> Option<u64> {
    v.iter()
        .enumerate()
        .skip(start)
        .find(|(_, slot)| slot.is_some())
        .map(|(i, _)| i as u64)
}

fn scan_backward<T>(v: &[Option<T>], end: usize) -> Option<u64> {
    v.iter()
        .enumerate()
        .take(end)
        .rfind(|(_, slot)| slot.is_some())
        .map(|(i, _)| i as u64)
}
