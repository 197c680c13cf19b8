//! Byte buffers and typed-array views
//!
//! A `BufferData` may be shared by any number of views and may become
//! detached at any point, including from inside user callbacks running in
//! the middle of an algorithm. Every element access through a view verifies
//! non-detachment immediately beforehand; there is no caching of validity
//! across calls that can run user code.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::JsError;
use crate::value::JsValue;

/// Shared, detachable byte storage.
pub type BufferRef = Rc<RefCell<BufferData>>;

pub struct BufferData {
    bytes: Vec<u8>,
    detached: bool,
}

impl BufferData {
    pub fn new(byte_length: usize) -> BufferRef {
        Rc::new(RefCell::new(BufferData {
            bytes: vec![0; byte_length],
            detached: false,
        }))
    }

    pub fn byte_length(&self) -> usize {
        if self.detached { 0 } else { self.bytes.len() }
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Invalidate the buffer. Every view over it becomes inert; element
    /// access through such a view raises a TypeError.
    pub fn detach(&mut self) {
        self.detached = true;
        self.bytes = Vec::new();
    }
}

/// Element kind of a typed-array view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl TypedArrayKind {
    pub const ALL: [TypedArrayKind; 9] = [
        TypedArrayKind::Int8,
        TypedArrayKind::Uint8,
        TypedArrayKind::Uint8Clamped,
        TypedArrayKind::Int16,
        TypedArrayKind::Uint16,
        TypedArrayKind::Int32,
        TypedArrayKind::Uint32,
        TypedArrayKind::Float32,
        TypedArrayKind::Float64,
    ];

    pub fn element_size(self) -> usize {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "Int8Array",
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
            TypedArrayKind::Int16 => "Int16Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Int32 => "Int32Array",
            TypedArrayKind::Uint32 => "Uint32Array",
            TypedArrayKind::Float32 => "Float32Array",
            TypedArrayKind::Float64 => "Float64Array",
        }
    }
}

/// A fixed-length, fixed-kind view over a buffer. Never holey; length is
/// immutable after construction. Only the buffer's detachment state changes
/// over the view's lifetime.
#[derive(Clone)]
pub struct TypedArrayView {
    pub buffer: BufferRef,
    pub kind: TypedArrayKind,
    pub byte_offset: usize,
    length: usize,
}

impl TypedArrayView {
    /// Wrap `buffer`; the caller has already validated offset alignment and
    /// bounds against the buffer's byte length.
    pub fn new(buffer: BufferRef, kind: TypedArrayKind, byte_offset: usize, length: usize) -> Self {
        TypedArrayView {
            buffer,
            kind,
            byte_offset,
            length,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn byte_length(&self) -> usize {
        self.length * self.kind.element_size()
    }

    pub fn is_detached(&self) -> bool {
        self.buffer.borrow().is_detached()
    }

    fn detached_error(&self) -> JsError {
        JsError::type_error(format!(
            "Cannot perform {} operation on a detached ArrayBuffer",
            self.kind.name()
        ))
    }

    /// Read element `index`. `Ok(None)` means out of range; a detached
    /// buffer is a TypeError even when the index would be out of range.
    pub fn get(&self, index: u64) -> Result<Option<JsValue>, JsError> {
        let buf = self.buffer.borrow();
        if buf.is_detached() {
            return Err(self.detached_error());
        }
        let Ok(i) = usize::try_from(index) else {
            return Ok(None);
        };
        if i >= self.length {
            return Ok(None);
        }
        let at = self.byte_offset + i * self.kind.element_size();
        let n = match self.kind {
            TypedArrayKind::Int8 => f64::from(i8::from_le_bytes(read_bytes(&buf, at)?)),
            TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => {
                f64::from(u8::from_le_bytes(read_bytes(&buf, at)?))
            }
            TypedArrayKind::Int16 => f64::from(i16::from_le_bytes(read_bytes(&buf, at)?)),
            TypedArrayKind::Uint16 => f64::from(u16::from_le_bytes(read_bytes(&buf, at)?)),
            TypedArrayKind::Int32 => f64::from(i32::from_le_bytes(read_bytes(&buf, at)?)),
            TypedArrayKind::Uint32 => f64::from(u32::from_le_bytes(read_bytes(&buf, at)?)),
            TypedArrayKind::Float32 => f64::from(f32::from_le_bytes(read_bytes(&buf, at)?)),
            TypedArrayKind::Float64 => f64::from_le_bytes(read_bytes(&buf, at)?),
        };
        Ok(Some(JsValue::Number(n)))
    }

    /// Write element `index`. Out-of-range writes are silently dropped, as
    /// integer-indexed exotic set semantics demand; detached buffers raise.
    pub fn set(&self, index: u64, value: f64) -> Result<(), JsError> {
        let mut buf = self.buffer.borrow_mut();
        if buf.is_detached() {
            return Err(self.detached_error());
        }
        let Ok(i) = usize::try_from(index) else {
            return Ok(());
        };
        if i >= self.length {
            return Ok(());
        }
        let at = self.byte_offset + i * self.kind.element_size();
        match self.kind {
            TypedArrayKind::Int8 => write_bytes(&mut buf, at, (to_int_modulo(value) as i8).to_le_bytes()),
            TypedArrayKind::Uint8 => write_bytes(&mut buf, at, (to_int_modulo(value) as u8).to_le_bytes()),
            TypedArrayKind::Uint8Clamped => write_bytes(&mut buf, at, to_uint8_clamped(value).to_le_bytes()),
            TypedArrayKind::Int16 => write_bytes(&mut buf, at, (to_int_modulo(value) as i16).to_le_bytes()),
            TypedArrayKind::Uint16 => write_bytes(&mut buf, at, (to_int_modulo(value) as u16).to_le_bytes()),
            TypedArrayKind::Int32 => write_bytes(&mut buf, at, (to_int_modulo(value) as i32).to_le_bytes()),
            TypedArrayKind::Uint32 => write_bytes(&mut buf, at, (to_int_modulo(value) as u32).to_le_bytes()),
            TypedArrayKind::Float32 => write_bytes(&mut buf, at, (value as f32).to_le_bytes()),
            TypedArrayKind::Float64 => write_bytes(&mut buf, at, value.to_le_bytes()),
        }
    }
}

/// Fixed-width load from the backing bytes. The caller has bounds-checked
/// the element index against the view, and views never outlive the range
/// they were validated against, so a miss here is an engine bug.
fn read_bytes<const N: usize>(buf: &BufferData, at: usize) -> Result<[u8; N], JsError> {
    buf.bytes
        .get(at..at + N)
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or_else(|| JsError::internal("typed array view extends past its buffer"))
}

fn write_bytes<const N: usize>(
    buf: &mut BufferData,
    at: usize,
    bytes: [u8; N],
) -> Result<(), JsError> {
    let out = buf
        .bytes
        .get_mut(at..at + N)
        .ok_or_else(|| JsError::internal("typed array view extends past its buffer"))?;
    out.copy_from_slice(&bytes);
    Ok(())
}

/// ToIntegerOrZero followed by the modular wrap every fixed-width integer
/// conversion shares; the `as` casts above truncate the low bits, which is
/// exactly ToInt8/ToUint8/.../ToUint32.
fn to_int_modulo(n: f64) -> i64 {
    if n.is_nan() || n.is_infinite() {
        0
    } else {
        // Every integer kind here is 32 bits or narrower, so wrapping into
        // [0, 2^32) first keeps the f64 -> int cast exact; the final width
        // cast wraps the rest.
        n.trunc().rem_euclid(4_294_967_296.0) as i64
    }
}

/// ToUint8Clamp: clamp to [0, 255] with round-half-to-even.
fn to_uint8_clamped(n: f64) -> u8 {
    if n.is_nan() {
        0
    } else if n <= 0.0 {
        0
    } else if n >= 255.0 {
        255
    } else {
        n.round_ties_even() as u8
    }
}
