//! Length-prefixed frame codec.
//!
//! Every logical value on the wire is a length-prefixed byte blob, always
//! big-endian. The functions here are transport-agnostic: they work the same
//! over an in-memory `Cursor<Vec<u8>>` (see the round-trip tests) and over a
//! live, possibly non-blocking, `TcpStream` (see `daq_net::socket`).

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Default ceiling on any single frame's declared length, per the
/// configuration surface (`max frame length`, default 64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

const LEN_PREFIX_SIZE: usize = 4;

/// Reads until `buf` is completely filled, spinning through `WouldBlock`
/// rather than surfacing it. A `Ok(0)` read before the buffer is full means
/// the peer closed mid-frame.
fn read_exact_loop<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => return Err(Error::Eof),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(())
}

fn write_all_loop<W: Write + ?Sized>(w: &mut W, buf: &[u8]) -> Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        match w.write(&buf[sent..]) {
            Ok(0) => return Err(Error::Eof),
            Ok(n) => sent += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(())
}

fn read_len<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<usize> {
    let mut buf = [0u8; LEN_PREFIX_SIZE];
    read_exact_loop(r, &mut buf)?;
    let len = i32::from_be_bytes(buf);
    if len < 0 {
        return Err(Error::Protocol(format!("negative frame length {len}")));
    }
    let len = len as usize;
    if len > max_len {
        return Err(Error::Protocol(format!(
            "frame length {len} exceeds configured maximum {max_len}"
        )));
    }
    Ok(len)
}

fn write_len<W: Write + ?Sized>(w: &mut W, len: usize) -> Result<()> {
    let len: i32 =
        len.try_into().map_err(|_| Error::Protocol(format!("frame length {len} overflows i32")))?;
    write_all_loop(w, &len.to_be_bytes())
}

// ---------------------------------------------------------------------
// string
// ---------------------------------------------------------------------

pub fn send_string<W: Write + ?Sized>(w: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    write_len(w, bytes.len())?;
    write_all_loop(w, bytes)
}

pub fn get_string<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<String> {
    let len = read_len(r, max_len)?;
    let mut buf = vec![0u8; len];
    read_exact_loop(r, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::Protocol(format!("invalid utf-8 in string frame: {e}")))
}

// ---------------------------------------------------------------------
// scalar
// ---------------------------------------------------------------------

/// A scalar value, one of the fixed-width type tags the wire protocol
/// understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    F4(f32),
    F8(f64),
    I4(i32),
    I8(i64),
    U4(u32),
    U8(u64),
    Bool(bool),
}

impl Scalar {
    fn tag(self) -> &'static str {
        match self {
            Scalar::F4(_) => "f4",
            Scalar::F8(_) => "f8",
            Scalar::I4(_) => "i4",
            Scalar::I8(_) => "i8",
            Scalar::U4(_) => "u4",
            Scalar::U8(_) => "u8",
            Scalar::Bool(_) => "bool",
        }
    }

    fn width(tag: &str) -> Option<usize> {
        Some(match tag {
            "f4" | "i4" | "u4" => 4,
            "f8" | "i8" | "u8" => 8,
            "bool" => 1,
            _ => return None,
        })
    }

    fn encode_payload(self, buf: &mut Vec<u8>) {
        match self {
            Scalar::F4(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Scalar::F8(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Scalar::I4(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Scalar::I8(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Scalar::U4(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Scalar::U8(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Scalar::Bool(v) => buf.push(u8::from(v)),
        }
    }

    fn decode_payload(tag: &str, payload: &[u8]) -> Result<Self> {
        Ok(match tag {
            "f4" => Scalar::F4(f32::from_be_bytes(payload.try_into().unwrap())),
            "f8" => Scalar::F8(f64::from_be_bytes(payload.try_into().unwrap())),
            "i4" => Scalar::I4(i32::from_be_bytes(payload.try_into().unwrap())),
            "i8" => Scalar::I8(i64::from_be_bytes(payload.try_into().unwrap())),
            "u4" => Scalar::U4(u32::from_be_bytes(payload.try_into().unwrap())),
            "u8" => Scalar::U8(u64::from_be_bytes(payload.try_into().unwrap())),
            "bool" => Scalar::Bool(payload[0] != 0),
            other => return Err(Error::Protocol(format!("unknown scalar type tag {other:?}"))),
        })
    }
}

/// Writes a scalar frame: an outer length prefix wrapping the tag's own
/// string frame followed by the fixed-width big-endian payload.
pub fn send_scalar<W: Write + ?Sized>(w: &mut W, value: Scalar) -> Result<()> {
    let mut body = Vec::new();
    encode_tagged_string(&mut body, value.tag());
    value.encode_payload(&mut body);
    write_len(w, body.len())?;
    write_all_loop(w, &body)
}

pub fn get_scalar<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<Scalar> {
    let body_len = read_len(r, max_len)?;
    let mut body = vec![0u8; body_len];
    read_exact_loop(r, &mut body)?;
    let mut cursor = &body[..];
    let tag = decode_tagged_string(&mut cursor)?;
    let width = Scalar::width(&tag)
        .ok_or_else(|| Error::Protocol(format!("unknown scalar type tag {tag:?}")))?;
    if cursor.len() != width {
        return Err(Error::Protocol(format!(
            "scalar payload for tag {tag:?} is {} bytes, expected {width}",
            cursor.len()
        )));
    }
    Scalar::decode_payload(&tag, cursor)
}

/// A nested string frame: `[len: i32][utf8 bytes]`, written directly into an
/// in-memory buffer (used to build the body of scalar/array frames).
fn encode_tagged_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn decode_tagged_string(cursor: &mut &[u8]) -> Result<String> {
    if cursor.len() < LEN_PREFIX_SIZE {
        return Err(Error::Protocol("truncated tag frame".into()));
    }
    let (len_bytes, rest) = cursor.split_at(LEN_PREFIX_SIZE);
    let len = i32::from_be_bytes(len_bytes.try_into().unwrap());
    if len < 0 {
        return Err(Error::Protocol(format!("negative tag length {len}")));
    }
    let len = len as usize;
    if rest.len() < len {
        return Err(Error::Protocol("truncated tag frame".into()));
    }
    let (tag_bytes, rest) = rest.split_at(len);
    let tag = std::str::from_utf8(tag_bytes)
        .map_err(|e| Error::Protocol(format!("invalid utf-8 in tag frame: {e}")))?
        .to_owned();
    *cursor = rest;
    Ok(tag)
}

// ---------------------------------------------------------------------
// array
// ---------------------------------------------------------------------

/// Homogeneous, row-major (C order) element storage for an [`Array`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    F4(Vec<f32>),
    F8(Vec<f64>),
    I4(Vec<i32>),
    I8(Vec<i64>),
    U4(Vec<u32>),
    U8(Vec<u64>),
}

impl ArrayData {
    fn tag(&self) -> &'static str {
        match self {
            ArrayData::F4(_) => "f4",
            ArrayData::F8(_) => "f8",
            ArrayData::I4(_) => "i4",
            ArrayData::I8(_) => "i8",
            ArrayData::U4(_) => "u4",
            ArrayData::U8(_) => "u8",
        }
    }

    fn len(&self) -> usize {
        match self {
            ArrayData::F4(v) => v.len(),
            ArrayData::F8(v) => v.len(),
            ArrayData::I4(v) => v.len(),
            ArrayData::I8(v) => v.len(),
            ArrayData::U4(v) => v.len(),
            ArrayData::U8(v) => v.len(),
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            ArrayData::F4(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
            ArrayData::F8(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
            ArrayData::I4(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
            ArrayData::I8(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
            ArrayData::U4(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
            ArrayData::U8(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
        }
    }

    fn decode(tag: &str, numel: usize, bytes: &[u8]) -> Result<Self> {
        macro_rules! decode_elems {
            ($ty:ty, $variant:ident) => {{
                const WIDTH: usize = std::mem::size_of::<$ty>();
                if bytes.len() != numel * WIDTH {
                    return Err(Error::Protocol(format!(
                        "array payload is {} bytes, expected {}",
                        bytes.len(),
                        numel * WIDTH
                    )));
                }
                let elems = bytes
                    .chunks_exact(WIDTH)
                    .map(|c| <$ty>::from_be_bytes(c.try_into().unwrap()))
                    .collect();
                ArrayData::$variant(elems)
            }};
        }
        Ok(match tag {
            "f4" => decode_elems!(f32, F4),
            "f8" => decode_elems!(f64, F8),
            "i4" => decode_elems!(i32, I4),
            "i8" => decode_elems!(i64, I8),
            "u4" => decode_elems!(u32, U4),
            "u8" => decode_elems!(u64, U8),
            other => return Err(Error::Protocol(format!("unknown array type tag {other:?}"))),
        })
    }
}

/// A dense, row-major array with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub shape: Vec<i32>,
    pub data: ArrayData,
}

impl Array {
    pub fn new(shape: Vec<i32>, data: ArrayData) -> Self {
        Self { shape, data }
    }

    fn numel(&self) -> usize {
        self.shape.iter().map(|&d| d.max(0) as usize).product()
    }
}

pub fn send_array<W: Write + ?Sized>(w: &mut W, array: &Array) -> Result<()> {
    let mut body = Vec::new();
    encode_tagged_string(&mut body, array.data.tag());
    body.extend_from_slice(&(array.shape.len() as i32).to_be_bytes());
    for dim in &array.shape {
        body.extend_from_slice(&dim.to_be_bytes());
    }
    array.data.encode(&mut body);
    write_len(w, body.len())?;
    write_all_loop(w, &body)
}

pub fn get_array<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<Array> {
    let body_len = read_len(r, max_len)?;
    let mut body = vec![0u8; body_len];
    read_exact_loop(r, &mut body)?;
    let mut cursor = &body[..];
    let tag = decode_tagged_string(&mut cursor)?;

    if cursor.len() < 4 {
        return Err(Error::Protocol("truncated array ndim".into()));
    }
    let (ndim_bytes, rest) = cursor.split_at(4);
    let ndim = i32::from_be_bytes(ndim_bytes.try_into().unwrap());
    if ndim < 0 {
        return Err(Error::Protocol(format!("negative array ndim {ndim}")));
    }
    let ndim = ndim as usize;
    cursor = rest;

    if cursor.len() < ndim * 4 {
        return Err(Error::Protocol("truncated array shape".into()));
    }
    let mut shape = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        let (dim_bytes, rest) = cursor.split_at(4);
        shape.push(i32::from_be_bytes(dim_bytes.try_into().unwrap()));
        cursor = rest;
    }

    let numel: usize = shape.iter().map(|&d| d.max(0) as usize).product();
    let data = ArrayData::decode(&tag, numel, cursor)?;
    Ok(Array { shape, data })
}

// ---------------------------------------------------------------------
// list
// ---------------------------------------------------------------------

/// One element of a heterogeneous [`send_list`]/[`get_list`] frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Str(String),
    Scalar(Scalar),
    Array(Array),
    List(Vec<ListItem>),
}

impl ListItem {
    fn kind(&self) -> &'static str {
        match self {
            ListItem::Str(_) => "string",
            ListItem::Scalar(_) => "scalar",
            ListItem::Array(_) => "array",
            ListItem::List(_) => "list",
        }
    }
}

/// Writes `[n: i32]` followed by `n` `[kind tag frame][item frame]` pairs.
/// Unlike scalar/array frames, the list itself has no outer length prefix —
/// each item is independently length-checked by its own framing.
pub fn send_list<W: Write + ?Sized>(w: &mut W, items: &[ListItem]) -> Result<()> {
    write_len(w, items.len())?;
    for item in items {
        send_string(w, item.kind())?;
        match item {
            ListItem::Str(s) => send_string(w, s)?,
            ListItem::Scalar(v) => send_scalar(w, *v)?,
            ListItem::Array(a) => send_array(w, a)?,
            ListItem::List(inner) => send_list(w, inner)?,
        }
    }
    Ok(())
}

pub fn get_list<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<Vec<ListItem>> {
    let n = read_len(r, usize::MAX)?;
    let mut items = Vec::with_capacity(n.min(4096));
    for _ in 0..n {
        let kind = get_string(r, max_len)?;
        let item = match kind.as_str() {
            "string" => ListItem::Str(get_string(r, max_len)?),
            "scalar" => ListItem::Scalar(get_scalar(r, max_len)?),
            "array" => ListItem::Array(get_array(r, max_len)?),
            "list" => ListItem::List(get_list(r, max_len)?),
            other => return Err(Error::Protocol(format!("unknown list item kind {other:?}"))),
        };
        items.push(item);
    }
    Ok(items)
}
