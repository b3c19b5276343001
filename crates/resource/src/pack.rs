use super::value::{canon_float, canon_int, Int};
use super::{registry, Error, Record, Ref, TypeId, Value};
use bytes::Bytes;

/// Maximum nesting depth the packer will walk. The owned Value tree makes
/// true reference cycles unrepresentable, so the depth guard is the
/// failure surface for degenerate nesting.
pub const MAX_DEPTH: usize = 128;

// One tag byte per value kind. Every payload is fixed-width or
// length-prefixed with a u64 big-endian count.
mod tag {
    pub const NULL: u8 = 0x01;
    pub const BOOL: u8 = 0x02;
    pub const POS_INT: u8 = 0x03;
    pub const NEG_INT: u8 = 0x04;
    pub const FLOAT: u8 = 0x05;
    pub const STRING: u8 = 0x06;
    pub const BYTES: u8 = 0x07;
    pub const ARRAY: u8 = 0x08;
    pub const OBJECT: u8 = 0x09;
    pub const RESOURCE: u8 = 0x0a;
    pub const REF: u8 = 0x0b;
    pub const TYPE_REF: u8 = 0x0c;
}

const QNAN_BITS: u64 = 0x7ff8_0000_0000_0000;
const NEG_ZERO_BITS: u64 = 0x8000_0000_0000_0000;

/// Pack a Record into its canonical byte encoding. Structurally equal
/// resources always pack to identical bytes, which is what makes their
/// digests identical.
pub fn pack(record: &Record) -> Result<Bytes, Error> {
    let mut buf = Vec::with_capacity(256);
    pack_record(record, &mut buf, 0)?;
    Ok(buf.into())
}

fn pack_record(record: &Record, buf: &mut Vec<u8>, depth: usize) -> Result<(), Error> {
    if depth >= MAX_DEPTH {
        return Err(Error::PackingDepth(MAX_DEPTH));
    }
    buf.push(tag::RESOURCE);
    pack_str(&record.type_id().to_string(), buf);
    buf.extend_from_slice(&(record.fields().len() as u64).to_be_bytes());
    for (name, value) in record.fields() {
        pack_str(name, buf);
        pack_value(value, buf, depth + 1)?;
    }
    Ok(())
}

fn pack_value(value: &Value, buf: &mut Vec<u8>, depth: usize) -> Result<(), Error> {
    if depth >= MAX_DEPTH {
        return Err(Error::PackingDepth(MAX_DEPTH));
    }
    match value {
        Value::Null => buf.push(tag::NULL),
        Value::Bool(b) => {
            buf.push(tag::BOOL);
            buf.push(*b as u8);
        }
        Value::PosInt(_) | Value::NegInt(_) => match canon_int(value).unwrap() {
            Int::Pos(n) => {
                buf.push(tag::POS_INT);
                buf.extend_from_slice(&n.to_be_bytes());
            }
            Int::Neg(n) => {
                buf.push(tag::NEG_INT);
                buf.extend_from_slice(&n.to_be_bytes());
            }
        },
        Value::Float(f) => {
            buf.push(tag::FLOAT);
            buf.extend_from_slice(&canon_float(*f).to_bits().to_be_bytes());
        }
        Value::String(s) => pack_str(s, buf),
        Value::Bytes(b) => {
            buf.push(tag::BYTES);
            buf.extend_from_slice(&(b.len() as u64).to_be_bytes());
            buf.extend_from_slice(b);
        }
        Value::Array(a) => {
            buf.push(tag::ARRAY);
            buf.extend_from_slice(&(a.len() as u64).to_be_bytes());
            for element in a {
                pack_value(element, buf, depth + 1)?;
            }
        }
        Value::Object(o) => {
            buf.push(tag::OBJECT);
            buf.extend_from_slice(&(o.len() as u64).to_be_bytes());
            // BTreeMap iteration is already bytewise-ascending key order.
            for (key, element) in o {
                pack_str(key, buf);
                pack_value(element, buf, depth + 1)?;
            }
        }
        Value::Resource(r) => pack_record(r, buf, depth + 1)?,
        Value::TypeRef(t) => {
            buf.push(tag::TYPE_REF);
            pack_str(&t.to_string(), buf);
        }
        // A Ref packs to its digest, never the referred-to content:
        // the referent was hashed before this Ref could exist, so the
        // committed graph cannot contain cycles.
        Value::Ref(r) => {
            buf.push(tag::REF);
            buf.extend_from_slice(r.digest().as_bytes());
        }
    }
    Ok(())
}

fn pack_str(s: &str, buf: &mut Vec<u8>) {
    buf.push(tag::STRING);
    buf.extend_from_slice(&(s.len() as u64).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Unpack the canonical byte encoding of a resource. The parser is
/// strict: it rejects unknown tags, truncation, non-canonical floats and
/// integers, unsorted object keys, unregistered type-ids, and trailing
/// bytes.
pub fn unpack(buf: &[u8]) -> Result<Record, Error> {
    let mut reader = Reader { buf };
    let record = unpack_record(&mut reader, 0)?;
    if !reader.buf.is_empty() {
        return Err(Error::TrailingBytes(reader.buf.len()));
    }
    Ok(record)
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8, Error> {
        let (first, rest) = self.buf.split_first().ok_or(Error::Truncated)?;
        self.buf = rest;
        Ok(*first)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.buf.len() < n {
            return Err(Error::Truncated);
        }
        let (taken, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(taken)
    }

    fn u64(&mut self) -> Result<u64, Error> {
        let bytes = self.take(8)?;
        Ok(u64::from_be_bytes(bytes.try_into().unwrap()))
    }

    fn len(&mut self) -> Result<usize, Error> {
        usize::try_from(self.u64()?).map_err(|_| Error::Truncated)
    }

    fn str(&mut self) -> Result<&'a str, Error> {
        match self.u8()? {
            tag::STRING => (),
            other => return Err(Error::BadTag(other)),
        }
        let n = self.len()?;
        Ok(std::str::from_utf8(self.take(n)?)?)
    }
}

fn unpack_record(reader: &mut Reader<'_>, depth: usize) -> Result<Record, Error> {
    match reader.u8()? {
        tag::RESOURCE => (),
        other => return Err(Error::BadTag(other)),
    }
    unpack_record_body(reader, depth)
}

fn unpack_type_id(reader: &mut Reader<'_>) -> Result<TypeId, Error> {
    let text = reader.str()?;
    let type_id: TypeId = text.parse()?;
    if registry::lookup_text(text).is_none() {
        return Err(Error::UnknownType(text.to_string()));
    }
    Ok(type_id)
}

fn unpack_record_body(reader: &mut Reader<'_>, depth: usize) -> Result<Record, Error> {
    if depth >= MAX_DEPTH {
        return Err(Error::PackingDepth(MAX_DEPTH));
    }
    let type_id = unpack_type_id(reader)?;

    let n_fields = reader.len()?;
    let mut fields = Vec::with_capacity(n_fields.min(64));
    for _ in 0..n_fields {
        let name = reader.str()?.to_string();
        let value = unpack_value(reader, depth + 1)?;
        fields.push((name, value));
    }
    Ok(Record::new(type_id, fields))
}

fn unpack_value(reader: &mut Reader<'_>, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_DEPTH {
        return Err(Error::PackingDepth(MAX_DEPTH));
    }
    Ok(match reader.u8()? {
        tag::NULL => Value::Null,
        tag::BOOL => match reader.u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => return Err(Error::BadTag(other)),
        },
        tag::POS_INT => Value::PosInt(reader.u64()?),
        tag::NEG_INT => {
            let n = i64::from_be_bytes(reader.take(8)?.try_into().unwrap());
            if n >= 0 {
                return Err(Error::BadInt(n));
            }
            Value::NegInt(n)
        }
        tag::FLOAT => {
            let bits = reader.u64()?;
            let f = f64::from_bits(bits);
            if (f.is_nan() && bits != QNAN_BITS) || bits == NEG_ZERO_BITS {
                return Err(Error::BadFloat);
            }
            Value::Float(f)
        }
        tag::STRING => {
            let n = reader.len()?;
            Value::String(std::str::from_utf8(reader.take(n)?)?.to_string())
        }
        tag::BYTES => {
            let n = reader.len()?;
            Value::Bytes(Bytes::copy_from_slice(reader.take(n)?))
        }
        tag::ARRAY => {
            let n = reader.len()?;
            let mut elements = Vec::with_capacity(n.min(64));
            for _ in 0..n {
                elements.push(unpack_value(reader, depth + 1)?);
            }
            Value::Array(elements)
        }
        tag::OBJECT => {
            let n = reader.len()?;
            let mut object = std::collections::BTreeMap::new();
            let mut last_key: Option<String> = None;
            for _ in 0..n {
                let key = reader.str()?.to_string();
                if let Some(last) = &last_key {
                    if *last >= key {
                        return Err(Error::UnsortedKeys);
                    }
                }
                let value = unpack_value(reader, depth + 1)?;
                last_key = Some(key.clone());
                object.insert(key, value);
            }
            Value::Object(object)
        }
        tag::RESOURCE => Value::Resource(Box::new(unpack_record_body(reader, depth)?)),
        tag::REF => {
            let digest = super::Digest::from_bytes(reader.take(32)?.try_into().unwrap());
            Value::Ref(Ref::from_digest(digest))
        }
        tag::TYPE_REF => Value::TypeRef(unpack_type_id(reader)?),
        other => return Err(Error::BadTag(other)),
    })
}
