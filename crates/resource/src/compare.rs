use super::value::{canon_float, canon_int, Int};
use super::Value;
use itertools::{EitherOrBoth, Itertools};
use std::cmp::Ordering;

/// compare evaluates the deep ordering of |lhs| and |rhs|.
/// This function establishes an arbitrary ordering over Values in order
/// to provide a total ordering. Arrays and objects are compared
/// lexicographically, and object keys in their natural (bytewise
/// ascending) order. Integer and float kinds do not compare numerically
/// with one another: they pack under different tags, and equality here
/// must coincide exactly with digest equality.
pub fn compare(lhs: &Value, rhs: &Value) -> Ordering {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(lhs), Value::Bool(rhs)) => lhs.cmp(rhs),
        (Value::PosInt(_) | Value::NegInt(_), Value::PosInt(_) | Value::NegInt(_)) => {
            match (canon_int(lhs).unwrap(), canon_int(rhs).unwrap()) {
                (Int::Neg(l), Int::Neg(r)) => l.cmp(&r),
                (Int::Pos(l), Int::Pos(r)) => l.cmp(&r),
                (Int::Neg(_), Int::Pos(_)) => Ordering::Less,
                (Int::Pos(_), Int::Neg(_)) => Ordering::Greater,
            }
        }
        (Value::Float(lhs), Value::Float(rhs)) => {
            canon_float(*lhs).total_cmp(&canon_float(*rhs))
        }
        (Value::String(lhs), Value::String(rhs)) => lhs.cmp(rhs),
        (Value::Bytes(lhs), Value::Bytes(rhs)) => lhs.cmp(rhs),
        (Value::Array(lhs), Value::Array(rhs)) => lhs
            .iter()
            .zip_longest(rhs)
            .map(|eob| match eob {
                EitherOrBoth::Both(lhs, rhs) => compare(lhs, rhs),
                EitherOrBoth::Right(_) => Ordering::Less,
                EitherOrBoth::Left(_) => Ordering::Greater,
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal),
        (Value::Object(lhs), Value::Object(rhs)) => lhs
            .iter()
            .zip_longest(rhs.iter())
            .map(|eob| match eob {
                EitherOrBoth::Both((l_key, l_value), (r_key, r_value)) => {
                    let key_ord = l_key.cmp(r_key);
                    match key_ord {
                        Ordering::Equal => compare(l_value, r_value),
                        _ => key_ord,
                    }
                }
                EitherOrBoth::Right(_) => Ordering::Less,
                EitherOrBoth::Left(_) => Ordering::Greater,
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal),
        (Value::Resource(lhs), Value::Resource(rhs)) => {
            let type_ord = lhs.type_id().cmp(rhs.type_id());
            if type_ord != Ordering::Equal {
                return type_ord;
            }
            lhs.fields()
                .iter()
                .zip_longest(rhs.fields())
                .map(|eob| match eob {
                    EitherOrBoth::Both((l_name, l_value), (r_name, r_value)) => {
                        let name_ord = l_name.cmp(r_name);
                        match name_ord {
                            Ordering::Equal => compare(l_value, r_value),
                            _ => name_ord,
                        }
                    }
                    EitherOrBoth::Right(_) => Ordering::Less,
                    EitherOrBoth::Left(_) => Ordering::Greater,
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }
        (Value::TypeRef(lhs), Value::TypeRef(rhs)) => lhs.cmp(rhs),
        (Value::Ref(lhs), Value::Ref(rhs)) => lhs.digest().cmp(rhs.digest()),

        // Kinds are not equal. Define an (arbitrary) total ordering.
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(_), _) => Ordering::Less,
        (_, Value::Bool(_)) => Ordering::Greater,
        (Value::PosInt(_) | Value::NegInt(_), _) => Ordering::Less,
        (_, Value::PosInt(_) | Value::NegInt(_)) => Ordering::Greater,
        (Value::Float(_), _) => Ordering::Less,
        (_, Value::Float(_)) => Ordering::Greater,
        (Value::String(_), _) => Ordering::Less,
        (_, Value::String(_)) => Ordering::Greater,
        (Value::Bytes(_), _) => Ordering::Less,
        (_, Value::Bytes(_)) => Ordering::Greater,
        (Value::Array(_), _) => Ordering::Less,
        (_, Value::Array(_)) => Ordering::Greater,
        (Value::Object(_), _) => Ordering::Less,
        (_, Value::Object(_)) => Ordering::Greater,
        (Value::Resource(_), _) => Ordering::Less,
        (_, Value::Resource(_)) => Ordering::Greater,
        (Value::TypeRef(_), _) => Ordering::Less,
        (_, Value::TypeRef(_)) => Ordering::Greater,
    }
}
