//! Serializer pass that rejects floats JSON cannot represent.
//!
//! `serde_json` quietly turns NaN and infinities into `null`, which would
//! change a parameter's meaning between encode and decode. Walking the value
//! first lets the error name the offending field.

use crate::{FlowError, Result};
use serde::ser::{self, Serialize};
use std::fmt;

/// Fail with `FlowError::Encode` if `value` holds a NaN or infinite float.
pub(crate) fn check_finite<T: Serialize + ?Sized>(root: &str, value: &T) -> Result<()> {
    let mut walker = Walker {
        root: root.to_string(),
        path: Vec::new(),
    };
    value
        .serialize(&mut walker)
        .map_err(|NonFinite(msg)| FlowError::Encode(msg))
}

#[derive(Debug)]
struct NonFinite(String);

impl fmt::Display for NonFinite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NonFinite {}

impl ser::Error for NonFinite {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        NonFinite(msg.to_string())
    }
}

struct Walker {
    root: String,
    path: Vec<String>,
}

impl Walker {
    fn location(&self) -> String {
        let mut out = self.root.clone();
        for segment in &self.path {
            out.push_str(segment);
        }
        match out.strip_prefix('.') {
            Some(rest) => rest.to_string(),
            None if out.is_empty() => "value".to_string(),
            None => out,
        }
    }

    fn float(&self, v: f64) -> std::result::Result<(), NonFinite> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFinite(format!(
                "{} = {} is not representable in JSON",
                self.location(),
                v
            )))
        }
    }

    fn compound(&mut self, variant: Option<&str>) -> Compound<'_> {
        if let Some(name) = variant {
            self.path.push(format!(".{}", name));
        }
        Compound {
            walker: self,
            index: 0,
            key: None,
            pushed: variant.is_some(),
        }
    }
}

struct Compound<'a> {
    walker: &'a mut Walker,
    index: usize,
    key: Option<String>,
    pushed: bool,
}

impl Compound<'_> {
    fn nested<T: Serialize + ?Sized>(
        &mut self,
        segment: String,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        self.walker.path.push(segment);
        let result = value.serialize(&mut *self.walker);
        self.walker.path.pop();
        result
    }

    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), NonFinite> {
        let segment = format!("[{}]", self.index);
        self.index += 1;
        self.nested(segment, value)
    }

    fn finish(self) -> std::result::Result<(), NonFinite> {
        if self.pushed {
            self.walker.path.pop();
        }
        Ok(())
    }
}

impl<'a> ser::Serializer for &'a mut Walker {
    type Ok = ();
    type Error = NonFinite;
    type SerializeSeq = Compound<'a>;
    type SerializeTuple = Compound<'a>;
    type SerializeTupleStruct = Compound<'a>;
    type SerializeTupleVariant = Compound<'a>;
    type SerializeMap = Compound<'a>;
    type SerializeStruct = Compound<'a>;
    type SerializeStructVariant = Compound<'a>;

    fn serialize_bool(self, _v: bool) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<(), NonFinite> {
        self.float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<(), NonFinite> {
        self.float(v)
    }

    fn serialize_char(self, _v: char) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_none(self) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> std::result::Result<(), NonFinite> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> std::result::Result<(), NonFinite> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        self.path.push(format!(".{}", variant));
        let result = value.serialize(&mut *self);
        self.path.pop();
        result
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<Compound<'a>, NonFinite> {
        Ok(self.compound(None))
    }

    fn serialize_tuple(self, _len: usize) -> std::result::Result<Compound<'a>, NonFinite> {
        Ok(self.compound(None))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Compound<'a>, NonFinite> {
        Ok(self.compound(None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Compound<'a>, NonFinite> {
        Ok(self.compound(Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<Compound<'a>, NonFinite> {
        Ok(self.compound(None))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Compound<'a>, NonFinite> {
        Ok(self.compound(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Compound<'a>, NonFinite> {
        Ok(self.compound(Some(variant)))
    }
}

impl ser::SerializeSeq for Compound<'_> {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), NonFinite> {
        self.element(value)
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        self.finish()
    }
}

impl ser::SerializeTuple for Compound<'_> {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), NonFinite> {
        self.element(value)
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for Compound<'_> {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), NonFinite> {
        self.element(value)
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for Compound<'_> {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), NonFinite> {
        self.element(value)
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        self.finish()
    }
}

impl ser::SerializeMap for Compound<'_> {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> std::result::Result<(), NonFinite> {
        // Keys are labels only; a key JSON rejects fails later in serde_json.
        let label = match serde_json::to_value(key) {
            Ok(serde_json::Value::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(_) => "?".to_string(),
        };
        self.key = Some(label);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> std::result::Result<(), NonFinite> {
        let label = self.key.take().unwrap_or_else(|| "?".to_string());
        self.nested(format!(".{}", label), value)
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        self.finish()
    }
}

impl ser::SerializeStruct for Compound<'_> {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        self.nested(format!(".{}", key), value)
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for Compound<'_> {
    type Ok = ();
    type Error = NonFinite;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> std::result::Result<(), NonFinite> {
        self.nested(format!(".{}", key), value)
    }

    fn end(self) -> std::result::Result<(), NonFinite> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Inner {
        speeds: Vec<f64>,
    }

    #[derive(Serialize)]
    struct Outer {
        name: &'static str,
        inner: Inner,
        extra: BTreeMap<String, serde_json::Value>,
    }

    fn message(err: FlowError) -> String {
        match err {
            FlowError::Encode(m) => m,
            other => panic!("expected encode error, got {other:?}"),
        }
    }

    #[test]
    fn test_finite_values_pass() {
        let value = Outer {
            name: "ring",
            inner: Inner {
                speeds: vec![0.0, 30.0, -4.5],
            },
            extra: BTreeMap::from([("lanes".to_string(), json!(1))]),
        };
        assert!(check_finite("", &value).is_ok());
        assert!(check_finite("x", &f32::MAX).is_ok());
    }

    #[test]
    fn test_nested_nan_is_located() {
        let value = Outer {
            name: "ring",
            inner: Inner {
                speeds: vec![1.0, f64::NAN],
            },
            extra: BTreeMap::new(),
        };
        let msg = message(check_finite("", &value).unwrap_err());
        assert_eq!(msg, "inner.speeds[1] = NaN is not representable in JSON");
    }

    #[test]
    fn test_infinity_in_map_uses_root() {
        let map = BTreeMap::from([("max_decel".to_string(), f64::NEG_INFINITY)]);
        let msg = message(check_finite("env", &map).unwrap_err());
        assert!(msg.starts_with("env.max_decel = -inf"));
    }

    #[test]
    fn test_bare_float_is_named_value() {
        let msg = message(check_finite("", &f64::INFINITY).unwrap_err());
        assert!(msg.starts_with("value = inf"));
        assert!(check_finite("", &Some(f64::NAN)).is_err());
        assert!(check_finite("", &None::<f64>).is_ok());
    }
}
