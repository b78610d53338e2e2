//! The mixed value type stored in dictionary leaves.
//!
//! `Value` is a tagged union over every scalar type the store supports plus
//! the two link forms. A single total order is defined across all variants
//! so that sorting and min/max over heterogeneous columns is deterministic:
//!
//! ```text
//! null < bool < numeric (promoted) < string < binary < timestamp
//!      < object-id < uuid < link
//! ```
//!
//! Numerics compare cross-type by promotion; the i64/f64 case preserves
//! precision at the 2^63 boundary. NaN orders below every other numeric and
//! equal to itself. Untyped links order before typed links.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::keys::{ObjKey, ObjLink};
use crate::DataType;

/// A 12-byte object identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Create an object id from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A decimal number as a normalized (mantissa, exponent) pair.
///
/// The value is `mantissa * 10^exponent`, with trailing zeros stripped from
/// the mantissa so equal values have equal representations. This is an
/// ordering/aggregation carrier, not a general arithmetic type.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Decimal {
    mantissa: i64,
    exponent: i8,
}

impl Decimal {
    /// Create a decimal, normalizing the mantissa.
    pub fn new(mantissa: i64, exponent: i8) -> Self {
        let mut mantissa = mantissa;
        let mut exponent = exponent;
        if mantissa == 0 {
            exponent = 0;
        } else {
            while mantissa % 10 == 0 && exponent < i8::MAX {
                mantissa /= 10;
                exponent += 1;
            }
        }
        Self { mantissa, exponent }
    }

    /// The normalized mantissa.
    pub const fn mantissa(self) -> i64 {
        self.mantissa
    }

    /// The normalized exponent.
    pub const fn exponent(self) -> i8 {
        self.exponent
    }

    /// Approximate as f64, for cross-type numeric comparison.
    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 * 10f64.powi(i32::from(self.exponent))
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        // Align exponents in i128 space; fall back to f64 when the scale
        // difference exceeds what i128 can hold.
        let (lo, hi) = if self.exponent <= other.exponent {
            (self, other)
        } else {
            (other, self)
        };
        let shift = (i16::from(hi.exponent) - i16::from(lo.exponent)) as u32;
        if let Some(factor) = 10i128.checked_pow(shift) {
            if let Some(scaled) = i128::from(hi.mantissa).checked_mul(factor) {
                let cmp = i128::from(lo.mantissa).cmp(&scaled);
                return if std::ptr::eq(lo, self) { cmp } else { cmp.reverse() };
            }
        }
        self.to_f64()
            .partial_cmp(&other.to_f64())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Binary blob.
    Binary(Vec<u8>),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// Decimal number.
    Decimal(Decimal),
    /// 12-byte object id.
    ObjectId(ObjectId),
    /// UUID.
    Uuid(Uuid),
    /// Untyped link: object key only. Only meaningful for `Link` columns,
    /// where the target table is implied by the column.
    Link(ObjKey),
    /// Typed link: table plus object key.
    TypedLink(ObjLink),
}

impl Value {
    /// Returns true if this is null.
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The runtime data type, or `None` for null.
    pub const fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(DataType::Bool),
            Self::Int(_) => Some(DataType::Int),
            Self::Float(_) => Some(DataType::Float),
            Self::Double(_) => Some(DataType::Double),
            Self::String(_) => Some(DataType::String),
            Self::Binary(_) => Some(DataType::Binary),
            Self::Timestamp(_) => Some(DataType::Timestamp),
            Self::Decimal(_) => Some(DataType::Decimal),
            Self::ObjectId(_) => Some(DataType::ObjectId),
            Self::Uuid(_) => Some(DataType::Uuid),
            Self::Link(_) | Self::TypedLink(_) => Some(DataType::Link),
        }
    }

    /// The type name used in error messages ("Null" for null).
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::TypedLink(_) => "TypedLink",
            Self::Link(_) => "Link",
            other => match other.data_type() {
                Some(t) => t.name(),
                None => "Null",
            },
        }
    }

    /// Try to extract an integer.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to extract a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract an untyped link.
    pub const fn as_link(&self) -> Option<ObjKey> {
        match self {
            Self::Link(k) => Some(*k),
            _ => None,
        }
    }

    /// Try to extract a typed link.
    pub const fn as_typed_link(&self) -> Option<ObjLink> {
        match self {
            Self::TypedLink(l) => Some(*l),
            _ => None,
        }
    }

    /// Whether this value participates in numeric aggregation.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int(_) | Self::Float(_) | Self::Double(_) | Self::Decimal(_)
        )
    }

    /// The cross-type sort class. Lower classes order first.
    const fn sort_class(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) | Self::Double(_) | Self::Decimal(_) => 2,
            Self::String(_) => 3,
            Self::Binary(_) => 4,
            Self::Timestamp(_) => 5,
            Self::ObjectId(_) => 6,
            Self::Uuid(_) => 7,
            Self::Link(_) | Self::TypedLink(_) => 8,
        }
    }
}

/// Numeric representation used for cross-type comparison.
enum Numeric {
    Int(i64),
    F64(f64),
}

impl Value {
    fn as_numeric(&self) -> Option<Numeric> {
        match self {
            Self::Int(i) => Some(Numeric::Int(*i)),
            Self::Float(f) => Some(Numeric::F64(f64::from(*f))),
            Self::Double(d) => Some(Numeric::F64(*d)),
            Self::Decimal(d) => Some(Numeric::F64(d.to_f64())),
            _ => None,
        }
    }
}

/// Compare an integer with a float, preserving precision for |i| > 2^53.
///
/// The naive `(i as f64).partial_cmp(&r)` rounds the integer first and gets
/// the 2^63 boundary wrong. Compare integer parts first; use the float
/// comparison only to break ties.
fn int_float_cmp(i: i64, r: f64) -> Ordering {
    if r.is_nan() {
        // NaN sorts below all other numerics.
        return Ordering::Greater;
    }
    if r < -9_223_372_036_854_775_808.0 {
        return Ordering::Greater;
    }
    if r >= 9_223_372_036_854_775_808.0 {
        return Ordering::Less;
    }
    #[allow(clippy::cast_possible_truncation)]
    let y = r as i64;
    match i.cmp(&y) {
        Ordering::Equal => {
            #[allow(clippy::cast_precision_loss)]
            let s = i as f64;
            s.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        other => other,
    }
}

/// Total f64 comparison: NaN below everything else, NaN equal to NaN.
fn f64_total_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn numeric_cmp(a: &Value, b: &Value) -> Ordering {
    // Decimal vs Decimal compares exactly; every other pair goes through
    // the promoted representation.
    if let (Value::Decimal(x), Value::Decimal(y)) = (a, b) {
        return x.cmp(y);
    }
    match (a.as_numeric(), b.as_numeric()) {
        (Some(Numeric::Int(x)), Some(Numeric::Int(y))) => x.cmp(&y),
        (Some(Numeric::Int(x)), Some(Numeric::F64(y))) => {
            if y.is_nan() {
                Ordering::Greater
            } else {
                int_float_cmp(x, y)
            }
        }
        (Some(Numeric::F64(x)), Some(Numeric::Int(y))) => {
            if x.is_nan() {
                Ordering::Less
            } else {
                int_float_cmp(y, x).reverse()
            }
        }
        (Some(Numeric::F64(x)), Some(Numeric::F64(y))) => f64_total_cmp(x, y),
        _ => Ordering::Equal,
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let class_a = self.sort_class();
        let class_b = other.sort_class();
        if class_a != class_b {
            return class_a.cmp(&class_b);
        }

        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::ObjectId(a), Self::ObjectId(b)) => a.cmp(b),
            (Self::Uuid(a), Self::Uuid(b)) => a.cmp(b),
            // Untyped links order before typed links.
            (Self::Link(a), Self::Link(b)) => a.cmp(b),
            (Self::Link(_), Self::TypedLink(_)) => Ordering::Less,
            (Self::TypedLink(_), Self::Link(_)) => Ordering::Greater,
            (Self::TypedLink(a), Self::TypedLink(b)) => a.cmp(b),
            _ => numeric_cmp(self, other),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Binary(b) => {
                f.write_str("0x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Timestamp(t) => write!(f, "{t}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::ObjectId(o) => write!(f, "{o}"),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Link(k) => write!(f, "{k}"),
            Self::TypedLink(l) => write!(f, "{l}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<ObjKey> for Value {
    fn from(k: ObjKey) -> Self {
        Self::Link(k)
    }
}

impl From<ObjLink> for Value {
    fn from(l: ObjLink) -> Self {
        Self::TypedLink(l)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::keys::TableKey;

    #[test]
    fn null_properties() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Null.data_type(), None);
        assert_eq!(Value::Null.type_name(), "Null");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn sort_class_order() {
        let samples = [
            Value::Null,
            Value::Bool(true),
            Value::Int(i64::MAX),
            Value::String("".into()),
            Value::Binary(vec![]),
            Value::Timestamp(DateTime::<Utc>::MIN_UTC),
            Value::ObjectId(ObjectId::from_bytes([0; 12])),
            Value::Uuid(Uuid::nil()),
            Value::Link(ObjKey::new(0)),
        ];
        for pair in samples.windows(2) {
            assert!(pair[0] < pair[1], "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn numeric_cross_type_equality() {
        assert_eq!(Value::Int(3), Value::Double(3.0));
        assert_eq!(Value::Float(2.5), Value::Double(2.5));
        assert_eq!(Value::Int(15), Value::Double(15.0));
        assert!(Value::Int(3) < Value::Double(3.5));
        assert!(Value::Double(3.5) > Value::Int(3));
    }

    #[test]
    fn int_float_precision_at_boundary() {
        // i64::MAX rounds UP to 2^63 as f64; the comparison must still
        // report Less.
        let imax = Value::Int(i64::MAX);
        let fboundary = Value::Double(9_223_372_036_854_775_808.0);
        assert!(imax < fboundary);
        assert!(fboundary > imax);
    }

    #[test]
    fn nan_orders_below_numerics() {
        let nan = Value::Double(f64::NAN);
        assert!(nan < Value::Int(i64::MIN));
        assert!(nan < Value::Double(f64::NEG_INFINITY));
        assert_eq!(nan, Value::Double(f64::NAN));
        // Still above every bool.
        assert!(nan > Value::Bool(true));
    }

    #[test]
    fn decimal_normalization_and_order() {
        assert_eq!(Decimal::new(1500, -2), Decimal::new(15, 0));
        assert_eq!(Decimal::new(0, 5), Decimal::new(0, 0));
        assert!(Decimal::new(15, -1) < Decimal::new(2, 0));
        assert!(Decimal::new(-3, 0) < Decimal::new(25, -1));

        // Cross-type against ints and doubles via promotion.
        assert_eq!(Value::Decimal(Decimal::new(25, -1)), Value::Double(2.5));
        assert!(Value::Decimal(Decimal::new(3, 0)) > Value::Int(2));
    }

    #[test]
    fn string_and_binary_bytewise() {
        assert!(Value::from("abc") < Value::from("abd"));
        assert_eq!(Value::from("x"), Value::from("x"));
        assert!(Value::Binary(vec![1, 2]) < Value::Binary(vec![1, 3]));
        // Different classes are never equal.
        assert_ne!(Value::from("ab"), Value::Binary(b"ab".to_vec()));
    }

    #[test]
    fn link_ordering() {
        let t1 = TableKey::new(1);
        let t2 = TableKey::new(2);
        let untyped = Value::Link(ObjKey::new(9));
        let typed_a = Value::TypedLink(ObjLink::new(t1, ObjKey::new(1)));
        let typed_b = Value::TypedLink(ObjLink::new(t2, ObjKey::new(0)));

        assert!(untyped < typed_a);
        assert!(typed_a < typed_b);
        assert_eq!(
            Value::TypedLink(ObjLink::new(t1, ObjKey::new(1))),
            typed_a.clone()
        );
        assert_ne!(typed_a, typed_b);
    }

    #[test]
    fn from_conversions() {
        assert_eq!(Value::from(42i64).as_int(), Some(42));
        assert_eq!(Value::from(42i32).as_int(), Some(42));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from(ObjKey::new(3)).as_link(), Some(ObjKey::new(3)));
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some(7i64)), Value::Int(7));

        let link = ObjLink::new(TableKey::new(1), ObjKey::new(2));
        assert_eq!(Value::from(link).as_typed_link(), Some(link));
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Int(1).type_name(), "Int");
        assert_eq!(Value::Link(ObjKey::new(1)).type_name(), "Link");
        assert_eq!(
            Value::TypedLink(ObjLink::new(TableKey::new(1), ObjKey::new(1))).type_name(),
            "TypedLink"
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Int(-4).to_string(), "-4");
        assert_eq!(Value::from("a").to_string(), "\"a\"");
        assert_eq!(Value::Binary(vec![0xca, 0xfe]).to_string(), "0xcafe");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }
}
