//! The tagged run-time value every operator, expression and record slot
//! passes around, plus the per-type handler table (compare/arithmetic/cast)
//! that replaces the source's per-type singleton classes.

use crate::rc::{Result, RC};
use crate::util::to_hex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::rc::Rc;

/// Tag set for [`Value`]/column storage. `Undefined` means "not yet set";
/// `Nulls` means the cell holds SQL NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    Undefined,
    Chars,
    Ints,
    Floats,
    Booleans,
    Dates,
    Vectors,
    Nulls,
    Texts,
}

/// A location a [`Value`] was read from, carried so updatable-view tuples
/// can route writes back to the owning base record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Provenance {
    pub page_no: u64,
    pub slot_no: u32,
}

/// Out-of-line text payload: a pointer into the table's `.text` file plus,
/// once loaded, the materialized bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub offset: u64,
    pub len: u64,
    pub data: Option<Rc<String>>,
}

/// Out-of-line vector payload: a pointer into the table's `.vec` file plus,
/// once loaded, the materialized components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorData {
    pub offset: u64,
    pub dim: u32,
    pub data: Option<Rc<Vec<f32>>>,
}

/// Tagged run-time value. NULL comparisons always yield UNKNOWN; callers
/// see this as `compare` returning `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Undefined,
    Null,
    Chars(Rc<String>),
    Int(i32),
    Float(f32),
    Bool(bool),
    /// Decimal YYYYMMDD.
    Date(i32),
    Vector(VectorData),
    Text(TextData),
}

const EPSILON: f64 = 1e-5;

impl Value {
    /// Tag of this value.
    pub fn attr_type(&self) -> AttrType {
        match self {
            Value::Undefined => AttrType::Undefined,
            Value::Null => AttrType::Nulls,
            Value::Chars(_) => AttrType::Chars,
            Value::Int(_) => AttrType::Ints,
            Value::Float(_) => AttrType::Floats,
            Value::Bool(_) => AttrType::Booleans,
            Value::Date(_) => AttrType::Dates,
            Value::Vector(_) => AttrType::Vectors,
            Value::Text(_) => AttrType::Texts,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render for display / round-trip with `set_value_from_str`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => String::new(),
            Value::Null => "NULL".to_string(),
            Value::Chars(s) => s.as_str().to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{}", f),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Date(d) => format_date(*d),
            Value::Vector(v) => format_vector(v.data.as_deref().map(|v| v.as_slice()).unwrap_or(&[])),
            Value::Text(t) => t.data.as_deref().cloned().unwrap_or_default(),
        }
    }

    /// Best-effort BINARY rendering, used when a caller explicitly wants
    /// hex rather than the type's natural display form.
    pub fn to_hex_string(&self, bytes: &[u8]) -> String {
        let _ = self;
        to_hex(bytes)
    }

    /// Parse text into a value of the requested type ( `set_value_from_str` ).
    pub fn from_str(target: AttrType, s: &str) -> Result<Value> {
        match target {
            AttrType::Ints => s.trim().parse::<i32>().map(Value::Int).map_err(|_| RC::InvalidArgument),
            AttrType::Floats => s.trim().parse::<f32>().map(Value::Float).map_err(|_| RC::InvalidArgument),
            AttrType::Dates => parse_date(s).map(Value::Date),
            AttrType::Chars | AttrType::Texts => Ok(Value::Chars(Rc::new(s.to_string()))),
            AttrType::Booleans => match s.trim().to_ascii_uppercase().as_str() {
                "TRUE" | "1" => Ok(Value::Bool(true)),
                "FALSE" | "0" => Ok(Value::Bool(false)),
                _ => Err(RC::InvalidArgument),
            },
            AttrType::Vectors => parse_vector(s).map(|v| Value::Vector(VectorData {
                offset: 0,
                dim: v.len() as u32,
                data: Some(Rc::new(v)),
            })),
            AttrType::Undefined | AttrType::Nulls => Ok(Value::Null),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f as f64),
            Value::Date(d) => Some(*d as f64),
            Value::Chars(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Value::Vector(v) => v.data.as_deref().map(|v| v.as_slice()),
            _ => None,
        }
    }

    /// Compare two values. `None` means UNKNOWN (either side NULL, or
    /// types are not comparable).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        if let (Some(a), Some(b)) = (self.as_vector(), other.as_vector()) {
            return Some(compare_vectors(a, b));
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Chars(a), Value::Chars(b)) => Some(a.as_str().cmp(b.as_str())),
            _ => {
                let (a, b) = (self.as_f64()?, other.as_f64()?);
                a.partial_cmp(&b)
            }
        }
    }

    /// Elementwise/numeric addition.
    pub fn add(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if let (Some(a), Some(b)) = (self.as_vector(), other.as_vector()) {
            return elementwise(a, b, |x, y| x + y).map(vector_value);
        }
        if let (Value::Int(a), Value::Int(b)) = (self, other) {
            return Ok(Value::Int(a.wrapping_add(*b)));
        }
        let (a, b) = (self.as_f64().ok_or(RC::ValueTypeMismatch)?, other.as_f64().ok_or(RC::ValueTypeMismatch)?);
        Ok(Value::Float((a + b) as f32))
    }

    /// Elementwise/numeric subtraction.
    pub fn sub(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if let (Some(a), Some(b)) = (self.as_vector(), other.as_vector()) {
            return elementwise(a, b, |x, y| x - y).map(vector_value);
        }
        if let (Value::Int(a), Value::Int(b)) = (self, other) {
            return Ok(Value::Int(a.wrapping_sub(*b)));
        }
        let (a, b) = (self.as_f64().ok_or(RC::ValueTypeMismatch)?, other.as_f64().ok_or(RC::ValueTypeMismatch)?);
        Ok(Value::Float((a - b) as f32))
    }

    /// Elementwise/numeric multiplication.
    pub fn mul(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if let (Some(a), Some(b)) = (self.as_vector(), other.as_vector()) {
            return elementwise(a, b, |x, y| x * y).map(vector_value);
        }
        if let (Value::Int(a), Value::Int(b)) = (self, other) {
            return Ok(Value::Int(a.wrapping_mul(*b)));
        }
        let (a, b) = (self.as_f64().ok_or(RC::ValueTypeMismatch)?, other.as_f64().ok_or(RC::ValueTypeMismatch)?);
        Ok(Value::Float((a * b) as f32))
    }

    /// Division always yields FLOAT (or NULL for division by ~0).
    pub fn div(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        let (a, b) = (self.as_f64().ok_or(RC::ValueTypeMismatch)?, other.as_f64().ok_or(RC::ValueTypeMismatch)?);
        if b.abs() < EPSILON {
            return Ok(Value::Null);
        }
        Ok(Value::Float((a / b) as f32))
    }

    /// Unary negation, type-preserving.
    pub fn negative(&self) -> Result<Value> {
        match self {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Vector(v) => {
                let data = v.data.as_deref().ok_or(RC::InvalidArgument)?;
                let negated: Vec<f32> = data.iter().map(|x| -x).collect();
                Ok(vector_value(negated))
            }
            _ => Err(RC::ValueTypeMismatch),
        }
    }

    /// Cost of casting this value's type to `target`; `i32::MAX` means refused.
    pub fn cast_cost(from: AttrType, target: AttrType) -> i32 {
        if from == target {
            return 0;
        }
        match (from, target) {
            (AttrType::Chars, AttrType::Texts) => 0,
            (AttrType::Texts, AttrType::Chars) => 0,
            (AttrType::Ints, AttrType::Floats) | (AttrType::Floats, AttrType::Ints) => 1,
            (AttrType::Chars, AttrType::Ints) | (AttrType::Chars, AttrType::Floats) => 1,
            _ => i32::MAX,
        }
    }

    /// Cast this value to `target`, applying the coercion rules in §4.1.
    pub fn cast_to(&self, target: AttrType) -> Result<Value> {
        if self.attr_type() == target {
            return Ok(self.clone());
        }
        if self.is_null() {
            return Ok(Value::Null);
        }
        if Self::cast_cost(self.attr_type(), target) == i32::MAX {
            return Err(RC::InvalidArgument);
        }
        match target {
            AttrType::Floats => Ok(Value::Float(self.as_f64().ok_or(RC::ValueTypeMismatch)? as f32)),
            AttrType::Ints => {
                let f = self.as_f64().ok_or(RC::ValueTypeMismatch)?;
                Ok(Value::Int(round_half_away_from_zero(f)))
            }
            AttrType::Chars | AttrType::Texts => Ok(Value::Chars(Rc::new(self.to_display_string()))),
            _ => Err(RC::ValueTypeMismatch),
        }
    }
}

fn round_half_away_from_zero(f: f64) -> i32 {
    let r = if f >= 0.0 { (f + 0.5).floor() } else { (f - 0.5).ceil() };
    r as i32
}

fn elementwise<F: Fn(f32, f32) -> f32>(a: &[f32], b: &[f32], f: F) -> Result<Vec<f32>> {
    if a.len() != b.len() {
        return Err(RC::InvalidArgument);
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| f(*x, *y)).collect())
}

fn vector_value(v: Vec<f32>) -> Value {
    Value::Vector(VectorData { offset: 0, dim: v.len() as u32, data: Some(Rc::new(v)) })
}

/// Lexicographic comparison, shorter prefix sorts first.
fn compare_vectors(a: &[f32], b: &[f32]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.partial_cmp(y) {
            Some(Ordering::Equal) | None => continue,
            Some(o) => return o,
        }
    }
    a.len().cmp(&b.len())
}

/// Distance function kinds for vector indexes and `VectorDistance` exprs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceType {
    L2,
    Cosine,
    InnerProduct,
}

/// Compute the distance between two equal-length vectors.
pub fn vector_distance(kind: DistanceType, a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RC::InvalidArgument);
    }
    Ok(match kind {
        DistanceType::L2 => a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt(),
        DistanceType::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        DistanceType::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na == 0.0 || nb == 0.0 {
                1.0
            } else {
                1.0 - dot / (na * nb)
            }
        }
    })
}

fn parse_vector(s: &str) -> Result<Vec<f32>> {
    let s = s.trim();
    let inner = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')).ok_or(RC::InvalidArgument)?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|_| RC::InvalidArgument))
        .collect()
}

fn format_vector(v: &[f32]) -> String {
    let parts: Vec<String> = v.iter().map(|f| f.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Validate and parse a `YYYYMMDD` decimal date.
pub fn parse_date(s: &str) -> Result<i32> {
    let s = s.trim();
    let (y, m, d) = if let Some((y, rest)) = s.split_once('-') {
        let (m, d) = rest.split_once('-').ok_or(RC::InvalidArgument)?;
        (y, m, d)
    } else if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        (&s[0..4], &s[4..6], &s[6..8])
    } else {
        return Err(RC::InvalidArgument);
    };
    let y: i32 = y.parse().map_err(|_| RC::InvalidArgument)?;
    let m: u32 = m.parse().map_err(|_| RC::InvalidArgument)?;
    let d: u32 = d.parse().map_err(|_| RC::InvalidArgument)?;
    if !(1900..=2100).contains(&y) || !(1..=12).contains(&m) {
        return Err(RC::InvalidArgument);
    }
    let dim = days_in_month(y, m);
    if !(1..=dim).contains(&d) {
        return Err(RC::InvalidArgument);
    }
    Ok(y * 10000 + m as i32 * 100 + d as i32)
}

fn is_leap_year(y: i32) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

fn days_in_month(y: i32, m: u32) -> u32 {
    match m {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => if is_leap_year(y) { 29 } else { 28 },
        _ => 0,
    }
}

fn format_date(d: i32) -> String {
    let y = d / 10000;
    let m = (d / 100) % 100;
    let day = d % 100;
    format!("{:04}-{:02}-{:02}", y, m, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_roundtrip() {
        let v = Value::Date(parse_date("2024-02-29").unwrap());
        assert_eq!(v.to_display_string(), "2024-02-29");
        assert!(parse_date("2023-02-29").is_err());
    }

    #[test]
    fn divide_by_near_zero_is_null() {
        let a = Value::Int(4);
        let b = Value::Float(0.0000001);
        assert_eq!(a.div(&b).unwrap(), Value::Null);
    }

    #[test]
    fn vector_distance_l2() {
        let d = vector_distance(DistanceType::L2, &[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert_eq!(d, 5.0);
    }

    #[test]
    fn null_comparison_is_unknown() {
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
    }

    #[test]
    fn cast_float_to_int_rounds_half_away_from_zero() {
        assert_eq!(Value::Float(2.5).cast_to(AttrType::Ints).unwrap(), Value::Int(3));
        assert_eq!(Value::Float(-2.5).cast_to(AttrType::Ints).unwrap(), Value::Int(-3));
    }
}
