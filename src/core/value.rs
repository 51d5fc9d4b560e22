use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single attribute stored in a record's bag.
///
/// `Int` is the native-width integer; `Int32` and `Int64` are the
/// fixed-width ones. They are kept apart because the coercion rules
/// below treat them differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bool(bool),
    Int32List(Vec<i32>),
    Int32Map(HashMap<i32, i32>),
    List(Vec<Value>),
    Json(serde_json::Value),
}

pub type AttributeBag = HashMap<String, Value>;

/// Which side of a numeric mutation a stored value is read for.
///
/// Accumulating reads (increase) only accept the exact stored variant,
/// deducting reads (decrease) also accept the neighbouring integer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Accumulate,
    Deduct,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Text(_) => "string",
            Self::Bool(_) => "bool",
            Self::Int32List(_) => "[]int32",
            Self::Int32Map(_) => "map[int32]int32",
            Self::List(_) => "list",
            Self::Json(_) => "json",
        }
    }

    // ========================================
    // Coercion table
    // ========================================

    pub fn as_int(&self, mode: Coercion) -> Option<i64> {
        match (self, mode) {
            (Self::Int(v), _) => Some(*v),
            (Self::Int64(v), Coercion::Deduct) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int32(&self, mode: Coercion) -> Option<i32> {
        match (self, mode) {
            (Self::Int32(v), _) => Some(*v),
            // Narrowing truncates like a plain integer cast.
            (Self::Int(v) | Self::Int64(v), Coercion::Deduct) => Some(*v as i32),
            _ => None,
        }
    }

    pub fn as_int64(&self, mode: Coercion) -> Option<i64> {
        match (self, mode) {
            (Self::Int64(v), _) => Some(*v),
            (Self::Int(v), Coercion::Deduct) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float64(&self, _mode: Coercion) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(*v),
            Self::Float32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_int32_list(&self) -> Option<&Vec<i32>> {
        match self {
            Self::Int32List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_int32_map(&self) -> Option<&HashMap<i32, i32>> {
        match self {
            Self::Int32Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int(_) | Self::Int32(_) | Self::Int64(_) | Self::Float32(_) | Self::Float64(_)
        )
    }
}

// ========================================
// Numeric slots used by increase / decrease
// ========================================

/// Checked arithmetic over the numeric types a slot can hold.
pub trait Arith: Copy + PartialOrd + fmt::Debug {
    const ZERO: Self;

    fn checked_plus(self, rhs: Self) -> Option<Self>;
    fn checked_minus(self, rhs: Self) -> Option<Self>;
}

impl Arith for i32 {
    const ZERO: Self = 0;

    fn checked_plus(self, rhs: Self) -> Option<Self> {
        self.checked_add(rhs)
    }

    fn checked_minus(self, rhs: Self) -> Option<Self> {
        self.checked_sub(rhs)
    }
}

impl Arith for i64 {
    const ZERO: Self = 0;

    fn checked_plus(self, rhs: Self) -> Option<Self> {
        self.checked_add(rhs)
    }

    fn checked_minus(self, rhs: Self) -> Option<Self> {
        self.checked_sub(rhs)
    }
}

impl Arith for f64 {
    const ZERO: Self = 0.0;

    fn checked_plus(self, rhs: Self) -> Option<Self> {
        Some(self + rhs)
    }

    fn checked_minus(self, rhs: Self) -> Option<Self> {
        Some(self - rhs)
    }
}

/// Binds a numeric operation to the variant it reads and writes.
pub struct NumericSlot<N: Arith> {
    pub name: &'static str,
    pub read: fn(&Value, Coercion) -> Option<N>,
    pub write: fn(N) -> Value,
}

impl<N: Arith> NumericSlot<N> {
    pub fn read(&self, value: &Value, mode: Coercion) -> Option<N> {
        (self.read)(value, mode)
    }

    pub fn write(&self, n: N) -> Value {
        (self.write)(n)
    }
}

pub const INT: NumericSlot<i64> = NumericSlot {
    name: "int",
    read: Value::as_int,
    write: Value::Int,
};

pub const INT32: NumericSlot<i32> = NumericSlot {
    name: "int32",
    read: Value::as_int32,
    write: Value::Int32,
};

pub const INT64: NumericSlot<i64> = NumericSlot {
    name: "int64",
    read: Value::as_int64,
    write: Value::Int64,
};

pub const FLOAT64: NumericSlot<f64> = NumericSlot {
    name: "float64",
    read: Value::as_float64,
    write: Value::Float64,
};

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) | Self::Int64(i) => write!(f, "{}", i),
            Self::Int32(i) => write!(f, "{}", i),
            Self::Float32(fl) => write!(f, "{}", fl),
            Self::Float64(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int32List(items) => write!(f, "{:?}", items),
            Self::Int32Map(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort();
                write!(f, "{{")?;
                for (i, (k, v)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Json(json) => write!(f, "{}", json),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<isize> for Value {
    fn from(i: isize) -> Self {
        Self::Int(i as i64)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Self::Float32(f)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float64(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<i32>> for Value {
    fn from(items: Vec<i32>) -> Self {
        Self::Int32List(items)
    }
}

impl From<HashMap<i32, i32>> for Value {
    fn from(map: HashMap<i32, i32>) -> Self {
        Self::Int32Map(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::Json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_reads_are_strict() {
        assert_eq!(INT.read(&Value::Int(5), Coercion::Accumulate), Some(5));
        assert_eq!(INT.read(&Value::Int64(5), Coercion::Accumulate), None);
        assert_eq!(INT32.read(&Value::Int(5), Coercion::Accumulate), None);
        assert_eq!(INT64.read(&Value::Int(5), Coercion::Accumulate), None);
    }

    #[test]
    fn test_decrease_reads_widen_and_narrow() {
        assert_eq!(INT.read(&Value::Int64(9), Coercion::Deduct), Some(9));
        assert_eq!(INT32.read(&Value::Int64(7), Coercion::Deduct), Some(7));
        assert_eq!(INT32.read(&Value::Int(7), Coercion::Deduct), Some(7));
        assert_eq!(INT64.read(&Value::Int(3), Coercion::Deduct), Some(3));
        assert_eq!(INT64.read(&Value::Int32(3), Coercion::Deduct), None);
    }

    #[test]
    fn test_float_reads_widen_float32() {
        assert_eq!(FLOAT64.read(&Value::Float32(1.5), Coercion::Accumulate), Some(1.5));
        assert_eq!(FLOAT64.read(&Value::Float64(2.25), Coercion::Deduct), Some(2.25));
        assert_eq!(FLOAT64.read(&Value::Int(2), Coercion::Deduct), None);
    }

    #[test]
    fn test_non_numeric_never_coerces() {
        let text = Value::from("100");
        assert!(INT.read(&text, Coercion::Deduct).is_none());
        assert!(INT32.read(&text, Coercion::Deduct).is_none());
        assert!(INT64.read(&text, Coercion::Deduct).is_none());
        assert!(FLOAT64.read(&text, Coercion::Deduct).is_none());
        assert!(!text.is_numeric());
    }

    #[test]
    fn test_checked_arith() {
        assert_eq!(i32::MAX.checked_plus(1), None);
        assert_eq!(5i64.checked_minus(7), Some(-2));
        assert_eq!(1.5f64.checked_plus(1.0), Some(2.5));
    }

    #[test]
    fn test_display_is_stable_for_maps() {
        let map: HashMap<i32, i32> = [(2, 20), (1, 10)].into_iter().collect();
        assert_eq!(Value::from(map).to_string(), "{1: 10, 2: 20}");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "[1, 2]");
    }
}
