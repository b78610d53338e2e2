//! Aggregate accumulators for collection scans.
//!
//! One `accumulate(value) -> bool` capability, specialized over the numeric
//! domain of the declared column type. The scan loop records the position
//! of the value whenever `accumulate` reports that it was taken, so min/max
//! can report where the extremum first occurred.

use crate::value::Value;
use crate::DataType;

/// A scan accumulator. `accumulate` returns whether the value was taken
/// (became the new extremum, or was counted into the running total).
pub trait Accumulator {
    fn accumulate(&mut self, value: &Value) -> bool;
}

/// The numeric domain a sum/average runs in, selected by the declared
/// column type. Anything non-numeric (including `Mixed`) uses `Mixed`,
/// which accepts every numeric variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Int,
    Float,
    Double,
    Mixed,
}

impl NumericKind {
    /// Select the accumulator domain for a declared column type.
    pub const fn for_column(data_type: DataType) -> Self {
        match data_type {
            DataType::Int => Self::Int,
            DataType::Float => Self::Float,
            DataType::Double => Self::Double,
            _ => Self::Mixed,
        }
    }

    /// Whether a value belongs to this domain.
    fn admits(self, value: &Value) -> bool {
        match self {
            Self::Int => matches!(value, Value::Int(_)),
            Self::Float => matches!(value, Value::Float(_)),
            Self::Double => matches!(value, Value::Double(_)),
            Self::Mixed => value.is_numeric(),
        }
    }
}

/// Minimum over all non-null values, using the cross-type total order.
/// Ties are not retaken, so the scan keeps the first position.
#[derive(Debug, Default)]
pub struct Minimum {
    best: Option<Value>,
}

impl Minimum {
    pub fn new() -> Self {
        Self::default()
    }

    /// The extremum, if any non-null value was seen.
    pub fn into_result(self) -> Option<Value> {
        self.best
    }
}

impl Accumulator for Minimum {
    fn accumulate(&mut self, value: &Value) -> bool {
        if value.is_null() {
            return false;
        }
        match &self.best {
            Some(best) if value >= best => false,
            _ => {
                self.best = Some(value.clone());
                true
            }
        }
    }
}

/// Maximum over all non-null values. See [`Minimum`].
#[derive(Debug, Default)]
pub struct Maximum {
    best: Option<Value>,
}

impl Maximum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_result(self) -> Option<Value> {
        self.best
    }
}

impl Accumulator for Maximum {
    fn accumulate(&mut self, value: &Value) -> bool {
        if value.is_null() {
            return false;
        }
        match &self.best {
            Some(best) if value <= best => false,
            _ => {
                self.best = Some(value.clone());
                true
            }
        }
    }
}

/// Running sum over the values admitted by the domain.
///
/// Integer domains stay in i64 until an overflow or a non-integer value
/// promotes the total to double; the result is typed accordingly.
#[derive(Debug)]
pub struct Sum {
    kind: NumericKind,
    int_total: i64,
    double_total: f64,
    is_double: bool,
    count: usize,
}

impl Sum {
    pub fn new(kind: NumericKind) -> Self {
        Self {
            kind,
            int_total: 0,
            double_total: 0.0,
            is_double: !matches!(kind, NumericKind::Int | NumericKind::Mixed),
            count: 0,
        }
    }

    /// Number of values that participated.
    pub const fn items_counted(&self) -> usize {
        self.count
    }

    #[allow(clippy::cast_precision_loss)]
    fn promote(&mut self) {
        if !self.is_double {
            self.double_total = self.int_total as f64;
            self.is_double = true;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn add_int(&mut self, i: i64) {
        if self.is_double {
            self.double_total += i as f64;
        } else {
            match self.int_total.checked_add(i) {
                Some(total) => self.int_total = total,
                None => {
                    self.promote();
                    self.double_total += i as f64;
                }
            }
        }
    }

    fn add_f64(&mut self, v: f64) {
        self.promote();
        self.double_total += v;
    }

    /// The running total as a value typed per the domain. `0` (integer)
    /// when nothing was counted in an integer domain.
    #[allow(clippy::cast_possible_truncation)]
    pub fn result(&self) -> Value {
        match self.kind {
            NumericKind::Float => Value::Float(self.double_total as f32),
            NumericKind::Double => Value::Double(self.double_total),
            NumericKind::Int | NumericKind::Mixed => {
                if self.is_double {
                    Value::Double(self.double_total)
                } else {
                    Value::Int(self.int_total)
                }
            }
        }
    }

    /// The running total as f64, for averaging.
    #[allow(clippy::cast_precision_loss)]
    fn total_f64(&self) -> f64 {
        if self.is_double {
            self.double_total
        } else {
            self.int_total as f64
        }
    }
}

impl Accumulator for Sum {
    fn accumulate(&mut self, value: &Value) -> bool {
        if !self.kind.admits(value) {
            return false;
        }
        match value {
            Value::Int(i) => self.add_int(*i),
            Value::Float(f) => self.add_f64(f64::from(*f)),
            Value::Double(d) => self.add_f64(*d),
            Value::Decimal(d) => self.add_f64(d.to_f64()),
            _ => return false,
        }
        self.count += 1;
        true
    }
}

/// Running average: sum divided by count, none when nothing participated.
#[derive(Debug)]
pub struct Average {
    sum: Sum,
}

impl Average {
    pub fn new(kind: NumericKind) -> Self {
        Self {
            sum: Sum::new(kind),
        }
    }

    pub const fn items_counted(&self) -> usize {
        self.sum.items_counted()
    }

    /// The average as a double, or `None` when no value participated.
    #[allow(clippy::cast_precision_loss)]
    pub fn result(&self) -> Option<Value> {
        match self.sum.items_counted() {
            0 => None,
            n => Some(Value::Double(self.sum.total_f64() / n as f64)),
        }
    }
}

impl Accumulator for Average {
    fn accumulate(&mut self, value: &Value) -> bool {
        self.sum.accumulate(value)
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn minimum_takes_first_extremum() {
        let mut agg = Minimum::new();
        assert!(agg.accumulate(&Value::Int(5)));
        assert!(!agg.accumulate(&Value::Int(5))); // tie is not retaken
        assert!(agg.accumulate(&Value::Int(3)));
        assert!(!agg.accumulate(&Value::Int(4)));
        assert!(!agg.accumulate(&Value::Null));
        assert_eq!(agg.into_result(), Some(Value::Int(3)));
    }

    #[test]
    fn maximum_over_mixed_classes() {
        // Strings sort above numbers in the cross-type order.
        let mut agg = Maximum::new();
        agg.accumulate(&Value::Int(100));
        agg.accumulate(&Value::from("a"));
        agg.accumulate(&Value::Double(3.5));
        assert_eq!(agg.into_result(), Some(Value::from("a")));
    }

    #[test]
    fn minimum_empty_is_none() {
        let mut agg = Minimum::new();
        agg.accumulate(&Value::Null);
        assert_eq!(agg.into_result(), None);
    }

    #[test]
    fn sum_int_domain_skips_other_types() {
        let mut agg = Sum::new(NumericKind::Int);
        assert!(agg.accumulate(&Value::Int(10)));
        assert!(!agg.accumulate(&Value::Double(2.5)));
        assert!(!agg.accumulate(&Value::from("x")));
        assert!(!agg.accumulate(&Value::Null));
        assert!(agg.accumulate(&Value::Int(20)));
        assert_eq!(agg.items_counted(), 2);
        assert_eq!(agg.result(), Value::Int(30));
    }

    #[test]
    fn sum_int_overflow_promotes_to_double() {
        let mut agg = Sum::new(NumericKind::Int);
        agg.accumulate(&Value::Int(i64::MAX));
        agg.accumulate(&Value::Int(1));
        assert_eq!(agg.items_counted(), 2);
        assert!(matches!(agg.result(), Value::Double(_)));
    }

    #[test]
    fn sum_mixed_domain_counts_numerics_only() {
        let mut agg = Sum::new(NumericKind::Mixed);
        assert!(!agg.accumulate(&Value::from("a")));
        assert!(agg.accumulate(&Value::Double(3.5)));
        assert!(!agg.accumulate(&Value::Null));
        assert_eq!(agg.items_counted(), 1);
        assert_eq!(agg.result(), Value::Double(3.5));
    }

    #[test]
    fn sum_mixed_int_only_stays_integer() {
        let mut agg = Sum::new(NumericKind::Mixed);
        agg.accumulate(&Value::Int(2));
        agg.accumulate(&Value::Int(3));
        assert_eq!(agg.result(), Value::Int(5));
    }

    #[test]
    fn sum_float_domain_result_is_float() {
        let mut agg = Sum::new(NumericKind::Float);
        agg.accumulate(&Value::Float(1.5));
        agg.accumulate(&Value::Float(2.0));
        assert_eq!(agg.result(), Value::Float(3.5));
    }

    #[test]
    fn average_reports_count() {
        let mut agg = Average::new(NumericKind::Int);
        agg.accumulate(&Value::Int(10));
        agg.accumulate(&Value::Int(20));
        assert_eq!(agg.items_counted(), 2);
        assert_eq!(agg.result(), Some(Value::Double(15.0)));
    }

    #[test]
    fn average_empty_is_none() {
        let agg = Average::new(NumericKind::Double);
        assert_eq!(agg.result(), None);
        assert_eq!(agg.items_counted(), 0);
    }

    #[test]
    fn domain_selection() {
        assert_eq!(NumericKind::for_column(DataType::Int), NumericKind::Int);
        assert_eq!(NumericKind::for_column(DataType::Float), NumericKind::Float);
        assert_eq!(
            NumericKind::for_column(DataType::Double),
            NumericKind::Double
        );
        assert_eq!(NumericKind::for_column(DataType::Mixed), NumericKind::Mixed);
        assert_eq!(
            NumericKind::for_column(DataType::Decimal),
            NumericKind::Mixed
        );
    }
}
