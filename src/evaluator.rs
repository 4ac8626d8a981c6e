//! 条件评估器
//!
//! 对单个原子条件求值：字段查找、宽松相等与数值大小比较。

use crate::error::{Result, RuleError};
use crate::models::{Condition, EvaluationContext, ScalarValue};
use crate::operators::ComparisonOp;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// 字段缺失是硬错误："规则不成立" 与 "记录缺少该字段" 必须区分开。
    pub fn evaluate(condition: &Condition, context: &EvaluationContext) -> Result<bool> {
        let field_value = context
            .get_field(&condition.field)
            .ok_or_else(|| RuleError::FieldNotFound(condition.field.clone()))?;

        match condition.operator {
            ComparisonOp::Eq => Ok(field_value.loose_eq(&condition.value)),
            ComparisonOp::Neq => Ok(!field_value.loose_eq(&condition.value)),
            ComparisonOp::Gt => Self::compare(field_value, &condition.value, |a, b| a > b),
            ComparisonOp::Gte => Self::compare(field_value, &condition.value, |a, b| a >= b),
            ComparisonOp::Lt => Self::compare(field_value, &condition.value, |a, b| a < b),
            ComparisonOp::Lte => Self::compare(field_value, &condition.value, |a, b| a <= b),
        }
    }

    /// 大小比较只在两个数值之间有意义，不做类型转换
    fn compare<F>(field: &ScalarValue, expected: &ScalarValue, cmp: F) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        match (field, expected) {
            (ScalarValue::Number(a), ScalarValue::Number(b)) => Ok(cmp(*a, *b)),
            _ => {
                let offender = if matches!(field, ScalarValue::Number(_)) {
                    expected
                } else {
                    field
                };
                Err(RuleError::TypeMismatch {
                    expected: "number".to_string(),
                    actual: offender.type_name().to_string(),
                })
            }
        }
    }
}
