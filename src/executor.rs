//! 规则执行器
//!
//! 深度优先遍历 AST，返回判定结果与评估追踪。两个子树都无条件求值，
//! 不做短路：左右任意一侧的字段缺失等错误都不能被另一侧的结果掩盖。

use crate::error::Result;
use crate::evaluator::ConditionEvaluator;
use crate::models::{Condition, EvaluationContext, EvaluationResult, Node, Rule};
use crate::operators::LogicalOperator;
use std::time::Instant;

/// 规则执行器
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 执行规则评估
    pub fn execute(&self, rule: &Rule, context: &EvaluationContext) -> Result<EvaluationResult> {
        let start = Instant::now();

        let mut result = EvaluationResult::new(rule.id.clone(), rule.name.clone());
        let matched = self.evaluate_node(&rule.root, context, &mut result, "root")?;

        result.matched = matched;
        result.evaluation_time_ms = start.elapsed().as_millis() as i64;

        Ok(result)
    }

    /// 对匿名根节点求值，不收集追踪
    pub fn evaluate(&self, node: &Node, context: &EvaluationContext) -> Result<bool> {
        let mut scratch = EvaluationResult::new(String::new(), String::new());
        self.evaluate_node(node, context, &mut scratch, "root")
    }

    fn evaluate_node(
        &self,
        node: &Node,
        context: &EvaluationContext,
        result: &mut EvaluationResult,
        path: &str,
    ) -> Result<bool> {
        match node {
            Node::Operand { condition } => {
                self.evaluate_condition(condition, context, result, path)
            }
            Node::Operator { op, left, right } => {
                let left_matched =
                    self.evaluate_node(left, context, result, &format!("{}.left", path))?;
                let right_matched =
                    self.evaluate_node(right, context, result, &format!("{}.right", path))?;

                let matched = match op {
                    LogicalOperator::And => left_matched && right_matched,
                    LogicalOperator::Or => left_matched || right_matched,
                };

                if self.trace_enabled {
                    result.evaluation_trace.push(format!(
                        "{}: {} => {}",
                        path,
                        op,
                        if matched { "MATCHED" } else { "NOT_MATCHED" }
                    ));
                }

                Ok(matched)
            }
        }
    }

    fn evaluate_condition(
        &self,
        condition: &Condition,
        context: &EvaluationContext,
        result: &mut EvaluationResult,
        path: &str,
    ) -> Result<bool> {
        let matched = ConditionEvaluator::evaluate(condition, context)?;

        if self.trace_enabled {
            result.evaluation_trace.push(format!(
                "{}: {} => {}",
                path,
                condition,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
        }

        if matched {
            result
                .matched_conditions
                .push(format!("{}: {}", path, condition));
        }

        Ok(matched)
    }
}

impl Default for RuleExecutor {
    fn default() -> Self {
        Self::new()
    }
}
