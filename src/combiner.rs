//! 规则组合器
//!
//! 把已构建的多个 AST 根左折叠到一个新的逻辑根下：
//! `((r1 op r2) op r3) op r4`。子树原样保留，不重新解析、不重新校验。

use crate::error::{Result, RuleError};
use crate::models::{Node, Rule};
use crate::operators::LogicalOperator;
use chrono::Utc;

/// 组合多个 AST 根，至少需要两个
pub fn combine(roots: Vec<Node>, op: LogicalOperator) -> Result<Node> {
    if roots.len() < 2 {
        return Err(RuleError::InsufficientRules(roots.len()));
    }

    let mut iter = roots.into_iter();
    let Some(first) = iter.next() else {
        return Err(RuleError::InsufficientRules(0));
    };

    Ok(iter.fold(first, |acc, next| Node::operator(op, acc, next)))
}

/// 组合命名规则，组合根按创建时间获得默认名称
pub fn combine_rules(rules: Vec<Rule>, op: LogicalOperator) -> Result<Rule> {
    if rules.len() < 2 {
        return Err(RuleError::InsufficientRules(rules.len()));
    }

    let roots = rules.into_iter().map(|r| r.root).collect();
    let root = combine(roots, op)?;

    Ok(Rule::new(
        format!("Combined_Rule_{}", Utc::now().timestamp_millis()),
        root,
    ))
}
