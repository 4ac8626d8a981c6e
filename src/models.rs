//! 规则引擎领域模型

use crate::error::Result;
use crate::operators::{ComparisonOp, LogicalOperator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// 标量值，条件右值与数据记录字段的闭合类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Number(f64),
    String(String),
}

impl ScalarValue {
    /// 字面量能通过数值解析则存为数值，否则保留字符串
    pub fn from_literal(raw: &str) -> Self {
        match raw.parse::<f64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::String(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
        }
    }

    /// 宽松相等：同类型直接比较，数值与字符串混合时把字符串按数值解释，
    /// 解释不了即不相等
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => (a - b).abs() < f64::EPSILON,
            (Self::String(a), Self::String(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                _ => false,
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// 原子条件：字段、比较操作符与期望值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ComparisonOp,
    pub value: ScalarValue,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: ComparisonOp,
        value: impl Into<ScalarValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// AST 节点：叶子为原子条件，内部节点为恰好两个子节点的逻辑操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Operand {
        condition: Condition,
    },
    Operator {
        op: LogicalOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn operand(condition: Condition) -> Self {
        Self::Operand { condition }
    }

    pub fn operator(op: LogicalOperator, left: Node, right: Node) -> Self {
        Self::Operator {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// 收集规则引用的全部字段
    pub fn collect_fields(&self) -> HashSet<String> {
        let mut fields = HashSet::new();
        self.collect_fields_into(&mut fields);
        fields
    }

    fn collect_fields_into(&self, fields: &mut HashSet<String>) {
        match self {
            Self::Operand { condition } => {
                fields.insert(condition.field.clone());
            }
            Self::Operator { left, right, .. } => {
                left.collect_fields_into(fields);
                right.collect_fields_into(fields);
            }
        }
    }

    /// 只读结构视图：operator 节点以连接词为 value，operand 节点以条件文本为 value
    pub fn render(&self) -> NodeView {
        match self {
            Self::Operand { condition } => NodeView {
                node_type: "operand",
                value: condition.to_string(),
                left: None,
                right: None,
            },
            Self::Operator { op, left, right } => NodeView {
                node_type: "operator",
                value: op.to_string(),
                left: Some(Box::new(left.render())),
                right: Some(Box::new(right.render())),
            },
        }
    }
}

/// 渲染视图，缺失的子节点在 JSON 中省略
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<NodeView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<NodeView>>,
}

/// 命名规则：AST 根加展示元数据。名称只是元数据，不参与求值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub root: Node,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(name: impl Into<String>, root: Node) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            root,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// 未命名规则按创建时间生成默认名称
    pub fn unnamed(root: Node) -> Self {
        Self::new(format!("Rule_{}", Utc::now().timestamp_millis()), root)
    }
}

/// 评估上下文：字段到标量值的扁平记录
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    data: HashMap<String, ScalarValue>,
}

impl EvaluationContext {
    pub fn new(data: HashMap<String, ScalarValue>) -> Self {
        Self { data }
    }

    /// 从 JSON 对象创建，非标量字段值会被闭合类型拒绝
    pub fn from_json(json: &str) -> Result<Self> {
        let data: HashMap<String, ScalarValue> = serde_json::from_str(json)?;
        Ok(Self { data })
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<ScalarValue>) {
        self.data.insert(field.into(), value.into());
    }

    pub fn get_field(&self, field: &str) -> Option<&ScalarValue> {
        self.data.get(field)
    }

    pub fn data(&self) -> &HashMap<String, ScalarValue> {
        &self.data
    }
}

/// 评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub rule_id: String,
    pub rule_name: String,
    pub matched_conditions: Vec<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_ms: i64,
}

impl EvaluationResult {
    pub fn new(rule_id: String, rule_name: String) -> Self {
        Self {
            matched: false,
            rule_id,
            rule_name,
            matched_conditions: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_from_literal() {
        assert_eq!(ScalarValue::from_literal("30"), ScalarValue::Number(30.0));
        assert_eq!(ScalarValue::from_literal("3.5"), ScalarValue::Number(3.5));
        assert_eq!(
            ScalarValue::from_literal("Sales"),
            ScalarValue::String("Sales".to_string())
        );
    }

    #[test]
    fn test_loose_eq_same_type() {
        assert!(ScalarValue::Number(100.0).loose_eq(&ScalarValue::Number(100.0)));
        assert!(ScalarValue::from("Sales").loose_eq(&ScalarValue::from("Sales")));
        assert!(!ScalarValue::from("Sales").loose_eq(&ScalarValue::from("HR")));
        // 同为字符串时不做数值解释
        assert!(!ScalarValue::from("1.0").loose_eq(&ScalarValue::from("1")));
    }

    #[test]
    fn test_loose_eq_mixed_type() {
        assert!(ScalarValue::Number(35.0).loose_eq(&ScalarValue::from("35")));
        assert!(ScalarValue::from("35").loose_eq(&ScalarValue::Number(35.0)));
        assert!(!ScalarValue::Number(35.0).loose_eq(&ScalarValue::from("abc")));
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(ScalarValue::Number(30.0).to_string(), "30");
        assert_eq!(ScalarValue::Number(3.5).to_string(), "3.5");
        assert_eq!(ScalarValue::from("Sales").to_string(), "'Sales'");
    }

    #[test]
    fn test_condition_display() {
        let cond = Condition::new("age", ComparisonOp::Gt, 30i64);
        assert_eq!(cond.to_string(), "age > 30");

        let cond = Condition::new("department", ComparisonOp::Eq, "Sales");
        assert_eq!(cond.to_string(), "department == 'Sales'");
    }

    #[test]
    fn test_node_serialization() {
        let node = Node::operator(
            LogicalOperator::And,
            Node::operand(Condition::new("age", ComparisonOp::Gt, 30i64)),
            Node::operand(Condition::new("department", ComparisonOp::Eq, "Sales")),
        );

        let json = serde_json::to_string(&node).unwrap();
        let parsed: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn test_collect_fields() {
        let node = Node::operator(
            LogicalOperator::Or,
            Node::operand(Condition::new("age", ComparisonOp::Gt, 30i64)),
            Node::operator(
                LogicalOperator::And,
                Node::operand(Condition::new("salary", ComparisonOp::Gte, 50000i64)),
                Node::operand(Condition::new("age", ComparisonOp::Lt, 60i64)),
            ),
        );

        let fields = node.collect_fields();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains("age"));
        assert!(fields.contains("salary"));
    }

    #[test]
    fn test_render_view() {
        let node = Node::operator(
            LogicalOperator::And,
            Node::operand(Condition::new("age", ComparisonOp::Gt, 30i64)),
            Node::operand(Condition::new("department", ComparisonOp::Eq, "Sales")),
        );

        let view = node.render();
        assert_eq!(view.node_type, "operator");
        assert_eq!(view.value, "AND");
        assert_eq!(view.left.as_ref().unwrap().value, "age > 30");
        assert_eq!(view.right.as_ref().unwrap().value, "department == 'Sales'");

        // 叶子节点不带 left/right 字段
        let json = serde_json::to_value(view.left.unwrap()).unwrap();
        assert_eq!(json["type"], "operand");
        assert!(json.get("left").is_none());
    }

    #[test]
    fn test_context_from_json() {
        let ctx = EvaluationContext::from_json(r#"{"age": 35, "department": "Sales"}"#).unwrap();
        assert_eq!(ctx.get_field("age"), Some(&ScalarValue::Number(35.0)));
        assert_eq!(ctx.get_field("department"), Some(&ScalarValue::from("Sales")));
        assert_eq!(ctx.get_field("salary"), None);
    }

    #[test]
    fn test_context_rejects_non_scalar() {
        assert!(EvaluationContext::from_json(r#"{"tags": ["a", "b"]}"#).is_err());
        assert!(EvaluationContext::from_json(r#"{"active": true}"#).is_err());
    }

    #[test]
    fn test_rule_metadata() {
        let root = Node::operand(Condition::new("age", ComparisonOp::Gt, 30i64));
        let rule = Rule::new("senior_check", root.clone());
        assert_eq!(rule.name, "senior_check");
        assert!(!rule.id.is_empty());

        let unnamed = Rule::unnamed(root);
        assert!(unnamed.name.starts_with("Rule_"));
    }
}
