//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("表达式无法解析出任何词法单元: {0}")]
    MalformedExpression(String),

    #[error("括号不匹配")]
    MismatchedParentheses,

    #[error("意外的逻辑操作符: {0}")]
    UnexpectedOperator(String),

    #[error("表达式以操作符结尾")]
    TrailingOperator,

    #[error("条件格式无效: {0}")]
    InvalidConditionFormat(String),

    #[error("无效的条件: {0}")]
    InvalidCondition(String),

    #[error("规则结构无效")]
    InvalidRuleStructure,

    #[error("字段不存在: {0}")]
    FieldNotFound(String),

    #[error("不支持的比较操作符: {0}")]
    UnsupportedOperator(String),

    #[error("未知的逻辑操作符: {0}")]
    UnknownOperator(String),

    #[error("规则节点无效: {0}")]
    InvalidRuleNode(String),

    #[error("组合规则至少需要两条, 当前 {0} 条")]
    InsufficientRules(usize),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("子树解析深度超过上限, 节点: {0}")]
    DepthExceeded(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
