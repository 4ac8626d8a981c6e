//! 布尔规则表达式引擎
//!
//! 把 `age > 30 AND department = 'Sales'` 形式的中缀表达式编译为二叉 AST，
//! 支持：
//! - 词法分析与调度场（shunting-yard）解析
//! - 针对扁平数据记录的递归求值与评估追踪
//! - 已有规则的逻辑组合
//! - 以稳定标识引用子节点的节点仓库

pub mod combiner;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod store;
pub mod tokenizer;

pub use combiner::{combine, combine_rules};
pub use compiler::RuleCompiler;
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::RuleExecutor;
pub use models::{
    Condition, EvaluationContext, EvaluationResult, Node, NodeView, Rule, ScalarValue,
};
pub use operators::{ComparisonOp, LogicalOperator};
pub use store::{NodeArena, StoredNode, StoredNodeKind};
