//! 节点存储
//!
//! 以稳定标识索引的节点仓库：存储形态的节点以标识引用子节点而非内嵌，
//! 子树只在显式的 load 操作中按需解析，并带有深度上限。组合操作直接
//! 引用既有根节点，允许多条规则共享子树；仓库不做环检测，调用方要
//! 保证从任意根可达的引用图无环。

use crate::error::{Result, RuleError};
use crate::models::{Condition, Node};
use crate::operators::LogicalOperator;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 子树解析的默认深度上限
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// 存储形态的节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNode {
    pub id: Uuid,
    /// 展示名，只有保存时的根节点会获得
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: StoredNodeKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredNodeKind {
    Operand {
        condition: Condition,
    },
    Operator {
        op: LogicalOperator,
        left: Uuid,
        right: Uuid,
    },
}

/// 节点仓库
#[derive(Clone)]
pub struct NodeArena {
    nodes: Arc<DashMap<Uuid, StoredNode>>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    /// 浅取单个节点，子节点引用不解析
    pub fn get(&self, id: Uuid) -> Option<StoredNode> {
        self.nodes.get(&id).map(|n| n.clone())
    }

    /// 保存 AST：自底向上，子节点先于父节点持久化，返回根标识
    #[instrument(skip(self, root), fields(name = ?name))]
    pub fn save(&self, root: &Node, name: Option<&str>) -> Uuid {
        let id = self.save_node(root, name);
        info!("规则已保存: {}", id);
        id
    }

    fn save_node(&self, node: &Node, name: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let kind = match node {
            Node::Operand { condition } => StoredNodeKind::Operand {
                condition: condition.clone(),
            },
            Node::Operator { op, left, right } => {
                let left_id = self.save_node(left, None);
                let right_id = self.save_node(right, None);
                StoredNodeKind::Operator {
                    op: *op,
                    left: left_id,
                    right: right_id,
                }
            }
        };

        self.nodes.insert(
            id,
            StoredNode {
                id,
                name: name.map(str::to_string),
                kind,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// 解析完整子树，使用默认深度上限
    pub fn load_subtree(&self, id: Uuid) -> Result<Node> {
        self.load_subtree_with_depth(id, DEFAULT_MAX_DEPTH)
    }

    /// 解析完整子树，深度上限由调用方显式给出
    pub fn load_subtree_with_depth(&self, id: Uuid, max_depth: usize) -> Result<Node> {
        if !self.contains(id) {
            return Err(RuleError::RuleNotFound(id.to_string()));
        }
        self.resolve_ref(id, max_depth)
    }

    /// 按标识解析节点及其子树。悬空引用是 InvalidRuleNode
    fn resolve_ref(&self, id: Uuid, depth_left: usize) -> Result<Node> {
        if depth_left == 0 {
            return Err(RuleError::DepthExceeded(id.to_string()));
        }

        let stored = self
            .get(id)
            .ok_or_else(|| RuleError::InvalidRuleNode(id.to_string()))?;

        match stored.kind {
            StoredNodeKind::Operand { condition } => Ok(Node::operand(condition)),
            StoredNodeKind::Operator { op, left, right } => {
                let left = self.resolve_ref(left, depth_left - 1)?;
                let right = self.resolve_ref(right, depth_left - 1)?;
                Ok(Node::operator(op, left, right))
            }
        }
    }

    /// 组合已保存的规则：左折叠新建操作符节点，引用既有根而不复制子树
    #[instrument(skip(self))]
    pub fn combine(&self, ids: &[Uuid], op: LogicalOperator, name: Option<&str>) -> Result<Uuid> {
        if ids.len() < 2 {
            return Err(RuleError::InsufficientRules(ids.len()));
        }

        for id in ids {
            if !self.contains(*id) {
                warn!("组合引用了不存在的规则: {}", id);
                return Err(RuleError::RuleNotFound(id.to_string()));
            }
        }

        let mut combined = ids[0];
        for next in &ids[1..] {
            let id = Uuid::new_v4();
            self.nodes.insert(
                id,
                StoredNode {
                    id,
                    name: None,
                    kind: StoredNodeKind::Operator {
                        op,
                        left: combined,
                        right: *next,
                    },
                    created_at: Utc::now(),
                },
            );
            combined = id;
        }

        // 组合根获得展示名
        if let Some(mut entry) = self.nodes.get_mut(&combined) {
            entry.name = Some(match name {
                Some(n) => n.to_string(),
                None => format!("Combined_Rule_{}", Utc::now().timestamp_millis()),
            });
        }

        info!("规则已组合: {}", combined);
        Ok(combined)
    }

    /// 删除单个节点，不级联子节点
    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<()> {
        if self.nodes.remove(&id).is_some() {
            info!("节点已删除: {}", id);
            Ok(())
        } else {
            warn!("删除不存在的节点: {}", id);
            Err(RuleError::RuleNotFound(id.to_string()))
        }
    }

    /// 列出所有命名的规则根
    pub fn list_named(&self) -> Vec<(Uuid, String)> {
        self.nodes
            .iter()
            .filter_map(|e| e.value().name.clone().map(|n| (*e.key(), n)))
            .collect()
    }

    /// 清空仓库
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.nodes.len();
        self.nodes.clear();
        info!("已清空 {} 个节点", count);
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RuleCompiler;
    use crate::executor::RuleExecutor;
    use crate::models::EvaluationContext;

    fn sample_root() -> Node {
        RuleCompiler::new()
            .compile("age > 30 AND department = 'Sales'")
            .unwrap()
    }

    #[test]
    fn test_save_persists_every_node() {
        let arena = NodeArena::new();
        let id = arena.save(&sample_root(), Some("sales_rule"));

        // AND 根 + 两个叶子
        assert_eq!(arena.len(), 3);
        assert!(arena.contains(id));
    }

    #[test]
    fn test_only_root_is_named() {
        let arena = NodeArena::new();
        arena.save(&sample_root(), Some("sales_rule"));

        let named = arena.list_named();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].1, "sales_rule");
    }

    #[test]
    fn test_get_is_shallow() {
        let arena = NodeArena::new();
        let id = arena.save(&sample_root(), None);

        let stored = arena.get(id).unwrap();
        match stored.kind {
            StoredNodeKind::Operator { left, right, .. } => {
                // 子节点只是引用，需要单独取
                assert!(arena.contains(left));
                assert!(arena.contains(right));
            }
            StoredNodeKind::Operand { .. } => panic!("根应为 operator 节点"),
        }
    }

    #[test]
    fn test_load_subtree_round_trip() {
        let arena = NodeArena::new();
        let original = sample_root();
        let id = arena.save(&original, None);

        let loaded = arena.load_subtree(id).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_root() {
        let arena = NodeArena::new();
        let err = arena.load_subtree(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, RuleError::RuleNotFound(_)));
    }

    #[test]
    fn test_dangling_child_reference() {
        let arena = NodeArena::new();
        let id = arena.save(&sample_root(), None);

        // 删掉一个子节点后再解析
        let stored = arena.get(id).unwrap();
        let StoredNodeKind::Operator { left, .. } = stored.kind else {
            panic!("根应为 operator 节点");
        };
        arena.delete(left).unwrap();

        let err = arena.load_subtree(id).unwrap_err();
        assert!(matches!(err, RuleError::InvalidRuleNode(_)));
    }

    #[test]
    fn test_depth_limit() {
        let arena = NodeArena::new();
        let id = arena.save(&sample_root(), None);

        // 树高 2，深度上限 1 只够取根
        let err = arena.load_subtree_with_depth(id, 1).unwrap_err();
        assert!(matches!(err, RuleError::DepthExceeded(_)));

        assert!(arena.load_subtree_with_depth(id, 2).is_ok());
    }

    #[test]
    fn test_combine_references_existing_roots() {
        let arena = NodeArena::new();
        let compiler = RuleCompiler::new();
        let r1 = arena.save(&compiler.compile("age > 30").unwrap(), Some("r1"));
        let r2 = arena.save(&compiler.compile("salary > 50000").unwrap(), Some("r2"));
        let before = arena.len();

        let combined = arena.combine(&[r1, r2], LogicalOperator::And, None).unwrap();

        // 只新增一个操作符节点，子树共享
        assert_eq!(arena.len(), before + 1);

        let stored = arena.get(combined).unwrap();
        assert!(stored.name.unwrap().starts_with("Combined_Rule_"));
        let StoredNodeKind::Operator { left, right, .. } = stored.kind else {
            panic!("组合根应为 operator 节点");
        };
        assert_eq!(left, r1);
        assert_eq!(right, r2);
    }

    #[test]
    fn test_combine_left_fold_of_three() {
        let arena = NodeArena::new();
        let compiler = RuleCompiler::new();
        let ids: Vec<Uuid> = ["a > 1", "b > 2", "c > 3"]
            .iter()
            .map(|e| arena.save(&compiler.compile(e).unwrap(), None))
            .collect();

        let combined = arena
            .combine(&ids, LogicalOperator::Or, Some("any_of"))
            .unwrap();

        let stored = arena.get(combined).unwrap();
        let StoredNodeKind::Operator { left, right, .. } = stored.kind else {
            panic!("组合根应为 operator 节点");
        };
        // 右侧是第三个根，左侧是前两个的组合
        assert_eq!(right, ids[2]);
        assert!(matches!(
            arena.get(left).unwrap().kind,
            StoredNodeKind::Operator { .. }
        ));
    }

    #[test]
    fn test_combine_insufficient() {
        let arena = NodeArena::new();
        let id = arena.save(&sample_root(), None);
        let err = arena.combine(&[id], LogicalOperator::And, None).unwrap_err();
        assert!(matches!(err, RuleError::InsufficientRules(1)));
    }

    #[test]
    fn test_combine_missing_rule() {
        let arena = NodeArena::new();
        let id = arena.save(&sample_root(), None);
        let err = arena
            .combine(&[id, Uuid::new_v4()], LogicalOperator::And, None)
            .unwrap_err();
        assert!(matches!(err, RuleError::RuleNotFound(_)));
    }

    #[test]
    fn test_combined_rule_evaluates_like_original() {
        let arena = NodeArena::new();
        let compiler = RuleCompiler::new();
        let r1 = arena.save(&compiler.compile("age > 30").unwrap(), None);
        let r2 = arena.save(&compiler.compile("department = 'Sales'").unwrap(), None);
        let combined = arena.combine(&[r1, r2], LogicalOperator::And, None).unwrap();

        let mut ctx = EvaluationContext::default();
        ctx.set("age", 35i64);
        ctx.set("department", "Sales");

        let root = arena.load_subtree(combined).unwrap();
        assert!(RuleExecutor::new().evaluate(&root, &ctx).unwrap());
    }

    #[test]
    fn test_delete() {
        let arena = NodeArena::new();
        let id = arena.save(&sample_root(), None);

        arena.delete(id).unwrap();
        assert!(!arena.contains(id));
        assert!(matches!(
            arena.delete(id),
            Err(RuleError::RuleNotFound(_))
        ));
    }

    #[test]
    fn test_clear() {
        let arena = NodeArena::new();
        arena.save(&sample_root(), Some("a"));
        arena.save(&sample_root(), Some("b"));

        arena.clear();
        assert!(arena.is_empty());
    }

    #[test]
    fn test_concurrent_save() {
        use std::thread;

        let arena = NodeArena::new();
        let clone = arena.clone();

        let handle = thread::spawn(move || {
            let compiler = RuleCompiler::new();
            for i in 0..50 {
                clone.save(
                    &compiler.compile(&format!("a > {}", i)).unwrap(),
                    Some(&format!("rule_{}", i)),
                );
            }
        });

        let compiler = RuleCompiler::new();
        for i in 50..100 {
            arena.save(
                &compiler.compile(&format!("a > {}", i)).unwrap(),
                Some(&format!("rule_{}", i)),
            );
        }

        handle.join().unwrap();
        assert_eq!(arena.list_named().len(), 100);
    }
}
