//! 规则编译器
//!
//! 表达式字符串经词法分析、调度场（shunting-yard）算法转为后缀序列，
//! 再折叠成二叉 AST。原子条件在解析过程中即时校验。

use crate::error::{Result, RuleError};
use crate::models::{Condition, Node, Rule, ScalarValue};
use crate::operators::{ComparisonOp, LogicalOperator};
use crate::tokenizer::{Token, Tokenizer};
use regex::Regex;

/// 后缀序列元素
enum PostfixItem {
    Operand(Condition),
    Operator(LogicalOperator),
}

/// 规则编译器
pub struct RuleCompiler {
    tokenizer: Tokenizer,
    condition_pattern: Regex,
}

impl RuleCompiler {
    pub fn new() -> Self {
        // 条件模式：标识符、比较符号串、裸字面量或带引号字符串
        let condition_pattern = Regex::new(r#"(\w+)\s*([><=!]+)\s*('[^']*'|"[^"]*"|\w+)"#)
            .expect("条件模式应当合法");
        Self {
            tokenizer: Tokenizer::new(),
            condition_pattern,
        }
    }

    /// 编译表达式为 AST 根节点
    pub fn compile(&self, expression: &str) -> Result<Node> {
        let tokens = self.tokenizer.tokenize(expression)?;
        let postfix = self.to_postfix(tokens)?;
        Self::build_ast(postfix)
    }

    /// 编译表达式并包装为命名规则
    pub fn compile_rule(&self, name: Option<&str>, expression: &str) -> Result<Rule> {
        let root = self.compile(expression)?;
        Ok(match name {
            Some(n) => Rule::new(n, root),
            None => Rule::unnamed(root),
        })
    }

    /// 编译单个原子条件子串
    ///
    /// 在子串任意位置取第一个 `标识符 比较符 字面量` 匹配；字面量的
    /// 包裹引号被剥除，能按数值解析的存为数值。字段名此处不校验，
    /// 未知字段到求值阶段才会暴露。
    pub fn parse_condition(&self, raw: &str) -> Result<Condition> {
        let caps = self
            .condition_pattern
            .captures(raw)
            .ok_or_else(|| RuleError::InvalidConditionFormat(raw.to_string()))?;

        let field = caps[1].to_string();
        let operator: ComparisonOp = caps[2].parse()?;
        let literal = caps[3].trim_matches(|c| c == '\'' || c == '"');

        Ok(Condition {
            field,
            operator,
            value: ScalarValue::from_literal(literal),
        })
    }

    /// 调度场算法：中缀词法序列转后缀
    ///
    /// 操作符栈只存放括号与逻辑连接词；`expect_operand` 维持
    /// 操作数/操作符的严格交替。
    fn to_postfix(&self, tokens: Vec<Token>) -> Result<Vec<PostfixItem>> {
        let mut output = Vec::new();
        let mut operators: Vec<Token> = Vec::new();
        let mut expect_operand = true;

        let mut iter = tokens.into_iter().peekable();
        while let Some(token) = iter.next() {
            match token {
                Token::LParen => {
                    operators.push(Token::LParen);
                    expect_operand = true;
                }
                Token::RParen => {
                    loop {
                        match operators.pop() {
                            Some(Token::LParen) => break,
                            Some(Token::And) => {
                                output.push(PostfixItem::Operator(LogicalOperator::And))
                            }
                            Some(Token::Or) => {
                                output.push(PostfixItem::Operator(LogicalOperator::Or))
                            }
                            Some(_) => unreachable!("操作符栈只含括号与逻辑连接词"),
                            None => return Err(RuleError::MismatchedParentheses),
                        }
                    }
                    expect_operand = false;
                }
                Token::And | Token::Or => {
                    if expect_operand {
                        return Err(RuleError::UnexpectedOperator(token.text().to_string()));
                    }

                    let op = match token {
                        Token::And => LogicalOperator::And,
                        _ => LogicalOperator::Or,
                    };

                    // 等于或更高优先级的栈顶操作符先出栈（同级左结合）
                    while let Some(top) = operators.last() {
                        let top_op = match top {
                            Token::And => LogicalOperator::And,
                            Token::Or => LogicalOperator::Or,
                            _ => break,
                        };
                        if top_op.precedence() >= op.precedence() {
                            operators.pop();
                            output.push(PostfixItem::Operator(top_op));
                        } else {
                            break;
                        }
                    }

                    operators.push(token);
                    expect_operand = true;
                }
                Token::Atom(first) => {
                    // 贪心合并后续词法单元直到逻辑连接词或右括号，
                    // 得到一个完整的条件子串
                    let mut condition = first;
                    while matches!(
                        iter.peek(),
                        Some(t) if !t.is_logical() && !matches!(t, Token::RParen)
                    ) {
                        if let Some(next) = iter.next() {
                            condition.push(' ');
                            condition.push_str(next.text());
                        }
                    }

                    let compiled = self
                        .parse_condition(&condition)
                        .map_err(|_| RuleError::InvalidCondition(condition.clone()))?;
                    output.push(PostfixItem::Operand(compiled));
                    expect_operand = false;
                }
            }
        }

        if expect_operand {
            return Err(RuleError::TrailingOperator);
        }

        while let Some(token) = operators.pop() {
            match token {
                Token::LParen => return Err(RuleError::MismatchedParentheses),
                Token::And => output.push(PostfixItem::Operator(LogicalOperator::And)),
                Token::Or => output.push(PostfixItem::Operator(LogicalOperator::Or)),
                _ => unreachable!("操作符栈只含括号与逻辑连接词"),
            }
        }

        Ok(output)
    }

    /// 后缀序列折叠为二叉树：操作数压栈，操作符弹出右、左两个子树
    fn build_ast(postfix: Vec<PostfixItem>) -> Result<Node> {
        let mut stack: Vec<Node> = Vec::new();

        for item in postfix {
            match item {
                PostfixItem::Operand(condition) => stack.push(Node::operand(condition)),
                PostfixItem::Operator(op) => {
                    let right = stack.pop().ok_or(RuleError::InvalidRuleStructure)?;
                    let left = stack.pop().ok_or(RuleError::InvalidRuleStructure)?;
                    stack.push(Node::operator(op, left, right));
                }
            }
        }

        // 良构表达式折叠后栈里恰好剩一个根
        match stack.pop() {
            Some(root) if stack.is_empty() => Ok(root),
            _ => Err(RuleError::InvalidRuleStructure),
        }
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}
