//! 表达式词法分析
//!
//! 把原始规则表达式拆分为括号、逻辑连接词与原子词法单元，空白只作分隔。

use crate::error::{Result, RuleError};
use regex::Regex;

/// 词法单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LParen,
    RParen,
    And,
    Or,
    /// 裸词、数值、比较符号，或保留引号的字符串字面量
    Atom(String),
}

impl Token {
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn text(&self) -> &str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Atom(s) => s,
        }
    }
}

/// 词法分析器
pub struct Tokenizer {
    pattern: Regex,
}

impl Tokenizer {
    pub fn new() -> Self {
        // 引号包裹的字面量整体是一个词法单元，引号到条件编译阶段才剥除
        let pattern = Regex::new(r#""[^"]*"|'[^']*'|\w+|[><=!]+|[()]"#)
            .expect("词法模式应当合法");
        Self { pattern }
    }

    /// 拆分表达式。产生不了任何词法单元即为格式错误
    pub fn tokenize(&self, expression: &str) -> Result<Vec<Token>> {
        let tokens: Vec<Token> = self
            .pattern
            .find_iter(expression)
            .map(|m| match m.as_str() {
                "(" => Token::LParen,
                ")" => Token::RParen,
                "AND" => Token::And,
                "OR" => Token::Or,
                other => Token::Atom(other.to_string()),
            })
            .collect();

        if tokens.is_empty() {
            return Err(RuleError::MalformedExpression(expression.to_string()));
        }

        Ok(tokens)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
