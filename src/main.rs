//! 规则引擎命令行入口
//!
//! 提供表达式编译、求值与组合的本地调试入口。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rule_engine::{EvaluationContext, LogicalOperator, RuleCompiler, RuleExecutor, combiner};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rule-engine", about = "布尔规则表达式引擎")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 编译表达式并输出 AST 结构
    Compile {
        /// 规则表达式，如 "age > 30 AND department = 'Sales'"
        expression: String,
        /// 规则名称
        #[arg(short, long)]
        name: Option<String>,
    },
    /// 编译表达式并对 JSON 数据记录求值
    Evaluate {
        expression: String,
        /// JSON 对象形式的数据记录，如 '{"age": 35}'
        #[arg(short, long)]
        data: String,
        /// 输出评估追踪
        #[arg(short, long)]
        trace: bool,
    },
    /// 组合多个表达式为一条规则
    Combine {
        /// 待组合的表达式，至少两个
        #[arg(short, long = "expr")]
        expressions: Vec<String>,
        /// 逻辑连接词 (AND/OR)
        #[arg(short, long, default_value = "AND")]
        op: String,
        /// 给出数据记录时对组合结果求值，否则输出组合后的 AST
        #[arg(short, long)]
        data: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let compiler = RuleCompiler::new();

    match cli.command {
        Command::Compile { expression, name } => {
            let rule = compiler.compile_rule(name.as_deref(), &expression)?;
            println!("{}", serde_json::to_string_pretty(&rule.root.render())?);
        }
        Command::Evaluate {
            expression,
            data,
            trace,
        } => {
            let rule = compiler.compile_rule(None, &expression)?;
            let context = EvaluationContext::from_json(&data).context("数据记录解析失败")?;

            let executor = if trace {
                RuleExecutor::new().with_trace()
            } else {
                RuleExecutor::new()
            };
            let result = executor.execute(&rule, &context)?;

            for line in &result.evaluation_trace {
                eprintln!("{}", line);
            }
            println!("{}", result.matched);
        }
        Command::Combine {
            expressions,
            op,
            data,
        } => {
            let op: LogicalOperator = op.parse()?;
            let rules = expressions
                .iter()
                .map(|e| compiler.compile_rule(None, e))
                .collect::<rule_engine::Result<Vec<_>>>()?;
            let combined = combiner::combine_rules(rules, op)?;

            match data {
                Some(raw) => {
                    let context =
                        EvaluationContext::from_json(&raw).context("数据记录解析失败")?;
                    let result = RuleExecutor::new().execute(&combined, &context)?;
                    println!("{}", result.matched);
                }
                None => println!("{}", serde_json::to_string_pretty(&combined.root.render())?),
            }
        }
    }

    Ok(())
}
