//! Expression tree
//!
//! Nodes are immutable once parsed. Field access is a single tagged
//! [`FieldAccessor`] type; list-valued accessors carry an [`IndexExpr`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::value::Value;
use crate::vcf::{EffectFormat, LofKind};

use super::iterator::AggregateMode;

/// A named set of strings for `in SET[i]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSet {
    pub name: String,
    pub items: BTreeSet<String>,
}

impl NamedSet {
    pub fn new(name: impl Into<String>, items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Index inside brackets
#[derive(Debug, Clone)]
pub enum IndexExpr {
    /// `*`, `?`, `MIN`, `MAX`
    Aggregate(AggregateMode),
    /// Any expression evaluating to an integer
    Expr(Box<Expression>),
}

impl IndexExpr {
    pub fn concrete(index: i64) -> Self {
        IndexExpr::Expr(Box::new(Expression::Literal(Value::Integer(index))))
    }

    /// ANY or ALL
    pub fn is_iterating(&self) -> bool {
        matches!(self, IndexExpr::Aggregate(mode) if mode.is_iterating())
    }

    fn inner(&self) -> Option<&Expression> {
        match self {
            IndexExpr::Expr(e) => Some(e.as_ref()),
            IndexExpr::Aggregate(_) => None,
        }
    }
}

impl fmt::Display for IndexExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexExpr::Aggregate(mode) => write!(f, "{}", mode.symbol()),
            IndexExpr::Expr(e) => write!(f, "{}", e),
        }
    }
}

/// How a field is looked up
#[derive(Debug, Clone)]
pub enum FieldAccessor {
    /// Fixed column or INFO key: `CHROM`, `POS`, `DP`
    Info { name: String },
    /// Element of a comma separated INFO value: `AF[0]`
    InfoSub { name: String, index: IndexExpr },
    /// Effect list sub-field: `ANN[0].GENE`, `EFF[*].IMPACT`, `ANN[1]`
    Effect {
        name: Option<String>,
        index: IndexExpr,
        format: Option<EffectFormat>,
    },
    /// `LOF[0].GENE`, `NMD[*].PERC`
    Lof {
        kind: LofKind,
        name: Option<String>,
        index: IndexExpr,
    },
    /// Sample value by sample index: `GEN[0].GT`, `GEN[*].AD[1]`
    Genotype {
        sample: IndexExpr,
        name: String,
        sub: Option<IndexExpr>,
    },
    /// Value of the sample in scope: `GEN.GT`, `GEN.AD[0]`
    Sample { name: String, sub: Option<IndexExpr> },
}

impl FieldAccessor {
    /// Whether this accessor needs a genotype scope
    pub fn is_genotype_scoped(&self) -> bool {
        matches!(self, FieldAccessor::Sample { .. })
    }

    fn indices(&self) -> Vec<&IndexExpr> {
        match self {
            FieldAccessor::Info { .. } => vec![],
            FieldAccessor::InfoSub { index, .. }
            | FieldAccessor::Effect { index, .. }
            | FieldAccessor::Lof { index, .. } => vec![index],
            FieldAccessor::Genotype { sample, sub, .. } => {
                std::iter::once(sample).chain(sub.iter()).collect()
            }
            FieldAccessor::Sample { sub, .. } => sub.iter().collect(),
        }
    }
}

impl fmt::Display for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dotted = |name: &Option<String>| {
            name.as_ref()
                .map(|n| format!(".{}", n))
                .unwrap_or_default()
        };
        let sub_index = |sub: &Option<IndexExpr>| {
            sub.as_ref()
                .map(|i| format!("[{}]", i))
                .unwrap_or_default()
        };

        match self {
            FieldAccessor::Info { name } => write!(f, "{}", name),
            FieldAccessor::InfoSub { name, index } => write!(f, "{}[{}]", name, index),
            FieldAccessor::Effect {
                name,
                index,
                format,
            } => {
                let key = format.unwrap_or(EffectFormat::Ann).info_key();
                write!(f, "{}[{}]{}", key, index, dotted(name))
            }
            FieldAccessor::Lof { kind, name, index } => {
                write!(f, "{}[{}]{}", kind.info_key(), index, dotted(name))
            }
            FieldAccessor::Genotype { sample, name, sub } => {
                write!(f, "GEN[{}].{}{}", sample, name, sub_index(sub))
            }
            FieldAccessor::Sample { name, sub } => write!(f, "GEN.{}{}", name, sub_index(sub)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Has,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Has => "has",
        }
    }

    /// Relational operators and `has` own aggregation
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Has
        )
    }
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Exists,
    Na,
    IsHom,
    IsHet,
    IsVariant,
    IsRef,
    CountHom,
    CountHet,
    CountVariant,
    CountRef,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "exists" => Function::Exists,
            "na" => Function::Na,
            "isHom" => Function::IsHom,
            "isHet" => Function::IsHet,
            "isVariant" => Function::IsVariant,
            "isRef" => Function::IsRef,
            "countHom" => Function::CountHom,
            "countHet" => Function::CountHet,
            "countVariant" => Function::CountVariant,
            "countRef" => Function::CountRef,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Exists => "exists",
            Function::Na => "na",
            Function::IsHom => "isHom",
            Function::IsHet => "isHet",
            Function::IsVariant => "isVariant",
            Function::IsRef => "isRef",
            Function::CountHom => "countHom",
            Function::CountHet => "countHet",
            Function::CountVariant => "countVariant",
            Function::CountRef => "countRef",
        }
    }

    /// Number of arguments
    pub fn arity(self) -> usize {
        match self {
            Function::CountHom | Function::CountHet | Function::CountVariant | Function::CountRef => 0,
            _ => 1,
        }
    }
}

/// An expression node
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    Field(FieldAccessor),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `e =~ 'regex'` / `e !~ 'regex'`
    Match {
        operand: Box<Expression>,
        regex: Regex,
        negate: bool,
    },
    /// `e in SET[i]`
    In {
        operand: Box<Expression>,
        set_index: Box<Expression>,
        sets: Arc<Vec<NamedSet>>,
    },
    Call {
        function: Function,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn field(accessor: FieldAccessor) -> Self {
        Expression::Field(accessor)
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Nodes that resolve ANY/ALL indices found in their subtree
    pub fn is_aggregate_owner(&self) -> bool {
        match self {
            Expression::Binary { op, .. } => op.is_comparison(),
            Expression::Match { .. } | Expression::In { .. } | Expression::Call { .. } => true,
            _ => false,
        }
    }

    /// Direct children, index expressions included
    fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_) => vec![],
            Expression::Field(accessor) => accessor
                .indices()
                .into_iter()
                .filter_map(IndexExpr::inner)
                .collect(),
            Expression::Unary { operand, .. } | Expression::Match { operand, .. } => {
                vec![operand.as_ref()]
            }
            Expression::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::In {
                operand, set_index, ..
            } => vec![operand.as_ref(), set_index.as_ref()],
            Expression::Call { args, .. } => args.iter().collect(),
        }
    }

    fn has_iterating_index(&self) -> bool {
        match self {
            Expression::Field(accessor) => accessor.indices().iter().any(|i| i.is_iterating()),
            _ => false,
        }
    }

    /// Whether any ANY/ALL accessor appears in this subtree
    pub fn has_iterable(&self) -> bool {
        self.has_iterating_index() || self.children().iter().any(|c| c.has_iterable())
    }

    /// Whether an ANY/ALL accessor appears outside of every owner node
    pub fn has_unowned_iterable(&self) -> bool {
        if self.is_aggregate_owner() {
            return false;
        }
        self.has_iterating_index() || self.children().iter().any(|c| c.has_unowned_iterable())
    }

    /// Whether the expression reads genotype-scoped fields
    pub fn is_genotype_scoped(&self) -> bool {
        match self {
            Expression::Field(accessor) => accessor.is_genotype_scoped(),
            _ => self.children().iter().any(|c| c.is_genotype_scoped()),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "'{}'", s),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write_literal(f, v),
            Expression::Field(accessor) => write!(f, "{}", accessor),
            Expression::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!({})", operand),
                UnaryOp::Neg => write!(f, "-({})", operand),
            },
            Expression::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expression::Match {
                operand,
                regex,
                negate,
            } => {
                let symbol = if *negate { "!~" } else { "=~" };
                write!(f, "({} {} '{}')", operand, symbol, regex.as_str())
            }
            Expression::In {
                operand, set_index, ..
            } => write!(f, "({} in SET[{}])", operand, set_index),
            Expression::Call { function, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", function.name(), args.join(", "))
            }
        }
    }
}
