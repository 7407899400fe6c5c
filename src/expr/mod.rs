//! Filtering expression language
//!
//! Expressions are parsed once into an [`Expression`] tree and evaluated
//! against each record through an [`EvalContext`].
//!
//! # Example
//!
//! ```
//! use ferro_sift::expr::{parse_expression, EvalContext};
//! use ferro_sift::vcf::{InfoValue, VcfHeader, VcfRecord};
//!
//! let expr = parse_expression("DP > 10 & ANN[*].IMPACT = 'HIGH'").unwrap();
//! let record = VcfRecord::snv("1", 100, 'A', 'G')
//!     .with_info("DP", InfoValue::String("25".to_string()))
//!     .with_info("ANN", InfoValue::String("G|stop_gained|HIGH|KRAS|||||||||||".to_string()));
//! let header = VcfHeader::default();
//! let mut ctx = EvalContext::new(&record, &header);
//! assert!(expr.matches(&mut ctx).unwrap());
//! ```

mod ast;
mod eval;
mod iterator;
mod parser;

pub use ast::{BinaryOp, Expression, FieldAccessor, Function, IndexExpr, NamedSet, UnaryOp};
pub use eval::EvalContext;
pub use iterator::{select_extremal, AggregateMode, FieldIterator, IteratorKind};
pub use parser::{parse_expression, ExpressionParser};
