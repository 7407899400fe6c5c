// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! ferro-sift: VCF filtering expressions and sorted-database annotation
//!
//! Part of the ferro bioinformatics toolkit.
//!
//! # Example
//!
//! ```
//! use ferro_sift::vcf::parse_vcf_string;
//! use ferro_sift::VcfFilter;
//!
//! let vcf = "##fileformat=VCFv4.2\n\
//!            #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
//!            1\t100\t.\tA\tG\t50\tPASS\tDP=30;AF=0.2\n";
//! let mut reader = parse_vcf_string(vcf).unwrap();
//! let record = reader.read_record().unwrap().unwrap();
//!
//! let filter = VcfFilter::parse("(DP > 20) & (AF < 0.5)", vec![], None).unwrap();
//! assert!(filter.matches(&record, reader.header()).unwrap());
//! ```

pub mod annotate;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod expr;
pub mod filter;
pub mod value;
pub mod vcf;

// Re-export commonly used types
pub use annotate::{AnnotationConfig, AnnotationEngine, AnnotationStats};
pub use db::{AnnotationDatabase, MemoryDatabase, TabixDatabase};
pub use error::{ErrorCode, SiftError};
pub use expr::{parse_expression, EvalContext, Expression, ExpressionParser, NamedSet};
pub use filter::{load_set_file, VcfFilter};
pub use value::Value;

/// Result type alias for ferro-sift operations
pub type Result<T> = std::result::Result<T, SiftError>;
