//! VCF (Variant Call Format) support
//!
//! This module provides the record model, a noodles-backed reader and writer,
//! and the effect-list layouts that filtering expressions address.

mod effect;
mod parser;
mod record;

pub use effect::{EffectEntry, EffectFormat, LofKind, SubField};
pub use parser::{
    open_vcf, parse_vcf_string, InfoDefinition, VcfHeader, VcfReader,
    VcfRecordIterator, VcfWriter,
};
pub use record::{GenotypeCall, InfoValue, VcfRecord};
