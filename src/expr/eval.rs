//! Expression evaluation against a record or one of its genotypes
//!
//! Comparison, `has`, regex, `in` and function nodes own the ANY/ALL
//! indices found in their subtree: they evaluate the subtree once per index
//! combination and fold the results, OR for ANY and AND for ALL, stopping as
//! soon as the outcome is known. An owner evaluated inside another owner's
//! iteration evaluates once and lets the outer owner drive the indices.

use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use crate::error::SiftError;
use crate::value::Value;
use crate::vcf::{EffectEntry, EffectFormat, GenotypeCall, InfoValue, LofKind, VcfHeader, VcfRecord};

use super::ast::{BinaryOp, Expression, FieldAccessor, Function, IndexExpr, UnaryOp};
use super::iterator::{select_extremal, AggregateMode, FieldIterator, IteratorKind};

/// State for evaluating expressions against one record
pub struct EvalContext<'a> {
    record: &'a VcfRecord,
    header: &'a VcfHeader,
    /// Sample index when evaluating in genotype scope
    sample: Option<usize>,
    /// Pinned effect layout; detected per record when None
    format: Option<EffectFormat>,
    iterator: FieldIterator,
    effects: HashMap<EffectFormat, Rc<Vec<EffectEntry>>>,
    lofs: HashMap<LofKind, Rc<Vec<EffectEntry>>>,
}

impl<'a> EvalContext<'a> {
    /// Record scope
    pub fn new(record: &'a VcfRecord, header: &'a VcfHeader) -> Self {
        Self {
            record,
            header,
            sample: None,
            format: None,
            iterator: FieldIterator::new(),
            effects: HashMap::new(),
            lofs: HashMap::new(),
        }
    }

    /// Genotype scope for one sample of the record
    pub fn for_genotype(record: &'a VcfRecord, header: &'a VcfHeader, sample: usize) -> Self {
        let mut ctx = Self::new(record, header);
        ctx.sample = Some(sample);
        ctx
    }

    /// Pin the effect list layout instead of detecting it
    pub fn with_format(mut self, format: Option<EffectFormat>) -> Self {
        self.format = format;
        self
    }

    /// Switch the genotype in scope, keeping the parsed lists
    pub fn set_sample(&mut self, sample: Option<usize>) {
        self.sample = sample;
    }

    pub fn record(&self) -> &'a VcfRecord {
        self.record
    }

    fn effects(&mut self, format: EffectFormat) -> Rc<Vec<EffectEntry>> {
        let record = self.record;
        self.effects
            .entry(format)
            .or_insert_with(|| {
                let raw = record.get_info_str(format.info_key()).unwrap_or_default();
                Rc::new(format.parse_list(&raw))
            })
            .clone()
    }

    fn lof_list(&mut self, kind: LofKind) -> Rc<Vec<EffectEntry>> {
        let record = self.record;
        self.lofs
            .entry(kind)
            .or_insert_with(|| {
                let raw = record.get_info_str(kind.info_key()).unwrap_or_default();
                Rc::new(kind.parse_list(&raw))
            })
            .clone()
    }
}

impl Expression {
    /// Evaluate as a top-level expression
    pub fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<Value, SiftError> {
        if !self.is_aggregate_owner() && self.has_unowned_iterable() {
            self.aggregate(ctx)
        } else {
            self.eval_node(ctx)
        }
    }

    /// Evaluate and coerce to a boolean
    pub fn matches(&self, ctx: &mut EvalContext<'_>) -> Result<bool, SiftError> {
        Ok(self.evaluate(ctx)?.as_bool())
    }

    fn eval_node(&self, ctx: &mut EvalContext<'_>) -> Result<Value, SiftError> {
        if self.is_aggregate_owner() {
            self.aggregate(ctx)
        } else {
            self.eval_inner(ctx)
        }
    }

    fn aggregate(&self, ctx: &mut EvalContext<'_>) -> Result<Value, SiftError> {
        if ctx.iterator.is_active() || !self.has_iterable() {
            return self.eval_inner(ctx);
        }

        ctx.iterator.begin();
        let result = self.iterate(ctx);
        ctx.iterator.end();
        result
    }

    fn iterate(&self, ctx: &mut EvalContext<'_>) -> Result<Value, SiftError> {
        let mut value = self.eval_inner(ctx)?;

        let Some(mode) = ctx.iterator.mode() else {
            return Ok(value);
        };
        let all = mode == AggregateMode::All;

        loop {
            // A combination touching an empty list has no value to fold
            if !ctx.iterator.is_empty() {
                let truth = value.as_bool();
                if truth != all {
                    // ANY found a true, or ALL found a false
                    trace!("aggregate over '{}' stopped early", self);
                    return Ok(Value::Boolean(truth));
                }
            }
            if !ctx.iterator.advance() {
                return Ok(Value::Boolean(all));
            }
            value = self.eval_inner(ctx)?;
        }
    }

    fn eval_inner(&self, ctx: &mut EvalContext<'_>) -> Result<Value, SiftError> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Field(accessor) => accessor.evaluate(ctx),
            Expression::Unary { op, operand } => {
                let v = operand.eval_node(ctx)?;
                Ok(match op {
                    UnaryOp::Not => Value::Boolean(!v.as_bool()),
                    UnaryOp::Neg => v.neg(),
                })
            }
            Expression::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => Ok(Value::Boolean(
                left.eval_node(ctx)?.as_bool() && right.eval_node(ctx)?.as_bool(),
            )),
            Expression::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => Ok(Value::Boolean(
                left.eval_node(ctx)?.as_bool() || right.eval_node(ctx)?.as_bool(),
            )),
            Expression::Binary { op, left, right } => {
                let l = left.eval_node(ctx)?;
                let r = right.eval_node(ctx)?;
                Ok(apply_binary(*op, &l, &r))
            }
            Expression::Match {
                operand,
                regex,
                negate,
            } => {
                let v = operand.eval_node(ctx)?;
                let found = !v.is_missing() && regex.is_match(&v.to_string());
                Ok(Value::Boolean(found != *negate))
            }
            Expression::In {
                operand,
                set_index,
                sets,
            } => {
                if set_index.has_iterable() {
                    return Err(SiftError::evaluation(format!(
                        "set index '{}' must be a concrete value",
                        set_index
                    )));
                }
                let index = set_index.eval_node(ctx)?.as_int();
                let set = usize::try_from(index)
                    .ok()
                    .and_then(|i| sets.get(i))
                    .ok_or_else(|| SiftError::set_index_out_of_bounds(index, sets.len()))?;
                let v = operand.eval_node(ctx)?;
                Ok(Value::Boolean(set.items.contains(&v.to_string())))
            }
            Expression::Call { function, args } => call(*function, args, ctx),
        }
    }
}

fn apply_binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    use std::cmp::Ordering::{Greater, Less};

    match op {
        BinaryOp::Add => l.add(r),
        BinaryOp::Sub => l.sub(r),
        BinaryOp::Mul => l.mul(r),
        BinaryOp::Div => l.div(r),
        BinaryOp::Eq => Value::Boolean(l.loose_eq(r)),
        BinaryOp::Ne => Value::Boolean(!l.loose_eq(r)),
        BinaryOp::Lt => Value::Boolean(l.compare(r) == Less),
        BinaryOp::Le => Value::Boolean(l.compare(r) != Greater),
        BinaryOp::Gt => Value::Boolean(l.compare(r) == Greater),
        BinaryOp::Ge => Value::Boolean(l.compare(r) != Less),
        BinaryOp::Has => Value::Boolean(l.contains(&r.to_string())),
        BinaryOp::And => Value::Boolean(l.as_bool() && r.as_bool()),
        BinaryOp::Or => Value::Boolean(l.as_bool() || r.as_bool()),
    }
}

fn call(
    function: Function,
    args: &[Expression],
    ctx: &mut EvalContext<'_>,
) -> Result<Value, SiftError> {
    let zygosity = |call: &GenotypeCall| match function {
        Function::IsHom | Function::CountHom => call.is_hom(),
        Function::IsHet | Function::CountHet => call.is_het(),
        Function::IsVariant | Function::CountVariant => call.is_variant(),
        _ => call.is_ref(),
    };

    match function {
        Function::Exists | Function::Na | Function::IsHom | Function::IsHet
        | Function::IsVariant | Function::IsRef => {
            let arg = args.first().ok_or_else(|| {
                SiftError::evaluation(format!("{}() expects one argument", function.name()))
            })?;
            let v = arg.eval_node(ctx)?;
            Ok(Value::Boolean(match function {
                Function::Exists => !v.is_missing(),
                Function::Na => v.is_missing(),
                _ => !v.is_missing() && zygosity(&GenotypeCall::parse(&v.to_string())),
            }))
        }
        Function::CountHom | Function::CountHet | Function::CountVariant | Function::CountRef => {
            let record = ctx.record;
            let count = (0..record.samples.len())
                .filter_map(|i| record.genotype_call(i))
                .filter(|gt| zygosity(gt))
                .count();
            Ok(Value::Integer(count as i64))
        }
    }
}

/// Split a comma separated value; missing text is an empty list
fn split_list(text: Option<&str>) -> Vec<Option<&str>> {
    match text {
        None | Some("") | Some(".") => Vec::new(),
        Some(text) => text.split(',').map(Some).collect(),
    }
}

fn text_value(text: Option<&str>) -> Value {
    text.map_or_else(Value::missing, Value::from)
}

/// Resolve an index against a list of candidate texts
fn select_index(
    ctx: &mut EvalContext<'_>,
    index: &IndexExpr,
    kind: IteratorKind,
    values: &[Option<&str>],
) -> Result<Option<usize>, SiftError> {
    let upper = values.len() as i64 - 1;
    match index {
        IndexExpr::Aggregate(mode) if mode.is_iterating() => {
            Ok(ctx.iterator.begin_aggregate(kind, *mode, upper))
        }
        IndexExpr::Aggregate(mode) => Ok(select_extremal(*mode, values)),
        IndexExpr::Expr(expr) => {
            let n = expr.eval_node(ctx)?.as_int();
            Ok(usize::try_from(n).ok().filter(|&i| i < values.len()))
        }
    }
}

/// Resolve an index and return the selected element, or the missing sentinel
fn pick(
    ctx: &mut EvalContext<'_>,
    index: &IndexExpr,
    kind: IteratorKind,
    values: &[Option<&str>],
) -> Result<Value, SiftError> {
    let selected = select_index(ctx, index, kind, values)?;
    Ok(text_value(selected.and_then(|i| values[i])))
}

fn record_field(record: &VcfRecord, name: &str) -> Value {
    match name {
        "CHROM" => Value::from(record.chrom.as_str()),
        "POS" => Value::Integer(i64::try_from(record.pos).unwrap_or(i64::MAX)),
        "ID" => text_value(record.id.as_deref()),
        "REF" => Value::from(record.reference.as_str()),
        "ALT" if record.alternate.is_empty() => Value::missing(),
        "ALT" => Value::String(record.alternate.join(",")),
        "QUAL" => text_value(record.quality.as_deref()),
        "FILTER" => text_value(record.filter.as_deref()),
        _ => match record.get_info(name) {
            Some(InfoValue::Flag) => Value::Boolean(true),
            Some(InfoValue::String(v)) => Value::from(v.as_str()),
            None => Value::missing(),
        },
    }
}

impl FieldAccessor {
    /// Look up the field in the context's record or genotype
    pub fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<Value, SiftError> {
        match (self.is_genotype_scoped(), ctx.sample.is_some()) {
            (true, false) => {
                return Err(SiftError::evaluation(format!(
                    "Genotype field '{}' used outside of a genotype expression",
                    self
                )))
            }
            (false, true) => {
                return Err(SiftError::evaluation(format!(
                    "Record field '{}' used in a genotype expression",
                    self
                )))
            }
            _ => {}
        }

        let record = ctx.record;
        match self {
            FieldAccessor::Info { name } => Ok(record_field(record, name)),
            FieldAccessor::InfoSub { name, index } => {
                let raw = record.get_info_str(name);
                let values = split_list(raw.as_deref());
                pick(ctx, index, IteratorKind::InfoVar, &values)
            }
            FieldAccessor::Effect {
                name,
                index,
                format,
            } => {
                let format = format
                    .or(ctx.format)
                    .unwrap_or_else(|| EffectFormat::detect(ctx.header, record));
                let field = name.as_deref().map(|n| format.sub_field(n)).transpose()?;
                let effects = ctx.effects(format);
                let values: Vec<Option<&str>> = effects
                    .iter()
                    .map(|e| match field {
                        Some(field) => e.get(field),
                        None => Some(e.raw()),
                    })
                    .collect();
                pick(ctx, index, IteratorKind::Effect, &values)
            }
            FieldAccessor::Lof { kind, name, index } => {
                let field = name.as_deref().map(|n| kind.sub_field(n)).transpose()?;
                let entries = ctx.lof_list(*kind);
                let values: Vec<Option<&str>> = entries
                    .iter()
                    .map(|e| match field {
                        Some(field) => e.get(field),
                        None => Some(e.raw()),
                    })
                    .collect();
                let iterator_kind = match kind {
                    LofKind::Lof => IteratorKind::Lof,
                    LofKind::Nmd => IteratorKind::Nmd,
                };
                pick(ctx, index, iterator_kind, &values)
            }
            FieldAccessor::Genotype { sample, name, sub } => {
                let per_sample: Vec<Option<&str>> = (0..record.samples.len())
                    .map(|i| record.sample_value(i, name))
                    .collect();
                match sub {
                    None => pick(ctx, sample, IteratorKind::Genotype, &per_sample),
                    Some(sub) => {
                        match select_index(ctx, sample, IteratorKind::Genotype, &per_sample)? {
                            Some(i) => {
                                let values = split_list(per_sample[i]);
                                pick(ctx, sub, IteratorKind::GenotypeVar, &values)
                            }
                            None => Ok(Value::missing()),
                        }
                    }
                }
            }
            FieldAccessor::Sample { name, sub } => {
                let text = ctx.sample.and_then(|i| record.sample_value(i, name));
                match sub {
                    None => Ok(text_value(text)),
                    Some(sub) => pick(ctx, sub, IteratorKind::GenotypeVar, &split_list(text)),
                }
            }
        }
    }
}
