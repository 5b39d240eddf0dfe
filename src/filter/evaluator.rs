use crate::models::filter::{CompiledFilter, Field, FilterExpr};

/// Anything that can supply the string value of a filter field
pub trait FieldValues {
    fn value(&self, field: Field) -> &str;
}

/// String values of the fields a filter can test
#[derive(Debug, Clone, Copy)]
pub struct PacketFields<'a> {
    pub src_ip: &'a str,
    pub dst_ip: &'a str,
    pub protocol: &'a str,
}

impl FieldValues for PacketFields<'_> {
    fn value(&self, field: Field) -> &str {
        match field {
            Field::SrcIp => self.src_ip,
            Field::DstIp => self.dst_ip,
            Field::Protocol => self.protocol,
        }
    }
}

/// Decide whether a packet passes the filter.
///
/// `and` reads its left side first and skips the right once it is false;
/// `or` skips the right once the left is true.
pub fn evaluate<F: FieldValues + ?Sized>(filter: &CompiledFilter, fields: &F) -> bool {
    filter.expr().map_or(true, |expr| eval_expr(expr, fields))
}

fn eval_expr<F: FieldValues + ?Sized>(expr: &FilterExpr, fields: &F) -> bool {
    match expr {
        FilterExpr::Comparison { field, literal } => fields.value(*field) == literal.as_str(),
        FilterExpr::Match { field, pattern } => pattern.matches_prefix(fields.value(*field)),
        FilterExpr::And { left, right } => eval_expr(left, fields) && eval_expr(right, fields),
        FilterExpr::Or { left, right } => eval_expr(left, fields) || eval_expr(right, fields),
        FilterExpr::Not { inner } => !eval_expr(inner, fields),
    }
}
