use model::{core::value::Value, records::row::RowData};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl CmpOp {
    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::GtEq => ord != Ordering::Less,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::LtEq => ord != Ordering::Greater,
        }
    }
}

/// Typed filter tree evaluated in-process against a row. Rows whose field
/// value is missing or not comparable to the literal never match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Predicate {
    Cmp {
        field: String,
        op: CmpOp,
        value: Value,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn cmp(field: &str, op: CmpOp, value: Value) -> Self {
        Predicate::Cmp {
            field: field.to_string(),
            op,
            value,
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn matches(&self, row: &RowData) -> bool {
        match self {
            Predicate::Cmp { field, op, value } => row
                .get_value(field)
                .try_cmp(value)
                .is_some_and(|ord| op.accepts(ord)),
            Predicate::And(a, b) => a.matches(row) && b.matches(row),
            Predicate::Or(a, b) => a.matches(row) || b.matches(row),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub dir: OrderDir,
}

/// Filter + order + offset/limit; the only query shape the extraction core
/// needs from a record source.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub filter: Option<Predicate>,
    pub order: Vec<SortKey>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        RecordQuery::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, field: &str, dir: OrderDir) -> Self {
        self.order.push(SortKey {
            field: field.to_string(),
            dir,
        });
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
