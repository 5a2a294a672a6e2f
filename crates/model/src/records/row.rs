use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowData {
    pub entity: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            field_values,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .and_then(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Sets a field in place, adding it when the row does not carry it yet.
    pub fn set_value(&mut self, field: &str, value: Value) {
        match self
            .field_values
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(field))
        {
            Some(fv) => fv.value = Some(value),
            None => self.field_values.push(FieldValue::new(field, value)),
        }
    }

    /// Copies every field of `other` into this row by name and returns how
    /// many fields actually changed. Zero means the rows were already
    /// identical field-for-field, which lets the sync merge skip no-op
    /// updates.
    pub fn copy_fields_from(&mut self, other: &RowData) -> usize {
        let mut changed = 0;
        for fv in &other.field_values {
            let current = self.get(&fv.name).and_then(|f| f.value.clone());
            if current.as_ref() != fv.value.as_ref() {
                match fv.value.clone() {
                    Some(v) => self.set_value(&fv.name, v),
                    None => {
                        match self
                            .field_values
                            .iter_mut()
                            .find(|f| f.name.eq_ignore_ascii_case(&fv.name))
                        {
                            Some(slot) => slot.value = None,
                            None => self.field_values.push(FieldValue {
                                name: fv.name.clone(),
                                value: None,
                            }),
                        }
                    }
                }
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, Value)]) -> RowData {
        RowData::new(
            "orders",
            fields
                .iter()
                .map(|(n, v)| FieldValue::new(n, v.clone()))
                .collect(),
        )
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let r = row(&[("OrderId", Value::Uint(7))]);
        assert_eq!(r.get_value("orderid"), Value::Uint(7));
        assert_eq!(r.get_value("missing"), Value::Null);
    }

    #[test]
    fn copy_counts_only_changed_fields() {
        let mut target = row(&[("id", Value::Uint(1)), ("status", Value::String("new".into()))]);
        let source = row(&[
            ("id", Value::Uint(1)),
            ("status", Value::String("paid".into())),
            ("amount", Value::Float(9.5)),
        ]);

        assert_eq!(target.copy_fields_from(&source), 2);
        assert_eq!(target.get_value("status"), Value::String("paid".into()));
        assert_eq!(target.get_value("amount"), Value::Float(9.5));

        // A second copy from the same source is a no-op.
        assert_eq!(target.copy_fields_from(&source), 0);
    }
}
