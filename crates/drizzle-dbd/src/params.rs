//! Bound parameter storage for emulated prepared statements.

use std::collections::BTreeMap;

use drizzle_dbd_core::{Error, ParameterError, Result, Value};

use crate::rewrite::TypeGuessing;
use crate::types::SqlType;

/// One placeholder position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSlot {
    /// Bound value; `None` until the first bind.
    pub value: Option<Value>,
    /// Type given explicitly at bind time. Survives rebinding without a type.
    pub declared: Option<SqlType>,
    /// Type guessed at execute time; cleared by every bind.
    pub inferred: Option<SqlType>,
}

impl ParameterSlot {
    /// The declared type, else the inferred one.
    pub fn sql_type(&self) -> Option<SqlType> {
        self.declared.or(self.inferred)
    }

    /// Bound to something other than NULL.
    pub fn is_defined(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_null())
    }
}

/// Types for which a bound value is expected to look like a number.
const fn expects_number(sql_type: SqlType) -> bool {
    matches!(
        sql_type,
        SqlType::Numeric
            | SqlType::Decimal
            | SqlType::Integer
            | SqlType::SmallInt
            | SqlType::Float
            | SqlType::Real
            | SqlType::Double
    )
}

fn display_value(value: &Value) -> String {
    match value.to_sql_bytes() {
        Some(text) => format!("'{}'", String::from_utf8_lossy(&text)),
        None => "undef".to_string(),
    }
}

/// Fixed-size set of parameter slots, addressed 1-based.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    slots: Vec<ParameterSlot>,
}

impl ParamStore {
    /// `count` empty slots.
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![ParameterSlot::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[ParameterSlot] {
        &self.slots
    }

    /// Slot at 1-based `index`.
    pub fn slot(&self, index: usize) -> Option<&ParameterSlot> {
        index.checked_sub(1).and_then(|i| self.slots.get(i))
    }

    /// Bind `value` to the 1-based `index`.
    ///
    /// Replaces the previous value. `declared`, when given, becomes the
    /// slot's type; otherwise the previously declared type is kept.
    ///
    /// A defined value that does not look like a number bound as a numeric
    /// type is accepted, and the returned diagnostic describes it.
    pub fn bind(
        &mut self,
        index: usize,
        value: Value,
        declared: Option<SqlType>,
    ) -> Result<Option<String>> {
        let count = self.slots.len();
        let Some(slot) = index
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
        else {
            return Err(Error::Parameter(ParameterError { index, count }));
        };

        let warning = match declared {
            Some(ty) if expects_number(ty) && !value.is_null() && !value.looks_like_number() => {
                let message = format!(
                    "Binding non-numeric field {}, value {} as a numeric!",
                    index,
                    display_value(&value)
                );
                tracing::warn!(index, sql_type = ?ty, "{}", message);
                Some(message)
            }
            _ => None,
        };

        slot.value = Some(value);
        slot.inferred = None;
        if declared.is_some() {
            slot.declared = declared;
        }
        Ok(warning)
    }

    /// Give every defined, untyped slot a type according to `guessing`.
    pub fn infer_types(&mut self, guessing: TypeGuessing) {
        for slot in &mut self.slots {
            if slot.sql_type().is_some() {
                continue;
            }
            if let Some(value) = slot.value.as_ref().filter(|v| !v.is_null()) {
                slot.inferred = Some(guessing.infer(value));
            }
        }
    }

    /// Release every bound value and type.
    pub fn clear(&mut self) {
        self.slots.fill(ParameterSlot::default());
    }

    /// Current values keyed by 1-based position. Unbound slots are NULL.
    pub fn param_values(&self) -> BTreeMap<usize, Value> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (i + 1, slot.value.clone().unwrap_or(Value::Null)))
            .collect()
    }
}
