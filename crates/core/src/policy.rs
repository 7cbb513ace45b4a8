use serde::{Deserialize, Serialize};

use crate::field::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdatePolicy {
    #[default]
    Overwrite,
    IgnoreZero,
}

impl UpdatePolicy {
    pub fn should_apply(self, new_value: f64) -> bool {
        match self {
            UpdatePolicy::Overwrite => true,
            UpdatePolicy::IgnoreZero => new_value != 0.0,
        }
    }
}

pub const DEFAULT_SPARSE_FIELDS: [Field; 6] = [
    Field::VoltagePhase1,
    Field::VoltagePhase2,
    Field::VoltagePhase3,
    Field::CurrentL1,
    Field::CurrentL2,
    Field::CurrentL3,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    policies: [UpdatePolicy; Field::COUNT],
}

impl PolicyTable {
    pub fn overwrite_all() -> Self {
        Self {
            policies: [UpdatePolicy::Overwrite; Field::COUNT],
        }
    }

    pub fn with_sparse(sparse: &[Field]) -> Self {
        let mut table = Self::overwrite_all();
        for field in sparse {
            table.policies[field.index()] = UpdatePolicy::IgnoreZero;
        }
        table
    }

    pub fn policy(&self, field: Field) -> UpdatePolicy {
        self.policies[field.index()]
    }

    pub fn should_apply(&self, field: Field, new_value: f64) -> bool {
        self.policy(field).should_apply(new_value)
    }

    pub fn sparse_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.policy(*f) == UpdatePolicy::IgnoreZero)
            .collect()
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::with_sparse(&DEFAULT_SPARSE_FIELDS)
    }
}
