//! Column role inference from bilingual header labels.

use std::collections::BTreeMap;

use serde::Serialize;

/// Semantic meaning of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Name,
    Semester,
    CreditValue,
    Kind,
    Module,
    Code,
}

/// Roles in resolution order, each with its lowercase keyword set.
/// A header label matches a role when it contains any of the keywords.
const ROLE_KEYWORDS: &[(ColumnRole, &[&str])] = &[
    (ColumnRole::Name, &["наименование", "дисцип", "name", "discipline"]),
    (ColumnRole::Semester, &["сем", "semester"]),
    (ColumnRole::CreditValue, &["зет", "ects", "кредит", "credit"]),
    (ColumnRole::Kind, &["тип", "type"]),
    (ColumnRole::Module, &["модул", "module"]),
    (ColumnRole::Code, &["код", "code"]),
];

/// Roles without which a table yields no records.
pub const REQUIRED_ROLES: [ColumnRole; 3] =
    [ColumnRole::Name, ColumnRole::Semester, ColumnRole::CreditValue];

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Semester => "semester",
            Self::CreditValue => "credit_value",
            Self::Kind => "kind",
            Self::Module => "module",
            Self::Code => "code",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        ROLE_KEYWORDS
            .iter()
            .find(|(role, _)| role == self)
            .map(|(_, keywords)| *keywords)
            .unwrap_or(&[])
    }

    /// Case-insensitive substring match of a header label.
    pub fn matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.keywords().iter().any(|k| label.contains(k))
    }
}

/// Role → column assignment for one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnRoles {
    columns: BTreeMap<ColumnRole, ResolvedColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedColumn {
    pub index: usize,
    pub label: String,
}

impl ColumnRoles {
    /// Column index holding `role`, if resolved.
    pub fn index(&self, role: ColumnRole) -> Option<usize> {
        self.columns.get(&role).map(|c| c.index)
    }

    /// Header label of the column holding `role`, if resolved.
    pub fn label(&self, role: ColumnRole) -> Option<&str> {
        self.columns.get(&role).map(|c| c.label.as_str())
    }

    /// Required roles that are still unresolved.
    pub fn missing_required(&self) -> Vec<ColumnRole> {
        REQUIRED_ROLES
            .into_iter()
            .filter(|role| !self.columns.contains_key(role))
            .collect()
    }

    pub fn is_usable(&self) -> bool {
        self.missing_required().is_empty()
    }
}

/// Assign roles to columns by keyword.
///
/// Roles are resolved in declaration order. For each role the first
/// matching column wins; a column claimed by an earlier role is skipped.
pub fn infer_columns<S: AsRef<str>>(header_labels: &[S]) -> ColumnRoles {
    let mut roles = ColumnRoles::default();
    let mut claimed = vec![false; header_labels.len()];

    for (role, _) in ROLE_KEYWORDS {
        let hit = header_labels
            .iter()
            .enumerate()
            .find(|(idx, label)| !claimed[*idx] && role.matches(label.as_ref()));

        if let Some((idx, label)) = hit {
            claimed[idx] = true;
            roles.columns.insert(
                *role,
                ResolvedColumn {
                    index: idx,
                    label: label.as_ref().trim().to_string(),
                },
            );
        }
    }

    roles
}
