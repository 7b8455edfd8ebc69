use std::collections::HashSet;
use std::fmt;

use caseflow_domain::{
    ActorSide, CatalogField, DataFieldType, DataRequestRow, DataTemplate, DataTemplateItem,
    DataValueKey, DataValueUpdate, FillState, TemplateId, TopicCode,
};

use crate::error::WorkflowError;

/// Stable key under which two rows count as the same logical field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowIdentity(String);

impl RowIdentity {
    /// Lowercased catalog key, else the template field id, else the lowercased label.
    pub fn of(row: &DataRequestRow) -> Self {
        if let Some(key) = non_blank(row.catalog_key.as_deref()) {
            return Self(key.to_lowercase());
        }
        if let Some(field_id) = non_blank(row.template_field_id.as_deref()) {
            return Self(field_id.to_owned());
        }
        Self(row.label.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Appends incoming rows whose identity is not yet present, keeping base order then
/// incoming order. Existing rows are never overwritten.
pub fn merge_rows(
    base: Vec<DataRequestRow>,
    incoming: impl IntoIterator<Item = DataRequestRow>,
) -> Vec<DataRequestRow> {
    let mut seen = base.iter().map(RowIdentity::of).collect::<HashSet<_>>();
    let mut merged = base;
    for row in incoming {
        if seen.insert(RowIdentity::of(&row)) {
            merged.push(row);
        }
    }
    merged
}

pub fn row_from_catalog(field: &CatalogField) -> DataRequestRow {
    DataRequestRow {
        id: None,
        catalog_key: Some(field.key.trim().to_owned()),
        template_field_id: None,
        label: field.label.clone(),
        field_type: field.value_type,
        document_name: field.document_name.clone(),
        fill_state: FillState::Pending,
        value: None,
    }
}

pub fn manual_row(
    label: &str,
    field_type: DataFieldType,
    document_name: Option<String>,
) -> Result<DataRequestRow, WorkflowError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(WorkflowError::validation("a field label is required"));
    }
    if field_type == DataFieldType::File
        && non_blank(document_name.as_deref()).is_none()
    {
        return Err(WorkflowError::validation(format!(
            "file field '{label}' needs a document name"
        )));
    }
    Ok(DataRequestRow {
        id: None,
        catalog_key: None,
        template_field_id: None,
        label: label.to_owned(),
        field_type,
        document_name,
        fill_state: FillState::Pending,
        value: None,
    })
}

/// Expands a saved template into rows. Catalog-backed items keep their key; others
/// are identified by their template item id.
pub fn rows_from_template(template: &DataTemplate) -> Vec<DataRequestRow> {
    template
        .items
        .iter()
        .map(|item| DataRequestRow {
            id: None,
            catalog_key: non_blank(item.key.as_deref()).map(str::to_owned),
            template_field_id: non_blank(item.id.as_deref()).map(str::to_owned),
            label: item.label.clone(),
            field_type: item.value_type,
            document_name: item.document_name.clone(),
            fill_state: FillState::Pending,
            value: None,
        })
        .collect()
}

/// Requested-data rows of one request as seen by one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequestSheet {
    rows: Vec<DataRequestRow>,
    viewer: ActorSide,
}

impl DataRequestSheet {
    pub fn new(rows: Vec<DataRequestRow>, viewer: ActorSide) -> Self {
        Self { rows, viewer }
    }

    pub fn rows(&self) -> &[DataRequestRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<DataRequestRow> {
        self.rows
    }

    /// A row filled by the other side cannot be moved or removed by this viewer.
    pub fn is_locked(&self, index: usize) -> bool {
        self.rows
            .get(index)
            .is_some_and(|row| is_locked_for(row, self.viewer))
    }

    pub fn merge(&mut self, incoming: impl IntoIterator<Item = DataRequestRow>) {
        let base = std::mem::take(&mut self.rows);
        self.rows = merge_rows(base, incoming);
    }

    pub fn add_catalog_fields<'a>(&mut self, fields: impl IntoIterator<Item = &'a CatalogField>) {
        self.merge(fields.into_iter().map(row_from_catalog).collect::<Vec<_>>());
    }

    pub fn apply_template(&mut self, template: &DataTemplate) {
        self.merge(rows_from_template(template));
    }

    pub fn add_manual(
        &mut self,
        label: &str,
        field_type: DataFieldType,
        document_name: Option<String>,
    ) -> Result<bool, WorkflowError> {
        let row = manual_row(label, field_type, document_name)?;
        let before = self.rows.len();
        self.merge([row]);
        Ok(self.rows.len() > before)
    }

    pub fn move_row(&mut self, from: usize, to: usize) -> Result<(), WorkflowError> {
        self.ensure_editable(from)?;
        if to >= self.rows.len() {
            return Err(WorkflowError::validation(format!(
                "row position {to} is out of range"
            )));
        }
        let row = self.rows.remove(from);
        self.rows.insert(to, row);
        Ok(())
    }

    pub fn remove_row(&mut self, index: usize) -> Result<DataRequestRow, WorkflowError> {
        self.ensure_editable(index)?;
        Ok(self.rows.remove(index))
    }

    /// Current row order as a template. Order is carried by item position only.
    pub fn to_template(
        &self,
        id: Option<TemplateId>,
        name: &str,
        topic_code: Option<TopicCode>,
    ) -> Result<DataTemplate, WorkflowError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::validation("a template name is required"));
        }
        Ok(DataTemplate {
            id,
            name: name.to_owned(),
            topic_code,
            items: self
                .rows
                .iter()
                .map(|row| DataTemplateItem {
                    id: non_blank(row.template_field_id.as_deref()).map(str::to_owned),
                    key: non_blank(row.catalog_key.as_deref()).map(str::to_owned),
                    label: row.label.clone(),
                    value_type: row.field_type,
                    document_name: row.document_name.clone(),
                })
                .collect(),
        })
    }

    /// Batch payload for every row that carries a value.
    pub fn value_updates(&self) -> Vec<DataValueUpdate> {
        self.rows
            .iter()
            .filter_map(|row| {
                let value = row.value.clone()?;
                let target = match non_blank(row.id.as_deref()) {
                    Some(id) => DataValueKey::Id { id: id.to_owned() },
                    None => DataValueKey::Key {
                        key: RowIdentity::of(row).to_string(),
                    },
                };
                Some(DataValueUpdate { target, value })
            })
            .collect()
    }

    fn ensure_editable(&self, index: usize) -> Result<(), WorkflowError> {
        let Some(row) = self.rows.get(index) else {
            return Err(WorkflowError::validation(format!(
                "row position {index} is out of range"
            )));
        };
        if is_locked_for(row, self.viewer) {
            return Err(WorkflowError::permission_denied(format!(
                "'{}' was filled by the other party and cannot be changed",
                row.label
            )));
        }
        Ok(())
    }
}

pub fn is_locked_for(row: &DataRequestRow, viewer: ActorSide) -> bool {
    matches!(row.fill_state, FillState::Filled { by } if by != viewer)
}
