//! Declarative column schema

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::CellValue;

/// Semantic type of a column, used by filter UIs and augmentation jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    #[default]
    Text,
    Number,
    Currency,
    Percent,
    Date,
    Boolean,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Currency | Self::Percent)
    }
}

/// Declarative capability flags. These are consumed by the scheduler and by
/// filter UIs; they carry no behavior of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnCapabilities {
    pub predictive: bool,
    pub anomaly_detectable: bool,
    pub data_type: DataType,
}

type Accessor<T> = Arc<dyn Fn(&T) -> CellValue + Send + Sync>;
type Renderer<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// A column over records of type `T`
pub struct ColumnDescriptor<T> {
    /// Stable column id
    pub id: String,
    /// Header label
    pub label: String,
    pub is_numeric: bool,
    pub is_sortable: bool,
    pub is_filterable: bool,
    pub capabilities: ColumnCapabilities,
    accessor: Accessor<T>,
    render: Option<Renderer<T>>,
}

impl<T> Clone for ColumnDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            label: self.label.clone(),
            is_numeric: self.is_numeric,
            is_sortable: self.is_sortable,
            is_filterable: self.is_filterable,
            capabilities: self.capabilities,
            accessor: self.accessor.clone(),
            render: self.render.clone(),
        }
    }
}

impl<T> fmt::Debug for ColumnDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("is_numeric", &self.is_numeric)
            .field("is_sortable", &self.is_sortable)
            .field("is_filterable", &self.is_filterable)
            .field("capabilities", &self.capabilities)
            .field("has_render", &self.render.is_some())
            .finish()
    }
}

impl<T> ColumnDescriptor<T> {
    /// Create a sortable, filterable text column
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        accessor: impl Fn(&T) -> CellValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            is_numeric: false,
            is_sortable: true,
            is_filterable: true,
            capabilities: ColumnCapabilities::default(),
            accessor: Arc::new(accessor),
            render: None,
        }
    }

    /// Mark the column numeric (and its data type `Number` unless already numeric)
    pub fn numeric(mut self) -> Self {
        self.is_numeric = true;
        if !self.capabilities.data_type.is_numeric() {
            self.capabilities.data_type = DataType::Number;
        }
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.capabilities.data_type = data_type;
        self.is_numeric = data_type.is_numeric();
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.is_sortable = sortable;
        self
    }

    pub fn filterable(mut self, filterable: bool) -> Self {
        self.is_filterable = filterable;
        self
    }

    pub fn predictive(mut self) -> Self {
        self.capabilities.predictive = true;
        self
    }

    pub fn anomaly_detectable(mut self) -> Self {
        self.capabilities.anomaly_detectable = true;
        self
    }

    /// Custom cell text, used for search, display and export
    pub fn with_render(mut self, render: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    /// Raw cell value
    pub fn value(&self, record: &T) -> CellValue {
        (self.accessor)(record)
    }

    /// Rendered cell text
    pub fn render(&self, record: &T) -> String {
        match &self.render {
            Some(render) => render(record),
            None => self.value(record).to_string(),
        }
    }
}

/// Find a column by id
pub fn find_column<'a, T>(
    columns: &'a [ColumnDescriptor<T>],
    id: &str,
) -> Option<&'a ColumnDescriptor<T>> {
    columns.iter().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Deal {
        name: &'static str,
        amount: f64,
    }

    #[test]
    fn test_value_and_render() {
        let amount = ColumnDescriptor::new("amount", "Amount", |d: &Deal| d.amount.into())
            .with_data_type(DataType::Currency)
            .with_render(|d: &Deal| format!("${:.2}", d.amount));
        let deal = Deal {
            name: "Acme",
            amount: 12.5,
        };

        assert_eq!(amount.value(&deal), CellValue::Float(12.5));
        assert_eq!(amount.render(&deal), "$12.50");
        assert!(amount.is_numeric);
    }

    #[test]
    fn test_default_render_uses_value() {
        let name = ColumnDescriptor::new("name", "Name", |d: &Deal| d.name.into());
        let deal = Deal {
            name: "Acme",
            amount: 0.0,
        };
        assert_eq!(name.render(&deal), "Acme");
        assert!(name.is_sortable && name.is_filterable);
        assert!(!name.is_numeric);
    }

    #[test]
    fn test_find_column() {
        let columns = vec![
            ColumnDescriptor::new("name", "Name", |d: &Deal| d.name.into()),
            ColumnDescriptor::new("amount", "Amount", |d: &Deal| d.amount.into()).numeric(),
        ];
        assert_eq!(find_column(&columns, "amount").map(|c| c.label.as_str()), Some("Amount"));
        assert!(find_column(&columns, "missing").is_none());
    }
}
