use async_trait::async_trait;
use tabulon_core::{ColumnDescriptor, DataType};

use crate::error::JobResult;
use crate::handlers::RowValidator;
use crate::results::{Severity, ValidationResult};

/// Missing values, non-numeric text in numeric columns, negative amounts
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedValidator;

#[async_trait]
impl<T: Send + Sync + 'static> RowValidator<T> for SimulatedValidator {
    async fn validate_row(
        &self,
        record: &T,
        columns: &[ColumnDescriptor<T>],
    ) -> JobResult<Vec<ValidationResult>> {
        let mut results = Vec::new();

        for column in columns {
            let value = column.value(record);

            if value.is_empty() {
                results.push(ValidationResult {
                    column_id: column.id.clone(),
                    severity: Severity::Low,
                    message: format!("{} is missing", column.label),
                    suggestion: None,
                });
                continue;
            }

            if !column.is_numeric {
                continue;
            }

            match value.as_f64() {
                None => results.push(ValidationResult {
                    column_id: column.id.clone(),
                    severity: Severity::High,
                    message: format!("{} is not a number: {}", column.label, value),
                    suggestion: Some("Correct or clear the value".to_string()),
                }),
                Some(n)
                    if n < 0.0
                        && matches!(
                            column.capabilities.data_type,
                            DataType::Currency | DataType::Percent
                        ) =>
                {
                    results.push(ValidationResult {
                        column_id: column.id.clone(),
                        severity: Severity::Medium,
                        message: format!("{} is negative", column.label),
                        suggestion: Some(format!("Use {:.2}", n.abs())),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(results)
    }
}
