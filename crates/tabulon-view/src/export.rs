//! Delimited and JSON export of the visible view

use serde::{Deserialize, Serialize};
use tabulon_core::ColumnDescriptor;

/// Field delimiter for delimited exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldDelimiter {
    #[default]
    Comma,
    Tab,
    Semicolon,
    Pipe,
}

impl FieldDelimiter {
    pub fn all() -> &'static [Self] {
        &[Self::Comma, Self::Tab, Self::Semicolon, Self::Pipe]
    }

    pub fn as_char(&self) -> char {
        match self {
            FieldDelimiter::Comma => ',',
            FieldDelimiter::Tab => '\t',
            FieldDelimiter::Semicolon => ';',
            FieldDelimiter::Pipe => '|',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordDelimiter {
    #[default]
    Lf,
    CrLf,
}

impl RecordDelimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordDelimiter::Lf => "\n",
            RecordDelimiter::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextQualifier {
    #[default]
    DoubleQuote,
    None,
}

impl TextQualifier {
    pub fn as_char(&self) -> Option<char> {
        match self {
            TextQualifier::DoubleQuote => Some('"'),
            TextQualifier::None => None,
        }
    }
}

/// Formatting options for [`export_delimited`]
///
/// The default is a quoted, comma separated, LF terminated CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    pub field_delimiter: FieldDelimiter,
    pub record_delimiter: RecordDelimiter,
    pub text_qualifier: TextQualifier,
    pub include_header: bool,
}

impl ExportOptions {
    pub fn csv() -> Self {
        Self {
            include_header: true,
            ..Default::default()
        }
    }

    pub fn with_field_delimiter(mut self, delimiter: FieldDelimiter) -> Self {
        self.field_delimiter = delimiter;
        self
    }

    pub fn with_record_delimiter(mut self, delimiter: RecordDelimiter) -> Self {
        self.record_delimiter = delimiter;
        self
    }

    pub fn with_text_qualifier(mut self, qualifier: TextQualifier) -> Self {
        self.text_qualifier = qualifier;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.include_header = false;
        self
    }
}

/// Wrap a value in the qualifier, doubling any embedded qualifier characters
pub fn qualify_value(value: &str, qualifier: Option<char>) -> String {
    match qualifier {
        Some(q) => {
            let escaped = value.replace(q, &format!("{}{}", q, q));
            format!("{}{}{}", q, escaped, q)
        }
        None => value.to_string(),
    }
}

/// Serialize `records` over `columns` in order.
///
/// The header row holds column labels, data rows hold rendered cell text.
/// Every record produces exactly one data row, and every row (header
/// included) is followed by the record delimiter.
pub fn export_delimited<T>(
    columns: &[&ColumnDescriptor<T>],
    records: &[&T],
    options: &ExportOptions,
) -> String {
    let qualifier = options.text_qualifier.as_char();
    let field_delim = options.field_delimiter.as_char().to_string();
    let record_delim = options.record_delimiter.as_str();

    let mut output = String::new();

    if options.include_header {
        let header = columns
            .iter()
            .map(|column| qualify_value(&column.label, qualifier))
            .collect::<Vec<_>>()
            .join(&field_delim);
        output.push_str(&header);
        output.push_str(record_delim);
    }

    for record in records {
        let line = columns
            .iter()
            .map(|column| qualify_value(&column.render(record), qualifier))
            .collect::<Vec<_>>()
            .join(&field_delim);
        output.push_str(&line);
        output.push_str(record_delim);
    }

    output
}

/// Quoted CSV with a header row
pub fn export_csv<T>(columns: &[&ColumnDescriptor<T>], records: &[&T]) -> String {
    export_delimited(columns, records, &ExportOptions::csv())
}

/// JSON array with one object per record, keyed by column id
pub fn export_json<T>(columns: &[&ColumnDescriptor<T>], records: &[&T]) -> serde_json::Value {
    let rows = records
        .iter()
        .map(|record| {
            let object = columns
                .iter()
                .map(|column| {
                    (
                        column.id.clone(),
                        serde_json::Value::String(column.render(record)),
                    )
                })
                .collect::<serde_json::Map<_, _>>();
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(rows)
}
