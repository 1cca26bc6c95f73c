//! Presentation: tables and JSON for records and schemas.

use crate::entity::Record;
use crate::error::StoreError;
use crate::schema::Schema;
use comfy_table::presets::{UTF8_BORDERS_ONLY, UTF8_FULL};
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::collections::BTreeSet;

/// Bold, underlined section heading
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Records as a table: object id, kind, then the union of attribute names
pub fn format_records_text(kind: &str, records: &[Record]) -> String {
    if records.is_empty() {
        return format!("No {} records.", kind);
    }
    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.attributes().keys().map(String::as_str))
        .collect();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let mut header = vec!["object".to_string(), "kind".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));
    table.set_header(header);
    for record in records {
        let mut row = vec![record.id().to_string(), record.kind().to_string()];
        row.extend(columns.iter().map(|column| {
            record
                .get(column)
                .map(|value| value.render())
                .unwrap_or_else(|| "-".to_string())
        }));
        table.add_row(row);
    }
    format!(
        "{}\n\n{}\n{} record(s)",
        format_section_heading(kind),
        table,
        records.len()
    )
}

/// Records as a JSON array; each object carries `_object` and `_kind`
pub fn format_records_json(records: &[Record]) -> Result<String, StoreError> {
    let rows: Vec<serde_json::Value> = records
        .iter()
        .map(|record| {
            let mut value = record.to_json();
            if let Some(map) = value.as_object_mut() {
                map.insert("_object".to_string(), record.id().as_u64().into());
                map.insert("_kind".to_string(), record.kind().into());
            }
            value
        })
        .collect();
    serde_json::to_string_pretty(&rows)
        .map_err(|e| StoreError::MalformedPayload(format!("Failed to render JSON: {}", e)))
}

/// Every schema with its kinds and their parents
pub fn format_schemas_text(schemas: &[std::sync::Arc<Schema>]) -> String {
    if schemas.is_empty() {
        return "No schemas registered. Declare them under [schemas] in config.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Schema", "Kind", "Parent"]);
    for schema in schemas {
        for kind in schema.kinds() {
            table.add_row(vec![
                schema.name().to_string(),
                kind.name.clone(),
                kind.parent.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
    }
    format!("{}\n\n{}", format_section_heading("Schemas"), table)
}
