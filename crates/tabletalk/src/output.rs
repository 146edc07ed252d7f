//! Terminal rendering for the operator loop.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use tabletalk_db::DbValue;

/// Render a result set as a table, showing at most `max_rows` rows.
pub fn render_table(columns: &[String], rows: &[Vec<DbValue>], max_rows: usize) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = columns
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows.iter().take(max_rows) {
        table.add_row(row.iter().map(|v| v.to_string()));
    }

    let mut rendered = table.to_string();
    if rows.len() > max_rows {
        rendered.push_str(&format!("\n... {} more rows", rows.len() - max_rows));
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table_contains_cells() {
        let columns = vec!["name".to_string(), "age".to_string()];
        let rows = vec![
            vec![DbValue::from("ada"), DbValue::Integer(36)],
            vec![DbValue::from("bob"), DbValue::Null],
        ];

        let rendered = render_table(&columns, &rows, 10);
        assert!(rendered.contains("name"));
        assert!(rendered.contains("ada"));
        assert!(rendered.contains("NULL"));
        assert!(!rendered.contains("more rows"));
    }

    #[test]
    fn test_render_table_notes_hidden_rows() {
        let columns = vec!["n".to_string()];
        let rows: Vec<Vec<DbValue>> = (0..4).map(|i| vec![DbValue::Integer(i)]).collect();

        let rendered = render_table(&columns, &rows, 3);
        assert!(rendered.ends_with("... 1 more rows"));
    }
}
