//! Plain-text table of listed items

use domain_groceries::ListedItem;
use domain_groceries::models::status_text;

const HEADER: [&str; 6] = ["No", "Name", "Size", "Status", "Notes", "Id"];

pub fn render(rows: &[ListedItem]) -> String {
    if rows.is_empty() {
        return "(no items)\n".to_string();
    }

    let cells: Vec<[String; 6]> = rows
        .iter()
        .map(|row| {
            [
                row.display_index.to_string(),
                row.item.name.clone(),
                row.item.size.clone(),
                status_text(row.item.status).to_string(),
                row.item.notes.clone().unwrap_or_default(),
                row.item.id.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADER.map(|title| title.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = format_line(HEADER.iter().copied(), &widths);
    for row in &cells {
        out.push_str(&format_line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}
