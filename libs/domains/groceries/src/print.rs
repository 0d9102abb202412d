//! Printable rendering of a projected list
//!
//! Produces a standalone HTML page: a numbered table of name and size with an
//! empty cost column for filling in by hand, and a zero total row.

use std::fmt::Write;

use chrono::{DateTime, Local};
use html_escape::encode_text;

use crate::models::ListedItem;

const DEFAULT_TITLE: &str = "Monthly grocery list";

const STYLE: &str = "\
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #444; padding: 4px 8px; text-align: left; }
.date { margin-bottom: 1em; color: #555; }
.total td { font-weight: bold; }";

pub struct PrintDocument<'a> {
    title: String,
    currency: String,
    generated_at: DateTime<Local>,
    rows: &'a [ListedItem],
}

impl<'a> PrintDocument<'a> {
    /// Printable page for `rows`, in the order given
    pub fn new(rows: &'a [ListedItem]) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            currency: "₹".to_string(),
            generated_at: Local::now(),
            rows,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn generated_at(mut self, at: DateTime<Local>) -> Self {
        self.generated_at = at;
        self
    }

    pub fn render_html(&self) -> String {
        let mut html = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_html(&mut html);
        html
    }

    fn write_html(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html>")?;
        writeln!(out, "<head>")?;
        writeln!(out, "<meta charset=\"utf-8\">")?;
        writeln!(out, "<title>{}</title>", encode_text(&self.title))?;
        writeln!(out, "<style>\n{STYLE}\n</style>")?;
        writeln!(out, "</head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<div class=\"print-container\">")?;
        writeln!(out, "<h2>{}</h2>", encode_text(&self.title))?;
        writeln!(
            out,
            "<div class=\"date\">{}</div>",
            self.generated_at.format("%d/%m/%Y, %H:%M:%S")
        )?;
        writeln!(out, "<table>")?;
        writeln!(out, "<tr><th>No</th><th>Name</th><th>Size</th><th>Cost</th></tr>")?;
        for (position, row) in self.rows.iter().enumerate() {
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td> </td></tr>",
                position + 1,
                encode_text(&row.item.name),
                encode_text(&row.item.size),
            )?;
        }
        writeln!(
            out,
            "<tr class=\"total\"><td colspan=\"3\">Total</td><td>{}0.00</td></tr>",
            encode_text(&self.currency)
        )?;
        writeln!(out, "</table>")?;
        writeln!(out, "</div>")?;
        writeln!(out, "</body>")?;
        writeln!(out, "</html>")
    }
}
