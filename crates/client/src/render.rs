//! Plain-text table rendering for the terminal binary.

use std::fmt::Write as _;

use pricelist_catalog::Amount;

use crate::session::RowView;

/// Group the integer part in thousands with spaces: `12500.5` -> `12 500.50`.
///
/// Amounts that are not numbers are shown as they were received.
pub fn format_price(amount: &Amount) -> String {
    let Some(value) = amount.value() else {
        return amount.text().to_string();
    };

    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    if value < 0.0 {
        grouped.push('-');
    }
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }
    grouped.push('.');
    grouped.push_str(frac_part);
    grouped
}

/// One line per row: checkbox, id, title, brand, category, prices, stock.
pub fn render_table(rows: &[RowView<'_>]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<3} {:>6}  {:<32} {:<14} {:<18} {:>12} {:>10} {:>6}",
        "", "id", "title", "brand", "category", "UAH", "USD", "stock"
    );
    for row in rows {
        let p = row.product;
        let _ = writeln!(
            out,
            "{:<3} {:>6}  {:<32} {:<14} {:<18} {:>12} {:>10} {:>6}",
            if row.checked { "[x]" } else { "[ ]" },
            p.id.to_string(),
            truncate(p.title.as_deref().unwrap_or(""), 32),
            truncate(p.brand(), 14),
            truncate(p.category_name(), 18),
            format_price(&p.price_uah),
            format_price(&p.price_usd),
            p.stock,
        );
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
