//! Plain-text table rendering for terminal output

use wdlink_core::{KeywordRow, Relation, RowOutcome};

/// Column-aligned text table
struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(render_line(self.headers.iter().copied(), &widths));
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in &self.rows {
            out.push(render_line(row.iter().map(String::as_str), &widths));
        }
        out.join("\n")
    }
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// Keyword rows as `keyword | count | score | qid | label | link`
pub fn keyword_table(rows: &[KeywordRow], entity_base_url: &str) -> String {
    let mut table = Table::new(vec!["keyword", "count", "score", "qid", "label", "link"]);

    for row in rows {
        let mut cells = vec![
            row.keyword.clone(),
            row.occurrences.to_string(),
            format!("{:.2}", row.score),
        ];
        match &row.outcome {
            RowOutcome::Resolved(resolution) => match &resolution.qid {
                Some(qid) => cells.extend([
                    qid.to_string(),
                    resolution.label.clone().unwrap_or_default(),
                    qid.page_url(entity_base_url),
                ]),
                None => cells.extend(["-".to_string(), "(unresolved)".to_string(), String::new()]),
            },
            RowOutcome::Failed { reason } => {
                cells.extend(["!".to_string(), format!("error: {reason}"), String::new()])
            }
        }
        table.push(cells);
    }

    table.render()
}

/// Relations as `property | value | unit | rank | link`
pub fn relation_table(relations: &[Relation]) -> String {
    let mut table = Table::new(vec!["property", "value", "unit", "rank", "link"]);

    for relation in relations {
        table.push(vec![
            format!("{} ({})", relation.property_label, relation.property_id),
            relation.value_label.clone(),
            relation.unit.clone().unwrap_or_default(),
            relation.rank.to_string(),
            relation.value_link.clone().unwrap_or_default(),
        ]);
    }

    table.render()
}
