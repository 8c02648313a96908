//! Console preview of task results as a bordered table.

use crate::models::{ResultRow, Task};

/// Narrowest column, even for one-letter headers
const MIN_COLUMN_WIDTH: usize = 3;

/// Render up to `limit` rows as a table with `+---+` borders.
///
/// Cells are left-aligned and never truncated. When rows were cut, a
/// footer tells how many are shown.
pub fn render_table<R: ResultRow>(rows: &[R], limit: usize) -> String {
    let shown: Vec<Vec<String>> = rows.iter().take(limit).map(R::cells).collect();

    let widths: Vec<usize> = R::HEADER
        .iter()
        .enumerate()
        .map(|(i, name)| {
            shown
                .iter()
                .filter_map(|cells| cells.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
                .max(MIN_COLUMN_WIDTH)
        })
        .collect();

    let border: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(*w)))
        .collect::<String>()
        + "+\n";

    let line = |cells: &[String]| -> String {
        let mut out: String = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!("|{:<width$}", cell, width = *w)
            })
            .collect();
        out.push_str("|\n");
        out
    };

    let header: Vec<String> = R::HEADER.iter().map(|h| h.to_string()).collect();
    let mut out = String::new();
    out.push_str(&border);
    out.push_str(&line(&header));
    out.push_str(&border);
    for cells in &shown {
        out.push_str(&line(cells));
    }
    out.push_str(&border);

    if rows.len() > limit {
        let noun = if limit == 1 { "row" } else { "rows" };
        out.push_str(&format!("only showing top {} {}\n", limit, noun));
    }
    out
}

/// Print the titled preview of one task's result to stdout.
pub fn show<R: ResultRow>(task: Task, rows: &[R]) {
    println!("=== {} ===", task.title());
    print!("{}", render_table(rows, task.preview_rows()));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FavoriteGenre, GenreLoyalty, Key, NightListener};
    use std::sync::Arc;

    #[test]
    fn test_render_table_layout() {
        let rows = vec![
            FavoriteGenre {
                user_id: Some(Key::Text(Arc::from("user_1"))),
                genre: Some(Arc::from("Classical")),
                listen_count: 12,
            },
            FavoriteGenre {
                user_id: Some(Key::Text(Arc::from("user_2"))),
                genre: None,
                listen_count: 3,
            },
        ];
        let expected = "\
+-------+---------+------------+
|user_id|genre    |listen_count|
+-------+---------+------------+
|user_1 |Classical|12          |
|user_2 |null     |3           |
+-------+---------+------------+
";
        assert_eq!(render_table(&rows, 10), expected);
    }

    #[test]
    fn test_render_table_footer_when_cut() {
        let rows: Vec<NightListener> = (1..=5)
            .map(|i| NightListener {
                user_id: Some(Key::Int(i)),
            })
            .collect();
        let out = render_table(&rows, 2);
        assert!(out.ends_with("+-------+\nonly showing top 2 rows\n"));
        assert!(out.contains("|1      |\n|2      |\n"));
        assert!(!out.contains("|3      |"));
    }

    #[test]
    fn test_render_empty_table() {
        let rows: Vec<GenreLoyalty> = Vec::new();
        let out = render_table(&rows, 20);
        // top border, header, separator, bottom border
        assert_eq!(out.lines().count(), 4);
        assert!(out.contains("|user_id|top_genre|top_genre_plays|total_plays|loyalty_score|"));
    }

    #[test]
    fn test_no_footer_when_all_rows_fit() {
        let rows = vec![NightListener {
            user_id: Some(Key::Int(1)),
        }];
        let out = render_table(&rows, 1);
        assert!(out.starts_with("+-------+\n"));
        assert!(!out.contains("only showing"));
    }
}
