//! SQL text builders shared by the relational backend.

use std::fmt::Write;

use rusqlite::types::Value;

use crate::query::{like_pattern, PostFilter};

pub const USER_COLUMNS: &str =
    "id, username, email, password_hash, bio, joined_at, last_login, is_admin";
pub const POST_COLUMNS: &str =
    "id, title, body, slug, author_id, category_id, published, created_at, updated_at";
pub const COMMENT_COLUMNS: &str =
    "id, body, author_id, post_id, parent_id, approved, created_at, updated_at";

/// Writes `SELECT <columns> FROM <table>` to `w`.
pub fn sql_select(columns: &str, table: &str, w: &mut impl Write) {
    write!(w, "SELECT {columns} FROM {table}").unwrap()
}

/// Writes the `WHERE` clause for `filter` to `w`, pushing bound values
/// onto `values`. Writes nothing if the filter is empty.
pub fn sql_post_filter(filter: &PostFilter, values: &mut Vec<Value>, w: &mut impl Write) {
    let mut conditions: Vec<&str> = Vec::new();
    if let Some(published) = filter.published {
        conditions.push("published = ?");
        values.push(Value::Integer(published as i64));
    }
    if let Some(category) = filter.category {
        conditions.push("category_id = ?");
        values.push(Value::Integer(category));
    }
    if let Some(tag) = filter.tag {
        conditions.push("id IN (SELECT post_id FROM post_tags WHERE tag_id = ?)");
        values.push(Value::Integer(tag));
    }
    if let Some(author) = filter.author {
        conditions.push("author_id = ?");
        values.push(Value::Integer(author));
    }
    if let Some(term) = &filter.search {
        conditions.push(
            "(unicode_lower(title) LIKE ? ESCAPE '\\' OR unicode_lower(body) LIKE ? ESCAPE '\\')",
        );
        // LIKE only folds ASCII, so both sides arrive lowercased.
        let pattern = like_pattern(&term.to_lowercase());
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }
    if !conditions.is_empty() {
        write!(w, " WHERE {}", conditions.join(" AND ")).unwrap();
    }
}

/// Writes the listing order for posts.
pub fn sql_post_order(w: &mut impl Write) {
    w.write_str(" ORDER BY created_at DESC, id DESC").unwrap()
}

/// Writes `LIMIT`/`OFFSET`. SQLite only accepts `OFFSET` after a `LIMIT`,
/// so a negative limit stands in for "no limit".
pub fn sql_limit_offset(limit: Option<u32>, offset: Option<u64>, w: &mut impl Write) {
    match (limit, offset) {
        (None, None) => {}
        (Some(limit), None) => write!(w, " LIMIT {limit}").unwrap(),
        (Some(limit), Some(offset)) => write!(w, " LIMIT {limit} OFFSET {offset}").unwrap(),
        (None, Some(offset)) => write!(w, " LIMIT -1 OFFSET {offset}").unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_writes_nothing() {
        let mut sql = String::new();
        let mut values = Vec::new();
        sql_post_filter(&PostFilter::new(), &mut values, &mut sql);
        assert_eq!(sql, "");
        assert!(values.is_empty());
    }

    #[test]
    fn conditions_joined_with_and() {
        let mut sql = String::new();
        let mut values = Vec::new();
        let filter = PostFilter::published().with_category(3).with_search("RÜST");
        sql_post_filter(&filter, &mut values, &mut sql);
        assert!(sql.starts_with(
            " WHERE published = ? AND category_id = ? AND (unicode_lower(title)"
        ));
        assert_eq!(
            values,
            vec![
                Value::Integer(1),
                Value::Integer(3),
                Value::Text("%rüst%".into()),
                Value::Text("%rüst%".into()),
            ]
        );
    }

    #[test]
    fn offset_without_limit() {
        let mut sql = String::new();
        sql_limit_offset(None, Some(10), &mut sql);
        assert_eq!(sql, " LIMIT -1 OFFSET 10");
    }
}
