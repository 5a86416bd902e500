//! Filters for listing posts and comments.
//!
//! A filter is a conjunction of optional predicates. The SQLite backend
//! renders it into a parameterised `WHERE` clause; the document store
//! evaluates it directly with [`PostFilter::matches`] and
//! [`CommentFilter::matches`]. Both order results the same way, see
//! [`sort_posts`] and [`sort_comments`].

#![allow(missing_docs)]

use std::cmp::Ordering;

use crate::models::{Comment, Id, Post};

/// Predicate over posts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PostFilter {
    pub published: Option<bool>,
    pub category: Option<Id>,
    pub tag: Option<Id>,
    pub author: Option<Id>,
    /// Case-insensitive substring of the title or the body.
    pub search: Option<String>,
}
impl PostFilter {
    /// A filter matching every post.
    pub fn new() -> Self {
        PostFilter::default()
    }

    /// A filter matching every published post.
    pub fn published() -> Self {
        PostFilter::new().with_published(true)
    }

    pub fn with_published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    pub fn with_category(mut self, category: Id) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_tag(mut self, tag: Id) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_author(mut self, author: Id) -> Self {
        self.author = Some(author);
        self
    }

    /// Restrict to posts whose title or body contains `term`. Blank terms
    /// are ignored.
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        let trimmed = term.trim();
        self.search = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// Evaluate the filter against a single post.
    pub fn matches(&self, post: &Post) -> bool {
        if let Some(published) = self.published {
            if post.published != published {
                return false;
            }
        }
        if self.category.is_some() && post.category_id != self.category {
            return false;
        }
        if let Some(tag) = self.tag {
            if !post.tags.contains(&tag) {
                return false;
            }
        }
        if let Some(author) = self.author {
            if post.author_id != author {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !post.title.to_lowercase().contains(&term)
                && !post.body.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

/// Predicate over comments.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentFilter {
    pub post: Option<Id>,
    pub author: Option<Id>,
}
impl CommentFilter {
    pub fn for_post(post: Id) -> Self {
        CommentFilter {
            post: Some(post),
            author: None,
        }
    }

    pub fn by_author(author: Id) -> Self {
        CommentFilter {
            post: None,
            author: Some(author),
        }
    }

    pub fn matches(&self, comment: &Comment) -> bool {
        self.post.map_or(true, |p| comment.post_id == p)
            && self.author.map_or(true, |a| comment.author_id == a)
    }
}

/// Listing order for posts: most recent first, then newest insertion first.
pub fn post_order(a: &Post, b: &Post) -> Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

/// Sort posts into listing order.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(post_order);
}

/// Sort comments oldest first, then by insertion.
pub fn sort_comments(comments: &mut [Comment]) {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

/// Build a `LIKE` pattern matching `term` anywhere, escaping wildcards
/// with `\`.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::now;

    fn post(id: Id, title: &str, body: &str) -> Post {
        Post {
            id,
            title: title.to_string(),
            body: body.to_string(),
            slug: format!("post-{id}"),
            author_id: 1,
            category_id: Some(10),
            tags: vec![100, 101],
            published: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(PostFilter::new().matches(&post(1, "a", "b")));
    }

    #[test]
    fn search_is_case_insensitive_on_title_or_body() {
        let p = post(1, "The Tiger", "A cat which would like to eat you.");
        assert!(PostFilter::new().with_search("tiger").matches(&p));
        assert!(PostFilter::new().with_search("EAT").matches(&p));
        assert!(!PostFilter::new().with_search("mountain").matches(&p));
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(PostFilter::new().with_search("   ").search, None);
    }

    #[test]
    fn category_tag_and_author() {
        let p = post(1, "t", "b");
        assert!(PostFilter::new().with_category(10).matches(&p));
        assert!(!PostFilter::new().with_category(11).matches(&p));
        assert!(PostFilter::new().with_tag(101).matches(&p));
        assert!(!PostFilter::new().with_tag(102).matches(&p));
        assert!(!PostFilter::new().with_author(2).matches(&p));
    }

    #[test]
    fn unpublished_excluded() {
        let mut p = post(1, "t", "b");
        p.published = false;
        assert!(!PostFilter::published().matches(&p));
        assert!(PostFilter::new().matches(&p));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }

    #[test]
    fn posts_sorted_newest_first_with_insertion_tiebreak() {
        let a = post(1, "a", "b");
        let mut b = post(2, "a", "b");
        b.created_at = a.created_at;
        let mut c = post(3, "a", "b");
        c.created_at = a.created_at - chrono::TimeDelta::seconds(10);
        let mut posts = vec![c.clone(), a.clone(), b.clone()];
        sort_posts(&mut posts);
        let ids: Vec<Id> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
