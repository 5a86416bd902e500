//! URL-safe identifiers for posts.

use std::sync::LazyLock;

use chrono::naive::NaiveDateTime;
use regex::Regex;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]").expect("valid regex"));
static DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("valid regex"));

/// Derive a slug from `title` and the creation time `at`.
///
/// The title is lowercased and trimmed, spaces become `-`, anything
/// outside `[a-z0-9-]` is dropped and runs of `-` collapse to one. The
/// unix timestamp of `at` is appended so titles may repeat, but two posts
/// with the same title created within the same second share a slug.
pub fn slugify(title: &str, at: NaiveDateTime) -> String {
    let lowered = title.to_lowercase();
    let dashed = lowered.trim().replace(' ', "-");
    let cleaned = DISALLOWED.replace_all(&dashed, "");
    let collapsed = DASH_RUNS.replace_all(&cleaned, "-");
    format!("{}-{}", collapsed, at.and_utc().timestamp())
}
