//! Form submissions and their validation.
//!
//! Each form deserializes from an urlencoded body and validates itself
//! before any mutation is attempted. Failures come back as
//! [`Error::Validation`] carrying one message per failing field, ready to
//! be shown next to the form again. Lookups against the store (uniqueness,
//! existence) run after the field rules and only for fields that passed
//! them.
#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::db::ConnectionMethods;
use crate::models::{Id, Post, User};
use crate::validate::{Rule, Validator};
use crate::{Error, Result};

const PASSWORD: &[Rule] = &[
    Rule::required(),
    Rule::length(6, 50).message("Password must be at least 6 characters"),
];

/// Sign-in form.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginForm {
    /// Account email.
    pub email: String,
    /// Plain password.
    pub password: String,
    /// Checkbox value, present when ticked.
    pub remember_me: Option<String>,
}
impl LoginForm {
    /// Check the field rules.
    pub fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.field(
            "email",
            self.email.trim(),
            &[Rule::required(), Rule::email(), Rule::length(5, 120)],
        )
        .field(
            "password",
            &self.password,
            &[Rule::required(), Rule::length(6, 50)],
        );
        v.finish()
    }

    /// Whether the session should outlive the browser.
    pub fn remember(&self) -> bool {
        checkbox(self.remember_me.as_deref())
    }
}

/// Account creation form.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub bio: String,
}
impl RegisterForm {
    /// Check the field rules, then that username and email are free.
    pub fn validate<C>(&self, conn: &C) -> Result<()>
    where
        C: ConnectionMethods + ?Sized,
    {
        let mut v = Validator::new();
        v.field(
            "username",
            self.username.trim(),
            &[
                Rule::required(),
                Rule::length(3, 64).message("Username must be between 3 and 64 characters"),
            ],
        )
        .field(
            "email",
            self.email.trim(),
            &[
                Rule::required(),
                Rule::email().message("Please enter a valid email address"),
                Rule::length(5, 120),
            ],
        )
        .field("password", &self.password, PASSWORD)
        .field(
            "confirm_password",
            &self.confirm_password,
            &[
                Rule::required(),
                Rule::equal_to("password").message("Passwords must match"),
            ],
        )
        .field(
            "bio",
            &self.bio,
            &[Rule::max_length(500).message("Bio must be less than 500 characters")],
        );
        if v.is_valid("username") {
            let taken = conn.find_user_by_username(self.username.trim())?.is_some();
            v.check(
                "username",
                !taken,
                "Username is already taken. Please choose a different one.",
            );
        }
        if v.is_valid("email") {
            let taken = conn.find_user_by_email(self.email.trim())?.is_some();
            v.check(
                "email",
                !taken,
                "Email is already registered. Please use a different one.",
            );
        }
        v.finish()
    }
}

/// Profile editing form.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EditProfileForm {
    pub username: String,
    pub email: String,
    pub bio: String,
}
impl EditProfileForm {
    /// A form showing the current values of `user`.
    pub fn from_user(user: &User) -> Self {
        EditProfileForm {
            username: user.username.clone(),
            email: user.email.clone(),
            bio: user.bio.clone().unwrap_or_default(),
        }
    }

    /// Check the field rules, then that a changed username or email does
    /// not belong to another account.
    pub fn validate<C>(&self, conn: &C, current: &User) -> Result<()>
    where
        C: ConnectionMethods + ?Sized,
    {
        let mut v = Validator::new();
        v.field(
            "username",
            self.username.trim(),
            &[Rule::required(), Rule::length(2, 20)],
        )
        .field("email", self.email.trim(), &[Rule::required(), Rule::email()])
        .field("bio", &self.bio, &[Rule::max_length(500)]);
        if v.is_valid("username") {
            let other = conn.find_user_by_username(self.username.trim())?;
            v.check(
                "username",
                other.is_none_or_is(current),
                "Username is already taken. Please choose a different one.",
            );
        }
        if v.is_valid("email") {
            let other = conn.find_user_by_email(self.email.trim())?;
            v.check(
                "email",
                other.is_none_or_is(current),
                "Email is already registered. Please use a different one.",
            );
        }
        v.finish()
    }
}

trait SameUser {
    fn is_none_or_is(&self, user: &User) -> bool;
}
impl SameUser for Option<User> {
    fn is_none_or_is(&self, user: &User) -> bool {
        self.as_ref().map_or(true, |u| u.id == user.id)
    }
}

/// Password confirmation for deleting an account.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DeleteAccountForm {
    pub password: String,
}
impl DeleteAccountForm {
    /// Check the field rules. Whether the password is correct is checked
    /// by [`crate::actions::delete_account`].
    pub fn validate(&self) -> Result<()> {
        let mut v = Validator::new();
        v.field("password", &self.password, PASSWORD);
        v.finish()
    }
}

/// Post creation and editing form.
///
/// Tags arrive as a repeated `tags` field, which is why this form is
/// built with [`PostForm::from_pairs`] rather than deserialized.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PostForm {
    pub title: String,
    pub content: String,
    /// Raw category selection; empty when none was chosen.
    pub category_id: String,
    pub tags: Vec<Id>,
    pub published: bool,
}
impl Default for PostForm {
    fn default() -> Self {
        PostForm {
            title: String::new(),
            content: String::new(),
            category_id: String::new(),
            tags: Vec::new(),
            published: true,
        }
    }
}

/// The checked values of a [`PostForm`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidPost {
    pub title: String,
    pub body: String,
    pub category_id: Id,
    /// Only tags that exist, in submission order.
    pub tags: Vec<Id>,
    pub published: bool,
}

impl PostForm {
    /// Build from decoded urlencoded pairs. Tag values that are not
    /// integers are skipped; an absent `published` checkbox means false.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut form = PostForm {
            published: false,
            ..PostForm::default()
        };
        for (key, value) in pairs {
            match key.as_str() {
                "title" => form.title = value.clone(),
                "content" => form.content = value.clone(),
                "category_id" => form.category_id = value.clone(),
                "tags" => form.tags.extend(value.trim().parse::<Id>().ok()),
                "published" => form.published = checkbox(Some(value)),
                _ => {}
            }
        }
        form
    }

    /// A form showing the current values of `post`.
    pub fn from_post(post: &Post) -> Self {
        PostForm {
            title: post.title.clone(),
            content: post.body.clone(),
            category_id: post.category_id.map(|c| c.to_string()).unwrap_or_default(),
            tags: post.tags.clone(),
            published: post.published,
        }
    }

    /// The selected category, if the raw value is an id.
    pub fn category(&self) -> Option<Id> {
        self.category_id.trim().parse().ok()
    }

    /// Check the field rules and that the category exists. Unknown tags
    /// are dropped rather than rejected.
    pub fn validate<C>(&self, conn: &C) -> Result<ValidPost>
    where
        C: ConnectionMethods + ?Sized,
    {
        let mut v = Validator::new();
        v.field(
            "title",
            self.title.trim(),
            &[
                Rule::required(),
                Rule::length(3, 120).message("Title must be between 3 and 120 characters"),
            ],
        )
        .field(
            "content",
            &self.content,
            &[
                Rule::required(),
                Rule::min_length(10).message("Content must be at least 10 characters"),
            ],
        )
        .field(
            "category_id",
            &self.category_id,
            &[Rule::required().message("Please select a category")],
        );
        let category = self.category();
        if v.is_valid("category_id") {
            let exists = match category {
                Some(id) => conn.get_category(id)?.is_some(),
                None => false,
            };
            v.check("category_id", exists, "Not a valid choice.");
        }
        v.finish()?;
        let mut tags = Vec::with_capacity(self.tags.len());
        for tag in &self.tags {
            if !tags.contains(tag) && conn.get_tag(*tag)?.is_some() {
                tags.push(*tag);
            }
        }
        Ok(ValidPost {
            title: self.title.trim().to_string(),
            body: self.content.clone(),
            category_id: category.ok_or_else(|| Error::Internal("category id lost after validation".into()))?,
            tags,
            published: self.published,
        })
    }
}

/// Comment or reply form.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommentForm {
    pub content: String,
    /// Hidden field naming the comment replied to; empty for a top-level
    /// comment.
    pub parent_id: String,
}
impl CommentForm {
    /// Check the field rules and that the replied-to comment belongs to
    /// `post`. Returns the parent id, if any.
    pub fn validate<C>(&self, conn: &C, post: &Post) -> Result<Option<Id>>
    where
        C: ConnectionMethods + ?Sized,
    {
        let mut v = Validator::new();
        v.field(
            "content",
            &self.content,
            &[
                Rule::required(),
                Rule::length(2, 1000).message("Comment must be between 2 and 1000 characters"),
            ],
        );
        let raw = self.parent_id.trim();
        let mut parent = None;
        if !raw.is_empty() {
            let comment = match raw.parse::<Id>() {
                Ok(id) => conn.get_comment(id)?,
                Err(_) => None,
            };
            match comment {
                Some(c) if c.post_id == post.id => parent = Some(c.id),
                _ => {
                    v.check(
                        "parent_id",
                        false,
                        "Reply target is not a comment on this post.",
                    );
                }
            }
        }
        v.finish()?;
        Ok(parent)
    }
}

/// Category creation form.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
    pub description: String,
}
impl CategoryForm {
    /// Check the field rules and that the name is free.
    pub fn validate<C>(&self, conn: &C) -> Result<()>
    where
        C: ConnectionMethods + ?Sized,
    {
        let mut v = Validator::new();
        v.field(
            "name",
            self.name.trim(),
            &[Rule::required(), Rule::length(1, 50)],
        )
        .field("description", &self.description, &[Rule::max_length(200)]);
        if v.is_valid("name") {
            let taken = conn.find_category(self.name.trim())?.is_some();
            v.check("name", !taken, "Category already exists.");
        }
        v.finish()
    }
}

/// Tag creation form.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TagForm {
    pub name: String,
}
impl TagForm {
    /// Check the field rules and that the name is free.
    pub fn validate<C>(&self, conn: &C) -> Result<()>
    where
        C: ConnectionMethods + ?Sized,
    {
        let mut v = Validator::new();
        v.field(
            "name",
            self.name.trim(),
            &[Rule::required(), Rule::length(1, 50)],
        );
        if v.is_valid("name") {
            let taken = conn.find_tag(self.name.trim())?.is_some();
            v.check("name", !taken, "Tag already exists.");
        }
        v.finish()
    }
}

fn checkbox(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(v) => !matches!(v.trim(), "" | "false" | "0" | "off"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn post_form_collects_repeated_tags() {
        let form = PostForm::from_pairs(&pairs(&[
            ("title", "Hello"),
            ("content", "Long enough body"),
            ("category_id", "3"),
            ("tags", "1"),
            ("tags", "nope"),
            ("tags", "7"),
            ("published", "y"),
        ]));
        assert_eq!(form.tags, vec![1, 7]);
        assert_eq!(form.category(), Some(3));
        assert!(form.published);
    }

    #[test]
    fn unticked_publish_box_means_draft() {
        let form = PostForm::from_pairs(&pairs(&[("title", "Hello")]));
        assert!(!form.published);
        assert!(PostForm::default().published);
    }

    #[test]
    fn login_rules() {
        let form = LoginForm {
            email: "nobody".into(),
            password: "12345".into(),
            remember_me: None,
        };
        let Err(Error::Validation(errors)) = form.validate() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.get("email"), Some("Invalid email address."));
        assert_eq!(
            errors.get("password"),
            Some("Field must be between 6 and 50 characters long.")
        );
    }

    #[test]
    fn remember_me_checkbox() {
        let mut form = LoginForm::default();
        assert!(!form.remember());
        form.remember_me = Some("y".into());
        assert!(form.remember());
    }
}
