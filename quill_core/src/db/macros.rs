/// Implement [`ConnectionMethods`](crate::db::ConnectionMethods) for a type
/// by forwarding every method to the result of its
/// `wrapped_connection_methods()` method.
#[macro_export]
macro_rules! connection_method_wrapper {
    ($ty:path) => {
        impl $crate::db::ConnectionMethods for $ty {
            fn execute(&self, sql: &str) -> $crate::Result<()> {
                $crate::db::ConnectionMethods::execute(self.wrapped_connection_methods()?, sql)
            }
            fn has_table(&self, table: &str) -> $crate::Result<bool> {
                self.wrapped_connection_methods()?.has_table(table)
            }
            fn applied_migrations(&self) -> $crate::Result<Vec<String>> {
                self.wrapped_connection_methods()?.applied_migrations()
            }
            fn set_migration_applied(&self, name: &str, applied: bool) -> $crate::Result<()> {
                self.wrapped_connection_methods()?
                    .set_migration_applied(name, applied)
            }

            fn insert_user(&self, user: &$crate::NewUser) -> $crate::Result<$crate::User> {
                self.wrapped_connection_methods()?.insert_user(user)
            }
            fn get_user(&self, id: $crate::Id) -> $crate::Result<Option<$crate::User>> {
                self.wrapped_connection_methods()?.get_user(id)
            }
            fn find_user_by_email(&self, email: &str) -> $crate::Result<Option<$crate::User>> {
                self.wrapped_connection_methods()?.find_user_by_email(email)
            }
            fn find_user_by_username(
                &self,
                username: &str,
            ) -> $crate::Result<Option<$crate::User>> {
                self.wrapped_connection_methods()?
                    .find_user_by_username(username)
            }
            fn update_user(&self, user: &$crate::User) -> $crate::Result<()> {
                self.wrapped_connection_methods()?.update_user(user)
            }
            fn delete_user(&self, id: $crate::Id) -> $crate::Result<()> {
                self.wrapped_connection_methods()?.delete_user(id)
            }
            fn users(&self) -> $crate::Result<Vec<$crate::User>> {
                self.wrapped_connection_methods()?.users()
            }

            fn insert_category(
                &self,
                name: &str,
                description: Option<&str>,
            ) -> $crate::Result<$crate::Category> {
                self.wrapped_connection_methods()?
                    .insert_category(name, description)
            }
            fn get_category(&self, id: $crate::Id) -> $crate::Result<Option<$crate::Category>> {
                self.wrapped_connection_methods()?.get_category(id)
            }
            fn find_category(&self, name: &str) -> $crate::Result<Option<$crate::Category>> {
                self.wrapped_connection_methods()?.find_category(name)
            }
            fn categories(&self) -> $crate::Result<Vec<$crate::Category>> {
                self.wrapped_connection_methods()?.categories()
            }

            fn insert_tag(&self, name: &str) -> $crate::Result<$crate::Tag> {
                self.wrapped_connection_methods()?.insert_tag(name)
            }
            fn get_tag(&self, id: $crate::Id) -> $crate::Result<Option<$crate::Tag>> {
                self.wrapped_connection_methods()?.get_tag(id)
            }
            fn find_tag(&self, name: &str) -> $crate::Result<Option<$crate::Tag>> {
                self.wrapped_connection_methods()?.find_tag(name)
            }
            fn tags(&self) -> $crate::Result<Vec<$crate::Tag>> {
                self.wrapped_connection_methods()?.tags()
            }

            fn insert_post(&self, post: &$crate::NewPost) -> $crate::Result<$crate::Post> {
                self.wrapped_connection_methods()?.insert_post(post)
            }
            fn get_post(&self, id: $crate::Id) -> $crate::Result<Option<$crate::Post>> {
                self.wrapped_connection_methods()?.get_post(id)
            }
            fn find_post_by_slug(&self, slug: &str) -> $crate::Result<Option<$crate::Post>> {
                self.wrapped_connection_methods()?.find_post_by_slug(slug)
            }
            fn update_post(&self, post: &$crate::Post) -> $crate::Result<()> {
                self.wrapped_connection_methods()?.update_post(post)
            }
            fn delete_post(&self, id: $crate::Id) -> $crate::Result<()> {
                self.wrapped_connection_methods()?.delete_post(id)
            }
            fn query_posts(
                &self,
                filter: &$crate::PostFilter,
                limit: Option<u32>,
                offset: Option<u64>,
            ) -> $crate::Result<Vec<$crate::Post>> {
                self.wrapped_connection_methods()?
                    .query_posts(filter, limit, offset)
            }
            fn count_posts(&self, filter: &$crate::PostFilter) -> $crate::Result<u64> {
                self.wrapped_connection_methods()?.count_posts(filter)
            }

            fn insert_comment(
                &self,
                comment: &$crate::NewComment,
            ) -> $crate::Result<$crate::Comment> {
                self.wrapped_connection_methods()?.insert_comment(comment)
            }
            fn get_comment(&self, id: $crate::Id) -> $crate::Result<Option<$crate::Comment>> {
                self.wrapped_connection_methods()?.get_comment(id)
            }
            fn query_comments(
                &self,
                filter: &$crate::CommentFilter,
            ) -> $crate::Result<Vec<$crate::Comment>> {
                self.wrapped_connection_methods()?.query_comments(filter)
            }
            fn delete_comment(&self, id: $crate::Id) -> $crate::Result<()> {
                self.wrapped_connection_methods()?.delete_comment(id)
            }
        }
    };
}
