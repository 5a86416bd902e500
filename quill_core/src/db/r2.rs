//! R2D2 support for Quill.

pub use r2d2::ManageConnection;

use std::ops::Deref;

use crate::db::{BackendConnection, Connection, ConnectionMethods, ConnectionSpec};
use crate::Result;

/// R2D2 support for Quill. Implements [`r2d2::ManageConnection`].
#[derive(Clone, Debug)]
pub struct ConnectionManager {
    spec: ConnectionSpec,
}
impl ConnectionManager {
    /// Manage connections opened from `spec`.
    pub fn new(spec: ConnectionSpec) -> Self {
        ConnectionManager { spec }
    }
    /// The spec connections are opened from.
    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }
}

impl ManageConnection for ConnectionManager {
    type Connection = Connection;
    type Error = crate::Error;

    fn connect(&self) -> Result<Self::Connection> {
        crate::db::connect(&self.spec)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<()> {
        // Every backend answers this, unlike raw SQL.
        conn.has_table("users").map(|_| ())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

/// A pooled connection.
pub type PooledConnection = r2d2::PooledConnection<ConnectionManager>;

trait PooledConnectionExt {
    fn wrapped_connection_methods(&self) -> Result<&Connection>;
}
impl PooledConnectionExt for PooledConnection {
    // For use with connection_method_wrapper macro
    fn wrapped_connection_methods(&self) -> Result<&Connection> {
        Ok(self.deref())
    }
}
crate::connection_method_wrapper!(r2d2::PooledConnection<ConnectionManager>);
