//! SQL database abstraction trait.

/// Trait for SQL database backends.
///
/// Abstracts over PostgreSQL and SQLite by providing the pool type, the
/// schema statements, and the dialect used to render sea-query statements.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync;

    /// `CREATE TABLE IF NOT EXISTS` statements, executed in order.
    const SCHEMA: &'static [&'static str];

    /// Build a SQL query string from a sea-query SELECT statement.
    fn build_select(stmt: sea_query::SelectStatement) -> String;

    /// Build a SQL query string from a sea-query INSERT statement.
    fn build_insert(stmt: sea_query::InsertStatement) -> String;
}
