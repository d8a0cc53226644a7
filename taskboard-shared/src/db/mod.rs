/// Database layer
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: embedded schema migrations
///
/// Queries live next to their records in the `models` module.

pub mod migrations;
pub mod pool;
