//! C4: the relational store. A thin `sqlx` layer over Postgres — typed row
//! structs plus one function per query the rest of Morpheus needs, rather
//! than a generic query builder, following the teacher's preference for
//! small explicit modules over a framework layer.

pub mod error;
pub mod model;
pub mod pool;
pub mod queries;

pub use error::DbError;
pub use model::{Company, Event, Link, Message, MessageGroup};
pub use pool::connect;

/// Embeds and runs pending migrations against `pool`, mirroring the
/// teacher's `kumod` startup sequencing (schema is brought up before the
/// server starts accepting traffic).
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
