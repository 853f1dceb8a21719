//! Database layer
//!
//! - `pool`: PostgreSQL connection pool with health checks
//! - `migrations`: embedded schema migrations (`taskflow-shared/migrations`)
//!
//! Queries live next to the types they return in [`crate::models`].

pub mod migrations;
pub mod pool;
