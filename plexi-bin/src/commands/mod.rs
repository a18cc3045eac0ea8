mod auth;
mod query;
mod threads;

pub(crate) use auth::{auth, logout, status};
pub(crate) use query::query;
pub(crate) use threads::threads;
