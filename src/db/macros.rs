//! Declarative macros for parameter lists and backend dispatch.
//!
//! The dispatch macro generates the repetitive per-backend match arms while
//! keeping each arm linear and readable.

/// Build a positional parameter list.
///
/// Each element is converted with `Value::from`, so any type with a
/// `From` impl (integers, floats, strings, bytes, `Option<T>`) can be mixed.
///
/// # Example
///
/// ```
/// use db_template::params;
/// use db_template::models::Value;
///
/// let params = params![50, "alice", None::<i64>];
/// assert_eq!(params[0], Value::Int(50));
/// assert_eq!(params[2], Value::Null);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::models::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::models::Value::from($value)),+]
    };
}

/// Macro for generating backend dispatch match arms.
///
/// Works for any enum in `crate::db` whose variants are named `MySql`,
/// `Postgres` and `SQLite`.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(DbPool, pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
macro_rules! impl_db_dispatch {
    ($ty:ident, $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $crate::db::$ty::$variant($p) => $body,
            )+
        }
    };
}

pub(crate) use impl_db_dispatch;
