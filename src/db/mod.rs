pub mod connection;
pub mod schema;

pub use connection::{make_pool, make_pool_with_size};
pub use schema::{
    count_nulls, count_rows, create_table_like, drop_table_if_exists, ensure_nullable_column,
    fetch_pending_positions, fetch_rows_chunk_keyset, insert_rows, require_column, require_table,
    table_columns, update_row, validate_ident,
};
