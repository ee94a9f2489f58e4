//! Redb table definitions for buckets.
//!
//! Every bucket is its own physical redb table keyed and valued by raw bytes,
//! so the table's native ordering is the bucket's key ordering.

use redb::{TableDefinition, TableError, TableHandle, UntypedTableHandle};

use crate::engine::StorageError;

/// Table definition for a bucket of raw byte keys and values.
pub type BucketDefinition<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

/// The table definition backing the bucket `name`.
#[must_use]
pub const fn bucket_definition(name: &str) -> BucketDefinition<'_> {
    TableDefinition::new(name)
}

/// Whether a table called `name` is among `tables`.
pub(crate) fn contains_table(
    mut tables: impl Iterator<Item = UntypedTableHandle>,
    name: &str,
) -> bool {
    tables.any(|table| table.name() == name)
}

/// Map a redb table error for bucket `name` to a storage error.
pub(crate) fn table_error(name: &str, err: TableError) -> StorageError {
    match err {
        TableError::TableDoesNotExist(_) => StorageError::BucketNotFound(name.to_string()),
        e => StorageError::Internal(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_definition_name() {
        let def = bucket_definition("users");
        assert_eq!(def.name(), "users");
    }

    #[test]
    fn test_missing_table_maps_to_bucket_not_found() {
        let err = table_error("users", TableError::TableDoesNotExist("users".to_string()));
        assert!(err.is_bucket_not_found());
    }
}
