use super::*;

#[test]
fn classifies_postgres_missing_column_with_relation() {
    let err = StoreError::from_message(r#"column "deleted_at" of relation "map_zones" does not exist"#);
    assert_eq!(err, StoreError::MissingColumn { table: "map_zones".into(), column: "deleted_at".into() });
    assert!(err.is_missing_tombstone());
}

#[test]
fn classifies_postgres_missing_column_without_relation() {
    let err = StoreError::from_message(r#"column "deleted_by" does not exist"#);
    assert_eq!(err, StoreError::MissingColumn { table: String::new(), column: "deleted_by".into() });
    assert!(err.is_missing_tombstone());
}

#[test]
fn classifies_dotted_missing_column() {
    let err = StoreError::from_message("column map_zones.deleted_at does not exist");
    assert_eq!(err, StoreError::MissingColumn { table: "map_zones".into(), column: "deleted_at".into() });
}

#[test]
fn classifies_schema_cache_message() {
    let err = StoreError::from_message("Could not find the 'deleted_at' column of 'map_zones' in the schema cache");
    assert!(err.is_missing_tombstone());
}

#[test]
fn other_missing_columns_are_not_tombstones() {
    let err = StoreError::from_message(r#"column "sort_index" does not exist"#);
    assert!(matches!(err, StoreError::MissingColumn { .. }));
    assert!(!err.is_missing_tombstone());
}

#[test]
fn classifies_missing_relation_as_outdated_schema() {
    let err = StoreError::from_message(r#"relation "story_links" does not exist"#);
    assert!(matches!(err, StoreError::SchemaOutdated(_)));
}

#[test]
fn classifies_authorization_errors() {
    for msg in ["JWT expired", "permission denied for table maps", "new row violates row-level security policy"] {
        assert!(matches!(StoreError::from_message(msg), StoreError::Unauthorized(_)), "{msg}");
    }
}

#[test]
fn classifies_conflicts_and_everything_else() {
    assert!(matches!(
        StoreError::from_message("duplicate key value violates unique constraint \"maps_node_id_key\""),
        StoreError::Conflict(_)
    ));
    assert_eq!(StoreError::from_message("network timeout"), StoreError::Remote("network timeout".into()));
}

#[test]
fn not_found_display() {
    let id = Uuid::nil();
    let err = StoreError::NotFound { entity: "zone", id };
    assert_eq!(err.to_string(), format!("zone not found: {id}"));
}
