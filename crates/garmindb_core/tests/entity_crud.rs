use garmindb_core::schema::{file_type_id, FILE, FILE_TYPE, GARMIN_SCHEMA};
use garmindb_core::{EntityDescriptor, EntityRepository, FieldMap, RepoError, Store};
use rusqlite::types::Value;

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn open_store() -> Store {
    Store::open_in_memory(&GARMIN_SCHEMA).unwrap()
}

#[test]
fn create_then_find_id_returns_identifier() {
    let store = open_store();
    let repo = EntityRepository::new(&FILE_TYPE);
    let fields = FieldMap::from([("name", text("fit"))]);

    assert!(repo.create(&store, &fields).unwrap());
    let id = repo.find_id(&store, &fields).unwrap();
    assert!(id.is_some());

    // A repeated create leaves the existing row in place.
    assert!(!repo.create(&store, &fields).unwrap());
    let first = repo.find_or_create_id(&store, &fields).unwrap();
    let second = repo.find_or_create_id(&store, &fields).unwrap();
    assert_eq!(Some(first), id);
    assert_eq!(first, second);
}

#[test]
fn find_returns_none_and_empty_for_unknown_key() {
    let store = open_store();
    let repo = EntityRepository::new(&FILE_TYPE);
    let fields = FieldMap::from([("name", text("gpx"))]);

    assert!(repo.find(&store, &fields).unwrap().is_empty());
    assert!(repo.find_one(&store, &fields).unwrap().is_none());
    assert!(repo.find_id(&store, &fields).unwrap().is_none());
}

#[test]
fn created_record_holds_filtered_and_translated_fields() {
    let store = open_store();
    let repo = EntityRepository::new(&FILE);
    let input = FieldMap::from([
        ("name", text("/home/me/HealthData/FitFiles/Activities/1001.fit")),
        ("serial_number", Value::Integer(3_912_345)),
    ]);

    repo.create(&store, &input).unwrap();
    let record = repo.find_one(&store, &input).unwrap().unwrap();

    let expected = repo
        .filter_columns(&repo.translate_columns(&input))
        .unwrap();
    assert_eq!(record.get("name"), expected.get("name"));
    assert_eq!(record.text("name"), Some("1001.fit"));
    assert_eq!(record.get("type_id"), Some(&Value::Null));
    assert_eq!(record.integer("id"), Some(record.id));
    assert!(record.get("serial_number").is_none());
}

#[test]
fn relational_field_is_resolved_to_foreign_key() {
    let store = open_store();
    let repo = EntityRepository::new(&FILE);
    let input = FieldMap::from([
        ("name", text("/fit/Monitor/2002.fit")),
        ("type", text("fit")),
    ]);

    let record = repo.find_or_create(&store, &input).unwrap();

    let type_id = file_type_id(&store, "fit").unwrap();
    assert_eq!(record.integer("type_id"), Some(type_id));
    assert!(record.get("type").is_none());

    let other = repo
        .find_or_create(
            &store,
            &FieldMap::from([("name", text("2003.fit")), ("type", text("fit"))]),
        )
        .unwrap();
    assert_eq!(other.integer("type_id"), Some(type_id));
    assert_eq!(
        EntityRepository::new(&FILE_TYPE)
            .find(&store, &FieldMap::from([("name", text("fit"))]))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn null_relational_value_skips_resolver() {
    let store = open_store();
    let repo = EntityRepository::new(&FILE);
    let input = FieldMap::from([("name", text("3003.fit")), ("type", Value::Null)]);

    let record = repo.find_or_create(&store, &input).unwrap();
    assert_eq!(record.get("type_id"), Some(&Value::Null));
    assert!(EntityRepository::new(&FILE_TYPE)
        .find(&store, &FieldMap::from([("name", Value::Null)]))
        .unwrap()
        .is_empty());
}

static ACTIVITY: EntityDescriptor = EntityDescriptor {
    name: "Activity",
    table: "activities",
    columns: &["id", "activity_id", "name", "sport", "distance"],
    min_row_values: 2,
    translations: &[],
    relational_mappings: &[],
    find_key: &["activity_id"],
    timestamp: None,
};

fn store_with_activities() -> Store {
    let store = open_store();
    let session = store.session().unwrap();
    session
        .conn()
        .execute_batch(
            "CREATE TABLE activities (
                id INTEGER PRIMARY KEY,
                activity_id INTEGER,
                name TEXT,
                sport TEXT,
                distance REAL
            );",
        )
        .unwrap();
    session.commit().unwrap();
    store.register(&ACTIVITY).unwrap();
    store
}

#[test]
fn create_enforces_min_row_values() {
    let store = store_with_activities();
    let repo = EntityRepository::new(&ACTIVITY);

    let too_few = FieldMap::from([
        ("activity_id", Value::Integer(1)),
        ("name", Value::Null),
        ("lap_count", Value::Integer(4)),
    ]);
    let err = repo.create(&store, &too_few).unwrap_err();
    assert!(matches!(
        err,
        RepoError::InsufficientValues {
            entity: "Activity",
            found: 1,
            required: 2,
        }
    ));
    assert!(repo.find(&store, &too_few).unwrap().is_empty());

    let exactly = FieldMap::from([
        ("activity_id", Value::Integer(1)),
        ("name", text("Morning Run")),
    ]);
    assert!(repo.create(&store, &exactly).unwrap());
}

#[test]
fn unrecognized_fields_fail_with_all_columns_filtered() {
    let store = store_with_activities();
    let repo = EntityRepository::new(&ACTIVITY);
    let unknown = FieldMap::from([
        ("lap_count", Value::Integer(4)),
        ("cadence", Value::Integer(170)),
    ]);

    assert!(matches!(
        repo.filter_columns(&unknown),
        Err(RepoError::AllColumnsFiltered { entity: "Activity", .. })
    ));

    let file_types = EntityRepository::new(&FILE_TYPE);
    let err = file_types
        .create(
            &store,
            &FieldMap::from([("name", Value::Null), ("extension", text("fit"))]),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::InsufficientValues { found: 0, .. }));
}

#[test]
fn find_without_key_field_is_an_error() {
    let store = store_with_activities();
    let repo = EntityRepository::new(&ACTIVITY);
    let err = repo
        .find_one(&store, &FieldMap::from([("name", text("Run"))]))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::MissingKeyField {
            field: "activity_id",
            ..
        }
    ));
}

#[test]
fn find_one_rejects_ambiguous_matches() {
    let store = store_with_activities();
    let repo = EntityRepository::new(&ACTIVITY);
    // NULL keys are distinct for the unique index but equal under `IS`.
    for name in ["Ride", "Swim"] {
        let fields = FieldMap::from([
            ("activity_id", Value::Null),
            ("name", text(name)),
            ("sport", text(name)),
        ]);
        assert!(repo.create(&store, &fields).unwrap());
    }

    let key = FieldMap::from([("activity_id", Value::Null)]);
    assert_eq!(repo.find(&store, &key).unwrap().len(), 2);
    let err = repo.find_one(&store, &key).unwrap_err();
    assert!(matches!(
        err,
        RepoError::AmbiguousResult {
            entity: "Activity",
            matches: 2
        }
    ));
}

#[test]
fn update_overwrites_only_supplied_columns() {
    let store = store_with_activities();
    let repo = EntityRepository::new(&ACTIVITY);
    repo.create(
        &store,
        &FieldMap::from([
            ("activity_id", Value::Integer(7)),
            ("name", text("Lunch Ride")),
            ("sport", text("cycling")),
            ("distance", Value::Real(21.5)),
        ]),
    )
    .unwrap();

    let updated = repo
        .update(
            &store,
            &FieldMap::from([
                ("activity_id", Value::Integer(7)),
                ("distance", Value::Real(23.0)),
                ("laps", Value::Integer(3)),
            ]),
        )
        .unwrap()
        .unwrap();

    assert_eq!(updated.real("distance"), Some(23.0));
    assert_eq!(updated.text("name"), Some("Lunch Ride"));
    assert_eq!(updated.text("sport"), Some("cycling"));

    let reloaded = repo
        .find_one(&store, &FieldMap::from([("activity_id", Value::Integer(7))]))
        .unwrap()
        .unwrap();
    assert_eq!(reloaded, updated);
}

#[test]
fn update_without_match_returns_none() {
    let store = store_with_activities();
    let repo = EntityRepository::new(&ACTIVITY);
    let result = repo
        .update(
            &store,
            &FieldMap::from([("activity_id", Value::Integer(99)), ("name", text("Ghost"))]),
        )
        .unwrap();
    assert!(result.is_none());
    assert!(repo
        .find(&store, &FieldMap::from([("activity_id", Value::Integer(99))]))
        .unwrap()
        .is_empty());
}

#[test]
fn update_applies_translations() {
    let store = open_store();
    let repo = EntityRepository::new(&FILE);
    let type_id = file_type_id(&store, "fit").unwrap();
    repo.create(&store, &FieldMap::from([("name", text("/a/4004.fit"))]))
        .unwrap();

    let updated = repo
        .update(
            &store,
            &FieldMap::from([
                ("name", text("/another/dir/4004.fit")),
                ("type_id", Value::Integer(type_id)),
            ]),
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated.text("name"), Some("4004.fit"));
    assert_eq!(updated.integer("type_id"), Some(type_id));
}

#[test]
fn create_or_update_creates_then_updates() {
    let store = store_with_activities();
    let repo = EntityRepository::new(&ACTIVITY);

    let created = repo
        .create_or_update(
            &store,
            &FieldMap::from([
                ("activity_id", Value::Integer(11)),
                ("name", text("Evening Walk")),
                ("sport", text("walking")),
            ]),
        )
        .unwrap();
    assert_eq!(created.text("sport"), Some("walking"));

    let updated = repo
        .create_or_update(
            &store,
            &FieldMap::from([
                ("activity_id", Value::Integer(11)),
                ("sport", text("hiking")),
            ]),
        )
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.text("sport"), Some("hiking"));
    assert_eq!(updated.text("name"), Some("Evening Walk"));
}

#[test]
fn find_or_create_propagates_ambiguous_lookup() {
    let store = store_with_activities();
    let repo = EntityRepository::new(&ACTIVITY);
    // Each create inserts a fresh NULL-keyed row.
    let fields = FieldMap::from([("activity_id", Value::Null), ("name", text("Yoga"))]);
    repo.create(&store, &fields).unwrap();
    repo.create(&store, &fields).unwrap();

    assert!(matches!(
        repo.find_or_create(&store, &fields),
        Err(RepoError::AmbiguousResult { matches: 2, .. })
    ));
}

#[test]
fn create_reports_conflicts_outside_the_find_key() {
    let store = open_store();
    let repo = EntityRepository::new(&FILE_TYPE);
    let fit_id = repo
        .find_or_create_id(&store, &FieldMap::from([("name", text("fit"))]))
        .unwrap();

    let clashing_id = FieldMap::from([("id", Value::Integer(fit_id)), ("name", text("tcx"))]);
    let err = repo.create(&store, &clashing_id).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
    assert!(matches!(
        repo.find_or_create(&store, &clashing_id),
        Err(RepoError::Db(_))
    ));
    assert!(repo
        .find_id(&store, &FieldMap::from([("name", text("tcx"))]))
        .unwrap()
        .is_none());
}
