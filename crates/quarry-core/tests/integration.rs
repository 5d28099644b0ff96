//! End-to-end tests against the public API.

use quarry_core::{
    Aggregate, ColumnDef, ColumnType, Condition, Direction, JoinSpec, JsonFilePersistence,
    QuarryDB, SchemaSet, TableSchema,
};
use serde_json::json;

fn user_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("id", ColumnType::Number).primary(),
        ColumnDef::new("email", ColumnType::Text).unique().indexed(),
        ColumnDef::new("role", ColumnType::Text).indexed(),
        ColumnDef::new("age", ColumnType::Number).indexed(),
    ]
}

fn schemas() -> SchemaSet {
    SchemaSet::new()
        .with(TableSchema::new("users", user_columns()))
        .with(TableSchema::new(
            "orders",
            vec![
                ColumnDef::new("id", ColumnType::Number).primary(),
                ColumnDef::new("user_id", ColumnType::Number).indexed(),
                ColumnDef::new("total", ColumnType::Number),
            ],
        ))
}

#[test]
fn unique_email_rejected_after_two_saves() {
    let db = QuarryDB::new(schemas());
    db.save("users", json!({"email": "a@x.com"})).unwrap();
    db.save("users", json!({"email": "b@x.com"})).unwrap();

    let err = db.save("users", json!({"email": "a@x.com"})).unwrap_err();
    assert!(err.to_string().contains("email"));
    assert_eq!(db.count("users").unwrap(), 2);
}

#[test]
fn saves_without_unique_column_never_conflict() {
    // `email` is unique and indexed, but records that omit it entirely must
    // coexist.
    let db = QuarryDB::new(schemas());
    db.save("users", json!({"role": "admin"})).unwrap();
    db.save("users", json!({"role": "user"})).unwrap();
    db.save("users", json!({"role": "user"})).unwrap();
    assert_eq!(db.count("users").unwrap(), 3);
}

#[test]
fn rejected_save_does_not_poison_its_id() {
    let db = QuarryDB::new(schemas());
    db.save("users", json!({"id": 1, "email": "a@x.com"})).unwrap();
    assert!(db
        .save("users", json!({"id": 2, "email": "a@x.com"}))
        .is_err());

    // The failed save left no index residue behind id 2.
    db.save("users", json!({"id": 2, "email": "b@x.com"})).unwrap();
    assert_eq!(db.count("users").unwrap(), 2);
}

#[test]
fn find_admins_returns_exactly_two() {
    let db = QuarryDB::new(schemas());
    for role in ["admin", "admin", "user"] {
        db.save("users", json!({"role": role})).unwrap();
    }
    let rows = db
        .query("users")
        .filter(Condition::eq("role", "admin"))
        .execute()
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn order_by_email_desc() {
    let db = QuarryDB::new(schemas());
    for email in ["a@x.com", "c@x.com", "b@x.com"] {
        db.save("users", json!({"email": email})).unwrap();
    }
    let rows = db
        .query("users")
        .order_by("email", Direction::Desc)
        .execute()
        .unwrap();
    let emails: Vec<&str> = rows.iter().map(|r| r["email"].as_str().unwrap()).collect();
    assert_eq!(emails, vec!["c@x.com", "b@x.com", "a@x.com"]);
}

#[test]
fn group_by_role_with_count() {
    let db = QuarryDB::new(schemas());
    for role in ["admin", "admin", "user"] {
        db.save("users", json!({"role": role})).unwrap();
    }
    let rows = db
        .query("users")
        .aggregate("role", Aggregate::Count)
        .execute()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["role"], json!("admin"));
    assert_eq!(rows[0]["count_role"], json!(2));
    assert_eq!(rows[1]["role"], json!("user"));
    assert_eq!(rows[1]["count_role"], json!(1));
}

#[test]
fn pagination_slice_property() {
    let db = QuarryDB::new(schemas());
    for i in 0..10 {
        db.save("users", json!({"email": format!("u{i}@x.com")}))
            .unwrap();
    }
    // offset k, limit n over m records yields [k, min(k+n, m)).
    let rows = db.query("users").offset(7).limit(5).execute().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["id"], json!(8));
}

#[test]
fn composite_predicate_laws() {
    let db = QuarryDB::new(schemas());
    for (role, age) in [("admin", 30), ("admin", 25), ("user", 40), ("user", 22)] {
        db.save("users", json!({"role": role, "age": age})).unwrap();
    }
    let a = Condition::eq("role", "admin");
    let b = Condition::gt("age", 24);

    let ids = |cond: Condition| -> Vec<i64> {
        db.query("users")
            .filter(cond)
            .execute()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect()
    };

    let a_ids = ids(a.clone());
    let b_ids = ids(b.clone());
    let and_ids = ids(Condition::and(vec![a.clone(), b.clone()]));
    let or_ids = ids(Condition::or(vec![a.clone(), b.clone()]));
    let not_ids = ids(Condition::not(a.clone()));

    // and([A, B]) is contained in both A and B.
    for id in &and_ids {
        assert!(a_ids.contains(id) && b_ids.contains(id));
    }
    // or([A, B]) is the deduplicated union.
    let mut expected_union: Vec<i64> = a_ids
        .iter()
        .chain(b_ids.iter())
        .copied()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    expected_union.sort_unstable();
    assert_eq!(or_ids, expected_union);
    // not([A]) is the complement of A.
    let all: Vec<i64> = (1..=4).collect();
    let mut reunion: Vec<i64> = a_ids.iter().chain(not_ids.iter()).copied().collect();
    reunion.sort_unstable();
    assert_eq!(reunion, all);
    for id in &not_ids {
        assert!(!a_ids.contains(id));
    }
}

#[test]
fn index_and_scan_paths_agree() {
    // Same data, one table with an indexed age column and one without: every
    // eligible predicate must select the same rows either way.
    let indexed = SchemaSet::new().with(TableSchema::new("people", user_columns()));
    let unindexed = SchemaSet::new().with(TableSchema::new(
        "people",
        vec![
            ColumnDef::new("id", ColumnType::Number).primary(),
            ColumnDef::new("email", ColumnType::Text),
            ColumnDef::new("role", ColumnType::Text),
            ColumnDef::new("age", ColumnType::Number),
        ],
    ));
    let via_index = QuarryDB::new(indexed);
    let via_scan = QuarryDB::new(unindexed);

    for (i, age) in [30, 25, 40, 25, 33].iter().enumerate() {
        let row = json!({"id": i + 1, "email": format!("u{i}@x.com"), "age": age});
        via_index.save("people", row.clone()).unwrap();
        via_scan.save("people", row).unwrap();
    }

    let predicates = vec![
        Condition::eq("age", 25),
        Condition::gt("age", 26),
        Condition::lt("age", 33),
        Condition::between("age", 25, 33),
    ];
    for cond in predicates {
        let a: Vec<i64> = via_index
            .query("people")
            .filter(cond.clone())
            .execute()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        let b: Vec<i64> = via_scan
            .query("people")
            .filter(cond.clone())
            .execute()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(a, b, "index/scan divergence for {cond:?}");
    }
}

#[test]
fn join_users_to_orders() {
    let db = QuarryDB::new(schemas());
    db.save("users", json!({"id": 1, "email": "a@x.com"})).unwrap();
    db.save("users", json!({"id": 2, "email": "b@x.com"})).unwrap();
    db.save("orders", json!({"id": 10, "user_id": 1, "total": 99.5}))
        .unwrap();

    // Left join keeps the order-less user with a [null] placeholder.
    let rows = db
        .query("users")
        .join(JoinSpec::left("orders", "user_id").alias("purchases"))
        .execute()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["purchases"][0]["total"], json!(99.5));
    assert_eq!(rows[1]["purchases"], json!([null]));

    // Inner join drops it.
    let rows = db
        .query("users")
        .inner_join("orders", "user_id")
        .execute()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(1));
}

#[test]
fn full_pipeline_in_one_query() {
    let db = QuarryDB::new(schemas());
    for (email, role, age) in [
        ("a@x.com", "admin", 30),
        ("b@x.com", "admin", 25),
        ("c@x.com", "user", 40),
        ("d@x.com", "user", 22),
        ("e@x.com", "user", 35),
    ] {
        db.save("users", json!({"email": email, "role": role, "age": age}))
            .unwrap();
    }
    let rows = db
        .query("users")
        .filter(Condition::gt("age", 23))
        .order_by("age", Direction::Desc)
        .limit(2)
        .select(["email", "age"])
        .execute()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            json!({"email": "c@x.com", "age": 40}),
            json!({"email": "e@x.com", "age": 35}),
        ]
    );
}

#[test]
fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quarry.json");

    {
        let db = QuarryDB::with_persistence(
            schemas(),
            JsonFilePersistence::new(&path),
            true,
        )
        .unwrap();
        db.save("users", json!({"email": "a@x.com", "role": "admin"}))
            .unwrap();
        db.save("users", json!({"email": "b@x.com", "role": "user"}))
            .unwrap();
    }
    assert!(path.exists());

    let db = QuarryDB::with_persistence(
        schemas(),
        JsonFilePersistence::new(&path),
        true,
    )
    .unwrap();
    assert_eq!(db.count("users").unwrap(), 2);

    // Indexes were rebuilt: indexed lookup and unique enforcement both work.
    let rows = db
        .query("users")
        .filter(Condition::eq("email", "a@x.com"))
        .execute()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(db.save("users", json!({"email": "a@x.com"})).is_err());
}

#[test]
fn update_moves_index_entry() {
    let db = QuarryDB::new(schemas());
    db.save("users", json!({"id": 1, "email": "a@x.com", "role": "admin"}))
        .unwrap();
    db.save("users", json!({"id": 1, "email": "a@x.com", "role": "user"}))
        .unwrap();

    // No dangling entry under the old value.
    let admins = db
        .query("users")
        .filter(Condition::eq("role", "admin"))
        .execute()
        .unwrap();
    assert!(admins.is_empty());
    let users = db
        .query("users")
        .filter(Condition::eq("role", "user"))
        .execute()
        .unwrap();
    assert_eq!(users.len(), 1);
}

#[test]
fn removed_record_disappears_from_queries() {
    let db = QuarryDB::new(schemas());
    db.save("users", json!({"id": 1, "email": "a@x.com", "role": "admin"}))
        .unwrap();
    let stored = db.get("users", 1).unwrap().unwrap();
    db.remove("users", &stored).unwrap();

    assert!(db.get("users", 1).unwrap().is_none());
    assert!(db
        .query("users")
        .filter(Condition::eq("email", "a@x.com"))
        .execute()
        .unwrap()
        .is_empty());
    // The freed email can be reused.
    db.save("users", json!({"email": "a@x.com"})).unwrap();
}
