use episode_db::{
    DbError, Dialect, Session, SessionConfig, SqliteConfig, eq, ge, gt, lt,
};
use episode_model::{Entity, Instance, ModelError, SchemaBuilder, TypeRef, Value, schema_of};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Department;

impl Entity for Department {
    const NAME: &'static str = "Department";

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema.text("name").integer("size")
    }
}

struct Student;

impl Entity for Student {
    const NAME: &'static str = "Student";

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .text("first")
            .optional("age", TypeRef::Integer)
            .one_to_one::<Department>("department")
    }
}

struct Club;

impl Entity for Club {
    const NAME: &'static str = "Club";

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .real("dues")
            .boolean("active")
            .one_to_many::<Student>("members")
    }
}

fn setup() -> (TempDir, Session) {
    let dir = tempfile::tempdir().unwrap();
    let dialect = Dialect::sqlite(SqliteConfig::new(dir.path().join("school.db")));
    let mut session = Session::open(&dialect, &SessionConfig::default()).unwrap();
    session.recreate::<Department>().unwrap();
    session.recreate::<Student>().unwrap();
    session.recreate::<Club>().unwrap();
    (dir, session)
}

fn department(name: &str, size: i64) -> Instance {
    Instance::of::<Department>()
        .unwrap()
        .with("name", name)
        .unwrap()
        .with("size", size)
        .unwrap()
}

fn student(first: &str, age: i64, department: &Instance) -> Instance {
    Instance::of::<Student>()
        .unwrap()
        .with("first", first)
        .unwrap()
        .with("age", age)
        .unwrap()
        .with("department", department.clone())
        .unwrap()
}

fn collect(session: &mut Session, query: &episode_db::Query) -> Vec<Instance> {
    session
        .run_query(query)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// ── Save & query ─────────────────────────────────────────────────

#[test]
fn student_query_hydrates_department() {
    let (_dir, mut session) = setup();
    let mut science = department("Science", 2900);
    session.save(&mut science).unwrap();
    let mut obed = student("Obed", 45, &science);
    session.save(&mut obed).unwrap();

    let query = session.select::<Student>().unwrap().where_(ge("age", 40));
    let found = collect(&mut session, &query);

    assert_eq!(found.len(), 1);
    let dept = found[0].get("department").as_entity().unwrap();
    assert_eq!(dept.get("name"), &Value::from("Science"));
    assert_eq!(dept.get("size"), &Value::Int(2900));
    assert_eq!(dept.id(), science.id());
    assert_eq!(
        found[0].to_string(),
        "<Student first=Obed, age=45, department=<Department name=Science, size=2900, id=1>, id=1>"
    );
}

#[test]
fn save_assigns_identity_and_round_trips() {
    let (_dir, mut session) = setup();
    let mut arts = department("Arts", 120);
    assert!(!arts.is_persisted());
    session.save(&mut arts).unwrap();
    assert!(arts.is_persisted());

    let query = session
        .select::<Department>()
        .unwrap()
        .where_(eq("id", arts.id().clone()));
    let found = collect(&mut session, &query);
    assert_eq!(found, vec![arts]);
}

#[test]
fn saving_a_persisted_instance_updates_it() {
    let (_dir, mut session) = setup();
    let mut arts = department("Arts", 120);
    session.save(&mut arts).unwrap();
    let id = arts.id().clone();

    arts.set("size", 150).unwrap();
    session.save(&mut arts).unwrap();
    assert_eq!(arts.id(), &id);

    let query = session.select::<Department>().unwrap();
    let found = collect(&mut session, &query);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("size"), &Value::Int(150));
}

#[test]
fn limit_caps_the_number_of_rows() {
    let (_dir, mut session) = setup();
    for i in 0..5 {
        session.save(&mut department(&format!("D{i}"), i)).unwrap();
    }
    let query = session.select::<Department>().unwrap().limit(2);
    assert_eq!(collect(&mut session, &query).len(), 2);
}

#[test]
fn folded_filter_runs_against_the_store() {
    let (_dir, mut session) = setup();
    for (name, size) in [("A", 5), ("B", 50), ("C", 500)] {
        session.save(&mut department(name, size)).unwrap();
    }
    // ((size > 10 AND size < 100) OR name = 'C')
    let query = session
        .select::<Department>()
        .unwrap()
        .where_(gt("size", 10))
        .and_(lt("size", 100))
        .or_(eq("name", "C"));
    let mut names: Vec<String> = collect(&mut session, &query)
        .iter()
        .map(|d| d.get("name").as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["B", "C"]);
}

#[test]
fn projection_returns_only_selected_fields() {
    let (_dir, mut session) = setup();
    session.save(&mut department("Arts", 120)).unwrap();
    let query = session.select::<Department>().unwrap().select_fields(["name"]);
    let found = collect(&mut session, &query);
    assert_eq!(found[0].get("name"), &Value::from("Arts"));
    assert_eq!(found[0].get("size"), &Value::Null);
}

#[test]
fn results_are_hydrated_lazily() {
    let (_dir, mut session) = setup();
    let mut science = department("Science", 2900);
    session.save(&mut science).unwrap();
    session.save(&mut student("Obed", 45, &science)).unwrap();

    let query = session.select::<Student>().unwrap();
    let mut rows = session.run_query(&query).unwrap();
    assert_eq!(rows.size_hint(), (1, Some(1)));
    assert!(rows.next().unwrap().is_ok());
    assert!(rows.next().is_none());
}

// ── Delete ───────────────────────────────────────────────────────

#[test]
fn delete_detaches_and_repeating_it_is_a_no_op() {
    let (_dir, mut session) = setup();
    let mut arts = department("Arts", 120);
    session.save(&mut arts).unwrap();

    session.delete(&mut arts).unwrap();
    assert_eq!(arts.id(), &Value::Null);
    session.delete(&mut arts).unwrap();
    assert_eq!(arts.id(), &Value::Null);

    let query = session.select::<Department>().unwrap();
    assert!(collect(&mut session, &query).is_empty());
}

// ── Relations ────────────────────────────────────────────────────

#[test]
fn unsaved_relation_is_rejected() {
    let (_dir, mut session) = setup();
    let unsaved = department("Ghost", 0);
    let mut obed = student("Obed", 45, &unsaved);

    let err = session.save(&mut obed).unwrap_err();
    assert!(matches!(
        err,
        DbError::Model(ModelError::UnboundRelation { .. })
    ));
    assert!(!obed.is_persisted());
}

#[test]
fn dangling_foreign_key_surfaces_missing_row() {
    let (_dir, mut session) = setup();
    let mut science = department("Science", 2900);
    session.save(&mut science).unwrap();
    session.save(&mut student("Obed", 45, &science)).unwrap();
    session.delete(&mut science).unwrap();

    let query = session.select::<Student>().unwrap();
    let err = session.run_query(&query).unwrap().next().unwrap().unwrap_err();
    match err {
        DbError::MissingRelatedRow { storage, id } => {
            assert_eq!(storage, "department");
            assert_eq!(id, "1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn one_to_many_holds_a_single_foreign_key() {
    let (_dir, mut session) = setup();
    let mut science = department("Science", 2900);
    session.save(&mut science).unwrap();
    let mut obed = student("Obed", 45, &science);
    session.save(&mut obed).unwrap();

    let mut chess = Instance::of::<Club>()
        .unwrap()
        .with("dues", 12.5)
        .unwrap()
        .with("active", true)
        .unwrap()
        .with("members", vec![obed.clone()])
        .unwrap();
    session.save(&mut chess).unwrap();

    let query = session.select::<Club>().unwrap();
    let found = collect(&mut session, &query);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("dues"), &Value::Real(12.5));
    assert_eq!(found[0].get("active"), &Value::Bool(true));
    // Hydration yields the single related instance, not a list.
    let member = found[0].get("members").as_entity().unwrap();
    assert_eq!(member.get("first"), &Value::from("Obed"));
    // Relations of the related instance are hydrated too.
    let dept = member.get("department").as_entity().unwrap();
    assert_eq!(dept.get("name"), &Value::from("Science"));
    assert_eq!(dept.id(), science.id());
}

#[test]
fn one_to_many_rejects_several_instances() {
    let (_dir, mut session) = setup();
    let mut science = department("Science", 2900);
    let mut arts = department("Arts", 120);
    session.save(&mut science).unwrap();
    session.save(&mut arts).unwrap();
    let mut obed = student("Obed", 45, &science);
    let mut ama = student("Ama", 21, &arts);
    session.save(&mut obed).unwrap();
    session.save(&mut ama).unwrap();

    let mut chess = Instance::of::<Club>()
        .unwrap()
        .with("dues", 1.0)
        .unwrap()
        .with("active", false)
        .unwrap()
        .with("members", vec![obed, ama])
        .unwrap();
    let err = session.save(&mut chess).unwrap_err();
    assert!(matches!(
        err,
        DbError::Model(ModelError::MultiValuedRelation { count: 2, .. })
    ));
}

// ── Session lifecycle ────────────────────────────────────────────

#[test]
fn scope_returns_the_closure_result() {
    let dir = tempfile::tempdir().unwrap();
    let dialect = Dialect::sqlite(SqliteConfig::new(dir.path().join("scope.db")));

    let id = Session::scope(&dialect, &SessionConfig::default(), |session| {
        session.recreate::<Department>()?;
        let mut arts = department("Arts", 120);
        session.save(&mut arts)?;
        Ok(arts.id().clone())
    })
    .unwrap();
    assert_eq!(id, Value::Int(1));

    // A second session sees what the first committed.
    let count = Session::scope(&dialect, &SessionConfig::default(), |session| {
        let query = session.select::<Department>()?;
        Ok(session.run_query(&query)?.count())
    })
    .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn scope_propagates_closure_errors() {
    let dialect = Dialect::sqlite(SqliteConfig::in_memory());
    let result: Result<(), DbError> = Session::scope(&dialect, &SessionConfig::default(), |session| {
        // The table was never created.
        let query = session.select::<Department>()?;
        session.run_query(&query)?;
        Ok(())
    });
    assert!(matches!(result, Err(DbError::Statement { .. })));
}

#[test]
fn entity_level_schema_operations() {
    let dialect = Dialect::sqlite(SqliteConfig::in_memory());
    let mut session = Session::open(&dialect, &SessionConfig::default()).unwrap();
    session.create::<Department>().unwrap();
    session.save(&mut department("Arts", 120)).unwrap();

    session.recreate::<Department>().unwrap();
    let query = session.select::<Department>().unwrap();
    assert!(collect(&mut session, &query).is_empty());

    session.drop_entity::<Department>().unwrap();
    let err = session.run_query(&query).err().unwrap();
    assert!(matches!(err, DbError::Statement { .. }));
}

#[test]
fn explicit_close_releases_the_connection() {
    let dialect = Dialect::sqlite(SqliteConfig::in_memory());
    let mut session = Session::open(&dialect, &SessionConfig::default()).unwrap();
    assert_eq!(session.dialect_name(), "sqlite");
    session.create_schema(&schema_of::<Department>().unwrap()).unwrap();
    session.close().unwrap();
}

#[test]
fn unreachable_database_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let dialect = Dialect::sqlite(SqliteConfig::new(dir.path().join("missing").join("x.db")));
    let err = Session::open(&dialect, &SessionConfig::default()).err().unwrap();
    assert!(matches!(err, DbError::Connection(_)));
}
