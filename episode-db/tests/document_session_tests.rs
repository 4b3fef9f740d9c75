use episode_db::{
    DbError, Dialect, DocumentConfig, DocumentStore, DocumentFind, MemoryStore, Session,
    SessionConfig, eq, ge, lt, or,
};
use episode_db::store::MemoryData;
use episode_model::{Entity, Instance, ModelError, SchemaBuilder, TypeRef, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

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
        schema.text("name").one_to_many::<Student>("members")
    }
}

fn setup() -> (Dialect, Session) {
    let dialect = Dialect::document(DocumentConfig::memory());
    let mut session = Session::open(&dialect, &SessionConfig::default()).unwrap();
    session.recreate::<Department>().unwrap();
    session.recreate::<Student>().unwrap();
    (dialect, session)
}

fn department(name: &str, size: i64) -> Instance {
    Instance::of::<Department>()
        .unwrap()
        .with("name", name)
        .unwrap()
        .with("size", size)
        .unwrap()
}

fn collect(session: &mut Session, query: &episode_db::Query) -> Vec<Instance> {
    session
        .run_query(query)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// ── Session ──────────────────────────────────────────────────────

#[test]
fn student_query_hydrates_department() {
    let (_dialect, mut session) = setup();
    let mut science = department("Science", 2900);
    session.save(&mut science).unwrap();
    let mut obed = Instance::of::<Student>()
        .unwrap()
        .with("first", "Obed")
        .unwrap()
        .with("age", 45)
        .unwrap()
        .with("department", science.clone())
        .unwrap();
    session.save(&mut obed).unwrap();

    let query = session.select::<Student>().unwrap().where_(ge("age", 40));
    let found = collect(&mut session, &query);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), obed.id());
    let dept = found[0].get("department").as_entity().unwrap();
    assert_eq!(dept.get("name"), &Value::from("Science"));
    assert_eq!(
        found[0].to_json(),
        json!({ "first": "Obed", "age": 45, "department": { "name": "Science", "size": 2900 } })
    );
}

#[test]
fn native_identity_is_exposed_as_id() {
    let (_dialect, mut session) = setup();
    let mut arts = department("Arts", 120);
    session.save(&mut arts).unwrap();

    let query = session
        .select::<Department>()
        .unwrap()
        .where_(eq("id", arts.id().clone()));
    let found = collect(&mut session, &query);
    assert_eq!(found, vec![arts]);
}

#[test]
fn update_changes_fields_in_place() {
    let (_dialect, mut session) = setup();
    let mut arts = department("Arts", 120);
    session.save(&mut arts).unwrap();
    arts.set("name", "Fine Arts").unwrap();
    session.save(&mut arts).unwrap();

    let query = session.select::<Department>().unwrap();
    let found = collect(&mut session, &query);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("name"), &Value::from("Fine Arts"));
}

#[test]
fn limit_projection_and_fold() {
    let (_dialect, mut session) = setup();
    for (name, size) in [("A", 5), ("B", 50), ("C", 500), ("D", 5000), ("E", 7)] {
        session.save(&mut department(name, size)).unwrap();
    }

    let query = session.select::<Department>().unwrap().limit(2);
    assert_eq!(collect(&mut session, &query).len(), 2);

    let query = session
        .select::<Department>()
        .unwrap()
        .where_(ge("size", 10))
        .and_(lt("size", 1000))
        .or_(eq("name", "E"))
        .select_fields(["name"]);
    let found = collect(&mut session, &query);
    let names: Vec<&str> = found.iter().map(|d| d.get("name").as_str().unwrap()).collect();
    assert_eq!(names, vec!["B", "C", "E"]);
    assert!(found.iter().all(|d| d.get("size").is_null() && d.is_persisted()));
}

#[test]
fn delete_detaches_and_repeating_it_is_a_no_op() {
    let (_dialect, mut session) = setup();
    let mut arts = department("Arts", 120);
    session.save(&mut arts).unwrap();
    session.delete(&mut arts).unwrap();
    assert!(!arts.is_persisted());
    session.delete(&mut arts).unwrap();

    let query = session.select::<Department>().unwrap();
    assert!(collect(&mut session, &query).is_empty());
}

#[test]
fn drop_clears_the_collection() {
    let (dialect, mut session) = setup();
    session.save(&mut department("Arts", 120)).unwrap();
    session.drop_entity::<Department>().unwrap();

    // Sessions on the same dialect share the store.
    let mut other = Session::open(&dialect, &SessionConfig::default()).unwrap();
    let query = other.select::<Department>().unwrap();
    assert!(collect(&mut other, &query).is_empty());
}

#[test]
fn saves_target_each_instance_collection() {
    let dialect = Dialect::document(DocumentConfig::memory());
    let mut session = Session::open(&dialect, &SessionConfig::default()).unwrap();
    // No explicit create: each save finds its own collection.
    let mut science = department("Science", 2900);
    session.save(&mut science).unwrap();
    let mut obed = Instance::of::<Student>()
        .unwrap()
        .with("first", "Obed")
        .unwrap()
        .with("department", science)
        .unwrap();
    session.save(&mut obed).unwrap();

    let query = session.select::<Department>().unwrap();
    assert_eq!(collect(&mut session, &query).len(), 1);
    let query = session.select::<Student>().unwrap();
    assert_eq!(collect(&mut session, &query).len(), 1);
}

#[test]
fn dangling_reference_surfaces_missing_row() {
    let (_dialect, mut session) = setup();
    let mut science = department("Science", 2900);
    session.save(&mut science).unwrap();
    let mut obed = Instance::of::<Student>()
        .unwrap()
        .with("first", "Obed")
        .unwrap()
        .with("department", science.clone())
        .unwrap();
    session.save(&mut obed).unwrap();
    session.delete(&mut science).unwrap();

    let query = session.select::<Student>().unwrap();
    let err = session.run_query(&query).unwrap().next().unwrap().unwrap_err();
    assert!(matches!(err, DbError::MissingRelatedRow { ref storage, .. } if storage == "department"));
}

#[test]
fn nested_relations_are_hydrated() {
    let (_dialect, mut session) = setup();
    session.recreate::<Club>().unwrap();
    let mut science = department("Science", 2900);
    session.save(&mut science).unwrap();
    let mut obed = Instance::of::<Student>()
        .unwrap()
        .with("first", "Obed")
        .unwrap()
        .with("department", science.clone())
        .unwrap();
    session.save(&mut obed).unwrap();
    let mut chess = Instance::of::<Club>()
        .unwrap()
        .with("name", "Chess")
        .unwrap()
        .with("members", vec![obed])
        .unwrap();
    session.save(&mut chess).unwrap();

    let query = session.select::<Club>().unwrap();
    let found = collect(&mut session, &query);
    let member = found[0].get("members").as_entity().unwrap();
    let dept = member.get("department").as_entity().unwrap();
    assert_eq!(dept.get("name"), &Value::from("Science"));
    assert_eq!(dept.id(), science.id());
}

#[test]
fn writes_to_a_missing_collection_affect_nothing() {
    let dialect = Dialect::document(DocumentConfig::memory());
    let mut session = Session::open(&dialect, &SessionConfig::default()).unwrap();
    let mut ghost = department("Ghost", 0);
    ghost.assign_id(Value::Int(7));

    session.save(&mut ghost).unwrap();
    session.delete(&mut ghost).unwrap();
    assert!(!ghost.is_persisted());

    let mut store = MemoryStore::new(MemoryData::shared());
    assert_eq!(store.update_one("nowhere", &Value::Int(1), Default::default()).unwrap(), 0);
    assert_eq!(store.delete_one("nowhere", &Value::Int(1)).unwrap(), 0);
    assert_eq!(store.delete_many("nowhere", &json!({})).unwrap(), 0);
}

#[test]
fn unsaved_relation_is_rejected() {
    let (_dialect, mut session) = setup();
    let mut obed = Instance::of::<Student>()
        .unwrap()
        .with("first", "Obed")
        .unwrap()
        .with("department", department("Ghost", 0))
        .unwrap();
    let err = session.save(&mut obed).unwrap_err();
    assert!(matches!(err, DbError::Model(ModelError::UnboundRelation { .. })));
}

// ── Memory store ─────────────────────────────────────────────────

fn store_with(docs: &[serde_json::Value]) -> MemoryStore {
    let mut store = MemoryStore::new(MemoryData::shared());
    store.ensure_collection("items").unwrap();
    for doc in docs {
        let serde_json::Value::Object(map) = doc.clone() else {
            panic!("not an object");
        };
        store.insert_one("items", map).unwrap();
    }
    store
}

fn find(filter: serde_json::Value) -> DocumentFind {
    DocumentFind {
        filter,
        projection: serde_json::Map::new(),
        limit: None,
    }
}

#[test]
fn memory_store_evaluates_operators_and_literals() {
    let mut store = store_with(&[json!({ "n": 1 }), json!({ "n": 2 }), json!({ "n": 3 })]);

    let hits = store.find("items", &find(json!({ "n": { "$gte": 2 } }))).unwrap();
    assert_eq!(hits.len(), 2);
    let hits = store.find("items", &find(json!({ "n": 1 }))).unwrap();
    assert_eq!(hits.len(), 1);
    let hits = store.find("items", &find(json!({ "n": { "$ne": 2 } }))).unwrap();
    assert_eq!(hits.len(), 2);
    let filter = or(eq("n", 1), eq("n", 3)).to_document();
    assert_eq!(store.find("items", &find(filter)).unwrap().len(), 2);
}

#[test]
fn memory_store_assigns_increasing_ids_and_deletes() {
    let mut store = store_with(&[json!({ "n": 1 }), json!({ "n": 2 })]);
    let ids: Vec<_> = store
        .find("items", &find(json!({})))
        .unwrap()
        .into_iter()
        .map(|doc| doc["_id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(1), json!(2)]);

    assert_eq!(store.delete_one("items", &Value::Int(1)).unwrap(), 1);
    assert_eq!(store.delete_one("items", &Value::Int(1)).unwrap(), 0);
    assert_eq!(store.delete_many("items", &json!({})).unwrap(), 1);
    assert_eq!(store.collection_names().unwrap(), vec!["items".to_string()]);
}
