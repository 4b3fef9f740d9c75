use episode_model::{Entity, Instance, ModelError, SchemaBuilder, TypeRef, Value, schema_of};
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
            .boolean("active")
            .real("gpa")
            .one_to_one::<Department>("department")
    }
}

struct Hall;

impl Entity for Hall {
    const NAME: &'static str = "Hall";

    fn declare(schema: SchemaBuilder) -> SchemaBuilder {
        schema.one_to_many::<Student>("students")
    }
}

fn science() -> Instance {
    Instance::with_values(
        schema_of::<Department>().unwrap(),
        [("name", Value::from("Science")), ("size", Value::from(2900))],
    )
    .unwrap()
}

fn saved(mut instance: Instance, id: i64) -> Instance {
    instance.assign_id(Value::Int(id));
    instance
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn new_instance_has_null_identity() {
    let dept = science();
    assert_eq!(dept.id(), &Value::Null);
    assert!(!dept.is_persisted());
}

#[test]
fn constructor_values_are_readable() {
    let dept = science();
    assert_eq!(dept.get("name").as_str(), Some("Science"));
    assert_eq!(dept.get("size").as_int(), Some(2900));
}

#[test]
fn unassigned_field_reads_as_null() {
    let student = Instance::of::<Student>().unwrap();
    assert!(student.get("first").is_null());
    assert!(student.get("does_not_exist").is_null());
}

#[test]
fn builder_style_assignment() {
    let student = Instance::of::<Student>()
        .unwrap()
        .with("first", "Obed")
        .unwrap()
        .with("age", 45)
        .unwrap();
    assert_eq!(student.get("first"), &Value::from("Obed"));
    assert_eq!(student.get("age"), &Value::Int(45));
}

// ── Validation on write ──────────────────────────────────────────

#[test]
fn mismatched_scalar_is_rejected() {
    let mut dept = science();
    let err = dept.set("size", "large").unwrap_err();
    assert_eq!(
        err,
        ModelError::TypeMismatch {
            field: "size".into(),
            expected: "integer".into(),
            found: "text".into(),
        }
    );
    // The previous value is untouched.
    assert_eq!(dept.get("size").as_int(), Some(2900));
}

#[test]
fn null_is_accepted_for_any_field() {
    let mut student = Instance::of::<Student>().unwrap();
    student.set("age", Value::Null).unwrap();
    student.set("first", Option::<&str>::None).unwrap();
    assert!(student.get("age").is_null());
}

#[test]
fn boolean_and_real_fields_are_strict() {
    let mut student = Instance::of::<Student>().unwrap();
    student.set("active", true).unwrap();
    student.set("gpa", 3.5).unwrap();
    assert!(student.set("active", 1).is_err());
    assert!(student.set("gpa", 3).is_err());
}

#[test]
fn unknown_field_assignment_fails() {
    let mut dept = science();
    let err = dept.set("budget", 10).unwrap_err();
    assert!(matches!(err, ModelError::UnknownField { .. }));
}

#[test]
fn relation_requires_matching_entity_type() {
    let mut student = Instance::of::<Student>().unwrap();
    student.set("department", science()).unwrap();

    let other = Instance::of::<Hall>().unwrap();
    let err = student.set("department", other).unwrap_err();
    assert!(matches!(err, ModelError::TypeMismatch { expected, found, .. }
        if expected == "Department" && found == "Hall"));
}

#[test]
fn one_to_many_accepts_single_instance_or_list() {
    let mut hall = Instance::of::<Hall>().unwrap();
    let student = Instance::of::<Student>().unwrap();
    hall.set("students", student.clone()).unwrap();
    hall.set("students", vec![student]).unwrap();
    assert!(hall.set("students", vec![science()]).is_err());
}

// ── Storable form ────────────────────────────────────────────────

#[test]
fn storable_values_replace_relations_with_identity() {
    let dept = saved(science(), 7);
    let student = Instance::of::<Student>()
        .unwrap()
        .with("first", "Obed")
        .unwrap()
        .with("department", dept)
        .unwrap();

    let stored = student.storable_values().unwrap();
    assert_eq!(
        stored,
        vec![
            ("first".to_string(), Value::from("Obed")),
            ("age".to_string(), Value::Null),
            ("active".to_string(), Value::Null),
            ("gpa".to_string(), Value::Null),
            ("department".to_string(), Value::Int(7)),
        ]
    );
}

#[test]
fn unsaved_relation_is_unbound() {
    let student = Instance::of::<Student>()
        .unwrap()
        .with("department", science())
        .unwrap();
    let err = student.storable_values().unwrap_err();
    assert_eq!(
        err,
        ModelError::UnboundRelation {
            field: "department".into(),
            target: "Department".into(),
        }
    );
}

#[test]
fn one_to_many_stores_a_single_foreign_key() {
    let schema = schema_of::<Hall>().unwrap();
    let students = schema.field("students").unwrap();
    let one = saved(Instance::of::<Student>().unwrap(), 3);
    let two = saved(Instance::of::<Student>().unwrap(), 4);

    assert_eq!(students.to_storable(&Value::from(vec![one.clone()])).unwrap(), Value::Int(3));
    assert_eq!(students.to_storable(&Value::from(one.clone())).unwrap(), Value::Int(3));
    assert_eq!(students.to_storable(&Value::List(vec![])).unwrap(), Value::Null);

    // Several related instances cannot fit in one foreign-key column.
    let err = students.to_storable(&Value::from(vec![one, two])).unwrap_err();
    assert_eq!(
        err,
        ModelError::MultiValuedRelation {
            field: "students".into(),
            count: 2,
        }
    );
}

#[test]
fn storage_coercion_of_booleans_and_reals() {
    let schema = schema_of::<Student>().unwrap();
    let active = schema.field("active").unwrap();
    let gpa = schema.field("gpa").unwrap();
    assert_eq!(active.from_storage(Value::Int(1)), Value::Bool(true));
    assert_eq!(active.from_storage(Value::Int(0)), Value::Bool(false));
    assert_eq!(gpa.from_storage(Value::Int(4)), Value::Real(4.0));
    assert_eq!(gpa.from_storage(Value::Null), Value::Null);
}

// ── Identity lifecycle ───────────────────────────────────────────

#[test]
fn detach_resets_identity() {
    let mut dept = saved(science(), 12);
    assert!(dept.is_persisted());
    dept.detach();
    assert!(!dept.is_persisted());
    assert_eq!(dept.id(), &Value::Null);
}

// ── Serialization ────────────────────────────────────────────────

#[test]
fn to_json_omits_identity_and_nests_relations() {
    let dept = saved(science(), 1);
    let student = saved(
        Instance::of::<Student>()
            .unwrap()
            .with("first", "Obed")
            .unwrap()
            .with("age", 45)
            .unwrap()
            .with("department", dept)
            .unwrap(),
        2,
    );

    assert_eq!(
        student.to_json(),
        json!({
            "first": "Obed",
            "age": 45,
            "department": {"name": "Science", "size": 2900},
        })
    );
}

#[test]
fn display_skips_null_values() {
    let student = Instance::of::<Student>()
        .unwrap()
        .with("first", "Obed")
        .unwrap()
        .with("age", 45)
        .unwrap();
    assert_eq!(student.to_string(), "<Student first=Obed, age=45>");
}
