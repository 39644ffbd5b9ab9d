#![allow(dead_code)]

use basement_core::{
    Configuration, Container, ObjectRef, ObjectSchema, Schema, Value, ValueType, WriteTransaction,
};
use std::path::Path;

pub fn people_schema() -> Schema {
    Schema::new()
        .with(
            ObjectSchema::new("Person")
                .value("name", ValueType::Text)
                .value("age", ValueType::Int)
                .list("tags", ValueType::Text)
                .to_one("spouse", "Person")
                .to_one("best_friend", "Person")
                .to_many("pets", "Pet"),
        )
        .with(
            ObjectSchema::new("Pet")
                .value("name", ValueType::Text)
                .to_one("owner", "Person"),
        )
}

pub fn memory_config() -> Configuration {
    Configuration::in_memory_unique().with_schema(people_schema())
}

pub fn file_config(folder: &Path) -> Configuration {
    Configuration::file(folder.join("people.store")).with_schema(people_schema())
}

pub fn create_person(
    tx: &WriteTransaction<'_>,
    key: &str,
    name: &str,
    age: i64,
) -> basement_core::TxResult<ObjectRef> {
    let person = tx.create("Person", key)?;
    tx.set(&person, "name", name)?;
    tx.set(&person, "age", age)?;
    Ok(person)
}

pub fn add_person(container: &Container, key: &str, name: &str, age: i64) -> ObjectRef {
    container
        .write(|tx| create_person(tx, key, name, age))
        .unwrap()
}

pub fn age_of(object: &ObjectRef) -> i64 {
    match object.get("age").unwrap() {
        Value::Int(age) => age,
        other => panic!("unexpected age value {other:?}"),
    }
}
