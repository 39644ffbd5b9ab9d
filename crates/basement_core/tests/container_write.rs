mod common;

use basement_core::{
    Configuration, Container, ContainerError, ContextId, ObjectSchema, SchemaError, StoreError,
    TransactionError, Value, ValueType,
};
use common::{add_person, age_of, create_person, file_config, memory_config};

#[test]
fn write_commits_on_success() {
    let container = Container::new(memory_config());
    container
        .write(|tx| {
            let ann = create_person(tx, "ann", "Ann", 30)?;
            tx.set_values(&ann, "tags", vec![Value::from("a"), Value::from("b")])?;
            Ok(())
        })
        .unwrap();

    let ann = container.item("Person", "ann").unwrap();
    assert_eq!(ann.get("name").unwrap(), Value::from("Ann"));
    assert_eq!(age_of(&ann), 30);
    assert_eq!(
        ann.values("tags").unwrap(),
        vec![Value::from("a"), Value::from("b")]
    );
}

#[test]
fn failed_block_rolls_back_every_mutation() {
    let container = Container::new(memory_config());
    for index in 0..5 {
        add_person(&container, &format!("p{index}"), "Someone", 20);
    }
    let people = container.items("Person").unwrap().to_vec().unwrap();

    let result = container.write(|tx| {
        for person in &people {
            tx.set(person, "age", 99_i64)?;
        }
        tx.create("Person", "late")?;
        Err::<(), _>(TransactionError::abort("changed my mind"))
    });

    assert!(matches!(
        result,
        Err(ContainerError::Transaction(TransactionError::Aborted(_)))
    ));
    assert!(people.iter().all(|person| age_of(person) == 20));
    assert!(container.item("Person", "late").is_none());
    assert_eq!(container.items("Person").unwrap().len().unwrap(), 5);
}

#[test]
fn store_errors_inside_block_roll_back() {
    let container = Container::new(memory_config());
    add_person(&container, "ann", "Ann", 30);

    let result = container.write(|tx| {
        tx.create("Pet", "rex")?;
        tx.create("Person", "ann")?;
        Ok(())
    });

    assert!(matches!(
        result,
        Err(ContainerError::Transaction(TransactionError::Store(
            StoreError::DuplicateKey { .. }
        )))
    ));
    assert!(container.item("Pet", "rex").is_none());
}

#[test]
fn nested_write_on_same_handle_is_rejected() {
    let container = Container::new(memory_config());
    let twin = Container::new(container.configuration().clone());

    container
        .write(|tx| {
            let inner = twin.write(|inner_tx| inner_tx.create("Pet", "ghost"));
            assert!(matches!(
                inner,
                Err(ContainerError::Transaction(TransactionError::NestedWrite))
            ));
            tx.create("Pet", "rex")?;
            Ok(())
        })
        .unwrap();

    assert!(container.item("Pet", "rex").is_some());
    assert!(container.item("Pet", "ghost").is_none());
    assert!(!container.handle().unwrap().is_in_write());
}

#[test]
fn schema_is_enforced_on_mutation() {
    let container = Container::new(memory_config());
    let ann = add_person(&container, "ann", "Ann", 30);

    let wrong_type = container.write_with(&ann, |ann, tx| tx.set(ann, "age", "thirty"));
    assert!(matches!(
        wrong_type,
        Err(ContainerError::Transaction(TransactionError::Store(
            StoreError::Schema(SchemaError::TypeMismatch { .. })
        )))
    ));

    let wrong_target = container.write_with(&ann, |ann, tx| {
        let rex = tx.create("Pet", "rex")?;
        tx.set_link(ann, "spouse", Some(&rex))
    });
    assert!(matches!(
        wrong_target,
        Err(ContainerError::Transaction(TransactionError::Store(
            StoreError::Schema(SchemaError::TargetMismatch { .. })
        )))
    ));

    let wrong_shape = container.write_with(&ann, |ann, tx| {
        let bob = tx.create("Person", "bob")?;
        tx.append_link(ann, "spouse", &bob)
    });
    assert!(matches!(
        wrong_shape,
        Err(ContainerError::Transaction(TransactionError::Store(
            StoreError::Schema(SchemaError::ShapeMismatch { .. })
        )))
    ));
    assert!(container.item("Pet", "rex").is_none());
    assert!(container.item("Person", "bob").is_none());

    let unknown = container.write(|tx| tx.create("Car", "beetle"));
    assert!(matches!(
        unknown,
        Err(ContainerError::Transaction(TransactionError::Store(
            StoreError::Schema(SchemaError::UnknownKind(_))
        )))
    ));
}

#[test]
fn write_with_threads_object_into_block() {
    let container = Container::new(memory_config());
    let ann = add_person(&container, "ann", "Ann", 30);

    container
        .write_with(&ann, |ann, tx| {
            let rex = tx.create("Pet", "rex")?;
            tx.set(&rex, "name", "Rex")?;
            tx.set_link(&rex, "owner", Some(ann))?;
            tx.append_link(ann, "pets", &rex)?;
            tx.set(ann, "age", 31_i64)
        })
        .unwrap();

    assert_eq!(age_of(&ann), 31);
    let pets = ann.links("pets").unwrap();
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].key(), "rex");
    assert_eq!(pets[0].link("owner").unwrap().unwrap().key(), "ann");
}

#[test]
fn write_with_rebinds_object_after_slot_replacement() {
    let container = Container::new(memory_config());
    let ann = add_person(&container, "ann", "Ann", 30);

    let other = Container::new(memory_config());
    other.handle().unwrap();

    container
        .write_with(&ann, |ann, tx| tx.set(ann, "age", 32_i64))
        .unwrap();
    assert_eq!(age_of(&container.item("Person", "ann").unwrap()), 32);
}

#[test]
fn write_with_rejects_object_from_another_store() {
    let first = Container::new(memory_config());
    let ann = add_person(&first, "ann", "Ann", 30);
    let second = Container::new(memory_config());

    let result = second.write_with(&ann, |ann, tx| tx.set(ann, "age", 1_i64));
    assert!(matches!(
        result,
        Err(ContainerError::Transaction(TransactionError::ForeignObject { .. }))
    ));
    assert_eq!(age_of(&ann), 30);
}

#[test]
fn instance_write_runs_on_a_fresh_context() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::new(file_config(dir.path()));
    let ann = add_person(&container, "ann", "Ann", 30);
    let caller = ContextId::current();

    let worker_context = container
        .instance_write(&ann, |ann, tx| {
            tx.set(ann, "age", 41_i64)?;
            Ok(ContextId::current())
        })
        .unwrap();

    assert_ne!(worker_context, caller);
    assert_eq!(age_of(&ann), 41);
}

#[test]
fn instance_write_of_deleted_object_fails_explicitly() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::new(file_config(dir.path()));
    let ann = add_person(&container, "ann", "Ann", 30);
    container.write_with(&ann, |ann, tx| tx.delete(ann)).unwrap();
    assert!(!ann.is_valid());

    let result = container.instance_write(&ann, |ann, tx| tx.set(ann, "age", 1_i64));
    assert!(matches!(
        result,
        Err(ContainerError::Transaction(TransactionError::ObjectInvalidated { .. }))
    ));
}

#[test]
fn item_for_missing_key_is_none() {
    let container = Container::new(memory_config());
    assert!(container.item("Person", "nobody").is_none());
}

#[test]
fn items_before_any_write_is_empty_not_none() {
    let container = Container::new(memory_config());
    let people = container.items("Person").unwrap();
    assert!(people.is_empty().unwrap());
    assert!(container.items("Car").is_none());
}

#[test]
fn items_is_a_live_view() {
    let container = Container::new(memory_config());
    let people = container.items("Person").unwrap();
    assert_eq!(people.len().unwrap(), 0);

    add_person(&container, "ann", "Ann", 30);
    add_person(&container, "bob", "Bob", 31);

    assert_eq!(people.keys().unwrap(), vec!["ann", "bob"]);
    assert_eq!(people.get(1).unwrap().unwrap().key(), "bob");
    assert!(people.get(2).unwrap().is_none());
}

#[test]
fn delete_all_removes_every_kind() {
    let container = Container::new(memory_config());
    let ann = add_person(&container, "ann", "Ann", 30);
    container
        .write_with(&ann, |ann, tx| {
            let rex = tx.create("Pet", "rex")?;
            tx.append_link(ann, "pets", &rex)
        })
        .unwrap();

    assert_eq!(container.delete_all().unwrap(), 2);
    assert!(container.items("Person").unwrap().is_empty().unwrap());
    assert!(container.items("Pet").unwrap().is_empty().unwrap());
    assert!(!ann.is_valid());
    assert!(matches!(ann.get("name"), Err(StoreError::NotFound { .. })));
}

#[test]
fn deleting_a_pet_removes_it_from_lists() {
    let container = Container::new(memory_config());
    let ann = add_person(&container, "ann", "Ann", 30);
    container
        .write_with(&ann, |ann, tx| {
            let rex = tx.create("Pet", "rex")?;
            let tom = tx.create("Pet", "tom")?;
            tx.set_links(ann, "pets", &[rex.clone(), tom])?;
            tx.delete(&rex)
        })
        .unwrap();

    let keys: Vec<String> = ann
        .links("pets")
        .unwrap()
        .iter()
        .map(|pet| pet.key().to_string())
        .collect();
    assert_eq!(keys, vec!["tom"]);
}

#[test]
fn default_configuration_is_used_by_default_container() {
    let config = Configuration::in_memory("default-config-test");
    Configuration::set_default(config.clone());
    assert_eq!(Container::with_default_configuration().configuration(), &config);
}

#[test]
fn numeric_looking_text_reads_back_as_text() {
    let container = Container::new(memory_config());
    let texts = ["42", "1e5", " 7 "];
    let ann = container
        .write(|tx| {
            let ann = tx.create("Person", "ann")?;
            tx.set(&ann, "name", "42")?;
            tx.set_values(&ann, "tags", texts.iter().map(|text| Value::from(*text)).collect())?;
            Ok(ann)
        })
        .unwrap();

    assert_eq!(ann.get("name").unwrap(), Value::from("42"));
    let expected: Vec<Value> = texts.iter().map(|text| Value::from(*text)).collect();
    assert_eq!(ann.values("tags").unwrap(), expected);

    let graph = ann.detached().unwrap();
    assert_eq!(graph.root_ref().get("name"), Some(&Value::from("42")));
    assert_eq!(graph.root_ref().values("tags"), Some(expected.as_slice()));
}

#[test]
fn nan_is_rejected_on_write() {
    let schema = common::people_schema()
        .with(ObjectSchema::new("Reading").value("celsius", ValueType::Float));
    let container = Container::new(Configuration::in_memory_unique().with_schema(schema));

    let result = container.write(|tx| {
        let reading = tx.create("Reading", "r1")?;
        tx.set(&reading, "celsius", f64::NAN)
    });
    assert!(matches!(
        result,
        Err(ContainerError::Transaction(TransactionError::Store(
            StoreError::Schema(SchemaError::TypeMismatch { .. })
        )))
    ));
    assert!(container.item("Reading", "r1").is_none());
}
