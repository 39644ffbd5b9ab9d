mod common;

use basement_core::{
    detach, Container, ContainerError, DetachedField, DetachedObject, ObjectRef, StoreError,
    TransactionError, Value,
};
use common::{create_person, memory_config};
use std::thread;

/// Ann and Bob are married; Ann owns Rex and is her own best friend.
fn household(container: &Container) -> ObjectRef {
    container
        .write(|tx| {
            let ann = create_person(tx, "ann", "Ann", 30)?;
            let bob = create_person(tx, "bob", "Bob", 32)?;
            let rex = tx.create("Pet", "rex")?;
            tx.set(&rex, "name", "Rex")?;
            tx.set_link(&rex, "owner", Some(&ann))?;
            tx.set_link(&ann, "spouse", Some(&bob))?;
            tx.set_link(&bob, "spouse", Some(&ann))?;
            tx.set_link(&ann, "best_friend", Some(&ann))?;
            tx.append_link(&ann, "pets", &rex)?;
            tx.set_values(&ann, "tags", vec![Value::from("gardener")])?;
            Ok(ann)
        })
        .unwrap()
}

#[test]
fn detach_preserves_cycles_and_shared_references() {
    let container = Container::new(memory_config());
    let ann = household(&container);

    let graph = ann.detached().unwrap();
    assert_eq!(graph.nodes().len(), 3);
    assert_eq!((graph.kind(), graph.key()), ("Person", "ann"));

    let root = graph.root_ref();
    assert_eq!(root.get("name"), Some(&Value::from("Ann")));
    assert_eq!(root.values("tags"), Some(&[Value::from("gardener")][..]));

    let bob = root.link("spouse").unwrap();
    assert_eq!(bob.key(), "bob");
    assert_eq!(bob.link("spouse").unwrap().node_id(), root.node_id());
    assert_eq!(root.link("best_friend").unwrap().node_id(), root.node_id());

    let pets = root.links("pets");
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].get("name"), Some(&Value::from("Rex")));
    assert_eq!(pets[0].link("owner").unwrap().node_id(), root.node_id());
}

#[test]
fn unset_properties_detach_as_empty() {
    let container = Container::new(memory_config());
    let loner = container
        .write(|tx| tx.create("Person", "loner"))
        .unwrap();

    let graph = loner.detached().unwrap();
    let root = graph.root_ref();
    assert_eq!(graph.nodes().len(), 1);
    assert_eq!(root.get("name"), Some(&Value::Null));
    assert_eq!(root.values("tags"), Some(&[] as &[Value]));
    assert!(root.link("spouse").is_none());
    assert_eq!(root.field("spouse"), Some(&DetachedField::One(None)));
    assert!(root.links("pets").is_empty());
}

#[test]
fn detaching_a_detached_graph_reproduces_it() {
    let container = Container::new(memory_config());
    let graph = household(&container).detached().unwrap();

    assert_eq!(graph.detached(), graph);
    assert_eq!(detach(&graph.root_ref()).unwrap(), graph);
}

#[test]
fn detached_graph_outlives_its_store_and_crosses_threads() {
    let container = Container::new(memory_config());
    let graph = {
        let ann = household(&container);
        ann.detached().unwrap()
    };
    container.release_handle();
    assert!(container.item("Person", "ann").is_none());

    let spouse_name = thread::spawn(move || {
        let root = graph.root_ref();
        root.link("spouse").unwrap().get("name").cloned()
    })
    .join()
    .unwrap();
    assert_eq!(spouse_name, Some(Value::from("Bob")));
}

#[test]
fn detached_graph_is_plain_serializable_data() {
    let container = Container::new(memory_config());
    let graph = household(&container).detached().unwrap();

    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(json["nodes"][0]["id"]["key"], "ann");
    let restored: DetachedObject = serde_json::from_value(json).unwrap();
    assert_eq!(restored, graph);
}

#[test]
fn results_detach_each_member() {
    let container = Container::new(memory_config());
    household(&container);

    let people = container.items("Person").unwrap().detached().unwrap();
    let keys: Vec<&str> = people.iter().map(|graph| graph.key()).collect();
    assert_eq!(keys, vec!["ann", "bob"]);
    assert!(people.iter().all(|graph| graph.nodes().len() == 3));
}

#[test]
fn modified_detached_graph_can_be_added_to_another_store() {
    let source = Container::new(memory_config());
    let mut graph = household(&source).detached().unwrap();
    let bob = graph.find("Person", "bob").unwrap().node_id();
    graph.set(bob, "age", 33_i64);
    let milo = graph.add_node("Pet", "milo");
    graph.set(milo, "name", "Milo");
    graph.set_link(milo, "owner", Some(bob));
    graph.push_link(graph.root(), "pets", milo);

    let target = Container::new(memory_config());
    let added = target.write(|tx| tx.add(&graph)).unwrap();

    assert_eq!(added.key(), "ann");
    let bob_live = target.item("Person", "bob").unwrap();
    assert_eq!(bob_live.get("age").unwrap(), Value::Int(33));
    assert_eq!(added.links("pets").unwrap().len(), 2);
    assert_eq!(added.detached().unwrap(), graph);

    let original = source.item("Person", "bob").unwrap();
    assert_eq!(original.get("age").unwrap(), Value::Int(32));
}

#[test]
fn deserializing_graph_with_missing_root_fails() {
    let err = serde_json::from_str::<DetachedObject>(r#"{"nodes":[],"root":0}"#).unwrap_err();
    assert!(err.to_string().contains("root node 0"));
}

#[test]
fn deserializing_graph_with_dangling_link_fails() {
    let mut graph = DetachedObject::new("Person", "ann");
    let bob = graph.add_node("Person", "bob");
    graph.set_link(graph.root(), "spouse", Some(bob));
    let mut json = serde_json::to_value(&graph).unwrap();
    json["nodes"].as_array_mut().unwrap().pop();

    assert!(serde_json::from_value::<DetachedObject>(json).is_err());
}

#[test]
fn adding_graph_with_foreign_node_id_is_an_error() {
    let mut other = DetachedObject::new("Person", "zed");
    let stray = other.add_node("Person", "bob");
    let mut graph = DetachedObject::new("Person", "ann");
    graph.set_link(graph.root(), "spouse", Some(stray));

    let container = Container::new(memory_config());
    let result = container.write(|tx| tx.add(&graph));
    assert!(matches!(
        result,
        Err(ContainerError::Transaction(TransactionError::Store(
            StoreError::InvalidData(_)
        )))
    ));
    assert!(container.item("Person", "ann").is_none());
}
