//! End-to-end scenarios exercised through the public facade rather than a
//! single node kind in isolation: a length-prefixed string, a header
//! struct whose trailing payload shape is chosen by a sibling field, and
//! a self-referential list built from a recursive node factory.

use std::sync::Arc;

use bindata::{
    finalize_tree, new_node_ref, read_from_slice, write_to_vec, ArrayLengthMode, ArrayNode, ChoiceKey, ChoiceNode, Endian, Expr,
    FixedString, Integer, Node, NodeRef, StructBuilder, Value,
};
use bindata_core::AsAny;

#[test]
fn pascal_style_string_reads_length_then_payload() {
    let length = new_node_ref(Integer::u8());
    let length_ref = length.clone();
    let payload = new_node_ref(FixedString::new(Expr::closure(move |_scope| Ok(Value::UInt(length_ref.borrow().snapshot().as_u64().unwrap_or(0) as u128))), 0));
    let root = new_node_ref(StructBuilder::new().field("length", length).field("payload", payload).build());
    finalize_tree(&root);

    read_from_slice(&root, b"\x05hello_extra").unwrap();
    match root.borrow().snapshot() {
        Value::Map(m) => assert_eq!(m.get("payload"), Some(&Value::Bytes(b"hello".to_vec()))),
        _ => panic!("expected a map"),
    }
}

#[test]
fn header_chooses_payload_shape_from_a_sibling_kind_field() {
    let kind = new_node_ref(Integer::u8());
    let payload = new_node_ref(
        ChoiceNode::new(Expr::reference("kind"))
            .with_child(ChoiceKey::Int(0), Arc::new(|| new_node_ref(Integer::u8())))
            .with_child(ChoiceKey::Int(1), Arc::new(|| new_node_ref(Integer::u16(Endian::Big)))),
    );
    let root = new_node_ref(StructBuilder::new().field("kind", kind).field("payload", payload).build());
    finalize_tree(&root);

    read_from_slice(&root, &[0x01, 0x12, 0x34]).unwrap();
    match root.borrow().snapshot() {
        Value::Map(m) => assert_eq!(m.get("payload"), Some(&Value::UInt(0x1234))),
        _ => panic!("expected a map"),
    }
}

fn list_node_factory() -> NodeRef {
    let value = new_node_ref(Integer::u8());
    let has_next = new_node_ref(Integer::u8());
    let next = new_node_ref(
        ChoiceNode::new(Expr::reference("has_next"))
            .with_child(ChoiceKey::Int(0), Arc::new(|| new_node_ref(StructBuilder::new().build())))
            .with_child(ChoiceKey::Int(1), Arc::new(list_node_factory)),
    );
    new_node_ref(StructBuilder::new().field("value", value).field("has_next", has_next).field("next", next).build())
}

#[test]
fn recursive_list_reads_chained_nodes_until_a_zero_has_next() {
    let root = list_node_factory();
    finalize_tree(&root);

    read_from_slice(&root, &[1, 1, 2, 1, 3, 0]).unwrap();

    let mut values = Vec::new();
    let mut current = root.clone();
    loop {
        let value = current.borrow().field("value").unwrap().as_u64().unwrap();
        values.push(value);
        let has_next = current.borrow().field("has_next").unwrap().as_u64().unwrap();
        if has_next == 0 {
            break;
        }
        let next = current.borrow().field_node("next").unwrap();
        current = next;
    }
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn sentinel_terminated_array_round_trips() {
    let root = new_node_ref(ArrayNode::new(
        Arc::new(|| new_node_ref(Integer::u8())),
        ArrayLengthMode::ReadUntil(Expr::closure(|scope| Ok(Value::from(scope.resolve("element")?.as_u64().unwrap_or(1) == 0)))),
    ));
    finalize_tree(&root);

    read_from_slice(&root, &[7, 8, 0, 99]).unwrap();
    match root.borrow().snapshot() {
        Value::List(items) => assert_eq!(items, vec![Value::UInt(7), Value::UInt(8), Value::UInt(0)]),
        _ => panic!("expected a list"),
    }

    let bytes = write_to_vec(&root).unwrap();
    assert_eq!(bytes, vec![7, 8, 0]);
}
