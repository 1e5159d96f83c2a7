//! Typed values through an enumeration

use super::test_utils::*;
use chrono::{FixedOffset, TimeZone};
use cimpull::error::InvalidValue;
use cimpull::provider::StaticProvider;
use cimpull::value::{
    EmbeddedObject, IntegerType, KeyValue, LanguageTags, ObjectPath, TypedNode, ValueData,
    ValueKind,
};
use cimpull::{ProviderRegistry, PullRequest, Value};

fn process_instance(handle: u32, name: &str) -> Value {
    let path = ObjectPath::new("CIM_Process")
        .unwrap()
        .with_namespace("root/cimv2")
        .unwrap()
        .with_key("Handle", KeyValue::String(handle.to_string()))
        .unwrap();
    let started = FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 11, 2, 14, 5, 0)
        .unwrap();
    let object = EmbeddedObject::new("CIM_Process")
        .unwrap()
        .with_property("Self", Value::reference(path))
        .unwrap()
        .with_property("Name", Value::string(name))
        .unwrap()
        .with_property("CreationDate", Value::datetime(started))
        .unwrap()
        .with_property(
            "Priorities",
            Value::array(
                ValueKind::Integer(IntegerType::SINT8),
                vec![(-5i8).into(), 0i8.into(), 19i8.into()],
            )
            .unwrap(),
        )
        .unwrap();
    Value::object(object).with_languages(LanguageTags::parse_list("en-US").unwrap())
}

#[test]
fn test_heterogeneous_array_is_rejected_at_construction() {
    let err = Value::array_of(vec![ValueData::from(1u32), ValueData::from("two")]).unwrap_err();
    assert!(matches!(err, InvalidValue::HeterogeneousArray { index: 1, .. }));

    let nested = Value::array_of(vec![ValueData::Array(
        cimpull::value::ValueArray::of(vec![1u32.into()]).unwrap(),
    )]);
    assert_eq!(nested.unwrap_err(), InvalidValue::NestedArray);
}

#[tokio::test]
async fn test_instances_survive_enumeration_and_node_encoding() {
    let instances = vec![
        process_instance(1, "init"),
        process_instance(42, "sshd"),
        process_instance(977, "postgres"),
    ];
    let dispatcher = create_dispatcher(
        ProviderRegistry::new().with(StaticProvider::new(CLASS, instances.clone())),
    );
    let id = open_context(&dispatcher).await;
    let response = dispatcher
        .pull(&owner(), PullRequest::new(id, 10))
        .await
        .unwrap();
    assert_eq!(response.items, instances);

    for (item, original) in response.items.iter().zip(&instances) {
        assert_eq!(item.languages(), original.languages());

        let json = serde_json::to_string(&item.to_node()).unwrap();
        let node: TypedNode = serde_json::from_str(&json).unwrap();
        let decoded = Value::from_node(&node).unwrap();
        assert_eq!(&decoded, original);
        assert_eq!(decoded.languages().to_strings(), vec!["en-US".to_string()]);
    }
}

#[test]
fn test_equality_is_variant_aware() {
    assert_ne!(Value::uint32(5), Value::uint64(5));
    assert_ne!(Value::null(), Value::typed_null(ValueKind::String));
    assert_ne!(Value::real64(f64::NAN), Value::real64(f64::NAN));
    assert_eq!(
        Value::string("x").with_languages(LanguageTags::parse_list("fr").unwrap()),
        Value::string("x")
    );
    assert!(Value::uint32(1).partial_cmp(&Value::string("1")).is_none());
}
