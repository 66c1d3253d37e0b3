use crate::{
    serialize::{deserialize, serialize},
    types::ItemId,
    value::{Float64, Value, canonical_cmp, missing_last_cmp},
};
use std::cmp::Ordering;

// ---- helpers -----------------------------------------------------------

fn v_f64(x: f64) -> Value {
    Value::float(x).expect("finite f64")
}

fn v_txt(s: &str) -> Value {
    Value::Text(s.to_string())
}

// ---- float -------------------------------------------------------------

#[test]
fn float64_rejects_non_finite() {
    assert!(Float64::try_new(f64::NAN).is_none());
    assert!(Float64::try_new(f64::INFINITY).is_none());
    assert!(Float64::try_new(f64::NEG_INFINITY).is_none());
    assert!(Value::float(f64::NAN).is_none());
}

#[test]
fn float64_normalizes_negative_zero() {
    let neg = Float64::try_new(-0.0).expect("finite");
    let pos = Float64::try_new(0.0).expect("finite");

    assert_eq!(neg, pos);
    assert_eq!(neg.get().to_bits(), pos.get().to_bits());
}

#[test]
fn float64_deserialize_rejects_non_finite_payload() {
    let bytes = serialize(&f64::INFINITY).expect("encode raw f64");

    assert!(deserialize::<Float64>(&bytes).is_err());
}

// ---- ordering ----------------------------------------------------------

#[test]
fn canonical_cmp_orders_by_rank_then_value() {
    assert_eq!(canonical_cmp(&Value::Int(5), &Value::Int(7)), Ordering::Less);
    assert_eq!(canonical_cmp(&v_txt("b"), &v_txt("a")), Ordering::Greater);
    assert_eq!(canonical_cmp(&Value::Int(100), &v_f64(0.5)), Ordering::Less);
    assert_eq!(canonical_cmp(&Value::Null, &Value::Bool(true)), Ordering::Greater);
}

#[test]
fn canonical_cmp_compares_lists_lexicographically() {
    let short = Value::List(vec![Value::Int(1)]);
    let long = Value::List(vec![Value::Int(1), Value::Int(0)]);
    let bigger = Value::List(vec![Value::Int(2)]);

    assert_eq!(canonical_cmp(&short, &long), Ordering::Less);
    assert_eq!(canonical_cmp(&long, &bigger), Ordering::Less);
}

#[test]
fn missing_values_sort_after_present_values() {
    let present = Value::Int(i64::MAX);

    assert_eq!(missing_last_cmp(None, Some(&present)), Ordering::Greater);
    assert_eq!(missing_last_cmp(Some(&present), None), Ordering::Less);
    assert_eq!(
        missing_last_cmp(Some(&Value::Null), Some(&present)),
        Ordering::Greater
    );
    assert_eq!(missing_last_cmp(None, Some(&Value::Null)), Ordering::Equal);
}

// ---- accessors and codec -------------------------------------------------

#[test]
fn accessors_match_variants() {
    let id = ItemId::from_parts(1, 1);

    assert_eq!(Value::from(id).as_ref_id(), Some(id));
    assert_eq!(Value::Timestamp(9).as_int(), Some(9));
    assert_eq!(v_txt("x").as_text(), Some("x"));
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
    assert_eq!(Value::List(vec![]).type_name(), "list");
}

#[test]
fn value_survives_cbor_codec() {
    let value = Value::List(vec![
        Value::Int(-3),
        v_f64(2.5),
        v_txt("hello"),
        Value::Ref(ItemId::from_parts(7, 9)),
        Value::Null,
    ]);

    let bytes = serialize(&value).expect("encode value");
    let decoded: Value = deserialize(&bytes).expect("decode value");

    assert_eq!(decoded, value);
}
