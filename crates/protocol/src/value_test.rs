use super::*;

#[test]
fn integer_token_promotes_to_number() {
    let v: Value = serde_json::from_str("1").unwrap();
    assert_eq!(v, Value::Number(1.0));
}

#[test]
fn float_token_parses_as_number() {
    let v: Value = serde_json::from_str("1.0").unwrap();
    assert_eq!(v, Value::Number(1.0));
}

#[test]
fn string_token_stays_text() {
    let v: Value = serde_json::from_str("\"1\"").unwrap();
    assert_eq!(v, Value::Text("1".to_string()));
    assert_eq!(v.as_f64(), None);
}

#[test]
fn value_type_codes_round_trip() {
    for code in 0u8..=4 {
        let vt = ValueType::try_from(code).unwrap();
        assert_eq!(vt.code(), code);
    }
    assert!(ValueType::try_from(5).is_err());
}

#[test]
fn numeric_types() {
    assert!(ValueType::Float.is_numeric());
    assert!(ValueType::Unsigned.is_numeric());
    assert!(!ValueType::Character.is_numeric());
    assert!(!ValueType::Log.is_numeric());
    assert!(!ValueType::Text.is_numeric());
}

#[test]
fn value_type_deserializes_from_json_code() {
    let vt: ValueType = serde_json::from_str("3").unwrap();
    assert_eq!(vt, ValueType::Unsigned);
}

#[test]
fn display_forms() {
    assert_eq!(Value::Number(2.5).to_string(), "2.5");
    assert_eq!(Value::Text("up".into()).to_string(), "up");
}
