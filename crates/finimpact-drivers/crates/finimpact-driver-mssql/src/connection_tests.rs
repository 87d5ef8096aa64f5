use crate::connection::{bind_placeholders, column_data_to_value, values_to_tiberius_params};
use chrono::NaiveDate;
use finimpact_core::Value;
use tiberius::{ColumnData, ToSql};

#[test]
fn test_placeholders_are_numbered_in_order() {
    assert_eq!(
        bind_placeholders("SELECT * FROM usuarios WHERE email = ? AND activo = ?"),
        "SELECT * FROM usuarios WHERE email = @P1 AND activo = @P2"
    );
}

#[test]
fn test_placeholders_inside_literals_are_kept() {
    assert_eq!(
        bind_placeholders("SELECT '?', [a?b], \"c?\" FROM t WHERE x = ?"),
        "SELECT '?', [a?b], \"c?\" FROM t WHERE x = @P1"
    );
    assert_eq!(
        bind_placeholders("SELECT 'it''s ?' WHERE y = ?"),
        "SELECT 'it''s ?' WHERE y = @P1"
    );
}

#[test]
fn test_placeholders_inside_comments_are_kept() {
    assert_eq!(
        bind_placeholders("-- why?\nDELETE FROM impactos WHERE id = ?"),
        "-- why?\nDELETE FROM impactos WHERE id = @P1"
    );
}

#[test]
fn test_no_placeholders_is_unchanged() {
    let sql = "SELECT COUNT(*) FROM iniciativas";
    assert_eq!(bind_placeholders(sql), sql);
}

#[test]
fn test_null_param_is_untyped_string() {
    let params = values_to_tiberius_params(&[Value::Null]);
    assert_eq!(params.len(), 1);
    assert!(matches!(params[0].to_sql(), ColumnData::String(None)));
}

#[test]
fn test_decimal_param_is_sent_as_text() {
    let params = values_to_tiberius_params(&[Value::Decimal("1234.50".into())]);
    match params[0].to_sql() {
        ColumnData::String(Some(s)) => assert_eq!(s, "1234.50"),
        other => panic!("unexpected column data: {:?}", other),
    }
}

#[test]
fn test_date_param_uses_native_type() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let params = values_to_tiberius_params(&[Value::Date(date), Value::Int64(7)]);
    assert!(matches!(params[0].to_sql(), ColumnData::Date(Some(_))));
    assert!(matches!(params[1].to_sql(), ColumnData::I64(Some(7))));
}

#[test]
fn test_column_data_conversion() {
    assert_eq!(column_data_to_value(ColumnData::I32(Some(5))), Value::Int32(5));
    assert_eq!(column_data_to_value(ColumnData::Bit(None)), Value::Null);
    assert_eq!(
        column_data_to_value(ColumnData::String(Some("en curso".into()))),
        Value::String("en curso".into())
    );
    assert_eq!(
        column_data_to_value(ColumnData::Numeric(Some(tiberius::numeric::Numeric::new_with_scale(
            123450, 2
        )))),
        Value::Decimal("1234.50".into())
    );
}

#[test]
fn test_date_column_conversion() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let days = date
        .signed_duration_since(NaiveDate::from_ymd_opt(1, 1, 1).unwrap())
        .num_days() as u32;
    let data = ColumnData::Date(Some(tiberius::time::Date::new(days)));
    assert_eq!(column_data_to_value(data), Value::Date(date));
}
