//! Turn the chart widget's data provider into a [`HistoricalSeries`].
//!
//! Records arrive as whatever the page script returned, serialised by the
//! WebDriver as JSON. Each one must carry a date and a numeric value; key
//! names are matched case-insensitively so `Date`/`VALUE` also work.

use bluerate_common::{BlueRateError, HistoricalSeries, HistoryPoint, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

const DATE_KEY: &str = "date";
const VALUE_KEY: &str = "value";

/// Validate and convert raw records, preserving their order and count.
///
/// `null` and `[]` mean the chart had nothing to show ([`BlueRateError::NoData`]).
/// Anything else that is not a list of `{date, value}` objects is a
/// [`BlueRateError::Format`] naming the columns that were present.
///
/// ```
/// use serde_json::json;
///
/// let raw = json!([{"date": "2024-05-01", "value": 1045.0}]);
/// let series = bluerate_web::normalize_records(&raw).unwrap();
/// assert_eq!(series.len(), 1);
/// ```
pub fn normalize_records(raw: &Value) -> Result<HistoricalSeries> {
    let records = match raw {
        Value::Null => return Err(BlueRateError::NoData),
        Value::Array(items) if items.is_empty() => return Err(BlueRateError::NoData),
        Value::Array(items) => items,
        Value::Object(map) => {
            return Err(format_error("expected a list of records", map.keys().cloned().collect()));
        }
        other => {
            return Err(format_error(
                &format!("expected a list of records, got {}", kind(other)),
                Vec::new(),
            ));
        }
    };

    let columns = collect_columns(records);
    let mut points = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let Some(obj) = record.as_object() else {
            return Err(format_error(
                &format!("record {idx} is {}, not an object", kind(record)),
                columns,
            ));
        };
        let (Some(date), Some(value)) = (field(obj, DATE_KEY), field(obj, VALUE_KEY)) else {
            return Err(format_error("expected 'date' and 'value' columns", columns));
        };
        let date = parse_date(date).ok_or_else(|| {
            format_error(&format!("record {idx} has an unreadable date {date}"), columns.clone())
        })?;
        let value = parse_value(value).ok_or_else(|| {
            format_error(&format!("record {idx} has a non-numeric value {value}"), columns.clone())
        })?;
        points.push(HistoryPoint { date, value });
    }

    Ok(HistoricalSeries::new(points))
}

fn format_error(detail: &str, available: Vec<String>) -> BlueRateError {
    BlueRateError::Format {
        detail: detail.to_string(),
        available,
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Union of keys over all object records, in first-seen order.
fn collect_columns(records: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for key in records.iter().filter_map(Value::as_object).flat_map(|o| o.keys()) {
        if !columns.iter().any(|c| c == key) {
            columns.push(key.clone());
        }
    }
    columns
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn parse_value(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', "").parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Accepts ISO dates, RFC3339 and naive timestamps, or epoch milliseconds.
fn parse_date(v: &Value) -> Option<NaiveDate> {
    match v {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
        }
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.date());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn empty_or_missing_provider_is_no_data() {
        assert_eq!(normalize_records(&Value::Null), Err(BlueRateError::NoData));
        assert_eq!(normalize_records(&json!([])), Err(BlueRateError::NoData));
    }

    #[test]
    fn keeps_order_and_length() {
        let raw = json!([
            {"date": "2024-03-01", "value": 1010.5},
            {"date": "2024-01-01", "value": "1,020"},
            {"date": "2024-02-01", "value": 990}
        ]);
        let series = normalize_records(&raw).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.points[0].date, d("2024-03-01"));
        assert_eq!(series.points[1].value, 1020.0);
        assert_eq!(series.points[2].value, 990.0);
    }

    #[test]
    fn extra_columns_and_key_case_are_tolerated() {
        let raw = json!([{"Date": "2024-06-30T12:00:00Z", "VALUE": 1200.0, "volume": 3}]);
        let series = normalize_records(&raw).unwrap();
        assert_eq!(series.points[0].date, d("2024-06-30"));
    }

    #[test]
    fn missing_value_column_lists_what_was_there() {
        let raw = json!([
            {"date": "2024-01-01", "close": 1.0},
            {"date": "2024-01-02", "open": 2.0}
        ]);
        match normalize_records(&raw) {
            Err(BlueRateError::Format { mut available, .. }) => {
                available.sort();
                assert_eq!(available, vec!["close", "date", "open"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn any_bad_record_fails_the_whole_series() {
        let raw = json!([
            {"date": "2024-01-01", "value": 1.0},
            {"date": "yesterday", "value": 2.0}
        ]);
        assert!(matches!(
            normalize_records(&raw),
            Err(BlueRateError::Format { .. })
        ));

        let raw = json!([{"date": "2024-01-01", "value": "n/a"}]);
        assert!(matches!(
            normalize_records(&raw),
            Err(BlueRateError::Format { .. })
        ));
    }

    #[test]
    fn non_list_payloads_are_format_errors() {
        assert!(matches!(
            normalize_records(&json!({"date": "2024-01-01"})),
            Err(BlueRateError::Format { ref available, .. })
                if available == &vec!["date".to_string()]
        ));
        assert!(matches!(
            normalize_records(&json!(42)),
            Err(BlueRateError::Format { .. })
        ));
        assert!(matches!(
            normalize_records(&json!([1, 2])),
            Err(BlueRateError::Format { .. })
        ));
    }

    #[test]
    fn date_shapes() {
        assert_eq!(parse_date(&json!("2024-02-29")), Some(d("2024-02-29")));
        assert_eq!(parse_date(&json!("2024-02-29 23:59:59")), Some(d("2024-02-29")));
        assert_eq!(parse_date(&json!("2024-02-29T10:00:00.250")), Some(d("2024-02-29")));
        assert_eq!(parse_date(&json!(1_704_067_200_000_i64)), Some(d("2024-01-01")));
        assert_eq!(parse_date(&json!("")), None);
        assert_eq!(parse_date(&json!(true)), None);
    }
}
