use super::*;
use zship_buffer::OfflineBuffer;
use zship_filter::Filter;
use zship_protocol::{HostRef, Value, ValueType};

fn numeric(host: &str, itemid: i64, value: f64) -> History {
    History {
        host: HostRef {
            host: host.into(),
            name: host.into(),
        },
        itemid,
        name: format!("item {itemid}"),
        clock: 100,
        value: Value::Number(value),
        value_type: ValueType::Float,
        ..History::default()
    }
}

#[test]
fn invalid_url_is_an_init_error() {
    let core = SinkCore::new(
        "pg-e",
        "pushgateway",
        Filter::Inert,
        OfflineBuffer::disabled(),
        &[],
    );
    assert!(matches!(
        PushGatewaySink::new(core, "not a url", &HashMap::new()),
        Err(SinkError::Init(_))
    ));
}

#[test]
fn exposition_renders_one_gauge_line_per_item() {
    let records = vec![numeric("web-1", 1, 0.5), numeric("web-1", 2, 7.0)];
    let body = PushGatewaySink::exposition(&records);
    assert!(body.starts_with("# TYPE zabbix_export_value gauge\n"));
    assert!(body.contains("zabbix_export_value{item=\"item 1\",itemid=\"1\"} 0.5"));
    assert!(body.contains("zabbix_export_value{item=\"item 2\",itemid=\"2\"} 7"));
}

#[test]
fn latest_sample_per_item_wins() {
    let mut older = numeric("web-1", 1, 0.5);
    older.clock = 10;
    let newer = numeric("web-1", 1, 0.9);
    let body = PushGatewaySink::exposition(&[older, newer]);
    assert!(body.contains("} 0.9"));
    assert!(!body.contains("} 0.5"));
}

#[test]
fn label_values_are_escaped() {
    let mut record = numeric("web-1", 1, 1.0);
    record.name = "quoted \"name\"\\path".into();
    let body = PushGatewaySink::exposition(&[record]);
    assert!(body.contains(r#"item="quoted \"name\"\\path""#));
}

#[tokio::test]
async fn unreachable_gateway_fails_the_host_group() {
    let core = SinkCore::new(
        "pg-t",
        "pushgateway",
        Filter::Inert,
        OfflineBuffer::disabled(),
        &[ExportKind::History],
    );
    let sink = PushGatewaySink::new(core, "http://127.0.0.1:9/", &HashMap::new()).unwrap();
    let outcome = sink
        .write_history(vec![numeric("web-1", 1, 1.0), numeric("web-2", 2, 2.0)])
        .await;
    assert!(outcome.error.is_some());
    assert_eq!(outcome.failed.len(), 2);
}
