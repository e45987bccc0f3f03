//! End-to-end tests over the full gateway stack
//!
//! Registry, wire conversion, table cache and SNMP binding wired together
//! over the in-memory resource connector.
//!
//! Run with: cargo test -p mgate-tests --test gateway_e2e_test

use std::time::Duration;

use chrono::TimeZone;
use pretty_assertions::assert_eq;

use mgate_core::{
    AccessRights, ColumnType, GatewayError, ManagedTable, ManagedType, ManagedValue,
};
use mgate_smi::{SmiValue, DISPLAY_FORMAT_OPTION, RFC1903_FORMAT};
use mgate_snmp::{SnmpError, ROW_STATUS_DESTROY, ROW_STATUS_OPTION};
use mgate_tests::GatewayFixture;

fn disk_table() -> (ManagedType, ManagedValue) {
    let ty = ManagedType::Table {
        columns: vec![
            ColumnType::new("mount", ManagedType::String),
            ColumnType::new("used_mb", ManagedType::Int32),
        ],
    };
    let value = ManagedValue::Table(ManagedTable {
        columns: vec!["mount".into(), "used_mb".into()],
        rows: vec![
            vec![ManagedValue::String("/".into()), ManagedValue::Int32(1800)],
            vec![ManagedValue::String("/var".into()), ManagedValue::Int32(420)],
        ],
    });
    (ty, value)
}

#[tokio::test]
async fn test_scalar_lifecycle_end_to_end() {
    let fixture = GatewayFixture::new().await;
    fixture
        .add_attribute(
            "3.0",
            "int32",
            AccessRights::ReadWrite,
            ManagedType::Int32,
            ManagedValue::Int32(42),
        )
        .await
        .unwrap();

    let oid = fixture.oid("3.0");
    assert_eq!(fixture.binding.get(&oid).await.unwrap(), SmiValue::Integer(42));

    fixture.binding.set(&oid, SmiValue::Integer(7)).await.unwrap();
    assert_eq!(fixture.resource.value("int32"), Some(ManagedValue::Int32(7)));
    assert_eq!(fixture.binding.get(&oid).await.unwrap(), SmiValue::Integer(7));

    assert!(fixture.registry.remove("3.0").await);
    assert_eq!(
        fixture.binding.get(&oid).await.unwrap_err(),
        SnmpError::NoSuchObject(oid)
    );
    assert!(matches!(
        fixture.registry.get("3.0").await,
        Err(GatewayError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_table_reads_respect_the_ttl_window() {
    let fixture = GatewayFixture::new().await;
    let (ty, value) = disk_table();
    fixture
        .add_attribute("4", "disks", AccessRights::ReadOnly, ty, value)
        .await
        .unwrap();

    // First read fetches two rows
    let first = fixture.binding.get_bulk(&fixture.oid("4"), 100).await.unwrap();
    assert_eq!(first.len(), 6);
    assert_eq!(fixture.resource.read_count("disks"), 1);

    // Two seconds later the same rows come from cache
    tokio::time::advance(Duration::from_secs(2)).await;
    let second = fixture.binding.get_bulk(&fixture.oid("4"), 100).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(fixture.resource.read_count("disks"), 1);

    // Past the 5 second TTL exactly one more fetch happens
    tokio::time::advance(Duration::from_secs(4)).await;
    fixture.binding.get_bulk(&fixture.oid("4"), 100).await.unwrap();
    fixture.binding.get(&fixture.oid("4.2.1")).await.unwrap();
    assert_eq!(fixture.resource.read_count("disks"), 2);
}

#[tokio::test]
async fn test_walk_covers_scalars_and_tables_in_oid_order() {
    let fixture = GatewayFixture::new().await;
    fixture
        .add_attribute(
            "1.0",
            "hostname",
            AccessRights::ReadOnly,
            ManagedType::String,
            ManagedValue::String("gw".into()),
        )
        .await
        .unwrap();
    let (ty, value) = disk_table();
    fixture
        .add_attribute("4", "disks", AccessRights::ReadOnly, ty, value)
        .await
        .unwrap();
    fixture.resource.define_notification("disk_full");
    fixture
        .registry
        .add("7.0", "disk_full", Duration::from_secs(5), Default::default())
        .await
        .unwrap();

    let results = fixture
        .binding
        .get_bulk(&fixture.oid("1"), 100)
        .await
        .unwrap();
    let oids: Vec<String> = results.iter().map(|(oid, _)| oid.to_string()).collect();
    let expected: Vec<String> = ["1.0", "4.1.1", "4.1.2", "4.2.1", "4.2.2", "4.3.1", "4.3.2"]
        .iter()
        .map(|postfix| fixture.oid(postfix).to_string())
        .collect();
    // The notification feature never appears in the readable object space
    assert_eq!(oids, expected);
    assert_eq!(results[0].1, SmiValue::text("gw"));
    assert_eq!(fixture.binding.notification_oids(), vec![fixture.oid("7.0")]);
}

#[tokio::test]
async fn test_row_status_destroy_excludes_row_from_enumeration() {
    let fixture = GatewayFixture::new().await;
    let (ty, value) = disk_table();
    fixture
        .add_attribute_with_options(
            "4",
            "disks",
            AccessRights::ReadOnly,
            ty,
            value,
            &[(ROW_STATUS_OPTION, "true")],
        )
        .await
        .unwrap();

    let before = fixture.binding.get_bulk(&fixture.oid("4"), 100).await.unwrap();
    // Two data columns, an index column and a status column, over two rows
    assert_eq!(before.len(), 8);

    fixture
        .binding
        .set(&fixture.oid("4.4.1"), SmiValue::Integer(ROW_STATUS_DESTROY))
        .await
        .unwrap();

    let after = fixture.binding.get_bulk(&fixture.oid("4"), 100).await.unwrap();
    assert_eq!(after.len(), 4);
    assert!(after.iter().all(|(oid, _)| !oid.to_string().ends_with(".1")));

    let (_, trigger) = fixture
        .binding
        .table_status(&fixture.oid("4"))
        .await
        .unwrap();
    assert_eq!(trigger, mgate_snmp::RefreshTrigger::Request);
}

#[tokio::test]
async fn test_timestamp_rendering_follows_the_feature_option() {
    let fixture = GatewayFixture::new().await;
    let ts = chrono::Utc.with_ymd_and_hms(2024, 5, 17, 13, 45, 30).unwrap();

    fixture
        .add_attribute(
            "1.0",
            "plain_time",
            AccessRights::ReadOnly,
            ManagedType::Timestamp,
            ManagedValue::Timestamp(ts),
        )
        .await
        .unwrap();
    fixture
        .add_attribute_with_options(
            "2.0",
            "packed_time",
            AccessRights::ReadOnly,
            ManagedType::Timestamp,
            ManagedValue::Timestamp(ts),
            &[(DISPLAY_FORMAT_OPTION, RFC1903_FORMAT)],
        )
        .await
        .unwrap();

    assert_eq!(
        fixture.binding.get(&fixture.oid("1.0")).await.unwrap(),
        SmiValue::text(ts.to_rfc3339())
    );

    let packed = fixture.binding.get(&fixture.oid("2.0")).await.unwrap();
    let SmiValue::OctetString(bytes) = packed else {
        panic!("expected an octet string, got {:?}", packed);
    };
    assert_eq!(bytes.len(), 8);
    assert_eq!(&bytes[..2], &2024u16.to_be_bytes());
}

#[tokio::test]
async fn test_reregistration_with_changed_options_replaces_the_object() {
    let fixture = GatewayFixture::new().await;
    let ts = chrono::Utc.with_ymd_and_hms(2024, 5, 17, 13, 45, 30).unwrap();
    fixture
        .add_attribute(
            "2.0",
            "time",
            AccessRights::ReadOnly,
            ManagedType::Timestamp,
            ManagedValue::Timestamp(ts),
        )
        .await
        .unwrap();
    assert_eq!(
        fixture.binding.get(&fixture.oid("2.0")).await.unwrap(),
        SmiValue::text(ts.to_rfc3339())
    );

    // Same id, new display option: the fingerprint changes, the registry
    // reconnects and the binding swaps its object through the event pair
    let mut options = std::collections::BTreeMap::new();
    options.insert(DISPLAY_FORMAT_OPTION.to_string(), RFC1903_FORMAT.to_string());
    fixture
        .registry
        .add("2.0", "time", Duration::from_secs(5), options)
        .await
        .unwrap();

    assert_eq!(fixture.resource.connect_count("time"), 2);
    assert_eq!(fixture.resource.disconnect_count("time"), 1);
    let packed = fixture.binding.get(&fixture.oid("2.0")).await.unwrap();
    assert!(matches!(&packed, SmiValue::OctetString(bytes) if bytes.len() == 8));
}

#[tokio::test]
async fn test_failed_table_refresh_recovers_on_next_read() {
    let fixture = GatewayFixture::new().await;
    let (ty, value) = disk_table();
    fixture
        .add_attribute("4", "disks", AccessRights::ReadOnly, ty, value)
        .await
        .unwrap();

    fixture.resource.fail_reads("disks", true);
    assert!(matches!(
        fixture.binding.get(&fixture.oid("4.1.1")).await,
        Err(SnmpError::GenErr { .. })
    ));
    assert!(fixture.binding.table_status(&fixture.oid("4")).await.is_none());

    fixture.resource.fail_reads("disks", false);
    assert_eq!(
        fixture.binding.get(&fixture.oid("4.1.1")).await.unwrap(),
        SmiValue::Integer(1)
    );
}
