mod common;
use common::*;

use hoymiles_bridge::device::register_map::{self, translate};

// panel field addresses for a panel based at `base`
fn at(base: u16, offset: u16) -> u16 {
    base + offset - 0x1000
}

async fn mapped(mock: &MockDtu) -> Dtu {
    let mut dtu = Factory::dtu(mock);
    dtu.map_microinverters().await.unwrap();
    dtu
}

#[tokio::test]
async fn panel_accessors_apply_field_scaling() {
    common_setup();

    let mock = Factory::populated_mock();
    let base = slot_address(2);
    mock.set_register(at(base, 0x1008), 2300);
    mock.set_register(at(base, 0x100A), 250);
    mock.set_register(at(base, 0x100C), 2315);
    mock.set_register(at(base, 0x100E), 5001);
    mock.set_register(at(base, 0x1010), 1500);
    mock.set_register(at(base, 0x1012), 842);
    mock.set_registers(at(base, 0x1014), &[0x0001, 0x0002]);
    mock.set_register(at(base, 0x1018), (-52i16) as u16);
    mock.set_register(at(base, 0x101A), 3);

    let mut dtu = mapped(&mock).await;
    let panel = dtu.microinverter("116180218551").unwrap().panels()[0].clone();
    let session = dtu.session();

    assert_eq!(panel.pv_voltage(session).await.unwrap(), 230.0);
    assert_eq!(panel.pv_current(session).await.unwrap(), 2.5);
    assert_eq!(panel.grid_voltage(session).await.unwrap(), 231.5);
    assert_eq!(panel.grid_frequency(session).await.unwrap(), 50.01);
    assert_eq!(panel.pv_power(session).await.unwrap(), 150.0);
    assert_eq!(panel.today_production(session).await.unwrap(), 842);
    assert_eq!(panel.total_production(session).await.unwrap(), 0x0001_0002);
    assert_eq!(panel.temperature(session).await.unwrap(), -5.2);
    assert_eq!(panel.operating_status(session).await.unwrap(), 3);
}

#[tokio::test]
async fn panel_and_microinverter_status_widths_differ() {
    common_setup();

    let mock = Factory::populated_mock();
    let mut dtu = mapped(&mock).await;
    let microinverter = dtu.microinverters()[1].clone();
    let panel = microinverter.panels()[0].clone();
    let before = mock.reads().len();

    panel.alarm_code(dtu.session()).await.unwrap();
    microinverter.read_value(dtu.session(), Field::AlarmCode).await.unwrap();

    assert_eq!(
        mock.reads()[before..].to_vec(),
        vec![(at(0x1050, 0x101C), 1), (at(0x1050, 0x101C), 2)]
    );
}

#[tokio::test]
async fn panels_do_not_map_microinverter_only_fields() {
    common_setup();

    let mock = Factory::populated_mock();
    let mut dtu = mapped(&mock).await;
    let panel = dtu.microinverters()[0].panels()[0].clone();

    let err = panel.read_value(dtu.session(), Field::PortNumber).await.unwrap_err();
    assert!(matches!(err, Error::UnknownField { field: Field::PortNumber, .. }));
    // rejected before any I/O, so the session is untouched
    assert!(dtu.is_connected());
}

#[tokio::test]
async fn microinverter_reads_its_full_map() {
    common_setup();

    let mock = Factory::populated_mock();
    mock.set_registers(at(0x1050, 0x1004), &[0x5630, 0x312e, 0x3000]);
    mock.set_register(at(0x1050, 0x1007), 2);
    mock.set_register(at(0x1050, 0x1018), 315);

    let mut dtu = mapped(&mock).await;
    let microinverter = dtu.microinverter("116180218551").unwrap().clone();
    let session = dtu.session();

    assert_eq!(
        microinverter.read_value(session, Field::Firmware).await.unwrap(),
        Value::Ascii("V01.0".to_string())
    );
    assert_eq!(
        microinverter.read_value(session, Field::PortNumber).await.unwrap(),
        Value::U16(2)
    );
    assert_eq!(
        microinverter.read_value(session, Field::SerialNumber).await.unwrap(),
        Value::AsciiBcd("116180218551".to_string())
    );
    assert_eq!(microinverter.temperature(session).await.unwrap(), 31.5);
}

#[tokio::test]
async fn total_power_sums_every_panel() {
    common_setup();

    let mock = Factory::populated_mock();
    mock.set_register(at(slot_address(0), 0x1010), 1500);
    mock.set_register(at(slot_address(1), 0x1010), 1234);
    mock.set_register(at(slot_address(2), 0x1010), 7);

    let mut dtu = mapped(&mock).await;
    let total = dtu.get_total_power().await.unwrap();
    assert!((total - (150.0 + 123.4 + 0.7)).abs() < 1e-9);

    let first = dtu.microinverters()[0].clone();
    let power = first.total_current_power(dtu.session()).await.unwrap();
    assert!((power - 273.4).abs() < 1e-9);
}

#[tokio::test]
async fn daily_power_is_unscaled() {
    common_setup();

    let mock = Factory::populated_mock();
    mock.set_register(at(slot_address(0), 0x1012), 1500);
    mock.set_register(at(slot_address(1), 0x1012), 1234);
    mock.set_register(at(slot_address(2), 0x1012), 7);

    let mut dtu = mapped(&mock).await;
    let before = mock.reads().len();
    assert_eq!(dtu.get_daily_power().await.unwrap(), 2741);
    // one read per panel
    assert_eq!(mock.reads().len() - before, 3);
}

#[tokio::test]
async fn aggregation_error_disconnects_and_propagates() {
    common_setup();

    let mock = Factory::populated_mock();
    let mut dtu = mapped(&mock).await;
    mock.fail_at(at(slot_address(1), 0x1010));

    let err = dtu.get_total_power().await.unwrap_err();
    assert!(err.is_transport());
    assert!(!dtu.is_connected());
}

#[tokio::test]
async fn snapshot_covers_every_panel() {
    common_setup();

    let mock = Factory::populated_mock();
    mock.set_register(at(slot_address(0), 0x1010), 100);
    mock.set_register(at(slot_address(2), 0x1012), 55);

    let mut dtu = mapped(&mock).await;
    dtu.fetch_serial_number().await.unwrap();
    let snapshot = dtu.snapshot().await.unwrap();

    assert_eq!(snapshot.serial_number.as_deref(), Some("414012345678"));
    assert_eq!(snapshot.microinverters.len(), 2);
    assert_eq!(snapshot.microinverters[0].panels.len(), 2);
    assert_eq!(snapshot.total_power, 10.0);
    assert_eq!(snapshot.daily_energy, 55);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["microinverters"][1]["serial_number"], "116180218551");
    assert_eq!(json["microinverters"][1]["panels"][0]["today_production"], 55);
}

#[test]
fn address_translation() {
    assert_eq!(translate(0x1010, 0x1028), Some(0x1038));
    assert_eq!(translate(0x0fff, 0x1000), None);
    assert_eq!(
        register_map::PANEL.address(Field::PvPower, 0x1050).unwrap(),
        0x1060
    );
    assert_eq!(register_map::MICROINVERTER.fields().count(), 23);
    assert_eq!(register_map::PANEL.fields().count(), 13);
}
