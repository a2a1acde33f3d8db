//! Against the real desktop. Needs an installed Excel and an idle session:
//! `cargo test --test desktop_tests -- --ignored`
#![cfg(target_os = "windows")]

use sheetdriver::{Driver, KeyAction, PatternSet, TeardownMode};
use std::time::Duration;
use tracing::info;

fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sheetdriver=debug")
        .try_init();
}

#[test]
#[ignore]
fn launch_activate_and_close_blank_workbook() -> anyhow::Result<()> {
    setup_logging();
    let mut driver = Driver::new_default()?;

    let session = driver.launch(None)?;
    info!("Main window: {}", session.main_window.title);

    assert!(driver.ensure_active("smoke test"));
    assert!(!driver.is_dialog_present(&PatternSet::from("Save As")));

    let closed = driver.close(&KeyAction::from("{alt}{F4}"));
    let report = driver.terminate(TeardownMode::Normal);
    info!("Closed gracefully: {:?}, cleanup: {:?}", closed, report);
    Ok(())
}

#[test]
#[ignore]
fn dialog_wait_times_out_on_idle_desktop() -> anyhow::Result<()> {
    setup_logging();
    let driver = Driver::new_default()?;
    let found = driver.wait_for_dialog(
        &PatternSet::from(["sheetdriver-no-such-dialog"]),
        Some(Duration::from_secs(1)),
    );
    assert!(!found.found);
    Ok(())
}
