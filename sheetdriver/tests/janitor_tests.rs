mod common;

use common::{init_tracing, touch};
use sheetdriver::{CopiedFileRegistry, RecoveryFileJanitor, RecoveryLocation};

fn desktop_patterns() -> Vec<String> {
    [
        "*[[]オリジナル[]].xlsx",
        "*[[]Recovered[]].xlsx",
        "*~$*.xlsx",
        "*~$*.xls",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[test]
fn deletes_matching_files_but_never_the_session_copy() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let copy = touch(&dir.path().join("report_copy.xlsx"));
    // Matches every configured pattern, but belongs to the session.
    let tagged_copy = touch(&dir.path().join("~$budget [Recovered].xlsx"));
    let lock = touch(&dir.path().join("~$report_copy.xlsx"));
    let recovered = touch(&dir.path().join("report [RECOVERED].xlsx"));
    let original = touch(&dir.path().join("集計[オリジナル].xlsx"));
    let notes = touch(&dir.path().join("notes.txt"));
    std::fs::create_dir(dir.path().join("old [Recovered].xlsx")).unwrap();

    let janitor = RecoveryFileJanitor::new(&[RecoveryLocation {
        dir: dir.path().to_path_buf(),
        patterns: desktop_patterns(),
    }])
    .unwrap();
    let exclude: CopiedFileRegistry = [copy.clone(), tagged_copy.clone()].into_iter().collect();

    let report = janitor.clean(&exclude);

    assert!(copy.exists());
    assert!(tagged_copy.exists());
    assert!(notes.exists());
    assert!(dir.path().join("old [Recovered].xlsx").is_dir());
    assert!(!lock.exists());
    assert!(!recovered.exists());
    assert!(!original.exists());

    assert_eq!(report.removed.len(), 3);
    assert_eq!(report.skipped, vec![tagged_copy]);
    assert!(report.is_clean());
}

#[test]
fn scans_every_configured_location() {
    let unsaved = tempfile::tempdir().unwrap();
    let roaming = tempfile::tempdir().unwrap();
    let autosave = touch(&unsaved.path().join("Book1.xlsx~RF1a2b.TMP"));
    let keep = touch(&unsaved.path().join("Book1.xlsx"));
    let roaming_lock = touch(&roaming.path().join("~$Personal.xls"));

    let janitor = RecoveryFileJanitor::new(&[
        RecoveryLocation {
            dir: unsaved.path().to_path_buf(),
            patterns: vec!["*.xlsx~*".to_string()],
        },
        RecoveryLocation {
            dir: roaming.path().join("missing"),
            patterns: vec!["*".to_string()],
        },
        RecoveryLocation {
            dir: roaming.path().to_path_buf(),
            patterns: vec!["*~$*.xls".to_string()],
        },
    ])
    .unwrap();
    assert_eq!(janitor.directories().count(), 3);

    let report = janitor.clean(&CopiedFileRegistry::new());
    assert_eq!(report.removed.len(), 2);
    assert!(!autosave.exists());
    assert!(!roaming_lock.exists());
    assert!(keep.exists());
}

#[test]
fn running_twice_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("~$a.xlsx"));
    let janitor = RecoveryFileJanitor::new(&[RecoveryLocation {
        dir: dir.path().to_path_buf(),
        patterns: desktop_patterns(),
    }])
    .unwrap();

    assert_eq!(janitor.clean(&CopiedFileRegistry::new()).removed.len(), 1);
    let second = janitor.clean(&CopiedFileRegistry::new());
    assert!(second.removed.is_empty() && second.failed.is_empty());
}
