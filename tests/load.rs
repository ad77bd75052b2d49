use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use crossword_etl::config::DatabaseConfig;
use crossword_etl::domain::{CleanClueRecord, TableName};
use crossword_etl::error::EtlError;
use crossword_etl::load::{LoadReport, Loader, MAX_ANSWER_LEN};

fn clue(rowid: i64, clue: &str, answer: &str, definition: &str) -> CleanClueRecord {
    CleanClueRecord {
        rowid,
        clue: clue.to_string(),
        answer: answer.to_string(),
        definition: definition.to_string(),
    }
}

fn loader_in(dir: &tempfile::TempDir) -> Loader {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("processed").join("cryptics.db")).unwrap();
    Loader::new(DatabaseConfig {
        path,
        table: TableName::default(),
    })
}

#[test]
fn empty_dataset_fails_without_connecting() {
    let temp = tempfile::tempdir().unwrap();
    let loader = loader_in(&temp);

    let err = loader.load(&[]).unwrap_err();
    assert_matches!(err, EtlError::EmptyDataset);
    assert!(!loader.database().path.as_std_path().exists());
}

#[test]
fn second_load_skips_overlapping_rows() {
    let temp = tempfile::tempdir().unwrap();
    let loader = loader_in(&temp);

    let first = vec![
        clue(1, "Feline", "CAT", "animal"),
        clue(2, "Pet", "DOG", "animal"),
    ];
    let report = loader.load(&first).unwrap();
    assert_eq!(
        report,
        LoadReport {
            submitted: 2,
            inserted: 2,
            skipped: 0
        }
    );

    let second = vec![
        clue(3, "Feline", "CAT", "a different definition"),
        clue(4, "Bird", "EMU", "flightless"),
    ];
    let report = loader.load(&second).unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(loader.count().unwrap(), 3);
}

#[test]
fn duplicates_within_one_batch_are_ignored() {
    let temp = tempfile::tempdir().unwrap();
    let loader = loader_in(&temp);

    let records = vec![
        clue(1, "Feline", "CAT", "animal"),
        clue(2, "Feline", "CAT", "pet"),
        clue(3, "Feline", "LION", "big cat"),
    ];
    let report = loader.load(&records).unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
}

#[test]
fn overlong_answer_is_storage_error_and_rolls_back() {
    let temp = tempfile::tempdir().unwrap();
    let loader = loader_in(&temp);

    let records = vec![
        clue(1, "Feline", "CAT", "animal"),
        clue(2, "Too long", &"A".repeat(MAX_ANSWER_LEN + 1), "def"),
    ];
    let err = loader.load(&records).unwrap_err();
    assert_matches!(err, EtlError::Storage(_));
    assert_eq!(loader.count().unwrap(), 0);
}

#[test]
fn initialize_creates_database_and_table() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("nested").join("clues.db")).unwrap();
    let loader = Loader::new(DatabaseConfig {
        path: path.clone(),
        table: "clues".parse().unwrap(),
    });

    loader.initialize().unwrap();
    loader.initialize().unwrap();
    assert!(path.as_std_path().exists());
    assert_eq!(loader.count().unwrap(), 0);
}

#[test]
fn unopenable_database_is_storage_error() {
    let temp = tempfile::tempdir().unwrap();
    // A directory where the database file should be.
    let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let loader = Loader::new(DatabaseConfig {
        path,
        table: TableName::default(),
    });

    let err = loader.load(&[clue(1, "Feline", "CAT", "animal")]).unwrap_err();
    assert_matches!(err, EtlError::Storage(_));
}

#[test]
fn reserved_word_table_name_loads() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("keyword.db")).unwrap();
    let loader = Loader::new(DatabaseConfig {
        path,
        table: "select".parse().unwrap(),
    });

    let report = loader.load(&[clue(1, "Feline", "CAT", "animal")]).unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(loader.count().unwrap(), 1);
}
