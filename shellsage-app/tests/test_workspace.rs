use shellsage_app::workspace::GeneratedFiles;
use shellsage_core::{FileStore, FileStoreError};

#[tokio::test]
async fn test_persist_writes_into_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let files = GeneratedFiles::new(dir.path());
    files.init().await.unwrap();

    files.persist("hello.py", "print('hi')").await.unwrap();

    let content = tokio::fs::read_to_string(dir.path().join("hello.py"))
        .await
        .unwrap();
    assert_eq!(content, "print('hi')");
}

#[tokio::test]
async fn test_list_only_shows_python_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let files = GeneratedFiles::new(dir.path());
    files.init().await.unwrap();

    files.persist("b.py", "pass").await.unwrap();
    files.persist("a.py", "pass").await.unwrap();
    files.persist("notes.txt", "not a script").await.unwrap();

    let names = files.list_scripts().await.unwrap();
    assert_eq!(names, vec!["a.py", "b.py"]);
}

#[tokio::test]
async fn test_path_components_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let files = GeneratedFiles::new(dir.path());
    files.init().await.unwrap();

    let err = files.persist("../escape.py", "pass").await.unwrap_err();
    assert!(matches!(err, FileStoreError::InvalidName(_)));

    let err = files.persist("nested/escape.py", "pass").await.unwrap_err();
    assert!(matches!(err, FileStoreError::InvalidName(_)));
}

#[tokio::test]
async fn test_delete_guards_and_reports_missing() {
    let dir = tempfile::tempdir().unwrap();
    let files = GeneratedFiles::new(dir.path());
    files.init().await.unwrap();

    files.persist("gone.py", "pass").await.unwrap();
    assert!(files.delete_script("gone.py").await.unwrap());
    assert!(!files.delete_script("gone.py").await.unwrap());

    // Only generated Python scripts are deletable.
    files.persist("notes.txt", "keep").await.unwrap();
    let err = files.delete_script("notes.txt").await.unwrap_err();
    assert!(matches!(err, FileStoreError::InvalidName(_)));

    let err = files.delete_script("../x.py").await.unwrap_err();
    assert!(matches!(err, FileStoreError::InvalidName(_)));
}
