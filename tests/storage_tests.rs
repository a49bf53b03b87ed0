use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use usagelog::db::Store;
use usagelog::domain::EntryId;
use usagelog::models::{ChoiceLists, NewUsageEntry, UsageEntry, UsageEntryPatch};
use usagelog::storage::{BackendKind, CsvBackend, Storage, StorageError};

fn entry(name: &str, tool: &str) -> NewUsageEntry {
    NewUsageEntry {
        employee_name: name.to_string(),
        manager: "Manager 1".to_string(),
        tool: tool.to_string(),
        purpose: "Development".to_string(),
        duration_minutes: 30,
        time_saved_minutes: 20,
        complexity_rating: 2,
        satisfaction_rating: 4,
        workflow_impact_rating: 3,
        result_outcome: "Shipped, with \"quotes\", commas\nand a newline".to_string(),
        notes: String::new(),
    }
}

fn choices() -> Arc<ChoiceLists> {
    Arc::new(ChoiceLists::freeform())
}

fn csv_storage(dir: &tempfile::TempDir) -> Storage {
    Storage::with_backend(Arc::new(CsvBackend::new(
        dir.path().join("usage.csv"),
        choices(),
        Duration::from_secs(5),
    )))
}

async fn sqlite_storage() -> Storage {
    let store = Store::new("sqlite::memory:").await.unwrap();
    Storage::with_backend(Arc::new(store.entry_repo(choices())))
}

/// Both backends, migrated and empty.
async fn backends(dir: &tempfile::TempDir) -> Vec<Storage> {
    let csv = csv_storage(dir);
    csv.migrate().await.unwrap();
    let sqlite = sqlite_storage().await;
    sqlite.migrate().await.unwrap();
    vec![csv, sqlite]
}

fn user_fields(rows: &[UsageEntry]) -> Vec<(i32, NewUsageEntry)> {
    rows.iter().map(|row| (row.id.value(), row.fields())).collect()
}

#[tokio::test]
async fn create_then_read_returns_the_input() {
    let dir = tempfile::tempdir().unwrap();
    for storage in backends(&dir).await {
        let input = entry("Alice", "ChatGPT");
        let created = storage.create(input.clone()).await.unwrap();
        let read = storage.read_by_id(created.id).await.unwrap();

        assert_eq!(read, created, "{}", storage.kind());
        assert_eq!(read.fields(), input);
        assert_eq!(read.created_at, read.updated_at);
    }
}

#[tokio::test]
async fn count_and_filter_scenario() {
    let dir = tempfile::tempdir().unwrap();
    for storage in backends(&dir).await {
        for tool in ["ChatGPT", "Claude", "ChatGPT"] {
            storage.create(entry("Alice", tool)).await.unwrap();
        }

        assert_eq!(storage.count().await.unwrap(), 3);
        let rows = storage.read_all().await.unwrap();
        assert_eq!(rows.iter().filter(|row| row.tool == "ChatGPT").count(), 2);
    }
}

#[tokio::test]
async fn second_delete_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    for storage in backends(&dir).await {
        let created = storage.create(entry("Alice", "ChatGPT")).await.unwrap();

        storage.delete(created.id).await.unwrap();
        let err = storage.delete(created.id).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(id) if id == created.id));

        let err = storage.read_by_id(created.id).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(storage.count().await.unwrap(), 0);
    }
}

#[tokio::test]
async fn update_changes_only_the_patched_field() {
    let dir = tempfile::tempdir().unwrap();
    for storage in backends(&dir).await {
        let created = storage.create(entry("Alice", "ChatGPT")).await.unwrap();

        let patch = UsageEntryPatch {
            satisfaction_rating: Some(5),
            ..UsageEntryPatch::default()
        };
        let updated = storage.update(created.id, patch).await.unwrap();

        assert_eq!(updated.satisfaction_rating, 5);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(
            UsageEntry {
                satisfaction_rating: created.satisfaction_rating,
                updated_at: created.updated_at,
                ..updated.clone()
            },
            created
        );
        assert_eq!(storage.read_by_id(created.id).await.unwrap(), updated);
    }
}

#[tokio::test]
async fn rejected_update_leaves_entry_untouched() {
    let dir = tempfile::tempdir().unwrap();
    for storage in backends(&dir).await {
        let created = storage.create(entry("Alice", "ChatGPT")).await.unwrap();

        let patch = UsageEntryPatch {
            complexity_rating: Some(9),
            ..UsageEntryPatch::default()
        };
        let err = storage.update(created.id, patch).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(e) if e.field == "complexity_rating"));
        assert_eq!(storage.read_by_id(created.id).await.unwrap(), created);

        let err = storage
            .update(EntryId::new(4242), UsageEntryPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}

#[tokio::test]
async fn backends_agree_on_the_same_operation_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let mut results = Vec::new();

    for storage in backends(&dir).await {
        let a = storage.create(entry("Alice", "ChatGPT")).await.unwrap();
        let b = storage.create(entry("Bob", "Claude")).await.unwrap();
        let c = storage.create(entry("Carol", "Gemini")).await.unwrap();

        storage
            .update(
                b.id,
                UsageEntryPatch {
                    notes: Some("second pass".to_string()),
                    duration_minutes: Some(45),
                    ..UsageEntryPatch::default()
                },
            )
            .await
            .unwrap();
        storage.delete(a.id).await.unwrap();
        storage.duplicate(c.id).await.unwrap();

        results.push(user_fields(&storage.read_all().await.unwrap()));
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flat_file_creates_get_sequential_ids() {
    let dir = tempfile::tempdir().unwrap();
    let first = csv_storage(&dir);
    first.migrate().await.unwrap();
    // A second handle on the same file stands in for another process.
    let second = csv_storage(&dir);

    let (a, b) = tokio::join!(
        first.create(entry("Alice", "ChatGPT")),
        second.create(entry("Bob", "Claude")),
    );
    let ids: BTreeSet<i32> = [a.unwrap().id.value(), b.unwrap().id.value()].into();
    assert_eq!(ids, BTreeSet::from([1, 2]));

    let mut handles = Vec::new();
    for i in 0..8 {
        let storage = if i % 2 == 0 { first.clone() } else { second.clone() };
        handles.push(tokio::spawn(async move {
            storage.create(entry("Worker", "ChatGPT")).await.map(|e| e.id.value())
        }));
    }
    let mut ids = ids;
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap().unwrap()));
    }

    assert_eq!(ids, (1..=10).collect::<BTreeSet<_>>());
    assert_eq!(first.count().await.unwrap(), 10);
}

#[tokio::test]
async fn read_since_and_owner_views() {
    let dir = tempfile::tempdir().unwrap();
    for storage in backends(&dir).await {
        let first = storage.create(entry("Alice", "ChatGPT")).await.unwrap();
        storage.create(entry("Bob", "Claude")).await.unwrap();
        storage.create(entry("alice", "Claude")).await.unwrap();

        let since = storage.read_since(first.created_at).await.unwrap();
        assert_eq!(since.len(), 3);
        assert!(since.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let future = first.created_at + chrono::TimeDelta::days(1);
        assert!(storage.read_since(future).await.unwrap().is_empty());

        let mine = storage.read_by_owner(&["ALICE"]).await.unwrap();
        assert_eq!(mine.len(), 2);
    }
}

#[tokio::test]
async fn csv_file_is_readable_with_standard_tooling() {
    let dir = tempfile::tempdir().unwrap();
    let storage = csv_storage(&dir);
    storage.migrate().await.unwrap();
    assert_eq!(storage.kind(), BackendKind::Csv);

    let created = storage.create(entry("Alice", "ChatGPT")).await.unwrap();

    let mut reader = csv::Reader::from_path(dir.path().join("usage.csv")).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "id");
    assert_eq!(headers.len(), 14);

    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(&record[0], "1");
    assert_eq!(&record[10], created.result_outcome.as_str());
}

const OLD_SCHEMA: [&str; 5] = [
    "CREATE TABLE usage_entries (id INTEGER PRIMARY KEY AUTOINCREMENT, \
     employee_name TEXT NOT NULL, manager TEXT NOT NULL, tool TEXT NOT NULL, \
     purpose TEXT NOT NULL, duration_minutes INTEGER NOT NULL, \
     result_outcome TEXT NOT NULL DEFAULT '', notes TEXT NOT NULL DEFAULT '', \
     created_at TEXT NOT NULL, updated_at TEXT NOT NULL)",
    "INSERT INTO usage_entries (employee_name, manager, tool, purpose, duration_minutes, \
     result_outcome, created_at, updated_at) VALUES ('Carol', 'Manager 1', 'ChatGPT', \
     'Writing', 15, 'Done', '2025-01-01T09:00:00.000000Z', '2025-01-01T09:00:00.000000Z')",
    "CREATE TABLE entries (Name TEXT, Manager TEXT, AI_Tool TEXT, Purpose TEXT, \
     Duration INTEGER, Satisfaction REAL, Timestamp TEXT)",
    "INSERT INTO entries VALUES ('Alice', 'Manager 1', 'ChatGPT', 'Development', NULL, 4.0, \
     '2025-03-04T10:15:30.123456')",
    "INSERT INTO entries VALUES ('Bob', 'Manager 2', 'Claude', 'Writing', 20, NULL, \
     '2025-03-05 11:00:00')",
];

/// The rows of the legacy `entries` table above, as an old flat file.
const OLD_FILE: &str = "Name,Manager,AI Tool,Purpose,Duration,Satisfaction,Timestamp\n\
                        Alice,Manager 1,ChatGPT,Development,,4.0,2025-03-04T10:15:30.123456\n\
                        Bob,Manager 2,Claude,Writing,20,,2025-03-05 11:00:00\n";

async fn seed_old_database(path: &std::path::Path) -> String {
    use sea_orm::{ConnectionTrait, Database};

    std::fs::File::create(path).unwrap();
    let url = format!("sqlite:{}", path.display());
    let conn = Database::connect(&url).await.unwrap();
    for sql in OLD_SCHEMA {
        conn.execute_unprepared(sql).await.unwrap();
    }
    conn.close().await.unwrap();
    url
}

#[tokio::test]
async fn old_database_is_backfilled_once() {
    let dir = tempfile::tempdir().unwrap();
    let url = seed_old_database(&dir.path().join("old.db")).await;

    let store = Store::new(&url).await.unwrap();
    let repo = Storage::with_backend(Arc::new(store.entry_repo(choices())));
    let rows = repo.read_all().await.unwrap();

    let names: Vec<&str> = rows.iter().map(|row| row.employee_name.as_str()).collect();
    assert_eq!(names, ["Carol", "Alice", "Bob"]);

    let carol = &rows[0];
    assert_eq!(carol.time_saved_minutes, 0);
    assert_eq!(carol.complexity_rating, 1);
    assert_eq!(carol.satisfaction_rating, 3);
    assert_eq!(carol.workflow_impact_rating, 1);

    let alice = &rows[1];
    assert_eq!(alice.duration_minutes, 0);
    assert_eq!(alice.satisfaction_rating, 4);
    assert_eq!(alice.result_outcome, "");
    assert_eq!(
        usagelog::domain::format_timestamp(&alice.created_at),
        "2025-03-04T10:15:30.123456Z"
    );
    assert_eq!(alice.updated_at, alice.created_at);

    repo.migrate().await.unwrap();
    drop(repo);
    store.conn.close().await.unwrap();

    let reopened = Store::new(&url).await.unwrap();
    let again = Storage::with_backend(Arc::new(reopened.entry_repo(choices())))
        .read_all()
        .await
        .unwrap();
    assert_eq!(again, rows);
}

#[tokio::test]
async fn legacy_rows_decode_identically_on_both_backends() {
    let dir = tempfile::tempdir().unwrap();

    let csv = csv_storage(&dir);
    std::fs::write(dir.path().join("usage.csv"), OLD_FILE).unwrap();
    csv.migrate().await.unwrap();

    let url = seed_old_database(&dir.path().join("old.db")).await;
    let store = Store::new(&url).await.unwrap();
    let sqlite = Storage::with_backend(Arc::new(store.entry_repo(choices())));

    let from_file = csv.read_all().await.unwrap();
    let from_table: Vec<UsageEntry> = sqlite
        .read_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|row| row.employee_name != "Carol")
        .collect();

    let comparable = |rows: &[UsageEntry]| {
        rows.iter()
            .map(|row| (row.fields(), row.created_at, row.updated_at))
            .collect::<Vec<_>>()
    };
    assert_eq!(comparable(&from_file), comparable(&from_table));
}

#[tokio::test]
async fn backfilled_rows_stay_editable() {
    let dir = tempfile::tempdir().unwrap();

    let csv = csv_storage(&dir);
    std::fs::write(dir.path().join("usage.csv"), OLD_FILE).unwrap();
    csv.migrate().await.unwrap();

    let url = seed_old_database(&dir.path().join("old.db")).await;
    let store = Store::new(&url).await.unwrap();
    let sqlite = Storage::with_backend(Arc::new(store.entry_repo(choices())));

    for storage in [csv, sqlite] {
        let legacy = storage
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .find(|row| row.employee_name == "Alice")
            .unwrap();
        assert_eq!(legacy.result_outcome, "");

        let patch = UsageEntryPatch {
            satisfaction_rating: Some(5),
            ..UsageEntryPatch::default()
        };
        let updated = storage.update(legacy.id, patch).await.unwrap();
        assert_eq!(updated.satisfaction_rating, 5, "{}", storage.kind());
        assert_eq!(updated.duration_minutes, legacy.duration_minutes);

        // A duplicate is a new submission and must pass full validation.
        let err = storage.duplicate(legacy.id).await.unwrap_err();
        assert!(
            matches!(err, StorageError::Validation(ref e) if e.field == "result_outcome"),
            "{}",
            storage.kind()
        );
    }
}

#[tokio::test]
async fn columns_already_present_are_left_alone() {
    use sea_orm::{ConnectionTrait, Database};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.db");
    std::fs::File::create(&path).unwrap();
    let url = format!("sqlite:{}", path.display());

    let conn = Database::connect(&url).await.unwrap();
    conn.execute_unprepared(&OLD_SCHEMA[0].replace(
        "duration_minutes INTEGER NOT NULL,",
        "duration_minutes INTEGER NOT NULL, time_saved_minutes INTEGER NOT NULL DEFAULT 0,",
    ))
    .await
    .unwrap();
    conn.execute_unprepared(
        "INSERT INTO usage_entries (employee_name, manager, tool, purpose, duration_minutes, \
         time_saved_minutes, result_outcome, created_at, updated_at) VALUES ('Dana', \
         'Manager 2', 'ChatGPT', 'Writing', 10, 25, 'Done', '2025-01-01T09:00:00.000000Z', \
         '2025-01-01T09:00:00.000000Z')",
    )
    .await
    .unwrap();
    conn.close().await.unwrap();

    let store = Store::new(&url).await.unwrap();
    let rows = Storage::with_backend(Arc::new(store.entry_repo(choices())))
        .read_all()
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time_saved_minutes, 25);
    assert_eq!(rows[0].complexity_rating, 1);
}
