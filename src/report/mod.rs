//! Change Report
//!
//! Walks every record type and every raw table and reports what was edited
//! after a cutoff. The pass is linear and read-only:
//! - changed instances of each topmost record type
//! - changed rows of tables no record type owns
//! - owner-less tables that have no `LastEdited` column at all

pub mod cutoff;
pub mod event;
pub mod render;

pub use cutoff::{parse_days_back, Cutoff};
pub use event::{PrintSink, ReportEvent, ReportSink};
pub use render::Format;

use crate::error::AppError;
use crate::registry::{RecordInstance, RecordType, SkipList, TypeRegistry, ID_COLUMN, LAST_EDITED};
use crate::store::ChangeStore;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const TASK_SLUG: &str = "changed-data-objects";
pub const TASK_TITLE: &str = "Changed DataObjects";
pub const TASK_DESCRIPTION: &str =
    "Lists DataObjects and tables with LastEdited changed since a computed date based on days back.";

/// Counts gathered during one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub types_checked: usize,
    pub types_failed: usize,
    pub changed_records: usize,
    pub tables_with_last_edited: usize,
    pub tables_without_last_edited: usize,
    pub changed_rows: usize,
}

/// Unmapped tables split by whether they carry `LastEdited`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableClassification {
    pub with_last_edited: Vec<String>,
    pub without_last_edited: Vec<String>,
}

/// Tables not owned by any record type and not skipped, in store order
pub fn unmapped_tables(all: &[String], owned: &HashSet<String>, skip: &SkipList) -> Vec<String> {
    all.iter()
        .filter(|t| !skip.skips_table(t) && !owned.contains(*t))
        .cloned()
        .collect()
}

pub struct ChangeReporter<S> {
    store: S,
    registry: TypeRegistry,
    skip: SkipList,
}

impl<S: ChangeStore> ChangeReporter<S> {
    pub fn new(store: S, registry: TypeRegistry, skip: SkipList) -> Self {
        Self {
            store,
            registry,
            skip,
        }
    }

    /// Run one full pass. Failures while scanning a record type only skip
    /// that type; failures in the raw table phases abort the pass, leaving
    /// whatever was already emitted in the sink.
    pub async fn run<K: ReportSink>(
        &self,
        cutoff: &Cutoff,
        sink: &mut K,
    ) -> Result<ReportSummary, AppError> {
        let cutoff_text = cutoff.to_string();
        info!("Building change report (daysBack={}, cutoff={})", cutoff.days_back(), cutoff_text);
        sink.emit(ReportEvent::Cutoff {
            cutoff: cutoff_text.clone(),
        });

        let mut summary = ReportSummary::default();

        for record_type in self.registry.types_to_check(&self.skip) {
            summary.types_checked += 1;
            let instances = match self.changed_instances(record_type, cutoff).await {
                Ok(instances) => instances,
                Err(e) => {
                    warn!("Skipping type {}: {}", record_type.name, e);
                    summary.types_failed += 1;
                    continue;
                }
            };
            if instances.is_empty() {
                continue;
            }

            debug!("{} changed records of type {}", instances.len(), record_type.name);
            summary.changed_records += instances.len();
            sink.emit(ReportEvent::TypeHeader {
                type_name: record_type.name.clone(),
                cutoff: cutoff_text.clone(),
            });
            for instance in instances {
                sink.emit(ReportEvent::Instance(instance));
            }
            sink.emit(ReportEvent::Separator);
        }

        let tables = self.classify_tables().await?;
        summary.tables_with_last_edited = tables.with_last_edited.len();
        summary.tables_without_last_edited = tables.without_last_edited.len();

        for table in &tables.with_last_edited {
            let rows = self.store.rows_changed_since(table, LAST_EDITED, cutoff).await?;
            if rows.is_empty() {
                continue;
            }

            debug!("{} changed rows in unmapped table {}", rows.len(), table);
            summary.changed_rows += rows.len();
            sink.emit(ReportEvent::TableHeader {
                table: table.clone(),
                count: rows.len(),
                cutoff: cutoff_text.clone(),
            });
            for row in rows {
                sink.emit(ReportEvent::TableRow {
                    id: row.text(ID_COLUMN),
                    last_edited: row.last_edited,
                });
            }
        }

        sink.emit(ReportEvent::UntimedHeader);
        for table in tables.without_last_edited {
            sink.emit(ReportEvent::UntimedTable { table });
        }

        info!(
            "Change report done: {} types checked, {} records, {} raw rows",
            summary.types_checked, summary.changed_records, summary.changed_rows
        );
        Ok(summary)
    }

    /// Instances of `record_type` edited after the cutoff
    async fn changed_instances(
        &self,
        record_type: &RecordType,
        cutoff: &Cutoff,
    ) -> Result<Vec<RecordInstance>, AppError> {
        if !self.store.column_exists(&record_type.table, LAST_EDITED).await? {
            debug!(
                "Type {} has no {} column on table {}",
                record_type.name, LAST_EDITED, record_type.table
            );
            return Ok(Vec::new());
        }

        let rows = self
            .store
            .rows_changed_since(&record_type.table, LAST_EDITED, cutoff)
            .await?;
        Ok(rows.iter().map(|row| record_type.instance(row)).collect())
    }

    /// List the store's tables and split the unmapped ones by `LastEdited`
    pub async fn classify_tables(&self) -> Result<TableClassification, AppError> {
        let all = self.store.list_tables().await?;
        let owned = self.registry.owned_tables();
        let mut classification = TableClassification::default();

        for table in unmapped_tables(&all, &owned, &self.skip) {
            if self.store.column_exists(&table, LAST_EDITED).await? {
                classification.with_last_edited.push(table);
            } else {
                classification.without_last_edited.push(table);
            }
        }

        debug!(
            "{} tables, {} unmapped with {}, {} without",
            all.len(),
            classification.with_last_edited.len(),
            LAST_EDITED,
            classification.without_last_edited.len()
        );
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::def;
    use crate::registry::BASE_TYPE;
    use crate::report::cutoff::TIMESTAMP_FORMAT;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cutoff() -> Cutoff {
        let now = NaiveDateTime::parse_from_str("2024-01-31 00:00:00", TIMESTAMP_FORMAT).unwrap();
        Cutoff::at(now, 30.0)
    }

    fn registry() -> TypeRegistry {
        let mut site_tree = def("SiteTree", None);
        site_tree.edit_link = Some("admin/pages/edit/show/{id}".to_string());
        TypeRegistry::from_definitions(vec![
            site_tree,
            def("Page", Some("SiteTree")),
            def("Article", Some("Page")),
            def("File", None),
            def("LoginAttempt", None),
        ])
        .unwrap()
    }

    const RECORD_COLUMNS: &[&str] = &["ID", "ClassName", "Title", "LastEdited"];

    async fn run(store: MemoryStore, registry: TypeRegistry) -> (Vec<ReportEvent>, ReportSummary, MemoryStore) {
        let reporter = ChangeReporter::new(store, registry, SkipList::default());
        let mut events = Vec::new();
        let summary = reporter.run(&cutoff(), &mut events).await.unwrap();
        (events, summary, reporter.store)
    }

    fn untimed(tables: &[&str]) -> Vec<ReportEvent> {
        let mut events = vec![ReportEvent::UntimedHeader];
        events.extend(tables.iter().map(|t| ReportEvent::UntimedTable {
            table: t.to_string(),
        }));
        events
    }

    #[tokio::test]
    async fn test_changed_article_is_reported_once_under_its_ancestor() {
        let store = MemoryStore::new()
            .table(
                "SiteTree",
                RECORD_COLUMNS,
                vec![
                    json!({"ID": 1, "ClassName": "Article", "Title": "Launch", "LastEdited": "2024-02-01 00:00:00"}),
                    json!({"ID": 2, "ClassName": "Page", "Title": "About", "LastEdited": "2023-06-01 00:00:00"}),
                ],
            )
            .table("Page", &["ID"], vec![])
            .table("Article", &["ID"], vec![])
            .table("File", RECORD_COLUMNS, vec![]);

        let (events, summary, store) = run(store, registry()).await;

        assert_eq!(
            events,
            [
                vec![
                    ReportEvent::Cutoff {
                        cutoff: "2024-01-01 00:00:00".to_string()
                    },
                    ReportEvent::TypeHeader {
                        type_name: "SiteTree".to_string(),
                        cutoff: "2024-01-01 00:00:00".to_string(),
                    },
                    ReportEvent::Instance(RecordInstance {
                        id: "1".to_string(),
                        title: "Launch".to_string(),
                        last_edited: "2024-02-01 00:00:00".to_string(),
                        cms_edit_link: Some("admin/pages/edit/show/1".to_string()),
                        link: None,
                    }),
                    ReportEvent::Separator,
                ],
                untimed(&[]),
            ]
            .concat()
        );
        assert_eq!(summary.types_checked, 2);
        assert_eq!(summary.changed_records, 1);
        // Page and Article share SiteTree, so it is queried once
        assert_eq!(store.queried(), vec!["SiteTree", "File"]);
    }

    #[tokio::test]
    async fn test_direct_subtype_scenario() {
        let registry = TypeRegistry::from_definitions(vec![def("Article", Some(BASE_TYPE))]).unwrap();
        let store = MemoryStore::new().table(
            "Article",
            RECORD_COLUMNS,
            vec![json!({"ID": 9, "Title": "Hello", "LastEdited": "2024-02-01 00:00:00"})],
        );

        let (events, _, _) = run(store, registry).await;

        assert_eq!(
            events[1],
            ReportEvent::TypeHeader {
                type_name: "Article".to_string(),
                cutoff: "2024-01-01 00:00:00".to_string(),
            }
        );
        assert_eq!(
            Format::Text.render(&events[2]),
            " -- [no edit] [no view] ID: 9, Title: Hello, LastEdited: 2024-02-01 00:00:00"
        );
        assert_eq!(events[3], ReportEvent::Separator);
    }

    #[tokio::test]
    async fn test_old_instances_produce_no_header() {
        let store = MemoryStore::new()
            .table(
                "SiteTree",
                RECORD_COLUMNS,
                vec![json!({"ID": 1, "Title": "Old", "LastEdited": "2024-01-01 00:00:00"})],
            )
            .table("File", RECORD_COLUMNS, vec![]);

        let (events, summary, _) = run(store, registry()).await;

        assert!(!events.iter().any(|e| matches!(e, ReportEvent::TypeHeader { .. })));
        assert_eq!(summary.changed_records, 0);
    }

    #[tokio::test]
    async fn test_skipped_type_and_table_never_reported() {
        let store = MemoryStore::new()
            .table("SiteTree", RECORD_COLUMNS, vec![])
            .table("File", RECORD_COLUMNS, vec![])
            .table(
                "LoginAttempt",
                RECORD_COLUMNS,
                vec![json!({"ID": 1, "LastEdited": "2024-02-01 00:00:00"})],
            )
            .table(
                "LoginSession",
                &["ID", "LastEdited"],
                vec![json!({"ID": 4, "LastEdited": "2024-02-01 00:00:00"})],
            );

        let (events, _, store) = run(store, registry()).await;

        assert!(!store.queried().iter().any(|t| t.starts_with("Login")));
        assert_eq!(&events[1..], untimed(&[]).as_slice());
    }

    #[tokio::test]
    async fn test_base_type_table_is_never_scanned() {
        let store = MemoryStore::new()
            .table("SiteTree", RECORD_COLUMNS, vec![])
            .table("File", RECORD_COLUMNS, vec![])
            .table(
                BASE_TYPE,
                RECORD_COLUMNS,
                vec![json!({"ID": 1, "LastEdited": "2024-02-01 00:00:00"})],
            );

        let (_, summary, store) = run(store, registry()).await;

        assert_eq!(summary.types_checked, 2);
        assert_eq!(summary.changed_rows, 0);
        assert!(!store.queried().contains(&BASE_TYPE.to_string()));
    }

    #[tokio::test]
    async fn test_unmapped_tables() {
        let store = MemoryStore::new()
            .table("SiteTree", RECORD_COLUMNS, vec![])
            .table("SiteTree_Live", RECORD_COLUMNS, vec![json!({"ID": 1, "LastEdited": "2024-02-01 00:00:00"})])
            .table("SiteTree_versions", RECORD_COLUMNS, vec![json!({"ID": 1, "LastEdited": "2024-02-01 00:00:00"})])
            .table("File", RECORD_COLUMNS, vec![])
            .table(
                "legacy_log",
                &["ID", "LastEdited", "Message"],
                vec![
                    json!({"ID": 1, "LastEdited": "2024-01-05 08:00:00"}),
                    json!({"ID": 2, "LastEdited": "2024-01-06 08:00:00"}),
                    json!({"ID": 3, "LastEdited": "2024-01-07 08:00:00"}),
                    json!({"ID": 4, "LastEdited": "2023-12-07 08:00:00"}),
                ],
            )
            .table(
                "import_queue",
                &["LastEdited", "Payload"],
                vec![json!({"LastEdited": "2024-01-10 09:30:00"})],
            )
            .table(
                "quiet_table",
                &["ID", "LastEdited"],
                vec![json!({"ID": 1, "LastEdited": "2023-01-01 00:00:00"})],
            )
            .table("tag_map", &["TagID", "PageID"], vec![json!({"TagID": 1})]);

        let (events, summary, store) = run(store, registry()).await;

        let expected: Vec<ReportEvent> = [
            vec![
                ReportEvent::Cutoff {
                    cutoff: "2024-01-01 00:00:00".to_string(),
                },
                ReportEvent::TableHeader {
                    table: "legacy_log".to_string(),
                    count: 3,
                    cutoff: "2024-01-01 00:00:00".to_string(),
                },
            ],
            ["2024-01-05 08:00:00", "2024-01-06 08:00:00", "2024-01-07 08:00:00"]
                .iter()
                .enumerate()
                .map(|(i, ts)| ReportEvent::TableRow {
                    id: Some((i + 1).to_string()),
                    last_edited: ts.to_string(),
                })
                .collect(),
            vec![
                ReportEvent::TableHeader {
                    table: "import_queue".to_string(),
                    count: 1,
                    cutoff: "2024-01-01 00:00:00".to_string(),
                },
                ReportEvent::TableRow {
                    id: None,
                    last_edited: "2024-01-10 09:30:00".to_string(),
                },
            ],
            untimed(&["tag_map"]),
        ]
        .concat();

        assert_eq!(events, expected);
        assert_eq!(summary.tables_with_last_edited, 3);
        assert_eq!(summary.tables_without_last_edited, 1);
        assert_eq!(summary.changed_rows, 4);

        let queried = store.queried();
        assert!(!queried.contains(&"tag_map".to_string()));
        assert!(!queried.iter().any(|t| t.starts_with("SiteTree_")));
    }

    #[tokio::test]
    async fn test_type_failure_skips_only_that_type() {
        let store = MemoryStore::new()
            .table("SiteTree", RECORD_COLUMNS, vec![])
            .table(
                "File",
                RECORD_COLUMNS,
                vec![json!({"ID": 3, "Title": "logo.png", "LastEdited": "2024-01-20 00:00:00"})],
            )
            .failing("SiteTree");

        let (events, summary, _) = run(store, registry()).await;

        assert_eq!(summary.types_failed, 1);
        assert_eq!(
            events[1],
            ReportEvent::TypeHeader {
                type_name: "File".to_string(),
                cutoff: "2024-01-01 00:00:00".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_type_without_last_edited_column_is_skipped() {
        let store = MemoryStore::new()
            .table("SiteTree", &["ID", "Title"], vec![json!({"ID": 1})])
            .table("File", RECORD_COLUMNS, vec![]);

        let (events, summary, store) = run(store, registry()).await;

        assert_eq!(summary.types_checked, 2);
        assert_eq!(summary.types_failed, 0);
        assert_eq!(store.queried(), vec!["File"]);
        assert_eq!(
            events,
            vec![
                ReportEvent::Cutoff {
                    cutoff: "2024-01-01 00:00:00".to_string(),
                },
                ReportEvent::UntimedHeader,
            ]
        );
    }

    #[tokio::test]
    async fn test_table_failure_aborts_but_keeps_partial_output() {
        let store = MemoryStore::new()
            .table(
                "SiteTree",
                RECORD_COLUMNS,
                vec![json!({"ID": 1, "Title": "Launch", "LastEdited": "2024-02-01 00:00:00"})],
            )
            .table("File", RECORD_COLUMNS, vec![])
            .table("legacy_log", &["ID", "LastEdited"], vec![])
            .failing("legacy_log");

        let reporter = ChangeReporter::new(store, registry(), SkipList::default());
        let mut events = Vec::new();
        let result = reporter.run(&cutoff(), &mut events).await;

        assert!(result.is_err());
        assert_eq!(events.len(), 4);
        assert_eq!(events[3], ReportEvent::Separator);
    }

    #[test]
    fn test_unmapped_tables_filter() {
        let all: Vec<String> = ["SiteTree", "SiteTree_Live", "LoginAttempt", "legacy_log"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let owned = registry().owned_tables();

        assert_eq!(
            unmapped_tables(&all, &owned, &SkipList::default()),
            vec!["legacy_log"]
        );
    }
}
