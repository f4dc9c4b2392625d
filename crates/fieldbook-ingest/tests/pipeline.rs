//! End-to-end upload tests against both storage backends

use std::sync::Arc;

use fieldbook_core::{
    ErrorCode, Form, Input, InputType, Jump, Project, ProjectAccess, ProjectDefinition, ProjectId, ProjectLimits,
    ProjectRole, ProjectStatus, Uniqueness,
};
use fieldbook_ingest::{IngestConfig, IngestPipeline, UploadCode, UploadContext};
use fieldbook_storage::{EntryStore, MemoryStorage, SqliteStorage};
use serde_json::{json, Value};

fn uuid(n: u32) -> String {
    format!("00000000-0000-4000-8000-{:012}", n)
}

/// Five chained forms, each with a name, a unique code and a branch
fn chained_definition(limit: Option<u32>) -> ProjectDefinition {
    let mut definition = ProjectDefinition::new("p");
    for level in 1..=5 {
        let form_ref = format!("p_f{}", level);
        let branch_ref = format!("{}_visits", form_ref);
        let mut form = Form::new(&form_ref, format!("Level {}", level))
            .with_input(Input::new(format!("{}_name", form_ref), InputType::Text, "Name").title().required())
            .with_input(
                Input::new(format!("{}_code", form_ref), InputType::Text, "Code").unique(Uniqueness::Hierarchy),
            )
            .with_input(
                Input::new(&branch_ref, InputType::Branch, "Visits").with_branch(vec![Input::new(
                    format!("{}_when", branch_ref),
                    InputType::Date,
                    "When",
                )
                .with_datetime_format("dd/MM/YYYY")
                .unique(Uniqueness::Form)]),
            );
        if level > 1 {
            form = form.with_parent(format!("p_f{}", level - 1));
        }
        definition = definition.with_form(form);
        if let Some(limit) = limit {
            definition = definition
                .with_entries_limit(form_ref, limit)
                .with_entries_limit(branch_ref, limit);
        }
    }
    definition
}

async fn setup(store: Arc<dyn EntryStore>, definition: ProjectDefinition) -> (IngestPipeline<dyn EntryStore>, Project) {
    let project = Project::from_definition("survey", definition, &ProjectLimits::default()).unwrap();
    store.save_project(&project).await.unwrap();
    (IngestPipeline::new(store, IngestConfig::without_throttle()), project)
}

fn backends() -> Vec<Arc<dyn EntryStore>> {
    vec![
        Arc::new(MemoryStorage::new()),
        Arc::new(SqliteStorage::in_memory().unwrap()),
    ]
}

fn entry(project: &Project, uuid: &str, level: u32, parent: Option<&str>, name: &str, code: &str) -> Value {
    let form_ref = format!("p_f{}", level);
    let parent = match parent {
        Some(parent_uuid) => json!({"data": {
            "parent_form_ref": format!("p_f{}", level - 1),
            "parent_entry_uuid": parent_uuid
        }}),
        None => json!({}),
    };
    json!({
        "id": uuid,
        "type": "entry",
        "entry": {
            "entry_uuid": uuid,
            "created_at": "2024-05-01T10:00:00.000Z",
            "project_version": project.project_version(),
            "answers": {
                format!("{}_name", form_ref): {"answer": name, "was_jumped": false},
                format!("{}_code", form_ref): {"answer": code, "was_jumped": false},
                format!("{}_visits", form_ref): {"answer": "", "was_jumped": false}
            }
        },
        "attributes": {"form": {"ref": form_ref, "type": "hierarchy"}},
        "relationships": {"parent": parent, "branch": {}}
    })
}

fn branch(project: &Project, uuid: &str, level: u32, owner: &str, when: &str) -> Value {
    let branch_ref = format!("p_f{}_visits", level);
    json!({
        "id": uuid,
        "type": "branch_entry",
        "branch_entry": {
            "entry_uuid": uuid,
            "created_at": "2024-05-01T10:00:00.000Z",
            "project_version": project.project_version(),
            "answers": {
                format!("{}_when", branch_ref): {"answer": when, "was_jumped": false}
            }
        },
        "attributes": {"form": {"ref": format!("p_f{}", level), "type": "hierarchy"}},
        "relationships": {"branch": {"data": {"owner_input_ref": branch_ref, "owner_entry_uuid": owner}}}
    })
}

fn code_of<T: std::fmt::Debug>(result: Result<T, fieldbook_ingest::Rejection>) -> ErrorCode {
    result.unwrap_err().code()
}

#[tokio::test]
async fn test_five_level_quota_scenario() {
    for store in backends() {
        let (pipeline, project) = setup(store.clone(), chained_definition(Some(1))).await;
        let ctx = UploadContext::anonymous();

        let mut parent: Option<String> = None;
        for level in 1..=5 {
            let id = uuid(level);
            let outcome = pipeline
                .ingest(&project.id, entry(&project, &id, level, parent.as_deref(), "Ann", "A1"), &ctx)
                .await
                .unwrap();
            assert_eq!(outcome.code, UploadCode::EntryCreated);

            let visit = uuid(100 + level);
            pipeline
                .ingest(&project.id, branch(&project, &visit, level, &id, "2024-03-01T08:00:00.000Z"), &ctx)
                .await
                .unwrap();
            parent = Some(id);
        }

        let second_top = entry(&project, &uuid(6), 1, None, "Bob", "B1");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, second_top, &ctx).await),
            ErrorCode::EntriesLimitReached
        );

        let second_visit = branch(&project, &uuid(200), 3, &uuid(3), "2024-04-01T08:00:00.000Z");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, second_visit, &ctx).await),
            ErrorCode::EntriesLimitReached
        );

        let top = store.get_entry(&project.id, &uuid(1)).await.unwrap().unwrap();
        assert_eq!(top.child_count("p_f2"), 1);
        assert_eq!(top.branch_count("p_f1_visits"), 1);
    }
}

#[tokio::test]
async fn test_reupload_edits_in_place() {
    for store in backends() {
        let (pipeline, project) = setup(store.clone(), chained_definition(Some(1))).await;
        let ctx = UploadContext::anonymous();
        let id = uuid(1);

        let first = pipeline
            .ingest(&project.id, entry(&project, &id, 1, None, "Ann", "A1"), &ctx)
            .await
            .unwrap();
        assert_eq!(first.code, UploadCode::EntryCreated);
        assert_eq!(first.title, "Ann");
        let created_at = store.get_entry(&project.id, &id).await.unwrap().unwrap().created_at;

        let mut edited = entry(&project, &id, 1, None, "Annie", "A1");
        edited["entry"]["created_at"] = json!("2024-06-01T10:00:00.000Z");

        // the quota of one is already used, edits still go through
        let second = pipeline.ingest(&project.id, edited, &ctx).await.unwrap();
        assert_eq!(second.code, UploadCode::EntryUpdated);
        assert_eq!(second.title, "Annie");

        let rows = store.list_entries(&project.id, Some("p_f1")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].created_at, created_at);
        assert_eq!(rows[0].answers["p_f1_name"].answer, json!("Annie"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_uuid_creates_once() {
    for store in backends() {
        let (pipeline, project) = setup(store.clone(), chained_definition(Some(1))).await;
        let id = uuid(1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pipeline = pipeline.clone();
            let project_id = project.id.clone();
            let payload = entry(&project, &id, 1, None, "Ann", "A1");
            handles.push(tokio::spawn(async move {
                pipeline
                    .ingest(&project_id, payload, &UploadContext::anonymous())
                    .await
                    .map(|outcome| outcome.code)
            }));
        }

        let mut codes = Vec::new();
        for handle in handles {
            codes.push(handle.await.unwrap().unwrap());
        }
        let created = codes.iter().filter(|c| **c == UploadCode::EntryCreated).count();
        let updated = codes.iter().filter(|c| **c == UploadCode::EntryUpdated).count();
        assert_eq!((created, updated), (1, 7));

        let rows = store.list_entries(&project.id, Some("p_f1")).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}

#[tokio::test]
async fn test_child_quota_per_parent() {
    let store: Arc<dyn EntryStore> = Arc::new(MemoryStorage::new());
    let definition = chained_definition(None).with_entries_limit("p_f2", 2);
    let (pipeline, project) = setup(store, definition).await;
    let ctx = UploadContext::anonymous();

    for (n, code) in [(1, "A"), (2, "B")] {
        let top = entry(&project, &uuid(n), 1, None, "Top", code);
        pipeline.ingest(&project.id, top, &ctx).await.unwrap();
    }

    for (n, code) in [(10, "c1"), (11, "c2")] {
        let child = entry(&project, &uuid(n), 2, Some(&uuid(1)), "Child", code);
        pipeline.ingest(&project.id, child, &ctx).await.unwrap();
    }

    let third = entry(&project, &uuid(12), 2, Some(&uuid(1)), "Child", "c3");
    assert_eq!(
        code_of(pipeline.ingest(&project.id, third, &ctx).await),
        ErrorCode::EntriesLimitReached
    );

    // the quota is per parent entry
    let elsewhere = entry(&project, &uuid(13), 2, Some(&uuid(2)), "Child", "c3");
    pipeline.ingest(&project.id, elsewhere, &ctx).await.unwrap();

    let edit = entry(&project, &uuid(11), 2, Some(&uuid(1)), "Renamed", "c2");
    let outcome = pipeline.ingest(&project.id, edit, &ctx).await.unwrap();
    assert_eq!(outcome.code, UploadCode::EntryUpdated);
}

#[tokio::test]
async fn test_uniqueness_scopes() {
    for store in backends() {
        let (pipeline, project) = setup(store, chained_definition(None)).await;
        let ctx = UploadContext::anonymous();

        for n in 1..=2 {
            let top = entry(&project, &uuid(n), 1, None, "Top", &format!("T{}", n));
            pipeline.ingest(&project.id, top, &ctx).await.unwrap();
        }

        let top_clash = entry(&project, &uuid(3), 1, None, "Top", " T1 ");
        let err = pipeline.ingest(&project.id, top_clash, &ctx).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AnswerNotUnique);
        assert_eq!(err.source_ref(), "p_f1_code");

        // hierarchy uniqueness only looks at siblings under the same parent
        let under_first = entry(&project, &uuid(10), 2, Some(&uuid(1)), "Child", "X");
        pipeline.ingest(&project.id, under_first, &ctx).await.unwrap();
        let under_second = entry(&project, &uuid(11), 2, Some(&uuid(2)), "Child", "X");
        pipeline.ingest(&project.id, under_second, &ctx).await.unwrap();
        let sibling = entry(&project, &uuid(12), 2, Some(&uuid(1)), "Child", "X");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, sibling, &ctx).await),
            ErrorCode::AnswerNotUnique
        );

        // an entry never clashes with itself
        let again = entry(&project, &uuid(10), 2, Some(&uuid(1)), "Child again", "X");
        pipeline.ingest(&project.id, again, &ctx).await.unwrap();
    }
}

#[tokio::test]
async fn test_branch_dates_clash_on_display_format() {
    let store: Arc<dyn EntryStore> = Arc::new(MemoryStorage::new());
    let (pipeline, project) = setup(store, chained_definition(None)).await;
    let ctx = UploadContext::anonymous();

    for n in 1..=2 {
        let top = entry(&project, &uuid(n), 1, None, "Top", &format!("T{}", n));
        pipeline.ingest(&project.id, top, &ctx).await.unwrap();
    }

    let morning = branch(&project, &uuid(100), 1, &uuid(1), "2024-03-01T08:00:00.000Z");
    pipeline.ingest(&project.id, morning, &ctx).await.unwrap();

    // same day under a different owner still clashes: branch scope spans owners
    let evening = branch(&project, &uuid(101), 1, &uuid(2), "2024-03-01T19:45:00.000Z");
    assert_eq!(
        code_of(pipeline.ingest(&project.id, evening, &ctx).await),
        ErrorCode::AnswerNotUnique
    );

    let next_day = branch(&project, &uuid(102), 1, &uuid(2), "2024-03-02T08:00:00.000Z");
    pipeline.ingest(&project.id, next_day, &ctx).await.unwrap();
}

#[tokio::test]
async fn test_relationships_are_enforced() {
    for store in backends() {
        let (pipeline, project) = setup(store.clone(), chained_definition(None)).await;
        let ctx = UploadContext::anonymous();

        let orphan_visit = branch(&project, &uuid(100), 1, &uuid(1), "2024-03-01T08:00:00Z");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, orphan_visit, &ctx).await),
            ErrorCode::OwnerEntryNotFound
        );
        assert!(store.get_branch_entry(&project.id, &uuid(100)).await.unwrap().is_none());

        let orphan_child = entry(&project, &uuid(10), 2, Some(&uuid(1)), "Child", "X");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, orphan_child, &ctx).await),
            ErrorCode::ParentEntryNotFound
        );

        let no_parent = entry(&project, &uuid(10), 2, None, "Child", "X");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, no_parent, &ctx).await),
            ErrorCode::ParentFormMismatch
        );

        pipeline
            .ingest(&project.id, entry(&project, &uuid(1), 1, None, "Top", "T1"), &ctx)
            .await
            .unwrap();
        pipeline
            .ingest(&project.id, entry(&project, &uuid(2), 1, None, "Top", "T2"), &ctx)
            .await
            .unwrap();
        pipeline
            .ingest(&project.id, branch(&project, &uuid(100), 1, &uuid(1), "2024-03-01T08:00:00Z"), &ctx)
            .await
            .unwrap();

        // moving a branch entry to another owner is refused
        let moved = branch(&project, &uuid(100), 1, &uuid(2), "2024-03-01T08:00:00Z");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, moved, &ctx).await),
            ErrorCode::OwnerUuidMismatch
        );

        // a branch entry UUID cannot be reused for an entry
        let reused = entry(&project, &uuid(100), 1, None, "Top", "T3");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, reused, &ctx).await),
            ErrorCode::EntryTypeMismatch
        );

        let mut wrong_branch = branch(&project, &uuid(101), 1, &uuid(1), "2024-03-01T08:00:00Z");
        wrong_branch["relationships"]["branch"]["data"]["owner_input_ref"] = json!("p_f1_name");
        assert_eq!(
            code_of(pipeline.ingest(&project.id, wrong_branch, &ctx).await),
            ErrorCode::BranchInputNotFound
        );
    }
}

#[tokio::test]
async fn test_project_gates() {
    let store: Arc<dyn EntryStore> = Arc::new(MemoryStorage::new());
    let (pipeline, project) = setup(store.clone(), chained_definition(None)).await;

    let mut stale = entry(&project, &uuid(1), 1, None, "Top", "T1");
    stale["entry"]["project_version"] = json!("2000-01-01 00:00:00");
    assert_eq!(
        code_of(pipeline.ingest(&project.id, stale, &UploadContext::anonymous()).await),
        ErrorCode::ProjectVersionMismatch
    );

    let unknown = entry(&project, &uuid(1), 1, None, "Top", "T1");
    assert_eq!(
        code_of(pipeline.ingest(&ProjectId::new(), unknown, &UploadContext::anonymous()).await),
        ErrorCode::ProjectNotFound
    );

    let mut private = project.clone().with_access(ProjectAccess::Private).with_member(7, ProjectRole::Collector);
    store.save_project(&private).await.unwrap();

    let payload = entry(&private, &uuid(1), 1, None, "Top", "T1");
    assert_eq!(
        code_of(pipeline.ingest(&private.id, payload.clone(), &UploadContext::user(8)).await),
        ErrorCode::UploadForbidden
    );
    pipeline.ingest(&private.id, payload, &UploadContext::user(7)).await.unwrap();

    let imported = entry(&private, &uuid(2), 1, None, "Top", "T2");
    pipeline
        .ingest(&private.id, imported, &UploadContext::private_import())
        .await
        .unwrap();
    let row = store.get_entry(&private.id, &uuid(2)).await.unwrap().unwrap();
    assert_eq!(row.user_id, 0);

    private.status = ProjectStatus::Locked;
    store.save_project(&private).await.unwrap();
    let late = entry(&private, &uuid(3), 1, None, "Top", "T3");
    assert_eq!(
        code_of(pipeline.ingest(&private.id, late, &UploadContext::user(7)).await),
        ErrorCode::ProjectInactive
    );
}

#[tokio::test]
async fn test_jumped_branch_is_pruned_on_edit() {
    for store in backends() {
        let (pipeline, project) = setup(store.clone(), chained_definition(None)).await;
        let ctx = UploadContext::anonymous();

        pipeline
            .ingest(&project.id, entry(&project, &uuid(1), 1, None, "Top", "T1"), &ctx)
            .await
            .unwrap();
        for (n, day) in [(100, "2024-03-01T08:00:00Z"), (101, "2024-03-02T08:00:00Z")] {
            pipeline
                .ingest(&project.id, branch(&project, &uuid(n), 1, &uuid(1), day), &ctx)
                .await
                .unwrap();
        }
        let owner = store.get_entry(&project.id, &uuid(1)).await.unwrap().unwrap();
        assert_eq!(owner.branch_count("p_f1_visits"), 2);

        let mut jumped = entry(&project, &uuid(1), 1, None, "Top", "T1");
        jumped["entry"]["answers"]["p_f1_visits"] = json!({"answer": "", "was_jumped": true});
        pipeline.ingest(&project.id, jumped, &ctx).await.unwrap();

        let owner = store.get_entry(&project.id, &uuid(1)).await.unwrap().unwrap();
        assert_eq!(owner.branch_count("p_f1_visits"), 0);
        let left = store
            .list_branch_entries(&project.id, &uuid(1), "p_f1_visits")
            .await
            .unwrap();
        assert!(left.is_empty());
    }
}

#[tokio::test]
async fn test_jumped_answers_skip_validation() {
    let definition = ProjectDefinition::new("p").with_form(
        Form::new("p_f1", "Household")
            .with_input(
                Input::new("p_f1_has_kids", InputType::Radio, "Kids?")
                    .with_answer("aaaaaaaaaaaaa", "Yes")
                    .with_answer("bbbbbbbbbbbbb", "No")
                    .with_jump(Jump::new("IS", "p_f1_end").with_answer_ref("bbbbbbbbbbbbb")),
            )
            .with_input(Input::new("p_f1_kids", InputType::Integer, "How many?").required())
            .with_input(Input::new("p_f1_end", InputType::Text, "Notes")),
    );
    let store: Arc<dyn EntryStore> = Arc::new(MemoryStorage::new());
    let (pipeline, project) = setup(store.clone(), definition).await;

    let payload = json!({
        "id": uuid(1),
        "type": "entry",
        "entry": {
            "entry_uuid": uuid(1),
            "created_at": "2024-05-01T10:00:00Z",
            "project_version": project.project_version(),
            "answers": {
                "p_f1_has_kids": {"answer": "bbbbbbbbbbbbb"},
                "p_f1_kids": {"answer": "lots", "was_jumped": true},
                "p_f1_end": {"answer": ""}
            }
        },
        "attributes": {"form": {"ref": "p_f1", "type": "hierarchy"}},
        "relationships": {}
    });
    pipeline
        .ingest(&project.id, payload, &UploadContext::anonymous())
        .await
        .unwrap();

    let row = store.get_entry(&project.id, &uuid(1)).await.unwrap().unwrap();
    assert_eq!(row.answers["p_f1_kids"].answer, json!(""));
    assert!(row.answers["p_f1_kids"].was_jumped);
}

#[tokio::test]
async fn test_file_entries_record_the_name() {
    let definition = ProjectDefinition::new("p").with_form(
        Form::new("p_f1", "Household")
            .with_input(Input::new("p_f1_name", InputType::Text, "Name"))
            .with_input(Input::new("p_f1_photo", InputType::Photo, "Photo")),
    );
    for store in backends() {
        let (pipeline, project) = setup(store.clone(), definition.clone()).await;
        let ctx = UploadContext::anonymous();

        let file = |name: String, file_type: &str, input_ref: &str| {
            json!({
                "id": uuid(1),
                "type": "file_entry",
                "file_entry": {
                    "entry_uuid": uuid(1),
                    "created_at": "2024-05-01T10:00:00Z",
                    "project_version": project.project_version(),
                    "name": name,
                    "type": file_type,
                    "input_ref": input_ref
                },
                "attributes": {"form": {"ref": "p_f1", "type": "hierarchy"}},
                "relationships": {}
            })
        };
        let name = format!("{}_1714557600.jpg", uuid(1));

        assert_eq!(
            code_of(pipeline.ingest(&project.id, file(name.clone(), "photo", "p_f1_photo"), &ctx).await),
            ErrorCode::FileEntryNotFound
        );

        let row = json!({
            "id": uuid(1),
            "type": "entry",
            "entry": {
                "entry_uuid": uuid(1),
                "created_at": "2024-05-01T10:00:00Z",
                "project_version": project.project_version(),
                "answers": {"p_f1_name": {"answer": "Ann"}, "p_f1_photo": {"answer": ""}}
            },
            "attributes": {"form": {"ref": "p_f1", "type": "hierarchy"}},
            "relationships": {}
        });
        pipeline.ingest(&project.id, row, &ctx).await.unwrap();

        assert_eq!(
            code_of(pipeline.ingest(&project.id, file(name.clone(), "video", "p_f1_photo"), &ctx).await),
            ErrorCode::FileInputInvalid
        );
        assert_eq!(
            code_of(pipeline.ingest(&project.id, file("photo.png".into(), "photo", "p_f1_photo"), &ctx).await),
            ErrorCode::AnswerFileNameInvalid
        );

        let outcome = pipeline
            .ingest(&project.id, file(name.clone(), "photo", "p_f1_photo"), &ctx)
            .await
            .unwrap();
        assert_eq!(outcome.code, UploadCode::EntryUpdated);

        let stored = store.get_entry(&project.id, &uuid(1)).await.unwrap().unwrap();
        assert_eq!(stored.answers["p_f1_photo"].answer, json!(name));
    }
}

#[tokio::test]
async fn test_check_unique() {
    let store: Arc<dyn EntryStore> = Arc::new(MemoryStorage::new());
    let (pipeline, project) = setup(store, chained_definition(None)).await;
    let ctx = UploadContext::anonymous();

    pipeline
        .ingest(&project.id, entry(&project, &uuid(1), 1, None, "Top", "T1"), &ctx)
        .await
        .unwrap();

    let probe = |answer: &str| {
        let mut payload = entry(&project, &uuid(50), 1, None, "Top", "");
        payload["entry"]["answer"] = json!({"input_ref": "p_f1_code", "answer": answer});
        payload
    };

    assert_eq!(
        code_of(pipeline.check_unique(&project.id, probe("T1"), &ctx).await),
        ErrorCode::AnswerNotUnique
    );
    pipeline.check_unique(&project.id, probe("T2"), &ctx).await.unwrap();
    pipeline.check_unique(&project.id, probe(""), &ctx).await.unwrap();
}
