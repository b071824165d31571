use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::{tempdir, TempDir};
use waver_core::contract::{MockObjectStore, ObjectStore, StoreError};
use waver_core::pipeline::TaskPipeline;
use waver_core::store::FsObjectStore;
use waver_core::tutorial::GenerationContext;
use waver_core::upload::{object_key, UploadError, UploadResult, UploadTask};
use walkdir::WalkDir;

const BUCKET: &str = "waver-bucket";

/// A scratch dir holding `<tmp>/myproject/` with the given relative files.
fn project_tree(files: &[&str]) -> (TempDir, PathBuf) {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("myproject");
    fs::create_dir_all(&root).unwrap();
    for file in files {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("content of {file}")).unwrap();
    }
    (tmp, root)
}

fn accepting_store() -> MockObjectStore {
    let mut store = MockObjectStore::new();
    store.expect_upload_object().returning(|_, _, _| Ok(()));
    store
}

#[tokio::test]
async fn empty_directory_yields_empty_result() {
    let (_tmp, root) = project_tree(&[]);
    let mut store = MockObjectStore::new();
    store.expect_upload_object().times(0);
    let task = UploadTask::new(Arc::new(store), &root, BUCKET).unwrap();

    let result = task.upload_directory(&root, BUCKET).await.unwrap();
    assert_eq!(result, UploadResult::default());
}

#[tokio::test]
async fn every_regular_file_is_uploaded_once() {
    let files = ["a.md", "b.md", "sub/c.md", "sub/deeper/d.html", "sub/a.md"];
    let (_tmp, root) = project_tree(&files);
    let task = UploadTask::new(Arc::new(accepting_store()), &root, BUCKET).unwrap();

    let result = task.upload_directory(&root, BUCKET).await.unwrap();
    assert_eq!(result.success_count(), files.len());
    assert_eq!(result.failure_count(), 0);

    let keys: BTreeSet<&str> = result.successful_uploads.iter().map(String::as_str).collect();
    let expected: BTreeSet<String> = files.iter().map(|f| format!("myproject/{f}")).collect();
    assert_eq!(keys, expected.iter().map(String::as_str).collect::<BTreeSet<_>>());
}

#[tokio::test]
async fn nested_file_gets_forward_slash_key() {
    let (_tmp, root) = project_tree(&["sub/nested.txt"]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut store = MockObjectStore::new();
    let recorder = Arc::clone(&seen);
    store
        .expect_upload_object()
        .times(1)
        .returning(move |bucket, key, _| {
            recorder.lock().unwrap().push((bucket.to_string(), key.to_string()));
            Ok(())
        });
    let task = UploadTask::new(Arc::new(store), &root, BUCKET).unwrap();

    let result = task.upload_directory(&root, BUCKET).await.unwrap();
    assert_eq!(result.successful_uploads, vec!["myproject/sub/nested.txt".to_string()]);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(BUCKET.to_string(), "myproject/sub/nested.txt".to_string())]
    );
}

#[tokio::test]
async fn induced_failures_are_recorded_by_local_path() {
    let files = ["ok1.md", "FAIL_one.md", "sub/ok2.md", "sub/FAIL_two.md"];
    let (_tmp, root) = project_tree(&files);
    let mut store = MockObjectStore::new();
    store.expect_upload_object().returning(|_, key, _| {
        if key.contains("FAIL") {
            Err(StoreError::Request("induced".to_string()))
        } else {
            Ok(())
        }
    });
    let task = UploadTask::new(Arc::new(store), &root, BUCKET).unwrap();

    let result = task.upload_directory(&root, BUCKET).await.unwrap();

    let succeeded: BTreeSet<String> = result.successful_uploads.iter().cloned().collect();
    let failed: BTreeSet<String> = result.failed_uploads.iter().cloned().collect();
    assert_eq!(
        succeeded,
        ["myproject/ok1.md", "myproject/sub/ok2.md"]
            .into_iter()
            .map(String::from)
            .collect::<BTreeSet<_>>()
    );
    assert_eq!(
        failed,
        [root.join("FAIL_one.md"), root.join("sub").join("FAIL_two.md")]
            .iter()
            .map(|p| p.display().to_string())
            .collect::<BTreeSet<_>>()
    );
}

#[tokio::test]
async fn missing_root_fails_before_any_upload() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("missing");
    let mut store = MockObjectStore::new();
    store.expect_upload_object().times(0);
    let task = UploadTask::new(Arc::new(store), &missing, BUCKET).unwrap();

    let err = task.upload_directory(&missing, BUCKET).await.unwrap_err();
    assert!(matches!(err, UploadError::InvalidArgument(ref p) if p == &missing));
    assert!(matches!(task.spawn(), Err(UploadError::InvalidArgument(_))));
}

#[tokio::test]
async fn file_as_root_fails_before_any_upload() {
    let (_tmp, root) = project_tree(&["only.md"]);
    let file = root.join("only.md");
    let mut store = MockObjectStore::new();
    store.expect_upload_object().times(0);
    let task = UploadTask::new(Arc::new(store), &root, BUCKET).unwrap();

    let err = task.upload_directory(&file, BUCKET).await.unwrap_err();
    assert!(err.to_string().starts_with("Source path must be an existing directory"));
}

#[tokio::test]
async fn empty_bucket_name_is_a_configuration_error() {
    let (_tmp, root) = project_tree(&["a.md"]);
    let err = UploadTask::new(Arc::new(MockObjectStore::new()), &root, "  ")
        .err()
        .expect("empty bucket must be rejected");
    assert!(matches!(err, UploadError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn project_name_comes_from_the_directory() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("tool.git");
    fs::create_dir_all(&root).unwrap();
    let task = UploadTask::new(Arc::new(MockObjectStore::new()), &root, BUCKET).unwrap();
    assert_eq!(task.project_name(), "tool");
    assert_eq!(task.bucket_name(), BUCKET);
    assert_eq!(task.source_directory(), root.as_path());
}

#[test]
fn object_keys_are_prefixed_and_slash_separated() {
    let relative: PathBuf = ["a", "b", "c.md"].iter().collect();
    assert_eq!(object_key("proj", &relative), "proj/a/b/c.md");
    assert_eq!(object_key("proj", Path::new("top.md")), "proj/top.md");
}

#[tokio::test]
async fn spawned_upload_lands_in_filesystem_store() {
    let (_tmp, root) = project_tree(&["index.md", "chapters/01_intro.md"]);
    let store_dir = tempdir().unwrap();
    let store = FsObjectStore::new(store_dir.path());
    store.make_bucket(BUCKET).await.unwrap();
    let task = UploadTask::new(Arc::new(store), &root, BUCKET).unwrap();

    let result = task.spawn().unwrap().await.unwrap().unwrap();
    assert_eq!(result.success_count(), 2);
    let stored = store_dir
        .path()
        .join(BUCKET)
        .join("myproject")
        .join("chapters")
        .join("01_intro.md");
    assert_eq!(fs::read_to_string(stored).unwrap(), "content of chapters/01_intro.md");
}

#[tokio::test]
async fn as_pipeline_stage_it_ignores_input_and_reports_counts() {
    let (_tmp, root) = project_tree(&["a.md", "b.md"]);
    let task = UploadTask::new(Arc::new(accepting_store()), &root, BUCKET).unwrap();
    let mut pipeline = TaskPipeline::start("Minio-upload", task);

    let result = pipeline
        .run(GenerationContext::new("ignored"))
        .await
        .unwrap();
    assert_eq!(result.success_count(), 2);
    assert_eq!(pipeline.context().get("upload.successful"), Some(json!(2)));
    assert_eq!(pipeline.context().get("upload.failed"), Some(json!(0)));
    pipeline.shutdown().await;
}

#[tokio::test]
async fn explicit_project_name_is_used_verbatim() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("project.git");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("a.md"), "a").unwrap();
    let task =
        UploadTask::for_project(Arc::new(accepting_store()), &root, BUCKET, "project.git").unwrap();

    let result = task.upload_directory(&root, BUCKET).await.unwrap();
    assert_eq!(result.successful_uploads, vec!["project.git/a.md".to_string()]);

    let err = UploadTask::for_project(Arc::new(MockObjectStore::new()), &root, BUCKET, " ")
        .err()
        .expect("blank project name must be rejected");
    assert!(matches!(err, UploadError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn keys_follow_walk_order() {
    let (_tmp, root) = project_tree(&["b.md", "a.md", "sub/z.md", "sub/c.md", "top.md"]);
    let task = UploadTask::new(Arc::new(accepting_store()), &root, BUCKET).unwrap();

    let result = task.upload_directory(&root, BUCKET).await.unwrap();

    let walk_order: Vec<String> = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| object_key("myproject", e.path().strip_prefix(&root).unwrap()))
        .collect();
    assert_eq!(result.successful_uploads, walk_order);
}

#[cfg(unix)]
#[tokio::test]
async fn symlinks_are_neither_uploaded_nor_failed() {
    let (_tmp, root) = project_tree(&["a.md", "sub/b.md"]);
    std::os::unix::fs::symlink(root.join("a.md"), root.join("link.md")).unwrap();
    std::os::unix::fs::symlink(root.join("sub"), root.join("sub-link")).unwrap();
    let task = UploadTask::new(Arc::new(accepting_store()), &root, BUCKET).unwrap();

    let result = task.upload_directory(&root, BUCKET).await.unwrap();

    let mut keys = result.successful_uploads.clone();
    keys.sort();
    assert_eq!(keys, vec!["myproject/a.md", "myproject/sub/b.md"]);
    assert!(result.failed_uploads.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_subdirectory_fails_the_whole_batch() {
    use std::os::unix::fs::PermissionsExt;

    let (_tmp, root) = project_tree(&["a.md", "locked/secret.md"]);
    let locked = root.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Permission bits do not apply to this user (e.g. root).
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }
    let task = UploadTask::new(Arc::new(accepting_store()), &root, BUCKET).unwrap();

    let outcome = task.upload_directory(&root, BUCKET).await;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let err = outcome.unwrap_err();
    assert!(matches!(err, UploadError::DirectoryRead { ref path, .. } if path == &root));
}
