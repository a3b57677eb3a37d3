use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use wlm_transfer::{Agent, TransferClient, TransferConfig, TransferError, download, upload};

fn utf8(temp: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

fn start_agent(dir: &Utf8Path) -> TransferClient {
    let sock = dir.join("agent.sock");
    let listener = Agent::bind(&sock).unwrap();
    let config = TransferConfig { chunk_size: 128 };
    let agent = Agent::new(config);
    tokio::spawn(async move {
        let _ = agent.serve(listener).await;
    });
    TransferClient::new(sock).with_config(config)
}

fn write_tree(root: &Utf8Path) {
    fs::create_dir_all(root.join("logs")).unwrap();
    fs::write(root.join("summary.txt"), "all jobs done\n").unwrap();
    fs::write(root.join("logs/job-1.out"), "x".repeat(5000)).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();
}

fn assert_tree(root: &Utf8Path) {
    assert_eq!(
        fs::read_to_string(root.join("summary.txt")).unwrap(),
        "all jobs done\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("logs/job-1.out")).unwrap(),
        "x".repeat(5000)
    );
    assert!(root.join("empty").is_dir());
}

#[tokio::test]
async fn upload_extracts_tree_on_agent() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let (local, remote) = (utf8(&local), utf8(&remote));
    let client = start_agent(&remote);

    write_tree(&local.join("results"));
    let inbox = remote.join("inbox");

    let archive = upload(&client, &local.join("results"), &inbox).await.unwrap();

    assert_eq!(archive, inbox.join("results.zip"));
    assert!(archive.is_file());
    assert!(local.join("results.zip").is_file());
    assert_tree(&inbox.join("results"));
}

#[tokio::test]
async fn download_extracts_tree_locally() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let (local, remote) = (utf8(&local), utf8(&remote));
    let client = start_agent(&remote);

    write_tree(&remote.join("job-42"));
    let dest = local.join("fetched");

    let archive = download(&client, &remote.join("job-42"), &dest).await.unwrap();

    assert_eq!(archive, dest.join("job-42.zip"));
    assert!(remote.join("job-42.zip").is_file());
    assert_tree(&dest.join("job-42"));
}

#[tokio::test]
async fn download_of_missing_tree_fails_before_writing() {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let (local, remote) = (utf8(&local), utf8(&remote));
    let client = start_agent(&remote);

    let dest = local.join("fetched");
    let err = download(&client, &remote.join("missing"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Remote(_)), "{err:?}");
    assert!(!dest.exists());
}

#[tokio::test]
async fn upload_without_agent_fails() {
    let local = TempDir::new().unwrap();
    let local = utf8(&local);
    write_tree(&local.join("results"));

    let client = TransferClient::new(local.join("nobody.sock"));
    let err = upload(&client, &local.join("results"), Utf8Path::new("/srv/inbox"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Connect { .. }), "{err:?}");
}
