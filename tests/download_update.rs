use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use predicates::prelude::*;
use storypack::epub::PackagedDocument;

const BOOK: &str = "Some Author - Test Story.epub";

struct StoryServer {
    base_url: String,
    chapters: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl StoryServer {
    fn story_url(&self) -> String {
        format!("{}/s/42/1/Test-Story", self.base_url)
    }

    fn take_requests(&self) -> Vec<String> {
        std::mem::take(&mut *self.requests.lock().expect("requests lock"))
    }

    fn stop(self) {
        let _ = self.shutdown.send(());
        self.handle.join().expect("join server thread");
    }
}

fn story_page(chapters: usize, current: usize) -> String {
    let options: String = (1..=chapters)
        .map(|n| format!("<option value=\"{n}\">{n}. Part {n}</option>"))
        .collect();
    format!(
        r#"<!doctype html>
<html><head><title>Test Story</title></head><body>
<div id="pre_story_links"><a class="xcontrast_txt" href="/book/">Books</a></div>
<div id="profile_top">
<b class="xcontrast_txt">Test Story</b>
<span class="xcontrast_txt">By:</span> <a class="xcontrast_txt" href="/u/7/Some-Author">Some Author</a>
<div class="xcontrast_txt">Told in parts.</div>
<span class="xgray xcontrast_txt">Rated: <a href="/ratings">Fiction  K</a> - English - Adventure - Chapters: {chapters} - Words: 1,000 - Published: <span data-xutime="1550000000">Feb 12, 2019</span> - id: 42</span>
</div>
<select id="chap_select">{options}</select>
<div id="storytext"><p>This is part {current}.</p><p>It goes on...</p></div>
<select id="chap_select">{options}</select>
</body></html>
"#
    )
}

fn spawn_story_server(initial_chapters: usize) -> StoryServer {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let addr = server.server_addr();
    let base_url = format!("http://{addr}");

    let chapters = Arc::new(AtomicUsize::new(initial_chapters));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = {
        let chapters = Arc::clone(&chapters);
        let requests = Arc::clone(&requests);
        thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                requests.lock().expect("requests lock").push(path.clone());

                let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
                let count = chapters.load(Ordering::SeqCst);
                let response = match segments.as_slice() {
                    ["s", "42", n, "Test-Story"] => match n.parse::<usize>() {
                        Ok(n) if (1..=count).contains(&n) => {
                            tiny_http::Response::from_string(story_page(count, n))
                                .with_header(
                                    tiny_http::Header::from_bytes(
                                        &b"Content-Type"[..],
                                        &b"text/html; charset=utf-8"[..],
                                    )
                                    .expect("content-type header"),
                                )
                        }
                        _ => tiny_http::Response::from_string("no such chapter")
                            .with_status_code(404),
                    },
                    _ => tiny_http::Response::from_string("not found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        })
    };

    StoryServer {
        base_url,
        chapters,
        requests,
        shutdown: shutdown_tx,
        handle,
    }
}

fn storypack(work: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("storypack");
    cmd.current_dir(work)
        .env("NO_PROXY", "127.0.0.1")
        .env_remove("RUST_LOG")
        .args(["--data-dir"])
        .arg(work.join("data"))
        .args(["--log-file"])
        .arg(work.join("storypack.log"));
    cmd
}

#[test]
fn download_then_update_fetches_only_new_chapters() {
    let temp = tempfile::tempdir().expect("tempdir");
    let work = temp.path();
    let server = spawn_story_server(10);

    storypack(work)
        .args(["download", "-v", "--site", "fanfiction.net"])
        .arg(server.story_url())
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloading chapter"))
        .stdout(predicate::str::contains("Writing into"));

    let book = work.join(BOOK);
    let first = PackagedDocument::open(&book).expect("read downloaded book");
    assert_eq!(first.chapters.len(), 10);
    assert_eq!(
        first.source_url.as_ref().map(|u| u.to_string()),
        Some(server.story_url())
    );
    assert!(first.chapters[0].starts_with("<h1>Part 1</h1>"));
    assert!(first.chapters[9].contains("This is part 10."));
    assert!(first.chapters[9].contains("It goes on\u{2026}"));
    assert_eq!(server.take_requests().len(), 11);

    server.chapters.store(12, Ordering::SeqCst);
    storypack(work)
        .args(["update", "--backup", "--site", "fanfiction.net"])
        .arg(&book)
        .assert()
        .success();

    assert_eq!(
        server.take_requests(),
        vec![
            "/s/42/1/Test-Story".to_owned(),
            "/s/42/11/Test-Story".to_owned(),
            "/s/42/12/Test-Story".to_owned(),
        ]
    );
    assert!(work.join(format!("{BOOK}.bck")).is_file());
    let updated = PackagedDocument::open(&book).expect("read updated book");
    assert_eq!(updated.chapters.len(), 12);
    assert_eq!(updated.chapters[..10], first.chapters[..]);
    assert_eq!(updated.cover, first.cover);
    assert!(updated.chapters[11].contains("This is part 12."));

    storypack(work)
        .args(["update", "--site", "fanfiction.net"])
        .arg(&book)
        .assert()
        .success();
    assert_eq!(
        server.take_requests(),
        vec!["/s/42/1/Test-Story".to_owned()]
    );
    let again = PackagedDocument::open(&book).expect("read book again");
    assert_eq!(again.chapters, updated.chapters);

    let log = fs::read_to_string(work.join("storypack.log")).expect("read log file");
    assert_eq!(log.matches("Downloading http://").count(), 3);
    assert!(!log.contains('\u{1b}'));

    server.stop();
}

#[test]
fn forced_update_fetches_every_chapter() {
    let temp = tempfile::tempdir().expect("tempdir");
    let work = temp.path();
    let server = spawn_story_server(3);

    storypack(work)
        .args(["download", "--site", "fanfiction.net"])
        .arg(server.story_url())
        .assert()
        .success();
    server.take_requests();

    storypack(work)
        .args(["update", "--force", "--site", "fanfiction.net", BOOK])
        .assert()
        .success();
    assert_eq!(server.take_requests().len(), 4);

    server.stop();
}

#[test]
fn missing_main_page_exits_with_code_one() {
    let temp = tempfile::tempdir().expect("tempdir");
    let work = temp.path();
    let server = spawn_story_server(1);

    storypack(work)
        .args(["download", "--site", "fanfiction.net"])
        .arg(format!("{}/s/404/1/Gone", server.base_url))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("HTTP 404"));
    assert!(!work.join(BOOK).exists());

    server.stop();
}

#[test]
fn unsupported_site_is_skipped() {
    let temp = tempfile::tempdir().expect("tempdir");

    storypack(temp.path())
        .args(["download", "https://example.com/story/1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "storypack is currently only able to download from adult-fanfiction.org",
        ));
}

#[test]
fn url_list_comments_are_ignored() {
    let temp = tempfile::tempdir().expect("tempdir");
    let list = temp.path().join("urls.txt");
    fs::write(&list, "# nothing here yet\n\n").expect("write url list");

    storypack(temp.path())
        .args(["download", "--from"])
        .arg(&list)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn html_requires_a_url() {
    let temp = tempfile::tempdir().expect("tempdir");

    storypack(temp.path())
        .args(["html", "-a", "Anon", "-t", "Leaves"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "You must provide at least one URL to download.",
        ));
}

#[test]
fn update_reports_missing_files() {
    let temp = tempfile::tempdir().expect("tempdir");

    storypack(temp.path())
        .args(["update", "Nobody - Nothing.epub"])
        .assert()
        .success()
        .stderr(predicate::str::contains("File Nobody - Nothing.epub doesn't exist."));
}

#[test]
fn data_dir_gets_default_stylesheet() {
    let temp = tempfile::tempdir().expect("tempdir");

    storypack(temp.path())
        .args(["download"])
        .assert()
        .success();
    assert!(temp.path().join("data/styles/style.css").is_file());
}
