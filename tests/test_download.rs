use mangarock_api::requests::chapter::Chapter;
use mangarock_api::{DownloadOptions, Error, FailurePolicy, FetchCause, MangaRockClient};

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use std::path::Path;
use std::time::Duration;

fn page_body(i: usize) -> Vec<u8> {
    format!("page body {i}").into_bytes()
}

/// Mounts `count` pages named `p{i}.mri` and returns the chapter listing them
async fn chapter_with_pages(server: &MockServer, count: usize) -> Chapter {
    let mut pages = Vec::new();

    for i in 0..count {
        let page_path = format!("/file/mrfiles/p{i}.mri");

        Mock::given(method("GET"))
            .and(path(page_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(page_body(i)))
            .mount(server)
            .await;

        pages.push(format!("{}{page_path}", server.uri()));
    }

    Chapter {
        id: "mrs-chapter-1".to_owned(),
        name: "Chapter 1".to_owned(),
        order: 0,
        pages,
    }
}

fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    names
}

#[tokio::test]
async fn test_download_keeps_reading_order() {
    let server = MockServer::start().await;
    let chapter = chapter_with_pages(&server, 12).await;

    let tmpdir = tempfile::tempdir().unwrap();
    let dest = tmpdir.path().join("chapter");

    let client = MangaRockClient::new().unwrap();
    let report = client
        .download_chapter(&chapter, &dest, &DownloadOptions::default())
        .await
        .unwrap();

    assert_eq!(report.len(), 12);
    assert!(report.is_complete());

    let expected: Vec<String> = (0..12).map(|i| format!("{i:02}-p{i}.mri")).collect();
    assert_eq!(dir_listing(&dest), expected);

    for (i, name) in expected.iter().enumerate() {
        assert_eq!(std::fs::read(dest.join(name)).unwrap(), page_body(i));
    }
}

#[tokio::test]
async fn test_download_is_idempotent() {
    let server = MockServer::start().await;
    let chapter = chapter_with_pages(&server, 3).await;

    let tmpdir = tempfile::tempdir().unwrap();
    let client = MangaRockClient::new().unwrap();

    client
        .download_chapter(&chapter, tmpdir.path(), &DownloadOptions::default())
        .await
        .unwrap();
    let first = dir_listing(tmpdir.path());

    client
        .download_chapter(&chapter, tmpdir.path(), &DownloadOptions::default())
        .await
        .unwrap();

    assert_eq!(dir_listing(tmpdir.path()), first);
    assert_eq!(first, vec!["00-p0.mri", "01-p1.mri", "02-p2.mri"]);
}

#[tokio::test]
async fn test_first_failure_aborts_chapter() {
    let server = MockServer::start().await;
    let mut chapter = chapter_with_pages(&server, 4).await;

    Mock::given(method("GET"))
        .and(path("/file/mrfiles/broken.mri"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    chapter.pages[2] = format!("{}/file/mrfiles/broken.mri", server.uri());

    let tmpdir = tempfile::tempdir().unwrap();
    let client = MangaRockClient::new().unwrap();

    let err = client
        .download_chapter(&chapter, tmpdir.path(), &DownloadOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::FetchError {
            locator,
            cause: FetchCause::Status(status),
        } => {
            assert_eq!(locator, chapter.pages[2]);
            assert_eq!(status.as_u16(), 500);
        }
        e => panic!("unexpected error {e:?}"),
    }

    assert_eq!(dir_listing(tmpdir.path()), vec!["00-p0.mri", "01-p1.mri"]);
}

#[tokio::test]
async fn test_concurrent_fetches_are_written_in_order() {
    let server = MockServer::start().await;
    let mut chapter = chapter_with_pages(&server, 5).await;

    // the first page answers last
    Mock::given(method("GET"))
        .and(path("/file/mrfiles/slow.mri"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(page_body(0))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    chapter.pages[0] = format!("{}/file/mrfiles/slow.mri", server.uri());

    // the fourth page is missing
    chapter.pages[3] = format!("{}/file/mrfiles/missing.mri", server.uri());

    let tmpdir = tempfile::tempdir().unwrap();
    let client = MangaRockClient::new().unwrap();

    let options = DownloadOptions::builder().concurrency(4).build();
    let err = client
        .download_chapter(&chapter, tmpdir.path(), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FetchError { ref locator, .. } if locator == &chapter.pages[3]));
    assert_eq!(
        dir_listing(tmpdir.path()),
        vec!["00-slow.mri", "01-p1.mri", "02-p2.mri"]
    );
}

#[tokio::test]
async fn test_collect_all_reports_every_page() {
    let server = MockServer::start().await;
    let mut chapter = chapter_with_pages(&server, 4).await;
    chapter.pages[1] = format!("{}/file/mrfiles/missing.mri", server.uri());

    let tmpdir = tempfile::tempdir().unwrap();
    let client = MangaRockClient::new().unwrap();

    let options = DownloadOptions::builder()
        .policy(FailurePolicy::CollectAll)
        .build();
    let report = client
        .download_chapter(&chapter, tmpdir.path(), &options)
        .await
        .unwrap();

    assert_eq!(report.len(), 4);
    assert_eq!(report.errors().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
    assert_eq!(
        dir_listing(tmpdir.path()),
        vec!["00-p0.mri", "02-p2.mri", "03-p3.mri"]
    );
}

#[tokio::test]
async fn test_cancel_stops_download() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(page_body(0))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let chapter = Chapter {
        id: "mrs-chapter-2".to_owned(),
        name: "Chapter 2".to_owned(),
        order: 1,
        pages: vec![
            format!("{}/file/a.mri", server.uri()),
            format!("{}/file/b.mri", server.uri()),
        ],
    };

    let tmpdir = tempfile::tempdir().unwrap();
    let client = MangaRockClient::new().unwrap();

    let cancel = CancellationToken::new();
    let options = DownloadOptions::builder().cancel(cancel.clone()).build();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let err = client
        .download_chapter(&chapter, tmpdir.path(), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(dir_listing(tmpdir.path()).is_empty());
}

#[tokio::test]
async fn test_empty_chapter_writes_nothing() {
    let tmpdir = tempfile::tempdir().unwrap();
    let dest = tmpdir.path().join("empty");

    let client = MangaRockClient::new().unwrap();
    let report = client
        .download_chapter(&Chapter::default(), &dest, &DownloadOptions::default())
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_fetch_page_to_sink() {
    let server = MockServer::start().await;
    let chapter = chapter_with_pages(&server, 1).await;

    let client = MangaRockClient::new().unwrap();

    let mut sink = Vec::new();
    let written = client
        .fetch_page_to(&chapter.pages[0], &mut sink)
        .await
        .unwrap();

    assert_eq!(written as usize, page_body(0).len());
    assert_eq!(sink, page_body(0));

    let bytes = client.fetch_page(&chapter.pages[0]).await.unwrap();
    assert_eq!(bytes.as_ref(), page_body(0).as_slice());
}

/// Serves every connection a response announcing 100 bytes of body and sending only 10
async fn truncating_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0; 4096];
                let _ = socket.read(&mut request).await;

                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n0123456789")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}/file/mrfiles/short.mri")
}

#[tokio::test]
async fn test_truncated_body_is_transport_error() {
    let locator = truncating_server().await;
    let client = MangaRockClient::new().unwrap();

    let err = client.fetch_page(&locator).await.unwrap_err();

    match err {
        Error::FetchError {
            locator: failed,
            cause: FetchCause::Transport(_),
        } => assert_eq!(failed, locator),
        e => panic!("unexpected error {e:?}"),
    }

    let chapter = Chapter {
        id: "mrs-chapter-3".to_owned(),
        name: "Chapter 3".to_owned(),
        order: 2,
        pages: vec![locator],
    };

    let tmpdir = tempfile::tempdir().unwrap();
    let err = client
        .download_chapter(&chapter, tmpdir.path(), &DownloadOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::FetchError {
            cause: FetchCause::Transport(_),
            ..
        }
    ));
    assert!(dir_listing(tmpdir.path()).is_empty());
}

#[tokio::test]
async fn test_write_failure_names_the_page() {
    let server = MockServer::start().await;
    let chapter = chapter_with_pages(&server, 3).await;

    let tmpdir = tempfile::tempdir().unwrap();
    let dest = tmpdir.path().join("chapter");

    // a directory in the way of the second page
    std::fs::create_dir_all(dest.join("01-p1.mri")).unwrap();

    let client = MangaRockClient::new().unwrap();
    let err = client
        .download_chapter(&chapter, &dest, &DownloadOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::WriteError { path, .. } => assert_eq!(path, dest.join("01-p1.mri")),
        e => panic!("unexpected error {e:?}"),
    }

    assert_eq!(std::fs::read(dest.join("00-p0.mri")).unwrap(), page_body(0));
    assert_eq!(dir_listing(&dest), vec!["00-p0.mri", "01-p1.mri"]);
}

#[tokio::test]
async fn test_fetch_page_to_file() {
    let server = MockServer::start().await;
    let chapter = chapter_with_pages(&server, 1).await;

    let tmpdir = tempfile::tempdir().unwrap();
    let output = tmpdir.path().join("page.mri");

    let client = MangaRockClient::new().unwrap();
    let written = client
        .fetch_page_to_file(&chapter.pages[0], &output, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(written as usize, page_body(0).len());
    assert_eq!(std::fs::read(&output).unwrap(), page_body(0));
    assert_eq!(dir_listing(tmpdir.path()), vec!["page.mri"]);
}

#[tokio::test]
async fn test_failed_fetch_leaves_no_file() {
    let server = MockServer::start().await;

    let tmpdir = tempfile::tempdir().unwrap();
    let output = tmpdir.path().join("page.mri");

    let client = MangaRockClient::new().unwrap();

    let missing = format!("{}/file/mrfiles/missing.mri", server.uri());
    let err = client
        .fetch_page_to_file(&missing, &output, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::FetchError {
            cause: FetchCause::Status(status),
            ..
        } if status.as_u16() == 404
    ));
    assert!(dir_listing(tmpdir.path()).is_empty());

    let err = client
        .fetch_page_to_file(&truncating_server().await, &output, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::FetchError {
            cause: FetchCause::Transport(_),
            ..
        }
    ));
    assert!(dir_listing(tmpdir.path()).is_empty());
}

#[tokio::test]
async fn test_cancelled_fetch_leaves_no_file() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(page_body(0))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let tmpdir = tempfile::tempdir().unwrap();
    let output = tmpdir.path().join("page.mri");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    });

    let client = MangaRockClient::new().unwrap();
    let err = client
        .fetch_page_to_file(&format!("{}/file/a.mri", server.uri()), &output, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(dir_listing(tmpdir.path()).is_empty());
}
