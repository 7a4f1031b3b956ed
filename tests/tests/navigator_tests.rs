//! Navigator integration tests.
//!
//! Every test drives a real `Navigator` through `HttpSource` (or
//! `AutoSource` over local files) against the fixture in `fixture.rs`.
//! No external network is used.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rstest::rstest;
use tokio_util::sync::CancellationToken;

use hlsv::{
    AutoSource, FetchSource, HlsvError, HttpSource, NestedFile, NestedKind, Navigator, Outcome,
    PlaylistKind, Pointer, Settings,
};

mod fixture;

use fixture::{PlaylistFixture, MEDIA_720_UPDATED};

fn settings() -> Settings {
    Settings::default()
        .request_timeout(Duration::from_secs(5))
        .retry_base_delay(Duration::from_millis(10))
        .max_retry_delay(Duration::from_millis(50))
}

async fn navigator(fixture: &PlaylistFixture) -> (String, Navigator<HttpSource>) {
    let base = fixture.start().await;
    let source = HttpSource::new(settings()).expect("http source");
    let nav = Navigator::start(source, format!("{base}master.m3u8"), &CancellationToken::new())
        .await
        .expect("master playlist must load");
    (base, nav)
}

fn relative_urls(nav: &Navigator<impl FetchSource>) -> Vec<String> {
    nav.current_frame()
        .children()
        .iter()
        .map(|c| c.relative_url().to_string())
        .collect()
}

#[tokio::test]
async fn walk_from_master_to_segment_and_back() {
    let fixture = PlaylistFixture::new();
    let (base, mut nav) = navigator(&fixture).await;
    let cancel = CancellationToken::new();

    assert_eq!(
        relative_urls(&nav),
        [
            "720p/index.m3u8",
            "1080p/index.m3u8?token=abc",
            "480p/index.m3u8",
            "audio/aac.m3u8"
        ]
    );

    assert_eq!(nav.advance(&cancel).await.unwrap(), Outcome::Moved);
    assert_eq!(relative_urls(&nav), ["key.bin", "init.mp4", "seg1.ts", "seg2.ts", "seg3.ts"]);
    let NestedFile::Media(playlist) = nav.current() else {
        panic!("expected a media playlist");
    };
    assert_eq!(playlist.playlist_kind(), Some(PlaylistKind::Vod));
    assert!(playlist.is_closed());
    assert_eq!(
        nav.current_frame().children()[0].url().unwrap(),
        format!("{base}720p/key.bin")
    );

    nav.select_next();
    nav.select_next();
    assert_eq!(nav.advance(&cancel).await.unwrap(), Outcome::Moved);
    assert_eq!(nav.depth(), 3);
    assert_eq!(nav.current().kind(), NestedKind::Media);
    assert_eq!(nav.current().child_count(), 0);
    assert!(!nav.current().render().contains('\u{1b}'));
    assert_eq!(nav.advance(&cancel).await.unwrap(), Outcome::Boundary);

    assert_eq!(nav.back(), Outcome::Moved);
    assert_eq!(nav.back(), Outcome::Moved);
    assert_eq!(nav.back(), Outcome::Boundary);
    assert_eq!(fixture.request_count_for("master.m3u8"), 1);
    assert_eq!(fixture.request_count_for("720p/index.m3u8"), 1);
}

#[tokio::test]
async fn variant_query_is_not_inherited_by_segments() {
    let fixture = PlaylistFixture::new();
    let (base, mut nav) = navigator(&fixture).await;
    let cancel = CancellationToken::new();

    nav.select_next();
    nav.advance(&cancel).await.unwrap();

    let NestedFile::Media(playlist) = nav.current() else {
        panic!("expected a media playlist");
    };
    assert!(!playlist.is_closed());
    let first = playlist.first_segment().unwrap();
    assert_eq!(first.sequence(), 41);
    assert_eq!(
        nav.current_frame().children()[0].url().unwrap(),
        format!("{base}1080p/seg41.ts")
    );
    assert_eq!(fixture.request_count_for("1080p/index.m3u8"), 1);
}

#[tokio::test]
async fn missing_playlist_surfaces_http_error_without_moving() {
    let fixture = PlaylistFixture::new();
    let (_, mut nav) = navigator(&fixture).await;
    let cancel = CancellationToken::new();

    nav.select_next();
    nav.select_next();
    let err = nav.advance(&cancel).await.unwrap_err();

    assert!(matches!(err, HlsvError::Http { status: 404, .. }));
    assert_eq!(nav.depth(), 1);
    assert_eq!(nav.current_frame().selected(), 2);
    // Client errors are not retried.
    assert_eq!(fixture.request_count_for("480p/index.m3u8"), 1);
}

#[tokio::test]
async fn refresh_nested_refetches_only_the_current_playlist() {
    let fixture = PlaylistFixture::new();
    let (_, mut nav) = navigator(&fixture).await;
    let cancel = CancellationToken::new();
    nav.advance(&cancel).await.unwrap();

    fixture.put("720p/index.m3u8", MEDIA_720_UPDATED);
    assert_eq!(nav.refresh_current(&cancel).await.unwrap(), Outcome::Moved);

    assert_eq!(nav.depth(), 2);
    assert_eq!(
        relative_urls(&nav),
        ["init.mp4", "seg1.ts", "seg2.ts", "seg3.ts", "seg4.ts"]
    );
    assert_eq!(fixture.request_count_for("master.m3u8"), 1);
    assert_eq!(fixture.request_count_for("720p/index.m3u8"), 2);
}

#[tokio::test]
async fn quit_cancels_a_slow_fetch() {
    let fixture = PlaylistFixture::new().with_delay("720p/index.m3u8", Duration::from_secs(10));
    let (_, mut nav) = navigator(&fixture).await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = nav.advance(&cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(nav.depth(), 1);
}

#[tokio::test]
async fn highlighted_view_points_at_selected_variant() {
    let fixture = PlaylistFixture::new();
    let (_, mut nav) = navigator(&fixture).await;
    nav.select_next();

    let view = nav.current_view(&Pointer("> ".into()));
    let lines: Vec<&str> = view.text.split('\n').collect();
    let line = view.line.expect("selected variant must be found");
    assert_eq!(lines[line], "> 1080p/index.m3u8?token=abc");
}

#[rstest]
#[case(1024, 1024)]
#[case(64 * 1024, 64 * 1024)]
#[case(1024 * 1024, 64 * 1024)]
#[tokio::test]
async fn body_is_capped(#[case] cap: usize, #[case] expected: usize) {
    let fixture = PlaylistFixture::new();
    let base = fixture.start().await;
    let source = HttpSource::new(settings().max_body_bytes(cap)).unwrap();

    let text = source
        .fetch(&format!("{base}big.bin"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text.len(), expected);
}

#[tokio::test]
async fn local_files_browse_like_http() {
    let fixture = PlaylistFixture::new();
    let dir = std::env::temp_dir().join(format!("hlsv-tests-{}", std::process::id()));
    fixture.write_to(&dir).unwrap();

    let source = Arc::new(AutoSource::new(settings()).unwrap());
    let master = dir.join("master.m3u8");
    let cancel = CancellationToken::new();
    let mut nav = Navigator::start(source, master.to_string_lossy().into_owned(), &cancel)
        .await
        .unwrap();

    assert_eq!(nav.current().kind(), NestedKind::Master);
    nav.advance(&cancel).await.unwrap();
    assert_eq!(relative_urls(&nav).len(), 5);

    let leaf = nav.current_frame().children()[2].clone();
    let owner = nav.owner_of(&leaf).expect("segment owner is in history");
    assert_eq!(
        owner.id().0,
        dir.join("720p").join("index.m3u8").to_string_lossy()
    );

    std::fs::remove_dir_all(&dir).unwrap();
}
