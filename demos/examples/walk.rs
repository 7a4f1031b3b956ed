use std::time::Duration;

use hlsv::{AutoSource, HlsvResult, Navigator, NestedFile, Outcome, Settings};
use tokio_util::sync::CancellationToken;
use tracing::{info, metadata::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> HlsvResult<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::default().add_directive(LevelFilter::INFO.into()))
        .with_line_number(true)
        .with_file(true)
        .init();

    // Args:
    // 1) master playlist URL or local path
    // 2) optional number of leaves listed per media playlist (default: 3)
    let master_url = std::env::args().nth(1).unwrap_or_else(|| {
        "https://devstreaming-cdn.apple.com/videos/streaming/examples/img_bipbop_adv_example_fmp4/master.m3u8"
            .to_string()
    });
    let max_leaves: usize = std::env::args()
        .nth(2)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(3);

    info!("HLS tree walk starting");
    info!("  URL: {}", master_url);

    let source = AutoSource::new(Settings::default().request_timeout(Duration::from_secs(10)))?;
    let cancel = CancellationToken::new();
    let mut nav = Navigator::start(source, master_url, &cancel).await?;
    info!("root: {}", nav.current().label());

    // Visit every child of the root once, then come back.
    let count = nav.current_frame().children().len();
    for index in 0..count {
        let child = nav.current_frame().children()[index].relative_url().to_string();
        match nav.advance(&cancel).await {
            Ok(_) => {
                info!("[{}/{}] {} -> {}", index + 1, count, child, nav.current().label());
                for leaf in nav.current_frame().children().iter().take(max_leaves) {
                    let url = leaf.url().unwrap_or_else(|e| format!("<{e}>"));
                    match leaf {
                        NestedFile::Segment(seg) => info!(
                            "    #{} {:.3}s {}",
                            seg.sequence(),
                            seg.duration().as_secs_f64(),
                            url
                        ),
                        other => info!("    {} {}", other.kind().name(), url),
                    }
                }
                nav.back();
            }
            Err(e) => warn!("[{}/{}] {} failed: {}", index + 1, count, child, e),
        }
        if nav.select_next() == Outcome::Boundary {
            break;
        }
    }

    info!("done");
    Ok(())
}
