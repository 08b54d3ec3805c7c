use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flare_sentinel::present::{SparklineRenderer, TerminalAlarm, TerminalStatus};
use flare_sentinel::{
    open_source, DetectionClient, FrameSampler, FrameSource, HttpDetectionClient, Monitor,
    MonitorConfig, OverlapPolicy, Presenter, SafetyState,
};

/// Answer one request per scripted body, in order, then stop listening.
fn scripted_detector(bodies: Vec<&'static str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake detector");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        for body in bodies {
            let (mut stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
            let mut received = Vec::new();
            let mut chunk = [0u8; 8192];
            // Read until the JSON body's closing brace; requests are small single objects.
            while !received.ends_with(b"}") {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&chunk[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{}/detect", addr)
}

fn quiet_presenter() -> Presenter {
    Presenter::new(
        Box::new(TerminalStatus::new(Box::new(std::io::sink()), false)),
        Box::new(TerminalAlarm::new(Box::new(std::io::sink()))),
        Box::new(SparklineRenderer::new(Box::new(std::io::sink()))),
        30,
    )
}

#[test]
fn monitor_presents_service_verdicts_in_order() -> anyhow::Result<()> {
    let endpoint = scripted_detector(vec![
        r#"{"status":"safe","confidence":0.1}"#,
        r#"{"status":"unsafe","confidence":0.9}"#,
        r#"{"status":"unsafe","confidence":0.95}"#,
        r#"{"status":"safe","confidence":0.05}"#,
    ]);

    let mut source = open_source("stub://bench?width=32&height=24")?;
    source.open()?;
    let sampler = FrameSampler::new(source, 75);
    assert_eq!(sampler.wait_for_dimensions(Duration::from_secs(1))?, (32, 24));

    let mut monitor = Monitor::new(
        sampler,
        Arc::new(HttpDetectionClient::new(endpoint)),
        quiet_presenter(),
        MonitorConfig {
            interval: Duration::from_millis(50),
            overlap: OverlapPolicy::SkipWhileInFlight,
        },
    );

    // The single-slot guard may skip ticks on a slow machine; keep ticking until four
    // verdicts have been presented.
    let mut presented = 0;
    for _ in 0..40 {
        monitor.tick();
        presented += monitor.settle(Duration::from_secs(5));
        if presented == 4 {
            break;
        }
    }

    assert_eq!(presented, 4);
    assert_eq!(monitor.presenter().series().values(), vec![0.1, 0.9, 0.95, 0.05]);
    assert_eq!(monitor.presenter().state(), Some(SafetyState::Safe));
    assert!(!monitor.presenter().alarm().is_playing());
    Ok(())
}

#[test]
fn monitor_shows_safe_when_detector_is_down() -> anyhow::Result<()> {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let mut source = open_source("stub://bench?width=16&height=16&flare_every=1")?;
    source.open()?;

    let client = Arc::new(HttpDetectionClient::new(format!(
        "http://127.0.0.1:{}/detect",
        port
    )));
    let mut monitor = Monitor::new(
        FrameSampler::new(source, 75),
        client.clone(),
        quiet_presenter(),
        MonitorConfig {
            interval: Duration::from_millis(10),
            overlap: OverlapPolicy::Concurrent,
        },
    );

    let stats = monitor.run_cycles(3);

    assert_eq!(stats.presented, 3);
    assert_eq!(monitor.presenter().state(), Some(SafetyState::Safe));
    assert_eq!(monitor.presenter().series().values(), vec![0.0, 0.0, 0.0]);
    assert_eq!(client.stats().fallbacks, 3);
    Ok(())
}

#[test]
fn unencodable_frame_does_not_stop_the_monitor() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    image::RgbImage::from_pixel(4, 4, image::Rgb([90, 90, 90])).save(dir.path().join("a.png"))?;
    // Wider than JPEG allows.
    image::RgbImage::from_pixel(70_000, 1, image::Rgb([90, 90, 90]))
        .save(dir.path().join("b.png"))?;
    let source_url = url::Url::from_directory_path(dir.path())
        .map_err(|_| anyhow::anyhow!("temp dir is not absolute"))?;

    let mut source = open_source(source_url.as_str())?;
    source.open()?;
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let mut monitor = Monitor::new(
        FrameSampler::new(source, 75),
        Arc::new(HttpDetectionClient::new(format!(
            "http://127.0.0.1:{}/detect",
            port
        ))),
        quiet_presenter(),
        MonitorConfig {
            interval: Duration::from_millis(10),
            overlap: OverlapPolicy::Concurrent,
        },
    );

    let stats = monitor.run_cycles(3);

    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.presented, 3);
    assert_eq!(monitor.presenter().state(), Some(SafetyState::Safe));
    assert_eq!(monitor.presenter().series().values(), vec![0.0, 0.0, 0.0]);
    Ok(())
}
