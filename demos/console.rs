use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use polly_session::media::{LatestFrame, RawFrame};
use polly_session::utils;
use polly_session::{Config, MediaScheduler, SessionState};

#[derive(Parser, Debug)]
#[command(version, about = "Terminal client for a Polly coaching session")]
struct Args {
    /// Socket base, e.g. ws://localhost:8000/ws
    #[arg(long)]
    ws_url: Option<String>,
    /// Input device name; the default device when omitted.
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    list_devices: bool,
    /// Publish a synthetic camera image so frames flow without a webcam.
    #[arg(long)]
    test_pattern: bool,
}

const HELP: &str = "commands: /topic, /record, /stop, /camera, /mute, /stats, /quit; anything else is sent as chat";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Args::parse();
    if args.list_devices {
        println!("{}", utils::device::get_available_inputs().expect("failed to list input devices"));
        return;
    }

    let mut builder = Config::from_env().expect("invalid configuration").into_builder();
    if let Some(ws_url) = &args.ws_url {
        builder = builder.with_ws_url(ws_url);
    }
    let config = builder.build();

    let camera = LatestFrame::new();
    if args.test_pattern {
        let camera = camera.clone();
        tokio::spawn(async move {
            let mut shade = 0u8;
            loop {
                camera.publish(test_pattern(160, 120, shade));
                shade = shade.wrapping_add(8);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
    }
    let microphone = utils::Microphone::new(args.device.clone());
    let media = MediaScheduler::new(camera, microphone);

    let session = polly_session::connect_with_config(config, media)
        .await
        .expect("failed to start session");
    println!("session {}", session.identity());
    println!("{}", HELP);

    let mut state = session.state();
    tokio::spawn(async move {
        let mut printed = 0;
        while state.changed().await.is_ok() {
            let snapshot = state.borrow_and_update().clone();
            printed = render(&snapshot, printed);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut capture_enabled = true;
    let mut muted = false;
    while let Ok(Some(line)) = lines.next_line().await {
        let result = match line.trim() {
            "" => continue,
            "/quit" => break,
            "/topic" => session.request_new_topic().await,
            "/record" => session.start_recording().await,
            "/stop" => session.stop_recording().await,
            "/camera" => {
                capture_enabled = !capture_enabled;
                session.set_capture_enabled(capture_enabled).await
            }
            "/mute" => {
                muted = !muted;
                session.set_muted(muted).await
            }
            "/stats" => {
                println!("{:?}", session.stats());
                Ok(())
            }
            text => session.send_chat(text).await,
        };
        if let Err(e) = result {
            eprintln!("! {}", e);
        }
    }

    session.shutdown().await.expect("failed to shut down");
}

/// Prints chat entries past `printed` plus the status line; returns the new count.
fn render(state: &SessionState, printed: usize) -> usize {
    // History restarts on every reconnect.
    let start = if state.chat.len() < printed { 0 } else { printed };
    for entry in &state.chat[start..] {
        println!("[{:?}] {}", entry.role, entry.content);
    }

    let emotion = state
        .emotion
        .as_ref()
        .and_then(|reading| reading.dominant_emotion())
        .unwrap_or("-");
    println!(
        "-- connected={} recording={} processing={} camera={} muted={} emotion={}",
        state.connected, state.recording, state.processing, state.capture_enabled, state.muted, emotion
    );
    if let Some(error) = &state.error {
        println!("-- error: {}", error);
    }
    if let Some(error) = &state.capture_error {
        println!("-- capture error: {}", error);
    }
    state.chat.len()
}

fn test_pattern(width: u32, height: u32, shade: u8) -> RawFrame {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            rgb.extend_from_slice(&[(x * 255 / width) as u8, (y * 255 / height) as u8, shade]);
        }
    }
    RawFrame { width, height, rgb }
}
