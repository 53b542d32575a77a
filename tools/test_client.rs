//! Test Change Detection Client
//!
//! Generates synthetic image pairs and posts them to a running change detection server.

use image::{ImageFormat, Rgb, RgbImage};
use rand::Rng;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const WIDTH: u32 = 256;
const HEIGHT: u32 = 256;

/// Response body of `POST /detect-changes`
#[derive(Debug, Deserialize)]
struct DetectionResponse {
    session_id: String,
    result_url: String,
    percentage_change: Option<f64>,
}

/// A before/after pair with the share of pixels that was repainted
struct ImagePair {
    before: Vec<u8>,
    after: Vec<u8>,
    expected_change: f64,
}

/// Image pair generator for testing
struct PairGenerator {
    rng: rand::rngs::ThreadRng,
}

impl PairGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a noisy scene and a copy with one rectangle repainted
    fn generate(&mut self) -> anyhow::Result<ImagePair> {
        let base: [u8; 3] = [
            self.rng.gen_range(40..160),
            self.rng.gen_range(40..160),
            self.rng.gen_range(40..160),
        ];
        let mut before = RgbImage::new(WIDTH, HEIGHT);
        for pixel in before.pixels_mut() {
            let noise: i16 = self.rng.gen_range(-8..=8);
            *pixel = Rgb(base.map(|c| (c as i16 + noise).clamp(0, 255) as u8));
        }

        let rect_w = self.rng.gen_range(WIDTH / 8..WIDTH / 2);
        let rect_h = self.rng.gen_range(HEIGHT / 8..HEIGHT / 2);
        let x0 = self.rng.gen_range(0..WIDTH - rect_w);
        let y0 = self.rng.gen_range(0..HEIGHT - rect_h);
        let fill = Rgb([
            self.rng.gen_range(200..=255),
            self.rng.gen_range(200..=255),
            self.rng.gen_range(0..60),
        ]);

        let mut after = before.clone();
        for y in y0..y0 + rect_h {
            for x in x0..x0 + rect_w {
                after.put_pixel(x, y, fill);
            }
        }

        Ok(ImagePair {
            before: encode_png(&before)?,
            after: encode_png(&after)?,
            expected_change: (rect_w * rect_h) as f64 / (WIDTH * HEIGHT) as f64 * 100.0,
        })
    }
}

fn encode_png(image: &RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn image_part(bytes: Vec<u8>, filename: &str) -> anyhow::Result<Part> {
    Ok(Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str("image/png")?)
}

async fn submit(
    client: &reqwest::Client,
    base_url: &str,
    pair: ImagePair,
) -> anyhow::Result<DetectionResponse> {
    let form = Form::new()
        .part("image1", image_part(pair.before, "before.png")?)
        .part("image2", image_part(pair.after, "after.png")?);

    let response = client
        .post(format!("{}/detect-changes", base_url))
        .multipart(form)
        .send()
        .await?
        .error_for_status()?;

    Ok(response.json().await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Change Detection Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.trim_end_matches('/'))
        .unwrap_or("http://localhost:5000");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
    let delay_ms: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(500);

    info!(
        base_url = %base_url,
        count = count,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;

    // Check the server is up
    match client.get(format!("{}/health", base_url)).send().await {
        Ok(response) if response.status().is_success() => info!("Server is healthy"),
        Ok(response) => {
            warn!(status = %response.status(), "Server health check failed. Running in dry-run mode.");
            return run_dry_mode(count, delay_ms).await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to reach server. Running in dry-run mode.");
            return run_dry_mode(count, delay_ms).await;
        }
    }

    let mut generator = PairGenerator::new();
    let mut succeeded = 0;
    let mut failed = 0;

    info!("Submitting {} image pairs...", count);

    for i in 0..count {
        let pair = generator.generate()?;
        let expected = pair.expected_change;

        match submit(&client, base_url, pair).await {
            Ok(report) => {
                succeeded += 1;
                let mask = client
                    .get(format!("{}{}", base_url, report.result_url))
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;

                info!(
                    pair = i + 1,
                    session_id = %report.session_id,
                    expected_change = %format!("{:.2}", expected),
                    reported_change = ?report.percentage_change,
                    mask_bytes = mask.len(),
                    "Detection complete"
                );
            }
            Err(e) => {
                failed += 1;
                warn!(pair = i + 1, error = %e, "Detection request failed");
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Submitted {} pairs ({} succeeded, {} failed)",
        count, succeeded, failed
    );

    Ok(())
}

async fn run_dry_mode(count: u64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no server connection)");

    let out_dir = Path::new("test_pairs");
    tokio::fs::create_dir_all(out_dir).await?;

    let mut generator = PairGenerator::new();

    for i in 0..count {
        let pair = generator.generate()?;
        let before_path = out_dir.join(format!("pair_{:04}_before.png", i + 1));
        let after_path = out_dir.join(format!("pair_{:04}_after.png", i + 1));
        tokio::fs::write(&before_path, &pair.before).await?;
        tokio::fs::write(&after_path, &pair.after).await?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!(
                before = %before_path.display(),
                after = %after_path.display(),
                expected_change = %format!("{:.2}", pair.expected_change),
                "Sample pair {} written",
                i + 1
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
