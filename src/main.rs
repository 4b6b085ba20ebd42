use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use canvasshot::canvas::json;
use canvasshot::canvas::memory::{MemoryCanvas, MemoryRegistry};
use canvasshot::{ExportConfig, ExportRequest, Exporter, Rgba, SurfaceSize};
use clap::Parser;
use serde::Serialize;

/// Export a JSON Canvas file to a framed PNG
#[derive(Parser, Debug)]
#[command(name = "canvasshot", version, about)]
struct Args {
    /// Path to the `.canvas` file
    canvas: PathBuf,

    /// Output PNG path (defaults to the input with a `.png` extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Render surface size as WIDTHxHEIGHT
    #[arg(long, default_value = "1280x720", value_parser = parse_surface)]
    surface: SurfaceSize,

    /// Device pixel ratio of the produced image
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f32,

    /// Wait before framing starts, in milliseconds. A file-backed canvas has
    /// nothing loading in the background, so this defaults to no wait.
    #[arg(long, default_value_t = 0)]
    settle_ms: u64,

    /// Background colour as #rrggbb, overriding the surface colour
    #[arg(long, value_parser = parse_color)]
    background: Option<Rgba>,

    /// Print a JSON object with base64 image data instead of writing a file
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput {
    mime_type: &'static str,
    width: u32,
    height: u32,
    sha256: String,
    data: String,
}

fn parse_surface(s: &str) -> Result<SurfaceSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", s))?;
    let width = w.trim().parse::<u32>().map_err(|e| format!("width: {}", e))?;
    let height = h.trim().parse::<u32>().map_err(|e| format!("height: {}", e))?;
    if width == 0 || height == 0 {
        return Err("surface must be at least 1x1".into());
    }
    Ok(SurfaceSize { width, height })
}

fn parse_color(s: &str) -> Result<Rgba, String> {
    Rgba::from_hex(s).ok_or_else(|| format!("invalid colour {:?}", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let id = args
        .canvas
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("cannot derive a document id from {}", args.canvas.display()))?
        .to_string();
    let model = json::from_path(&args.canvas)
        .with_context(|| format!("loading {}", args.canvas.display()))?;

    let canvas = MemoryCanvas::new(id.clone(), model, args.surface);
    let registry = Arc::new(MemoryRegistry::new().with_canvas(Arc::new(canvas)));

    let config = ExportConfig {
        pixel_ratio: args.pixel_ratio,
        background: args.background,
        ..Default::default()
    };
    let exporter = Exporter::new(registry, config);
    let request = ExportRequest::new(id.clone()).with_settle_timeout(args.settle_ms);

    let image = exporter
        .export(&request)
        .await
        .with_context(|| format!("exporting {}", id))?;

    if args.json {
        let out = JsonOutput {
            mime_type: image.mime_type,
            width: image.width,
            height: image.height,
            sha256: image.sha256_hex(),
            data: image.to_base64(),
        };
        println!("{}", serde_json::to_string(&out)?);
        return Ok(());
    }

    let path = args
        .output
        .unwrap_or_else(|| args.canvas.with_extension("png"));
    std::fs::write(&path, &image.bytes).with_context(|| format!("writing {}", path.display()))?;
    println!(
        "{} -> {} ({}x{}, {} bytes)",
        args.canvas.display(),
        path.display(),
        image.width,
        image.height,
        image.bytes.len()
    );
    Ok(())
}
