use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use image::{ImageReader, Rgb, RgbImage};
use imageproc::drawing;
use imageproc::rect::Rect;
use num_cpus::get as get_cpu_count;
use roitrack::pipeline::model::{DetectorOptions, LandmarkerOptions, OnnxDetector, OnnxLandmarker};
use roitrack::{Pipeline, Subject, TrackerConfig};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{Level, debug, info, span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Preset {
    /// Palm detector with the 21 point hand landmark model
    Hand,
    /// Face detector with the 468 point face mesh
    Face,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Whole-frame detector model
    #[arg(short, long, value_name = "ONNX")]
    detector: PathBuf,

    /// Landmark model run on each tracked region
    #[arg(short, long, value_name = "ONNX")]
    landmarker: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Preset::Hand)]
    preset: Preset,

    #[arg(long)]
    max_subjects: Option<usize>,

    /// Frames to track before the detector is forced to run again
    #[arg(long)]
    max_continuous_checks: Option<usize>,

    /// Landmark presence threshold
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Write annotated frames here
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(short, long)]
    max_threads: Option<usize>,

    /// Frames of one sequence, processed in order
    #[arg(required = true)]
    frames: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let args = Args::parse();

    let total_threads = get_cpu_count();
    let threads = args.max_threads.unwrap_or(total_threads).min(total_threads);

    let (mut config, detector_options, landmarker_options) = match args.preset {
        Preset::Hand => (
            TrackerConfig::hand(),
            DetectorOptions::palm(),
            LandmarkerOptions::hand(),
        ),
        Preset::Face => (
            TrackerConfig::face(),
            DetectorOptions::face(),
            LandmarkerOptions::face(),
        ),
    };
    if let Some(max) = args.max_subjects {
        config.max_subjects = max;
    }
    if args.max_continuous_checks.is_some() {
        config.max_continuous_checks = args.max_continuous_checks;
    }
    if let Some(threshold) = args.threshold {
        config.presence_threshold = threshold;
    }

    let detector = OnnxDetector::new(&args.detector, threads, detector_options)?;
    let landmarker = OnnxLandmarker::new(&args.landmarker, threads, landmarker_options)?;
    let mut pipeline = Pipeline::new(detector, landmarker, config)?;

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
    }

    for (idx, path) in args.frames.iter().enumerate() {
        let span = span!(Level::INFO, "frame", idx);
        let _guard = span.enter();

        let mut img = ImageReader::open(path)?.decode()?.into_rgb8();

        let start = Instant::now();
        let subjects = pollster::block_on(pipeline.process(&img))?;
        info!(
            "{path:?}: {} subjects in {:?}",
            subjects.len(),
            start.elapsed()
        );

        for subject in &subjects {
            debug!(
                presence = subject.presence,
                handedness = ?subject.handedness,
                "Subject at {:?}, {:.3} rad",
                subject.bounds.center(),
                subject.angle
            );
        }

        if let Some(dir) = &args.output_dir {
            draw_subjects(&mut img, &subjects);

            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("{path:?} has no file name"))?;
            let output_path = dir.join(name);
            img.save(&output_path)?;
            debug!("Result at {output_path:?}");
        }
    }

    Ok(())
}

fn draw_subjects(img: &mut RgbImage, subjects: &[Subject]) {
    for subject in subjects {
        let bounds = &subject.bounds;
        drawing::draw_hollow_rect_mut(
            img,
            Rect::at(bounds.start.x as i32, bounds.start.y as i32)
                .of_size(bounds.width().max(1.) as u32, bounds.height().max(1.) as u32),
            Rgb([255u8, 0u8, 0u8]),
        );

        for landmark in &subject.landmarks {
            drawing::draw_filled_circle_mut(
                img,
                (landmark.x as i32, landmark.y as i32),
                2,
                Rgb([0u8, 255u8, 0u8]),
            );
        }
    }
}
