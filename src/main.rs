//! Headless entry point: process a video file or live camera with a
//! pretrained model and optionally save the annotated result.
//!
//! Usage:
//!   stride-studio [OPTIONS] <video_path>
//!   stride-studio --live [camera_index]
//!
//! Options:
//!   --task <pose|detect|seg|cls|obb>   Model task (default: pose)
//!   --weights <path>                   Checkpoint path (overrides task table)
//!   --rotate <0|90|180|270>            Clockwise rotation
//!   --start <N> / --end <N>            Frame range (files; --end also caps live runs)
//!   --output <path.mkv|.avi|.mp4>      Save the annotated frames after processing
//!   --no-preview                       Skip preview events (batch mode)

use std::path::PathBuf;
use std::process::ExitCode;

use stride_studio::annotate::{annotator_for_task, Annotator, PoseAnnotator};
use stride_studio::capture::CameraSource;
use stride_studio::config::{is_supported_video, AppConfig, ModelTask};
use stride_studio::error::{StrideError, StrideResult};
use stride_studio::export::{export_video, Codec};
use stride_studio::frame::{Rotation, SharedRotation};
use stride_studio::model::load_model;
use stride_studio::pipeline::{
    PipelineEvent, ProcessingSession, ProgressUpdate, SessionConfig, SessionInput, SessionState,
};

struct Args {
    live: bool,
    camera_index: Option<u32>,
    input: Option<PathBuf>,
    task: Option<ModelTask>,
    weights: Option<PathBuf>,
    rotate: Rotation,
    start: u64,
    end: Option<u64>,
    output: Option<PathBuf>,
    preview: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        live: false,
        camera_index: None,
        input: None,
        task: None,
        weights: None,
        rotate: Rotation::None,
        start: 0,
        end: None,
        output: None,
        preview: true,
    };

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "--live" => {
                args.live = true;
                if let Some(next) = argv.get(i + 1) {
                    if let Ok(index) = next.parse::<u32>() {
                        args.camera_index = Some(index);
                        i += 1;
                    }
                }
            }
            "--task" => {
                i += 1;
                let name = argv.get(i).ok_or("--task needs a value")?;
                args.task =
                    Some(ModelTask::from_name(name).ok_or_else(|| format!("unknown task: {}", name))?);
            }
            "--weights" => {
                i += 1;
                args.weights = Some(PathBuf::from(argv.get(i).ok_or("--weights needs a value")?));
            }
            "--rotate" => {
                i += 1;
                let degrees: u32 = argv
                    .get(i)
                    .ok_or("--rotate needs a value")?
                    .parse()
                    .map_err(|_| "invalid rotation".to_string())?;
                args.rotate = Rotation::from_degrees(degrees)
                    .ok_or("rotation must be one of 0, 90, 180, 270")?;
            }
            "--start" => {
                i += 1;
                args.start = argv
                    .get(i)
                    .ok_or("--start needs a value")?
                    .parse()
                    .map_err(|_| "invalid start frame".to_string())?;
            }
            "--end" => {
                i += 1;
                args.end = Some(
                    argv.get(i)
                        .ok_or("--end needs a value")?
                        .parse()
                        .map_err(|_| "invalid end frame".to_string())?,
                );
            }
            "--output" => {
                i += 1;
                args.output = Some(PathBuf::from(argv.get(i).ok_or("--output needs a value")?));
            }
            "--no-preview" => args.preview = false,
            other if other.starts_with("--") => return Err(format!("unknown option: {}", other)),
            other => args.input = Some(PathBuf::from(other)),
        }
        i += 1;
    }

    if !args.live && args.input.is_none() {
        return Err("pass a video path, or --live for the webcam".to_string());
    }
    Ok(args)
}

fn build_annotator(config: &AppConfig, args: &Args) -> StrideResult<Box<dyn Annotator>> {
    let task = args.task.unwrap_or(config.default_task);
    match &args.weights {
        Some(weights) => {
            let model = load_model(weights, config.model_input_size)?;
            Ok(match task {
                ModelTask::Pose => {
                    Box::new(PoseAnnotator::new(model, config.confidence_threshold))
                }
                _ => Box::new(stride_studio::annotate::GenericAnnotator::new(model)),
            })
        }
        None => annotator_for_task(config, task),
    }
}

fn run() -> StrideResult<()> {
    let args = parse_args().map_err(StrideError::Other)?;
    let config = AppConfig::load();

    if let Some(input) = &args.input {
        if !is_supported_video(input) {
            return Err(StrideError::Other(format!(
                "{} is not a supported video file",
                input.display()
            )));
        }
    }
    if let Some(output) = &args.output {
        if Codec::for_extension(output).is_none() {
            return Err(StrideError::Other(format!(
                "{}: output must end in .mkv, .avi or .mp4",
                output.display()
            )));
        }
        if args.live {
            return Err(StrideError::Other(
                "live sessions keep no history; --output only works with files".to_string(),
            ));
        }
    }

    let annotator = build_annotator(&config, &args)?;

    let input = if args.live {
        let index = args.camera_index.unwrap_or(config.camera_index);
        let camera = CameraSource::open(index, config.fallback_fps)?;
        SessionInput::Supplied(Box::new(camera))
    } else {
        SessionInput::Path(args.input.clone().expect("checked above"))
    };

    let session_config = SessionConfig {
        start_frame: args.start,
        end_frame: args.end,
        rotation: SharedRotation::new(args.rotate),
        preview: args.preview,
    };

    let session = ProcessingSession::start(input, annotator, session_config, config.fallback_fps);

    let mut last_percent = None;
    for event in session.events().iter() {
        match event {
            PipelineEvent::Progress(ProgressUpdate::Percent(pct)) => {
                if last_percent != Some(pct) && pct % 10 == 0 {
                    log::info!("Progress: {}%", pct);
                    last_percent = Some(pct);
                }
            }
            PipelineEvent::Progress(ProgressUpdate::Live { frames }) => {
                if frames % 100 == 0 {
                    log::info!("Live frames processed: {}", frames);
                }
            }
            PipelineEvent::Preview(_) => {}
            PipelineEvent::Finished(state) => {
                match &state {
                    SessionState::Completed => log::info!("Processing complete."),
                    SessionState::Cancelled => log::info!("Processing cancelled."),
                    SessionState::Failed { reason } => {
                        return Err(StrideError::Other(format!("processing failed: {}", reason)))
                    }
                    other => log::warn!("Unexpected terminal state: {:?}", other),
                }
                break;
            }
        }
    }

    let report = session.wait();

    if let Some(output) = args.output {
        let codec = Codec::for_extension(&output).expect("validated above");
        let summary = export_video(&report.frames, &output, codec, report.fps)?;
        log::info!(
            "Saved -> {} ({} frames, {} bytes)",
            summary.output_path.display(),
            summary.frames_written,
            summary.file_size_bytes
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    stride_studio::logging::init(log::LevelFilter::Info);
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
