use std::path::PathBuf;

use argh::FromArgs;

use gopsfm_pipeline::database::MemoryDatabase;
use gopsfm_pipeline::extract::extract_frames;
use gopsfm_pipeline::project::process_scene;
use gopsfm_pipeline::reconstructor::ColmapCli;

#[derive(FromArgs)]
/// Prepare every scene under a root directory for dynamic reconstruction:
/// optionally extract video frames, then reconstruct each GOP keyframe.
struct Args {
    /// directory holding one subdirectory per scene
    #[argh(option)]
    root_dir: PathBuf,

    /// extract PNG frames from the scene videos before reconstruction
    #[argh(switch)]
    extract_frames: bool,

    /// frame rate passed to the video decoder
    #[argh(option, default = "30")]
    frame_rate: u32,

    /// first frame of the sequence
    #[argh(option, default = "0")]
    start_frame: usize,

    /// one past the last frame of the sequence
    #[argh(option, default = "300")]
    end_frame: usize,

    /// number of frames per group of pictures
    #[argh(option, default = "60")]
    gop: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let reconstructor = ColmapCli::default();

    let mut scenes = Vec::new();
    for entry in std::fs::read_dir(&args.root_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            scenes.push(entry.path());
        }
    }
    scenes.sort();

    for scene in scenes {
        log::info!("processing scene {}", scene.display());

        if args.extract_frames {
            extract_frames(&scene, args.frame_rate)?;
        }

        process_scene(
            &scene,
            args.start_frame,
            args.end_frame,
            args.gop,
            &reconstructor,
            MemoryDatabase::new,
        )?;
    }

    Ok(())
}
