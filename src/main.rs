use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use glint3d::abs::{App, FsImageLoader, Gpu};
use glint3d::config::Config;
use glint3d::main_loop::MainLoop;
use glint3d::{logging, scene};

fn run(config: &Config) -> glint3d::Result<()> {
    let app = App::new(&config.window)?;
    let gl: Rc<dyn Gpu> = app.gl.clone();
    let scene = scene::reference_scene(&gl, &config.scene, &FsImageLoader::default())?;
    let mut main_loop = MainLoop::new(gl, app, scene, config)?;
    main_loop.run()
}

fn main() -> ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    // Nothing can be logged until the config says where to.
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("glint3d: {e}");
            return ExitCode::FAILURE;
        }
    };
    let setup = config
        .log_level()
        .map_err(glint3d::Error::from)
        .and_then(|level| logging::setup(level, config.log.file.as_deref()));
    if let Err(e) = setup {
        eprintln!("glint3d: {e}");
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                log::error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
