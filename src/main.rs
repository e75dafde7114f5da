use std::any::Any;
use std::env;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::WindowBuilder;

use shardview::{load_model, CanvasBounds, Renderer, Viewer, ViewerScene};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read scene {}", options.path))?;
    let scene = ViewerScene::from_xml(&xml).context("failed to parse scene")?;

    println!("Loaded scene {} (model {})", options.path, scene.model);

    let mut viewer = Viewer::new(&scene);
    let model_path = resolve_model_path(&options.path, &scene.model);
    let mut loaded = None;
    load_model(
        &model_path,
        |parts| loaded = Some(parts),
        |err| log::error!("model load failed, viewer stays empty: {err:?}"),
    );
    if let Some(parts) = loaded {
        println!("Model split into {} part(s)", parts.len());
        for part in &parts {
            println!(" - {}", part.name);
        }
        viewer.attach_parts(parts);
    }

    if options.summary_only {
        run_headless(viewer, options.frames)
    } else {
        match run_interactive(&mut viewer) {
            Ok(()) => {
                print_final_state(&viewer);
                Ok(())
            }
            Err(err) => {
                if err.downcast_ref::<WindowInitError>().is_some() {
                    eprintln!(
                        "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                    );
                    run_headless(viewer, options.frames)
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// Model paths in the scene file are relative to the scene file itself.
fn resolve_model_path(scene_path: &str, model: &str) -> PathBuf {
    let model = Path::new(model);
    if model.is_absolute() {
        return model.to_path_buf();
    }
    Path::new(scene_path)
        .parent()
        .map(|dir| dir.join(model))
        .unwrap_or_else(|| model.to_path_buf())
}

/// Runs the frame loop without a window, sweeping a synthetic pointer across
/// the canvas and letting the parts settle afterwards.
fn run_headless(mut viewer: Viewer, frames: u32) -> Result<()> {
    const WIDTH: f32 = 1280.0;
    const HEIGHT: f32 = 720.0;

    viewer.resize(WIDTH as u32, HEIGHT as u32);
    let pointer = viewer.pointer();
    let bounds = CanvasBounds::from_size(WIDTH, HEIGHT);
    let velocity_scale = viewer.config().velocity_scale;

    let sweep = frames / 2;
    for frame in 0..frames {
        if frame < sweep {
            // Left-to-right pass through the vertical center.
            let t = (frame + 1) as f32 / sweep.max(1) as f32;
            pointer.on_pointer_move(Vec2::new(t * WIDTH, HEIGHT / 2.0), bounds, velocity_scale);
        } else if frame == sweep {
            pointer.on_pointer_leave();
        }
        viewer.frame();
    }

    println!("Simulated {frames} frame(s)");
    print_final_state(&viewer);
    Ok(())
}

fn run_interactive(viewer: &mut Viewer) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop =
        event_loop.map_err(|panic| WindowInitError::from_panic("event loop", panic))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Shardview")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let mut renderer = block_on(Renderer::new(Arc::clone(&window)))?;
    if let Some(parts) = viewer.parts() {
        renderer.attach_parts(parts);
    }
    let size = window.inner_size();
    viewer.resize(size.width, size.height);

    let mut app = AppState {
        renderer,
        viewer,
        last_error: None,
    };

    let mut event_loop = event_loop;
    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        if let Err(err) = app.process_event(&event, control_flow) {
            app.last_error = Some(err);
            control_flow.set_exit();
        }
    });

    if let Some(err) = app.last_error {
        return Err(err);
    }

    Ok(())
}

struct AppState<'a> {
    renderer: Renderer,
    viewer: &'a mut Viewer,
    last_error: Option<anyhow::Error>,
}

impl AppState<'_> {
    fn process_event(&mut self, event: &Event<()>, control_flow: &mut ControlFlow) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => {
                        control_flow.set_exit();
                    }
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(*size);
                        self.viewer.resize(size.width, size.height);
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        self.renderer.resize(**new_inner_size);
                        self.viewer
                            .resize(new_inner_size.width, new_inner_size.height);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let size = self.renderer.window().inner_size();
                        let bounds =
                            CanvasBounds::from_size(size.width as f32, size.height as f32);
                        self.viewer.pointer().on_pointer_move(
                            Vec2::new(position.x as f32, position.y as f32),
                            bounds,
                            self.viewer.config().velocity_scale,
                        );
                    }
                    WindowEvent::CursorLeft { .. } => {
                        self.viewer.pointer().on_pointer_leave();
                    }
                    _ => {}
                }
            }
            Event::RedrawRequested(window_id) if *window_id == self.renderer.window_id() => {
                self.viewer.frame();
                let camera = self.viewer.camera_params();
                let light = self.viewer.light();
                self.renderer.update_globals(&camera, &light);

                let root = self.viewer.root_transform();
                let parts = self.viewer.parts().unwrap_or(&[]);
                if let Err(err) = self.renderer.render(parts, root) {
                    match err {
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                            let size = self.renderer.window().inner_size();
                            self.renderer.resize(size);
                        }
                        wgpu::SurfaceError::OutOfMemory => {
                            return Err(anyhow!("GPU is out of memory"));
                        }
                        wgpu::SurfaceError::Timeout => {
                            info!("Surface timeout; retrying next frame");
                        }
                    }
                }
            }
            Event::MainEventsCleared => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }
}

fn print_final_state(viewer: &Viewer) {
    println!("Final part states:");
    let Some(parts) = viewer.parts() else {
        println!(" (no model loaded)");
        return;
    };
    for part in parts {
        println!(
            " - {} rest=({:.2}, {:.2}, {:.2}) pos=({:.3}, {:.3}, {:.3})",
            part.name,
            part.rest_position.x,
            part.rest_position.y,
            part.rest_position.z,
            part.current_position.x,
            part.current_position.y,
            part.current_position.z
        );
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

struct CliOptions {
    path: String,
    frames: u32,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(
                "Usage: shardview <scene.xml> [--frames N] [--summary-only]"
            ));
        };
        let mut frames = 240;
        let mut summary_only = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames expects a number"))?;
                    frames = value
                        .parse::<u32>()
                        .map_err(|err| anyhow!("invalid --frames value {value:?}: {err}"))?;
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --frames or --summary-only"
                    ));
                }
            }
        }
        Ok(Self {
            path,
            frames,
            summary_only,
        })
    }
}
