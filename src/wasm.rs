#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use gloo_events::EventListener;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, HtmlCanvasElement};

use crate::model::parse_obj_parts;
use crate::pointer::wasm::DomPointerHandler;
use crate::render::Renderer;
use crate::scene::ViewerScene;
use crate::viewer::Viewer;

#[wasm_bindgen(start)]
pub fn init_logging() {
    console_error_panic_hook::set_once();
}

/// Browser entry point: owns the viewer, the canvas renderer and the DOM
/// listeners, and drives everything from `requestAnimationFrame`.
#[wasm_bindgen]
pub struct WasmApp {
    inner: Rc<RefCell<AppState>>,
}

#[wasm_bindgen]
impl WasmApp {
    /// Builds the app from a scene document and the OBJ model text.
    ///
    /// A broken scene is fatal; a broken model is logged and the viewer keeps
    /// running with nothing to displace, matching the native host.
    #[wasm_bindgen(constructor)]
    pub async fn new(
        canvas_id: String,
        scene_xml: String,
        model_obj: String,
    ) -> Result<WasmApp, JsValue> {
        let scene = ViewerScene::from_xml(&scene_xml)
            .map_err(|err| JsValue::from_str(&format!("failed to parse scene: {err}")))?;
        let mut viewer = Viewer::new(&scene);

        match parse_obj_parts(&model_obj) {
            Ok(parts) => viewer.attach_parts(parts),
            Err(err) => {
                web_sys::console::error_1(&JsValue::from_str(&format!(
                    "failed to load model {}: {err}",
                    scene.model
                )));
            }
        }

        let window = window().ok_or_else(|| JsValue::from_str("window not available"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("document not available"))?;
        let canvas = document
            .get_element_by_id(&canvas_id)
            .ok_or_else(|| JsValue::from_str("canvas element not found"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| JsValue::from_str("element is not a canvas"))?;

        viewer.resize(canvas.width(), canvas.height());

        let renderer = Renderer::new(canvas.clone())
            .await
            .map_err(|err| JsValue::from_str(&err.to_string()))?;

        let pointer_handler = DomPointerHandler::attach(
            &canvas,
            viewer.pointer(),
            viewer.config().velocity_scale,
        );

        let state = AppState {
            viewer,
            renderer,
            _pointer_handler: pointer_handler,
            _resize_listener: None,
            animation_closure: None,
        };
        let inner = Rc::new(RefCell::new(state));

        attach_resize_listener(&inner, canvas);

        Ok(Self { inner })
    }

    pub fn start(&self) -> Result<(), JsValue> {
        schedule_animation_loop(Rc::clone(&self.inner))
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }
}

struct AppState {
    viewer: Viewer,
    renderer: Renderer,
    _pointer_handler: DomPointerHandler,
    _resize_listener: Option<EventListener>,
    animation_closure: Option<Closure<dyn FnMut()>>,
}

impl AppState {
    fn render_frame(&mut self) -> Result<()> {
        self.viewer.frame();

        let camera = self.viewer.camera_params();
        let light = self.viewer.light();
        self.renderer.update_globals(&camera, &light);

        let root = self.viewer.root_transform();
        let velocity = self.viewer.pointer().snapshot().velocity;
        let parts = self.viewer.parts().unwrap_or(&[]);
        self.renderer.render(parts, root, velocity).map_err(|err| {
            let message = err
                .as_string()
                .unwrap_or_else(|| "unknown canvas error".to_string());
            anyhow!("render failed: {message}")
        })?;
        Ok(())
    }
}

fn attach_resize_listener(app: &Rc<RefCell<AppState>>, canvas: HtmlCanvasElement) {
    let Some(window) = window() else {
        return;
    };
    let handler_app = Rc::clone(app);
    let listener = EventListener::new(&window, "resize", move |_| {
        let rect = canvas.get_bounding_client_rect();
        let (width, height) = (rect.width() as u32, rect.height() as u32);
        let mut state = handler_app.borrow_mut();
        state.renderer.resize((width, height));
        state.viewer.resize(width, height);
    });
    // The listener closes over the app, so parking it on the state keeps it
    // alive for the app's lifetime (the page teardown reclaims the cycle).
    app.borrow_mut()._resize_listener = Some(listener);
}

fn schedule_animation_loop(app: Rc<RefCell<AppState>>) -> Result<()> {
    let window = window().ok_or_else(|| anyhow!("window not available"))?;
    let mut state = app.borrow_mut();
    let app_clone = Rc::clone(&app);

    let closure = Closure::wrap(Box::new(move || {
        if let Err(err) = app_clone.borrow_mut().render_frame() {
            web_sys::console::error_1(&JsValue::from_str(&err.to_string()));
        }
        if let Err(err) = schedule_animation_loop(Rc::clone(&app_clone)) {
            web_sys::console::error_1(&JsValue::from_str(&err.to_string()));
        }
    }) as Box<dyn FnMut()>);

    window
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;

    state.animation_closure = Some(closure);
    Ok(())
}
