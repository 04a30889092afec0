//! Camera, orbit controls and model framing.
//!
//! - [`Camera`] is a perspective camera looking at a target point
//! - [`CameraUniform`] is its GPU representation
//! - [`OrbitController`] turns mouse input into damped orbit, pan and zoom
//! - [`fit_camera_to_object`] frames a freshly loaded model

use std::f32::consts::PI;

use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Vector2, Vector3};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

use crate::data_structures::scene_graph::SceneNode;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Near plane set when framing a model.
pub const FIT_NEAR: f32 = 0.1;
/// The far plane is placed at this multiple of the framing distance.
pub const FIT_FAR_FACTOR: f32 = 10.0;

const SAFE_FRAC_PI: f32 = PI - 0.0001;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view.
    pub fovy: Deg<f32>,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, fovy: Deg<f32>) -> Self {
        Self {
            position: position.into(),
            target: Point3::origin(),
            up: Vector3::unit_y(),
            fovy,
            aspect: 1.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }

    pub fn calc_view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn calc_projection(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (camera.calc_projection() * camera.calc_view()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Tuning of the interactive controls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlsConfig {
    /// Share of the pending motion applied per update; the rest carries over.
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.1,
            rotate_speed: 1.9,
            zoom_speed: 1.2,
            pan_speed: 0.8,
            min_distance: 10.0,
            max_distance: 2000.0,
        }
    }
}

/// Orbit/pan/zoom around [`target`](Self::target) with damped motion.
///
/// Left drag rotates, right or middle drag pans, the wheel zooms. The camera
/// distance is kept within `[min_distance, max_distance]` on every update.
/// Drags are ignored until the viewport size is known.
#[derive(Debug)]
pub struct OrbitController {
    pub target: Point3<f32>,
    pub config: ControlsConfig,
    rotate: Vector2<f32>,
    pan: Vector2<f32>,
    zoom: f32,
    drag: Option<MouseButton>,
    cursor: Option<PhysicalPosition<f64>>,
    viewport_height: Option<f32>,
}

impl OrbitController {
    pub fn new(config: ControlsConfig) -> Self {
        Self {
            target: Point3::origin(),
            config,
            rotate: Vector2::new(0.0, 0.0),
            pan: Vector2::new(0.0, 0.0),
            zoom: 0.0,
            drag: None,
            cursor: None,
            viewport_height: None,
        }
    }

    /// Sets the size of the surface drags are measured against.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport_height = Some(height as f32);
        }
    }

    pub fn viewport_height(&self) -> Option<f32> {
        self.viewport_height
    }

    /// Rotate by a drag of `dx`/`dy` pixels.
    pub fn process_rotate(&mut self, dx: f32, dy: f32) {
        let Some(height) = self.viewport_height else {
            return;
        };
        let scale = 2.0 * PI * self.config.rotate_speed / height;
        self.rotate += Vector2::new(dx, dy) * scale;
    }

    /// Pan by a drag of `dx`/`dy` pixels.
    pub fn process_pan(&mut self, dx: f32, dy: f32) {
        let Some(height) = self.viewport_height else {
            return;
        };
        let scale = self.config.pan_speed / height;
        self.pan += Vector2::new(dx, dy) * scale;
    }

    /// Positive `lines` zoom in.
    pub fn process_scroll(&mut self, delta: &MouseScrollDelta) {
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => *y,
            MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 100.0,
        };
        self.zoom -= lines * 0.1 * self.config.zoom_speed;
    }

    /// Feeds a window event into the controls. Returns `true` if it was consumed.
    pub fn process_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::Resized(size) => {
                self.set_viewport(size.width, size.height);
                false
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match (button, state) {
                    (MouseButton::Left | MouseButton::Right | MouseButton::Middle, ElementState::Pressed) => {
                        self.drag = Some(*button);
                    }
                    (_, ElementState::Released) => self.drag = None,
                    _ => return false,
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let last = self.cursor.replace(*position);
                let (Some(button), Some(last)) = (self.drag, last) else {
                    return false;
                };
                let dx = (position.x - last.x) as f32;
                let dy = (position.y - last.y) as f32;
                match button {
                    MouseButton::Left => self.process_rotate(dx, dy),
                    _ => self.process_pan(dx, dy),
                }
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.process_scroll(delta);
                true
            }
            _ => false,
        }
    }

    /// Drops any motion still pending from earlier input.
    pub fn stop(&mut self) {
        self.rotate = Vector2::new(0.0, 0.0);
        self.pan = Vector2::new(0.0, 0.0);
        self.zoom = 0.0;
    }

    pub fn is_moving(&self) -> bool {
        self.rotate.magnitude2() > 1e-12 || self.pan.magnitude2() > 1e-12 || self.zoom.abs() > 1e-6
    }

    /// Applies a damped step of the pending motion to `camera`. Call once per frame.
    pub fn update_camera(&mut self, camera: &mut Camera) {
        let damping = self.config.damping_factor.clamp(0.0, 1.0);
        let rotate = self.rotate * damping;
        let pan = self.pan * damping;
        let zoom = self.zoom * damping;
        self.rotate -= rotate;
        self.pan -= pan;
        self.zoom -= zoom;

        let offset = camera.position - self.target;
        let mut radius = offset.magnitude();
        if radius <= f32::EPSILON {
            return;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta -= rotate.x;
        phi = (phi - rotate.y).clamp(0.0001, SAFE_FRAC_PI);

        radius = (radius * zoom.exp()).clamp(self.config.min_distance, self.config.max_distance);

        if pan.magnitude2() > 0.0 {
            let forward = (self.target - camera.position).normalize();
            let right = forward.cross(camera.up).normalize();
            let up = right.cross(forward);
            self.target += (right * -pan.x + up * pan.y) * radius;
        }

        let offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = self.target + offset;
        camera.target = self.target;
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new(ControlsConfig::default())
    }
}

/// Frames `object` so its bounding box fits the camera's vertical field of
/// view, with `offset` as the margin factor (`1.5` leaves 50 %).
///
/// The camera is placed on the +Z side of the box centre, aimed at it, and
/// the controls (if any) are re-targeted at the same centre. Returns the
/// camera distance, or `None` if the object has no extent.
pub fn fit_camera_to_object(
    camera: &mut Camera,
    controls: Option<&mut OrbitController>,
    object: &dyn SceneNode,
    offset: f32,
) -> Option<f32> {
    let bbox = object.bounding_box();
    let max_dim = bbox.max_dimension();
    if bbox.is_empty() || max_dim <= f32::EPSILON {
        log::warn!("Cannot fit camera to an object without extent");
        return None;
    }
    let center = bbox.center();
    let fov = Rad::from(camera.fovy).0;
    let distance = (max_dim / (fov / 2.0).tan()).abs() * offset;

    camera.position = Point3::new(center.x, center.y, center.z + distance);
    camera.znear = FIT_NEAR;
    camera.zfar = distance * FIT_FAR_FACTOR;
    camera.target = center;

    if let Some(controls) = controls {
        controls.target = center;
        controls.stop();
    }
    log::debug!(
        "Camera fitted: center=({:.2}, {:.2}, {:.2}), distance={:.2}",
        center.x,
        center.y,
        center.z,
        distance
    );
    Some(distance)
}
