use macroquad::prelude as mq;
use shared::{Color, Position, UserId};
use std::collections::HashMap;

const FLOOR_SIZE: f32 = 20.0;
const CUBE_SIZE: f32 = 1.0;

/// Opaque reference to a visual owned by a [`RenderSink`]
///
/// Not `Clone`: a handle is released by moving it back into
/// [`RenderSink::remove_entity_visual`], so it can only be released once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct VisualHandle(u64);

impl VisualHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The only calls the sync engine makes into the scene
pub trait RenderSink {
    fn create_entity_visual(&mut self, id: &UserId, color: Color) -> VisualHandle;
    fn set_position(&mut self, handle: &VisualHandle, position: Position);
    fn remove_entity_visual(&mut self, handle: VisualHandle);
}

#[derive(Debug, Clone)]
pub struct HudConfig {
    pub local_id: Option<UserId>,
    pub connected: bool,
    pub entity_count: usize,
    pub fake_ping_ms: u64,
    pub visible: bool,
}

#[derive(Debug, Clone)]
struct Visual {
    id: UserId,
    color: mq::Color,
    position: mq::Vec3,
}

/// macroquad scene: one cube per entity on a flat floor
pub struct Renderer {
    visuals: HashMap<u64, Visual>,
    next_handle: u64,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            visuals: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn visual_count(&self) -> usize {
        self.visuals.len()
    }

    pub fn render(&self, hud: &HudConfig) {
        mq::clear_background(mq::Color::from_rgba(26, 26, 26, 255));

        mq::set_camera(&mq::Camera3D {
            position: mq::vec3(0.0, 2.0, 8.0),
            up: mq::vec3(0.0, 1.0, 0.0),
            target: mq::vec3(0.0, 0.0, 0.0),
            fovy: 75.0_f32.to_radians(),
            ..Default::default()
        });

        self.draw_floor();

        for visual in self.visuals.values() {
            let is_local = hud.local_id.as_ref() == Some(&visual.id);
            self.draw_cube(visual, is_local);
        }

        mq::set_default_camera();

        if hud.visible {
            self.draw_hud(hud);
        }
    }

    fn draw_floor(&self) {
        mq::draw_plane(
            mq::vec3(0.0, 0.0, 0.0),
            mq::vec2(FLOOR_SIZE / 2.0, FLOOR_SIZE / 2.0),
            None,
            mq::Color::from_rgba(153, 153, 153, 255),
        );
    }

    fn draw_cube(&self, visual: &Visual, is_local: bool) {
        let size = mq::vec3(CUBE_SIZE, CUBE_SIZE, CUBE_SIZE);
        mq::draw_cube(visual.position, size, None, visual.color);

        let outline = if is_local { mq::WHITE } else { mq::BLACK };
        mq::draw_cube_wires(visual.position, size, outline);
    }

    fn draw_hud(&self, hud: &HudConfig) {
        let connection_color = if hud.connected { mq::GREEN } else { mq::RED };
        mq::draw_rectangle(10.0, 10.0, 8.0, 8.0, connection_color);
        mq::draw_text("CON", 22.0, 18.0, 16.0, mq::WHITE);

        let id_text = match &hud.local_id {
            Some(id) => format!("id {}", id),
            None => "waiting for id".to_string(),
        };
        mq::draw_text(&id_text, 10.0, 36.0, 16.0, mq::WHITE);

        let player_text = format!("{} players", hud.entity_count);
        mq::draw_text(&player_text, 10.0, 54.0, 16.0, mq::WHITE);

        if hud.fake_ping_ms > 0 {
            let ping_text = format!("+{}ms simulated", hud.fake_ping_ms);
            mq::draw_text(&ping_text, 10.0, 72.0, 16.0, mq::YELLOW);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for Renderer {
    fn create_entity_visual(&mut self, id: &UserId, color: Color) -> VisualHandle {
        let handle = self.next_handle;
        self.next_handle += 1;

        let (r, g, b) = color.channels();
        self.visuals.insert(
            handle,
            Visual {
                id: id.clone(),
                color: mq::Color::from_rgba(r, g, b, 255),
                position: mq::Vec3::ZERO,
            },
        );

        VisualHandle::new(handle)
    }

    fn set_position(&mut self, handle: &VisualHandle, position: Position) {
        if let Some(visual) = self.visuals.get_mut(&handle.raw()) {
            visual.position = mq::vec3(position.x, position.y, position.z);
        }
    }

    fn remove_entity_visual(&mut self, handle: VisualHandle) {
        self.visuals.remove(&handle.raw());
    }
}
