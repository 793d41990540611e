//! Local movement and the outbound position report policy
//!
//! Movement is a fixed step per frame per held direction on the horizontal
//! plane. Reports go out only when the position moved past the epsilon since
//! the last report, so idle frames cost no bandwidth.

use crate::input::{Direction, PressedKeys};
use shared::{encode_position, Position, SPAWN_POSITION};

#[derive(Debug, Clone)]
pub struct MovementReporter {
    step: f32,
    epsilon: f32,
    position: Position,
    /// Movement made before the local entity was bound
    pending_offset: Position,
    last_reported: Option<Position>,
    bound: bool,
}

impl MovementReporter {
    pub fn new(step: f32, epsilon: f32) -> Self {
        Self {
            step,
            epsilon,
            position: SPAWN_POSITION,
            pending_offset: Position::default(),
            last_reported: None,
            bound: false,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn pending_offset(&self) -> Position {
        self.pending_offset
    }

    pub fn last_reported(&self) -> Option<Position> {
        self.last_reported
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Additive horizontal delta; opposite keys cancel, diagonals are not normalized
    pub fn movement_delta(&self, keys: &PressedKeys) -> Position {
        let mut delta = Position::default();
        if keys.is_pressed(Direction::Up) {
            delta.z -= self.step;
        }
        if keys.is_pressed(Direction::Down) {
            delta.z += self.step;
        }
        if keys.is_pressed(Direction::Left) {
            delta.x -= self.step;
        }
        if keys.is_pressed(Direction::Right) {
            delta.x += self.step;
        }
        delta
    }

    /// The forced report sent once when the local id is first learned
    pub fn initial_report(&mut self) -> String {
        self.last_reported = Some(SPAWN_POSITION);
        encode_position(&SPAWN_POSITION)
    }

    /// Attaches to the local entity the server placed at `server_position`.
    /// Returns where the entity should be drawn.
    pub fn bind(&mut self, server_position: Position) -> Position {
        self.position = server_position + std::mem::take(&mut self.pending_offset);
        self.last_reported = Some(server_position);
        self.bound = true;
        self.position
    }

    pub fn unbind(&mut self) {
        self.bound = false;
    }

    /// Applies one frame of input, returning a report when one is due
    pub fn advance(&mut self, keys: &PressedKeys) -> Option<String> {
        let delta = self.movement_delta(keys);

        if !self.bound {
            self.pending_offset = self.pending_offset + delta;
            return None;
        }

        self.position = self.position + delta;

        let due = match self.last_reported {
            Some(last) => self.position.differs_from(&last, self.epsilon),
            None => true,
        };
        if !due {
            return None;
        }

        self.last_reported = Some(self.position);
        Some(encode_position(&self.position))
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.step, self.epsilon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{MOVE_SPEED, REPORT_EPSILON};

    fn bound_reporter() -> MovementReporter {
        let mut reporter = MovementReporter::new(MOVE_SPEED, REPORT_EPSILON);
        reporter.bind(SPAWN_POSITION);
        reporter
    }

    #[test]
    fn test_movement_delta_directions() {
        let reporter = MovementReporter::new(MOVE_SPEED, REPORT_EPSILON);

        let up = reporter.movement_delta(&PressedKeys::none().with(Direction::Up));
        assert_approx_eq!(up.z, -MOVE_SPEED);
        assert_eq!(up.x, 0.0);

        let diagonal = reporter.movement_delta(
            &PressedKeys::none()
                .with(Direction::Down)
                .with(Direction::Right),
        );
        assert_approx_eq!(diagonal.x, MOVE_SPEED);
        assert_approx_eq!(diagonal.z, MOVE_SPEED);
        assert_eq!(diagonal.y, 0.0);

        let cancelled = reporter.movement_delta(
            &PressedKeys::none()
                .with(Direction::Left)
                .with(Direction::Right),
        );
        assert_eq!(cancelled, Position::default());
    }

    #[test]
    fn test_initial_report_is_spawn() {
        let mut reporter = MovementReporter::new(MOVE_SPEED, REPORT_EPSILON);
        assert_eq!(reporter.initial_report(), "POS:0.00,0.50,0.00");
        assert_eq!(reporter.last_reported(), Some(SPAWN_POSITION));
    }

    #[test]
    fn test_unbound_accumulates_without_reporting() {
        let mut reporter = MovementReporter::new(MOVE_SPEED, REPORT_EPSILON);
        let right = PressedKeys::none().with(Direction::Right);

        assert!(reporter.advance(&right).is_none());
        assert!(reporter.advance(&right).is_none());
        assert_approx_eq!(reporter.pending_offset().x, 2.0 * MOVE_SPEED);

        let placed = reporter.bind(Position::new(1.0, 0.5, 0.0));
        assert_approx_eq!(placed.x, 1.0 + 2.0 * MOVE_SPEED);
        assert_eq!(reporter.pending_offset(), Position::default());
        assert_eq!(reporter.last_reported(), Some(Position::new(1.0, 0.5, 0.0)));

        // The carried-over offset is reported on the next frame
        assert!(reporter.advance(&PressedKeys::none()).is_some());
    }

    #[test]
    fn test_bound_movement_reports() {
        let mut reporter = bound_reporter();

        let report = reporter.advance(&PressedKeys::none().with(Direction::Left));

        assert_eq!(report.as_deref(), Some("POS:-0.10,0.50,0.00"));
        assert_approx_eq!(reporter.position().x, -MOVE_SPEED);
    }

    #[test]
    fn test_idle_frames_do_not_report() {
        let mut reporter = bound_reporter();
        for _ in 0..10 {
            assert!(reporter.advance(&PressedKeys::none()).is_none());
        }
    }

    #[test]
    fn test_sub_epsilon_change_does_not_report() {
        let mut reporter = MovementReporter::new(REPORT_EPSILON / 4.0, REPORT_EPSILON);
        reporter.bind(SPAWN_POSITION);

        let right = PressedKeys::none().with(Direction::Right);
        assert!(reporter.advance(&right).is_none());
        assert!(reporter.advance(&right).is_none());
        assert!(reporter.advance(&right).is_none());
    }

    #[test]
    fn test_reset_returns_to_spawn() {
        let mut reporter = bound_reporter();
        reporter.advance(&PressedKeys::none().with(Direction::Up));
        reporter.reset();

        assert!(!reporter.is_bound());
        assert_eq!(reporter.position(), SPAWN_POSITION);
        assert!(reporter.last_reported().is_none());
    }
}
