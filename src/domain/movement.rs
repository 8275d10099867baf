/// Movement resolution against static geometry.
///
/// The two axes are resolved independently so the player can slide along a
/// wall while holding a diagonal: a blocked X step does not cancel the Y
/// step. Doors never block movement; door traversal is proximity + command,
/// handled by the caller via `door_at`.

use super::geom::Rect;
use super::level::{Door, LevelGeometry};

/// Does `rect` intersect any wall or obstacle?
pub fn blocked(geo: &LevelGeometry, rect: &Rect) -> bool {
    geo.walls.iter().any(|w| rect.intersects(w))
        || geo.obstacles.iter().any(|o| rect.intersects(o))
}

/// Apply a movement request, axis by axis, and clamp to level bounds.
/// Returns the new position (the old one if fully blocked).
pub fn try_move(geo: &LevelGeometry, rect: Rect, dx: i32, dy: i32) -> Rect {
    let mut out = rect;

    if dx != 0 {
        let candidate = out.translated(dx, 0);
        if !blocked(geo, &candidate) {
            out = candidate;
        }
    }
    if dy != 0 {
        let candidate = out.translated(0, dy);
        if !blocked(geo, &candidate) {
            out = candidate;
        }
    }

    out.clamped(geo.width, geo.height)
}

/// The teleporting door whose floor strip the player is standing on, if any.
/// The exit door is excluded; it has its own interaction path.
pub fn door_at<'a>(geo: &'a LevelGeometry, player: &Rect) -> Option<&'a Door> {
    geo.teleport_doors().iter().find(|d| player.intersects(&d.floor))
}

/// Is the player close enough to the exit door to interact with it?
pub fn at_exit_door(geo: &LevelGeometry, player: &Rect) -> bool {
    let exit = geo.exit_door();
    player.intersects(&exit.trigger)
        || player.intersects(&exit.floor)
        || player.center_distance(&exit.trigger) <= geo.interact_radius()
}
