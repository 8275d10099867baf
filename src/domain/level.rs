/// Static level geometry: walls, obstacles, doors and interactive-object
/// slots for the five shipped levels.
///
/// Geometry is authored in a 1920x1080 base space and scaled once at load.
/// Conventions carried over from the level data:
///   - every level has exactly six slots, each with one sticky note
///   - the LAST door in the door list is the exit door; it never teleports
///   - a door has two rects: the visual trigger area and the floor strip the
///     player must stand on to use it

use super::geom::Rect;

pub const BASE_WIDTH: i32 = 1920;
pub const BASE_HEIGHT: i32 = 1080;

/// Player sprite footprint in base space.
pub const PLAYER_WIDTH: i32 = 60;
pub const PLAYER_HEIGHT: i32 = 100;

/// Sticky-note footprint in base space.
pub const NOTE_WIDTH: i32 = 35;
pub const NOTE_HEIGHT: i32 = 34;

/// A note is interactable within this distance (base space) of the player.
pub const INTERACT_RADIUS: f32 = 130.0;

pub const SLOT_COUNT: usize = 6;

#[derive(Clone, Debug)]
pub struct Door {
    /// Visual door area; also the proximity zone for the exit interaction.
    pub trigger: Rect,
    /// Floor strip the player must overlap to use the door.
    pub floor: Rect,
    /// Where a teleporting door drops the player (top-left, scaled).
    pub dest: (i32, i32),
}

/// One of the six interactive objects of a level.
#[derive(Clone, Debug)]
pub struct Slot {
    /// 1-based slot index; questions are pooled per slot.
    pub index: usize,
    pub label: &'static str,
    pub object: Rect,
    /// The clickable sticky note attached to the object.
    pub note: Rect,
}

#[derive(Clone, Debug)]
pub struct LevelGeometry {
    pub level: u8,
    pub scale: f32,
    pub width: i32,
    pub height: i32,
    pub walls: Vec<Rect>,
    pub obstacles: Vec<Rect>,
    pub doors: Vec<Door>,
    pub slots: Vec<Slot>,
}

impl LevelGeometry {
    /// Load the geometry of `level` (1-5), scaled by `scale`.
    /// Unknown level numbers fall back to level 1, like the source data did.
    pub fn load(level: u8, scale: f32) -> Self {
        let data = match level {
            2 => &LEVEL2,
            3 => &LEVEL3,
            4 => &LEVEL4,
            5 => &LEVEL5,
            _ => &LEVEL1,
        };

        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(i, &(label, pos, size, note_off))| {
                let object = Rect::scaled((pos.0, pos.1, size.0, size.1), scale);
                let note = Rect::scaled(
                    (pos.0 + note_off.0, pos.1 + note_off.1, NOTE_WIDTH, NOTE_HEIGHT),
                    scale,
                );
                Slot { index: i + 1, label, object, note }
            })
            .collect();

        LevelGeometry {
            level,
            scale,
            width: (BASE_WIDTH as f32 * scale) as i32,
            height: (BASE_HEIGHT as f32 * scale) as i32,
            walls: data.walls.iter().map(|&r| Rect::scaled(r, scale)).collect(),
            obstacles: data.obstacles.iter().map(|&r| Rect::scaled(r, scale)).collect(),
            doors: data
                .doors
                .iter()
                .map(|&(trigger, floor, dest)| Door {
                    trigger: Rect::scaled(trigger, scale),
                    floor: Rect::scaled(floor, scale),
                    dest: (
                        (dest.0 as f32 * scale) as i32,
                        (dest.1 as f32 * scale) as i32,
                    ),
                })
                .collect(),
            slots,
        }
    }

    /// The exit door (always the last entry).
    pub fn exit_door(&self) -> &Door {
        self.doors.last().expect("level has at least the exit door")
    }

    /// Doors that teleport (all but the exit).
    pub fn teleport_doors(&self) -> &[Door] {
        &self.doors[..self.doors.len() - 1]
    }

    /// Interaction radius in scaled units.
    pub fn interact_radius(&self) -> f32 {
        INTERACT_RADIUS * self.scale
    }

    /// Player spawn: centered in the level, like the source.
    pub fn player_spawn(&self) -> Rect {
        let w = (PLAYER_WIDTH as f32 * self.scale) as i32;
        let h = (PLAYER_HEIGHT as f32 * self.scale) as i32;
        Rect::new((self.width - w) / 2, (self.height - h) / 2, w, h)
    }
}

// ── Static level tables (base space) ──

type RectSpec = (i32, i32, i32, i32);
type DoorSpec = (RectSpec, RectSpec, (i32, i32));
/// (label, pos, size, sticky-note offset from pos)
type SlotSpec = (&'static str, (i32, i32), (i32, i32), (i32, i32));

struct LevelData {
    walls: &'static [RectSpec],
    obstacles: &'static [RectSpec],
    doors: &'static [DoorSpec],
    slots: &'static [SlotSpec],
}

static LEVEL1: LevelData = LevelData {
    walls: &[
        (0, 378, 553, 90),    // room1 horizontal
        (553, 0, 19, 452),    // room1 vertical
        (1154, 0, 19, 676),   // room2 vertical
        (1176, 594, 748, 90), // room2 lower horizontal
        (1176, 0, 744, 142),  // room2 upper horizontal
        (0, 704, 574, 2),     // room3 horizontal
        (558, 759, 14, 328),  // room3 vertical
        (574, 108, 580, 90),  // room4
    ],
    obstacles: &[
        (968, 214, 118, 14),   // vending machine
        (1100, 653, 54, 20),   // bookshelf
        (1602, 702, 320, 20),  // lockers
        (836, 756, 107, 79),   // table & chairs (left)
        (968, 774, 40, 5),     // t&c (right)
        (1095, 922, 240, 11),  // t&c (room3 right)
        (257, 972, 259, 214),  // table and chair (room3 left)
        (0, 808, 168, 90),     // chair (room3 left)
        (1176, 706, 90, 8),    // plant
        (1423, 150, 24, 8),    // podium (room2)
        (1215, 163, 64, 20),   // drawers (left)
        (1793, 163, 64, 20),   // drawers (right)
        (1217, 324, 127, 130), // t&c1 (room2)
        (1471, 324, 127, 130), // t&c2 (room2)
        (1725, 324, 127, 130), // t&c3 (room2)
        (236, 0, 1, 382),      // t&c1 (room1)
        (326, 0, 1, 382),      // t&c2 (room1)
    ],
    doors: &[
        ((142, 436, 174, 149), (142, 558, 144, 38), (240, 254)),
        ((142, 436, 174, 149), (142, 315, 144, 58), (240, 474)),
        ((1420, 654, 176, 149), (1420, 770, 176, 38), (1450, 486)),
        ((1420, 654, 176, 149), (1420, 533, 176, 58), (1450, 692)),
        ((556, 920, 48, 123), (576, 920, 54, 125), (448, 864)),
        ((556, 920, 48, 125), (529, 920, 54, 125), (605, 864)),
        ((780, 160, 104, 133), (780, 292, 104, 38), (798, 0)), // exit
    ],
    slots: &[
        ("bag", (115, 29), (91, 59), (32, 68)),
        ("computer", (88, 788), (94, 77), (-8, 80)),
        ("pencil", (850, 776), (53, 43), (58, 12)),
        ("picture", (1218, 113), (59, 47), (76, 33)),
        ("plant", (1176, 707), (94, 95), (-8, -43)),
        ("shoes", (1390, 394), (90, 45), (100, -59)),
    ],
};

static LEVEL2: LevelData = LevelData {
    walls: &[
        (176, 324, 11, 68),    // stairs
        (190, 324, 1706, 42),  // lower floor wall
        (1473, 0, 448, 34),    // upper floor room
    ],
    obstacles: &[
        (256, 594, 352, 2),   // desk rows, column 1
        (256, 702, 352, 2),
        (256, 810, 352, 2),
        (256, 918, 352, 2),
        (768, 594, 352, 2),   // column 2
        (768, 702, 352, 2),
        (768, 810, 352, 2),
        (768, 918, 352, 2),
        (1280, 594, 352, 2),  // column 3
        (1280, 702, 352, 2),
        (1280, 810, 352, 2),
        (1280, 918, 352, 2),
        (1869, 592, 53, 34),  // bookshelf
        (1780, 368, 69, 20),  // drum
        (120, 55, 133, 10),   // piano
        (788, 135, 43, 10),   // mic
        (976, 176, 24, 8),    // podium
        (1510, 45, 48, 8),    // guitar
    ],
    doors: &[
        ((1407, 0, 150, 140), (1407, 140, 150, 40), (1450, 200)), // exit
    ],
    slots: &[
        ("basketball", (710, 822), (48, 41), (72, -2)),
        ("drum", (1780, 415), (69, 68), (15, -50)),
        ("guitar", (1510, 45), (48, 97), (-30, -30)),
        ("mic", (788, 135), (43, 97), (2, 30)),
        ("piano", (120, 56), (133, 97), (-10, 24)),
        ("racket", (1643, 888), (67, 54), (-61, 40)),
    ],
};

static LEVEL3: LevelData = LevelData {
    walls: &[
        (0, 594, 552, 89),    // room1 lower horizontal
        (0, 0, 552, 140),     // room1 upper horizontal
        (554, 0, 21, 683),    // room1 vertical
        (1345, 0, 21, 683),   // room2 vertical
        (1367, 594, 552, 89), // room2 lower horizontal
        (1367, 0, 552, 140),  // room3 upper horizontal
        (577, 0, 766, 120),   // room3
    ],
    obstacles: &[
        (577, 216, 59, 459),   // lockers & bookshelf (left)
        (1286, 216, 59, 461),  // lockers (right)
        (1346, 700, 122, 25),  // bookshelf (right)
        (85, 884, 50, 5),
        (128, 866, 128, 214),
        (256, 973, 65, 5),
        (450, 866, 256, 214),
        (1217, 973, 65, 5),
        (1282, 866, 128, 214),
        (1410, 884, 65, 5),
        (1600, 866, 193, 214),
        (1793, 884, 40, 5),
        (321, 162, 127, 20),   // lockers (room1)
        (1471, 162, 127, 20),  // lockers (room2)
        (64, 324, 126, 26),
        (320, 324, 126, 26),
        (64, 487, 126, 26),
        (320, 487, 126, 26),
        (1473, 324, 126, 26),
        (1729, 324, 126, 26),
        (1473, 487, 126, 26),
        (1729, 487, 126, 26),
    ],
    doors: &[
        ((73, 650, 183, 130), (73, 780, 183, 50), (220, 480)),
        ((73, 650, 183, 130), (73, 544, 183, 50), (110, 690)),
        ((1671, 650, 183, 130), (1671, 544, 183, 50), (1700, 690)),
        ((1671, 650, 183, 130), (1671, 780, 183, 50), (1650, 480)),
        ((840, 25, 230, 163), (840, 188, 230, 30), (1700, 690)), // exit
    ],
    slots: &[
        ("burger", (355, 482), (91, 59), (45, 48)),
        ("cake", (358, 132), (94, 77), (-23, 53)),
        ("chocolate", (1720, 880), (53, 43), (-40, 20)),
        ("donut", (137, 970), (59, 47), (8, -50)),
        ("drinks", (1771, 302), (94, 95), (37, 58)),
        ("taco", (1284, 975), (90, 45), (16, -55)),
    ],
};

static LEVEL4: LevelData = LevelData {
    walls: &[
        (680, 0, 22, 210),
        (232, 180, 471, 5),
        (232, 269, 22, 480),
        (232, 749, 1456, 139),
        (1664, 0, 24, 749),
    ],
    obstacles: &[
        (385, 269, 126, 20), // vending machine
        (384, 447, 64, 3),
        (384, 553, 64, 3),
        (577, 647, 62, 3),
    ],
    doors: &[
        ((520, 754, 110, 135), (520, 704, 170, 20), (535, 800)), // exit
    ],
    slots: &[
        ("bag", (515, 240), (91, 59), (32, 68)),
        ("ball", (260, 588), (94, 77), (-8, 80)),
        ("bat", (850, 690), (53, 43), (58, 12)),
        ("drink", (1218, 113), (59, 47), (76, 33)),
        ("gloves", (1176, 640), (94, 95), (-8, -43)),
        ("shoes", (1390, 394), (90, 45), (100, -59)),
    ],
};

static LEVEL5: LevelData = LevelData {
    walls: &[
        (64, 163, 575, 10),   // fence
        (64, 1024, 575, 10),
        (1215, 1024, 575, 10),
        (1665, 0, 585, 140),  // room
    ],
    obstacles: &[
        (1599, 109, 65, 20), // vending machine
    ],
    doors: &[
        ((1735, 107, 111, 134), (1735, 241, 111, 30), (535, 800)), // exit
    ],
    slots: &[
        ("bag", (514, 224), (91, 59), (64, -14)),
        ("ball", (1110, 631), (94, 77), (-40, 39)),
        ("bush", (662, 990), (53, 43), (178, 10)),
        ("cone", (1830, 856), (59, 47), (-45, 4)),
        ("gloves", (328, 735), (94, 95), (-42, 35)),
        ("rock", (1063, 125), (90, 45), (97, 6)),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_has_six_slots_and_an_exit() {
        for n in 1..=5u8 {
            let geo = LevelGeometry::load(n, 1.0);
            assert_eq!(geo.slots.len(), SLOT_COUNT, "level {n}");
            assert!(!geo.doors.is_empty(), "level {n}");
            assert_eq!(geo.teleport_doors().len(), geo.doors.len() - 1);
        }
    }

    #[test]
    fn slot_indices_are_one_through_six() {
        let geo = LevelGeometry::load(1, 1.0);
        let indices: Vec<usize> = geo.slots.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn unknown_level_falls_back_to_level_one() {
        let a = LevelGeometry::load(1, 0.75);
        let b = LevelGeometry::load(99, 0.75);
        assert_eq!(a.walls.len(), b.walls.len());
        assert_eq!(a.slots[0].label, b.slots[0].label);
    }

    #[test]
    fn geometry_scales_uniformly() {
        let geo = LevelGeometry::load(1, 0.5);
        assert_eq!(geo.width, BASE_WIDTH / 2);
        assert_eq!(geo.height, BASE_HEIGHT / 2);
        // first wall of level 1: (0, 378, 553, 90)
        assert_eq!(geo.walls[0], Rect::new(0, 189, 276, 45));
    }

    #[test]
    fn note_rect_offset_from_object() {
        let geo = LevelGeometry::load(1, 1.0);
        let bag = &geo.slots[0]; // (115, 29) + offset (32, 68)
        assert_eq!(bag.note.x, 147);
        assert_eq!(bag.note.y, 97);
        assert_eq!(bag.note.w, NOTE_WIDTH);
    }

    #[test]
    fn spawn_is_centered_and_inside_bounds() {
        let geo = LevelGeometry::load(3, 0.75);
        let spawn = geo.player_spawn();
        assert!(spawn.x > 0 && spawn.right() < geo.width);
        assert!(spawn.y > 0 && spawn.bottom() < geo.height);
    }
}
