use crate::types::{BodyPart, DetectedPerson, Frame};

/// Limbs of the COCO model as (from, to) body-part indices. The last two
/// (shoulder to ear) feed the decoder but are not drawn.
pub const COCO_PAIRS: [(usize, usize); 19] = [
    (1, 2),
    (1, 5),
    (2, 3),
    (3, 4),
    (5, 6),
    (6, 7),
    (1, 8),
    (8, 9),
    (9, 10),
    (1, 11),
    (11, 12),
    (12, 13),
    (1, 0),
    (0, 14),
    (14, 16),
    (0, 15),
    (15, 17),
    (2, 16),
    (5, 17),
];

pub const RENDERED_PAIRS: usize = 17;

/// One colour per body part 0..=17, RGB.
pub const COCO_COLORS: [[u8; 3]; 18] = [
    [255, 0, 0],
    [255, 85, 0],
    [255, 170, 0],
    [255, 255, 0],
    [170, 255, 0],
    [85, 255, 0],
    [0, 255, 0],
    [0, 255, 85],
    [0, 255, 170],
    [0, 255, 255],
    [0, 170, 255],
    [0, 85, 255],
    [0, 0, 255],
    [85, 0, 255],
    [170, 0, 255],
    [255, 0, 255],
    [255, 0, 170],
    [255, 0, 85],
];

pub const LIMB_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 3;

/// Draw every person's joints and limbs onto `frame` in place.
pub fn draw_humans(frame: &mut Frame, persons: &[DetectedPerson]) {
    let (width, height) = (frame.width, frame.height);
    for person in persons.iter().filter(|p| !p.is_empty()) {
        for (part, kp) in person.parts() {
            let Some(color) = COCO_COLORS.get(part.index()) else {
                continue;
            };
            draw_circle(
                &mut frame.rgba,
                width,
                height,
                kp.to_pixel(width, height),
                JOINT_RADIUS,
                rgba(*color),
            );
        }

        for (pair_idx, &(a, b)) in COCO_PAIRS.iter().take(RENDERED_PAIRS).enumerate() {
            let endpoints = BodyPart::from_index(a)
                .and_then(|pa| person.get(pa))
                .zip(BodyPart::from_index(b).and_then(|pb| person.get(pb)));
            if let Some((ka, kb)) = endpoints {
                draw_line(
                    &mut frame.rgba,
                    width,
                    height,
                    ka.to_pixel(width, height),
                    kb.to_pixel(width, height),
                    rgba(COCO_COLORS[pair_idx]),
                    LIMB_THICKNESS,
                );
            }
        }
    }
}

fn rgba([r, g, b]: [u8; 3]) -> [u8; 4] {
    [r, g, b, 255]
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    (mut x0, mut y0): (i32, i32),
    (x1, y1): (i32, i32),
    color: [u8; 4],
    thickness: i32,
) {
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    put_pixel_safe(buffer, width, height, x0 + ox, y0 + oy, color);
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = ((uy * width + ux) as usize) * 4;
    if idx + 3 < buffer.len() {
        buffer[idx..idx + 4].copy_from_slice(&color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Keypoint;

    fn blank(width: u32, height: u32) -> Frame {
        Frame::new(vec![0; Frame::expected_len(width, height)], width, height)
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * frame.width + x) as usize) * 4;
        [
            frame.rgba[idx],
            frame.rgba[idx + 1],
            frame.rgba[idx + 2],
            frame.rgba[idx + 3],
        ]
    }

    #[test]
    fn draws_limb_between_neck_and_right_shoulder() {
        let mut frame = blank(40, 40);
        let person = DetectedPerson::new()
            .with_part(BodyPart::Neck, Keypoint::new(0.25, 0.5, 1.0))
            .with_part(BodyPart::RShoulder, Keypoint::new(0.75, 0.5, 1.0));
        draw_humans(&mut frame, &[person]);

        // Midpoint of the limb carries the colour of pair 0.
        assert_eq!(pixel(&frame, 20, 20), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 20, 5), [0, 0, 0, 0]);
    }

    #[test]
    fn lone_joint_draws_only_a_dot() {
        let mut frame = blank(20, 20);
        let person = DetectedPerson::new().with_part(BodyPart::Nose, Keypoint::new(0.25, 0.25, 1.0));
        draw_humans(&mut frame, &[person]);

        assert_eq!(pixel(&frame, 5, 5), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 15, 15), [0, 0, 0, 0]);
    }

    #[test]
    fn points_outside_the_frame_are_clipped() {
        let mut frame = blank(10, 10);
        let person = DetectedPerson::new()
            .with_part(BodyPart::Neck, Keypoint::new(-5.0, -5.0, 1.0))
            .with_part(BodyPart::RShoulder, Keypoint::new(50.0, 50.0, 1.0));
        draw_humans(&mut frame, &[person]);
        assert_eq!(frame.rgba.len(), Frame::expected_len(10, 10));
    }

    #[test]
    fn shoulder_to_ear_pairs_are_not_rendered() {
        let mut frame = blank(40, 40);
        let person = DetectedPerson::new()
            .with_part(BodyPart::RShoulder, Keypoint::new(0.125, 0.75, 1.0))
            .with_part(BodyPart::REar, Keypoint::new(0.875, 0.75, 1.0));
        draw_humans(&mut frame, &[person]);
        assert_eq!(pixel(&frame, 20, 30), [0, 0, 0, 0]);
    }
}
