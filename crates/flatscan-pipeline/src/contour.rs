//! Contour tracing on a binary edge map.
//!
//! Uses Moore-neighbour boundary following with Jacob's stopping
//! criterion. Each 8-connected component of strong pixels yields exactly
//! one contour: its outer boundary, starting from the component's first
//! pixel in row-major order.

use image::GrayImage;
use tracing::debug;

use crate::edge::{EDGE_STRONG, neighbors8};
use crate::types::{Contour, Point};

/// Moore neighbourhood offsets in clockwise screen order, starting west.
const MOORE: [(i64, i64); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

type Pos = (i64, i64);

/// Trace the outer boundary of every 8-connected edge component.
///
/// Contours are returned in discovery order (row-major position of each
/// component's first pixel). Contours with fewer than `min_len` points are
/// discarded.
#[must_use = "returns the traced contours"]
pub fn trace_contours(edges: &GrayImage, min_len: usize) -> Vec<Contour> {
    let (w, h) = edges.dimensions();
    let mut visited = vec![false; w as usize * h as usize];
    let idx = |x: u32, y: u32| y as usize * w as usize + x as usize;

    let mut contours = Vec::new();
    let mut discarded = 0usize;

    for y in 0..h {
        for x in 0..w {
            if visited[idx(x, y)] || edges.get_pixel(x, y).0[0] != EDGE_STRONG {
                continue;
            }

            let component = mark_component(edges, x, y, &mut visited);
            let points = moore_trace(edges, (i64::from(x), i64::from(y)), component);
            if points.len() >= min_len {
                contours.push(Contour::new(points));
            } else {
                discarded += 1;
            }
        }
    }

    debug!(
        contours = contours.len(),
        discarded, min_len, "traced contours"
    );
    contours
}

/// The contour with the most points. Ties go to the earlier contour.
#[must_use]
pub fn longest(contours: &[Contour]) -> Option<&Contour> {
    contours
        .iter()
        .fold(None, |best: Option<&Contour>, c| match best {
            Some(b) if b.len() >= c.len() => Some(b),
            _ => Some(c),
        })
}

/// Flood-mark the component containing `(x, y)` and return its size.
fn mark_component(edges: &GrayImage, x: u32, y: u32, visited: &mut [bool]) -> usize {
    let (w, h) = edges.dimensions();
    let idx = |x: u32, y: u32| y as usize * w as usize + x as usize;

    let mut stack = vec![(x, y)];
    visited[idx(x, y)] = true;
    let mut size = 0;

    while let Some((cx, cy)) = stack.pop() {
        size += 1;
        for (nx, ny) in neighbors8(cx, cy, w, h) {
            let i = idx(nx, ny);
            if !visited[i] && edges.get_pixel(nx, ny).0[0] == EDGE_STRONG {
                visited[i] = true;
                stack.push((nx, ny));
            }
        }
    }
    size
}

fn is_strong(edges: &GrayImage, (x, y): Pos) -> bool {
    let in_bounds =
        (0..i64::from(edges.width())).contains(&x) && (0..i64::from(edges.height())).contains(&y);
    // In bounds means both fit in u32.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let strong = in_bounds && edges.get_pixel(x as u32, y as u32).0[0] == EDGE_STRONG;
    strong
}

/// One Moore step: sweep clockwise around `cur` starting just after
/// `back`, returning the first strong neighbour and the background
/// position checked immediately before it.
fn moore_step(edges: &GrayImage, cur: Pos, back: Pos) -> Option<(Pos, Pos)> {
    let rel = (back.0 - cur.0, back.1 - cur.1);
    let start = MOORE.iter().position(|&o| o == rel)?;

    let mut prev = back;
    for i in 1..=8 {
        let (dx, dy) = MOORE[(start + i) % 8];
        let candidate = (cur.0 + dx, cur.1 + dy);
        if is_strong(edges, candidate) {
            return Some((candidate, prev));
        }
        prev = candidate;
    }
    None
}

/// Follow the outer boundary from `start`, whose west neighbour is known
/// to be background.
fn moore_trace(edges: &GrayImage, start: Pos, component_size: usize) -> Vec<Point> {
    // Each boundary pixel is entered at most four times.
    let cap = component_size.saturating_mul(4).saturating_add(8);

    let mut points = Vec::new();
    let mut cur = start;
    let mut back = (start.0 - 1, start.1);
    let mut first_move = None;

    for _ in 0..cap {
        let Some((next, next_back)) = moore_step(edges, cur, back) else {
            // Isolated pixel.
            points.push(to_point(cur));
            break;
        };

        if cur == start {
            match first_move {
                None => first_move = Some(next),
                Some(first) if first == next => break,
                Some(_) => {}
            }
        }

        points.push(to_point(cur));
        cur = next;
        back = next_back;
    }
    points
}

#[allow(clippy::cast_precision_loss)]
const fn to_point((x, y): Pos) -> Point {
    Point::new(x as f64, y as f64)
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn outline(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let on_border = (x == x0 || x == x1) && (y0..=y1).contains(&y)
                || (y == y0 || y == y1) && (x0..=x1).contains(&x);
            Luma([if on_border { EDGE_STRONG } else { 0 }])
        })
    }

    #[test]
    fn empty_image_produces_no_contours() {
        let edges = GrayImage::new(10, 10);
        assert!(trace_contours(&edges, 1).is_empty());
    }

    #[test]
    fn single_pixel_is_one_point_contour() {
        let mut edges = GrayImage::new(10, 10);
        edges.put_pixel(5, 5, Luma([EDGE_STRONG]));
        let contours = trace_contours(&edges, 1);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points(), &[Point::new(5.0, 5.0)]);
        assert!(trace_contours(&edges, 10).is_empty());
    }

    #[test]
    fn rectangle_outline_traces_every_border_pixel_once() {
        // 11x6 outline: perimeter 2*(10+5) = 30 pixels.
        let edges = outline(20, 20, 3, 4, 13, 9);
        let contours = trace_contours(&edges, 10);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.len(), 30);
        assert_eq!(c.points()[0], Point::new(3.0, 4.0));
        // Clockwise: the second point moves east along the top edge.
        assert_eq!(c.points()[1], Point::new(4.0, 4.0));
        for p in c.points() {
            assert_eq!(edges.get_pixel(p.x as u32, p.y as u32).0[0], EDGE_STRONG);
        }
    }

    #[test]
    fn consecutive_points_are_eight_adjacent() {
        let edges = outline(30, 30, 5, 5, 24, 20);
        let contours = trace_contours(&edges, 10);
        let pts = contours[0].points();
        for pair in pts.windows(2) {
            let dx = (pair[0].x - pair[1].x).abs();
            let dy = (pair[0].y - pair[1].y).abs();
            assert!(dx <= 1.0 && dy <= 1.0 && (dx + dy) > 0.0);
        }
        let (first, last) = (pts[0], pts[pts.len() - 1]);
        assert!((first.x - last.x).abs() <= 1.0 && (first.y - last.y).abs() <= 1.0);
    }

    #[test]
    fn thick_component_yields_one_outer_contour() {
        // Two nested outlines touching each other form one component.
        let mut edges = outline(30, 30, 5, 5, 24, 24);
        let inner = outline(30, 30, 6, 6, 23, 23);
        for (x, y, p) in inner.enumerate_pixels() {
            if p.0[0] == EDGE_STRONG {
                edges.put_pixel(x, y, *p);
            }
        }
        let contours = trace_contours(&edges, 10);
        assert_eq!(contours.len(), 1);
        // Outer boundary only: every point on the outer outline.
        for p in contours[0].points() {
            let (x, y) = (p.x as u32, p.y as u32);
            assert!(x == 5 || x == 24 || y == 5 || y == 24, "inner point {p:?}");
        }
    }

    #[test]
    fn open_line_is_walked_out_and_back() {
        let mut edges = GrayImage::new(20, 5);
        for x in 2..12 {
            edges.put_pixel(x, 2, Luma([EDGE_STRONG]));
        }
        let contours = trace_contours(&edges, 1);
        assert_eq!(contours.len(), 1);
        // 10 pixels out, 8 interior pixels back.
        assert_eq!(contours[0].len(), 18);
    }

    #[test]
    fn separate_components_are_separate_contours() {
        let mut edges = outline(40, 40, 2, 2, 12, 12);
        let other = outline(40, 40, 20, 20, 35, 35);
        for (x, y, p) in other.enumerate_pixels() {
            if p.0[0] == EDGE_STRONG {
                edges.put_pixel(x, y, *p);
            }
        }
        let contours = trace_contours(&edges, 10);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].len(), 40);
        assert_eq!(contours[1].len(), 60);
        assert_eq!(longest(&contours).map(Contour::len), Some(60));
    }

    #[test]
    fn longest_prefers_first_on_ties() {
        let a = Contour::new(vec![Point::new(0.0, 0.0); 3]);
        let b = Contour::new(vec![Point::new(1.0, 1.0); 3]);
        let contours = [a.clone(), b];
        assert_eq!(longest(&contours), Some(&a));
        assert_eq!(longest(&[]), None);
    }

    #[test]
    fn weak_pixels_are_ignored() {
        let mut edges = GrayImage::new(10, 10);
        for x in 1..9 {
            edges.put_pixel(x, 5, Luma([128]));
        }
        assert!(trace_contours(&edges, 1).is_empty());
    }
}
