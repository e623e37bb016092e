//! Integer line rasterization for line-of-sight tests.

use evasion_types::Position;

/// Cells on the Bresenham line from `from` to `to`, both endpoints included.
///
/// Coordinates too large for signed arithmetic produce an empty line.
pub fn bresenham(from: Position, to: Position) -> Vec<Position> {
    let (Some(mut x), Some(mut y), Some(x1), Some(y1)) = (
        to_signed(from.row),
        to_signed(from.col),
        to_signed(to.row),
        to_signed(to.col),
    ) else {
        return Vec::new();
    };

    let dx = x1.saturating_sub(x).saturating_abs();
    let dy = y1.saturating_sub(y).saturating_abs();
    let sx: i64 = if x < x1 { 1 } else { -1 };
    let sy: i64 = if y < y1 { 1 } else { -1 };
    let mut err = dx.saturating_sub(dy);

    let capacity = usize::try_from(dx.max(dy).saturating_add(1)).unwrap_or(0);
    let mut points = Vec::with_capacity(capacity);
    loop {
        if let (Ok(row), Ok(col)) = (usize::try_from(x), usize::try_from(y)) {
            points.push(Position::new(row, col));
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = err.saturating_mul(2);
        if e2 > dy.saturating_neg() {
            err = err.saturating_sub(dy);
            x = x.saturating_add(sx);
        }
        if e2 < dx {
            err = err.saturating_add(dx);
            y = y.saturating_add(sy);
        }
    }
    points
}

/// The cells strictly between the endpoints of the line.
pub fn between(from: Position, to: Position) -> Vec<Position> {
    let line = bresenham(from, to);
    let inner = line.len().saturating_sub(2);
    line.into_iter().skip(1).take(inner).collect()
}

fn to_signed(value: usize) -> Option<i64> {
    i64::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_line_includes_endpoints() {
        let line = bresenham(Position::new(2, 1), Position::new(2, 4));
        assert_eq!(
            line,
            vec![
                Position::new(2, 1),
                Position::new(2, 2),
                Position::new(2, 3),
                Position::new(2, 4),
            ]
        );
    }

    #[test]
    fn diagonal_line() {
        let line = bresenham(Position::new(3, 3), Position::new(0, 0));
        assert_eq!(line.len(), 4);
        assert_eq!(line.first(), Some(&Position::new(3, 3)));
        assert_eq!(line.last(), Some(&Position::new(0, 0)));
        assert!(line.contains(&Position::new(1, 1)));
    }

    #[test]
    fn single_point_line() {
        let p = Position::new(4, 4);
        assert_eq!(bresenham(p, p), vec![p]);
        assert!(between(p, p).is_empty());
    }

    #[test]
    fn adjacent_cells_have_nothing_between() {
        assert!(between(Position::new(1, 1), Position::new(1, 2)).is_empty());
    }

    #[test]
    fn between_strips_endpoints() {
        let mid = between(Position::new(0, 0), Position::new(0, 3));
        assert_eq!(mid, vec![Position::new(0, 1), Position::new(0, 2)]);
    }

    #[test]
    fn steep_line_is_continuous() {
        let line = bresenham(Position::new(0, 0), Position::new(5, 2));
        for pair in line.windows(2) {
            if let [a, b] = pair {
                assert!(a.row.abs_diff(b.row) <= 1 && a.col.abs_diff(b.col) <= 1);
            }
        }
        assert_eq!(line.len(), 6);
    }
}
