//! Integer line rasterization.

/// Compute the Bresenham line between `s` and `t`, endpoints included.
///
/// The order of the returned cells follows the order of the arguments:
/// rasterizing `(t, s)` yields the reversed sequence. The line has
/// `max(|dx|, |dy|) + 1` cells.
pub fn bresenham(s: (i32, i32), t: (i32, i32)) -> Vec<(i32, i32)> {
    let (mut x0, mut y0, mut x1, mut y1) = (s.0, s.1, t.0, t.1);

    let steep = (y1 - y0).abs() > (x1 - x0).abs();
    if steep {
        std::mem::swap(&mut x0, &mut y0);
        std::mem::swap(&mut x1, &mut y1);
    }

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let mut error = dx / 2;
    let mut y = y0;
    let ystep = if y0 < y1 { 1 } else { -1 };

    let mut line = Vec::with_capacity(dx as usize + 1);
    let mut plot = |x: i32, y: i32| {
        if steep {
            line.push((y, x));
        } else {
            line.push((x, y));
        }
    };

    if x0 < x1 {
        // ascending
        for x in x0..=x1 {
            plot(x, y);
            error -= dy;
            if error < 0 {
                y += ystep;
                error += dx;
            }
        }
    } else {
        // descending
        for x in (x1..=x0).rev() {
            plot(x, y);
            error -= dy;
            if error < 0 {
                y += ystep;
                error += dx;
            }
        }
    }
    line
}
