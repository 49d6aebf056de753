use super::*;

fn pen(size: f64, color: &str) -> DrawingPen {
    DrawingPen { size, color: color.to_owned() }
}

#[test]
fn new_board_is_blank_without_markers() {
    let board = Board::new(32, 16);
    let bmp = board.snapshot();
    assert_eq!((bmp.width(), bmp.height()), (32, 16));
    assert!(bmp.is_blank());
    assert_eq!(board.marker_count(), 0);
}

#[test]
fn zero_sized_board_is_clamped() {
    let board = Board::new(0, 0);
    let bmp = board.snapshot();
    assert_eq!((bmp.width(), bmp.height()), (1, 1));
}

#[test]
fn default_pen_draws_black() {
    let board = Board::new(20, 20);
    board.draw_segment(Point::new(2.0, 10.0), Point::new(18.0, 10.0));
    assert_eq!(board.snapshot().pixel(10, 10), Some(Rgba::BLACK));
}

#[test]
fn pen_change_only_affects_later_segments() {
    let board = Board::new(40, 40);
    board.set_pen(&pen(2.0, "#ff0000"));
    board.draw_segment(Point::new(0.0, 5.0), Point::new(40.0, 5.0));
    let before = board.snapshot();

    board.set_pen(&pen(8.0, "#0000ff"));
    board.draw_segment(Point::new(0.0, 30.0), Point::new(40.0, 30.0));
    let after = board.snapshot();

    // First stroke untouched.
    for x in 0..40 {
        for y in 0..15 {
            assert_eq!(after.pixel(x, y), before.pixel(x, y), "pixel ({x},{y}) changed");
        }
    }
    assert_eq!(after.pixel(20, 5), Some(Rgba([255, 0, 0, 255])));
    assert_eq!(after.pixel(20, 27), Some(Rgba([0, 0, 255, 255])));
}

#[test]
fn invalid_pen_color_keeps_previous_color() {
    let board = Board::new(20, 20);
    board.set_pen(&pen(4.0, "#00ff00"));
    board.set_pen(&pen(4.0, "not-a-color"));
    board.draw_segment(Point::new(0.0, 10.0), Point::new(20.0, 10.0));
    assert_eq!(board.snapshot().pixel(10, 10), Some(Rgba([0, 255, 0, 255])));
}

#[test]
fn non_positive_pen_size_is_ignored() {
    let board = Board::new(20, 20);
    board.set_pen(&pen(6.0, "#000000"));
    board.set_pen(&pen(0.0, "#000000"));
    board.draw_segment(Point::new(0.0, 10.0), Point::new(20.0, 10.0));
    assert_eq!(board.snapshot().pixel(10, 8), Some(Rgba::BLACK), "width 6 still in effect");
}

#[test]
fn restore_replaces_surface() {
    let board = Board::new(10, 10);
    board.draw_segment(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
    board.restore(&Bitmap::new(10, 10));
    assert!(board.snapshot().is_blank());
}

#[test]
fn markers_upsert_move_and_clear() {
    let board = Board::new(10, 10);
    let peer = Uuid::new_v4();

    assert!(!board.move_marker(peer, Point::new(1.0, 1.0)), "no marker yet");
    board.upsert_marker(peer, Point::new(3.0, 4.0), Some("#123456"));
    assert!(board.has_marker(peer));

    assert!(board.move_marker(peer, Point::new(7.0, 8.0)));
    let marker = board.marker(peer).expect("marker");
    assert_eq!(marker.position, Point::new(7.0, 8.0));
    assert_eq!(marker.color.as_deref(), Some("#123456"), "move keeps color");

    board.clear_markers();
    assert!(!board.has_marker(peer));
}

#[test]
fn marker_glyph_is_fixed_size_and_tinted() {
    let board = Board::new(10, 10);
    let tinted = Uuid::new_v4();
    let plain = Uuid::new_v4();
    board.upsert_marker(tinted, Point::new(0.0, 0.0), Some("#abcdef"));
    board.upsert_marker(plain, Point::new(0.0, 0.0), None);

    let marker = board.marker(tinted).expect("marker");
    assert_eq!(marker.size_px, 16);
    assert!(marker.svg().contains(r##"fill="#abcdef""##));
    assert_eq!(board.marker(plain).expect("marker").svg(), CURSOR_GLYPH_SVG);
}
