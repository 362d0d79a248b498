use super::*;
use crate::canvas::{MaskCanvas, MaskStyle};
use crate::ops::compositor::BoxSelection;
use crate::ops::transform::ImagePos;

fn canvas() -> MaskCanvas {
    MaskCanvas::new(256, 256)
}

/// Paint a distinct 8-pixel-tall band for step `i` and return the snapshot.
fn paint_step(canvas: &mut MaskCanvas, i: usize) -> MaskSnapshot {
    let y = (i * 8) as f64;
    let b = BoxSelection::from_corners(ImagePos::new(0.0, y), ImagePos::new(256.0, y + 8.0));
    canvas.paint_box(&b, MaskStyle::default());
    canvas.snapshot()
}

fn assert_flags(h: &HistoryManager) {
    assert_eq!(h.can_undo(), h.current_index() > 0);
    assert_eq!(h.can_redo(), h.current_index() + 1 < h.len());
}

#[test]
fn initial_state_has_one_entry() {
    let mut h = HistoryManager::default();
    h.reset(canvas().snapshot(), ToolMode::Move);
    assert_eq!(h.len(), 1);
    assert_eq!(h.current_index(), 0);
    assert!(!h.can_undo());
    assert!(!h.can_redo());
    assert!(h.undo().is_none());
    assert!(h.redo().is_none());
}

#[test]
fn flags_track_index_through_undo_redo() {
    let mut c = canvas();
    let mut h = HistoryManager::default();
    h.reset(c.snapshot(), ToolMode::MaskBox);
    for i in 0..5 {
        h.commit(paint_step(&mut c, i), ToolMode::MaskBox);
        assert_flags(&h);
    }
    assert_eq!(h.current_index(), 5);
    for _ in 0..3 {
        assert!(h.undo().is_some());
        assert_flags(&h);
    }
    assert_eq!(h.current_index(), 2);
    for _ in 0..2 {
        assert!(h.redo().is_some());
        assert_flags(&h);
    }
    assert_eq!(h.current_index(), 4);
    assert!(h.can_redo());
}

#[test]
fn commit_after_undo_discards_branch() {
    let mut c = canvas();
    let mut h = HistoryManager::default();
    h.reset(c.snapshot(), ToolMode::MaskBox);
    for i in 0..4 {
        h.commit(paint_step(&mut c, i), ToolMode::MaskBox);
    }
    h.undo();
    h.undo();
    assert!(h.can_redo());
    h.commit(paint_step(&mut c, 10), ToolMode::EraserBox);
    assert!(!h.can_redo());
    assert_eq!(h.len(), 4);
    assert_eq!(h.current_index(), 3);
    assert_eq!(h.current().map(|e| e.tool), Some(ToolMode::EraserBox));
}

#[test]
fn undo_returns_the_previous_snapshot() {
    let mut c = canvas();
    let mut h = HistoryManager::default();
    h.reset(c.snapshot(), ToolMode::Move);
    h.commit(paint_step(&mut c, 0), ToolMode::MaskBox);
    let snap = h.undo().cloned().unwrap();
    c.restore(&snap, MaskStyle::default());
    assert!(c.mask().is_blank());
}

#[test]
fn count_limit_drops_oldest() {
    let mut c = canvas();
    let mut h = HistoryManager::new(3, None);
    h.reset(c.snapshot(), ToolMode::Move);
    for i in 0..10 {
        h.commit(paint_step(&mut c, i), ToolMode::MaskFreehand);
    }
    assert_eq!(h.len(), 4);
    assert_eq!(h.current_index(), 3);
    assert_flags(&h);
    for _ in 0..3 {
        assert!(h.undo().is_some());
    }
    assert!(!h.can_undo());
}

#[test]
fn memory_cap_never_drops_current_entry() {
    let mut c = canvas();
    let mut h = HistoryManager::new(100, Some(1));
    h.reset(c.snapshot(), ToolMode::Move);
    for i in 0..6 {
        h.commit(paint_step(&mut c, i), ToolMode::MaskBox);
        assert_eq!(h.len(), 1);
        assert_eq!(h.current_index(), 0);
    }
    assert!(!h.can_undo());
}

#[test]
fn memory_counts_only_unshared_chunks() {
    let mut c = canvas();
    let mut h = HistoryManager::new(100, None);
    h.reset(c.snapshot(), ToolMode::Move);
    assert_eq!(h.memory_usage(), 0);
    // Band 0 lives in the top chunk row: 4 chunks across a 256-wide image.
    h.commit(paint_step(&mut c, 0), ToolMode::MaskBox);
    assert_eq!(h.memory_usage(), 4 * 64 * 64 * 4);
}

#[test]
fn jump_to_any_entry() {
    let mut c = canvas();
    let mut h = HistoryManager::default();
    h.reset(c.snapshot(), ToolMode::Move);
    h.commit(paint_step(&mut c, 0), ToolMode::MaskBox);
    h.commit(paint_step(&mut c, 1), ToolMode::MaskPolygon);
    assert_eq!(h.undo_history(), vec!["Move", "Box", "Polygon"]);

    assert!(h.jump_to(0).is_some());
    assert!(!h.can_undo() && h.can_redo());
    assert!(h.jump_to(0).is_none());
    assert!(h.jump_to(7).is_none());
    assert!(h.jump_to(2).is_some());
    assert!(h.can_undo() && !h.can_redo());
}
