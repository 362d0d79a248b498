use super::*;
use image::Rgba;

const HALF_BLACK: Rgba<u8> = Rgba([0, 0, 0, 128]);

fn s(x: f64, y: f64) -> ScreenPos {
    ScreenPos::new(x, y)
}

/// Editor with a `w × h` image, no container (native fit), zoom 100%.
fn editor_with_image(w: u32, h: u32) -> MaskEditor {
    let mut editor = MaskEditor::default();
    editor.set_image(RgbaImage::new(w, h));
    editor.take_events();
    editor
}

fn drag(editor: &mut MaskEditor, points: &[(f64, f64)]) {
    let (first, rest) = points.split_first().unwrap();
    editor.on_pointer_down(s(first.0, first.1));
    for &(x, y) in rest {
        editor.on_pointer_move(s(x, y));
    }
    let last = points.last().unwrap();
    editor.on_pointer_up(s(last.0, last.1));
}

fn mask_pixel(editor: &MaskEditor, x: u32, y: u32) -> Rgba<u8> {
    *editor.mask().unwrap().get_pixel(x, y)
}

/// Every masked pixel equals `expected`, and there is at least one.
fn assert_mask_is(editor: &MaskEditor, expected: Rgba<u8>) {
    let mask = editor.mask().unwrap();
    let mut seen = 0;
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            let px = *mask.get_pixel(x, y);
            if px[3] != 0 {
                assert_eq!(px, expected, "({x}, {y})");
                seen += 1;
            }
        }
    }
    assert!(seen > 0, "mask is blank");
}

fn history_events(events: &[EditorEvent]) -> Vec<(bool, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            EditorEvent::HistoryChanged { can_undo, can_redo } => Some((*can_undo, *can_redo)),
            _ => None,
        })
        .collect()
}

// --- not ready ---

#[test]
fn everything_is_ignored_before_an_image() {
    let mut editor = MaskEditor::default();
    editor.set_tool_mode(ToolMode::MaskFreehand);
    drag(&mut editor, &[(0.0, 0.0), (50.0, 50.0)]);
    editor.clear_mask();
    editor.undo();
    editor.set_opacity(0.8);
    assert!(editor.get_mask_data().is_none());
    assert!(!editor.can_undo() && !editor.can_redo());
    assert!(editor.gesture().is_idle());
    assert!(editor.take_events().is_empty());
    // Live settings still update.
    assert_eq!(editor.style().alpha(), 204);
}

#[test]
fn loading_an_image_announces_fresh_state() {
    let mut editor = MaskEditor::default();
    editor.set_image(RgbaImage::new(30, 20));
    assert_eq!(
        editor.take_events(),
        vec![
            EditorEvent::ImageLoaded { width: 30, height: 20 },
            EditorEvent::ZoomChanged(100),
            EditorEvent::HistoryChanged { can_undo: false, can_redo: false },
        ]
    );
    assert_eq!(editor.history().len(), 1);
    assert_eq!(editor.history().current().map(|e| e.tool), Some(ToolMode::Move));
}

// --- freehand ---

#[test]
fn freehand_stroke_commits_once() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskFreehand);
    drag(&mut editor, &[(10.0, 50.0), (50.0, 50.0), (90.0, 50.0)]);

    assert_eq!(editor.history().len(), 2);
    assert!(editor.can_undo());
    assert_eq!(mask_pixel(&editor, 50, 50), HALF_BLACK);
    assert_eq!(mask_pixel(&editor, 50, 70)[3], 0);

    let events = editor.take_events();
    assert_eq!(history_events(&events), vec![(true, false)]);
    let data = editor.get_mask_data();
    assert!(events.contains(&EditorEvent::MaskChanged(data)));
}

#[test]
fn click_without_motion_does_not_commit() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskFreehand);
    editor.on_pointer_down(s(10.0, 10.0));
    editor.on_pointer_move(s(10.0, 10.0));
    editor.on_pointer_up(s(10.0, 10.0));
    assert_eq!(editor.history().len(), 1);
    assert!(editor.mask().unwrap().is_blank());
    assert!(history_events(&editor.take_events()).is_empty());
}

#[test]
fn preview_is_built_on_frame_and_never_touches_the_mask() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskFreehand);
    editor.on_pointer_down(s(10.0, 50.0));
    editor.on_pointer_move(s(40.0, 50.0));
    editor.on_pointer_move(s(90.0, 50.0));
    assert!(editor.display_raster().unwrap().is_blank());

    assert!(editor.on_frame());
    assert!(!editor.display_raster().unwrap().is_blank());
    assert!(editor.mask().unwrap().is_blank());
    // Nothing new since the last frame.
    assert!(!editor.on_frame());

    editor.on_pointer_up(s(90.0, 50.0));
    assert_eq!(mask_pixel(&editor, 80, 50), HALF_BLACK);
}

#[test]
fn eraser_cuts_through_existing_mask() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(0.0, 0.0), (100.0, 100.0)]);
    editor.set_tool_mode(ToolMode::EraserFreehand);
    drag(&mut editor, &[(0.0, 50.0), (100.0, 50.0)]);
    assert_eq!(mask_pixel(&editor, 50, 50)[3], 0);
    assert_eq!(mask_pixel(&editor, 50, 10), HALF_BLACK);
    assert_eq!(editor.history().undo_history(), vec!["Move", "Box", "Eraser"]);
}

#[test]
fn stroke_entirely_off_the_image_does_not_commit() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskFreehand);
    drag(&mut editor, &[(150.0, 150.0), (190.0, 170.0)]);
    editor.set_tool_mode(ToolMode::EraserFreehand);
    drag(&mut editor, &[(-60.0, 20.0), (-30.0, 80.0)]);
    assert_eq!(editor.history().len(), 1);
    assert!(!editor.can_undo());
    assert!(editor.display_raster().unwrap().is_blank());
    assert!(history_events(&editor.take_events()).is_empty());
}

#[test]
fn undo_mid_stroke_drops_the_stroke() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskFreehand);
    drag(&mut editor, &[(10.0, 10.0), (90.0, 10.0)]);
    editor.on_pointer_down(s(10.0, 80.0));
    editor.on_pointer_move(s(90.0, 80.0));
    editor.undo();
    editor.on_pointer_up(s(90.0, 80.0));
    assert!(editor.mask().unwrap().is_blank());
    assert!(editor.can_redo());
}

// --- box ---

#[test]
fn box_undo_redo() {
    let mut editor = editor_with_image(200, 200);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(50.0, 50.0), (150.0, 150.0)]);
    assert_eq!(mask_pixel(&editor, 100, 100), HALF_BLACK);

    editor.undo();
    assert!(editor.mask().unwrap().is_blank());
    assert!(!editor.can_undo() && editor.can_redo());

    editor.redo();
    assert_eq!(mask_pixel(&editor, 100, 100), HALF_BLACK);
    assert!(editor.can_undo() && !editor.can_redo());
}

#[test]
fn zero_area_box_does_not_commit() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(20.0, 20.0), (20.0, 80.0)]);
    assert_eq!(editor.history().len(), 1);
    assert!(editor.display_raster().unwrap().is_blank());
}

// --- polygon ---

#[test]
fn polygon_closes_near_first_vertex() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskPolygon);
    for (x, y) in [(10.0, 10.0), (60.0, 10.0), (60.0, 60.0)] {
        editor.on_pointer_down(s(x, y));
        editor.on_pointer_up(s(x, y));
    }
    assert_eq!(editor.gesture().name(), "polygon-collecting");
    assert_eq!(editor.history().len(), 1);

    editor.on_pointer_move(s(12.0, 11.0));
    let overlay = editor.overlay();
    let poly = overlay.polygon.unwrap();
    assert_eq!(poly.vertices.len(), 3);
    assert!(poly.can_close);

    editor.on_pointer_down(s(12.0, 11.0));
    assert!(editor.gesture().is_idle());
    assert_eq!(editor.history().len(), 2);
    assert_eq!(mask_pixel(&editor, 50, 20), HALF_BLACK);
    assert_eq!(mask_pixel(&editor, 20, 50)[3], 0);
}

#[test]
fn collinear_polygon_closes_without_commit() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskPolygon);
    for (x, y) in [(10.0, 10.0), (40.0, 40.0), (70.0, 70.0), (10.0, 10.0)] {
        editor.on_pointer_down(s(x, y));
        editor.on_pointer_up(s(x, y));
    }
    assert!(editor.gesture().is_idle());
    assert_eq!(editor.history().len(), 1);
    assert!(editor.mask().unwrap().is_blank());
}

#[test]
fn polygon_needs_three_vertices_before_closing() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskPolygon);
    editor.on_pointer_down(s(10.0, 10.0));
    editor.on_pointer_down(s(60.0, 10.0));
    editor.on_pointer_down(s(12.0, 12.0));
    match editor.gesture() {
        GestureState::PolygonCollecting { vertices } => assert_eq!(vertices.len(), 3),
        other => panic!("unexpected gesture {}", other.name()),
    }
}

#[test]
fn tool_change_discards_open_polygon() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskPolygon);
    editor.on_pointer_down(s(10.0, 10.0));
    editor.on_pointer_down(s(60.0, 10.0));
    editor.set_tool_mode(ToolMode::MaskBox);
    assert!(editor.gesture().is_idle());
    assert_eq!(editor.history().len(), 1);
}

#[test]
fn polygon_survives_zoom() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskPolygon);
    for (x, y) in [(10.0, 10.0), (60.0, 10.0), (60.0, 60.0)] {
        editor.on_pointer_down(s(x, y));
    }
    editor.set_zoom(200.0);
    // First vertex (10, 10) in viewport space is now at screen 2*10 - 50 = -30.
    editor.on_pointer_down(s(-30.0, -30.0));
    assert!(editor.gesture().is_idle());
    assert_eq!(editor.history().len(), 2);
}

// --- clear ---

#[test]
fn clear_tool_clears_on_pointer_down() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(0.0, 0.0), (50.0, 50.0)]);
    editor.set_tool_mode(ToolMode::Clear);
    assert_eq!(editor.history().len(), 2);
    editor.on_pointer_down(s(5.0, 5.0));
    editor.on_pointer_up(s(5.0, 5.0));
    assert!(editor.mask().unwrap().is_blank());
    assert_eq!(editor.history().len(), 3);
    editor.undo();
    assert_eq!(mask_pixel(&editor, 10, 10), HALF_BLACK);
}

// --- colour / opacity ---

#[test]
fn opacity_and_colour_rewrite_all_pixels_and_commit_once() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(0.0, 0.0), (30.0, 30.0)]);
    editor.set_tool_mode(ToolMode::MaskFreehand);
    drag(&mut editor, &[(50.0, 80.0), (90.0, 80.0)]);
    let len = editor.history().len();

    editor.set_opacity(0.0);
    assert_eq!(editor.history().len(), len + 1);
    assert!(editor.set_mask_color_str("rgba(255, 0, 0, 0.2)"));
    assert_eq!(editor.history().len(), len + 2);

    let mask = editor.mask().unwrap();
    for y in 0..100 {
        for x in 0..100 {
            let px = *mask.get_pixel(x, y);
            assert!(px[3] == 0 || px == Rgba([255, 0, 0, 1]), "({x}, {y}) = {px:?}");
        }
    }
}

#[test]
fn invalid_colour_is_ignored() {
    let mut editor = editor_with_image(10, 10);
    assert!(!editor.set_mask_color_str("not a colour"));
    assert_eq!(editor.history().len(), 1);
    assert_eq!(editor.style().color, MaskColor::BLACK);
}

#[test]
fn undo_restores_shape_in_the_live_colour() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(0.0, 0.0), (30.0, 30.0)]);
    editor.set_mask_color(MaskColor::BLUE);
    editor.undo();
    assert_eq!(mask_pixel(&editor, 10, 10), Rgba([0, 0, 255, 128]));
}

// --- history navigation ---

#[test]
fn jump_to_history_restores_and_notifies() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(0.0, 0.0), (20.0, 20.0)]);
    drag(&mut editor, &[(40.0, 40.0), (60.0, 60.0)]);
    drag(&mut editor, &[(80.0, 80.0), (100.0, 100.0)]);
    assert_eq!(editor.history().len(), 4);
    editor.take_events();

    editor.jump_to_history(1);
    assert_eq!(editor.history().current_index(), 1);
    assert_eq!(mask_pixel(&editor, 10, 10), HALF_BLACK);
    assert_eq!(mask_pixel(&editor, 50, 50)[3], 0);
    assert_eq!(mask_pixel(&editor, 90, 90)[3], 0);
    assert!(editor.can_undo() && editor.can_redo());
    let events = editor.take_events();
    assert_eq!(history_events(&events), vec![(true, true)]);
    let data = editor.get_mask_data();
    assert_eq!(events.last(), Some(&EditorEvent::MaskChanged(data)));

    editor.jump_to_history(3);
    assert_eq!(mask_pixel(&editor, 90, 90), HALF_BLACK);
    assert!(editor.can_undo() && !editor.can_redo());

    editor.jump_to_history(0);
    assert!(editor.mask().unwrap().is_blank());
    assert!(!editor.can_undo() && editor.can_redo());

    // Current entry and out-of-range indices change nothing.
    editor.take_events();
    editor.jump_to_history(0);
    editor.jump_to_history(9);
    assert!(editor.take_events().is_empty());
    assert_eq!(editor.history().current_index(), 0);
}

#[test]
fn jump_to_history_discards_a_stroke_in_progress() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(0.0, 0.0), (20.0, 20.0)]);
    editor.set_tool_mode(ToolMode::MaskFreehand);
    editor.on_pointer_down(s(30.0, 60.0));
    editor.on_pointer_move(s(90.0, 60.0));
    assert!(editor.on_frame());

    editor.jump_to_history(0);
    assert!(editor.gesture().is_idle());
    editor.on_pointer_up(s(90.0, 60.0));
    assert!(editor.display_raster().unwrap().is_blank());
    assert_eq!(editor.history().len(), 2);
    assert!(editor.can_redo());
}

#[test]
fn jumped_entries_take_the_live_style() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(0.0, 0.0), (20.0, 20.0)]);
    editor.set_opacity(1.0);
    editor.set_mask_color(MaskColor::GREEN);
    editor.jump_to_history(1);
    assert_mask_is(&editor, Rgba([0, 255, 0, 255]));
}

// --- view ---

#[test]
fn wheel_zooms_about_pointer_and_clamps() {
    let mut editor = editor_with_image(100, 100);
    editor.on_wheel(s(20.0, 30.0), -1.0);
    assert_eq!(editor.zoom_percentage(), 102);
    assert_eq!(editor.take_events(), vec![EditorEvent::ZoomChanged(102)]);
    let under = editor.screen_to_image(s(20.0, 30.0));
    assert!((under.x - 20.0).abs() < 1e-9 && (under.y - 30.0).abs() < 1e-9);

    editor.reset_zoom();
    editor.on_wheel(s(0.0, 0.0), 3.0);
    assert_eq!(editor.zoom_percentage(), 100);
}

#[test]
fn programmatic_zoom_is_clamped() {
    let mut editor = editor_with_image(100, 100);
    editor.set_zoom(5000.0);
    assert_eq!(editor.zoom_percentage(), 1000);
    editor.set_zoom(10.0);
    assert_eq!(editor.zoom_percentage(), 100);
}

#[test]
fn move_tool_pans_without_touching_history() {
    let mut editor = editor_with_image(100, 100);
    drag(&mut editor, &[(10.0, 10.0), (20.0, 15.0), (30.0, 25.0)]);
    assert_eq!(editor.view().offset(), ScreenPos::new(20.0, 15.0));
    assert_eq!(editor.history().len(), 1);
    assert!(editor.mask().unwrap().is_blank());
}

#[test]
fn zoomed_and_panned_stroke_lands_where_the_transform_says() {
    let mut editor = editor_with_image(100, 100);
    editor.set_zoom(500.0);
    editor.set_tool_mode(ToolMode::Move);
    drag(&mut editor, &[(0.0, 0.0), (-30.0, 20.0)]);
    editor.set_tool_mode(ToolMode::MaskFreehand);
    editor.set_brush_size(2.0);

    let (a, b) = (s(100.0, 200.0), s(160.0, 200.0));
    let expect = editor.screen_to_image(s(130.0, 200.0));
    drag(&mut editor, &[(a.x, a.y), (b.x, b.y)]);
    assert_eq!(mask_pixel(&editor, expect.x.floor() as u32, expect.y.floor() as u32), HALF_BLACK);
}

#[test]
fn container_fit_scales_pointer_to_image_pixels() {
    let mut editor = editor_with_image(1024, 1024);
    editor.set_container_size(512.0, 512.0);
    assert_eq!(editor.screen_to_image(s(100.0, 100.0)), ImagePos::new(200.0, 200.0));
}

#[test]
fn brush_cursor_follows_pointer() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::EraserFreehand);
    editor.on_pointer_move(s(40.0, 40.0));
    let overlay = editor.overlay();
    assert!(overlay.eraser);
    assert_eq!(
        overlay.brush_cursor,
        Some(BrushCursor { center: ViewportPos::new(40.0, 40.0), radius: 5.0 })
    );
    editor.on_pointer_leave();
    assert!(editor.overlay().brush_cursor.is_none());
}

// --- loading ---

#[test]
fn raster_ops_wait_for_pending_load() {
    let path = std::env::temp_dir().join(format!("maskfe_editor_load_{}.png", std::process::id()));
    RgbaImage::new(64, 48).save(&path).unwrap();

    let mut editor = MaskEditor::default();
    editor.set_tool_mode(ToolMode::MaskBox);
    editor.load_image(path.clone());
    assert!(editor.is_loading() && !editor.is_ready());
    drag(&mut editor, &[(0.0, 0.0), (20.0, 20.0)]);
    assert!(editor.gesture().is_idle());

    editor.wait_for_image().unwrap();
    assert!(editor.is_ready());
    assert_eq!(editor.background().map(|b| b.dimensions()), Some((64, 48)));
    drag(&mut editor, &[(0.0, 0.0), (20.0, 20.0)]);
    assert!(editor.can_undo());

    let _ = std::fs::remove_file(path);
}

#[test]
fn failed_load_reports_and_stays_unready() {
    let mut editor = MaskEditor::default();
    editor.load_image(std::env::temp_dir().join("maskfe_editor_missing.png"));
    assert!(editor.wait_for_image().is_err());
    assert!(!editor.is_ready());
    assert!(matches!(editor.take_events().as_slice(), [EditorEvent::LoadFailed(_)]));
}

#[test]
fn style_changed_during_a_failed_load_reaches_the_old_mask() {
    let mut editor = editor_with_image(100, 100);
    editor.set_tool_mode(ToolMode::MaskBox);
    drag(&mut editor, &[(0.0, 0.0), (32.0, 32.0)]);
    let len = editor.history().len();
    editor.take_events();

    editor.load_image(std::env::temp_dir().join("maskfe_editor_missing_restyle.png"));
    editor.set_mask_color(MaskColor::RED);
    editor.set_opacity(1.0);
    assert_eq!(editor.history().len(), len);
    assert!(editor.wait_for_image().is_err());

    // The surviving mask picks up the new style in one entry.
    assert!(editor.is_ready());
    assert_eq!(editor.history().len(), len + 1);
    assert_mask_is(&editor, Rgba([255, 0, 0, 255]));
    let events = editor.take_events();
    assert!(matches!(events.first(), Some(EditorEvent::LoadFailed(_))));
    assert_eq!(history_events(&events), vec![(true, false)]);

    drag(&mut editor, &[(50.0, 50.0), (80.0, 80.0)]);
    assert_mask_is(&editor, Rgba([255, 0, 0, 255]));
    editor.undo();
    editor.redo();
    assert_mask_is(&editor, Rgba([255, 0, 0, 255]));
    editor.undo();
    editor.undo();
    assert_eq!(mask_pixel(&editor, 10, 10), Rgba([255, 0, 0, 255]));
    assert_eq!(mask_pixel(&editor, 60, 60)[3], 0);
}

#[test]
fn failed_load_without_style_change_adds_no_entry() {
    let mut editor = editor_with_image(50, 50);
    editor.load_image(std::env::temp_dir().join("maskfe_editor_missing_plain.png"));
    assert!(editor.wait_for_image().is_err());
    assert!(editor.is_ready());
    assert_eq!(editor.history().len(), 1);
    assert!(matches!(editor.take_events().as_slice(), [EditorEvent::LoadFailed(_)]));
}

#[test]
fn image_without_pixels_is_rejected() {
    let mut editor = editor_with_image(40, 30);
    editor.set_image(RgbaImage::new(0, 30));
    assert!(matches!(editor.take_events().as_slice(), [EditorEvent::LoadFailed(_)]));
    assert_eq!(editor.background().map(|b| b.dimensions()), Some((40, 30)));
    assert_eq!(editor.mask().map(|m| (m.width(), m.height())), Some((40, 30)));

    let mut fresh = MaskEditor::default();
    fresh.set_image(RgbaImage::new(16, 0));
    assert!(!fresh.is_ready());
    assert!(fresh.get_mask_data().is_none());
}
