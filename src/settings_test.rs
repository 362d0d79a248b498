use super::*;

#[test]
fn empty_file_gives_defaults() {
    assert_eq!(EditorSettings::parse(""), EditorSettings::default());
}

#[test]
fn config_string_round_trips() {
    let s = EditorSettings {
        brush_size: 24.5,
        mask_color: MaskColor::new(200, 10, 99),
        opacity: 0.75,
        max_undo_steps: 12,
        history_memory_mb: 64,
        wheel_zoom_step: 0.1,
        polygon_close_radius: 6.0,
    };
    assert_eq!(EditorSettings::parse(&s.to_config_string()), s);
}

#[test]
fn bad_values_keep_defaults_and_unknown_keys_are_ignored() {
    let s = EditorSettings::parse(
        "brush_size=-3\n\
         opacity=2.5\n\
         mask_color=chartreuse\n\
         wheel_zoom_step=1.5\n\
         theme_mode=dark\n\
         # comment=ignored\n\
         not a setting line\n\
         max_undo_steps=20\n",
    );
    let d = EditorSettings::default();
    assert_eq!(s.brush_size, d.brush_size);
    assert_eq!(s.opacity, d.opacity);
    assert_eq!(s.mask_color, d.mask_color);
    assert_eq!(s.wheel_zoom_step, d.wheel_zoom_step);
    assert_eq!(s.max_undo_steps, 20);
}

#[test]
fn color_accepts_css_forms() {
    let s = EditorSettings::parse("mask_color = #00ff00");
    assert_eq!(s.mask_color, MaskColor::GREEN);
}

#[test]
fn memory_cap_in_bytes() {
    let s = EditorSettings { history_memory_mb: 3, ..Default::default() };
    assert_eq!(s.history_memory_bytes(), 3 * 1024 * 1024);
}
