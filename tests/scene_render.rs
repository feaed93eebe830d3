use std::path::PathBuf;

use storyreel::{canvas::SceneFont, render_scenes, VideoRenderConfig};

fn system_font_available() -> bool {
    SceneFont::discover().is_some()
}

fn temp_root(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "storyreel_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn small_config() -> VideoRenderConfig {
    VideoRenderConfig {
        width: 640,
        height: 360,
        ..VideoRenderConfig::default()
    }
}

#[test]
fn blank_paragraphs_produce_no_scene_files() {
    if !system_font_available() {
        return;
    }
    let root = temp_root("scene_blanks");
    let font = SceneFont::load(None).unwrap();

    let paths = render_scenes(
        &["第一段。", "   ", "第二段。"],
        &small_config(),
        &root,
        &font,
    )
    .unwrap();

    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0], root.join("scene_0000.png"));
    assert_eq!(paths[1], root.join("scene_0001.png"));
    for path in &paths {
        let meta = std::fs::metadata(path).unwrap();
        assert!(meta.len() > 0, "empty scene file {}", path.display());
    }

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn rendering_the_same_scene_twice_is_deterministic() {
    if !system_font_available() {
        return;
    }
    let first_root = temp_root("scene_det_a");
    let second_root = temp_root("scene_det_b");
    let font = SceneFont::load(None).unwrap();
    let config = small_config();

    let first = render_scenes(&["同一段文字。"], &config, &first_root, &font).unwrap();
    let second = render_scenes(&["同一段文字。"], &config, &second_root, &font).unwrap();

    let a = std::fs::read(&first[0]).unwrap();
    let b = std::fs::read(&second[0]).unwrap();
    assert_eq!(a, b, "same input produced different scene images");

    let _ = std::fs::remove_dir_all(&first_root);
    let _ = std::fs::remove_dir_all(&second_root);
}

fn white_ink_pixels(path: &std::path::Path) -> u64 {
    let img = image::open(path).unwrap().to_rgba8();
    img.pixels()
        .filter(|px| px.0[0] > 240 && px.0[1] > 240 && px.0[2] > 240)
        .count() as u64
}

#[test]
fn caption_ink_scales_with_the_canvas() {
    if !system_font_available() {
        return;
    }
    let big_root = temp_root("scene_scale_big");
    let small_root = temp_root("scene_scale_small");
    let font = SceneFont::load(None).unwrap();
    let text = "缩放测试字幕。";

    let big_cfg = VideoRenderConfig::default();
    let small_cfg = small_config();
    let big = render_scenes(&[text], &big_cfg, &big_root, &font).unwrap();
    let small = render_scenes(&[text], &small_cfg, &small_root, &font).unwrap();

    // 640x360 is a third of 1920x1080 per axis, so caption ink should
    // shrink roughly ninefold. A fixed-size font would keep the counts
    // nearly equal.
    let big_ink = white_ink_pixels(&big[0]);
    let small_ink = white_ink_pixels(&small[0]);
    assert!(big_ink > 0, "no caption ink at 1080p");
    assert!(small_ink > 0, "no caption ink at 360p");
    assert!(
        small_ink * 4 < big_ink,
        "caption did not scale down: {small_ink} vs {big_ink} white pixels"
    );
    assert!(
        small_ink * 20 > big_ink,
        "caption shrank too far: {small_ink} vs {big_ink} white pixels"
    );

    let _ = std::fs::remove_dir_all(&big_root);
    let _ = std::fs::remove_dir_all(&small_root);
}

#[test]
fn missing_background_photo_falls_back_without_error() {
    if !system_font_available() {
        return;
    }
    let root = temp_root("scene_missing_bg");
    let font = SceneFont::load(None).unwrap();
    let config = VideoRenderConfig {
        background_dir: Some(root.join("no_such_dir")),
        ..small_config()
    };

    let paths = render_scenes(&["背景缺失的场景。"], &config, &root, &font).unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].exists());

    let _ = std::fs::remove_dir_all(&root);
}
