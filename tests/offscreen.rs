//! Offscreen rendering checks. Ignored by default: they need a GPU adapter.

use obscura::effect::{EffectDescriptor, EffectRenderer, GpuContext};
use obscura::frame::VideoFrame;

fn gpu() -> GpuContext {
    GpuContext::new(None).expect("GPU adapter available")
}

#[test]
#[ignore = "requires a GPU adapter"]
fn invert_effect_is_deterministic() {
    let ctx = gpu();
    let mut renderer = EffectRenderer::new(&ctx, &EffectDescriptor::Invert, 64, 64).unwrap();

    let input = VideoFrame::solid(64, 64, [10, 200, 30, 255]);
    renderer.upload_frame(&ctx, &input);

    // No hidden animation state: the same input texture yields identical
    // output pixels on consecutive renders.
    let first = renderer.render_offscreen(&ctx).unwrap();
    let second = renderer.render_offscreen(&ctx).unwrap();
    assert_eq!(first.data, second.data);

    // The center pixel carries the inverted input color.
    let i = (32 * 64 + 32) * 4;
    assert_eq!(&first.data[i..i + 3], &[245, 55, 225]);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn independent_renderers_share_no_state() {
    let ctx = gpu();
    let mut red = EffectRenderer::new(
        &ctx,
        &EffectDescriptor::Overlay {
            color: [1.0, 0.0, 0.0, 1.0],
        },
        32,
        32,
    )
    .unwrap();
    let mut green = EffectRenderer::new(
        &ctx,
        &EffectDescriptor::Overlay {
            color: [0.0, 1.0, 0.0, 1.0],
        },
        32,
        32,
    )
    .unwrap();

    let input = VideoFrame::solid(32, 32, [0, 0, 0, 255]);
    red.upload_frame(&ctx, &input);
    green.upload_frame(&ctx, &input);

    let red_frame = red.render_offscreen(&ctx).unwrap();
    let green_frame = green.render_offscreen(&ctx).unwrap();
    assert_eq!(&red_frame.data[0..3], &[255, 0, 0]);
    assert_eq!(&green_frame.data[0..3], &[0, 255, 0]);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn create_then_render_completes_for_any_size() {
    let ctx = gpu();
    // Odd widths exercise the readback row padding.
    for (w, h) in [(1, 1), (3, 5), (640, 360)] {
        let mut renderer = EffectRenderer::new(&ctx, &EffectDescriptor::Cube, w, h).unwrap();
        renderer.advance();
        let frame = renderer.render_offscreen(&ctx).unwrap();
        assert_eq!((frame.width, frame.height), (w, h));
        assert_eq!(frame.data.len(), (w * h * 4) as usize);
    }
}
