//! Bit-exactness of the compiled path against the generic fragment
//! processor: randomized state keys and pixel streams are driven through
//! both, and the resulting color and depth surfaces must match byte for
//! byte.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use softrast_jit::compile_program;
use softrast_pixel::{
    generic_single_func, BlendEquation, BlendFactor, BufferFormat, CompareFunc, LogicOp,
    PixelStateKey, RenderTarget, StencilOp, Vec4i,
};

const WIDTH: i32 = 8;
const HEIGHT: i32 = 8;

const STENCIL_OPS: [StencilOp; 6] = [
    StencilOp::Keep,
    StencilOp::Zero,
    StencilOp::Replace,
    StencilOp::Invert,
    StencilOp::Increment,
    StencilOp::Decrement,
];

const BLEND_EQS: [BlendEquation; 6] = [
    BlendEquation::MulAdd,
    BlendEquation::MulSub,
    BlendEquation::MulSubReverse,
    BlendEquation::Min,
    BlendEquation::Max,
    BlendEquation::AbsDiff,
];

const BLEND_FACTORS: [BlendFactor; 13] = [
    BlendFactor::Zero,
    BlendFactor::One,
    BlendFactor::OtherColor,
    BlendFactor::InvOtherColor,
    BlendFactor::SrcAlpha,
    BlendFactor::InvSrcAlpha,
    BlendFactor::DstAlpha,
    BlendFactor::InvDstAlpha,
    BlendFactor::DoubleSrcAlpha,
    BlendFactor::DoubleInvSrcAlpha,
    BlendFactor::DoubleDstAlpha,
    BlendFactor::DoubleInvDstAlpha,
    BlendFactor::Fix,
];

fn pick<T: Copy>(rng: &mut ChaCha8Rng, items: &[T]) -> T {
    items[rng.gen_range(0..items.len())]
}

fn random_key(rng: &mut ChaCha8Rng) -> PixelStateKey {
    let mut id = PixelStateKey {
        clear_mode: rng.gen_bool(0.25),
        fb_format: pick(rng, &BufferFormat::ALL),

        alpha_test_func: pick(rng, &CompareFunc::ALL),
        alpha_test_ref: rng.gen(),
        has_alpha_test_mask: rng.gen_bool(0.3),

        stencil_test_func: pick(rng, &CompareFunc::ALL),
        stencil_test_ref: rng.gen(),
        has_stencil_test_mask: rng.gen_bool(0.3),
        stencil_fail_op: pick(rng, &STENCIL_OPS),
        depth_fail_op: pick(rng, &STENCIL_OPS),
        depth_pass_op: pick(rng, &STENCIL_OPS),

        depth_test_func: pick(rng, &CompareFunc::ALL),

        blend_eq: pick(rng, &BLEND_EQS),
        blend_src: pick(rng, &BLEND_FACTORS),
        blend_dst: pick(rng, &BLEND_FACTORS),

        alpha_blend: rng.gen_bool(0.5),
        stencil_test: rng.gen_bool(0.5),
        color_test: rng.gen_bool(0.3),
        depth_write: rng.gen_bool(0.5),
        dithering: rng.gen_bool(0.5),
        apply_fog: rng.gen_bool(0.3),
        apply_depth_range: rng.gen_bool(0.3),
        apply_color_write_mask: rng.gen_bool(0.3),
        apply_logic_op: rng.gen_bool(0.3),

        color_clear: rng.gen_bool(0.7),
        stencil_clear: rng.gen_bool(0.7),

        ..Default::default()
    };

    id.cached.alpha_test_mask = rng.gen();
    id.cached.color_test_func = pick(rng, &CompareFunc::ALL);
    id.cached.color_test_ref = rng.gen::<u32>() & 0x00FF_FFFF;
    id.cached.color_test_mask = rng.gen::<u32>() & 0x00FF_FFFF;
    id.cached.stencil_test_mask = rng.gen();
    id.cached.stencil_ref = rng.gen();
    let (a, b) = (rng.gen::<u16>(), rng.gen::<u16>());
    id.cached.minz = a.min(b);
    id.cached.maxz = a.max(b);
    id.cached.fog_color = rng.gen::<u32>() & 0x00FF_FFFF;
    for d in id.cached.dither_matrix.iter_mut() {
        *d = rng.gen_range(-4..4);
    }
    id.cached.fb_stride = WIDTH;
    id.cached.depth_stride = WIDTH;
    id.cached.color_write_mask = match id.fb_format {
        BufferFormat::Rgba8888 => rng.gen(),
        _ => rng.gen::<u32>() & 0xFFFF,
    };
    id.cached.logic_op = pick(rng, &LogicOp::ALL);
    id.cached.blend_fix_a = rng.gen::<u32>() & 0x00FF_FFFF;
    id.cached.blend_fix_b = rng.gen::<u32>() & 0x00FF_FFFF;

    id
}

fn random_target(rng: &mut ChaCha8Rng, fmt: BufferFormat) -> (RenderTarget, RenderTarget) {
    let a = RenderTarget::new(WIDTH as usize, HEIGHT as usize, fmt.bytes_per_pixel());
    let b = RenderTarget::new(WIDTH as usize, HEIGHT as usize, fmt.bytes_per_pixel());
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            if fmt == BufferFormat::Rgba8888 {
                let px = rng.gen::<u32>();
                a.fb.set32(x, y, WIDTH, px);
                b.fb.set32(x, y, WIDTH, px);
            } else {
                let px = rng.gen::<u16>();
                a.fb.set16(x, y, WIDTH, px);
                b.fb.set16(x, y, WIDTH, px);
            }
            let z = rng.gen::<u16>();
            a.depth.set16(x, y, WIDTH, z);
            b.depth.set16(x, y, WIDTH, z);
        }
    }
    (a, b)
}

fn assert_targets_equal(a: &RenderTarget, b: &RenderTarget, fmt: BufferFormat, id: &PixelStateKey) {
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            if fmt == BufferFormat::Rgba8888 {
                assert_eq!(
                    a.fb.get32(x, y, WIDTH),
                    b.fb.get32(x, y, WIDTH),
                    "fb mismatch at ({x}, {y}) for {}",
                    id.describe()
                );
            } else {
                assert_eq!(
                    a.fb.get16(x, y, WIDTH),
                    b.fb.get16(x, y, WIDTH),
                    "fb mismatch at ({x}, {y}) for {}",
                    id.describe()
                );
            }
            assert_eq!(
                a.depth.get16(x, y, WIDTH),
                b.depth.get16(x, y, WIDTH),
                "depth mismatch at ({x}, {y}) for {}",
                id.describe()
            );
        }
    }
}

fn run_both(rng: &mut ChaCha8Rng, id: &PixelStateKey, pixels: usize) {
    let (generic_target, compiled_target) = random_target(rng, id.fb_format);
    let generic = generic_single_func(id);
    let program = compile_program(id);

    for _ in 0..pixels {
        let x = rng.gen_range(0..WIDTH);
        let y = rng.gen_range(0..HEIGHT);
        let z = rng.gen::<u16>();
        let fog = rng.gen_range(0..=255);
        // Out-of-range inputs exercise the entry clamp.
        let color = Vec4i::new(
            rng.gen_range(-64..320),
            rng.gen_range(-64..320),
            rng.gen_range(-64..320),
            rng.gen_range(-64..320),
        );
        generic(&generic_target, id, x, y, z, fog, color);
        program.run(&compiled_target, x, y, z, fog, color);
    }

    assert_targets_equal(&generic_target, &compiled_target, id.fb_format, id);
}

#[test]
fn randomized_keys_are_bit_exact_across_paths() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5E1F_CAFE);
    for _ in 0..512 {
        let id = random_key(&mut rng);
        run_both(&mut rng, &id, 64);
    }
}

#[test]
fn classic_blend_with_dither_matches_on_every_format() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for fmt in BufferFormat::ALL {
        let mut id = PixelStateKey {
            fb_format: fmt,
            alpha_blend: true,
            blend_eq: BlendEquation::MulAdd,
            blend_src: BlendFactor::SrcAlpha,
            blend_dst: BlendFactor::InvSrcAlpha,
            dithering: true,
            depth_write: true,
            depth_test_func: CompareFunc::LessEqual,
            ..Default::default()
        };
        id.cached.fb_stride = WIDTH;
        id.cached.depth_stride = WIDTH;
        id.cached.dither_matrix = [-4, 0, -3, 1, 2, -2, 3, -1, -3, 1, -4, 0, 3, -1, 2, -2];
        run_both(&mut rng, &id, 256);
    }
}

#[test]
fn stencil_heavy_keys_match_including_failure_writebacks() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for fmt in BufferFormat::ALL {
        for fail_op in STENCIL_OPS {
            let mut id = PixelStateKey {
                fb_format: fmt,
                stencil_test: true,
                stencil_test_func: CompareFunc::Greater,
                stencil_test_ref: 0x80,
                stencil_fail_op: fail_op,
                depth_fail_op: StencilOp::Decrement,
                depth_pass_op: StencilOp::Increment,
                depth_test_func: CompareFunc::Less,
                depth_write: true,
                ..Default::default()
            };
            id.cached.fb_stride = WIDTH;
            id.cached.depth_stride = WIDTH;
            run_both(&mut rng, &id, 128);
        }
    }
}

#[test]
fn clear_mode_variants_match() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    for fmt in BufferFormat::ALL {
        for (color_clear, stencil_clear, depth_write) in [
            (true, true, true),
            (true, false, false),
            (false, true, true),
            (false, false, false),
        ] {
            let mut id = PixelStateKey {
                clear_mode: true,
                fb_format: fmt,
                color_clear,
                stencil_clear,
                depth_write,
                ..Default::default()
            };
            id.cached.fb_stride = WIDTH;
            id.cached.depth_stride = WIDTH;
            run_both(&mut rng, &id, 128);
        }
    }
}

#[test]
fn logic_ops_match_through_the_framebuffer() {
    let mut rng = ChaCha8Rng::seed_from_u64(41);
    for op in LogicOp::ALL {
        let mut id = PixelStateKey {
            fb_format: BufferFormat::Rgba8888,
            apply_logic_op: true,
            ..Default::default()
        };
        id.cached.logic_op = op;
        id.cached.fb_stride = WIDTH;
        id.cached.depth_stride = WIDTH;
        run_both(&mut rng, &id, 64);
    }
}
