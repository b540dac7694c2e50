// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use shmobile_video::scale::{Axis, ScaleProgram, MAX_MANTISSA, SCALE_ONE};

#[test]
fn same_size_is_pass_through() {
    for size in 1..=2560 {
        let p = ScaleProgram::compute(size, size, size);
        assert_eq!((p.mantissa, p.fraction, p.repeat), (0, 0, 0), "{size}");
        assert_eq!(p.scale_field(), 0);
    }
}

#[test]
fn fields_fit_their_registers() {
    for input in (16..=2560).step_by(7) {
        for output in (16..=2560).step_by(13) {
            let p = ScaleProgram::compute(input, output, output);
            assert!(p.mantissa < 1 << 12, "{input}->{output}: {p:?}");
            assert!(p.fraction < SCALE_ONE, "{input}->{output}: {p:?}");
            assert_eq!(p.fraction & 7, 0, "{input}->{output}: {p:?}");
            if p.fits() {
                assert!(p.mantissa <= MAX_MANTISSA, "{input}->{output}: {p:?}");
                assert!(p.scale_field() <= 0xffff, "{input}->{output}: {p:?}");
            } else {
                // Only large downscales leave the register range.
                assert!(input > output * 15, "{input}->{output}: {p:?}");
            }
        }
    }
}

#[test]
fn resize_range_limit() {
    assert!(ScaleProgram::compute(2560, 176, 176).fits());
    let p = ScaleProgram::compute(2560, 16, 16);
    assert!(!p.fits());
    assert!(p.mantissa > MAX_MANTISSA);
}

#[test]
fn rounded_size_of_crop() {
    let p = ScaleProgram::compute(320, 320, 300);
    assert_eq!(p.rounded_size, ((320 * 300) / 320 + 3) & !3);
    assert_eq!(p.rounded_size, 300);

    let p = ScaleProgram::compute(352, 704, 610);
    assert_eq!(p.rounded_size, 308);
    assert_eq!(p.rounded_size % 4, 0);
}

#[test]
fn upscale_without_repeat_mode() {
    // 176 -> 320 is not a power-of-two ratio.
    let p = ScaleProgram::compute(176, 320, 320);
    assert_eq!(p.repeat, 0);
    assert_eq!(p.mantissa, 0);
    // (4096 * 175 / 321) = 2233, masked to 2232, biased down by 8.
    assert_eq!(p.fraction, 2224);
}

#[test]
fn register_packing() {
    let h = ScaleProgram::compute(640, 320, 320);
    let v = ScaleProgram::compute(240, 480, 460);

    let scale = Axis::Horizontal.pack(h.scale_field()) | Axis::Vertical.pack(v.scale_field());
    let clip = Axis::Horizontal.pack(h.clip_field()) | Axis::Vertical.pack(v.clip_field());

    // Horizontal: mantissa 1 at bit 12, fraction 4064 in bits 11:0.
    assert_eq!(scale & 0xfff, 4064);
    assert_eq!((scale >> 12) & 0xf, 1);
    // Vertical: 2x repeat, fraction 0x800 in the upper half.
    assert_eq!(scale >> 16, 0x0800);
    assert_eq!(clip & 0xffff, 320);
    assert_eq!(clip >> 16, (1 << 12) | 460);
}
