// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn palette_256_first_sixteen_match_ansi_palette() {
    assert_eq!(palette_256(0), "#000000");
    assert_eq!(palette_256(15), "#ffffff");
}

#[test]
fn palette_256_cube_levels() {
    // index 16 = cube (0,0,0)
    assert_eq!(palette_256(16), "#000000");
    // index 231 = cube (5,5,5) -> level 255
    assert_eq!(palette_256(231), "#ffffff");
}

#[test]
fn palette_256_grayscale_ramp() {
    assert_eq!(palette_256(232), "#080808");
    assert_eq!(palette_256(255), "#eeeeee");
}

#[test]
fn truecolor_white() {
    assert_eq!(truecolor(255, 255, 255), "#ffffff");
}
